use super::*;

#[test]
fn test_generate_key_signature() -> Result<()> {
    let certificate = Certificate::generate_self_signed(vec!["localhost".to_owned()])?;
    let keypair = NamedCurve::X25519.generate_keypair()?;
    let client_random = [0x11u8; 32];
    let server_random = [0x22u8; 32];

    let signature = generate_key_signature(
        &client_random,
        &server_random,
        &keypair.public_key,
        keypair.curve,
        &certificate.private_key,
    )?;

    verify_key_signature(
        &client_random,
        &server_random,
        &keypair.public_key,
        keypair.curve,
        HashAlgorithm::Sha256,
        &signature,
        &certificate.certificate,
    )?;

    let mut tampered = client_random;
    tampered[0] ^= 0xff;
    let result = verify_key_signature(
        &tampered,
        &server_random,
        &keypair.public_key,
        keypair.curve,
        HashAlgorithm::Sha256,
        &signature,
        &certificate.certificate,
    );
    assert_eq!(result, Err(Error::ErrKeySignatureMismatch));

    Ok(())
}

#[test]
fn test_certificate_verify_with_other_certificate_fails() -> Result<()> {
    let certificate = Certificate::generate_self_signed(vec!["a".to_owned()])?;
    let other = Certificate::generate_self_signed(vec!["b".to_owned()])?;
    let bodies = b"handshake transcript";

    let signature = generate_certificate_verify(bodies, &certificate.private_key)?;
    verify_certificate_verify(
        bodies,
        HashAlgorithm::Sha256,
        &signature,
        &certificate.certificate,
    )?;

    assert_eq!(
        verify_certificate_verify(bodies, HashAlgorithm::Sha256, &signature, &other.certificate),
        Err(Error::ErrKeySignatureMismatch)
    );
    assert_eq!(
        verify_certificate_verify(bodies, HashAlgorithm::Sha1, &signature, &certificate.certificate),
        Err(Error::ErrInvalidHashAlgorithm)
    );

    Ok(())
}

#[test]
fn test_certificate_validity() -> Result<()> {
    let certificate = Certificate::generate_self_signed(vec!["localhost".to_owned()])?;
    verify_certificate_validity(&certificate.certificate)?;

    assert_eq!(
        verify_certificate_validity(&[]),
        Err(Error::ErrNoRemoteCertificate)
    );
    assert_eq!(
        verify_certificate_validity(&[vec![0x30, 0x03, 0x01, 0x02, 0x03]]),
        Err(Error::ErrInvalidCertificate)
    );
    Ok(())
}

#[test]
fn test_certificate_clone_keeps_key() -> Result<()> {
    let certificate = Certificate::generate_self_signed(vec!["localhost".to_owned()])?;
    let cloned = certificate.clone();
    assert_eq!(certificate, cloned);
    Ok(())
}

#[test]
fn test_certificate_dns_names() -> Result<()> {
    let certificate =
        Certificate::generate_self_signed(vec!["a.example.com".to_owned(), "b.example.com".to_owned()])?;
    let names = certificate_dns_names(&certificate.certificate[0]);
    assert!(names.contains(&"a.example.com".to_owned()));
    assert!(names.contains(&"b.example.com".to_owned()));

    assert!(certificate_dns_names(&[0u8; 4]).is_empty());
    Ok(())
}
