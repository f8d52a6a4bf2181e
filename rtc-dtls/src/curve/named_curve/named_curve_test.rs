use super::*;

#[test]
fn test_generate_keypair_lengths() -> Result<()> {
    let x25519 = NamedCurve::X25519.generate_keypair()?;
    assert_eq!(x25519.public_key.len(), 32);

    let p256 = NamedCurve::P256.generate_keypair()?;
    // SEC1 uncompressed point
    assert_eq!(p256.public_key.len(), 65);
    assert_eq!(p256.public_key[0], 0x04);

    assert!(NamedCurve::Unsupported.generate_keypair().is_err());
    Ok(())
}

#[test]
fn test_ecdh_agreement() -> Result<()> {
    for curve in [NamedCurve::X25519, NamedCurve::P256] {
        let a = curve.generate_keypair()?;
        let b = curve.generate_keypair()?;

        let ab = ecdh_shared_secret(&b.public_key, &a.private_key)?;
        let ba = ecdh_shared_secret(&a.public_key, &b.private_key)?;
        assert_eq!(ab, ba, "{curve:?} shared secret");
        assert_eq!(ab.len(), 32);
    }
    Ok(())
}

#[test]
fn test_ecdh_rejects_bad_point() -> Result<()> {
    let a = NamedCurve::X25519.generate_keypair()?;
    assert!(ecdh_shared_secret(&[0u8; 31], &a.private_key).is_err());

    let b = NamedCurve::P256.generate_keypair()?;
    assert!(ecdh_shared_secret(&[0x04, 0x01, 0x02], &b.private_key).is_err());
    Ok(())
}
