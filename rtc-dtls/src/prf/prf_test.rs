use super::*;

fn decode(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

#[test]
fn test_prf_p_hash_sha256_vector() -> Result<()> {
    let secret = decode("9bbe436ba940f017b17652849a71db35");
    let mut seed = b"test label".to_vec();
    seed.extend_from_slice(&decode("a0ba9f936cda311827a6f796ffd5198c"));

    let expected = decode(
        "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a\
         6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab\
         4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701\
         87347b66",
    );

    let out = prf_p_hash(&secret, &seed, expected.len())?;
    assert_eq!(out, expected);
    Ok(())
}

#[test]
fn test_prf_master_secret_and_key_expansion() -> Result<()> {
    let pre_master_secret: Vec<u8> = (0u8..32).collect();
    let client_random = [1u8; 32];
    let server_random = [2u8; 32];

    let master_secret = prf_master_secret(&pre_master_secret, &client_random, &server_random)?;
    assert_eq!(
        master_secret,
        decode(
            "736bbd660032dbca6b2461a1488a84331d57e10b6edb8176b521be9dc3a065fe\
             33d158efe3fd1b46881629e650130686"
        )
    );

    let keys = prf_encryption_keys(&master_secret, &client_random, &server_random, 0, 16, 4)?;
    let expected = decode("f088bbf83f53cebf3f5338d5cf5461b37ee922635f51ba041328b0c758001fbfc6dfd93897de7bf4");
    assert!(keys.client_mac_key.is_empty());
    assert!(keys.server_mac_key.is_empty());
    assert_eq!(keys.client_write_key, expected[0..16]);
    assert_eq!(keys.server_write_key, expected[16..32]);
    assert_eq!(keys.client_write_iv, expected[32..36]);
    assert_eq!(keys.server_write_iv, expected[36..40]);

    Ok(())
}

#[test]
fn test_prf_verify_data_and_extended_master_secret() -> Result<()> {
    let pre_master_secret: Vec<u8> = (0u8..32).collect();
    let master_secret = prf_master_secret(&pre_master_secret, &[1u8; 32], &[2u8; 32])?;

    let verify_data = prf_verify_data_client(&master_secret, b"hello")?;
    assert_eq!(verify_data, decode("9a93612a130031870b475bf8"));
    assert_ne!(verify_data, prf_verify_data_server(&master_secret, b"hello")?);

    let session_hash = Sha256::digest(b"hello");
    let extended = prf_extended_master_secret(&master_secret, &session_hash)?;
    assert_eq!(
        extended,
        decode(
            "263be933ee4ed5d947b83938bb77e9ad480763037cda74ea658deb92ea088611\
             26781ceced5127b21504037fc481e473"
        )
    );
    Ok(())
}
