use super::*;

const MASTER_KEY: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];
const MASTER_SALT: [u8; 14] = [
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d,
];

// Picture loss indication from 0xcafebabe about 0x12345678.
const PLAIN_PLI: [u8; 12] = [
    0x81, 0xce, 0x00, 0x02, 0xca, 0xfe, 0xba, 0xbe, 0x12, 0x34, 0x56, 0x78,
];

const ENCRYPTED_PLI_CM_80: [u8; 26] = [
    0x81, 0xce, 0x00, 0x02, 0xca, 0xfe, 0xba, 0xbe, 0x94, 0x54, 0x2c, 0x73, 0x80, 0x00, 0x00, 0x01,
    0x89, 0xe7, 0x9c, 0x6d, 0x5c, 0x6e, 0xb8, 0x95, 0x9b, 0xc5,
];

const ENCRYPTED_PLI_GCM_128: [u8; 32] = [
    0x81, 0xce, 0x00, 0x02, 0xca, 0xfe, 0xba, 0xbe, 0xd9, 0x29, 0x71, 0x6a, 0x5a, 0x01, 0x9f, 0x05,
    0xe8, 0x2a, 0xda, 0xef, 0xda, 0xa3, 0x8b, 0xb7, 0x57, 0xff, 0x67, 0x36, 0x80, 0x00, 0x00, 0x01,
];

const PROFILES: [ProtectionProfile; 4] = [
    ProtectionProfile::Aes128CmHmacSha1_80,
    ProtectionProfile::Aes128CmHmacSha1_32,
    ProtectionProfile::AeadAes128Gcm,
    ProtectionProfile::AeadAes256Gcm,
];

fn build_context(profile: ProtectionProfile, replay: Option<ContextOption>) -> Result<Context> {
    let key: Vec<u8> = (0..profile.key_len() as u8).collect();
    let salt: Vec<u8> = (0x10..0x10 + profile.salt_len() as u8).collect();
    Context::new(&key, &salt, profile, None, replay)
}

#[test]
fn test_encrypt_rtcp_known_answer_aes_cm_80() -> Result<()> {
    let mut encrypt = Context::new(
        &MASTER_KEY,
        &MASTER_SALT,
        ProtectionProfile::Aes128CmHmacSha1_80,
        None,
        None,
    )?;
    let encrypted = encrypt.encrypt_rtcp(&PLAIN_PLI)?;
    assert_eq!(&encrypted[..], &ENCRYPTED_PLI_CM_80[..]);
    assert_eq!(encrypt.get_index(0xcafebabe), Some(1));

    let mut decrypt = Context::new(
        &MASTER_KEY,
        &MASTER_SALT,
        ProtectionProfile::Aes128CmHmacSha1_80,
        None,
        None,
    )?;
    let decrypted = decrypt.decrypt_rtcp(&ENCRYPTED_PLI_CM_80)?;
    assert_eq!(&decrypted[..], &PLAIN_PLI[..]);

    Ok(())
}

#[test]
fn test_encrypt_rtcp_known_answer_aead_aes_128_gcm() -> Result<()> {
    let mut encrypt = Context::new(
        &MASTER_KEY,
        &MASTER_SALT[..12],
        ProtectionProfile::AeadAes128Gcm,
        None,
        None,
    )?;
    let encrypted = encrypt.encrypt_rtcp(&PLAIN_PLI)?;
    assert_eq!(&encrypted[..], &ENCRYPTED_PLI_GCM_128[..]);

    let mut decrypt = Context::new(
        &MASTER_KEY,
        &MASTER_SALT[..12],
        ProtectionProfile::AeadAes128Gcm,
        None,
        None,
    )?;
    let decrypted = decrypt.decrypt_rtcp(&ENCRYPTED_PLI_GCM_128)?;
    assert_eq!(&decrypted[..], &PLAIN_PLI[..]);

    Ok(())
}

#[test]
fn test_rtcp_round_trip_all_profiles() -> Result<()> {
    for profile in PROFILES {
        let mut encrypt = build_context(profile, None)?;
        let mut decrypt = build_context(profile, Some(srtcp_replay_protection(64)))?;

        for i in 1..=5usize {
            let encrypted = encrypt.encrypt_rtcp(&PLAIN_PLI)?;
            assert_eq!(encrypt.get_index(0xcafebabe), Some(i), "{profile}");

            let decrypted = decrypt.decrypt_rtcp(&encrypted)?;
            assert_eq!(&decrypted[..], &PLAIN_PLI[..], "{profile}");
        }
    }
    Ok(())
}

#[test]
fn test_rtcp_replay_rejected() -> Result<()> {
    for profile in PROFILES {
        let mut encrypt = build_context(profile, None)?;
        let mut decrypt = build_context(profile, Some(srtcp_replay_protection(64)))?;

        let first = encrypt.encrypt_rtcp(&PLAIN_PLI)?;
        let second = encrypt.encrypt_rtcp(&PLAIN_PLI)?;

        decrypt.decrypt_rtcp(&second)?;
        decrypt.decrypt_rtcp(&first)?;
        assert_eq!(
            decrypt.decrypt_rtcp(&second),
            Err(Error::SrtcpSsrcDuplicated(0xcafebabe, 2)),
            "{profile}"
        );
    }
    Ok(())
}

#[test]
fn test_rtcp_tampered_packet_rejected() -> Result<()> {
    for profile in PROFILES {
        let mut encrypt = build_context(profile, None)?;
        let mut decrypt = build_context(profile, Some(srtcp_replay_protection(64)))?;

        let packet = encrypt.encrypt_rtcp(&PLAIN_PLI)?;
        let mut forged = packet.clone();
        forged[9] ^= 0x80;

        assert_eq!(
            decrypt.decrypt_rtcp(&forged),
            Err(Error::RtcpFailedToVerifyAuthTag),
            "{profile}"
        );
        // A failed authentication leaves the window untouched.
        decrypt.decrypt_rtcp(&packet)?;
    }
    Ok(())
}

#[test]
fn test_rtcp_index_wraps() -> Result<()> {
    let profile = ProtectionProfile::Aes128CmHmacSha1_80;
    let mut encrypt = build_context(profile, None)?;
    let mut decrypt = build_context(profile, Some(srtcp_replay_protection(64)))?;

    encrypt.set_index(0xcafebabe, MAX_SRTCP_INDEX - 1);
    let last = encrypt.encrypt_rtcp(&PLAIN_PLI)?;
    assert_eq!(encrypt.get_index(0xcafebabe), Some(MAX_SRTCP_INDEX));
    let wrapped = encrypt.encrypt_rtcp(&PLAIN_PLI)?;
    assert_eq!(encrypt.get_index(0xcafebabe), Some(0));

    // The encryption flag stays set while the index itself is zero.
    let tail = wrapped.len() - profile.rtcp_auth_tag_len() - 4;
    assert_eq!(&wrapped[tail..tail + 4], &[0x80, 0, 0, 0]);

    decrypt.decrypt_rtcp(&last)?;
    let decrypted = decrypt.decrypt_rtcp(&wrapped)?;
    assert_eq!(&decrypted[..], &PLAIN_PLI[..]);

    Ok(())
}

#[test]
fn test_rtcp_too_short_rejected() -> Result<()> {
    let mut decrypt = build_context(ProtectionProfile::Aes128CmHmacSha1_80, None)?;
    assert_eq!(
        decrypt.decrypt_rtcp(&PLAIN_PLI),
        Err(Error::SrtcpTooSmall(12, 22))
    );

    let mut encrypt = build_context(ProtectionProfile::Aes128CmHmacSha1_80, None)?;
    assert_eq!(
        encrypt.encrypt_rtcp(&PLAIN_PLI[..4]),
        Err(Error::SrtcpTooSmall(4, 8))
    );
    Ok(())
}
