use super::*;

const CM_KEY: [u8; 16] = [
    0x0d, 0xcd, 0x21, 0x3e, 0x4c, 0xbc, 0xf2, 0x8f, 0x01, 0x7f, 0x69, 0x94, 0x40, 0x1e, 0x28, 0x89,
];
const CM_SALT: [u8; 14] = [
    0x62, 0x77, 0x60, 0x38, 0xc0, 0x6d, 0xc9, 0x41, 0x9f, 0x6d, 0xd9, 0x43, 0x3e, 0x7c,
];

#[test]
fn test_context_rejects_bad_key_and_salt_lengths() {
    let result = Context::new(
        &[],
        &CM_SALT,
        ProtectionProfile::Aes128CmHmacSha1_80,
        None,
        None,
    );
    assert_eq!(result.err(), Some(Error::SrtpMasterKeyLength(16, 0)));

    let result = Context::new(
        &CM_KEY,
        &[],
        ProtectionProfile::Aes128CmHmacSha1_80,
        None,
        None,
    );
    assert_eq!(result.err(), Some(Error::SrtpSaltLength(14, 0)));

    let result = Context::new(
        &CM_KEY,
        &CM_SALT,
        ProtectionProfile::AeadAes128Gcm,
        None,
        None,
    );
    assert_eq!(result.err(), Some(Error::SrtpSaltLength(12, 14)));

    let result = Context::new(
        &CM_KEY,
        &CM_SALT[..12],
        ProtectionProfile::AeadAes256Gcm,
        None,
        None,
    );
    assert_eq!(result.err(), Some(Error::SrtpMasterKeyLength(32, 16)));
}

#[test]
fn test_context_roc_and_index_accessors() -> Result<()> {
    let mut c = Context::new(
        &CM_KEY,
        &CM_SALT,
        ProtectionProfile::Aes128CmHmacSha1_80,
        None,
        None,
    )?;

    assert_eq!(c.get_roc(123), None);
    c.set_roc(123, 100);
    assert_eq!(c.get_roc(123), Some(100));

    assert_eq!(c.get_index(123), None);
    c.set_index(123, 100);
    assert_eq!(c.get_index(123), Some(100));

    c.set_index(123, MAX_SRTCP_INDEX + 1);
    assert_eq!(c.get_index(123), Some(0));

    Ok(())
}

#[test]
fn test_next_rollover_count_first_packet() {
    let s = SrtpSsrcState::default();
    assert_eq!(s.next_rollover_count(65530), (0, 0, false));
}

#[test]
fn test_rollover_count_sequence() {
    // (sequence number, expected roc, apply update)
    let cases: [(u16, u32, bool); 9] = [
        (65530, 0, true),
        (65531, 0, true),
        (65535, 0, true),
        (0, 1, true),
        (65534, 0, false),
        (1, 1, true),
        (3, 1, true),
        (32768, 1, true),
        (32769, 1, true),
    ];

    let mut s = SrtpSsrcState::default();
    for (i, (seq, expected_roc, update)) in cases.iter().enumerate() {
        let (roc, diff, overflow) = s.next_rollover_count(*seq);
        assert!(!overflow, "case {i}: unexpected overflow");
        assert_eq!(roc, *expected_roc, "case {i}: seq {seq}");
        if *update {
            s.update_rollover_count(*seq, diff);
        }
    }
}

#[test]
fn test_late_packet_after_wrap_uses_previous_roc() {
    let mut s = SrtpSsrcState::default();
    for seq in [65534u16, 65535, 0, 1, 2] {
        let (_, diff, _) = s.next_rollover_count(seq);
        s.update_rollover_count(seq, diff);
    }
    assert_eq!(s.index >> 16, 1);

    let (roc, diff, _) = s.next_rollover_count(65533);
    assert_eq!(roc, 0);
    assert!(diff < 0);

    // Late packets never move the highest index backwards.
    s.update_rollover_count(65533, diff);
    assert_eq!(s.index, (1 << 16) | 2);
}

#[test]
fn test_rollover_overflow_detected() {
    let mut s = SrtpSsrcState {
        index: ((MAX_ROC as u64) << 16) | 65535,
        rollover_has_processed: true,
        ..Default::default()
    };
    let (roc, _, overflow) = s.next_rollover_count(0);
    assert_eq!(roc, 0);
    assert!(overflow);

    s.index = ((MAX_ROC as u64) << 16) | 100;
    let (_, _, overflow) = s.next_rollover_count(101);
    assert!(!overflow);
}
