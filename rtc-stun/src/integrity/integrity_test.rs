use super::*;
use crate::fingerprint::FINGERPRINT;
use crate::textattrs::TextAttribute;

#[test]
fn test_message_integrity_long_term_key() {
    // MD5("user:realm:pass")
    let i = MessageIntegrity::new_long_term_integrity(
        "user".to_owned(),
        "realm".to_owned(),
        "pass".to_owned(),
    );
    assert_eq!(
        i.0,
        vec![
            0x84, 0x93, 0xfb, 0xc5, 0x3b, 0xa5, 0x82, 0xfb, 0x4c, 0x04, 0x4c, 0x45, 0x6b, 0xdc,
            0x40, 0xeb,
        ]
    );
}

#[test]
fn test_message_integrity_before_fingerprint() -> Result<()> {
    let mut m = Message::new();
    m.write_header();
    FINGERPRINT.add_to(&mut m)?;
    let i = MessageIntegrity::new_short_term_integrity("pwd".to_owned());
    assert_eq!(i.add_to(&mut m), Err(Error::ErrFingerprintBeforeIntegrity));

    Ok(())
}

#[test]
fn test_message_integrity_with_trailing_fingerprint() -> Result<()> {
    let i = MessageIntegrity::new_long_term_integrity(
        "user".to_owned(),
        "realm".to_owned(),
        "pass".to_owned(),
    );
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(TextAttribute::new(ATTR_SOFTWARE, "x".to_owned())),
        Box::new(i.clone()),
        Box::new(FINGERPRINT),
    ])?;

    let mut decoded = Message::new();
    decoded.write(&m.raw)?;
    i.check(&mut decoded)?;
    // check restores the header length
    assert_eq!(decoded.raw, m.raw);

    let mut without = Message::new();
    without.write_header();
    assert_eq!(i.check(&mut without), Err(Error::ErrAttributeNotFound));

    Ok(())
}
