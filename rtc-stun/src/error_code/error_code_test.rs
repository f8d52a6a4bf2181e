use super::*;

#[test]
fn test_error_code_attribute() -> Result<()> {
    let mut m = Message::new();
    let a = ErrorCodeAttribute {
        code: CODE_STALE_NONCE,
        reason: b"Stale Nonce".to_vec(),
    };
    assert_eq!(a.to_string(), "438: Stale Nonce");
    a.add_to(&mut m)?;
    assert_eq!(&m.get(ATTR_ERROR_CODE)?[..4], &[0, 0, 4, 38]);

    let mut got = ErrorCodeAttribute::default();
    got.get_from(&m)?;
    assert_eq!(got, a);

    let mut short = Message::new();
    short.add(ATTR_ERROR_CODE, &[0, 0, 4]);
    assert_eq!(got.get_from(&short), Err(Error::ErrUnexpectedEof));

    Ok(())
}

#[test]
fn test_error_code_default_reason() -> Result<()> {
    let mut m = Message::new();
    CODE_ROLE_CONFLICT.add_to(&mut m)?;

    let mut got = ErrorCodeAttribute::default();
    got.get_from(&m)?;
    assert_eq!(got.code, CODE_ROLE_CONFLICT);
    assert_eq!(got.reason, b"Role Conflict".to_vec());

    assert_eq!(
        ErrorCode(599).add_to(&mut Message::new()),
        Err(Error::ErrNoDefaultReason)
    );

    Ok(())
}

#[test]
fn test_error_code_reason_too_long() {
    let a = ErrorCodeAttribute {
        code: CODE_SERVER_ERROR,
        reason: vec![b'x'; ERROR_CODE_REASON_MAX_B + 1],
    };
    assert_eq!(
        a.add_to(&mut Message::new()),
        Err(Error::ErrAttributeSizeOverflow)
    );
}
