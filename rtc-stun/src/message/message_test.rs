use super::*;
use crate::fingerprint::*;
use crate::integrity::*;
use crate::textattrs::*;
use crate::xoraddr::*;

use std::net::{IpAddr, Ipv4Addr};

// RFC 5769 Section 2.1, sample request.
pub(crate) const SAMPLE_REQUEST: [u8; 108] = [
    0x00, 0x01, 0x00, 0x58, 0x21, 0x12, 0xa4, 0x42, 0xb7, 0xe7, 0xa7, 0x01, 0xbc, 0x34, 0xd6, 0x86,
    0xfa, 0x87, 0xdf, 0xae, 0x80, 0x22, 0x00, 0x10, 0x53, 0x54, 0x55, 0x4e, 0x20, 0x74, 0x65, 0x73,
    0x74, 0x20, 0x63, 0x6c, 0x69, 0x65, 0x6e, 0x74, 0x00, 0x24, 0x00, 0x04, 0x6e, 0x00, 0x01, 0xff,
    0x80, 0x29, 0x00, 0x08, 0x93, 0x2f, 0xf9, 0xb1, 0x51, 0x26, 0x3b, 0x36, 0x00, 0x06, 0x00, 0x09,
    0x65, 0x76, 0x74, 0x6a, 0x3a, 0x68, 0x36, 0x76, 0x59, 0x20, 0x20, 0x20, 0x00, 0x08, 0x00, 0x14,
    0x9a, 0xea, 0xa7, 0x0c, 0xbf, 0xd8, 0xcb, 0x56, 0x78, 0x1e, 0xf2, 0xb5, 0xb2, 0xd3, 0xf2, 0x49,
    0xc1, 0xb5, 0x71, 0xa2, 0x80, 0x28, 0x00, 0x04, 0xe5, 0x7a, 0x3b, 0xcf,
];

// RFC 5769 Section 2.2, sample IPv4 response.
pub(crate) const SAMPLE_RESPONSE: [u8; 80] = [
    0x01, 0x01, 0x00, 0x3c, 0x21, 0x12, 0xa4, 0x42, 0xb7, 0xe7, 0xa7, 0x01, 0xbc, 0x34, 0xd6, 0x86,
    0xfa, 0x87, 0xdf, 0xae, 0x80, 0x22, 0x00, 0x0b, 0x74, 0x65, 0x73, 0x74, 0x20, 0x76, 0x65, 0x63,
    0x74, 0x6f, 0x72, 0x20, 0x00, 0x20, 0x00, 0x08, 0x00, 0x01, 0xa1, 0x47, 0xe1, 0x12, 0xa6, 0x43,
    0x00, 0x08, 0x00, 0x14, 0x2b, 0x91, 0xf5, 0x99, 0xfd, 0x9e, 0x90, 0xc3, 0x8c, 0x74, 0x89, 0xf9,
    0x2a, 0xf9, 0xba, 0x53, 0xf0, 0x6b, 0xe7, 0xd7, 0x80, 0x28, 0x00, 0x04, 0xc0, 0x7d, 0x4c, 0x96,
];

pub(crate) const SAMPLE_PASSWORD: &str = "VOkJxbRl1RmTxUk/WvJxBt";

#[test]
fn test_message_decode_sample_request() -> Result<()> {
    let mut m = Message::new();
    m.write(&SAMPLE_REQUEST)?;

    assert_eq!(m.typ, BINDING_REQUEST);
    assert_eq!(m.length, 0x58);
    assert_eq!(m.attributes.0.len(), 6);
    assert!(m.contains(ATTR_PRIORITY));
    assert!(!m.contains(ATTR_XORMAPPED_ADDRESS));

    let username = TextAttribute::get_from_as(&m, ATTR_USERNAME)?;
    assert_eq!(username.text, "evtj:h6vY");
    let software = TextAttribute::get_from_as(&m, ATTR_SOFTWARE)?;
    assert_eq!(software.text, "STUN test client");

    MessageIntegrity::new_short_term_integrity(SAMPLE_PASSWORD.to_owned()).check(&mut m)?;
    FINGERPRINT.check(&m)?;

    Ok(())
}

#[test]
fn test_message_decode_sample_response() -> Result<()> {
    let mut m = Message::new();
    m.write(&SAMPLE_RESPONSE)?;
    assert_eq!(m.typ, BINDING_SUCCESS);

    let mut addr = XorMappedAddress::default();
    addr.get_from(&m)?;
    assert_eq!(addr.ip, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
    assert_eq!(addr.port, 32853);

    MessageIntegrity::new_short_term_integrity(SAMPLE_PASSWORD.to_owned()).check(&mut m)?;
    FINGERPRINT.check(&m)?;

    Ok(())
}

#[test]
fn test_message_build_and_parse() -> Result<()> {
    let mut m = Message::new();
    let tid = TransactionId([7; TRANSACTION_ID_SIZE]);
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(tid),
        Box::new(TextAttribute::new(ATTR_USERNAME, "alice:bob".to_owned())),
        Box::new(MessageIntegrity::new_short_term_integrity("pwd".to_owned())),
        Box::new(FINGERPRINT),
    ])?;

    assert_eq!(m.raw.len(), MESSAGE_HEADER_SIZE + m.length as usize);
    assert_eq!(m.length % 4, 0);
    assert!(is_message(&m.raw));

    let mut decoded = Message::new();
    decoded.write(&m.raw)?;
    assert_eq!(decoded, m);
    assert_eq!(decoded.transaction_id, tid);

    MessageIntegrity::new_short_term_integrity("pwd".to_owned()).check(&mut decoded)?;
    assert_eq!(
        MessageIntegrity::new_short_term_integrity("bad".to_owned()).check(&mut decoded),
        Err(Error::ErrIntegrityMismatch)
    );

    Ok(())
}

#[test]
fn test_message_type_value() {
    let tests = vec![
        (BINDING_REQUEST, 0x0001),
        (BINDING_SUCCESS, 0x0101),
        (BINDING_ERROR, 0x0111),
        (MessageType::new(METHOD_ALLOCATE, CLASS_REQUEST), 0x0003),
        (MessageType::new(METHOD_DATA, CLASS_INDICATION), 0x0017),
        (MessageType::new(METHOD_CREATE_PERMISSION, CLASS_ERROR_RESPONSE), 0x0118),
    ];

    for (typ, value) in tests {
        assert_eq!(typ.value(), value, "{typ}");
        let mut parsed = MessageType::default();
        parsed.read_value(value);
        assert_eq!(parsed, typ);
    }
}

#[test]
fn test_message_decode_errors() {
    let mut m = Message::new();
    assert_eq!(m.write(&[0, 1, 0]), Err(Error::ErrUnexpectedHeaderEof));

    let mut bad_cookie = SAMPLE_RESPONSE;
    bad_cookie[4] = 0;
    assert!(!is_message(&bad_cookie));
    assert!(matches!(
        m.write(&bad_cookie),
        Err(Error::ErrInvalidMagicCookie(_))
    ));

    assert_eq!(
        m.write(&SAMPLE_RESPONSE[..40]),
        Err(Error::ErrBufferLengthLessThanMessageSize(40, 80))
    );
}

#[test]
fn test_message_attribute_padding() -> Result<()> {
    let mut m = Message::new();
    m.write_header();
    m.add(ATTR_SOFTWARE, b"abc");
    assert_eq!(m.length, 8);
    assert_eq!(&m.raw[MESSAGE_HEADER_SIZE..], &[0x80, 0x22, 0x00, 0x03, b'a', b'b', b'c', 0]);
    assert_eq!(m.get(ATTR_SOFTWARE)?, b"abc".to_vec());
    assert_eq!(m.get(ATTR_REALM), Err(Error::ErrAttributeNotFound));

    Ok(())
}

#[test]
fn test_transaction_id_is_random() {
    assert_ne!(TransactionId::new(), TransactionId::new());
}
