use std::io::BufReader;

use super::*;
use crate::record_layer::record_layer_header::PROTOCOL_VERSION1_0;

#[test]
fn test_hello_verify_request() -> Result<()> {
    let raw_hello_verify_request = vec![
        0xfe, 0xff, 0x14, 0x25, 0xfb, 0xee, 0xb3, 0x7c, 0x95, 0xcf, 0x00, 0xeb, 0xad, 0xe2, 0xef,
        0xc7, 0xfd, 0xbb, 0xed, 0xf7, 0x1f, 0x6c, 0xcd,
    ];
    let parsed_hello_verify_request = HandshakeMessageHelloVerifyRequest {
        version: PROTOCOL_VERSION1_0,
        cookie: raw_hello_verify_request[3..].to_vec(),
    };

    let mut reader = BufReader::new(raw_hello_verify_request.as_slice());
    let c = HandshakeMessageHelloVerifyRequest::unmarshal(&mut reader)?;
    assert_eq!(c, parsed_hello_verify_request);

    let mut raw = vec![];
    c.marshal(&mut raw)?;
    assert_eq!(raw, raw_hello_verify_request);

    Ok(())
}

#[test]
fn test_cookie_too_long() {
    let hello_verify_request = HandshakeMessageHelloVerifyRequest {
        version: PROTOCOL_VERSION1_0,
        cookie: vec![0; 256],
    };

    let mut raw = vec![];
    assert_eq!(
        hello_verify_request.marshal(&mut raw),
        Err(Error::ErrCookieTooLong)
    );
}

#[test]
fn test_handshake_header_framing() -> Result<()> {
    let verify_data: Vec<u8> = (1..=12).collect();
    let mut handshake = Handshake::new(HandshakeMessage::Finished(HandshakeMessageFinished {
        verify_data: verify_data.clone(),
    }));
    handshake.handshake_header.message_sequence = 5;

    let raw = handshake.marshal_to_vec()?;
    assert_eq!(
        &raw[..HANDSHAKE_HEADER_LENGTH],
        &[20, 0, 0, 12, 0, 5, 0, 0, 0, 0, 0, 12]
    );
    assert_eq!(&raw[HANDSHAKE_HEADER_LENGTH..], verify_data.as_slice());

    let mut reader = BufReader::new(raw.as_slice());
    assert_eq!(Handshake::unmarshal(&mut reader)?, handshake);

    Ok(())
}

#[test]
fn test_handshake_rejects_fragment() {
    // a Finished header announcing 12 bytes while carrying only the first 4
    let raw = vec![20, 0, 0, 12, 0, 0, 0, 0, 0, 0, 0, 4, 1, 2, 3, 4];
    let mut reader = BufReader::new(raw.as_slice());
    assert_eq!(
        Handshake::unmarshal(&mut reader),
        Err(Error::ErrUnableToMarshalFragmented)
    );
}

#[test]
fn test_handshake_unknown_type() {
    let raw = vec![99, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    let mut reader = BufReader::new(raw.as_slice());
    assert_eq!(
        Handshake::unmarshal(&mut reader),
        Err(Error::ErrNotImplemented)
    );
}

#[test]
fn test_server_hello_done_is_empty() -> Result<()> {
    let handshake = Handshake::new(HandshakeMessage::ServerHelloDone(
        HandshakeMessageServerHelloDone,
    ));
    let raw = handshake.marshal_to_vec()?;
    assert_eq!(raw, vec![14, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    Ok(())
}
