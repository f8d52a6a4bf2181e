use super::*;

#[test]
fn test_basic() -> Result<()> {
    let mut empty_bytes = &vec![0u8; 0][..];
    let result = Packet::unmarshal(&mut empty_bytes);
    assert!(
        result.is_err(),
        "Unmarshal did not error on zero length packet"
    );

    let raw_pkt = Bytes::from_static(&[
        0x90, 0xe0, 0x69, 0x8f, 0xd9, 0xc2, 0x93, 0xda, 0x1c, 0x64, 0x27, 0x82, 0x00, 0x01, 0x00,
        0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x98, 0x36, 0xbe, 0x88, 0x9e,
    ]);
    let parsed_packet = Packet {
        header: Header {
            version: 2,
            padding: false,
            extension: true,
            marker: true,
            payload_type: 96,
            sequence_number: 27023,
            timestamp: 3653407706,
            ssrc: 476325762,
            csrc: vec![],
            extension_profile: 1,
            extensions: vec![Extension {
                id: 0,
                payload: Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF]),
            }],
        },
        payload: Bytes::from_static(&[0x98, 0x36, 0xbe, 0x88, 0x9e]),
        padding_size: 0,
    };

    let buf = &mut raw_pkt.clone();
    let packet = Packet::unmarshal(buf)?;
    assert_eq!(packet, parsed_packet);
    assert_eq!(packet.header.marshal_size(), 20);
    assert_eq!(packet.marshal_size(), raw_pkt.len());

    let raw = packet.marshal()?;
    assert_eq!(raw, raw_pkt);

    Ok(())
}

#[test]
fn test_padding() -> Result<()> {
    let raw_pkt = Bytes::from_static(&[
        0xa0, 0x60, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0xAA, 0xBB, 0x00,
        0x00, 0x03,
    ]);
    let packet = Packet::unmarshal(&mut raw_pkt.clone())?;
    assert!(packet.header.padding);
    assert_eq!(packet.padding_size, 3);
    assert_eq!(packet.payload, Bytes::from_static(&[0xAA, 0xBB]));
    assert_eq!(packet.marshal()?, raw_pkt);

    // padding bit set but the count octet is zero
    let zero_padding = Bytes::from_static(&[
        0xa0, 0x60, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0xAA, 0x00,
    ]);
    assert_eq!(
        Packet::unmarshal(&mut zero_padding.clone()),
        Err(Error::ErrInvalidPadding)
    );

    // padding longer than the body
    let long_padding = Bytes::from_static(&[
        0xa0, 0x60, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0xAA, 0x05,
    ]);
    assert_eq!(
        Packet::unmarshal(&mut long_padding.clone()),
        Err(Error::ErrInvalidPadding)
    );

    // the padding bit always follows padding_size when marshaling
    let packet = Packet {
        header: Header {
            version: 2,
            padding: true,
            ..Default::default()
        },
        payload: Bytes::from_static(&[0x01]),
        padding_size: 0,
    };
    let raw = packet.marshal()?;
    assert_eq!(raw[0] & (1 << PADDING_SHIFT), 0);
    assert_eq!(raw.len(), 13);

    Ok(())
}

#[test]
fn test_extension() -> Result<()> {
    let missing_extension_pkt = Bytes::from_static(&[
        0x90, 0xe0, 0x69, 0x8f, 0xd9, 0xc2, 0x93, 0xda, 0x1c, 0x64, 0x27, 0x82,
    ]);
    let buf = &mut missing_extension_pkt.clone();
    assert_eq!(
        Packet::unmarshal(buf),
        Err(Error::ErrHeaderSizeInsufficientForExtension)
    );

    let invalid_extension_length_pkt = Bytes::from_static(&[
        0x90, 0xe0, 0x69, 0x8f, 0xd9, 0xc2, 0x93, 0xda, 0x1c, 0x64, 0x27, 0x82, 0x99, 0x99, 0x99,
        0x99,
    ]);
    let buf = &mut invalid_extension_length_pkt.clone();
    assert_eq!(
        Packet::unmarshal(buf),
        Err(Error::ErrHeaderSizeInsufficientForExtension)
    );

    let packet = Packet {
        header: Header {
            extension: true,
            extension_profile: 3,
            extensions: vec![Extension {
                id: 0,
                payload: Bytes::from_static(&[0]),
            }],
            ..Default::default()
        },
        payload: Bytes::from_static(&[]),
        padding_size: 0,
    };
    assert_eq!(
        packet.marshal(),
        Err(Error::HeaderExtensionPayloadNot32BitWords)
    );

    Ok(())
}

#[test]
fn test_rfc8285_one_byte_extension() -> Result<()> {
    let raw_pkt = Bytes::from_static(&[
        0x90, 0x60, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0xBE, 0xDE, 0x00,
        0x01, 0x50, 0xAA, 0x00, 0x00, 0x98,
    ]);
    let packet = Packet::unmarshal(&mut raw_pkt.clone())?;
    assert_eq!(packet.header.extension_profile, EXTENSION_PROFILE_ONE_BYTE);
    assert_eq!(
        packet.header.get_extension(5),
        Some(Bytes::from_static(&[0xAA]))
    );
    assert_eq!(packet.payload, Bytes::from_static(&[0x98]));
    assert_eq!(packet.marshal()?, raw_pkt);

    // reserved id 15 terminates parsing but the rest of the block is skipped
    let raw_pkt = Bytes::from_static(&[
        0x90, 0x60, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0xBE, 0xDE, 0x00,
        0x01, 0x50, 0xAA, 0xF0, 0x11, 0x98,
    ]);
    let packet = Packet::unmarshal(&mut raw_pkt.clone())?;
    assert_eq!(packet.header.extensions.len(), 1);
    assert_eq!(packet.payload, Bytes::from_static(&[0x98]));

    Ok(())
}

#[test]
fn test_rfc8285_two_byte_extension() -> Result<()> {
    let raw_pkt = Bytes::from_static(&[
        0x90, 0x60, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x10, 0x00, 0x00,
        0x01, 0x01, 0x02, 0xAA, 0xBB, 0x98,
    ]);
    let packet = Packet::unmarshal(&mut raw_pkt.clone())?;
    assert_eq!(packet.header.extension_profile, EXTENSION_PROFILE_TWO_BYTE);
    assert_eq!(
        packet.header.get_extension(1),
        Some(Bytes::from_static(&[0xAA, 0xBB]))
    );
    assert_eq!(packet.marshal()?, raw_pkt);

    Ok(())
}

#[test]
fn test_set_get_del_extension() -> Result<()> {
    let mut header = Header {
        version: 2,
        ..Default::default()
    };
    assert_eq!(
        header.del_extension(1),
        Err(Error::ErrHeaderExtensionsNotEnabled)
    );

    header.set_extension(1, Bytes::from_static(&[0xAA]))?;
    assert!(header.extension);
    assert_eq!(header.extension_profile, EXTENSION_PROFILE_ONE_BYTE);
    header.set_extension(1, Bytes::from_static(&[0xBB]))?;
    header.set_extension(2, Bytes::from_static(&[0xCC, 0xDD]))?;
    assert_eq!(header.get_extension_ids(), vec![1, 2]);
    assert_eq!(header.get_extension(1), Some(Bytes::from_static(&[0xBB])));

    assert_eq!(
        header.set_extension(15, Bytes::from_static(&[0x01])),
        Err(Error::ErrRfc8285oneByteHeaderIdrange)
    );
    assert_eq!(
        header.set_extension(3, Bytes::from(vec![0u8; 17])),
        Err(Error::ErrRfc8285oneByteHeaderSize)
    );

    let raw = header.marshal()?;
    let parsed = Header::unmarshal(&mut raw.clone())?;
    assert_eq!(parsed, header);

    header.del_extension(1)?;
    assert_eq!(
        header.del_extension(1),
        Err(Error::ErrHeaderExtensionNotFound)
    );
    header.del_extension(2)?;
    assert!(!header.extension);

    let mut header = Header::default();
    header.set_extension(3, Bytes::from(vec![0u8; 20]))?;
    assert_eq!(header.extension_profile, EXTENSION_PROFILE_TWO_BYTE);
    assert_eq!(header.marshal_size(), 12 + 4 + 24);

    Ok(())
}

#[test]
fn test_csrc_round_trip() -> Result<()> {
    let packet = Packet {
        header: Header {
            version: 2,
            marker: true,
            payload_type: 111,
            sequence_number: 65535,
            timestamp: 1,
            ssrc: 0xDEADBEEF,
            csrc: vec![1, 2, 3],
            ..Default::default()
        },
        payload: Bytes::from_static(b"opus"),
        padding_size: 0,
    };
    let raw = packet.marshal()?;
    assert_eq!(raw[0] & CC_MASK, 3);
    assert_eq!(raw.len(), 12 + 12 + 4);
    assert_eq!(Packet::unmarshal(&mut raw.clone())?, packet);

    let mut small = [0u8; 8];
    assert_eq!(packet.marshal_to(&mut small), Err(Error::ErrBufferTooSmall));

    Ok(())
}

#[test]
fn test_header_serde() -> Result<()> {
    let header = Header {
        version: 2,
        extension: true,
        payload_type: 96,
        sequence_number: 7,
        ssrc: 0x1234,
        extension_profile: EXTENSION_PROFILE_ONE_BYTE,
        extensions: vec![Extension {
            id: 1,
            payload: Bytes::from_static(&[0xAA, 0xBB]),
        }],
        ..Default::default()
    };
    let json = serde_json::to_string(&header).expect("serialize");
    let decoded: Header = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, header);
    Ok(())
}
