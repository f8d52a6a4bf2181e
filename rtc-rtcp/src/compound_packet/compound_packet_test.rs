use super::*;
use crate::goodbye::Goodbye;
use crate::payload_feedbacks::picture_loss_indication::PictureLossIndication;

fn cname() -> SourceDescription {
    SourceDescription {
        chunks: vec![SourceDescriptionChunk {
            source: 1234,
            items: vec![SourceDescriptionItem {
                sdes_type: SdesType::SdesCname,
                text: Bytes::from_static(b"cname"),
            }],
        }],
    }
}

#[test]
fn test_read_eof() {
    let short_header = Bytes::from_static(&[
        0x81, 0xc9, // v=2, p=0, count=1, RR, len=7
    ]);

    let result = CompoundPacket::unmarshal(&mut short_header.clone());
    assert!(result.is_err(), "missing error");
}

#[test]
fn test_bad_compound() {
    // this packet is a legal BYE followed by a legal PLI, but not a legal compound packet
    let bad_compound = Bytes::from_static(&[
        // v=2, p=0, count=1, BYE, len=1
        0x81, 0xcb, 0x00, 0x01, // source=0x902f9e2e
        0x90, 0x2f, 0x9e, 0x2e, // v=2, p=0, FMT=1, PSFB, len=2
        0x81, 0xce, 0x00, 0x02, // sender=0x902f9e2e
        0x90, 0x2f, 0x9e, 0x2e, // media=0x902f9e2e
        0x90, 0x2f, 0x9e, 0x2e,
    ]);

    let result = CompoundPacket::unmarshal(&mut bad_compound.clone());
    assert_eq!(result.err(), Some(Error::BadFirstPacket));

    let packets = unmarshal(&mut bad_compound.clone()).unwrap_or_default();
    assert_eq!(packets.len(), 2);
    assert!(packets[0].as_any().downcast_ref::<Goodbye>().is_some());
    assert!(
        packets[1]
            .as_any()
            .downcast_ref::<PictureLossIndication>()
            .is_some()
    );
}

#[test]
fn test_valid_packet() {
    let cname = cname();

    let tests: Vec<(&str, CompoundPacket, Option<Error>)> = vec![
        ("empty", CompoundPacket(vec![]), Some(Error::EmptyCompound)),
        (
            "no cname",
            CompoundPacket(vec![Box::<SenderReport>::default()]),
            Some(Error::MissingCname),
        ),
        (
            "just BYE",
            CompoundPacket(vec![Box::<Goodbye>::default()]),
            Some(Error::BadFirstPacket),
        ),
        (
            "SDES / no cname",
            CompoundPacket(vec![
                Box::<SenderReport>::default(),
                Box::<SourceDescription>::default(),
            ]),
            Some(Error::MissingCname),
        ),
        (
            "just SR",
            CompoundPacket(vec![Box::<SenderReport>::default(), Box::new(cname.clone())]),
            None,
        ),
        (
            "multiple SRs",
            CompoundPacket(vec![
                Box::<SenderReport>::default(),
                Box::<SenderReport>::default(),
                Box::new(cname.clone()),
            ]),
            Some(Error::PacketBeforeCname),
        ),
        (
            "just RR",
            CompoundPacket(vec![Box::<ReceiverReport>::default(), Box::new(cname.clone())]),
            None,
        ),
        (
            "multiple RRs",
            CompoundPacket(vec![
                Box::<ReceiverReport>::default(),
                Box::<ReceiverReport>::default(),
                Box::new(cname.clone()),
            ]),
            None,
        ),
        (
            "goodbye",
            CompoundPacket(vec![
                Box::<ReceiverReport>::default(),
                Box::new(cname),
                Box::<Goodbye>::default(),
            ]),
            None,
        ),
    ];

    for (name, packet, error) in tests {
        let result = packet.validate();
        assert_eq!(result.err(), error, "Valid({name})");
    }
}

#[test]
fn test_cname() {
    let cname = cname();

    let tests: Vec<(&str, CompoundPacket, Option<Error>, &str)> = vec![
        (
            "no cname",
            CompoundPacket(vec![Box::<SenderReport>::default()]),
            Some(Error::MissingCname),
            "",
        ),
        (
            "SDES / no cname",
            CompoundPacket(vec![
                Box::<SenderReport>::default(),
                Box::<SourceDescription>::default(),
            ]),
            Some(Error::MissingCname),
            "",
        ),
        (
            "just SR",
            CompoundPacket(vec![Box::<SenderReport>::default(), Box::new(cname.clone())]),
            None,
            "cname",
        ),
        (
            "multiple SRs",
            CompoundPacket(vec![
                Box::<SenderReport>::default(),
                Box::<SenderReport>::default(),
                Box::new(cname.clone()),
            ]),
            Some(Error::PacketBeforeCname),
            "",
        ),
        (
            "just RR",
            CompoundPacket(vec![Box::<ReceiverReport>::default(), Box::new(cname)]),
            None,
            "cname",
        ),
    ];

    for (name, compound_packet, want_error, text) in tests {
        assert_eq!(compound_packet.validate().err(), want_error, "Valid({name})");

        match compound_packet.cname() {
            Ok(n) => {
                assert!(want_error.is_none(), "CNAME({name})");
                assert_eq!(n, Bytes::from(text.to_owned()), "CNAME({name})");
            }
            Err(err) => assert_eq!(Some(err), want_error, "CNAME({name})"),
        }
    }
}

#[test]
fn test_compound_packet_round_trip() -> Result<()> {
    let cname = cname();

    let tests = vec![
        (
            "bye",
            CompoundPacket(vec![
                Box::<ReceiverReport>::default(),
                Box::new(cname.clone()),
                Box::new(Goodbye {
                    sources: vec![1234],
                    ..Default::default()
                }),
            ]),
            None,
        ),
        (
            "no cname",
            CompoundPacket(vec![Box::<ReceiverReport>::default()]),
            Some(Error::MissingCname),
        ),
    ];

    for (name, packet, marshal_error) in tests {
        let result = packet.marshal();
        if let Some(err) = marshal_error {
            assert_eq!(result, Err(err), "marshal {name} header");
            continue;
        }

        let data1 = result?;
        let c = CompoundPacket::unmarshal(&mut data1.clone())?;
        let data2 = c.marshal()?;

        assert_eq!(data1, data2, "Unmarshal(Marshal({name}))");
    }

    Ok(())
}
