use super::chandata::*;
use super::*;

#[test]
fn test_turn_attributes_round_trip() -> Result<()> {
    let peer: SocketAddr = "203.0.113.9:40000".parse()?;
    let mut m = Message::new();
    m.build(&[
        Box::new(TransactionId::new()),
        Box::new(MessageType::new(METHOD_ALLOCATE, CLASS_REQUEST)),
        Box::new(RequestedTransport {
            protocol: PROTO_UDP,
        }),
        Box::new(Lifetime(Duration::from_secs(600))),
        Box::new(DontFragmentAttr),
        Box::new(PeerAddress::from(peer)),
        Box::new(Data(vec![1, 2, 3])),
        Box::new(ChannelNumber(0x4001)),
    ])?;

    let mut decoded = Message::new();
    decoded.write(&m.raw)?;

    let mut rt = RequestedTransport::default();
    rt.get_from(&decoded)?;
    assert_eq!(rt.protocol, PROTO_UDP);
    assert_eq!(rt.to_string(), "protocol: UDP");

    let mut lifetime = Lifetime::default();
    lifetime.get_from(&decoded)?;
    assert_eq!(lifetime.0, DEFAULT_LIFETIME);

    assert!(DontFragmentAttr::is_set(&decoded));

    let mut got_peer = PeerAddress::default();
    got_peer.get_from(&decoded)?;
    assert_eq!(SocketAddr::from(got_peer), peer);

    let mut data = Data::default();
    data.get_from(&decoded)?;
    assert_eq!(data.0, vec![1, 2, 3]);

    let mut ch = ChannelNumber::default();
    ch.get_from(&decoded)?;
    assert_eq!(ch, ChannelNumber(0x4001));

    let mut relayed = RelayedAddress::default();
    assert_eq!(
        relayed.get_from(&decoded),
        Err(Error::ErrAttributeNotFound)
    );

    Ok(())
}

#[test]
fn test_channel_data() -> Result<()> {
    let cd = ChannelData {
        number: ChannelNumber(0x4000),
        data: vec![0xaa, 0xbb, 0xcc],
    };
    let unpadded = cd.encode(false);
    assert_eq!(unpadded, vec![0x40, 0x00, 0x00, 0x03, 0xaa, 0xbb, 0xcc]);
    let padded = cd.encode(true);
    assert_eq!(padded.len(), 8);

    assert!(ChannelData::is_channel_data(&padded));
    assert_eq!(ChannelData::decode(&padded)?, cd);
    assert_eq!(ChannelData::decode(&unpadded)?, cd);

    assert!(!ChannelData::is_channel_data(&[0x00, 0x01, 0x00, 0x00]));
    assert_eq!(
        ChannelData::decode(&[0x30, 0x00, 0x00, 0x00]),
        Err(Error::ErrInvalidChannelNumber)
    );
    assert_eq!(
        ChannelData::decode(&[0x40, 0x00, 0x00, 0x08, 1]),
        Err(Error::ErrBadChannelDataLength)
    );

    Ok(())
}
