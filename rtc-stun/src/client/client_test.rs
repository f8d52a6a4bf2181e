use super::*;
use crate::xoraddr::XorMappedAddress;
use sansio::Protocol;

fn client(now: Instant) -> Client {
    ClientBuilder::new()
        .with_rto(Duration::from_millis(100))
        .with_max_attempts(2)
        .build(
            "127.0.0.1:50000".parse().unwrap(),
            "127.0.0.1:3478".parse().unwrap(),
            TransportProtocol::UDP,
            now,
        )
}

fn binding_request() -> Result<Message> {
    let mut m = Message::new();
    m.build(&[Box::new(BINDING_REQUEST), Box::new(TransactionId::new())])?;
    Ok(m)
}

#[test]
fn test_client_response_completes_transaction() -> Result<()> {
    let now = Instant::now();
    let mut c = client(now);
    let request = binding_request()?;
    c.handle_write(request.clone())?;

    let sent = c.poll_write().ok_or(Error::Other("nothing sent".to_owned()))?;
    assert_eq!(&sent.message[..], &request.raw[..]);
    assert_eq!(sent.transport.peer_addr, "127.0.0.1:3478".parse().unwrap());
    assert_eq!(c.poll_timeout(), Some(now + Duration::from_millis(100)));

    let mut response = Message::new();
    response.build(&[
        Box::new(request.clone()),
        Box::new(BINDING_SUCCESS),
        Box::new(XorMappedAddress {
            ip: "1.2.3.4".parse()?,
            port: 1234,
        }),
    ])?;
    c.handle_read(TransportMessage {
        now: now + Duration::from_millis(20),
        transport: sent.transport,
        message: BytesMut::from(&response.raw[..]),
    })?;

    let event = c.poll_event().ok_or(Error::Other("no event".to_owned()))?;
    assert_eq!(event.id, request.transaction_id);
    let mut addr = XorMappedAddress::default();
    addr.get_from(&event.result?)?;
    assert_eq!(addr.port, 1234);
    assert_eq!(c.poll_timeout(), None);

    Ok(())
}

#[test]
fn test_client_retransmits_then_times_out() -> Result<()> {
    let now = Instant::now();
    let mut c = client(now);
    let request = binding_request()?;
    c.handle_write(request.clone())?;
    assert!(c.poll_write().is_some());

    // 100ms, then 200ms, then give up after the third wait of 400ms.
    let mut t = now;
    for backoff in [100u64, 200] {
        t += Duration::from_millis(backoff + 1);
        c.handle_timeout(t)?;
        let resent = c.poll_write().ok_or(Error::Other("no retransmit".to_owned()))?;
        assert_eq!(&resent.message[..], &request.raw[..]);
        assert!(c.poll_event().is_none());
    }

    t += Duration::from_millis(401);
    c.handle_timeout(t)?;
    assert!(c.poll_write().is_none());
    let event = c.poll_event().ok_or(Error::Other("no event".to_owned()))?;
    assert_eq!(event.result.err(), Some(Error::ErrTransactionTimeOut));
    assert_eq!(c.poll_timeout(), None);

    Ok(())
}

#[test]
fn test_client_close() -> Result<()> {
    let now = Instant::now();
    let mut c = client(now);
    c.handle_write(binding_request()?)?;
    c.close()?;

    let event = c.poll_event().ok_or(Error::Other("no event".to_owned()))?;
    assert_eq!(event.result.err(), Some(Error::ErrAgentClosed));
    assert_eq!(c.close(), Err(Error::ErrClientClosed));
    assert_eq!(c.handle_write(binding_request()?), Err(Error::ErrClientClosed));

    Ok(())
}
