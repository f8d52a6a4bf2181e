use super::*;
use std::time::Duration;

fn tid(b: u8) -> TransactionId {
    TransactionId([b; TRANSACTION_ID_SIZE])
}

#[test]
fn test_agent_process_completes_transaction() -> Result<()> {
    let now = Instant::now();
    let mut a = Agent::new();
    let mut m = Message::new();
    m.transaction_id = tid(1);

    a.start(m.transaction_id, now + Duration::from_secs(1))?;
    assert_eq!(a.pending(), 1);
    a.process(m)?;
    assert_eq!(a.pending(), 0);

    let e = a.poll_event().ok_or(Error::Other("no event".to_owned()))?;
    assert_eq!(e.id, tid(1));
    assert_eq!(e.result?.transaction_id, tid(1));
    assert!(a.poll_event().is_none());

    Ok(())
}

#[test]
fn test_agent_start_twice() -> Result<()> {
    let now = Instant::now();
    let mut a = Agent::new();
    a.start(tid(2), now)?;
    assert_eq!(a.start(tid(2), now), Err(Error::ErrTransactionExists));

    Ok(())
}

#[test]
fn test_agent_stop() -> Result<()> {
    let now = Instant::now();
    let mut a = Agent::new();
    assert_eq!(a.stop(tid(3)), Err(Error::ErrTransactionNotExists));

    a.start(tid(3), now + Duration::from_millis(200))?;
    a.stop(tid(3))?;
    let e = a.poll_event().ok_or(Error::Other("no event".to_owned()))?;
    assert_eq!(e.result.err(), Some(Error::ErrTransactionStopped));
    assert_eq!(a.poll_timeout(), None);

    Ok(())
}

#[test]
fn test_agent_collect_times_out_in_deadline_order() -> Result<()> {
    let now = Instant::now();
    let mut a = Agent::new();
    a.start(tid(4), now + Duration::from_millis(300))?;
    a.start(tid(5), now + Duration::from_millis(100))?;
    a.start(tid(6), now + Duration::from_secs(10))?;
    assert_eq!(a.poll_timeout(), Some(now + Duration::from_millis(100)));

    a.collect(now + Duration::from_secs(1))?;

    let first = a.poll_event().ok_or(Error::Other("no event".to_owned()))?;
    let second = a.poll_event().ok_or(Error::Other("no event".to_owned()))?;
    assert_eq!(first.id, tid(5));
    assert_eq!(second.id, tid(4));
    assert_eq!(first.result.err(), Some(Error::ErrTransactionTimeOut));
    assert!(a.poll_event().is_none());
    assert_eq!(a.poll_timeout(), Some(now + Duration::from_secs(10)));

    Ok(())
}

#[test]
fn test_agent_close() -> Result<()> {
    let now = Instant::now();
    let mut a = Agent::new();
    a.start(tid(7), now)?;
    a.close()?;
    assert!(a.is_closed());

    let e = a.poll_event().ok_or(Error::Other("no event".to_owned()))?;
    assert_eq!(e.result.err(), Some(Error::ErrAgentClosed));

    assert_eq!(a.close(), Err(Error::ErrAgentClosed));
    assert_eq!(a.start(tid(8), now), Err(Error::ErrAgentClosed));
    assert_eq!(a.process(Message::new()), Err(Error::ErrAgentClosed));
    assert_eq!(a.stop(tid(7)), Err(Error::ErrAgentClosed));
    assert_eq!(a.collect(now), Err(Error::ErrAgentClosed));

    Ok(())
}
