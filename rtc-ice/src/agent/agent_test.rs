use std::str::FromStr;

use sansio::Protocol;
use stun::message::*;
use stun::textattrs::Username;

use super::*;
use crate::attributes::{
    control::{AttrControlled, AttrControlling},
    priority::PriorityAttr,
    use_candidate::UseCandidateAttr,
};
use crate::candidate::candidate_host::*;
use crate::candidate::candidate_peer_reflexive::*;
use crate::candidate::candidate_relay::CandidateRelayConfig;
use crate::candidate::candidate_server_reflexive::*;
use crate::candidate::*;
use crate::tcp_type::TcpType;

fn host_candidate(address: &str, port: u16) -> Result<Candidate> {
    CandidateHostConfig {
        base_config: CandidateConfig {
            network: "udp".to_owned(),
            address: address.to_owned(),
            port,
            component: 1,
            ..Default::default()
        },
        ..Default::default()
    }
    .new_candidate_host()
}

fn new_agent(config: AgentConfig, address: &str, port: u16) -> Result<Agent> {
    let mut agent = Agent::new(Arc::new(config))?;
    agent.add_local_candidate(host_candidate(address, port)?)?;
    Ok(agent)
}

fn build_msg(c: MessageClass, username: String, key: String) -> Result<Message> {
    let mut msg = Message::new();
    msg.build(&[
        Box::new(MessageType::new(METHOD_BINDING, c)),
        Box::new(TransactionId::new()),
        Box::new(Username::new(ATTR_USERNAME, username)),
        Box::new(MessageIntegrity::new_short_term_integrity(key)),
        Box::new(FINGERPRINT),
    ])?;
    Ok(msg)
}

/// Hands a datagram written by one agent to the other, as if it crossed the wire.
fn deliver(to: &mut Agent, transmit: TaggedBytesMut, now: Instant) -> Result<()> {
    to.handle_read(TransportMessage {
        now,
        transport: TransportContext {
            local_addr: transmit.transport.peer_addr,
            peer_addr: transmit.transport.local_addr,
            transport_protocol: transmit.transport.transport_protocol,
            ecn: None,
        },
        message: transmit.message,
    })
}

/// Moves datagrams back and forth until both agents are quiet.
fn pump(a: &mut Agent, b: &mut Agent, now: Instant) -> Result<()> {
    loop {
        let mut moved = false;
        while let Some(transmit) = a.poll_write() {
            moved = true;
            deliver(b, transmit, now)?;
        }
        while let Some(transmit) = b.poll_write() {
            moved = true;
            deliver(a, transmit, now)?;
        }
        if !moved {
            return Ok(());
        }
    }
}

fn drain_writes(agent: &mut Agent) -> usize {
    let mut count = 0;
    while agent.poll_write().is_some() {
        count += 1;
    }
    count
}

fn connection_states(agent: &mut Agent) -> Vec<ConnectionState> {
    let mut states = vec![];
    while let Some(event) = agent.poll_event() {
        if let Event::ConnectionStateChange(state) = event {
            states.push(state);
        }
    }
    states
}

fn exchange_candidates(a: &mut Agent, b: &mut Agent) -> Result<()> {
    for c in a.get_local_candidates() {
        b.add_remote_candidate(unmarshal_candidate(&c.marshal())?)?;
    }
    for c in b.get_local_candidates() {
        a.add_remote_candidate(unmarshal_candidate(&c.marshal())?)?;
    }
    Ok(())
}

fn start_both(a: &mut Agent, a_controlling: bool, b: &mut Agent, b_controlling: bool) -> Result<()> {
    let a_credentials = a.get_local_credentials().clone();
    let b_credentials = b.get_local_credentials().clone();
    a.start_connectivity_checks(a_controlling, b_credentials.ufrag, b_credentials.pwd)?;
    b.start_connectivity_checks(b_controlling, a_credentials.ufrag, a_credentials.pwd)?;
    Ok(())
}

/// Runs both agents on simulated time until they are connected.
fn run_until_connected(a: &mut Agent, b: &mut Agent, now: &mut Instant) -> Result<()> {
    for _ in 0..200 {
        pump(a, b, *now)?;
        if a.state() == ConnectionState::Connected && b.state() == ConnectionState::Connected {
            return Ok(());
        }
        *now += Duration::from_millis(50);
        a.handle_timeout(*now)?;
        b.handle_timeout(*now)?;
    }
    panic!(
        "agents did not connect: a={} b={}",
        a.state(),
        b.state()
    );
}

fn connected_pair() -> Result<(Agent, Agent, Instant)> {
    let mut a = new_agent(AgentConfig::default(), "192.168.0.1", 5000)?;
    let mut b = new_agent(AgentConfig::default(), "192.168.0.2", 6000)?;
    exchange_candidates(&mut a, &mut b)?;
    start_both(&mut a, true, &mut b, false)?;

    let mut now = Instant::now();
    run_until_connected(&mut a, &mut b, &mut now)?;
    Ok((a, b, now))
}

#[test]
fn test_pair_search() -> Result<()> {
    let mut a = Agent::new(Arc::new(AgentConfig::default()))?;

    assert!(
        a.candidate_pairs.is_empty(),
        "pair search is only meaningful if no pairs exist on construction"
    );

    let cp = a.get_best_available_candidate_pair();
    assert!(cp.is_none(), "No Candidate pairs should exist");

    a.close()?;

    Ok(())
}

#[test]
fn test_pair_priority() -> Result<()> {
    let mut a = Agent::new(Arc::new(AgentConfig::default()))?;
    a.local_candidates.push(host_candidate("192.168.1.1", 19216)?);

    let relay_remote = CandidateRelayConfig {
        base_config: CandidateConfig {
            network: "udp".to_owned(),
            address: "1.2.3.4".to_owned(),
            port: 12340,
            component: 1,
            ..Default::default()
        },
        rel_addr: "4.3.2.1".to_owned(),
        rel_port: 43210,
        ..Default::default()
    }
    .new_candidate_relay()?;

    let srflx_remote = CandidateServerReflexiveConfig {
        base_config: CandidateConfig {
            network: "udp".to_owned(),
            address: "10.10.10.2".to_owned(),
            port: 19218,
            component: 1,
            ..Default::default()
        },
        rel_addr: "4.3.2.1".to_owned(),
        rel_port: 43212,
        ..Default::default()
    }
    .new_candidate_server_reflexive()?;

    let prflx_remote = CandidatePeerReflexiveConfig {
        base_config: CandidateConfig {
            network: "udp".to_owned(),
            address: "10.10.10.2".to_owned(),
            port: 19217,
            component: 1,
            ..Default::default()
        },
        rel_addr: "4.3.2.1".to_owned(),
        rel_port: 43211,
    }
    .new_candidate_peer_reflexive()?;

    let host_remote = host_candidate("1.2.3.5", 12350)?;

    for remote in [relay_remote, srflx_remote, prflx_remote, host_remote] {
        a.remote_candidates.push(remote);
    }

    let local = 0;
    for remote in 0..a.remote_candidates.len() {
        if a.find_pair(local, remote).is_none() {
            a.add_pair(local, remote);
        }

        if let Some(p) = a.find_pair(local, remote) {
            a.candidate_pairs[p].state = CandidatePairState::Succeeded;
        }

        let Some(best_pair) = a.get_best_available_candidate_pair() else {
            panic!("expected Some, but got None");
        };
        assert_eq!(
            a.candidate_pairs[best_pair].to_string(),
            CandidatePair::new(
                local,
                remote,
                a.local_candidates[local].priority(),
                a.remote_candidates[remote].priority(),
                a.is_controlling,
            )
            .to_string(),
            "Unexpected bestPair {best_pair} (expected remote: {remote})",
        );
    }

    a.close()?;
    Ok(())
}

#[test]
fn test_first_pair_of_foundation_waits_others_frozen() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "192.168.1.1", 5000)?;

    a.add_remote_candidate(host_candidate("192.168.1.2", 6000)?)?;
    a.add_remote_candidate(host_candidate("192.168.1.2", 6001)?)?;
    assert_eq!(a.candidate_pairs.len(), 2);

    // both remotes share the host foundation of their address
    assert_eq!(a.candidate_pairs[0].foundation, a.candidate_pairs[1].foundation);
    assert_eq!(a.candidate_pairs[0].state, CandidatePairState::Waiting);
    assert_eq!(a.candidate_pairs[1].state, CandidatePairState::Frozen);

    let foundation = a.candidate_pairs[0].foundation.clone();
    a.unfreeze(&foundation, true);
    assert_eq!(a.candidate_pairs[1].state, CandidatePairState::Waiting);

    Ok(())
}

#[test]
fn test_on_selected_candidate_pair_change() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "192.168.1.1", 19216)?;

    let relay_remote = CandidateRelayConfig {
        base_config: CandidateConfig {
            network: "udp".to_owned(),
            address: "1.2.3.4".to_owned(),
            port: 12340,
            component: 1,
            ..Default::default()
        },
        rel_addr: "4.3.2.1".to_owned(),
        rel_port: 43210,
        ..Default::default()
    }
    .new_candidate_relay()?;
    a.add_remote_candidate(relay_remote)?;

    // select the pair
    assert_eq!(a.candidate_pairs.len(), 1);
    a.set_selected_pair(Some(0));

    // ensure that the event fired on setting the pair
    let mut selected = None;
    while let Some(event) = a.poll_event() {
        if let Event::SelectedCandidatePairChange(local, remote) = event {
            selected = Some((local, remote));
        }
    }

    let Some((local, remote)) = selected else {
        panic!("expected a selected candidate pair change");
    };
    assert_eq!(local.address(), "192.168.1.1");
    assert_eq!(remote.address(), "1.2.3.4");
    assert_eq!(a.state(), ConnectionState::Connected);

    a.close()?;
    Ok(())
}

#[test]
fn test_handle_peer_reflexive_udp_pflx_candidate() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "192.168.0.2", 777)?;
    let local = 0;

    let remote_addr = SocketAddr::from_str("172.17.0.3:999")?;

    a.set_remote_credentials("remoteufrag".to_owned(), "remotepwd".to_owned())?;
    let username = a.ufrag_pwd.local_credentials.ufrag.clone() + ":remoteufrag";
    let local_pwd = a.ufrag_pwd.local_credentials.pwd.clone();

    let mut msg = Message::new();
    msg.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(Username::new(ATTR_USERNAME, username)),
        Box::new(UseCandidateAttr::new()),
        Box::new(AttrControlling(a.tie_breaker.wrapping_add(1))),
        Box::new(PriorityAttr(1234)),
        Box::new(MessageIntegrity::new_short_term_integrity(local_pwd)),
        Box::new(FINGERPRINT),
    ])?;

    a.handle_inbound(&mut msg, local, remote_addr);

    // length of remote candidate list must be one now
    assert_eq!(
        a.remote_candidates.len(),
        1,
        "failed to add a peer reflexive candidate to the remote candidate list"
    );

    let Some(remote_index) = a.find_remote_candidate(remote_addr) else {
        panic!("expected a remote candidate for {remote_addr}");
    };
    let c = &a.remote_candidates[remote_index];
    assert_eq!(
        c.candidate_type(),
        CandidateType::PeerReflexive,
        "candidate type must be prflx"
    );
    assert_eq!(c.address(), "172.17.0.3", "IP address mismatch");
    assert_eq!(c.port(), 999, "Port number mismatch");
    assert_eq!(c.priority(), 1234, "priority must come from PRIORITY");
    assert!(c.last_received().is_some());

    // the request was answered
    let Some(answer) = a.poll_write() else {
        panic!("expected a binding response");
    };
    assert_eq!(answer.transport.peer_addr, remote_addr);
    let mut response = Message::new();
    response.write(&answer.message)?;
    assert_eq!(response.typ, BINDING_SUCCESS);
    assert_eq!(response.transaction_id, msg.transaction_id);

    a.close()?;
    Ok(())
}

#[test]
fn test_signalled_candidate_replaces_peer_reflexive() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "192.168.0.2", 777)?;
    a.set_remote_credentials("remoteufrag".to_owned(), "remotepwd".to_owned())?;
    let username = a.ufrag_pwd.local_credentials.ufrag.clone() + ":remoteufrag";
    let local_pwd = a.ufrag_pwd.local_credentials.pwd.clone();

    let mut msg = Message::new();
    msg.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(Username::new(ATTR_USERNAME, username)),
        Box::new(AttrControlling(a.tie_breaker.wrapping_add(1))),
        Box::new(PriorityAttr(1234)),
        Box::new(MessageIntegrity::new_short_term_integrity(local_pwd)),
        Box::new(FINGERPRINT),
    ])?;
    a.handle_inbound(&mut msg, 0, SocketAddr::from_str("172.17.0.3:999")?);
    assert_eq!(a.remote_candidates.len(), 1);
    let pairs = a.candidate_pairs.len();

    let signalled = host_candidate("172.17.0.3", 999)?;
    let priority = signalled.priority();
    a.add_remote_candidate(signalled)?;

    assert_eq!(a.remote_candidates.len(), 1);
    assert_eq!(a.remote_candidates[0].candidate_type(), CandidateType::Host);
    assert!(a.remote_candidates[0].last_received().is_some());
    assert_eq!(a.candidate_pairs.len(), pairs);
    assert!(a.candidate_pairs.iter().all(|p| p.remote_priority == priority));

    Ok(())
}

#[test]
fn test_handle_peer_reflexive_unknown_remote() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "192.168.0.2", 777)?;

    let mut tid = TransactionId::default();
    tid.0[..3].copy_from_slice("ABC".as_bytes());

    a.pending_binding_requests = vec![BindingRequest {
        timestamp: a.now,
        transaction_id: tid,
        destination: SocketAddr::from_str("0.0.0.0:0")?,
        is_use_candidate: false,
        is_controlling: a.is_controlling,
    }];
    a.set_remote_credentials("remoteufrag".to_owned(), "remotepwd".to_owned())?;

    let remote_addr = SocketAddr::from_str("172.17.0.3:999")?;

    let mut msg = Message::new();
    msg.build(&[
        Box::new(BINDING_SUCCESS),
        Box::new(tid),
        Box::new(MessageIntegrity::new_short_term_integrity(
            "remotepwd".to_owned(),
        )),
        Box::new(FINGERPRINT),
    ])?;

    a.handle_inbound(&mut msg, 0, remote_addr);

    assert_eq!(
        a.remote_candidates.len(),
        0,
        "unknown remote was able to create a candidate"
    );

    a.close()?;
    Ok(())
}

#[test]
fn test_inbound_validity() -> Result<()> {
    let remote = SocketAddr::from_str("172.17.0.3:999")?;

    //"Invalid Binding requests should be discarded"
    {
        let mut a = new_agent(AgentConfig::default(), "192.168.0.2", 777)?;
        a.set_remote_credentials("remoteufrag".to_owned(), "remotepwd".to_owned())?;
        let local_pwd = a.ufrag_pwd.local_credentials.pwd.clone();

        a.handle_inbound(
            &mut build_msg(CLASS_REQUEST, "invalid".to_owned(), local_pwd)?,
            0,
            remote,
        );
        assert!(
            a.remote_candidates.is_empty(),
            "Binding with invalid Username was able to create prflx candidate"
        );

        let username = format!("{}:remoteufrag", a.ufrag_pwd.local_credentials.ufrag);
        a.handle_inbound(
            &mut build_msg(CLASS_REQUEST, username, "Invalid".to_owned())?,
            0,
            remote,
        );
        assert!(
            a.remote_candidates.is_empty(),
            "Binding with invalid MessageIntegrity was able to create prflx candidate"
        );
        assert_eq!(drain_writes(&mut a), 0, "invalid requests must not be answered");

        a.close()?;
    }

    //"Invalid Binding success responses should be discarded"
    {
        let mut a = new_agent(AgentConfig::default(), "192.168.0.2", 777)?;
        a.set_remote_credentials("remoteufrag".to_owned(), "remotepwd".to_owned())?;
        let username = format!("{}:remoteufrag", a.ufrag_pwd.local_credentials.ufrag);

        a.handle_inbound(
            &mut build_msg(CLASS_SUCCESS_RESPONSE, username, "Invalid".to_owned())?,
            0,
            remote,
        );
        assert!(
            a.remote_candidates.is_empty(),
            "Binding with invalid MessageIntegrity was able to create prflx candidate"
        );

        a.close()?;
    }

    //"Discard non-binding messages"
    {
        let mut a = new_agent(AgentConfig::default(), "192.168.0.2", 777)?;
        a.set_remote_credentials("remoteufrag".to_owned(), "remotepwd".to_owned())?;
        let username = format!("{}:remoteufrag", a.ufrag_pwd.local_credentials.ufrag);
        let local_pwd = a.ufrag_pwd.local_credentials.pwd.clone();

        a.handle_inbound(
            &mut build_msg(CLASS_ERROR_RESPONSE, username, local_pwd)?,
            0,
            remote,
        );
        assert!(
            a.remote_candidates.is_empty(),
            "non-binding message was able to create prflxRemote"
        );

        a.close()?;
    }

    //"Valid bind request"
    {
        let mut a = new_agent(AgentConfig::default(), "192.168.0.2", 777)?;
        a.set_remote_credentials("remoteufrag".to_owned(), "remotepwd".to_owned())?;
        let username = format!("{}:remoteufrag", a.ufrag_pwd.local_credentials.ufrag);
        let local_pwd = a.ufrag_pwd.local_credentials.pwd.clone();

        a.handle_inbound(
            &mut build_msg(CLASS_REQUEST, username, local_pwd)?,
            0,
            remote,
        );
        assert_eq!(
            a.remote_candidates.len(),
            1,
            "Binding with valid values was unable to create prflx candidate"
        );

        a.close()?;
    }

    //"Valid bind request before the remote credentials are known"
    {
        let mut a = new_agent(AgentConfig::default(), "192.168.0.2", 777)?;
        let username = format!("{}:notyetknown", a.ufrag_pwd.local_credentials.ufrag);
        let local_pwd = a.ufrag_pwd.local_credentials.pwd.clone();

        a.handle_inbound(
            &mut build_msg(CLASS_REQUEST, username, local_pwd)?,
            0,
            remote,
        );
        assert_eq!(a.remote_candidates.len(), 1);
        assert_eq!(drain_writes(&mut a), 1, "early request must be answered");

        a.close()?;
    }

    //"Valid bind without fingerprint"
    {
        let mut a = new_agent(AgentConfig::default(), "192.168.0.2", 777)?;
        a.set_remote_credentials("remoteufrag".to_owned(), "remotepwd".to_owned())?;
        let username = format!("{}:remoteufrag", a.ufrag_pwd.local_credentials.ufrag);
        let local_pwd = a.ufrag_pwd.local_credentials.pwd.clone();

        let mut msg = Message::new();
        msg.build(&[
            Box::new(BINDING_REQUEST),
            Box::new(TransactionId::new()),
            Box::new(Username::new(ATTR_USERNAME, username)),
            Box::new(MessageIntegrity::new_short_term_integrity(local_pwd)),
        ])?;

        a.handle_inbound(&mut msg, 0, remote);
        assert_eq!(
            a.remote_candidates.len(),
            1,
            "Binding with valid values (but no fingerprint) was unable to create prflx candidate"
        );

        a.close()?;
    }

    //"Success with invalid TransactionID"
    {
        let mut a = new_agent(AgentConfig::default(), "192.168.0.2", 777)?;
        a.set_remote_credentials("remoteufrag".to_owned(), "remotepwd".to_owned())?;
        a.add_remote_candidate(host_candidate("172.17.0.3", 999)?)?;
        let pairs_before: Vec<CandidatePairState> =
            a.candidate_pairs.iter().map(|p| p.state).collect();

        let mut tid = TransactionId::default();
        tid.0[..3].copy_from_slice(b"ABC");
        let mut msg = Message::new();
        msg.build(&[
            Box::new(BINDING_SUCCESS),
            Box::new(tid),
            Box::new(MessageIntegrity::new_short_term_integrity(
                "remotepwd".to_owned(),
            )),
            Box::new(FINGERPRINT),
        ])?;

        a.handle_inbound(&mut msg, 0, remote);
        let pairs_after: Vec<CandidatePairState> =
            a.candidate_pairs.iter().map(|p| p.state).collect();
        assert_eq!(
            pairs_before, pairs_after,
            "unknown transaction must not change any pair"
        );

        a.close()?;
    }

    Ok(())
}

#[test]
fn test_invalid_agent_starts() -> Result<()> {
    let mut a = Agent::new(Arc::new(AgentConfig::default()))?;

    assert_eq!(
        a.start_connectivity_checks(true, "".to_owned(), "bar".to_owned()),
        Err(Error::ErrRemoteUfragEmpty)
    );
    assert_eq!(
        a.start_connectivity_checks(true, "foo".to_owned(), "".to_owned()),
        Err(Error::ErrRemotePwdEmpty)
    );

    a.start_connectivity_checks(true, "foo".to_owned(), "bar".to_owned())?;
    assert_eq!(
        a.start_connectivity_checks(true, "foo".to_owned(), "bar".to_owned()),
        Err(Error::ErrMultipleStart)
    );

    a.close()?;
    Ok(())
}

#[test]
fn test_lite_requires_host_candidates() -> Result<()> {
    let result = Agent::new(Arc::new(AgentConfig {
        lite: true,
        ..Default::default()
    }));
    assert!(matches!(result, Err(Error::ErrLiteUsingNonHostCandidates)));

    let result = Agent::new(Arc::new(AgentConfig {
        urls: vec![Url::parse_url("stun:1.2.3.4:3478")?],
        candidate_types: vec![CandidateType::Host],
        ..Default::default()
    }));
    assert!(matches!(result, Err(Error::ErrUselessUrlsProvided)));

    Ok(())
}

// Assert that Agent on startup sends message, and doesn't wait for the check interval to fire
#[test]
fn test_connectivity_on_startup() -> Result<()> {
    let config = AgentConfig {
        keepalive_interval: Some(Duration::from_secs(3600)),
        check_interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let mut a = new_agent(config.clone(), "192.168.0.1", 5000)?;
    let mut b = new_agent(config, "192.168.0.2", 6000)?;
    exchange_candidates(&mut a, &mut b)?;

    a.start_connectivity_checks(
        true,
        b.get_local_credentials().ufrag.clone(),
        b.get_local_credentials().pwd.clone(),
    )?;

    let Some(check) = a.poll_write() else {
        panic!("expected a connectivity check right after start");
    };
    assert!(is_message(&check.message));
    assert_eq!(check.transport.peer_addr, SocketAddr::from_str("192.168.0.2:6000")?);
    assert_eq!(connection_states(&mut a), vec![ConnectionState::Checking]);

    Ok(())
}

#[test]
fn test_connectivity_both_sides() -> Result<()> {
    let (mut a, mut b, _) = connected_pair()?;

    assert!(a.is_controlling());
    assert_eq!(b.role(), Role::Controlled);

    for agent in [&mut a, &mut b] {
        let Some((local, remote)) = agent.get_selected_candidate_pair() else {
            panic!("expected a selected pair");
        };
        assert_eq!(local.candidate_type(), CandidateType::Host);
        assert_eq!(remote.candidate_type(), CandidateType::Host);
        assert_eq!(
            connection_states(agent),
            vec![ConnectionState::Checking, ConnectionState::Connected]
        );
    }

    Ok(())
}

#[test]
fn test_application_data_round_trip() -> Result<()> {
    let (mut a, mut b, now) = connected_pair()?;

    a.handle_write(TransportMessage {
        now,
        transport: TransportContext::default(),
        message: BytesMut::from(&b"hello"[..]),
    })?;
    pump(&mut a, &mut b, now)?;

    let Some(received) = b.poll_read() else {
        panic!("expected application data");
    };
    assert_eq!(&received.message[..], b"hello");
    assert_eq!(received.transport.peer_addr, SocketAddr::from_str("192.168.0.1:5000")?);
    assert_eq!(received.transport.local_addr, SocketAddr::from_str("192.168.0.2:6000")?);
    assert!(b.poll_read().is_none(), "STUN must not surface as application data");

    Ok(())
}

#[test]
fn test_write_requires_selected_pair() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "192.168.0.1", 5000)?;
    let msg = TransportMessage {
        now: Instant::now(),
        transport: TransportContext::default(),
        message: BytesMut::from(&b"early"[..]),
    };

    assert_eq!(
        a.handle_write(msg.clone()),
        Err(Error::ErrICEConnectionNotStarted)
    );

    a.close()?;
    assert_eq!(a.handle_write(msg), Err(Error::ErrAgentClosed));
    Ok(())
}

#[test]
fn test_non_stun_from_unknown_address_is_dropped() -> Result<()> {
    let (_, mut b, now) = connected_pair()?;

    b.handle_read(TransportMessage {
        now,
        transport: TransportContext {
            local_addr: SocketAddr::from_str("192.168.0.2:6000")?,
            peer_addr: SocketAddr::from_str("10.9.9.9:1234")?,
            transport_protocol: TransportProtocol::UDP,
            ecn: None,
        },
        message: BytesMut::from(&b"stray"[..]),
    })?;
    assert!(b.poll_read().is_none());

    Ok(())
}

#[test]
fn test_connectivity_lite() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "192.168.0.1", 5000)?;
    let mut b = new_agent(
        AgentConfig {
            lite: true,
            candidate_types: vec![CandidateType::Host],
            ..Default::default()
        },
        "192.168.0.2",
        6000,
    )?;
    exchange_candidates(&mut a, &mut b)?;
    start_both(&mut a, true, &mut b, false)?;

    // a lite agent never initiates checks
    assert_eq!(drain_writes(&mut b), 0);

    let mut now = Instant::now();
    run_until_connected(&mut a, &mut b, &mut now)?;

    let Some((_, remote)) = b.get_selected_candidate_pair() else {
        panic!("expected the lite agent to select a pair");
    };
    assert_eq!(remote.addr(), SocketAddr::from_str("192.168.0.1:5000")?);

    Ok(())
}

#[test]
fn test_role_conflict_resolves_by_tie_breaker() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "192.168.0.1", 5000)?;
    let mut b = new_agent(AgentConfig::default(), "192.168.0.2", 6000)?;
    a.tie_breaker = 10;
    b.tie_breaker = 5;
    exchange_candidates(&mut a, &mut b)?;

    // both sides believe they are controlling
    start_both(&mut a, true, &mut b, true)?;

    let mut now = Instant::now();
    run_until_connected(&mut a, &mut b, &mut now)?;

    assert!(a.is_controlling(), "larger tie breaker keeps controlling");
    assert!(!b.is_controlling(), "smaller tie breaker switches role");

    Ok(())
}

#[test]
fn test_role_conflict_answered_with_487() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "192.168.0.2", 777)?;
    a.set_remote_credentials("remoteufrag".to_owned(), "remotepwd".to_owned())?;
    a.tie_breaker = 100;
    a.set_role(false);
    let username = a.ufrag_pwd.local_credentials.ufrag.clone() + ":remoteufrag";
    let local_pwd = a.ufrag_pwd.local_credentials.pwd.clone();

    // controlled peer meets a controlled request with a smaller tie breaker
    let mut msg = Message::new();
    msg.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(Username::new(ATTR_USERNAME, username.clone())),
        Box::new(AttrControlled(50)),
        Box::new(PriorityAttr(1234)),
        Box::new(MessageIntegrity::new_short_term_integrity(local_pwd.clone())),
        Box::new(FINGERPRINT),
    ])?;
    a.handle_inbound(&mut msg, 0, SocketAddr::from_str("172.17.0.3:999")?);
    assert!(a.is_controlling(), "larger tie breaker takes the controlling role");

    // controlling now, a controlling request with a smaller tie breaker is rejected
    let mut msg = Message::new();
    msg.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(Username::new(ATTR_USERNAME, username)),
        Box::new(AttrControlling(50)),
        Box::new(PriorityAttr(1234)),
        Box::new(MessageIntegrity::new_short_term_integrity(local_pwd)),
        Box::new(FINGERPRINT),
    ])?;
    drain_writes(&mut a);
    a.handle_inbound(&mut msg, 0, SocketAddr::from_str("172.17.0.3:999")?);

    let Some(answer) = a.poll_write() else {
        panic!("expected a role conflict response");
    };
    let mut response = Message::new();
    response.write(&answer.message)?;
    assert_eq!(response.typ, BINDING_ERROR);
    assert_eq!(error_code_of(&response), Some(CODE_ROLE_CONFLICT));
    assert!(a.is_controlling());

    Ok(())
}

#[test]
fn test_binding_request_timeout() -> Result<()> {
    const EXPECTED_REMOVAL_COUNT: usize = 2;

    let mut a = Agent::new(Arc::new(AgentConfig::default()))?;

    let now = a.now + Duration::from_secs(100);
    let request = |timestamp: Instant| BindingRequest {
        timestamp,
        transaction_id: TransactionId::new(),
        destination: SocketAddr::from(([0, 0, 0, 0], 0)),
        is_use_candidate: false,
        is_controlling: false,
    };
    a.pending_binding_requests = vec![
        request(now),                               // valid
        request(now - Duration::from_millis(3900)), // valid
        request(now - Duration::from_millis(4100)), // invalid
        request(now - Duration::from_secs(75)),     // invalid
    ];

    a.invalidate_pending_binding_requests(now);
    assert_eq!(
        a.pending_binding_requests.len(),
        EXPECTED_REMOVAL_COUNT,
        "Binding invalidation due to timeout did not remove the correct number of binding requests"
    );

    a.close()?;

    Ok(())
}

// test_agent_credentials checks if local username fragments and passwords (if set) meet RFC standard
#[test]
fn test_agent_credentials() -> Result<()> {
    // Agent should not require any of the usernames and password to be set
    // If set, they should follow the default 24/128 bits random number generator strategy
    let mut a = Agent::new(Arc::new(AgentConfig::default()))?;
    assert!(a.get_local_credentials().ufrag.len() * 8 >= 24);
    assert!(a.get_local_credentials().pwd.len() * 8 >= 128);
    a.close()?;

    // Should honor RFC standards
    // Local values MUST be unguessable, with at least 128 bits of
    // random number generator output used to generate the password, and
    // at least 24 bits of output to generate the username fragment.
    let result = Agent::new(Arc::new(AgentConfig {
        local_ufrag: "xx".to_owned(),
        ..Default::default()
    }));
    assert!(matches!(result, Err(Error::ErrLocalUfragInsufficientBits)));

    let result = Agent::new(Arc::new(AgentConfig {
        local_pwd: "xxxxxx".to_owned(),
        ..Default::default()
    }));
    assert!(matches!(result, Err(Error::ErrLocalPwdInsufficientBits)));

    Ok(())
}

#[test]
fn test_connection_state_connecting_to_failed() -> Result<()> {
    let config = AgentConfig {
        disconnected_timeout: Some(Duration::from_secs(1)),
        failed_timeout: Some(Duration::from_secs(1)),
        ..Default::default()
    };
    let mut a = new_agent(config.clone(), "192.168.0.1", 5000)?;
    let mut b = new_agent(config, "192.168.0.2", 6000)?;
    exchange_candidates(&mut a, &mut b)?;
    start_both(&mut a, true, &mut b, false)?;

    // nothing ever arrives
    let mut now = Instant::now();
    for _ in 0..100 {
        drain_writes(&mut a);
        drain_writes(&mut b);
        now += Duration::from_millis(100);
        a.handle_timeout(now)?;
        b.handle_timeout(now)?;
    }

    for agent in [&mut a, &mut b] {
        assert_eq!(agent.state(), ConnectionState::Failed);
        assert_eq!(agent.failure_reason(), Some(&Error::ErrAllPairsFailed));
        assert!(agent.get_selected_candidate_pair().is_none());
        assert_eq!(
            connection_states(agent),
            vec![ConnectionState::Checking, ConnectionState::Failed]
        );
    }

    Ok(())
}

#[test]
fn test_checking_without_remote_candidates_fails() -> Result<()> {
    let mut a = new_agent(
        AgentConfig {
            disconnected_timeout: Some(Duration::from_secs(1)),
            failed_timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        },
        "192.168.0.1",
        5000,
    )?;
    a.start_connectivity_checks(true, "remoteufrag".to_owned(), "remotepwd".to_owned())?;

    let mut now = Instant::now();
    for _ in 0..40 {
        now += Duration::from_millis(100);
        a.handle_timeout(now)?;
    }

    assert_eq!(a.state(), ConnectionState::Failed);
    assert_eq!(a.failure_reason(), Some(&Error::ErrNoRemoteCandidates));
    assert!(matches!(
        a.failure_reason().map(|err| err.kind()),
        Some(ErrorKind::IceFailure(_))
    ));

    Ok(())
}

#[test]
fn test_connected_to_disconnected_to_failed() -> Result<()> {
    let config = AgentConfig {
        disconnected_timeout: Some(Duration::from_secs(1)),
        failed_timeout: Some(Duration::from_secs(2)),
        keepalive_interval: Some(Duration::from_millis(500)),
        ..Default::default()
    };
    let mut a = new_agent(config.clone(), "192.168.0.1", 5000)?;
    let mut b = new_agent(config, "192.168.0.2", 6000)?;
    exchange_candidates(&mut a, &mut b)?;
    start_both(&mut a, true, &mut b, false)?;

    let mut now = Instant::now();
    run_until_connected(&mut a, &mut b, &mut now)?;
    connection_states(&mut a);

    // the path goes dark
    let mut keepalives = 0;
    for _ in 0..60 {
        keepalives += drain_writes(&mut a);
        drain_writes(&mut b);
        now += Duration::from_millis(100);
        a.handle_timeout(now)?;
    }

    assert!(keepalives > 0, "expected keepalives on the selected pair");
    assert_eq!(
        connection_states(&mut a),
        vec![ConnectionState::Disconnected, ConnectionState::Failed]
    );
    assert_eq!(a.failure_reason(), Some(&Error::ErrAllPairsFailed));
    assert!(a.get_selected_candidate_pair().is_none());

    // candidates survive the failure so a restart can reuse them
    assert!(!a.get_local_candidates().is_empty());

    Ok(())
}

#[test]
fn test_keepalive_keeps_connection_up() -> Result<()> {
    let config = AgentConfig {
        disconnected_timeout: Some(Duration::from_secs(1)),
        failed_timeout: Some(Duration::from_secs(2)),
        keepalive_interval: Some(Duration::from_millis(300)),
        ..Default::default()
    };
    let mut a = new_agent(config.clone(), "192.168.0.1", 5000)?;
    let mut b = new_agent(config, "192.168.0.2", 6000)?;
    exchange_candidates(&mut a, &mut b)?;
    start_both(&mut a, true, &mut b, false)?;

    let mut now = Instant::now();
    run_until_connected(&mut a, &mut b, &mut now)?;

    for _ in 0..100 {
        now += Duration::from_millis(100);
        a.handle_timeout(now)?;
        b.handle_timeout(now)?;
        pump(&mut a, &mut b, now)?;
    }

    assert_eq!(a.state(), ConnectionState::Connected);
    assert_eq!(b.state(), ConnectionState::Connected);

    Ok(())
}

#[test]
fn test_default_keepalive_holds_quiet_pair() -> Result<()> {
    let (mut a, mut b, mut now) = connected_pair()?;
    assert_eq!(a.keepalive_interval, Duration::from_secs(15));
    assert_eq!(a.disconnected_timeout, Duration::from_secs(30));
    connection_states(&mut a);
    connection_states(&mut b);

    // no application traffic for a minute; only keepalives cross
    let mut keepalives = 0;
    for _ in 0..120 {
        now += Duration::from_millis(500);
        a.handle_timeout(now)?;
        b.handle_timeout(now)?;
        while let Some(transmit) = a.poll_write() {
            keepalives += 1;
            deliver(&mut b, transmit, now)?;
        }
        pump(&mut a, &mut b, now)?;
    }

    assert!(
        (3..=8).contains(&keepalives),
        "unexpected keepalive count {keepalives}"
    );
    for agent in [&mut a, &mut b] {
        assert_eq!(agent.state(), ConnectionState::Connected);
        assert!(connection_states(agent).is_empty());
    }

    Ok(())
}

#[test]
fn test_invalid_gather() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "192.168.0.1", 5000)?;
    a.close()?;
    assert_eq!(a.gather_candidates(), Err(Error::ErrAgentClosed));
    Ok(())
}

#[test]
fn test_gather_without_servers_completes_immediately() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "192.168.0.1", 5000)?;
    a.gather_candidates()?;

    assert_eq!(a.gathering_state(), GatheringState::Complete);
    let mut states = vec![];
    while let Some(event) = a.poll_event() {
        if let Event::GatheringStateChange(state) = event {
            states.push(state);
        }
    }
    assert_eq!(states, vec![GatheringState::Gathering, GatheringState::Complete]);

    Ok(())
}

#[test]
fn test_gather_server_reflexive() -> Result<()> {
    let server = SocketAddr::from_str("1.2.3.4:3478")?;
    let base = SocketAddr::from_str("10.0.0.1:5000")?;
    let mapped = SocketAddr::from_str("5.6.7.8:6000")?;

    let mut a = new_agent(
        AgentConfig {
            urls: vec![Url::parse_url("stun:1.2.3.4:3478")?],
            ..Default::default()
        },
        "10.0.0.1",
        5000,
    )?;
    a.gather_candidates()?;
    assert_eq!(a.gathering_state(), GatheringState::Gathering);

    // a second gather while the first one runs is refused
    assert_eq!(a.gather_candidates(), Err(Error::ErrMultipleGatherAttempted));
    assert_eq!(
        a.restart(String::new(), String::new(), false),
        Err(Error::ErrRestartWhenGathering)
    );

    let Some(query) = a.poll_write() else {
        panic!("expected a binding request to the STUN server");
    };
    assert_eq!(query.transport.peer_addr, server);
    assert_eq!(query.transport.local_addr, base);

    let mut request = Message::new();
    request.write(&query.message)?;
    assert_eq!(request.typ, BINDING_REQUEST);

    let mut response = Message::new();
    response.build(&[
        Box::new(request),
        Box::new(BINDING_SUCCESS),
        Box::new(XorMappedAddress {
            ip: mapped.ip(),
            port: mapped.port(),
        }),
        Box::new(FINGERPRINT),
    ])?;
    a.handle_read(TransportMessage {
        now: Instant::now(),
        transport: TransportContext {
            local_addr: base,
            peer_addr: server,
            transport_protocol: TransportProtocol::UDP,
            ecn: None,
        },
        message: BytesMut::from(&response.raw[..]),
    })?;

    assert_eq!(a.gathering_state(), GatheringState::Complete);

    let mut gathered = vec![];
    while let Some(event) = a.poll_event() {
        if let Event::LocalCandidate(c) = event {
            gathered.push(c);
        }
    }
    assert_eq!(gathered.len(), 1);
    assert_eq!(gathered[0].candidate_type(), CandidateType::ServerReflexive);
    assert_eq!(gathered[0].addr(), mapped);
    let Some(related) = gathered[0].related_address() else {
        panic!("server reflexive candidate must carry its base");
    };
    assert_eq!(related.address, "10.0.0.1");
    assert_eq!(related.port, 5000);

    // srflx candidates are advertised but checks run from their base
    assert_eq!(a.get_local_candidates().len(), 2);
    a.add_remote_candidate(host_candidate("10.0.0.2", 7000)?)?;
    assert_eq!(a.candidate_pairs.len(), 1);

    Ok(())
}

#[test]
fn test_gather_unreachable_server_times_out() -> Result<()> {
    let mut a = new_agent(
        AgentConfig {
            urls: vec![Url::parse_url("stun:1.2.3.4:3478")?],
            gather_timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        },
        "10.0.0.1",
        5000,
    )?;
    a.gather_candidates()?;

    let mut now = Instant::now();
    for _ in 0..30 {
        drain_writes(&mut a);
        now += Duration::from_millis(100);
        a.handle_timeout(now)?;
    }

    assert_eq!(a.gathering_state(), GatheringState::Complete);
    assert_eq!(a.get_local_candidates().len(), 1);

    Ok(())
}

#[test]
fn test_relay_only_policy_hides_host_candidates() -> Result<()> {
    let mut a = new_agent(
        AgentConfig {
            candidate_types: vec![CandidateType::Relay],
            ..Default::default()
        },
        "10.0.0.1",
        5000,
    )?;

    assert!(a.get_local_candidates().is_empty());
    a.add_remote_candidate(host_candidate("10.0.0.2", 7000)?)?;
    assert!(a.candidate_pairs.is_empty(), "host candidates must not be paired");

    Ok(())
}

#[test]
fn test_add_remote_candidate_twice_is_noop() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "10.0.0.1", 5000)?;
    let remote = host_candidate("10.0.0.2", 7000)?;

    a.add_remote_candidate(remote.clone())?;
    a.add_remote_candidate(remote)?;
    assert_eq!(a.get_remote_candidates().len(), 1);
    assert_eq!(a.candidate_pairs.len(), 1);

    let tcp = CandidateHostConfig {
        base_config: CandidateConfig {
            network: "tcp".to_owned(),
            address: "10.0.0.3".to_owned(),
            port: 9,
            component: 1,
            ..Default::default()
        },
        tcp_type: TcpType::Active,
    }
    .new_candidate_host()?;
    a.add_remote_candidate(tcp)?;
    assert_eq!(a.get_remote_candidates().len(), 1, "TCP candidates are ignored");

    Ok(())
}

#[test]
fn test_agent_restart_when_closed() -> Result<()> {
    let mut a = Agent::new(Arc::new(AgentConfig::default()))?;
    a.close()?;

    assert_eq!(
        a.restart(String::new(), String::new(), false),
        Err(Error::ErrAgentClosed)
    );

    Ok(())
}

#[test]
fn test_agent_restart_both_side() -> Result<()> {
    let (mut a, mut b, mut now) = connected_pair()?;
    connection_states(&mut a);
    connection_states(&mut b);

    let a_credentials = a.get_local_credentials().clone();
    let b_credentials = b.get_local_credentials().clone();

    a.restart(String::new(), String::new(), true)?;
    b.restart(String::new(), String::new(), true)?;

    for agent in [&mut a, &mut b] {
        assert_eq!(agent.state(), ConnectionState::Checking);
        assert_eq!(
            connection_states(agent),
            vec![ConnectionState::Disconnected, ConnectionState::Checking]
        );
        assert!(agent.get_selected_candidate_pair().is_none());
        assert!(agent.get_remote_candidates().is_empty());
        assert!(agent.get_remote_credentials().is_none());
        assert_eq!(agent.get_local_candidates().len(), 1);
    }
    assert_ne!(a.get_local_credentials(), &a_credentials);
    assert_ne!(b.get_local_credentials(), &b_credentials);

    exchange_candidates(&mut a, &mut b)?;
    start_both(&mut a, true, &mut b, false)?;
    run_until_connected(&mut a, &mut b, &mut now)?;

    for agent in [&mut a, &mut b] {
        assert_eq!(connection_states(agent), vec![ConnectionState::Connected]);
        assert!(agent.get_selected_candidate_pair().is_some());
    }

    Ok(())
}

#[test]
fn test_agent_restart_before_selection_stays_checking() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "192.168.0.1", 5000)?;
    a.start_connectivity_checks(true, "remoteufrag".to_owned(), "remotepwd".to_owned())?;
    assert_eq!(connection_states(&mut a), vec![ConnectionState::Checking]);

    a.restart(String::new(), String::new(), true)?;
    assert_eq!(a.state(), ConnectionState::Checking);
    assert!(connection_states(&mut a).is_empty());

    Ok(())
}

#[test]
fn test_agent_restart_with_fixed_credentials() -> Result<()> {
    let mut a = new_agent(AgentConfig::default(), "10.0.0.1", 5000)?;
    a.restart("ufragufrag".to_owned(), "pwdpwdpwdpwdpwdpwdpwd".to_owned(), false)?;

    assert_eq!(
        a.get_local_credentials(),
        &Credentials {
            ufrag: "ufragufrag".to_owned(),
            pwd: "pwdpwdpwdpwdpwdpwdpwd".to_owned(),
        }
    );
    assert!(a.get_local_candidates().is_empty());
    assert_eq!(a.gathering_state(), GatheringState::New);

    Ok(())
}

#[test]
fn test_get_remote_credentials() -> Result<()> {
    let mut a = Agent::new(Arc::new(AgentConfig::default()))?;
    assert!(a.get_remote_credentials().is_none());

    a.set_remote_credentials("remoteUfrag".to_owned(), "remotePwd".to_owned())?;

    let Some(credentials) = a.get_remote_credentials() else {
        panic!("expected remote credentials");
    };
    assert_eq!(credentials.ufrag, "remoteUfrag");
    assert_eq!(credentials.pwd, "remotePwd");

    a.close()?;
    Ok(())
}

#[test]
fn test_close_clears_state() -> Result<()> {
    let (mut a, _, now) = connected_pair()?;
    connection_states(&mut a);

    a.close()?;
    assert_eq!(a.state(), ConnectionState::Closed);
    assert_eq!(connection_states(&mut a), vec![ConnectionState::Closed]);
    assert!(a.get_selected_candidate_pair().is_none());
    assert!(a.poll_timeout().is_none());

    // reads after close are ignored
    a.handle_read(TransportMessage {
        now,
        transport: TransportContext {
            local_addr: SocketAddr::from_str("192.168.0.1:5000")?,
            peer_addr: SocketAddr::from_str("192.168.0.2:6000")?,
            transport_protocol: TransportProtocol::UDP,
            ecn: None,
        },
        message: BytesMut::from(&b"late"[..]),
    })?;
    assert!(a.poll_read().is_none());

    // closing twice is fine
    a.close()?;
    Ok(())
}
