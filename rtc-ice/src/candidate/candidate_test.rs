use super::*;

fn host(network: &str, address: &str, port: u16, tcp_type: TcpType) -> Result<Candidate> {
    CandidateHostConfig {
        base_config: CandidateConfig {
            network: network.to_owned(),
            address: address.to_owned(),
            port,
            component: COMPONENT_RTP,
            ..Default::default()
        },
        tcp_type,
    }
    .new_candidate_host()
}

#[test]
fn test_candidate_priority() -> Result<()> {
    let tests = vec![
        (host("udp", "192.168.0.1", 1234, TcpType::Unspecified)?, 2130706431),
        (
            host("tcp", "192.168.0.1", 0, TcpType::Active)?,
            2113929216 + 57343 * 256 + 255,
        ),
        (
            host("tcp", "192.168.0.1", 0, TcpType::Passive)?,
            2113929216 + 40959 * 256 + 255,
        ),
        (
            host("tcp", "192.168.0.1", 0, TcpType::SimultaneousOpen)?,
            2113929216 + 24575 * 256 + 255,
        ),
        (
            CandidatePeerReflexiveConfig {
                base_config: CandidateConfig {
                    network: "udp".to_owned(),
                    address: "10.0.0.1".to_owned(),
                    component: COMPONENT_RTP,
                    ..Default::default()
                },
                ..Default::default()
            }
            .new_candidate_peer_reflexive()?,
            1862270975,
        ),
        (
            CandidateServerReflexiveConfig {
                base_config: CandidateConfig {
                    network: "udp".to_owned(),
                    address: "10.0.0.1".to_owned(),
                    component: COMPONENT_RTP,
                    ..Default::default()
                },
                ..Default::default()
            }
            .new_candidate_server_reflexive()?,
            1694498815,
        ),
        (
            CandidateRelayConfig {
                base_config: CandidateConfig {
                    network: "udp".to_owned(),
                    address: "10.0.0.1".to_owned(),
                    component: COMPONENT_RTP,
                    ..Default::default()
                },
                ..Default::default()
            }
            .new_candidate_relay()?,
            16777215,
        ),
    ];

    for (candidate, want) in tests {
        let got = candidate.priority();
        assert_eq!(
            got, want,
            "Candidate({candidate}).Priority() = {got}, want {want}"
        );
    }

    Ok(())
}

#[test]
fn test_candidate_last_sent() -> Result<()> {
    let mut candidate = host("udp", "192.168.0.1", 1234, TcpType::Unspecified)?;
    assert_eq!(candidate.last_sent(), None);
    assert_eq!(candidate.last_received(), None);

    let now = Instant::now();
    candidate.seen(true, now);
    assert_eq!(candidate.last_sent(), Some(now));
    assert_eq!(candidate.last_received(), None);

    candidate.seen(false, now);
    assert_eq!(candidate.last_received(), Some(now));

    Ok(())
}

#[test]
fn test_candidate_foundation() -> Result<()> {
    assert_eq!(
        host("udp", "A", 0, TcpType::Unspecified)
            .map(|c| c.foundation())
            .ok(),
        None,
        "hostnames are not resolved"
    );

    assert_eq!(
        host("udp", "192.168.0.1", 1, TcpType::Unspecified)?.foundation(),
        host("udp", "192.168.0.1", 2, TcpType::Unspecified)?.foundation(),
        "port does not take part in the foundation"
    );

    // Different Address
    assert_ne!(
        host("udp", "192.168.0.1", 1, TcpType::Unspecified)?.foundation(),
        host("udp", "192.168.0.2", 1, TcpType::Unspecified)?.foundation(),
    );

    // Different networkType
    assert_ne!(
        host("udp", "192.168.0.1", 1, TcpType::Unspecified)?.foundation(),
        host("udp", "fe80::1", 1, TcpType::Unspecified)?.foundation(),
    );

    // Different candidateType
    let srflx = CandidateServerReflexiveConfig {
        base_config: CandidateConfig {
            network: "udp".to_owned(),
            address: "192.168.0.1".to_owned(),
            port: 1,
            component: COMPONENT_RTP,
            ..Default::default()
        },
        ..Default::default()
    }
    .new_candidate_server_reflexive()?;
    assert_ne!(
        host("udp", "192.168.0.1", 1, TcpType::Unspecified)?.foundation(),
        srflx.foundation(),
    );

    // Explicit foundation wins
    let overridden = CandidateHostConfig {
        base_config: CandidateConfig {
            network: "udp".to_owned(),
            address: "192.168.0.1".to_owned(),
            foundation: "abc".to_owned(),
            ..Default::default()
        },
        ..Default::default()
    }
    .new_candidate_host()?;
    assert_eq!(overridden.foundation(), "abc");

    Ok(())
}

#[test]
fn test_candidate_marshal() -> Result<()> {
    let tests = vec![
        (
            "4207374051 1 udp 2130706431 10.0.75.1 53634 typ host",
            CandidateType::Host,
            NetworkType::Udp4,
            None,
            TcpType::Unspecified,
            "4207374051 1 udp 2130706431 10.0.75.1 53634 typ host",
        ),
        (
            "4207374051 1 udp 2130706431 fcd9:e3b8:12ce:9fc5:74a5:c6bb:d8b:e08a 53987 typ host",
            CandidateType::Host,
            NetworkType::Udp6,
            None,
            TcpType::Unspecified,
            "4207374051 1 udp 2130706431 fcd9:e3b8:12ce:9fc5:74a5:c6bb:d8b:e08a 53987 typ host",
        ),
        (
            "candidate:842163049 1 udp 1677729535 8.8.8.8 56031 typ srflx raddr 192.168.0.2 rport 56031 generation 0",
            CandidateType::ServerReflexive,
            NetworkType::Udp4,
            Some(CandidateRelatedAddress {
                address: "192.168.0.2".to_owned(),
                port: 56031,
            }),
            TcpType::Unspecified,
            "842163049 1 udp 1677729535 8.8.8.8 56031 typ srflx raddr 192.168.0.2 rport 56031",
        ),
        (
            "848194626 1 udp 16777215 50.0.0.1 5000 typ relay raddr 192.168.0.1 rport 5001",
            CandidateType::Relay,
            NetworkType::Udp4,
            Some(CandidateRelatedAddress {
                address: "192.168.0.1".to_owned(),
                port: 5001,
            }),
            TcpType::Unspecified,
            "848194626 1 udp 16777215 50.0.0.1 5000 typ relay raddr 192.168.0.1 rport 5001",
        ),
        (
            "1052353102 1 tcp 2128609279 192.168.0.196 0 typ host tcptype active",
            CandidateType::Host,
            NetworkType::Tcp4,
            None,
            TcpType::Active,
            "1052353102 1 tcp 2128609279 192.168.0.196 0 typ host tcptype active",
        ),
    ];

    for (raw, candidate_type, network_type, related_address, tcp_type, marshaled) in tests {
        let c = unmarshal_candidate(raw)?;
        assert_eq!(c.candidate_type(), candidate_type, "{raw}");
        assert_eq!(c.network_type(), network_type, "{raw}");
        assert_eq!(c.related_address(), related_address, "{raw}");
        assert_eq!(c.tcp_type(), tcp_type, "{raw}");
        assert_eq!(c.marshal(), marshaled, "{raw}");

        let again = unmarshal_candidate(&c.marshal())?;
        assert!(c.equal(&again), "{raw} did not survive a round trip");
        assert_eq!(c.priority(), again.priority());
        assert_eq!(c.foundation(), again.foundation());
    }

    Ok(())
}

#[test]
fn test_candidate_unmarshal_failure() {
    let tests = vec![
        "",
        "1938809241",
        "1986380506 99999999 udp 2122063615 10.0.75.1 53634 typ host generation 0",
        "1986380506 1 udp 99999999999 10.0.75.1 53634 typ host",
        "4207374051 1 udp 2130706431 10.0.75.1 99999999 typ host",
        "4207374051 1 udp 2130706431 10.0.75.1 53634 host host",
        "4207374051 1 udp 2130706431 10.0.75.1 53634 typ srflx raddr",
        "4207374051 1 udp 2130706431 10.0.75.1 53634 typ srflx raddr 10.0.0.1 rport abc",
        "4207374051 1 udp 2130706431 10.0.75.1 53634 typ unknown",
        "4207374051 1 udp 2130706431 abc.local 53634 typ host",
        "4207374051 1 sctp 2130706431 10.0.75.1 53634 typ host",
    ];

    for raw in tests {
        assert!(
            unmarshal_candidate(raw).is_err(),
            "expected {raw:?} to fail to unmarshal"
        );
    }
}

#[test]
fn test_candidate_type_serialization() -> Result<()> {
    let tests = vec![
        (CandidateType::Unspecified, "\"unspecified\""),
        (CandidateType::Host, "\"host\""),
        (CandidateType::ServerReflexive, "\"srflx\""),
        (CandidateType::PeerReflexive, "\"prflx\""),
        (CandidateType::Relay, "\"relay\""),
    ];

    for (candidate_type, expected_string) in tests {
        let s = serde_json::to_string(&candidate_type).map_err(|e| Error::Other(e.to_string()))?;
        assert_eq!(s, expected_string);
        let back: CandidateType =
            serde_json::from_str(&s).map_err(|e| Error::Other(e.to_string()))?;
        assert_eq!(back, candidate_type);
    }

    Ok(())
}
