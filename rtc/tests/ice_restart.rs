/// Renegotiating with an ICE restart swaps the ICE credentials of both
/// sides and nominates a fresh candidate pair. The connection passes
/// through Disconnected and Connecting while the DTLS and SCTP associations,
/// and with them the open data channel, carry on.
mod common;

use std::time::{Duration, Instant};

use rtc::peer_connection::configuration::RTCConfigurationBuilder;
use rtc::peer_connection::configuration::offer_answer_options::RTCOfferOptions;
use rtc::peer_connection::event::RTCPeerConnectionEvent;
use rtc::peer_connection::state::{
    RTCIceConnectionState, RTCPeerConnectionState, RTCSignalingState,
};
use rtc::shared::error::Result;

use common::{ANSWERER_ADDR, OFFERER_ADDR, Peer, connect, init_logger, negotiate, run_until};

fn ice_credentials(sdp: &str) -> (String, String) {
    let attribute = |name: &str| {
        sdp.lines()
            .find_map(|line| line.strip_prefix(name))
            .map(|value| value.trim().to_owned())
            .unwrap_or_default()
    };
    (attribute("a=ice-ufrag:"), attribute("a=ice-pwd:"))
}

fn ice_connection_states<I: rtc::interceptor::Interceptor>(
    peer: &Peer<I>,
) -> Vec<RTCIceConnectionState> {
    peer.events
        .iter()
        .filter_map(|event| match event {
            RTCPeerConnectionEvent::OnIceConnectionStateChangeEvent(state) => Some(*state),
            _ => None,
        })
        .collect()
}

fn fingerprint(sdp: &str) -> String {
    sdp.lines()
        .find(|line| line.starts_with("a=fingerprint:"))
        .unwrap_or_default()
        .to_owned()
}

#[test]
fn test_ice_restart_keeps_dtls() -> Result<()> {
    init_logger();

    let mut offerer = Peer::new(
        "offerer",
        RTCConfigurationBuilder::new().build(),
        OFFERER_ADDR,
    )?;
    let mut answerer = Peer::new(
        "answerer",
        RTCConfigurationBuilder::new().build(),
        ANSWERER_ADDR,
    )?;

    let id = offerer.pc.create_data_channel("control", None)?.id();

    let mut now = Instant::now();
    connect(&mut offerer, &mut answerer, &mut now)?;
    let opened = run_until(
        &mut offerer,
        &mut answerer,
        &mut now,
        Duration::from_secs(5),
        |_, a| Ok(a.opened_data_channels().contains(&id)),
    )?;
    assert!(opened);

    let first_offer = offerer
        .pc
        .current_local_description()
        .expect("offer")
        .sdp
        .clone();
    let first_answer = answerer
        .pc
        .current_local_description()
        .expect("answer")
        .sdp
        .clone();

    assert!(offerer.pc.selected_candidate_pair().is_some());
    assert!(answerer.pc.selected_candidate_pair().is_some());

    log::info!("renegotiating with an ice restart");
    offerer.events.clear();
    answerer.events.clear();
    negotiate(
        &mut offerer,
        &mut answerer,
        Some(RTCOfferOptions { ice_restart: true }),
    )?;
    assert_eq!(offerer.pc.signaling_state(), RTCSignalingState::Stable);
    assert_eq!(answerer.pc.signaling_state(), RTCSignalingState::Stable);
    assert!(offerer.pc.selected_candidate_pair().is_none());
    assert!(answerer.pc.selected_candidate_pair().is_none());

    let second_offer = offerer
        .pc
        .current_local_description()
        .expect("offer")
        .sdp
        .clone();
    let second_answer = answerer
        .pc
        .current_local_description()
        .expect("answer")
        .sdp
        .clone();

    let (old_ufrag, old_pwd) = ice_credentials(&first_offer);
    let (new_ufrag, new_pwd) = ice_credentials(&second_offer);
    assert_ne!(old_ufrag, new_ufrag);
    assert_ne!(old_pwd, new_pwd);
    assert_ne!(ice_credentials(&first_answer), ice_credentials(&second_answer));
    assert_eq!(fingerprint(&first_offer), fingerprint(&second_offer));
    assert_eq!(fingerprint(&first_answer), fingerprint(&second_answer));

    let reconnected = run_until(
        &mut offerer,
        &mut answerer,
        &mut now,
        Duration::from_secs(10),
        |o, a| {
            Ok(o.connection_states().last() == Some(&RTCPeerConnectionState::Connected)
                && a.connection_states().last() == Some(&RTCPeerConnectionState::Connected))
        },
    )?;
    assert!(reconnected, "ice did not reconnect");
    for peer in [&offerer, &answerer] {
        assert_eq!(
            peer.connection_states(),
            vec![
                RTCPeerConnectionState::Disconnected,
                RTCPeerConnectionState::Connecting,
                RTCPeerConnectionState::Connected
            ],
            "{}",
            peer.name
        );
        assert_eq!(
            ice_connection_states(peer),
            vec![
                RTCIceConnectionState::Disconnected,
                RTCIceConnectionState::Checking,
                RTCIceConnectionState::Connected
            ],
            "{}",
            peer.name
        );
    }
    assert!(offerer.pc.selected_candidate_pair().is_some());
    assert!(answerer.pc.selected_candidate_pair().is_some());

    log::info!("data channel survives the restart");
    offerer
        .pc
        .data_channel(id)
        .expect("offerer channel")
        .send_text("after restart")?;
    let delivered = run_until(
        &mut offerer,
        &mut answerer,
        &mut now,
        Duration::from_secs(5),
        |_, a| Ok(a.data_channel_messages(id).any(|m| m.data == "after restart")),
    )?;
    assert!(delivered);
    assert!(answerer.opened_data_channels().is_empty());

    assert!(offerer.errors.is_empty(), "{:?}", offerer.errors);
    assert!(answerer.errors.is_empty(), "{:?}", answerer.errors);
    Ok(())
}
