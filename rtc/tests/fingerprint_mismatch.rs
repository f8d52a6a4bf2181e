/// The DTLS certificate of the remote must match the fingerprint of its
/// description. A single altered hex digit fails the connection.
mod common;

use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use rtc::media_stream::track::MediaStreamTrack;
use rtc::peer_connection::configuration::RTCConfigurationBuilder;
use rtc::peer_connection::configuration::media_engine::{MIME_TYPE_OPUS, MediaEngine};
use rtc::peer_connection::event::{RTCDataChannelEvent, RTCPeerConnectionEvent};
use rtc::peer_connection::sdp::RTCSessionDescription;
use rtc::peer_connection::state::RTCPeerConnectionState;
use rtc::rtp_transceiver::rtp_sender::{RTCRtpCodec, RtpCodecKind};
use rtc::shared::error::{Error, Result};

use common::{ANSWERER_ADDR, OFFERER_ADDR, Peer, init_logger, run_until};

/// Flips the last hex digit of every fingerprint line.
fn alter_fingerprint(sdp: &str) -> String {
    sdp.lines()
        .map(|line| {
            if line.starts_with("a=fingerprint:") {
                let mut altered = line.to_owned();
                let last = altered.pop().unwrap_or('0');
                altered.push(if last == '0' { '1' } else { '0' });
                altered
            } else {
                line.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\r\n")
        + "\r\n"
}

fn config() -> Result<rtc::peer_connection::configuration::RTCConfiguration> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    Ok(RTCConfigurationBuilder::new()
        .with_media_engine(media_engine)
        .build())
}

#[test]
fn test_fingerprint_mismatch_fails_connection() -> Result<()> {
    init_logger();

    let mut offerer = Peer::new("offerer", config()?, OFFERER_ADDR)?;
    let mut answerer = Peer::new("answerer", config()?, ANSWERER_ADDR)?;

    offerer.pc.create_data_channel("data", None)?;
    answerer.pc.add_track(MediaStreamTrack::new(
        "stream".to_owned(),
        "microphone".to_owned(),
        "microphone".to_owned(),
        RtpCodecKind::Audio,
        RTCRtpCodec {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            ..Default::default()
        },
    ))?;
    offerer.pc.add_transceiver_from_kind(RtpCodecKind::Audio, None)?;

    let offer = offerer.pc.create_offer(None)?;
    offerer.pc.set_local_description(offer.clone())?;
    answerer.pc.set_remote_description(offer)?;

    let answer = answerer.pc.create_answer(None)?;
    answerer.pc.set_local_description(answer.clone())?;

    let altered = alter_fingerprint(&answer.sdp);
    assert_ne!(altered, answer.sdp);
    log::info!("handing the offerer an answer with an altered fingerprint");
    offerer
        .pc
        .set_remote_description(RTCSessionDescription::answer(altered)?)?;

    let mut now = Instant::now();
    let failed = run_until(
        &mut offerer,
        &mut answerer,
        &mut now,
        Duration::from_secs(10),
        |o, _| Ok(o.pc.connection_state() == RTCPeerConnectionState::Failed),
    )?;
    assert!(failed, "offerer is {}", offerer.pc.connection_state());
    assert_eq!(
        offerer.connection_states().last(),
        Some(&RTCPeerConnectionState::Failed)
    );
    assert!(
        !offerer
            .connection_states()
            .contains(&RTCPeerConnectionState::Connected)
    );

    assert!(!offerer.errors.is_empty());
    for err in &offerer.errors {
        assert_matches!(err, Error::ErrNoMatchingCertificateFingerprint);
    }

    for events in [&offerer.events, &answerer.events] {
        assert!(!events.iter().any(|event| matches!(
            event,
            RTCPeerConnectionEvent::OnTrack(_)
                | RTCPeerConnectionEvent::OnDataChannel(RTCDataChannelEvent::OnOpen(_))
        )));
    }
    Ok(())
}
