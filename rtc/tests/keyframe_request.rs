/// A Picture Loss Indication sent by the receiving side flags the remote
/// sender, and the next sample it writes arrives right away.
mod common;

use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use bytes::Bytes;
use rtc::media_stream::Sample;
use rtc::media_stream::track::MediaStreamTrack;
use rtc::peer_connection::configuration::RTCConfigurationBuilder;
use rtc::peer_connection::configuration::media_engine::{MIME_TYPE_VP8, MediaEngine};
use rtc::peer_connection::event::{RTCPeerConnectionEvent, RTCTrackEvent};
use rtc::rtp_transceiver::rtp_sender::{RTCRtpCodec, RtpCodecKind};
use rtc::shared::error::Result;

use common::{ANSWERER_ADDR, OFFERER_ADDR, Peer, connect, init_logger, run_until};

const KEYFRAME_DEADLINE: Duration = Duration::from_millis(100);

fn config() -> Result<rtc::peer_connection::configuration::RTCConfiguration> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    Ok(RTCConfigurationBuilder::new()
        .with_media_engine(media_engine)
        .build())
}

fn sample(len: usize) -> Sample {
    Sample {
        data: Bytes::from(vec![0x10; len]),
        duration: Duration::from_millis(33),
        ..Default::default()
    }
}

#[test]
fn test_picture_loss_indication_requests_keyframe() -> Result<()> {
    init_logger();

    let mut offerer = Peer::new("offerer", config()?, OFFERER_ADDR)?;
    let mut answerer = Peer::new("answerer", config()?, ANSWERER_ADDR)?;

    let sender_id = offerer.pc.add_track(MediaStreamTrack::new(
        "stream".to_owned(),
        "camera".to_owned(),
        "camera".to_owned(),
        RtpCodecKind::Video,
        RTCRtpCodec {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            ..Default::default()
        },
    ))?;

    let mut now = Instant::now();
    connect(&mut offerer, &mut answerer, &mut now)?;

    log::info!("sending the first frame");
    offerer
        .pc
        .rtp_sender(sender_id)
        .expect("sender")
        .write_sample(&sample(500))?;

    let got_track = run_until(
        &mut offerer,
        &mut answerer,
        &mut now,
        Duration::from_secs(2),
        |_, a| {
            Ok(a
                .events
                .iter()
                .any(|event| matches!(event, RTCPeerConnectionEvent::OnTrack(_))))
        },
    )?;
    assert!(got_track, "answerer never saw the remote track");

    let track_event = answerer
        .events
        .iter()
        .find_map(|event| match event {
            RTCPeerConnectionEvent::OnTrack(track_event) => Some(track_event.clone()),
            _ => None,
        })
        .expect("OnTrack");
    assert_matches!(&track_event, RTCTrackEvent { stream_ids, .. } if stream_ids == &vec!["stream".to_owned()]);
    assert_eq!(track_event.track_id, "camera");

    assert!(
        !offerer
            .pc
            .rtp_sender(sender_id)
            .expect("sender")
            .keyframe_requested()
    );

    log::info!("answerer requests a keyframe");
    answerer
        .pc
        .rtp_receiver(track_event.receiver_id)
        .expect("receiver")
        .request_keyframe()?;

    let requested = run_until(
        &mut offerer,
        &mut answerer,
        &mut now,
        Duration::from_secs(1),
        |o, _| Ok(o.pc.rtp_sender(sender_id).expect("sender").keyframe_requested()),
    )?;
    assert!(requested, "PLI never reached the sender");

    let requested_at = now;
    let packets_before = answerer.rtp_packets().count();
    offerer
        .pc
        .rtp_sender(sender_id)
        .expect("sender")
        .write_sample(&sample(3000))?;
    assert!(
        !offerer
            .pc
            .rtp_sender(sender_id)
            .expect("sender")
            .keyframe_requested()
    );

    let delivered = run_until(
        &mut offerer,
        &mut answerer,
        &mut now,
        KEYFRAME_DEADLINE,
        |_, a| Ok(a.rtp_packets().count() > packets_before),
    )?;
    assert!(delivered, "keyframe did not arrive");
    assert!(now - requested_at <= KEYFRAME_DEADLINE);
    Ok(())
}
