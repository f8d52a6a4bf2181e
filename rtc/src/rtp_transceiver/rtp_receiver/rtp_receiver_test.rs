use interceptor::Registry;

use super::*;
use crate::peer_connection::configuration::interceptor_registry::{
    FLEXFEC_PAYLOAD_TYPE, configure_flexfec,
};
use crate::peer_connection::configuration::media_engine::{MIME_TYPE_VP8, MediaEngine};
use crate::peer_connection::sdp::TrackDetails;
use crate::rtp_transceiver::rtp_sender::RtpCodecKind;

fn details(ssrc: SSRC, fec_ssrc: Option<SSRC>) -> TrackDetails {
    TrackDetails {
        mid: "0".to_owned(),
        kind: RtpCodecKind::Video,
        stream_id: "stream".to_owned(),
        track_id: "video".to_owned(),
        ssrc,
        rtx_ssrc: None,
        fec_ssrc,
    }
}

#[test]
fn test_receiver_start_binds_first_media_codec() -> Result<()> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let mut interceptor = NoopInterceptor::new();

    let mut receiver = RTCRtpReceiverInternal::new(RtpCodecKind::Video);
    assert!(!receiver.is_started());

    receiver.start(&details(1234, Some(5678)), &media_engine, &mut interceptor)?;
    assert!(receiver.is_started());
    assert!(receiver.has_ssrc(1234));
    // no flexfec codec registered, the repair flow is ignored
    assert!(!receiver.has_ssrc(5678));

    let track = receiver.track.clone().unwrap_or_default();
    assert_eq!(track.stream_id(), "stream");
    assert_eq!(track.track_id(), "video");
    assert_eq!(track.codec().mime_type, MIME_TYPE_VP8);
    assert!(!receiver.track_opened);

    Ok(())
}

#[test]
fn test_receiver_start_with_flexfec() -> Result<()> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let mut interceptor = configure_flexfec(Registry::new(), &mut media_engine)?.build();

    let mut receiver = RTCRtpReceiverInternal::new(RtpCodecKind::Video);
    receiver.start(&details(1234, Some(5678)), &media_engine, &mut interceptor)?;

    assert!(receiver.has_ssrc(5678));
    let stream_info = receiver.stream_info.clone().unwrap_or_default();
    assert_eq!(stream_info.ssrc, 1234);
    assert_eq!(stream_info.ssrc_fec, Some(5678));
    assert_eq!(stream_info.payload_type_fec, Some(FLEXFEC_PAYLOAD_TYPE));

    Ok(())
}

#[test]
fn test_receiver_restart_on_new_ssrc() -> Result<()> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let mut interceptor = NoopInterceptor::new();

    let mut receiver = RTCRtpReceiverInternal::new(RtpCodecKind::Video);
    receiver.start(&details(1, None), &media_engine, &mut interceptor)?;
    receiver.track_opened = true;

    // same ssrc keeps the opened track
    receiver.start(&details(1, None), &media_engine, &mut interceptor)?;
    assert!(receiver.track_opened);

    receiver.start(&details(2, None), &media_engine, &mut interceptor)?;
    assert!(!receiver.track_opened);
    assert!(receiver.has_ssrc(2));
    assert!(!receiver.has_ssrc(1));

    receiver.stop(&mut interceptor);
    assert!(!receiver.is_started());
    assert!(receiver.track.as_ref().is_some_and(|t| t.ended()));

    Ok(())
}
