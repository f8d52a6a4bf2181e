use assert_matches::assert_matches;
use interceptor::{NoopInterceptor, Registry};

use super::*;
use crate::peer_connection::configuration::interceptor_registry::{
    FLEXFEC_PAYLOAD_TYPE, configure_flexfec,
};
use crate::peer_connection::configuration::media_engine::{
    MIME_TYPE_OPUS, MIME_TYPE_VP8, MIME_TYPE_VP9, MediaEngine,
};

fn track(kind: RtpCodecKind, mime_type: &str, clock_rate: u32) -> MediaStreamTrack {
    MediaStreamTrack::new(
        "stream".to_owned(),
        format!("{kind}"),
        format!("{kind}"),
        kind,
        RTCRtpCodec {
            mime_type: mime_type.to_owned(),
            clock_rate,
            ..Default::default()
        },
    )
}

#[test]
fn test_sender_ssrcs() {
    let audio = RTCRtpSenderInternal::new(RtpCodecKind::Audio, None);
    assert!(audio.ssrc_fec.is_none());
    assert!(!audio.is_started());

    let video = RTCRtpSenderInternal::new(RtpCodecKind::Video, None);
    assert!(video.ssrc_fec.is_some());
}

#[test]
fn test_sender_start_without_track() -> Result<()> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let mut interceptor = NoopInterceptor::new();

    let mut sender = RTCRtpSenderInternal::new(RtpCodecKind::Audio, None);
    sender.start(&media_engine, &mut interceptor)?;
    assert!(!sender.is_started());

    Ok(())
}

#[test]
fn test_sender_start_opus() -> Result<()> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let mut interceptor = NoopInterceptor::new();

    let mut sender = RTCRtpSenderInternal::new(
        RtpCodecKind::Audio,
        Some(track(RtpCodecKind::Audio, MIME_TYPE_OPUS, 48000)),
    );
    sender.start(&media_engine, &mut interceptor)?;

    assert!(sender.is_started());
    assert!(sender.packetizer.is_some());
    assert_eq!(sender.send_codec.as_ref().map(|c| c.payload_type), Some(111));
    assert_eq!(sender.payload_type_fec, None);

    let stream_info = sender.stream_info.clone().unwrap_or_default();
    assert_eq!(stream_info.ssrc, sender.ssrc);
    assert_eq!(stream_info.ssrc_fec, None);
    assert_eq!(stream_info.clock_rate, 48000);

    sender.stop(&mut interceptor);
    assert!(!sender.is_started());
    assert!(sender.packetizer.is_none());

    Ok(())
}

#[test]
fn test_sender_start_vp8_with_flexfec() -> Result<()> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let mut interceptor = configure_flexfec(Registry::new(), &mut media_engine)?.build();

    let mut sender = RTCRtpSenderInternal::new(
        RtpCodecKind::Video,
        Some(track(RtpCodecKind::Video, MIME_TYPE_VP8, 90000)),
    );
    sender.start(&media_engine, &mut interceptor)?;

    assert_eq!(sender.send_codec.as_ref().map(|c| c.payload_type), Some(96));
    assert_eq!(sender.payload_type_fec, Some(FLEXFEC_PAYLOAD_TYPE));
    let stream_info = sender.stream_info.clone().unwrap_or_default();
    assert_eq!(stream_info.ssrc_fec, sender.ssrc_fec);
    assert_eq!(stream_info.payload_type_fec, Some(FLEXFEC_PAYLOAD_TYPE));

    Ok(())
}

#[test]
fn test_sender_start_without_payloader() -> Result<()> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let mut interceptor = NoopInterceptor::new();

    let mut sender = RTCRtpSenderInternal::new(
        RtpCodecKind::Video,
        Some(track(RtpCodecKind::Video, MIME_TYPE_VP9, 90000)),
    );
    sender.start(&media_engine, &mut interceptor)?;

    assert!(sender.is_started());
    assert!(sender.packetizer.is_none());

    Ok(())
}

#[test]
fn test_sender_start_unknown_codec() -> Result<()> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let mut interceptor = NoopInterceptor::new();

    let mut sender = RTCRtpSenderInternal::new(
        RtpCodecKind::Audio,
        Some(track(RtpCodecKind::Audio, "audio/speex", 16000)),
    );
    assert_matches!(
        sender.start(&media_engine, &mut interceptor),
        Err(Error::ErrCodecNotFound)
    );
    assert!(!sender.is_started());

    Ok(())
}

#[test]
fn test_failed_write_keeps_keyframe_request() -> Result<()> {
    use std::time::Duration;

    use bytes::Bytes;

    use crate::peer_connection::configuration::RTCConfigurationBuilder;

    let config = || -> Result<_> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        Ok(RTCConfigurationBuilder::new()
            .with_media_engine(media_engine)
            .build())
    };
    let mut offerer = RTCPeerConnection::new(config()?)?;
    let mut answerer = RTCPeerConnection::new(config()?)?;

    let sender_id = offerer.add_track(track(RtpCodecKind::Video, MIME_TYPE_VP8, 90000))?;
    let offer = offerer.create_offer(None)?;
    offerer.set_local_description(offer.clone())?;
    answerer.set_remote_description(offer)?;
    let answer = answerer.create_answer(None)?;
    answerer.set_local_description(answer.clone())?;
    offerer.set_remote_description(answer)?;

    let index = sender_id.0;
    assert!(offerer.rtp_transceivers[index].sender.is_started());
    offerer.rtp_transceivers[index].sender.keyframe_requested = true;

    let sample = Sample {
        data: Bytes::from(vec![0x10; 3000]),
        duration: Duration::from_millis(33),
        ..Default::default()
    };

    // Without a send codec the packets cannot be stamped and the write fails.
    let send_codec = offerer.rtp_transceivers[index].sender.send_codec.take();
    {
        let mut sender = offerer.rtp_sender(sender_id).expect("sender");
        assert_matches!(
            sender.write_sample(&sample),
            Err(Error::ErrSenderWithNoCodecs)
        );
        assert!(sender.keyframe_requested());
    }

    offerer.rtp_transceivers[index].sender.send_codec = send_codec;
    let mut sender = offerer.rtp_sender(sender_id).expect("sender");
    sender.write_sample(&sample)?;
    assert!(!sender.keyframe_requested());

    Ok(())
}
