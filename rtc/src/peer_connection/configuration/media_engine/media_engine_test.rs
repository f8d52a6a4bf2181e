use std::io::Cursor;

use assert_matches::assert_matches;

use super::*;

const SDP_MID_EXTENSION_URI: &str = "urn:ietf:params:rtp-hdrext:sdes:mid";
const AUDIO_LEVEL_URI: &str = "urn:ietf:params:rtp-hdrext:ssrc-audio-level";

fn session(media: &str) -> Result<SessionDescription> {
    let raw = format!(
        "v=0\r\n\
o=- 4596489990601351948 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
{media}"
    );
    Ok(SessionDescription::unmarshal(&mut Cursor::new(
        raw.as_bytes(),
    ))?)
}

fn default_media_engine() -> Result<MediaEngine> {
    let mut m = MediaEngine::default();
    m.register_default_codecs()?;
    Ok(m)
}

#[test]
fn test_media_engine_no_media() -> Result<()> {
    let mut m = default_media_engine()?;
    m.update_from_remote_description(&session("")?)?;

    assert!(!m.negotiated_video);
    assert!(!m.negotiated_audio);
    // registered codecs are used until a section of that kind is negotiated
    assert_eq!(m.get_codec_by_payload(111)?.1, RtpCodecKind::Audio);

    Ok(())
}

#[test]
fn test_media_engine_remote_payload_type_wins() -> Result<()> {
    let mut m = default_media_engine()?;
    m.update_from_remote_description(&session(
        "m=audio 9 UDP/TLS/RTP/SAVPF 112\r\n\
a=rtpmap:112 opus/48000/2\r\n\
a=fmtp:112 minptime=10; useinbandfec=1\r\n",
    )?)?;

    assert!(!m.negotiated_video);
    assert!(m.negotiated_audio);

    let (codec, kind) = m.get_codec_by_payload(112)?;
    assert_eq!(kind, RtpCodecKind::Audio);
    assert_eq!(codec.rtp_codec.mime_type, "audio/opus");
    assert_matches!(m.get_codec_by_payload(111), Err(Error::ErrCodecNotFound));

    Ok(())
}

#[test]
fn test_media_engine_case_insensitive_mime_type() -> Result<()> {
    let mut m = default_media_engine()?;
    m.update_from_remote_description(&session(
        "m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
a=rtpmap:111 OPUS/48000/2\r\n\
a=fmtp:111 minptime=10; useinbandfec=1\r\n",
    )?)?;

    assert!(m.negotiated_audio);
    let (codec, _) = m.get_codec_by_payload(111)?;
    assert!(codec.rtp_codec.mime_type.eq_ignore_ascii_case(MIME_TYPE_OPUS));

    Ok(())
}

#[test]
fn test_media_engine_no_matching_codec() -> Result<()> {
    let mut m = default_media_engine()?;
    m.update_from_remote_description(&session(
        "m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
a=rtpmap:96 VP7/90000\r\n",
    )?)?;

    assert!(m.negotiated_video);
    assert!(m.negotiated_video_codecs.is_empty());
    assert_matches!(m.get_codec_by_payload(96), Err(Error::ErrCodecNotFound));

    Ok(())
}

#[test]
fn test_media_engine_h264_fmtp_match() -> Result<()> {
    let mut m = default_media_engine()?;
    m.update_from_remote_description(&session(
        "m=video 9 UDP/TLS/RTP/SAVPF 98 99\r\n\
a=rtpmap:98 H264/90000\r\n\
a=fmtp:98 level-asymmetry-allowed=1;packetization-mode=0;profile-level-id=42001f\r\n\
a=rtpmap:99 H264/90000\r\n\
a=fmtp:99 level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f\r\n",
    )?)?;

    assert!(m.negotiated_video);
    assert_eq!(m.negotiated_video_codecs.len(), 2);
    let (codec, _) = m.get_codec_by_payload(99)?;
    assert_eq!(
        codec.rtp_codec.fmtp().parameter("packetization-mode"),
        Some(&"1".to_owned())
    );

    Ok(())
}

#[test]
fn test_media_engine_rtx_follows_its_media_codec() -> Result<()> {
    let mut m = default_media_engine()?;
    m.update_from_remote_description(&session(
        "m=video 9 UDP/TLS/RTP/SAVPF 101 100 110\r\n\
a=rtpmap:101 rtx/90000\r\n\
a=fmtp:101 apt=100\r\n\
a=rtpmap:100 VP8/90000\r\n\
a=rtpmap:110 rtx/90000\r\n\
a=fmtp:110 apt=109\r\n",
    )?)?;

    let payload_types: Vec<PayloadType> = m
        .negotiated_video_codecs
        .iter()
        .map(|c| c.payload_type)
        .collect();
    // rtx listed before VP8 is matched on the second pass, rtx of an
    // unknown codec is dropped
    assert_eq!(payload_types, vec![100, 101]);
    assert!(m.is_rtx_enabled(RtpCodecKind::Video, RTCRtpTransceiverDirection::Sendrecv));
    assert!(!m.is_fec_enabled(RtpCodecKind::Video, RTCRtpTransceiverDirection::Sendrecv));

    Ok(())
}

#[test]
fn test_media_engine_rtcp_feedback_intersection() -> Result<()> {
    let mut m = default_media_engine()?;
    m.update_from_remote_description(&session(
        "m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
a=rtpmap:96 VP8/90000\r\n\
a=rtcp-fb:96 nack\r\n\
a=rtcp-fb:96 nack pli\r\n\
a=rtcp-fb:96 transport-cc\r\n",
    )?)?;

    let (codec, _) = m.get_codec_by_payload(96)?;
    assert_eq!(
        codec.rtp_codec.rtcp_feedback,
        vec![
            RTCPFeedback {
                typ: "nack".to_owned(),
                parameter: "".to_owned(),
            },
            RTCPFeedback {
                typ: "nack".to_owned(),
                parameter: "pli".to_owned(),
            },
        ]
    );

    Ok(())
}

#[test]
fn test_media_engine_header_extensions() -> Result<()> {
    let mut m = default_media_engine()?;
    m.register_header_extension(
        RTCRtpHeaderExtensionCapability {
            uri: SDP_MID_EXTENSION_URI.to_owned(),
        },
        RtpCodecKind::Audio,
        None,
    )?;
    m.register_header_extension(
        RTCRtpHeaderExtensionCapability {
            uri: AUDIO_LEVEL_URI.to_owned(),
        },
        RtpCodecKind::Audio,
        None,
    )?;

    // ids are allocated in order before negotiation
    let params = m.get_rtp_parameters_by_kind(
        RtpCodecKind::Audio,
        RTCRtpTransceiverDirection::Sendrecv,
    );
    assert_eq!(params.header_extensions.len(), 2);
    assert_eq!(params.header_extensions[0].id, 1);
    assert_eq!(params.header_extensions[1].id, 2);

    m.update_from_remote_description(&session(
        "m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
a=extmap:7 urn:ietf:params:rtp-hdrext:sdes:mid\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10; useinbandfec=1\r\n",
    )?)?;

    let (id, audio, video) = m.get_header_extension_id(RTCRtpHeaderExtensionCapability {
        uri: SDP_MID_EXTENSION_URI.to_owned(),
    });
    assert_eq!((id, audio, video), (7, true, false));

    // the remote did not offer audio level
    let (id, _, _) = m.get_header_extension_id(RTCRtpHeaderExtensionCapability {
        uri: AUDIO_LEVEL_URI.to_owned(),
    });
    assert_eq!(id, 0);

    let params = m.get_rtp_parameters_by_kind(
        RtpCodecKind::Audio,
        RTCRtpTransceiverDirection::Sendrecv,
    );
    assert_eq!(params.header_extensions.len(), 1);
    assert_eq!(params.header_extensions[0].id, 7);

    Ok(())
}

#[test]
fn test_media_engine_header_extension_direction() -> Result<()> {
    let mut m = MediaEngine::default();
    m.register_header_extension(
        RTCRtpHeaderExtensionCapability {
            uri: "webrtc-header-test".to_owned(),
        },
        RtpCodecKind::Audio,
        Some(RTCRtpTransceiverDirection::Recvonly),
    )?;

    assert_eq!(
        m.get_rtp_parameters_by_kind(RtpCodecKind::Audio, RTCRtpTransceiverDirection::Recvonly)
            .header_extensions
            .len(),
        1
    );
    assert!(
        m.get_rtp_parameters_by_kind(RtpCodecKind::Audio, RTCRtpTransceiverDirection::Sendonly)
            .header_extensions
            .is_empty()
    );

    assert_matches!(
        m.register_header_extension(
            RTCRtpHeaderExtensionCapability {
                uri: "webrtc-header-test".to_owned(),
            },
            RtpCodecKind::Audio,
            Some(RTCRtpTransceiverDirection::Inactive),
        ),
        Err(Error::ErrRegisterHeaderExtensionInvalidDirection)
    );

    Ok(())
}

#[test]
fn test_media_engine_header_extension_ids_exhausted() -> Result<()> {
    let mut m = MediaEngine::default();
    for i in 0..VALID_EXT_IDS.len() {
        m.register_header_extension(
            RTCRtpHeaderExtensionCapability {
                uri: format!("urn:test:{i}"),
            },
            RtpCodecKind::Video,
            None,
        )?;
    }

    assert_matches!(
        m.register_header_extension(
            RTCRtpHeaderExtensionCapability {
                uri: "urn:test:one-too-many".to_owned(),
            },
            RtpCodecKind::Video,
            None,
        ),
        Err(Error::ErrRegisterHeaderExtensionNoFreeID)
    );

    Ok(())
}

#[test]
fn test_media_engine_register_codec() -> Result<()> {
    let mut m = MediaEngine::default();
    let opus = m_opus();
    m.register_codec(opus.clone(), RtpCodecKind::Audio)?;
    m.register_codec(opus.clone(), RtpCodecKind::Audio)?;
    assert_eq!(m.audio_codecs.len(), 1);

    assert_matches!(
        m.register_codec(opus, RtpCodecKind::Unspecified),
        Err(Error::ErrUnknownType)
    );

    Ok(())
}

#[test]
fn test_media_engine_clone_to_drops_negotiation() -> Result<()> {
    let mut m = default_media_engine()?;
    m.update_from_remote_description(&session(
        "m=audio 9 UDP/TLS/RTP/SAVPF 112\r\n\
a=rtpmap:112 opus/48000/2\r\n\
a=fmtp:112 minptime=10; useinbandfec=1\r\n",
    )?)?;
    assert!(m.negotiated_audio);

    let cloned = m.clone_to();
    assert!(!cloned.negotiated_audio);
    assert!(cloned.negotiated_audio_codecs.is_empty());
    assert_eq!(cloned.audio_codecs.len(), m.audio_codecs.len());
    assert_eq!(cloned.get_codec_by_payload(111)?.0.payload_type, 111);

    Ok(())
}

#[test]
fn test_media_engine_register_feedback() -> Result<()> {
    let mut m = default_media_engine()?;
    let twcc = RTCPFeedback {
        typ: "transport-cc".to_owned(),
        parameter: "".to_owned(),
    };
    m.register_feedback(twcc.clone(), RtpCodecKind::Video);
    m.register_feedback(twcc.clone(), RtpCodecKind::Video);

    for c in &m.video_codecs {
        assert_eq!(
            c.rtp_codec
                .rtcp_feedback
                .iter()
                .filter(|fb| **fb == twcc)
                .count(),
            1
        );
    }
    assert!(m
        .audio_codecs
        .iter()
        .all(|c| !c.rtp_codec.rtcp_feedback.contains(&twcc)));

    Ok(())
}

fn m_opus() -> RTCRtpCodecParameters {
    codec(MIME_TYPE_OPUS, 48000, 2, "minptime=10;useinbandfec=1", vec![], 111)
}
