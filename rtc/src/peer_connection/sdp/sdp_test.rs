use std::io::Cursor;

use sdp::description::common::Attribute;
use sdp::description::media::MediaName;

use super::*;
use crate::media_stream::track::MediaStreamTrack;
use crate::peer_connection::configuration::interceptor_registry::{
    FLEXFEC_PAYLOAD_TYPE, configure_flexfec,
};
use crate::peer_connection::configuration::media_engine::MIME_TYPE_VP8;
use crate::peer_connection::transport::{RTCIceCandidateType, RTCIceProtocol};

fn parse(raw: &str) -> Result<SessionDescription> {
    let mut reader = Cursor::new(raw.as_bytes());
    SessionDescription::unmarshal(&mut reader)
}

fn attr(key: &str, value: &str) -> Attribute {
    Attribute {
        key: key.to_owned(),
        value: Some(value.to_owned()),
    }
}

fn media_with(media: &str, attributes: Vec<Attribute>) -> MediaDescription {
    MediaDescription {
        media_name: MediaName {
            media: media.to_owned(),
            port: RangedPort {
                value: 9,
                range: None,
            },
            ..Default::default()
        },
        attributes,
        ..Default::default()
    }
}

fn ice_params() -> RTCIceParameters {
    RTCIceParameters {
        username_fragment: "ufrag".to_owned(),
        password: "0123456789abcdefghijkl".to_owned(),
        ice_lite: false,
    }
}

fn fingerprints() -> Vec<RTCDtlsFingerprint> {
    vec![RTCDtlsFingerprint {
        algorithm: "sha-256".to_owned(),
        value: "ab:cd:ef".to_owned(),
    }]
}

fn host_candidate() -> RTCIceCandidate {
    RTCIceCandidate {
        foundation: "1".to_owned(),
        priority: 2130706431,
        address: "10.0.0.1".to_owned(),
        protocol: RTCIceProtocol::Udp,
        port: 5000,
        typ: RTCIceCandidateType::Host,
        component: 1,
        ..Default::default()
    }
}

#[test]
fn test_extract_fingerprint() -> Result<()> {
    // session level
    let s = SessionDescription {
        attributes: vec![attr("fingerprint", "sha-256 AB:CD")],
        ..Default::default()
    };
    let (value, algorithm) = extract_fingerprint(&s)?;
    assert_eq!(value, "AB:CD");
    assert_eq!(algorithm, "sha-256");

    // media level
    let s = SessionDescription {
        media_descriptions: vec![media_with("audio", vec![attr("fingerprint", "sha-256 AB:CD")])],
        ..Default::default()
    };
    assert!(extract_fingerprint(&s).is_ok());

    // no fingerprint
    let s = SessionDescription::default();
    assert_eq!(
        extract_fingerprint(&s),
        Err(Error::ErrSessionDescriptionNoFingerprint)
    );

    // invalid fingerprint
    let s = SessionDescription {
        attributes: vec![attr("fingerprint", "AB:CD")],
        ..Default::default()
    };
    assert_eq!(
        extract_fingerprint(&s),
        Err(Error::ErrSessionDescriptionInvalidFingerprint)
    );

    // conflicting fingerprint
    let s = SessionDescription {
        attributes: vec![attr("fingerprint", "sha-256 AB:CD")],
        media_descriptions: vec![media_with("audio", vec![attr("fingerprint", "sha-256 DE:FG")])],
        ..Default::default()
    };
    assert_eq!(
        extract_fingerprint(&s),
        Err(Error::ErrSessionDescriptionConflictingFingerprints)
    );

    Ok(())
}

#[test]
fn test_extract_ice_details() -> Result<()> {
    const DEFAULT_UFRAG: &str = "DEFAULT_PWD";
    const DEFAULT_PWD: &str = "DEFAULT_UFRAG";

    // missing ice-pwd
    let s = SessionDescription {
        media_descriptions: vec![media_with("audio", vec![attr("ice-ufrag", DEFAULT_UFRAG)])],
        ..Default::default()
    };
    assert_eq!(
        extract_ice_details(&s).map(|_| ()),
        Err(Error::ErrSessionDescriptionMissingIcePwd)
    );

    // missing ice-ufrag
    let s = SessionDescription {
        media_descriptions: vec![media_with("audio", vec![attr("ice-pwd", DEFAULT_PWD)])],
        ..Default::default()
    };
    assert_eq!(
        extract_ice_details(&s).map(|_| ()),
        Err(Error::ErrSessionDescriptionMissingIceUfrag)
    );

    // ice attributes at session level
    let s = SessionDescription {
        attributes: vec![attr("ice-ufrag", DEFAULT_UFRAG), attr("ice-pwd", DEFAULT_PWD)],
        media_descriptions: vec![],
        ..Default::default()
    };
    let (ufrag, pwd, _) = extract_ice_details(&s)?;
    assert_eq!(ufrag, DEFAULT_UFRAG);
    assert_eq!(pwd, DEFAULT_PWD);

    // ice attributes at media level with a candidate
    let s = SessionDescription {
        media_descriptions: vec![media_with(
            "audio",
            vec![
                attr("ice-ufrag", DEFAULT_UFRAG),
                attr("ice-pwd", DEFAULT_PWD),
                attr("candidate", "1 1 udp 2130706431 10.0.0.2 5000 typ host"),
            ],
        )],
        ..Default::default()
    };
    let (ufrag, pwd, candidates) = extract_ice_details(&s)?;
    assert_eq!(ufrag, DEFAULT_UFRAG);
    assert_eq!(pwd, DEFAULT_PWD);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].port(), 5000);

    // conflicting ice-ufrag
    let s = SessionDescription {
        attributes: vec![attr("ice-ufrag", "invalidUfrag"), attr("ice-pwd", DEFAULT_PWD)],
        media_descriptions: vec![media_with(
            "audio",
            vec![attr("ice-ufrag", DEFAULT_UFRAG), attr("ice-pwd", DEFAULT_PWD)],
        )],
        ..Default::default()
    };
    assert_eq!(
        extract_ice_details(&s).map(|_| ()),
        Err(Error::ErrSessionDescriptionConflictingIceUfrag)
    );

    // conflicting ice-pwd
    let s = SessionDescription {
        attributes: vec![attr("ice-ufrag", DEFAULT_UFRAG), attr("ice-pwd", "invalidPwd")],
        media_descriptions: vec![media_with(
            "audio",
            vec![attr("ice-ufrag", DEFAULT_UFRAG), attr("ice-pwd", DEFAULT_PWD)],
        )],
        ..Default::default()
    };
    assert_eq!(
        extract_ice_details(&s).map(|_| ()),
        Err(Error::ErrSessionDescriptionConflictingIcePwd)
    );

    Ok(())
}

#[test]
fn test_track_details_from_sdp() -> Result<()> {
    let s = SessionDescription {
        media_descriptions: vec![
            media_with(
                "foobar",
                vec![
                    attr("mid", "0"),
                    attr("sendrecv", ""),
                    attr("ssrc", "1000 msid:unknown_trk_label unknown_trk_guid"),
                ],
            ),
            media_with(
                "audio",
                vec![
                    attr("mid", "1"),
                    attr("sendrecv", ""),
                    attr("ssrc", "2000 msid:audio_trk_label audio_trk_guid"),
                ],
            ),
            media_with(
                "video",
                vec![
                    attr("mid", "2"),
                    attr("sendrecv", ""),
                    attr("ssrc-group", "FID 3000 4000"),
                    attr("ssrc-group", "FEC-FR 3000 5000"),
                    attr("ssrc", "3000 msid:video_trk_label video_trk_guid"),
                    attr("ssrc", "4000 msid:rtx_trk_label rtx_trck_guid"),
                    attr("ssrc", "5000 msid:video_trk_label video_trk_guid"),
                ],
            ),
            media_with(
                "video",
                vec![
                    attr("mid", "3"),
                    attr("sendonly", ""),
                    attr("msid", "video_stream_id video_trk_id"),
                    attr("ssrc", "6000"),
                ],
            ),
            media_with(
                "video",
                vec![
                    attr("mid", "4"),
                    attr("recvonly", ""),
                    attr("ssrc", "7000 msid:skipped skipped"),
                ],
            ),
        ],
        ..Default::default()
    };

    let tracks = track_details_from_sdp(&s);
    assert_eq!(tracks.len(), 3);

    assert!(track_details_for_ssrc(&tracks, 1000).is_none());
    assert!(track_details_for_ssrc(&tracks, 4000).is_none());
    assert!(track_details_for_ssrc(&tracks, 5000).is_none());
    assert!(track_details_for_ssrc(&tracks, 7000).is_none());

    let track = track_details_for_ssrc(&tracks, 2000).expect("audio track");
    assert_eq!(track.kind, RtpCodecKind::Audio);
    assert_eq!(track.mid, "1");
    assert_eq!(track.stream_id, "audio_trk_label");
    assert_eq!(track.track_id, "audio_trk_guid");

    let track = track_details_for_ssrc(&tracks, 3000).expect("video track");
    assert_eq!(track.kind, RtpCodecKind::Video);
    assert_eq!(track.rtx_ssrc, Some(4000));
    assert_eq!(track.fec_ssrc, Some(5000));
    assert_eq!(track.track_id, "video_trk_guid");

    let track = track_details_for_ssrc(&tracks, 6000).expect("msid track");
    assert_eq!(track.mid, "3");
    assert_eq!(track.stream_id, "video_stream_id");
    assert_eq!(track.track_id, "video_trk_id");
    assert_eq!(track.fec_ssrc, None);

    Ok(())
}

#[test]
fn test_get_peer_direction() {
    let tests = vec![
        ("sendrecv", RTCRtpTransceiverDirection::Sendrecv),
        ("sendonly", RTCRtpTransceiverDirection::Sendonly),
        ("recvonly", RTCRtpTransceiverDirection::Recvonly),
        ("inactive", RTCRtpTransceiverDirection::Inactive),
    ];
    for (key, expected) in tests {
        let media = MediaDescription {
            attributes: vec![Attribute {
                key: key.to_owned(),
                value: None,
            }],
            ..Default::default()
        };
        assert_eq!(get_peer_direction(&media), expected);
    }

    assert_eq!(
        get_peer_direction(&MediaDescription::default()),
        RTCRtpTransceiverDirection::Unspecified
    );
}

#[test]
fn test_codecs_and_extensions_from_media_description() -> Result<()> {
    let s = parse(
        "v=0\r\n\
o=- 1 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 9\r\n\
c=IN IP4 0.0.0.0\r\n\
a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n\
a=rtcp-fb:111 transport-cc\r\n\
a=rtcp-fb:111 nack pli\r\n\
a=rtpmap:9 G722/8000\r\n",
    )?;

    let codecs = codecs_from_media_description(&s.media_descriptions[0])?;
    assert_eq!(codecs.len(), 2);
    assert_eq!(codecs[0].payload_type, 111);
    assert_eq!(codecs[0].rtp_codec.mime_type, "audio/opus");
    assert_eq!(codecs[0].rtp_codec.clock_rate, 48000);
    assert_eq!(codecs[0].rtp_codec.channels, 2);
    assert_eq!(codecs[0].rtp_codec.sdp_fmtp_line, "minptime=10;useinbandfec=1");
    assert_eq!(
        codecs[0].rtp_codec.rtcp_feedback,
        vec![
            RTCPFeedback {
                typ: "transport-cc".to_owned(),
                parameter: "".to_owned(),
            },
            RTCPFeedback {
                typ: "nack".to_owned(),
                parameter: "pli".to_owned(),
            },
        ]
    );
    assert_eq!(codecs[1].rtp_codec.mime_type, "audio/G722");
    assert_eq!(codecs[1].rtp_codec.channels, 0);

    let extensions = rtp_extensions_from_media_description(&s.media_descriptions[0])?;
    assert_eq!(
        extensions.get("urn:ietf:params:rtp-hdrext:ssrc-audio-level"),
        Some(&1)
    );

    Ok(())
}

#[test]
fn test_populate_sdp_data_channel_only() -> Result<()> {
    let media_engine = MediaEngine::default();
    let media_sections = vec![MediaSection {
        id: "0".to_owned(),
        data: true,
        ..Default::default()
    }];

    let d = populate_sdp(
        SessionDescription::new_jsep_session_description(false),
        &fingerprints(),
        &media_engine,
        &[],
        &[host_candidate()],
        &ice_params(),
        &media_sections,
        PopulateSdpParams {
            connection_role: ConnectionRole::Actpass,
            ice_gathering_state: RTCIceGatheringState::Complete,
            sctp_max_message_size: 65536,
            ..Default::default()
        },
    )?;

    assert_eq!(d.attribute(ATTR_KEY_GROUP).map(String::as_str), Some("BUNDLE 0"));
    assert_eq!(
        d.attribute(ATTR_KEY_FINGERPRINT).map(String::as_str),
        Some("sha-256 AB:CD:EF")
    );
    assert!(!is_lite_set(&d));
    assert!(have_application_media_section(&d));

    let media = &d.media_descriptions[0];
    assert_eq!(media.media_name.protos, vec!["UDP", "DTLS", "SCTP"]);
    assert_eq!(media.media_name.formats, vec!["webrtc-datachannel"]);
    assert_eq!(media.attribute(ATTR_KEY_SCTP_PORT), Some(Some("5000")));
    assert_eq!(get_max_message_size(media), Some(65536));
    assert_eq!(media.attribute(ATTR_KEY_CONNECTION_SETUP), Some(Some("actpass")));
    assert_eq!(get_mid_value(media), Some("0"));
    assert_eq!(media.attributes_with_key(ATTR_KEY_CANDIDATE).count(), 1);
    assert!(media.attribute(ATTR_KEY_END_OF_CANDIDATES).is_some());

    // what we produce must parse back with the same credentials
    let reparsed = parse(&d.marshal())?;
    let (ufrag, pwd, candidates) = extract_ice_details(&reparsed)?;
    assert_eq!(ufrag, "ufrag");
    assert_eq!(pwd, "0123456789abcdefghijkl");
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].address(), "10.0.0.1");

    Ok(())
}

#[test]
fn test_populate_sdp_no_end_of_candidates_while_gathering() -> Result<()> {
    let d = populate_sdp(
        SessionDescription::new_jsep_session_description(false),
        &fingerprints(),
        &MediaEngine::default(),
        &[],
        &[],
        &ice_params(),
        &[MediaSection {
            id: "0".to_owned(),
            data: true,
            ..Default::default()
        }],
        PopulateSdpParams {
            is_ice_lite: true,
            media_description_fingerprint: true,
            ice_gathering_state: RTCIceGatheringState::Gathering,
            ..Default::default()
        },
    )?;

    assert!(is_lite_set(&d));
    assert!(d.attribute(ATTR_KEY_FINGERPRINT).is_none());
    let media = &d.media_descriptions[0];
    assert!(media.attribute(ATTR_KEY_END_OF_CANDIDATES).is_none());
    assert_eq!(
        media.attribute(ATTR_KEY_FINGERPRINT),
        Some(Some("sha-256 AB:CD:EF"))
    );

    Ok(())
}

#[test]
fn test_populate_sdp_video_track_with_flexfec() -> Result<()> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let _registry = configure_flexfec(interceptor::Registry::new(), &mut media_engine)?;

    let vp8 = RTCRtpCodec {
        mime_type: MIME_TYPE_VP8.to_owned(),
        clock_rate: 90000,
        ..Default::default()
    };
    let track = MediaStreamTrack::new(
        "stream".to_owned(),
        "video".to_owned(),
        "video".to_owned(),
        RtpCodecKind::Video,
        vp8,
    );
    let mut transceiver = RTCRtpTransceiver::new(
        RtpCodecKind::Video,
        Some(track),
        RTCRtpTransceiverDirection::Sendrecv,
    );
    transceiver.mid = Some("0".to_owned());
    let media_ssrc = transceiver.sender.ssrc;
    let fec_ssrc = transceiver.sender.ssrc_fec.expect("video senders carry a repair ssrc");

    let d = populate_sdp(
        SessionDescription::new_jsep_session_description(false),
        &fingerprints(),
        &media_engine,
        &[transceiver],
        &[],
        &ice_params(),
        &[MediaSection {
            id: "0".to_owned(),
            transceiver_index: 0,
            ..Default::default()
        }],
        PopulateSdpParams {
            connection_role: ConnectionRole::Actpass,
            ..Default::default()
        },
    )?;

    let media = &d.media_descriptions[0];
    assert_eq!(media.media_name.media, "video");
    assert!(
        media
            .media_name
            .formats
            .contains(&FLEXFEC_PAYLOAD_TYPE.to_string())
    );
    assert!(media.attribute(ATTR_KEY_RTCPMUX).is_some());
    assert_eq!(
        media.attribute(ATTR_KEY_MSID),
        Some(Some("stream video"))
    );
    assert_eq!(get_peer_direction(media), RTCRtpTransceiverDirection::Sendrecv);

    let tracks = track_details_from_sdp(&parse(&d.marshal())?);
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].ssrc, media_ssrc);
    assert_eq!(tracks[0].fec_ssrc, Some(fec_ssrc));
    assert_eq!(tracks[0].stream_id, "stream");
    assert_eq!(tracks[0].track_id, "video");

    Ok(())
}

#[test]
fn test_populate_sdp_rejects_section_without_codecs() -> Result<()> {
    let transceiver = RTCRtpTransceiver::new(
        RtpCodecKind::Audio,
        None,
        RTCRtpTransceiverDirection::Recvonly,
    );

    let d = populate_sdp(
        SessionDescription::new_jsep_session_description(false),
        &fingerprints(),
        &MediaEngine::default(),
        &[transceiver],
        &[],
        &ice_params(),
        &[
            MediaSection {
                id: "0".to_owned(),
                transceiver_index: 0,
                ..Default::default()
            },
            MediaSection {
                id: "1".to_owned(),
                data: true,
                ..Default::default()
            },
        ],
        PopulateSdpParams::default(),
    )?;

    assert_eq!(d.media_descriptions[0].media_name.port.value, 0);
    assert_eq!(d.attribute(ATTR_KEY_GROUP).map(String::as_str), Some("BUNDLE 1"));

    Ok(())
}

#[test]
fn test_populate_sdp_matches_remote_bundle_group() -> Result<()> {
    let d = populate_sdp(
        SessionDescription::new_jsep_session_description(false),
        &fingerprints(),
        &MediaEngine::default(),
        &[],
        &[],
        &ice_params(),
        &[MediaSection {
            id: "data".to_owned(),
            data: true,
            ..Default::default()
        }],
        PopulateSdpParams {
            match_bundle_group: Some("BUNDLE audio".to_owned()),
            ..Default::default()
        },
    )?;
    assert!(d.attribute(ATTR_KEY_GROUP).is_none());

    Ok(())
}

#[test]
fn test_update_sdp_origin() {
    let mut origin = Origin::default();

    let mut first = SessionDescription::new_jsep_session_description(false);
    first.origin.session_version = 0;
    update_sdp_origin(&mut origin, &mut first);
    assert_eq!(origin.session_id, first.origin.session_id);
    assert_eq!(first.origin.session_version, 1);

    let mut second = SessionDescription::new_jsep_session_description(false);
    update_sdp_origin(&mut origin, &mut second);
    assert_eq!(second.origin.session_id, first.origin.session_id);
    assert_eq!(second.origin.session_version, 2);
}

#[test]
fn test_have_data_channel_and_get_by_mid() -> Result<()> {
    let desc = RTCSessionDescription::offer(
        "v=0\r\n\
o=- 1 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:audio\r\n\
a=rtpmap:111 opus/48000/2\r\n\
m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:data\r\n\
a=sctp-port:5000\r\n"
            .to_owned(),
    )?;

    assert!(have_data_channel(&desc).is_some());
    assert_eq!(
        get_by_mid("audio", &desc).map(|m| m.media_name.media.as_str()),
        Some("audio")
    );
    assert!(get_by_mid("video", &desc).is_none());
    assert_eq!(have_data_channel(&desc).and_then(get_max_message_size), None);

    Ok(())
}
