use std::io::Cursor;

use super::common::*;
use super::media::*;
use super::session::*;
use crate::util::Codec;
use shared::error::{Error, Result};

const CANONICAL_MARSHAL_SDP: &str = "v=0\r\n\
     o=jdoe 2890844526 2890842807 IN IP4 10.47.16.5\r\n\
     s=SDP Seminar\r\n\
     i=A Seminar on the session description protocol\r\n\
     u=http://www.example.com/seminars/sdp.pdf\r\n\
     e=j.doe@example.com (Jane Doe)\r\n\
     p=+1 617 555-6011\r\n\
     c=IN IP4 224.2.17.12/127\r\n\
     b=X-YZ:128\r\n\
     b=AS:12345\r\n\
     t=2873397496 2873404696\r\n\
     t=3034423619 3042462419\r\n\
     r=604800 3600 0 90000\r\n\
     z=2882844526 -3600 2898848070 0\r\n\
     k=prompt\r\n\
     a=candidate:0 1 UDP 2113667327 203.0.113.1 54400 typ host\r\n\
     a=recvonly\r\n\
     m=audio 49170 RTP/AVP 0\r\n\
     i=Vivamus a posuere nisl\r\n\
     c=IN IP4 203.0.113.1\r\n\
     b=X-YZ:128\r\n\
     k=prompt\r\n\
     a=sendrecv\r\n\
     m=video 51372 RTP/AVP 99\r\n\
     a=rtpmap:99 h263-1998/90000\r\n";

const WEBRTC_OFFER_SDP: &str = "v=0\r\n\
     o=- 4596489990601351948 2 IN IP4 127.0.0.1\r\n\
     s=-\r\n\
     t=0 0\r\n\
     a=group:BUNDLE 0 1\r\n\
     a=extmap-allow-mixed\r\n\
     m=video 9 UDP/TLS/RTP/SAVPF 96 97 102\r\n\
     c=IN IP4 0.0.0.0\r\n\
     a=ice-ufrag:ufrag\r\n\
     a=ice-pwd:passwordpasswordpassword\r\n\
     a=fingerprint:sha-256 8E:0C:0B:C9:7A:1B:6F:24:A0:35:5A:B8:1E:2E:55:6D:AE:55:1C:E7:C6:C2:B6:19:75:0B:11:91:92:73:28:8A\r\n\
     a=setup:actpass\r\n\
     a=mid:0\r\n\
     a=sendrecv\r\n\
     a=rtcp-mux\r\n\
     a=rtpmap:96 VP8/90000\r\n\
     a=rtcp-fb:96 nack\r\n\
     a=rtcp-fb:96 nack pli\r\n\
     a=rtcp-fb:96 ccm fir\r\n\
     a=rtpmap:97 rtx/90000\r\n\
     a=fmtp:97 apt=96\r\n\
     a=rtpmap:102 H264/90000\r\n\
     a=fmtp:102 level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f\r\n\
     a=ssrc:1001 cname:stream\r\n\
     m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
     c=IN IP4 0.0.0.0\r\n\
     a=mid:1\r\n\
     a=sctp-port:5000\r\n\
     a=max-message-size:262144\r\n";

fn parse(raw: &str) -> Result<SessionDescription> {
    SessionDescription::unmarshal(&mut Cursor::new(raw.as_bytes()))
}

#[test]
fn test_unmarshal_marshal_canonical() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let sdp = parse(CANONICAL_MARSHAL_SDP)?;
    assert_eq!(sdp.origin.username, "jdoe");
    assert_eq!(sdp.origin.session_id, 2890844526);
    assert_eq!(sdp.session_name, "SDP Seminar");
    assert_eq!(sdp.time_descriptions.len(), 2);
    assert_eq!(sdp.time_descriptions[1].repeat_times.len(), 1);
    assert_eq!(sdp.time_zones.len(), 2);
    assert_eq!(sdp.time_zones[0].offset, -3600);
    assert_eq!(sdp.bandwidth.len(), 2);
    assert!(sdp.bandwidth[0].experimental);
    assert_eq!(sdp.media_descriptions.len(), 2);

    let address = sdp
        .connection_information
        .as_ref()
        .and_then(|c| c.address.as_ref())
        .expect("session connection address");
    assert_eq!(address.address, "224.2.17.12");
    assert_eq!(address.ttl, Some(127));

    assert_eq!(sdp.marshal(), CANONICAL_MARSHAL_SDP);
    Ok(())
}

#[test]
fn test_unmarshal_webrtc_offer() -> Result<()> {
    let sdp = parse(WEBRTC_OFFER_SDP)?;

    assert_eq!(sdp.attribute(ATTR_KEY_GROUP), Some(&"BUNDLE 0 1".to_owned()));
    assert!(sdp.has_attribute(ATTR_KEY_EXTMAP_ALLOW_MIXED));

    let video = &sdp.media_descriptions[0];
    assert_eq!(video.media_name.media, "video");
    assert_eq!(video.media_name.port.value, 9);
    assert_eq!(video.media_name.protos, vec!["UDP", "TLS", "RTP", "SAVPF"]);
    assert_eq!(video.media_name.formats, vec!["96", "97", "102"]);
    assert_eq!(video.attribute(ATTR_KEY_MID), Some(Some("0")));
    assert_eq!(video.attribute(ATTR_KEY_RTCPMUX), Some(None));
    assert_eq!(video.attribute(ATTR_KEY_MSID), None);
    assert_eq!(video.attributes_with_key(ATTR_KEY_RTCPFB).count(), 3);

    let app = &sdp.media_descriptions[1];
    assert_eq!(app.media_name.protos, vec!["UDP", "DTLS", "SCTP"]);
    assert_eq!(app.media_name.formats, vec!["webrtc-datachannel"]);
    assert_eq!(app.attribute(ATTR_KEY_SCTP_PORT), Some(Some("5000")));

    assert_eq!(sdp.marshal(), WEBRTC_OFFER_SDP);
    Ok(())
}

#[test]
fn test_unmarshal_accepts_bare_line_feeds() -> Result<()> {
    let raw = WEBRTC_OFFER_SDP.replace("\r\n", "\n");
    let sdp = parse(&raw)?;
    assert_eq!(sdp.marshal(), WEBRTC_OFFER_SDP);
    Ok(())
}

#[test]
fn test_unmarshal_typed_time() -> Result<()> {
    let raw = "v=0\r\n\
         o=- 1 1 IN IP4 127.0.0.1\r\n\
         s=-\r\n\
         t=0 0\r\n\
         r=7d 1h 0 25h\r\n\
         z=2882844526 -1h 2898848070 0\r\n";
    let sdp = parse(raw)?;

    let repeat = &sdp.time_descriptions[0].repeat_times[0];
    assert_eq!(repeat.interval, 604800);
    assert_eq!(repeat.duration, 3600);
    assert_eq!(repeat.offsets, vec![0, 90000]);
    assert_eq!(sdp.time_zones[0].offset, -3600);

    let marshaled = sdp.marshal();
    assert!(marshaled.contains("r=604800 3600 0 90000\r\n"));
    assert!(marshaled.contains("z=2882844526 -3600 2898848070 0\r\n"));
    Ok(())
}

#[test]
fn test_unmarshal_errors() {
    let cases = [
        ("", "empty input"),
        ("o=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\n", "missing version"),
        ("v=0\r\ns=-\r\nt=0 0\r\n", "missing origin"),
        ("v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\nt=0 0\r\n", "missing name"),
        ("v=0\r\no=- 1 1 IN IP4\r\ns=-\r\n", "short origin"),
        ("v=0\r\no=- 1 1 XX IP4 127.0.0.1\r\ns=-\r\n", "bad nettype"),
        ("v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nb=YY:10\r\n", "bad bwtype"),
        ("v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nr=1 2 3\r\n", "r without t"),
        ("v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nz=1\r\n", "odd time zones"),
        ("v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nx=1\r\n", "unknown key"),
        ("v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nnot a line\r\n", "no equals"),
        (
            "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\nt=0 0\r\n",
            "session key in media",
        ),
        (
            "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nm=fax 9 UDP 96\r\n",
            "bad media",
        ),
        (
            "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nm=video 9 QUIC 96\r\n",
            "bad proto",
        ),
        (
            "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nm=video 70000 RTP/AVP 96\r\n",
            "bad port",
        ),
        (
            "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nm=video 9 RTP/AVP\r\n",
            "missing formats",
        ),
    ];

    for (raw, name) in cases {
        assert!(parse(raw).is_err(), "{name} should fail to parse");
    }
}

#[test]
fn test_codec_lookup() -> Result<()> {
    let sdp = parse(WEBRTC_OFFER_SDP)?;

    let vp8 = sdp.get_codec_for_payload_type(96)?;
    assert_eq!(vp8.name, "VP8");
    assert_eq!(vp8.clock_rate, 90000);
    assert_eq!(vp8.rtcp_feedback, vec!["nack", "nack pli", "ccm fir"]);

    let rtx = sdp.get_codec_for_payload_type(97)?;
    assert_eq!(rtx.fmtp, "apt=96");

    assert_eq!(
        sdp.get_codec_for_payload_type(120),
        Err(Error::PayloadTypeNotFound)
    );

    let pt = sdp.get_payload_type_for_codec(&Codec {
        name: "H264".to_owned(),
        clock_rate: 90000,
        fmtp: "profile-level-id=42e01f;packetization-mode=1;level-asymmetry-allowed=1".to_owned(),
        ..Default::default()
    })?;
    assert_eq!(pt, 102);

    assert_eq!(
        sdp.get_payload_type_for_codec(&Codec {
            name: "AV1".to_owned(),
            ..Default::default()
        }),
        Err(Error::CodecNotFound)
    );
    Ok(())
}

#[test]
fn test_jsep_builders() -> Result<()> {
    let md = MediaDescription::new_jsep_media_description("video".to_owned(), vec![])
        .with_codec(96, "VP8".to_owned(), 90000, 0, "".to_owned())
        .with_codec(111, "opus".to_owned(), 48000, 2, "minptime=10".to_owned())
        .with_ice_credentials("ufrag".to_owned(), "pwd".to_owned())
        .with_media_source(1234, "cname".to_owned(), "stream".to_owned(), "track".to_owned())
        .with_candidate("1 1 udp 2130706431 10.0.0.1 5000 typ host".to_owned())
        .with_transport_cc_extmap();

    let sdp = SessionDescription::new_jsep_session_description(false)
        .with_fingerprint("sha-256".to_owned(), "AA:BB".to_owned())
        .with_media(md);

    assert_eq!(sdp.origin.session_id >> 63, 0);
    assert_eq!(sdp.attribute(ATTR_KEY_FINGERPRINT), Some(&"sha-256 AA:BB".to_owned()));

    let marshaled = sdp.marshal();
    assert!(marshaled.contains("m=video 9 UDP/TLS/RTP/SAVPF 96 111\r\n"));
    assert!(marshaled.contains("c=IN IP4 0.0.0.0\r\n"));
    assert!(marshaled.contains("a=rtpmap:96 VP8/90000\r\n"));
    assert!(marshaled.contains("a=rtpmap:111 opus/48000/2\r\n"));
    assert!(marshaled.contains("a=fmtp:111 minptime=10\r\n"));
    assert!(marshaled.contains("a=ssrc:1234 msid:stream track\r\n"));
    assert!(marshaled.contains(&format!(
        "a=extmap:3 {EXT_MAP_VALUE_TRANSPORT_CC_URI}\r\n"
    )));

    let reparsed = parse(&marshaled)?;
    assert_eq!(reparsed, sdp);
    assert_eq!(
        reparsed.media_descriptions[0]
            .attributes_with_key(ATTR_KEY_SSRC)
            .count(),
        4
    );

    let address = reparsed.media_descriptions[0]
        .connection_information
        .as_ref()
        .and_then(|c| c.address.clone());
    assert_eq!(
        address,
        Some(Address {
            address: "0.0.0.0".to_owned(),
            ttl: None,
            range: None,
        })
    );
    Ok(())
}
