use std::fmt;

use serde::{Deserialize, Serialize};
use unicase::UniCase;

use crate::peer_connection::configuration::UNSPECIFIED_STR;
use crate::peer_connection::configuration::media_engine::*;
use crate::rtp_transceiver::rtp_sender::rtcp_parameters::RTCPFeedback;
use crate::rtp_transceiver::{PayloadType, fmtp};
use shared::error::{Error, Result};

/// Media kind of a codec, track or transceiver.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RtpCodecKind {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified = 0,
    #[serde(rename = "audio")]
    Audio = 1,
    #[serde(rename = "video")]
    Video = 2,
}

impl From<&str> for RtpCodecKind {
    fn from(raw: &str) -> Self {
        match raw {
            "audio" => RtpCodecKind::Audio,
            "video" => RtpCodecKind::Video,
            _ => RtpCodecKind::Unspecified,
        }
    }
}

impl From<u8> for RtpCodecKind {
    fn from(v: u8) -> Self {
        match v {
            1 => RtpCodecKind::Audio,
            2 => RtpCodecKind::Video,
            _ => RtpCodecKind::Unspecified,
        }
    }
}

impl fmt::Display for RtpCodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RtpCodecKind::Audio => "audio",
            RtpCodecKind::Video => "video",
            RtpCodecKind::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// Codec capability: what a codec is, independent of the payload type it is
/// negotiated under.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#dictionary-rtcrtpcodeccapability-members)
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtpCodec {
    /// e.g. "video/VP8", compared case-insensitively
    pub mime_type: String,
    pub clock_rate: u32,
    /// 0 for video
    pub channels: u16,
    pub sdp_fmtp_line: String,
    pub rtcp_feedback: Vec<RTCPFeedback>,
}

impl RTCRtpCodec {
    /// Payloader used by [`write_sample`](crate::rtp_transceiver::rtp_sender::RTCRtpSender::write_sample)
    /// to split a frame into RTP payloads.
    pub fn payloader(&self) -> Result<Box<dyn rtp::packetizer::Payloader + Send + Sync>> {
        let mime_type = UniCase::new(self.mime_type.as_str());
        if mime_type == UniCase::new(MIME_TYPE_H264) {
            Ok(Box::<rtp::codec::h264::H264Payloader>::default())
        } else if mime_type == UniCase::new(MIME_TYPE_VP8) {
            let mut vp8_payloader = rtp::codec::vp8::Vp8Payloader::default();
            vp8_payloader.enable_picture_id = true;
            Ok(Box::new(vp8_payloader))
        } else if mime_type == UniCase::new(MIME_TYPE_OPUS) {
            Ok(Box::<rtp::codec::opus::OpusPayloader>::default())
        } else if mime_type == UniCase::new(MIME_TYPE_G722)
            || mime_type == UniCase::new(MIME_TYPE_PCMU)
            || mime_type == UniCase::new(MIME_TYPE_PCMA)
            || mime_type == UniCase::new(MIME_TYPE_TELEPHONE_EVENT)
        {
            Ok(Box::<rtp::codec::g7xx::G7xxPayloader>::default())
        } else {
            Err(Error::ErrNoPayloaderForCodec)
        }
    }

    pub(crate) fn fmtp(&self) -> Box<dyn fmtp::Fmtp> {
        fmtp::parse(
            &self.mime_type,
            self.clock_rate,
            self.channels,
            &self.sdp_fmtp_line,
        )
    }
}

/// A codec together with the payload type it was negotiated under.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#rtcrtpcodecparameters)
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtpCodecParameters {
    pub rtp_codec: RTCRtpCodec,
    pub payload_type: PayloadType,
}

#[derive(Default, Debug, Copy, Clone, PartialEq)]
pub(crate) enum CodecMatch {
    #[default]
    None = 0,
    /// mime type matches
    Partial = 1,
    /// mime type and fmtp match
    Exact = 2,
}

/// Looks for `needle_rtp_codec` in `haystack`, first by fmtp match and then
/// by mime type alone.
pub(crate) fn codec_parameters_fuzzy_search(
    needle_rtp_codec: &RTCRtpCodec,
    haystack: &[RTCRtpCodecParameters],
) -> (RTCRtpCodecParameters, CodecMatch) {
    let needle_fmtp = needle_rtp_codec.fmtp();

    for c in haystack {
        if needle_fmtp.match_fmtp(&*c.rtp_codec.fmtp()) {
            return (c.clone(), CodecMatch::Exact);
        }
    }

    for c in haystack {
        if UniCase::new(c.rtp_codec.mime_type.as_str())
            == UniCase::new(needle_rtp_codec.mime_type.as_str())
        {
            return (c.clone(), CodecMatch::Partial);
        }
    }

    (RTCRtpCodecParameters::default(), CodecMatch::None)
}

/// Payload type of the rtx codec whose `apt` points at `needle`.
pub(crate) fn find_rtx_payload_type(
    needle: PayloadType,
    haystack: &[RTCRtpCodecParameters],
) -> Option<PayloadType> {
    for c in haystack {
        if UniCase::new(c.rtp_codec.mime_type.as_str()) != UniCase::new(MIME_TYPE_RTX) {
            continue;
        }
        if let Some(apt) = c.rtp_codec.fmtp().parameter("apt") {
            if apt.parse::<PayloadType>().ok() == Some(needle) {
                return Some(c.payload_type);
            }
        }
    }

    None
}

/// Payload type of the first FlexFEC codec. Only FlexFEC is supported.
pub(crate) fn find_fec_payload_type(haystack: &[RTCRtpCodecParameters]) -> Option<PayloadType> {
    for c in haystack {
        if c.rtp_codec
            .mime_type
            .to_lowercase()
            .contains(MIME_TYPE_FLEX_FEC)
        {
            return Some(c.payload_type);
        }
    }

    None
}

pub(crate) fn rtcp_feedback_intersection(
    a: &[RTCPFeedback],
    b: &[RTCPFeedback],
) -> Vec<RTCPFeedback> {
    let mut out = vec![];
    for a_feedback in a {
        for b_feedback in b {
            if a_feedback.typ == b_feedback.typ && a_feedback.parameter == b_feedback.parameter {
                out.push(a_feedback.clone());
                break;
            }
        }
    }

    out
}
