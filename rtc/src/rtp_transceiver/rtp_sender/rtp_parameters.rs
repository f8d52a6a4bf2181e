use crate::rtp_transceiver::rtp_sender::rtcp_parameters::RTCRtcpParameters;
use crate::rtp_transceiver::rtp_sender::rtp_codec::{RTCRtpCodec, RTCRtpCodecParameters};
use crate::rtp_transceiver::SSRC;

/// Negotiated codecs and header extensions of one media section.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#dictionary-rtcrtpparameters-members)
#[derive(Default, Debug, Clone)]
pub struct RTCRtpParameters {
    pub header_extensions: Vec<RTCRtpHeaderExtensionParameters>,
    pub rtcp: RTCRtcpParameters,
    /// in preference order
    pub codecs: Vec<RTCRtpCodecParameters>,
}

/// An RFC 8285 header extension this endpoint can use.
#[derive(Default, Debug, Clone)]
pub struct RTCRtpHeaderExtensionCapability {
    pub uri: String,
}

/// A header extension bound to a negotiated id.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#dictionary-rtcrtpheaderextensionparameters-members)
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtpHeaderExtensionParameters {
    pub uri: String,
    /// 1-14 for the one-byte form
    pub id: u16,
    pub encrypted: bool,
}

/// SSRCs of one encoding and its repair streams.
///
/// ## Specifications
///
/// * [ORTC](http://draft.ortc.org/#dom-rtcrtpcodingparameters)
#[derive(Default, Debug, Clone)]
pub struct RTCRtpCodingParameters {
    pub ssrc: Option<SSRC>,
    pub rtx: Option<RTCRtpRtxParameters>,
    pub fec: Option<RTCRtpFecParameters>,
}

#[derive(Default, Debug, Clone)]
pub struct RTCRtpRtxParameters {
    pub ssrc: SSRC,
}

#[derive(Default, Debug, Clone)]
pub struct RTCRtpFecParameters {
    pub ssrc: SSRC,
}

/// The single encoding a sender produces.
#[derive(Default, Debug, Clone)]
pub struct RTCRtpEncodingParameters {
    pub rtp_coding_parameters: RTCRtpCodingParameters,
    pub active: bool,
    pub codec: RTCRtpCodec,
    pub max_bitrate: u32,
}

/// Parameters of a sender: what was negotiated plus its encoding.
#[derive(Default, Debug, Clone)]
pub struct RTCRtpSendParameters {
    pub rtp_parameters: RTCRtpParameters,
    pub encodings: Vec<RTCRtpEncodingParameters>,
}
