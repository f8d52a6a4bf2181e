/// ## Specifications
///
/// * [W3C](https://www.w3.org/TR/webrtc/#rtcrtcpparameters)
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtcpParameters {
    /// CNAME carried in SDES
    pub cname: String,
    pub reduced_size: bool,
}

pub const TYPE_RTCP_FB_TRANSPORT_CC: &str = "transport-cc";
pub const TYPE_RTCP_FB_GOOG_REMB: &str = "goog-remb";
pub const TYPE_RTCP_FB_ACK: &str = "ack";
pub const TYPE_RTCP_FB_CCM: &str = "ccm";
pub const TYPE_RTCP_FB_NACK: &str = "nack";

/// One `a=rtcp-fb` entry of a codec.
///
/// `typ="nack" parameter="pli"` signals Picture Loss Indication,
/// `typ="ccm" parameter="fir"` Full Intra Request.
///
/// ## Specifications
///
/// * [ORTC](https://draft.ortc.org/#dom-rtcrtcpfeedback)
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCPFeedback {
    /// one of `ack`, `ccm`, `nack`, `goog-remb`, `transport-cc`
    pub typ: String,
    pub parameter: String,
}
