/// A negotiated RTP header extension (RFC 8285).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTPHeaderExtension {
    pub uri: String,
    pub id: u16,
}

/// A negotiated `a=rtcp-fb` entry, e.g. `nack` or `nack pli`.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCPFeedback {
    /// One of `ack`, `ccm`, `nack`, `goog-remb` or `transport-cc`.
    pub typ: String,
    pub parameter: String,
}

impl RTCPFeedback {
    pub fn new(typ: &str, parameter: &str) -> Self {
        Self {
            typ: typ.to_owned(),
            parameter: parameter.to_owned(),
        }
    }
}

/// Everything an interceptor learns about a stream when it is bound.
#[derive(Default, Debug, Clone)]
pub struct StreamInfo {
    pub id: String,
    pub ssrc: u32,
    pub payload_type: u8,
    /// Retransmission stream (RFC 4588), when negotiated.
    pub ssrc_rtx: Option<u32>,
    pub payload_type_rtx: Option<u8>,
    /// FlexFEC repair stream, when negotiated.
    pub ssrc_fec: Option<u32>,
    pub payload_type_fec: Option<u8>,
    pub rtp_header_extensions: Vec<RTPHeaderExtension>,
    /// e.g. `video/VP8`
    pub mime_type: String,
    pub clock_rate: u32,
    pub channels: u16,
    pub sdp_fmtp_line: String,
    pub rtcp_feedback: Vec<RTCPFeedback>,
}

impl StreamInfo {
    /// Whether `a=rtcp-fb:<pt> <typ> <parameter>` was negotiated.
    pub fn has_feedback(&self, typ: &str, parameter: &str) -> bool {
        self.rtcp_feedback
            .iter()
            .any(|fb| fb.typ == typ && fb.parameter == parameter)
    }

    /// The local id of the header extension registered under `uri`.
    pub fn header_extension_id(&self, uri: &str) -> Option<u8> {
        self.rtp_header_extensions
            .iter()
            .find(|ext| ext.uri == uri)
            .and_then(|ext| u8::try_from(ext.id).ok())
    }
}
