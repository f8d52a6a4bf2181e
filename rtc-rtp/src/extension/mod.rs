use std::borrow::Cow;
use std::fmt;

pub mod abs_send_time_extension;
pub mod transport_cc_extension;

/// A generic RTP header extension, identified by its URI in SDP `a=extmap` lines.
#[derive(PartialEq, Eq, Clone)]
pub enum HeaderExtension {
    AbsSendTime,
    TransportCc,
    /// A custom extension
    Custom {
        uri: Cow<'static, str>,
    },
}

pub const ABS_SEND_TIME_URI: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";
pub const TRANSPORT_CC_URI: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";

impl HeaderExtension {
    pub fn uri(&self) -> Cow<'static, str> {
        match self {
            HeaderExtension::AbsSendTime => ABS_SEND_TIME_URI.into(),
            HeaderExtension::TransportCc => TRANSPORT_CC_URI.into(),
            HeaderExtension::Custom { uri, .. } => uri.clone(),
        }
    }

    pub fn is_same(&self, other: &Self) -> bool {
        self.uri() == other.uri()
    }
}

impl From<&str> for HeaderExtension {
    fn from(uri: &str) -> Self {
        match uri {
            ABS_SEND_TIME_URI => HeaderExtension::AbsSendTime,
            TRANSPORT_CC_URI => HeaderExtension::TransportCc,
            _ => HeaderExtension::Custom {
                uri: Cow::Owned(uri.to_owned()),
            },
        }
    }
}

impl fmt::Debug for HeaderExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeaderExtension({})", self.uri())
    }
}
