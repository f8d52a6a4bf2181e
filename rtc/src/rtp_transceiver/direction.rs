use crate::peer_connection::configuration::UNSPECIFIED_STR;
use serde::{Deserialize, Serialize};
use std::fmt;


/// RTCRtpTransceiverDirection indicates whether a transceiver sends and/or
/// receives media. It maps one to one onto the `a=sendrecv`, `a=sendonly`,
/// `a=recvonly` and `a=inactive` SDP attributes.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCRtpTransceiverDirection {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "sendrecv")]
    Sendrecv,
    #[serde(rename = "sendonly")]
    Sendonly,
    #[serde(rename = "recvonly")]
    Recvonly,
    #[serde(rename = "inactive")]
    Inactive,
}

const DIRECTION_SENDRECV_STR: &str = "sendrecv";
const DIRECTION_SENDONLY_STR: &str = "sendonly";
const DIRECTION_RECVONLY_STR: &str = "recvonly";
const DIRECTION_INACTIVE_STR: &str = "inactive";

impl From<&str> for RTCRtpTransceiverDirection {
    fn from(raw: &str) -> Self {
        match raw {
            DIRECTION_SENDRECV_STR => RTCRtpTransceiverDirection::Sendrecv,
            DIRECTION_SENDONLY_STR => RTCRtpTransceiverDirection::Sendonly,
            DIRECTION_RECVONLY_STR => RTCRtpTransceiverDirection::Recvonly,
            DIRECTION_INACTIVE_STR => RTCRtpTransceiverDirection::Inactive,
            _ => RTCRtpTransceiverDirection::Unspecified,
        }
    }
}

impl fmt::Display for RTCRtpTransceiverDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCRtpTransceiverDirection::Sendrecv => DIRECTION_SENDRECV_STR,
            RTCRtpTransceiverDirection::Sendonly => DIRECTION_SENDONLY_STR,
            RTCRtpTransceiverDirection::Recvonly => DIRECTION_RECVONLY_STR,
            RTCRtpTransceiverDirection::Inactive => DIRECTION_INACTIVE_STR,
            RTCRtpTransceiverDirection::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl RTCRtpTransceiverDirection {
    /// Direction as seen from the remote side: sendonly and recvonly swap.
    pub fn reverse(&self) -> RTCRtpTransceiverDirection {
        match *self {
            RTCRtpTransceiverDirection::Sendonly => RTCRtpTransceiverDirection::Recvonly,
            RTCRtpTransceiverDirection::Recvonly => RTCRtpTransceiverDirection::Sendonly,
            _ => *self,
        }
    }

    pub fn intersect(&self, other: RTCRtpTransceiverDirection) -> RTCRtpTransceiverDirection {
        Self::from_send_recv(
            self.has_send() && other.has_send(),
            self.has_recv() && other.has_recv(),
        )
    }

    pub fn from_send_recv(send: bool, recv: bool) -> RTCRtpTransceiverDirection {
        match (send, recv) {
            (true, true) => Self::Sendrecv,
            (true, false) => Self::Sendonly,
            (false, true) => Self::Recvonly,
            (false, false) => Self::Inactive,
        }
    }

    pub fn has_send(&self) -> bool {
        matches!(self, Self::Sendrecv | Self::Sendonly)
    }

    pub fn has_recv(&self) -> bool {
        matches!(self, Self::Sendrecv | Self::Recvonly)
    }

    /// The direction an answerer picks for a media section offered with
    /// `remote`, given what it would like to do locally.
    pub(crate) fn answer_for(
        remote: RTCRtpTransceiverDirection,
        local: RTCRtpTransceiverDirection,
    ) -> RTCRtpTransceiverDirection {
        local.intersect(remote.reverse())
    }
}
