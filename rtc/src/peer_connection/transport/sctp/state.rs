use std::fmt;

use serde::{Deserialize, Serialize};

use crate::peer_connection::configuration::UNSPECIFIED_STR;

/// The state of the SCTP association carrying the data channels.
///
/// * [W3C RTCSctpTransportState](https://w3c.github.io/webrtc-pc/#dom-rtcsctptransportstate)
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RTCSctpTransportState {
    #[default]
    Unspecified,

    /// Waiting for DTLS to finish.
    New,

    /// The INIT handshake is in progress.
    Connecting,

    Connected,

    Closed,
}

const SCTP_TRANSPORT_STATE_NEW_STR: &str = "new";
const SCTP_TRANSPORT_STATE_CONNECTING_STR: &str = "connecting";
const SCTP_TRANSPORT_STATE_CONNECTED_STR: &str = "connected";
const SCTP_TRANSPORT_STATE_CLOSED_STR: &str = "closed";

impl From<&str> for RTCSctpTransportState {
    fn from(raw: &str) -> Self {
        match raw {
            SCTP_TRANSPORT_STATE_NEW_STR => RTCSctpTransportState::New,
            SCTP_TRANSPORT_STATE_CONNECTING_STR => RTCSctpTransportState::Connecting,
            SCTP_TRANSPORT_STATE_CONNECTED_STR => RTCSctpTransportState::Connected,
            SCTP_TRANSPORT_STATE_CLOSED_STR => RTCSctpTransportState::Closed,
            _ => RTCSctpTransportState::Unspecified,
        }
    }
}

impl fmt::Display for RTCSctpTransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCSctpTransportState::New => SCTP_TRANSPORT_STATE_NEW_STR,
            RTCSctpTransportState::Connecting => SCTP_TRANSPORT_STATE_CONNECTING_STR,
            RTCSctpTransportState::Connected => SCTP_TRANSPORT_STATE_CONNECTED_STR,
            RTCSctpTransportState::Closed => SCTP_TRANSPORT_STATE_CLOSED_STR,
            RTCSctpTransportState::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}
