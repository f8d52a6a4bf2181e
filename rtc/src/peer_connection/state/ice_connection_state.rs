use std::fmt;

use ice::state::ConnectionState;
use serde::{Deserialize, Serialize};

use crate::peer_connection::configuration::UNSPECIFIED_STR;

/// The state of the ICE agent, as reported through
/// `OnIceConnectionStateChange`.
///
/// * [W3C RTCIceConnectionState](https://w3c.github.io/webrtc-pc/#dom-rtciceconnectionstate)
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RTCIceConnectionState {
    #[default]
    Unspecified,

    /// Gathering addresses or waiting for remote candidates.
    New,

    /// Remote candidates are known and at least one pair is being checked.
    Checking,

    /// A usable pair was found. Checks may still be running.
    Connected,

    /// Checks are finished and a pair is selected.
    Completed,

    /// No traffic was received on the selected pair for the disconnected
    /// timeout. This can recover on its own.
    Disconnected,

    /// Every pair failed, or traffic stopped for the failed timeout.
    Failed,

    Closed,
}

const ICE_CONNECTION_STATE_NEW_STR: &str = "new";
const ICE_CONNECTION_STATE_CHECKING_STR: &str = "checking";
const ICE_CONNECTION_STATE_CONNECTED_STR: &str = "connected";
const ICE_CONNECTION_STATE_COMPLETED_STR: &str = "completed";
const ICE_CONNECTION_STATE_DISCONNECTED_STR: &str = "disconnected";
const ICE_CONNECTION_STATE_FAILED_STR: &str = "failed";
const ICE_CONNECTION_STATE_CLOSED_STR: &str = "closed";

impl From<&str> for RTCIceConnectionState {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_CONNECTION_STATE_NEW_STR => RTCIceConnectionState::New,
            ICE_CONNECTION_STATE_CHECKING_STR => RTCIceConnectionState::Checking,
            ICE_CONNECTION_STATE_CONNECTED_STR => RTCIceConnectionState::Connected,
            ICE_CONNECTION_STATE_COMPLETED_STR => RTCIceConnectionState::Completed,
            ICE_CONNECTION_STATE_DISCONNECTED_STR => RTCIceConnectionState::Disconnected,
            ICE_CONNECTION_STATE_FAILED_STR => RTCIceConnectionState::Failed,
            ICE_CONNECTION_STATE_CLOSED_STR => RTCIceConnectionState::Closed,
            _ => RTCIceConnectionState::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceConnectionState::New => ICE_CONNECTION_STATE_NEW_STR,
            RTCIceConnectionState::Checking => ICE_CONNECTION_STATE_CHECKING_STR,
            RTCIceConnectionState::Connected => ICE_CONNECTION_STATE_CONNECTED_STR,
            RTCIceConnectionState::Completed => ICE_CONNECTION_STATE_COMPLETED_STR,
            RTCIceConnectionState::Disconnected => ICE_CONNECTION_STATE_DISCONNECTED_STR,
            RTCIceConnectionState::Failed => ICE_CONNECTION_STATE_FAILED_STR,
            RTCIceConnectionState::Closed => ICE_CONNECTION_STATE_CLOSED_STR,
            RTCIceConnectionState::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl From<ConnectionState> for RTCIceConnectionState {
    fn from(raw: ConnectionState) -> Self {
        match raw {
            ConnectionState::New => RTCIceConnectionState::New,
            ConnectionState::Checking => RTCIceConnectionState::Checking,
            ConnectionState::Connected => RTCIceConnectionState::Connected,
            ConnectionState::Completed => RTCIceConnectionState::Completed,
            ConnectionState::Failed => RTCIceConnectionState::Failed,
            ConnectionState::Disconnected => RTCIceConnectionState::Disconnected,
            ConnectionState::Closed => RTCIceConnectionState::Closed,
            ConnectionState::Unspecified => RTCIceConnectionState::Unspecified,
        }
    }
}
