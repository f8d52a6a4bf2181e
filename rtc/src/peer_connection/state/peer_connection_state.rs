use std::fmt;

use serde::{Deserialize, Serialize};

use crate::peer_connection::configuration::UNSPECIFIED_STR;
use crate::peer_connection::state::RTCIceConnectionState;
use crate::peer_connection::transport::{RTCDtlsTransportState, RTCSctpTransportState};

/// Aggregate state of the ICE, DTLS and SCTP transports of a peer connection.
///
/// * [W3C RTCPeerConnectionState](https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnectionstate)
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RTCPeerConnectionState {
    #[default]
    Unspecified,

    /// Every transport is new or closed.
    New,

    /// Some transport is still establishing its connection.
    Connecting,

    /// Every transport is connected.
    Connected,

    /// Some transport lost connectivity after being connected.
    Disconnected,

    /// Some transport failed. ICE exhausted every pair, or DTLS failed its
    /// handshake or the remote fingerprint check.
    Failed,

    Closed,
}

const PEER_CONNECTION_STATE_NEW_STR: &str = "new";
const PEER_CONNECTION_STATE_CONNECTING_STR: &str = "connecting";
const PEER_CONNECTION_STATE_CONNECTED_STR: &str = "connected";
const PEER_CONNECTION_STATE_DISCONNECTED_STR: &str = "disconnected";
const PEER_CONNECTION_STATE_FAILED_STR: &str = "failed";
const PEER_CONNECTION_STATE_CLOSED_STR: &str = "closed";

impl From<&str> for RTCPeerConnectionState {
    fn from(raw: &str) -> Self {
        match raw {
            PEER_CONNECTION_STATE_NEW_STR => RTCPeerConnectionState::New,
            PEER_CONNECTION_STATE_CONNECTING_STR => RTCPeerConnectionState::Connecting,
            PEER_CONNECTION_STATE_CONNECTED_STR => RTCPeerConnectionState::Connected,
            PEER_CONNECTION_STATE_DISCONNECTED_STR => RTCPeerConnectionState::Disconnected,
            PEER_CONNECTION_STATE_FAILED_STR => RTCPeerConnectionState::Failed,
            PEER_CONNECTION_STATE_CLOSED_STR => RTCPeerConnectionState::Closed,
            _ => RTCPeerConnectionState::Unspecified,
        }
    }
}

impl fmt::Display for RTCPeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCPeerConnectionState::New => PEER_CONNECTION_STATE_NEW_STR,
            RTCPeerConnectionState::Connecting => PEER_CONNECTION_STATE_CONNECTING_STR,
            RTCPeerConnectionState::Connected => PEER_CONNECTION_STATE_CONNECTED_STR,
            RTCPeerConnectionState::Disconnected => PEER_CONNECTION_STATE_DISCONNECTED_STR,
            RTCPeerConnectionState::Failed => PEER_CONNECTION_STATE_FAILED_STR,
            RTCPeerConnectionState::Closed => PEER_CONNECTION_STATE_CLOSED_STR,
            RTCPeerConnectionState::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl RTCPeerConnectionState {
    /// Folds the transport states into the connection state.
    ///
    /// Failed wins over everything. A connection whose transports are all new
    /// is new, one with any transport still working towards a connection is
    /// connecting, and one whose transports are all up is connected. Anything
    /// else counts as disconnected. `sctp` is None when no data channel
    /// section was negotiated.
    pub(crate) fn aggregate(
        is_closed: bool,
        ice: RTCIceConnectionState,
        dtls: RTCDtlsTransportState,
        sctp: Option<RTCSctpTransportState>,
    ) -> Self {
        use RTCDtlsTransportState as Dtls;
        use RTCIceConnectionState as Ice;
        use RTCSctpTransportState as Sctp;

        if is_closed {
            return RTCPeerConnectionState::Closed;
        }
        if ice == Ice::Failed || dtls == Dtls::Failed {
            return RTCPeerConnectionState::Failed;
        }

        let ice_idle = matches!(ice, Ice::New | Ice::Closed | Ice::Unspecified);
        let dtls_idle = matches!(dtls, Dtls::New | Dtls::Closed | Dtls::Unspecified);
        if ice_idle && dtls_idle {
            return RTCPeerConnectionState::New;
        }

        if matches!(ice, Ice::New | Ice::Checking)
            || matches!(dtls, Dtls::New | Dtls::Connecting)
            || matches!(sctp, Some(Sctp::New | Sctp::Connecting))
        {
            return RTCPeerConnectionState::Connecting;
        }

        if matches!(ice, Ice::Connected | Ice::Completed)
            && dtls == Dtls::Connected
            && matches!(sctp, None | Some(Sctp::Connected))
        {
            return RTCPeerConnectionState::Connected;
        }

        RTCPeerConnectionState::Disconnected
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_peer_connection_state() {
        let tests = vec![
            (UNSPECIFIED_STR, RTCPeerConnectionState::Unspecified),
            ("new", RTCPeerConnectionState::New),
            ("connecting", RTCPeerConnectionState::Connecting),
            ("connected", RTCPeerConnectionState::Connected),
            ("disconnected", RTCPeerConnectionState::Disconnected),
            ("failed", RTCPeerConnectionState::Failed),
            ("closed", RTCPeerConnectionState::Closed),
        ];

        for (state_string, expected_state) in tests {
            assert_eq!(
                RTCPeerConnectionState::from(state_string),
                expected_state,
                "testCase: {expected_state}",
            );
            assert_eq!(expected_state.to_string(), state_string);
        }
    }

    #[test]
    fn test_peer_connection_state_aggregate() {
        use RTCDtlsTransportState as Dtls;
        use RTCIceConnectionState as Ice;

        let tests = vec![
            (false, Ice::New, Dtls::New, RTCPeerConnectionState::New),
            (false, Ice::Checking, Dtls::New, RTCPeerConnectionState::Connecting),
            (false, Ice::Connected, Dtls::New, RTCPeerConnectionState::Connecting),
            (false, Ice::Connected, Dtls::Connecting, RTCPeerConnectionState::Connecting),
            (false, Ice::Connected, Dtls::Connected, RTCPeerConnectionState::Connected),
            (false, Ice::Completed, Dtls::Connected, RTCPeerConnectionState::Connected),
            (false, Ice::Checking, Dtls::Connected, RTCPeerConnectionState::Connecting),
            (false, Ice::Disconnected, Dtls::Connected, RTCPeerConnectionState::Disconnected),
            (false, Ice::Connected, Dtls::Failed, RTCPeerConnectionState::Failed),
            (false, Ice::Failed, Dtls::Connecting, RTCPeerConnectionState::Failed),
            (false, Ice::Connected, Dtls::Closed, RTCPeerConnectionState::Disconnected),
            (true, Ice::Connected, Dtls::Connected, RTCPeerConnectionState::Closed),
        ];

        for (is_closed, ice, dtls, expected) in tests {
            assert_eq!(
                RTCPeerConnectionState::aggregate(is_closed, ice, dtls, None),
                expected,
                "ice {ice} dtls {dtls}"
            );
        }
    }

    #[test]
    fn test_peer_connection_state_aggregate_with_sctp() {
        use RTCDtlsTransportState as Dtls;
        use RTCIceConnectionState as Ice;
        use RTCSctpTransportState as Sctp;

        let tests = vec![
            (Ice::Connected, Dtls::Connected, Sctp::Connecting, RTCPeerConnectionState::Connecting),
            (Ice::Connected, Dtls::Connected, Sctp::Connected, RTCPeerConnectionState::Connected),
            (Ice::Connected, Dtls::Connected, Sctp::Closed, RTCPeerConnectionState::Disconnected),
            (Ice::Connected, Dtls::Failed, Sctp::Connecting, RTCPeerConnectionState::Failed),
        ];

        for (ice, dtls, sctp, expected) in tests {
            assert_eq!(
                RTCPeerConnectionState::aggregate(false, ice, dtls, Some(sctp)),
                expected,
                "ice {ice} dtls {dtls} sctp {sctp}"
            );
        }
    }
}
