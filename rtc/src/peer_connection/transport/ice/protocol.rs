use std::fmt;

use serde::{Deserialize, Serialize};

/// The transport protocol of an ICE candidate.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCIceProtocol {
    #[default]
    Unspecified,
    #[serde(rename = "udp")]
    Udp,
    #[serde(rename = "tcp")]
    Tcp,
}

const ICE_PROTOCOL_UDP_STR: &str = "udp";
const ICE_PROTOCOL_TCP_STR: &str = "tcp";

/// Accepts the network short names used by the agent, so "udp4" maps to Udp.
impl From<&str> for RTCIceProtocol {
    fn from(raw: &str) -> Self {
        let raw = raw.to_lowercase();
        if raw.starts_with(ICE_PROTOCOL_UDP_STR) {
            RTCIceProtocol::Udp
        } else if raw.starts_with(ICE_PROTOCOL_TCP_STR) {
            RTCIceProtocol::Tcp
        } else {
            RTCIceProtocol::Unspecified
        }
    }
}

impl fmt::Display for RTCIceProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceProtocol::Udp => ICE_PROTOCOL_UDP_STR,
            RTCIceProtocol::Tcp => ICE_PROTOCOL_TCP_STR,
            RTCIceProtocol::Unspecified => crate::peer_connection::configuration::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_ice_protocol() {
        let tests = vec![
            ("Unspecified", RTCIceProtocol::Unspecified),
            ("udp", RTCIceProtocol::Udp),
            ("udp4", RTCIceProtocol::Udp),
            ("tcp", RTCIceProtocol::Tcp),
            ("UDP", RTCIceProtocol::Udp),
            ("TCP6", RTCIceProtocol::Tcp),
        ];

        for (proto_string, expected_proto) in tests {
            assert_eq!(
                RTCIceProtocol::from(proto_string),
                expected_proto,
                "testCase: {proto_string}"
            );
        }
    }

    #[test]
    fn test_ice_protocol_string() {
        assert_eq!(RTCIceProtocol::Unspecified.to_string(), "Unspecified");
        assert_eq!(RTCIceProtocol::Udp.to_string(), "udp");
        assert_eq!(RTCIceProtocol::Tcp.to_string(), "tcp");
    }
}
