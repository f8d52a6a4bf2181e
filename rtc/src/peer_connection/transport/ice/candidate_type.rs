use std::fmt;

use ice::candidate::CandidateType;
use serde::{Deserialize, Serialize};

/// The type of an ICE candidate.
///
/// * [W3C RTCIceCandidateType](https://w3c.github.io/webrtc-pc/#rtcicecandidatetype-enum)
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCIceCandidateType {
    #[default]
    Unspecified,

    /// An address of a local network interface.
    #[serde(rename = "host")]
    Host,

    /// A NAT binding learned from a STUN server, or announced through
    /// 1:1 NAT mapping.
    #[serde(rename = "srflx")]
    Srflx,

    /// A NAT binding discovered during connectivity checks.
    #[serde(rename = "prflx")]
    Prflx,

    /// An address allocated on a TURN server.
    #[serde(rename = "relay")]
    Relay,
}

const ICE_CANDIDATE_TYPE_HOST_STR: &str = "host";
const ICE_CANDIDATE_TYPE_SRFLX_STR: &str = "srflx";
const ICE_CANDIDATE_TYPE_PRFLX_STR: &str = "prflx";
const ICE_CANDIDATE_TYPE_RELAY_STR: &str = "relay";

impl From<&str> for RTCIceCandidateType {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_CANDIDATE_TYPE_HOST_STR => RTCIceCandidateType::Host,
            ICE_CANDIDATE_TYPE_SRFLX_STR => RTCIceCandidateType::Srflx,
            ICE_CANDIDATE_TYPE_PRFLX_STR => RTCIceCandidateType::Prflx,
            ICE_CANDIDATE_TYPE_RELAY_STR => RTCIceCandidateType::Relay,
            _ => RTCIceCandidateType::Unspecified,
        }
    }
}

impl From<CandidateType> for RTCIceCandidateType {
    fn from(candidate_type: CandidateType) -> Self {
        match candidate_type {
            CandidateType::Host => RTCIceCandidateType::Host,
            CandidateType::ServerReflexive => RTCIceCandidateType::Srflx,
            CandidateType::PeerReflexive => RTCIceCandidateType::Prflx,
            CandidateType::Relay => RTCIceCandidateType::Relay,
            CandidateType::Unspecified => RTCIceCandidateType::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceCandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceCandidateType::Host => ICE_CANDIDATE_TYPE_HOST_STR,
            RTCIceCandidateType::Srflx => ICE_CANDIDATE_TYPE_SRFLX_STR,
            RTCIceCandidateType::Prflx => ICE_CANDIDATE_TYPE_PRFLX_STR,
            RTCIceCandidateType::Relay => ICE_CANDIDATE_TYPE_RELAY_STR,
            RTCIceCandidateType::Unspecified => {
                crate::peer_connection::configuration::UNSPECIFIED_STR
            }
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ice_candidate_type() {
        let tests = vec![
            ("Unspecified", RTCIceCandidateType::Unspecified),
            ("host", RTCIceCandidateType::Host),
            ("srflx", RTCIceCandidateType::Srflx),
            ("prflx", RTCIceCandidateType::Prflx),
            ("relay", RTCIceCandidateType::Relay),
        ];

        for (type_string, expected_type) in tests {
            assert_eq!(RTCIceCandidateType::from(type_string), expected_type);
        }
    }

    #[test]
    fn test_ice_candidate_type_string() {
        let tests = vec![
            (RTCIceCandidateType::Unspecified, "Unspecified"),
            (RTCIceCandidateType::Host, "host"),
            (RTCIceCandidateType::Srflx, "srflx"),
            (RTCIceCandidateType::Prflx, "prflx"),
            (RTCIceCandidateType::Relay, "relay"),
        ];

        for (ctype, expected_string) in tests {
            assert_eq!(ctype.to_string(), expected_string);
        }
    }

    #[test]
    fn test_ice_candidate_type_from_agent_type() {
        assert_eq!(
            RTCIceCandidateType::from(CandidateType::ServerReflexive),
            RTCIceCandidateType::Srflx
        );
        assert_eq!(
            RTCIceCandidateType::from(CandidateType::Host),
            RTCIceCandidateType::Host
        );
    }
}
