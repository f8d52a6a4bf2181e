use std::fmt;

use ice::candidate::{
    Candidate, CandidateConfig, candidate_host::CandidateHostConfig,
    candidate_peer_reflexive::CandidatePeerReflexiveConfig, candidate_relay::CandidateRelayConfig,
    candidate_server_reflexive::CandidateServerReflexiveConfig,
};
use ice::tcp_type::TcpType;
use ice::url::Url;
use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};

use super::candidate_type::RTCIceCandidateType;
use super::protocol::RTCIceProtocol;

#[derive(Default, PartialEq, Eq, Debug, Copy, Clone, Serialize, Deserialize)]
pub enum RTCIceTcpCandidateType {
    #[default]
    Unspecified,

    #[serde(rename = "active")]
    Active,

    #[serde(rename = "passive")]
    Passive,

    #[serde(rename = "so")]
    SimultaneousOpen,
}

impl From<TcpType> for RTCIceTcpCandidateType {
    fn from(t: TcpType) -> Self {
        match t {
            TcpType::Unspecified => RTCIceTcpCandidateType::Unspecified,
            TcpType::Active => RTCIceTcpCandidateType::Active,
            TcpType::Passive => RTCIceTcpCandidateType::Passive,
            TcpType::SimultaneousOpen => RTCIceTcpCandidateType::SimultaneousOpen,
        }
    }
}

impl RTCIceTcpCandidateType {
    pub(crate) fn to_ice(self) -> TcpType {
        match self {
            RTCIceTcpCandidateType::Unspecified => TcpType::Unspecified,
            RTCIceTcpCandidateType::Active => TcpType::Active,
            RTCIceTcpCandidateType::Passive => TcpType::Passive,
            RTCIceTcpCandidateType::SimultaneousOpen => TcpType::SimultaneousOpen,
        }
    }
}

/// A transport address the ICE agent can use, local or remote.
///
/// * [W3C RTCIceCandidate](https://w3c.github.io/webrtc-pc/#rtcicecandidate-interface)
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCIceCandidate {
    pub id: String,
    pub foundation: String,
    pub priority: u32,
    pub address: String,
    pub protocol: RTCIceProtocol,
    pub port: u16,
    pub typ: RTCIceCandidateType,
    pub component: u16,
    pub related_address: String,
    pub related_port: u16,
    pub tcp_type: RTCIceTcpCandidateType,
    /// The STUN or TURN server a srflx or relay candidate was learned from.
    pub url: Option<String>,
}

impl From<&Candidate> for RTCIceCandidate {
    fn from(c: &Candidate) -> Self {
        let (related_address, related_port) = if let Some(ra) = c.related_address() {
            (ra.address, ra.port)
        } else {
            (String::new(), 0)
        };

        RTCIceCandidate {
            id: c.id(),
            foundation: c.foundation(),
            priority: c.priority(),
            address: c.address().to_owned(),
            protocol: RTCIceProtocol::from(c.network_type().network_short().as_str()),
            port: c.port(),
            typ: c.candidate_type().into(),
            component: c.component(),
            related_address,
            related_port,
            tcp_type: c.tcp_type().into(),
            url: c.url().map(|u| u.to_string()),
        }
    }
}

impl RTCIceCandidate {
    pub(crate) fn to_ice(&self) -> Result<Candidate> {
        let base_config = CandidateConfig {
            candidate_id: self.id.clone(),
            network: self.protocol.to_string(),
            address: self.address.clone(),
            port: self.port,
            component: self.component,
            foundation: self.foundation.clone(),
            priority: self.priority,
        };
        let url = match &self.url {
            Some(url) => Some(Url::parse_url(url)?),
            None => None,
        };

        let c = match self.typ {
            RTCIceCandidateType::Host => CandidateHostConfig {
                base_config,
                tcp_type: self.tcp_type.to_ice(),
            }
            .new_candidate_host()?,
            RTCIceCandidateType::Srflx => CandidateServerReflexiveConfig {
                base_config,
                rel_addr: self.related_address.clone(),
                rel_port: self.related_port,
                url,
            }
            .new_candidate_server_reflexive()?,
            RTCIceCandidateType::Prflx => CandidatePeerReflexiveConfig {
                base_config,
                rel_addr: self.related_address.clone(),
                rel_port: self.related_port,
            }
            .new_candidate_peer_reflexive()?,
            RTCIceCandidateType::Relay => CandidateRelayConfig {
                base_config,
                rel_addr: self.related_address.clone(),
                rel_port: self.related_port,
                url,
            }
            .new_candidate_relay()?,
            RTCIceCandidateType::Unspecified => return Err(Error::ErrICECandidateTypeUnknown),
        };

        Ok(c)
    }

    /// Serializes the candidate the way it travels over signaling.
    pub fn to_json(&self) -> Result<RTCIceCandidateInit> {
        let candidate = self.to_ice()?;

        Ok(RTCIceCandidateInit {
            candidate: format!("candidate:{}", candidate.marshal()),
            sdp_mid: Some(String::new()),
            sdp_mline_index: Some(0u16),
            username_fragment: None,
            url: self.url.clone(),
        })
    }
}

impl fmt::Display for RTCIceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}",
            self.protocol, self.typ, self.address, self.port
        )?;
        if !self.related_address.is_empty() {
            write!(
                f,
                " related {}:{}",
                self.related_address, self.related_port
            )?;
        }
        Ok(())
    }
}

/// The JSON form of a candidate exchanged through signaling.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTCIceCandidateInit {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    pub username_fragment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
}

impl RTCIceCandidateInit {
    /// Parses the candidate line, with or without its "candidate:" prefix.
    pub(crate) fn to_ice(&self) -> Result<Candidate> {
        ice::candidate::unmarshal_candidate(&self.candidate)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ice_candidate_serialization() {
        let tests = vec![
            (
                RTCIceCandidateInit {
                    candidate: "candidate:abc123".to_string(),
                    sdp_mid: Some("0".to_string()),
                    sdp_mline_index: Some(0),
                    username_fragment: Some("def".to_string()),
                    url: None,
                },
                r#"{"candidate":"candidate:abc123","sdpMid":"0","sdpMLineIndex":0,"usernameFragment":"def"}"#,
            ),
            (
                RTCIceCandidateInit {
                    candidate: "candidate:abc123".to_string(),
                    sdp_mid: None,
                    sdp_mline_index: None,
                    username_fragment: None,
                    url: None,
                },
                r#"{"candidate":"candidate:abc123","sdpMid":null,"sdpMLineIndex":null,"usernameFragment":null}"#,
            ),
            (
                RTCIceCandidateInit {
                    candidate: "candidate:relay123".to_string(),
                    sdp_mid: Some("0".to_string()),
                    sdp_mline_index: Some(0),
                    username_fragment: None,
                    url: Some("turn:turn.example.com:3478".to_string()),
                },
                r#"{"candidate":"candidate:relay123","sdpMid":"0","sdpMLineIndex":0,"usernameFragment":null,"url":"turn:turn.example.com:3478"}"#,
            ),
        ];

        for (candidate_init, expected_string) in tests {
            let result = serde_json::to_string(&candidate_init);
            assert!(result.is_ok(), "testCase: marshal err: {result:?}");
            let candidate_data = result.unwrap();
            assert_eq!(candidate_data, expected_string, "string is not expected");

            let result = serde_json::from_str::<RTCIceCandidateInit>(&candidate_data);
            assert!(result.is_ok(), "testCase: unmarshal err: {result:?}");
            if let Ok(actual_candidate_init) = result {
                assert_eq!(actual_candidate_init, candidate_init);
            }
        }
    }

    #[test]
    fn test_ice_candidate_host_round_trip_through_agent() -> Result<()> {
        let candidate = RTCIceCandidate {
            foundation: "1".to_owned(),
            priority: 2130706431,
            address: "10.0.0.1".to_owned(),
            protocol: RTCIceProtocol::Udp,
            port: 5000,
            typ: RTCIceCandidateType::Host,
            component: 1,
            ..Default::default()
        };

        let init = candidate.to_json()?;
        assert!(init.candidate.starts_with("candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host"));

        let parsed = RTCIceCandidate::from(&init.to_ice()?);
        assert_eq!(parsed.address, "10.0.0.1");
        assert_eq!(parsed.port, 5000);
        assert_eq!(parsed.typ, RTCIceCandidateType::Host);
        assert_eq!(parsed.protocol, RTCIceProtocol::Udp);
        Ok(())
    }

    #[test]
    fn test_ice_candidate_unknown_type() {
        let candidate = RTCIceCandidate {
            address: "10.0.0.1".to_owned(),
            port: 5000,
            ..Default::default()
        };
        assert_eq!(candidate.to_ice().err(), Some(Error::ErrICECandidateTypeUnknown));
    }
}
