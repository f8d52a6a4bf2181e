use std::fmt;

use ice::attributes::control::Role;
use serde::{Deserialize, Serialize};

/// Whether the local ICE agent nominates the selected pair.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCIceRole {
    #[default]
    Unspecified,

    /// The agent that nominates candidate pairs. The offerer takes this
    /// role unless it is ICE lite.
    #[serde(rename = "controlling")]
    Controlling,

    #[serde(rename = "controlled")]
    Controlled,
}

const ICE_ROLE_CONTROLLING_STR: &str = "controlling";
const ICE_ROLE_CONTROLLED_STR: &str = "controlled";

impl From<&str> for RTCIceRole {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_ROLE_CONTROLLING_STR => RTCIceRole::Controlling,
            ICE_ROLE_CONTROLLED_STR => RTCIceRole::Controlled,
            _ => RTCIceRole::Unspecified,
        }
    }
}

impl From<Role> for RTCIceRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Controlling => RTCIceRole::Controlling,
            Role::Controlled => RTCIceRole::Controlled,
            Role::Unspecified => RTCIceRole::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceRole::Controlling => ICE_ROLE_CONTROLLING_STR,
            RTCIceRole::Controlled => ICE_ROLE_CONTROLLED_STR,
            RTCIceRole::Unspecified => crate::peer_connection::configuration::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_ice_role() {
        assert_eq!(RTCIceRole::from("controlling"), RTCIceRole::Controlling);
        assert_eq!(RTCIceRole::from("controlled"), RTCIceRole::Controlled);
        assert_eq!(RTCIceRole::from("Unspecified"), RTCIceRole::Unspecified);
    }

    #[test]
    fn test_ice_role_string() {
        assert_eq!(RTCIceRole::Controlling.to_string(), "controlling");
        assert_eq!(RTCIceRole::Controlled.to_string(), "controlled");
        assert_eq!(RTCIceRole::Unspecified.to_string(), "Unspecified");
    }
}
