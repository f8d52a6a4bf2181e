use std::fmt;

use ice::state::GatheringState;
use serde::{Deserialize, Serialize};

use crate::peer_connection::configuration::UNSPECIFIED_STR;

/// Progress of local candidate gathering.
///
/// * [W3C RTCIceGatheringState](https://w3c.github.io/webrtc-pc/#dom-rtcicegatheringstate)
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RTCIceGatheringState {
    #[default]
    Unspecified,
    New,
    Gathering,
    Complete,
}

const ICE_GATHERING_STATE_NEW_STR: &str = "new";
const ICE_GATHERING_STATE_GATHERING_STR: &str = "gathering";
const ICE_GATHERING_STATE_COMPLETE_STR: &str = "complete";

impl From<&str> for RTCIceGatheringState {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_GATHERING_STATE_NEW_STR => RTCIceGatheringState::New,
            ICE_GATHERING_STATE_GATHERING_STR => RTCIceGatheringState::Gathering,
            ICE_GATHERING_STATE_COMPLETE_STR => RTCIceGatheringState::Complete,
            _ => RTCIceGatheringState::Unspecified,
        }
    }
}

impl From<GatheringState> for RTCIceGatheringState {
    fn from(state: GatheringState) -> Self {
        match state {
            GatheringState::New => RTCIceGatheringState::New,
            GatheringState::Gathering => RTCIceGatheringState::Gathering,
            GatheringState::Complete => RTCIceGatheringState::Complete,
            GatheringState::Unspecified => RTCIceGatheringState::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceGatheringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceGatheringState::New => ICE_GATHERING_STATE_NEW_STR,
            RTCIceGatheringState::Gathering => ICE_GATHERING_STATE_GATHERING_STR,
            RTCIceGatheringState::Complete => ICE_GATHERING_STATE_COMPLETE_STR,
            RTCIceGatheringState::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}
