use serde::{Deserialize, Serialize};

/// The ICE credentials announced in a session description.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTCIceParameters {
    pub username_fragment: String,
    pub password: String,
    pub ice_lite: bool,
}
