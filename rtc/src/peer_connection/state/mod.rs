//! State machines a peer connection reports through events.
//!
//! [`RTCPeerConnectionState`] folds the ICE, DTLS and SCTP transport states
//! into one value; the others track a single layer.

pub(crate) mod ice_connection_state;
pub(crate) mod ice_gathering_state;
pub(crate) mod peer_connection_state;
pub(crate) mod signaling_state;

pub use ice_connection_state::RTCIceConnectionState;
pub use ice_gathering_state::RTCIceGatheringState;
pub use peer_connection_state::RTCPeerConnectionState;
pub use signaling_state::RTCSignalingState;
