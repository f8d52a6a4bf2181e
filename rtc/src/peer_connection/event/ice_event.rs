use crate::peer_connection::transport::ice::candidate::RTCIceCandidate;

/// A newly gathered local candidate. `candidate` is `None` once gathering
/// is complete (end-of-candidates).
#[derive(Default, Clone, Debug)]
pub struct RTCPeerConnectionIceEvent {
    pub candidate: Option<RTCIceCandidate>,
    pub url: String,
}
