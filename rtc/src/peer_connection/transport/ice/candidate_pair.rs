use std::fmt;

use super::candidate::RTCIceCandidate;

/// The local and remote candidates of the pair the ICE agent selected.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCIceCandidatePair {
    local: RTCIceCandidate,
    remote: RTCIceCandidate,
}

impl fmt::Display for RTCIceCandidatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(local) {} <-> (remote) {}", self.local, self.remote)
    }
}

impl RTCIceCandidatePair {
    pub fn new(local: RTCIceCandidate, remote: RTCIceCandidate) -> Self {
        RTCIceCandidatePair { local, remote }
    }

    pub fn local(&self) -> &RTCIceCandidate {
        &self.local
    }

    pub fn remote(&self) -> &RTCIceCandidate {
        &self.remote
    }
}
