/// Options of [`create_answer`](crate::peer_connection::RTCPeerConnection::create_answer).
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone)]
pub struct RTCAnswerOptions {
    /// Accepted for API compatibility; no comfort-noise negotiation is done.
    pub voice_activity_detection: bool,
}

/// Options of [`create_offer`](crate::peer_connection::RTCPeerConnection::create_offer).
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#dictionary-rtcofferoptions-members)
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone)]
pub struct RTCOfferOptions {
    /// Restart ICE with fresh local credentials before generating the offer.
    /// The DTLS and SCTP associations are kept.
    pub ice_restart: bool,
}
