use crate::peer_connection::state::ice_connection_state::RTCIceConnectionState;
use crate::peer_connection::state::ice_gathering_state::RTCIceGatheringState;
use crate::peer_connection::state::peer_connection_state::RTCPeerConnectionState;
use crate::peer_connection::state::signaling_state::RTCSignalingState;

mod data_channel_event;
mod ice_event;
mod track_event;

pub use data_channel_event::RTCDataChannelEvent;
pub use ice_event::RTCPeerConnectionIceEvent;
pub use track_event::RTCTrackEvent;

/// Events surfaced by [`poll_event`](sansio::Protocol::poll_event).
#[allow(clippy::enum_variant_names)]
#[derive(Default, Debug, Clone)]
pub enum RTCPeerConnectionEvent {
    #[default]
    OnNegotiationNeededEvent,
    OnIceCandidateEvent(RTCPeerConnectionIceEvent),
    OnSignalingStateChangeEvent(RTCSignalingState),
    OnIceConnectionStateChangeEvent(RTCIceConnectionState),
    OnIceGatheringStateChangeEvent(RTCIceGatheringState),
    OnConnectionStateChangeEvent(RTCPeerConnectionState),

    // The Peer-to-peer data API extends the RTCPeerConnection interface as described below.
    OnDataChannel(RTCDataChannelEvent),

    // The RTP media API extends the RTCPeerConnection interface as described below.
    OnTrack(RTCTrackEvent),
}

pub(crate) enum RTCEventInternal {
    ICESelectedCandidatePairChange,
    DTLSHandshakeComplete {
        is_client: bool,
        local_srtp_context: Option<srtp::context::Context>,
        remote_srtp_context: Option<srtp::context::Context>,
    },
    SCTPHandshakeComplete,
    RTCPeerConnectionEvent(RTCPeerConnectionEvent),
}
