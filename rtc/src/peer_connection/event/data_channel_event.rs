use crate::data_channel::RTCDataChannelId;

/// Lifecycle events of a data channel. Messages are delivered through
/// [`RTCMessage::DataChannelMessage`](crate::peer_connection::message::RTCMessage::DataChannelMessage).
#[allow(clippy::enum_variant_names)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RTCDataChannelEvent {
    /// The channel is open. For channels created by the remote this is the
    /// first event carrying the id.
    OnOpen(RTCDataChannelId),
    /// The buffered amount dropped to or below the low threshold.
    OnBufferedAmountLow(RTCDataChannelId),
    OnClosing(RTCDataChannelId),
    OnClose(RTCDataChannelId),
}
