use crate::data_channel::RTCDataChannelId;

/// Properties of a data channel passed to
/// [`create_data_channel`](crate::peer_connection::RTCPeerConnection::create_data_channel).
///
/// At most one of `max_packet_life_time` and `max_retransmits` may be set.
///
/// * [W3C RTCDataChannelInit](https://w3c.github.io/webrtc-pc/#dom-rtcdatachannelinit)
#[derive(Default, Debug, Clone)]
pub struct RTCDataChannelInit {
    /// Whether messages must arrive in order. Defaults to true.
    pub ordered: Option<bool>,

    /// Milliseconds during which a message is (re)transmitted before it is
    /// abandoned.
    pub max_packet_life_time: Option<u16>,

    /// Number of retransmissions before a message is abandoned.
    pub max_retransmits: Option<u16>,

    /// Subprotocol name announced to the peer.
    pub protocol: Option<String>,

    /// Some(id) when the application negotiates the channel out of band and
    /// creates it with the same id on both sides. No DATA_CHANNEL_OPEN is
    /// sent then.
    pub negotiated: Option<RTCDataChannelId>,
}
