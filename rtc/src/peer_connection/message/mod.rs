//! Application level messages of a peer connection.
//!
//! [`RTCMessage`] is what goes into
//! [`handle_write`](sansio::Protocol::handle_write) and comes out of
//! [`poll_read`](sansio::Protocol::poll_read). Encryption, packetization of
//! SCTP and the interceptor chain all happen below it.
//!
//! ```no_run
//! use rtc::peer_connection::message::RTCMessage;
//! use rtc::media_stream::track::MediaStreamTrackId;
//!
//! # fn example(message: RTCMessage) {
//! match message {
//!     RTCMessage::RtpPacket(track_id, packet) => {
//!         println!("{track_id}: seq {}", packet.header.sequence_number);
//!     }
//!     RTCMessage::RtcpPacket(track_id, packets) => {
//!         println!("{track_id}: {} rtcp packets", packets.len());
//!     }
//!     RTCMessage::DataChannelMessage(id, message) => {
//!         println!("channel {id}: {} bytes", message.data.len());
//!     }
//! }
//! # }
//! ```

use crate::data_channel::RTCDataChannelId;
use crate::data_channel::message::RTCDataChannelMessage;
use crate::media_stream::track::MediaStreamTrackId;

pub(crate) mod internal;

/// Messages sent or received through a peer connection.
#[derive(Debug, Clone)]
pub enum RTCMessage {
    /// RTP packet of a track. On the read side the track is the remote
    /// track of a receiver; on the write side packets are usually produced
    /// by [`RTCRtpSender`](crate::rtp_transceiver::rtp_sender::RTCRtpSender),
    /// which stamps SSRC and payload type.
    RtpPacket(MediaStreamTrackId, rtp::Packet),

    /// RTCP about a track, e.g. sender reports of the remote on the read
    /// side, or feedback such as PLI on the write side.
    RtcpPacket(MediaStreamTrackId, Vec<Box<dyn rtcp::Packet>>),

    /// A message received on a data channel. Sending goes through
    /// [`RTCDataChannel::send`](crate::data_channel::RTCDataChannel::send).
    DataChannelMessage(RTCDataChannelId, RTCDataChannelMessage),
}
