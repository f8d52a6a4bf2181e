pub mod init;
pub(crate) mod internal;
pub mod message;
pub mod state;

pub use init::RTCDataChannelInit;
pub use message::RTCDataChannelMessage;
pub use state::RTCDataChannelState;

use bytes::Bytes;
use datachannel::DataChannel;
use interceptor::{Interceptor, NoopInterceptor};
use log::trace;
use shared::error::{Error, Result};

use crate::data_channel::internal::RTCDataChannelInternal;
use crate::peer_connection::RTCPeerConnection;
use crate::peer_connection::event::{RTCDataChannelEvent, RTCPeerConnectionEvent};

/// Identifier for a data channel within a particular peer connection, the
/// SCTP stream identifier it runs on.
pub type RTCDataChannelId = u16;

/// DataChannel represents a WebRTC DataChannel
/// The DataChannel interface represents a network channel
/// which can be used for bidirectional peer-to-peer transfers of arbitrary data
///
/// A short lived handle borrowed from
/// [`RTCPeerConnection::data_channel`](crate::peer_connection::RTCPeerConnection::data_channel)
/// or returned by
/// [`create_data_channel`](crate::peer_connection::RTCPeerConnection::create_data_channel).
///
/// ## Specifications
///
/// * [MDN]
/// * [W3C]
///
/// [MDN]: https://developer.mozilla.org/en-US/docs/Web/API/RTCDataChannel
/// [W3C]: https://w3c.github.io/webrtc-pc/#dom-rtcdatachannel
pub struct RTCDataChannel<'a, I = NoopInterceptor>
where
    I: Interceptor,
{
    pub(crate) id: RTCDataChannelId,
    pub(crate) peer_connection: &'a mut RTCPeerConnection<I>,
}

impl<I> RTCDataChannel<'_, I>
where
    I: Interceptor,
{
    fn internal(&self) -> Result<&RTCDataChannelInternal> {
        self.peer_connection
            .data_channels
            .get(&self.id)
            .ok_or(Error::ErrDataChannelClosed)
    }

    /// label represents a label that can be used to distinguish this
    /// DataChannel object from other DataChannel objects. Scripts are
    /// allowed to create multiple DataChannel objects with the same label.
    pub fn label(&self) -> Result<String> {
        Ok(self.internal()?.label.clone())
    }

    /// Ordered returns true if the DataChannel is ordered, and false if
    /// out-of-order delivery is allowed.
    pub fn ordered(&self) -> Result<bool> {
        Ok(self.internal()?.ordered)
    }

    /// max_packet_lifetime represents the length of the time window (msec) during
    /// which transmissions and retransmissions may occur in unreliable mode.
    pub fn max_packet_life_time(&self) -> Result<Option<u16>> {
        Ok(self.internal()?.max_packet_life_time)
    }

    /// max_retransmits represents the maximum number of retransmissions that are
    /// attempted in unreliable mode.
    pub fn max_retransmits(&self) -> Result<Option<u16>> {
        Ok(self.internal()?.max_retransmits)
    }

    pub fn protocol(&self) -> Result<String> {
        Ok(self.internal()?.protocol.clone())
    }

    /// negotiated represents whether this DataChannel was negotiated by the
    /// application (true), or not (false).
    pub fn negotiated(&self) -> Result<bool> {
        Ok(self.internal()?.negotiated)
    }

    pub fn id(&self) -> RTCDataChannelId {
        self.id
    }

    pub fn ready_state(&self) -> Result<RTCDataChannelState> {
        Ok(self.internal()?.ready_state)
    }

    /// buffered_amount represents the number of bytes of application data
    /// that have been queued using send() and not yet handed to the network.
    /// It does not include framing overhead.
    pub fn buffered_amount(&mut self) -> Result<usize> {
        self.internal()?;
        let peer_connection = &mut *self.peer_connection;
        let Some(association) = peer_connection
            .pipeline_context
            .sctp_handler_context
            .sctp_transport
            .association
            .as_mut()
        else {
            return Ok(0);
        };

        match association.stream(self.id) {
            Ok(stream) => Ok(stream.buffered_amount().unwrap_or(0)),
            Err(_) => Ok(0),
        }
    }

    /// buffered_amount_low_threshold represents the threshold at which the
    /// bufferedAmount is considered to be low. It is zero by default.
    pub fn buffered_amount_low_threshold(&self) -> Result<usize> {
        Ok(self.internal()?.buffered_amount_low_threshold)
    }

    /// Sets the threshold below which an
    /// [`OnBufferedAmountLow`](crate::peer_connection::event::RTCDataChannelEvent::OnBufferedAmountLow)
    /// event fires. The event fires once each time the buffered amount
    /// drops from above the threshold to at or below it.
    pub fn set_buffered_amount_low_threshold(&mut self, threshold: usize) -> Result<()> {
        let peer_connection = &mut *self.peer_connection;
        let Some(dc) = peer_connection.data_channels.get_mut(&self.id) else {
            return Err(Error::ErrDataChannelClosed);
        };
        dc.buffered_amount_low_threshold = threshold;

        let Some(data_channel) = &dc.data_channel else {
            // applied when the channel opens
            return Ok(());
        };
        let Some(association) = peer_connection
            .pipeline_context
            .sctp_handler_context
            .sctp_transport
            .association
            .as_mut()
        else {
            return Ok(());
        };
        let mut stream = association.stream(self.id)?;
        data_channel.set_buffered_amount_low_threshold(&mut stream, threshold)
    }

    /// send sends the binary message to the DataChannel peer
    pub fn send(&mut self, data: Bytes) -> Result<usize> {
        self.write(data, false)
    }

    /// send_text sends the text message to the DataChannel peer
    pub fn send_text(&mut self, s: impl Into<String>) -> Result<usize> {
        self.write(Bytes::from(s.into()), true)
    }

    pub(crate) fn write(&mut self, data: Bytes, is_string: bool) -> Result<usize> {
        let peer_connection = &mut *self.peer_connection;
        let Some(dc) = peer_connection.data_channels.get_mut(&self.id) else {
            return Err(Error::ErrDataChannelClosed);
        };
        let sctp_transport = &mut peer_connection.pipeline_context.sctp_handler_context.sctp_transport;

        if data.len() > sctp_transport.max_message_size() as usize {
            return Err(Error::ErrOutboundPacketTooLarge);
        }

        let (Some(data_channel), Some(association)) =
            (dc.data_channel.as_mut(), sctp_transport.association.as_mut())
        else {
            return Err(Error::ErrSCTPNotEstablished);
        };

        let mut stream = association.stream(self.id)?;
        let n = data_channel.write_data_channel(&mut stream, &data, is_string)?;
        trace!("data channel {} queued {} bytes", self.id, n);
        Ok(n)
    }

    /// Starts the closing procedure by resetting the outgoing stream. The
    /// channel is `Closed` once the peer resets its side too.
    pub fn close(&mut self) -> Result<()> {
        let peer_connection = &mut *self.peer_connection;
        let Some(dc) = peer_connection.data_channels.get_mut(&self.id) else {
            return Err(Error::ErrDataChannelClosed);
        };
        if matches!(
            dc.ready_state,
            RTCDataChannelState::Closing | RTCDataChannelState::Closed
        ) {
            return Ok(());
        }

        let association = peer_connection
            .pipeline_context
            .sctp_handler_context
            .sctp_transport
            .association
            .as_mut();
        match (dc.data_channel.as_mut(), association) {
            (Some(data_channel), Some(association)) => {
                let mut stream = association.stream(self.id)?;
                data_channel.close(&mut stream)?;
                dc.ready_state = RTCDataChannelState::Closing;
                peer_connection.pipeline_context.event_outs.push_back(
                    RTCPeerConnectionEvent::OnDataChannel(RTCDataChannelEvent::OnClosing(self.id)),
                );
            }
            (Some(data_channel), None) => {
                data_channel.set_closed();
                dc.ready_state = RTCDataChannelState::Closed;
            }
            // never opened
            (None, _) => dc.ready_state = RTCDataChannelState::Closed,
        }

        Ok(())
    }
}

/// Picks the next free stream id: even ids belong to the DTLS client, odd
/// ids to the DTLS server.
pub(crate) fn generate_data_channel_id(
    is_dtls_client: bool,
    max_channels: u16,
    in_use: impl Fn(RTCDataChannelId) -> bool,
) -> Result<RTCDataChannelId> {
    DataChannel::generate_stream_id(is_dtls_client, max_channels, in_use)
}
