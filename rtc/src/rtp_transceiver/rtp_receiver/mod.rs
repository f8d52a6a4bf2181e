#[cfg(test)]
mod rtp_receiver_test;

pub(crate) mod internal;

use interceptor::{Interceptor, NoopInterceptor};
use rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use sansio::Protocol;
use shared::error::{Error, Result};

use crate::media_stream::track::MediaStreamTrack;
use crate::peer_connection::RTCPeerConnection;
use crate::peer_connection::message::RTCMessage;
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::rtp_receiver::internal::RTCRtpReceiverInternal;
use crate::rtp_transceiver::rtp_sender::RTCRtpParameters;
use crate::rtp_transceiver::{RTCRtpReceiverId, SSRC};

/// Receives the remote track of a transceiver.
///
/// Borrowed from
/// [`RTCPeerConnection::rtp_receiver`](crate::peer_connection::RTCPeerConnection::rtp_receiver).
/// Incoming packets themselves are read from the peer connection with
/// `poll_read`; the receiver is where feedback about them is sent from.
///
/// * [W3C RTCRtpReceiver](https://w3c.github.io/webrtc-pc/#rtcrtpreceiver-interface)
pub struct RTCRtpReceiver<'a, I = NoopInterceptor>
where
    I: Interceptor,
{
    pub(crate) id: RTCRtpReceiverId,
    pub(crate) peer_connection: &'a mut RTCPeerConnection<I>,
}

impl<I> RTCRtpReceiver<'_, I>
where
    I: Interceptor,
{
    fn receiver(&self) -> &RTCRtpReceiverInternal {
        &self.peer_connection.rtp_transceivers[self.id.0].receiver
    }

    pub fn id(&self) -> RTCRtpReceiverId {
        self.id
    }

    /// The remote track, None until the remote description announced one.
    pub fn track(&self) -> Option<&MediaStreamTrack> {
        self.receiver().track.as_ref()
    }

    /// SSRC of the received media stream.
    pub fn ssrc(&self) -> Option<SSRC> {
        self.receiver().ssrc
    }

    /// Negotiated codecs and header extensions for receiving.
    pub fn get_parameters(&self) -> RTCRtpParameters {
        self.peer_connection
            .configuration
            .media_engine
            .get_rtp_parameters_by_kind(self.receiver().kind, RTCRtpTransceiverDirection::Recvonly)
    }

    /// Sends receiver side RTCP feedback such as PLI, FIR or NACK.
    pub fn write_rtcp(&mut self, packets: Vec<Box<dyn rtcp::Packet>>) -> Result<()> {
        let Some(track) = self.track() else {
            return Err(Error::ErrRTPReceiverNil);
        };
        let track_id = track.track_id().clone();
        self.peer_connection
            .handle_write(RTCMessage::RtcpPacket(track_id, packets))
    }

    /// Asks the remote sender for a keyframe with a Picture Loss Indication.
    pub fn request_keyframe(&mut self) -> Result<()> {
        let Some(media_ssrc) = self.ssrc() else {
            return Err(Error::ErrRTPReceiverNil);
        };
        let sender_ssrc = self.peer_connection.rtp_transceivers[self.id.0].sender.ssrc;

        self.write_rtcp(vec![Box::new(PictureLossIndication {
            sender_ssrc,
            media_ssrc,
        })])
    }
}
