#[cfg(test)]
mod rtp_sender_test;

pub(crate) mod internal;
pub mod rtcp_parameters;
pub mod rtp_codec;
pub mod rtp_parameters;

pub use rtcp_parameters::{RTCPFeedback, RTCRtcpParameters};
pub use rtp_codec::{RTCRtpCodec, RTCRtpCodecParameters, RtpCodecKind};
pub use rtp_parameters::{
    RTCRtpCodingParameters, RTCRtpEncodingParameters, RTCRtpFecParameters,
    RTCRtpHeaderExtensionCapability, RTCRtpHeaderExtensionParameters, RTCRtpParameters,
    RTCRtpRtxParameters, RTCRtpSendParameters,
};

use interceptor::{Interceptor, NoopInterceptor};
use log::trace;
use sansio::Protocol;
use shared::error::{Error, Result};

use crate::media_stream::Sample;
use crate::media_stream::track::MediaStreamTrack;
use crate::peer_connection::RTCPeerConnection;
use crate::peer_connection::message::RTCMessage;
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::rtp_sender::internal::RTCRtpSenderInternal;
use crate::rtp_transceiver::{RTCRtpSenderId, RTCRtpTransceiver};

/// Sends the track of a transceiver to the remote peer.
///
/// A short lived handle borrowed from
/// [`RTCPeerConnection::rtp_sender`](crate::peer_connection::RTCPeerConnection::rtp_sender).
/// Packets written through it go into the connection's write queue; drain
/// them with `poll_write`.
///
/// * [W3C RTCRtpSender](https://w3c.github.io/webrtc-pc/#rtcrtpsender-interface)
pub struct RTCRtpSender<'a, I = NoopInterceptor>
where
    I: Interceptor,
{
    pub(crate) id: RTCRtpSenderId,
    pub(crate) peer_connection: &'a mut RTCPeerConnection<I>,
}

impl<I> RTCRtpSender<'_, I>
where
    I: Interceptor,
{
    fn transceiver(&self) -> &RTCRtpTransceiver {
        &self.peer_connection.rtp_transceivers[self.id.0]
    }

    fn sender(&self) -> &RTCRtpSenderInternal {
        &self.transceiver().sender
    }

    fn sender_mut(&mut self) -> &mut RTCRtpSenderInternal {
        &mut self.peer_connection.rtp_transceivers[self.id.0].sender
    }

    pub fn id(&self) -> RTCRtpSenderId {
        self.id
    }

    pub fn track(&self) -> Option<&MediaStreamTrack> {
        self.sender().track.as_ref()
    }

    /// Negotiated codecs and header extensions plus the encoding this
    /// sender produces.
    pub fn get_parameters(&self) -> RTCRtpSendParameters {
        let sender = self.sender();
        let rtp_parameters = self
            .peer_connection
            .configuration
            .media_engine
            .get_rtp_parameters_by_kind(sender.kind, RTCRtpTransceiverDirection::Sendonly);

        RTCRtpSendParameters {
            rtp_parameters,
            encodings: vec![RTCRtpEncodingParameters {
                rtp_coding_parameters: RTCRtpCodingParameters {
                    ssrc: Some(sender.ssrc),
                    rtx: None,
                    fec: sender
                        .ssrc_fec
                        .filter(|_| sender.payload_type_fec.is_some())
                        .map(|ssrc| RTCRtpFecParameters { ssrc }),
                },
                active: sender.is_started(),
                codec: sender
                    .send_codec
                    .as_ref()
                    .map(|c| c.rtp_codec.clone())
                    .unwrap_or_default(),
                max_bitrate: 0,
            }],
        }
    }

    /// Swaps the sent track without renegotiation. The new track must be
    /// of the same kind; `None` stops sending.
    pub fn replace_track(&mut self, track: Option<MediaStreamTrack>) -> Result<()> {
        if let Some(track) = &track {
            if track.kind() != self.sender().kind {
                return Err(Error::ErrRTPSenderNewTrackHasIncorrectKind);
            }
        }

        let peer_connection = &mut *self.peer_connection;
        let sender = &mut peer_connection.rtp_transceivers[self.id.0].sender;
        let was_started = sender.is_started();
        sender.stop(&mut peer_connection.configuration.interceptor);
        sender.track = track;
        if was_started {
            sender.start(
                &peer_connection.configuration.media_engine,
                &mut peer_connection.configuration.interceptor,
            )?;
        }

        Ok(())
    }

    /// Whether the remote asked for a keyframe with PLI or FIR since the
    /// last sample was written.
    pub fn keyframe_requested(&self) -> bool {
        self.sender().keyframe_requested
    }

    /// Sends an already packetized RTP packet. Its SSRC and payload type
    /// are replaced with the negotiated ones.
    pub fn write_rtp(&mut self, packet: rtp::Packet) -> Result<()> {
        let track_id = self.started_track_id()?;
        self.peer_connection
            .handle_write(RTCMessage::RtpPacket(track_id, packet))
    }

    /// Packetizes and sends one encoded frame.
    pub fn write_sample(&mut self, sample: &Sample) -> Result<()> {
        let track_id = self.started_track_id()?;

        let sender = self.sender_mut();
        let clock_rate = sender
            .send_codec
            .as_ref()
            .map(|c| c.rtp_codec.clock_rate)
            .unwrap_or_default();
        let Some(packetizer) = sender.packetizer.as_mut() else {
            return Err(Error::ErrNoPayloaderForCodec);
        };

        if sample.prev_dropped_packets > 0 {
            packetizer.skip_samples(sample.samples(clock_rate) * sample.prev_dropped_packets as u32);
        }
        let packets = packetizer.packetize(&sample.data, sample.samples(clock_rate))?;

        trace!("sample of {} bytes in {} packets", sample.data.len(), packets.len());
        for packet in packets {
            self.peer_connection
                .handle_write(RTCMessage::RtpPacket(track_id.clone(), packet))?;
        }
        // A request stays pending until a whole sample went out.
        self.sender_mut().keyframe_requested = false;

        Ok(())
    }

    /// Sends RTCP about the sent stream, e.g. a Sender Report built by the
    /// application.
    pub fn write_rtcp(&mut self, packets: Vec<Box<dyn rtcp::Packet>>) -> Result<()> {
        let track_id = self.started_track_id()?;
        self.peer_connection
            .handle_write(RTCMessage::RtcpPacket(track_id, packets))
    }

    fn started_track_id(&self) -> Result<String> {
        let sender = self.sender();
        let Some(track) = &sender.track else {
            return Err(Error::ErrRTPSenderTrackNil);
        };
        if !sender.is_started() {
            return Err(Error::ErrSenderWithNoCodecs);
        }
        Ok(track.track_id().clone())
    }
}
