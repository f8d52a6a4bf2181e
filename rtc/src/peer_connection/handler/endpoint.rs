use crate::peer_connection::configuration::media_engine::MediaEngine;
use crate::peer_connection::event::{RTCEventInternal, RTCPeerConnectionEvent, RTCTrackEvent};
use crate::peer_connection::message::internal::{
    RTCMessageInternal, RTPMessage, TaggedRTCMessageInternal, TrackPacket,
};
use crate::rtp_transceiver::{RTCRtpReceiverId, RTCRtpTransceiver, SSRC};

use interceptor::Packet;
use log::{debug, trace};
use rtcp::payload_feedbacks::full_intra_request::FullIntraRequest;
use rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use shared::TransportContext;
use shared::error::{Error, Result};
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Default)]
pub(crate) struct EndpointHandlerContext {
    pub(crate) read_outs: VecDeque<TaggedRTCMessageInternal>,
    pub(crate) write_outs: VecDeque<TaggedRTCMessageInternal>,
    pub(crate) event_outs: VecDeque<RTCEventInternal>,
}

/// EndpointHandler maps packets to the tracks of the transceivers.
pub(crate) struct EndpointHandler<'a> {
    ctx: &'a mut EndpointHandlerContext,
    rtp_transceivers: &'a mut Vec<RTCRtpTransceiver>,
    media_engine: &'a MediaEngine,
}

impl<'a> EndpointHandler<'a> {
    pub(crate) fn new(
        ctx: &'a mut EndpointHandlerContext,
        rtp_transceivers: &'a mut Vec<RTCRtpTransceiver>,
        media_engine: &'a MediaEngine,
    ) -> Self {
        EndpointHandler {
            ctx,
            rtp_transceivers,
            media_engine,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        "EndpointHandler"
    }

    fn handle_rtp_packet(
        &mut self,
        now: Instant,
        transport: TransportContext,
        rtp_packet: rtp::Packet,
    ) -> Result<()> {
        let ssrc = rtp_packet.header.ssrc;
        let Some(id) = self.rtp_transceivers.iter().position(|t| {
            t.receiver.track.is_some() && t.receiver.has_ssrc(ssrc)
        }) else {
            debug!("drop rtp packet with unknown ssrc {ssrc}");
            return Ok(());
        };

        let receiver = &mut self.rtp_transceivers[id].receiver;
        let Some(track) = receiver.track.as_mut() else {
            return Ok(());
        };

        if !receiver.track_opened {
            receiver.track_opened = true;
            if let Ok((codec, _)) = self
                .media_engine
                .get_codec_by_payload(rtp_packet.header.payload_type)
            {
                track.set_codec(codec.rtp_codec);
            }
            debug!(
                "remote track {} opened with ssrc {ssrc}",
                track.track_id()
            );
            self.ctx
                .event_outs
                .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                    RTCPeerConnectionEvent::OnTrack(RTCTrackEvent {
                        receiver_id: RTCRtpReceiverId(id),
                        track_id: track.track_id().clone(),
                        stream_ids: vec![track.stream_id().clone()],
                    }),
                ));
        }

        self.ctx.read_outs.push_back(TaggedRTCMessageInternal {
            now,
            transport,
            message: RTCMessageInternal::Rtp(RTPMessage::TrackPacket(TrackPacket {
                track_id: track.track_id().clone(),
                packet: Packet::Rtp(rtp_packet),
            })),
        });
        Ok(())
    }

    fn handle_rtcp_packets(
        &mut self,
        now: Instant,
        transport: TransportContext,
        rtcp_packets: Vec<Box<dyn rtcp::Packet>>,
    ) -> Result<()> {
        for packet in &rtcp_packets {
            let media_ssrcs: Vec<SSRC> =
                if let Some(pli) = packet.as_any().downcast_ref::<PictureLossIndication>() {
                    vec![pli.media_ssrc]
                } else if let Some(fir) = packet.as_any().downcast_ref::<FullIntraRequest>() {
                    fir.fir.iter().map(|entry| entry.ssrc).collect()
                } else {
                    continue;
                };

            for transceiver in self.rtp_transceivers.iter_mut() {
                let sender = &mut transceiver.sender;
                if sender.is_started() && media_ssrcs.contains(&sender.ssrc) {
                    trace!("keyframe requested for ssrc {}", sender.ssrc);
                    sender.keyframe_requested = true;
                }
            }
        }

        let destination_ssrcs: Vec<SSRC> = rtcp_packets
            .iter()
            .flat_map(|packet| packet.destination_ssrc())
            .collect();
        let track_id = self.rtp_transceivers.iter().find_map(|t| {
            if destination_ssrcs.contains(&t.sender.ssrc) {
                if let Some(track_id) = t.sender.track_id() {
                    return Some(track_id.to_owned());
                }
            }
            if destination_ssrcs.iter().any(|ssrc| t.receiver.has_ssrc(*ssrc)) {
                return t.receiver.track.as_ref().map(|track| track.track_id().clone());
            }
            None
        });

        if let Some(track_id) = track_id {
            self.ctx.read_outs.push_back(TaggedRTCMessageInternal {
                now,
                transport,
                message: RTCMessageInternal::Rtp(RTPMessage::TrackPacket(TrackPacket {
                    track_id,
                    packet: Packet::Rtcp(rtcp_packets),
                })),
            });
        } else {
            trace!("drop rtcp packets for ssrcs {destination_ssrcs:?}");
        }
        Ok(())
    }

    /// Stamps the negotiated SSRC and payload type of the sender of `track_id`.
    fn prepare_rtp_packet(&self, track_id: &str, rtp_packet: &mut rtp::Packet) -> Result<()> {
        let Some(sender) = self
            .rtp_transceivers
            .iter()
            .map(|t| &t.sender)
            .find(|s| s.is_started() && s.track_id() == Some(track_id))
        else {
            return Err(Error::ErrSenderWithNoCodecs);
        };
        let Some(codec) = &sender.send_codec else {
            return Err(Error::ErrSenderWithNoCodecs);
        };

        rtp_packet.header.ssrc = sender.ssrc;
        rtp_packet.header.payload_type = codec.payload_type;
        Ok(())
    }
}

impl<'a> sansio::Protocol<TaggedRTCMessageInternal, TaggedRTCMessageInternal, RTCEventInternal>
    for EndpointHandler<'a>
{
    type Rout = TaggedRTCMessageInternal;
    type Wout = TaggedRTCMessageInternal;
    type Eout = RTCEventInternal;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedRTCMessageInternal) -> Result<()> {
        match msg.message {
            RTCMessageInternal::Rtp(RTPMessage::Packet(Packet::Rtp(rtp_packet))) => {
                self.handle_rtp_packet(msg.now, msg.transport, rtp_packet)
            }
            RTCMessageInternal::Rtp(RTPMessage::Packet(Packet::Rtcp(rtcp_packets))) => {
                self.handle_rtcp_packets(msg.now, msg.transport, rtcp_packets)
            }
            message => {
                self.ctx.read_outs.push_back(TaggedRTCMessageInternal {
                    now: msg.now,
                    transport: msg.transport,
                    message,
                });
                Ok(())
            }
        }
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.ctx.read_outs.pop_front()
    }

    fn handle_write(&mut self, msg: TaggedRTCMessageInternal) -> Result<()> {
        let message = match msg.message {
            RTCMessageInternal::Rtp(RTPMessage::TrackPacket(TrackPacket {
                track_id,
                packet: Packet::Rtp(mut rtp_packet),
            })) => {
                self.prepare_rtp_packet(&track_id, &mut rtp_packet)?;
                RTCMessageInternal::Rtp(RTPMessage::Packet(Packet::Rtp(rtp_packet)))
            }
            RTCMessageInternal::Rtp(RTPMessage::TrackPacket(TrackPacket {
                packet: Packet::Rtcp(rtcp_packets),
                ..
            })) => RTCMessageInternal::Rtp(RTPMessage::Packet(Packet::Rtcp(rtcp_packets))),
            message => message,
        };

        self.ctx.write_outs.push_back(TaggedRTCMessageInternal {
            now: msg.now,
            transport: msg.transport,
            message,
        });
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.ctx.write_outs.pop_front()
    }

    fn handle_event(&mut self, evt: RTCEventInternal) -> Result<()> {
        self.ctx.event_outs.push_back(evt);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.ctx.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, _now: Instant) -> Result<()> {
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        None
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
