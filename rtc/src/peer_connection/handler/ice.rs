use crate::peer_connection::event::{
    RTCEventInternal, RTCPeerConnectionEvent, RTCPeerConnectionIceEvent,
};
use crate::peer_connection::handler::demuxer::demux;
use crate::peer_connection::message::internal::{
    DTLSMessage, RTCMessageInternal, RTPMessage, STUNMessage, TaggedRTCMessageInternal,
};
use crate::peer_connection::state::ice_gathering_state::RTCIceGatheringState;
use crate::peer_connection::transport::ice::RTCIceTransport;
use crate::peer_connection::transport::ice::candidate::RTCIceCandidate;
use log::{debug, trace};
use sansio::Protocol;
use shared::error::{Error, Result};
use shared::{TransportContext, TransportMessage};
use std::collections::VecDeque;
use std::time::Instant;

pub(crate) struct IceHandlerContext {
    pub(crate) ice_transport: RTCIceTransport,

    pub(crate) read_outs: VecDeque<TaggedRTCMessageInternal>,
    pub(crate) write_outs: VecDeque<TaggedRTCMessageInternal>,
    pub(crate) event_outs: VecDeque<RTCEventInternal>,
}

impl IceHandlerContext {
    pub(crate) fn new(ice_transport: RTCIceTransport) -> Self {
        Self {
            ice_transport,

            read_outs: VecDeque::new(),
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
        }
    }
}

/// IceHandler feeds every datagram to the ICE agent, which consumes
/// connectivity checks and hands back the rest.
pub(crate) struct IceHandler<'a> {
    ctx: &'a mut IceHandlerContext,
}

impl<'a> IceHandler<'a> {
    pub(crate) fn new(ctx: &'a mut IceHandlerContext) -> Self {
        IceHandler { ctx }
    }

    pub(crate) fn name(&self) -> &'static str {
        "IceHandler"
    }

    fn push_event(&mut self, event: RTCPeerConnectionEvent) {
        self.ctx
            .event_outs
            .push_back(RTCEventInternal::RTCPeerConnectionEvent(event));
    }
}

impl<'a> sansio::Protocol<TaggedRTCMessageInternal, TaggedRTCMessageInternal, RTCEventInternal>
    for IceHandler<'a>
{
    type Rout = TaggedRTCMessageInternal;
    type Wout = TaggedRTCMessageInternal;
    type Eout = RTCEventInternal;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedRTCMessageInternal) -> Result<()> {
        let message = match msg.message {
            RTCMessageInternal::Stun(STUNMessage::Raw(message))
            | RTCMessageInternal::Dtls(DTLSMessage::Raw(message))
            | RTCMessageInternal::Rtp(RTPMessage::Raw(message)) => message,
            _ => {
                debug!("drop non-RAW packet {:?}", msg.message);
                return Ok(());
            }
        };

        let agent = &mut self.ctx.ice_transport.agent;
        agent.handle_read(TransportMessage {
            now: msg.now,
            transport: msg.transport,
            message,
        })?;

        while let Some(datagram) = agent.poll_read() {
            let Some(message) = demux(datagram.message) else {
                continue;
            };
            trace!("bypass ice read from {:?}", datagram.transport.peer_addr);
            // DTLS and SRTP are bound to the ICE transport rather than a
            // 5-tuple, so path migration after a restart stays invisible.
            self.ctx.read_outs.push_back(TaggedRTCMessageInternal {
                now: datagram.now,
                transport: TransportContext::default(),
                message,
            });
        }

        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.ctx.read_outs.pop_front()
    }

    fn handle_write(&mut self, msg: TaggedRTCMessageInternal) -> Result<()> {
        let message = match msg.message {
            RTCMessageInternal::Dtls(DTLSMessage::Raw(message))
            | RTCMessageInternal::Rtp(RTPMessage::Raw(message)) => message,
            _ => {
                debug!("drop non-RAW packet {:?}", msg.message);
                return Ok(());
            }
        };

        match self.ctx.ice_transport.agent.handle_write(TransportMessage {
            now: msg.now,
            transport: msg.transport,
            message,
        }) {
            Err(Error::ErrICEConnectionNotStarted) => {
                trace!("drop message before ICE connection is connected");
                Ok(())
            }
            result => result,
        }
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        while let Some(transmit) = self.ctx.ice_transport.agent.poll_write() {
            self.ctx.write_outs.push_back(TaggedRTCMessageInternal {
                now: transmit.now,
                transport: transmit.transport,
                message: RTCMessageInternal::Raw(transmit.message),
            });
        }

        self.ctx.write_outs.pop_front()
    }

    fn handle_event(&mut self, evt: RTCEventInternal) -> Result<()> {
        self.ctx.event_outs.push_back(evt);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        while let Some(evt) = self.ctx.ice_transport.agent.poll_event() {
            match evt {
                ::ice::Event::ConnectionStateChange(state) => {
                    self.push_event(RTCPeerConnectionEvent::OnIceConnectionStateChangeEvent(
                        state.into(),
                    ));
                }
                ::ice::Event::SelectedCandidatePairChange(local, remote) => {
                    debug!(
                        "ice selected candidate pair {:?} <-> {:?}",
                        local.addr(),
                        remote.addr()
                    );
                    self.ctx
                        .event_outs
                        .push_back(RTCEventInternal::ICESelectedCandidatePairChange);
                }
                ::ice::Event::GatheringStateChange(state) => {
                    let state: RTCIceGatheringState = state.into();
                    self.push_event(RTCPeerConnectionEvent::OnIceGatheringStateChangeEvent(
                        state,
                    ));
                    if state == RTCIceGatheringState::Complete {
                        self.push_event(RTCPeerConnectionEvent::OnIceCandidateEvent(
                            RTCPeerConnectionIceEvent {
                                candidate: None,
                                url: String::new(),
                            },
                        ));
                    }
                }
                ::ice::Event::LocalCandidate(candidate) => {
                    let candidate = RTCIceCandidate::from(candidate.as_ref());
                    debug!("gathered local candidate {}", candidate);
                    self.push_event(RTCPeerConnectionEvent::OnIceCandidateEvent(
                        RTCPeerConnectionIceEvent {
                            candidate: Some(candidate),
                            url: String::new(),
                        },
                    ));
                }
            }
        }

        self.ctx.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        self.ctx.ice_transport.agent.handle_timeout(now)
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        self.ctx.ice_transport.agent.poll_timeout()
    }

    fn close(&mut self) -> Result<()> {
        self.ctx.ice_transport.stop()
    }
}
