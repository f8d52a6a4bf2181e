use crate::data_channel::RTCDataChannelId;
use crate::data_channel::internal::RTCDataChannelInternal;
use crate::data_channel::message::RTCDataChannelMessage;
use crate::data_channel::state::RTCDataChannelState;
use crate::peer_connection::event::{
    RTCDataChannelEvent, RTCEventInternal, RTCPeerConnectionEvent,
};
use crate::peer_connection::message::internal::{
    ApplicationMessage, DTLSMessage, RTCMessageInternal, TaggedRTCMessageInternal,
};
use crate::peer_connection::transport::sctp::RTCSctpTransport;
use crate::peer_connection::transport::sctp::state::RTCSctpTransportState;
use bytes::BytesMut;
use log::{debug, trace, warn};
use sctp::{Association, PayloadProtocolIdentifier, StreamEvent};
use shared::TransportContext;
use shared::error::{Error, Result, flatten_errs};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

pub(crate) struct SctpHandlerContext {
    pub(crate) sctp_transport: RTCSctpTransport,
    /// An application m= section was negotiated.
    pub(crate) enabled: bool,

    pub(crate) read_outs: VecDeque<TaggedRTCMessageInternal>,
    pub(crate) write_outs: VecDeque<TaggedRTCMessageInternal>,
    pub(crate) event_outs: VecDeque<RTCEventInternal>,
}

impl SctpHandlerContext {
    pub(crate) fn new(sctp_transport: RTCSctpTransport) -> Self {
        Self {
            sctp_transport,
            enabled: false,

            read_outs: VecDeque::new(),
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
        }
    }
}

/// Opens the stream of a locally created channel and sends
/// DATA_CHANNEL_OPEN unless it was negotiated out of band. Returns true if
/// the channel is open right away.
pub(crate) fn open_data_channel(
    association: &mut Association,
    dc: &mut RTCDataChannelInternal,
) -> Result<bool> {
    let mut stream = association.open_stream(dc.id, PayloadProtocolIdentifier::Binary)?;
    dc.dial(&mut stream)?;
    debug!("data channel {} dialed, label {:?}", dc.id, dc.label);
    Ok(dc.ready_state == RTCDataChannelState::Open)
}

/// SctpHandler runs the SCTP association over DTLS application data and
/// the data channels on its streams.
pub(crate) struct SctpHandler<'a> {
    ctx: &'a mut SctpHandlerContext,
    data_channels: &'a mut HashMap<RTCDataChannelId, RTCDataChannelInternal>,
    now: Instant,
}

impl<'a> SctpHandler<'a> {
    pub(crate) fn new(
        ctx: &'a mut SctpHandlerContext,
        data_channels: &'a mut HashMap<RTCDataChannelId, RTCDataChannelInternal>,
        now: Instant,
    ) -> Self {
        SctpHandler {
            ctx,
            data_channels,
            now,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        "SctpHandler"
    }

    fn push_data_channel_event(&mut self, event: RTCDataChannelEvent) {
        self.ctx
            .event_outs
            .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                RTCPeerConnectionEvent::OnDataChannel(event),
            ));
    }

    fn process_association_events(&mut self, now: Instant) {
        loop {
            let Some(association) = self.ctx.sctp_transport.association.as_mut() else {
                return;
            };
            let Some(event) = association.poll() else {
                return;
            };

            match event {
                sctp::Event::Connected => {
                    debug!("sctp association connected");
                    self.ctx.sctp_transport.state = RTCSctpTransportState::Connected;
                    self.open_pending_data_channels();
                    self.ctx
                        .event_outs
                        .push_back(RTCEventInternal::SCTPHandshakeComplete);
                }
                sctp::Event::AssociationLost { reason } => {
                    warn!("sctp association lost: {reason}");
                    self.ctx.sctp_transport.state = RTCSctpTransportState::Closed;
                    self.close_all_data_channels();
                }
                sctp::Event::Stream(StreamEvent::Opened { id }) => {
                    trace!("sctp stream {id} opened by the peer");
                    // accepted on its first readable event
                    while association.accept_stream().is_some() {}
                }
                sctp::Event::Stream(StreamEvent::Readable { id })
                | sctp::Event::Stream(StreamEvent::Stopped { id }) => {
                    self.read_data_channel(id, now);
                }
                sctp::Event::Stream(StreamEvent::BufferedAmountLow { id }) => {
                    self.push_data_channel_event(RTCDataChannelEvent::OnBufferedAmountLow(id));
                }
                sctp::Event::Stream(StreamEvent::Writable { .. }) => {}
            }
        }
    }

    fn open_pending_data_channels(&mut self) {
        let Some(association) = self.ctx.sctp_transport.association.as_mut() else {
            return;
        };

        let mut ids: Vec<RTCDataChannelId> = self
            .data_channels
            .iter()
            .filter(|(_, dc)| {
                dc.data_channel.is_none() && dc.ready_state == RTCDataChannelState::Connecting
            })
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();

        let mut opened = vec![];
        for id in ids {
            let Some(dc) = self.data_channels.get_mut(&id) else {
                continue;
            };
            match open_data_channel(association, dc) {
                Ok(true) => opened.push(id),
                Ok(false) => {}
                Err(err) => {
                    warn!("failed to open data channel {id}: {err}");
                    dc.ready_state = RTCDataChannelState::Closed;
                }
            }
        }

        for id in opened {
            self.push_data_channel_event(RTCDataChannelEvent::OnOpen(id));
        }
    }

    fn read_data_channel(&mut self, id: RTCDataChannelId, now: Instant) {
        let Some(association) = self.ctx.sctp_transport.association.as_mut() else {
            return;
        };
        let mut stream = match association.stream(id) {
            Ok(stream) => stream,
            Err(err) => {
                trace!("readable event for stream {id}: {err}");
                return;
            }
        };

        let previous_state = if let Some(dc) = self.data_channels.get(&id) {
            dc.ready_state
        } else {
            match RTCDataChannelInternal::accept(&mut stream) {
                Ok(dc) => {
                    debug!("data channel {id} opened by the peer, label {:?}", dc.label);
                    self.data_channels.insert(id, dc);
                    self.ctx
                        .event_outs
                        .push_back(RTCEventInternal::RTCPeerConnectionEvent(
                            RTCPeerConnectionEvent::OnDataChannel(RTCDataChannelEvent::OnOpen(
                                id,
                            )),
                        ));
                    RTCDataChannelState::Open
                }
                Err(err) => {
                    warn!("failed to accept data channel on stream {id}: {err}");
                    return;
                }
            }
        };

        let Some(dc) = self.data_channels.get_mut(&id) else {
            return;
        };
        let Some(data_channel) = dc.data_channel.as_mut() else {
            return;
        };

        loop {
            match data_channel.read(&mut stream) {
                Ok(Some(message)) => {
                    self.ctx.read_outs.push_back(TaggedRTCMessageInternal {
                        now,
                        transport: TransportContext::default(),
                        message: RTCMessageInternal::Dtls(DTLSMessage::DataChannel(
                            ApplicationMessage {
                                data_channel_id: id,
                                message: RTCDataChannelMessage {
                                    is_string: message.is_string,
                                    data: message.data,
                                },
                            },
                        )),
                    });
                }
                Ok(None) => break,
                Err(Error::ErrEof) => break,
                Err(err) => {
                    warn!("data channel {id} read error: {err}");
                    break;
                }
            }
        }

        dc.ready_state = data_channel.state().into();
        let current_state = dc.ready_state;
        if previous_state == RTCDataChannelState::Connecting
            && current_state == RTCDataChannelState::Open
        {
            self.push_data_channel_event(RTCDataChannelEvent::OnOpen(id));
        }
        if previous_state != RTCDataChannelState::Closed
            && current_state == RTCDataChannelState::Closed
        {
            debug!("data channel {id} closed");
            self.push_data_channel_event(RTCDataChannelEvent::OnClose(id));
        }
    }

    fn close_all_data_channels(&mut self) {
        let mut closed = vec![];
        for (id, dc) in self.data_channels.iter_mut() {
            if dc.ready_state == RTCDataChannelState::Closed {
                continue;
            }
            if let Some(data_channel) = dc.data_channel.as_mut() {
                data_channel.set_closed();
            }
            dc.ready_state = RTCDataChannelState::Closed;
            closed.push(*id);
        }
        closed.sort_unstable();
        for id in closed {
            self.push_data_channel_event(RTCDataChannelEvent::OnClose(id));
        }
    }
}

impl<'a> sansio::Protocol<TaggedRTCMessageInternal, TaggedRTCMessageInternal, RTCEventInternal>
    for SctpHandler<'a>
{
    type Rout = TaggedRTCMessageInternal;
    type Wout = TaggedRTCMessageInternal;
    type Eout = RTCEventInternal;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedRTCMessageInternal) -> Result<()> {
        let RTCMessageInternal::Dtls(DTLSMessage::Sctp(message)) = msg.message else {
            // Bypass
            self.ctx.read_outs.push_back(msg);
            return Ok(());
        };

        let Some(association) = self.ctx.sctp_transport.association.as_mut() else {
            warn!("drop sctp packet, association is not started");
            return Ok(());
        };
        trace!("recv sctp packet {} bytes", message.len());
        association.handle_input(
            msg.now,
            TransportContext::default().peer_addr,
            message.freeze(),
        );
        self.process_association_events(msg.now);

        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.ctx.read_outs.pop_front()
    }

    fn handle_write(&mut self, msg: TaggedRTCMessageInternal) -> Result<()> {
        // data channels write straight into the association
        self.ctx.write_outs.push_back(msg);
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        if let Some(association) = self.ctx.sctp_transport.association.as_mut() {
            while let Some(transmit) = association.poll_transmit(self.now) {
                for packet in transmit.message {
                    self.ctx.write_outs.push_back(TaggedRTCMessageInternal {
                        now: transmit.now,
                        transport: TransportContext::default(),
                        message: RTCMessageInternal::Dtls(DTLSMessage::Sctp(BytesMut::from(
                            &packet[..],
                        ))),
                    });
                }
            }
        }

        self.ctx.write_outs.pop_front()
    }

    fn handle_event(&mut self, evt: RTCEventInternal) -> Result<()> {
        if let RTCEventInternal::DTLSHandshakeComplete { is_client, .. } = &evt {
            if self.ctx.sctp_transport.association.is_none()
                && (self.ctx.enabled || !self.data_channels.is_empty())
            {
                debug!("starting sctp association, is_client: {is_client}");
                self.ctx.sctp_transport.start(*is_client, self.now)?;
            }
        }
        self.ctx.event_outs.push_back(evt);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.ctx.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if let Some(association) = self.ctx.sctp_transport.association.as_mut() {
            association.handle_timeout(now);
            self.process_association_events(now);
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        self.ctx
            .sctp_transport
            .association
            .as_mut()
            .and_then(|association| association.poll_timeout())
    }

    fn close(&mut self) -> Result<()> {
        let mut close_errs = vec![];
        if let Some(association) = self.ctx.sctp_transport.association.as_mut() {
            for (id, dc) in self.data_channels.iter_mut() {
                let Some(data_channel) = dc.data_channel.as_mut() else {
                    continue;
                };
                match association.stream(*id) {
                    Ok(mut stream) => {
                        if let Err(err) = data_channel.close(&mut stream) {
                            close_errs.push(err);
                        }
                    }
                    Err(err) => trace!("data channel {id} without stream: {err}"),
                }
            }
        }
        for dc in self.data_channels.values_mut() {
            if let Some(data_channel) = dc.data_channel.as_mut() {
                data_channel.set_closed();
            }
            dc.ready_state = RTCDataChannelState::Closed;
        }

        if let Err(err) = self.ctx.sctp_transport.stop() {
            close_errs.push(err);
        }
        flatten_errs(close_errs)
    }
}
