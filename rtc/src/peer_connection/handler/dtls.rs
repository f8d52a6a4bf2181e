use crate::peer_connection::event::RTCEventInternal;
use crate::peer_connection::message::internal::{
    DTLSMessage, RTCMessageInternal, TaggedRTCMessageInternal,
};
use crate::peer_connection::transport::dtls::RTCDtlsTransport;
use crate::peer_connection::transport::dtls::parameters::DTLSParameters;
use crate::peer_connection::transport::dtls::role::RTCDtlsRole;
use crate::peer_connection::transport::dtls::state::RTCDtlsTransportState;
use crate::peer_connection::transport::ice::role::RTCIceRole;
use log::{debug, trace, warn};
use shared::TransportContext;
use shared::error::{Error, Result};
use std::collections::VecDeque;
use std::time::Instant;

pub(crate) struct DtlsHandlerContext {
    pub(crate) dtls_transport: RTCDtlsTransport,
    /// Set once the remote description is applied, consumed when the
    /// transport starts.
    pub(crate) pending_start: Option<(RTCIceRole, DTLSParameters)>,
    /// Error that moved the transport to Failed, surfaced to the caller of
    /// the peer connection.
    pub(crate) failure: Option<Error>,

    pub(crate) read_outs: VecDeque<TaggedRTCMessageInternal>,
    pub(crate) write_outs: VecDeque<TaggedRTCMessageInternal>,
    pub(crate) event_outs: VecDeque<RTCEventInternal>,
}

impl DtlsHandlerContext {
    pub(crate) fn new(dtls_transport: RTCDtlsTransport) -> Self {
        Self {
            dtls_transport,
            pending_start: None,
            failure: None,

            read_outs: VecDeque::new(),
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
        }
    }
}

/// DtlsHandler implements DTLS Protocol handling
pub(crate) struct DtlsHandler<'a> {
    ctx: &'a mut DtlsHandlerContext,
    now: Instant,
}

impl<'a> DtlsHandler<'a> {
    pub(crate) fn new(ctx: &'a mut DtlsHandlerContext, now: Instant) -> Self {
        DtlsHandler { ctx, now }
    }

    pub(crate) fn name(&self) -> &'static str {
        "DtlsHandler"
    }

    fn start(&mut self, now: Instant) -> Result<()> {
        if self.ctx.dtls_transport.state() != RTCDtlsTransportState::New {
            return Ok(());
        }
        let Some((ice_role, parameters)) = self.ctx.pending_start.take() else {
            trace!("dtls start deferred until the remote description is applied");
            return Ok(());
        };

        self.ctx.dtls_transport.start(ice_role, parameters, now)?;
        self.drain_transmits(now);
        Ok(())
    }

    fn drain_transmits(&mut self, now: Instant) {
        while let Some(message) = self.ctx.dtls_transport.poll_transmit() {
            self.ctx.write_outs.push_back(TaggedRTCMessageInternal {
                now,
                // DTLS is tunneled through the selected pair
                transport: TransportContext::default(),
                message: RTCMessageInternal::Dtls(DTLSMessage::Raw(message)),
            });
        }
    }

    fn fail(&mut self, err: Error) -> Result<()> {
        if self.ctx.dtls_transport.state() == RTCDtlsTransportState::Failed {
            warn!("dtls transport failed: {err}");
            self.ctx.failure = Some(err);
            Ok(())
        } else {
            Err(err)
        }
    }

    fn on_handshake_complete(&mut self) -> Result<()> {
        let is_client = self.ctx.dtls_transport.role() == RTCDtlsRole::Client;
        let (local_srtp_context, remote_srtp_context) =
            self.ctx.dtls_transport.srtp_contexts()?;
        debug!("dtls handshake complete, is_client: {is_client}");

        self.ctx
            .event_outs
            .push_back(RTCEventInternal::DTLSHandshakeComplete {
                is_client,
                local_srtp_context: Some(local_srtp_context),
                remote_srtp_context: Some(remote_srtp_context),
            });
        Ok(())
    }
}

impl<'a> sansio::Protocol<TaggedRTCMessageInternal, TaggedRTCMessageInternal, RTCEventInternal>
    for DtlsHandler<'a>
{
    type Rout = TaggedRTCMessageInternal;
    type Wout = TaggedRTCMessageInternal;
    type Eout = RTCEventInternal;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedRTCMessageInternal) -> Result<()> {
        let RTCMessageInternal::Dtls(DTLSMessage::Raw(dtls_message)) = msg.message else {
            // Bypass
            self.ctx.read_outs.push_back(msg);
            return Ok(());
        };
        trace!("recv dtls RAW {} bytes", dtls_message.len());

        // the server side starts on the first flight of the client
        if self.ctx.dtls_transport.state() == RTCDtlsTransportState::New {
            self.start(msg.now)?;
        }
        if matches!(
            self.ctx.dtls_transport.state(),
            RTCDtlsTransportState::New
                | RTCDtlsTransportState::Closed
                | RTCDtlsTransportState::Failed
        ) {
            trace!("drop dtls record, transport is {}", self.ctx.dtls_transport.state());
            return Ok(());
        }

        let result = self.ctx.dtls_transport.read(msg.now, &dtls_message);
        self.drain_transmits(msg.now);
        match result {
            Ok(true) => self.on_handshake_complete()?,
            Ok(false) => {}
            Err(err) => return self.fail(err),
        }

        while let Some(message) = self.ctx.dtls_transport.poll_application_data() {
            trace!("recv dtls application data {} bytes", message.len());
            self.ctx.read_outs.push_back(TaggedRTCMessageInternal {
                now: msg.now,
                transport: msg.transport,
                message: RTCMessageInternal::Dtls(DTLSMessage::Sctp(message)),
            });
        }

        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.ctx.read_outs.pop_front()
    }

    fn handle_write(&mut self, msg: TaggedRTCMessageInternal) -> Result<()> {
        if let RTCMessageInternal::Dtls(DTLSMessage::Sctp(message)) = msg.message {
            self.ctx.dtls_transport.write(&message)?;
            self.drain_transmits(msg.now);
        } else {
            // Bypass
            self.ctx.write_outs.push_back(msg);
        }
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.ctx.write_outs.pop_front()
    }

    fn handle_event(&mut self, evt: RTCEventInternal) -> Result<()> {
        if let RTCEventInternal::ICESelectedCandidatePairChange = evt {
            // a later change is a path migration, the association is kept
            let now = self.now;
            self.start(now)?;
        }
        self.ctx.event_outs.push_back(evt);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.ctx.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        let result = self.ctx.dtls_transport.handle_timeout(now);
        self.drain_transmits(now);
        match result {
            Ok(()) => Ok(()),
            Err(err) => self.fail(err),
        }
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        self.ctx.dtls_transport.poll_timeout()
    }

    fn close(&mut self) -> Result<()> {
        self.ctx.dtls_transport.stop();
        let now = self.now;
        self.drain_transmits(now);
        Ok(())
    }
}
