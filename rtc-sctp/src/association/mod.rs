
pub(crate) mod state;
pub(crate) mod stream;
pub(crate) mod timer;

use crate::chunk::{
    Chunk, ErrorCauseCode,
    chunk_abort::ChunkAbort,
    chunk_cookie::{ChunkCookieAck, ChunkCookieEcho},
    chunk_error::ChunkError,
    chunk_forward_tsn::{ChunkForwardTsn, ChunkForwardTsnStream},
    chunk_heartbeat::{ChunkHeartbeat, ChunkHeartbeatAck},
    chunk_init::ChunkInit,
    chunk_payload_data::{ChunkPayloadData, PayloadProtocolIdentifier},
    chunk_reconfig::ChunkReconfig,
    chunk_selective_ack::ChunkSelectiveAck,
    chunk_shutdown::{ChunkShutdown, ChunkShutdownAck, ChunkShutdownComplete},
    chunk_type::{CT_FORWARD_TSN, CT_RECONFIG},
    error_cause::ErrorCause,
};
use crate::config::{
    COMMON_HEADER_SIZE, DATA_CHUNK_HEADER_SIZE, ServerConfig, TransportConfig,
};
use crate::packet::{CommonHeader, Packet};
use crate::param::{
    Param, param_outgoing_reset_request::ParamOutgoingResetRequest,
    param_reconfig_response::{ParamReconfigResponse, ReconfigResult},
};
use crate::queue::{
    payload_queue::PayloadQueue, pending_queue::PendingQueue, reassembly_queue::Chunks,
};
use crate::AssociationId;
use crate::util::*;
use crate::Side;
use state::{AckMode, AckState, AssociationState};
use stream::{ReliabilityType, Stream, StreamEvent, StreamId, StreamState};
use timer::{ACK_INTERVAL, RtoManager, Timer, TimerConfig, TimerTable};

use bytes::Bytes;
use log::{debug, error, trace, warn};
use shared::error::{Error, Result};
use shared::{TransportContext, TransportMessage, TransportProtocol};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Reasons why an association might be lost
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssociationError {
    /// INIT or COOKIE ECHO went unanswered too many times
    #[error("handshake failed")]
    HandshakeFailed,
    /// The peer sent an ABORT
    #[error("aborted by peer: {0}")]
    Aborted(String),
    /// Retransmissions exceeded the configured limit
    #[error("timed out")]
    TimedOut,
    /// The peer completed a graceful shutdown
    #[error("closed by peer")]
    ClosedByPeer,
    /// The local application closed the association
    #[error("closed")]
    LocallyClosed,
}

/// Events of interest to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The handshake completed
    Connected,
    /// The association was lost
    ///
    /// Emitted once, when the association reaches the closed state.
    AssociationLost { reason: AssociationError },
    /// Stream events
    Stream(StreamEvent),
}

/// Counters of an association
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct AssociationStats {
    pub n_datas: u64,
    pub n_sacks_received: u64,
    pub n_sacks_sent: u64,
    pub n_t3_timeouts: u64,
    pub n_ack_timeouts: u64,
    pub n_fast_retrans: u64,
    pub n_packets_sent: u64,
    pub n_packets_received: u64,
}

/// Protocol state of a single SCTP association
///
/// No I/O is performed: feed received datagrams with `handle_input`,
/// collect outgoing packets with `poll_transmit`, and drive timers with `poll_timeout` and
/// `handle_timeout`.
#[derive(Debug)]
pub struct Association {
    pub(crate) side: Side,
    state: AssociationState,
    closed: bool,
    max_message_size: u32,
    timer_config: TimerConfig,

    peer_verification_tag: u32,
    my_verification_tag: u32,
    my_next_tsn: u32, // nextTSN
    peer_last_tsn: u32, // lastRcvdTSN
    // for RTT measurement
    min_tsn2measure_rtt: u32,
    will_send_forward_tsn: bool,
    will_retransmit_fast: bool,
    will_retransmit_reconfig: bool,

    will_send_shutdown: bool,
    will_send_shutdown_ack: bool,
    will_send_shutdown_complete: bool,

    // Reconfig
    my_next_rsn: u32,
    reconfigs: HashMap<u32, ChunkReconfig>,
    reconfig_requests: HashMap<u32, ParamOutgoingResetRequest>,

    // Non-RFC internal data
    source_port: u16,
    destination_port: u16,
    my_max_num_inbound_streams: u16,
    my_max_num_outbound_streams: u16,
    my_cookie: Option<Bytes>,

    payload_queue: PayloadQueue,
    inflight_queue: PayloadQueue,
    pending_queue: PendingQueue,
    control_queue: VecDeque<Packet>,
    stream_queue: VecDeque<StreamId>,

    pub(crate) mtu: u32,
    // max DATA chunk payload size
    pub(crate) max_payload_size: u32,
    cumulative_tsn_ack_point: u32,
    advanced_peer_tsn_ack_point: u32,
    use_forward_tsn: bool,

    rto_mgr: RtoManager,
    timers: TimerTable,

    // Congestion control parameters
    max_receive_buffer_size: u32,
    // my congestion window size
    pub(crate) cwnd: u32,
    // calculated peer's receiver windows size
    rwnd: u32,
    // slow start threshold
    pub(crate) ssthresh: u32,
    partial_bytes_acked: u32,
    pub(crate) in_fast_recovery: bool,
    fast_recover_exit_point: u32,

    // Chunks stored for retransmission
    stored_init: Option<ChunkInit>,
    stored_cookie_echo: Option<ChunkCookieEcho>,
    streams: HashMap<StreamId, StreamState>,

    events: VecDeque<Event>,

    // per inbound packet context
    delayed_ack_triggered: bool,
    immediate_ack_triggered: bool,

    pub(crate) stats: AssociationStats,
    ack_state: AckState,
    // for testing
    pub(crate) ack_mode: AckMode,

    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    transport_protocol: TransportProtocol,
}

impl Association {
    /// Creates an association. A client association queues an INIT right away; a server
    /// association waits for the peer's INIT.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        server_config: Option<Arc<ServerConfig>>,
        config: Arc<TransportConfig>,
        max_payload_size: u32,
        local_aid: AssociationId,
        remote_addr: SocketAddr,
        local_addr: SocketAddr,
        transport_protocol: TransportProtocol,
        now: Instant,
    ) -> Self {
        let side = if server_config.is_some() {
            Side::Server
        } else {
            Side::Client
        };

        let mtu = config.mtu();
        let max_payload_size =
            std::cmp::min(max_payload_size, mtu - (COMMON_HEADER_SIZE + DATA_CHUNK_HEADER_SIZE));

        // RFC 4690 Sec 7.2.1
        //  o  The initial cwnd before DATA transmission or after a sufficiently
        //     long idle period MUST be set to min(4*MTU, max (2*MTU, 4380
        //     bytes)).
        let cwnd = std::cmp::min(4 * mtu, std::cmp::max(2 * mtu, 4380));
        let tsn: u32 = rand::random();
        let timer_config = config.timer_config();

        let mut association = Association {
            side,
            state: AssociationState::Closed,
            closed: false,
            max_message_size: config.max_message_size(),
            timer_config,

            peer_verification_tag: 0,
            my_verification_tag: local_aid,
            my_next_tsn: tsn,
            peer_last_tsn: 0,
            min_tsn2measure_rtt: tsn,
            will_send_forward_tsn: false,
            will_retransmit_fast: false,
            will_retransmit_reconfig: false,
            will_send_shutdown: false,
            will_send_shutdown_ack: false,
            will_send_shutdown_complete: false,

            my_next_rsn: tsn,
            reconfigs: HashMap::new(),
            reconfig_requests: HashMap::new(),

            source_port: config.sctp_port(),
            destination_port: config.sctp_port(),
            my_max_num_inbound_streams: config.max_num_inbound_streams(),
            my_max_num_outbound_streams: config.max_num_outbound_streams(),
            my_cookie: None,

            payload_queue: PayloadQueue::new(),
            inflight_queue: PayloadQueue::new(),
            pending_queue: PendingQueue::new(),
            control_queue: VecDeque::new(),
            stream_queue: VecDeque::new(),

            mtu,
            max_payload_size,
            cumulative_tsn_ack_point: tsn.wrapping_sub(1),
            advanced_peer_tsn_ack_point: tsn.wrapping_sub(1),
            use_forward_tsn: false,

            rto_mgr: RtoManager::new(&timer_config),
            timers: TimerTable::new(&timer_config),

            max_receive_buffer_size: config.max_receive_buffer_size(),
            cwnd,
            rwnd: 0,
            ssthresh: 0,
            partial_bytes_acked: 0,
            in_fast_recovery: false,
            fast_recover_exit_point: 0,

            stored_init: None,
            stored_cookie_echo: None,
            streams: HashMap::new(),

            events: VecDeque::new(),

            delayed_ack_triggered: false,
            immediate_ack_triggered: false,

            stats: AssociationStats::default(),
            ack_state: AckState::default(),
            ack_mode: AckMode::default(),

            remote_addr,
            local_addr,
            transport_protocol,
        };

        if side.is_client() {
            let init = ChunkInit {
                is_ack: false,
                initial_tsn: association.my_next_tsn,
                num_outbound_streams: association.my_max_num_outbound_streams,
                num_inbound_streams: association.my_max_num_inbound_streams,
                initiate_tag: association.my_verification_tag,
                advertised_receiver_window_credit: association.max_receive_buffer_size,
                params: supported_extension_params(),
            };
            association.stored_init = Some(init);

            if let Err(err) = association.send_init() {
                error!("[{}] failed to send INIT: {}", side, err);
            }
            let rto = association.rto_mgr.get_rto();
            association.timers.start(Timer::T1Init, now, rto);
            association.set_state(AssociationState::CookieWait);
        }

        association
    }

    /// Creates the initiating side of an association.
    pub fn client(
        config: Arc<TransportConfig>,
        max_payload_size: u32,
        remote_addr: SocketAddr,
        local_addr: SocketAddr,
        transport_protocol: TransportProtocol,
        now: Instant,
    ) -> Self {
        let local_aid = RandomAssociationIdGenerator::new().generate_aid();
        Association::new(
            None,
            config,
            max_payload_size,
            local_aid,
            remote_addr,
            local_addr,
            transport_protocol,
            now,
        )
    }

    /// Creates the accepting side of an association.
    pub fn server(
        server_config: Arc<ServerConfig>,
        max_payload_size: u32,
        remote_addr: SocketAddr,
        local_addr: SocketAddr,
        transport_protocol: TransportProtocol,
        now: Instant,
    ) -> Self {
        let local_aid = RandomAssociationIdGenerator::new().generate_aid();
        let config = server_config.transport.clone();
        Association::new(
            Some(server_config),
            config,
            max_payload_size,
            local_aid,
            remote_addr,
            local_addr,
            transport_protocol,
            now,
        )
    }

    /// Returns application-facing event
    ///
    /// Associations should be polled for events after:
    /// - a call was made to `handle_input`
    /// - a call was made to `handle_timeout`
    #[must_use]
    pub fn poll(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Returns the next time at which `handle_timeout` should be called
    ///
    /// The value returned may change after:
    /// - the application performed some I/O on the association
    /// - a call was made to `handle_input`
    /// - a call to `poll_transmit` returned `Some`
    /// - a call was made to `handle_timeout`
    #[must_use]
    pub fn poll_timeout(&mut self) -> Option<Instant> {
        self.timers.next_timeout()
    }

    /// Returns packets to transmit
    ///
    /// Associations should be polled for transmit after:
    /// - the application performed some I/O on the association
    /// - a call was made to `handle_input`
    /// - a call was made to `handle_timeout`
    #[must_use]
    pub fn poll_transmit(&mut self, now: Instant) -> Option<TransportMessage<Vec<Bytes>>> {
        let packets = self.gather_outbound(now);
        if packets.is_empty() {
            return None;
        }

        let mut contents = Vec::with_capacity(packets.len());
        for p in packets {
            match p.marshal() {
                Ok(raw) => contents.push(raw),
                Err(err) => warn!("[{}] failed to serialize a packet: {:?}", self.side, err),
            }
        }
        if contents.is_empty() {
            return None;
        }
        self.stats.n_packets_sent += contents.len() as u64;

        Some(TransportMessage {
            now,
            transport: TransportContext {
                local_addr: self.local_addr,
                peer_addr: self.remote_addr,
                ecn: None,
                transport_protocol: self.transport_protocol,
            },
            message: contents,
        })
    }

    /// Process timer expirations
    ///
    /// Executes protocol logic, potentially preparing application `Event`s and outgoing
    /// datagrams that should be extracted through the relevant methods.
    ///
    /// It is most efficient to call this immediately after the system clock reaches the latest
    /// `Instant` that was output by `poll_timeout`; however spurious extra calls will simply
    /// no-op and therefore are safe.
    pub fn handle_timeout(&mut self, now: Instant) {
        for &timer in &Timer::VALUES {
            if !self.timers.is_expired(timer, now) {
                continue;
            }
            let within_limit = self.timers.on_expired(timer);
            trace!("[{}] {:?} timer fired (within limit: {})", self.side, timer, within_limit);

            if timer == Timer::Ack {
                self.on_ack_timeout();
            } else if within_limit {
                self.on_retransmission_timeout(timer, now);
            } else {
                self.on_retransmission_failure(timer);
            }
        }
    }

    /// Processes a datagram received from the peer.
    pub fn handle_input(&mut self, now: Instant, remote: SocketAddr, data: Bytes) {
        if remote != self.remote_addr {
            trace!("[{}] discarding packet from unrecognized peer {}", self.side, remote);
            return;
        }
        match Packet::unmarshal(&data) {
            Ok(packet) => self.handle_inbound(packet, now),
            Err(err) => debug!("[{}] malformed packet: {}", self.side, err),
        }
    }

    /// Opens a stream with the given identifier.
    pub fn open_stream(
        &mut self,
        stream_identifier: StreamId,
        default_payload_type: PayloadProtocolIdentifier,
    ) -> Result<Stream<'_>> {
        if self.streams.contains_key(&stream_identifier) {
            return Err(Error::ErrStreamAlreadyExist);
        }

        self.create_stream(stream_identifier, false, default_payload_type);
        Ok(Stream {
            stream_identifier,
            association: self,
        })
    }

    /// Accepts a stream opened by the peer
    pub fn accept_stream(&mut self) -> Option<Stream<'_>> {
        let stream_identifier = self.stream_queue.pop_front()?;
        Some(Stream {
            stream_identifier,
            association: self,
        })
    }

    /// Accesses an existing stream
    pub fn stream(&mut self, stream_identifier: StreamId) -> Result<Stream<'_>> {
        if !self.streams.contains_key(&stream_identifier) {
            return Err(Error::ErrStreamNotExisted);
        }
        Ok(Stream {
            stream_identifier,
            association: self,
        })
    }

    /// Starts a graceful shutdown. Outstanding data is delivered before SHUTDOWN is sent.
    pub fn shutdown(&mut self) -> Result<()> {
        debug!("[{}] closing association..", self.side);

        match self.state {
            AssociationState::Established => {
                self.set_state(AssociationState::ShutdownPending);
                self.try_shutdown_transition();
                Ok(())
            }
            AssociationState::Closed
            | AssociationState::CookieWait
            | AssociationState::CookieEchoed => Err(Error::ErrShutdownNonEstablished),
            // already shutting down
            _ => Ok(()),
        }
    }

    /// Aborts the association. An ABORT chunk is queued when the peer is known.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        if self.peer_verification_tag != 0 {
            let abort = ChunkAbort {
                verification_tag_reflected: false,
                error_causes: vec![ErrorCause::new(
                    ErrorCauseCode::USER_INITIATED_ABORT,
                    Bytes::new(),
                )],
            };
            let packet = self.create_packet(vec![Chunk::Abort(abort)]);
            self.control_queue.push_back(packet);
        }

        self.close_with(AssociationError::LocallyClosed);
        Ok(())
    }

    /// Whether the association has been closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the handshake is still in progress
    pub fn is_handshaking(&self) -> bool {
        matches!(
            self.state,
            AssociationState::Closed | AssociationState::CookieWait | AssociationState::CookieEchoed
        ) && !self.closed
    }

    /// The current protocol state
    pub fn state(&self) -> AssociationState {
        self.state
    }

    /// Which side of the association we are
    pub fn side(&self) -> Side {
        self.side
    }

    /// Statistics of the association
    pub fn stats(&self) -> AssociationStats {
        self.stats
    }

    /// Smoothed round-trip time in milliseconds, zero until measured
    pub fn rtt(&self) -> u64 {
        self.rto_mgr.srtt
    }

    /// The peer address of the association
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Largest user message accepted by `Stream::write`
    pub fn max_message_size(&self) -> u32 {
        self.max_message_size
    }

    pub fn set_max_message_size(&mut self, max_message_size: u32) {
        self.max_message_size = max_message_size;
    }

    /// Bytes queued on all streams that were not yet put on the wire
    pub fn buffered_amount(&self) -> usize {
        self.pending_queue.get_num_bytes()
    }

    pub(crate) fn stream_state(&self, stream_identifier: StreamId) -> Result<&StreamState> {
        self.streams
            .get(&stream_identifier)
            .ok_or(Error::ErrStreamNotExisted)
    }

    pub(crate) fn stream_state_mut(
        &mut self,
        stream_identifier: StreamId,
    ) -> Result<&mut StreamState> {
        self.streams
            .get_mut(&stream_identifier)
            .ok_or(Error::ErrStreamNotExisted)
    }

    /// Reads the next complete message of a stream.
    pub(crate) fn read_stream(&mut self, stream_identifier: StreamId) -> Result<Option<Chunks>> {
        let s = self
            .streams
            .get_mut(&stream_identifier)
            .ok_or(Error::ErrStreamClosed)?;

        if let Some(chunks) = s.reassembly_queue.read() {
            self.remove_stream_if_closed(stream_identifier);
            return Ok(Some(chunks));
        }

        if !s.state.can_read() {
            self.remove_stream_if_closed(stream_identifier);
            return Err(Error::ErrEof);
        }

        Ok(None)
    }

    /// Puts fragments of a user message on the pending queue.
    pub(crate) fn send_payload_data(&mut self, chunks: Vec<ChunkPayloadData>) {
        for c in chunks {
            self.pending_queue.push(c);
        }
    }

    /// Requests an outgoing stream reset. The stream does not need to exist locally.
    pub(crate) fn reset_stream(&mut self, stream_identifier: StreamId) -> Result<()> {
        if self.state != AssociationState::Established {
            return Err(Error::ErrResetPacketInStateNotExist);
        }

        if let Some(s) = self.streams.get_mut(&stream_identifier) {
            if !s.state.can_write() {
                return Ok(());
            }
            s.state = s.state.close_write();
        }

        // Create DATA chunk which only contains valid stream identifier with
        // nil userData and use it as a EOS from the stream.
        let c = ChunkPayloadData {
            stream_identifier,
            beginning_fragment: true,
            ending_fragment: true,
            user_data: Bytes::new(),
            ..Default::default()
        };

        self.pending_queue.push(c);
        Ok(())
    }

    fn create_stream(
        &mut self,
        stream_identifier: StreamId,
        accept: bool,
        default_payload_type: PayloadProtocolIdentifier,
    ) {
        let s = StreamState::new(stream_identifier, default_payload_type);
        self.streams.insert(stream_identifier, s);

        if accept {
            self.stream_queue.push_back(stream_identifier);
            self.events
                .push_back(Event::Stream(StreamEvent::Opened { id: stream_identifier }));
        }
    }

    fn remove_stream_if_closed(&mut self, stream_identifier: StreamId) {
        let drained = self
            .streams
            .get(&stream_identifier)
            .map(|s| {
                s.state == stream::RecvSendState::Closed && s.reassembly_queue.get_num_bytes() == 0
            })
            .unwrap_or(false);
        if drained {
            debug!("[{}] stream {} closed", self.side, stream_identifier);
            self.streams.remove(&stream_identifier);
        }
    }

    fn set_state(&mut self, new_state: AssociationState) {
        if new_state != self.state {
            debug!(
                "[{}] state change: '{}' => '{}'",
                self.side, self.state, new_state,
            );
        }
        self.state = new_state;
    }

    fn close_with(&mut self, reason: AssociationError) {
        if self.closed {
            return;
        }
        debug!("[{}] association lost: {}", self.side, reason);

        self.closed = true;
        self.set_state(AssociationState::Closed);
        for &timer in &Timer::VALUES {
            self.timers.stop(timer);
        }
        self.events.push_back(Event::AssociationLost { reason });
    }

    fn create_packet(&self, chunks: Vec<Chunk>) -> Packet {
        Packet {
            common_header: CommonHeader {
                verification_tag: self.peer_verification_tag,
                source_port: self.source_port,
                destination_port: self.destination_port,
            },
            chunks,
        }
    }

    fn send_init(&mut self) -> Result<()> {
        let init = self.stored_init.clone().ok_or(Error::ErrInitNotStoredToSend)?;
        debug!("[{}] sending INIT", self.side);

        // INIT chunks always carry a zero verification tag
        let packet = Packet {
            common_header: CommonHeader {
                verification_tag: 0,
                source_port: self.source_port,
                destination_port: self.destination_port,
            },
            chunks: vec![Chunk::Init(init)],
        };
        self.control_queue.push_back(packet);
        Ok(())
    }

    fn send_cookie_echo(&mut self) -> Result<()> {
        let cookie_echo = self
            .stored_cookie_echo
            .clone()
            .ok_or(Error::ErrCookieEchoNotStoredToSend)?;
        debug!("[{}] sending COOKIE-ECHO", self.side);

        let packet = self.create_packet(vec![Chunk::CookieEcho(cookie_echo)]);
        self.control_queue.push_back(packet);
        Ok(())
    }

    fn check_verification_tag(&self, p: &Packet) -> bool {
        let is_init = matches!(p.chunks.first(), Some(Chunk::Init(i)) if !i.is_ack);
        if is_init {
            return p.common_header.verification_tag == 0;
        }

        if p.common_header.verification_tag == self.my_verification_tag {
            return true;
        }

        // ABORT and SHUTDOWN COMPLETE with the T bit carry the tag we sent to the peer
        p.may_reflect_tag() && p.common_header.verification_tag == self.peer_verification_tag
    }

    fn handle_inbound(&mut self, p: Packet, now: Instant) {
        if self.closed {
            trace!("[{}] dropping packet received after close", self.side);
            return;
        }

        if !self.check_verification_tag(&p) {
            trace!(
                "[{}] dropping packet with unexpected verification tag {}",
                self.side, p.common_header.verification_tag
            );
            return;
        }
        self.stats.n_packets_received += 1;

        self.handle_chunk_start();

        let Packet {
            common_header,
            chunks,
        } = p;
        for c in chunks {
            match self.handle_chunk(&common_header, c, now) {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) => warn!("[{}] failed to handle chunk: {}", self.side, err),
            }
            if self.closed {
                break;
            }
        }

        self.handle_chunk_end(now);
    }

    fn handle_chunk_start(&mut self) {
        self.delayed_ack_triggered = false;
        self.immediate_ack_triggered = false;
    }

    fn handle_chunk_end(&mut self, now: Instant) {
        if self.immediate_ack_triggered {
            self.ack_state = AckState::Immediate;
            self.timers.stop(Timer::Ack);
        } else if self.delayed_ack_triggered {
            // Will send delayed ack in the next ack timeout
            self.ack_state = AckState::Delay;
            self.timers.start(Timer::Ack, now, ACK_INTERVAL);
        }
    }

    /// Returns true when the rest of the packet must be skipped.
    fn handle_chunk(&mut self, header: &CommonHeader, chunk: Chunk, now: Instant) -> Result<bool> {
        if let Err(err) = chunk.check() {
            error!("[{}] failed validating chunk: {}", self.side, err);
            return Ok(false);
        }

        match chunk {
            Chunk::Init(c) if !c.is_ack => self.handle_init(header, c)?,
            Chunk::Init(c) => self.handle_init_ack(header, c, now)?,
            Chunk::Abort(c) => {
                self.handle_abort(c);
                return Ok(true);
            }
            Chunk::CookieEcho(c) => self.handle_cookie_echo(c),
            Chunk::CookieAck(_) => self.handle_cookie_ack(),
            Chunk::Heartbeat(c) => self.handle_heartbeat(c),
            Chunk::HeartbeatAck(_) => trace!("[{}] HEARTBEAT ACK received", self.side),
            Chunk::PayloadData(c) => self.handle_data(c),
            Chunk::SelectiveAck(c) => self.handle_sack(c, now)?,
            Chunk::Reconfig(c) => self.handle_reconfig(c)?,
            Chunk::ForwardTsn(c) => self.handle_forward_tsn(c)?,
            Chunk::Shutdown(c) => self.handle_shutdown(c),
            Chunk::ShutdownAck(_) => self.handle_shutdown_ack(),
            Chunk::ShutdownComplete(_) => self.handle_shutdown_complete(),
            Chunk::Error(c) => {
                for cause in &c.error_causes {
                    warn!("[{}] ERROR chunk received: {}", self.side, cause);
                }
            }
            Chunk::Unknown(c) => {
                let skip_remaining = c.skip_remaining();
                if c.report() {
                    let raw = Chunk::Unknown(c).marshal()?;
                    let cerr = ChunkError {
                        error_causes: vec![ErrorCause::new(
                            ErrorCauseCode::UNRECOGNIZED_CHUNK_TYPE,
                            raw,
                        )],
                    };
                    let packet = self.create_packet(vec![Chunk::Error(cerr)]);
                    self.control_queue.push_back(packet);
                }
                return Ok(skip_remaining);
            }
        }

        Ok(false)
    }

    fn handle_init(&mut self, header: &CommonHeader, i: ChunkInit) -> Result<()> {
        let state = self.state;
        debug!("[{}] chunkInit received in state '{}'", self.side, state);

        // https://tools.ietf.org/html/rfc4960#section-5.2.1
        // Upon receipt of an INIT in the COOKIE-WAIT state, an endpoint MUST
        // respond with an INIT ACK using the same parameters it sent in its
        // original INIT chunk (including its Initiate Tag, unchanged).  When
        // responding, the endpoint MUST send the INIT ACK back to the same
        // address that the original INIT (sent by this endpoint) was sent.
        if state != AssociationState::Closed
            && state != AssociationState::CookieWait
            && state != AssociationState::CookieEchoed
        {
            // 5.2.2.  Unexpected INIT in States Other than CLOSED, COOKIE-ECHOED,
            //        COOKIE-WAIT, and SHUTDOWN-ACK-SENT
            return Err(Error::ErrHandleInitState);
        }

        self.apply_peer_init(header, &i);

        let cookie = match &self.my_cookie {
            Some(cookie) => cookie.clone(),
            None => {
                let cookie = Bytes::from(rand::random::<[u8; 32]>().to_vec());
                self.my_cookie = Some(cookie.clone());
                cookie
            }
        };

        let mut params = vec![Param::StateCookie(cookie)];
        params.extend(supported_extension_params());
        let init_ack = ChunkInit {
            is_ack: true,
            initial_tsn: self.my_next_tsn,
            num_outbound_streams: self.my_max_num_outbound_streams,
            num_inbound_streams: self.my_max_num_inbound_streams,
            initiate_tag: self.my_verification_tag,
            advertised_receiver_window_credit: self.max_receive_buffer_size,
            params,
        };

        let packet = self.create_packet(vec![Chunk::Init(init_ack)]);
        self.control_queue.push_back(packet);
        Ok(())
    }

    fn handle_init_ack(&mut self, header: &CommonHeader, i: ChunkInit, now: Instant) -> Result<()> {
        let state = self.state;
        debug!("[{}] chunkInitAck received in state '{}'", self.side, state);
        if state != AssociationState::CookieWait {
            // RFC 4960
            // 5.2.3.  Unexpected INIT ACK
            //   If an INIT ACK is received by an endpoint in any state other than the
            //   COOKIE-WAIT state, the endpoint should discard the INIT ACK chunk.
            //   An unexpected INIT ACK usually indicates the processing of an old or
            //   duplicated INIT chunk.
            return Ok(());
        }

        if self.source_port != header.destination_port
            || self.destination_port != header.source_port
        {
            warn!("[{}] handle_init_ack: port mismatch", self.side);
            return Ok(());
        }

        self.apply_peer_init(header, &i);

        self.timers.stop(Timer::T1Init);
        self.stored_init = None;

        let cookie = i.state_cookie().ok_or(Error::ErrInitAckNoCookie)?;
        self.stored_cookie_echo = Some(ChunkCookieEcho { cookie });

        self.send_cookie_echo()?;

        let rto = self.rto_mgr.get_rto();
        self.timers.start(Timer::T1Cookie, now, rto);
        self.set_state(AssociationState::CookieEchoed);

        Ok(())
    }

    fn apply_peer_init(&mut self, header: &CommonHeader, i: &ChunkInit) {
        // Should we be setting any of these permanently until we've ACKed further?
        self.my_max_num_inbound_streams =
            std::cmp::min(i.num_inbound_streams, self.my_max_num_inbound_streams);
        self.my_max_num_outbound_streams =
            std::cmp::min(i.num_outbound_streams, self.my_max_num_outbound_streams);
        self.peer_verification_tag = i.initiate_tag;
        self.source_port = header.destination_port;
        self.destination_port = header.source_port;

        // 13.2 This is the last TSN received in sequence.  This value
        // is set initially by taking the peer's initial TSN,
        // received in the INIT or INIT ACK chunk, and
        // subtracting one from it.
        self.peer_last_tsn = i.initial_tsn.wrapping_sub(1);

        self.rwnd = i.advertised_receiver_window_credit;
        self.ssthresh = self.rwnd;

        self.use_forward_tsn = i.supports_forward_tsn();
        if !self.use_forward_tsn {
            warn!("[{}] not using ForwardTSN", self.side);
        }
    }

    fn handle_cookie_echo(&mut self, c: ChunkCookieEcho) {
        let state = self.state;
        debug!("[{}] COOKIE-ECHO received in state '{}'", self.side, state);

        match &self.my_cookie {
            Some(my_cookie) if *my_cookie == c.cookie => {}
            _ => return,
        }

        match state {
            // RFC 4960 5.2.4 Handle a COOKIE ECHO when a TCB Exists
            AssociationState::Closed
            | AssociationState::CookieWait
            | AssociationState::CookieEchoed => {
                self.timers.stop(Timer::T1Init);
                self.stored_init = None;

                self.timers.stop(Timer::T1Cookie);
                self.stored_cookie_echo = None;

                self.events.push_back(Event::Connected);
                self.set_state(AssociationState::Established);
            }
            _ => {}
        }

        let packet = self.create_packet(vec![Chunk::CookieAck(ChunkCookieAck)]);
        self.control_queue.push_back(packet);
    }

    fn handle_cookie_ack(&mut self) {
        let state = self.state;
        debug!("[{}] COOKIE-ACK received in state '{}'", self.side, state);
        if state != AssociationState::CookieEchoed {
            // RFC 4960
            // 5.2.5.  Handle Duplicate COOKIE-ACK.
            //   At any state other than COOKIE-ECHOED, an endpoint should silently
            //   discard a received COOKIE ACK chunk.
            return;
        }

        self.timers.stop(Timer::T1Cookie);
        self.stored_cookie_echo = None;

        self.events.push_back(Event::Connected);
        self.set_state(AssociationState::Established);
    }

    fn handle_heartbeat(&mut self, c: ChunkHeartbeat) {
        trace!("[{}] chunkHeartbeat", self.side);
        match c.info() {
            Some(info) => {
                let ack = ChunkHeartbeatAck {
                    params: vec![Param::HeartbeatInfo(info)],
                };
                let packet = self.create_packet(vec![Chunk::HeartbeatAck(ack)]);
                self.control_queue.push_back(packet);
            }
            None => warn!("[{}] failed to handle Heartbeat, no ParamHeartbeatInfo", self.side),
        }
    }

    fn handle_abort(&mut self, c: ChunkAbort) {
        let causes = c
            .error_causes
            .iter()
            .map(|cause| cause.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        warn!("[{}] ABORT received: [{}]", self.side, causes);

        self.close_with(AssociationError::Aborted(causes));
    }

    fn handle_data(&mut self, d: ChunkPayloadData) {
        trace!(
            "[{}] DATA: tsn={} immediateSack={} len={}",
            self.side,
            d.tsn,
            d.immediate_sack,
            d.user_data.len()
        );
        self.stats.n_datas += 1;

        let immediate_sack = d.immediate_sack;
        if self.payload_queue.can_push(d.tsn, self.peer_last_tsn) {
            let stream_identifier = d.stream_identifier;
            if !self.streams.contains_key(&stream_identifier) {
                // Create a new stream for a DATA chunk on an unknown stream
                self.create_stream(stream_identifier, true, PayloadProtocolIdentifier::Unknown);
            }

            let accept = if self.get_my_receiver_window_credit() > 0 {
                true
            } else {
                // Receive buffer is full: only fill holes below the highest TSN received
                match self.payload_queue.get_last_tsn_received() {
                    Some(last_tsn) => sna32lt(d.tsn, *last_tsn),
                    None => false,
                }
            };

            if accept {
                // Pass the new chunk to stream level as soon as it arrives
                self.payload_queue.push(d.clone(), self.peer_last_tsn);
                if let Some(s) = self.streams.get_mut(&stream_identifier) {
                    s.reassembly_queue.push(d);
                    if s.reassembly_queue.is_readable() {
                        self.events.push_back(Event::Stream(StreamEvent::Readable {
                            id: stream_identifier,
                        }));
                    }
                }
            } else {
                debug!(
                    "[{}] receive buffer full, dropping DATA with tsn={}",
                    self.side, d.tsn
                );
            }
        } else {
            // duplicate: record it and report it right away
            self.payload_queue.push(d, self.peer_last_tsn);
            self.immediate_ack_triggered = true;
        }

        self.handle_peer_last_tsn_and_acknowledgement(immediate_sack);
    }

    fn handle_peer_last_tsn_and_acknowledgement(&mut self, sack_immediately: bool) {
        // Try to advance peer_last_tsn

        // From RFC 3758 Sec 3.6:
        //   .. and then MUST further advance its cumulative TSN point locally
        //   if possible
        // Meaning, if peer_last_tsn+1 points to a chunk that is received,
        // advance peer_last_tsn until peer_last_tsn+1 points to unreceived chunk.
        while self
            .payload_queue
            .pop(self.peer_last_tsn.wrapping_add(1))
            .is_some()
        {
            self.peer_last_tsn = self.peer_last_tsn.wrapping_add(1);
        }

        // Pending reset requests may now be satisfied
        let requests: Vec<ParamOutgoingResetRequest> =
            self.reconfig_requests.values().cloned().collect();
        for req in requests {
            let packet = self.reset_streams_if_any(&req);
            self.control_queue.push_back(packet);
        }

        let has_packet_loss = !self.payload_queue.is_empty();
        if has_packet_loss {
            trace!(
                "[{}] packetloss: {}",
                self.side,
                self.payload_queue.get_gap_ack_blocks_string(self.peer_last_tsn)
            );
        }

        if (self.ack_state != AckState::Immediate
            && !sack_immediately
            && !has_packet_loss
            && self.ack_mode == AckMode::Normal)
            || self.ack_mode == AckMode::AlwaysDelay
        {
            if self.ack_state == AckState::Idle {
                self.delayed_ack_triggered = true;
            } else {
                self.immediate_ack_triggered = true;
            }
        } else {
            self.immediate_ack_triggered = true;
        }
    }

    fn get_my_receiver_window_credit(&self) -> u32 {
        let bytes_queued: usize = self
            .streams
            .values()
            .map(|s| s.reassembly_queue.get_num_bytes())
            .sum();
        (self.max_receive_buffer_size as usize).saturating_sub(bytes_queued) as u32
    }

    fn handle_sack(&mut self, d: ChunkSelectiveAck, now: Instant) -> Result<()> {
        trace!(
            "[{}] SACK: cumTSN={} a_rwnd={}",
            self.side, d.cumulative_tsn_ack, d.advertised_receiver_window_credit
        );
        let state = self.state;
        if state != AssociationState::Established
            && state != AssociationState::ShutdownPending
            && state != AssociationState::ShutdownReceived
        {
            return Ok(());
        }

        self.stats.n_sacks_received += 1;

        if sna32gt(self.cumulative_tsn_ack_point, d.cumulative_tsn_ack) {
            // RFC 4960 sec 6.2.1.  Processing a Received SACK
            // D)
            //   i) If Cumulative TSN Ack is less than the Cumulative TSN Ack
            //      Point, then drop the SACK.  Since Cumulative TSN Ack is
            //      monotonically increasing, a SACK whose Cumulative TSN Ack is
            //      less than the Cumulative TSN Ack Point indicates an out-of-
            //      order SACK.

            debug!(
                "[{}] SACK Cumulative ACK {} is older than ACK point {}",
                self.side, d.cumulative_tsn_ack, self.cumulative_tsn_ack_point
            );

            return Ok(());
        }

        // Process selective ack
        let (total_bytes_acked, htna) = self.process_selective_ack(&d, now)?;

        let mut cum_tsn_ack_point_advanced = false;
        if sna32lt(self.cumulative_tsn_ack_point, d.cumulative_tsn_ack) {
            trace!(
                "[{}] SACK: cumTSN advanced: {} -> {}",
                self.side, self.cumulative_tsn_ack_point, d.cumulative_tsn_ack
            );

            self.cumulative_tsn_ack_point = d.cumulative_tsn_ack;
            cum_tsn_ack_point_advanced = true;
            self.on_cumulative_tsn_ack_point_advanced(total_bytes_acked, now);
        }

        // RFC 4960 sec 6.2.1.  Processing a Received SACK
        // D)
        //   ii) Set rwnd equal to the newly received a_rwnd minus the number
        //       of bytes still outstanding after processing the Cumulative
        //       TSN Ack and the Gap Ack Blocks.
        let bytes_outstanding = self.inflight_queue.get_num_bytes() as u32;
        self.rwnd = d
            .advertised_receiver_window_credit
            .saturating_sub(bytes_outstanding);

        self.process_fast_retransmission(d.cumulative_tsn_ack, htna, cum_tsn_ack_point_advanced)?;

        if self.use_forward_tsn {
            // RFC 3758 Sec 3.5 C1
            if sna32lt(
                self.advanced_peer_tsn_ack_point,
                self.cumulative_tsn_ack_point,
            ) {
                self.advanced_peer_tsn_ack_point = self.cumulative_tsn_ack_point
            }

            // RFC 3758 Sec 3.5 C2
            let mut i = self.advanced_peer_tsn_ack_point.wrapping_add(1);
            while let Some(c) = self.inflight_queue.get(i) {
                if !c.abandoned() {
                    break;
                }
                self.advanced_peer_tsn_ack_point = i;
                i = i.wrapping_add(1);
            }

            // RFC 3758 Sec 3.5 C3
            if sna32gt(
                self.advanced_peer_tsn_ack_point,
                self.cumulative_tsn_ack_point,
            ) {
                self.will_send_forward_tsn = true;
                debug!(
                    "[{}] handleSack {}: sna32GT({}, {})",
                    self.side,
                    self.will_send_forward_tsn,
                    self.advanced_peer_tsn_ack_point,
                    self.cumulative_tsn_ack_point
                );
            }
        }

        self.postprocess_sack(now);

        Ok(())
    }

    /// Returns the number of bytes newly acknowledged and the highest TSN newly acknowledged.
    fn process_selective_ack(&mut self, d: &ChunkSelectiveAck, now: Instant) -> Result<(u32, u32)> {
        let mut bytes_acked = 0usize;

        // New ack point, so pop all ACKed packets from inflight_queue
        // We add 1 because the "currentAckPoint" has already been popped from the inflight queue
        // For the first SACK we take care of this by setting the ackpoint to cumAck - 1
        let mut i = self.cumulative_tsn_ack_point.wrapping_add(1);
        while sna32lte(i, d.cumulative_tsn_ack) {
            let c = self.inflight_queue.pop(i).ok_or(Error::ErrInflightQueueTsnPop)?;

            if !c.acked {
                // RFC 4960 sec 6.3.2.  Retransmission Timer Rules
                //   R3)  Whenever a SACK is received that acknowledges the DATA chunk
                //        with the earliest outstanding TSN for that address, restart the
                //        T3-rtx timer for that address with its current RTO (if there is
                //        still outstanding data on that address).
                if i == self.cumulative_tsn_ack_point.wrapping_add(1) {
                    // T3 timer needs to be reset. Stop it for now.
                    self.timers.stop(Timer::T3RTX);
                }

                bytes_acked += c.user_data.len();

                // RFC 4960 sec 6.3.1.  RTO Calculation
                //   C5)  Karn's algorithm: RTT measurements MUST NOT be made using
                //        packets that were retransmitted (and thus for which it is
                //        ambiguous whether the reply was for the first instance of the
                //        chunk or for a later instance)
                self.measure_rtt(c.tsn, c.nsent, c.since, now);
            }

            if self.in_fast_recovery && c.tsn == self.fast_recover_exit_point {
                debug!("[{}] exit fast-recovery", self.side);
                self.in_fast_recovery = false;
            }

            i = i.wrapping_add(1);
        }

        let mut htna = d.cumulative_tsn_ack;

        // Mark selectively acknowledged chunks as "acked"
        for g in &d.gap_ack_blocks {
            for offset in g.start..=g.end {
                let tsn = d.cumulative_tsn_ack.wrapping_add(offset as u32);

                let (acked, nsent, since) = match self.inflight_queue.get(tsn) {
                    Some(c) => (c.acked, c.nsent, c.since),
                    None => return Err(Error::ErrTsnRequestNotExist),
                };

                if !acked {
                    bytes_acked += self.inflight_queue.mark_as_acked(tsn);
                    self.measure_rtt(tsn, nsent, since, now);

                    if sna32lt(htna, tsn) {
                        htna = tsn;
                    }
                }
            }
        }

        Ok((bytes_acked as u32, htna))
    }

    fn measure_rtt(&mut self, tsn: u32, nsent: u32, since: Option<Instant>, now: Instant) {
        if nsent != 1 || !sna32gte(tsn, self.min_tsn2measure_rtt) {
            return;
        }
        if let Some(since) = since {
            // one measurement per round trip
            self.min_tsn2measure_rtt = self.my_next_tsn;
            let rtt = now.saturating_duration_since(since).as_millis() as u64;
            let srtt = self.rto_mgr.set_new_rtt(rtt);
            trace!(
                "[{}] SACK: measured-rtt={} srtt={} new-rto={}",
                self.side,
                rtt,
                srtt,
                self.rto_mgr.get_rto()
            );
        }
    }

    fn on_cumulative_tsn_ack_point_advanced(&mut self, total_bytes_acked: u32, now: Instant) {
        // RFC 4960, sec 6.3.2.  Retransmission Timer Rules
        //   R2)  Whenever all outstanding data sent to an address have been
        //        acknowledged, turn off the T3-rtx timer of that address.
        if self.inflight_queue.is_empty() {
            trace!("[{}] SACK: no more packet in-flight (pending={})", self.side, self.pending_queue.len());
            self.timers.stop(Timer::T3RTX);
        } else {
            trace!("[{}] T3-rtx timer start (pt2)", self.side);
            let rto = self.rto_mgr.get_rto();
            self.timers.start(Timer::T3RTX, now, rto);
        }

        // Update congestion control parameters
        if self.cwnd <= self.ssthresh {
            // RFC 4960, sec 7.2.1.  Slow-Start
            //   o  When cwnd is less than or equal to ssthresh, an SCTP endpoint MUST
            //      use the slow-start algorithm to increase cwnd only if the current
            //      congestion window is being fully utilized, an incoming SACK
            //      advances the Cumulative TSN Ack Point, and the data sender is not
            //      in Fast Recovery.  Only when these three conditions are met can
            //      the cwnd be increased; otherwise, the cwnd MUST not be increased.
            //      If these conditions are met, then cwnd MUST be increased by, at
            //      most, the lesser of 1) the total size of the previously
            //      outstanding DATA chunk(s) acknowledged, and 2) the destination's
            //      path MTU.
            if !self.in_fast_recovery && !self.pending_queue.is_empty() {
                self.cwnd += std::cmp::min(total_bytes_acked, self.mtu);
                trace!(
                    "[{}] updated cwnd={} ssthresh={} acked={} (SS)",
                    self.side, self.cwnd, self.ssthresh, total_bytes_acked
                );
            } else {
                trace!(
                    "[{}] cwnd did not grow: cwnd={} ssthresh={} acked={} FR={} pending={}",
                    self.side,
                    self.cwnd,
                    self.ssthresh,
                    total_bytes_acked,
                    self.in_fast_recovery,
                    self.pending_queue.len()
                );
            }
        } else {
            // RFC 4960, sec 7.2.2.  Congestion Avoidance
            //   o  Whenever cwnd is greater than ssthresh, upon each SACK arrival
            //      that advances the Cumulative TSN Ack Point, increase
            //      partial_bytes_acked by the total number of bytes of all new chunks
            //      acknowledged in that SACK including chunks acknowledged by the new
            //      Cumulative TSN Ack and by Gap Ack Blocks.
            self.partial_bytes_acked += total_bytes_acked;

            //   o  When partial_bytes_acked is equal to or greater than cwnd and
            //      before the arrival of the SACK the sender had cwnd or more bytes
            //      of data outstanding (i.e., before arrival of the SACK, flight size
            //      was greater than or equal to cwnd), increase cwnd by MTU, and
            //      reset partial_bytes_acked to (partial_bytes_acked - cwnd).
            if self.partial_bytes_acked >= self.cwnd && !self.pending_queue.is_empty() {
                self.partial_bytes_acked -= self.cwnd;
                self.cwnd += self.mtu;
                trace!(
                    "[{}] updated cwnd={} ssthresh={} acked={} (CA)",
                    self.side, self.cwnd, self.ssthresh, total_bytes_acked
                );
            }
        }
    }

    fn process_fast_retransmission(
        &mut self,
        cum_tsn_ack_point: u32,
        htna: u32,
        cum_tsn_ack_point_advanced: bool,
    ) -> Result<()> {
        // HTNA algorithm - RFC 4960 Sec 7.2.4
        // Increment missIndicator of each chunks that the SACK reported missing
        // when either of the following is met:
        // a)  Not in fast-recovery
        //     miss indications are incremented only for missing TSNs prior to the
        //     highest TSN newly acknowledged in the SACK.
        // b)  In fast-recovery AND the Cumulative TSN Ack Point advanced
        //     the miss indications are incremented for all TSNs reported missing
        //     in the SACK.
        if !self.in_fast_recovery || cum_tsn_ack_point_advanced {
            let max_tsn = if !self.in_fast_recovery {
                // a) increment only for missing TSNs prior to the HTNA
                htna
            } else {
                // b) increment for all TSNs reported missing
                cum_tsn_ack_point
                    .wrapping_add(self.inflight_queue.len() as u32)
                    .wrapping_add(1)
            };

            let mut tsn = cum_tsn_ack_point.wrapping_add(1);
            while sna32lt(tsn, max_tsn) {
                let c = self
                    .inflight_queue
                    .get_mut(tsn)
                    .ok_or(Error::ErrTsnRequestNotExist)?;
                if !c.acked && !c.abandoned() && c.miss_indicator < 3 {
                    c.miss_indicator += 1;
                    if c.miss_indicator == 3 && !self.in_fast_recovery {
                        // 2)  If not in Fast Recovery, adjust the ssthresh and cwnd of the
                        //     destination address(es) to which the missing DATA chunks were
                        //     last sent, according to the formula described in Section 7.2.3.
                        self.in_fast_recovery = true;
                        self.fast_recover_exit_point = htna;
                        self.ssthresh = std::cmp::max(self.cwnd / 2, 4 * self.mtu);
                        self.cwnd = self.ssthresh;
                        self.partial_bytes_acked = 0;
                        self.will_retransmit_fast = true;

                        trace!(
                            "[{}] updated cwnd={} ssthresh={} inflight={} (FR)",
                            self.side,
                            self.cwnd,
                            self.ssthresh,
                            self.inflight_queue.get_num_bytes()
                        );
                    }
                }
                tsn = tsn.wrapping_add(1);
            }
        }

        if self.in_fast_recovery && cum_tsn_ack_point_advanced {
            self.will_retransmit_fast = true;
        }

        Ok(())
    }

    fn postprocess_sack(&mut self, now: Instant) {
        if !self.inflight_queue.is_empty() {
            // Start timer. (noop if already started)
            trace!("[{}] T3-rtx timer start (pt3)", self.side);
            let rto = self.rto_mgr.get_rto();
            self.timers.start(Timer::T3RTX, now, rto);
        } else {
            self.try_shutdown_transition();
        }
    }

    /// Moves a pending shutdown forward once nothing is left to send or acknowledge.
    fn try_shutdown_transition(&mut self) {
        if !self.inflight_queue.is_empty() || !self.pending_queue.is_empty() {
            return;
        }

        match self.state {
            AssociationState::ShutdownPending => {
                // No more outstanding, send shutdown.
                self.will_send_shutdown = true;
                self.set_state(AssociationState::ShutdownSent);
            }
            AssociationState::ShutdownReceived => {
                // No more outstanding, send shutdown ack.
                self.will_send_shutdown_ack = true;
                self.set_state(AssociationState::ShutdownAckSent);
            }
            _ => {}
        }
    }

    fn handle_shutdown(&mut self, _c: ChunkShutdown) {
        let state = self.state;
        debug!("[{}] SHUTDOWN received in state '{}'", self.side, state);

        match state {
            AssociationState::Established => {
                self.set_state(AssociationState::ShutdownReceived);
                self.try_shutdown_transition();
            }
            // TODO: handle shutdown collision where both sides sent SHUTDOWN in ShutdownPending
            AssociationState::ShutdownSent => {
                self.will_send_shutdown_ack = true;
                self.set_state(AssociationState::ShutdownAckSent);
            }
            _ => {}
        }
    }

    fn handle_shutdown_ack(&mut self) {
        let state = self.state;
        debug!("[{}] SHUTDOWN-ACK received in state '{}'", self.side, state);
        if state == AssociationState::ShutdownSent || state == AssociationState::ShutdownAckSent {
            self.timers.stop(Timer::T2Shutdown);
            self.will_send_shutdown_complete = true;
        }
    }

    fn handle_shutdown_complete(&mut self) {
        let state = self.state;
        debug!("[{}] SHUTDOWN-COMPLETE received in state '{}'", self.side, state);
        if state == AssociationState::ShutdownAckSent {
            self.timers.stop(Timer::T2Shutdown);
            self.close_with(AssociationError::ClosedByPeer);
        }
    }

    fn handle_forward_tsn(&mut self, c: ChunkForwardTsn) -> Result<()> {
        trace!("[{}] FwdTSN: {}", self.side, c);

        if !self.use_forward_tsn {
            warn!("[{}] received FwdTSN but not enabled", self.side);
            // Return an error chunk
            let raw = Chunk::ForwardTsn(c).marshal()?;
            let cerr = ChunkError {
                error_causes: vec![ErrorCause::new(ErrorCauseCode::UNRECOGNIZED_CHUNK_TYPE, raw)],
            };
            let packet = self.create_packet(vec![Chunk::Error(cerr)]);
            self.control_queue.push_back(packet);
            return Ok(());
        }

        // From RFC 3758 Sec 3.6:
        //   Note, if the "New Cumulative TSN" value carried in the arrived
        //   FORWARD TSN chunk is found to be behind or at the current cumulative
        //   TSN point, the data receiver MUST treat this FORWARD TSN as out-of-
        //   date and MUST NOT update its Cumulative TSN.  The receiver SHOULD
        //   send a SACK to its peer (the sender of the FORWARD TSN) since such a
        //   duplicate may indicate the previous SACK was lost in the network.
        trace!(
            "[{}] should send ack? newCumTSN={} peer_last_tsn={}",
            self.side, c.new_cumulative_tsn, self.peer_last_tsn
        );
        if sna32lte(c.new_cumulative_tsn, self.peer_last_tsn) {
            trace!("[{}] sending ack on Forward TSN", self.side);
            self.immediate_ack_triggered = true;
            return Ok(());
        }

        // From RFC 3758 Sec 3.6:
        //   the receiver MUST perform the same TSN handling, including duplicate
        //   detection, gap detection, SACK generation, cumulative TSN
        //   advancement, etc. as defined in RFC 2960 [2]---with the following
        //   exceptions and additions.
        //   When a FORWARD TSN chunk arrives, the data receiver MUST first update
        //   its cumulative TSN point to the value carried in the FORWARD TSN
        //   chunk,

        // Advance peer_last_tsn
        while sna32lt(self.peer_last_tsn, c.new_cumulative_tsn) {
            self.payload_queue.pop(self.peer_last_tsn.wrapping_add(1)); // may not exist
            self.peer_last_tsn = self.peer_last_tsn.wrapping_add(1);
        }

        // Report new peer_last_tsn value and abandoned largest SSN value to
        // corresponding streams so that the abandoned chunks can be removed
        // from the reassembly queue.
        for forwarded in &c.streams {
            if let Some(s) = self.streams.get_mut(&forwarded.identifier) {
                s.reassembly_queue.forward_tsn_for_ordered(forwarded.sequence);
            }
        }

        // TSN may be forwarded for unordered chunks. ForwardTSN chunk does not
        // report which stream identifier it skipped for unordered chunks.
        // Therefore, we need to broadcast this event to all existing streams for
        // unordered chunks.
        let mut readable = vec![];
        for (id, s) in self.streams.iter_mut() {
            s.reassembly_queue
                .forward_tsn_for_unordered(c.new_cumulative_tsn);
            if s.reassembly_queue.is_readable() {
                readable.push(*id);
            }
        }
        readable.sort_unstable();
        for id in readable {
            self.events
                .push_back(Event::Stream(StreamEvent::Readable { id }));
        }

        self.handle_peer_last_tsn_and_acknowledgement(false);
        Ok(())
    }

    fn handle_reconfig(&mut self, c: ChunkReconfig) -> Result<()> {
        trace!("[{}] handle_reconfig", self.side);

        if let Some(param_a) = &c.param_a {
            self.handle_reconfig_param(param_a)?;
        }
        if let Some(param_b) = &c.param_b {
            self.handle_reconfig_param(param_b)?;
        }
        Ok(())
    }

    fn handle_reconfig_param(&mut self, raw: &Param) -> Result<()> {
        match raw {
            Param::OutgoingResetRequest(p) => {
                self.reconfig_requests
                    .insert(p.reconfig_request_sequence_number, p.clone());
                let packet = self.reset_streams_if_any(p);
                self.control_queue.push_back(packet);
                Ok(())
            }
            Param::ReconfigResponse(p) => {
                self.handle_reconfig_response(p);
                Ok(())
            }
            _ => Err(Error::ErrParamTypeUnhandled {
                typ: raw.param_type(),
            }),
        }
    }

    fn handle_reconfig_response(&mut self, p: &ParamReconfigResponse) {
        if p.result == ReconfigResult::InProgress {
            // the peer still waits for DATA below our sender_last_tsn
            return;
        }

        if let Some(reconfig) = self.reconfigs.remove(&p.reconfig_response_sequence_number) {
            if let Some(Param::OutgoingResetRequest(req)) = &reconfig.param_a {
                for id in &req.stream_identifiers {
                    self.remove_stream_if_closed(*id);
                }
            }
        }
        if self.reconfigs.is_empty() {
            self.timers.stop(Timer::Reconfig);
        }
    }

    fn reset_streams_if_any(&mut self, p: &ParamOutgoingResetRequest) -> Packet {
        let mut result = ReconfigResult::SuccessPerformed;
        if sna32lte(p.sender_last_tsn, self.peer_last_tsn) {
            debug!(
                "[{}] resetStream(): senderLastTSN={} <= peer_last_tsn={}",
                self.side, p.sender_last_tsn, self.peer_last_tsn
            );
            for id in &p.stream_identifiers {
                if let Some(s) = self.streams.get_mut(id) {
                    if s.state.can_read() {
                        s.state = s.state.close_read();
                        self.events
                            .push_back(Event::Stream(StreamEvent::Stopped { id: *id }));
                    }
                }
                self.remove_stream_if_closed(*id);
            }
            self.reconfig_requests
                .remove(&p.reconfig_request_sequence_number);
        } else {
            debug!(
                "[{}] resetStream(): senderLastTSN={} > peer_last_tsn={}",
                self.side, p.sender_last_tsn, self.peer_last_tsn
            );
            result = ReconfigResult::InProgress;
        }

        self.create_packet(vec![Chunk::Reconfig(ChunkReconfig {
            param_a: Some(Param::ReconfigResponse(ParamReconfigResponse {
                reconfig_response_sequence_number: p.reconfig_request_sequence_number,
                result,
            })),
            param_b: None,
        })])
    }

    fn on_ack_timeout(&mut self) {
        trace!(
            "[{}] ack timed out (ack_state: {})",
            self.side, self.ack_state
        );
        self.stats.n_ack_timeouts += 1;
        self.ack_state = AckState::Immediate;
        self.timers.stop(Timer::Ack);
    }

    fn on_retransmission_timeout(&mut self, timer: Timer, now: Instant) {
        match timer {
            Timer::T1Init => {
                if let Err(err) = self.send_init() {
                    debug!("[{}] failed to retransmit INIT: {}", self.side, err);
                }
            }
            Timer::T1Cookie => {
                if let Err(err) = self.send_cookie_echo() {
                    debug!("[{}] failed to retransmit COOKIE-ECHO: {}", self.side, err);
                }
            }
            Timer::T2Shutdown => {
                debug!(
                    "[{}] retransmission of shutdown timeout: {}",
                    self.side,
                    self.timers.retrans(timer)
                );
                match self.state {
                    AssociationState::ShutdownSent => self.will_send_shutdown = true,
                    AssociationState::ShutdownAckSent => self.will_send_shutdown_ack = true,
                    _ => {}
                }
            }
            Timer::T3RTX => {
                self.stats.n_t3_timeouts += 1;

                // RFC 4960 sec 6.3.3
                //  E1)  For the destination address for which the timer expires, adjust
                //       its ssthresh with rules defined in Section 7.2.3 and set the
                //       cwnd <- MTU.
                // RFC 4960 sec 7.2.3
                //   When the T3-rtx timer expires on an address, SCTP should perform slow
                //   start by:
                //      ssthresh = max(cwnd/2, 4*MTU)
                //      cwnd = 1*MTU
                self.ssthresh = std::cmp::max(self.cwnd / 2, 4 * self.mtu);
                self.cwnd = self.mtu;
                trace!(
                    "[{}] updated cwnd={} ssthresh={} inflight={} (RTO)",
                    self.side,
                    self.cwnd,
                    self.ssthresh,
                    self.inflight_queue.get_num_bytes()
                );

                // RFC 3758 sec 3.5
                //  A5) Any time the T3-rtx timer expires, on any destination, the sender
                //  SHOULD try to advance the "Advanced.Peer.Ack.Point" by following
                //  the procedures outlined in C2 - C5.
                if self.use_forward_tsn {
                    // RFC 3758 Sec 3.5 C2
                    let mut i = self.advanced_peer_tsn_ack_point.wrapping_add(1);
                    while let Some(c) = self.inflight_queue.get(i) {
                        if !c.abandoned() {
                            break;
                        }
                        self.advanced_peer_tsn_ack_point = i;
                        i = i.wrapping_add(1);
                    }

                    // RFC 3758 Sec 3.5 C3
                    if sna32gt(
                        self.advanced_peer_tsn_ack_point,
                        self.cumulative_tsn_ack_point,
                    ) {
                        self.will_send_forward_tsn = true;
                    }
                }

                debug!(
                    "[{}] T3-rtx timed out: n_rtos={} cwnd={} ssthresh={}",
                    self.side,
                    self.timers.retrans(timer),
                    self.cwnd,
                    self.ssthresh
                );

                self.inflight_queue.mark_all_to_retransmit();
                if self.inflight_queue.is_empty() {
                    return;
                }
            }
            Timer::Reconfig => {
                self.will_retransmit_reconfig = true;
            }
            Timer::Ack => return,
        }

        let (rto, rto_max) = (self.rto_mgr.get_rto(), self.rto_mgr.get_rto_max());
        self.timers.restart_capped(timer, now, rto, rto_max);
    }

    fn on_retransmission_failure(&mut self, timer: Timer) {
        error!(
            "[{}] {:?} retransmission failure after {} attempts",
            self.side,
            timer,
            self.timers.retrans(timer)
        );
        match timer {
            Timer::T1Init | Timer::T1Cookie => {
                self.close_with(AssociationError::HandshakeFailed)
            }
            _ => self.close_with(AssociationError::TimedOut),
        }
    }

    fn gather_outbound(&mut self, now: Instant) -> Vec<Packet> {
        let mut packets: Vec<Packet> = self.control_queue.drain(..).collect();

        match self.state {
            AssociationState::Established => {
                packets.extend(self.gather_data_packets_to_retransmit(now));
                packets.extend(self.gather_outbound_data_and_reconfig_packets(now));
                packets.extend(self.gather_outbound_fast_retransmission_packets(now));
                packets.extend(self.gather_outbound_sack_packets());
                packets.extend(self.gather_outbound_forward_tsn_packets());
            }
            AssociationState::ShutdownPending
            | AssociationState::ShutdownSent
            | AssociationState::ShutdownReceived => {
                packets.extend(self.gather_data_packets_to_retransmit(now));
                packets.extend(self.gather_outbound_data_and_reconfig_packets(now));
                packets.extend(self.gather_outbound_fast_retransmission_packets(now));
                packets.extend(self.gather_outbound_sack_packets());
                packets.extend(self.gather_outbound_shutdown_packets(now));
            }
            AssociationState::ShutdownAckSent => {
                packets.extend(self.gather_outbound_shutdown_packets(now));
            }
            _ => {}
        }

        packets
    }

    fn gather_data_packets_to_retransmit(&mut self, now: Instant) -> Vec<Packet> {
        let mut chunks = vec![];
        let mut bytes_to_send = 0;
        let mut done = false;
        let mut i = 0;
        while !done {
            let tsn = self.cumulative_tsn_ack_point.wrapping_add(i + 1);
            let (retransmit, data_len) = match self.inflight_queue.get(tsn) {
                Some(c) => (c.retransmit, c.user_data.len()),
                None => break, // end of pending data
            };
            i += 1;

            if !retransmit {
                continue;
            }

            if i == 1 && (self.rwnd as usize) < data_len {
                // Send it as a zero window probe
                done = true;
            } else if bytes_to_send + data_len > self.rwnd as usize {
                break;
            }

            // reduce peer's rwnd
            self.rwnd = self.rwnd.saturating_sub(data_len as u32);
            bytes_to_send += data_len;

            if let Some(c) = self.inflight_queue.get_mut(tsn) {
                c.retransmit = false;
                c.nsent += 1;
            }
            if let Some(c) = self.inflight_queue.get(tsn) {
                self.check_partial_reliability_status(c, now);
                trace!(
                    "[{}] retransmitting tsn={} ssn={} sent={}",
                    self.side, c.tsn, c.stream_sequence_number, c.nsent
                );
                chunks.push(c.clone());
            }
        }

        self.bundle_data_chunks_into_packets(chunks)
    }

    fn gather_outbound_data_and_reconfig_packets(&mut self, now: Instant) -> Vec<Packet> {
        let mut packets = vec![];

        // Pop unsent data chunks from the pending queue to send as much as
        // cwnd and rwnd allow.
        let (chunks, sis_to_reset) = self.pop_pending_data_chunks_to_send(now);
        if !chunks.is_empty() {
            // Start timer. (noop if already started)
            trace!("[{}] T3-rtx timer start (pt1)", self.side);
            let rto = self.rto_mgr.get_rto();
            self.timers.start(Timer::T3RTX, now, rto);

            packets.extend(self.bundle_data_chunks_into_packets(chunks));
        }

        if !sis_to_reset.is_empty() || self.will_retransmit_reconfig {
            if self.will_retransmit_reconfig {
                self.will_retransmit_reconfig = false;
                debug!(
                    "[{}] retransmit {} RECONFIG chunk(s)",
                    self.side,
                    self.reconfigs.len()
                );
                let reconfigs: Vec<ChunkReconfig> = self.reconfigs.values().cloned().collect();
                for c in reconfigs {
                    packets.push(self.create_packet(vec![Chunk::Reconfig(c)]));
                }
            }

            if !sis_to_reset.is_empty() {
                let rsn = self.generate_next_rsn();
                let tsn = self.my_next_tsn.wrapping_sub(1);
                debug!(
                    "[{}] sending RECONFIG: rsn={} tsn={} streams={:?}",
                    self.side, rsn, tsn, sis_to_reset
                );

                let c = ChunkReconfig {
                    param_a: Some(Param::OutgoingResetRequest(ParamOutgoingResetRequest {
                        reconfig_request_sequence_number: rsn,
                        sender_last_tsn: tsn,
                        stream_identifiers: sis_to_reset,
                        ..Default::default()
                    })),
                    param_b: None,
                };
                self.reconfigs.insert(rsn, c.clone());
                packets.push(self.create_packet(vec![Chunk::Reconfig(c)]));
            }

            if !self.reconfigs.is_empty() {
                let rto = self.rto_mgr.get_rto();
                self.timers.start(Timer::Reconfig, now, rto);
            }
        }

        packets
    }

    fn gather_outbound_fast_retransmission_packets(&mut self, now: Instant) -> Vec<Packet> {
        let mut packets = vec![];

        if self.will_retransmit_fast {
            self.will_retransmit_fast = false;

            let mut to_fast_retrans = vec![];
            let mut fast_retrans_size = COMMON_HEADER_SIZE;

            let mut i = 0;
            loop {
                let tsn = self.cumulative_tsn_ack_point.wrapping_add(i + 1);
                i += 1;
                let c = match self.inflight_queue.get_mut(tsn) {
                    Some(c) => c,
                    None => break, // end of pending data
                };

                if c.acked || c.abandoned() || c.nsent > 1 || c.miss_indicator < 3 {
                    continue;
                }

                // RFC 4960 Sec 7.2.4 Fast Retransmit on Gap Reports
                //  3)  Determine how many of the earliest (i.e., lowest TSN) DATA chunks
                //      marked for retransmission will fit into a single packet, subject
                //      to constraint of the path MTU of the destination transport
                //      address to which the packet is being sent.  Call this value K.
                //      Retransmit those K DATA chunks in a single packet.  When a Fast
                //      Retransmit is being performed, the sender SHOULD ignore the value
                //      of cwnd and SHOULD NOT delay retransmission for this packet.
                let data_chunk_size = DATA_CHUNK_HEADER_SIZE + c.user_data.len() as u32;
                if self.mtu < fast_retrans_size + data_chunk_size {
                    break;
                }

                fast_retrans_size += data_chunk_size;
                self.stats.n_fast_retrans += 1;
                c.nsent += 1;
                trace!(
                    "[{}] fast-retransmit: tsn={} sent={} htna={}",
                    self.side, c.tsn, c.nsent, self.fast_recover_exit_point
                );
                to_fast_retrans.push(tsn);
            }

            let mut chunks = vec![];
            for tsn in to_fast_retrans {
                if let Some(c) = self.inflight_queue.get(tsn) {
                    self.check_partial_reliability_status(c, now);
                    chunks.push(Chunk::PayloadData(c.clone()));
                }
            }

            if !chunks.is_empty() {
                packets.push(self.create_packet(chunks));
            }
        }

        packets
    }

    fn gather_outbound_sack_packets(&mut self) -> Vec<Packet> {
        if self.ack_state == AckState::Immediate {
            self.ack_state = AckState::Idle;
            let sack = self.create_selective_ack_chunk();
            trace!("[{}] sending SACK: {}", self.side, sack);
            self.stats.n_sacks_sent += 1;
            vec![self.create_packet(vec![Chunk::SelectiveAck(sack)])]
        } else {
            vec![]
        }
    }

    fn gather_outbound_forward_tsn_packets(&mut self) -> Vec<Packet> {
        if self.will_send_forward_tsn {
            self.will_send_forward_tsn = false;
            if sna32gt(
                self.advanced_peer_tsn_ack_point,
                self.cumulative_tsn_ack_point,
            ) {
                let fwd_tsn = self.create_forward_tsn();
                return vec![self.create_packet(vec![Chunk::ForwardTsn(fwd_tsn)])];
            }
        }

        vec![]
    }

    fn gather_outbound_shutdown_packets(&mut self, now: Instant) -> Vec<Packet> {
        let rto = self.rto_mgr.get_rto();
        if self.will_send_shutdown {
            self.will_send_shutdown = false;

            let shutdown = ChunkShutdown {
                cumulative_tsn_ack: self.peer_last_tsn,
            };
            self.timers.start(Timer::T2Shutdown, now, rto);
            vec![self.create_packet(vec![Chunk::Shutdown(shutdown)])]
        } else if self.will_send_shutdown_ack {
            self.will_send_shutdown_ack = false;

            self.timers.start(Timer::T2Shutdown, now, rto);
            vec![self.create_packet(vec![Chunk::ShutdownAck(ChunkShutdownAck)])]
        } else if self.will_send_shutdown_complete {
            self.will_send_shutdown_complete = false;

            let packet = self.create_packet(vec![Chunk::ShutdownComplete(
                ChunkShutdownComplete {
                    verification_tag_reflected: false,
                },
            )]);
            self.close_with(AssociationError::LocallyClosed);
            vec![packet]
        } else {
            vec![]
        }
    }

    /// Returns DATA chunks to send and the streams whose reset markers were dequeued.
    fn pop_pending_data_chunks_to_send(
        &mut self,
        now: Instant,
    ) -> (Vec<ChunkPayloadData>, Vec<StreamId>) {
        let mut chunks = vec![];
        let mut sis_to_reset = vec![]; // stream identifiers to reset

        if self.pending_queue.is_empty() {
            return (chunks, sis_to_reset);
        }

        // RFC 4960 sec 6.1.  Transmission of DATA Chunks
        //   A) At any given time, the data sender MUST NOT transmit new data to
        //      any destination transport address if its peer's rwnd indicates
        //      that the peer has no buffer space (i.e., rwnd is 0; see Section
        //      6.2.1).  However, regardless of the value of rwnd (including if it
        //      is 0), the data sender can always have one DATA chunk in flight to
        //      the receiver if allowed by cwnd (see rule B, below).
        while let Some(c) = self.pending_queue.peek() {
            let (beginning_fragment, unordered, data_len, stream_identifier) = (
                c.beginning_fragment,
                c.unordered,
                c.user_data.len(),
                c.stream_identifier,
            );

            if data_len == 0 {
                sis_to_reset.push(stream_identifier);
                if self
                    .pending_queue
                    .pop(beginning_fragment, unordered)
                    .is_none()
                {
                    error!("[{}] failed to pop from pending queue", self.side);
                }
                continue;
            }

            if self.inflight_queue.get_num_bytes() + data_len > self.cwnd as usize {
                break; // would exceed cwnd
            }

            if data_len > self.rwnd as usize {
                break; // no more rwnd
            }

            self.rwnd -= data_len as u32;

            if let Some(chunk) =
                self.move_pending_data_chunk_to_inflight_queue(beginning_fragment, unordered, now)
            {
                chunks.push(chunk);
            }
        }

        // the data sender can always have one DATA chunk in flight to the receiver
        if chunks.is_empty() && self.inflight_queue.is_empty() {
            // Send zero window probe
            if let Some(c) = self.pending_queue.peek() {
                let (beginning_fragment, unordered, data_len) =
                    (c.beginning_fragment, c.unordered, c.user_data.len());
                if data_len > 0 {
                    if let Some(chunk) = self.move_pending_data_chunk_to_inflight_queue(
                        beginning_fragment,
                        unordered,
                        now,
                    ) {
                        chunks.push(chunk);
                    }
                }
            }
        }

        (chunks, sis_to_reset)
    }

    /// Assigns a TSN to the next pending chunk and moves it to the inflight queue.
    fn move_pending_data_chunk_to_inflight_queue(
        &mut self,
        beginning_fragment: bool,
        unordered: bool,
        now: Instant,
    ) -> Option<ChunkPayloadData> {
        let mut c = match self.pending_queue.pop(beginning_fragment, unordered) {
            Some(c) => c,
            None => {
                error!("[{}] failed to pop from pending queue", self.side);
                return None;
            }
        };

        // Mark all fragments are in-flight now
        if c.ending_fragment {
            c.set_all_inflight();
        }

        // Assign TSN
        c.tsn = self.generate_next_tsn();

        c.since = Some(now); // use to calculate RTT and also for maxPacketLifeTime
        c.nsent = 1; // being sent for the first time

        self.check_partial_reliability_status(&c, now);
        self.on_buffer_released(c.stream_identifier, c.user_data.len());

        trace!(
            "[{}] sending ppi={} tsn={} ssn={} sent={} len={} ({},{})",
            self.side,
            c.payload_type as u32,
            c.tsn,
            c.stream_sequence_number,
            c.nsent,
            c.user_data.len(),
            c.beginning_fragment,
            c.ending_fragment
        );

        self.inflight_queue.push_no_check(c.clone());

        Some(c)
    }

    /// Bytes of a stream left the send queue for the wire.
    fn on_buffer_released(&mut self, stream_identifier: StreamId, n_bytes_released: usize) {
        if n_bytes_released == 0 {
            return;
        }

        if let Some(s) = self.streams.get_mut(&stream_identifier) {
            let from_amount = s.buffered_amount;
            s.buffered_amount = s.buffered_amount.saturating_sub(n_bytes_released);

            trace!(
                "[{}] stream {} buffered_amount = {}",
                self.side, stream_identifier, s.buffered_amount
            );

            if from_amount > s.buffered_amount_low && s.buffered_amount <= s.buffered_amount_low {
                self.events
                    .push_back(Event::Stream(StreamEvent::BufferedAmountLow {
                        id: stream_identifier,
                    }));
            }
        }
    }

    fn check_partial_reliability_status(&self, c: &ChunkPayloadData, now: Instant) {
        if !self.use_forward_tsn {
            return;
        }

        // draft-ietf-rtcweb-data-protocol-09.txt section 6
        //  6.  Procedures
        //      All Data Channel Establishment Protocol messages MUST be sent using
        //      ordered delivery and reliable transmission.
        if c.payload_type == PayloadProtocolIdentifier::Dcep {
            return;
        }

        // PR-SCTP
        if let Some(s) = self.streams.get(&c.stream_identifier) {
            match s.reliability_type {
                ReliabilityType::Rexmit => {
                    if c.nsent >= s.reliability_value {
                        c.set_abandoned(true);
                        trace!(
                            "[{}] marked as abandoned: tsn={} ppi={} (remix: {})",
                            self.side, c.tsn, c.payload_type, c.nsent
                        );
                    }
                }
                ReliabilityType::Timed => {
                    if let Some(since) = c.since {
                        let elapsed = now.saturating_duration_since(since).as_millis();
                        if elapsed >= s.reliability_value as u128 {
                            c.set_abandoned(true);
                            trace!(
                                "[{}] marked as abandoned: tsn={} ppi={} (timed: {})",
                                self.side, c.tsn, c.payload_type, elapsed
                            );
                        }
                    }
                }
                ReliabilityType::Reliable => {}
            }
        }
    }

    fn bundle_data_chunks_into_packets(&self, chunks: Vec<ChunkPayloadData>) -> Vec<Packet> {
        let mut packets = vec![];
        let mut chunks_to_send = vec![];
        let mut bytes_in_packet = COMMON_HEADER_SIZE;

        for c in chunks {
            // RFC 4960 sec 6.1.  Transmission of DATA Chunks
            //   Multiple DATA chunks committed for transmission MAY be bundled in a
            //   single packet.  Furthermore, DATA chunks being retransmitted MAY be
            //   bundled with new DATA chunks, as long as the resulting packet size
            //   does not exceed the path MTU.
            let chunk_size_in_packet = DATA_CHUNK_HEADER_SIZE + c.user_data.len() as u32;
            if !chunks_to_send.is_empty() && bytes_in_packet + chunk_size_in_packet > self.mtu {
                packets.push(self.create_packet(std::mem::take(&mut chunks_to_send)));
                bytes_in_packet = COMMON_HEADER_SIZE;
            }

            bytes_in_packet += chunk_size_in_packet;
            bytes_in_packet += get_padding_size(chunk_size_in_packet as usize) as u32;
            chunks_to_send.push(Chunk::PayloadData(c));
        }

        if !chunks_to_send.is_empty() {
            packets.push(self.create_packet(chunks_to_send));
        }

        packets
    }

    fn create_selective_ack_chunk(&mut self) -> ChunkSelectiveAck {
        ChunkSelectiveAck {
            cumulative_tsn_ack: self.peer_last_tsn,
            advertised_receiver_window_credit: self.get_my_receiver_window_credit(),
            gap_ack_blocks: self.payload_queue.get_gap_ack_blocks(self.peer_last_tsn),
            duplicate_tsn: self.payload_queue.pop_duplicates(),
        }
    }

    /// Builds a FORWARD TSN chunk up to the advanced peer ack point.
    fn create_forward_tsn(&self) -> ChunkForwardTsn {
        // RFC 3758 Sec 3.5 C4
        let mut stream_map: HashMap<u16, u16> = HashMap::new(); // to report only once per SI
        let mut i = self.cumulative_tsn_ack_point.wrapping_add(1);
        while sna32lte(i, self.advanced_peer_tsn_ack_point) {
            let c = match self.inflight_queue.get(i) {
                Some(c) => c,
                None => break,
            };

            // unordered chunks carry no SSN to report
            if !c.unordered {
                match stream_map.get(&c.stream_identifier) {
                    Some(ssn) if sna16lt(c.stream_sequence_number, *ssn) => {
                        // to report only once with greatest SSN
                    }
                    _ => {
                        stream_map.insert(c.stream_identifier, c.stream_sequence_number);
                    }
                }
            }
            i = i.wrapping_add(1);
        }

        let mut streams: Vec<ChunkForwardTsnStream> = stream_map
            .into_iter()
            .map(|(identifier, sequence)| ChunkForwardTsnStream {
                identifier,
                sequence,
            })
            .collect();
        streams.sort_by_key(|s| s.identifier);

        ChunkForwardTsn {
            new_cumulative_tsn: self.advanced_peer_tsn_ack_point,
            streams,
        }
    }

    fn generate_next_tsn(&mut self) -> u32 {
        let tsn = self.my_next_tsn;
        self.my_next_tsn = self.my_next_tsn.wrapping_add(1);
        tsn
    }

    fn generate_next_rsn(&mut self) -> u32 {
        let rsn = self.my_next_rsn;
        self.my_next_rsn = self.my_next_rsn.wrapping_add(1);
        rsn
    }
}

/// Parameters announcing RFC 3758 partial reliability and RFC 6525 stream reset.
fn supported_extension_params() -> Vec<Param> {
    vec![
        Param::ForwardTsnSupported,
        Param::SupportedExtensions(vec![CT_RECONFIG, CT_FORWARD_TSN]),
    ]
}
