use crate::association::Association;
use crate::association::state::AssociationState;
use crate::chunk::chunk_payload_data::{ChunkPayloadData, PayloadProtocolIdentifier};
use crate::queue::reassembly_queue::{Chunks, ReassemblyQueue};

use bytes::Bytes;
use log::{debug, trace};
use shared::error::{Error, Result};
use std::fmt;

/// Identifier for a stream within a particular association
pub type StreamId = u16;

/// Application events about streams
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum StreamEvent {
    /// One or more new streams has been opened by the peer
    Opened { id: StreamId },
    /// A currently open stream has data or errors waiting to be read
    Readable { id: StreamId },
    /// A formerly write-blocked stream might be ready for a write or have been stopped
    Writable { id: StreamId },
    /// The peer reset its outgoing side of the stream; no more data will arrive
    Stopped { id: StreamId },
    /// The buffered amount of the stream dropped to its low threshold
    BufferedAmountLow { id: StreamId },
}

/// Reliability type for stream
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ReliabilityType {
    /// ReliabilityTypeReliable is used for reliable transmission
    #[default]
    Reliable = 0,
    /// ReliabilityTypeRexmit is used for partial reliability by retransmission count
    Rexmit = 1,
    /// ReliabilityTypeTimed is used for partial reliability by retransmission duration
    Timed = 2,
}

impl fmt::Display for ReliabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ReliabilityType::Reliable => "Reliable",
            ReliabilityType::Rexmit => "Rexmit",
            ReliabilityType::Timed => "Timed",
        };
        write!(f, "{s}")
    }
}

impl From<u8> for ReliabilityType {
    fn from(v: u8) -> ReliabilityType {
        match v {
            1 => ReliabilityType::Rexmit,
            2 => ReliabilityType::Timed,
            _ => ReliabilityType::Reliable,
        }
    }
}

/// Lifecycle of a stream's send and receive halves.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RecvSendState {
    #[default]
    Closed = 0,
    ReadOnly = 1,
    WriteOnly = 2,
    ReadWritable = 3,
}

impl RecvSendState {
    pub(crate) fn can_write(self) -> bool {
        matches!(self, RecvSendState::WriteOnly | RecvSendState::ReadWritable)
    }

    pub(crate) fn can_read(self) -> bool {
        matches!(self, RecvSendState::ReadOnly | RecvSendState::ReadWritable)
    }

    pub(crate) fn close_write(self) -> Self {
        match self {
            RecvSendState::ReadWritable => RecvSendState::ReadOnly,
            RecvSendState::WriteOnly => RecvSendState::Closed,
            other => other,
        }
    }

    pub(crate) fn close_read(self) -> Self {
        match self {
            RecvSendState::ReadWritable => RecvSendState::WriteOnly,
            RecvSendState::ReadOnly => RecvSendState::Closed,
            other => other,
        }
    }
}

/// Per-stream state kept by the association.
#[derive(Debug)]
pub struct StreamState {
    pub(crate) stream_identifier: StreamId,
    pub(crate) default_payload_type: PayloadProtocolIdentifier,
    pub(crate) reassembly_queue: ReassemblyQueue,
    pub(crate) sequence_number: u16,
    pub(crate) state: RecvSendState,
    pub(crate) unordered: bool,
    pub(crate) reliability_type: ReliabilityType,
    pub(crate) reliability_value: u32,
    pub(crate) buffered_amount: usize,
    pub(crate) buffered_amount_low: usize,
}

impl StreamState {
    pub(crate) fn new(
        stream_identifier: StreamId,
        default_payload_type: PayloadProtocolIdentifier,
    ) -> Self {
        StreamState {
            stream_identifier,
            default_payload_type,
            reassembly_queue: ReassemblyQueue::new(stream_identifier),
            sequence_number: 0,
            state: RecvSendState::ReadWritable,
            unordered: false,
            reliability_type: ReliabilityType::Reliable,
            reliability_value: 0,
            buffered_amount: 0,
            buffered_amount_low: 0,
        }
    }

    /// Splits a user message into DATA chunks of at most `max_payload_size` bytes.
    pub(crate) fn packetize(
        &mut self,
        raw: &Bytes,
        ppi: PayloadProtocolIdentifier,
        max_payload_size: usize,
    ) -> Vec<ChunkPayloadData> {
        // DCEP messages are always sent ordered and reliably
        let unordered = ppi != PayloadProtocolIdentifier::Dcep && self.unordered;

        // RFC 4960 forbids DATA chunks without user data
        let raw = if raw.is_empty() {
            Bytes::from_static(&[0])
        } else {
            raw.clone()
        };

        let mut chunks = vec![];
        let mut head_abandoned = None;
        let mut head_all_inflight = None;
        let mut i = 0;
        let mut remaining = raw.len();
        while remaining != 0 {
            let fragment_size = std::cmp::min(max_payload_size, remaining);

            let mut chunk = ChunkPayloadData {
                stream_identifier: self.stream_identifier,
                user_data: raw.slice(i..i + fragment_size),
                unordered,
                beginning_fragment: i == 0,
                ending_fragment: remaining - fragment_size == 0,
                immediate_sack: false,
                payload_type: ppi,
                stream_sequence_number: self.sequence_number,
                ..Default::default()
            };

            // fragments of one message share the abandoned flags of the first one
            match (&head_abandoned, &head_all_inflight) {
                (Some(abandoned), Some(all_inflight)) => {
                    chunk.abandoned = std::sync::Arc::clone(abandoned);
                    chunk.all_inflight = std::sync::Arc::clone(all_inflight);
                }
                _ => {
                    head_abandoned = Some(chunk.abandoned.clone());
                    head_all_inflight = Some(chunk.all_inflight.clone());
                }
            }

            chunks.push(chunk);

            remaining -= fragment_size;
            i += fragment_size;
        }

        // RFC 4960 Sec 6.6
        // Note: When transmitting ordered and unordered data, an endpoint does
        // not increment its Stream Sequence Number when transmitting a DATA
        // chunk with U flag set to 1.
        if !unordered {
            self.sequence_number = self.sequence_number.wrapping_add(1);
        }

        chunks
    }
}

/// A borrowed handle to one stream of an association.
pub struct Stream<'a> {
    pub(crate) stream_identifier: StreamId,
    pub(crate) association: &'a mut Association,
}

impl Stream<'_> {
    pub fn stream_identifier(&self) -> StreamId {
        self.stream_identifier
    }

    /// Reads the next complete message, or `None` if nothing is ready yet.
    ///
    /// Returns `ErrEof` once the peer has reset the stream and all buffered messages were read.
    pub fn read_sctp(&mut self) -> Result<Option<Chunks>> {
        self.association.read_stream(self.stream_identifier)
    }

    /// Copies the next message into `buf`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<Option<(usize, PayloadProtocolIdentifier)>> {
        match self.read_sctp()? {
            Some(chunks) => {
                let n = chunks.read(buf)?;
                Ok(Some((n, chunks.ppi)))
            }
            None => Ok(None),
        }
    }

    /// Queues a message on the stream with the default payload type.
    pub fn write(&mut self, p: &[u8]) -> Result<usize> {
        let ppi = self.default_payload_type()?;
        self.write_sctp(&Bytes::copy_from_slice(p), ppi)
    }

    /// Queues a message on the stream with the given payload type.
    pub fn write_with_ppi(&mut self, p: &[u8], ppi: PayloadProtocolIdentifier) -> Result<usize> {
        self.write_sctp(&Bytes::copy_from_slice(p), ppi)
    }

    /// Queues a message. It is split into DATA chunks and leaves the buffer once
    /// `poll_transmit` sends it.
    pub fn write_sctp(&mut self, p: &Bytes, ppi: PayloadProtocolIdentifier) -> Result<usize> {
        if p.len() > self.association.max_message_size() as usize {
            return Err(Error::ErrOutboundPacketTooLarge);
        }

        match self.association.state() {
            AssociationState::Established => {}
            AssociationState::CookieWait
            | AssociationState::CookieEchoed
            | AssociationState::Closed => return Err(Error::ErrPayloadDataStateNotExist),
            _ => return Err(Error::ErrStreamClosed),
        }

        let max_payload_size = self.association.max_payload_size as usize;
        let chunks = {
            let s = self.association.stream_state_mut(self.stream_identifier)?;
            if !s.state.can_write() {
                return Err(Error::ErrStreamClosed);
            }
            let chunks = s.packetize(p, ppi, max_payload_size);
            s.buffered_amount += chunks.iter().map(|c| c.user_data.len()).sum::<usize>();
            chunks
        };

        trace!(
            "[{}] stream {} queued {} bytes in {} chunk(s)",
            self.association.side,
            self.stream_identifier,
            p.len(),
            chunks.len()
        );
        self.association.send_payload_data(chunks);

        Ok(p.len())
    }

    /// Sets reliability parameters for outgoing messages.
    pub fn set_reliability_params(
        &mut self,
        unordered: bool,
        rel_type: ReliabilityType,
        rel_val: u32,
    ) -> Result<()> {
        let s = self.association.stream_state_mut(self.stream_identifier)?;
        debug!(
            "setting reliability params on stream {}: unordered={} type={} value={}",
            s.stream_identifier, unordered, rel_type, rel_val
        );
        s.unordered = unordered;
        s.reliability_type = rel_type;
        s.reliability_value = rel_val;
        Ok(())
    }

    pub fn default_payload_type(&self) -> Result<PayloadProtocolIdentifier> {
        self.association
            .stream_state(self.stream_identifier)
            .map(|s| s.default_payload_type)
    }

    pub fn set_default_payload_type(&mut self, ppi: PayloadProtocolIdentifier) -> Result<()> {
        let s = self.association.stream_state_mut(self.stream_identifier)?;
        s.default_payload_type = ppi;
        Ok(())
    }

    /// Bytes queued on this stream that have not been sent yet.
    pub fn buffered_amount(&self) -> Result<usize> {
        self.association
            .stream_state(self.stream_identifier)
            .map(|s| s.buffered_amount)
    }

    pub fn buffered_amount_low_threshold(&self) -> Result<usize> {
        self.association
            .stream_state(self.stream_identifier)
            .map(|s| s.buffered_amount_low)
    }

    /// Sets the threshold at which `StreamEvent::BufferedAmountLow` is emitted.
    pub fn set_buffered_amount_low_threshold(&mut self, th: usize) -> Result<()> {
        let s = self.association.stream_state_mut(self.stream_identifier)?;
        s.buffered_amount_low = th;
        Ok(())
    }

    /// Whether the stream still accepts writes.
    pub fn is_writable(&self) -> bool {
        self.association
            .stream_state(self.stream_identifier)
            .map(|s| s.state.can_write())
            .unwrap_or(false)
    }

    /// Whether the stream has a complete message waiting to be read.
    pub fn is_readable(&self) -> bool {
        self.association
            .stream_state(self.stream_identifier)
            .map(|s| s.reassembly_queue.is_readable())
            .unwrap_or(false)
    }

    /// Closes the outgoing side by sending an outgoing stream reset request.
    /// The stream is removed once the peer resets its side as well.
    pub fn close(&mut self) -> Result<()> {
        self.association.reset_stream(self.stream_identifier)
    }
}
