
use crate::message::{message_channel_ack::*, message_channel_open::*, *};
use bytes::Bytes;
use log::{debug, trace, warn};
use sctp::{PayloadProtocolIdentifier, ReliabilityType, Stream, StreamId};
use shared::error::{Error, Result};
use shared::marshal::*;
use std::fmt;

/// DataChannelConfig is used to configure the data channel.
#[derive(Eq, PartialEq, Default, Clone, Debug)]
pub struct DataChannelConfig {
    pub channel_type: ChannelType,
    pub negotiated: bool,
    pub priority: u16,
    pub reliability_parameter: u32,
    pub label: String,
    pub protocol: String,
}

/// Ready state of a data channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DataChannelState {
    /// DATA_CHANNEL_OPEN was sent and no ACK has arrived yet.
    #[default]
    Connecting,
    Open,
    /// The outgoing stream was reset; waiting for the peer to reset its side.
    Closing,
    Closed,
}

impl fmt::Display for DataChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            DataChannelState::Connecting => "connecting",
            DataChannelState::Open => "open",
            DataChannelState::Closing => "closing",
            DataChannelState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// One application message received on a data channel.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DataChannelMessage {
    pub stream_id: StreamId,
    pub is_string: bool,
    pub data: Bytes,
}

/// DataChannel implements the Data Channel Establishment Protocol (RFC 8832)
/// and message framing on top of one SCTP stream.
///
/// The channel does not own its stream: every operation borrows the stream from
/// the association for the duration of the call.
#[derive(Debug, Default, Clone)]
pub struct DataChannel {
    config: DataChannelConfig,
    stream_id: StreamId,
    state: DataChannelState,

    // stats
    messages_sent: usize,
    messages_received: usize,
    bytes_sent: usize,
    bytes_received: usize,
}

impl DataChannel {
    fn new(config: DataChannelConfig, stream_id: StreamId, state: DataChannelState) -> Self {
        Self {
            config,
            stream_id,
            state,
            ..Default::default()
        }
    }

    /// Dial opens a data channel on a locally created stream.
    ///
    /// Negotiated channels are open right away. Otherwise a DATA_CHANNEL_OPEN
    /// is queued and the channel stays `Connecting` until the peer's ACK is read.
    pub fn dial(config: DataChannelConfig, stream: &mut Stream<'_>) -> Result<Self> {
        let stream_id = stream.stream_identifier();
        let negotiated = config.negotiated;

        let mut data_channel = DataChannel::new(
            config,
            stream_id,
            if negotiated {
                DataChannelState::Open
            } else {
                DataChannelState::Connecting
            },
        );

        if !negotiated {
            let msg = Message::DataChannelOpen(DataChannelOpen {
                channel_type: data_channel.config.channel_type,
                priority: data_channel.config.priority,
                reliability_parameter: data_channel.config.reliability_parameter,
                label: data_channel.config.label.bytes().collect(),
                protocol: data_channel.config.protocol.bytes().collect(),
            })
            .marshal()?;

            debug!(
                "sending DATA_CHANNEL_OPEN on stream {} for label {:?}",
                stream_id, data_channel.config.label
            );
            stream.write_sctp(&msg, PayloadProtocolIdentifier::Dcep)?;
        }

        // DCEP messages are exempt from the stream's reliability settings,
        // so the parameters can take effect before the ACK arrives.
        data_channel.commit_reliability_params(stream)?;

        Ok(data_channel)
    }

    /// Accept is used to accept incoming data channels on a stream opened by the peer.
    ///
    /// The first message of the stream must be a DATA_CHANNEL_OPEN; the ACK is
    /// queued before returning. `config` supplies nothing but defaults: every
    /// field carried by the OPEN message overrides it.
    pub fn accept(mut config: DataChannelConfig, stream: &mut Stream<'_>) -> Result<Self> {
        let chunks = stream.read_sctp()?.ok_or(Error::ErrStreamNotInited)?;
        if chunks.ppi != PayloadProtocolIdentifier::Dcep {
            return Err(Error::InvalidPayloadProtocolIdentifier(chunks.ppi as u8));
        }

        let mut read_buf = chunks.data();
        let msg = Message::unmarshal(&mut read_buf)?;

        if let Message::DataChannelOpen(dco) = msg {
            config.channel_type = dco.channel_type;
            config.priority = dco.priority;
            config.reliability_parameter = dco.reliability_parameter;
            config.label = String::from_utf8(dco.label)?;
            config.protocol = String::from_utf8(dco.protocol)?;
        } else {
            return Err(Error::InvalidMessageType(msg.message_type() as u8));
        };
        config.negotiated = false;

        let stream_id = stream.stream_identifier();
        debug!(
            "accepted DATA_CHANNEL_OPEN on stream {} for label {:?}",
            stream_id, config.label
        );

        let mut data_channel = DataChannel::new(config, stream_id, DataChannelState::Open);
        data_channel.write_data_channel_ack(stream)?;
        data_channel.commit_reliability_params(stream)?;

        Ok(data_channel)
    }

    /// MessagesSent returns the number of messages sent
    pub fn messages_sent(&self) -> usize {
        self.messages_sent
    }

    /// MessagesReceived returns the number of messages received
    pub fn messages_received(&self) -> usize {
        self.messages_received
    }

    /// BytesSent returns the number of bytes sent
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// BytesReceived returns the number of bytes received
    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    /// StreamIdentifier returns the Stream identifier associated to the stream.
    pub fn stream_identifier(&self) -> StreamId {
        self.stream_id
    }

    pub fn config(&self) -> &DataChannelConfig {
        &self.config
    }

    pub fn state(&self) -> DataChannelState {
        self.state
    }

    /// Reads the next application message.
    ///
    /// DCEP control messages are consumed here and never returned. Returns `ErrEof`
    /// once the peer has reset its outgoing stream and everything was read.
    pub fn read(&mut self, stream: &mut Stream<'_>) -> Result<Option<DataChannelMessage>> {
        loop {
            let chunks = match stream.read_sctp() {
                Ok(Some(chunks)) => chunks,
                Ok(None) => return Ok(None),
                Err(err) => {
                    if err == Error::ErrEof {
                        debug!("data channel on stream {} reached EOF", self.stream_id);
                        // answer the peer's reset with our own
                        if stream.is_writable() {
                            stream.close()?;
                        }
                        self.state = DataChannelState::Closed;
                    }
                    return Err(err);
                }
            };

            // https://www.rfc-editor.org/rfc/rfc8831#section-6.6
            // When receiving an SCTP user message with one of the empty PPIDs,
            // the receiver MUST ignore the SCTP user message and process it as
            // an empty message.
            let (is_string, data) = match chunks.ppi {
                PayloadProtocolIdentifier::Dcep => {
                    let mut data_buf = chunks.data();
                    self.handle_dcep(&mut data_buf, stream)?;
                    continue;
                }
                PayloadProtocolIdentifier::String => (true, chunks.data()),
                PayloadProtocolIdentifier::StringEmpty => (true, Bytes::new()),
                PayloadProtocolIdentifier::Binary => (false, chunks.data()),
                PayloadProtocolIdentifier::BinaryEmpty => (false, Bytes::new()),
                PayloadProtocolIdentifier::Unknown => {
                    warn!(
                        "dropping message with unknown PPI on stream {}",
                        self.stream_id
                    );
                    continue;
                }
            };

            self.messages_received += 1;
            self.bytes_received += data.len();
            trace!(
                "data channel on stream {} read {} bytes (string: {})",
                self.stream_id,
                data.len(),
                is_string
            );

            return Ok(Some(DataChannelMessage {
                stream_id: self.stream_id,
                is_string,
                data,
            }));
        }
    }

    /// Copies the next application message into `buf`, returning its length and
    /// whether it was a string.
    pub fn read_data_channel(
        &mut self,
        stream: &mut Stream<'_>,
        buf: &mut [u8],
    ) -> Result<Option<(usize, bool)>> {
        match self.read(stream)? {
            Some(msg) => {
                if msg.data.len() > buf.len() {
                    return Err(Error::ErrShortBuffer);
                }
                buf[..msg.data.len()].copy_from_slice(&msg.data);
                Ok(Some((msg.data.len(), msg.is_string)))
            }
            None => Ok(None),
        }
    }

    /// Queues `data` as one message, using the empty-message PPIDs for empty payloads.
    pub fn write_data_channel(
        &mut self,
        stream: &mut Stream<'_>,
        data: &Bytes,
        is_string: bool,
    ) -> Result<usize> {
        if matches!(
            self.state,
            DataChannelState::Closing | DataChannelState::Closed
        ) {
            return Err(Error::ErrDataChannelClosed);
        }

        let (ppi, payload) = Self::get_data_channel_payload(is_string, data);
        stream.write_sctp(&payload, ppi)?;

        self.messages_sent += 1;
        self.bytes_sent += data.len();

        Ok(data.len())
    }

    /// BufferedAmount returns the number of bytes of data currently queued to be
    /// sent over this stream.
    pub fn buffered_amount(&self, stream: &Stream<'_>) -> usize {
        stream.buffered_amount().unwrap_or(0)
    }

    /// BufferedAmountLowThreshold returns the number of bytes of buffered outgoing
    /// data that is considered "low." Defaults to 0.
    pub fn buffered_amount_low_threshold(&self, stream: &Stream<'_>) -> usize {
        stream.buffered_amount_low_threshold().unwrap_or(0)
    }

    /// SetBufferedAmountLowThreshold is used to update the threshold.
    /// The association reports `StreamEvent::BufferedAmountLow` when the
    /// buffered amount drops from above to at or below it.
    pub fn set_buffered_amount_low_threshold(
        &self,
        stream: &mut Stream<'_>,
        threshold: usize,
    ) -> Result<()> {
        stream.set_buffered_amount_low_threshold(threshold)
    }

    /// Close closes the DataChannel by resetting its outgoing stream.
    ///
    /// The channel is `Closed` once the peer resets its side and `read` reports EOF.
    pub fn close(&mut self, stream: &mut Stream<'_>) -> Result<()> {
        // https://www.rfc-editor.org/rfc/rfc8831#section-6.7
        // Closing of a data channel MUST be signaled by resetting the
        // corresponding outgoing streams [RFC6525].
        if matches!(
            self.state,
            DataChannelState::Closing | DataChannelState::Closed
        ) || !stream.is_writable()
        {
            return Ok(());
        }
        debug!("closing data channel on stream {}", self.stream_id);
        self.state = DataChannelState::Closing;
        stream.close()
    }

    /// Marks the channel closed without touching the stream, e.g. after the
    /// association went away.
    pub fn set_closed(&mut self) {
        self.state = DataChannelState::Closed;
    }

    fn handle_dcep(&mut self, data: &mut Bytes, stream: &mut Stream<'_>) -> Result<()> {
        let msg = Message::unmarshal(data)?;

        match msg {
            Message::DataChannelOpen(_) => {
                // An OPEN on an already accepted stream is a retransmission from
                // the peer's point of view; acknowledge it again.
                debug!("Received DATA_CHANNEL_OPEN on stream {}", self.stream_id);
                self.write_data_channel_ack(stream)?;
            }
            Message::DataChannelAck(_) => {
                debug!("Received DATA_CHANNEL_ACK on stream {}", self.stream_id);
                if self.state == DataChannelState::Connecting {
                    self.state = DataChannelState::Open;
                }
            }
        };

        Ok(())
    }

    fn write_data_channel_ack(&mut self, stream: &mut Stream<'_>) -> Result<()> {
        let ack = Message::DataChannelAck(DataChannelAck {}).marshal()?;
        stream.write_sctp(&ack, PayloadProtocolIdentifier::Dcep)?;
        Ok(())
    }

    fn commit_reliability_params(&self, stream: &mut Stream<'_>) -> Result<()> {
        let (unordered, reliability_type) = Self::get_reliability_params(self.config.channel_type);
        stream.set_reliability_params(
            unordered,
            reliability_type,
            self.config.reliability_parameter,
        )
    }

    pub fn get_reliability_params(channel_type: ChannelType) -> (bool, ReliabilityType) {
        match channel_type {
            ChannelType::Reliable => (false, ReliabilityType::Reliable),
            ChannelType::ReliableUnordered => (true, ReliabilityType::Reliable),
            ChannelType::PartialReliableRexmit => (false, ReliabilityType::Rexmit),
            ChannelType::PartialReliableRexmitUnordered => (true, ReliabilityType::Rexmit),
            ChannelType::PartialReliableTimed => (false, ReliabilityType::Timed),
            ChannelType::PartialReliableTimedUnordered => (true, ReliabilityType::Timed),
        }
    }

    /// Maps the W3C `RTCDataChannelInit` fields onto a DCEP channel type.
    /// `max_retransmits` wins when both limits are given.
    pub fn get_channel_type_and_reliability_parameter(
        ordered: bool,
        max_retransmits: Option<u16>,
        max_packet_life_time: Option<u16>,
    ) -> (ChannelType, u32) {
        match (max_retransmits, max_packet_life_time) {
            (None, None) => {
                if ordered {
                    (ChannelType::Reliable, 0)
                } else {
                    (ChannelType::ReliableUnordered, 0)
                }
            }
            (Some(max_retransmits), _) => {
                if ordered {
                    (ChannelType::PartialReliableRexmit, max_retransmits as u32)
                } else {
                    (
                        ChannelType::PartialReliableRexmitUnordered,
                        max_retransmits as u32,
                    )
                }
            }
            (None, Some(max_packet_lifetime)) => {
                if ordered {
                    (ChannelType::PartialReliableTimed, max_packet_lifetime as u32)
                } else {
                    (
                        ChannelType::PartialReliableTimedUnordered,
                        max_packet_lifetime as u32,
                    )
                }
            }
        }
    }

    /// Picks the PPI for an outgoing message and substitutes the one-byte
    /// placeholder for empty payloads.
    pub fn get_data_channel_payload(
        is_string: bool,
        data: &Bytes,
    ) -> (PayloadProtocolIdentifier, Bytes) {
        // https://www.rfc-editor.org/rfc/rfc8831#section-6.6
        // SCTP does not support the sending of empty user messages.  Therefore,
        // if an empty message has to be sent, the appropriate PPID (WebRTC
        // String Empty or WebRTC Binary Empty) is used and the SCTP user
        // message of one zero byte is sent.
        let ppi = match (is_string, data.len()) {
            (false, 0) => PayloadProtocolIdentifier::BinaryEmpty,
            (false, _) => PayloadProtocolIdentifier::Binary,
            (true, 0) => PayloadProtocolIdentifier::StringEmpty,
            (true, _) => PayloadProtocolIdentifier::String,
        };

        if data.is_empty() {
            (ppi, Bytes::from_static(&[0]))
        } else {
            (ppi, data.clone())
        }
    }

    /// Picks the first free stream id of the parity owned by the local DTLS role.
    ///
    /// RFC 8832 section 6: the DTLS client uses even stream identifiers and the
    /// DTLS server uses odd ones.
    pub fn generate_stream_id<F>(is_dtls_client: bool, max_id: StreamId, in_use: F) -> Result<StreamId>
    where
        F: Fn(StreamId) -> bool,
    {
        let mut id: u32 = if is_dtls_client { 0 } else { 1 };
        while id <= max_id as u32 {
            if !in_use(id as StreamId) {
                return Ok(id as StreamId);
            }
            id += 2;
        }
        Err(Error::ErrMaxDataChannelID)
    }
}
