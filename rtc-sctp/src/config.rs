use crate::TimerConfig;

use std::sync::Arc;

/// MTU for inbound packet (from DTLS)
pub(crate) const RECEIVE_MTU: usize = 8192;
/// initial MTU for outgoing packets (to DTLS), leaving a 1200 byte DATA payload
pub(crate) const INITIAL_MTU: u32 = 1228;
pub(crate) const INITIAL_RECV_BUF_SIZE: u32 = 1024 * 1024;
pub(crate) const COMMON_HEADER_SIZE: u32 = 12;
pub(crate) const DATA_CHUNK_HEADER_SIZE: u32 = 16;
pub(crate) const DEFAULT_MAX_MESSAGE_SIZE: u32 = 65536;

/// Config collects the arguments to create_association construction into
/// a single structure
#[derive(Debug)]
pub struct TransportConfig {
    sctp_port: u16,
    max_receive_buffer_size: u32,
    max_message_size: u32,
    max_num_outbound_streams: u16,
    max_num_inbound_streams: u16,
    mtu: u32,
    timer_config: TimerConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            sctp_port: 5000,
            max_receive_buffer_size: INITIAL_RECV_BUF_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_num_outbound_streams: u16::MAX,
            max_num_inbound_streams: u16::MAX,
            mtu: INITIAL_MTU,
            timer_config: TimerConfig::default(),
        }
    }
}

impl TransportConfig {
    pub fn with_sctp_port(mut self, value: u16) -> Self {
        self.sctp_port = value;
        self
    }

    pub fn with_max_receive_buffer_size(mut self, value: u32) -> Self {
        self.max_receive_buffer_size = value;
        self
    }

    pub fn with_max_message_size(mut self, value: u32) -> Self {
        self.max_message_size = value;
        self
    }

    pub fn with_max_num_outbound_streams(mut self, value: u16) -> Self {
        self.max_num_outbound_streams = value;
        self
    }

    pub fn with_max_num_inbound_streams(mut self, value: u16) -> Self {
        self.max_num_inbound_streams = value;
        self
    }

    /// Path MTU used for outgoing packets. Values below the common and DATA chunk
    /// headers plus one byte are ignored.
    pub fn with_mtu(mut self, value: u32) -> Self {
        if value > COMMON_HEADER_SIZE + DATA_CHUNK_HEADER_SIZE {
            self.mtu = value;
        }
        self
    }

    pub fn with_timer_config(mut self, value: TimerConfig) -> Self {
        self.timer_config = value;
        self
    }

    pub fn sctp_port(&self) -> u16 {
        self.sctp_port
    }

    pub fn max_receive_buffer_size(&self) -> u32 {
        self.max_receive_buffer_size
    }

    pub fn max_message_size(&self) -> u32 {
        self.max_message_size
    }

    pub fn max_num_outbound_streams(&self) -> u16 {
        self.max_num_outbound_streams
    }

    pub fn max_num_inbound_streams(&self) -> u16 {
        self.max_num_inbound_streams
    }

    pub fn mtu(&self) -> u32 {
        self.mtu
    }

    pub fn timer_config(&self) -> TimerConfig {
        self.timer_config
    }
}

/// Parameters governing incoming associations
///
/// Default values should be suitable for most internet applications.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Transport configuration to use for incoming associations
    pub transport: Arc<TransportConfig>,

    /// Maximum number of concurrent associations
    pub(crate) concurrent_associations: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            transport: Arc::new(TransportConfig::default()),
            concurrent_associations: 100_000,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        ServerConfig::default()
    }

    pub fn with_transport(mut self, transport: Arc<TransportConfig>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_concurrent_associations(mut self, value: u32) -> Self {
        self.concurrent_associations = value;
        self
    }
}

/// Configuration for outgoing associations
///
/// Default values should be suitable for most internet applications.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Transport configuration to use
    pub transport: Arc<TransportConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            transport: Arc::new(TransportConfig::default()),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        ClientConfig::default()
    }

    pub fn with_transport(mut self, transport: Arc<TransportConfig>) -> Self {
        self.transport = transport;
        self
    }
}
