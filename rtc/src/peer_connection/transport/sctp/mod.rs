use std::sync::Arc;
use std::time::Instant;

use sctp::{Association, ServerConfig, TransportConfig};
use shared::TransportContext;
use shared::error::{Error, Result};

use crate::peer_connection::configuration::setting_engine::SctpMaxMessageSize;
use crate::peer_connection::transport::sctp::state::RTCSctpTransportState;

pub(crate) mod state;

/// SCTP payload size that fits a DTLS record inside the usual 1280 byte path MTU.
pub(crate) const SCTP_MAX_PAYLOAD_SIZE: u32 = 1200;

const SCTP_MAX_CHANNELS: u16 = u16::MAX;

/// The SCTP association running over DTLS for the data channels.
pub(crate) struct RTCSctpTransport {
    pub(crate) state: RTCSctpTransportState,
    pub(crate) association: Option<Association>,

    max_message_size: SctpMaxMessageSize,
    remote_max_message_size: u32,
    max_channels: u16,
}

impl RTCSctpTransport {
    pub(crate) fn new(max_message_size: SctpMaxMessageSize) -> Self {
        Self {
            state: RTCSctpTransportState::New,
            association: None,
            max_message_size,
            remote_max_message_size: 0,
            max_channels: SCTP_MAX_CHANNELS,
        }
    }

    /// Records the a=max-message-size announced by the remote, 0 when absent.
    pub(crate) fn set_remote_max_message_size(&mut self, remote_max_message_size: u32) {
        self.remote_max_message_size = remote_max_message_size;
    }

    /// The largest message a data channel may send: the smaller of the local
    /// limit and the remote's, where a remote 0 means no remote limit.
    pub(crate) fn max_message_size(&self) -> u32 {
        let local = self.max_message_size.as_u32();
        if self.remote_max_message_size == 0 {
            local
        } else {
            local.min(self.remote_max_message_size)
        }
    }

    pub(crate) fn max_channels(&self) -> u16 {
        self.max_channels
    }

    /// Creates the association. The DTLS client opens it, the DTLS server
    /// waits for the INIT.
    pub(crate) fn start(&mut self, is_client: bool, now: Instant) -> Result<()> {
        if self.association.is_some() {
            return Err(Error::ErrMultipleStart);
        }

        let transport_config = Arc::new(
            TransportConfig::default().with_max_message_size(self.max_message_size()),
        );
        // DTLS already authenticated the peer, so both ends use the same
        // placeholder addresses.
        let addr = TransportContext::default().peer_addr;
        let protocol = TransportContext::default().transport_protocol;

        let association = if is_client {
            Association::client(
                transport_config,
                SCTP_MAX_PAYLOAD_SIZE,
                addr,
                addr,
                protocol,
                now,
            )
        } else {
            Association::server(
                Arc::new(ServerConfig::new().with_transport(transport_config)),
                SCTP_MAX_PAYLOAD_SIZE,
                addr,
                addr,
                protocol,
                now,
            )
        };

        self.association = Some(association);
        self.state = RTCSctpTransportState::Connecting;
        Ok(())
    }

    pub(crate) fn stop(&mut self) -> Result<()> {
        let result = if let Some(association) = self.association.as_mut() {
            association.close()
        } else {
            Ok(())
        };
        self.state = RTCSctpTransportState::Closed;
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sctp_max_message_size_negotiation() {
        let mut transport = RTCSctpTransport::new(SctpMaxMessageSize::default());
        assert_eq!(transport.max_message_size(), 65536);

        transport.set_remote_max_message_size(16384);
        assert_eq!(transport.max_message_size(), 16384);

        transport.set_remote_max_message_size(1 << 20);
        assert_eq!(transport.max_message_size(), 65536);
    }

    #[test]
    fn test_sctp_transport_start_once() -> Result<()> {
        let mut transport = RTCSctpTransport::new(SctpMaxMessageSize::default());
        assert_eq!(transport.state, RTCSctpTransportState::New);

        transport.start(true, Instant::now())?;
        assert_eq!(transport.state, RTCSctpTransportState::Connecting);
        assert!(transport.association.is_some());
        assert!(transport.start(true, Instant::now()).is_err());
        Ok(())
    }
}
