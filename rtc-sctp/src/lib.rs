//! Low-level protocol logic for the SCTP protocol
//!
//! sctp contains a fully deterministic implementation of SCTP protocol logic. It contains
//! no networking code and does not get any relevant timestamps from the operating system:
//! every entry point takes the current `Instant` from the caller.
//!
//! `Association` holds the protocol logic of a single association and all the related state
//! (such as streams). Inbound datagrams go to `Association::handle_input`, outbound ones come
//! out of `Association::poll_transmit`.

#![warn(rust_2018_idioms)]
#![allow(dead_code)]
#![allow(clippy::bool_to_int_with_if)]

use std::{fmt, ops};

mod association;
pub use crate::association::{
    Association, AssociationError, AssociationStats, Event,
    state::AssociationState,
    stream::{RecvSendState, ReliabilityType, Stream, StreamEvent, StreamId, StreamState},
    timer::TimerConfig,
};

pub(crate) mod chunk;
pub use crate::chunk::{ErrorCauseCode, chunk_payload_data::PayloadProtocolIdentifier};

mod config;
pub use crate::config::{ClientConfig, ServerConfig, TransportConfig};

mod packet;

/// Verification tag chosen by an association; identifies it in inbound packets
pub type AssociationId = u32;

pub(crate) mod param;

pub(crate) mod queue;
pub use crate::queue::reassembly_queue::Chunks;

pub(crate) mod util;

/// Whether an endpoint was the initiator of an association
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Default)]
pub enum Side {
    /// The initiator of an association
    #[default]
    Client = 0,
    /// The acceptor of an association
    Server = 1,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Side::Client => "Client",
            Side::Server => "Server",
        };
        write!(f, "{s}")
    }
}

impl Side {
    #[inline]
    /// Shorthand for `self == Side::Client`
    pub fn is_client(self) -> bool {
        self == Side::Client
    }

    #[inline]
    /// Shorthand for `self == Side::Server`
    pub fn is_server(self) -> bool {
        self == Side::Server
    }
}

impl ops::Not for Side {
    type Output = Side;
    fn not(self) -> Side {
        match self {
            Side::Client => Side::Server,
            Side::Server => Side::Client,
        }
    }
}
