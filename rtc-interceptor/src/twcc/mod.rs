//! Transport-wide congestion control feedback
//! (draft-holmer-rmcat-transport-wide-cc-extensions-01).
//!
//! The sender stamps one transport-wide sequence number, shared by every
//! stream, into each outgoing packet. The receiver records when each number
//! arrived and periodically reports the arrivals back in a TransportLayerCc
//! packet. Streams take part only when the extension was negotiated.

pub(crate) mod receiver;
pub(crate) mod recorder;
pub(crate) mod sender;


pub const TRANSPORT_CC_URI: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";
