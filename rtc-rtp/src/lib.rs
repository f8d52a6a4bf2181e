//! RTP packets (RFC 3550), header extensions (RFC 8285) and the payload
//! formats used by the media engine: VP8, H.264, Opus and G.7xx.
//!
//! [`packetizer`] splits encoded frames into packets with a [`sequence`]
//! generator and the codec payloaders in [`codec`].

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod codec;
pub mod extension;
pub mod header;
pub mod packet;
pub mod packetizer;
pub mod sequence;

pub use header::Header;
pub use packet::Packet;
