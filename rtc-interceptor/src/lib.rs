//! Sans-IO RTP/RTCP interceptors.
//!
//! An interceptor wraps an inner interceptor and sees every packet that flows
//! through the media pipeline of a peer connection. Incoming packets enter with
//! `handle_read` and come out of `poll_read`, outgoing packets enter with
//! `handle_write` and come out of `poll_write`. Interceptors may rewrite packets,
//! swallow them, or generate new ones (reports, retransmissions, repair packets).
//!
//! Every interceptor is driven by injected time: `poll_timeout` reports the next
//! deadline and `handle_timeout(now)` runs the periodic work. None of them reads
//! the clock on its own.
//!
//! | Interceptor | Role |
//! |-------------|------|
//! | [`NackGeneratorInterceptor`] | Detects gaps on remote streams and emits generic NACKs (RFC 4585) |
//! | [`NackResponderInterceptor`] | Buffers sent packets and resends them, optionally as RTX (RFC 4588) |
//! | [`SenderReportInterceptor`] | Emits RTCP Sender Reports for local streams |
//! | [`ReceiverReportInterceptor`] | Emits RTCP Receiver Reports for remote streams |
//! | [`TwccSenderInterceptor`] | Stamps the transport-wide sequence number extension |
//! | [`TwccReceiverInterceptor`] | Emits transport-wide congestion control feedback |
//! | [`FlexFecEncoderInterceptor`] | Emits FlexFEC-03 repair packets for protected local streams |
//! | [`FlexFecDecoderInterceptor`] | Recovers lost media packets from FlexFEC-03 repair packets |
//! | [`PliGeneratorInterceptor`] | Requests keyframes on remote video streams at a fixed interval |
//! | [`NoopInterceptor`] | Innermost pass-through of every chain |
//!
//! Chains are assembled with [`Registry`]:
//!
//! ```ignore
//! use rtc_interceptor::{NackGeneratorBuilder, NackResponderBuilder, Registry};
//!
//! let mut chain = Registry::new()
//!     .with(NackGeneratorBuilder::new().build())
//!     .with(NackResponderBuilder::new().build())
//!     .build();
//! chain.bind_remote_stream(&info);
//! ```
//!
//! There is no direction in a chain: `handle_read` and `handle_write` both
//! travel from the outermost interceptor to the innermost one.

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

use shared::TransportMessage;
use std::time::Instant;

mod noop;
mod registry;

pub(crate) mod fec;
pub(crate) mod nack;
pub(crate) mod pli;
pub(crate) mod report;
pub(crate) mod stream_info;
pub(crate) mod twcc;


pub use fec::{
    decoder::{FlexFecDecoderBuilder, FlexFecDecoderInterceptor},
    encoder::{FlexFecEncoderBuilder, FlexFecEncoderInterceptor},
    flexfec03::{FlexFecDecoder, FlexFecEncoder},
};
pub use nack::{
    generator::{NackGeneratorBuilder, NackGeneratorInterceptor},
    responder::{NackResponderBuilder, NackResponderInterceptor},
};
pub use interceptor_derive::{Interceptor, interceptor};
pub use noop::NoopInterceptor;
pub use pli::{PliGeneratorBuilder, PliGeneratorInterceptor};
pub use registry::Registry;
pub use report::{
    receiver::{ReceiverReportBuilder, ReceiverReportInterceptor},
    sender::{SenderReportBuilder, SenderReportInterceptor},
};
pub use stream_info::{RTCPFeedback, RTPHeaderExtension, StreamInfo};
pub use twcc::{
    TRANSPORT_CC_URI,
    receiver::{TwccReceiverBuilder, TwccReceiverInterceptor},
    sender::{TwccSenderBuilder, TwccSenderInterceptor},
};

/// A packet travelling through an interceptor chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Rtp(rtp::Packet),
    /// A compound RTCP packet.
    Rtcp(Vec<Box<dyn rtcp::Packet>>),
}

/// A [`Packet`] with its arrival or departure time and transport addresses.
pub type TaggedPacket = TransportMessage<Packet>;

/// An RTP/RTCP interceptor.
///
/// The protocol half is a [`sansio::Protocol`] fixed to [`TaggedPacket`] in both
/// directions, no events, [`Instant`] time and the shared error type. The
/// stream half tells the interceptor which SSRCs exist and what was negotiated
/// for them; interceptors ignore packets of SSRCs they were not told about.
pub trait Interceptor:
    sansio::Protocol<
        TaggedPacket,
        TaggedPacket,
        (),
        Rout = TaggedPacket,
        Wout = TaggedPacket,
        Eout = (),
        Time = Instant,
        Error = shared::error::Error,
    > + Sized
{
    /// Wraps `self` in the interceptor produced by `f`.
    fn with<O, F>(self, f: F) -> O
    where
        F: FnOnce(Self) -> O,
        O: Interceptor,
    {
        f(self)
    }

    /// Called once for every outgoing stream before its first packet is written.
    fn bind_local_stream(&mut self, info: &StreamInfo);

    /// Called when an outgoing stream goes away.
    fn unbind_local_stream(&mut self, info: &StreamInfo);

    /// Called once for every incoming stream before its first packet is read.
    fn bind_remote_stream(&mut self, info: &StreamInfo);

    /// Called when an incoming stream goes away.
    fn unbind_remote_stream(&mut self, info: &StreamInfo);
}

/// Returns the earliest of two optional deadlines.
pub(crate) fn min_timeout(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Yields the RTCP packets of `msg` that downcast to `T`.
pub(crate) fn rtcp_packets_of<'a, T: 'static>(msg: &'a TaggedPacket) -> impl Iterator<Item = &'a T> + 'a {
    let packets: &'a [Box<dyn rtcp::Packet>] = match &msg.message {
        Packet::Rtcp(packets) => packets,
        Packet::Rtp(_) => &[],
    };
    packets
        .iter()
        .filter_map(|p| p.as_any().downcast_ref::<T>())
}
