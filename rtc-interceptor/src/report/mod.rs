//! RTCP Sender and Receiver Reports (RFC 3550 section 6.4).
//!
//! [`SenderReportInterceptor`](sender::SenderReportInterceptor) counts what is
//! written on local streams and periodically emits an SR per stream.
//! [`ReceiverReportInterceptor`](receiver::ReceiverReportInterceptor) keeps
//! reception statistics for remote streams and periodically emits an RR per
//! stream: highest sequence number, cumulative and fractional loss, jitter,
//! and the LSR/DLSR pair taken from the last SR of that source.

pub(crate) mod receiver;
pub(crate) mod receiver_stream;
pub(crate) mod sender;
pub(crate) mod sender_stream;

#[cfg(test)]
mod report_test;

use std::time::Duration;

pub(crate) const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);
