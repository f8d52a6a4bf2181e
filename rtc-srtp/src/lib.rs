#![warn(rust_2018_idioms)]
#![allow(dead_code)]

//! SRTP and SRTCP (RFC 3711, RFC 7714) packet protection.
//!
//! A [`context::Context`] protects one direction of one media transport. It derives the session
//! keys from a master key and salt, tracks the rollover counter of every SSRC and rejects
//! replayed packets once they authenticate. [`session::SrtpSession`] and
//! [`session::SrtcpSession`] pair a local and a remote context for RTP and RTCP respectively.

mod cipher;
pub mod config;
pub mod context;
mod key_derivation;
pub mod option;
pub mod protection_profile;
pub mod session;
