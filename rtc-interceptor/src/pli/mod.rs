//! Periodic keyframe requests.
//!
//! Decoders that join a stream late or lose a reference frame can only resume
//! from a keyframe. The generator asks for one with a Picture Loss Indication
//! (RFC 4585 section 6.3.1) as soon as a remote video stream starts, then
//! again at a fixed interval.

pub(crate) mod generator;

#[cfg(test)]
mod pli_test;

pub use generator::{PliGeneratorBuilder, PliGeneratorInterceptor};
