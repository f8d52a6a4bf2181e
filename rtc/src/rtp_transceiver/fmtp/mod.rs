//! Parsing and matching of `a=fmtp` parameter lines.
//!
//! Two codecs are only considered the same when their format parameters agree.
//! Which parameters matter depends on the codec, so [`parse`] picks an
//! implementation by mime type.

#[cfg(test)]
mod fmtp_test;

pub(crate) mod av1;
pub(crate) mod generic;
pub(crate) mod h264;
pub(crate) mod vp9;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::peer_connection::configuration::media_engine::{MIME_TYPE_AV1, MIME_TYPE_H264, MIME_TYPE_VP9};

/// Parsed format parameters of one codec.
pub trait Fmtp: fmt::Debug {
    /// Mime type of the codec these parameters belong to.
    fn mime_type(&self) -> &str;

    /// Reports whether the two parameter sets describe compatible codecs.
    fn match_fmtp(&self, f: &dyn Fmtp) -> bool;

    /// Value of a single parameter. Keys are stored lowercase.
    fn parameter(&self, key: &str) -> Option<&String>;

    fn as_any(&self) -> &dyn Any;
}

/// Splits `key=value;key=value` into a map. Keys are lowercased, values are
/// kept verbatim and a key without `=` maps to an empty value.
pub(crate) fn parse_parameters(line: &str) -> HashMap<String, String> {
    let mut parameters = HashMap::new();

    for p in line.split(';') {
        let p = p.trim();
        if p.is_empty() {
            continue;
        }
        let (key, value) = match p.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (p, ""),
        };
        parameters.insert(key.to_lowercase(), value.to_owned());
    }

    parameters
}

/// Builds the [`Fmtp`] implementation matching `mime_type`.
pub fn parse(mime_type: &str, clock_rate: u32, channels: u16, line: &str) -> Box<dyn Fmtp> {
    let parameters = parse_parameters(line);

    if mime_type.eq_ignore_ascii_case(MIME_TYPE_H264) {
        Box::new(h264::H264Fmtp {
            parameters,
            clock_rate,
        })
    } else if mime_type.eq_ignore_ascii_case(MIME_TYPE_VP9) {
        Box::new(vp9::Vp9Fmtp {
            parameters,
            clock_rate,
        })
    } else if mime_type.eq_ignore_ascii_case(MIME_TYPE_AV1) {
        Box::new(av1::Av1Fmtp {
            parameters,
            clock_rate,
        })
    } else {
        Box::new(generic::GenericFmtp {
            mime_type: mime_type.to_owned(),
            clock_rate,
            channels,
            parameters,
        })
    }
}

/// Clock rate a codec runs at when the description leaves it unset.
pub(crate) fn default_clock_rate(mime_type: &str) -> u32 {
    let lower = mime_type.to_lowercase();
    match lower.as_str() {
        "audio/opus" => 48000,
        "audio/pcmu" | "audio/pcma" => 8000,
        _ => 90000,
    }
}

pub(crate) fn clock_rate_equal(mime_type: &str, a: u32, b: u32) -> bool {
    let default = default_clock_rate(mime_type);
    let a = if a == 0 { default } else { a };
    let b = if b == 0 { default } else { b };
    a == b
}

pub(crate) fn channels_equal(mime_type: &str, a: u16, b: u16) -> bool {
    // RFC 7587: opus is always signalled with two channels
    let default = if mime_type.eq_ignore_ascii_case("audio/opus") {
        2
    } else {
        1
    };
    let a = if a == 0 { default } else { a };
    let b = if b == 0 { default } else { b };
    a == b
}

/// Keys present in both maps must carry the same value, ignoring case.
pub(crate) fn parameters_equal(a: &HashMap<String, String>, b: &HashMap<String, String>) -> bool {
    for (k, va) in a {
        if let Some(vb) = b.get(k) {
            if !va.eq_ignore_ascii_case(vb) {
                return false;
            }
        }
    }
    true
}
