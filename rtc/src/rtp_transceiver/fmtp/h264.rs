use std::any::Any;
use std::collections::HashMap;

use super::*;

/// profile_idc and profile_iop of a `profile-level-id`; the level byte is
/// allowed to differ.
fn profile_level_id_matches(a: &str, b: &str) -> bool {
    let Ok(aa) = hex::decode(a) else {
        return false;
    };
    if aa.len() < 2 {
        return false;
    }

    let Ok(bb) = hex::decode(b) else {
        return false;
    };
    if bb.len() < 2 {
        return false;
    }

    aa[0] == bb[0] && aa[1] == bb[1]
}

#[derive(Debug, PartialEq)]
pub struct H264Fmtp {
    pub(crate) parameters: HashMap<String, String>,
    pub(crate) clock_rate: u32,
}

impl Fmtp for H264Fmtp {
    fn mime_type(&self) -> &str {
        MIME_TYPE_H264
    }

    /// RFC 6184 8.2.2: packetization-mode must match, and both sides must
    /// carry a profile-level-id whose profile part matches.
    fn match_fmtp(&self, f: &dyn Fmtp) -> bool {
        let Some(c) = f.as_any().downcast_ref::<H264Fmtp>() else {
            return false;
        };

        if !clock_rate_equal(MIME_TYPE_H264, self.clock_rate, c.clock_rate) {
            return false;
        }

        let default_mode = String::from("0");
        let local_mode = self
            .parameters
            .get("packetization-mode")
            .unwrap_or(&default_mode);
        let remote_mode = c
            .parameters
            .get("packetization-mode")
            .unwrap_or(&default_mode);
        if local_mode != remote_mode {
            return false;
        }

        match (
            self.parameters.get("profile-level-id"),
            c.parameters.get("profile-level-id"),
        ) {
            (Some(a), Some(b)) => profile_level_id_matches(a, b),
            _ => false,
        }
    }

    fn parameter(&self, key: &str) -> Option<&String> {
        self.parameters.get(key)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
