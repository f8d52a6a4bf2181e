use std::any::Any;
use std::collections::HashMap;

use super::*;

#[derive(Debug, PartialEq)]
pub struct Av1Fmtp {
    pub(crate) parameters: HashMap<String, String>,
    pub(crate) clock_rate: u32,
}

impl Fmtp for Av1Fmtp {
    fn mime_type(&self) -> &str {
        MIME_TYPE_AV1
    }

    fn match_fmtp(&self, f: &dyn Fmtp) -> bool {
        let Some(c) = f.as_any().downcast_ref::<Av1Fmtp>() else {
            return false;
        };

        if !clock_rate_equal(MIME_TYPE_AV1, self.clock_rate, c.clock_rate) {
            return false;
        }

        // AV1 RTP payload format 7.2.1: absent profile means main (0)
        let default_profile = String::from("0");
        let local = self.parameters.get("profile").unwrap_or(&default_profile);
        let remote = c.parameters.get("profile").unwrap_or(&default_profile);

        local == remote
    }

    fn parameter(&self, key: &str) -> Option<&String> {
        self.parameters.get(key)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
