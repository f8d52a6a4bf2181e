use std::any::Any;
use std::collections::HashMap;

use super::*;

#[derive(Debug, PartialEq)]
pub struct Vp9Fmtp {
    pub(crate) parameters: HashMap<String, String>,
    pub(crate) clock_rate: u32,
}

impl Fmtp for Vp9Fmtp {
    fn mime_type(&self) -> &str {
        MIME_TYPE_VP9
    }

    fn match_fmtp(&self, f: &dyn Fmtp) -> bool {
        let Some(c) = f.as_any().downcast_ref::<Vp9Fmtp>() else {
            return false;
        };

        if !clock_rate_equal(MIME_TYPE_VP9, self.clock_rate, c.clock_rate) {
            return false;
        }

        // draft-ietf-payload-vp9-16 6: absent profile-id means profile 0
        let default_profile = String::from("0");
        let local = self.parameters.get("profile-id").unwrap_or(&default_profile);
        let remote = c.parameters.get("profile-id").unwrap_or(&default_profile);

        local == remote
    }

    fn parameter(&self, key: &str) -> Option<&String> {
        self.parameters.get(key)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
