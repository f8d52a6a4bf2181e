use std::any::Any;
use std::collections::HashMap;

use super::*;

/// Format parameters of any codec without specific matching rules.
#[derive(Debug, PartialEq)]
pub struct GenericFmtp {
    pub(crate) mime_type: String,
    pub(crate) clock_rate: u32,
    pub(crate) channels: u16,
    pub(crate) parameters: HashMap<String, String>,
}

impl Fmtp for GenericFmtp {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Matches when mime type, clock rate and channel count agree and every
    /// parameter both sides carry has the same value.
    fn match_fmtp(&self, f: &dyn Fmtp) -> bool {
        let Some(c) = f.as_any().downcast_ref::<GenericFmtp>() else {
            return false;
        };

        self.mime_type.eq_ignore_ascii_case(&c.mime_type)
            && clock_rate_equal(&self.mime_type, self.clock_rate, c.clock_rate)
            && channels_equal(&self.mime_type, self.channels, c.channels)
            && parameters_equal(&self.parameters, &c.parameters)
    }

    fn parameter(&self, key: &str) -> Option<&String> {
        self.parameters.get(key)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
