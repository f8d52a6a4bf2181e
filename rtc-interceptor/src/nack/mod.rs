//! Generic NACK (RFC 4585) loss recovery.
//!
//! The generator watches remote streams for sequence gaps and asks for them
//! again every interval. The responder keeps recently sent packets of local
//! streams and resends the ones asked for, wrapped as RTX (RFC 4588) when the
//! stream negotiated a retransmission SSRC and payload type.
//!
//! Both sides only act on streams that negotiated `a=rtcp-fb:<pt> nack`.

pub(crate) mod generator;
pub(crate) mod receive_log;
pub(crate) mod responder;
pub(crate) mod send_buffer;

#[cfg(test)]
mod nack_test;

use crate::stream_info::StreamInfo;
use shared::error::{Error, Result};

const UINT16_SIZE_HALF: u16 = 1 << 15;

/// Windows are a power of two between 64 and 32768 packets.
pub(crate) fn validate_window_size(size: u16) -> Result<()> {
    if size.is_power_of_two() && size >= 64 {
        Ok(())
    } else {
        Err(Error::OtherInterceptorErr(format!(
            "invalid nack window size {size}, must be a power of two between 64 and 32768"
        )))
    }
}

pub(crate) fn stream_supports_nack(info: &StreamInfo) -> bool {
    info.has_feedback("nack", "")
}
