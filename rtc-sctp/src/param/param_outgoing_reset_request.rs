use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};
use std::fmt;

pub(crate) const PARAM_OUTGOING_RESET_REQUEST_STREAM_IDENTIFIERS_OFFSET: usize = 12;

/// Outgoing SSN Reset Request Parameter (RFC 6525 section 4.1)
///
///```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|     Parameter Type = 13       | Parameter Length = 16 + 2 * N |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|           Re-configuration Request Sequence Number            |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|           Re-configuration Response Sequence Number           |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                Sender's Last Assigned TSN                     |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|  Stream Number 1 (optional)   |    Stream Number 2 (optional) |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///```
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParamOutgoingResetRequest {
    /// Monotonically increasing number identifying this request, initialized to the initial TSN.
    pub(crate) reconfig_request_sequence_number: u32,
    /// Sequence number of the last response received from the peer, used to confirm it.
    pub(crate) reconfig_response_sequence_number: u32,
    /// Last TSN the sender assigned; the reset takes effect once everything up to it arrived.
    pub(crate) sender_last_tsn: u32,
    /// Streams to reset; empty means all streams.
    pub(crate) stream_identifiers: Vec<u16>,
}

impl fmt::Display for ParamOutgoingResetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OutgoingResetRequest rsn={} last_tsn={} streams={:?}",
            self.reconfig_request_sequence_number, self.sender_last_tsn, self.stream_identifiers
        )
    }
}

impl ParamOutgoingResetRequest {
    pub(crate) fn value_length(&self) -> usize {
        PARAM_OUTGOING_RESET_REQUEST_STREAM_IDENTIFIERS_OFFSET + self.stream_identifiers.len() * 2
    }

    pub(crate) fn marshal_value(&self, writer: &mut BytesMut) {
        writer.put_u32(self.reconfig_request_sequence_number);
        writer.put_u32(self.reconfig_response_sequence_number);
        writer.put_u32(self.sender_last_tsn);
        for sid in &self.stream_identifiers {
            writer.put_u16(*sid);
        }
    }

    pub(crate) fn unmarshal_value(value: &Bytes) -> Result<Self> {
        if value.len() < PARAM_OUTGOING_RESET_REQUEST_STREAM_IDENTIFIERS_OFFSET {
            return Err(Error::ErrSsnResetRequestParamTooShort);
        }

        let reader = &mut value.clone();
        let reconfig_request_sequence_number = reader.get_u32();
        let reconfig_response_sequence_number = reader.get_u32();
        let sender_last_tsn = reader.get_u32();

        let mut stream_identifiers = Vec::with_capacity(reader.remaining() / 2);
        while reader.remaining() >= 2 {
            stream_identifiers.push(reader.get_u16());
        }

        Ok(ParamOutgoingResetRequest {
            reconfig_request_sequence_number,
            reconfig_response_sequence_number,
            sender_last_tsn,
            stream_identifiers,
        })
    }
}
