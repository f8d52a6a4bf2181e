use crate::util::get_padding_size;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};
use std::fmt;

pub(crate) const ERROR_CAUSE_HEADER_LENGTH: usize = 4;

/// Cause code carried in ABORT and ERROR chunks (RFC 4960 section 3.3.10)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ErrorCauseCode(pub(crate) u16);

impl ErrorCauseCode {
    pub const INVALID_STREAM_IDENTIFIER: Self = Self(1);
    pub const MISSING_MANDATORY_PARAMETER: Self = Self(2);
    pub const STALE_COOKIE_ERROR: Self = Self(3);
    pub const OUT_OF_RESOURCE: Self = Self(4);
    pub const UNRESOLVABLE_ADDRESS: Self = Self(5);
    pub const UNRECOGNIZED_CHUNK_TYPE: Self = Self(6);
    pub const INVALID_MANDATORY_PARAMETER: Self = Self(7);
    pub const UNRECOGNIZED_PARAMETERS: Self = Self(8);
    pub const NO_USER_DATA: Self = Self(9);
    pub const COOKIE_RECEIVED_WHILE_SHUTTING_DOWN: Self = Self(10);
    pub const RESTART_OF_AN_ASSOCIATION_WITH_NEW_ADDRESSES: Self = Self(11);
    pub const USER_INITIATED_ABORT: Self = Self(12);
    pub const PROTOCOL_VIOLATION: Self = Self(13);
}

impl fmt::Display for ErrorCauseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let others = format!("Unknown CauseCode: {}", self.0);
        let s = match *self {
            Self::INVALID_STREAM_IDENTIFIER => "Invalid Stream Identifier",
            Self::MISSING_MANDATORY_PARAMETER => "Missing Mandatory Parameter",
            Self::STALE_COOKIE_ERROR => "Stale Cookie Error",
            Self::OUT_OF_RESOURCE => "Out Of Resource",
            Self::UNRESOLVABLE_ADDRESS => "Unresolvable IP",
            Self::UNRECOGNIZED_CHUNK_TYPE => "Unrecognized Chunk Type",
            Self::INVALID_MANDATORY_PARAMETER => "Invalid Mandatory Parameter",
            Self::UNRECOGNIZED_PARAMETERS => "Unrecognized Parameters",
            Self::NO_USER_DATA => "No User Data",
            Self::COOKIE_RECEIVED_WHILE_SHUTTING_DOWN => "Cookie Received While Shutting Down",
            Self::RESTART_OF_AN_ASSOCIATION_WITH_NEW_ADDRESSES => {
                "Restart Of An Association With New Addresses"
            }
            Self::USER_INITIATED_ABORT => "User Initiated Abort",
            Self::PROTOCOL_VIOLATION => "Protocol Violation",
            _ => others.as_str(),
        };
        write!(f, "{s}")
    }
}

/// One error cause: code, length and cause-specific information.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct ErrorCause {
    pub(crate) code: ErrorCauseCode,
    pub(crate) raw: Bytes,
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl ErrorCause {
    pub(crate) fn new(code: ErrorCauseCode, raw: Bytes) -> Self {
        ErrorCause { code, raw }
    }

    pub(crate) fn length(&self) -> usize {
        ERROR_CAUSE_HEADER_LENGTH + self.raw.len()
    }

    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        writer.put_u16(self.code.0);
        writer.put_u16(self.length() as u16);
        writer.extend_from_slice(&self.raw);
    }

    pub(crate) fn unmarshal(buf: &Bytes) -> Result<(Self, usize)> {
        if buf.len() < ERROR_CAUSE_HEADER_LENGTH {
            return Err(Error::ErrErrorCauseTooSmall);
        }

        let reader = &mut buf.slice(..ERROR_CAUSE_HEADER_LENGTH);
        let code = ErrorCauseCode(reader.get_u16());
        let len = reader.get_u16() as usize;
        if len < ERROR_CAUSE_HEADER_LENGTH || len > buf.len() {
            return Err(Error::ErrErrorCauseTooSmall);
        }

        let raw = buf.slice(ERROR_CAUSE_HEADER_LENGTH..len);
        let consumed = std::cmp::min(len + get_padding_size(len), buf.len());
        Ok((ErrorCause { code, raw }, consumed))
    }
}

pub(crate) fn unmarshal_error_causes(value: &Bytes) -> Result<Vec<ErrorCause>> {
    let mut causes = vec![];
    let mut offset = 0;
    while offset + ERROR_CAUSE_HEADER_LENGTH <= value.len() {
        let (cause, consumed) = ErrorCause::unmarshal(&value.slice(offset..))?;
        causes.push(cause);
        offset += consumed;
    }
    Ok(causes)
}

/// Length of causes where all but the last are padded.
pub(crate) fn error_causes_length(causes: &[ErrorCause]) -> usize {
    let mut length = 0;
    for (idx, cause) in causes.iter().enumerate() {
        length += cause.length();
        if idx != causes.len() - 1 {
            length += get_padding_size(cause.length());
        }
    }
    length
}

pub(crate) fn marshal_error_causes(causes: &[ErrorCause], writer: &mut BytesMut) {
    for (idx, cause) in causes.iter().enumerate() {
        cause.marshal_to(writer);
        if idx != causes.len() - 1 {
            writer.extend_from_slice(&[0u8; 4][..get_padding_size(cause.length())]);
        }
    }
}
