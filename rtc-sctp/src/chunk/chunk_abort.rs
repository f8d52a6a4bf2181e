use super::error_cause::*;
use super::{ChunkHeader, ChunkValue, chunk_type::*};

use bytes::{Bytes, BytesMut};
use shared::error::Result;
use std::fmt;

pub(crate) const ABORT_T_BIT: u8 = 1;

///Abort represents an SCTP Chunk of type ABORT
///
///The ABORT chunk is sent to the peer of an association to close the
///association.  The ABORT chunk may contain Cause Parameters to inform
///the receiver about the reason of the abort.  DATA chunks MUST NOT be
///bundled with ABORT.  Control chunks (except for INIT, INIT ACK, and
///SHUTDOWN COMPLETE) MAY be bundled with an ABORT, but they MUST be
///placed before the ABORT in the SCTP packet or they will be ignored by
///the receiver.
///
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 6    |Reserved     |T|           Length              |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                                                               |
///|                   zero or more Error Causes                   |
///|                                                               |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkAbort {
    /// The sender filled in the peer's verification tag rather than its own.
    pub(crate) verification_tag_reflected: bool,
    pub(crate) error_causes: Vec<ErrorCause>,
}

impl fmt::Display for ChunkAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut res = vec![self.header().to_string()];
        for cause in &self.error_causes {
            res.push(format!(" - {cause}"));
        }
        write!(f, "{}", res.join("\n"))
    }
}

impl ChunkValue for ChunkAbort {
    fn chunk_type(&self) -> ChunkType {
        CT_ABORT
    }

    fn flags(&self) -> u8 {
        if self.verification_tag_reflected {
            ABORT_T_BIT
        } else {
            0
        }
    }

    fn value_length(&self) -> usize {
        error_causes_length(&self.error_causes)
    }

    fn marshal_value(&self, writer: &mut BytesMut) -> Result<()> {
        marshal_error_causes(&self.error_causes, writer);
        Ok(())
    }

    fn unmarshal_value(header: &ChunkHeader, value: &Bytes) -> Result<Self> {
        Ok(ChunkAbort {
            verification_tag_reflected: header.flags & ABORT_T_BIT != 0,
            error_causes: unmarshal_error_causes(value)?,
        })
    }
}
