use super::error_cause::*;
use super::{ChunkHeader, ChunkValue, chunk_type::*};

use bytes::{Bytes, BytesMut};
use shared::error::Result;
use std::fmt;

///Operation Error (ERROR) (9)
///
///An endpoint sends this chunk to its peer endpoint to notify it of
///certain error conditions.  It contains one or more error causes.  An
///Operation Error is not considered fatal in and of itself, but may be
///used with an ERROR chunk to report a fatal condition.  It has the
///following parameters:
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 9    | Chunk  Flags  |           Length              |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                                                               |
///|                    one or more Error Causes                   |
///|                                                               |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkError {
    pub(crate) error_causes: Vec<ErrorCause>,
}

impl fmt::Display for ChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut res = vec![self.header().to_string()];
        for cause in &self.error_causes {
            res.push(format!(" - {cause}"));
        }
        write!(f, "{}", res.join("\n"))
    }
}

impl ChunkValue for ChunkError {
    fn chunk_type(&self) -> ChunkType {
        CT_ERROR
    }

    fn value_length(&self) -> usize {
        error_causes_length(&self.error_causes)
    }

    fn marshal_value(&self, writer: &mut BytesMut) -> Result<()> {
        marshal_error_causes(&self.error_causes, writer);
        Ok(())
    }

    fn unmarshal_value(_header: &ChunkHeader, value: &Bytes) -> Result<Self> {
        Ok(ChunkError {
            error_causes: unmarshal_error_causes(value)?,
        })
    }
}
