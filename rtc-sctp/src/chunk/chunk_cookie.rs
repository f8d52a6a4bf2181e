use super::{ChunkHeader, ChunkValue, chunk_type::*};

use bytes::{Bytes, BytesMut};
use shared::error::Result;
use std::fmt;

/// CookieEcho represents an SCTP Chunk of type CookieEcho
///
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 10   |Chunk  Flags   |         Length                |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                     Cookie                                    |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkCookieEcho {
    pub(crate) cookie: Bytes,
}

impl fmt::Display for ChunkCookieEcho {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}

impl ChunkValue for ChunkCookieEcho {
    fn chunk_type(&self) -> ChunkType {
        CT_COOKIE_ECHO
    }

    fn value_length(&self) -> usize {
        self.cookie.len()
    }

    fn marshal_value(&self, writer: &mut BytesMut) -> Result<()> {
        writer.extend_from_slice(&self.cookie);
        Ok(())
    }

    fn unmarshal_value(_header: &ChunkHeader, value: &Bytes) -> Result<Self> {
        Ok(ChunkCookieEcho {
            cookie: value.clone(),
        })
    }
}

/// chunkCookieAck represents an SCTP Chunk of type chunkCookieAck
///
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 11   |Chunk  Flags   |     Length = 4                |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkCookieAck;

impl fmt::Display for ChunkCookieAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}

impl ChunkValue for ChunkCookieAck {
    fn chunk_type(&self) -> ChunkType {
        CT_COOKIE_ACK
    }

    fn value_length(&self) -> usize {
        0
    }

    fn marshal_value(&self, _writer: &mut BytesMut) -> Result<()> {
        Ok(())
    }

    fn unmarshal_value(_header: &ChunkHeader, _value: &Bytes) -> Result<Self> {
        Ok(ChunkCookieAck)
    }
}
