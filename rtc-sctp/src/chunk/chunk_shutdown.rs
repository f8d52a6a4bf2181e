use super::{ChunkHeader, ChunkValue, chunk_type::*};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};
use std::fmt;

pub(crate) const CUMULATIVE_TSN_ACK_LENGTH: usize = 4;
pub(crate) const SHUTDOWN_COMPLETE_T_BIT: u8 = 1;

///chunkShutdown represents an SCTP Chunk of type chunkShutdown
///
///0                   1                   2                   3
///0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 7    | Chunk  Flags  |      Length = 8               |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                      Cumulative TSN Ack                       |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkShutdown {
    pub(crate) cumulative_tsn_ack: u32,
}

impl fmt::Display for ChunkShutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cum_tsn_ack={}", self.header(), self.cumulative_tsn_ack)
    }
}

impl ChunkValue for ChunkShutdown {
    fn chunk_type(&self) -> ChunkType {
        CT_SHUTDOWN
    }

    fn value_length(&self) -> usize {
        CUMULATIVE_TSN_ACK_LENGTH
    }

    fn marshal_value(&self, writer: &mut BytesMut) -> Result<()> {
        writer.put_u32(self.cumulative_tsn_ack);
        Ok(())
    }

    fn unmarshal_value(_header: &ChunkHeader, value: &Bytes) -> Result<Self> {
        if value.len() != CUMULATIVE_TSN_ACK_LENGTH {
            return Err(Error::ErrInvalidChunkSize);
        }
        let reader = &mut value.clone();
        Ok(ChunkShutdown {
            cumulative_tsn_ack: reader.get_u32(),
        })
    }
}

///chunkShutdownAck represents an SCTP Chunk of type chunkShutdownAck
///
///0                   1                   2                   3
///0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 8    | Chunk  Flags  |      Length = 4               |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkShutdownAck;

impl fmt::Display for ChunkShutdownAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}

impl ChunkValue for ChunkShutdownAck {
    fn chunk_type(&self) -> ChunkType {
        CT_SHUTDOWN_ACK
    }

    fn value_length(&self) -> usize {
        0
    }

    fn marshal_value(&self, _writer: &mut BytesMut) -> Result<()> {
        Ok(())
    }

    fn unmarshal_value(_header: &ChunkHeader, _value: &Bytes) -> Result<Self> {
        Ok(ChunkShutdownAck)
    }
}

///chunkShutdownComplete represents an SCTP Chunk of type chunkShutdownComplete
///
///0                   1                   2                   3
///0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 14   |Reserved     |T|      Length = 4               |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkShutdownComplete {
    pub(crate) verification_tag_reflected: bool,
}

impl fmt::Display for ChunkShutdownComplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}

impl ChunkValue for ChunkShutdownComplete {
    fn chunk_type(&self) -> ChunkType {
        CT_SHUTDOWN_COMPLETE
    }

    fn flags(&self) -> u8 {
        if self.verification_tag_reflected {
            SHUTDOWN_COMPLETE_T_BIT
        } else {
            0
        }
    }

    fn value_length(&self) -> usize {
        0
    }

    fn marshal_value(&self, _writer: &mut BytesMut) -> Result<()> {
        Ok(())
    }

    fn unmarshal_value(header: &ChunkHeader, _value: &Bytes) -> Result<Self> {
        Ok(ChunkShutdownComplete {
            verification_tag_reflected: header.flags & SHUTDOWN_COMPLETE_T_BIT != 0,
        })
    }
}
