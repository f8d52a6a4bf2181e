#[cfg(test)]
mod chunk_test;

pub(crate) mod chunk_abort;
pub(crate) mod chunk_cookie;
pub(crate) mod chunk_error;
pub(crate) mod chunk_forward_tsn;
pub(crate) mod chunk_heartbeat;
pub(crate) mod chunk_init;
pub(crate) mod chunk_payload_data;
pub(crate) mod chunk_reconfig;
pub(crate) mod chunk_selective_ack;
pub(crate) mod chunk_shutdown;
pub(crate) mod chunk_type;
pub(crate) mod error_cause;

pub use error_cause::ErrorCauseCode;

use chunk_abort::ChunkAbort;
use chunk_cookie::{ChunkCookieAck, ChunkCookieEcho};
use chunk_error::ChunkError;
use chunk_forward_tsn::ChunkForwardTsn;
use chunk_heartbeat::{ChunkHeartbeat, ChunkHeartbeatAck};
use chunk_init::ChunkInit;
use chunk_payload_data::ChunkPayloadData;
use chunk_reconfig::ChunkReconfig;
use chunk_selective_ack::ChunkSelectiveAck;
use chunk_shutdown::{ChunkShutdown, ChunkShutdownAck, ChunkShutdownComplete};
use chunk_type::*;

use crate::util::get_padding_size;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};
use std::fmt;

pub(crate) const CHUNK_HEADER_SIZE: usize = 4;

/// The common header of every chunk.
///
///```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Chunk Type  | Chunk  Flags  |        Chunk Length           |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///\                                                               \
////                          Chunk Value                          /
///\                                                               \
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub(crate) struct ChunkHeader {
    pub(crate) typ: ChunkType,
    pub(crate) flags: u8,
    pub(crate) value_length: u16,
}

impl fmt::Display for ChunkHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.typ)
    }
}

/// Body of a chunk: everything after the common chunk header.
pub(crate) trait ChunkValue: fmt::Display + fmt::Debug {
    fn chunk_type(&self) -> ChunkType;

    fn flags(&self) -> u8 {
        0
    }

    fn value_length(&self) -> usize;

    fn marshal_value(&self, writer: &mut BytesMut) -> Result<()>;

    fn unmarshal_value(header: &ChunkHeader, value: &Bytes) -> Result<Self>
    where
        Self: Sized;

    fn check(&self) -> Result<()> {
        Ok(())
    }

    fn header(&self) -> ChunkHeader {
        ChunkHeader {
            typ: self.chunk_type(),
            flags: self.flags(),
            value_length: self.value_length() as u16,
        }
    }
}

/// A chunk whose type this implementation does not process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkUnknown {
    pub(crate) header: ChunkHeader,
    pub(crate) value: Bytes,
}

impl fmt::Display for ChunkUnknown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.header, self.value.len())
    }
}

impl ChunkValue for ChunkUnknown {
    fn chunk_type(&self) -> ChunkType {
        self.header.typ
    }

    fn flags(&self) -> u8 {
        self.header.flags
    }

    fn value_length(&self) -> usize {
        self.value.len()
    }

    fn marshal_value(&self, writer: &mut BytesMut) -> Result<()> {
        writer.extend_from_slice(&self.value);
        Ok(())
    }

    fn unmarshal_value(header: &ChunkHeader, value: &Bytes) -> Result<Self> {
        Ok(ChunkUnknown {
            header: *header,
            value: value.clone(),
        })
    }
}

impl ChunkUnknown {
    /// RFC 4960 section 3.2: the two high bits of an unrecognized chunk type tell the
    /// receiver whether to keep processing the packet and whether to report it.
    pub(crate) fn skip_remaining(&self) -> bool {
        self.header.typ.0 & 0x80 == 0
    }

    pub(crate) fn report(&self) -> bool {
        self.header.typ.0 & 0x40 != 0
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Chunk {
    PayloadData(ChunkPayloadData),
    Init(ChunkInit),
    SelectiveAck(ChunkSelectiveAck),
    Heartbeat(ChunkHeartbeat),
    HeartbeatAck(ChunkHeartbeatAck),
    Abort(ChunkAbort),
    Shutdown(ChunkShutdown),
    ShutdownAck(ChunkShutdownAck),
    Error(ChunkError),
    CookieEcho(ChunkCookieEcho),
    CookieAck(ChunkCookieAck),
    ShutdownComplete(ChunkShutdownComplete),
    Reconfig(ChunkReconfig),
    ForwardTsn(ChunkForwardTsn),
    Unknown(ChunkUnknown),
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl Chunk {
    pub(crate) fn value(&self) -> &dyn ChunkValue {
        match self {
            Chunk::PayloadData(c) => c,
            Chunk::Init(c) => c,
            Chunk::SelectiveAck(c) => c,
            Chunk::Heartbeat(c) => c,
            Chunk::HeartbeatAck(c) => c,
            Chunk::Abort(c) => c,
            Chunk::Shutdown(c) => c,
            Chunk::ShutdownAck(c) => c,
            Chunk::Error(c) => c,
            Chunk::CookieEcho(c) => c,
            Chunk::CookieAck(c) => c,
            Chunk::ShutdownComplete(c) => c,
            Chunk::Reconfig(c) => c,
            Chunk::ForwardTsn(c) => c,
            Chunk::Unknown(c) => c,
        }
    }

    pub(crate) fn chunk_type(&self) -> ChunkType {
        self.value().chunk_type()
    }

    pub(crate) fn check(&self) -> Result<()> {
        self.value().check()
    }

    /// Size of the chunk on the wire, including trailing padding.
    pub(crate) fn marshal_size(&self) -> usize {
        let l = CHUNK_HEADER_SIZE + self.value().value_length();
        l + get_padding_size(l)
    }

    /// Appends header, value and padding to `writer`.
    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) -> Result<()> {
        let value = self.value();
        let length = CHUNK_HEADER_SIZE + value.value_length();
        if length > u16::MAX as usize {
            return Err(Error::ErrChunkHeaderInvalidLength);
        }

        writer.put_u8(value.chunk_type().0);
        writer.put_u8(value.flags());
        writer.put_u16(length as u16);
        value.marshal_value(writer)?;

        let padding = get_padding_size(length);
        writer.extend_from_slice(&[0u8; 4][..padding]);
        Ok(())
    }

    pub(crate) fn marshal(&self) -> Result<Bytes> {
        let mut writer = BytesMut::with_capacity(self.marshal_size());
        self.marshal_to(&mut writer)?;
        Ok(writer.freeze())
    }

    /// Parses the chunk at the front of `raw`, returning it with the number of bytes consumed.
    pub(crate) fn unmarshal(raw: &Bytes) -> Result<(Self, usize)> {
        if raw.len() < CHUNK_HEADER_SIZE {
            return Err(Error::ErrChunkHeaderTooSmall);
        }

        let reader = &mut raw.slice(..CHUNK_HEADER_SIZE);
        let typ = ChunkType(reader.get_u8());
        let flags = reader.get_u8();
        let length = reader.get_u16() as usize;

        if length < CHUNK_HEADER_SIZE {
            return Err(Error::ErrChunkHeaderInvalidLength);
        }
        if length > raw.len() {
            return Err(Error::ErrChunkHeaderNotEnoughSpace);
        }

        let padding = get_padding_size(length);
        if length + padding <= raw.len() && raw[length..length + padding].iter().any(|b| *b != 0)
        {
            return Err(Error::ErrChunkHeaderPaddingNonZero);
        }

        let header = ChunkHeader {
            typ,
            flags,
            value_length: (length - CHUNK_HEADER_SIZE) as u16,
        };
        let value = raw.slice(CHUNK_HEADER_SIZE..length);

        let chunk = match typ {
            CT_PAYLOAD_DATA => {
                Chunk::PayloadData(ChunkPayloadData::unmarshal_value(&header, &value)?)
            }
            CT_INIT | CT_INIT_ACK => Chunk::Init(ChunkInit::unmarshal_value(&header, &value)?),
            CT_SACK => Chunk::SelectiveAck(ChunkSelectiveAck::unmarshal_value(&header, &value)?),
            CT_HEARTBEAT => Chunk::Heartbeat(ChunkHeartbeat::unmarshal_value(&header, &value)?),
            CT_HEARTBEAT_ACK => {
                Chunk::HeartbeatAck(ChunkHeartbeatAck::unmarshal_value(&header, &value)?)
            }
            CT_ABORT => Chunk::Abort(ChunkAbort::unmarshal_value(&header, &value)?),
            CT_SHUTDOWN => Chunk::Shutdown(ChunkShutdown::unmarshal_value(&header, &value)?),
            CT_SHUTDOWN_ACK => {
                Chunk::ShutdownAck(ChunkShutdownAck::unmarshal_value(&header, &value)?)
            }
            CT_ERROR => Chunk::Error(ChunkError::unmarshal_value(&header, &value)?),
            CT_COOKIE_ECHO => Chunk::CookieEcho(ChunkCookieEcho::unmarshal_value(&header, &value)?),
            CT_COOKIE_ACK => Chunk::CookieAck(ChunkCookieAck::unmarshal_value(&header, &value)?),
            CT_SHUTDOWN_COMPLETE => {
                Chunk::ShutdownComplete(ChunkShutdownComplete::unmarshal_value(&header, &value)?)
            }
            CT_RECONFIG => Chunk::Reconfig(ChunkReconfig::unmarshal_value(&header, &value)?),
            CT_FORWARD_TSN => {
                Chunk::ForwardTsn(ChunkForwardTsn::unmarshal_value(&header, &value)?)
            }
            _ => Chunk::Unknown(ChunkUnknown::unmarshal_value(&header, &value)?),
        };

        Ok((chunk, std::cmp::min(length + padding, raw.len())))
    }
}
