use super::{ChunkHeader, ChunkValue, chunk_type::*};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};
use std::fmt;

pub(crate) const NEW_CUMULATIVE_TSN_LENGTH: usize = 4;
pub(crate) const FORWARD_TSN_STREAM_LENGTH: usize = 4;

/// This chunk shall be used by the data sender to inform the data
/// receiver to adjust its cumulative received TSN point forward because
/// some missing TSNs are associated with data chunks that SHOULD NOT be
/// transmitted or retransmitted by the sender.
///
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 192  |  Flags = 0x00 |        Length = Variable      |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                      New Cumulative TSN                       |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|         Stream-1              |       Stream Sequence-1       |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///\                                                               /
////                                                               \
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|         Stream-N              |       Stream Sequence-N       |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkForwardTsn {
    /// This indicates the new cumulative TSN to the data receiver.  Upon
    /// the reception of this value, the data receiver MUST consider
    /// any missing TSNs earlier than or equal to this value as received,
    /// and stop reporting them as gaps in any subsequent SACKs.
    pub(crate) new_cumulative_tsn: u32,

    pub(crate) streams: Vec<ChunkForwardTsnStream>,
}

impl fmt::Display for ChunkForwardTsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut res = vec![self.header().to_string()];
        res.push(format!("New Cumulative TSN: {}", self.new_cumulative_tsn));
        for s in &self.streams {
            res.push(format!(" - si={}, ssn={}", s.identifier, s.sequence));
        }
        write!(f, "{}", res.join("\n"))
    }
}

impl ChunkValue for ChunkForwardTsn {
    fn chunk_type(&self) -> ChunkType {
        CT_FORWARD_TSN
    }

    fn value_length(&self) -> usize {
        NEW_CUMULATIVE_TSN_LENGTH + FORWARD_TSN_STREAM_LENGTH * self.streams.len()
    }

    fn marshal_value(&self, writer: &mut BytesMut) -> Result<()> {
        writer.put_u32(self.new_cumulative_tsn);
        for s in &self.streams {
            writer.put_u16(s.identifier);
            writer.put_u16(s.sequence);
        }
        Ok(())
    }

    fn unmarshal_value(_header: &ChunkHeader, value: &Bytes) -> Result<Self> {
        if value.len() < NEW_CUMULATIVE_TSN_LENGTH {
            return Err(Error::ErrChunkTooShort);
        }

        let reader = &mut value.clone();
        let new_cumulative_tsn = reader.get_u32();

        let mut streams = vec![];
        while reader.remaining() >= FORWARD_TSN_STREAM_LENGTH {
            streams.push(ChunkForwardTsnStream {
                identifier: reader.get_u16(),
                sequence: reader.get_u16(),
            });
        }

        Ok(ChunkForwardTsn {
            new_cumulative_tsn,
            streams,
        })
    }
}

/// Stream and the largest skipped stream sequence number in it.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub(crate) struct ChunkForwardTsnStream {
    pub(crate) identifier: u16,
    pub(crate) sequence: u16,
}
