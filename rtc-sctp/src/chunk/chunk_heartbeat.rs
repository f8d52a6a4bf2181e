use super::{ChunkHeader, ChunkValue, chunk_type::*};
use crate::param::{Param, marshal_params, params_length, unmarshal_params};

use bytes::{Bytes, BytesMut};
use shared::error::{Error, Result};
use std::fmt;

///chunkHeartbeat represents an SCTP Chunk of type HEARTBEAT
///
///An endpoint should send this chunk to its peer endpoint to probe the
///reachability of a particular destination transport address defined in
///the present association.
///
///The parameter field contains the Heartbeat Information, which is a
///variable-length opaque data structure understood only by the sender.
///
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 4    | Chunk  Flags  |      Heartbeat Length         |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                                                               |
///|            Heartbeat Information TLV (Variable-Length)        |
///|                                                               |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkHeartbeat {
    pub(crate) params: Vec<Param>,
}

impl fmt::Display for ChunkHeartbeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}

impl ChunkValue for ChunkHeartbeat {
    fn chunk_type(&self) -> ChunkType {
        CT_HEARTBEAT
    }

    fn value_length(&self) -> usize {
        params_length(&self.params)
    }

    fn marshal_value(&self, writer: &mut BytesMut) -> Result<()> {
        marshal_params(&self.params, writer);
        Ok(())
    }

    fn unmarshal_value(_header: &ChunkHeader, value: &Bytes) -> Result<Self> {
        if value.is_empty() {
            return Err(Error::ErrHeartbeatNotLongEnoughInfo);
        }

        let params = unmarshal_params(value).map_err(|_| Error::ErrParseParamTypeFailed)?;
        match params.first() {
            Some(Param::HeartbeatInfo(_)) => Ok(ChunkHeartbeat { params }),
            _ => Err(Error::ErrHeartbeatParam),
        }
    }
}

impl ChunkHeartbeat {
    pub(crate) fn info(&self) -> Option<Bytes> {
        match self.params.first() {
            Some(Param::HeartbeatInfo(info)) => Some(info.clone()),
            _ => None,
        }
    }
}

///chunkHeartbeatAck represents an SCTP Chunk of type HEARTBEAT ACK
///
///An endpoint should send this chunk to its peer endpoint as a response
///to a HEARTBEAT chunk.  A HEARTBEAT ACK is always
///sent to the source IP address of the IP datagram containing the
///HEARTBEAT chunk to which this ack is responding.
///
///The parameter field contains a variable-length opaque data structure.
///
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|   Type = 5    | Chunk  Flags  |    Heartbeat Ack Length       |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                                                               |
///|            Heartbeat Information TLV (Variable-Length)        |
///|                                                               |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkHeartbeatAck {
    pub(crate) params: Vec<Param>,
}

impl fmt::Display for ChunkHeartbeatAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}

impl ChunkValue for ChunkHeartbeatAck {
    fn chunk_type(&self) -> ChunkType {
        CT_HEARTBEAT_ACK
    }

    fn value_length(&self) -> usize {
        params_length(&self.params)
    }

    fn marshal_value(&self, writer: &mut BytesMut) -> Result<()> {
        self.check()?;
        marshal_params(&self.params, writer);
        Ok(())
    }

    fn unmarshal_value(_header: &ChunkHeader, value: &Bytes) -> Result<Self> {
        let params = unmarshal_params(value).map_err(|_| Error::ErrParseParamTypeFailed)?;
        let ack = ChunkHeartbeatAck { params };
        ack.check()?;
        Ok(ack)
    }

    fn check(&self) -> Result<()> {
        if self.params.len() != 1 {
            return Err(Error::ErrHeartbeatAckParams);
        }
        match self.params[0] {
            Param::HeartbeatInfo(_) => Ok(()),
            _ => Err(Error::ErrHeartbeatAckNotHeartbeatInfo),
        }
    }
}
