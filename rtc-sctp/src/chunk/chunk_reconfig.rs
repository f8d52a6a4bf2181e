use super::{ChunkHeader, ChunkValue, chunk_type::*};
use crate::param::{Param, marshal_params, params_length, unmarshal_params};

use bytes::{Bytes, BytesMut};
use shared::error::{Error, Result};
use std::fmt;

///https://tools.ietf.org/html/rfc6525#section-3.1
///chunkReconfig represents an SCTP Chunk used to reconfigure streams.
///
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///| Type = 130    |  Chunk Flags  |      Chunk Length             |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///\                                                               \
////                  Re-configuration Parameter                   /
///\                                                               \
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///\                                                               \
////             Re-configuration Parameter (optional)             /
///\                                                               \
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkReconfig {
    pub(crate) param_a: Option<Param>,
    pub(crate) param_b: Option<Param>,
}

impl fmt::Display for ChunkReconfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut res = String::new();
        if let Some(param_a) = &self.param_a {
            res += format!("Param A:\n {param_a}").as_str();
        }
        if let Some(param_b) = &self.param_b {
            res += format!("Param B:\n {param_b}").as_str()
        }
        write!(f, "{res}")
    }
}

impl ChunkValue for ChunkReconfig {
    fn chunk_type(&self) -> ChunkType {
        CT_RECONFIG
    }

    fn value_length(&self) -> usize {
        params_length(&self.params())
    }

    fn marshal_value(&self, writer: &mut BytesMut) -> Result<()> {
        if self.param_a.is_none() {
            return Err(Error::ErrChunkReconfigInvalidParamA);
        }
        marshal_params(&self.params(), writer);
        Ok(())
    }

    fn unmarshal_value(_header: &ChunkHeader, value: &Bytes) -> Result<Self> {
        let mut params = unmarshal_params(value)?.into_iter();
        let param_a = params.next().ok_or(Error::ErrChunkReconfigInvalidParamA)?;
        let param_b = params.next();

        Ok(ChunkReconfig {
            param_a: Some(param_a),
            param_b,
        })
    }
}

impl ChunkReconfig {
    fn params(&self) -> Vec<Param> {
        self.param_a
            .iter()
            .chain(self.param_b.iter())
            .cloned()
            .collect()
    }
}
