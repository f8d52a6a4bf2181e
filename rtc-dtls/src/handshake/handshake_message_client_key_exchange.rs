use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};
use shared::error::*;

use super::*;

/// ECDHE key exchange from the client: the ephemeral public point.
/// https://tools.ietf.org/html/rfc4492#section-5.7
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessageClientKeyExchange {
    pub(crate) public_key: Vec<u8>,
}

impl HandshakeMessageClientKeyExchange {
    pub fn handshake_type(&self) -> HandshakeType {
        HandshakeType::ClientKeyExchange
    }

    pub fn size(&self) -> usize {
        1 + self.public_key.len()
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        if self.public_key.is_empty() || self.public_key.len() > 255 {
            return Err(Error::ErrInvalidClientKeyExchange);
        }

        writer.write_u8(self.public_key.len() as u8)?;
        writer.write_all(&self.public_key)?;

        Ok(writer.flush()?)
    }

    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let public_key_len = reader.read_u8()? as usize;
        let mut public_key = vec![0u8; public_key_len];
        reader.read_exact(&mut public_key)?;

        let mut rest = vec![];
        reader.read_to_end(&mut rest)?;
        if !rest.is_empty() || public_key.is_empty() {
            return Err(Error::ErrInvalidClientKeyExchange);
        }

        Ok(HandshakeMessageClientKeyExchange { public_key })
    }
}
