#[cfg(test)]
mod packet_test;

use crate::header::*;
use bytes::{Buf, BufMut, Bytes};
use shared::{
    error::{Error, Result},
    marshal::{Marshal, MarshalSize, Unmarshal},
};
use std::fmt;

/// Packet represents an RTP Packet.
///
/// `padding_size` is the number of padding octets trailing the payload on the wire,
/// including the final octet carrying the count; the padding bit is written iff it is non-zero.
#[derive(Debug, Eq, PartialEq, Default, Clone)]
pub struct Packet {
    pub header: Header,
    pub payload: Bytes,
    pub padding_size: u8,
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = "RTP PACKET:\n".to_string();

        out += format!("\tVersion: {}\n", self.header.version).as_str();
        out += format!("\tMarker: {}\n", self.header.marker).as_str();
        out += format!("\tPayload Type: {}\n", self.header.payload_type).as_str();
        out += format!("\tSequence Number: {}\n", self.header.sequence_number).as_str();
        out += format!("\tTimestamp: {}\n", self.header.timestamp).as_str();
        out += format!("\tSSRC: {} ({:x})\n", self.header.ssrc, self.header.ssrc).as_str();
        out += format!("\tPayload Length: {}\n", self.payload.len()).as_str();
        out += format!("\tPadding Length: {}\n", self.padding_size).as_str();

        write!(f, "{out}")
    }
}

impl Unmarshal for Packet {
    /// Unmarshal parses the passed byte slice and stores the result in the Packet this method is called upon
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let header = Header::unmarshal(raw_packet)?;
        let payload_len = raw_packet.remaining();
        let body = raw_packet.copy_to_bytes(payload_len);
        let (payload, padding_size) = if header.padding {
            let Some(&padding_size) = body.last() else {
                return Err(Error::ErrShortPacket);
            };
            let padding_len = padding_size as usize;
            if padding_len == 0 || padding_len > payload_len {
                return Err(Error::ErrInvalidPadding);
            }
            (body.slice(..payload_len - padding_len), padding_size)
        } else {
            (body, 0)
        };

        Ok(Packet {
            header,
            payload,
            padding_size,
        })
    }
}

impl MarshalSize for Packet {
    /// MarshalSize returns the size of the packet once marshaled.
    fn marshal_size(&self) -> usize {
        self.header.marshal_size() + self.payload.len() + self.padding_size as usize
    }
}

impl Marshal for Packet {
    /// MarshalTo serializes the packet and writes to the buffer.
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::ErrBufferTooSmall);
        }

        let n = self.header.marshal_to(buf)?;
        // the padding bit follows the trailing padding, not the header field
        if self.padding_size > 0 {
            buf[0] |= 1 << PADDING_SHIFT;
        } else {
            buf[0] &= !(1 << PADDING_SHIFT);
        }
        buf = &mut buf[n..];
        buf.put(&*self.payload);
        let padding_len = self.padding_size as usize;
        if padding_len > 0 {
            for _ in 0..padding_len - 1 {
                buf.put_u8(0);
            }
            buf.put_u8(self.padding_size);
        }

        Ok(n + self.payload.len() + padding_len)
    }
}

/// Returns the number of padding octets needed to align `len` to 32 bits.
pub fn get_padding_size(len: usize) -> u8 {
    if len % 4 == 0 {
        0
    } else {
        (4 - len % 4) as u8
    }
}
