use crate::chunk::chunk_type::{CT_ABORT, CT_INIT, CT_SHUTDOWN_COMPLETE, ChunkType};
use crate::chunk::{CHUNK_HEADER_SIZE, Chunk};
use crate::AssociationId;
use crate::util::generate_packet_checksum;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};
use std::fmt;

pub(crate) const PACKET_HEADER_SIZE: usize = 12;

/// SCTP common header
///
///```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|     Source Port Number        |     Destination Port Number   |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                      Verification Tag                         |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|                           Checksum                            |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///```
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct CommonHeader {
    pub(crate) source_port: u16,
    pub(crate) destination_port: u16,
    pub(crate) verification_tag: u32,
}

/// A packet whose common header and checksum were validated but whose chunks are not yet
/// parsed. `Packet::unmarshal` finishes it.
#[derive(Debug)]
pub struct PartialDecode {
    pub(crate) common_header: CommonHeader,
    pub(crate) remaining: Bytes,
    pub(crate) first_chunk_type: ChunkType,
    pub(crate) initiate_tag: Option<AssociationId>,
}

impl PartialDecode {
    pub(crate) fn unmarshal(raw: &Bytes) -> Result<Self> {
        if raw.len() < PACKET_HEADER_SIZE + CHUNK_HEADER_SIZE {
            return Err(Error::ErrPacketRawTooSmall);
        }

        let reader = &mut raw.slice(..PACKET_HEADER_SIZE);
        let source_port = reader.get_u16();
        let destination_port = reader.get_u16();
        let verification_tag = reader.get_u32();
        let their_checksum = reader.get_u32_le();
        let our_checksum = generate_packet_checksum(raw);
        if their_checksum != our_checksum {
            return Err(Error::ErrChecksumMismatch);
        }

        let first_chunk_type = ChunkType(raw[PACKET_HEADER_SIZE]);
        // INIT value starts with the initiate tag
        let tag_offset = PACKET_HEADER_SIZE + CHUNK_HEADER_SIZE;
        let initiate_tag = if first_chunk_type == CT_INIT && raw.len() >= tag_offset + 4 {
            let mut tag = raw.slice(tag_offset..tag_offset + 4);
            Some(tag.get_u32())
        } else {
            None
        };

        Ok(PartialDecode {
            common_header: CommonHeader {
                source_port,
                destination_port,
                verification_tag,
            },
            remaining: raw.slice(PACKET_HEADER_SIZE..),
            first_chunk_type,
            initiate_tag,
        })
    }

    pub(crate) fn finish(self) -> Result<Packet> {
        let mut chunks = vec![];
        let mut offset = 0;
        while offset < self.remaining.len() {
            // trailing bytes too short for a chunk header are tolerated padding
            if offset + CHUNK_HEADER_SIZE > self.remaining.len() {
                break;
            }
            let (chunk, consumed) = Chunk::unmarshal(&self.remaining.slice(offset..))?;
            chunks.push(chunk);
            offset += consumed;
        }

        let packet = Packet {
            common_header: self.common_header,
            chunks,
        };
        packet.check()?;
        Ok(packet)
    }
}

/// An SCTP packet: the common header followed by one or more chunks.
#[derive(Default, Debug)]
pub(crate) struct Packet {
    pub(crate) common_header: CommonHeader,
    pub(crate) chunks: Vec<Chunk>,
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut res = format!(
            "Packet:
        source_port: {}
        destination_port: {}
        verification_tag: {}
        ",
            self.common_header.source_port,
            self.common_header.destination_port,
            self.common_header.verification_tag,
        );
        for chunk in &self.chunks {
            res += format!("Chunk: {chunk}").as_str();
        }
        write!(f, "{res}")
    }
}

impl Packet {
    pub(crate) fn unmarshal(raw: &Bytes) -> Result<Self> {
        PartialDecode::unmarshal(raw)?.finish()
    }

    pub(crate) fn marshal_size(&self) -> usize {
        PACKET_HEADER_SIZE + self.chunks.iter().map(|c| c.marshal_size()).sum::<usize>()
    }

    pub(crate) fn marshal(&self) -> Result<Bytes> {
        let mut writer = BytesMut::with_capacity(self.marshal_size());

        writer.put_u16(self.common_header.source_port);
        writer.put_u16(self.common_header.destination_port);
        writer.put_u32(self.common_header.verification_tag);
        // checksum is computed over the whole packet with this field zeroed
        writer.put_u32(0);

        for chunk in &self.chunks {
            chunk.marshal_to(&mut writer)?;
        }

        let checksum = generate_packet_checksum(&writer.clone().freeze());
        writer[8..12].copy_from_slice(&checksum.to_le_bytes());

        Ok(writer.freeze())
    }

    pub(crate) fn check(&self) -> Result<()> {
        // All packets must adhere to these rules

        // This is the SCTP sender's port number.  It can be used by the
        // receiver in combination with the source IP address, the SCTP
        // destination port, and possibly the destination IP address to
        // identify the association to which this packet belongs.  The port
        // number 0 MUST NOT be used.
        if self.common_header.source_port == 0 {
            return Err(Error::ErrSctpPacketSourcePortZero);
        }

        // This is the SCTP port number to which this packet is destined.
        // The receiving host will use this port number to de-multiplex the
        // SCTP packet to the correct receiving endpoint/application.  The
        // port number 0 MUST NOT be used.
        if self.common_header.destination_port == 0 {
            return Err(Error::ErrSctpPacketDestinationPortZero);
        }

        // Check values on the packet that are specific to a particular chunk type
        for chunk in &self.chunks {
            if let Chunk::Init(init) = chunk {
                if !init.is_ack {
                    // An INIT or INIT ACK chunk MUST NOT be bundled with any other chunk.
                    // They MUST be the only chunks present in the SCTP packets that carry
                    // them.
                    if self.chunks.len() != 1 {
                        return Err(Error::ErrInitChunkBundled);
                    }

                    // A packet containing an INIT chunk MUST have a zero Verification
                    // Tag.
                    if self.common_header.verification_tag != 0 {
                        return Err(Error::ErrInitChunkVerifyTagNotZero);
                    }
                }
            }
        }

        Ok(())
    }

    /// Whether the packet is allowed to carry the peer's tag instead of ours (RFC 4960 section 8.5.1).
    pub(crate) fn may_reflect_tag(&self) -> bool {
        self.chunks.iter().any(|c| match c {
            Chunk::Abort(abort) => abort.verification_tag_reflected,
            Chunk::ShutdownComplete(complete) => complete.verification_tag_reflected,
            _ => false,
        }) && self
            .chunks
            .iter()
            .all(|c| matches!(c.chunk_type(), CT_ABORT | CT_SHUTDOWN_COMPLETE))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chunk::chunk_cookie::ChunkCookieAck;
    use crate::chunk::chunk_init::ChunkInit;
    use crate::chunk::chunk_shutdown::ChunkShutdownComplete;

    fn init_packet(verification_tag: u32) -> Packet {
        Packet {
            common_header: CommonHeader {
                source_port: 5000,
                destination_port: 5000,
                verification_tag,
            },
            chunks: vec![Chunk::Init(ChunkInit {
                initiate_tag: 0xabcd_0123,
                advertised_receiver_window_credit: 1500,
                num_outbound_streams: 1,
                num_inbound_streams: 1,
                ..Default::default()
            })],
        }
    }

    #[test]
    fn test_packet_unmarshal_too_small() {
        assert_eq!(
            Packet::unmarshal(&Bytes::from_static(&[0u8; 12])).unwrap_err(),
            Error::ErrPacketRawTooSmall
        );
    }

    #[test]
    fn test_packet_checksum_is_little_endian_crc32c() {
        let packet = Packet {
            common_header: CommonHeader {
                source_port: 5000,
                destination_port: 5000,
                verification_tag: 0x0102_0304,
            },
            chunks: vec![Chunk::CookieAck(ChunkCookieAck)],
        };
        let raw = packet.marshal().unwrap();
        assert_eq!(raw.len(), 16);

        let expected = generate_packet_checksum(&raw);
        assert_eq!(&raw[8..12], &expected.to_le_bytes());

        let parsed = Packet::unmarshal(&raw).unwrap();
        assert_eq!(parsed.common_header, packet.common_header);
        assert_eq!(parsed.chunks.len(), 1);
        assert_eq!(parsed.chunks[0].chunk_type(), ChunkType(11));
    }

    #[test]
    fn test_packet_checksum_mismatch() {
        let mut raw = init_packet(0).marshal().unwrap().to_vec();
        raw[20] ^= 0xff;
        assert_eq!(
            Packet::unmarshal(&Bytes::from(raw)).unwrap_err(),
            Error::ErrChecksumMismatch
        );
    }

    #[test]
    fn test_partial_decode_exposes_init_tag() {
        let raw = init_packet(0).marshal().unwrap();
        let partial = PartialDecode::unmarshal(&raw).unwrap();
        assert_eq!(partial.first_chunk_type, CT_INIT);
        assert_eq!(partial.initiate_tag, Some(0xabcd_0123));
        assert_eq!(partial.common_header.verification_tag, 0);

        let packet = partial.finish().unwrap();
        assert_eq!(packet.chunks.len(), 1);
    }

    #[test]
    fn test_packet_init_rules() {
        let raw = init_packet(7).marshal().unwrap();
        assert_eq!(
            Packet::unmarshal(&raw).unwrap_err(),
            Error::ErrInitChunkVerifyTagNotZero
        );

        let mut bundled = init_packet(0);
        bundled.chunks.push(Chunk::CookieAck(ChunkCookieAck));
        let raw = bundled.marshal().unwrap();
        assert_eq!(
            Packet::unmarshal(&raw).unwrap_err(),
            Error::ErrInitChunkBundled
        );
    }

    #[test]
    fn test_packet_zero_ports() {
        let mut packet = init_packet(0);
        packet.common_header.source_port = 0;
        assert_eq!(
            packet.check().unwrap_err(),
            Error::ErrSctpPacketSourcePortZero
        );

        let mut packet = init_packet(0);
        packet.common_header.destination_port = 0;
        assert_eq!(
            packet.check().unwrap_err(),
            Error::ErrSctpPacketDestinationPortZero
        );
    }

    #[test]
    fn test_packet_reflected_tag() {
        let packet = Packet {
            common_header: CommonHeader::default(),
            chunks: vec![Chunk::ShutdownComplete(ChunkShutdownComplete {
                verification_tag_reflected: true,
            })],
        };
        assert!(packet.may_reflect_tag());

        let packet = Packet {
            common_header: CommonHeader::default(),
            chunks: vec![Chunk::ShutdownComplete(ChunkShutdownComplete::default())],
        };
        assert!(!packet.may_reflect_tag());
    }
}
