use crate::{header::*, packet::*, util::*};
use bytes::{Buf, BufMut};
use shared::{
    error::{Error, Result},
    marshal::{Marshal, MarshalSize, Unmarshal},
};
use std::any::Any;
use std::fmt;

const FIR_OFFSET: usize = 8;
const FIR_ENTRY_LENGTH: usize = 8;

/// A FirEntry is a (ssrc, seqno) pair, as carried by FullIntraRequest.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct FirEntry {
    pub ssrc: u32,
    pub sequence_number: u8,
}

/// The FullIntraRequest packet is used to reliably request an Intra frame
/// in a video stream.  See RFC 5104 Section 3.5.1.  This is not for loss
/// recovery, which should use PictureLossIndication (PLI) instead.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct FullIntraRequest {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    pub fir: Vec<FirEntry>,
}

impl fmt::Display for FullIntraRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = format!("FullIntraRequest {} {}", self.sender_ssrc, self.media_ssrc);
        for e in &self.fir {
            out += format!(" ({} {})", e.ssrc, e.sequence_number).as_str();
        }
        write!(f, "{out}")
    }
}

impl Packet for FullIntraRequest {
    fn header(&self) -> Header {
        Header {
            padding: get_padding_size(self.raw_size()) != 0,
            count: FORMAT_FIR,
            packet_type: PacketType::PayloadSpecificFeedback,
            length: ((self.marshal_size() / 4) - 1) as u16,
        }
    }

    /// destination_ssrc returns an array of SSRC values that this packet refers to.
    fn destination_ssrc(&self) -> Vec<u32> {
        self.fir.iter().map(|x| x.ssrc).collect()
    }

    fn raw_size(&self) -> usize {
        HEADER_LENGTH + FIR_OFFSET + self.fir.len() * FIR_ENTRY_LENGTH
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &dyn Packet) -> bool {
        other
            .as_any()
            .downcast_ref::<FullIntraRequest>()
            .is_some_and(|a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet> {
        Box::new(self.clone())
    }
}

impl MarshalSize for FullIntraRequest {
    fn marshal_size(&self) -> usize {
        let l = self.raw_size();
        // align to 32-bit boundary
        l + get_padding_size(l)
    }
}

impl Marshal for FullIntraRequest {
    /// Marshal encodes the FullIntraRequest
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort);
        }

        let h = self.header();
        let n = h.marshal_to(buf)?;
        buf = &mut buf[n..];

        buf.put_u32(self.sender_ssrc);
        buf.put_u32(self.media_ssrc);

        for fir in self.fir.iter() {
            buf.put_u32(fir.ssrc);
            buf.put_u8(fir.sequence_number);
            buf.put_u8(0);
            buf.put_u16(0);
        }

        Ok(self.marshal_size())
    }
}

impl Unmarshal for FullIntraRequest {
    /// Unmarshal decodes the FullIntraRequest
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let raw_packet_len = raw_packet.remaining();
        if raw_packet_len < (HEADER_LENGTH + SSRC_LENGTH) {
            return Err(Error::PacketTooShort);
        }

        let h = Header::unmarshal(raw_packet)?;

        if raw_packet_len < (HEADER_LENGTH + (4 * h.length) as usize) {
            return Err(Error::PacketTooShort);
        }

        if h.packet_type != PacketType::PayloadSpecificFeedback || h.count != FORMAT_FIR {
            return Err(Error::WrongType);
        }

        if raw_packet_len < HEADER_LENGTH + FIR_OFFSET {
            return Err(Error::PacketTooShort);
        }

        let sender_ssrc = raw_packet.get_u32();
        let media_ssrc = raw_packet.get_u32();

        let mut i = HEADER_LENGTH + FIR_OFFSET;
        let mut fir = vec![];
        while i + FIR_ENTRY_LENGTH <= HEADER_LENGTH + (h.length * 4) as usize {
            let ssrc = raw_packet.get_u32();
            let sequence_number = raw_packet.get_u8();
            raw_packet.advance(3);

            fir.push(FirEntry {
                ssrc,
                sequence_number,
            });

            i += FIR_ENTRY_LENGTH;
        }

        Ok(FullIntraRequest {
            sender_ssrc,
            media_ssrc,
            fir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_full_intra_request_unmarshal() -> Result<()> {
        let tests = vec![
            (
                "valid",
                Bytes::from_static(&[
                    0x84, 0xce, 0x00, 0x04, // v=2, p=0, FMT=4, PSFB, len=3
                    0x00, 0x00, 0x00, 0x00, // ssrc=0x0
                    0x4b, 0xc4, 0xfc, 0xb4, // ssrc=0x4bc4fcb4
                    0x12, 0x34, 0x56, 0x78, // ssrc=0x12345678
                    0x42, 0x00, 0x00, 0x00, // Seqno=0x42
                ]),
                FullIntraRequest {
                    sender_ssrc: 0x0,
                    media_ssrc: 0x4bc4fcb4,
                    fir: vec![FirEntry {
                        ssrc: 0x12345678,
                        sequence_number: 0x42,
                    }],
                },
                None,
            ),
            (
                "also valid",
                Bytes::from_static(&[
                    0x84, 0xce, 0x00, 0x06, // v=2, p=0, FMT=4, PSFB, len=3
                    0x00, 0x00, 0x00, 0x00, // ssrc=0x0
                    0x4b, 0xc4, 0xfc, 0xb4, // ssrc=0x4bc4fcb4
                    0x12, 0x34, 0x56, 0x78, // ssrc=0x12345678
                    0x42, 0x00, 0x00, 0x00, // Seqno=0x42
                    0x98, 0x76, 0x54, 0x32, // ssrc=0x98765432
                    0x57, 0x00, 0x00, 0x00, // Seqno=0x57
                ]),
                FullIntraRequest {
                    sender_ssrc: 0x0,
                    media_ssrc: 0x4bc4fcb4,
                    fir: vec![
                        FirEntry {
                            ssrc: 0x12345678,
                            sequence_number: 0x42,
                        },
                        FirEntry {
                            ssrc: 0x98765432,
                            sequence_number: 0x57,
                        },
                    ],
                },
                None,
            ),
            (
                "packet too short",
                Bytes::from_static(&[0x00, 0x00, 0x00, 0x00]),
                FullIntraRequest::default(),
                Some(Error::PacketTooShort),
            ),
            (
                "invalid header",
                Bytes::from_static(&[
                    0x40, 0xce, 0x00, 0x04, // v=1, p=0, FMT=4, PSFB, len=3
                    0x00, 0x00, 0x00, 0x00, // ssrc=0x0
                    0x4b, 0xc4, 0xfc, 0xb4, // ssrc=0x4bc4fcb4
                    0x12, 0x34, 0x56, 0x78, // ssrc=0x12345678
                    0x42, 0x00, 0x00, 0x00, // Seqno=0x42
                ]),
                FullIntraRequest::default(),
                Some(Error::BadVersion),
            ),
            (
                "wrong type",
                Bytes::from_static(&[
                    0x84, 0xc9, 0x00, 0x04, // v=2, p=0, FMT=4, RR, len=3
                    0x00, 0x00, 0x00, 0x00, // ssrc=0x0
                    0x4b, 0xc4, 0xfc, 0xb4, // ssrc=0x4bc4fcb4
                    0x12, 0x34, 0x56, 0x78, // ssrc=0x12345678
                    0x42, 0x00, 0x00, 0x00, // Seqno=0x42
                ]),
                FullIntraRequest::default(),
                Some(Error::WrongType),
            ),
            (
                "wrong fmt",
                Bytes::from_static(&[
                    0x82, 0xce, 0x00, 0x04, // v=2, p=0, FMT=2, PSFB, len=3
                    0x00, 0x00, 0x00, 0x00, // ssrc=0x0
                    0x4b, 0xc4, 0xfc, 0xb4, // ssrc=0x4bc4fcb4
                    0x12, 0x34, 0x56, 0x78, // ssrc=0x12345678
                    0x42, 0x00, 0x00, 0x00, // Seqno=0x42
                ]),
                FullIntraRequest::default(),
                Some(Error::WrongType),
            ),
        ];

        for (name, data, want, want_error) in tests {
            let got = FullIntraRequest::unmarshal(&mut data.clone());

            match want_error {
                Some(err) => assert_eq!(got, Err(err), "Unmarshal {name}"),
                None => {
                    let actual = got?;
                    assert_eq!(actual, want, "Unmarshal {name}");
                    assert_eq!(actual.marshal()?, data, "Marshal {name}");
                }
            }
        }

        Ok(())
    }
}
