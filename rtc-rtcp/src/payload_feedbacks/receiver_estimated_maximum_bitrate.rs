use crate::{header::*, packet::*, util::*};
use bytes::{Buf, BufMut};
use shared::{
    error::{Error, Result},
    marshal::{Marshal, MarshalSize, Unmarshal},
};
use std::any::Any;
use std::fmt;

const REMB_OFFSET: usize = 16;
const UNIQUE_IDENTIFIER: [u8; 4] = [b'R', b'E', b'M', b'B'];
const BITRATE_MAX: f32 = 2.417_842_4e24; // 0x3FFFFp+63
const MANTISSA_MAX: u32 = 0x3FFFF;

/// ReceiverEstimatedMaximumBitrate contains the receiver's estimated maximum bitrate.
/// see: https://tools.ietf.org/html/draft-alvestrand-rmcat-remb-03
#[derive(Debug, PartialEq, Default, Clone)]
pub struct ReceiverEstimatedMaximumBitrate {
    /// SSRC of sender
    pub sender_ssrc: u32,
    /// Estimated maximum bitrate
    pub bitrate: f32,
    /// SSRC entries which this packet applies to
    pub ssrcs: Vec<u32>,
}

impl fmt::Display for ReceiverEstimatedMaximumBitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const BIT_UNITS: [&str; 7] = ["b", "Kb", "Mb", "Gb", "Tb", "Pb", "Eb"];

        let mut bitrate = self.bitrate;
        let mut power_of_unit = 0;
        while bitrate >= 1000.0 && power_of_unit < BIT_UNITS.len() - 1 {
            bitrate /= 1000.0;
            power_of_unit += 1;
        }

        write!(
            f,
            "ReceiverEstimatedMaximumBitrate {:x} {:.2} {}/s",
            self.sender_ssrc, bitrate, BIT_UNITS[power_of_unit],
        )
    }
}

impl Packet for ReceiverEstimatedMaximumBitrate {
    fn header(&self) -> Header {
        Header {
            padding: get_padding_size(self.raw_size()) != 0,
            count: FORMAT_REMB,
            packet_type: PacketType::PayloadSpecificFeedback,
            length: ((self.marshal_size() / 4) - 1) as u16,
        }
    }

    fn destination_ssrc(&self) -> Vec<u32> {
        self.ssrcs.clone()
    }

    fn raw_size(&self) -> usize {
        HEADER_LENGTH + REMB_OFFSET + self.ssrcs.len() * 4
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &dyn Packet) -> bool {
        other
            .as_any()
            .downcast_ref::<ReceiverEstimatedMaximumBitrate>()
            .is_some_and(|a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet> {
        Box::new(self.clone())
    }
}

impl MarshalSize for ReceiverEstimatedMaximumBitrate {
    fn marshal_size(&self) -> usize {
        let l = self.raw_size();
        // align to 32-bit boundary
        l + get_padding_size(l)
    }
}

impl Marshal for ReceiverEstimatedMaximumBitrate {
    /// Marshal serializes the packet and returns a byte slice.
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        /*
            0                   1                   2                   3
            0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
           +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
           |V=2|P| FMT=15  |   PT=206      |             length            |
           +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
           |                  SSRC of packet sender                        |
           +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
           |                  SSRC of media source                         |
           +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
           |  Unique identifier 'R' 'E' 'M' 'B'                            |
           +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
           |  Num SSRC     | BR Exp    |  BR Mantissa                      |
           +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
           |   SSRC feedback                                               |
           +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
           |  ...                                                          |
        */
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort);
        }
        if self.ssrcs.len() > u8::MAX as usize {
            return Err(Error::TooManySources);
        }
        if !(0.0..=BITRATE_MAX).contains(&self.bitrate) {
            return Err(Error::InvalidBitrate);
        }

        let h = self.header();
        let n = h.marshal_to(buf)?;
        buf = &mut buf[n..];

        buf.put_u32(self.sender_ssrc);
        buf.put_u32(0); // media ssrc is always 0
        buf.put_slice(&UNIQUE_IDENTIFIER);

        // Find the smallest exponent that fits the mantissa in 18 bits.
        let mut exp = 0u32;
        let mut bitrate = self.bitrate;
        while bitrate >= (MANTISSA_MAX + 1) as f32 && exp < 63 {
            bitrate /= 2.0;
            exp += 1;
        }
        let mantissa = (bitrate.floor() as u32).min(MANTISSA_MAX);

        buf.put_u8(self.ssrcs.len() as u8);
        buf.put_u8(((exp << 2) | (mantissa >> 16)) as u8);
        buf.put_u16((mantissa & 0xFFFF) as u16);

        for ssrc in &self.ssrcs {
            buf.put_u32(*ssrc);
        }

        Ok(self.marshal_size())
    }
}

impl Unmarshal for ReceiverEstimatedMaximumBitrate {
    /// Unmarshal reads a REMB packet from the given byte slice.
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let raw_packet_len = raw_packet.remaining();
        // 20 bytes is the size of the packet with no SSRCs
        if raw_packet_len < HEADER_LENGTH + REMB_OFFSET {
            return Err(Error::PacketTooShort);
        }

        let h = Header::unmarshal(raw_packet)?;

        if h.packet_type != PacketType::PayloadSpecificFeedback || h.count != FORMAT_REMB {
            return Err(Error::WrongType);
        }

        let sender_ssrc = raw_packet.get_u32();
        let media_ssrc = raw_packet.get_u32();
        if media_ssrc != 0 {
            return Err(Error::SsrcMustBeZero);
        }

        let mut identifier = [0u8; 4];
        raw_packet.copy_to_slice(&mut identifier);
        if identifier != UNIQUE_IDENTIFIER {
            return Err(Error::MissingRembIdentifier);
        }

        let num_ssrcs = raw_packet.get_u8() as usize;
        if (h.length as usize + 1) * 4 != HEADER_LENGTH + REMB_OFFSET + num_ssrcs * 4
            || raw_packet.remaining() < 3 + num_ssrcs * 4
        {
            return Err(Error::SsrcNumAndLengthMismatch);
        }

        let b = raw_packet.get_u8();
        let exp = (b >> 2) as i32;
        let mantissa = (((b & 0x03) as u32) << 16) | raw_packet.get_u16() as u32;
        let bitrate = mantissa as f32 * 2f32.powi(exp);
        if bitrate > BITRATE_MAX {
            return Err(Error::InvalidBitrate);
        }

        let mut ssrcs = Vec::with_capacity(num_ssrcs);
        for _ in 0..num_ssrcs {
            ssrcs.push(raw_packet.get_u32());
        }

        Ok(ReceiverEstimatedMaximumBitrate {
            sender_ssrc,
            bitrate,
            ssrcs,
        })
    }
}
