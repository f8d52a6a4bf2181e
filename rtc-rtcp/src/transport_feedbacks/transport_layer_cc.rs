
use crate::{header::*, packet::*, util::*};
use bytes::{Buf, BufMut};
use shared::{
    error::{Error, Result},
    marshal::{Marshal, MarshalSize, Unmarshal},
};
use std::any::Any;
use std::fmt;

/// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#page-5
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|  FMT=15 |    PT=205     |           length              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                     SSRC of packet sender                     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                      SSRC of media source                     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      base sequence number     |      packet status count      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                 reference time                | fb pkt. count |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |          packet chunk         |         packet chunk          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// .                                                               .
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         packet chunk          |  recv delta   |  recv delta   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// .                                                               .
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           recv delta          |  recv delta   | zero padding  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

/// for packet status chunk
pub const TYPE_TCC_STATUS_VECTOR_CHUNK: u16 = 1;

/// for status vector chunk
pub const TYPE_TCC_SYMBOL_SIZE_ONE_BIT: u16 = 0;
pub const TYPE_TCC_SYMBOL_SIZE_TWO_BIT: u16 = 1;

/// Receive deltas are expressed in multiples of 250us.
pub const TYPE_TCC_DELTA_SCALE_FACTOR: i64 = 250;

// Offset of the first packet chunk from the start of the packet body.
const PACKET_CHUNK_OFFSET: usize = 16;

/// StatusChunkTypeTcc is the first bit of a packet status chunk.
#[derive(Default, PartialEq, Eq, Debug, Clone, Copy)]
pub enum StatusChunkTypeTcc {
    #[default]
    RunLengthChunk = 0,
    StatusVectorChunk = 1,
}

/// SymbolSizeTypeTcc is the symbol size of a status vector chunk.
#[derive(Default, PartialEq, Eq, Debug, Clone, Copy)]
pub enum SymbolSizeTypeTcc {
    #[default]
    OneBit = 0,
    TwoBit = 1,
}

impl From<u16> for SymbolSizeTypeTcc {
    fn from(val: u16) -> Self {
        match val {
            0 => SymbolSizeTypeTcc::OneBit,
            _ => SymbolSizeTypeTcc::TwoBit,
        }
    }
}

/// SymbolTypeTcc is the per-packet status symbol.
#[derive(Default, PartialEq, Eq, Debug, Clone, Copy)]
pub enum SymbolTypeTcc {
    /// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#section-3.1.1
    #[default]
    PacketNotReceived = 0,
    PacketReceivedSmallDelta = 1,
    PacketReceivedLargeDelta = 2,
    /// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#page-7
    /// see Example 2: "packet received, w/o recv delta"
    PacketReceivedWithoutDelta = 3,
}

impl From<u16> for SymbolTypeTcc {
    fn from(val: u16) -> Self {
        match val {
            0 => SymbolTypeTcc::PacketNotReceived,
            1 => SymbolTypeTcc::PacketReceivedSmallDelta,
            2 => SymbolTypeTcc::PacketReceivedLargeDelta,
            _ => SymbolTypeTcc::PacketReceivedWithoutDelta,
        }
    }
}

/// PacketStatusChunk has two kinds:
/// RunLengthChunk and StatusVectorChunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketStatusChunk {
    RunLengthChunk(RunLengthChunk),
    StatusVectorChunk(StatusVectorChunk),
}

impl PacketStatusChunk {
    fn status_count(&self) -> usize {
        match self {
            PacketStatusChunk::RunLengthChunk(c) => c.run_length as usize,
            PacketStatusChunk::StatusVectorChunk(c) => c.symbol_list.len(),
        }
    }

    fn symbols(&self) -> Box<dyn Iterator<Item = SymbolTypeTcc> + '_> {
        match self {
            PacketStatusChunk::RunLengthChunk(c) => Box::new(std::iter::repeat_n(
                c.packet_status_symbol,
                c.run_length as usize,
            )),
            PacketStatusChunk::StatusVectorChunk(c) => Box::new(c.symbol_list.iter().copied()),
        }
    }
}

impl MarshalSize for PacketStatusChunk {
    fn marshal_size(&self) -> usize {
        2
    }
}

impl Marshal for PacketStatusChunk {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        match self {
            PacketStatusChunk::RunLengthChunk(c) => c.marshal_to(buf),
            PacketStatusChunk::StatusVectorChunk(c) => c.marshal_to(buf),
        }
    }
}

/// RunLengthChunk T=TypeTCCRunLengthChunk
/// 0                   1
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |T| S |       Run Length        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunLengthChunk {
    /// T = TypeTCCRunLengthChunk
    pub type_tcc: StatusChunkTypeTcc,
    /// S: type of packet status
    pub packet_status_symbol: SymbolTypeTcc,
    /// run_length: count of S
    pub run_length: u16,
}

impl MarshalSize for RunLengthChunk {
    fn marshal_size(&self) -> usize {
        2
    }
}

impl Marshal for RunLengthChunk {
    /// Marshal ..
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        if buf.remaining_mut() < 2 {
            return Err(Error::BufferTooShort);
        }
        // append 1 bit '0'
        let dst = ((self.packet_status_symbol as u16) << 13) | (self.run_length & 0x1FFF);
        buf.put_u16(dst);
        Ok(2)
    }
}

impl Unmarshal for RunLengthChunk {
    /// Unmarshal ..
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        if raw_packet.remaining() < 2 {
            return Err(Error::PacketStatusChunkLength);
        }

        // record type
        let b = raw_packet.get_u16();
        if b >> 15 != 0 {
            return Err(Error::WrongChunkType);
        }

        Ok(RunLengthChunk {
            type_tcc: StatusChunkTypeTcc::RunLengthChunk,
            packet_status_symbol: ((b >> 13) & 0x3).into(),
            run_length: b & 0x1FFF,
        })
    }
}

/// StatusVectorChunk T=typeStatusVecotrChunk
/// 0                   1
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |T|S|       symbol list         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusVectorChunk {
    /// T = TypeTCCRunLengthChunk
    pub type_tcc: StatusChunkTypeTcc,

    /// TypeTCCSymbolSizeOneBit or TypeTCCSymbolSizeTwoBit
    pub symbol_size: SymbolSizeTypeTcc,

    /// when symbol_size = TypeTCCSymbolSizeOneBit, symbol_list is 14*1bit:
    /// TypeTCCSymbolListPacketReceived or TypeTCCSymbolListPacketNotReceived
    /// when symbol_size = TypeTCCSymbolSizeTwoBit, symbol_list is 7*2bit:
    /// TypeTCCPacketNotReceived TypeTCCPacketReceivedSmallDelta TypeTCCPacketReceivedLargeDelta or typePacketReserved
    pub symbol_list: Vec<SymbolTypeTcc>,
}

impl MarshalSize for StatusVectorChunk {
    fn marshal_size(&self) -> usize {
        2
    }
}

impl Marshal for StatusVectorChunk {
    /// Marshal ..
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        if buf.remaining_mut() < 2 {
            return Err(Error::BufferTooShort);
        }

        // set first bit '1'
        let mut dst = TYPE_TCC_STATUS_VECTOR_CHUNK << 15;
        match self.symbol_size {
            SymbolSizeTypeTcc::OneBit => {
                if self.symbol_list.len() > 14 {
                    return Err(Error::InvalidSizeOrStartIndex);
                }
                for (i, s) in self.symbol_list.iter().enumerate() {
                    dst |= ((*s as u16) & 0x1) << (13 - i);
                }
            }
            SymbolSizeTypeTcc::TwoBit => {
                if self.symbol_list.len() > 7 {
                    return Err(Error::InvalidSizeOrStartIndex);
                }
                dst |= TYPE_TCC_SYMBOL_SIZE_TWO_BIT << 14;
                for (i, s) in self.symbol_list.iter().enumerate() {
                    dst |= ((*s as u16) & 0x3) << (12 - 2 * i);
                }
            }
        }

        buf.put_u16(dst);
        Ok(2)
    }
}

impl Unmarshal for StatusVectorChunk {
    /// Unmarshal ..
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        if raw_packet.remaining() < 2 {
            return Err(Error::PacketStatusChunkLength);
        }

        let b = raw_packet.get_u16();
        if b >> 15 != TYPE_TCC_STATUS_VECTOR_CHUNK {
            return Err(Error::WrongChunkType);
        }

        let symbol_size: SymbolSizeTypeTcc = ((b >> 14) & 0x1).into();
        let symbol_list: Vec<SymbolTypeTcc> = match symbol_size {
            SymbolSizeTypeTcc::OneBit => (0..14u16)
                .map(|i| SymbolTypeTcc::from((b >> (13 - i)) & 0x1))
                .collect(),
            SymbolSizeTypeTcc::TwoBit => (0..7u16)
                .map(|i| SymbolTypeTcc::from((b >> (12 - 2 * i)) & 0x3))
                .collect(),
        };

        Ok(StatusVectorChunk {
            type_tcc: StatusChunkTypeTcc::StatusVectorChunk,
            symbol_size,
            symbol_list,
        })
    }
}

/// RecvDelta are represented as multiples of 250us
/// small delta is 1 byte: [0，63.75]ms = [0, 63750]us = [0, 255]*250us
/// big delta is 2 bytes: [-8192.0, 8191.75]ms = [-8192000, 8191750]us = [-32768, 32767]*250us
/// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#section-3.1.5
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecvDelta {
    pub type_tcc_packet: SymbolTypeTcc,
    /// us
    pub delta: i64,
}

impl MarshalSize for RecvDelta {
    fn marshal_size(&self) -> usize {
        match self.type_tcc_packet {
            SymbolTypeTcc::PacketReceivedSmallDelta => 1,
            SymbolTypeTcc::PacketReceivedLargeDelta => 2,
            _ => 0,
        }
    }
}

impl Marshal for RecvDelta {
    /// Marshal ..
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        let delta = self.delta / TYPE_TCC_DELTA_SCALE_FACTOR;

        match self.type_tcc_packet {
            SymbolTypeTcc::PacketReceivedSmallDelta if (0..=u8::MAX as i64).contains(&delta) => {
                if buf.remaining_mut() < 1 {
                    return Err(Error::BufferTooShort);
                }
                buf.put_u8(delta as u8);
                Ok(1)
            }
            SymbolTypeTcc::PacketReceivedLargeDelta
                if (i16::MIN as i64..=i16::MAX as i64).contains(&delta) =>
            {
                if buf.remaining_mut() < 2 {
                    return Err(Error::BufferTooShort);
                }
                buf.put_i16(delta as i16);
                Ok(2)
            }
            // overflow
            _ => Err(Error::DeltaExceedLimit),
        }
    }
}

/// The TransportLayerCc packet carries per-packet arrival feedback for
/// transport-wide congestion control.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct TransportLayerCc {
    /// SSRC of sender
    pub sender_ssrc: u32,
    /// SSRC of the media source
    pub media_ssrc: u32,
    /// Transport wide sequence of rtp extension
    pub base_sequence_number: u16,
    /// packet_status_count
    pub packet_status_count: u16,
    /// reference_time, in multiples of 64ms
    pub reference_time: u32,
    /// fb_pkt_count
    pub fb_pkt_count: u8,
    /// packet_chunks
    pub packet_chunks: Vec<PacketStatusChunk>,
    /// recv_deltas
    pub recv_deltas: Vec<RecvDelta>,
}

impl fmt::Display for TransportLayerCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        out += format!("TransportLayerCC:\n\tSender Ssrc {}\n", self.sender_ssrc).as_str();
        out += format!("\tMedia Ssrc {}\n", self.media_ssrc).as_str();
        out += format!("\tBase Sequence Number {}\n", self.base_sequence_number).as_str();
        out += format!("\tStatus Count {}\n", self.packet_status_count).as_str();
        out += format!("\tReference Time {}\n", self.reference_time).as_str();
        out += format!("\tFeedback Packet Count {}\n", self.fb_pkt_count).as_str();
        out += "\tpacket_chunks ";
        out += format!("{:?}", self.packet_chunks).as_str();
        out += "\n\trecv_deltas ";
        out += format!("{:?}", self.recv_deltas).as_str();

        write!(f, "{out}")
    }
}

impl Packet for TransportLayerCc {
    fn header(&self) -> Header {
        Header {
            padding: get_padding_size(self.raw_size()) != 0,
            count: FORMAT_TCC,
            packet_type: PacketType::TransportSpecificFeedback,
            length: ((self.marshal_size() / 4) - 1) as u16,
        }
    }

    /// destination_ssrc returns an array of SSRC values that this packet refers to.
    fn destination_ssrc(&self) -> Vec<u32> {
        vec![self.media_ssrc]
    }

    fn raw_size(&self) -> usize {
        let mut n = HEADER_LENGTH + PACKET_CHUNK_OFFSET + self.packet_chunks.len() * 2;
        for d in &self.recv_deltas {
            n += d.marshal_size();
        }
        n
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &dyn Packet) -> bool {
        other
            .as_any()
            .downcast_ref::<TransportLayerCc>()
            .is_some_and(|a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet> {
        Box::new(self.clone())
    }
}

impl MarshalSize for TransportLayerCc {
    fn marshal_size(&self) -> usize {
        let l = self.raw_size();
        // align to 32-bit boundary
        l + get_padding_size(l)
    }
}

impl Marshal for TransportLayerCc {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort);
        }

        let h = self.header();
        let n = h.marshal_to(buf)?;
        buf = &mut buf[n..];

        buf.put_u32(self.sender_ssrc);
        buf.put_u32(self.media_ssrc);
        buf.put_u16(self.base_sequence_number);
        buf.put_u16(self.packet_status_count);

        let reference_time_and_fb_pkt_count = (self.reference_time << 8) | self.fb_pkt_count as u32;
        buf.put_u32(reference_time_and_fb_pkt_count);

        for chunk in &self.packet_chunks {
            let n = chunk.marshal_to(buf)?;
            buf = &mut buf[n..];
        }

        for delta in &self.recv_deltas {
            let n = delta.marshal_to(buf)?;
            buf = &mut buf[n..];
        }

        if h.padding {
            put_padding(buf, self.raw_size());
        }

        Ok(self.marshal_size())
    }
}

impl Unmarshal for TransportLayerCc {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let raw_packet_len = raw_packet.remaining();
        if raw_packet_len < HEADER_LENGTH + PACKET_CHUNK_OFFSET {
            return Err(Error::PacketTooShort);
        }

        let h = Header::unmarshal(raw_packet)?;

        // https://tools.ietf.org/html/rfc4585#page-33
        // header's length + 1 is the full packet length in 32-bit words
        let total_length = 4 * (h.length + 1) as usize;
        if total_length < HEADER_LENGTH + PACKET_CHUNK_OFFSET || raw_packet_len < total_length {
            return Err(Error::PacketTooShort);
        }

        if h.packet_type != PacketType::TransportSpecificFeedback || h.count != FORMAT_TCC {
            return Err(Error::WrongType);
        }

        let mut body = raw_packet.copy_to_bytes(total_length - HEADER_LENGTH);
        if h.padding {
            body = strip_padding(body)?;
        }

        let sender_ssrc = body.get_u32();
        let media_ssrc = body.get_u32();
        let base_sequence_number = body.get_u16();
        let packet_status_count = body.get_u16();

        let b = body.get_u32();
        let reference_time = b >> 8;
        let fb_pkt_count = (b & 0xFF) as u8;

        let mut packet_chunks = vec![];
        let mut processed_packet_num = 0usize;
        while processed_packet_num < packet_status_count as usize {
            if body.remaining() < 2 {
                return Err(Error::PacketTooShort);
            }
            let typ = body.chunk()[0] >> 7;
            let chunk = if typ == StatusChunkTypeTcc::RunLengthChunk as u8 {
                PacketStatusChunk::RunLengthChunk(RunLengthChunk::unmarshal(&mut body)?)
            } else {
                PacketStatusChunk::StatusVectorChunk(StatusVectorChunk::unmarshal(&mut body)?)
            };
            processed_packet_num += chunk.status_count();
            packet_chunks.push(chunk);
        }

        // Only the first packet_status_count symbols carry meaning; the tail of the
        // final vector chunk is filler.
        let mut recv_deltas = vec![];
        let symbols = packet_chunks
            .iter()
            .flat_map(|c| c.symbols())
            .take(packet_status_count as usize);
        for symbol in symbols {
            match symbol {
                SymbolTypeTcc::PacketReceivedSmallDelta => {
                    if body.remaining() < 1 {
                        return Err(Error::PacketTooShort);
                    }
                    recv_deltas.push(RecvDelta {
                        type_tcc_packet: symbol,
                        delta: body.get_u8() as i64 * TYPE_TCC_DELTA_SCALE_FACTOR,
                    });
                }
                SymbolTypeTcc::PacketReceivedLargeDelta => {
                    if body.remaining() < 2 {
                        return Err(Error::PacketTooShort);
                    }
                    recv_deltas.push(RecvDelta {
                        type_tcc_packet: symbol,
                        delta: body.get_i16() as i64 * TYPE_TCC_DELTA_SCALE_FACTOR,
                    });
                }
                _ => {}
            }
        }

        Ok(TransportLayerCc {
            sender_ssrc,
            media_ssrc,
            base_sequence_number,
            packet_status_count,
            reference_time,
            fb_pkt_count,
            packet_chunks,
            recv_deltas,
        })
    }
}
