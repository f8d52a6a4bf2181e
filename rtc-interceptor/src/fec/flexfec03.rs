use bytes::{BufMut, Bytes, BytesMut};
use log::warn;
use shared::error::{Error, Result};
use shared::marshal::{Marshal, Unmarshal};
use std::collections::VecDeque;

const RTP_HEADER_SIZE: usize = 12;
/// Fixed part of the repair header, up to and including the SN base:
/// recovery fields, SSRCCount, reserved, SSRC_i and SN base_i.
const BASE_HEADER_SIZE: usize = 18;
const SSRC_COUNT_OFFSET: usize = 8;
const SSRC_OFFSET: usize = 12;
const SN_BASE_OFFSET: usize = 16;
const MASK_OFFSET: usize = BASE_HEADER_SIZE;
const SHORT_MASK_BITS: usize = 15;
const LONG_MASK_BITS: usize = 31;
/// Largest offset from the SN base a repair packet can describe.
pub(crate) const MAX_PROTECTED_SPAN: usize = SHORT_MASK_BITS + LONG_MASK_BITS;

const K_BIT_16: u16 = 0x8000;
const K_BIT_32: u32 = 0x8000_0000;

/// Received media packets remembered for recovery.
const MEDIA_WINDOW: usize = 256;
/// Repair packets waiting for their protected packets.
const MAX_PENDING_REPAIRS: usize = 64;

/// XOR accumulator over marshalled RTP packets.
#[derive(Default)]
struct Parity {
    byte0: u8,
    byte1: u8,
    length: u16,
    timestamp: u32,
    payload: Vec<u8>,
}

impl Parity {
    fn add(&mut self, raw: &[u8]) -> Result<()> {
        if raw.len() < RTP_HEADER_SIZE {
            return Err(Error::ErrShortPacket);
        }
        let body = &raw[RTP_HEADER_SIZE..];
        self.byte0 ^= raw[0] & 0x3F;
        self.byte1 ^= raw[1];
        self.length ^= body.len() as u16;
        self.timestamp ^= u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
        if self.payload.len() < body.len() {
            self.payload.resize(body.len(), 0);
        }
        for (acc, b) in self.payload.iter_mut().zip(body) {
            *acc ^= b;
        }
        Ok(())
    }
}

/// Produces FlexFEC-03 repair packets for one media stream.
///
/// Every `num_media` consecutive media packets form a group. The group is
/// protected by `num_fec` repair packets with interleaved masks: repair `i`
/// covers the group positions `p` with `p % num_fec == i`, so up to `num_fec`
/// consecutive losses inside a group are recoverable.
pub struct FlexFecEncoder {
    ssrc: u32,
    payload_type: u8,
    protected_ssrc: u32,
    num_media: usize,
    num_fec: usize,
    sequence_number: u16,
    group: Vec<(u16, u32, Bytes)>,
}

impl FlexFecEncoder {
    pub fn new(
        ssrc: u32,
        payload_type: u8,
        protected_ssrc: u32,
        num_media: usize,
        num_fec: usize,
    ) -> Result<Self> {
        if num_fec == 0 || num_fec > num_media || num_media > MAX_PROTECTED_SPAN {
            return Err(Error::OtherInterceptorErr(format!(
                "unsupported flexfec protection {num_media} media / {num_fec} repair"
            )));
        }
        Ok(Self {
            ssrc,
            payload_type,
            protected_ssrc,
            num_media,
            num_fec,
            sequence_number: rand::random(),
            group: Vec::with_capacity(num_media),
        })
    }

    pub fn with_sequence_number(mut self, seq: u16) -> Self {
        self.sequence_number = seq;
        self
    }

    pub fn protected_ssrc(&self) -> u32 {
        self.protected_ssrc
    }

    /// Adds a sent media packet. Returns the repair packets once its group is
    /// complete.
    pub fn push(&mut self, packet: &rtp::Packet) -> Result<Vec<rtp::Packet>> {
        let seq = packet.header.sequence_number;
        if let Some(&(base, _, _)) = self.group.first() {
            // a jump the mask cannot express starts a new group
            if seq.wrapping_sub(base) as usize >= MAX_PROTECTED_SPAN {
                self.group.clear();
            }
        }
        self.group
            .push((seq, packet.header.timestamp, packet.marshal()?));

        if self.group.len() < self.num_media {
            return Ok(vec![]);
        }
        let group = std::mem::take(&mut self.group);
        (0..self.num_fec)
            .map(|i| {
                let members: Vec<_> = group
                    .iter()
                    .enumerate()
                    .filter(|(pos, _)| pos % self.num_fec == i)
                    .map(|(_, m)| m)
                    .collect();
                self.repair(group[0].0, &members)
            })
            .collect()
    }

    fn repair(&mut self, base: u16, members: &[&(u16, u32, Bytes)]) -> Result<rtp::Packet> {
        let mut parity = Parity::default();
        let mut offsets = Vec::with_capacity(members.len());
        for (seq, _, raw) in members {
            parity.add(raw)?;
            offsets.push(seq.wrapping_sub(base) as usize);
        }
        let timestamp = members.last().map(|m| m.1).unwrap_or_default();

        let long = offsets.iter().any(|&o| o >= SHORT_MASK_BITS);
        let mut payload = BytesMut::with_capacity(
            BASE_HEADER_SIZE + if long { 6 } else { 2 } + parity.payload.len(),
        );
        payload.put_u8(parity.byte0);
        payload.put_u8(parity.byte1);
        payload.put_u16(parity.length);
        payload.put_u32(parity.timestamp);
        payload.put_u8(1);
        payload.put_uint(0, 3);
        payload.put_u32(self.protected_ssrc);
        payload.put_u16(base);

        let mut short = 0u16;
        let mut extended = 0u32;
        for o in offsets {
            if o < SHORT_MASK_BITS {
                short |= 1 << (SHORT_MASK_BITS - 1 - o);
            } else {
                extended |= 1 << (LONG_MASK_BITS - 1 - (o - SHORT_MASK_BITS));
            }
        }
        if long {
            payload.put_u16(short);
            payload.put_u32(K_BIT_32 | extended);
        } else {
            payload.put_u16(K_BIT_16 | short);
        }
        payload.put_slice(&parity.payload);

        let sequence_number = self.sequence_number;
        self.sequence_number = self.sequence_number.wrapping_add(1);
        Ok(rtp::Packet {
            header: rtp::header::Header {
                version: 2,
                payload_type: self.payload_type,
                sequence_number,
                timestamp,
                ssrc: self.ssrc,
                ..Default::default()
            },
            payload: payload.freeze(),
            padding_size: 0,
        })
    }
}

/// A parsed repair packet.
struct Repair {
    protected_ssrc: u32,
    protected: Vec<u16>,
    byte0: u8,
    byte1: u8,
    length: u16,
    timestamp: u32,
    payload: Bytes,
}

impl Repair {
    fn parse(payload: &Bytes) -> Result<Self> {
        if payload.len() < BASE_HEADER_SIZE + 2 {
            return Err(Error::ErrShortPacket);
        }
        if payload[0] & 0xC0 != 0 {
            return Err(Error::OtherInterceptorErr(
                "flexfec retransmission and fixed-offset modes are not supported".to_owned(),
            ));
        }
        if payload[SSRC_COUNT_OFFSET] != 1 {
            return Err(Error::OtherInterceptorErr(format!(
                "flexfec repair protects {} streams, only one is supported",
                payload[SSRC_COUNT_OFFSET]
            )));
        }
        let protected_ssrc = u32::from_be_bytes([
            payload[SSRC_OFFSET],
            payload[SSRC_OFFSET + 1],
            payload[SSRC_OFFSET + 2],
            payload[SSRC_OFFSET + 3],
        ]);
        let base = u16::from_be_bytes([payload[SN_BASE_OFFSET], payload[SN_BASE_OFFSET + 1]]);
        let short = u16::from_be_bytes([payload[MASK_OFFSET], payload[MASK_OFFSET + 1]]);

        let mut protected = vec![];
        for bit in 0..SHORT_MASK_BITS {
            if short & (1 << (SHORT_MASK_BITS - 1 - bit)) != 0 {
                protected.push(base.wrapping_add(bit as u16));
            }
        }

        let mut header_size = BASE_HEADER_SIZE + 2;
        if short & K_BIT_16 == 0 {
            if payload.len() < header_size + 4 {
                return Err(Error::ErrShortPacket);
            }
            let extended = u32::from_be_bytes([
                payload[MASK_OFFSET + 2],
                payload[MASK_OFFSET + 3],
                payload[MASK_OFFSET + 4],
                payload[MASK_OFFSET + 5],
            ]);
            if extended & K_BIT_32 == 0 {
                return Err(Error::OtherInterceptorErr(
                    "flexfec masks longer than 46 packets are not supported".to_owned(),
                ));
            }
            for bit in 0..LONG_MASK_BITS {
                if extended & (1 << (LONG_MASK_BITS - 1 - bit)) != 0 {
                    protected.push(base.wrapping_add((SHORT_MASK_BITS + bit) as u16));
                }
            }
            header_size += 4;
        }

        Ok(Self {
            protected_ssrc,
            protected,
            byte0: payload[0] & 0x3F,
            byte1: payload[1],
            length: u16::from_be_bytes([payload[2], payload[3]]),
            timestamp: u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]),
            payload: payload.slice(header_size..),
        })
    }
}

/// Recovers lost packets of one media stream from FlexFEC-03 repair packets.
///
/// A repair packet recovers a media packet when it is the only one of its
/// protected set still missing. Recovered packets count as received, so they
/// may in turn complete other repair packets.
pub struct FlexFecDecoder {
    protected_ssrc: u32,
    media: Vec<Option<(u16, Bytes)>>,
    repairs: VecDeque<Repair>,
}

impl FlexFecDecoder {
    pub fn new(protected_ssrc: u32) -> Self {
        Self {
            protected_ssrc,
            media: vec![None; MEDIA_WINDOW],
            repairs: VecDeque::new(),
        }
    }

    /// Records a received media packet and returns whatever it lets us recover.
    pub fn push_media(&mut self, packet: &rtp::Packet) -> Result<Vec<rtp::Packet>> {
        let seq = packet.header.sequence_number;
        if !self.has(seq) {
            self.store(seq, packet.marshal()?);
        }
        Ok(self.recover_all())
    }

    /// Records a received repair packet and returns whatever it lets us recover.
    pub fn push_repair(&mut self, packet: &rtp::Packet) -> Result<Vec<rtp::Packet>> {
        let repair = Repair::parse(&packet.payload)?;
        if repair.protected_ssrc != self.protected_ssrc {
            return Err(Error::OtherInterceptorErr(format!(
                "repair packet protects ssrc {}, expected {}",
                repair.protected_ssrc, self.protected_ssrc
            )));
        }
        if self.repairs.len() == MAX_PENDING_REPAIRS {
            self.repairs.pop_front();
        }
        self.repairs.push_back(repair);
        Ok(self.recover_all())
    }

    fn has(&self, seq: u16) -> bool {
        matches!(&self.media[seq as usize % MEDIA_WINDOW], Some((s, _)) if *s == seq)
    }

    fn get(&self, seq: u16) -> Option<&Bytes> {
        match &self.media[seq as usize % MEDIA_WINDOW] {
            Some((s, raw)) if *s == seq => Some(raw),
            _ => None,
        }
    }

    fn store(&mut self, seq: u16, raw: Bytes) {
        self.media[seq as usize % MEDIA_WINDOW] = Some((seq, raw));
    }

    fn recover_all(&mut self) -> Vec<rtp::Packet> {
        let mut recovered = vec![];
        loop {
            let mut progress = false;
            let mut i = 0;
            while i < self.repairs.len() {
                let missing: Vec<u16> = self.repairs[i]
                    .protected
                    .iter()
                    .copied()
                    .filter(|seq| !self.has(*seq))
                    .collect();
                match missing.as_slice() {
                    [] => {
                        self.repairs.remove(i);
                    }
                    [seq] => {
                        let seq = *seq;
                        match self.recover(&self.repairs[i], seq) {
                            Ok((packet, raw)) => {
                                self.store(seq, raw);
                                recovered.push(packet);
                                progress = true;
                            }
                            Err(err) => warn!("dropping flexfec repair for {seq}: {err}"),
                        }
                        self.repairs.remove(i);
                    }
                    _ => i += 1,
                }
            }
            if !progress {
                return recovered;
            }
        }
    }

    fn recover(&self, repair: &Repair, target: u16) -> Result<(rtp::Packet, Bytes)> {
        let mut parity = Parity {
            byte0: repair.byte0,
            byte1: repair.byte1,
            length: repair.length,
            timestamp: repair.timestamp,
            payload: repair.payload.to_vec(),
        };
        for &seq in repair.protected.iter().filter(|s| **s != target) {
            let raw = self.get(seq).ok_or(Error::ErrShortPacket)?;
            parity.add(raw)?;
        }

        let length = parity.length as usize;
        if length > parity.payload.len() {
            return Err(Error::ErrShortPacket);
        }
        let mut raw = BytesMut::with_capacity(RTP_HEADER_SIZE + length);
        raw.put_u8(0x80 | parity.byte0);
        raw.put_u8(parity.byte1);
        raw.put_u16(target);
        raw.put_u32(parity.timestamp);
        raw.put_u32(self.protected_ssrc);
        raw.put_slice(&parity.payload[..length]);
        let raw = raw.freeze();

        let packet = rtp::Packet::unmarshal(&mut raw.clone())?;
        Ok((packet, raw))
    }
}
