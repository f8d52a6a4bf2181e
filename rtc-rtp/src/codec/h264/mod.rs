
use crate::packetizer::Payloader;
use bytes::{BufMut, Bytes, BytesMut};
use shared::error::Result;

/// H264Payloader payloads H264 packets
#[derive(Default, Debug, Clone)]
pub struct H264Payloader {
    sps_nalu: Option<Bytes>,
    pps_nalu: Option<Bytes>,
}

pub const STAPA_NALU_TYPE: u8 = 24;
pub const FUA_NALU_TYPE: u8 = 28;
pub const FUB_NALU_TYPE: u8 = 29;
pub const SPS_NALU_TYPE: u8 = 7;
pub const PPS_NALU_TYPE: u8 = 8;
pub const AUD_NALU_TYPE: u8 = 9;
pub const FILLER_NALU_TYPE: u8 = 12;

pub const FUA_HEADER_SIZE: usize = 2;
pub const STAPA_HEADER_SIZE: usize = 1;
pub const STAPA_NALU_LENGTH_SIZE: usize = 2;

pub const NALU_TYPE_BITMASK: u8 = 0x1F;
pub const NALU_REF_IDC_BITMASK: u8 = 0x60;
pub const FU_START_BITMASK: u8 = 0x80;
pub const FU_END_BITMASK: u8 = 0x40;

pub const OUTPUT_STAP_AHEADER: u8 = 0x78;

/// Returns the offset and length of the next Annex B start code at or after `start`.
fn next_ind(nalu: &Bytes, start: usize) -> Option<(usize, usize)> {
    let mut zero_count = 0;

    for (i, &b) in nalu[start..].iter().enumerate() {
        if b == 0 {
            zero_count += 1;
            continue;
        } else if b == 1 && zero_count >= 2 {
            return Some((start + i - zero_count, zero_count + 1));
        }
        zero_count = 0
    }
    None
}

impl H264Payloader {
    fn emit(&mut self, nalu: &Bytes, mtu: usize, payloads: &mut Vec<Bytes>) {
        if nalu.is_empty() {
            return;
        }

        let nalu_type = nalu[0] & NALU_TYPE_BITMASK;
        let nalu_ref_idc = nalu[0] & NALU_REF_IDC_BITMASK;

        if nalu_type == AUD_NALU_TYPE || nalu_type == FILLER_NALU_TYPE {
            return;
        } else if nalu_type == SPS_NALU_TYPE {
            self.sps_nalu = Some(nalu.clone());
            return;
        } else if nalu_type == PPS_NALU_TYPE {
            self.pps_nalu = Some(nalu.clone());
            return;
        } else if let (Some(sps_nalu), Some(pps_nalu)) = (&self.sps_nalu, &self.pps_nalu) {
            // Pack current NALU with SPS and PPS as STAP-A
            let mut stap_a_nalu = BytesMut::with_capacity(
                STAPA_HEADER_SIZE + 2 * STAPA_NALU_LENGTH_SIZE + sps_nalu.len() + pps_nalu.len(),
            );
            stap_a_nalu.put_u8(OUTPUT_STAP_AHEADER);
            stap_a_nalu.put_u16(sps_nalu.len() as u16);
            stap_a_nalu.put(sps_nalu.as_ref());
            stap_a_nalu.put_u16(pps_nalu.len() as u16);
            stap_a_nalu.put(pps_nalu.as_ref());
            if stap_a_nalu.len() <= mtu {
                payloads.push(stap_a_nalu.freeze());
            }
        }

        if self.sps_nalu.is_some() && self.pps_nalu.is_some() {
            self.sps_nalu = None;
            self.pps_nalu = None;
        }

        // Single NALU
        if nalu.len() <= mtu {
            payloads.push(nalu.clone());
            return;
        }

        // FU-A
        if mtu <= FUA_HEADER_SIZE {
            return;
        }
        let max_fragment_size = mtu - FUA_HEADER_SIZE;

        // The FU payload consists of fragments of the payload of the fragmented
        // NAL unit so that if the fragmentation unit payloads of consecutive
        // FUs are sequentially concatenated, the payload of the fragmented NAL
        // unit can be reconstructed.  The NAL unit type octet of the fragmented
        // NAL unit is not included as such in the fragmentation unit payload,
        // but rather the information of the NAL unit type octet of the
        // fragmented NAL unit is conveyed in the F and NRI fields of the FU
        // indicator octet of the fragmentation unit and in the type field of
        // the FU header.  An FU payload MAY have any number of octets and MAY
        // be empty.
        let nalu_data_length = nalu.len() - 1;
        let mut nalu_data_index = 1;
        let mut nalu_data_remaining = nalu_data_length;

        while nalu_data_remaining > 0 {
            let current_fragment_size = std::cmp::min(max_fragment_size, nalu_data_remaining);
            let mut out = BytesMut::with_capacity(FUA_HEADER_SIZE + current_fragment_size);

            // +---------------+
            // |0|1|2|3|4|5|6|7|
            // +-+-+-+-+-+-+-+-+
            // |F|NRI|  Type   |
            // +---------------+
            out.put_u8(FUA_NALU_TYPE | nalu_ref_idc);

            // +---------------+
            // |0|1|2|3|4|5|6|7|
            // +-+-+-+-+-+-+-+-+
            // |S|E|R|  Type   |
            // +---------------+
            let mut b1 = nalu_type;
            if nalu_data_remaining == nalu_data_length {
                // Set start bit
                b1 |= FU_START_BITMASK;
            } else if nalu_data_remaining == current_fragment_size {
                // Set end bit
                b1 |= FU_END_BITMASK;
            }
            out.put_u8(b1);

            out.put(&nalu[nalu_data_index..nalu_data_index + current_fragment_size]);
            payloads.push(out.freeze());

            nalu_data_remaining -= current_fragment_size;
            nalu_data_index += current_fragment_size;
        }
    }
}

impl Payloader for H264Payloader {
    /// Payload fragments a H264 packet across one or more byte arrays
    fn payload(&mut self, mtu: usize, payload: &Bytes) -> Result<Vec<Bytes>> {
        if payload.is_empty() || mtu == 0 {
            return Ok(vec![]);
        }

        let mut payloads = vec![];

        let Some((mut start, mut len)) = next_ind(payload, 0) else {
            self.emit(payload, mtu, &mut payloads);
            return Ok(payloads);
        };

        loop {
            let prev_start = start + len;
            match next_ind(payload, prev_start) {
                Some((next_start, next_len)) => {
                    self.emit(&payload.slice(prev_start..next_start), mtu, &mut payloads);
                    start = next_start;
                    len = next_len;
                }
                None => {
                    self.emit(&payload.slice(prev_start..), mtu, &mut payloads);
                    break;
                }
            }
        }

        Ok(payloads)
    }

    fn clone_to(&self) -> Box<dyn Payloader + Send + Sync> {
        Box::new(self.clone())
    }
}
