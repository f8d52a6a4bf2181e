use crate::AssociationId;

use bytes::Bytes;
use crc::{CRC_32_ISCSI, Crc};

/// Generates association ids for incoming associations
pub trait AssociationIdGenerator {
    /// Generates a new AID
    ///
    /// Association IDs MUST NOT contain any information that can be used by
    /// an external observer (that is, one that does not cooperate with the
    /// issuer) to correlate them with other association IDs for the same
    /// association.
    fn generate_aid(&mut self) -> AssociationId;
}

/// Generates purely random association IDs of a certain length
#[derive(Default, Debug, Clone, Copy)]
pub struct RandomAssociationIdGenerator {}

impl RandomAssociationIdGenerator {
    /// Initialize Random AID generator
    pub fn new() -> Self {
        RandomAssociationIdGenerator::default()
    }
}

impl AssociationIdGenerator for RandomAssociationIdGenerator {
    fn generate_aid(&mut self) -> AssociationId {
        // A verification tag of zero is reserved for INIT.
        loop {
            let aid: AssociationId = rand::random();
            if aid != 0 {
                break aid;
            }
        }
    }
}

const PADDING_MULTIPLE: usize = 4;

pub(crate) fn get_padding_size(len: usize) -> usize {
    (PADDING_MULTIPLE - (len % PADDING_MULTIPLE)) % PADDING_MULTIPLE
}

/// Allocate and zero this data once.
/// We need to use it for the checksum and don't want to allocate/clear each time.
pub(crate) static FOUR_ZEROES: Bytes = Bytes::from_static(&[0, 0, 0, 0]);

pub(crate) const ISCSI_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Fastest way to do a crc32 without allocating.
pub(crate) fn generate_packet_checksum(raw: &Bytes) -> u32 {
    let mut digest = ISCSI_CRC.digest();
    digest.update(&raw[0..8]);
    digest.update(&FOUR_ZEROES[..]);
    digest.update(&raw[12..]);
    digest.finalize()
}

/// Serial Number Arithmetic (RFC 1982)
#[inline]
pub(crate) fn sna32lt(i1: u32, i2: u32) -> bool {
    (i1 < i2 && i2 - i1 < 1 << 31) || (i1 > i2 && i1 - i2 > 1 << 31)
}

#[inline]
pub(crate) fn sna32lte(i1: u32, i2: u32) -> bool {
    i1 == i2 || sna32lt(i1, i2)
}

#[inline]
pub(crate) fn sna32gt(i1: u32, i2: u32) -> bool {
    (i1 < i2 && (i2 - i1) >= 1 << 31) || (i1 > i2 && (i1 - i2) <= 1 << 31)
}

#[inline]
pub(crate) fn sna32gte(i1: u32, i2: u32) -> bool {
    i1 == i2 || sna32gt(i1, i2)
}

#[inline]
pub(crate) fn sna16lt(i1: u16, i2: u16) -> bool {
    (i1 < i2 && (i2 - i1) < 1 << 15) || (i1 > i2 && (i1 - i2) > 1 << 15)
}

#[inline]
pub(crate) fn sna16lte(i1: u16, i2: u16) -> bool {
    i1 == i2 || sna16lt(i1, i2)
}

#[inline]
pub(crate) fn sna16gt(i1: u16, i2: u16) -> bool {
    (i1 < i2 && (i2 - i1) >= 1 << 15) || (i1 > i2 && (i1 - i2) <= 1 << 15)
}

#[inline]
pub(crate) fn sna16gte(i1: u16, i2: u16) -> bool {
    i1 == i2 || sna16gt(i1, i2)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_padding_size() {
        let tests = vec![(0, 0), (1, 3), (2, 2), (3, 1), (4, 0), (5, 3), (1200, 0)];
        for (len, padding) in tests {
            assert_eq!(get_padding_size(len), padding, "len {len}");
        }
    }

    #[test]
    fn test_serial_number_arithmetic_32bit() {
        const DIV: u32 = 16;
        const INTERVAL: u32 = ((1u64 << 32) / DIV as u64) as u32;
        const MAX_FORWARD_DISTANCE: u32 = 1 << (32 - 1);
        const MAX_BACKWARD_DISTANCE: u32 = 1 << (32 - 1);

        for i in 0..DIV {
            let s1 = i * INTERVAL;
            let s2f = s1.wrapping_add(MAX_FORWARD_DISTANCE - 1);
            let s2b = s1.wrapping_add(MAX_BACKWARD_DISTANCE + 1);

            assert!(sna32lt(s1, s2f), "s1 < s2 should be true: s1={s1} s2={s2f}");
            assert!(!sna32lt(s1, s2b), "s1 < s2 should be false: s1={s1} s2={s2b}");
            assert!(!sna32gt(s1, s2f), "s1 > s2 should be false: s1={s1} s2={s2f}");
            assert!(sna32gt(s1, s2b), "s1 > s2 should be true: s1={s1} s2={s2b}");
            assert!(sna32lte(s1, s1) && sna32gte(s1, s1));
        }
    }

    #[test]
    fn test_serial_number_arithmetic_16bit_wraps() {
        assert!(sna16lt(u16::MAX, 0));
        assert!(sna16gt(0, u16::MAX));
        assert!(sna16lte(5, 5));
        assert!(!sna16gte(4, 5));
    }

    #[test]
    fn test_random_aid_is_never_zero() {
        let mut generator = RandomAssociationIdGenerator::new();
        for _ in 0..1000 {
            assert_ne!(generator.generate_aid(), 0);
        }
    }
}
