
use crate::attributes::ATTR_FINGERPRINT;
use crate::checks::*;
use crate::message::*;
use shared::error::*;

use crc::{CRC_32_ISO_HDLC, Crc};

/// FingerprintAttr represents FINGERPRINT attribute.
///
/// RFC 5389 Section 15.5
pub struct FingerprintAttr;

/// FINGERPRINT is shorthand for FingerprintAttr.
///
/// Example:
///
/// ```ignore
/// m.add_to(FINGERPRINT)
/// ```
pub const FINGERPRINT: FingerprintAttr = FingerprintAttr {};

pub const FINGERPRINT_XOR_VALUE: u32 = 0x5354554e;
pub const FINGERPRINT_SIZE: usize = 4; // 32 bit

/// Computes fingerprint value of b.
pub fn fingerprint_value(b: &[u8]) -> u32 {
    let checksum = Crc::<u32>::new(&CRC_32_ISO_HDLC).checksum(b);
    checksum ^ FINGERPRINT_XOR_VALUE // XOR
}

impl Setter for FingerprintAttr {
    /// Adds fingerprint to message. Must be the last attribute
    /// added.
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let l = m.length;
        // length in header should include size of fingerprint attribute
        m.length += (FINGERPRINT_SIZE + ATTRIBUTE_HEADER_SIZE) as u32; // increasing length
        m.write_length(); // writing Length to Raw
        let val = fingerprint_value(&m.raw);
        let b = val.to_be_bytes();
        m.length = l;
        m.add(ATTR_FINGERPRINT, &b);
        Ok(())
    }
}

impl FingerprintAttr {
    /// Reads fingerprint value from m and checks it, returning error if any.
    /// Can return ErrAttributeNotFound, ErrAttributeSizeInvalid or
    /// ErrFingerprintMismatch.
    pub fn check(&self, m: &Message) -> Result<()> {
        let b = m.get(ATTR_FINGERPRINT)?;
        check_size(ATTR_FINGERPRINT, b.len(), FINGERPRINT_SIZE)?;
        let val = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let attr_start = m.raw.len() - (FINGERPRINT_SIZE + ATTRIBUTE_HEADER_SIZE);
        let expected = fingerprint_value(&m.raw[..attr_start]);
        check_fingerprint(val, expected)
    }
}

impl Checker for FingerprintAttr {
    fn check(&self, m: &Message) -> Result<()> {
        FingerprintAttr::check(self, m)
    }
}
