use aes::cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray};
use aes::{Aes128, Aes256};

use shared::error::{Error, Result};

pub(crate) const LABEL_SRTP_ENCRYPTION: u8 = 0x00;
pub(crate) const LABEL_SRTP_AUTHENTICATION_TAG: u8 = 0x01;
pub(crate) const LABEL_SRTP_SALT: u8 = 0x02;
pub(crate) const LABEL_SRTCP_ENCRYPTION: u8 = 0x03;
pub(crate) const LABEL_SRTCP_AUTHENTICATION_TAG: u8 = 0x04;
pub(crate) const LABEL_SRTCP_SALT: u8 = 0x05;

pub(crate) const SRTCP_INDEX_SIZE: usize = 4;

enum Prf {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl Prf {
    fn new(master_key: &[u8]) -> Result<Self> {
        match master_key.len() {
            16 => Ok(Prf::Aes128(Aes128::new(GenericArray::from_slice(master_key)))),
            32 => Ok(Prf::Aes256(Aes256::new(GenericArray::from_slice(master_key)))),
            n => Err(Error::SrtpMasterKeyLength(16, n)),
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Prf::Aes128(b) => b.encrypt_block(block),
            Prf::Aes256(b) => b.encrypt_block(block),
        }
    }
}

/// Derives a session key, salt or authentication key (RFC 3711 section 4.3.1) with the
/// AES-CM PRF keyed by the master key. The key derivation rate is zero, so the index is
/// always zero and `index_over_kdr` must be too.
pub(crate) fn aes_cm_key_derivation(
    label: u8,
    master_key: &[u8],
    master_salt: &[u8],
    index_over_kdr: usize,
    out_len: usize,
) -> Result<Vec<u8>> {
    if index_over_kdr != 0 {
        // 24-bit "index DIV kdr" must be xored to prf input.
        return Err(Error::ErrNonZeroKdrNotSupported);
    }
    if master_salt.len() > 14 {
        return Err(Error::SrtpSaltLength(14, master_salt.len()));
    }

    // https://tools.ietf.org/html/rfc3711#appendix-B.3
    // The input block for AES-CM is generated by exclusive-oring the master salt with the
    // concatenation of the encryption key label 0x00 with (index DIV kdr),
    // then padding on the right with two null octets
    let prf = Prf::new(master_key)?;
    let mut prf_in = [0u8; 16];
    prf_in[..master_salt.len()].copy_from_slice(master_salt);
    prf_in[7] ^= label;

    let mut out = Vec::with_capacity(out_len.div_ceil(16) * 16);
    let mut i: u16 = 0;
    while out.len() < out_len {
        prf_in[14..].copy_from_slice(&i.to_be_bytes());
        let mut block = prf_in;
        prf.encrypt_block(&mut block);
        out.extend_from_slice(&block);
        i = i.wrapping_add(1);
    }
    out.truncate(out_len);

    Ok(out)
}

/// Generate IV https://tools.ietf.org/html/rfc3711#section-4.1.1
/// where the 128-bit integer value IV SHALL be defined by the SSRC, the
/// SRTP packet index i, and the SRTP session salting key k_s, as below.
/// ROC = a 32-bit unsigned rollover counter (roc), which records how many
/// times the 16-bit RTP sequence number has been reset to zero after
/// passing through 65,535
/// ```nobuild
/// i = 2^16 * roc + SEQ
/// IV = (salt*2 ^ 16) | (ssrc*2 ^ 64) | (i*2 ^ 16)
/// ```
pub(crate) fn generate_counter(
    sequence_number: u16,
    rollover_counter: u32,
    ssrc: u32,
    session_salt: &[u8],
) -> [u8; 16] {
    let mut counter = [0u8; 16];

    counter[4..8].copy_from_slice(&ssrc.to_be_bytes());
    counter[8..12].copy_from_slice(&rollover_counter.to_be_bytes());
    counter[12..16].copy_from_slice(&((sequence_number as u32) << 16).to_be_bytes());

    for (c, s) in counter.iter_mut().zip(session_salt) {
        *c ^= *s;
    }

    counter
}

#[cfg(test)]
mod test {
    use super::*;

    // RFC 3711 appendix B.3
    const MASTER_KEY: [u8; 16] = [
        0xE1, 0xF9, 0x7A, 0x0D, 0x3E, 0x01, 0x8B, 0xE0, 0xD6, 0x4F, 0xA3, 0x2C, 0x06, 0xDE, 0x41,
        0x39,
    ];
    const MASTER_SALT: [u8; 14] = [
        0x0E, 0xC6, 0x75, 0xAD, 0x49, 0x8A, 0xFE, 0xEB, 0xB6, 0x96, 0x0B, 0x3A, 0xAB, 0xE6,
    ];

    #[test]
    fn test_valid_session_keys() -> Result<()> {
        let expected_session_key = vec![
            0xC6, 0x1E, 0x7A, 0x93, 0x74, 0x4F, 0x39, 0xEE, 0x10, 0x73, 0x4A, 0xFE, 0x3F, 0xF7,
            0xA0, 0x87,
        ];
        let expected_session_salt = vec![
            0x30, 0xCB, 0xBC, 0x08, 0x86, 0x3D, 0x8C, 0x85, 0xD4, 0x9D, 0xB3, 0x4A, 0x9A, 0xE1,
        ];
        let expected_session_auth_tag = vec![
            0xCE, 0xBE, 0x32, 0x1F, 0x6F, 0xF7, 0x71, 0x6B, 0x6F, 0xD4, 0xAB, 0x49, 0xAF, 0x25,
            0x6A, 0x15, 0x6D, 0x38, 0xBA, 0xA4,
        ];

        let session_key =
            aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &MASTER_KEY, &MASTER_SALT, 0, 16)?;
        assert_eq!(session_key, expected_session_key, "session key");

        let session_salt = aes_cm_key_derivation(LABEL_SRTP_SALT, &MASTER_KEY, &MASTER_SALT, 0, 14)?;
        assert_eq!(session_salt, expected_session_salt, "session salt");

        let session_auth_tag = aes_cm_key_derivation(
            LABEL_SRTP_AUTHENTICATION_TAG,
            &MASTER_KEY,
            &MASTER_SALT,
            0,
            20,
        )?;
        assert_eq!(session_auth_tag, expected_session_auth_tag, "auth key");

        Ok(())
    }

    #[test]
    fn test_rtcp_labels_differ() -> Result<()> {
        let rtp = aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &MASTER_KEY, &MASTER_SALT, 0, 16)?;
        let rtcp = aes_cm_key_derivation(LABEL_SRTCP_ENCRYPTION, &MASTER_KEY, &MASTER_SALT, 0, 16)?;
        assert_ne!(rtp, rtcp);
        Ok(())
    }

    #[test]
    fn test_non_zero_kdr_rejected() {
        let result = aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &MASTER_KEY, &MASTER_SALT, 1, 16);
        assert_eq!(result, Err(Error::ErrNonZeroKdrNotSupported));
    }

    #[test]
    fn test_bad_master_key_length() {
        let result = aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &MASTER_KEY[..15], &MASTER_SALT, 0, 16);
        assert_eq!(result, Err(Error::SrtpMasterKeyLength(16, 15)));
    }

    #[test]
    fn test_generate_counter() {
        let counter = generate_counter(32846, 0, 4160032510, &MASTER_SALT);
        assert_eq!(
            counter,
            [
                0x0E, 0xC6, 0x75, 0xAD, 0xBE, 0x7F, 0xF0, 0x15, 0xB6, 0x96, 0x0B, 0x3A, 0x2B,
                0xA8, 0x00, 0x00
            ]
        );
    }
}
