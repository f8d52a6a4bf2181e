use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use shared::error::*;

use crate::content::ContentType;
use crate::record_layer::record_layer_header::*;

const CRYPTO_GCM_TAG_LENGTH: usize = 16;
const CRYPTO_GCM_NONCE_LENGTH: usize = 12;
const CRYPTO_GCM_EXPLICIT_NONCE_LENGTH: usize = 8;

/// AES-128-GCM record protection, https://tools.ietf.org/html/rfc5288
pub struct CryptoGcm {
    local_gcm: Aes128Gcm,
    remote_gcm: Aes128Gcm,
    local_write_iv: Vec<u8>,
    remote_write_iv: Vec<u8>,
}

impl CryptoGcm {
    pub fn new(
        local_key: &[u8],
        local_write_iv: &[u8],
        remote_key: &[u8],
        remote_write_iv: &[u8],
    ) -> Result<Self> {
        let local_gcm = Aes128Gcm::new_from_slice(local_key)
            .map_err(|e| Error::Other(e.to_string()))?;
        let remote_gcm = Aes128Gcm::new_from_slice(remote_key)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(CryptoGcm {
            local_gcm,
            remote_gcm,
            local_write_iv: local_write_iv.to_vec(),
            remote_write_iv: remote_write_iv.to_vec(),
        })
    }

    /// Encrypts a marshaled record. `raw` holds the 13 byte header followed by the plaintext.
    pub fn encrypt(&self, pkt_rlh: &RecordLayerHeader, raw: &[u8]) -> Result<Vec<u8>> {
        let payload = &raw[RECORD_LAYER_HEADER_SIZE..];
        let raw_header = &raw[..RECORD_LAYER_HEADER_SIZE];

        // the explicit nonce is the record's epoch and sequence number
        let mut explicit_nonce = [0u8; CRYPTO_GCM_EXPLICIT_NONCE_LENGTH];
        explicit_nonce[..2].copy_from_slice(&pkt_rlh.epoch.to_be_bytes());
        explicit_nonce[2..].copy_from_slice(&pkt_rlh.sequence_number.to_be_bytes()[2..]);

        let mut nonce = [0u8; CRYPTO_GCM_NONCE_LENGTH];
        nonce[..4].copy_from_slice(&self.local_write_iv[..4]);
        nonce[4..].copy_from_slice(&explicit_nonce);

        let additional_data = generate_aead_additional_data(pkt_rlh, payload.len());

        let buffer = self.local_gcm.encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: payload,
                aad: &additional_data,
            },
        )?;

        let mut r = Vec::with_capacity(raw_header.len() + explicit_nonce.len() + buffer.len());
        r.extend_from_slice(raw_header);
        r.extend_from_slice(&explicit_nonce);
        r.extend_from_slice(&buffer);

        // Update record layer size to include explicit nonce and tag
        let r_len = (r.len() - RECORD_LAYER_HEADER_SIZE) as u16;
        r[RECORD_LAYER_HEADER_SIZE - 2..RECORD_LAYER_HEADER_SIZE]
            .copy_from_slice(&r_len.to_be_bytes());

        Ok(r)
    }

    /// Decrypts a protected record, returning the header followed by the plaintext.
    pub fn decrypt(&self, r: &[u8]) -> Result<Vec<u8>> {
        let mut reader = r;
        let h = RecordLayerHeader::unmarshal(&mut reader)?;
        if h.content_type == ContentType::ChangeCipherSpec {
            // Nothing to encrypt with ChangeCipherSpec
            return Ok(r.to_vec());
        }

        if r.len()
            <= (RECORD_LAYER_HEADER_SIZE + CRYPTO_GCM_EXPLICIT_NONCE_LENGTH + CRYPTO_GCM_TAG_LENGTH)
        {
            return Err(Error::ErrNotEnoughRoomForNonce);
        }

        let mut nonce = [0u8; CRYPTO_GCM_NONCE_LENGTH];
        nonce[..4].copy_from_slice(&self.remote_write_iv[..4]);
        nonce[4..].copy_from_slice(
            &r[RECORD_LAYER_HEADER_SIZE..RECORD_LAYER_HEADER_SIZE + CRYPTO_GCM_EXPLICIT_NONCE_LENGTH],
        );

        let out = &r[RECORD_LAYER_HEADER_SIZE + CRYPTO_GCM_EXPLICIT_NONCE_LENGTH..];
        let additional_data =
            generate_aead_additional_data(&h, out.len() - CRYPTO_GCM_TAG_LENGTH);

        let buffer = self
            .remote_gcm
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: out,
                    aad: &additional_data,
                },
            )
            .map_err(|_| Error::ErrInvalidMac)?;

        let mut d = Vec::with_capacity(RECORD_LAYER_HEADER_SIZE + buffer.len());
        d.extend_from_slice(&r[..RECORD_LAYER_HEADER_SIZE]);
        d[RECORD_LAYER_HEADER_SIZE - 2..].copy_from_slice(&(buffer.len() as u16).to_be_bytes());
        d.extend_from_slice(&buffer);

        Ok(d)
    }
}

// seq_num(8) || type(1) || version(2) || length(2)
// https://tools.ietf.org/html/rfc5246#section-6.2.3.3
fn generate_aead_additional_data(h: &RecordLayerHeader, payload_len: usize) -> Vec<u8> {
    let mut additional_data = vec![0u8; 13];
    additional_data[..2].copy_from_slice(&h.epoch.to_be_bytes());
    additional_data[2..8].copy_from_slice(&h.sequence_number.to_be_bytes()[2..]);
    additional_data[8] = h.content_type as u8;
    additional_data[9] = h.protocol_version.major;
    additional_data[10] = h.protocol_version.minor;
    additional_data[11..].copy_from_slice(&(payload_len as u16).to_be_bytes());

    additional_data
}
