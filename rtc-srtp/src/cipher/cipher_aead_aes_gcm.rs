use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit, Nonce};
use byteorder::{BigEndian, ByteOrder};
use bytes::BytesMut;

use shared::{
    error::{Error, Result},
    marshal::MarshalSize,
};

use super::Cipher;
use super::cipher_aes_cm_hmac_sha1::RTCP_ENCRYPTION_OFFSET;
use crate::key_derivation::*;
use crate::protection_profile::ProtectionProfile;

const RTCP_ENCRYPTION_FLAG: u8 = 0x80;

enum GcmCipher {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl GcmCipher {
    fn new(key: &[u8]) -> Result<Self> {
        match key.len() {
            16 => Ok(GcmCipher::Aes128(Box::new(
                Aes128Gcm::new_from_slice(key).map_err(|e| Error::Other(e.to_string()))?,
            ))),
            32 => Ok(GcmCipher::Aes256(Box::new(
                Aes256Gcm::new_from_slice(key).map_err(|e| Error::Other(e.to_string()))?,
            ))),
            n => Err(Error::SrtpMasterKeyLength(16, n)),
        }
    }

    fn seal(&self, iv: &[u8; 12], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from_slice(iv);
        let payload = Payload { msg, aad };
        let sealed = match self {
            GcmCipher::Aes128(c) => c.encrypt(nonce, payload)?,
            GcmCipher::Aes256(c) => c.encrypt(nonce, payload)?,
        };
        Ok(sealed)
    }

    fn open(&self, iv: &[u8; 12], msg: &[u8], aad: &[u8]) -> Option<Vec<u8>> {
        let nonce = Nonce::from_slice(iv);
        let payload = Payload { msg, aad };
        match self {
            GcmCipher::Aes128(c) => c.decrypt(nonce, payload).ok(),
            GcmCipher::Aes256(c) => c.decrypt(nonce, payload).ok(),
        }
    }
}

/// AEAD Cipher based on AES-GCM (RFC 7714).
pub(crate) struct CipherAeadAesGcm {
    profile: ProtectionProfile,
    srtp_cipher: GcmCipher,
    srtcp_cipher: GcmCipher,
    srtp_session_salt: Vec<u8>,
    srtcp_session_salt: Vec<u8>,
}

impl CipherAeadAesGcm {
    /// Create a new AEAD instance.
    pub(crate) fn new(
        profile: ProtectionProfile,
        master_key: &[u8],
        master_salt: &[u8],
    ) -> Result<CipherAeadAesGcm> {
        let srtp_session_key = aes_cm_key_derivation(
            LABEL_SRTP_ENCRYPTION,
            master_key,
            master_salt,
            0,
            master_key.len(),
        )?;
        let srtcp_session_key = aes_cm_key_derivation(
            LABEL_SRTCP_ENCRYPTION,
            master_key,
            master_salt,
            0,
            master_key.len(),
        )?;

        let srtp_session_salt = aes_cm_key_derivation(
            LABEL_SRTP_SALT,
            master_key,
            master_salt,
            0,
            master_salt.len(),
        )?;
        let srtcp_session_salt = aes_cm_key_derivation(
            LABEL_SRTCP_SALT,
            master_key,
            master_salt,
            0,
            master_salt.len(),
        )?;

        Ok(CipherAeadAesGcm {
            profile,
            srtp_cipher: GcmCipher::new(&srtp_session_key)?,
            srtcp_cipher: GcmCipher::new(&srtcp_session_key)?,
            srtp_session_salt,
            srtcp_session_salt,
        })
    }

    /// The 12-octet IV used by AES-GCM SRTP is formed by first concatenating
    /// 2 octets of zeroes, the 4-octet SSRC, the 4-octet rollover counter
    /// (ROC), and the 2-octet sequence number (SEQ).  The resulting 12-octet
    /// value is then XORed to the 12-octet salt to form the 12-octet IV.
    ///
    /// https://tools.ietf.org/html/rfc7714#section-8.1
    pub(crate) fn rtp_initialization_vector(&self, header: &rtp::Header, roc: u32) -> [u8; 12] {
        let mut iv = [0u8; 12];
        BigEndian::write_u32(&mut iv[2..], header.ssrc);
        BigEndian::write_u32(&mut iv[6..], roc);
        BigEndian::write_u16(&mut iv[10..], header.sequence_number);

        for (i, v) in iv.iter_mut().enumerate() {
            *v ^= self.srtp_session_salt[i];
        }

        iv
    }

    /// The 12-octet IV used by AES-GCM SRTCP is formed by first
    /// concatenating 2 octets of zeroes, the 4-octet SSRC identifier,
    /// 2 octets of zeroes, a single "0" bit, and the 31-bit SRTCP Index.
    /// The resulting 12-octet value is then XORed to the 12-octet salt to
    /// form the 12-octet IV.
    ///
    /// https://tools.ietf.org/html/rfc7714#section-9.1
    pub(crate) fn rtcp_initialization_vector(&self, srtcp_index: usize, ssrc: u32) -> [u8; 12] {
        let mut iv = [0u8; 12];

        BigEndian::write_u32(&mut iv[2..], ssrc);
        BigEndian::write_u32(&mut iv[8..], srtcp_index as u32);

        for (i, v) in iv.iter_mut().enumerate() {
            *v ^= self.srtcp_session_salt[i];
        }

        iv
    }

    /// In an SRTCP packet, a 1-bit Encryption flag is prepended to the
    /// 31-bit SRTCP index to form a 32-bit value we shall call the
    /// "ESRTCP word"
    ///
    /// https://tools.ietf.org/html/rfc7714#section-17
    pub(crate) fn rtcp_additional_authenticated_data(
        &self,
        rtcp_packet: &[u8],
        srtcp_index: usize,
    ) -> [u8; 12] {
        let mut aad = [0u8; 12];

        aad[..RTCP_ENCRYPTION_OFFSET].copy_from_slice(&rtcp_packet[..RTCP_ENCRYPTION_OFFSET]);

        BigEndian::write_u32(&mut aad[8..12], srtcp_index as u32);

        aad[8] |= RTCP_ENCRYPTION_FLAG;
        aad
    }
}

impl Cipher for CipherAeadAesGcm {
    fn rtp_auth_tag_len(&self) -> usize {
        self.profile.rtp_auth_tag_len()
    }

    fn rtcp_auth_tag_len(&self) -> usize {
        self.profile.rtcp_auth_tag_len()
    }

    fn aead_auth_tag_len(&self) -> usize {
        self.profile.aead_auth_tag_len()
    }

    fn get_rtcp_index(&self, input: &[u8]) -> usize {
        let pos = input.len() - SRTCP_INDEX_SIZE;
        (BigEndian::read_u32(&input[pos..]) & !(1 << 31)) as usize
    }

    fn encrypt_rtp(
        &mut self,
        plaintext: &[u8],
        header: &rtp::Header,
        roc: u32,
    ) -> Result<BytesMut> {
        let header_len = header.marshal_size();
        let nonce = self.rtp_initialization_vector(header, roc);

        let encrypted = self.srtp_cipher.seal(
            &nonce,
            &plaintext[header_len..],
            &plaintext[..header_len],
        )?;

        let mut writer = BytesMut::with_capacity(header_len + encrypted.len());
        writer.extend_from_slice(&plaintext[..header_len]);
        writer.extend_from_slice(&encrypted);
        Ok(writer)
    }

    fn decrypt_rtp(
        &mut self,
        ciphertext: &[u8],
        header: &rtp::Header,
        roc: u32,
    ) -> Result<BytesMut> {
        let header_len = header.marshal_size();
        if ciphertext.len() < header_len + self.aead_auth_tag_len() {
            return Err(Error::SrtpTooSmall(
                ciphertext.len(),
                header_len + self.aead_auth_tag_len(),
            ));
        }

        let nonce = self.rtp_initialization_vector(header, roc);
        let decrypted = self
            .srtp_cipher
            .open(
                &nonce,
                &ciphertext[header_len..],
                &ciphertext[..header_len],
            )
            .ok_or(Error::RtpFailedToVerifyAuthTag)?;

        let mut writer = BytesMut::with_capacity(header_len + decrypted.len());
        writer.extend_from_slice(&ciphertext[..header_len]);
        writer.extend_from_slice(&decrypted);
        Ok(writer)
    }

    fn encrypt_rtcp(
        &mut self,
        decrypted: &[u8],
        srtcp_index: usize,
        ssrc: u32,
    ) -> Result<BytesMut> {
        let iv = self.rtcp_initialization_vector(srtcp_index, ssrc);
        let aad = self.rtcp_additional_authenticated_data(decrypted, srtcp_index);

        let encrypted_data =
            self.srtcp_cipher
                .seal(&iv, &decrypted[RTCP_ENCRYPTION_OFFSET..], &aad)?;

        let mut writer = BytesMut::with_capacity(
            RTCP_ENCRYPTION_OFFSET + encrypted_data.len() + SRTCP_INDEX_SIZE,
        );
        writer.extend_from_slice(&decrypted[..RTCP_ENCRYPTION_OFFSET]);
        writer.extend_from_slice(&encrypted_data);
        writer.extend_from_slice(&aad[8..]);
        Ok(writer)
    }

    fn decrypt_rtcp(
        &mut self,
        encrypted: &[u8],
        srtcp_index: usize,
        ssrc: u32,
    ) -> Result<BytesMut> {
        let min_len = RTCP_ENCRYPTION_OFFSET + self.aead_auth_tag_len() + SRTCP_INDEX_SIZE;
        if encrypted.len() < min_len {
            return Err(Error::SrtcpTooSmall(encrypted.len(), min_len));
        }

        let nonce = self.rtcp_initialization_vector(srtcp_index, ssrc);
        let aad_offset = encrypted.len() - SRTCP_INDEX_SIZE;
        let mut aad = [0u8; 12];
        aad[..RTCP_ENCRYPTION_OFFSET].copy_from_slice(&encrypted[..RTCP_ENCRYPTION_OFFSET]);
        aad[8..].copy_from_slice(&encrypted[aad_offset..]);

        let decrypted_data = self
            .srtcp_cipher
            .open(&nonce, &encrypted[RTCP_ENCRYPTION_OFFSET..aad_offset], &aad)
            .ok_or(Error::RtcpFailedToVerifyAuthTag)?;

        let mut writer = BytesMut::with_capacity(RTCP_ENCRYPTION_OFFSET + decrypted_data.len());
        writer.extend_from_slice(&encrypted[..RTCP_ENCRYPTION_OFFSET]);
        writer.extend_from_slice(&decrypted_data);
        Ok(writer)
    }
}
