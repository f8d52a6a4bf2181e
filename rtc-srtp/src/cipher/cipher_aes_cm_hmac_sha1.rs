use aes::cipher::{KeyIvInit, StreamCipher};
use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use shared::{
    error::{Error, Result},
    marshal::MarshalSize,
};

use super::Cipher;
use crate::key_derivation::*;
use crate::protection_profile::*;

type HmacSha1 = Hmac<Sha1>;
type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// RTCP header (4 bytes) plus the sender SSRC, sent in the clear.
pub(crate) const RTCP_ENCRYPTION_OFFSET: usize = 8;

pub(crate) struct CipherAesCmHmacSha1 {
    profile: ProtectionProfile,

    srtp_session_key: Vec<u8>,
    srtp_session_salt: Vec<u8>,
    srtp_session_auth: HmacSha1,

    srtcp_session_key: Vec<u8>,
    srtcp_session_salt: Vec<u8>,
    srtcp_session_auth: HmacSha1,
}

impl CipherAesCmHmacSha1 {
    pub(crate) fn new(
        profile: ProtectionProfile,
        master_key: &[u8],
        master_salt: &[u8],
    ) -> Result<Self> {
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

        let auth_key_len = profile.auth_key_len();

        let srtp_session_auth_tag = aes_cm_key_derivation(
            LABEL_SRTP_AUTHENTICATION_TAG,
            master_key,
            master_salt,
            0,
            auth_key_len,
        )?;
        let srtcp_session_auth_tag = aes_cm_key_derivation(
            LABEL_SRTCP_AUTHENTICATION_TAG,
            master_key,
            master_salt,
            0,
            auth_key_len,
        )?;

        let srtp_session_auth = HmacSha1::new_from_slice(&srtp_session_auth_tag)
            .map_err(|e| Error::Other(e.to_string()))?;
        let srtcp_session_auth = HmacSha1::new_from_slice(&srtcp_session_auth_tag)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(CipherAesCmHmacSha1 {
            profile,
            srtp_session_key,
            srtp_session_salt,
            srtp_session_auth,
            srtcp_session_key,
            srtcp_session_salt,
            srtcp_session_auth,
        })
    }

    /// https://tools.ietf.org/html/rfc3711#section-4.2
    /// In the case of SRTP, M SHALL consist of the Authenticated
    /// Portion of the packet (as specified in Figure 1) concatenated with
    /// the roc, M = Authenticated Portion || roc;
    ///
    /// The pre-defined authentication transform for SRTP is HMAC-SHA1
    /// [RFC2104].  With HMAC-SHA1, the SRTP_PREFIX_LENGTH (Figure 3) SHALL
    /// be 0.  For SRTP (respectively SRTCP), the HMAC SHALL be applied to
    /// the session authentication key and M as specified above, i.e.,
    /// HMAC(k_a, M).  The HMAC output SHALL then be truncated to the n_tag
    /// left-most bits.
    /// - Authenticated portion of the packet is everything BEFORE MKI
    /// - k_a is the session message authentication key
    /// - n_tag is the bit-length of the output authentication tag
    fn generate_srtp_auth_tag(&self, buf: &[u8], roc: u32) -> [u8; 20] {
        let mut signer = self.srtp_session_auth.clone();

        signer.update(buf);

        // For SRTP only, we need to hash the rollover counter as well.
        signer.update(&roc.to_be_bytes());

        let code = signer.finalize().into_bytes();
        let mut tag = [0u8; 20];
        tag.copy_from_slice(&code);
        tag
    }

    /// https://tools.ietf.org/html/rfc3711#section-4.2
    ///
    /// The HMAC SHALL be applied to the session authentication key and M, where for
    /// SRTCP M is the authenticated portion of the packet including the
    /// E flag and SRTCP index.
    fn generate_srtcp_auth_tag(&self, buf: &[u8]) -> [u8; 20] {
        let mut signer = self.srtcp_session_auth.clone();

        signer.update(buf);

        let code = signer.finalize().into_bytes();
        let mut tag = [0u8; 20];
        tag.copy_from_slice(&code);
        tag
    }

    fn apply_keystream(key: &[u8], counter: &[u8; 16], buf: &mut [u8]) -> Result<()> {
        let mut stream =
            Aes128Ctr::new_from_slices(key, counter).map_err(|e| Error::Other(e.to_string()))?;
        stream.apply_keystream(buf);
        Ok(())
    }
}

impl Cipher for CipherAesCmHmacSha1 {
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
        let tail_offset = input.len() - (self.rtcp_auth_tag_len() + SRTCP_INDEX_SIZE);
        (BigEndian::read_u32(&input[tail_offset..tail_offset + SRTCP_INDEX_SIZE]) & !(1 << 31))
            as usize
    }

    fn encrypt_rtp(
        &mut self,
        plaintext: &[u8],
        header: &rtp::Header,
        roc: u32,
    ) -> Result<BytesMut> {
        let header_len = header.marshal_size();
        let mut writer = BytesMut::with_capacity(plaintext.len() + self.rtp_auth_tag_len());

        // Copy the header unencrypted.
        writer.extend_from_slice(plaintext);

        // Encrypt the payload
        let counter = generate_counter(
            header.sequence_number,
            roc,
            header.ssrc,
            &self.srtp_session_salt,
        );
        Self::apply_keystream(&self.srtp_session_key, &counter, &mut writer[header_len..])?;

        // Generate the auth tag.
        let auth_tag = &self.generate_srtp_auth_tag(&writer, roc)[..self.rtp_auth_tag_len()];
        writer.extend_from_slice(auth_tag);

        Ok(writer)
    }

    fn decrypt_rtp(
        &mut self,
        encrypted: &[u8],
        header: &rtp::Header,
        roc: u32,
    ) -> Result<BytesMut> {
        let encrypted_len = encrypted.len();
        let header_len = header.marshal_size();
        let auth_tag_len = self.rtp_auth_tag_len();
        if encrypted_len < header_len + auth_tag_len {
            return Err(Error::SrtpTooSmall(encrypted_len, header_len + auth_tag_len));
        }

        // Split the auth tag and the cipher text into two parts.
        let actual_tag = &encrypted[encrypted_len - auth_tag_len..];
        let cipher_text = &encrypted[..encrypted_len - auth_tag_len];

        // Generate the auth tag we expect to see from the ciphertext.
        let expected_tag = &self.generate_srtp_auth_tag(cipher_text, roc)[..auth_tag_len];

        // See if the auth tag actually matches.
        // We use a constant time comparison to prevent timing attacks.
        if actual_tag.ct_eq(expected_tag).unwrap_u8() != 1 {
            return Err(Error::RtpFailedToVerifyAuthTag);
        }

        let mut writer = BytesMut::from(cipher_text);

        // Decrypt the ciphertext for the payload.
        let counter = generate_counter(
            header.sequence_number,
            roc,
            header.ssrc,
            &self.srtp_session_salt,
        );
        Self::apply_keystream(&self.srtp_session_key, &counter, &mut writer[header_len..])?;

        Ok(writer)
    }

    fn encrypt_rtcp(
        &mut self,
        decrypted: &[u8],
        srtcp_index: usize,
        ssrc: u32,
    ) -> Result<BytesMut> {
        let mut writer = BytesMut::with_capacity(
            decrypted.len() + SRTCP_INDEX_SIZE + self.rtcp_auth_tag_len(),
        );

        // Write the decrypted to the destination buffer.
        writer.extend_from_slice(decrypted);

        // Encrypt everything after header
        let counter = generate_counter(
            (srtcp_index & 0xFFFF) as u16,
            (srtcp_index >> 16) as u32,
            ssrc,
            &self.srtcp_session_salt,
        );
        Self::apply_keystream(
            &self.srtcp_session_key,
            &counter,
            &mut writer[RTCP_ENCRYPTION_OFFSET..],
        )?;

        // Add SRTCP index and set Encryption bit
        writer.put_u32(srtcp_index as u32 | (1u32 << 31));

        // Generate the auth tag.
        let auth_tag = &self.generate_srtcp_auth_tag(&writer)[..self.rtcp_auth_tag_len()];
        writer.extend_from_slice(auth_tag);

        Ok(writer)
    }

    fn decrypt_rtcp(
        &mut self,
        encrypted: &[u8],
        srtcp_index: usize,
        ssrc: u32,
    ) -> Result<BytesMut> {
        let encrypted_len = encrypted.len();
        let auth_tag_len = self.rtcp_auth_tag_len();
        let min_len = RTCP_ENCRYPTION_OFFSET + SRTCP_INDEX_SIZE + auth_tag_len;
        if encrypted_len < min_len {
            return Err(Error::SrtcpTooSmall(encrypted_len, min_len));
        }

        let tail_offset = encrypted_len - (auth_tag_len + SRTCP_INDEX_SIZE);

        // Split the auth tag and the cipher text into two parts.
        let actual_tag = &encrypted[encrypted_len - auth_tag_len..];
        if actual_tag.len() != auth_tag_len {
            return Err(Error::RtcpInvalidLengthAuthTag(actual_tag.len(), auth_tag_len));
        }

        let cipher_text = &encrypted[..encrypted_len - auth_tag_len];

        // Generate the auth tag we expect to see from the ciphertext.
        let expected_tag = &self.generate_srtcp_auth_tag(cipher_text)[..auth_tag_len];

        // See if the auth tag actually matches.
        // We use a constant time comparison to prevent timing attacks.
        if actual_tag.ct_eq(expected_tag).unwrap_u8() != 1 {
            return Err(Error::RtcpFailedToVerifyAuthTag);
        }

        let mut writer = BytesMut::from(&encrypted[..tail_offset]);

        let is_encrypted = encrypted[tail_offset] >> 7;
        if is_encrypted == 0 {
            return Ok(writer);
        }

        let counter = generate_counter(
            (srtcp_index & 0xFFFF) as u16,
            (srtcp_index >> 16) as u32,
            ssrc,
            &self.srtcp_session_salt,
        );
        Self::apply_keystream(
            &self.srtcp_session_key,
            &counter,
            &mut writer[RTCP_ENCRYPTION_OFFSET..],
        )?;

        Ok(writer)
    }
}
