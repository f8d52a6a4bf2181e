use byteorder::{BigEndian, ByteOrder};
use bytes::BytesMut;
use shared::{
    error::{Error, Result},
    marshal::*,
};

use super::*;
use crate::key_derivation::SRTCP_INDEX_SIZE;

impl Context {
    /// DecryptRTCP decrypts a buffer that contains a RTCP packet
    pub fn decrypt_rtcp(&mut self, encrypted: &[u8]) -> Result<BytesMut> {
        let mut buf = encrypted;
        rtcp::header::Header::unmarshal(&mut buf)?;

        let min_len = rtcp::header::HEADER_LENGTH
            + rtcp::header::SSRC_LENGTH
            + SRTCP_INDEX_SIZE
            + self.cipher.rtcp_auth_tag_len()
            + self.cipher.aead_auth_tag_len();
        if encrypted.len() < min_len {
            return Err(Error::SrtcpTooSmall(encrypted.len(), min_len));
        }

        let index = self.cipher.get_rtcp_index(encrypted);
        let ssrc = BigEndian::read_u32(&encrypted[4..]);

        {
            let state = self.get_srtcp_ssrc_state(ssrc);
            if let Some(replay_detector) = &mut state.replay_detector {
                if !replay_detector.check(index as u64) {
                    return Err(Error::SrtcpSsrcDuplicated(ssrc, index));
                }
            }
        }

        let dst = self.cipher.decrypt_rtcp(encrypted, index, ssrc)?;

        let state = self.get_srtcp_ssrc_state(ssrc);
        if let Some(replay_detector) = &mut state.replay_detector {
            replay_detector.accept();
        }

        Ok(dst)
    }

    /// EncryptRTCP encrypts a buffer that contains a RTCP packet
    pub fn encrypt_rtcp(&mut self, decrypted: &[u8]) -> Result<BytesMut> {
        if decrypted.len() < rtcp::header::HEADER_LENGTH + rtcp::header::SSRC_LENGTH {
            return Err(Error::SrtcpTooSmall(
                decrypted.len(),
                rtcp::header::HEADER_LENGTH + rtcp::header::SSRC_LENGTH,
            ));
        }

        let mut buf = decrypted;
        rtcp::header::Header::unmarshal(&mut buf)?;

        let ssrc = BigEndian::read_u32(&decrypted[4..]);

        let index = {
            let state = self.get_srtcp_ssrc_state(ssrc);
            state.srtcp_index += 1;
            if state.srtcp_index > MAX_SRTCP_INDEX {
                log::warn!("srtcp index for ssrc {ssrc} wrapped around");
                state.srtcp_index = 0;
            }
            state.srtcp_index
        };

        self.cipher.encrypt_rtcp(decrypted, index, ssrc)
    }
}
