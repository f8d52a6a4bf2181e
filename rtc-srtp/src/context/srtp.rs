use bytes::BytesMut;
use shared::{
    error::{Error, Result},
    marshal::*,
};

use super::*;

impl Context {
    /// Decrypts an SRTP packet whose header has already been parsed.
    pub fn decrypt_rtp_with_header(
        &mut self,
        encrypted: &[u8],
        header: &rtp::Header,
    ) -> Result<BytesMut> {
        let auth_tag_len = self.cipher.rtp_auth_tag_len() + self.cipher.aead_auth_tag_len();
        let min_len = header.marshal_size() + auth_tag_len;
        if encrypted.len() < min_len {
            return Err(Error::SrtpTooSmall(encrypted.len(), min_len));
        }

        let (roc, diff) = {
            let state = self.get_srtp_ssrc_state(header.ssrc);
            let (roc, diff, _) = state.next_rollover_count(header.sequence_number);
            if let Some(replay_detector) = &mut state.replay_detector {
                let index = ((roc as u64) << 16) | header.sequence_number as u64;
                if !replay_detector.check(index) {
                    return Err(Error::SrtpSsrcDuplicated(
                        header.ssrc,
                        header.sequence_number,
                    ));
                }
            }
            (roc, diff)
        };

        let dst = self.cipher.decrypt_rtp(encrypted, header, roc)?;

        let state = self.get_srtp_ssrc_state(header.ssrc);
        if let Some(replay_detector) = &mut state.replay_detector {
            replay_detector.accept();
        }
        state.update_rollover_count(header.sequence_number, diff);

        Ok(dst)
    }

    /// DecryptRTP decrypts a RTP packet with an encrypted payload
    pub fn decrypt_rtp(&mut self, encrypted: &[u8]) -> Result<BytesMut> {
        let mut buf = encrypted;
        let header = rtp::Header::unmarshal(&mut buf)?;
        self.decrypt_rtp_with_header(encrypted, &header)
    }

    /// Encrypts an RTP packet whose header has already been parsed.
    pub fn encrypt_rtp_with_header(
        &mut self,
        plaintext: &[u8],
        header: &rtp::Header,
    ) -> Result<BytesMut> {
        let roc = {
            let state = self.get_srtp_ssrc_state(header.ssrc);
            let (roc, diff, overflow) = state.next_rollover_count(header.sequence_number);
            if overflow {
                return Err(Error::OtherSrtpErr(
                    "exceeded the maximum number of packets".to_owned(),
                ));
            }
            state.update_rollover_count(header.sequence_number, diff);
            roc
        };

        self.cipher.encrypt_rtp(plaintext, header, roc)
    }

    /// EncryptRTP marshals and encrypts an RTP packet
    pub fn encrypt_rtp(&mut self, plaintext: &[u8]) -> Result<BytesMut> {
        let mut buf = plaintext;
        let header = rtp::Header::unmarshal(&mut buf)?;
        self.encrypt_rtp_with_header(plaintext, &header)
    }
}
