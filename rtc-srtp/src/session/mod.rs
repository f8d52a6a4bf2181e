
use bytes::BytesMut;
use shared::error::Result;

use crate::{config::*, context::Context, option::*, protection_profile::ProtectionProfile};

/// Replay window applied to the remote context when the config leaves it unset.
pub const DEFAULT_SESSION_SRTP_REPLAY_PROTECTION_WINDOW: usize = 64;
pub const DEFAULT_SESSION_SRTCP_REPLAY_PROTECTION_WINDOW: usize = 64;

fn new_contexts(
    keys: &SessionKeys,
    profile: ProtectionProfile,
    local_srtp: Option<ContextOption>,
    local_srtcp: Option<ContextOption>,
    remote_srtp: Option<ContextOption>,
    remote_srtcp: Option<ContextOption>,
) -> Result<(Context, Context)> {
    let local_context = Context::new(
        &keys.local_master_key,
        &keys.local_master_salt,
        profile,
        local_srtp,
        local_srtcp,
    )?;
    let remote_context = Context::new(
        &keys.remote_master_key,
        &keys.remote_master_salt,
        profile,
        remote_srtp,
        remote_srtcp,
    )?;
    Ok((local_context, remote_context))
}

/// SrtpSession protects outbound RTP with the local keys and unprotects
/// inbound RTP with the remote keys.
pub struct SrtpSession {
    local_context: Context,
    remote_context: Context,
}

impl SrtpSession {
    pub fn new(config: Config) -> Result<Self> {
        let remote_rtp_options = config.remote_rtp_options.unwrap_or_else(|| {
            srtp_replay_protection(DEFAULT_SESSION_SRTP_REPLAY_PROTECTION_WINDOW)
        });
        let (local_context, remote_context) = new_contexts(
            &config.keys,
            config.profile,
            config.local_rtp_options,
            None,
            Some(remote_rtp_options),
            None,
        )?;
        Ok(SrtpSession {
            local_context,
            remote_context,
        })
    }

    /// Encrypts a marshaled RTP packet.
    pub fn protect(&mut self, plaintext: &[u8]) -> Result<BytesMut> {
        self.local_context.encrypt_rtp(plaintext)
    }

    pub fn protect_with_header(
        &mut self,
        plaintext: &[u8],
        header: &rtp::Header,
    ) -> Result<BytesMut> {
        self.local_context.encrypt_rtp_with_header(plaintext, header)
    }

    /// Authenticates and decrypts an SRTP packet, rejecting replays.
    pub fn unprotect(&mut self, encrypted: &[u8]) -> Result<BytesMut> {
        self.remote_context.decrypt_rtp(encrypted)
    }

    pub fn local_roc(&self, ssrc: u32) -> Option<u32> {
        self.local_context.get_roc(ssrc)
    }

    pub fn remote_roc(&self, ssrc: u32) -> Option<u32> {
        self.remote_context.get_roc(ssrc)
    }

    pub fn set_remote_roc(&mut self, ssrc: u32, roc: u32) {
        self.remote_context.set_roc(ssrc, roc)
    }
}

/// SrtcpSession is the RTCP counterpart of [`SrtpSession`]. It derives its
/// keys from the same master key and salt under the RTCP labels.
pub struct SrtcpSession {
    local_context: Context,
    remote_context: Context,
}

impl SrtcpSession {
    pub fn new(config: Config) -> Result<Self> {
        let remote_rtcp_options = config.remote_rtcp_options.unwrap_or_else(|| {
            srtcp_replay_protection(DEFAULT_SESSION_SRTCP_REPLAY_PROTECTION_WINDOW)
        });
        let (local_context, remote_context) = new_contexts(
            &config.keys,
            config.profile,
            None,
            config.local_rtcp_options,
            None,
            Some(remote_rtcp_options),
        )?;
        Ok(SrtcpSession {
            local_context,
            remote_context,
        })
    }

    /// Encrypts a marshaled compound RTCP packet.
    pub fn protect(&mut self, plaintext: &[u8]) -> Result<BytesMut> {
        self.local_context.encrypt_rtcp(plaintext)
    }

    pub fn unprotect(&mut self, encrypted: &[u8]) -> Result<BytesMut> {
        self.remote_context.decrypt_rtcp(encrypted)
    }

    pub fn local_index(&self, ssrc: u32) -> Option<usize> {
        self.local_context.get_index(ssrc)
    }

    pub fn set_local_index(&mut self, ssrc: u32, index: usize) {
        self.local_context.set_index(ssrc, index)
    }
}
