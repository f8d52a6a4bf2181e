use std::sync::Arc;
use std::time::{Instant, SystemTime};

use bytes::BytesMut;
use dtls::config::{ClientAuthType, ConfigBuilder, ExtendedMasterSecretType};
use dtls::conn::DTLSConn;
use dtls::extension::extension_use_srtp::SrtpProtectionProfile;
use log::{debug, warn};
use shared::error::{Error, Result};
use srtp::option::{srtcp_replay_protection, srtp_replay_protection};
use srtp::protection_profile::ProtectionProfile;

use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::configuration::setting_engine::{
    DEFAULT_DTLS_HANDSHAKE_TIMEOUT, ReplayProtection, SettingEngine,
};
use crate::peer_connection::transport::dtls::fingerprint::{
    RTCDtlsFingerprint, verify_peer_fingerprint,
};
use crate::peer_connection::transport::dtls::parameters::DTLSParameters;
use crate::peer_connection::transport::dtls::role::{DEFAULT_DTLS_ROLE_ANSWER, RTCDtlsRole};
use crate::peer_connection::transport::dtls::state::RTCDtlsTransportState;
use crate::peer_connection::transport::ice::role::RTCIceRole;

pub mod fingerprint;
pub(crate) mod parameters;
pub mod role;
pub mod state;

const DEFAULT_SESSION_SRTP_REPLAY_PROTECTION_WINDOW: usize = 64;
const DEFAULT_SESSION_SRTCP_REPLAY_PROTECTION_WINDOW: usize = 64;

pub(crate) fn default_srtp_protection_profiles() -> Vec<SrtpProtectionProfile> {
    vec![
        SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm,
        SrtpProtectionProfile::Srtp_Aead_Aes_256_Gcm,
        SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80,
        SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_32,
    ]
}

/// The DTLS association RTP, RTCP and SCTP traffic is secured with.
///
/// It owns the handshake engine. Once the handshake completes the leaf
/// certificate of the peer is checked against the fingerprints of the
/// remote description before the transport reports Connected.
pub(crate) struct RTCDtlsTransport {
    state: RTCDtlsTransportState,
    role: RTCDtlsRole,
    certificates: Vec<RTCCertificate>,
    conn: Option<DTLSConn>,
    remote_fingerprints: Vec<RTCDtlsFingerprint>,

    answering_dtls_role: RTCDtlsRole,
    srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    replay_protection: ReplayProtection,
    handshake_timeout: std::time::Duration,
    disable_fingerprint_verification: bool,
}

impl RTCDtlsTransport {
    pub(crate) fn new(
        mut certificates: Vec<RTCCertificate>,
        setting_engine: &SettingEngine,
    ) -> Result<Self> {
        if certificates.is_empty() {
            certificates = vec![RTCCertificate::generate()?];
        } else {
            let now = SystemTime::now();
            if certificates.iter().any(|cert| cert.is_expired(now)) {
                return Err(Error::ErrCertificateExpired);
            }
        }

        Ok(Self {
            state: RTCDtlsTransportState::New,
            role: RTCDtlsRole::Auto,
            certificates,
            conn: None,
            remote_fingerprints: vec![],

            answering_dtls_role: setting_engine.answering_dtls_role,
            srtp_protection_profiles: if setting_engine.srtp_protection_profiles.is_empty() {
                default_srtp_protection_profiles()
            } else {
                setting_engine.srtp_protection_profiles.clone()
            },
            replay_protection: setting_engine.replay_protection,
            handshake_timeout: setting_engine
                .timeout
                .dtls_handshake_timeout
                .unwrap_or(DEFAULT_DTLS_HANDSHAKE_TIMEOUT),
            disable_fingerprint_verification: setting_engine
                .disable_certificate_fingerprint_verification,
        })
    }

    pub(crate) fn state(&self) -> RTCDtlsTransportState {
        self.state
    }

    pub(crate) fn role(&self) -> RTCDtlsRole {
        self.role
    }

    pub(crate) fn certificates(&self) -> &[RTCCertificate] {
        &self.certificates
    }

    /// The fingerprints announced in local descriptions.
    pub(crate) fn local_fingerprints(&self) -> Vec<RTCDtlsFingerprint> {
        self.certificates
            .iter()
            .flat_map(|cert| cert.get_fingerprints())
            .collect()
    }

    pub(crate) fn derive_role(
        &self,
        ice_role: RTCIceRole,
        remote_dtls_role: RTCDtlsRole,
    ) -> RTCDtlsRole {
        // An explicit remote role gets the opposite one.
        match remote_dtls_role {
            RTCDtlsRole::Client => return RTCDtlsRole::Server,
            RTCDtlsRole::Server => return RTCDtlsRole::Client,
            _ => {}
        };

        match self.answering_dtls_role {
            RTCDtlsRole::Server => return RTCDtlsRole::Server,
            RTCDtlsRole::Client => return RTCDtlsRole::Client,
            _ => {}
        };

        if ice_role == RTCIceRole::Controlling {
            return RTCDtlsRole::Server;
        }

        DEFAULT_DTLS_ROLE_ANSWER
    }

    /// Builds the handshake engine. The client sends its first flight right
    /// away, the server waits for it.
    pub(crate) fn start(
        &mut self,
        ice_role: RTCIceRole,
        remote_dtls_parameters: DTLSParameters,
        now: Instant,
    ) -> Result<()> {
        if self.state != RTCDtlsTransportState::New {
            return Err(Error::ErrInvalidDTLSStart);
        }

        self.role = self.derive_role(ice_role, remote_dtls_parameters.role);
        self.remote_fingerprints = remote_dtls_parameters.fingerprints;

        let certificates = self
            .certificates
            .iter()
            .map(|cert| cert.dtls_certificate.clone())
            .collect();

        let is_client = self.role == RTCDtlsRole::Client;
        let mut builder = ConfigBuilder::default()
            .with_certificates(certificates)
            .with_srtp_protection_profiles(self.srtp_protection_profiles.clone())
            .with_client_auth(ClientAuthType::RequireAnyClientCert)
            .with_insecure_skip_verify(true)
            .with_extended_master_secret(ExtendedMasterSecretType::Require)
            .with_handshake_timeout(self.handshake_timeout);
        if self.replay_protection.dtls != 0 {
            builder = builder.with_replay_protection_window(self.replay_protection.dtls);
        }
        let handshake_config = builder.build(is_client, None)?;

        let mut conn = DTLSConn::new(Arc::new(handshake_config), is_client, None);
        if is_client {
            conn.handshake(now)?;
        }

        debug!("dtls transport started as {}", self.role);
        self.conn = Some(conn);
        self.state = RTCDtlsTransportState::Connecting;

        Ok(())
    }

    /// Feeds a datagram to the handshake engine. Returns true when this
    /// datagram completed the handshake and the peer certificate passed
    /// verification.
    pub(crate) fn read(&mut self, now: Instant, datagram: &[u8]) -> Result<bool> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(Error::ErrDtlsTransportNotStarted);
        };

        let was_completed = conn.is_handshake_completed();
        let result = conn
            .read_and_buffer(datagram)
            .and_then(|_| conn.handshake(now));
        if let Err(err) = result {
            // a fatal alert leaves the handshake without a deadline
            if !conn.is_handshake_completed() && conn.poll_timeout().is_none() {
                self.state = RTCDtlsTransportState::Failed;
            }
            return Err(err);
        }

        if !was_completed && conn.is_handshake_completed() {
            self.on_handshake_completed()?;
            return Ok(true);
        }

        Ok(false)
    }

    fn on_handshake_completed(&mut self) -> Result<()> {
        if !self.disable_fingerprint_verification {
            let verified = match self.conn.as_ref() {
                Some(conn) => verify_peer_fingerprint(
                    &self.remote_fingerprints,
                    &conn.connection_state().peer_certificates,
                ),
                None => Err(Error::ErrDtlsTransportNotStarted),
            };
            if let Err(err) = verified {
                warn!("dtls peer certificate rejected: {err}");
                self.state = RTCDtlsTransportState::Failed;
                if let Some(conn) = self.conn.as_mut() {
                    conn.close();
                }
                return Err(err);
            }
        }

        self.state = RTCDtlsTransportState::Connected;
        Ok(())
    }

    pub(crate) fn poll_application_data(&mut self) -> Option<BytesMut> {
        self.conn.as_mut()?.incoming_application_data()
    }

    pub(crate) fn poll_transmit(&mut self) -> Option<BytesMut> {
        self.conn.as_mut()?.outgoing_raw_packet()
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> Result<()> {
        match self.conn.as_mut() {
            Some(conn) => conn.write(data),
            None => Err(Error::ErrDtlsTransportNotStarted),
        }
    }

    pub(crate) fn poll_timeout(&self) -> Option<Instant> {
        self.conn.as_ref()?.poll_timeout()
    }

    pub(crate) fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        let Some(conn) = self.conn.as_mut() else {
            return Ok(());
        };

        if let Err(err) = conn.handle_timeout(now) {
            self.state = RTCDtlsTransportState::Failed;
            return Err(err);
        }
        Ok(())
    }

    /// Derives the outbound and inbound SRTP contexts from the keying
    /// material of the completed handshake (RFC 5764).
    pub(crate) fn srtp_contexts(&self) -> Result<(srtp::context::Context, srtp::context::Context)> {
        if self.state != RTCDtlsTransportState::Connected {
            return Err(Error::ErrDtlsTransportNotStarted);
        }
        let Some(conn) = self.conn.as_ref() else {
            return Err(Error::ErrDtlsTransportNotStarted);
        };
        let state = conn.connection_state();

        let profile = match state.srtp_protection_profile() {
            SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm => ProtectionProfile::AeadAes128Gcm,
            SrtpProtectionProfile::Srtp_Aead_Aes_256_Gcm => ProtectionProfile::AeadAes256Gcm,
            SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80 => {
                ProtectionProfile::Aes128CmHmacSha1_80
            }
            SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_32 => {
                ProtectionProfile::Aes128CmHmacSha1_32
            }
            _ => return Err(Error::ErrNoSuchSrtpProfile),
        };

        let mut srtp_config = srtp::config::Config {
            profile,
            ..Default::default()
        };
        if self.replay_protection.srtp != 0 {
            srtp_config.remote_rtp_options =
                Some(srtp_replay_protection(self.replay_protection.srtp));
        }
        if self.replay_protection.srtcp != 0 {
            srtp_config.remote_rtcp_options =
                Some(srtcp_replay_protection(self.replay_protection.srtcp));
        }

        srtp_config.extract_session_keys_from_dtls(state, state.is_client())?;

        let local_context = srtp::context::Context::new(
            &srtp_config.keys.local_master_key,
            &srtp_config.keys.local_master_salt,
            srtp_config.profile,
            srtp_config.local_rtp_options,
            srtp_config.local_rtcp_options,
        )?;

        let remote_context = srtp::context::Context::new(
            &srtp_config.keys.remote_master_key,
            &srtp_config.keys.remote_master_salt,
            srtp_config.profile,
            Some(srtp_config.remote_rtp_options.unwrap_or_else(|| {
                srtp_replay_protection(DEFAULT_SESSION_SRTP_REPLAY_PROTECTION_WINDOW)
            })),
            Some(srtp_config.remote_rtcp_options.unwrap_or_else(|| {
                srtcp_replay_protection(DEFAULT_SESSION_SRTCP_REPLAY_PROTECTION_WINDOW)
            })),
        )?;

        Ok((local_context, remote_context))
    }

    /// Sends close_notify and moves to Closed. A failed transport stays
    /// Failed.
    pub(crate) fn stop(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.close();
        }
        if self.state != RTCDtlsTransportState::Failed {
            self.state = RTCDtlsTransportState::Closed;
        }
    }
}
