//! Implementation knobs that are not part of the W3C configuration.
//!
//! ```
//! use rtc::peer_connection::configuration::setting_engine::SettingEngine;
//! use std::time::Duration;
//!
//! let mut setting_engine = SettingEngine::default();
//! setting_engine.set_ice_timeouts(
//!     Some(Duration::from_secs(10)),
//!     Some(Duration::from_secs(30)),
//!     Some(Duration::from_secs(3)),
//! );
//! setting_engine.set_srtp_replay_protection_window(256);
//! ```


use std::time::Duration;

use dtls::extension::extension_use_srtp::SrtpProtectionProfile;
use shared::error::{Error, Result};

use crate::peer_connection::transport::dtls::role::RTCDtlsRole;
use crate::peer_connection::transport::ice::candidate_type::RTCIceCandidateType;

/// Equal to UDP MTU
pub(crate) const RECEIVE_MTU: usize = 1460;

pub(crate) const DEFAULT_ICE_CHECK_INTERVAL: Duration = Duration::from_millis(200);
pub(crate) const DEFAULT_DTLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// ICE timers. `None` keeps the agent default.
#[derive(Default, Clone, Debug)]
pub struct Timeout {
    /// Without inbound traffic for this long the connection is Disconnected. 30 s.
    pub ice_disconnected_timeout: Option<Duration>,
    /// Disconnected for this long means Failed. 25 s.
    pub ice_failed_timeout: Option<Duration>,
    /// Binding requests are sent this often on a quiet selected pair. 15 s.
    pub ice_keepalive_interval: Option<Duration>,
    /// Pacing of connectivity checks. 200 ms.
    pub ice_check_interval: Option<Duration>,
    pub ice_host_acceptance_min_wait: Option<Duration>,
    pub ice_srflx_acceptance_min_wait: Option<Duration>,
    pub ice_prflx_acceptance_min_wait: Option<Duration>,
    pub ice_relay_acceptance_min_wait: Option<Duration>,
    /// Upper bound of the DTLS handshake. 30 s.
    pub dtls_handshake_timeout: Option<Duration>,
}

#[derive(Default, Clone, Debug)]
pub struct Candidates {
    pub ice_lite: bool,
    /// Public addresses announced instead of (host) or next to (srflx) the
    /// private ones.
    pub nat_1to1_ips: Vec<String>,
    pub nat_1to1_ip_candidate_type: RTCIceCandidateType,
    /// Fixed local credentials; generated when empty.
    pub username_fragment: String,
    pub password: String,
    /// Drop gathered local candidates on ICE restart instead of reusing them.
    pub discard_local_candidates_during_ice_restart: bool,
}

/// Anti-replay window sizes. 0 keeps the default of each layer.
#[derive(Default, Copy, Clone, Debug)]
pub struct ReplayProtection {
    pub dtls: usize,
    pub srtp: usize,
    pub srtcp: usize,
}

/// Largest data channel message this endpoint accepts, announced as
/// `a=max-message-size`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SctpMaxMessageSize {
    Bounded(u32),
    Unbounded,
}

impl SctpMaxMessageSize {
    /// RFC 8841: the value assumed when `max-message-size` is absent.
    pub const DEFAULT_MESSAGE_SIZE: u32 = 65536;
    pub const MAX_MESSAGE_SIZE: u32 = 262144;

    pub fn as_u32(&self) -> u32 {
        match self {
            Self::Bounded(result) => *result,
            Self::Unbounded => Self::MAX_MESSAGE_SIZE,
        }
    }

    /// Value of the SDP attribute, where 0 means unlimited.
    pub(crate) fn sdp_value(&self) -> u32 {
        match self {
            Self::Bounded(result) => *result,
            Self::Unbounded => 0,
        }
    }
}

impl Default for SctpMaxMessageSize {
    fn default() -> Self {
        Self::Bounded(Self::DEFAULT_MESSAGE_SIZE)
    }
}

/// SettingEngine tunes transport behavior beyond [`RTCConfiguration`](super::RTCConfiguration).
/// It is copied into every peer connection built from the configuration.
#[derive(Default, Clone, Debug)]
pub struct SettingEngine {
    pub(crate) timeout: Timeout,
    pub(crate) candidates: Candidates,
    pub(crate) replay_protection: ReplayProtection,
    pub(crate) answering_dtls_role: RTCDtlsRole,
    pub(crate) disable_certificate_fingerprint_verification: bool,
    pub(crate) disable_media_engine_multiple_codecs: bool,
    pub(crate) srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    pub(crate) receive_mtu: usize,
    pub(crate) sctp_max_message_size: SctpMaxMessageSize,
}

impl SettingEngine {
    pub(crate) fn get_receive_mtu(&self) -> usize {
        if self.receive_mtu != 0 {
            self.receive_mtu
        } else {
            RECEIVE_MTU
        }
    }

    /// Restricts the profiles offered in the DTLS `use_srtp` extension, in
    /// preference order. All four profiles are offered by default.
    pub fn set_srtp_protection_profiles(&mut self, profiles: Vec<SrtpProtectionProfile>) {
        self.srtp_protection_profiles = profiles
    }

    pub fn set_ice_timeouts(
        &mut self,
        disconnected_timeout: Option<Duration>,
        failed_timeout: Option<Duration>,
        keep_alive_interval: Option<Duration>,
    ) {
        self.timeout.ice_disconnected_timeout = disconnected_timeout;
        self.timeout.ice_failed_timeout = failed_timeout;
        self.timeout.ice_keepalive_interval = keep_alive_interval;
    }

    pub fn set_ice_check_interval(&mut self, interval: Option<Duration>) {
        self.timeout.ice_check_interval = interval;
    }

    pub fn set_host_acceptance_min_wait(&mut self, t: Option<Duration>) {
        self.timeout.ice_host_acceptance_min_wait = t;
    }

    pub fn set_srflx_acceptance_min_wait(&mut self, t: Option<Duration>) {
        self.timeout.ice_srflx_acceptance_min_wait = t;
    }

    pub fn set_prflx_acceptance_min_wait(&mut self, t: Option<Duration>) {
        self.timeout.ice_prflx_acceptance_min_wait = t;
    }

    pub fn set_relay_acceptance_min_wait(&mut self, t: Option<Duration>) {
        self.timeout.ice_relay_acceptance_min_wait = t;
    }

    pub fn set_dtls_handshake_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout.dtls_handshake_timeout = timeout;
    }

    /// ICE lite: only host candidates, never controlling, answers checks
    /// without sending its own.
    pub fn set_lite(&mut self, lite: bool) {
        self.candidates.ice_lite = lite;
    }

    /// With [`RTCIceCandidateType::Host`] the host candidates are announced
    /// with the public address. With [`RTCIceCandidateType::Srflx`] a server
    /// reflexive candidate is announced next to every host candidate.
    pub fn set_nat_1to1_ips(&mut self, ips: Vec<String>, candidate_type: RTCIceCandidateType) {
        self.candidates.nat_1to1_ips = ips;
        self.candidates.nat_1to1_ip_candidate_type = candidate_type;
    }

    /// DTLS role taken when answering an offer with `a=setup:actpass`.
    pub fn set_answering_dtls_role(&mut self, role: RTCDtlsRole) -> Result<()> {
        if role != RTCDtlsRole::Client && role != RTCDtlsRole::Server {
            return Err(Error::ErrSettingEngineSetAnsweringDTLSRole);
        }

        self.answering_dtls_role = role;
        Ok(())
    }

    pub fn set_ice_credentials(&mut self, username_fragment: String, password: String) {
        self.candidates.username_fragment = username_fragment;
        self.candidates.password = password;
    }

    pub fn set_discard_local_candidates_during_ice_restart(&mut self, discard: bool) {
        self.candidates.discard_local_candidates_during_ice_restart = discard;
    }

    /// Skips matching the peer certificate against `a=fingerprint`. Only
    /// for testing.
    pub fn disable_certificate_fingerprint_verification(&mut self, is_disabled: bool) {
        self.disable_certificate_fingerprint_verification = is_disabled;
    }

    pub fn set_dtls_replay_protection_window(&mut self, n: usize) {
        self.replay_protection.dtls = n;
    }

    pub fn set_srtp_replay_protection_window(&mut self, n: usize) {
        self.replay_protection.srtp = n;
    }

    pub fn set_srtcp_replay_protection_window(&mut self, n: usize) {
        self.replay_protection.srtcp = n;
    }

    /// Only negotiate the first matching codec of every media section.
    pub fn disable_media_engine_multiple_codecs(&mut self, is_disabled: bool) {
        self.disable_media_engine_multiple_codecs = is_disabled;
    }

    /// Largest datagram expected from the network. Used as the SCTP and DTLS
    /// MTU bound.
    pub fn set_receive_mtu(&mut self, receive_mtu: usize) {
        self.receive_mtu = receive_mtu;
    }

    pub fn set_sctp_max_message_size(&mut self, max_message_size: SctpMaxMessageSize) {
        self.sctp_max_message_size = max_message_size;
    }
}
