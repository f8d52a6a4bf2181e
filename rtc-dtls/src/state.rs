use std::fmt;

use shared::crypto::KeyingMaterialExporter;
use shared::error::*;

use crate::cipher_suite::*;
use crate::conn::INVALID_KEYING_LABELS;
use crate::curve::named_curve::*;
use crate::extension::extension_use_srtp::SrtpProtectionProfile;
use crate::handshake::handshake_random::*;
use crate::prf::*;

/// State holds the dtls connection state
#[derive(Default)]
pub struct State {
    pub(crate) local_epoch: u16,
    pub(crate) remote_epoch: u16,
    pub(crate) local_sequence_number: Vec<u64>, // uint48
    pub(crate) local_random: HandshakeRandom,
    pub(crate) remote_random: HandshakeRandom,
    pub(crate) master_secret: Vec<u8>,
    pub(crate) cipher_suite: Option<Box<dyn CipherSuite + Send + Sync>>, // nil if a cipher_suite hasn't been chosen

    pub(crate) srtp_protection_profile: SrtpProtectionProfile, // Negotiated srtp_protection_profile
    pub peer_certificates: Vec<Vec<u8>>,

    pub(crate) is_client: bool,

    pub(crate) pre_master_secret: Vec<u8>,
    pub(crate) extended_master_secret: bool,

    pub(crate) named_curve: NamedCurve,
    pub(crate) local_keypair: Option<NamedCurveKeypair>,
    pub(crate) cookie: Vec<u8>,
    pub(crate) handshake_send_sequence: isize,
    pub(crate) handshake_recv_sequence: isize,
    pub(crate) server_name: String,
    pub(crate) remote_requested_certificate: bool, // Did we get a CertificateRequest
    pub(crate) peer_certificates_verified: bool,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("local_epoch", &self.local_epoch)
            .field("remote_epoch", &self.remote_epoch)
            .field("is_client", &self.is_client)
            .field(
                "cipher_suite",
                &self.cipher_suite.as_ref().map(|cs| cs.id()),
            )
            .field("srtp_protection_profile", &self.srtp_protection_profile)
            .field("extended_master_secret", &self.extended_master_secret)
            .field("named_curve", &self.named_curve)
            .field("handshake_send_sequence", &self.handshake_send_sequence)
            .field("handshake_recv_sequence", &self.handshake_recv_sequence)
            .finish_non_exhaustive()
    }
}

impl State {
    pub(crate) fn new(is_client: bool) -> Self {
        State {
            is_client,
            local_sequence_number: vec![0],
            ..Default::default()
        }
    }

    pub fn is_client(&self) -> bool {
        self.is_client
    }

    pub fn cipher_suite(&self) -> Option<&(dyn CipherSuite + Send + Sync)> {
        self.cipher_suite.as_deref()
    }

    pub fn srtp_protection_profile(&self) -> SrtpProtectionProfile {
        self.srtp_protection_profile
    }

    pub fn extended_master_secret(&self) -> bool {
        self.extended_master_secret
    }

    pub(crate) fn init_cipher_suite(&mut self) -> Result<()> {
        if let Some(cipher_suite) = &mut self.cipher_suite {
            if cipher_suite.is_initialized() {
                return Ok(());
            }

            let local_random = self.local_random.marshal_fixed();
            let remote_random = self.remote_random.marshal_fixed();

            if self.is_client {
                cipher_suite.init(&self.master_secret, &local_random, &remote_random, true)
            } else {
                cipher_suite.init(&self.master_secret, &remote_random, &local_random, false)
            }
        } else {
            Err(Error::CipherSuiteUnset)
        }
    }
}

impl KeyingMaterialExporter for State {
    /// Derives keying material from the master secret as described in RFC 5705.
    fn export_keying_material(
        &self,
        label: &str,
        context: &[u8],
        length: usize,
    ) -> Result<Vec<u8>> {
        if self.local_epoch == 0 {
            return Err(Error::HandshakeInProgress);
        } else if !context.is_empty() {
            return Err(Error::ContextUnsupported);
        } else if INVALID_KEYING_LABELS.contains(&label) {
            return Err(Error::ReservedExportKeyingMaterial);
        }

        let local_random = self.local_random.marshal_fixed();
        let remote_random = self.remote_random.marshal_fixed();

        let mut seed = label.as_bytes().to_vec();
        if self.is_client {
            seed.extend_from_slice(&local_random);
            seed.extend_from_slice(&remote_random);
        } else {
            seed.extend_from_slice(&remote_random);
            seed.extend_from_slice(&local_random);
        }

        prf_p_hash(&self.master_secret, &seed, length)
    }
}
