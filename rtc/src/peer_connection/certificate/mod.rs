//! The X.509 identity a peer connection presents in the DTLS handshake.
//!
//! Its fingerprint travels in every local description as `a=fingerprint`,
//! and the remote side checks the certificate it receives against it.
//!
//! ```
//! use rtc::peer_connection::certificate::RTCCertificate;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let certificate = RTCCertificate::generate()?;
//! for fingerprint in certificate.get_fingerprints() {
//!     println!("a=fingerprint:{} {}", fingerprint.algorithm, fingerprint.value);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::{Duration, SystemTime};

use rcgen::KeyPair;
use shared::error::{Error, Result};
use shared::util::math_rand_alpha;

use crate::peer_connection::transport::dtls::fingerprint::{
    FINGERPRINT_ALGORITHM_SHA256, RTCDtlsFingerprint,
};

/// Validity of generated certificates.
const DEFAULT_CERTIFICATE_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// A certificate chain, its private key, and the time after which it must
/// not be used.
///
/// * [W3C RTCCertificate](https://w3c.github.io/webrtc-pc/#dom-rtccertificate)
#[derive(Clone, Debug)]
pub struct RTCCertificate {
    pub(crate) dtls_certificate: dtls::crypto::Certificate,
    pub(crate) expires: SystemTime,
}

impl PartialEq for RTCCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.dtls_certificate == other.dtls_certificate
    }
}

impl RTCCertificate {
    /// Generates a self-signed ECDSA P-256 certificate with a random
    /// common name, valid for 30 days.
    pub fn generate() -> Result<Self> {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?;
        Self::from_key_pair(key_pair)
    }

    /// Self-signs a certificate for an existing key pair. Only ECDSA P-256
    /// keys are accepted.
    pub fn from_key_pair(key_pair: KeyPair) -> Result<Self> {
        let dtls_certificate = dtls::crypto::Certificate::generate_self_signed_with_key_pair(
            vec![math_rand_alpha(16)],
            key_pair,
        )?;

        Ok(Self {
            dtls_certificate,
            expires: SystemTime::now() + DEFAULT_CERTIFICATE_LIFETIME,
        })
    }

    pub fn from_existing(dtls_certificate: dtls::crypto::Certificate, expires: SystemTime) -> Self {
        Self {
            dtls_certificate,
            expires,
        }
    }

    pub fn expires(&self) -> SystemTime {
        self.expires
    }

    pub(crate) fn is_expired(&self, now: SystemTime) -> bool {
        self.expires <= now
    }

    /// SHA-256 fingerprints of every certificate of the chain.
    pub fn get_fingerprints(&self) -> Vec<RTCDtlsFingerprint> {
        self.dtls_certificate
            .certificate
            .iter()
            .filter_map(|der| RTCDtlsFingerprint::from_der(FINGERPRINT_ALGORITHM_SHA256, der).ok())
            .collect()
    }

    /// The fingerprint announced in local descriptions.
    pub(crate) fn fingerprint(&self) -> Result<RTCDtlsFingerprint> {
        self.get_fingerprints()
            .into_iter()
            .next()
            .ok_or(Error::ErrFailedToGenerateCertificateFingerprint)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generate_certificate_ecdsa() -> Result<()> {
        let certificate = RTCCertificate::generate()?;
        assert_eq!(certificate.dtls_certificate.certificate.len(), 1);
        assert!(!certificate.is_expired(SystemTime::now()));
        Ok(())
    }

    #[test]
    fn test_generate_certificate_rejects_other_keys() {
        if let Ok(key_pair) = KeyPair::generate_for(&rcgen::PKCS_ED25519) {
            assert!(RTCCertificate::from_key_pair(key_pair).is_err());
        }
    }

    #[test]
    fn test_certificate_equal() -> Result<()> {
        let certificate1 = RTCCertificate::generate()?;
        let certificate2 = RTCCertificate::generate()?;

        assert_eq!(certificate1, certificate1.clone());
        assert_ne!(certificate1, certificate2);
        Ok(())
    }

    #[test]
    fn test_certificate_fingerprint() -> Result<()> {
        let certificate = RTCCertificate::generate()?;
        let fingerprint = certificate.fingerprint()?;

        assert_eq!(fingerprint.algorithm, "sha-256");
        assert_eq!(fingerprint.value.len(), 32 * 3 - 1);
        assert!(fingerprint.matches(&certificate.dtls_certificate.certificate[0])?);
        Ok(())
    }

    #[test]
    fn test_certificate_expiry() -> Result<()> {
        let certificate = RTCCertificate::generate()?;
        let expired = RTCCertificate::from_existing(
            certificate.dtls_certificate.clone(),
            SystemTime::now() - Duration::from_secs(1),
        );
        assert!(expired.is_expired(SystemTime::now()));
        Ok(())
    }
}
