use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use shared::error::{Error, Result};

pub(crate) const FINGERPRINT_ALGORITHM_SHA256: &str = "sha-256";
pub(crate) const FINGERPRINT_ALGORITHM_SHA384: &str = "sha-384";
pub(crate) const FINGERPRINT_ALGORITHM_SHA512: &str = "sha-512";

/// A certificate hash as carried by a=fingerprint (RFC 8122).
///
/// `value` is colon separated hex, upper case when produced locally.
/// Comparison ignores case.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCDtlsFingerprint {
    pub algorithm: String,
    pub value: String,
}

impl RTCDtlsFingerprint {
    /// Hashes a DER certificate with the named algorithm.
    pub(crate) fn from_der(algorithm: &str, der: &[u8]) -> Result<Self> {
        let algorithm = algorithm.to_lowercase();
        let digest = match algorithm.as_str() {
            FINGERPRINT_ALGORITHM_SHA256 => Sha256::digest(der).to_vec(),
            FINGERPRINT_ALGORITHM_SHA384 => Sha384::digest(der).to_vec(),
            FINGERPRINT_ALGORITHM_SHA512 => Sha512::digest(der).to_vec(),
            _ => return Err(Error::ErrUnsupportedFingerprintAlgorithm),
        };

        let value = digest
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":");

        Ok(Self { algorithm, value })
    }

    /// Whether `der` hashes to this fingerprint.
    pub(crate) fn matches(&self, der: &[u8]) -> Result<bool> {
        let computed = Self::from_der(&self.algorithm, der)?;
        Ok(computed.value.eq_ignore_ascii_case(&self.value))
    }
}

/// Checks the leaf certificate the peer presented against the fingerprints
/// of the remote description. Fingerprints with unknown algorithms are
/// skipped. Fails when none of the supported ones match.
pub(crate) fn verify_peer_fingerprint(
    remote_fingerprints: &[RTCDtlsFingerprint],
    peer_certificates: &[Vec<u8>],
) -> Result<()> {
    let Some(leaf) = peer_certificates.first() else {
        return Err(Error::ErrNoRemoteCertificate);
    };

    let mut supported = false;
    for fingerprint in remote_fingerprints {
        match fingerprint.matches(leaf) {
            Ok(true) => return Ok(()),
            Ok(false) => supported = true,
            Err(Error::ErrUnsupportedFingerprintAlgorithm) => continue,
            Err(err) => return Err(err),
        }
    }

    if supported || remote_fingerprints.is_empty() {
        Err(Error::ErrNoMatchingCertificateFingerprint)
    } else {
        Err(Error::ErrUnsupportedFingerprintAlgorithm)
    }
}
