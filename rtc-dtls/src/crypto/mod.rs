#[cfg(test)]
mod crypto_test;

pub mod crypto_gcm;

use std::sync::Arc;

use rcgen::{CertificateParams, KeyPair};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, UnparsedPublicKey, VerificationAlgorithm};
use shared::error::*;

use crate::curve::named_curve::*;
use crate::signature_hash_algorithm::HashAlgorithm;

/// A certificate chain in DER form together with the private key of its leaf.
#[derive(Clone, PartialEq, Debug)]
pub struct Certificate {
    pub certificate: Vec<Vec<u8>>,
    pub private_key: CryptoPrivateKey,
}

impl Certificate {
    /// Generates a self-signed ECDSA P-256 certificate for the given subject alt names.
    pub fn generate_self_signed(subject_alt_names: impl Into<Vec<String>>) -> Result<Self> {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?;
        Self::generate_self_signed_with_key_pair(subject_alt_names, key_pair)
    }

    pub fn generate_self_signed_with_key_pair(
        subject_alt_names: impl Into<Vec<String>>,
        key_pair: KeyPair,
    ) -> Result<Self> {
        if !key_pair.is_compatible(&rcgen::PKCS_ECDSA_P256_SHA256) {
            return Err(Error::ErrInvalidPrivateKey);
        }

        let params = CertificateParams::new(subject_alt_names)?;
        let x509_cert = params.self_signed(&key_pair)?;
        let private_key = CryptoPrivateKey::from_key_pair(&key_pair)?;

        Ok(Certificate {
            certificate: vec![x509_cert.der().to_vec()],
            private_key,
        })
    }
}

/// Key material usable for signing ServerKeyExchange and CertificateVerify.
#[derive(Clone, Debug)]
pub enum CryptoPrivateKeyKind {
    Ecdsa256(Arc<EcdsaKeyPair>),
}

#[derive(Clone, Debug)]
pub struct CryptoPrivateKey {
    pub kind: CryptoPrivateKeyKind,
    pub serialized_der: Vec<u8>,
}

impl PartialEq for CryptoPrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.serialized_der == other.serialized_der
    }
}

impl CryptoPrivateKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Result<Self> {
        let serialized_der = key_pair.serialize_der();
        if key_pair.is_compatible(&rcgen::PKCS_ECDSA_P256_SHA256) {
            Self::from_pkcs8_ecdsa_p256(serialized_der)
        } else {
            Err(Error::ErrInvalidPrivateKey)
        }
    }

    pub fn from_pkcs8_ecdsa_p256(serialized_der: Vec<u8>) -> Result<Self> {
        let key_pair = EcdsaKeyPair::from_pkcs8(
            &ring::signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            &serialized_der,
            &SystemRandom::new(),
        )
        .map_err(|e| Error::Other(e.to_string()))?;

        Ok(CryptoPrivateKey {
            kind: CryptoPrivateKeyKind::Ecdsa256(Arc::new(key_pair)),
            serialized_der,
        })
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match &self.kind {
            CryptoPrivateKeyKind::Ecdsa256(kp) => {
                let rng = SystemRandom::new();
                let signature = kp
                    .sign(&rng, message)
                    .map_err(|e| Error::Other(e.to_string()))?;
                Ok(signature.as_ref().to_vec())
            }
        }
    }
}

// The message signed in ServerKeyExchange:
// client_random || server_random || ECParameters || ECPoint
// https://tools.ietf.org/html/rfc4492#section-5.4
fn value_key_message(
    client_random: &[u8],
    server_random: &[u8],
    public_key: &[u8],
    named_curve: NamedCurve,
) -> Vec<u8> {
    let mut server_ecdh_params = vec![0u8; 4];
    server_ecdh_params[0] = 3; // named curve
    server_ecdh_params[1..3].copy_from_slice(&(named_curve as u16).to_be_bytes());
    server_ecdh_params[3] = public_key.len() as u8;

    let mut plaintext = vec![];
    plaintext.extend_from_slice(client_random);
    plaintext.extend_from_slice(server_random);
    plaintext.extend_from_slice(&server_ecdh_params);
    plaintext.extend_from_slice(public_key);

    plaintext
}

pub(crate) fn generate_key_signature(
    client_random: &[u8],
    server_random: &[u8],
    public_key: &[u8],
    named_curve: NamedCurve,
    private_key: &CryptoPrivateKey,
) -> Result<Vec<u8>> {
    let msg = value_key_message(client_random, server_random, public_key, named_curve);
    private_key.sign(&msg)
}

pub(crate) fn verify_key_signature(
    client_random: &[u8],
    server_random: &[u8],
    public_key: &[u8],
    named_curve: NamedCurve,
    hash_algorithm: HashAlgorithm,
    remote_key_signature: &[u8],
    raw_certificates: &[Vec<u8>],
) -> Result<()> {
    let msg = value_key_message(client_random, server_random, public_key, named_curve);
    verify_signature(&msg, hash_algorithm, remote_key_signature, raw_certificates)
}

// If the server has sent a CertificateRequest message, the client MUST send the Certificate
// message. The CertificateVerify signs every handshake message sent and received so far.
// https://tools.ietf.org/html/rfc5246#section-7.4.8
pub(crate) fn generate_certificate_verify(
    handshake_bodies: &[u8],
    private_key: &CryptoPrivateKey,
) -> Result<Vec<u8>> {
    private_key.sign(handshake_bodies)
}

pub(crate) fn verify_certificate_verify(
    handshake_bodies: &[u8],
    hash_algorithm: HashAlgorithm,
    remote_key_signature: &[u8],
    raw_certificates: &[Vec<u8>],
) -> Result<()> {
    verify_signature(
        handshake_bodies,
        hash_algorithm,
        remote_key_signature,
        raw_certificates,
    )
}

fn verify_signature(
    message: &[u8],
    hash_algorithm: HashAlgorithm,
    remote_signature: &[u8],
    raw_certificates: &[Vec<u8>],
) -> Result<()> {
    if raw_certificates.is_empty() {
        return Err(Error::ErrLengthMismatch);
    }

    let (_, certificate) = x509_parser::parse_x509_certificate(&raw_certificates[0])
        .map_err(|_| Error::ErrInvalidCertificate)?;
    let public_key = certificate.public_key().subject_public_key.data.as_ref();

    // uncompressed SEC1 points: 65 bytes for P-256, 97 bytes for P-384
    let algorithm: &'static dyn VerificationAlgorithm = match (public_key.len(), hash_algorithm)
    {
        (65, HashAlgorithm::Sha256) => &ring::signature::ECDSA_P256_SHA256_ASN1,
        (65, HashAlgorithm::Sha384) => &ring::signature::ECDSA_P256_SHA384_ASN1,
        (97, HashAlgorithm::Sha256) => &ring::signature::ECDSA_P384_SHA256_ASN1,
        (97, HashAlgorithm::Sha384) => &ring::signature::ECDSA_P384_SHA384_ASN1,
        (65 | 97, _) => return Err(Error::ErrInvalidHashAlgorithm),
        _ => return Err(Error::ErrInvalidCertificate),
    };

    UnparsedPublicKey::new(algorithm, public_key)
        .verify(message, remote_signature)
        .map_err(|_| Error::ErrKeySignatureMismatch)
}

/// Checks that every certificate in the chain parses and is inside its validity period.
pub(crate) fn verify_certificate_validity(raw_certificates: &[Vec<u8>]) -> Result<()> {
    if raw_certificates.is_empty() {
        return Err(Error::ErrNoRemoteCertificate);
    }

    for raw in raw_certificates {
        let (_, certificate) =
            x509_parser::parse_x509_certificate(raw).map_err(|_| Error::ErrInvalidCertificate)?;
        if !certificate.validity().is_valid() {
            return Err(Error::ErrInvalidCertificate);
        }
    }

    Ok(())
}

/// Names a certificate can be selected by: the subject common names and DNS alt names.
pub(crate) fn certificate_dns_names(raw_certificate: &[u8]) -> Vec<String> {
    let mut names = vec![];
    let Ok((_, certificate)) = x509_parser::parse_x509_certificate(raw_certificate) else {
        return names;
    };

    for cn in certificate.subject().iter_common_name() {
        if let Ok(cn) = cn.as_str() {
            names.push(cn.to_owned());
        }
    }

    if let Ok(Some(san)) = certificate.subject_alternative_name() {
        for name in &san.value.general_names {
            if let x509_parser::extensions::GeneralName::DNSName(dns) = name {
                names.push((*dns).to_owned());
            }
        }
    }

    names
}
