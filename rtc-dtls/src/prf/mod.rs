#[cfg(test)]
mod prf_test;

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use shared::error::*;

use crate::curve::named_curve::*;

type HmacSha256 = Hmac<Sha256>;

pub(crate) const PRF_MASTER_SECRET_LABEL: &str = "master secret";
pub(crate) const PRF_EXTENDED_MASTER_SECRET_LABEL: &str = "extended master secret";
pub(crate) const PRF_KEY_EXPANSION_LABEL: &str = "key expansion";
pub(crate) const PRF_VERIFY_DATA_CLIENT_LABEL: &str = "client finished";
pub(crate) const PRF_VERIFY_DATA_SERVER_LABEL: &str = "server finished";

const VERIFY_DATA_LENGTH: usize = 12;
const MASTER_SECRET_LENGTH: usize = 48;

/// Keys derived from the master secret via "key expansion".
#[derive(PartialEq, Eq, Default)]
pub(crate) struct EncryptionKeys {
    pub(crate) master_secret: Vec<u8>,
    pub(crate) client_mac_key: Vec<u8>,
    pub(crate) server_mac_key: Vec<u8>,
    pub(crate) client_write_key: Vec<u8>,
    pub(crate) server_write_key: Vec<u8>,
    pub(crate) client_write_iv: Vec<u8>,
    pub(crate) server_write_iv: Vec<u8>,
}

impl fmt::Debug for EncryptionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKeys")
            .field("client_write_iv", &self.client_write_iv)
            .field("server_write_iv", &self.server_write_iv)
            .finish_non_exhaustive()
    }
}

pub(crate) fn prf_pre_master_secret(
    public_key: &[u8],
    private_key: &NamedCurvePrivateKey,
) -> Result<Vec<u8>> {
    ecdh_shared_secret(public_key, private_key)
}

// This PRF with the SHA-256 hash function is used for all cipher suites
// defined in this document and in TLS documents published prior to this
// document when TLS 1.2 is negotiated.
// https://tools.ietf.org/html/rfc5246#section-5
pub(crate) fn prf_p_hash(secret: &[u8], seed: &[u8], requested_length: usize) -> Result<Vec<u8>> {
    let hmac = |data: &[&[u8]]| -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| Error::Other(e.to_string()))?;
        for d in data {
            mac.update(d);
        }
        Ok(mac.finalize().into_bytes().to_vec())
    };

    let mut last_round = seed.to_vec();
    let mut out = Vec::with_capacity(requested_length + 32);

    while out.len() < requested_length {
        last_round = hmac(&[&last_round])?;
        let with_secret = hmac(&[&last_round, seed])?;
        out.extend_from_slice(&with_secret);
    }

    out.truncate(requested_length);
    Ok(out)
}

pub(crate) fn prf_master_secret(
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<Vec<u8>> {
    let mut seed = PRF_MASTER_SECRET_LABEL.as_bytes().to_vec();
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);

    prf_p_hash(pre_master_secret, &seed, MASTER_SECRET_LENGTH)
}

// https://tools.ietf.org/html/rfc7627#section-4
pub(crate) fn prf_extended_master_secret(
    pre_master_secret: &[u8],
    session_hash: &[u8],
) -> Result<Vec<u8>> {
    let mut seed = PRF_EXTENDED_MASTER_SECRET_LABEL.as_bytes().to_vec();
    seed.extend_from_slice(session_hash);

    prf_p_hash(pre_master_secret, &seed, MASTER_SECRET_LENGTH)
}

pub(crate) fn prf_encryption_keys(
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    prf_mac_len: usize,
    prf_key_len: usize,
    prf_iv_len: usize,
) -> Result<EncryptionKeys> {
    let mut seed = PRF_KEY_EXPANSION_LABEL.as_bytes().to_vec();
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let material = prf_p_hash(
        master_secret,
        &seed,
        (2 * prf_mac_len) + (2 * prf_key_len) + (2 * prf_iv_len),
    )?;
    let mut key_material = &material[..];

    let client_mac_key = key_material[..prf_mac_len].to_vec();
    key_material = &key_material[prf_mac_len..];

    let server_mac_key = key_material[..prf_mac_len].to_vec();
    key_material = &key_material[prf_mac_len..];

    let client_write_key = key_material[..prf_key_len].to_vec();
    key_material = &key_material[prf_key_len..];

    let server_write_key = key_material[..prf_key_len].to_vec();
    key_material = &key_material[prf_key_len..];

    let client_write_iv = key_material[..prf_iv_len].to_vec();
    key_material = &key_material[prf_iv_len..];

    let server_write_iv = key_material[..prf_iv_len].to_vec();

    Ok(EncryptionKeys {
        master_secret: master_secret.to_vec(),
        client_mac_key,
        server_mac_key,
        client_write_key,
        server_write_key,
        client_write_iv,
        server_write_iv,
    })
}

fn prf_verify_data(master_secret: &[u8], handshake_bodies: &[u8], label: &str) -> Result<Vec<u8>> {
    let mut hasher = Sha256::new();
    hasher.update(handshake_bodies);
    let result = hasher.finalize();

    let mut seed = label.as_bytes().to_vec();
    seed.extend_from_slice(&result);

    prf_p_hash(master_secret, &seed, VERIFY_DATA_LENGTH)
}

pub(crate) fn prf_verify_data_client(
    master_secret: &[u8],
    handshake_bodies: &[u8],
) -> Result<Vec<u8>> {
    prf_verify_data(master_secret, handshake_bodies, PRF_VERIFY_DATA_CLIENT_LABEL)
}

pub(crate) fn prf_verify_data_server(
    master_secret: &[u8],
    handshake_bodies: &[u8],
) -> Result<Vec<u8>> {
    prf_verify_data(master_secret, handshake_bodies, PRF_VERIFY_DATA_SERVER_LABEL)
}
