//! Random identifiers and credentials (RFC 8445 section 5.3, RFC 8839 section 5.4).

use shared::error::{Error, Result};
use shared::util::generate_crypto_random_string;

#[cfg(test)]
mod rand_test;

/// `ice-char = ALPHA / DIGIT / "+" / "/"`
const ICE_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+/";

const UFRAG_LEN: usize = 16;
const PWD_LEN: usize = 32;
const FOUNDATION_LEN: usize = 32;

/// A ufrag carries at least 24 bits of randomness, a password at least 128.
const MIN_UFRAG_BITS: usize = 24;
const MIN_PWD_BITS: usize = 128;

pub fn generate_cand_id() -> String {
    format!(
        "candidate:{}",
        generate_crypto_random_string(FOUNDATION_LEN, ICE_CHARS)
    )
}

pub fn generate_pwd() -> String {
    generate_crypto_random_string(PWD_LEN, ICE_CHARS)
}

pub fn generate_ufrag() -> String {
    generate_crypto_random_string(UFRAG_LEN, ICE_CHARS)
}

/// Fills in missing local credentials and checks that both are long enough.
pub fn local_credentials(ufrag: String, pwd: String) -> Result<(String, String)> {
    let ufrag = if ufrag.is_empty() {
        generate_ufrag()
    } else {
        ufrag
    };
    let pwd = if pwd.is_empty() { generate_pwd() } else { pwd };

    if ufrag.len() * 8 < MIN_UFRAG_BITS {
        return Err(Error::ErrLocalUfragInsufficientBits);
    }
    if pwd.len() * 8 < MIN_PWD_BITS {
        return Err(Error::ErrLocalPwdInsufficientBits);
    }
    Ok((ufrag, pwd))
}
