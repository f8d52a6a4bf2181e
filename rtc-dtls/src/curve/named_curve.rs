#[cfg(test)]
mod named_curve_test;

use rand_core::OsRng;
use shared::error::*;

// https://www.iana.org/assignments/tls-parameters/tls-parameters.xml#tls-parameters-8
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum NamedCurve {
    P256 = 0x0017,
    X25519 = 0x001d,
    #[default]
    Unsupported,
}

impl From<u16> for NamedCurve {
    fn from(val: u16) -> Self {
        match val {
            0x0017 => NamedCurve::P256,
            0x001d => NamedCurve::X25519,
            _ => NamedCurve::Unsupported,
        }
    }
}

pub(crate) enum NamedCurvePrivateKey {
    EphemeralSecretP256(p256::ecdh::EphemeralSecret),
    StaticSecretX25519(x25519_dalek::StaticSecret),
}

pub struct NamedCurveKeypair {
    pub(crate) curve: NamedCurve,
    pub(crate) public_key: Vec<u8>,
    pub(crate) private_key: NamedCurvePrivateKey,
}

fn elliptic_curve_keypair(curve: NamedCurve) -> Result<NamedCurveKeypair> {
    let (public_key, private_key) = match curve {
        NamedCurve::P256 => {
            let secret_key = p256::ecdh::EphemeralSecret::random(&mut OsRng);
            let public_key = p256::EncodedPoint::from(secret_key.public_key());
            (
                public_key.as_bytes().to_vec(),
                NamedCurvePrivateKey::EphemeralSecretP256(secret_key),
            )
        }
        NamedCurve::X25519 => {
            let secret_key = x25519_dalek::StaticSecret::random_from_rng(OsRng);
            let public_key = x25519_dalek::PublicKey::from(&secret_key);
            (
                public_key.as_bytes().to_vec(),
                NamedCurvePrivateKey::StaticSecretX25519(secret_key),
            )
        }
        NamedCurve::Unsupported => return Err(Error::ErrInvalidNamedCurve),
    };

    Ok(NamedCurveKeypair {
        curve,
        public_key,
        private_key,
    })
}

impl NamedCurve {
    pub fn generate_keypair(&self) -> Result<NamedCurveKeypair> {
        elliptic_curve_keypair(*self)
    }
}

/// Computes the ECDHE shared secret between our keypair and the peer's public point.
pub(crate) fn ecdh_shared_secret(
    public_key: &[u8],
    private_key: &NamedCurvePrivateKey,
) -> Result<Vec<u8>> {
    match private_key {
        NamedCurvePrivateKey::EphemeralSecretP256(secret) => {
            let public_key = p256::PublicKey::from_sec1_bytes(public_key)?;
            let shared = secret.diffie_hellman(&public_key);
            Ok(shared.raw_secret_bytes().to_vec())
        }
        NamedCurvePrivateKey::StaticSecretX25519(secret) => {
            if public_key.len() != 32 {
                return Err(Error::ErrInvalidNamedCurve);
            }
            let mut buf = [0u8; 32];
            buf.copy_from_slice(public_key);
            let public_key = x25519_dalek::PublicKey::from(buf);
            Ok(secret.diffie_hellman(&public_key).as_bytes().to_vec())
        }
    }
}
