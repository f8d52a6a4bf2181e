use serde::{Deserialize, Serialize};

use super::fingerprint::RTCDtlsFingerprint;
use super::role::RTCDtlsRole;

/// What a remote description says about its DTLS endpoint.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DTLSParameters {
    pub(crate) role: RTCDtlsRole,
    pub(crate) fingerprints: Vec<RTCDtlsFingerprint>,
}
