//! W3C policy enums of [`RTCConfiguration`](super::RTCConfiguration).
//!
//! Each one serializes to the lowercase string used in JSON signalling, e.g.
//! `"max-bundle"` or `"relay"`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::UNSPECIFIED_STR;

/// How media is multiplexed onto ICE transports.
///
/// Every section is always bundled onto one transport, so the three policies
/// only differ in what is announced. `Balanced` is the W3C default.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#rtcbundlepolicy-enum)
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum RTCBundlePolicy {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "balanced")]
    Balanced,
    #[serde(rename = "max-compat")]
    MaxCompat,
    #[serde(rename = "max-bundle")]
    MaxBundle,
}

const BUNDLE_POLICY_BALANCED_STR: &str = "balanced";
const BUNDLE_POLICY_MAX_COMPAT_STR: &str = "max-compat";
const BUNDLE_POLICY_MAX_BUNDLE_STR: &str = "max-bundle";

impl From<&str> for RTCBundlePolicy {
    fn from(raw: &str) -> Self {
        match raw {
            BUNDLE_POLICY_BALANCED_STR => RTCBundlePolicy::Balanced,
            BUNDLE_POLICY_MAX_COMPAT_STR => RTCBundlePolicy::MaxCompat,
            BUNDLE_POLICY_MAX_BUNDLE_STR => RTCBundlePolicy::MaxBundle,
            _ => RTCBundlePolicy::Unspecified,
        }
    }
}

impl fmt::Display for RTCBundlePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCBundlePolicy::Balanced => BUNDLE_POLICY_BALANCED_STR,
            RTCBundlePolicy::MaxCompat => BUNDLE_POLICY_MAX_COMPAT_STR,
            RTCBundlePolicy::MaxBundle => BUNDLE_POLICY_MAX_BUNDLE_STR,
            RTCBundlePolicy::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// Which candidates the ICE agent may use. `Relay` restricts gathering and
/// checks to TURN relayed candidates.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#rtcicetransportpolicy-enum)
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum RTCIceTransportPolicy {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "all")]
    All,
    #[serde(rename = "relay")]
    Relay,
}

const ICE_TRANSPORT_POLICY_ALL_STR: &str = "all";
const ICE_TRANSPORT_POLICY_RELAY_STR: &str = "relay";

impl From<&str> for RTCIceTransportPolicy {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_TRANSPORT_POLICY_ALL_STR => RTCIceTransportPolicy::All,
            ICE_TRANSPORT_POLICY_RELAY_STR => RTCIceTransportPolicy::Relay,
            _ => RTCIceTransportPolicy::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceTransportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceTransportPolicy::All => ICE_TRANSPORT_POLICY_ALL_STR,
            RTCIceTransportPolicy::Relay => ICE_TRANSPORT_POLICY_RELAY_STR,
            RTCIceTransportPolicy::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// Whether RTCP may use its own ICE component. Only multiplexed RTCP is
/// implemented, so `a=rtcp-mux` is always offered and `Negotiate` behaves
/// like `Require`.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#rtcrtcpmuxpolicy-enum)
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum RTCRtcpMuxPolicy {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "negotiate")]
    Negotiate,
    #[serde(rename = "require")]
    Require,
}

const RTCP_MUX_POLICY_NEGOTIATE_STR: &str = "negotiate";
const RTCP_MUX_POLICY_REQUIRE_STR: &str = "require";

impl From<&str> for RTCRtcpMuxPolicy {
    fn from(raw: &str) -> Self {
        match raw {
            RTCP_MUX_POLICY_NEGOTIATE_STR => RTCRtcpMuxPolicy::Negotiate,
            RTCP_MUX_POLICY_REQUIRE_STR => RTCRtcpMuxPolicy::Require,
            _ => RTCRtcpMuxPolicy::Unspecified,
        }
    }
}

impl fmt::Display for RTCRtcpMuxPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCRtcpMuxPolicy::Negotiate => RTCP_MUX_POLICY_NEGOTIATE_STR,
            RTCRtcpMuxPolicy::Require => RTCP_MUX_POLICY_REQUIRE_STR,
            RTCRtcpMuxPolicy::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}
