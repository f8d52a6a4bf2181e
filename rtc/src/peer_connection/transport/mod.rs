//! The transports a peer connection runs on: ICE finds a path, DTLS secures
//! it, and SCTP carries data channels over DTLS.
//!
//! ```text
//!  RTP/RTCP (SRTP)  |  SCTP
//! ------------------+--------
//!        DTLS (demuxed)
//! ---------------------------
//!        ICE over UDP
//! ```

pub(crate) mod dtls;
pub(crate) mod ice;
pub(crate) mod sctp;

pub use dtls::fingerprint::RTCDtlsFingerprint;
pub use dtls::role::RTCDtlsRole;
pub use dtls::state::RTCDtlsTransportState;

pub use ice::candidate::{RTCIceCandidate, RTCIceCandidateInit, RTCIceTcpCandidateType};
pub use ice::candidate_pair::RTCIceCandidatePair;
pub use ice::candidate_type::RTCIceCandidateType;
pub use ice::parameters::RTCIceParameters;
pub use ice::protocol::RTCIceProtocol;
pub use ice::role::RTCIceRole;
pub use ice::server::RTCIceServer;

pub use sctp::state::RTCSctpTransportState;

/// Builders for the local candidates handed to
/// [`add_local_candidate`](crate::peer_connection::RTCPeerConnection::add_local_candidate).
pub use ::ice::candidate::{CandidateConfig, candidate_host::CandidateHostConfig};
