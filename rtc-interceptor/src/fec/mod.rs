//! Forward error correction with FlexFEC-03
//! (draft-ietf-payload-flexible-fec-scheme-03).
//!
//! Repair packets travel on their own SSRC and payload type, negotiated as
//! `video/flexfec-03` and announced with `a=ssrc-group:FEC-FR`. Each carries
//! the XOR of a set of media packets of one protected stream, described by an
//! SN base and a bit mask. Only the flexible mask mode without retransmission
//! is produced and understood.

pub(crate) mod decoder;
pub(crate) mod encoder;
pub(crate) mod flexfec03;


/// Media packets per protection group.
pub(crate) const DEFAULT_NUM_MEDIA_PACKETS: usize = 5;
/// Repair packets per protection group.
pub(crate) const DEFAULT_NUM_FEC_PACKETS: usize = 2;

pub(crate) fn stream_uses_fec(info: &crate::StreamInfo) -> Option<(u32, u8)> {
    Some((info.ssrc_fec?, info.payload_type_fec?))
}
