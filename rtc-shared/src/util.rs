use crate::error::{Error, Result};
use rand::{Rng, rng};
use std::net::{SocketAddr, ToSocketAddrs};

// match_range accepts packets with the first byte in [lower..upper]
fn match_range(lower: u8, upper: u8, buf: &[u8]) -> bool {
    buf.first().is_some_and(|b| *b >= lower && *b <= upper)
}

/// Demultiplexing by first byte as described in RFC7983
/// <https://tools.ietf.org/html/rfc7983>
///              +----------------+
///              |        [0..3] -+--> forward to STUN
///              |                |
///              |      [16..19] -+--> forward to ZRTP
///              |                |
///  packet -->  |      [20..63] -+--> forward to DTLS
///              |                |
///              |      [64..79] -+--> forward to TURN Channel
///              |                |
///              |    [128..191] -+--> forward to RTP/RTCP
///              +----------------+
pub fn match_stun(b: &[u8]) -> bool {
    match_range(0, 3, b)
}

/// match_dtls accepts packets with the first byte in [20..63]
pub fn match_dtls(b: &[u8]) -> bool {
    match_range(20, 63, b)
}

/// match_turn_channel accepts packets with the first byte in [64..79]
pub fn match_turn_channel(b: &[u8]) -> bool {
    match_range(64, 79, b)
}

/// match_srtp_or_srtcp accepts packets with the first byte in [128..191]
pub fn match_srtp_or_srtcp(b: &[u8]) -> bool {
    match_range(128, 191, b)
}

pub fn is_rtcp(buf: &[u8]) -> bool {
    // Not long enough to determine RTP/RTCP
    if buf.len() < 4 {
        return false;
    }

    let rtcp_packet_type = buf[1];
    (192..=223).contains(&rtcp_packet_type)
}

/// match_srtp only matches SRTP and not SRTCP
pub fn match_srtp(buf: &[u8]) -> bool {
    match_srtp_or_srtcp(buf) && !is_rtcp(buf)
}

/// match_srtcp only matches SRTCP and not SRTP
pub fn match_srtcp(buf: &[u8]) -> bool {
    match_srtp_or_srtcp(buf) && is_rtcp(buf)
}

/// lookup host to SocketAddr
pub fn lookup_host<T>(use_ipv4: bool, host: T) -> Result<SocketAddr>
where
    T: ToSocketAddrs,
{
    for remote_addr in host.to_socket_addrs()? {
        if (use_ipv4 && remote_addr.is_ipv4()) || (!use_ipv4 && remote_addr.is_ipv6()) {
            return Ok(remote_addr);
        }
    }

    Err(Error::ErrAddressParseFailed)
}

const RUNES_ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const RUNES_ALPHA_NUMBER: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// math_rand_alpha generates a random alphabet sequence of the requested length.
pub fn math_rand_alpha(n: usize) -> String {
    generate_crypto_random_string(n, RUNES_ALPHA)
}

/// math_rand_alpha_number generates a random alphabet and number sequence of the requested length.
pub fn math_rand_alpha_number(n: usize) -> String {
    generate_crypto_random_string(n, RUNES_ALPHA_NUMBER)
}

/// generate_crypto_random_string picks `n` runes with the thread-local CSPRNG.
pub fn generate_crypto_random_string(n: usize, runes: &[u8]) -> String {
    let mut rng = rng();

    (0..n)
        .map(|_| {
            let idx = rng.random_range(0..runes.len());
            runes[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demux_ranges() {
        assert!(match_stun(&[0x00, 0x01]));
        assert!(!match_stun(&[20]));
        assert!(match_dtls(&[22, 0xfe, 0xfd]));
        assert!(!match_dtls(&[]));
        assert!(match_turn_channel(&[0x40, 0x00]));
        assert!(match_srtp(&[0x80, 0x60, 0x00, 0x01]));
        assert!(match_srtcp(&[0x80, 200, 0x00, 0x06]));
        assert!(!match_srtp(&[0x80, 200, 0x00, 0x06]));
    }

    #[test]
    fn test_random_string() {
        let s = math_rand_alpha(16);
        assert_eq!(s.len(), 16);
        assert!(s.chars().all(|c| c.is_ascii_alphabetic()));
        let s = math_rand_alpha_number(32);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
