//! Media tracks and the samples written to them.

pub mod track;

use std::time::Duration;

use bytes::Bytes;

/// Identifier of a media stream, the first token of an `a=msid` line.
///
/// * [W3C MediaStream](https://www.w3.org/TR/mediacapture-streams/#stream-api)
pub type MediaStreamId = String;

/// One encoded media frame to be packetized and sent with
/// [`RTCRtpSender::write_sample`](crate::rtp_transceiver::rtp_sender::RTCRtpSender::write_sample).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub data: Bytes,

    /// Playout duration of the frame. Advances the RTP timestamp by
    /// duration times the codec clock rate.
    pub duration: Duration,

    /// Frames of the same duration the encoder dropped right before this
    /// one. The RTP timestamp skips over them.
    pub prev_dropped_packets: u16,
}

impl Sample {
    /// Number of RTP timestamp units the sample covers at `clock_rate`.
    pub(crate) fn samples(&self, clock_rate: u32) -> u32 {
        (self.duration.as_nanos() * clock_rate as u128 / 1_000_000_000) as u32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sample_timestamp_units() {
        let sample = Sample {
            data: Bytes::from_static(&[0u8; 4]),
            duration: Duration::from_millis(20),
            ..Default::default()
        };
        assert_eq!(sample.samples(48000), 960);

        let frame = Sample {
            duration: Duration::from_millis(40),
            ..Default::default()
        };
        assert_eq!(frame.samples(90000), 3600);
    }
}
