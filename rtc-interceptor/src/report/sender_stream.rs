use log::warn;
use rtcp::sender_report::SenderReport;
use shared::time::SystemInstant;
use std::time::Instant;

const UINT16_SIZE_HALF: u16 = 1 << 15;

/// Send-side statistics of one local stream.
pub(crate) struct SenderStream {
    ssrc: u32,
    clock_rate: f64,
    use_latest_packet: bool,

    /// RTP timestamp of the newest frame and when its first packet was sent.
    last_frame: Option<(u16, u32, Instant)>,
    packets: u32,
    octets: u32,
}

impl SenderStream {
    pub(crate) fn new(ssrc: u32, clock_rate: u32, use_latest_packet: bool) -> Self {
        Self {
            ssrc,
            clock_rate: f64::from(clock_rate),
            use_latest_packet,
            last_frame: None,
            packets: 0,
            octets: 0,
        }
    }

    pub(crate) fn process_rtp(&mut self, now: Instant, packet: &rtp::Packet) {
        let seq = packet.header.sequence_number;
        let ts = packet.header.timestamp;

        match self.last_frame {
            None => self.last_frame = Some((seq, ts, now)),
            Some((last_seq, last_ts, last_time)) => {
                let ahead = seq.wrapping_sub(last_seq);
                if self.use_latest_packet || (ahead != 0 && ahead < UINT16_SIZE_HALF) {
                    // a frame's clock is pinned by its first packet, not its last
                    let time = if ts == last_ts { last_time } else { now };
                    self.last_frame = Some((seq, ts, time));
                }
            }
        }

        self.packets = self.packets.wrapping_add(1);
        let octets = u32::try_from(packet.payload.len()).unwrap_or_else(|_| {
            warn!("rtp payload of ssrc {} exceeds 32 bits", self.ssrc);
            u32::MAX
        });
        self.octets = self.octets.wrapping_add(octets);
    }

    pub(crate) fn has_sent(&self) -> bool {
        self.last_frame.is_some()
    }

    pub(crate) fn packet_count(&self) -> u32 {
        self.packets
    }

    pub(crate) fn octet_count(&self) -> u32 {
        self.octets
    }

    /// Maps `now` onto both the NTP and the RTP clock of this stream.
    pub(crate) fn generate_report(&self, now: Instant, baseline: &SystemInstant) -> SenderReport {
        let rtp_time = match self.last_frame {
            Some((_, ts, time)) => {
                let elapsed = now.saturating_duration_since(time).as_secs_f64();
                ts.wrapping_add((elapsed * self.clock_rate) as u32)
            }
            None => 0,
        };

        SenderReport {
            ssrc: self.ssrc,
            ntp_time: baseline.ntp(now),
            rtp_time,
            packet_count: self.packets,
            octet_count: self.octets,
            ..Default::default()
        }
    }
}
