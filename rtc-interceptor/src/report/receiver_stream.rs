use rtcp::reception_report::ReceptionReport;
use rtcp::sender_report::SenderReport;
use shared::time::ntp_middle32;
use std::time::Instant;

const UINT16_SIZE_HALF: u16 = 1 << 15;
const MAX_CUMULATIVE_LOST: u32 = 0x7F_FFFF;

/// Reception statistics of one remote source, following RFC 3550 appendix A.
pub(crate) struct ReceiverStream {
    ssrc: u32,
    clock_rate: f64,

    started: bool,
    base_seq: u32,
    max_seq: u16,
    cycles: u32,
    received: u32,

    expected_prior: u32,
    received_prior: u32,

    first_arrival: Option<Instant>,
    last_transit: f64,
    /// Interarrival jitter in timestamp units.
    jitter: f64,

    last_sr: Option<(u32, Instant)>,
}

impl ReceiverStream {
    pub(crate) fn new(ssrc: u32, clock_rate: u32) -> Self {
        Self {
            ssrc,
            clock_rate: f64::from(clock_rate),
            started: false,
            base_seq: 0,
            max_seq: 0,
            cycles: 0,
            received: 0,
            expected_prior: 0,
            received_prior: 0,
            first_arrival: None,
            last_transit: 0.0,
            jitter: 0.0,
            last_sr: None,
        }
    }

    pub(crate) fn has_received(&self) -> bool {
        self.started
    }

    pub(crate) fn process_rtp(&mut self, now: Instant, packet: &rtp::Packet) {
        let seq = packet.header.sequence_number;

        if !self.started {
            self.started = true;
            self.base_seq = u32::from(seq);
            self.max_seq = seq;
        } else {
            let ahead = seq.wrapping_sub(self.max_seq);
            if ahead != 0 && ahead < UINT16_SIZE_HALF {
                if seq < self.max_seq {
                    self.cycles += 1 << 16;
                }
                self.max_seq = seq;
            }
        }
        self.received = self.received.wrapping_add(1);

        self.update_jitter(now, packet.header.timestamp);
    }

    /// RFC 3550 section 6.4.1 / A.8: J += (|D| - J) / 16
    fn update_jitter(&mut self, now: Instant, timestamp: u32) {
        let first = *self.first_arrival.get_or_insert(now);
        let arrival = now.saturating_duration_since(first).as_secs_f64() * self.clock_rate;
        let transit = arrival - f64::from(timestamp);

        if self.received > 1 {
            let d = (transit - self.last_transit).abs();
            self.jitter += (d - self.jitter) / 16.0;
        }
        self.last_transit = transit;
    }

    pub(crate) fn process_sender_report(&mut self, now: Instant, sr: &SenderReport) {
        self.last_sr = Some((ntp_middle32(sr.ntp_time), now));
    }

    fn extended_max(&self) -> u32 {
        self.cycles | u32::from(self.max_seq)
    }

    pub(crate) fn generate_report(&mut self, now: Instant) -> ReceptionReport {
        let extended_max = self.extended_max();
        let expected = extended_max.wrapping_sub(self.base_seq).wrapping_add(1);
        let lost = i64::from(expected) - i64::from(self.received);
        let total_lost = lost.clamp(0, i64::from(MAX_CUMULATIVE_LOST)) as u32;

        let expected_interval = expected.wrapping_sub(self.expected_prior);
        let received_interval = self.received.wrapping_sub(self.received_prior);
        self.expected_prior = expected;
        self.received_prior = self.received;

        let lost_interval = i64::from(expected_interval) - i64::from(received_interval);
        let fraction_lost = if expected_interval == 0 || lost_interval <= 0 {
            0
        } else {
            ((lost_interval << 8) / i64::from(expected_interval)).min(255) as u8
        };

        let (last_sender_report, delay) = match self.last_sr {
            Some((lsr, at)) => {
                let since = now.saturating_duration_since(at).as_secs_f64();
                (lsr, (since * 65536.0) as u32)
            }
            None => (0, 0),
        };

        ReceptionReport {
            ssrc: self.ssrc,
            fraction_lost,
            total_lost,
            last_sequence_number: extended_max,
            jitter: self.jitter as u32,
            last_sender_report,
            delay,
        }
    }
}
