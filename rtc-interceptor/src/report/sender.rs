use super::DEFAULT_REPORT_INTERVAL;
use super::sender_stream::SenderStream;
use crate::stream_info::StreamInfo;
use crate::{Interceptor, Packet, TaggedPacket, interceptor, min_timeout};
use log::trace;
use shared::TransportContext;
use shared::time::SystemInstant;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Configures a [`SenderReportInterceptor`].
///
/// ```ignore
/// let chain = Registry::new()
///     .with(SenderReportBuilder::new().with_interval(Duration::from_millis(500)).build())
///     .build();
/// ```
pub struct SenderReportBuilder<P> {
    interval: Duration,
    use_latest_packet: bool,
    time_baseline: Option<SystemInstant>,
    _phantom: PhantomData<P>,
}

impl<P> Default for SenderReportBuilder<P> {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REPORT_INTERVAL,
            use_latest_packet: false,
            time_baseline: None,
            _phantom: PhantomData,
        }
    }
}

impl<P> SenderReportBuilder<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Lets out-of-order packets move the RTP/NTP correlation too. By default
    /// only packets newer than the last one do.
    pub fn with_use_latest_packet(mut self) -> Self {
        self.use_latest_packet = true;
        self
    }

    /// Pins the wall clock used for NTP timestamps. Without it the clock is
    /// read once, when the first packet is written.
    pub fn with_time_baseline(mut self, baseline: SystemInstant) -> Self {
        self.time_baseline = Some(baseline);
        self
    }

    pub fn build(self) -> impl FnOnce(P) -> SenderReportInterceptor<P> {
        move |inner| SenderReportInterceptor {
            inner,
            interval: self.interval,
            use_latest_packet: self.use_latest_packet,
            time_baseline: self.time_baseline,
            eto: None,
            streams: HashMap::new(),
            write_queue: VecDeque::new(),
        }
    }
}

/// Emits an RTCP Sender Report for every local stream that has sent media,
/// once per interval.
#[derive(Interceptor)]
pub struct SenderReportInterceptor<P> {
    #[next]
    inner: P,

    interval: Duration,
    use_latest_packet: bool,
    time_baseline: Option<SystemInstant>,

    eto: Option<Instant>,
    streams: HashMap<u32, SenderStream>,
    write_queue: VecDeque<TaggedPacket>,
}

impl<P> SenderReportInterceptor<P> {
    fn baseline(&mut self, now: Instant) -> SystemInstant {
        *self.time_baseline.get_or_insert_with(|| {
            let wall = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            SystemInstant::new(now, wall)
        })
    }

    fn generate_reports(&mut self, now: Instant) {
        let Some(baseline) = self.time_baseline else {
            return;
        };
        for stream in self.streams.values().filter(|s| s.has_sent()) {
            let sr = stream.generate_report(now, &baseline);
            trace!(
                "sender report ssrc={} packets={} octets={}",
                sr.ssrc, sr.packet_count, sr.octet_count
            );
            self.write_queue.push_back(TaggedPacket {
                now,
                transport: TransportContext::default(),
                message: Packet::Rtcp(vec![Box::new(sr)]),
            });
        }
    }
}

#[interceptor]
impl<P: Interceptor> SenderReportInterceptor<P> {
    #[overrides]
    fn handle_write(&mut self, msg: TaggedPacket) -> Result<(), Self::Error> {
        if let Packet::Rtp(packet) = &msg.message {
            if self.streams.contains_key(&packet.header.ssrc) {
                self.baseline(msg.now);
                if self.eto.is_none() {
                    self.eto = Some(msg.now + self.interval);
                }
                if let Some(stream) = self.streams.get_mut(&packet.header.ssrc) {
                    stream.process_rtp(msg.now, packet);
                }
            }
        }
        self.inner.handle_write(msg)
    }

    #[overrides]
    fn poll_write(&mut self) -> Option<Self::Wout> {
        if let Some(msg) = self.write_queue.pop_front() {
            return Some(msg);
        }
        self.inner.poll_write()
    }

    #[overrides]
    fn handle_timeout(&mut self, now: Self::Time) -> Result<(), Self::Error> {
        if let Some(eto) = self.eto {
            if eto <= now {
                self.eto = Some(now + self.interval);
                self.generate_reports(now);
            }
        }
        self.inner.handle_timeout(now)
    }

    #[overrides]
    fn poll_timeout(&mut self) -> Option<Self::Time> {
        min_timeout(self.eto, self.inner.poll_timeout())
    }

    #[overrides]
    fn close(&mut self) -> Result<(), Self::Error> {
        self.streams.clear();
        self.write_queue.clear();
        self.eto = None;
        self.inner.close()
    }

    #[overrides]
    fn bind_local_stream(&mut self, info: &StreamInfo) {
        self.streams.insert(
            info.ssrc,
            SenderStream::new(info.ssrc, info.clock_rate, self.use_latest_packet),
        );
        self.inner.bind_local_stream(info);
    }

    #[overrides]
    fn unbind_local_stream(&mut self, info: &StreamInfo) {
        self.streams.remove(&info.ssrc);
        if self.streams.is_empty() {
            self.eto = None;
        }
        self.inner.unbind_local_stream(info);
    }
}
