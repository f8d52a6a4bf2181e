use super::DEFAULT_REPORT_INTERVAL;
use super::receiver_stream::ReceiverStream;
use crate::stream_info::StreamInfo;
use crate::{Interceptor, Packet, TaggedPacket, interceptor, min_timeout, rtcp_packets_of};
use rtcp::receiver_report::ReceiverReport;
use rtcp::sender_report::SenderReport;
use shared::TransportContext;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::time::{Duration, Instant};

/// Configures a [`ReceiverReportInterceptor`].
pub struct ReceiverReportBuilder<P> {
    interval: Duration,
    receiver_ssrc: Option<u32>,
    _phantom: PhantomData<P>,
}

impl<P> Default for ReceiverReportBuilder<P> {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REPORT_INTERVAL,
            receiver_ssrc: None,
            _phantom: PhantomData,
        }
    }
}

impl<P> ReceiverReportBuilder<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// SSRC placed in the sender field of generated reports. Random by default.
    pub fn with_receiver_ssrc(mut self, ssrc: u32) -> Self {
        self.receiver_ssrc = Some(ssrc);
        self
    }

    pub fn build(self) -> impl FnOnce(P) -> ReceiverReportInterceptor<P> {
        move |inner| ReceiverReportInterceptor {
            inner,
            interval: self.interval,
            receiver_ssrc: self.receiver_ssrc.unwrap_or_else(rand::random),
            eto: None,
            streams: HashMap::new(),
            write_queue: VecDeque::new(),
        }
    }
}

/// Emits an RTCP Receiver Report for every remote stream that has received
/// media, once per interval.
#[derive(Interceptor)]
pub struct ReceiverReportInterceptor<P> {
    #[next]
    inner: P,

    interval: Duration,
    receiver_ssrc: u32,

    eto: Option<Instant>,
    streams: HashMap<u32, ReceiverStream>,
    write_queue: VecDeque<TaggedPacket>,
}

impl<P> ReceiverReportInterceptor<P> {
    fn generate_reports(&mut self, now: Instant) {
        for stream in self.streams.values_mut().filter(|s| s.has_received()) {
            let rr = ReceiverReport {
                ssrc: self.receiver_ssrc,
                reports: vec![stream.generate_report(now)],
                ..Default::default()
            };
            self.write_queue.push_back(TaggedPacket {
                now,
                transport: TransportContext::default(),
                message: Packet::Rtcp(vec![Box::new(rr)]),
            });
        }
    }
}

#[interceptor]
impl<P: Interceptor> ReceiverReportInterceptor<P> {
    #[overrides]
    fn handle_read(&mut self, msg: TaggedPacket) -> Result<(), Self::Error> {
        match &msg.message {
            Packet::Rtp(packet) => {
                if let Some(stream) = self.streams.get_mut(&packet.header.ssrc) {
                    stream.process_rtp(msg.now, packet);
                    if self.eto.is_none() {
                        self.eto = Some(msg.now + self.interval);
                    }
                }
            }
            Packet::Rtcp(_) => {
                for sr in rtcp_packets_of::<SenderReport>(&msg) {
                    if let Some(stream) = self.streams.get_mut(&sr.ssrc) {
                        stream.process_sender_report(msg.now, sr);
                    }
                }
            }
        }
        self.inner.handle_read(msg)
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
    fn bind_remote_stream(&mut self, info: &StreamInfo) {
        self.streams
            .insert(info.ssrc, ReceiverStream::new(info.ssrc, info.clock_rate));
        self.inner.bind_remote_stream(info);
    }

    #[overrides]
    fn unbind_remote_stream(&mut self, info: &StreamInfo) {
        self.streams.remove(&info.ssrc);
        if self.streams.is_empty() {
            self.eto = None;
        }
        self.inner.unbind_remote_stream(info);
    }
}
