use crate::stream_info::StreamInfo;
use crate::{Interceptor, Packet, TaggedPacket, interceptor, min_timeout};
use log::trace;
use rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use shared::TransportContext;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::time::{Duration, Instant};

const DEFAULT_PLI_INTERVAL: Duration = Duration::from_secs(3);

/// Configures a [`PliGeneratorInterceptor`].
pub struct PliGeneratorBuilder<P> {
    interval: Duration,
    sender_ssrc: Option<u32>,
    _phantom: PhantomData<P>,
}

impl<P> Default for PliGeneratorBuilder<P> {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PLI_INTERVAL,
            sender_ssrc: None,
            _phantom: PhantomData,
        }
    }
}

impl<P> PliGeneratorBuilder<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_sender_ssrc(mut self, ssrc: u32) -> Self {
        self.sender_ssrc = Some(ssrc);
        self
    }

    pub fn build(self) -> impl FnOnce(P) -> PliGeneratorInterceptor<P> {
        move |inner| PliGeneratorInterceptor {
            inner,
            interval: self.interval,
            sender_ssrc: self.sender_ssrc.unwrap_or_else(rand::random),
            streams: HashMap::new(),
            eto: None,
            write_queue: VecDeque::new(),
        }
    }
}

/// Sends a PLI for every remote stream that negotiated `nack pli`, first when
/// its first packet arrives and then once per interval.
#[derive(Interceptor)]
pub struct PliGeneratorInterceptor<P> {
    #[next]
    inner: P,
    interval: Duration,
    sender_ssrc: u32,
    /// Remote SSRC to whether media has arrived on it.
    streams: HashMap<u32, bool>,
    eto: Option<Instant>,
    write_queue: VecDeque<TaggedPacket>,
}

impl<P> PliGeneratorInterceptor<P> {
    fn request_keyframes(&mut self, now: Instant, ssrcs: impl Iterator<Item = u32>) {
        let plis: Vec<Box<dyn rtcp::Packet>> = ssrcs
            .map(|media_ssrc| {
                trace!("pli for ssrc {}", media_ssrc);
                Box::new(PictureLossIndication {
                    sender_ssrc: self.sender_ssrc,
                    media_ssrc,
                }) as Box<dyn rtcp::Packet>
            })
            .collect();
        if !plis.is_empty() {
            self.write_queue.push_back(TaggedPacket {
                now,
                transport: TransportContext::default(),
                message: Packet::Rtcp(plis),
            });
        }
    }
}

#[interceptor]
impl<P: Interceptor> PliGeneratorInterceptor<P> {
    #[overrides]
    fn handle_read(&mut self, msg: TaggedPacket) -> Result<(), Self::Error> {
        if let Packet::Rtp(packet) = &msg.message {
            let ssrc = packet.header.ssrc;
            if let Some(started) = self.streams.get_mut(&ssrc) {
                if !*started {
                    *started = true;
                    self.request_keyframes(msg.now, std::iter::once(ssrc));
                    if self.eto.is_none() {
                        self.eto = Some(msg.now + self.interval);
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
                let mut started: Vec<u32> = self
                    .streams
                    .iter()
                    .filter(|(_, started)| **started)
                    .map(|(ssrc, _)| *ssrc)
                    .collect();
                started.sort_unstable();
                self.request_keyframes(now, started.into_iter());
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
        if info.has_feedback("nack", "pli") {
            self.streams.insert(info.ssrc, false);
        }
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
