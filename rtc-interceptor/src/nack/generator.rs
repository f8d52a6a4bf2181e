use super::receive_log::ReceiveLog;
use super::stream_supports_nack;
use crate::stream_info::StreamInfo;
use crate::{Interceptor, Packet, TaggedPacket, interceptor, min_timeout};
use log::{trace, warn};
use rtcp::transport_feedbacks::transport_layer_nack::{
    TransportLayerNack, nack_pairs_from_sequence_numbers,
};
use shared::TransportContext;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::time::{Duration, Instant};

/// Configures a [`NackGeneratorInterceptor`].
///
/// ```ignore
/// let chain = Registry::new()
///     .with(NackGeneratorBuilder::new().with_skip_last_n(2).build())
///     .build();
/// ```
pub struct NackGeneratorBuilder<P> {
    size: u16,
    interval: Duration,
    skip_last_n: u16,
    max_nacks_per_packet: u16,
    sender_ssrc: Option<u32>,
    _phantom: PhantomData<P>,
}

impl<P> Default for NackGeneratorBuilder<P> {
    fn default() -> Self {
        Self {
            size: 512,
            interval: Duration::from_millis(100),
            skip_last_n: 0,
            max_nacks_per_packet: 0,
            sender_ssrc: None,
            _phantom: PhantomData,
        }
    }
}

impl<P> NackGeneratorBuilder<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sequence numbers remembered per stream, a power of two
    /// between 64 and 32768. Streams bound with any other size are not
    /// tracked.
    pub fn with_size(mut self, size: u16) -> Self {
        self.size = size;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Gaps among the newest `skip_last_n` packets are not reported yet.
    pub fn with_skip_last_n(mut self, skip_last_n: u16) -> Self {
        self.skip_last_n = skip_last_n;
        self
    }

    /// Stops asking for a packet after `max` NACKs; 0 asks forever.
    pub fn with_max_nacks_per_packet(mut self, max: u16) -> Self {
        self.max_nacks_per_packet = max;
        self
    }

    /// SSRC placed in the sender field of generated NACKs. Random by default.
    pub fn with_sender_ssrc(mut self, ssrc: u32) -> Self {
        self.sender_ssrc = Some(ssrc);
        self
    }

    pub fn build(self) -> impl FnOnce(P) -> NackGeneratorInterceptor<P> {
        move |inner| NackGeneratorInterceptor {
            inner,
            size: self.size,
            interval: self.interval,
            skip_last_n: self.skip_last_n,
            max_nacks_per_packet: self.max_nacks_per_packet,
            sender_ssrc: self.sender_ssrc.unwrap_or_else(rand::random),
            eto: None,
            streams: HashMap::new(),
            write_queue: VecDeque::new(),
        }
    }
}

struct RemoteStream {
    log: ReceiveLog,
    /// How many times each currently missing packet was asked for.
    nacked: HashMap<u16, u16>,
}

/// Emits a Transport-Layer NACK for every tracked remote stream with gaps,
/// once per interval.
#[derive(Interceptor)]
pub struct NackGeneratorInterceptor<P> {
    #[next]
    inner: P,

    size: u16,
    interval: Duration,
    skip_last_n: u16,
    max_nacks_per_packet: u16,
    sender_ssrc: u32,

    eto: Option<Instant>,
    streams: HashMap<u32, RemoteStream>,
    write_queue: VecDeque<TaggedPacket>,
}

impl<P> NackGeneratorInterceptor<P> {
    fn generate_nacks(&mut self, now: Instant) {
        for (&media_ssrc, stream) in self.streams.iter_mut() {
            let missing = stream.log.missing_seq_numbers(self.skip_last_n);
            stream.nacked.retain(|seq, _| missing.contains(seq));
            if missing.is_empty() {
                continue;
            }

            let wanted: Vec<u16> = if self.max_nacks_per_packet == 0 {
                missing
            } else {
                let max = self.max_nacks_per_packet;
                missing
                    .into_iter()
                    .filter(|seq| {
                        let count = stream.nacked.entry(*seq).or_insert(0);
                        if *count >= max {
                            return false;
                        }
                        *count += 1;
                        true
                    })
                    .collect()
            };
            if wanted.is_empty() {
                continue;
            }

            trace!("nack ssrc={media_ssrc} seqs={wanted:?}");
            let nack = TransportLayerNack {
                sender_ssrc: self.sender_ssrc,
                media_ssrc,
                nacks: nack_pairs_from_sequence_numbers(&wanted),
            };
            self.write_queue.push_back(TaggedPacket {
                now,
                transport: TransportContext::default(),
                message: Packet::Rtcp(vec![Box::new(nack)]),
            });
        }
    }
}

#[interceptor]
impl<P: Interceptor> NackGeneratorInterceptor<P> {
    #[overrides]
    fn handle_read(&mut self, msg: TaggedPacket) -> Result<(), Self::Error> {
        if let Packet::Rtp(packet) = &msg.message {
            if let Some(stream) = self.streams.get_mut(&packet.header.ssrc) {
                stream.log.add(packet.header.sequence_number);
                if self.eto.is_none() {
                    self.eto = Some(msg.now + self.interval);
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
                self.generate_nacks(now);
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
        if stream_supports_nack(info) {
            match ReceiveLog::new(self.size) {
                Ok(log) => {
                    self.streams.insert(
                        info.ssrc,
                        RemoteStream {
                            log,
                            nacked: HashMap::new(),
                        },
                    );
                }
                Err(err) => warn!("not tracking ssrc {} for nack: {}", info.ssrc, err),
            }
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
