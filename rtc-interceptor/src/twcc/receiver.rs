use super::TRANSPORT_CC_URI;
use super::recorder::Recorder;
use crate::stream_info::StreamInfo;
use crate::{Interceptor, Packet, TaggedPacket, interceptor, min_timeout};
use log::{trace, warn};
use rtp::extension::transport_cc_extension::TransportCcExtension;
use shared::TransportContext;
use shared::marshal::Unmarshal;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::time::{Duration, Instant};

const DEFAULT_FEEDBACK_INTERVAL: Duration = Duration::from_millis(100);

/// Configures a [`TwccReceiverInterceptor`].
pub struct TwccReceiverBuilder<P> {
    interval: Duration,
    sender_ssrc: Option<u32>,
    _phantom: PhantomData<P>,
}

impl<P> Default for TwccReceiverBuilder<P> {
    fn default() -> Self {
        Self {
            interval: DEFAULT_FEEDBACK_INTERVAL,
            sender_ssrc: None,
            _phantom: PhantomData,
        }
    }
}

impl<P> TwccReceiverBuilder<P> {
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

    pub fn build(self) -> impl FnOnce(P) -> TwccReceiverInterceptor<P> {
        move |inner| TwccReceiverInterceptor {
            inner,
            interval: self.interval,
            recorder: Recorder::new(self.sender_ssrc.unwrap_or_else(rand::random)),
            extension_ids: HashMap::new(),
            eto: None,
            write_queue: VecDeque::new(),
        }
    }
}

/// Records transport-wide sequence numbers of incoming packets and sends
/// TransportLayerCc feedback once per interval.
#[derive(Interceptor)]
pub struct TwccReceiverInterceptor<P> {
    #[next]
    inner: P,
    interval: Duration,
    recorder: Recorder,
    /// Negotiated extension id per remote SSRC.
    extension_ids: HashMap<u32, u8>,
    eto: Option<Instant>,
    write_queue: VecDeque<TaggedPacket>,
}

impl<P> TwccReceiverInterceptor<P> {
    fn record(&mut self, now: Instant, packet: &rtp::Packet) {
        let Some(&id) = self.extension_ids.get(&packet.header.ssrc) else {
            return;
        };
        let Some(raw) = packet.header.get_extension(id) else {
            return;
        };
        match TransportCcExtension::unmarshal(&mut raw.as_ref()) {
            Ok(ext) => {
                self.recorder
                    .record(packet.header.ssrc, ext.transport_sequence, now);
                if self.eto.is_none() {
                    self.eto = Some(now + self.interval);
                }
            }
            Err(err) => warn!(
                "bad transport-cc extension on ssrc {}: {}",
                packet.header.ssrc, err
            ),
        }
    }
}

#[interceptor]
impl<P: Interceptor> TwccReceiverInterceptor<P> {
    #[overrides]
    fn handle_read(&mut self, msg: TaggedPacket) -> Result<(), Self::Error> {
        if let Packet::Rtp(packet) = &msg.message {
            self.record(msg.now, packet);
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
                if let Some(feedback) = self.recorder.build_feedback() {
                    trace!(
                        "twcc feedback base={} count={}",
                        feedback.base_sequence_number, feedback.packet_status_count
                    );
                    self.write_queue.push_back(TaggedPacket {
                        now,
                        transport: TransportContext::default(),
                        message: Packet::Rtcp(vec![Box::new(feedback)]),
                    });
                }
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
        self.extension_ids.clear();
        self.write_queue.clear();
        self.eto = None;
        self.inner.close()
    }

    #[overrides]
    fn bind_remote_stream(&mut self, info: &StreamInfo) {
        if let Some(id) = info.header_extension_id(TRANSPORT_CC_URI) {
            if id != 0 {
                self.extension_ids.insert(info.ssrc, id);
            }
        }
        self.inner.bind_remote_stream(info);
    }

    #[overrides]
    fn unbind_remote_stream(&mut self, info: &StreamInfo) {
        self.extension_ids.remove(&info.ssrc);
        if self.extension_ids.is_empty() && self.recorder.is_empty() {
            self.eto = None;
        }
        self.inner.unbind_remote_stream(info);
    }
}
