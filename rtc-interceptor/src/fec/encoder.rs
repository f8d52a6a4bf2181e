use super::flexfec03::FlexFecEncoder;
use super::{DEFAULT_NUM_FEC_PACKETS, DEFAULT_NUM_MEDIA_PACKETS, stream_uses_fec};
use crate::stream_info::StreamInfo;
use crate::{Interceptor, Packet, TaggedPacket, interceptor};
use log::{trace, warn};
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;

/// Configures a [`FlexFecEncoderInterceptor`].
pub struct FlexFecEncoderBuilder<P> {
    num_media_packets: usize,
    num_fec_packets: usize,
    _phantom: PhantomData<P>,
}

impl<P> Default for FlexFecEncoderBuilder<P> {
    fn default() -> Self {
        Self {
            num_media_packets: DEFAULT_NUM_MEDIA_PACKETS,
            num_fec_packets: DEFAULT_NUM_FEC_PACKETS,
            _phantom: PhantomData,
        }
    }
}

impl<P> FlexFecEncoderBuilder<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_media_packets(mut self, n: usize) -> Self {
        self.num_media_packets = n;
        self
    }

    pub fn with_num_fec_packets(mut self, n: usize) -> Self {
        self.num_fec_packets = n;
        self
    }

    pub fn build(self) -> impl FnOnce(P) -> FlexFecEncoderInterceptor<P> {
        move |inner| FlexFecEncoderInterceptor {
            inner,
            num_media_packets: self.num_media_packets,
            num_fec_packets: self.num_fec_packets,
            encoders: HashMap::new(),
            write_queue: VecDeque::new(),
        }
    }
}

/// Sends FlexFEC-03 repair packets after every protection group of the local
/// streams that negotiated a repair stream.
///
/// Repair packets are computed over the packets as this interceptor sees
/// them, so it must sit inside anything that still rewrites media packets.
#[derive(Interceptor)]
pub struct FlexFecEncoderInterceptor<P> {
    #[next]
    inner: P,
    num_media_packets: usize,
    num_fec_packets: usize,
    /// Keyed by the protected media SSRC.
    encoders: HashMap<u32, FlexFecEncoder>,
    write_queue: VecDeque<TaggedPacket>,
}

#[interceptor]
impl<P: Interceptor> FlexFecEncoderInterceptor<P> {
    #[overrides]
    fn handle_write(&mut self, msg: TaggedPacket) -> Result<(), Self::Error> {
        let mut repairs = vec![];
        if let Packet::Rtp(packet) = &msg.message {
            if let Some(encoder) = self.encoders.get_mut(&packet.header.ssrc) {
                repairs = encoder.push(packet)?;
            }
        }
        let (now, transport) = (msg.now, msg.transport);
        self.inner.handle_write(msg)?;

        for repair in repairs {
            trace!(
                "flexfec repair seq={} ssrc={}",
                repair.header.sequence_number,
                repair.header.ssrc
            );
            self.write_queue.push_back(TaggedPacket {
                now,
                transport,
                message: Packet::Rtp(repair),
            });
        }
        Ok(())
    }

    /// Repair packets follow the media packets they protect.
    #[overrides]
    fn poll_write(&mut self) -> Option<Self::Wout> {
        if let Some(msg) = self.inner.poll_write() {
            return Some(msg);
        }
        self.write_queue.pop_front()
    }

    #[overrides]
    fn close(&mut self) -> Result<(), Self::Error> {
        self.encoders.clear();
        self.write_queue.clear();
        self.inner.close()
    }

    #[overrides]
    fn bind_local_stream(&mut self, info: &StreamInfo) {
        if let Some((ssrc, payload_type)) = stream_uses_fec(info) {
            match FlexFecEncoder::new(
                ssrc,
                payload_type,
                info.ssrc,
                self.num_media_packets,
                self.num_fec_packets,
            ) {
                Ok(encoder) => {
                    self.encoders.insert(info.ssrc, encoder);
                }
                Err(err) => warn!("not protecting ssrc {} with flexfec: {}", info.ssrc, err),
            }
        }
        self.inner.bind_local_stream(info);
    }

    #[overrides]
    fn unbind_local_stream(&mut self, info: &StreamInfo) {
        self.encoders.remove(&info.ssrc);
        self.inner.unbind_local_stream(info);
    }
}
