use super::send_buffer::SendBuffer;
use super::stream_supports_nack;
use crate::stream_info::StreamInfo;
use crate::{Interceptor, Packet, TaggedPacket, interceptor, rtcp_packets_of};
use bytes::{BufMut, BytesMut};
use log::{debug, warn};
use rtcp::transport_feedbacks::transport_layer_nack::TransportLayerNack;
use shared::TransportContext;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::time::Instant;

/// Configures a [`NackResponderInterceptor`].
pub struct NackResponderBuilder<P> {
    size: u16,
    _phantom: PhantomData<P>,
}

impl<P> Default for NackResponderBuilder<P> {
    fn default() -> Self {
        Self {
            size: 1024,
            _phantom: PhantomData,
        }
    }
}

impl<P> NackResponderBuilder<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sent packets kept per stream, a power of two between 64
    /// and 32768.
    pub fn with_size(mut self, size: u16) -> Self {
        self.size = size;
        self
    }

    pub fn build(self) -> impl FnOnce(P) -> NackResponderInterceptor<P> {
        move |inner| NackResponderInterceptor {
            inner,
            size: self.size,
            streams: HashMap::new(),
            write_queue: VecDeque::new(),
        }
    }
}

struct Rtx {
    ssrc: u32,
    payload_type: u8,
    sequence_number: u16,
}

struct LocalStream {
    buffer: SendBuffer,
    rtx: Option<Rtx>,
}

impl LocalStream {
    /// Builds the retransmission of `seq`, or `None` if it is no longer buffered.
    fn retransmission(&mut self, seq: u16) -> Option<rtp::Packet> {
        let original = self.buffer.get(seq)?;
        let Some(rtx) = self.rtx.as_mut() else {
            return Some(original.clone());
        };

        // RFC 4588: original sequence number, then the original payload
        let mut payload = BytesMut::with_capacity(2 + original.payload.len());
        payload.put_u16(seq);
        payload.put_slice(&original.payload);

        let mut header = original.header.clone();
        header.ssrc = rtx.ssrc;
        header.payload_type = rtx.payload_type;
        header.sequence_number = rtx.sequence_number;
        header.padding = false;
        rtx.sequence_number = rtx.sequence_number.wrapping_add(1);

        Some(rtp::Packet {
            header,
            payload: payload.freeze(),
            padding_size: 0,
        })
    }
}

/// Keeps recently sent packets of NACK-capable local streams and resends
/// them when the remote side asks with a Transport-Layer NACK.
#[derive(Interceptor)]
pub struct NackResponderInterceptor<P> {
    #[next]
    inner: P,
    size: u16,
    streams: HashMap<u32, LocalStream>,
    write_queue: VecDeque<TaggedPacket>,
}

impl<P> NackResponderInterceptor<P> {
    fn handle_nack(&mut self, now: Instant, nack: &TransportLayerNack) {
        let Some(stream) = self.streams.get_mut(&nack.media_ssrc) else {
            return;
        };

        for pair in &nack.nacks {
            for seq in pair.packet_list() {
                match stream.retransmission(seq) {
                    Some(packet) => self.write_queue.push_back(TaggedPacket {
                        now,
                        transport: TransportContext::default(),
                        message: Packet::Rtp(packet),
                    }),
                    None => debug!(
                        "nack for ssrc={} seq={} no longer buffered",
                        nack.media_ssrc, seq
                    ),
                }
            }
        }
    }
}

#[interceptor]
impl<P: Interceptor> NackResponderInterceptor<P> {
    #[overrides]
    fn handle_read(&mut self, msg: TaggedPacket) -> Result<(), Self::Error> {
        let nacks: Vec<TransportLayerNack> =
            rtcp_packets_of::<TransportLayerNack>(&msg).cloned().collect();
        for nack in &nacks {
            self.handle_nack(msg.now, nack);
        }
        self.inner.handle_read(msg)
    }

    #[overrides]
    fn handle_write(&mut self, msg: TaggedPacket) -> Result<(), Self::Error> {
        if let Packet::Rtp(packet) = &msg.message {
            if let Some(stream) = self.streams.get_mut(&packet.header.ssrc) {
                stream.buffer.add(packet.clone());
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
    fn close(&mut self) -> Result<(), Self::Error> {
        self.streams.clear();
        self.write_queue.clear();
        self.inner.close()
    }

    #[overrides]
    fn bind_local_stream(&mut self, info: &StreamInfo) {
        if stream_supports_nack(info) {
            match SendBuffer::new(self.size) {
                Ok(buffer) => {
                    let rtx = match (info.ssrc_rtx, info.payload_type_rtx) {
                        (Some(ssrc), Some(payload_type)) => Some(Rtx {
                            ssrc,
                            payload_type,
                            sequence_number: rand::random(),
                        }),
                        _ => None,
                    };
                    self.streams.insert(info.ssrc, LocalStream { buffer, rtx });
                }
                Err(err) => warn!("not buffering ssrc {} for nack: {}", info.ssrc, err),
            }
        }
        self.inner.bind_local_stream(info);
    }

    #[overrides]
    fn unbind_local_stream(&mut self, info: &StreamInfo) {
        self.streams.remove(&info.ssrc);
        self.inner.unbind_local_stream(info);
    }
}
