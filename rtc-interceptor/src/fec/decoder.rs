use super::flexfec03::FlexFecDecoder;
use super::stream_uses_fec;
use crate::stream_info::StreamInfo;
use crate::{Interceptor, Packet, TaggedPacket, interceptor};
use log::{debug, warn};
use shared::TransportContext;
use shared::error::Error;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Instant;

/// Configures a [`FlexFecDecoderInterceptor`].
pub struct FlexFecDecoderBuilder<P> {
    _phantom: PhantomData<P>,
}

impl<P> Default for FlexFecDecoderBuilder<P> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<P> FlexFecDecoderBuilder<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> impl FnOnce(P) -> FlexFecDecoderInterceptor<P> {
        move |inner| FlexFecDecoderInterceptor {
            inner,
            decoders: HashMap::new(),
            repair_ssrcs: HashMap::new(),
        }
    }
}

/// Consumes incoming FlexFEC-03 repair packets and hands the media packets
/// they recover to the rest of the chain as if they had arrived.
#[derive(Interceptor)]
pub struct FlexFecDecoderInterceptor<P> {
    #[next]
    inner: P,
    /// Keyed by the protected media SSRC.
    decoders: HashMap<u32, FlexFecDecoder>,
    /// Repair SSRC to protected media SSRC.
    repair_ssrcs: HashMap<u32, u32>,
}

impl<P: Interceptor> FlexFecDecoderInterceptor<P> {
    fn forward_recovered(
        &mut self,
        now: Instant,
        transport: TransportContext,
        recovered: Vec<rtp::Packet>,
    ) -> Result<(), Error> {
        for packet in recovered {
            debug!(
                "flexfec recovered ssrc={} seq={}",
                packet.header.ssrc, packet.header.sequence_number
            );
            self.inner.handle_read(TaggedPacket {
                now,
                transport,
                message: Packet::Rtp(packet),
            })?;
        }
        Ok(())
    }
}

#[interceptor]
impl<P: Interceptor> FlexFecDecoderInterceptor<P> {
    #[overrides]
    fn handle_read(&mut self, msg: TaggedPacket) -> Result<(), Self::Error> {
        let Packet::Rtp(packet) = &msg.message else {
            return self.inner.handle_read(msg);
        };
        let ssrc = packet.header.ssrc;

        if let Some(media_ssrc) = self.repair_ssrcs.get(&ssrc).copied() {
            let recovered = match self.decoders.get_mut(&media_ssrc) {
                Some(decoder) => decoder.push_repair(packet).unwrap_or_else(|err| {
                    warn!("bad flexfec repair packet on ssrc {}: {}", ssrc, err);
                    vec![]
                }),
                None => vec![],
            };
            // repair packets stop here
            return self.forward_recovered(msg.now, msg.transport, recovered);
        }

        let recovered = match self.decoders.get_mut(&ssrc) {
            Some(decoder) => decoder.push_media(packet).unwrap_or_else(|err| {
                warn!("flexfec cannot buffer ssrc {}: {}", ssrc, err);
                vec![]
            }),
            None => vec![],
        };
        let (now, transport) = (msg.now, msg.transport);
        self.inner.handle_read(msg)?;
        self.forward_recovered(now, transport, recovered)
    }

    #[overrides]
    fn close(&mut self) -> Result<(), Self::Error> {
        self.decoders.clear();
        self.repair_ssrcs.clear();
        self.inner.close()
    }

    #[overrides]
    fn bind_remote_stream(&mut self, info: &StreamInfo) {
        if let Some((repair_ssrc, _)) = stream_uses_fec(info) {
            self.repair_ssrcs.insert(repair_ssrc, info.ssrc);
            self.decoders
                .insert(info.ssrc, FlexFecDecoder::new(info.ssrc));
        }
        self.inner.bind_remote_stream(info);
    }

    #[overrides]
    fn unbind_remote_stream(&mut self, info: &StreamInfo) {
        if let Some(repair_ssrc) = info.ssrc_fec {
            self.repair_ssrcs.remove(&repair_ssrc);
        }
        self.decoders.remove(&info.ssrc);
        self.inner.unbind_remote_stream(info);
    }
}
