use super::TRANSPORT_CC_URI;
use crate::stream_info::StreamInfo;
use crate::{Interceptor, Packet, TaggedPacket, interceptor};
use log::warn;
use rtp::extension::transport_cc_extension::TransportCcExtension;
use shared::marshal::Marshal;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Configures a [`TwccSenderInterceptor`].
pub struct TwccSenderBuilder<P> {
    initial_sequence_number: u16,
    _phantom: PhantomData<P>,
}

impl<P> Default for TwccSenderBuilder<P> {
    fn default() -> Self {
        Self {
            initial_sequence_number: 0,
            _phantom: PhantomData,
        }
    }
}

impl<P> TwccSenderBuilder<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_sequence_number(mut self, seq: u16) -> Self {
        self.initial_sequence_number = seq;
        self
    }

    pub fn build(self) -> impl FnOnce(P) -> TwccSenderInterceptor<P> {
        move |inner| TwccSenderInterceptor {
            inner,
            next_sequence_number: self.initial_sequence_number,
            extension_ids: HashMap::new(),
        }
    }
}

/// Writes the transport-wide sequence number extension into every packet of
/// the local streams that negotiated it.
#[derive(Interceptor)]
pub struct TwccSenderInterceptor<P> {
    #[next]
    inner: P,
    next_sequence_number: u16,
    /// Negotiated extension id per local SSRC.
    extension_ids: HashMap<u32, u8>,
}

#[interceptor]
impl<P: Interceptor> TwccSenderInterceptor<P> {
    #[overrides]
    fn handle_write(&mut self, mut msg: TaggedPacket) -> Result<(), Self::Error> {
        if let Packet::Rtp(packet) = &mut msg.message {
            if let Some(&id) = self.extension_ids.get(&packet.header.ssrc) {
                let ext = TransportCcExtension {
                    transport_sequence: self.next_sequence_number,
                };
                self.next_sequence_number = self.next_sequence_number.wrapping_add(1);
                packet.header.set_extension(id, ext.marshal()?)?;
            }
        }
        self.inner.handle_write(msg)
    }

    #[overrides]
    fn close(&mut self) -> Result<(), Self::Error> {
        self.extension_ids.clear();
        self.inner.close()
    }

    #[overrides]
    fn bind_local_stream(&mut self, info: &StreamInfo) {
        match info.header_extension_id(TRANSPORT_CC_URI) {
            Some(0) => warn!("ignoring transport-cc extension id 0 on ssrc {}", info.ssrc),
            Some(id) => {
                self.extension_ids.insert(info.ssrc, id);
            }
            None => {}
        }
        self.inner.bind_local_stream(info);
    }

    #[overrides]
    fn unbind_local_stream(&mut self, info: &StreamInfo) {
        self.extension_ids.remove(&info.ssrc);
        self.inner.unbind_local_stream(info);
    }
}
