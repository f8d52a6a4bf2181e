use interceptor::{Interceptor, StreamInfo};
use log::{debug, warn};
use rtp::packetizer::{Packetizer, new_packetizer};
use rtp::sequence::new_random_sequencer;
use shared::error::{Error, Result};

use crate::media_stream::track::MediaStreamTrack;
use crate::peer_connection::configuration::interceptor_registry::create_stream_info;
use crate::peer_connection::configuration::media_engine::MediaEngine;
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::rtp_sender::rtp_codec::{
    CodecMatch, RTCRtpCodecParameters, RtpCodecKind, codec_parameters_fuzzy_search,
    find_fec_payload_type,
};
use crate::rtp_transceiver::{PayloadType, SSRC};

/// Largest RTP packet the packetizer produces, headers included.
pub(crate) const RTP_OUTBOUND_MTU: usize = 1200;

/// Sending half of a transceiver.
///
/// The SSRCs are picked at creation so that they can be announced in the
/// first offer. The stream is bound to the interceptor chain and the
/// packetizer is built once negotiation settled on a codec.
#[derive(Default, Debug, Clone)]
pub(crate) struct RTCRtpSenderInternal {
    pub(crate) kind: RtpCodecKind,
    pub(crate) track: Option<MediaStreamTrack>,
    pub(crate) ssrc: SSRC,
    /// Repair flow for FlexFEC, video only.
    pub(crate) ssrc_fec: Option<SSRC>,

    pub(crate) send_codec: Option<RTCRtpCodecParameters>,
    pub(crate) payload_type_fec: Option<PayloadType>,
    pub(crate) packetizer: Option<Box<dyn Packetizer + Send + Sync>>,
    pub(crate) stream_info: Option<StreamInfo>,

    /// Set by an incoming PLI or FIR, cleared by the next written sample.
    pub(crate) keyframe_requested: bool,
}

impl RTCRtpSenderInternal {
    pub(crate) fn new(kind: RtpCodecKind, track: Option<MediaStreamTrack>) -> Self {
        Self {
            kind,
            track,
            ssrc: rand::random::<u32>(),
            ssrc_fec: if kind == RtpCodecKind::Video {
                Some(rand::random::<u32>())
            } else {
                None
            },
            ..Default::default()
        }
    }

    pub(crate) fn is_started(&self) -> bool {
        self.stream_info.is_some()
    }

    pub(crate) fn track_id(&self) -> Option<&str> {
        self.track.as_ref().map(|t| t.track_id().as_str())
    }

    /// Binds the outgoing stream once a codec for the track was negotiated.
    /// Does nothing without a track or when already started.
    pub(crate) fn start<I: Interceptor>(
        &mut self,
        media_engine: &MediaEngine,
        interceptor: &mut I,
    ) -> Result<()> {
        if self.is_started() {
            return Ok(());
        }
        let Some(track) = &self.track else {
            return Ok(());
        };

        let parameters =
            media_engine.get_rtp_parameters_by_kind(self.kind, RTCRtpTransceiverDirection::Sendonly);
        let (codec, match_type) = codec_parameters_fuzzy_search(track.codec(), &parameters.codecs);
        if match_type == CodecMatch::None {
            return Err(Error::ErrCodecNotFound);
        }

        let payload_type_fec = find_fec_payload_type(&parameters.codecs);
        let ssrc_fec = self.ssrc_fec.filter(|_| payload_type_fec.is_some());

        let stream_info = create_stream_info(
            track.track_id().clone(),
            self.ssrc,
            None,
            ssrc_fec,
            codec.payload_type,
            None,
            payload_type_fec,
            &codec.rtp_codec,
            &parameters.header_extensions,
        );
        interceptor.bind_local_stream(&stream_info);

        self.packetizer = match codec.rtp_codec.payloader() {
            Ok(payloader) => Some(Box::new(new_packetizer(
                RTP_OUTBOUND_MTU,
                codec.payload_type,
                self.ssrc,
                payloader,
                Box::new(new_random_sequencer()),
                codec.rtp_codec.clock_rate,
            ))),
            Err(err) => {
                warn!("no packetizer for {}: {}", codec.rtp_codec.mime_type, err);
                None
            }
        };

        debug!(
            "sender of track {} started with {} pt={} ssrc={}",
            track.track_id(),
            codec.rtp_codec.mime_type,
            codec.payload_type,
            self.ssrc
        );

        self.send_codec = Some(codec);
        self.payload_type_fec = payload_type_fec;
        self.stream_info = Some(stream_info);

        Ok(())
    }

    pub(crate) fn stop<I: Interceptor>(&mut self, interceptor: &mut I) {
        if let Some(stream_info) = self.stream_info.take() {
            interceptor.unbind_local_stream(&stream_info);
        }
        self.send_codec = None;
        self.payload_type_fec = None;
        self.packetizer = None;
        self.keyframe_requested = false;
    }
}
