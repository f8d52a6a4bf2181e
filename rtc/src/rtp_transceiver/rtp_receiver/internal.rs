use interceptor::{Interceptor, StreamInfo};
use log::debug;
use shared::error::{Error, Result};
use unicase::UniCase;

use crate::media_stream::track::MediaStreamTrack;
use crate::peer_connection::configuration::interceptor_registry::create_stream_info;
use crate::peer_connection::configuration::media_engine::{MIME_TYPE_RTX, MediaEngine};
use crate::peer_connection::sdp::TrackDetails;
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::rtp_sender::rtp_codec::{RtpCodecKind, find_fec_payload_type};
use crate::rtp_transceiver::SSRC;

/// Receiving half of a transceiver.
///
/// Started from the remote description: the media SSRC and its repair
/// flow become known there and the stream is bound to the interceptor
/// chain. The track is surfaced to the application with the first packet.
#[derive(Default, Debug, Clone)]
pub(crate) struct RTCRtpReceiverInternal {
    pub(crate) kind: RtpCodecKind,
    pub(crate) track: Option<MediaStreamTrack>,
    pub(crate) ssrc: Option<SSRC>,
    pub(crate) fec_ssrc: Option<SSRC>,
    pub(crate) stream_info: Option<StreamInfo>,
    /// OnTrack was emitted for the current track.
    pub(crate) track_opened: bool,
}

impl RTCRtpReceiverInternal {
    pub(crate) fn new(kind: RtpCodecKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub(crate) fn is_started(&self) -> bool {
        self.stream_info.is_some()
    }

    /// Whether a packet with `ssrc` belongs to this receiver.
    pub(crate) fn has_ssrc(&self, ssrc: SSRC) -> bool {
        self.ssrc == Some(ssrc) || self.fec_ssrc == Some(ssrc)
    }

    /// Binds the remote stream announced by `details`. A receiver already
    /// bound to the same SSRC is left alone.
    pub(crate) fn start<I: Interceptor>(
        &mut self,
        details: &TrackDetails,
        media_engine: &MediaEngine,
        interceptor: &mut I,
    ) -> Result<()> {
        if self.ssrc == Some(details.ssrc) && self.is_started() {
            return Ok(());
        }
        self.stop(interceptor);

        let parameters =
            media_engine.get_rtp_parameters_by_kind(self.kind, RTCRtpTransceiverDirection::Recvonly);
        // first media codec, repair formats excluded
        let Some(codec) = parameters.codecs.iter().find(|c| {
            UniCase::new(c.rtp_codec.mime_type.as_str()) != UniCase::new(MIME_TYPE_RTX)
                && !c.rtp_codec.mime_type.to_lowercase().contains("fec")
        }) else {
            return Err(Error::ErrCodecNotFound);
        };

        let payload_type_fec = find_fec_payload_type(&parameters.codecs);
        let fec_ssrc = details.fec_ssrc.filter(|_| payload_type_fec.is_some());

        let stream_info = create_stream_info(
            details.track_id.clone(),
            details.ssrc,
            None,
            fec_ssrc,
            codec.payload_type,
            None,
            payload_type_fec,
            &codec.rtp_codec,
            &parameters.header_extensions,
        );
        interceptor.bind_remote_stream(&stream_info);

        debug!(
            "receiver for track {} started, ssrc={} fec_ssrc={:?}",
            details.track_id, details.ssrc, fec_ssrc
        );

        self.track = Some(MediaStreamTrack::new(
            details.stream_id.clone(),
            details.track_id.clone(),
            format!("remote {}", self.kind),
            self.kind,
            codec.rtp_codec.clone(),
        ));
        self.ssrc = Some(details.ssrc);
        self.fec_ssrc = fec_ssrc;
        self.stream_info = Some(stream_info);
        self.track_opened = false;

        Ok(())
    }

    pub(crate) fn stop<I: Interceptor>(&mut self, interceptor: &mut I) {
        if let Some(stream_info) = self.stream_info.take() {
            interceptor.unbind_remote_stream(&stream_info);
        }
        if let Some(track) = &mut self.track {
            track.stop();
        }
        self.ssrc = None;
        self.fec_ssrc = None;
    }
}
