
pub mod direction;
pub(crate) mod fmtp;
pub mod rtp_receiver;
pub mod rtp_sender;

use std::collections::HashMap;
use std::fmt;

use log::trace;
use sdp::description::media::MediaDescription;
use shared::error::{Error, Result};
use unicase::UniCase;

use crate::media_stream::track::MediaStreamTrack;
use crate::peer_connection::configuration::media_engine::{MIME_TYPE_RTX, MediaEngine};
use crate::peer_connection::sdp::codecs_from_media_description;
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::rtp_receiver::internal::RTCRtpReceiverInternal;
use crate::rtp_transceiver::rtp_sender::internal::RTCRtpSenderInternal;
use crate::rtp_transceiver::rtp_sender::rtp_codec::{
    CodecMatch, RTCRtpCodecParameters, RtpCodecKind, codec_parameters_fuzzy_search,
    find_rtx_payload_type,
};

/// SSRC represents a synchronization source
/// A synchronization source is a randomly chosen
/// value meant to be globally unique within a particular
/// RTP session. Used to identify a single stream of media.
/// <https://tools.ietf.org/html/rfc3550#section-3>
#[allow(clippy::upper_case_acronyms)]
pub type SSRC = u32;

/// PayloadType identifies the format of the RTP payload and determines
/// its interpretation by the application. Each codec in a RTP Session
/// will have a different payload_type
/// <https://tools.ietf.org/html/rfc3550#section-3>
pub type PayloadType = u8;

/// Index of a transceiver in its peer connection. Transceivers are never
/// removed, so an id stays valid for the life of the connection.
pub type RTCRtpTransceiverId = usize;

#[derive(Default, Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct RTCRtpSenderId(pub(crate) RTCRtpTransceiverId);

#[derive(Default, Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct RTCRtpReceiverId(pub(crate) RTCRtpTransceiverId);

impl From<RTCRtpSenderId> for RTCRtpTransceiverId {
    fn from(id: RTCRtpSenderId) -> Self {
        id.0
    }
}

impl From<RTCRtpReceiverId> for RTCRtpTransceiverId {
    fn from(id: RTCRtpReceiverId) -> Self {
        id.0
    }
}

/// Options of [`add_transceiver_from_kind`](crate::peer_connection::RTCPeerConnection::add_transceiver_from_kind).
#[derive(Default, Debug, Clone)]
pub struct RTCRtpTransceiverInit {
    pub direction: RTCRtpTransceiverDirection,
}

/// A sender and a receiver sharing one media section and mid.
///
/// * [W3C RTCRtpTransceiver](https://w3c.github.io/webrtc-pc/#rtcrtptransceiver-interface)
#[derive(Default, Clone)]
pub struct RTCRtpTransceiver {
    pub(crate) mid: Option<String>,
    pub(crate) kind: RtpCodecKind,
    pub(crate) direction: RTCRtpTransceiverDirection,
    pub(crate) current_direction: RTCRtpTransceiverDirection,
    pub(crate) preferred_codecs: Vec<RTCRtpCodecParameters>,
    pub(crate) stopped: bool,

    pub(crate) sender: RTCRtpSenderInternal,
    pub(crate) receiver: RTCRtpReceiverInternal,
}

impl fmt::Debug for RTCRtpTransceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RTCRtpTransceiver")
            .field("mid", &self.mid)
            .field("kind", &self.kind)
            .field("direction", &self.direction)
            .field("current_direction", &self.current_direction)
            .field("preferred_codecs", &self.preferred_codecs)
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl RTCRtpTransceiver {
    pub(crate) fn new(
        kind: RtpCodecKind,
        track: Option<MediaStreamTrack>,
        direction: RTCRtpTransceiverDirection,
    ) -> Self {
        Self {
            mid: None,
            kind,
            direction,
            current_direction: RTCRtpTransceiverDirection::Unspecified,
            preferred_codecs: vec![],
            stopped: false,

            sender: RTCRtpSenderInternal::new(kind, track),
            receiver: RTCRtpReceiverInternal::new(kind),
        }
    }

    /// mid gets the Transceiver's mid value. When not already set, this value will be set in CreateOffer or create_answer.
    pub fn mid(&self) -> Option<&str> {
        self.mid.as_deref()
    }

    pub fn kind(&self) -> RtpCodecKind {
        self.kind
    }

    /// direction returns the RTPTransceiver's desired direction.
    pub fn direction(&self) -> RTCRtpTransceiverDirection {
        self.direction
    }

    /// current_direction returns the RTPTransceiver's current direction as negotiated.
    ///
    /// If this transceiver has never been negotiated or if it's stopped this returns [`RTCRtpTransceiverDirection::Unspecified`].
    pub fn current_direction(&self) -> RTCRtpTransceiverDirection {
        self.current_direction
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// The track this transceiver sends, if any.
    pub fn sender_track(&self) -> Option<&MediaStreamTrack> {
        self.sender.track.as_ref()
    }

    /// The remote track, once the first packet of it arrived.
    pub fn receiver_track(&self) -> Option<&MediaStreamTrack> {
        self.receiver.track.as_ref()
    }

    /// Returns true when the direction changed.
    pub(crate) fn set_direction(&mut self, direction: RTCRtpTransceiverDirection) -> bool {
        let previous_direction = self.direction;
        self.direction = direction;

        if direction != previous_direction {
            trace!("Changing direction of transceiver from {previous_direction} to {direction}");
            true
        } else {
            false
        }
    }

    pub(crate) fn set_current_direction(&mut self, d: RTCRtpTransceiverDirection) {
        let previous = self.current_direction;
        self.current_direction = d;

        if d != previous {
            trace!("Changing current direction of transceiver from {previous} to {d}");
        }
    }

    /// stop irreversibly stops the RTPTransceiver
    pub(crate) fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.direction = RTCRtpTransceiverDirection::Inactive;
        self.current_direction = RTCRtpTransceiverDirection::Inactive;
    }

    /// set_codec_preferences sets preferred list of supported codecs
    /// if codecs is empty we reset to default from MediaEngine
    pub(crate) fn set_codec_preferences(
        &mut self,
        codecs: Vec<RTCRtpCodecParameters>,
        media_engine: &MediaEngine,
    ) -> Result<()> {
        let media_engine_codecs = media_engine.get_codecs_by_kind(self.kind);
        for codec in &codecs {
            let (_, match_type) =
                codec_parameters_fuzzy_search(&codec.rtp_codec, &media_engine_codecs);
            if match_type == CodecMatch::None {
                return Err(Error::ErrRTPTransceiverCodecUnsupported);
            }
        }

        self.preferred_codecs = codecs;

        Ok(())
    }

    /// Codecs to offer or answer with: the preferred ones that the media
    /// engine still supports, or everything the media engine has.
    pub(crate) fn get_codecs(&self, media_engine: &MediaEngine) -> Vec<RTCRtpCodecParameters> {
        let media_engine_codecs = media_engine.get_codecs_by_kind(self.kind);
        if self.preferred_codecs.is_empty() {
            return media_engine_codecs;
        }

        let mut filtered_codecs = vec![];
        for codec in &self.preferred_codecs {
            let (c, match_type) =
                codec_parameters_fuzzy_search(&codec.rtp_codec, &media_engine_codecs);
            if match_type != CodecMatch::None && !filtered_codecs.contains(&c) {
                filtered_codecs.push(c);
            }
        }

        filtered_codecs
    }

    /// set_mid sets the RTPTransceiver's mid. If it was already set, will return an error.
    pub(crate) fn set_mid(&mut self, mid: String) -> Result<()> {
        if self.mid.is_some() {
            return Err(Error::ErrRTPTransceiverCannotChangeMid);
        }

        self.mid = Some(mid);
        Ok(())
    }

    /// Orders the codecs of a transceiver created for a remote offer the
    /// way the offer lists them, using the payload types of the media
    /// engine.
    pub(crate) fn set_codec_preferences_from_remote_description(
        &mut self,
        media: &MediaDescription,
        media_engine: &MediaEngine,
    ) -> Result<()> {
        let mut remote_codecs = codecs_from_media_description(media)?;

        // shrinks as codecs get matched
        let mut left_codecs = media_engine.get_codecs_by_kind(self.kind);

        // remote payload type -> media engine payload type, for rtx
        let mut payload_mapping = HashMap::new();
        let mut filter_by_match = |match_filter: CodecMatch| -> Vec<RTCRtpCodecParameters> {
            let mut filtered_codecs = vec![];
            for remote_codec_idx in (0..remote_codecs.len()).rev() {
                let remote_codec = &mut remote_codecs[remote_codec_idx];
                if UniCase::new(remote_codec.rtp_codec.mime_type.as_str())
                    == UniCase::new(MIME_TYPE_RTX)
                {
                    continue;
                }

                let (match_codec, match_type) =
                    codec_parameters_fuzzy_search(&remote_codec.rtp_codec, &left_codecs);
                if match_type == match_filter {
                    payload_mapping.insert(remote_codec.payload_type, match_codec.payload_type);

                    remote_codec.payload_type = match_codec.payload_type;
                    filtered_codecs.insert(0, remote_codec.clone());

                    remote_codecs.remove(remote_codec_idx);

                    let needle_fmtp = match_codec.rtp_codec.fmtp();
                    if let Some(left_codec_idx) = left_codecs
                        .iter()
                        .position(|c| needle_fmtp.match_fmtp(&*c.rtp_codec.fmtp()))
                    {
                        left_codecs.remove(left_codec_idx);
                    }
                }
            }

            filtered_codecs
        };

        let mut filtered_codecs = filter_by_match(CodecMatch::Exact);
        filtered_codecs.append(&mut filter_by_match(CodecMatch::Partial));

        for (remote_payload_type, media_engine_payload_type) in payload_mapping {
            if find_rtx_payload_type(remote_payload_type, &remote_codecs).is_none() {
                continue;
            }

            if let Some(media_engine_rtx) =
                find_rtx_payload_type(media_engine_payload_type, &left_codecs)
            {
                if let Some(rtx_codec) = left_codecs
                    .iter()
                    .find(|c| c.payload_type == media_engine_rtx)
                {
                    filtered_codecs.push(rtx_codec.clone());
                }
            }
        }

        self.set_codec_preferences(filtered_codecs, media_engine)
    }
}

pub(crate) fn find_by_mid(mid: &str, local_transceivers: &[RTCRtpTransceiver]) -> Option<usize> {
    local_transceivers
        .iter()
        .position(|t| t.mid.as_deref() == Some(mid))
}

/// Index of an unassigned transceiver that can take a remote media section
/// of `remote_kind` offered with `remote_direction`. Transceivers whose
/// direction fits best are preferred.
pub(crate) fn satisfy_type_and_direction(
    remote_kind: RtpCodecKind,
    remote_direction: RTCRtpTransceiverDirection,
    local_transceivers: &[RTCRtpTransceiver],
) -> Option<usize> {
    let preferred_directions = match remote_direction {
        RTCRtpTransceiverDirection::Sendrecv => vec![
            RTCRtpTransceiverDirection::Recvonly,
            RTCRtpTransceiverDirection::Sendrecv,
        ],
        RTCRtpTransceiverDirection::Sendonly => vec![RTCRtpTransceiverDirection::Recvonly],
        RTCRtpTransceiverDirection::Recvonly => vec![
            RTCRtpTransceiverDirection::Sendonly,
            RTCRtpTransceiverDirection::Sendrecv,
        ],
        _ => vec![],
    };

    for possible_direction in preferred_directions {
        if let Some(index) = local_transceivers.iter().position(|t| {
            t.mid.is_none()
                && !t.stopped
                && t.kind == remote_kind
                && possible_direction == t.direction
        }) {
            return Some(index);
        }
    }

    None
}
