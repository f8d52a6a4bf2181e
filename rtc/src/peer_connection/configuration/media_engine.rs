//! Codec and RTP header extension registry.
//!
//! A [`MediaEngine`] lists what this endpoint can send and receive. Offers are
//! built from it, and once a remote description arrives it also records what
//! was negotiated: the payload types the remote picked and the header
//! extension ids it uses.
//!
//! ```
//! use rtc::peer_connection::configuration::media_engine::{MediaEngine, MIME_TYPE_OPUS};
//! use rtc::rtp_transceiver::rtp_sender::{RTCRtpCodec, RTCRtpCodecParameters, RtpCodecKind};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut media_engine = MediaEngine::default();
//! media_engine.register_codec(
//!     RTCRtpCodecParameters {
//!         rtp_codec: RTCRtpCodec {
//!             mime_type: MIME_TYPE_OPUS.to_owned(),
//!             clock_rate: 48000,
//!             channels: 2,
//!             sdp_fmtp_line: "minptime=10;useinbandfec=1;stereo=1".to_owned(),
//!             rtcp_feedback: vec![],
//!         },
//!         payload_type: 111,
//!     },
//!     RtpCodecKind::Audio,
//! )?;
//! # Ok(())
//! # }
//! ```

#[cfg(test)]
mod media_engine_test;

use std::collections::HashMap;
use std::ops::Range;

use sdp::description::media::MediaDescription;
use sdp::description::session::SessionDescription;
use unicase::UniCase;

use crate::peer_connection::sdp::{
    codecs_from_media_description, rtp_extensions_from_media_description,
};
use crate::rtp_transceiver::PayloadType;
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::rtp_sender::rtcp_parameters::RTCPFeedback;
use crate::rtp_transceiver::rtp_sender::rtp_codec::{
    CodecMatch, RTCRtpCodec, RTCRtpCodecParameters, RtpCodecKind,
    codec_parameters_fuzzy_search, rtcp_feedback_intersection,
};
use crate::rtp_transceiver::rtp_sender::rtp_parameters::{
    RTCRtpHeaderExtensionCapability, RTCRtpHeaderExtensionParameters, RTCRtpParameters,
};
use shared::error::{Error, Result};

pub const MIME_TYPE_H264: &str = "video/H264";
pub const MIME_TYPE_OPUS: &str = "audio/opus";
pub const MIME_TYPE_VP8: &str = "video/VP8";
pub const MIME_TYPE_VP9: &str = "video/VP9";
pub const MIME_TYPE_AV1: &str = "video/AV1";
pub const MIME_TYPE_G722: &str = "audio/G722";
/// G.711 mu-law
pub const MIME_TYPE_PCMU: &str = "audio/PCMU";
/// G.711 A-law
pub const MIME_TYPE_PCMA: &str = "audio/PCMA";
/// RFC 4588 retransmission, paired with a media codec through `apt`
pub const MIME_TYPE_RTX: &str = "video/rtx";
/// Prefix shared by every FlexFEC variant, lowercase
pub const MIME_TYPE_FLEX_FEC: &str = "video/flexfec";
pub const MIME_TYPE_FLEX_FEC03: &str = "video/flexfec-03";
pub const MIME_TYPE_ULP_FEC: &str = "video/ulpfec";
/// DTMF tones
pub const MIME_TYPE_TELEPHONE_EVENT: &str = "audio/telephone-event";

const VALID_EXT_IDS: Range<u16> = 1..15;

#[derive(Default, Debug, Clone)]
pub(crate) struct MediaEngineHeaderExtension {
    pub(crate) uri: String,
    pub(crate) is_audio: bool,
    pub(crate) is_video: bool,
    pub(crate) allowed_direction: Option<RTCRtpTransceiverDirection>,
}

impl MediaEngineHeaderExtension {
    pub(crate) fn is_matching_direction(&self, dir: RTCRtpTransceiverDirection) -> bool {
        if let Some(allowed_direction) = self.allowed_direction {
            use RTCRtpTransceiverDirection::*;
            allowed_direction == Inactive && dir == Inactive
                || allowed_direction.has_send() && dir.has_send()
                || allowed_direction.has_recv() && dir.has_recv()
        } else {
            true
        }
    }

    fn is_kind(&self, typ: RtpCodecKind) -> bool {
        self.is_audio && typ == RtpCodecKind::Audio || self.is_video && typ == RtpCodecKind::Video
    }
}

/// Codecs and header extensions of one peer connection.
///
/// The engine is cloned into each [`RTCPeerConnection`](crate::peer_connection::RTCPeerConnection),
/// so negotiation state never leaks between connections built from the same
/// configuration.
#[derive(Default, Debug, Clone)]
pub struct MediaEngine {
    // set once a remote description carried a section of that kind
    pub(crate) negotiated_video: bool,
    pub(crate) negotiated_audio: bool,
    pub(crate) negotiate_multi_codecs: bool,

    pub(crate) video_codecs: Vec<RTCRtpCodecParameters>,
    pub(crate) audio_codecs: Vec<RTCRtpCodecParameters>,
    pub(crate) negotiated_video_codecs: Vec<RTCRtpCodecParameters>,
    pub(crate) negotiated_audio_codecs: Vec<RTCRtpCodecParameters>,

    pub(crate) header_extensions: Vec<MediaEngineHeaderExtension>,
    pub(crate) negotiated_header_extensions: HashMap<u16, MediaEngineHeaderExtension>,
}

fn codec(
    mime_type: &str,
    clock_rate: u32,
    channels: u16,
    sdp_fmtp_line: &str,
    rtcp_feedback: Vec<RTCPFeedback>,
    payload_type: PayloadType,
) -> RTCRtpCodecParameters {
    RTCRtpCodecParameters {
        rtp_codec: RTCRtpCodec {
            mime_type: mime_type.to_owned(),
            clock_rate,
            channels,
            sdp_fmtp_line: sdp_fmtp_line.to_owned(),
            rtcp_feedback,
        },
        payload_type,
    }
}

impl MediaEngine {
    /// Registers Opus, G722, PCMU and PCMA for audio, and VP8, VP9, H264 and
    /// AV1 with their rtx companions plus ulpfec for video.
    pub fn register_default_codecs(&mut self) -> Result<()> {
        for c in [
            codec(MIME_TYPE_OPUS, 48000, 2, "minptime=10;useinbandfec=1", vec![], 111),
            codec(MIME_TYPE_G722, 8000, 0, "", vec![], 9),
            codec(MIME_TYPE_PCMU, 8000, 0, "", vec![], 0),
            codec(MIME_TYPE_PCMA, 8000, 0, "", vec![], 8),
        ] {
            self.register_codec(c, RtpCodecKind::Audio)?;
        }

        let fb = vec![
            RTCPFeedback {
                typ: "goog-remb".to_owned(),
                parameter: "".to_owned(),
            },
            RTCPFeedback {
                typ: "ccm".to_owned(),
                parameter: "fir".to_owned(),
            },
            RTCPFeedback {
                typ: "nack".to_owned(),
                parameter: "".to_owned(),
            },
            RTCPFeedback {
                typ: "nack".to_owned(),
                parameter: "pli".to_owned(),
            },
        ];
        for c in [
            codec(MIME_TYPE_VP8, 90000, 0, "", fb.clone(), 96),
            codec(MIME_TYPE_RTX, 90000, 0, "apt=96", vec![], 97),
            codec(MIME_TYPE_VP9, 90000, 0, "profile-id=0", fb.clone(), 98),
            codec(MIME_TYPE_RTX, 90000, 0, "apt=98", vec![], 99),
            codec(MIME_TYPE_VP9, 90000, 0, "profile-id=1", fb.clone(), 100),
            codec(MIME_TYPE_RTX, 90000, 0, "apt=100", vec![], 101),
            codec(
                MIME_TYPE_H264,
                90000,
                0,
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f",
                fb.clone(),
                102,
            ),
            codec(MIME_TYPE_RTX, 90000, 0, "apt=102", vec![], 103),
            codec(
                MIME_TYPE_H264,
                90000,
                0,
                "level-asymmetry-allowed=1;packetization-mode=0;profile-level-id=42001f",
                fb.clone(),
                127,
            ),
            codec(
                MIME_TYPE_H264,
                90000,
                0,
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f",
                fb.clone(),
                125,
            ),
            codec(
                MIME_TYPE_H264,
                90000,
                0,
                "level-asymmetry-allowed=1;packetization-mode=0;profile-level-id=42e01f",
                fb.clone(),
                108,
            ),
            codec(
                MIME_TYPE_H264,
                90000,
                0,
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=640032",
                fb.clone(),
                123,
            ),
            codec(MIME_TYPE_AV1, 90000, 0, "profile=0", fb, 41),
            codec(MIME_TYPE_RTX, 90000, 0, "apt=41", vec![], 42),
            codec(MIME_TYPE_ULP_FEC, 90000, 0, "", vec![], 116),
        ] {
            self.register_codec(c, RtpCodecKind::Video)?;
        }

        Ok(())
    }

    fn add_codec(codecs: &mut Vec<RTCRtpCodecParameters>, codec: RTCRtpCodecParameters) {
        for c in codecs.iter() {
            if c.rtp_codec.mime_type == codec.rtp_codec.mime_type
                && c.payload_type == codec.payload_type
            {
                return;
            }
        }
        codecs.push(codec);
    }

    /// Adds a codec to the list offered and accepted for `typ`. Registering
    /// the same mime type and payload type twice is a no-op.
    pub fn register_codec(&mut self, codec: RTCRtpCodecParameters, typ: RtpCodecKind) -> Result<()> {
        match typ {
            RtpCodecKind::Audio => {
                MediaEngine::add_codec(&mut self.audio_codecs, codec);
                Ok(())
            }
            RtpCodecKind::Video => {
                MediaEngine::add_codec(&mut self.video_codecs, codec);
                Ok(())
            }
            RtpCodecKind::Unspecified => Err(Error::ErrUnknownType),
        }
    }

    /// Adds a header extension for `typ`. `allowed_direction` limits the
    /// transceivers it is offered on; `None` means every direction.
    pub fn register_header_extension(
        &mut self,
        extension: RTCRtpHeaderExtensionCapability,
        typ: RtpCodecKind,
        allowed_direction: Option<RTCRtpTransceiverDirection>,
    ) -> Result<()> {
        if let Some(direction) = allowed_direction {
            if direction == RTCRtpTransceiverDirection::Unspecified
                || direction == RTCRtpTransceiverDirection::Inactive
            {
                return Err(Error::ErrRegisterHeaderExtensionInvalidDirection);
            }
        }

        let index = match self
            .header_extensions
            .iter()
            .position(|ext| ext.uri == extension.uri)
        {
            Some(index) => index,
            None => {
                if self.header_extensions.len() >= VALID_EXT_IDS.len() {
                    return Err(Error::ErrRegisterHeaderExtensionNoFreeID);
                }
                self.header_extensions
                    .push(MediaEngineHeaderExtension::default());
                self.header_extensions.len() - 1
            }
        };

        let ext = &mut self.header_extensions[index];
        if typ == RtpCodecKind::Audio {
            ext.is_audio = true;
        } else if typ == RtpCodecKind::Video {
            ext.is_video = true;
        }
        ext.uri = extension.uri;
        ext.allowed_direction = allowed_direction;

        Ok(())
    }

    /// Appends `feedback` to every codec of `typ` registered so far.
    pub fn register_feedback(&mut self, feedback: RTCPFeedback, typ: RtpCodecKind) {
        let codecs = match typ {
            RtpCodecKind::Video => &mut self.video_codecs,
            RtpCodecKind::Audio => &mut self.audio_codecs,
            RtpCodecKind::Unspecified => return,
        };
        for c in codecs {
            if !c.rtp_codec.rtcp_feedback.contains(&feedback) {
                c.rtp_codec.rtcp_feedback.push(feedback.clone());
            }
        }
    }

    /// Negotiated id of `extension` and whether it is in use for audio and
    /// video. `(0, false, false)` until a remote description is applied.
    pub fn get_header_extension_id(
        &self,
        extension: RTCRtpHeaderExtensionCapability,
    ) -> (u16, bool, bool) {
        for (id, h) in &self.negotiated_header_extensions {
            if extension.uri == h.uri {
                return (*id, h.is_audio, h.is_video);
            }
        }

        (0, false, false)
    }

    /// Registered codecs and extensions without any negotiation state.
    pub(crate) fn clone_to(&self) -> Self {
        MediaEngine {
            video_codecs: self.video_codecs.clone(),
            audio_codecs: self.audio_codecs.clone(),
            header_extensions: self.header_extensions.clone(),
            negotiate_multi_codecs: self.negotiate_multi_codecs,
            ..Default::default()
        }
    }

    pub(crate) fn set_multi_codec_negotiation(&mut self, negotiate_multi_codecs: bool) {
        self.negotiate_multi_codecs = negotiate_multi_codecs;
    }

    pub(crate) fn get_codec_by_payload(
        &self,
        payload_type: PayloadType,
    ) -> Result<(RTCRtpCodecParameters, RtpCodecKind)> {
        let search = [
            (self.negotiated_video, &self.negotiated_video_codecs, RtpCodecKind::Video),
            (self.negotiated_audio, &self.negotiated_audio_codecs, RtpCodecKind::Audio),
            (!self.negotiated_video, &self.video_codecs, RtpCodecKind::Video),
            (!self.negotiated_audio, &self.audio_codecs, RtpCodecKind::Audio),
        ];
        for (enabled, codecs, typ) in search {
            if !enabled {
                continue;
            }
            if let Some(codec) = codecs.iter().find(|c| c.payload_type == payload_type) {
                return Ok((codec.clone(), typ));
            }
        }

        Err(Error::ErrCodecNotFound)
    }

    /// Finds the local codec a remote one corresponds to. An rtx codec only
    /// matches when the codec its `apt` points at matched, and never better.
    pub(crate) fn match_remote_codec(
        &self,
        remote_codec: &RTCRtpCodecParameters,
        typ: RtpCodecKind,
        exact_matches: &[RTCRtpCodecParameters],
        partial_matches: &[RTCRtpCodecParameters],
    ) -> Result<(RTCRtpCodecParameters, CodecMatch)> {
        let codecs = if typ == RtpCodecKind::Audio {
            &self.audio_codecs
        } else {
            &self.video_codecs
        };

        let remote_fmtp = remote_codec.rtp_codec.fmtp();
        if let Some(apt) = remote_fmtp.parameter("apt") {
            let payload_type = apt.parse::<u8>()?;

            let (apt_codec, apt_match) = if let Some(c) =
                exact_matches.iter().find(|c| c.payload_type == payload_type)
            {
                (c, CodecMatch::Exact)
            } else if let Some(c) = partial_matches
                .iter()
                .find(|c| c.payload_type == payload_type)
            {
                (c, CodecMatch::Partial)
            } else {
                // unsupported media codec, skip its rtx
                return Ok((RTCRtpCodecParameters::default(), CodecMatch::None));
            };

            // compare against the local apt value
            let mut to_match_codec = remote_codec.clone();
            let (apt_matched, mt) = codec_parameters_fuzzy_search(&apt_codec.rtp_codec, codecs);
            if mt == apt_match {
                to_match_codec.rtp_codec.sdp_fmtp_line =
                    to_match_codec.rtp_codec.sdp_fmtp_line.replacen(
                        &format!("apt={payload_type}"),
                        &format!("apt={}", apt_matched.payload_type),
                        1,
                    );
            }

            let (local_codec, mut match_type) =
                codec_parameters_fuzzy_search(&to_match_codec.rtp_codec, codecs);
            if match_type == CodecMatch::Exact && apt_match == CodecMatch::Partial {
                match_type = CodecMatch::Partial;
            }
            return Ok((local_codec, match_type));
        }

        Ok(codec_parameters_fuzzy_search(&remote_codec.rtp_codec, codecs))
    }

    fn update_header_extension_from_media_section(
        &mut self,
        media: &MediaDescription,
    ) -> Result<()> {
        let typ = RtpCodecKind::from(media.media_name.media.to_lowercase().as_str());
        if typ == RtpCodecKind::Unspecified {
            return Ok(());
        }

        for (extension, id) in rtp_extensions_from_media_description(media)? {
            self.update_header_extension(id, extension.as_str(), typ)?;
        }

        Ok(())
    }

    pub(crate) fn update_header_extension(
        &mut self,
        id: u16,
        extension: &str,
        typ: RtpCodecKind,
    ) -> Result<()> {
        for local_extension in &self.header_extensions {
            if local_extension.uri != extension {
                continue;
            }
            if let Some(existing_extension) = self.negotiated_header_extensions.get_mut(&id) {
                if local_extension.is_audio && typ == RtpCodecKind::Audio {
                    existing_extension.is_audio = true;
                }
                if local_extension.is_video && typ == RtpCodecKind::Video {
                    existing_extension.is_video = true;
                }
            } else {
                self.negotiated_header_extensions.insert(
                    id,
                    MediaEngineHeaderExtension {
                        uri: extension.to_owned(),
                        is_audio: local_extension.is_audio && typ == RtpCodecKind::Audio,
                        is_video: local_extension.is_video && typ == RtpCodecKind::Video,
                        allowed_direction: local_extension.allowed_direction,
                    },
                );
            }
        }
        Ok(())
    }

    pub(crate) fn push_codecs(&mut self, codecs: Vec<RTCRtpCodecParameters>, typ: RtpCodecKind) {
        for codec in codecs {
            if typ == RtpCodecKind::Audio {
                MediaEngine::add_codec(&mut self.negotiated_audio_codecs, codec);
            } else if typ == RtpCodecKind::Video {
                MediaEngine::add_codec(&mut self.negotiated_video_codecs, codec);
            }
        }
    }

    /// Records the codecs and header extensions of a remote description.
    ///
    /// Remote payload types win: the negotiated list carries the remote's
    /// payload type for every codec that matched a local one. Exact fmtp
    /// matches are preferred over mime-only matches.
    pub(crate) fn update_from_remote_description(
        &mut self,
        desc: &SessionDescription,
    ) -> Result<()> {
        for media in &desc.media_descriptions {
            let typ = RtpCodecKind::from(media.media_name.media.to_lowercase().as_str());

            if !self.negotiated_audio && typ == RtpCodecKind::Audio {
                self.negotiated_audio = true;
            } else if !self.negotiated_video && typ == RtpCodecKind::Video {
                self.negotiated_video = true;
            } else {
                // renegotiation may carry new extension ids
                self.update_header_extension_from_media_section(media)?;

                if !self.negotiate_multi_codecs || typ == RtpCodecKind::Unspecified {
                    continue;
                }
            }

            let mut codecs = codecs_from_media_description(media)?;

            let add_if_new = |existing_codecs: &mut Vec<RTCRtpCodecParameters>,
                              codec: &RTCRtpCodecParameters| {
                if !existing_codecs
                    .iter()
                    .any(|c| c.payload_type == codec.payload_type)
                {
                    existing_codecs.push(codec.clone());
                }
            };

            let mut exact_matches = vec![];
            let mut partial_matches = vec![];

            // second pass picks up rtx codecs listed before their media codec
            for _ in 0..2 {
                for remote_codec in &mut codecs {
                    let (local_codec, match_type) = self.match_remote_codec(
                        remote_codec,
                        typ,
                        &exact_matches,
                        &partial_matches,
                    )?;

                    remote_codec.rtp_codec.rtcp_feedback = rtcp_feedback_intersection(
                        &local_codec.rtp_codec.rtcp_feedback,
                        &remote_codec.rtp_codec.rtcp_feedback,
                    );

                    if match_type == CodecMatch::Exact {
                        add_if_new(&mut exact_matches, remote_codec);
                    } else if match_type == CodecMatch::Partial {
                        add_if_new(&mut partial_matches, remote_codec);
                    }
                }
            }

            if !exact_matches.is_empty() {
                self.push_codecs(exact_matches, typ);
            } else if !partial_matches.is_empty() {
                self.push_codecs(partial_matches, typ);
            } else {
                continue;
            }

            self.update_header_extension_from_media_section(media)?;
        }

        Ok(())
    }

    /// Negotiated codecs of `typ`, or the registered ones before negotiation.
    pub(crate) fn get_codecs_by_kind(&self, typ: RtpCodecKind) -> Vec<RTCRtpCodecParameters> {
        match typ {
            RtpCodecKind::Video if self.negotiated_video => self.negotiated_video_codecs.clone(),
            RtpCodecKind::Video => self.video_codecs.clone(),
            RtpCodecKind::Audio if self.negotiated_audio => self.negotiated_audio_codecs.clone(),
            RtpCodecKind::Audio => self.audio_codecs.clone(),
            RtpCodecKind::Unspecified => vec![],
        }
    }

    pub(crate) fn get_rtp_parameters_by_kind(
        &self,
        typ: RtpCodecKind,
        direction: RTCRtpTransceiverDirection,
    ) -> RTCRtpParameters {
        let mut header_extensions = vec![];

        if self.negotiated_video && typ == RtpCodecKind::Video
            || self.negotiated_audio && typ == RtpCodecKind::Audio
        {
            for (id, e) in &self.negotiated_header_extensions {
                if e.is_matching_direction(direction) && e.is_kind(typ) {
                    header_extensions.push(RTCRtpHeaderExtensionParameters {
                        id: *id,
                        uri: e.uri.clone(),
                        ..Default::default()
                    });
                }
            }
        } else {
            let mut media_header_extensions = HashMap::new();

            for ext in &self.header_extensions {
                let negotiated_id = self
                    .negotiated_header_extensions
                    .iter()
                    .find(|(_, n)| n.uri == ext.uri)
                    .map(|(id, _)| *id);
                if let Some(id) = negotiated_id {
                    media_header_extensions.insert(id, ext);
                    continue;
                }

                for id in VALID_EXT_IDS {
                    if !media_header_extensions.contains_key(&id)
                        && !self.negotiated_header_extensions.contains_key(&id)
                    {
                        media_header_extensions.insert(id, ext);
                        break;
                    }
                }
            }

            for (id, e) in media_header_extensions {
                if e.is_matching_direction(direction) && e.is_kind(typ) {
                    header_extensions.push(RTCRtpHeaderExtensionParameters {
                        id,
                        uri: e.uri.clone(),
                        ..Default::default()
                    })
                }
            }
        }
        header_extensions.sort_by_key(|e| e.id);

        RTCRtpParameters {
            header_extensions,
            codecs: self.get_codecs_by_kind(typ),
            ..Default::default()
        }
    }

    pub(crate) fn get_rtp_parameters_by_payload_type(
        &self,
        payload_type: PayloadType,
    ) -> Result<RTCRtpParameters> {
        let (codec, typ) = self.get_codec_by_payload(payload_type)?;

        let mut header_extensions = vec![];
        for (id, e) in &self.negotiated_header_extensions {
            if e.is_kind(typ) {
                header_extensions.push(RTCRtpHeaderExtensionParameters {
                    uri: e.uri.clone(),
                    id: *id,
                    ..Default::default()
                });
            }
        }
        header_extensions.sort_by_key(|e| e.id);

        Ok(RTCRtpParameters {
            header_extensions,
            codecs: vec![codec],
            ..Default::default()
        })
    }

    pub(crate) fn is_rtx_enabled(
        &self,
        kind: RtpCodecKind,
        direction: RTCRtpTransceiverDirection,
    ) -> bool {
        self.get_rtp_parameters_by_kind(kind, direction)
            .codecs
            .iter()
            .any(|c| UniCase::new(c.rtp_codec.mime_type.as_str()) == UniCase::new(MIME_TYPE_RTX))
    }

    pub(crate) fn is_fec_enabled(
        &self,
        kind: RtpCodecKind,
        direction: RTCRtpTransceiverDirection,
    ) -> bool {
        self.get_rtp_parameters_by_kind(kind, direction)
            .codecs
            .iter()
            .any(|c| {
                c.rtp_codec
                    .mime_type
                    .to_lowercase()
                    .starts_with(MIME_TYPE_FLEX_FEC)
            })
    }
}
