use crate::media_stream::MediaStreamId;
use crate::rtp_transceiver::rtp_sender::{RTCRtpCodec, RtpCodecKind};

/// Identifier of a track, the second token of an `a=msid` line.
pub type MediaStreamTrackId = String;

/// A local or remote media track.
///
/// Local tracks are created by the application and handed to
/// [`add_track`](crate::peer_connection::RTCPeerConnection::add_track); the
/// codec is what the application encodes with. Remote tracks are created by
/// the peer connection from the remote description and carry the codec of
/// the first packet received.
///
/// * [W3C MediaStreamTrack](https://www.w3.org/TR/mediacapture-streams/#mediastreamtrack)
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MediaStreamTrack {
    stream_id: MediaStreamId,
    track_id: MediaStreamTrackId,
    label: String,
    kind: RtpCodecKind,
    codec: RTCRtpCodec,
    enabled: bool,
    ended: bool,
}

impl MediaStreamTrack {
    pub fn new(
        stream_id: MediaStreamId,
        track_id: MediaStreamTrackId,
        label: String,
        kind: RtpCodecKind,
        codec: RTCRtpCodec,
    ) -> Self {
        Self {
            stream_id,
            track_id,
            label,
            kind,
            codec,
            enabled: true,
            ended: false,
        }
    }

    pub fn stream_id(&self) -> &MediaStreamId {
        &self.stream_id
    }

    pub fn track_id(&self) -> &MediaStreamTrackId {
        &self.track_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> RtpCodecKind {
        self.kind
    }

    pub fn codec(&self) -> &RTCRtpCodec {
        &self.codec
    }

    pub(crate) fn set_codec(&mut self, codec: RTCRtpCodec) {
        self.codec = codec;
    }

    /// A disabled local track drops what is written to it.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn ended(&self) -> bool {
        self.ended
    }

    /// Ends the track for good.
    pub fn stop(&mut self) {
        self.ended = true;
    }
}
