use crate::media_stream::MediaStreamId;
use crate::media_stream::track::MediaStreamTrackId;
use crate::rtp_transceiver::RTCRtpReceiverId;

/// Fired once per remote track, when its first packet arrives.
#[derive(Default, Debug, Clone)]
pub struct RTCTrackEvent {
    pub receiver_id: RTCRtpReceiverId,
    pub track_id: MediaStreamTrackId,
    pub stream_ids: Vec<MediaStreamId>,
}
