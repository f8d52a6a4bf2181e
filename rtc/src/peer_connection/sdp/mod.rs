//! Session descriptions: the offer/answer types handed to the application
//! and the helpers that turn peer connection state into SDP and back.

#[cfg(test)]
mod sdp_test;

pub mod sdp_type;
pub mod session_description;

pub use sdp_type::RTCSdpType;
pub use session_description::RTCSessionDescription;

use std::collections::{HashMap, HashSet};

use ::sdp::description::common::{Address, ConnectionInformation};
use ::sdp::description::media::{MediaDescription, MediaName, RangedPort};
use ::sdp::description::session::*;
use ::sdp::extmap::ExtMap;
use ::sdp::util::ConnectionRole;
use ice::candidate::{Candidate, unmarshal_candidate};
use log::warn;
use shared::error::{Error, Result};
use url::Url;

use crate::peer_connection::configuration::media_engine::{MIME_TYPE_FLEX_FEC, MediaEngine};
use crate::peer_connection::state::ice_gathering_state::RTCIceGatheringState;
use crate::peer_connection::transport::{RTCDtlsFingerprint, RTCIceCandidate, RTCIceParameters};
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::rtp_sender::{RTCPFeedback, RTCRtpCodec, RTCRtpCodecParameters, RtpCodecKind};
use crate::rtp_transceiver::{PayloadType, RTCRtpTransceiver, SSRC};

pub(crate) const MEDIA_SECTION_APPLICATION: &str = "application";
pub(crate) const SCTP_PORT: u16 = 5000;

/// A remote media source as announced in an SDP media section.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct TrackDetails {
    pub(crate) mid: String,
    pub(crate) kind: RtpCodecKind,
    pub(crate) stream_id: String,
    pub(crate) track_id: String,
    pub(crate) ssrc: SSRC,
    pub(crate) rtx_ssrc: Option<SSRC>,
    pub(crate) fec_ssrc: Option<SSRC>,
}

pub(crate) fn track_details_for_ssrc(
    track_details: &[TrackDetails],
    ssrc: SSRC,
) -> Option<&TrackDetails> {
    track_details.iter().find(|x| x.ssrc == ssrc)
}

fn parse_ssrc_group(value: &str, semantic: &str) -> Option<(SSRC, SSRC)> {
    let split: Vec<&str> = value.split(' ').collect();
    if split.len() != 3 || split[0] != semantic {
        return None;
    }

    match (split[1].parse::<SSRC>(), split[2].parse::<SSRC>()) {
        (Ok(media), Ok(repair)) => Some((media, repair)),
        _ => {
            warn!("Failed to parse SSRC group: {value}");
            None
        }
    }
}

/// Extracts every sending media source of a description. Repair flows
/// named by `FID` and `FEC-FR` groups are attached to their media source
/// instead of becoming tracks of their own.
pub(crate) fn track_details_from_sdp(s: &SessionDescription) -> Vec<TrackDetails> {
    let mut incoming_tracks: Vec<TrackDetails> = vec![];

    for media in &s.media_descriptions {
        if media.attribute(ATTR_KEY_RECV_ONLY).is_some()
            || media.attribute(ATTR_KEY_INACTIVE).is_some()
        {
            continue;
        }

        let Some(mid_value) = get_mid_value(media) else {
            continue;
        };
        if mid_value.is_empty() {
            continue;
        }

        let kind = RtpCodecKind::from(media.media_name.media.as_str());
        if kind == RtpCodecKind::Unspecified {
            continue;
        }

        let mut rtx_repair_flows = HashMap::new();
        let mut fec_repair_flows = HashMap::new();
        for value in media.attributes_with_key(ATTR_KEY_SSRCGROUP) {
            if let Some((media_ssrc, repair)) =
                parse_ssrc_group(value, SEMANTIC_TOKEN_FLOW_IDENTIFICATION)
            {
                rtx_repair_flows.insert(repair, media_ssrc);
            } else if let Some((media_ssrc, repair)) =
                parse_ssrc_group(value, SEMANTIC_TOKEN_FORWARD_ERROR_CORRECTION_FRAMEWORK)
            {
                fec_repair_flows.insert(repair, media_ssrc);
            }
        }

        let mut stream_id = String::new();
        let mut track_id = String::new();
        if let Some(Some(msid)) = media.attribute(ATTR_KEY_MSID) {
            let split: Vec<&str> = msid.split(' ').collect();
            if split.len() == 2 {
                stream_id = split[0].to_owned();
                track_id = split[1].to_owned();
            }
        }

        let mut tracks_in_media: Vec<TrackDetails> = vec![];
        for value in media.attributes_with_key(ATTR_KEY_SSRC) {
            let split: Vec<&str> = value.split(' ').collect();
            let ssrc = match split[0].parse::<SSRC>() {
                Ok(ssrc) => ssrc,
                Err(err) => {
                    warn!("Failed to parse SSRC: {err}");
                    continue;
                }
            };

            if rtx_repair_flows.contains_key(&ssrc) || fec_repair_flows.contains_key(&ssrc) {
                continue;
            }

            if split.len() == 3 {
                if let Some(label) = split[1].strip_prefix("msid:") {
                    stream_id = label.to_owned();
                    track_id = split[2].to_owned();
                }
            }

            let index = match tracks_in_media.iter().position(|t| t.ssrc == ssrc) {
                Some(index) => index,
                None => {
                    tracks_in_media.push(TrackDetails {
                        mid: mid_value.to_owned(),
                        kind,
                        ssrc,
                        ..Default::default()
                    });
                    tracks_in_media.len() - 1
                }
            };

            let details = &mut tracks_in_media[index];
            details.stream_id = stream_id.clone();
            details.track_id = track_id.clone();
        }

        for details in &mut tracks_in_media {
            details.rtx_ssrc = rtx_repair_flows
                .iter()
                .find(|(_, media_ssrc)| **media_ssrc == details.ssrc)
                .map(|(repair, _)| *repair);
            details.fec_ssrc = fec_repair_flows
                .iter()
                .find(|(_, media_ssrc)| **media_ssrc == details.ssrc)
                .map(|(repair, _)| *repair);
        }

        incoming_tracks.extend(tracks_in_media);
    }

    incoming_tracks
}

pub(crate) fn add_candidates_to_media_description(
    candidates: &[RTCIceCandidate],
    mut m: MediaDescription,
    ice_gathering_state: RTCIceGatheringState,
) -> Result<MediaDescription> {
    for c in candidates {
        let mut candidate = c.to_ice()?;
        // rtcp-mux is always negotiated, so only the RTP component exists
        candidate.set_component(1);

        let marshaled = candidate.marshal();
        if !m
            .attributes_with_key(ATTR_KEY_CANDIDATE)
            .any(|value| value == marshaled)
        {
            m = m.with_candidate(marshaled);
        }
    }

    if ice_gathering_state != RTCIceGatheringState::Complete {
        return Ok(m);
    }
    if m.attribute(ATTR_KEY_END_OF_CANDIDATES).is_none() {
        m = m.with_property_attribute(ATTR_KEY_END_OF_CANDIDATES.to_owned());
    }

    Ok(m)
}

pub(crate) struct AddDataMediaSectionParams {
    pub(crate) should_add_candidates: bool,
    pub(crate) mid_value: String,
    pub(crate) ice_params: RTCIceParameters,
    pub(crate) dtls_role: ConnectionRole,
    pub(crate) ice_gathering_state: RTCIceGatheringState,
    pub(crate) sctp_max_message_size: u32,
}

pub(crate) fn add_data_media_section(
    d: SessionDescription,
    dtls_fingerprints: &[RTCDtlsFingerprint],
    candidates: &[RTCIceCandidate],
    params: AddDataMediaSectionParams,
) -> Result<SessionDescription> {
    let mut media = MediaDescription {
        media_name: MediaName {
            media: MEDIA_SECTION_APPLICATION.to_owned(),
            port: RangedPort {
                value: 9,
                range: None,
            },
            protos: vec!["UDP".to_owned(), "DTLS".to_owned(), "SCTP".to_owned()],
            formats: vec!["webrtc-datachannel".to_owned()],
        },
        media_title: None,
        connection_information: Some(ConnectionInformation {
            network_type: "IN".to_owned(),
            address_type: "IP4".to_owned(),
            address: Some(Address {
                address: "0.0.0.0".to_owned(),
                ttl: None,
                range: None,
            }),
        }),
        bandwidth: vec![],
        encryption_key: None,
        attributes: vec![],
    }
    .with_value_attribute(
        ATTR_KEY_CONNECTION_SETUP.to_owned(),
        params.dtls_role.to_string(),
    )
    .with_value_attribute(ATTR_KEY_MID.to_owned(), params.mid_value)
    .with_value_attribute(ATTR_KEY_SCTP_PORT.to_owned(), SCTP_PORT.to_string())
    .with_value_attribute(
        ATTR_KEY_MAX_MESSAGE_SIZE.to_owned(),
        params.sctp_max_message_size.to_string(),
    )
    .with_ice_credentials(
        params.ice_params.username_fragment,
        params.ice_params.password,
    );

    for f in dtls_fingerprints {
        media = media.with_fingerprint(f.algorithm.clone(), f.value.to_uppercase());
    }

    if params.should_add_candidates {
        media = add_candidates_to_media_description(candidates, media, params.ice_gathering_state)?;
    }

    Ok(d.with_media(media))
}

pub(crate) struct AddTransceiverSdpParams {
    pub(crate) should_add_candidates: bool,
    pub(crate) mid_value: String,
    pub(crate) dtls_role: ConnectionRole,
    pub(crate) ice_gathering_state: RTCIceGatheringState,
    pub(crate) offered_direction: Option<RTCRtpTransceiverDirection>,
}

/// Returns the description and whether the section was accepted. A
/// section without codecs or of a stopped transceiver is rejected with
/// port 0 and left out of the bundle group.
pub(crate) fn add_transceiver_sdp(
    mut d: SessionDescription,
    dtls_fingerprints: &[RTCDtlsFingerprint],
    media_engine: &MediaEngine,
    ice_params: &RTCIceParameters,
    candidates: &[RTCIceCandidate],
    transceiver: &RTCRtpTransceiver,
    params: AddTransceiverSdpParams,
) -> Result<(SessionDescription, bool)> {
    let kind = transceiver.kind;

    let mut direction = match params.offered_direction {
        Some(offered) => RTCRtpTransceiverDirection::answer_for(offered, transceiver.direction),
        None => transceiver.direction,
    };
    if transceiver.sender.track.is_none() && direction.has_send() {
        direction = RTCRtpTransceiverDirection::from_send_recv(false, direction.has_recv());
    }

    let codecs = transceiver.get_codecs(media_engine);
    if codecs.is_empty() || transceiver.stopped {
        d = d.with_media(MediaDescription {
            media_name: MediaName {
                media: kind.to_string(),
                port: RangedPort {
                    value: 0,
                    range: None,
                },
                protos: vec![
                    "UDP".to_owned(),
                    "TLS".to_owned(),
                    "RTP".to_owned(),
                    "SAVPF".to_owned(),
                ],
                formats: vec!["0".to_owned()],
            },
            media_title: None,
            connection_information: None,
            bandwidth: vec![],
            encryption_key: None,
            attributes: vec![],
        }
        .with_value_attribute(ATTR_KEY_MID.to_owned(), params.mid_value));
        return Ok((d, false));
    }

    let mut media = MediaDescription::new_jsep_media_description(kind.to_string(), vec![])
        .with_value_attribute(
            ATTR_KEY_CONNECTION_SETUP.to_owned(),
            params.dtls_role.to_string(),
        )
        .with_value_attribute(ATTR_KEY_MID.to_owned(), params.mid_value)
        .with_ice_credentials(
            ice_params.username_fragment.clone(),
            ice_params.password.clone(),
        )
        .with_property_attribute(ATTR_KEY_RTCPMUX.to_owned())
        .with_property_attribute(ATTR_KEY_RTCPRSIZE.to_owned());

    for codec in &codecs {
        let name = codec
            .rtp_codec
            .mime_type
            .split_once('/')
            .map(|(_, name)| name.to_owned())
            .unwrap_or_else(|| codec.rtp_codec.mime_type.clone());
        media = media.with_codec(
            codec.payload_type,
            name,
            codec.rtp_codec.clock_rate,
            codec.rtp_codec.channels,
            codec.rtp_codec.sdp_fmtp_line.clone(),
        );

        for feedback in &codec.rtp_codec.rtcp_feedback {
            let value = if feedback.parameter.is_empty() {
                format!("{} {}", codec.payload_type, feedback.typ)
            } else {
                format!(
                    "{} {} {}",
                    codec.payload_type, feedback.typ, feedback.parameter
                )
            };
            media = media.with_value_attribute(ATTR_KEY_RTCPFB.to_owned(), value);
        }
    }

    let parameters = media_engine.get_rtp_parameters_by_kind(kind, direction);
    for ext in &parameters.header_extensions {
        media = media.with_extmap(ExtMap {
            value: ext.id as isize,
            uri: Url::parse(&ext.uri).ok(),
            ..Default::default()
        });
    }

    if direction.has_send() {
        if let Some(track) = &transceiver.sender.track {
            let ssrc = transceiver.sender.ssrc;
            let fec_ssrc = transceiver
                .sender
                .ssrc_fec
                .filter(|_| has_fec_codec(&codecs));

            if let Some(fec_ssrc) = fec_ssrc {
                media = media.with_value_attribute(
                    ATTR_KEY_SSRCGROUP.to_owned(),
                    format!("{SEMANTIC_TOKEN_FORWARD_ERROR_CORRECTION_FRAMEWORK} {ssrc} {fec_ssrc}"),
                );
            }

            media = media.with_media_source(
                ssrc,
                track.stream_id().to_owned(),
                track.stream_id().to_owned(),
                track.track_id().to_owned(),
            );
            if let Some(fec_ssrc) = fec_ssrc {
                media = media.with_media_source(
                    fec_ssrc,
                    track.stream_id().to_owned(),
                    track.stream_id().to_owned(),
                    track.track_id().to_owned(),
                );
            }

            media = media.with_value_attribute(
                ATTR_KEY_MSID.to_owned(),
                format!("{} {}", track.stream_id(), track.track_id()),
            );
        }
    }

    media = media.with_property_attribute(direction.to_string());

    for fingerprint in dtls_fingerprints {
        media = media.with_fingerprint(
            fingerprint.algorithm.clone(),
            fingerprint.value.to_uppercase(),
        );
    }

    if params.should_add_candidates {
        media = add_candidates_to_media_description(candidates, media, params.ice_gathering_state)?;
    }

    Ok((d.with_media(media), true))
}

pub(crate) fn has_fec_codec(codecs: &[RTCRtpCodecParameters]) -> bool {
    codecs.iter().any(|c| {
        c.rtp_codec
            .mime_type
            .to_lowercase()
            .starts_with(MIME_TYPE_FLEX_FEC)
    })
}

/// One m= line to generate. `transceiver_index` is meaningless for the
/// data section.
#[derive(Default, Debug, Clone)]
pub(crate) struct MediaSection {
    pub(crate) id: String,
    pub(crate) transceiver_index: usize,
    pub(crate) data: bool,
    /// Direction of the remote offer when answering.
    pub(crate) offered_direction: Option<RTCRtpTransceiverDirection>,
}

#[derive(Default, Debug, Clone)]
pub(crate) struct PopulateSdpParams {
    pub(crate) media_description_fingerprint: bool,
    pub(crate) is_ice_lite: bool,
    pub(crate) extmap_allow_mixed: bool,
    pub(crate) connection_role: ConnectionRole,
    pub(crate) ice_gathering_state: RTCIceGatheringState,
    /// The remote `a=group` value when answering; only mids it names are
    /// bundled.
    pub(crate) match_bundle_group: Option<String>,
    pub(crate) sctp_max_message_size: u32,
}

/// Serializes the state of a peer connection into an SDP.
#[allow(clippy::too_many_arguments)]
pub(crate) fn populate_sdp(
    mut d: SessionDescription,
    dtls_fingerprints: &[RTCDtlsFingerprint],
    media_engine: &MediaEngine,
    rtp_transceivers: &[RTCRtpTransceiver],
    candidates: &[RTCIceCandidate],
    ice_params: &RTCIceParameters,
    media_sections: &[MediaSection],
    params: PopulateSdpParams,
) -> Result<SessionDescription> {
    let media_dtls_fingerprints = if params.media_description_fingerprint {
        dtls_fingerprints.to_vec()
    } else {
        vec![]
    };

    let bundle_group_filter: Option<HashSet<&str>> =
        params.match_bundle_group.as_deref().map(|group| {
            group
                .split_whitespace()
                .filter(|token| *token != SEMANTIC_TOKEN_BUNDLE)
                .collect()
        });

    let mut bundle_value = SEMANTIC_TOKEN_BUNDLE.to_owned();
    let mut bundle_count = 0;

    // candidates go into the first accepted section
    let mut candidates_added = false;

    for m in media_sections {
        let should_add_candidates = !candidates_added;

        let should_add_id = if m.data {
            d = add_data_media_section(
                d,
                &media_dtls_fingerprints,
                candidates,
                AddDataMediaSectionParams {
                    should_add_candidates,
                    mid_value: m.id.clone(),
                    ice_params: ice_params.clone(),
                    dtls_role: params.connection_role,
                    ice_gathering_state: params.ice_gathering_state,
                    sctp_max_message_size: params.sctp_max_message_size,
                },
            )?;
            true
        } else {
            let transceiver = rtp_transceivers
                .get(m.transceiver_index)
                .ok_or(Error::ErrSDPZeroTransceivers)?;
            let (next, accepted) = add_transceiver_sdp(
                d,
                &media_dtls_fingerprints,
                media_engine,
                ice_params,
                candidates,
                transceiver,
                AddTransceiverSdpParams {
                    should_add_candidates,
                    mid_value: m.id.clone(),
                    dtls_role: params.connection_role,
                    ice_gathering_state: params.ice_gathering_state,
                    offered_direction: m.offered_direction,
                },
            )?;
            d = next;
            accepted
        };

        if !should_add_id {
            continue;
        }
        candidates_added = true;
        if let Some(filter) = &bundle_group_filter {
            if !filter.contains(m.id.as_str()) {
                continue;
            }
        }
        bundle_value.push(' ');
        bundle_value.push_str(&m.id);
        bundle_count += 1;
    }

    if !params.media_description_fingerprint {
        for fingerprint in dtls_fingerprints {
            d = d.with_fingerprint(
                fingerprint.algorithm.clone(),
                fingerprint.value.to_uppercase(),
            );
        }
    }

    if params.is_ice_lite {
        // RFC 5245 S15.3
        d = d.with_value_attribute(ATTR_KEY_ICELITE.to_owned(), ATTR_KEY_ICELITE.to_owned());
    }

    if params.extmap_allow_mixed {
        d = d.with_property_attribute(ATTR_KEY_EXTMAP_ALLOW_MIXED.to_owned());
    }

    if bundle_count > 0 {
        d = d.with_value_attribute(ATTR_KEY_GROUP.to_owned(), bundle_value);
    }

    Ok(d)
}

pub(crate) fn get_mid_value(media: &MediaDescription) -> Option<&str> {
    media
        .attributes
        .iter()
        .find(|attr| attr.key == ATTR_KEY_MID)
        .and_then(|attr| attr.value.as_deref())
}

pub(crate) fn get_peer_direction(media: &MediaDescription) -> RTCRtpTransceiverDirection {
    for a in &media.attributes {
        let direction = RTCRtpTransceiverDirection::from(a.key.as_str());
        if direction != RTCRtpTransceiverDirection::Unspecified {
            return direction;
        }
    }
    RTCRtpTransceiverDirection::Unspecified
}

/// Returns `(value, algorithm)` of the single fingerprint the description
/// carries, at session or media level.
pub(crate) fn extract_fingerprint(desc: &SessionDescription) -> Result<(String, String)> {
    let mut fingerprints = vec![];

    if let Some(fingerprint) = desc.attribute(ATTR_KEY_FINGERPRINT) {
        fingerprints.push(fingerprint.clone());
    }

    for m in &desc.media_descriptions {
        if let Some(Some(fingerprint)) = m.attribute(ATTR_KEY_FINGERPRINT) {
            fingerprints.push(fingerprint.to_owned());
        }
    }

    if fingerprints.is_empty() {
        return Err(Error::ErrSessionDescriptionNoFingerprint);
    }

    if fingerprints.iter().any(|f| *f != fingerprints[0]) {
        return Err(Error::ErrSessionDescriptionConflictingFingerprints);
    }

    let parts: Vec<&str> = fingerprints[0].split(' ').collect();
    if parts.len() != 2 {
        return Err(Error::ErrSessionDescriptionInvalidFingerprint);
    }

    Ok((parts[1].to_owned(), parts[0].to_owned()))
}

/// Returns the remote ICE credentials and the candidates embedded in the
/// description.
pub(crate) fn extract_ice_details(
    desc: &SessionDescription,
) -> Result<(String, String, Vec<Candidate>)> {
    let mut candidates = vec![];
    let mut remote_pwds = vec![];
    let mut remote_ufrags = vec![];

    if let Some(ufrag) = desc.attribute(ATTR_KEY_ICE_UFRAG) {
        remote_ufrags.push(ufrag.clone());
    }
    if let Some(pwd) = desc.attribute(ATTR_KEY_ICE_PWD) {
        remote_pwds.push(pwd.clone());
    }

    for m in &desc.media_descriptions {
        if m.media_name.port.value == 0 {
            continue;
        }
        if let Some(Some(ufrag)) = m.attribute(ATTR_KEY_ICE_UFRAG) {
            remote_ufrags.push(ufrag.to_owned());
        }
        if let Some(Some(pwd)) = m.attribute(ATTR_KEY_ICE_PWD) {
            remote_pwds.push(pwd.to_owned());
        }

        for value in m.attributes_with_key(ATTR_KEY_CANDIDATE) {
            let c = unmarshal_candidate(value)?;
            candidates.push(c);
        }
    }

    if remote_ufrags.is_empty() {
        return Err(Error::ErrSessionDescriptionMissingIceUfrag);
    } else if remote_pwds.is_empty() {
        return Err(Error::ErrSessionDescriptionMissingIcePwd);
    }

    if remote_ufrags.iter().any(|u| *u != remote_ufrags[0]) {
        return Err(Error::ErrSessionDescriptionConflictingIceUfrag);
    }
    if remote_pwds.iter().any(|p| *p != remote_pwds[0]) {
        return Err(Error::ErrSessionDescriptionConflictingIcePwd);
    }

    Ok((remote_ufrags[0].clone(), remote_pwds[0].clone(), candidates))
}

pub(crate) fn have_application_media_section(desc: &SessionDescription) -> bool {
    desc.media_descriptions
        .iter()
        .any(|m| m.media_name.media == MEDIA_SECTION_APPLICATION)
}

pub(crate) fn get_by_mid<'a>(
    search_mid: &str,
    desc: &'a RTCSessionDescription,
) -> Option<&'a MediaDescription> {
    desc.parsed.as_ref().and_then(|parsed| {
        parsed
            .media_descriptions
            .iter()
            .find(|m| get_mid_value(m) == Some(search_mid))
    })
}

/// Returns the application media section of `desc`, if any.
pub(crate) fn have_data_channel(desc: &RTCSessionDescription) -> Option<&MediaDescription> {
    desc.parsed.as_ref().and_then(|parsed| {
        parsed
            .media_descriptions
            .iter()
            .find(|d| d.media_name.media == MEDIA_SECTION_APPLICATION)
    })
}

pub(crate) fn is_lite_set(desc: &SessionDescription) -> bool {
    desc.attribute(ATTR_KEY_ICELITE).is_some()
}

/// The first description fixes the session id; every later one reuses it
/// with the version bumped.
pub(crate) fn update_sdp_origin(origin: &mut Origin, d: &mut SessionDescription) {
    if origin.session_version == 0 {
        origin.session_id = d.origin.session_id;
        origin.session_version = d.origin.session_version.max(1);
        d.origin.session_version = origin.session_version;
    } else {
        origin.session_version += 1;
        d.origin.session_id = origin.session_id;
        d.origin.session_version = origin.session_version;
    }
}

/// `a=max-message-size` of a data section, if announced.
pub(crate) fn get_max_message_size(media: &MediaDescription) -> Option<u32> {
    media
        .attribute(ATTR_KEY_MAX_MESSAGE_SIZE)
        .flatten()
        .and_then(|value| value.parse::<u32>().ok())
}

pub(crate) fn codecs_from_media_description(
    m: &MediaDescription,
) -> Result<Vec<RTCRtpCodecParameters>> {
    let s = SessionDescription {
        media_descriptions: vec![m.clone()],
        ..Default::default()
    };

    let mut out = vec![];
    for payload_str in &m.media_name.formats {
        let payload_type: PayloadType = payload_str.parse::<u8>()?;
        let codec = match s.get_codec_for_payload_type(payload_type) {
            Ok(codec) => codec,
            Err(err) => {
                if payload_type == 0 {
                    continue;
                }
                return Err(err);
            }
        };

        let channels = codec.encoding_parameters.parse::<u16>().unwrap_or(0);

        let mut feedback = vec![];
        for raw in &codec.rtcp_feedback {
            let (typ, parameter) = raw.split_once(' ').unwrap_or((raw.as_str(), ""));
            feedback.push(RTCPFeedback {
                typ: typ.to_owned(),
                parameter: parameter.to_owned(),
            });
        }

        out.push(RTCRtpCodecParameters {
            rtp_codec: RTCRtpCodec {
                mime_type: m.media_name.media.clone() + "/" + codec.name.as_str(),
                clock_rate: codec.clock_rate,
                channels,
                sdp_fmtp_line: codec.fmtp.clone(),
                rtcp_feedback: feedback,
            },
            payload_type,
        });
    }

    Ok(out)
}

/// Header extensions of a media section keyed by URI.
pub(crate) fn rtp_extensions_from_media_description(
    m: &MediaDescription,
) -> Result<HashMap<String, u16>> {
    let mut out = HashMap::new();

    for a in &m.attributes {
        if a.key == ATTR_KEY_EXT_MAP {
            let e = ExtMap::unmarshal(&a.to_string())?;

            if let Some(uri) = e.uri {
                out.insert(uri.to_string(), e.value as u16);
            }
        }
    }

    Ok(out)
}
