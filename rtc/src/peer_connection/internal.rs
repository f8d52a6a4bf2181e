use std::net::IpAddr;

use ::sdp::description::session::{
    ATTR_KEY_EXTMAP_ALLOW_MIXED, ATTR_KEY_GROUP, ATTR_KEY_MSID, SessionDescription,
};
use ice::candidate::Candidate;
use log::warn;

use super::*;
use crate::peer_connection::configuration::RTCConfiguration;
use crate::peer_connection::sdp::{
    MEDIA_SECTION_APPLICATION, MediaSection, PopulateSdpParams, extract_fingerprint,
    extract_ice_details, get_by_mid, get_max_message_size, have_data_channel, populate_sdp,
    track_details_from_sdp,
};
use crate::peer_connection::state::signaling_state::check_next_signaling_state;
use crate::peer_connection::transport::dtls::parameters::DTLSParameters;
use crate::peer_connection::transport::{
    RTCDtlsFingerprint, RTCDtlsTransportState, RTCIceCandidate, RTCIceCandidateType,
    RTCIceParameters, RTCIceRole,
};
use crate::rtp_transceiver::satisfy_type_and_direction;

impl<I> RTCPeerConnection<I>
where
    I: Interceptor,
{
    /// generate_unmatched_sdp generates an SDP that doesn't take remote state into account
    /// This is used for the initial call for CreateOffer
    pub(super) fn generate_unmatched_sdp(&self) -> Result<SessionDescription> {
        let d = SessionDescription::new_jsep_session_description(false);

        let ice_params = self.ice_transport().get_local_parameters();
        let candidates = self.ice_transport().get_local_candidates();

        let mut media_sections = vec![];
        for (i, t) in self.rtp_transceivers.iter().enumerate() {
            // stopped transceivers are left out of an initial offer
            if t.stopped {
                continue;
            }
            if let Some(mid) = &t.mid {
                media_sections.push(MediaSection {
                    id: mid.clone(),
                    transceiver_index: i,
                    ..Default::default()
                });
            }
        }

        if !self.data_channels.is_empty() {
            media_sections.push(MediaSection {
                id: format!("{}", self.greater_mid),
                data: true,
                ..Default::default()
            });
        }

        let dtls_fingerprints = self.dtls_transport().local_fingerprints();
        if dtls_fingerprints.is_empty() {
            return Err(Error::ErrNoCertificates);
        }

        let params = PopulateSdpParams {
            media_description_fingerprint: false,
            is_ice_lite: self.configuration.setting_engine.candidates.ice_lite,
            extmap_allow_mixed: true,
            connection_role: DEFAULT_DTLS_ROLE_OFFER.to_connection_role(),
            ice_gathering_state: self.ice_transport().gathering_state(),
            match_bundle_group: None,
            sctp_max_message_size: self.configuration.setting_engine.sctp_max_message_size.sdp_value(),
        };
        populate_sdp(
            d,
            &dtls_fingerprints,
            &self.configuration.media_engine,
            &self.rtp_transceivers,
            &candidates,
            &ice_params,
            &media_sections,
            params,
        )
    }

    /// generate_matched_sdp generates a SDP and takes the remote state into account
    /// this is used everytime we have a remote_description
    pub(super) fn generate_matched_sdp(
        &self,
        include_unmatched: bool,
        connection_role: ConnectionRole,
    ) -> Result<SessionDescription> {
        let d = SessionDescription::new_jsep_session_description(false);

        let ice_params = self.ice_transport().get_local_parameters();
        let candidates = self.ice_transport().get_local_candidates();

        let mut media_sections = vec![];
        let mut already_have_application_media_section = false;
        let mut extmap_allow_mixed = false;

        let remote = self.remote_description().and_then(|d| d.parsed.as_ref());
        if let Some(parsed) = remote {
            extmap_allow_mixed = parsed.has_attribute(ATTR_KEY_EXTMAP_ALLOW_MIXED);

            // sections keep the order of the remote description
            for media in &parsed.media_descriptions {
                let Some(mid_value) = get_mid_value(media) else {
                    continue;
                };
                if mid_value.is_empty() {
                    return Err(Error::ErrPeerConnRemoteDescriptionWithoutMidValue);
                }

                if media.media_name.media == MEDIA_SECTION_APPLICATION {
                    media_sections.push(MediaSection {
                        id: mid_value.to_owned(),
                        data: true,
                        ..Default::default()
                    });
                    already_have_application_media_section = true;
                    continue;
                }

                let kind = RtpCodecKind::from(media.media_name.media.as_str());
                let direction = get_peer_direction(media);
                if kind == RtpCodecKind::Unspecified
                    || direction == RTCRtpTransceiverDirection::Unspecified
                {
                    continue;
                }

                let Some(i) = find_by_mid(mid_value, &self.rtp_transceivers) else {
                    return Err(Error::ErrRTPTransceiverNotExisted);
                };
                media_sections.push(MediaSection {
                    id: mid_value.to_owned(),
                    transceiver_index: i,
                    data: false,
                    offered_direction: (!include_unmatched).then_some(direction),
                });
            }
        }

        // If we are offering also include unmatched local transceivers
        let match_bundle_group = if include_unmatched {
            for (i, t) in self.rtp_transceivers.iter().enumerate() {
                if t.stopped {
                    continue;
                }
                let Some(mid) = &t.mid else {
                    continue;
                };
                if media_sections.iter().any(|m| !m.data && m.id == *mid) {
                    continue;
                }
                media_sections.push(MediaSection {
                    id: mid.clone(),
                    transceiver_index: i,
                    ..Default::default()
                });
            }

            if !self.data_channels.is_empty() && !already_have_application_media_section {
                media_sections.push(MediaSection {
                    id: format!("{}", self.greater_mid),
                    data: true,
                    ..Default::default()
                });
            }
            None
        } else {
            remote
                .and_then(|d| d.attribute(ATTR_KEY_GROUP))
                .cloned()
                .or(Some(String::new()))
        };

        let dtls_fingerprints = self.dtls_transport().local_fingerprints();
        if dtls_fingerprints.is_empty() {
            return Err(Error::ErrNoCertificates);
        }

        let params = PopulateSdpParams {
            media_description_fingerprint: false,
            is_ice_lite: self.configuration.setting_engine.candidates.ice_lite,
            extmap_allow_mixed,
            connection_role,
            ice_gathering_state: self.ice_transport().gathering_state(),
            match_bundle_group,
            sctp_max_message_size: self.configuration.setting_engine.sctp_max_message_size.sdp_value(),
        };
        populate_sdp(
            d,
            &dtls_fingerprints,
            &self.configuration.media_engine,
            &self.rtp_transceivers,
            &candidates,
            &ice_params,
            &media_sections,
            params,
        )
    }

    /// True when a live transceiver is missing from `desc` or announced with
    /// another direction than the one it would be offered with now.
    pub(super) fn has_local_description_changed(&self, desc: &RTCSessionDescription) -> bool {
        for t in &self.rtp_transceivers {
            if t.stopped {
                continue;
            }
            let Some(m) = t.mid.as_deref().and_then(|mid| get_by_mid(mid, desc)) else {
                return true;
            };
            if get_peer_direction(m) != effective_direction(t) {
                return true;
            }
        }
        false
    }

    // 4.4.1.6 Set the SessionDescription
    pub(super) fn set_description(
        &mut self,
        sd: &RTCSessionDescription,
        op: StateChangeOp,
    ) -> Result<()> {
        if sd.sdp_type == RTCSdpType::Unspecified {
            return Err(Error::ErrPeerConnSDPTypeInvalidValue);
        }

        let cur = self.signaling_state;
        let next_state = match op {
            StateChangeOp::SetLocal => match sd.sdp_type {
                // stable->SetLocal(offer)->have-local-offer
                RTCSdpType::Offer => {
                    if sd.sdp != self.last_offer {
                        return Err(Error::ErrSDPDoesNotMatchOffer);
                    }
                    let next_state = check_next_signaling_state(
                        cur,
                        RTCSignalingState::HaveLocalOffer,
                        op,
                        sd.sdp_type,
                    )?;
                    self.pending_local_description = Some(sd.clone());
                    next_state
                }
                // have-remote-offer->SetLocal(answer)->stable
                // have-local-pranswer->SetLocal(answer)->stable
                RTCSdpType::Answer => {
                    if sd.sdp != self.last_answer {
                        return Err(Error::ErrSDPDoesNotMatchAnswer);
                    }
                    let next_state =
                        check_next_signaling_state(cur, RTCSignalingState::Stable, op, sd.sdp_type)?;
                    self.pending_local_description = None;
                    self.current_local_description = Some(sd.clone());
                    self.current_remote_description = self.pending_remote_description.take();
                    next_state
                }
                // have-remote-offer->SetLocal(pranswer)->have-local-pranswer
                RTCSdpType::Pranswer => {
                    if sd.sdp != self.last_answer {
                        return Err(Error::ErrSDPDoesNotMatchAnswer);
                    }
                    let next_state = check_next_signaling_state(
                        cur,
                        RTCSignalingState::HaveLocalPranswer,
                        op,
                        sd.sdp_type,
                    )?;
                    self.pending_local_description = Some(sd.clone());
                    next_state
                }
                RTCSdpType::Rollback => {
                    let next_state =
                        check_next_signaling_state(cur, RTCSignalingState::Stable, op, sd.sdp_type)?;
                    self.pending_local_description = None;
                    next_state
                }
                RTCSdpType::Unspecified => return Err(Error::ErrPeerConnStateChangeInvalid),
            },
            StateChangeOp::SetRemote => match sd.sdp_type {
                // stable->SetRemote(offer)->have-remote-offer
                RTCSdpType::Offer => {
                    let next_state = check_next_signaling_state(
                        cur,
                        RTCSignalingState::HaveRemoteOffer,
                        op,
                        sd.sdp_type,
                    )?;
                    self.pending_remote_description = Some(sd.clone());
                    next_state
                }
                // have-local-offer->SetRemote(answer)->stable
                // have-remote-pranswer->SetRemote(answer)->stable
                RTCSdpType::Answer => {
                    let next_state =
                        check_next_signaling_state(cur, RTCSignalingState::Stable, op, sd.sdp_type)?;
                    self.pending_remote_description = None;
                    self.current_remote_description = Some(sd.clone());
                    self.current_local_description = self.pending_local_description.take();
                    next_state
                }
                // have-local-offer->SetRemote(pranswer)->have-remote-pranswer
                RTCSdpType::Pranswer => {
                    let next_state = check_next_signaling_state(
                        cur,
                        RTCSignalingState::HaveRemotePranswer,
                        op,
                        sd.sdp_type,
                    )?;
                    self.pending_remote_description = Some(sd.clone());
                    next_state
                }
                RTCSdpType::Rollback => {
                    let next_state =
                        check_next_signaling_state(cur, RTCSignalingState::Stable, op, sd.sdp_type)?;
                    self.pending_remote_description = None;
                    next_state
                }
                RTCSdpType::Unspecified => return Err(Error::ErrPeerConnStateChangeInvalid),
            },
        };

        self.signaling_state = next_state;
        self.do_signaling_state_change(next_state);
        if next_state == RTCSignalingState::Stable {
            self.is_negotiation_ongoing = false;
            self.trigger_negotiation_needed();
        }
        Ok(())
    }

    pub(crate) fn do_signaling_state_change(&mut self, new_state: RTCSignalingState) {
        debug!("signaling state changed to {new_state}");
        self.pipeline_context
            .event_outs
            .push_back(RTCPeerConnectionEvent::OnSignalingStateChangeEvent(new_state));
    }

    pub(crate) fn ice_transport(&self) -> &RTCIceTransport {
        &self.pipeline_context.ice_handler_context.ice_transport
    }

    pub(crate) fn ice_transport_mut(&mut self) -> &mut RTCIceTransport {
        &mut self.pipeline_context.ice_handler_context.ice_transport
    }

    pub(crate) fn dtls_transport(&self) -> &RTCDtlsTransport {
        &self.pipeline_context.dtls_handler_context.dtls_transport
    }

    pub(crate) fn sctp_transport(&self) -> &RTCSctpTransport {
        &self.pipeline_context.sctp_handler_context.sctp_transport
    }

    pub(crate) fn sctp_transport_mut(&mut self) -> &mut RTCSctpTransport {
        &mut self.pipeline_context.sctp_handler_context.sctp_transport
    }

    /// New local credentials; local candidates survive unless the setting
    /// engine discards them.
    pub(super) fn restart_ice_transport(&mut self) -> Result<()> {
        let keep_local_candidates = !self
            .configuration
            .setting_engine
            .candidates
            .discard_local_candidates_during_ice_restart;
        self.ice_transport_mut()
            .restart(String::new(), String::new(), keep_local_candidates)
    }

    /// Binds the m= sections of a remote description to transceivers.
    /// A remote offer creates receive transceivers for sections nothing
    /// local can take; rejected sections stop their transceiver.
    pub(super) fn apply_remote_media_sections(
        &mut self,
        parsed: &SessionDescription,
        we_offer: bool,
    ) -> Result<()> {
        for media in &parsed.media_descriptions {
            let Some(mid_value) = get_mid_value(media) else {
                continue;
            };
            if mid_value.is_empty() {
                return Err(Error::ErrPeerConnRemoteDescriptionWithoutMidValue);
            }

            if media.media_name.media == MEDIA_SECTION_APPLICATION {
                continue;
            }

            let kind = RtpCodecKind::from(media.media_name.media.as_str());
            let direction = get_peer_direction(media);
            if kind == RtpCodecKind::Unspecified
                || direction == RTCRtpTransceiverDirection::Unspecified
            {
                continue;
            }

            let rejected = media.media_name.port.value == 0;

            if we_offer {
                let Some(i) = find_by_mid(mid_value, &self.rtp_transceivers) else {
                    continue;
                };
                if rejected {
                    self.stop_transceiver(i);
                } else {
                    // 4.5.9.2.9: the answer fixes the current direction
                    self.rtp_transceivers[i].set_current_direction(direction.reverse());
                }
                continue;
            }

            let i = match find_by_mid(mid_value, &self.rtp_transceivers) {
                Some(i) => i,
                None => match satisfy_type_and_direction(kind, direction, &self.rtp_transceivers)
                {
                    Some(i) => {
                        self.rtp_transceivers[i].set_mid(mid_value.to_owned())?;
                        i
                    }
                    None => {
                        let local_direction = if direction == RTCRtpTransceiverDirection::Recvonly {
                            RTCRtpTransceiverDirection::Sendonly
                        } else {
                            RTCRtpTransceiverDirection::Recvonly
                        };
                        let mut t = RTCRtpTransceiver::new(kind, None, local_direction);
                        t.set_mid(mid_value.to_owned())?;
                        if let Err(err) = t.set_codec_preferences_from_remote_description(
                            media,
                            &self.configuration.media_engine,
                        ) {
                            warn!("no codec of mid {mid_value} matches the media engine: {err}");
                        }
                        debug!("{kind} transceiver created for remote mid {mid_value}");
                        self.rtp_transceivers.push(t);
                        self.rtp_transceivers.len() - 1
                    }
                },
            };

            if rejected {
                self.stop_transceiver(i);
            }
        }

        Ok(())
    }

    /// Applies ICE credentials and candidates, the DTLS parameters and the
    /// SCTP parameters of a remote description.
    pub(super) fn apply_remote_transport_parameters(
        &mut self,
        parsed: &SessionDescription,
        we_offer: bool,
        is_renegotiation: bool,
    ) -> Result<()> {
        let (remote_ufrag, remote_pwd, candidates) = extract_ice_details(parsed)?;
        let fingerprint = if is_renegotiation {
            None
        } else {
            Some(extract_fingerprint(parsed)?)
        };

        if is_renegotiation
            && self.ice_transport().is_started()
            && self
                .ice_transport()
                .have_remote_credentials_change(&remote_ufrag, &remote_pwd)
        {
            // the remote restarted ICE, answer with new credentials as well
            debug!("remote ice credentials changed, restarting ice");
            self.restart_ice_transport()?;
        }

        for candidate in candidates {
            if let Err(err) = self.ice_transport_mut().add_remote_candidate(candidate) {
                warn!("failed to add remote candidate: {err}");
            }
        }

        let remote_is_lite = is_lite_set(parsed);
        if !self.ice_transport().is_started() {
            let local_is_lite = self.configuration.setting_engine.candidates.ice_lite;
            let current_role = self.ice_transport().role();

            // RFC 8445 S6.1.1: a full agent facing a lite one controls;
            // otherwise the offerer controls
            let ice_role = if is_renegotiation && current_role != RTCIceRole::Unspecified {
                current_role
            } else if (we_offer && remote_is_lite == local_is_lite)
                || (remote_is_lite && !local_is_lite)
            {
                RTCIceRole::Controlling
            } else {
                RTCIceRole::Controlled
            };

            self.ice_transport_mut().start(
                ice_role,
                RTCIceParameters {
                    username_fragment: remote_ufrag,
                    password: remote_pwd,
                    ice_lite: remote_is_lite,
                },
            )?;
        }

        if let Some((value, algorithm)) = fingerprint {
            let ice_role = self.ice_transport().role();
            self.pipeline_context.dtls_handler_context.pending_start = Some((
                ice_role,
                DTLSParameters {
                    role: RTCDtlsRole::from(parsed),
                    fingerprints: vec![RTCDtlsFingerprint { algorithm, value }],
                },
            ));
        }

        if let Some(data) = parsed.media_descriptions.iter().find(|m| {
            m.media_name.media == MEDIA_SECTION_APPLICATION && m.media_name.port.value != 0
        }) {
            let remote_max_message_size = get_max_message_size(data).unwrap_or(0);
            let sctp_handler_context = &mut self.pipeline_context.sctp_handler_context;
            sctp_handler_context.enabled = true;
            sctp_handler_context
                .sctp_transport
                .set_remote_max_message_size(remote_max_message_size);

            // data section added by a renegotiation on a running DTLS transport
            if is_renegotiation
                && self.dtls_transport().state() == RTCDtlsTransportState::Connected
                && self.sctp_transport().association.is_none()
            {
                let is_client = self.dtls_transport().role() == RTCDtlsRole::Client;
                let now = self.pipeline_context.now;
                self.sctp_transport_mut().start(is_client, now)?;
            }
        }

        Ok(())
    }

    fn stop_transceiver(&mut self, index: usize) {
        let interceptor = &mut self.configuration.interceptor;
        let t = &mut self.rtp_transceivers[index];
        if t.stopped {
            return;
        }
        debug!("transceiver {index} rejected by the remote, stopping");
        t.sender.stop(interceptor);
        t.receiver.stop(interceptor);
        t.stop();
    }

    /// Starts the senders and receivers the negotiated directions allow
    /// and stops the others.
    pub(super) fn start_rtp(&mut self) {
        let track_details = self
            .current_remote_description
            .as_ref()
            .and_then(|d| d.parsed.as_ref())
            .map(track_details_from_sdp)
            .unwrap_or_default();

        let RTCConfiguration {
            media_engine,
            interceptor,
            ..
        } = &mut self.configuration;

        for (i, t) in self.rtp_transceivers.iter_mut().enumerate() {
            if t.stopped {
                continue;
            }

            if t.current_direction.has_send() {
                if let Err(err) = t.sender.start(media_engine, interceptor) {
                    warn!("failed to start sender of transceiver {i}: {err}");
                }
            } else {
                t.sender.stop(interceptor);
            }

            if !t.current_direction.has_recv() {
                t.receiver.stop(interceptor);
                continue;
            }
            let Some(mid) = t.mid.as_deref() else {
                continue;
            };
            match track_details
                .iter()
                .find(|details| details.mid == mid && details.kind == t.kind)
            {
                Some(details) => {
                    if let Err(err) = t.receiver.start(details, media_engine, interceptor) {
                        warn!("failed to start receiver of transceiver {i}: {err}");
                    }
                }
                None => trace!("no remote track announced for mid {mid}"),
            }
        }
    }

    /// Applies the 1:1 NAT mapping of the setting engine to a local host
    /// candidate.
    pub(super) fn nat_1to1_candidates(&self, candidate: Candidate) -> Result<Vec<Candidate>> {
        let candidates = &self.configuration.setting_engine.candidates;
        let local = RTCIceCandidate::from(&candidate);
        if candidates.nat_1to1_ips.is_empty() || local.typ != RTCIceCandidateType::Host {
            return Ok(vec![candidate]);
        }

        let Some(external_ip) = nat_1to1_external_ip(&candidates.nat_1to1_ips, &local.address)?
        else {
            return Ok(vec![candidate]);
        };

        match candidates.nat_1to1_ip_candidate_type {
            RTCIceCandidateType::Host | RTCIceCandidateType::Unspecified => {
                let mapped = RTCIceCandidate {
                    id: String::new(),
                    foundation: String::new(),
                    address: external_ip,
                    ..local
                };
                Ok(vec![mapped.to_ice()?])
            }
            RTCIceCandidateType::Srflx => {
                let srflx = RTCIceCandidate {
                    id: String::new(),
                    foundation: String::new(),
                    priority: 0,
                    typ: RTCIceCandidateType::Srflx,
                    related_address: local.address.clone(),
                    related_port: local.port,
                    address: external_ip,
                    ..local
                };
                Ok(vec![candidate, srflx.to_ice()?])
            }
            _ => Err(Error::ErrUnsupportedNat1to1IpCandidateType),
        }
    }

    /// <https://www.w3.org/TR/webrtc/#dfn-update-the-negotiation-needed-flag>
    pub(crate) fn trigger_negotiation_needed(&mut self) {
        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            return;
        }
        // re-checked once the signaling state is stable again
        if self.signaling_state != RTCSignalingState::Stable {
            return;
        }
        if !self.check_negotiation_needed() {
            self.is_negotiation_ongoing = false;
            return;
        }
        if self.is_negotiation_ongoing {
            return;
        }

        self.is_negotiation_ongoing = true;
        debug!("negotiation needed");
        self.pipeline_context
            .event_outs
            .push_back(RTCPeerConnectionEvent::OnNegotiationNeededEvent);
    }

    /// <https://www.w3.org/TR/webrtc/#dfn-check-if-negotiation-is-needed>
    fn check_negotiation_needed(&self) -> bool {
        if self.is_ice_restart_pending {
            return true;
        }

        let Some(local_desc) = &self.current_local_description else {
            return true;
        };

        if !self.data_channels.is_empty() && have_data_channel(local_desc).is_none() {
            return true;
        }

        for t in &self.rtp_transceivers {
            let m = t.mid.as_deref().and_then(|mid| get_by_mid(mid, local_desc));

            if t.stopped {
                // a stopped transceiver must be rejected in the description
                if m.is_some_and(|m| m.media_name.port.value != 0) {
                    return true;
                }
                continue;
            }

            let Some(m) = m else {
                return true;
            };

            let direction = effective_direction(t);
            if direction.has_send() {
                let Some(track) = &t.sender.track else {
                    return true;
                };
                let Some(msid) = m.attribute(ATTR_KEY_MSID).flatten() else {
                    return true;
                };
                if msid.split_whitespace().next() != Some(track.stream_id().as_str()) {
                    return true;
                }
            }

            match local_desc.sdp_type {
                RTCSdpType::Offer => {
                    let Some(remote_desc) = &self.current_remote_description else {
                        continue;
                    };
                    let Some(rm) = t.mid.as_deref().and_then(|mid| get_by_mid(mid, remote_desc))
                    else {
                        return true;
                    };
                    if get_peer_direction(m) != direction
                        && get_peer_direction(rm) != direction.reverse()
                    {
                        return true;
                    }
                }
                RTCSdpType::Answer => {
                    let Some(remote_desc) = &self.current_remote_description else {
                        return true;
                    };
                    let offered_direction = match t
                        .mid
                        .as_deref()
                        .and_then(|mid| get_by_mid(mid, remote_desc))
                        .map(get_peer_direction)
                    {
                        Some(RTCRtpTransceiverDirection::Unspecified) | None => {
                            RTCRtpTransceiverDirection::Inactive
                        }
                        Some(direction) => direction,
                    };
                    if get_peer_direction(m) != direction.intersect(offered_direction.reverse()) {
                        return true;
                    }
                }
                _ => {}
            }
        }

        false
    }

    /// Aggregates the transport states into the connection state and
    /// emits a change.
    pub(crate) fn update_connection_state(&mut self, is_closed: bool) {
        let sctp_state = if !self.data_channels.is_empty()
            || self.pipeline_context.sctp_handler_context.enabled
        {
            Some(self.sctp_transport().state)
        } else {
            None
        };

        let connection_state = RTCPeerConnectionState::aggregate(
            is_closed,
            self.ice_connection_state,
            self.dtls_transport().state(),
            sctp_state,
        );

        if self.peer_connection_state == connection_state {
            return;
        }

        debug!("peer connection state changed: {connection_state}");
        self.peer_connection_state = connection_state;
        self.pipeline_context
            .event_outs
            .push_back(RTCPeerConnectionEvent::OnConnectionStateChangeEvent(
                connection_state,
            ));
    }
}

/// The direction a transceiver is announced with: no send part without a
/// track.
fn effective_direction(t: &RTCRtpTransceiver) -> RTCRtpTransceiverDirection {
    RTCRtpTransceiverDirection::from_send_recv(
        t.sender.track.is_some() && t.direction.has_send(),
        t.direction.has_recv(),
    )
}

/// Picks the public address of `local_ip` from entries of the form
/// `external/internal` or `external`. An explicit internal match wins over
/// a bare external address of the same family.
fn nat_1to1_external_ip(mappings: &[String], local_ip: &str) -> Result<Option<String>> {
    let Ok(local_ip) = local_ip.parse::<IpAddr>() else {
        // mDNS names are never mapped
        return Ok(None);
    };

    let mut catch_all = None;
    for mapping in mappings {
        let (external, internal) = match mapping.split_once('/') {
            Some((external, internal)) => (external, Some(internal)),
            None => (mapping.as_str(), None),
        };
        let external = external
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| Error::ErrInvalidNat1to1IpMapping)?;

        match internal {
            Some(internal) => {
                let internal = internal
                    .trim()
                    .parse::<IpAddr>()
                    .map_err(|_| Error::ErrInvalidNat1to1IpMapping)?;
                if external.is_ipv4() != internal.is_ipv4() {
                    return Err(Error::ErrInvalidNat1to1IpMapping);
                }
                if internal == local_ip {
                    return Ok(Some(external.to_string()));
                }
            }
            None => {
                if catch_all.is_none() && external.is_ipv4() == local_ip.is_ipv4() {
                    catch_all = Some(external.to_string());
                }
            }
        }
    }

    Ok(catch_all)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_nat_1to1_external_ip() {
        let mappings = vec!["1.2.3.4".to_owned()];
        assert_eq!(
            nat_1to1_external_ip(&mappings, "10.0.0.1").ok().flatten(),
            Some("1.2.3.4".to_owned())
        );
        assert_eq!(nat_1to1_external_ip(&mappings, "::1").ok().flatten(), None);

        let mappings = vec!["1.2.3.4".to_owned(), "5.6.7.8/10.0.0.2".to_owned()];
        assert_eq!(
            nat_1to1_external_ip(&mappings, "10.0.0.2").ok().flatten(),
            Some("5.6.7.8".to_owned())
        );
        assert_eq!(
            nat_1to1_external_ip(&mappings, "10.0.0.3").ok().flatten(),
            Some("1.2.3.4".to_owned())
        );

        assert_eq!(
            nat_1to1_external_ip(&mappings, "host.local").ok().flatten(),
            None
        );
    }

    #[test]
    fn test_nat_1to1_external_ip_invalid() {
        for mapping in ["not-an-ip", "1.2.3.4/", "1.2.3.4/::1"] {
            let result = nat_1to1_external_ip(&[mapping.to_owned()], "10.0.0.1");
            assert!(
                matches!(result, Err(Error::ErrInvalidNat1to1IpMapping)),
                "{mapping}"
            );
        }
    }
}
