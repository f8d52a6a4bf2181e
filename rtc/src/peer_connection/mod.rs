//! The peer connection: signaling, transports and media of one WebRTC
//! session, driven through [`sansio::Protocol`].
//!
//! Nothing in here touches a socket or a clock. Datagrams go in with
//! `handle_read`, datagrams to send come out of `poll_write`, and time only
//! advances through `handle_timeout`.

pub mod certificate;
pub mod configuration;
pub mod event;
pub(crate) mod handler;
mod internal;
pub mod message;
pub mod sdp;
pub mod state;
pub mod transport;

use std::collections::HashMap;
use std::time::Instant;

use ::sdp::description::session::Origin;
use ::sdp::util::ConnectionRole;
use ice::AgentConfig;
use ice::candidate::CandidateType;
use interceptor::{Interceptor, NoopInterceptor};
use log::{debug, trace};
use shared::error::{Error, Result};

use crate::data_channel::init::RTCDataChannelInit;
use crate::data_channel::internal::RTCDataChannelInternal;
use crate::data_channel::{RTCDataChannel, RTCDataChannelId, generate_data_channel_id};
use crate::media_stream::track::MediaStreamTrack;
use crate::peer_connection::configuration::RTCConfiguration;
use crate::peer_connection::configuration::offer_answer_options::{
    RTCAnswerOptions, RTCOfferOptions,
};
use crate::peer_connection::configuration::policy::RTCIceTransportPolicy;
use crate::peer_connection::configuration::setting_engine::DEFAULT_ICE_CHECK_INTERVAL;
use crate::peer_connection::event::{RTCDataChannelEvent, RTCPeerConnectionEvent};
use crate::peer_connection::handler::PipelineContext;
use crate::peer_connection::handler::dtls::DtlsHandlerContext;
use crate::peer_connection::handler::ice::IceHandlerContext;
use crate::peer_connection::handler::sctp::{SctpHandlerContext, open_data_channel};
use crate::peer_connection::sdp::{
    RTCSdpType, RTCSessionDescription, get_mid_value, get_peer_direction, is_lite_set,
    update_sdp_origin,
};
use crate::peer_connection::state::signaling_state::StateChangeOp;
use crate::peer_connection::state::{
    RTCIceConnectionState, RTCIceGatheringState, RTCPeerConnectionState, RTCSignalingState,
};
use crate::peer_connection::transport::dtls::RTCDtlsTransport;
use crate::peer_connection::transport::dtls::role::{
    DEFAULT_DTLS_ROLE_ANSWER, DEFAULT_DTLS_ROLE_OFFER,
};
use crate::peer_connection::transport::ice::RTCIceTransport;
use crate::peer_connection::transport::sctp::RTCSctpTransport;
use crate::peer_connection::transport::{
    RTCDtlsRole, RTCIceCandidateInit, RTCIceCandidatePair, RTCSctpTransportState,
};
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use crate::rtp_transceiver::rtp_sender::{RTCRtpCodecParameters, RTCRtpSender, RtpCodecKind};
use crate::rtp_transceiver::{
    RTCRtpReceiverId, RTCRtpSenderId, RTCRtpTransceiver, RTCRtpTransceiverId,
    RTCRtpTransceiverInit, find_by_mid,
};

/// Offers regenerated this many times without settling fail.
const MAX_OFFER_RETRIES: usize = 128;

/// PeerConnection represents a WebRTC connection that establishes a
/// peer-to-peer communications with another PeerConnection instance in a
/// browser, or to another endpoint implementing the required protocols.
///
/// * [W3C RTCPeerConnection](https://w3c.github.io/webrtc-pc/#rtcpeerconnection-interface)
pub struct RTCPeerConnection<I = NoopInterceptor>
where
    I: Interceptor,
{
    //////////////////////////////////////////////////
    // PeerConnection WebRTC Spec Interface Definition
    //////////////////////////////////////////////////
    pub(crate) configuration: RTCConfiguration<I>,

    current_local_description: Option<RTCSessionDescription>,
    pending_local_description: Option<RTCSessionDescription>,
    current_remote_description: Option<RTCSessionDescription>,
    pending_remote_description: Option<RTCSessionDescription>,

    signaling_state: RTCSignalingState,
    ice_gathering_state: RTCIceGatheringState,
    ice_connection_state: RTCIceConnectionState,
    peer_connection_state: RTCPeerConnectionState,

    //////////////////////////////////////////////////
    // PeerConnection Internal State Machine
    //////////////////////////////////////////////////
    pub(crate) pipeline_context: PipelineContext,
    pub(crate) data_channels: HashMap<RTCDataChannelId, RTCDataChannelInternal>,
    pub(crate) rtp_transceivers: Vec<RTCRtpTransceiver>,

    greater_mid: usize,
    sdp_origin: Origin,
    last_offer: String,
    last_answer: String,

    /// An OnNegotiationNeeded was emitted and no offer/answer round
    /// completed since.
    is_negotiation_ongoing: bool,
    /// restart_ice was called and no offer carried the new credentials yet.
    is_ice_restart_pending: bool,
}

impl<I> RTCPeerConnection<I>
where
    I: Interceptor,
{
    /// creates a PeerConnection with RTCConfiguration
    pub fn new(mut configuration: RTCConfiguration<I>) -> Result<Self> {
        let mut urls = vec![];
        for server in &configuration.ice_servers {
            server.validate()?;
            urls.extend(server.urls()?);
        }

        let negotiate_multi_codecs = !configuration
            .setting_engine
            .disable_media_engine_multiple_codecs;
        configuration
            .media_engine
            .set_multi_codec_negotiation(negotiate_multi_codecs);

        let setting_engine = &configuration.setting_engine;

        // Create the ICE transport
        let agent_config = AgentConfig {
            urls,
            local_ufrag: setting_engine.candidates.username_fragment.clone(),
            local_pwd: setting_engine.candidates.password.clone(),
            disconnected_timeout: setting_engine.timeout.ice_disconnected_timeout,
            failed_timeout: setting_engine.timeout.ice_failed_timeout,
            keepalive_interval: setting_engine.timeout.ice_keepalive_interval,
            candidate_types: if configuration.ice_transport_policy
                == RTCIceTransportPolicy::Relay
            {
                vec![CandidateType::Relay]
            } else {
                vec![]
            },
            check_interval: setting_engine
                .timeout
                .ice_check_interval
                .unwrap_or(DEFAULT_ICE_CHECK_INTERVAL),
            lite: setting_engine.candidates.ice_lite,
            host_acceptance_min_wait: setting_engine.timeout.ice_host_acceptance_min_wait,
            srflx_acceptance_min_wait: setting_engine.timeout.ice_srflx_acceptance_min_wait,
            prflx_acceptance_min_wait: setting_engine.timeout.ice_prflx_acceptance_min_wait,
            relay_acceptance_min_wait: setting_engine.timeout.ice_relay_acceptance_min_wait,
            ..Default::default()
        };
        let ice_transport = RTCIceTransport::new(agent_config)?;

        // Create the DTLS transport
        let dtls_transport =
            RTCDtlsTransport::new(configuration.certificates.clone(), setting_engine)?;

        // Create the SCTP transport
        let sctp_transport = RTCSctpTransport::new(setting_engine.sctp_max_message_size);

        configuration.certificates = dtls_transport.certificates().to_vec();

        let pipeline_context = PipelineContext::new(
            IceHandlerContext::new(ice_transport),
            DtlsHandlerContext::new(dtls_transport),
            SctpHandlerContext::new(sctp_transport),
            Instant::now(),
        );

        Ok(Self {
            configuration,

            current_local_description: None,
            pending_local_description: None,
            current_remote_description: None,
            pending_remote_description: None,

            signaling_state: RTCSignalingState::Stable,
            ice_gathering_state: RTCIceGatheringState::New,
            ice_connection_state: RTCIceConnectionState::New,
            peer_connection_state: RTCPeerConnectionState::New,

            pipeline_context,
            data_channels: HashMap::new(),
            rtp_transceivers: vec![],

            greater_mid: 0,
            sdp_origin: Origin::default(),
            last_offer: String::new(),
            last_answer: String::new(),

            is_negotiation_ongoing: false,
            is_ice_restart_pending: false,
        })
    }

    /// create_offer starts the PeerConnection and generates the localDescription
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnection-createoffer>
    pub fn create_offer(
        &mut self,
        options: Option<RTCOfferOptions>,
    ) -> Result<RTCSessionDescription> {
        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            return Err(Error::ErrConnectionClosed);
        }

        if let Some(options) = options {
            if options.ice_restart && !self.is_ice_restart_pending {
                self.restart_ice_transport()?;
                self.is_ice_restart_pending = true;
            }
        }

        // Local media may change while the offer is generated; recompute
        // until it is stable.
        let mut count = 0;
        let mut offer;

        loop {
            // mids of the remote must never be reused
            if let Some(parsed) = self
                .current_remote_description
                .as_ref()
                .and_then(|d| d.parsed.as_ref())
            {
                for media in &parsed.media_descriptions {
                    let Some(numeric_mid) = get_mid_value(media).and_then(|mid| mid.parse::<usize>().ok())
                    else {
                        continue;
                    };
                    if numeric_mid >= self.greater_mid {
                        self.greater_mid = numeric_mid + 1;
                    }
                }
            }

            for t in &mut self.rtp_transceivers {
                if t.mid.is_some() || t.stopped {
                    continue;
                }
                t.mid = Some(format!("{}", self.greater_mid));
                self.greater_mid += 1;
            }

            let mut d = if self.current_remote_description.is_none() {
                self.generate_unmatched_sdp()?
            } else {
                self.generate_matched_sdp(true, DEFAULT_DTLS_ROLE_OFFER.to_connection_role())?
            };

            update_sdp_origin(&mut self.sdp_origin, &mut d);

            offer = RTCSessionDescription {
                sdp_type: RTCSdpType::Offer,
                sdp: d.marshal(),
                parsed: Some(d),
            };

            if !self.has_local_description_changed(&offer) {
                break;
            }
            count += 1;
            if count >= MAX_OFFER_RETRIES {
                return Err(Error::ErrExcessiveRetries);
            }
        }

        trace!("created offer:\n{}", offer.sdp);
        self.last_offer.clone_from(&offer.sdp);

        Ok(offer)
    }

    /// create_answer starts the PeerConnection and generates the localDescription
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnection-createanswer>
    pub fn create_answer(
        &mut self,
        _options: Option<RTCAnswerOptions>,
    ) -> Result<RTCSessionDescription> {
        if self.remote_description().is_none() {
            return Err(Error::ErrNoRemoteDescription);
        }

        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            return Err(Error::ErrConnectionClosed);
        }

        if self.signaling_state != RTCSignalingState::HaveRemoteOffer
            && self.signaling_state != RTCSignalingState::HaveLocalPranswer
        {
            return Err(Error::ErrIncorrectSignalingState);
        }

        let connection_role = self.answer_connection_role();
        let mut d = self.generate_matched_sdp(false, connection_role)?;
        update_sdp_origin(&mut self.sdp_origin, &mut d);

        let answer = RTCSessionDescription {
            sdp_type: RTCSdpType::Answer,
            sdp: d.marshal(),
            parsed: Some(d),
        };

        trace!("created answer:\n{}", answer.sdp);
        self.last_answer.clone_from(&answer.sdp);

        Ok(answer)
    }

    /// The a=setup of an answer. An established DTLS role is kept, else the
    /// setting engine decides, else the default; a lite remote talking to a
    /// full agent makes us the server.
    fn answer_connection_role(&self) -> ConnectionRole {
        let established = self.dtls_transport().role();
        if matches!(established, RTCDtlsRole::Client | RTCDtlsRole::Server) {
            return established.to_connection_role();
        }

        let answering_dtls_role = self.configuration.setting_engine.answering_dtls_role;
        if matches!(answering_dtls_role, RTCDtlsRole::Client | RTCDtlsRole::Server) {
            return answering_dtls_role.to_connection_role();
        }

        let remote_is_lite = self
            .remote_description()
            .and_then(|d| d.parsed.as_ref())
            .is_some_and(is_lite_set);
        if remote_is_lite && !self.configuration.setting_engine.candidates.ice_lite {
            RTCDtlsRole::Server.to_connection_role()
        } else {
            DEFAULT_DTLS_ROLE_ANSWER.to_connection_role()
        }
    }

    /// set_local_description sets the SessionDescription of the local peer
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnection-setlocaldescription>
    pub fn set_local_description(&mut self, mut description: RTCSessionDescription) -> Result<()> {
        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            return Err(Error::ErrConnectionClosed);
        }

        if description.sdp_type == RTCSdpType::Rollback {
            return self.set_description(&description, StateChangeOp::SetLocal);
        }

        // JSEP 5.4
        if description.sdp.is_empty() {
            match description.sdp_type {
                RTCSdpType::Answer | RTCSdpType::Pranswer => {
                    description.sdp.clone_from(&self.last_answer);
                }
                RTCSdpType::Offer => {
                    description.sdp.clone_from(&self.last_offer);
                }
                _ => return Err(Error::ErrPeerConnSDPTypeInvalidValueSetLocalDescription),
            }
        }

        description.parsed = Some(description.unmarshal()?);
        self.set_description(&description, StateChangeOp::SetLocal)?;

        if description.sdp_type == RTCSdpType::Offer {
            self.is_ice_restart_pending = false;
        }

        if description.sdp_type == RTCSdpType::Answer {
            if let Some(parsed) = &description.parsed {
                // 4.4.1.5: applying a local answer sets the current direction
                for media in &parsed.media_descriptions {
                    let Some(mid) = get_mid_value(media) else {
                        continue;
                    };
                    let direction = get_peer_direction(media);
                    if direction == RTCRtpTransceiverDirection::Unspecified {
                        continue;
                    }
                    if let Some(i) = find_by_mid(mid, &self.rtp_transceivers) {
                        let t = &mut self.rtp_transceivers[i];
                        if !t.stopped {
                            t.set_current_direction(direction);
                        }
                    }
                }
            }
        }

        if self.ice_transport().gathering_state() == RTCIceGatheringState::New {
            self.ice_transport_mut().gather_candidates()?;
        }

        if description.sdp_type == RTCSdpType::Answer {
            self.start_rtp();
        }

        Ok(())
    }

    /// local_description returns PendingLocalDescription if it is not null and
    /// otherwise it returns CurrentLocalDescription. This property is used to
    /// determine if set_local_description has already been called.
    /// <https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-localdescription>
    pub fn local_description(&self) -> Option<&RTCSessionDescription> {
        if self.pending_local_description.is_some() {
            self.pending_local_description.as_ref()
        } else {
            self.current_local_description.as_ref()
        }
    }

    /// The local description of the last completed offer/answer round.
    pub fn current_local_description(&self) -> Option<&RTCSessionDescription> {
        self.current_local_description.as_ref()
    }

    /// The local offer or pranswer applied in the ongoing round.
    pub fn pending_local_description(&self) -> Option<&RTCSessionDescription> {
        self.pending_local_description.as_ref()
    }

    /// set_remote_description sets the SessionDescription of the remote peer
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnection-setremotedescription>
    pub fn set_remote_description(&mut self, mut description: RTCSessionDescription) -> Result<()> {
        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            return Err(Error::ErrConnectionClosed);
        }

        if description.sdp_type == RTCSdpType::Rollback {
            return self.set_description(&description, StateChangeOp::SetRemote);
        }

        let is_renegotiation = self.current_remote_description.is_some();

        description.parsed = Some(description.unmarshal()?);
        self.set_description(&description, StateChangeOp::SetRemote)?;

        let Some(parsed) = description.parsed.as_ref() else {
            return Ok(());
        };

        self.configuration
            .media_engine
            .update_from_remote_description(parsed)?;

        let we_offer = description.sdp_type == RTCSdpType::Answer;
        self.apply_remote_media_sections(parsed, we_offer)?;
        self.apply_remote_transport_parameters(parsed, we_offer, is_renegotiation)?;

        if self.signaling_state == RTCSignalingState::Stable {
            self.start_rtp();
        }

        Ok(())
    }

    /// remote_description returns pending_remote_description if it is not null and
    /// otherwise it returns current_remote_description. This property is used to
    /// determine if setRemoteDescription has already been called.
    /// <https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-remotedescription>
    pub fn remote_description(&self) -> Option<&RTCSessionDescription> {
        if self.pending_remote_description.is_some() {
            self.pending_remote_description.as_ref()
        } else {
            self.current_remote_description.as_ref()
        }
    }

    /// The remote description of the last completed offer/answer round.
    pub fn current_remote_description(&self) -> Option<&RTCSessionDescription> {
        self.current_remote_description.as_ref()
    }

    /// The remote offer or pranswer applied in the ongoing round.
    pub fn pending_remote_description(&self) -> Option<&RTCSessionDescription> {
        self.pending_remote_description.as_ref()
    }

    /// add_ice_candidate accepts a remote ICE candidate learned through
    /// signaling. An empty candidate marks the end of the remote candidates.
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnection-addicecandidate>
    pub fn add_ice_candidate(&mut self, candidate: RTCIceCandidateInit) -> Result<()> {
        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            return Err(Error::ErrConnectionClosed);
        }
        if self.remote_description().is_none() {
            return Err(Error::ErrNoRemoteDescription);
        }

        let candidate_value = candidate
            .candidate
            .strip_prefix("candidate:")
            .unwrap_or(candidate.candidate.as_str());
        if candidate_value.is_empty() {
            debug!("end of remote candidates");
            return Ok(());
        }

        let candidate = candidate.to_ice()?;
        trace!("adding remote candidate {candidate}");
        self.ice_transport_mut().add_remote_candidate(candidate)
    }

    /// add_local_candidate adds a candidate of a socket the application
    /// owns. Host candidates are rewritten or complemented according to
    /// the 1:1 NAT settings of the setting engine.
    pub fn add_local_candidate(&mut self, candidate: RTCIceCandidateInit) -> Result<()> {
        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            return Err(Error::ErrConnectionClosed);
        }

        let candidate_value = candidate
            .candidate
            .strip_prefix("candidate:")
            .unwrap_or(candidate.candidate.as_str());
        if candidate_value.is_empty() {
            return Ok(());
        }

        for candidate in self.nat_1to1_candidates(candidate.to_ice()?)? {
            trace!("adding local candidate {candidate}");
            self.ice_transport_mut().add_local_candidate(candidate)?;
        }
        Ok(())
    }

    /// restart_ice generates new local ICE credentials right away and
    /// triggers negotiation needed. The next offer carries the credentials;
    /// DTLS and SCTP survive the restart.
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnection-restartice>
    pub fn restart_ice(&mut self) -> Result<()> {
        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            return Err(Error::ErrConnectionClosed);
        }

        self.restart_ice_transport()?;
        self.is_ice_restart_pending = true;
        self.trigger_negotiation_needed();
        Ok(())
    }

    /// get_configuration returns the configuration this PeerConnection was
    /// created with, certificates included.
    /// <https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-getconfiguration>
    pub fn get_configuration(&self) -> &RTCConfiguration<I> {
        &self.configuration
    }

    /// signaling_state attribute returns the signaling state of the
    /// PeerConnection instance.
    pub fn signaling_state(&self) -> RTCSignalingState {
        self.signaling_state
    }

    /// ice_connection_state attribute returns the ICE connection state of the
    /// PeerConnection instance.
    pub fn ice_connection_state(&self) -> RTCIceConnectionState {
        self.ice_connection_state
    }

    /// ice_gathering_state attribute returns the ICE gathering state of the
    /// PeerConnection instance.
    pub fn ice_gathering_state(&self) -> RTCIceGatheringState {
        self.ice_gathering_state
    }

    /// connection_state attribute returns the connection state of the
    /// PeerConnection instance.
    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.peer_connection_state
    }

    /// The candidate pair ICE sends on. None until a pair is nominated and
    /// again after an ICE restart discards it.
    pub fn selected_candidate_pair(&self) -> Option<RTCIceCandidatePair> {
        self.ice_transport().get_selected_candidate_pair()
    }

    /// create_data_channel creates a new DataChannel object with the given label
    /// and optional DataChannelInit used to configure properties of the
    /// underlying channel such as data reliability.
    /// <https://w3c.github.io/webrtc-pc/#dom-peerconnection-createdatachannel>
    pub fn create_data_channel(
        &mut self,
        label: &str,
        options: Option<RTCDataChannelInit>,
    ) -> Result<RTCDataChannel<'_, I>> {
        // https://w3c.github.io/webrtc-pc/#peer-to-peer-data-api (Step #2)
        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            return Err(Error::ErrConnectionClosed);
        }

        let options = options.unwrap_or_default();

        // https://w3c.github.io/webrtc-pc/#peer-to-peer-data-api (Step #16)
        if options.max_packet_life_time.is_some() && options.max_retransmits.is_some() {
            return Err(Error::ErrRetransmitsOrPacketLifeTime);
        }

        // https://w3c.github.io/webrtc-pc/#peer-to-peer-data-api (Step #11)
        let protocol = options.protocol.unwrap_or_default();
        if protocol.len() > u16::MAX as usize {
            return Err(Error::ErrProtocolTooLarge);
        }

        let id = match options.negotiated {
            Some(id) => {
                if self.data_channels.contains_key(&id) {
                    return Err(Error::ErrStreamAlreadyExist);
                }
                id
            }
            None => {
                let is_dtls_client = self.dtls_transport().role() == RTCDtlsRole::Client;
                let max_channels = self.sctp_transport().max_channels();
                generate_data_channel_id(is_dtls_client, max_channels, |id| {
                    self.data_channels.contains_key(&id)
                })?
            }
        };

        let mut data_channel = RTCDataChannelInternal::new(
            id,
            label.to_owned(),
            options.ordered.unwrap_or(true),
            options.max_packet_life_time,
            options.max_retransmits,
            protocol,
            options.negotiated.is_some(),
        );

        // channels created on a running association open right away, the
        // others once it is up
        let sctp_transport = &mut self.pipeline_context.sctp_handler_context.sctp_transport;
        if sctp_transport.state == RTCSctpTransportState::Connected {
            if let Some(association) = sctp_transport.association.as_mut() {
                if open_data_channel(association, &mut data_channel)? {
                    self.pipeline_context.event_outs.push_back(
                        RTCPeerConnectionEvent::OnDataChannel(RTCDataChannelEvent::OnOpen(id)),
                    );
                }
            }
        }

        debug!("data channel {id} created, label {label:?}");
        self.data_channels.insert(id, data_channel);
        self.trigger_negotiation_needed();

        Ok(RTCDataChannel {
            id,
            peer_connection: self,
        })
    }

    /// Handle of the data channel `id`, locally created or announced by the
    /// remote.
    pub fn data_channel(&mut self, id: RTCDataChannelId) -> Option<RTCDataChannel<'_, I>> {
        if self.data_channels.contains_key(&id) {
            Some(RTCDataChannel {
                id,
                peer_connection: self,
            })
        } else {
            None
        }
    }

    /// add_track adds a Track to the PeerConnection. A transceiver of the
    /// same kind that never sent is reused, else a sendrecv one is created.
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnection-addtrack>
    pub fn add_track(&mut self, track: MediaStreamTrack) -> Result<RTCRtpSenderId> {
        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            return Err(Error::ErrConnectionClosed);
        }
        if track.kind() == RtpCodecKind::Unspecified {
            return Err(Error::ErrPeerConnAddTransceiverFromKindSupport);
        }

        if self
            .rtp_transceivers
            .iter()
            .any(|t| t.sender.track_id() == Some(track.track_id().as_str()))
        {
            return Err(Error::ErrExistingTrack);
        }

        let reusable = self.rtp_transceivers.iter().position(|t| {
            !t.stopped
                && t.kind == track.kind()
                && t.sender.track.is_none()
                && !t.sender.is_started()
                && !t.current_direction.has_send()
        });

        let id = match reusable {
            Some(id) => {
                let t = &mut self.rtp_transceivers[id];
                let direction = RTCRtpTransceiverDirection::from_send_recv(true, t.direction.has_recv());
                t.set_direction(direction);
                t.sender.track = Some(track);
                id
            }
            None => {
                self.rtp_transceivers.push(RTCRtpTransceiver::new(
                    track.kind(),
                    Some(track),
                    RTCRtpTransceiverDirection::Sendrecv,
                ));
                self.rtp_transceivers.len() - 1
            }
        };

        debug!("track added on transceiver {id}");
        self.trigger_negotiation_needed();
        Ok(RTCRtpSenderId(id))
    }

    /// remove_track stops sending the track of `sender_id`. The transceiver
    /// stays; its direction loses the send part.
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnection-removetrack>
    pub fn remove_track(&mut self, sender_id: RTCRtpSenderId) -> Result<()> {
        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            return Err(Error::ErrConnectionClosed);
        }

        let Some(t) = self.rtp_transceivers.get_mut(sender_id.0) else {
            return Err(Error::ErrSenderNotCreatedByConnection);
        };
        if t.sender.track.is_none() {
            return Ok(());
        }

        t.sender.stop(&mut self.configuration.interceptor);
        t.sender.track = None;
        let direction = RTCRtpTransceiverDirection::from_send_recv(false, t.direction.has_recv());
        t.set_direction(direction);

        debug!("track removed from transceiver {}", sender_id.0);
        self.trigger_negotiation_needed();
        Ok(())
    }

    /// Creates a transceiver of `kind` without a track, sendrecv unless
    /// `init` says otherwise.
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnection-addtransceiver>
    pub fn add_transceiver_from_kind(
        &mut self,
        kind: RtpCodecKind,
        init: Option<RTCRtpTransceiverInit>,
    ) -> Result<RTCRtpTransceiverId> {
        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            return Err(Error::ErrConnectionClosed);
        }
        if kind == RtpCodecKind::Unspecified {
            return Err(Error::ErrPeerConnAddTransceiverFromKindSupport);
        }

        let direction = match init.map(|init| init.direction) {
            None | Some(RTCRtpTransceiverDirection::Unspecified) => {
                RTCRtpTransceiverDirection::Sendrecv
            }
            Some(direction) => direction,
        };

        self.rtp_transceivers
            .push(RTCRtpTransceiver::new(kind, None, direction));
        let id = self.rtp_transceivers.len() - 1;

        debug!("{kind} transceiver {id} added, direction {direction}");
        self.trigger_negotiation_needed();
        Ok(id)
    }

    /// Restricts and orders the codecs negotiated for a transceiver. An
    /// empty list goes back to every codec of the media engine.
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcrtptransceiver-setcodecpreferences>
    pub fn set_codec_preferences(
        &mut self,
        transceiver_id: RTCRtpTransceiverId,
        codecs: Vec<RTCRtpCodecParameters>,
    ) -> Result<()> {
        let Some(t) = self.rtp_transceivers.get_mut(transceiver_id) else {
            return Err(Error::ErrRTPTransceiverNotExisted);
        };
        t.set_codec_preferences(codecs, &self.configuration.media_engine)?;
        self.trigger_negotiation_needed();
        Ok(())
    }

    /// Changes the preferred direction of a transceiver.
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcrtptransceiver-direction>
    pub fn set_transceiver_direction(
        &mut self,
        transceiver_id: RTCRtpTransceiverId,
        direction: RTCRtpTransceiverDirection,
    ) -> Result<()> {
        let Some(t) = self.rtp_transceivers.get_mut(transceiver_id) else {
            return Err(Error::ErrRTPTransceiverNotExisted);
        };
        if t.stopped {
            return Err(Error::ErrRTPTransceiverSetSendingInvalidState);
        }
        if t.set_direction(direction) {
            self.trigger_negotiation_needed();
        }
        Ok(())
    }

    /// All transceivers, indexed by their [`RTCRtpTransceiverId`].
    pub fn get_transceivers(&self) -> &[RTCRtpTransceiver] {
        &self.rtp_transceivers
    }

    pub fn transceiver(&self, id: RTCRtpTransceiverId) -> Option<&RTCRtpTransceiver> {
        self.rtp_transceivers.get(id)
    }

    /// Handle of the sending half of a transceiver.
    pub fn rtp_sender(&mut self, id: RTCRtpSenderId) -> Option<RTCRtpSender<'_, I>> {
        if id.0 < self.rtp_transceivers.len() {
            Some(RTCRtpSender {
                id,
                peer_connection: self,
            })
        } else {
            None
        }
    }

    /// Handle of the receiving half of a transceiver. The id comes with
    /// [`RTCTrackEvent`](crate::peer_connection::event::RTCTrackEvent).
    pub fn rtp_receiver(&mut self, id: RTCRtpReceiverId) -> Option<RTCRtpReceiver<'_, I>> {
        if id.0 < self.rtp_transceivers.len() {
            Some(RTCRtpReceiver {
                id,
                peer_connection: self,
            })
        } else {
            None
        }
    }
}
