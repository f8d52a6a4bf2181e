use std::sync::Arc;

use ice::candidate::Candidate;
use ice::tcp_type::TcpType;
use ice::{Agent, AgentConfig};
use log::{debug, info};
use shared::error::{Error, Result};

use crate::peer_connection::state::{RTCIceConnectionState, RTCIceGatheringState};
use crate::peer_connection::transport::ice::candidate::RTCIceCandidate;
use crate::peer_connection::transport::ice::candidate_pair::RTCIceCandidatePair;
use crate::peer_connection::transport::ice::parameters::RTCIceParameters;
use crate::peer_connection::transport::ice::role::RTCIceRole;

pub(crate) mod candidate;
pub(crate) mod candidate_pair;
pub(crate) mod candidate_type;
pub(crate) mod parameters;
pub(crate) mod protocol;
pub(crate) mod role;
pub(crate) mod server;

/// The ICE agent of a peer connection plus the bookkeeping the peer
/// connection needs around it.
pub(crate) struct RTCIceTransport {
    pub(crate) agent: Agent,
    started: bool,
    ice_lite: bool,
}

impl RTCIceTransport {
    pub(crate) fn new(agent_config: AgentConfig) -> Result<Self> {
        let ice_lite = agent_config.lite;
        let agent = Agent::new(Arc::new(agent_config))?;

        Ok(RTCIceTransport {
            agent,
            started: false,
            ice_lite,
        })
    }

    pub(crate) fn get_local_parameters(&self) -> RTCIceParameters {
        let credentials = self.agent.get_local_credentials();
        RTCIceParameters {
            username_fragment: credentials.ufrag.clone(),
            password: credentials.pwd.clone(),
            ice_lite: self.ice_lite,
        }
    }

    pub(crate) fn get_local_candidates(&self) -> Vec<RTCIceCandidate> {
        self.agent
            .get_local_candidates()
            .iter()
            .map(RTCIceCandidate::from)
            .collect()
    }

    pub(crate) fn get_remote_candidates(&self) -> Vec<RTCIceCandidate> {
        self.agent
            .get_remote_candidates()
            .iter()
            .map(RTCIceCandidate::from)
            .collect()
    }

    pub(crate) fn get_remote_user_credentials(&self) -> (&str, &str) {
        if let Some(remote_credentials) = self.agent.get_remote_credentials() {
            (
                remote_credentials.ufrag.as_str(),
                remote_credentials.pwd.as_str(),
            )
        } else {
            ("", "")
        }
    }

    pub(crate) fn have_remote_credentials_change(&self, new_ufrag: &str, new_pwd: &str) -> bool {
        let (ufrag, pwd) = self.get_remote_user_credentials();
        ufrag != new_ufrag || pwd != new_pwd
    }

    pub(crate) fn get_selected_candidate_pair(&self) -> Option<RTCIceCandidatePair> {
        self.agent
            .get_selected_candidate_pair()
            .map(|(local, remote)| RTCIceCandidatePair::new(local.into(), remote.into()))
    }

    pub(crate) fn add_remote_candidate(&mut self, c: Candidate) -> Result<()> {
        if c.tcp_type() == TcpType::Active {
            // Active TCP candidates probe passive ones, they never receive checks.
            info!("Ignoring remote candidate with tcpType active: {c}");
            return Ok(());
        }

        self.agent.add_remote_candidate(c)
    }

    pub(crate) fn add_local_candidate(&mut self, c: Candidate) -> Result<()> {
        self.agent.add_local_candidate(c)
    }

    /// Starts gathering srflx and relay candidates from the configured servers.
    pub(crate) fn gather_candidates(&mut self) -> Result<()> {
        self.agent.gather_candidates()
    }

    pub(crate) fn role(&self) -> RTCIceRole {
        self.agent.role().into()
    }

    pub(crate) fn state(&self) -> RTCIceConnectionState {
        self.agent.state().into()
    }

    pub(crate) fn gathering_state(&self) -> RTCIceGatheringState {
        self.agent.gathering_state().into()
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started
    }

    /// Replaces the local credentials and drops every remote candidate and
    /// pair. Connectivity checks resume with the next remote description.
    pub(crate) fn restart(
        &mut self,
        ufrag: String,
        pwd: String,
        keep_local_candidates: bool,
    ) -> Result<()> {
        debug!("restarting ice transport, keep_local_candidates: {keep_local_candidates}");
        self.agent.restart(ufrag, pwd, keep_local_candidates)?;
        self.started = false;
        Ok(())
    }

    pub(crate) fn start(
        &mut self,
        local_ice_role: RTCIceRole,
        remote_ice_parameters: RTCIceParameters,
    ) -> Result<()> {
        if self.started {
            return Err(Error::ErrICETransportNotInNew);
        }
        if remote_ice_parameters.username_fragment.is_empty() {
            return Err(Error::ErrRemoteUfragEmpty);
        }
        if remote_ice_parameters.password.is_empty() {
            return Err(Error::ErrRemotePwdEmpty);
        }

        self.agent.start_connectivity_checks(
            local_ice_role == RTCIceRole::Controlling,
            remote_ice_parameters.username_fragment,
            remote_ice_parameters.password,
        )?;
        self.started = true;

        Ok(())
    }

    pub(crate) fn stop(&mut self) -> Result<()> {
        self.started = false;
        sansio::Protocol::close(&mut self.agent)
    }
}
