#[cfg(test)]
mod agent_test;

pub mod agent_config;
mod agent_gather;
mod agent_proto;
mod agent_selector;

use agent_config::*;
use agent_gather::ServerGatherer;
use bytes::BytesMut;
use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stun::attributes::*;
use stun::checks::error_code_of;
use stun::error_code::*;
use stun::fingerprint::*;
use stun::integrity::*;
use stun::message::*;
use stun::textattrs::*;
use stun::xoraddr::*;

use crate::attributes::{control::*, priority::*};
use crate::candidate::{candidate_pair::*, candidate_peer_reflexive::*, *};
use crate::rand::*;
use crate::state::*;
use crate::url::*;
use shared::error::*;
use shared::{TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol};

#[derive(Debug, Clone)]
pub(crate) struct BindingRequest {
    pub(crate) timestamp: Instant,
    pub(crate) transaction_id: TransactionId,
    pub(crate) destination: SocketAddr,
    pub(crate) is_use_candidate: bool,
    pub(crate) is_controlling: bool,
}

/// ICE username fragment and password of one side.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ufrag: String,
    pub pwd: String,
}

#[derive(Default)]
pub(crate) struct UfragPwd {
    pub(crate) local_credentials: Credentials,
    pub(crate) remote_credentials: Option<Credentials>,
}

/// Events surfaced by the agent through `poll_event`.
#[derive(Debug, Clone)]
pub enum Event {
    ConnectionStateChange(ConnectionState),
    /// The pair carrying application data changed, as (local, remote).
    SelectedCandidatePairChange(Box<Candidate>, Box<Candidate>),
    GatheringStateChange(GatheringState),
    /// A server reflexive or relay candidate was gathered.
    LocalCandidate(Box<Candidate>),
}

fn assert_inbound_username(m: &Message, expected_username: &str) -> Result<()> {
    let mut username = Username::new(ATTR_USERNAME, String::new());
    username.get_from(m)?;

    if username.to_string() != expected_username {
        return Err(Error::Other(format!(
            "{:?} expected({}) actual({})",
            Error::ErrMismatchUsername,
            expected_username,
            username,
        )));
    }

    Ok(())
}

fn assert_inbound_message_integrity(m: &mut Message, key: &[u8]) -> Result<()> {
    let message_integrity_attr = MessageIntegrity(key.to_vec());
    message_integrity_attr.check(m)
}

/// Represents the ICE agent.
///
/// The agent owns no sockets. Host candidates are supplied by the caller
/// through `add_local_candidate`, datagrams received on their addresses are
/// fed to `handle_read`, and everything the agent wants to send is drained
/// from `poll_write`. Timers run off the instants passed to `handle_read`,
/// `handle_write` and `handle_timeout`.
pub struct Agent {
    pub(crate) tie_breaker: u64,
    pub(crate) is_controlling: bool,
    pub(crate) lite: bool,

    pub(crate) start_time: Instant,
    pub(crate) now: Instant,
    pub(crate) started: bool,
    pub(crate) closed: bool,

    pub(crate) connection_state: ConnectionState,
    pub(crate) gathering_state: GatheringState,
    pub(crate) failure: Option<Error>,

    pub(crate) ufrag_pwd: UfragPwd,

    pub(crate) local_candidates: Vec<Candidate>,
    pub(crate) remote_candidates: Vec<Candidate>,
    pub(crate) candidate_pairs: Vec<CandidatePair>,
    pub(crate) nominated_pair: Option<usize>,
    pub(crate) selected_pair: Option<usize>,

    // outbound Binding requests still waiting for an answer
    pub(crate) pending_binding_requests: Vec<BindingRequest>,

    pub(crate) gatherers: Vec<ServerGatherer>,
    pub(crate) gather_deadline: Option<Instant>,

    pub(crate) last_checking_time: Instant,
    pub(crate) checking_started: Option<Instant>,

    pub(crate) max_binding_requests: u16,
    pub(crate) host_acceptance_min_wait: Duration,
    pub(crate) srflx_acceptance_min_wait: Duration,
    pub(crate) prflx_acceptance_min_wait: Duration,
    pub(crate) relay_acceptance_min_wait: Duration,
    // How long connectivity checks can fail before the ICE Agent
    // goes to disconnected
    pub(crate) disconnected_timeout: Duration,
    // How long connectivity checks can fail before the ICE Agent
    // goes to failed
    pub(crate) failed_timeout: Duration,
    // How often should we send keepalive packets?
    // 0 means never
    pub(crate) keepalive_interval: Duration,
    pub(crate) check_interval: Duration,
    pub(crate) gather_timeout: Duration,

    pub(crate) candidate_types: Vec<CandidateType>,
    pub(crate) urls: Vec<Url>,
    pub(crate) software: String,

    pub(crate) read_outs: VecDeque<TaggedBytesMut>,
    pub(crate) write_outs: VecDeque<TaggedBytesMut>,
    pub(crate) events: VecDeque<Event>,
}

impl Agent {
    /// Creates a new Agent.
    ///
    /// The creation instant is only used as a baseline until the first
    /// instant is passed in.
    pub fn new(config: Arc<AgentConfig>) -> Result<Self> {
        let candidate_types = config.candidate_types();

        if config.lite && (candidate_types.len() != 1 || candidate_types[0] != CandidateType::Host)
        {
            return Err(Error::ErrLiteUsingNonHostCandidates);
        }

        if !config.urls.is_empty()
            && !contains_candidate_type(CandidateType::ServerReflexive, &candidate_types)
            && !contains_candidate_type(CandidateType::Relay, &candidate_types)
        {
            return Err(Error::ErrUselessUrlsProvided);
        }

        let now = Instant::now();
        let mut agent = Self {
            tie_breaker: rand::random::<u64>(),
            is_controlling: config.is_controlling,
            lite: config.lite,

            start_time: now,
            now,
            started: false,
            closed: false,

            connection_state: ConnectionState::New,
            gathering_state: GatheringState::New,
            failure: None,

            ufrag_pwd: UfragPwd::default(),

            local_candidates: vec![],
            remote_candidates: vec![],
            candidate_pairs: vec![],
            nominated_pair: None,
            selected_pair: None,

            pending_binding_requests: vec![],

            gatherers: vec![],
            gather_deadline: None,

            last_checking_time: now,
            checking_started: None,

            max_binding_requests: config
                .max_binding_requests
                .unwrap_or(DEFAULT_MAX_BINDING_REQUESTS),
            host_acceptance_min_wait: config
                .host_acceptance_min_wait
                .unwrap_or(DEFAULT_HOST_ACCEPTANCE_MIN_WAIT),
            srflx_acceptance_min_wait: config
                .srflx_acceptance_min_wait
                .unwrap_or(DEFAULT_SRFLX_ACCEPTANCE_MIN_WAIT),
            prflx_acceptance_min_wait: config
                .prflx_acceptance_min_wait
                .unwrap_or(DEFAULT_PRFLX_ACCEPTANCE_MIN_WAIT),
            relay_acceptance_min_wait: config
                .relay_acceptance_min_wait
                .unwrap_or(DEFAULT_RELAY_ACCEPTANCE_MIN_WAIT),
            disconnected_timeout: config
                .disconnected_timeout
                .unwrap_or(DEFAULT_DISCONNECTED_TIMEOUT),
            failed_timeout: config.failed_timeout.unwrap_or(DEFAULT_FAILED_TIMEOUT),
            keepalive_interval: config
                .keepalive_interval
                .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL),
            check_interval: if config.check_interval == Duration::from_secs(0) {
                DEFAULT_CHECK_INTERVAL
            } else {
                config.check_interval
            },
            gather_timeout: config.gather_timeout.unwrap_or(DEFAULT_GATHER_TIMEOUT),

            candidate_types,
            urls: config.urls.clone(),
            software: config.software.clone(),

            read_outs: VecDeque::new(),
            write_outs: VecDeque::new(),
            events: VecDeque::new(),
        };

        // Restart is also used to initialize the agent for the first time
        agent.restart(
            config.local_ufrag.clone(),
            config.local_pwd.clone(),
            false,
        )?;

        Ok(agent)
    }

    /// Adds a new local candidate.
    ///
    /// Host candidates describe sockets owned by the caller; their
    /// addresses must match the `local_addr` of datagrams fed to
    /// `handle_read`.
    pub fn add_local_candidate(&mut self, c: Candidate) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        self.add_local_candidate_internal(c);
        Ok(())
    }

    pub(crate) fn add_local_candidate_internal(&mut self, c: Candidate) -> Option<usize> {
        if self.local_candidates.iter().any(|cand| cand.equal(&c)) {
            return None;
        }

        self.local_candidates.push(c);
        let local_index = self.local_candidates.len() - 1;

        if self.is_pairable_local(local_index) {
            for remote_index in 0..self.remote_candidates.len() {
                self.add_pair_if_compatible(local_index, remote_index);
            }
            self.request_connectivity_check();
        }

        Some(local_index)
    }

    /// Adds a new remote candidate. Adding the same candidate twice is a no-op.
    pub fn add_remote_candidate(&mut self, c: Candidate) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }

        if c.network_type().is_tcp() {
            debug!(
                "[{}]: ignoring remote TCP candidate {}",
                self.get_name(),
                c.address()
            );
            return Ok(());
        }

        if self.remote_candidates.iter().any(|cand| cand.equal(&c)) {
            return Ok(());
        }

        // a signalled candidate replaces the peer-reflexive one learned for its address
        if let Some(remote_index) = self.remote_candidates.iter().position(|r| {
            r.candidate_type() == CandidateType::PeerReflexive && r.addr() == c.addr()
        }) {
            debug!(
                "[{}]: replacing peer-reflexive candidate {} with {}",
                self.get_name(),
                c.addr(),
                c.candidate_type()
            );
            let last_received = self.remote_candidates[remote_index].last_received();
            let mut c = c;
            if let Some(t) = last_received {
                c.set_last_received(t);
            }
            let priority = c.priority();
            self.remote_candidates[remote_index] = c;
            for p in &mut self.candidate_pairs {
                if p.remote_index == remote_index {
                    p.remote_priority = priority;
                }
            }
            return Ok(());
        }

        self.add_remote_candidate_internal(c);
        self.request_connectivity_check();

        Ok(())
    }

    pub(crate) fn add_remote_candidate_internal(&mut self, c: Candidate) -> usize {
        self.remote_candidates.push(c);
        let remote_index = self.remote_candidates.len() - 1;

        for local_index in 0..self.local_candidates.len() {
            if self.is_pairable_local(local_index) {
                self.add_pair_if_compatible(local_index, remote_index);
            }
        }

        remote_index
    }

    /// Returns the local candidates that may be signalled to the remote peer.
    pub fn get_local_candidates(&self) -> Vec<Candidate> {
        self.local_candidates
            .iter()
            .filter(|c| contains_candidate_type(c.candidate_type(), &self.candidate_types))
            .cloned()
            .collect()
    }

    /// Returns the remote candidates known so far, peer-reflexive ones included.
    pub fn get_remote_candidates(&self) -> &[Candidate] {
        &self.remote_candidates
    }

    /// Returns the local user credentials.
    pub fn get_local_credentials(&self) -> &Credentials {
        &self.ufrag_pwd.local_credentials
    }

    /// Returns the remote user credentials, once known.
    pub fn get_remote_credentials(&self) -> Option<&Credentials> {
        self.ufrag_pwd.remote_credentials.as_ref()
    }

    /// Returns the selected pair as (local, remote), if any.
    pub fn get_selected_candidate_pair(&self) -> Option<(&Candidate, &Candidate)> {
        self.selected_pair.map(|index| {
            let p = &self.candidate_pairs[index];
            (
                &self.local_candidates[p.local_index],
                &self.remote_candidates[p.remote_index],
            )
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn gathering_state(&self) -> GatheringState {
        self.gathering_state
    }

    pub fn is_controlling(&self) -> bool {
        self.is_controlling
    }

    pub fn role(&self) -> Role {
        if self.is_controlling {
            Role::Controlling
        } else {
            Role::Controlled
        }
    }

    /// Why the agent moved to Failed, if it did.
    pub fn failure_reason(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    /// Sets the credentials of the remote agent.
    pub fn set_remote_credentials(
        &mut self,
        remote_ufrag: String,
        remote_pwd: String,
    ) -> Result<()> {
        if remote_ufrag.is_empty() {
            return Err(Error::ErrRemoteUfragEmpty);
        } else if remote_pwd.is_empty() {
            return Err(Error::ErrRemotePwdEmpty);
        }

        self.ufrag_pwd.remote_credentials = Some(Credentials {
            ufrag: remote_ufrag,
            pwd: remote_pwd,
        });
        Ok(())
    }

    /// Restarts the ICE Agent with the provided ufrag/pwd
    /// If no ufrag/pwd is provided the Agent will generate one itself.
    ///
    /// Remote candidates, pairs and the selected pair are discarded. An agent
    /// that had a selected pair reports Disconnected, then Checking.
    pub fn restart(
        &mut self,
        ufrag: String,
        pwd: String,
        keep_local_candidates: bool,
    ) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        if self.gathering_state == GatheringState::Gathering {
            return Err(Error::ErrRestartWhenGathering);
        }

        let (ufrag, pwd) = local_credentials(ufrag, pwd)?;
        let had_selected_pair = self.selected_pair.is_some();

        // Clear all agent needed to take back to fresh state
        self.ufrag_pwd.local_credentials = Credentials { ufrag, pwd };
        self.ufrag_pwd.remote_credentials = None;

        self.pending_binding_requests.clear();
        self.candidate_pairs.clear();
        self.nominated_pair = None;
        self.set_selected_pair(None);
        self.delete_all_candidates(keep_local_candidates);
        if !keep_local_candidates {
            self.gathering_state = GatheringState::New;
        }
        self.started = false;
        self.checking_started = None;
        self.failure = None;

        // Restart is used by new(). start_connectivity_checks moves new agents to checking.
        if self.connection_state != ConnectionState::New {
            // losing the selected pair disconnects before checks resume
            if had_selected_pair {
                self.update_connection_state(ConnectionState::Disconnected);
            }
            self.update_connection_state(ConnectionState::Checking);
        }

        Ok(())
    }

    /// Begins connectivity checks against the remote agent.
    pub fn start_connectivity_checks(
        &mut self,
        is_controlling: bool,
        remote_ufrag: String,
        remote_pwd: String,
    ) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        if self.started {
            return Err(Error::ErrMultipleStart);
        }

        debug!(
            "Started agent: isControlling? {}, remoteUfrag: {}, remotePwd: {}",
            is_controlling, remote_ufrag, remote_pwd
        );
        self.set_remote_credentials(remote_ufrag, remote_pwd)?;
        self.set_role(is_controlling);
        self.started = true;
        self.start();

        self.update_connection_state(ConnectionState::Checking);
        self.contact();

        Ok(())
    }

    /// Switches role and reorders the checklist accordingly.
    pub(crate) fn set_role(&mut self, is_controlling: bool) {
        if self.is_controlling != is_controlling {
            debug!(
                "[{}]: switching role to {}",
                self.get_name(),
                if is_controlling {
                    Role::Controlling
                } else {
                    Role::Controlled
                }
            );
            self.nominated_pair = None;
        }
        self.is_controlling = is_controlling;
        for p in &mut self.candidate_pairs {
            p.ice_role_controlling = is_controlling;
        }
    }

    pub(crate) fn contact(&mut self) {
        let now = self.now;
        if self.connection_state == ConnectionState::Failed {
            // The connection is currently failed so don't send any checks
            // In the future it may be restarted though
            self.last_checking_time = now;
            return;
        }

        if self.connection_state == ConnectionState::Checking {
            let checking_started = *self.checking_started.get_or_insert(now);

            // We have been in checking longer then Disconnect+Failed timeout, set the connection to Failed
            if now.saturating_duration_since(checking_started)
                > self.disconnected_timeout + self.failed_timeout
            {
                let reason = if self.remote_candidates.is_empty() {
                    Error::ErrNoRemoteCandidates
                } else if self.candidate_pairs.is_empty() {
                    Error::ErrNoCandidatePairs
                } else {
                    Error::ErrAllPairsFailed
                };
                self.fail(reason);
                self.last_checking_time = now;
                return;
            }
        } else {
            self.checking_started = None;
        }

        self.contact_candidates();
        self.last_checking_time = now;
    }

    pub(crate) fn get_timeout_interval(&self) -> Duration {
        let mut interval = DEFAULT_CHECK_INTERVAL;

        let mut update_interval = |x: Duration| {
            if x != Duration::ZERO && (interval == Duration::ZERO || interval > x) {
                interval = x;
            }
        };

        match self.connection_state {
            ConnectionState::New | ConnectionState::Checking => {
                // While connecting, check candidates more frequently
                update_interval(self.check_interval);
            }
            ConnectionState::Connected | ConnectionState::Disconnected => {
                update_interval(self.keepalive_interval);
            }
            _ => {}
        };
        // Ensure we run our task loop as quickly as the minimum of our various configured timeouts
        update_interval(self.disconnected_timeout);
        update_interval(self.failed_timeout);

        interval
    }

    pub(crate) fn fail(&mut self, reason: Error) {
        warn!("[{}]: ICE failed: {}", self.get_name(), reason);
        self.failure = Some(reason);
        self.update_connection_state(ConnectionState::Failed);
    }

    pub(crate) fn update_connection_state(&mut self, new_state: ConnectionState) {
        if self.connection_state != new_state {
            // a failed connection keeps no pair to send on
            if new_state == ConnectionState::Failed {
                self.selected_pair = None;
                self.nominated_pair = None;
                self.pending_binding_requests.clear();
            }

            info!(
                "[{}]: Setting new connection state: {}",
                self.get_name(),
                new_state
            );
            self.connection_state = new_state;
            self.events
                .push_back(Event::ConnectionStateChange(new_state));
        }
    }

    pub(crate) fn update_gathering_state(&mut self, new_state: GatheringState) {
        if self.gathering_state != new_state {
            debug!(
                "[{}]: Setting new gathering state: {}",
                self.get_name(),
                new_state
            );
            self.gathering_state = new_state;
            self.events.push_back(Event::GatheringStateChange(new_state));
        }
    }

    pub(crate) fn set_selected_pair(&mut self, selected_pair: Option<usize>) {
        if let Some(pair_index) = selected_pair {
            trace!(
                "[{}]: Set selected candidate pair: {:?}",
                self.get_name(),
                self.candidate_pairs[pair_index]
            );

            let p = &mut self.candidate_pairs[pair_index];
            p.nominated = true;
            let (local_index, remote_index) = (p.local_index, p.remote_index);
            self.selected_pair = Some(pair_index);

            self.events.push_back(Event::SelectedCandidatePairChange(
                Box::new(self.local_candidates[local_index].clone()),
                Box::new(self.remote_candidates[remote_index].clone()),
            ));
            self.update_connection_state(ConnectionState::Connected);
        } else {
            self.selected_pair = None;
        }
    }

    pub(crate) fn ping_all_candidates(&mut self) {
        trace!("[{}]: pinging all candidates", self.get_name());

        if self.candidate_pairs.is_empty() {
            warn!(
                "[{}]: pingAllCandidates called with no candidate pairs. Connection is not possible yet.",
                self.get_name(),
            );
            return;
        }

        // keep one check moving when every pending pair is frozen
        let active = self.candidate_pairs.iter().any(|p| {
            p.state == CandidatePairState::Waiting || p.state == CandidatePairState::InProgress
        });
        if !active {
            if let Some(index) = self.best_pair_in_state(CandidatePairState::Frozen) {
                self.candidate_pairs[index].state = CandidatePairState::Waiting;
            }
        }

        // one new check per tick, highest priority first
        if let Some(index) = self.best_pair_in_state(CandidatePairState::Waiting) {
            self.candidate_pairs[index].state = CandidatePairState::InProgress;
        }

        let mut pairs: Vec<(usize, usize)> = vec![];
        let mut failed_foundations: Vec<String> = vec![];
        let name = self.get_name();
        for p in &mut self.candidate_pairs {
            if p.state != CandidatePairState::InProgress {
                continue;
            }

            if p.binding_request_count >= self.max_binding_requests {
                trace!(
                    "[{}]: max requests reached for pair {}, marking it as failed",
                    name,
                    *p
                );
                p.state = CandidatePairState::Failed;
                failed_foundations.push(p.foundation.clone());
            } else {
                p.binding_request_count += 1;
                pairs.push((p.local_index, p.remote_index));
            }
        }

        for foundation in failed_foundations {
            self.unfreeze(&foundation, false);
        }

        for (local, remote) in pairs {
            self.ping_candidate(local, remote);
        }
    }

    /// Moves frozen pairs sharing `foundation` to Waiting, all of them or only the best one.
    pub(crate) fn unfreeze(&mut self, foundation: &str, all: bool) {
        if all {
            for p in &mut self.candidate_pairs {
                if p.state == CandidatePairState::Frozen && p.foundation == foundation {
                    p.state = CandidatePairState::Waiting;
                }
            }
        } else if let Some((index, _)) = self
            .candidate_pairs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.state == CandidatePairState::Frozen && p.foundation == foundation)
            .max_by_key(|(_, p)| p.priority())
        {
            self.candidate_pairs[index].state = CandidatePairState::Waiting;
        }
    }

    pub(crate) fn best_pair_in_state(&self, state: CandidatePairState) -> Option<usize> {
        self.candidate_pairs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.state == state)
            .max_by_key(|(_, p)| p.priority())
            .map(|(index, _)| index)
    }

    /// Local candidates usable in a pair: allowed by the configured types,
    /// server reflexive ones are represented by their host base.
    fn is_pairable_local(&self, local_index: usize) -> bool {
        let typ = self.local_candidates[local_index].candidate_type();
        typ != CandidateType::ServerReflexive
            && contains_candidate_type(typ, &self.candidate_types)
    }

    fn add_pair_if_compatible(&mut self, local_index: usize, remote_index: usize) {
        let (local, remote) = (
            &self.local_candidates[local_index],
            &self.remote_candidates[remote_index],
        );
        if local.network_type() == remote.network_type()
            && local.component() == remote.component()
        {
            self.add_pair(local_index, remote_index);
        }
    }

    pub(crate) fn add_pair(&mut self, local_index: usize, remote_index: usize) -> usize {
        let mut p = CandidatePair::new(
            local_index,
            remote_index,
            self.local_candidates[local_index].priority(),
            self.remote_candidates[remote_index].priority(),
            self.is_controlling,
        );
        p.foundation = self.local_candidates[local_index].foundation()
            + &self.remote_candidates[remote_index].foundation();

        // the first pair of a foundation is checked, later ones wait for it
        let foundation_active = self.candidate_pairs.iter().any(|other| {
            other.foundation == p.foundation
                && matches!(
                    other.state,
                    CandidatePairState::Frozen
                        | CandidatePairState::Waiting
                        | CandidatePairState::InProgress
                )
        });
        p.state = if foundation_active {
            CandidatePairState::Frozen
        } else {
            CandidatePairState::Waiting
        };

        self.candidate_pairs.push(p);
        self.candidate_pairs.len() - 1
    }

    pub(crate) fn find_pair(&self, local_index: usize, remote_index: usize) -> Option<usize> {
        self.candidate_pairs
            .iter()
            .position(|p| p.local_index == local_index && p.remote_index == remote_index)
    }

    /// Checks if the selected pair is (still) valid.
    pub(crate) fn validate_selected_pair(&mut self) -> bool {
        let Some(pair_index) = self.selected_pair else {
            return false;
        };
        let remote_index = self.candidate_pairs[pair_index].remote_index;
        let last_received = self.remote_candidates[remote_index]
            .last_received()
            .unwrap_or(self.start_time);
        let disconnected_time = self.now.saturating_duration_since(last_received);

        // Only allow transitions to failed if a.failedTimeout is non-zero
        let failed_timeout = if self.failed_timeout == Duration::ZERO {
            Duration::ZERO
        } else {
            self.failed_timeout + self.disconnected_timeout
        };

        if failed_timeout != Duration::ZERO && disconnected_time > failed_timeout {
            self.fail(Error::ErrAllPairsFailed);
            return false;
        } else if self.disconnected_timeout != Duration::ZERO
            && disconnected_time > self.disconnected_timeout
        {
            self.update_connection_state(ConnectionState::Disconnected);
        } else {
            self.update_connection_state(ConnectionState::Connected);
        }

        true
    }

    /// Sends a binding request on the selected pair when it has been quiet
    /// for a keepalive interval in either direction.
    pub(crate) fn check_keepalive(&mut self) {
        let Some(pair_index) = self.selected_pair else {
            return;
        };
        if self.keepalive_interval == Duration::ZERO {
            return;
        }

        let p = &self.candidate_pairs[pair_index];
        let (local_index, remote_index) = (p.local_index, p.remote_index);
        let now = self.now;
        let quiet = |t: Option<Instant>| {
            t.is_none_or(|t| now.saturating_duration_since(t) >= self.keepalive_interval)
        };

        if quiet(self.local_candidates[local_index].last_sent())
            || quiet(self.remote_candidates[remote_index].last_received())
        {
            // we use binding request instead of indication to support refresh consent schemas
            // see https://tools.ietf.org/html/rfc7675
            self.ping_candidate(local_index, remote_index);
        }
    }

    fn request_connectivity_check(&mut self) {
        if self.started && self.selected_pair.is_none() {
            self.contact();
        }
    }

    /// Remove all candidates.
    /// This releases TURN allocations and removes both the local and remote candidate lists.
    ///
    /// This is used for restarts and on close.
    pub(crate) fn delete_all_candidates(&mut self, keep_local_candidates: bool) {
        if !keep_local_candidates {
            self.close_gatherers();
            self.local_candidates.clear();
        }
        self.remote_candidates.clear();
    }

    pub(crate) fn find_local_candidate(
        &self,
        local_addr: SocketAddr,
        protocol: TransportProtocol,
    ) -> Option<usize> {
        self.local_candidates.iter().position(|c| {
            c.candidate_type() == CandidateType::Host
                && c.addr() == local_addr
                && c.network_type().is_tcp() == (protocol == TransportProtocol::TCP)
        })
    }

    pub(crate) fn find_remote_candidate(&self, addr: SocketAddr) -> Option<usize> {
        self.remote_candidates.iter().position(|c| c.addr() == addr)
    }

    pub(crate) fn send_binding_request(
        &mut self,
        m: &Message,
        local_index: usize,
        remote_index: usize,
    ) {
        trace!(
            "[{}]: ping STUN from {} to {}",
            self.get_name(),
            self.local_candidates[local_index],
            self.remote_candidates[remote_index],
        );

        self.invalidate_pending_binding_requests(self.now);
        let destination = self.remote_candidates[remote_index].addr();
        self.pending_binding_requests.push(BindingRequest {
            timestamp: self.now,
            transaction_id: m.transaction_id,
            destination,
            is_use_candidate: m.contains(ATTR_USE_CANDIDATE),
            is_controlling: self.is_controlling,
        });

        self.send_stun(m, local_index, destination);
    }

    pub(crate) fn send_binding_success(
        &mut self,
        m: &Message,
        local_index: usize,
        remote_addr: SocketAddr,
    ) {
        let (ip, port) = (remote_addr.ip(), remote_addr.port());
        let local_pwd = self.ufrag_pwd.local_credentials.pwd.clone();

        let mut out = Message::new();
        let result = out.build(&[
            Box::new(m.clone()),
            Box::new(BINDING_SUCCESS),
            Box::new(XorMappedAddress { ip, port }),
            Box::new(MessageIntegrity::new_short_term_integrity(local_pwd)),
            Box::new(FINGERPRINT),
        ]);

        if let Err(err) = result {
            warn!(
                "[{}]: Failed to handle inbound ICE from: {} to: {} error: {}",
                self.get_name(),
                remote_addr,
                self.local_candidates[local_index],
                err
            );
        } else {
            self.send_stun(&out, local_index, remote_addr);
        }
    }

    /// Answers a request carrying our own role with 487 (Role Conflict).
    pub(crate) fn send_role_conflict(
        &mut self,
        m: &Message,
        local_index: usize,
        remote_addr: SocketAddr,
    ) {
        let local_pwd = self.ufrag_pwd.local_credentials.pwd.clone();

        let mut out = Message::new();
        let result = out.build(&[
            Box::new(m.clone()),
            Box::new(BINDING_ERROR),
            Box::new(CODE_ROLE_CONFLICT),
            Box::new(MessageIntegrity::new_short_term_integrity(local_pwd)),
            Box::new(FINGERPRINT),
        ]);

        if let Err(err) = result {
            warn!(
                "[{}]: Failed to build role conflict response to {}: {}",
                self.get_name(),
                remote_addr,
                err
            );
        } else {
            self.send_stun(&out, local_index, remote_addr);
        }
    }

    /// Removes pending binding requests that are over `maxBindingRequestTimeout` old Let HTO be the
    /// transaction timeout, which SHOULD be 2*RTT if RTT is known or 500 ms otherwise.
    ///
    /// reference: (IETF ref-8445)[https://tools.ietf.org/html/rfc8445#appendix-B.1].
    pub(crate) fn invalidate_pending_binding_requests(&mut self, filter_time: Instant) {
        let initial_size = self.pending_binding_requests.len();

        self.pending_binding_requests.retain(|binding_request| {
            filter_time.saturating_duration_since(binding_request.timestamp)
                < MAX_BINDING_REQUEST_TIMEOUT
        });

        let bind_requests_removed = initial_size - self.pending_binding_requests.len();
        if bind_requests_removed > 0 {
            trace!(
                "[{}]: Discarded {} binding requests because they expired",
                self.get_name(),
                bind_requests_removed
            );
        }
    }

    /// Assert that the passed `TransactionID` is in our `pendingBindingRequests` and returns the
    /// destination, If the bindingRequest was valid remove it from our pending cache.
    pub(crate) fn handle_inbound_binding_success(
        &mut self,
        id: TransactionId,
    ) -> Option<BindingRequest> {
        self.invalidate_pending_binding_requests(self.now);

        let index = self
            .pending_binding_requests
            .iter()
            .position(|r| r.transaction_id == id)?;
        Some(self.pending_binding_requests.remove(index))
    }

    /// Processes STUN traffic from a remote candidate.
    pub(crate) fn handle_inbound(
        &mut self,
        m: &mut Message,
        local_index: usize,
        remote_addr: SocketAddr,
    ) {
        if m.typ.method != METHOD_BINDING {
            trace!(
                "[{}]: unhandled STUN from {} to {} class({}) method({})",
                self.get_name(),
                remote_addr,
                local_index,
                m.typ.class,
                m.typ.method
            );
            return;
        }

        let mut remote_candidate_index = self.find_remote_candidate(remote_addr);
        if m.typ.class == CLASS_SUCCESS_RESPONSE || m.typ.class == CLASS_ERROR_RESPONSE {
            let Some(remote_pwd) = self
                .ufrag_pwd
                .remote_credentials
                .as_ref()
                .map(|c| c.pwd.clone())
            else {
                debug!(
                    "[{}]: discard response from ({}), no remote credentials",
                    self.get_name(),
                    remote_addr
                );
                return;
            };
            if let Err(err) = assert_inbound_message_integrity(m, remote_pwd.as_bytes()) {
                warn!(
                    "[{}]: discard message from ({}), {}",
                    self.get_name(),
                    remote_addr,
                    err
                );
                return;
            }

            if m.typ.class == CLASS_ERROR_RESPONSE {
                self.handle_error_response(m, local_index, remote_addr);
            } else if let Some(remote_index) = remote_candidate_index {
                self.handle_success_response(m, local_index, remote_index, remote_addr);
            } else {
                warn!(
                    "[{}]: discard success message from ({}), no such remote",
                    self.get_name(),
                    remote_addr
                );
                return;
            }
        } else if m.typ.class == CLASS_REQUEST {
            let local_credentials = self.ufrag_pwd.local_credentials.clone();
            let checked = match &self.ufrag_pwd.remote_credentials {
                Some(remote) => {
                    let username = local_credentials.ufrag.clone() + ":" + remote.ufrag.as_str();
                    assert_inbound_username(m, &username)
                }
                None => {
                    // the offer may be answered before its checks arrive
                    let mut username = Username::new(ATTR_USERNAME, String::new());
                    username.get_from(m).and_then(|_| {
                        if username
                            .to_string()
                            .starts_with(&(local_credentials.ufrag.clone() + ":"))
                        {
                            Ok(())
                        } else {
                            Err(Error::ErrMismatchUsername)
                        }
                    })
                }
            };
            if let Err(err) = checked.and_then(|_| {
                assert_inbound_message_integrity(m, local_credentials.pwd.as_bytes())
            }) {
                warn!(
                    "[{}]: discard message from ({}), {}",
                    self.get_name(),
                    remote_addr,
                    err
                );
                return;
            }

            if self.check_role_conflict(m, local_index, remote_addr) {
                return;
            }

            if remote_candidate_index.is_none() {
                remote_candidate_index = self.learn_peer_reflexive(m, local_index, remote_addr);
                if remote_candidate_index.is_none() {
                    return;
                }
            }

            trace!(
                "[{}]: inbound STUN (Request) from {} to {}",
                self.get_name(),
                remote_addr,
                local_index
            );

            if let Some(remote_index) = remote_candidate_index {
                self.handle_binding_request(m, local_index, remote_index);
            }
        }

        if let Some(remote_index) = remote_candidate_index {
            self.remote_candidates[remote_index].seen(false, self.now);
        }
    }

    /// Resolves a role conflict per RFC 8445 7.3.1.1. Returns true if the
    /// request was rejected with 487.
    fn check_role_conflict(
        &mut self,
        m: &Message,
        local_index: usize,
        remote_addr: SocketAddr,
    ) -> bool {
        if self.is_controlling {
            let mut controlling = AttrControlling::default();
            if controlling.get_from(m).is_ok() {
                if self.tie_breaker >= controlling.0 {
                    debug!(
                        "[{}]: role conflict with {}, keeping role",
                        self.get_name(),
                        remote_addr
                    );
                    self.send_role_conflict(m, local_index, remote_addr);
                    return true;
                }
                self.set_role(false);
            }
        } else {
            let mut controlled = AttrControlled::default();
            if controlled.get_from(m).is_ok() {
                if self.tie_breaker >= controlled.0 {
                    self.set_role(true);
                } else {
                    debug!(
                        "[{}]: role conflict with {}, keeping role",
                        self.get_name(),
                        remote_addr
                    );
                    self.send_role_conflict(m, local_index, remote_addr);
                    return true;
                }
            }
        }
        false
    }

    /// A 487 answer to one of our checks: switch role and check the pair again.
    fn handle_error_response(&mut self, m: &Message, local_index: usize, remote_addr: SocketAddr) {
        let Some(request) = self.handle_inbound_binding_success(m.transaction_id) else {
            return;
        };
        let code = error_code_of(m);
        if code != Some(CODE_ROLE_CONFLICT) {
            debug!(
                "[{}]: binding error {:?} from {}",
                self.get_name(),
                code,
                remote_addr
            );
            return;
        }

        if request.is_controlling == self.is_controlling {
            self.set_role(!request.is_controlling);
        }
        if let Some(index) = self
            .find_remote_candidate(remote_addr)
            .and_then(|remote_index| self.find_pair(local_index, remote_index))
        {
            let p = &mut self.candidate_pairs[index];
            p.state = CandidatePairState::Waiting;
            p.binding_request_count = 0;
        }
    }

    fn learn_peer_reflexive(
        &mut self,
        m: &Message,
        local_index: usize,
        remote_addr: SocketAddr,
    ) -> Option<usize> {
        let mut priority = PriorityAttr::default();
        if let Err(err) = priority.get_from(m) {
            debug!(
                "[{}]: request from unknown {} without PRIORITY: {}",
                self.get_name(),
                remote_addr,
                err
            );
        }

        let local = &self.local_candidates[local_index];
        let prflx_candidate_config = CandidatePeerReflexiveConfig {
            base_config: CandidateConfig {
                network: local.network.clone(),
                address: remote_addr.ip().to_string(),
                port: remote_addr.port(),
                component: local.component(),
                priority: priority.0,
                ..CandidateConfig::default()
            },
            rel_addr: String::new(),
            rel_port: 0,
        };

        match prflx_candidate_config.new_candidate_peer_reflexive() {
            Ok(prflx_candidate) => {
                debug!(
                    "[{}]: adding a new peer-reflexive candidate: {} ",
                    self.get_name(),
                    remote_addr
                );
                Some(self.add_remote_candidate_internal(prflx_candidate))
            }
            Err(err) => {
                warn!(
                    "[{}]: Failed to create new remote prflx candidate ({})",
                    self.get_name(),
                    err
                );
                None
            }
        }
    }

    /// Processes a datagram received on a local candidate.
    pub(crate) fn handle_inbound_datagram(
        &mut self,
        local_index: usize,
        remote_addr: SocketAddr,
        data: BytesMut,
    ) {
        if is_message(&data) {
            let mut m = Message::new();
            if let Err(err) = m.write(&data) {
                warn!(
                    "[{}]: Failed to handle decode ICE from {} to {}: {}",
                    self.get_name(),
                    remote_addr,
                    self.local_candidates[local_index].addr(),
                    err
                );
            } else {
                self.handle_inbound(&mut m, local_index, remote_addr);
            }
        } else if self.validate_non_stun_traffic(remote_addr) {
            let local = &self.local_candidates[local_index];
            self.read_outs.push_back(TransportMessage {
                now: self.now,
                transport: TransportContext {
                    local_addr: local.addr(),
                    peer_addr: remote_addr,
                    transport_protocol: transport_protocol_of(local),
                    ecn: None,
                },
                message: data,
            });
        } else {
            warn!(
                "[{}]: Discarded message from {}, not a valid remote candidate",
                self.get_name(),
                remote_addr
            );
        }
    }

    // Processes non STUN traffic from a remote candidate, and returns true if it is an actual
    // remote candidate.
    pub(crate) fn validate_non_stun_traffic(&mut self, remote_addr: SocketAddr) -> bool {
        let now = self.now;
        self.find_remote_candidate(remote_addr)
            .is_some_and(|remote_index| {
                self.remote_candidates[remote_index].seen(false, now);
                true
            })
    }

    pub(crate) fn send_stun(&mut self, msg: &Message, local_index: usize, remote_addr: SocketAddr) {
        self.send_to(local_index, remote_addr, &msg.raw);
    }

    /// Sends `payload` from a local candidate, through its TURN allocation for relays.
    pub(crate) fn send_to(&mut self, local_index: usize, remote_addr: SocketAddr, payload: &[u8]) {
        let local = &self.local_candidates[local_index];
        if local.candidate_type() == CandidateType::Relay {
            self.send_via_relay(local_index, remote_addr, payload);
        } else {
            let transmit = TransportMessage {
                now: self.now,
                transport: TransportContext {
                    local_addr: local.addr(),
                    peer_addr: remote_addr,
                    transport_protocol: transport_protocol_of(local),
                    ecn: None,
                },
                message: BytesMut::from(payload),
            };
            self.write_outs.push_back(transmit);
        }

        self.local_candidates[local_index].seen(true, self.now);
    }

    pub(crate) fn get_name(&self) -> &'static str {
        if self.is_controlling {
            "controlling"
        } else {
            "controlled"
        }
    }

    pub(crate) fn get_selected_pair(&self) -> Option<usize> {
        self.selected_pair
    }

    pub(crate) fn get_best_available_candidate_pair(&self) -> Option<usize> {
        self.candidate_pairs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.state != CandidatePairState::Failed)
            .max_by_key(|(_, p)| p.priority())
            .map(|(index, _)| index)
    }

    pub(crate) fn get_best_valid_candidate_pair(&self) -> Option<usize> {
        self.best_pair_in_state(CandidatePairState::Succeeded)
    }
}

fn transport_protocol_of(c: &Candidate) -> TransportProtocol {
    if c.network_type().is_tcp() {
        TransportProtocol::TCP
    } else {
        TransportProtocol::UDP
    }
}
