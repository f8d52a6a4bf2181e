use sansio::Protocol;
use turn::client::{Client, ClientConfig, Event as TurnEvent};

use super::*;
use crate::candidate::{candidate_relay::*, candidate_server_reflexive::*};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum GatherKind {
    ServerReflexive,
    Relay,
}

/// One STUN or TURN server queried from one host candidate.
pub(crate) struct ServerGatherer {
    pub(crate) url: Url,
    pub(crate) kind: GatherKind,
    pub(crate) base_index: usize,
    pub(crate) client: Client,
    pub(crate) relay_index: Option<usize>,
    pub(crate) done: bool,
}

impl Agent {
    /// Starts gathering server reflexive and relay candidates from the
    /// configured urls, using every host UDP candidate as a base.
    ///
    /// Gathered candidates are reported as `Event::LocalCandidate`, and
    /// `Event::GatheringStateChange(Complete)` follows once every server
    /// answered, failed or the gather timeout expired. Unreachable servers
    /// only produce a warning.
    pub fn gather_candidates(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        if self.gathering_state == GatheringState::Gathering {
            return Err(Error::ErrMultipleGatherAttempted);
        }

        self.update_gathering_state(GatheringState::Gathering);
        self.gather_deadline = Some(self.now + self.gather_timeout);

        let bases: Vec<usize> = self
            .local_candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.candidate_type() == CandidateType::Host && c.network_type().is_udp())
            .map(|(index, _)| index)
            .collect();

        for url in self.urls.clone() {
            let kind = match url.scheme {
                SchemeType::Stun
                    if contains_candidate_type(
                        CandidateType::ServerReflexive,
                        &self.candidate_types,
                    ) =>
                {
                    GatherKind::ServerReflexive
                }
                SchemeType::Turn
                    if contains_candidate_type(CandidateType::Relay, &self.candidate_types) =>
                {
                    GatherKind::Relay
                }
                SchemeType::Stuns | SchemeType::Turns => {
                    warn!("[{}]: skipping {}, secure transports are not supported", self.get_name(), url);
                    continue;
                }
                _ => continue,
            };

            for &base_index in &bases {
                self.start_gatherer(&url, kind, base_index);
            }
        }

        self.check_gathering_complete();
        Ok(())
    }

    fn start_gatherer(&mut self, url: &Url, kind: GatherKind, base_index: usize) {
        let base_addr = self.local_candidates[base_index].addr();
        let server_addr =
            match shared::util::lookup_host(base_addr.is_ipv4(), (url.host.as_str(), url.port)) {
                Ok(addr) => addr,
                Err(err) => {
                    warn!(
                        "[{}]: failed to resolve {} for {}: {}",
                        self.get_name(),
                        url,
                        base_addr,
                        err
                    );
                    return;
                }
            };

        let mut client = Client::new(
            ClientConfig {
                turn_serv_addr: server_addr,
                local_addr: base_addr,
                transport_protocol: if url.proto == ProtoType::Tcp {
                    TransportProtocol::TCP
                } else {
                    TransportProtocol::UDP
                },
                username: url.username.clone(),
                password: url.password.clone(),
                software: self.software.clone(),
                rto: Duration::ZERO,
                lifetime: Duration::ZERO,
            },
            self.now,
        );

        let result = match kind {
            GatherKind::ServerReflexive => client.send_binding_request(),
            GatherKind::Relay => client.allocate(),
        };
        if let Err(err) = result {
            warn!("[{}]: {} query failed: {}", self.get_name(), url, err);
            return;
        }

        debug!(
            "[{}]: gathering {:?} from {} via {}",
            self.get_name(),
            kind,
            url,
            base_addr
        );
        self.gatherers.push(ServerGatherer {
            url: url.clone(),
            kind,
            base_index,
            client,
            relay_index: None,
            done: false,
        });
        self.flush_gatherer_writes(self.gatherers.len() - 1);
    }

    /// Feeds a datagram from a STUN or TURN server to the gatherers bound
    /// to it. Returns false if no gatherer owns the 4-tuple.
    pub(crate) fn handle_server_datagram(&mut self, msg: &TaggedBytesMut) -> bool {
        let owners: Vec<usize> = self
            .gatherers
            .iter()
            .enumerate()
            .filter(|(_, g)| {
                g.client.turn_server_addr() == msg.transport.peer_addr
                    && g.client.local_addr() == msg.transport.local_addr
            })
            .map(|(index, _)| index)
            .collect();
        if owners.is_empty() {
            return false;
        }

        for index in owners {
            if let Err(err) = self.gatherers[index].client.handle_read(msg.clone()) {
                trace!(
                    "[{}]: {} ignored datagram: {}",
                    self.get_name(),
                    self.gatherers[index].url,
                    err
                );
            }
            self.drain_gatherer(index);
        }
        true
    }

    pub(crate) fn handle_gatherers_timeout(&mut self, now: Instant) {
        for index in 0..self.gatherers.len() {
            if let Err(err) = self.gatherers[index].client.handle_timeout(now) {
                warn!(
                    "[{}]: {} timer failed: {}",
                    self.get_name(),
                    self.gatherers[index].url,
                    err
                );
            }
            self.drain_gatherer(index);
        }

        if self.gathering_state == GatheringState::Gathering
            && self.gather_deadline.is_some_and(|deadline| now >= deadline)
        {
            for g in &mut self.gatherers {
                if !g.done {
                    warn!("gathering from {} timed out", g.url);
                    g.done = true;
                }
            }
            self.check_gathering_complete();
        }
    }

    pub(crate) fn poll_gatherers_timeout(&mut self) -> Option<Instant> {
        let mut deadline = if self.gathering_state == GatheringState::Gathering {
            self.gather_deadline
        } else {
            None
        };
        for g in &mut self.gatherers {
            if let Some(t) = g.client.poll_timeout() {
                deadline = Some(deadline.map_or(t, |d| d.min(t)));
            }
        }
        deadline
    }

    pub(crate) fn flush_gatherer_writes(&mut self, index: usize) {
        while let Some(transmit) = self.gatherers[index].client.poll_write() {
            self.write_outs.push_back(transmit);
        }
    }

    fn drain_gatherer(&mut self, index: usize) {
        self.flush_gatherer_writes(index);

        while let Some(event) = self.gatherers[index].client.poll_event() {
            match event {
                TurnEvent::BindingResponse(_, mapped) => {
                    if self.gatherers[index].kind == GatherKind::ServerReflexive
                        && !self.gatherers[index].done
                    {
                        self.gatherers[index].done = true;
                        self.add_server_reflexive(index, mapped);
                    }
                }
                TurnEvent::AllocateResponse(_, relayed) => {
                    self.gatherers[index].done = true;
                    self.add_relay(index, relayed);
                }
                TurnEvent::BindingError(_, err) | TurnEvent::AllocateError(_, err) => {
                    warn!(
                        "[{}]: {} answered with an error: {}",
                        self.get_name(),
                        self.gatherers[index].url,
                        err
                    );
                    self.gatherers[index].done = true;
                }
                TurnEvent::TransactionTimeout(_) => {
                    let g = &mut self.gatherers[index];
                    if !g.done {
                        warn!("{} is unreachable", g.url);
                        g.done = true;
                    }
                }
                TurnEvent::RefreshError(_, err)
                | TurnEvent::CreatePermissionError(_, err)
                | TurnEvent::ChannelBindError(_, err) => {
                    warn!(
                        "[{}]: {}: {}",
                        self.get_name(),
                        self.gatherers[index].url,
                        err
                    );
                }
                TurnEvent::CreatePermissionResponse(_, peers) => {
                    trace!("[{}]: permission installed for {:?}", self.get_name(), peers);
                }
                TurnEvent::ChannelBindResponse(_, peer, number) => {
                    trace!(
                        "[{}]: channel {:?} bound to {}",
                        self.get_name(),
                        number,
                        peer
                    );
                }
                TurnEvent::DataIndicationOrChannelData(_, peer, data) => {
                    if let Some(relay_index) = self.gatherers[index].relay_index {
                        self.handle_inbound_datagram(relay_index, peer, data);
                    }
                }
            }
        }

        self.check_gathering_complete();
    }

    fn add_server_reflexive(&mut self, index: usize, mapped: SocketAddr) {
        let base = &self.local_candidates[self.gatherers[index].base_index];
        if base.addr() == mapped {
            debug!(
                "[{}]: {} reports the host address, no NAT in between",
                self.get_name(),
                self.gatherers[index].url
            );
            return;
        }

        let config = CandidateServerReflexiveConfig {
            base_config: CandidateConfig {
                network: base.network.clone(),
                address: mapped.ip().to_string(),
                port: mapped.port(),
                component: base.component(),
                ..CandidateConfig::default()
            },
            rel_addr: base.address().to_owned(),
            rel_port: base.port(),
            url: Some(self.gatherers[index].url.clone()),
        };

        match config.new_candidate_server_reflexive() {
            Ok(candidate) => {
                self.add_gathered_candidate(candidate);
            }
            Err(err) => warn!(
                "[{}]: Failed to create server reflexive candidate {}: {}",
                self.get_name(),
                mapped,
                err
            ),
        }
    }

    fn add_relay(&mut self, index: usize, relayed: SocketAddr) {
        let base = &self.local_candidates[self.gatherers[index].base_index];
        let related = self.gatherers[index]
            .client
            .mapped_addr()
            .unwrap_or_else(|| base.addr());

        let config = CandidateRelayConfig {
            base_config: CandidateConfig {
                network: base.network.clone(),
                address: relayed.ip().to_string(),
                port: relayed.port(),
                component: base.component(),
                ..CandidateConfig::default()
            },
            rel_addr: related.ip().to_string(),
            rel_port: related.port(),
            url: Some(self.gatherers[index].url.clone()),
        };

        match config.new_candidate_relay() {
            Ok(candidate) => {
                if let Some(relay_index) = self.add_gathered_candidate(candidate) {
                    self.gatherers[index].relay_index = Some(relay_index);
                }
            }
            Err(err) => warn!(
                "[{}]: Failed to create relay candidate {}: {}",
                self.get_name(),
                relayed,
                err
            ),
        }
    }

    fn add_gathered_candidate(&mut self, candidate: Candidate) -> Option<usize> {
        let announced = candidate.clone();
        let local_index = self.add_local_candidate_internal(candidate)?;
        self.events
            .push_back(Event::LocalCandidate(Box::new(announced)));
        Some(local_index)
    }

    fn check_gathering_complete(&mut self) {
        if self.gathering_state == GatheringState::Gathering
            && self.gatherers.iter().all(|g| g.done)
        {
            self.gather_deadline = None;
            self.update_gathering_state(GatheringState::Complete);
        }
    }

    /// Relays `payload` through the TURN allocation backing a local relay candidate.
    pub(crate) fn send_via_relay(
        &mut self,
        local_index: usize,
        remote_addr: SocketAddr,
        payload: &[u8],
    ) {
        let Some(index) = self
            .gatherers
            .iter()
            .position(|g| g.relay_index == Some(local_index))
        else {
            warn!(
                "[{}]: no TURN allocation behind relay candidate {}",
                self.get_name(),
                self.local_candidates[local_index]
            );
            return;
        };

        if let Err(err) = self.gatherers[index].client.send_to(payload, remote_addr) {
            warn!(
                "[{}]: failed to relay to {}: {}",
                self.get_name(),
                remote_addr,
                err
            );
        }
        self.flush_gatherer_writes(index);
    }

    /// Releases every TURN allocation.
    pub(crate) fn close_gatherers(&mut self) {
        for index in 0..self.gatherers.len() {
            if self.gatherers[index].kind == GatherKind::Relay {
                if let Err(err) = self.gatherers[index].client.close() {
                    warn!(
                        "[{}]: failed to release {}: {}",
                        self.get_name(),
                        self.gatherers[index].url,
                        err
                    );
                }
                self.flush_gatherer_writes(index);
            }
        }
        self.gatherers.clear();
        self.gather_deadline = None;
    }
}
