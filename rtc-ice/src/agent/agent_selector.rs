use super::*;
use crate::attributes::use_candidate::*;

trait ControllingSelector {
    fn start(&mut self);
    fn contact_candidates(&mut self);
    fn ping_candidate(&mut self, local: usize, remote: usize);
    fn handle_success_response(
        &mut self,
        m: &Message,
        local: usize,
        remote: usize,
        remote_addr: SocketAddr,
    );
    fn handle_binding_request(&mut self, m: &Message, local: usize, remote: usize);
}

trait ControlledSelector {
    fn start(&mut self);
    fn contact_candidates(&mut self);
    fn ping_candidate(&mut self, local: usize, remote: usize);
    fn handle_success_response(
        &mut self,
        m: &Message,
        local: usize,
        remote: usize,
        remote_addr: SocketAddr,
    );
    fn handle_binding_request(&mut self, m: &Message, local: usize, remote: usize);
}

impl Agent {
    fn is_nominatable(&self, index: usize, is_local: bool) -> bool {
        let c = if is_local {
            &self.local_candidates[index]
        } else {
            &self.remote_candidates[index]
        };
        let min_wait = match c.candidate_type() {
            CandidateType::Host => self.host_acceptance_min_wait,
            CandidateType::ServerReflexive => self.srflx_acceptance_min_wait,
            CandidateType::PeerReflexive => self.prflx_acceptance_min_wait,
            CandidateType::Relay => self.relay_acceptance_min_wait,
            CandidateType::Unspecified => {
                log::error!(
                    "is_nominatable invalid candidate type {}",
                    c.candidate_type()
                );
                return false;
            }
        };

        self.now.saturating_duration_since(self.start_time) >= min_wait
    }

    /// Builds a Binding request for a check from `local`, signed with the remote password.
    fn binding_request(&self, local_priority: u32, use_candidate: bool) -> Result<Message> {
        let remote = self
            .ufrag_pwd
            .remote_credentials
            .as_ref()
            .ok_or(Error::ErrRemoteUfragEmpty)?;
        let username = remote.ufrag.clone() + ":" + self.ufrag_pwd.local_credentials.ufrag.as_str();

        let mut setters: Vec<Box<dyn Setter>> = vec![
            Box::new(BINDING_REQUEST),
            Box::new(TransactionId::new()),
            Box::new(Username::new(ATTR_USERNAME, username)),
        ];
        // The controlling agent MUST include the USE-CANDIDATE attribute in
        // order to nominate a candidate pair (Section 8.1.1).  The controlled
        // agent MUST NOT include the USE-CANDIDATE attribute in a Binding
        // request.
        if use_candidate && self.is_controlling {
            setters.push(Box::new(UseCandidateAttr::new()));
        }
        if self.is_controlling {
            setters.push(Box::new(AttrControlling(self.tie_breaker)));
        } else {
            setters.push(Box::new(AttrControlled(self.tie_breaker)));
        }
        setters.push(Box::new(PriorityAttr(local_priority)));
        setters.push(Box::new(MessageIntegrity::new_short_term_integrity(
            remote.pwd.clone(),
        )));
        setters.push(Box::new(FINGERPRINT));

        let mut msg = Message::new();
        msg.build(&setters)?;
        Ok(msg)
    }

    fn nominate_pair(&mut self) {
        let Some(index) = self.nominated_pair else {
            return;
        };
        let (local, remote, local_priority) = {
            let pair = &self.candidate_pairs[index];
            (pair.local_index, pair.remote_index, pair.local_priority)
        };

        match self.binding_request(local_priority, true) {
            Ok(msg) => {
                log::trace!(
                    "ping STUN (nominate candidate pair from {} to {}",
                    self.local_candidates[local],
                    self.remote_candidates[remote],
                );
                self.send_binding_request(&msg, local, remote);
            }
            Err(err) => log::error!("{}", err),
        }
    }

    pub(crate) fn start(&mut self) {
        if self.is_controlling {
            ControllingSelector::start(self);
        } else {
            ControlledSelector::start(self);
        }
    }

    pub(crate) fn contact_candidates(&mut self) {
        if self.is_controlling {
            ControllingSelector::contact_candidates(self);
        } else {
            ControlledSelector::contact_candidates(self);
        }
    }

    pub(crate) fn ping_candidate(&mut self, local: usize, remote: usize) {
        if self.is_controlling {
            ControllingSelector::ping_candidate(self, local, remote);
        } else {
            ControlledSelector::ping_candidate(self, local, remote);
        }
    }

    pub(crate) fn handle_success_response(
        &mut self,
        m: &Message,
        local: usize,
        remote: usize,
        remote_addr: SocketAddr,
    ) {
        if self.is_controlling {
            ControllingSelector::handle_success_response(self, m, local, remote, remote_addr);
        } else {
            ControlledSelector::handle_success_response(self, m, local, remote, remote_addr);
        }
    }

    pub(crate) fn handle_binding_request(&mut self, m: &Message, local: usize, remote: usize) {
        if self.is_controlling {
            ControllingSelector::handle_binding_request(self, m, local, remote);
        } else {
            ControlledSelector::handle_binding_request(self, m, local, remote);
        }
    }

    /// Validates a success response against its pending request and marks the pair Succeeded.
    fn accept_success_response(
        &mut self,
        m: &Message,
        local: usize,
        remote: usize,
        remote_addr: SocketAddr,
    ) -> Option<(usize, BindingRequest)> {
        let Some(pending_request) = self.handle_inbound_binding_success(m.transaction_id) else {
            log::warn!(
                "discard message from ({}), unknown TransactionID 0x{:?}",
                remote_addr,
                m.transaction_id
            );
            return None;
        };

        // Assert that NAT is not symmetric
        // https://tools.ietf.org/html/rfc8445#section-7.2.5.2.1
        if pending_request.destination != remote_addr {
            log::debug!(
                "discard message: transaction source and destination does not match expected({}), actual({})",
                pending_request.destination,
                remote_addr
            );
            return None;
        }

        log::trace!(
            "inbound STUN (SuccessResponse) from {} to {}",
            remote_addr,
            self.local_candidates[local]
        );

        let Some(index) = self.find_pair(local, remote) else {
            // This shouldn't happen
            log::error!("Success response from invalid candidate pair");
            return None;
        };

        let p = &mut self.candidate_pairs[index];
        p.state = CandidatePairState::Succeeded;
        p.binding_request_count = 0;
        let foundation = p.foundation.clone();
        log::trace!("Found valid candidate pair: {}", *p);
        self.unfreeze(&foundation, true);

        Some((index, pending_request))
    }

    /// Finds the pair for an inbound request, creating it when the remote was just learned.
    fn pair_for_request(&mut self, local: usize, remote: usize) -> usize {
        match self.find_pair(local, remote) {
            Some(index) => index,
            None => self.add_pair(local, remote),
        }
    }

    /// Sends a triggered check on a pair that has not produced a result yet.
    fn triggered_check(&mut self, index: usize) {
        let p = &mut self.candidate_pairs[index];
        if matches!(
            p.state,
            CandidatePairState::Frozen | CandidatePairState::Waiting | CandidatePairState::Failed
        ) {
            p.state = CandidatePairState::InProgress;
            p.binding_request_count = 0;
        }
        let (local, remote) = (p.local_index, p.remote_index);
        self.ping_candidate(local, remote);
    }
}

impl ControllingSelector for Agent {
    fn start(&mut self) {
        self.nominated_pair = None;
        self.start_time = self.now;
    }

    fn contact_candidates(&mut self) {
        // A lite selector should not contact candidates
        if self.lite {
            // This only happens if both peers are lite. See RFC 8445 S6.1.1 and S6.2
            log::trace!("now falling back to full agent");
        }

        if self.get_selected_pair().is_some() {
            if self.validate_selected_pair() {
                log::trace!("[{}]: checking keepalive", self.get_name());
                self.check_keepalive();
            }
        } else if self.nominated_pair.is_some() {
            self.nominate_pair();
        } else {
            let nominatable = self.get_best_valid_candidate_pair().filter(|&index| {
                let p = &self.candidate_pairs[index];
                self.is_nominatable(p.local_index, true) && self.is_nominatable(p.remote_index, false)
            });

            if let Some(index) = nominatable {
                let p = &mut self.candidate_pairs[index];
                log::trace!(
                    "Nominatable pair found, nominating ({}, {})",
                    self.local_candidates[p.local_index],
                    self.remote_candidates[p.remote_index],
                );
                p.nominated = true;
                self.nominated_pair = Some(index);
                self.nominate_pair();
            } else {
                self.ping_all_candidates();
            }
        }
    }

    fn ping_candidate(&mut self, local: usize, remote: usize) {
        if self.ufrag_pwd.remote_credentials.is_none() {
            log::trace!("no remote credentials yet, check deferred");
            return;
        }
        match self.binding_request(self.local_candidates[local].priority(), false) {
            Ok(msg) => self.send_binding_request(&msg, local, remote),
            Err(err) => log::error!("{}", err),
        }
    }

    fn handle_success_response(
        &mut self,
        m: &Message,
        local: usize,
        remote: usize,
        remote_addr: SocketAddr,
    ) {
        let selected_pair_is_none = self.get_selected_pair().is_none();
        if let Some((index, pending_request)) =
            self.accept_success_response(m, local, remote, remote_addr)
        {
            log::trace!(
                "isUseCandidate: {}, selected pair is none: {}",
                pending_request.is_use_candidate,
                selected_pair_is_none
            );
            if pending_request.is_use_candidate && selected_pair_is_none {
                self.set_selected_pair(Some(index));
            }
        }
    }

    fn handle_binding_request(&mut self, m: &Message, local: usize, remote: usize) {
        let remote_addr = self.remote_candidates[remote].addr();
        self.send_binding_success(m, local, remote_addr);
        log::trace!("controllingSelector: sendBindingSuccess");

        let index = self.pair_for_request(local, remote);
        let p = &self.candidate_pairs[index];
        log::trace!(
            "controllingSelector: after findPair {}, p.state: {}, {}",
            p,
            p.state,
            self.nominated_pair.is_none(),
        );

        if p.state == CandidatePairState::Succeeded
            && self.nominated_pair.is_none()
            && self.get_selected_pair().is_none()
        {
            if let Some(best_pair) = self.get_best_available_candidate_pair() {
                log::trace!(
                    "controllingSelector: getBestAvailableCandidatePair {}",
                    best_pair
                );
                if best_pair == index
                    && self.is_nominatable(local, true)
                    && self.is_nominatable(remote, false)
                {
                    log::trace!(
                        "The candidate ({}, {}) is the best candidate available, marking it as nominated",
                        local,
                        remote
                    );
                    self.candidate_pairs[index].nominated = true;
                    self.nominated_pair = Some(index);
                    self.nominate_pair();
                }
            } else {
                log::trace!("No best pair available");
            }
        } else if p.state != CandidatePairState::Succeeded
            && p.state != CandidatePairState::InProgress
        {
            self.triggered_check(index);
        }
    }
}

impl ControlledSelector for Agent {
    fn start(&mut self) {
        self.start_time = self.now;
    }

    fn contact_candidates(&mut self) {
        // A lite selector should not contact candidates
        if self.lite {
            self.validate_selected_pair();
        } else if self.get_selected_pair().is_some() {
            if self.validate_selected_pair() {
                log::trace!("[{}]: checking keepalive", self.get_name());
                self.check_keepalive();
            }
        } else {
            self.ping_all_candidates();
        }
    }

    fn ping_candidate(&mut self, local: usize, remote: usize) {
        if self.ufrag_pwd.remote_credentials.is_none() {
            log::trace!("no remote credentials yet, check deferred");
            return;
        }
        match self.binding_request(self.local_candidates[local].priority(), false) {
            Ok(msg) => self.send_binding_request(&msg, local, remote),
            Err(err) => log::error!("{}", err),
        }
    }

    fn handle_success_response(
        &mut self,
        m: &Message,
        local: usize,
        remote: usize,
        remote_addr: SocketAddr,
    ) {
        // https://tools.ietf.org/html/rfc8445#section-7.3.1.5
        // If the controlled agent does not accept the request from the
        // controlling agent, the controlled agent MUST reject the nomination
        // request with an appropriate error code response (e.g., 400)
        // [RFC5389].
        if let Some((index, _)) = self.accept_success_response(m, local, remote, remote_addr) {
            // a nomination received while the triggered check was in flight
            if self.candidate_pairs[index].nominated && self.get_selected_pair().is_none() {
                self.set_selected_pair(Some(index));
            }
        }
    }

    fn handle_binding_request(&mut self, m: &Message, local: usize, remote: usize) {
        let remote_addr = self.remote_candidates[remote].addr();
        let index = self.pair_for_request(local, remote);
        let use_candidate = m.contains(ATTR_USE_CANDIDATE);

        self.send_binding_success(m, local, remote_addr);

        if self.lite {
            // a lite agent never checks, the nomination itself validates the pair
            if use_candidate && self.get_selected_pair().is_none() {
                self.candidate_pairs[index].state = CandidatePairState::Succeeded;
                self.set_selected_pair(Some(index));
            }
            return;
        }

        if use_candidate {
            // https://tools.ietf.org/html/rfc8445#section-7.3.1.5
            if self.candidate_pairs[index].state == CandidatePairState::Succeeded {
                // If the state of this pair is Succeeded, it means that the check
                // previously sent by this pair produced a successful response and
                // generated a valid pair (Section 7.2.5.3.2).  The agent sets the
                // nominated flag value of the valid pair to true.
                if self.get_selected_pair().is_none() {
                    self.set_selected_pair(Some(index));
                }
            } else {
                // If the received Binding request triggered a new check to be
                // enqueued in the triggered-check queue (Section 7.3.1.4), once the
                // check is sent and if it generates a successful response, and
                // generates a valid pair, the agent sets the nominated flag of the
                // pair to true.
                self.candidate_pairs[index].nominated = true;
                self.triggered_check(index);
            }
        } else if self.candidate_pairs[index].state != CandidatePairState::Succeeded {
            self.triggered_check(index);
        }
    }
}
