use super::*;

/// Datagrams in, datagrams out.
///
/// Reads take every datagram received on a host candidate's address.
/// STUN is consumed, traffic from TURN servers is unwrapped, and any other
/// payload from a known remote candidate comes back out of `poll_read`.
/// Writes send application data on the selected pair; their transport
/// context is ignored.
impl sansio::Protocol<TaggedBytesMut, TaggedBytesMut, ()> for Agent {
    type Rout = TaggedBytesMut;
    type Wout = TaggedBytesMut;
    type Eout = Event;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.closed {
            trace!("[{}]: dropping datagram, agent closed", self.get_name());
            return Ok(());
        }
        self.now = msg.now;

        if self.handle_server_datagram(&msg) {
            return Ok(());
        }

        if let Some(local_index) =
            self.find_local_candidate(msg.transport.local_addr, msg.transport.transport_protocol)
        {
            self.handle_inbound_datagram(local_index, msg.transport.peer_addr, msg.message);
        } else {
            warn!(
                "[{}]: Discarded message, not a valid local candidate from {:?}:{}",
                self.get_name(),
                msg.transport.transport_protocol,
                msg.transport.local_addr,
            );
        }
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.read_outs.pop_front()
    }

    fn handle_write(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        self.now = msg.now;

        let Some(pair_index) = self.selected_pair else {
            return Err(Error::ErrICEConnectionNotStarted);
        };
        let p = &self.candidate_pairs[pair_index];
        let (local_index, remote_addr) = (p.local_index, self.remote_candidates[p.remote_index].addr());
        self.send_to(local_index, remote_addr, &msg.message);
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.write_outs.pop_front()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Self::Time) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.now = now;

        self.handle_gatherers_timeout(now);

        if self.started && self.last_checking_time + self.get_timeout_interval() <= now {
            self.contact();
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        if self.closed {
            return None;
        }

        let check = if self.started {
            Some(self.last_checking_time + self.get_timeout_interval())
        } else {
            None
        };
        match (check, self.poll_gatherers_timeout()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.set_selected_pair(None);
        self.delete_all_candidates(false);
        self.candidate_pairs.clear();
        self.pending_binding_requests.clear();
        self.update_connection_state(ConnectionState::Closed);
        self.closed = true;

        Ok(())
    }
}
