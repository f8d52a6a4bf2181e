use std::fmt;
use std::time::Instant;

use log::*;
use shared::error::*;

use crate::config::MAXIMUM_RETRANSMIT_INTERVAL;
use crate::conn::*;
use crate::content::*;

// [RFC6347 Section-4.2.4]
//                      +-----------+
//                +---> | PREPARING | <--------------------+
//                |     +-----------+                      |
//                |           |                            |
//                |           | Buffer next flight         |
//                |           |                            |
//                |          \|/                           |
//                |     +-----------+                      |
//                |     |  SENDING  |<------------------+  | Send
//                |     +-----------+                   |  | HelloRequest
//        Receive |           |                         |  |
//           next |           | Send flight             |  | or
//         flight |  +--------+                         |  |
//                |  |        | Set retransmit timer    |  | Receive
//                |  |       \|/                        |  | HelloRequest
//                |  |  +-----------+                   |  | Send
//                +--)--|  WAITING  |-------------------+  | ClientHello
//                |  |  +-----------+   Timer expires   |  |
//                |  |         |                        |  |
//                |  |         +------------------------+  |
//        Receive |  | Send           Read retransmit      |
//           last |  | last                                |
//         flight |  | flight                              |
//                |  |                                     |
//               \|/\|/                                    |
//            +-----------+                                |
//            | FINISHED  | -------------------------------+
//            +-----------+
//                 |  /|\
//                 |   |
//                 +---+
//              Read retransmit
//           Retransmit last flight

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum HandshakeState {
    Errored,
    Preparing,
    Sending,
    Waiting,
    Finished,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HandshakeState::Errored => write!(f, "Errored"),
            HandshakeState::Preparing => write!(f, "Preparing"),
            HandshakeState::Sending => write!(f, "Sending"),
            HandshakeState::Waiting => write!(f, "Waiting"),
            HandshakeState::Finished => write!(f, "Finished"),
        }
    }
}

pub(crate) fn srv_cli_str(is_client: bool) -> &'static str {
    if is_client {
        "client"
    } else {
        "server"
    }
}

impl DTLSConn {
    pub(crate) fn handshake_fsm(&mut self, now: Instant) -> Result<()> {
        loop {
            trace!(
                "[handshake:{}] {}: {}",
                srv_cli_str(self.state.is_client),
                self.current_flight,
                self.current_handshake_state
            );

            let previous_handshake_state = self.current_handshake_state;
            let next_handshake_state = match previous_handshake_state {
                HandshakeState::Preparing => self.prepare(),
                HandshakeState::Sending => self.send(now),
                HandshakeState::Waiting => self.wait(),
                HandshakeState::Finished => self.finish(),
                HandshakeState::Errored => Err(Error::ErrInvalidFsmTransition),
            };
            self.current_handshake_state = match next_handshake_state {
                Ok(state) => state,
                Err(err) => {
                    self.current_handshake_state = HandshakeState::Errored;
                    self.current_retransmit_timer = None;
                    return Err(err);
                }
            };

            if self.current_handshake_state == HandshakeState::Finished
                && !self.is_handshake_completed()
            {
                self.set_handshake_completed();
                debug!(
                    "[handshake:{}] is completed",
                    srv_cli_str(self.state.is_client),
                );
            }

            if previous_handshake_state == self.current_handshake_state
                && matches!(
                    previous_handshake_state,
                    HandshakeState::Waiting | HandshakeState::Finished
                )
            {
                // wait for timeout or incoming packet
                return Ok(());
            }
        }
    }

    fn prepare(&mut self) -> Result<HandshakeState> {
        self.flights = None;

        // Prepare flights
        self.current_retransmit_count = 0;
        self.current_retransmit_interval = self.cfg.retransmit_interval;
        self.retransmit = self.current_flight.has_retransmit();

        let result = self
            .current_flight
            .generate(&mut self.state, &self.cache, &self.cfg);

        let mut pkts = match result {
            Err((alert, err)) => {
                if let Some(alert) = alert {
                    self.notify(alert.alert_level, alert.alert_description);
                }
                return Err(err.unwrap_or(Error::ErrInvalidFsmTransition));
            }
            Ok(pkts) => pkts,
        };

        let epoch = self.cfg.initial_epoch;
        let mut next_epoch = epoch;
        for p in &mut pkts {
            if p.record.record_layer_header.epoch > next_epoch {
                next_epoch = p.record.record_layer_header.epoch;
            }
            if let Content::Handshake(h) = &mut p.record.content {
                h.handshake_header.message_sequence = self.state.handshake_send_sequence as u16;
                self.state.handshake_send_sequence += 1;

                self.cache.push(
                    h.marshal_to_vec()?,
                    p.record.record_layer_header.epoch,
                    h.handshake_header.message_sequence,
                    h.handshake_header.handshake_type,
                    self.state.is_client,
                );
            }
        }
        if epoch != next_epoch {
            debug!(
                "[handshake:{}] -> changeCipherSpec (epoch: {})",
                srv_cli_str(self.state.is_client),
                next_epoch
            );
            self.set_local_epoch(next_epoch);
        }
        self.flights = Some(pkts);

        Ok(HandshakeState::Sending)
    }

    fn send(&mut self, now: Instant) -> Result<HandshakeState> {
        if let Some(pkts) = self.flights.clone() {
            self.write_packets(pkts);
        }

        if self.current_flight.is_last_send_flight() {
            Ok(HandshakeState::Finished)
        } else {
            self.current_retransmit_timer = Some(now + self.current_retransmit_interval);
            Ok(HandshakeState::Waiting)
        }
    }

    fn wait(&mut self) -> Result<HandshakeState> {
        if self.handshake_rx.take().is_none() {
            return Ok(HandshakeState::Waiting);
        }

        trace!(
            "[handshake:{}] {} received handshake packets",
            srv_cli_str(self.state.is_client),
            self.current_flight
        );
        match self
            .current_flight
            .parse(&mut self.state, &self.cache, &self.cfg)
        {
            Err((alert, err)) => {
                if let Some(alert) = alert {
                    self.notify(alert.alert_level, alert.alert_description);
                }
                if let Some(err) = err {
                    return Err(err);
                }
                Ok(HandshakeState::Waiting)
            }
            Ok(next_flight) => {
                debug!(
                    "[handshake:{}] {} -> {}",
                    srv_cli_str(self.state.is_client),
                    self.current_flight,
                    next_flight
                );
                if next_flight.is_last_recv_flight()
                    && self.current_flight.to_string() == next_flight.to_string()
                {
                    return Ok(HandshakeState::Finished);
                }
                self.current_flight = next_flight;
                Ok(HandshakeState::Preparing)
            }
        }
    }

    fn finish(&mut self) -> Result<HandshakeState> {
        if self.handshake_rx.take().is_none() {
            return Ok(HandshakeState::Finished);
        }

        match self
            .current_flight
            .parse(&mut self.state, &self.cache, &self.cfg)
        {
            Err((alert, err)) => {
                if let Some(alert) = alert {
                    self.notify(alert.alert_level, alert.alert_description);
                }
                if let Some(err) = err {
                    return Err(err);
                }
                Ok(HandshakeState::Finished)
            }
            Ok(_) => {
                debug!(
                    "[handshake:{}] peer retransmitted, resending {}",
                    srv_cli_str(self.state.is_client),
                    self.current_flight
                );
                Ok(HandshakeState::Sending)
            }
        }
    }

    /// Fires when the retransmit timer expires: resends the current flight with a doubled
    /// interval, or gives up after `maximum_retransmit_number` attempts.
    pub(crate) fn handshake_timeout(&mut self, now: Instant) -> Result<()> {
        if self.current_handshake_state != HandshakeState::Waiting {
            return Ok(());
        }

        if !self.retransmit {
            self.current_retransmit_timer = Some(now + self.current_retransmit_interval);
            return Ok(());
        }

        self.current_retransmit_count += 1;
        debug!(
            "[handshake:{}] {} retransmit {} of {}",
            srv_cli_str(self.state.is_client),
            self.current_flight,
            self.current_retransmit_count,
            self.cfg.maximum_retransmit_number,
        );
        if self.current_retransmit_count > self.cfg.maximum_retransmit_number {
            self.current_handshake_state = HandshakeState::Errored;
            return Err(Error::ErrHandshakeTimeout);
        }

        self.current_retransmit_interval =
            (self.current_retransmit_interval * 2).min(MAXIMUM_RETRANSMIT_INTERVAL);
        self.current_handshake_state = HandshakeState::Sending;
        self.handshake(now)
    }
}
