#[cfg(test)]
mod client_test;

use crate::agent::*;
use crate::message::*;
use shared::error::*;
use shared::{TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol};

use bytes::BytesMut;
use log::{debug, trace};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

const DEFAULT_RTO: Duration = Duration::from_millis(300);
const DEFAULT_MAX_ATTEMPTS: u32 = 7;

/// A request in flight, kept for retransmission.
#[derive(Debug, Clone)]
struct ClientTransaction {
    attempt: u32,
    raw: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct ClientSettings {
    rto: Duration,
    max_attempts: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings {
            rto: DEFAULT_RTO,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Default)]
pub struct ClientBuilder {
    settings: ClientSettings,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial retransmission timeout of RFC 5389 Section 7.2.1.
    pub fn with_rto(mut self, rto: Duration) -> Self {
        self.settings.rto = rto;
        self
    }

    /// Sets how many times a request is retransmitted before timing out.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.settings.max_attempts = max_attempts;
        self
    }

    /// Disables retransmissions, for reliable transports. The single
    /// attempt waits as long as a full retransmission schedule would.
    pub fn with_no_retransmit(mut self) -> Self {
        self.settings.rto = DEFAULT_MAX_ATTEMPTS * self.settings.rto;
        self.settings.max_attempts = 0;
        self
    }

    pub fn build(
        self,
        local: SocketAddr,
        remote: SocketAddr,
        protocol: TransportProtocol,
        now: Instant,
    ) -> Client {
        Client {
            local,
            remote,
            transport_protocol: protocol,
            settings: self.settings,
            agent: Agent::new(),
            transactions: HashMap::new(),
            transmits: VecDeque::new(),
            events: VecDeque::new(),
            now,
            closed: false,
        }
    }
}

/// A STUN client bound to one server, retransmitting requests with
/// exponential backoff until a response arrives or attempts run out.
pub struct Client {
    local: SocketAddr,
    remote: SocketAddr,
    transport_protocol: TransportProtocol,
    settings: ClientSettings,
    agent: Agent,
    transactions: HashMap<TransactionId, ClientTransaction>,
    transmits: VecDeque<TaggedBytesMut>,
    events: VecDeque<Event>,
    now: Instant,
    closed: bool,
}

impl Client {
    fn deadline(&self, attempt: u32) -> Instant {
        self.now + self.settings.rto * 2u32.saturating_pow(attempt.min(16))
    }

    fn send(&mut self, raw: &[u8]) {
        self.transmits.push_back(TransportMessage {
            now: self.now,
            transport: TransportContext {
                local_addr: self.local,
                peer_addr: self.remote,
                transport_protocol: self.transport_protocol,
                ecn: None,
            },
            message: BytesMut::from(raw),
        });
    }

    /// Drains agent events, retransmitting timed out requests that still
    /// have attempts left.
    fn drain_agent(&mut self) -> Result<()> {
        while let Some(event) = self.agent.poll_event() {
            let Some(mut ct) = self.transactions.remove(&event.id) else {
                // indications and late responses
                self.events.push_back(event);
                continue;
            };

            let timed_out = event.result.as_ref().err() == Some(&Error::ErrTransactionTimeOut);
            if !timed_out || ct.attempt >= self.settings.max_attempts {
                self.events.push_back(event);
                continue;
            }

            ct.attempt += 1;
            trace!("stun retransmit {:?} attempt {}", event.id, ct.attempt);
            let deadline = self.deadline(ct.attempt);
            self.agent.start(event.id, deadline)?;
            self.send(&ct.raw);
            self.transactions.insert(event.id, ct);
        }
        Ok(())
    }
}

impl sansio::Protocol<TaggedBytesMut, Message, ()> for Client {
    type Rout = ();
    type Wout = TaggedBytesMut;
    type Eout = Event;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.closed {
            return Err(Error::ErrClientClosed);
        }
        self.now = msg.now;

        let mut m = Message::new();
        m.raw = msg.message.to_vec();
        m.decode()?;
        self.agent.process(m)?;
        self.drain_agent()
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    /// Sends a request and starts its transaction.
    fn handle_write(&mut self, m: Message) -> Result<()> {
        if self.closed {
            return Err(Error::ErrClientClosed);
        }

        let deadline = self.deadline(0);
        self.agent.start(m.transaction_id, deadline)?;
        self.send(&m.raw);
        self.transactions.insert(
            m.transaction_id,
            ClientTransaction {
                attempt: 0,
                raw: m.raw,
            },
        );
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.transmits.pop_front()
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.now = now;
        self.agent.collect(now)?;
        self.drain_agent()
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        self.agent.poll_timeout()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ErrClientClosed);
        }
        debug!("stun client {} -> {} closed", self.local, self.remote);
        self.closed = true;
        self.agent.close()?;
        self.transactions.clear();
        while let Some(event) = self.agent.poll_event() {
            self.events.push_back(event);
        }
        Ok(())
    }
}
