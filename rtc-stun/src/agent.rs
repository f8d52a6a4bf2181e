#[cfg(test)]
mod agent_test;

use crate::message::*;
use shared::error::*;

use log::trace;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Outcome of one transaction: the response, or why none will arrive.
#[derive(Debug)]
pub struct Event {
    pub id: TransactionId,
    pub result: Result<Message>,
}

/// Tracks in-flight transactions by id and deadline.
///
/// Every started transaction produces exactly one [`Event`]: the matching
/// response, `ErrTransactionStopped`, `ErrTransactionTimeOut` or
/// `ErrAgentClosed`.
#[derive(Default, Debug)]
pub struct Agent {
    deadlines: HashMap<TransactionId, Instant>,
    events: VecDeque<Event>,
    closed: bool,
}

impl Agent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transaction that times out at `deadline`.
    pub fn start(&mut self, id: TransactionId, deadline: Instant) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        if self.deadlines.contains_key(&id) {
            return Err(Error::ErrTransactionExists);
        }
        self.deadlines.insert(id, deadline);
        Ok(())
    }

    /// Completes the transaction of `m`. Messages without a pending
    /// transaction are still surfaced, as indications are.
    pub fn process(&mut self, m: Message) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        if self.deadlines.remove(&m.transaction_id).is_none() {
            trace!("stun message {} has no pending transaction", m);
        }
        self.events.push_back(Event {
            id: m.transaction_id,
            result: Ok(m),
        });
        Ok(())
    }

    /// Cancels a pending transaction.
    pub fn stop(&mut self, id: TransactionId) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        if self.deadlines.remove(&id).is_none() {
            return Err(Error::ErrTransactionNotExists);
        }
        self.events.push_back(Event {
            id,
            result: Err(Error::ErrTransactionStopped),
        });
        Ok(())
    }

    /// Times out every transaction whose deadline is before `now`.
    pub fn collect(&mut self, now: Instant) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }

        let mut expired: Vec<TransactionId> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline < now)
            .map(|(id, _)| *id)
            .collect();
        expired.sort_by_key(|id| self.deadlines.get(id).copied());

        for id in expired {
            self.deadlines.remove(&id);
            self.events.push_back(Event {
                id,
                result: Err(Error::ErrTransactionTimeOut),
            });
        }
        Ok(())
    }

    /// Fails all pending transactions and rejects further calls.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        for (id, _) in self.deadlines.drain() {
            self.events.push_back(Event {
                id,
                result: Err(Error::ErrAgentClosed),
            });
        }
        self.closed = true;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn pending(&self) -> usize {
        self.deadlines.len()
    }

    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn poll_timeout(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }
}
