use log::trace;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use stun::message::*;
use stun::textattrs::Nonce;

const MAX_RTX_INTERVAL: Duration = Duration::from_millis(1600);
/// Rc of RFC 5389 Section 7.2.1.
const MAX_RTX_COUNT: u16 = 7;
/// Ti of RFC 5389 Section 7.2.2, for reliable transports.
const RELIABLE_TIMEOUT: Duration = Duration::from_millis(39_500);

/// What a response to the transaction completes.
#[derive(Debug, Clone)]
pub(crate) enum TransactionKind {
    Binding,
    /// Unauthenticated Allocate, answered by 401 with realm and nonce.
    AllocateAttempt,
    AllocateRequest(Nonce),
    Refresh(Duration),
    CreatePermission(Vec<SocketAddr>),
    ChannelBind(SocketAddr, u16),
}

#[derive(Debug)]
pub(crate) struct Transaction {
    pub(crate) id: TransactionId,
    pub(crate) kind: TransactionKind,
    pub(crate) raw: Vec<u8>,
    pub(crate) to: SocketAddr,
    n_rtx: u16,
    interval: Duration,
    deadline: Instant,
    reliable: bool,
}

impl Transaction {
    pub(crate) fn new(
        id: TransactionId,
        kind: TransactionKind,
        raw: Vec<u8>,
        to: SocketAddr,
        rto: Duration,
        reliable: bool,
        now: Instant,
    ) -> Self {
        Transaction {
            id,
            kind,
            raw,
            to,
            n_rtx: 0,
            interval: rto,
            deadline: now + if reliable { RELIABLE_TIMEOUT } else { rto },
            reliable,
        }
    }
}

/// Outcome of a timer tick for one transaction.
pub(crate) enum Tick {
    Retransmit(SocketAddr, Vec<u8>),
    TimedOut(Transaction),
}

#[derive(Default, Debug)]
pub(crate) struct TransactionMap {
    transactions: HashMap<TransactionId, Transaction>,
}

impl TransactionMap {
    pub(crate) fn insert(&mut self, tr: Transaction) {
        self.transactions.insert(tr.id, tr);
    }

    pub(crate) fn remove(&mut self, id: &TransactionId) -> Option<Transaction> {
        self.transactions.remove(id)
    }

    pub(crate) fn clear(&mut self) {
        self.transactions.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.transactions.len()
    }

    pub(crate) fn poll_timeout(&self) -> Option<Instant> {
        self.transactions.values().map(|tr| tr.deadline).min()
    }

    pub(crate) fn handle_timeout(&mut self, now: Instant) -> Vec<Tick> {
        let mut ticks = vec![];
        let mut expired = vec![];

        for tr in self.transactions.values_mut() {
            if tr.deadline > now {
                continue;
            }
            if tr.reliable || tr.n_rtx + 1 >= MAX_RTX_COUNT {
                expired.push(tr.id);
                continue;
            }
            tr.n_rtx += 1;
            tr.interval = (tr.interval * 2).min(MAX_RTX_INTERVAL);
            tr.deadline = now + tr.interval;
            trace!(
                "retransmitting transaction {:?} to {} (n_rtx={})",
                tr.id, tr.to, tr.n_rtx
            );
            ticks.push(Tick::Retransmit(tr.to, tr.raw.clone()));
        }

        for id in expired {
            if let Some(tr) = self.transactions.remove(&id) {
                ticks.push(Tick::TimedOut(tr));
            }
        }
        ticks
    }
}
