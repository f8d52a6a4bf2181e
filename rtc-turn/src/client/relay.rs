use log::{debug, warn};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use stun::attributes::*;
use stun::error_code::*;
use stun::integrity::MessageIntegrity;
use stun::message::*;
use stun::textattrs::*;

use super::transaction::TransactionKind;
use super::{Client, Event, PeerAddr};
use crate::proto::chandata::*;
use crate::proto::{Data, Lifetime, PeerAddress};
use shared::error::{Error, Result};

/// Permissions last 300s, RFC 5766 Section 8. Refreshed before expiry.
const PERM_REFRESH_INTERVAL: Duration = Duration::from_secs(120);
/// Channel bindings last 600s, RFC 5766 Section 11.
const CHANNEL_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PermState {
    Requested,
    Permitted,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Permission {
    pub(crate) state: PermState,
    pub(crate) refresh_at: Instant,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ChannelBinding {
    pub(crate) number: ChannelNumber,
    pub(crate) bound: bool,
    pub(crate) refresh_at: Instant,
}

/// State of the allocation held on the TURN server.
#[derive(Debug)]
pub(crate) struct Allocation {
    pub(crate) relayed_addr: SocketAddr,
    pub(crate) mapped_addr: Option<SocketAddr>,
    pub(crate) integrity: MessageIntegrity,
    pub(crate) nonce: Nonce,
    pub(crate) lifetime: Duration,
    pub(crate) refresh_at: Instant,
    pub(crate) permissions: HashMap<IpAddr, Permission>,
    pub(crate) channels: HashMap<SocketAddr, ChannelBinding>,
    next_channel: u16,
}

impl Allocation {
    pub(crate) fn new(
        relayed_addr: SocketAddr,
        mapped_addr: Option<SocketAddr>,
        integrity: MessageIntegrity,
        nonce: Nonce,
        lifetime: Duration,
        now: Instant,
    ) -> Self {
        debug!("initial lifetime: {} seconds", lifetime.as_secs());
        Allocation {
            relayed_addr,
            mapped_addr,
            integrity,
            nonce,
            lifetime,
            refresh_at: now + lifetime / 2,
            permissions: HashMap::new(),
            channels: HashMap::new(),
            next_channel: MIN_CHANNEL_NUMBER,
        }
    }

    pub(crate) fn next_channel_number(&mut self) -> Result<ChannelNumber> {
        if self.next_channel > MAX_CHANNEL_NUMBER {
            return Err(Error::ErrInvalidChannelNumber);
        }
        let number = ChannelNumber(self.next_channel);
        self.next_channel += 1;
        Ok(number)
    }

    pub(crate) fn channel_by_number(&self, number: ChannelNumber) -> Option<SocketAddr> {
        self.channels
            .iter()
            .find(|(_, b)| b.number == number)
            .map(|(addr, _)| *addr)
    }

    pub(crate) fn next_timeout(&self) -> Instant {
        let perms = self.permissions.values().map(|p| p.refresh_at);
        let channels = self.channels.values().map(|c| c.refresh_at);
        perms
            .chain(channels)
            .fold(self.refresh_at, |acc, t| acc.min(t))
    }
}

impl Client {
    fn allocation_mut(&mut self) -> Result<&mut Allocation> {
        self.allocation.as_mut().ok_or(Error::ErrNoAllocation)
    }

    /// Builds a request carrying the long-term credentials of the allocation.
    fn authenticated_request(
        &self,
        typ: MessageType,
        mut attrs: Vec<Box<dyn Setter>>,
    ) -> Result<Message> {
        let alloc = self.allocation.as_ref().ok_or(Error::ErrNoAllocation)?;
        let mut setters: Vec<Box<dyn Setter>> =
            vec![Box::new(TransactionId::new()), Box::new(typ)];
        setters.append(&mut attrs);
        setters.push(Box::new(self.username.clone()));
        setters.push(Box::new(self.realm.clone()));
        setters.push(Box::new(alloc.nonce.clone()));
        setters.push(Box::new(alloc.integrity.clone()));
        setters.push(Box::new(stun::fingerprint::FINGERPRINT));

        let mut msg = Message::new();
        msg.build(&setters)?;
        Ok(msg)
    }

    /// Requests permissions so that peers at these addresses may send
    /// through the relay. Permissions are keyed by IP only.
    pub fn create_permission(&mut self, peers: &[SocketAddr]) -> Result<TransactionId> {
        let now = self.now;
        let alloc = self.allocation_mut()?;
        for peer in peers {
            alloc
                .permissions
                .entry(peer.ip())
                .or_insert(Permission {
                    state: PermState::Requested,
                    refresh_at: now + PERM_REFRESH_INTERVAL,
                });
        }

        let attrs: Vec<Box<dyn Setter>> = peers
            .iter()
            .map(|peer| Box::new(PeerAddress::from(*peer)) as Box<dyn Setter>)
            .collect();
        let msg =
            self.authenticated_request(MessageType::new(METHOD_CREATE_PERMISSION, CLASS_REQUEST), attrs)?;
        Ok(self.perform_transaction(&msg, TransactionKind::CreatePermission(peers.to_vec())))
    }

    /// Binds a channel to `peer`, after which data goes out as ChannelData.
    pub fn channel_bind(&mut self, peer: SocketAddr) -> Result<TransactionId> {
        let now = self.now;
        let alloc = self.allocation_mut()?;
        let number = match alloc.channels.get(&peer) {
            Some(binding) => binding.number,
            None => {
                let number = alloc.next_channel_number()?;
                alloc.channels.insert(
                    peer,
                    ChannelBinding {
                        number,
                        bound: false,
                        refresh_at: now + CHANNEL_REFRESH_INTERVAL,
                    },
                );
                number
            }
        };

        let msg = self.authenticated_request(
            MessageType::new(METHOD_CHANNEL_BIND, CLASS_REQUEST),
            vec![Box::new(number), Box::new(PeerAddress::from(peer))],
        )?;
        Ok(self.perform_transaction(&msg, TransactionKind::ChannelBind(peer, number.0)))
    }

    /// Refreshes the allocation. A zero lifetime deletes it.
    pub fn refresh(&mut self, lifetime: Duration) -> Result<TransactionId> {
        let msg = self.authenticated_request(
            MessageType::new(METHOD_REFRESH, CLASS_REQUEST),
            vec![Box::new(Lifetime(lifetime))],
        )?;
        Ok(self.perform_transaction(&msg, TransactionKind::Refresh(lifetime)))
    }

    /// Relays `data` to `peer`, over a bound channel when one exists and
    /// as a Send indication otherwise. A permission is requested on first use.
    pub fn send_to(&mut self, data: &[u8], peer: SocketAddr) -> Result<()> {
        let alloc = self.allocation.as_ref().ok_or(Error::ErrNoAllocation)?;

        if let Some(binding) = alloc.channels.get(&peer)
            && binding.bound
        {
            let cd = ChannelData {
                number: binding.number,
                data: data.to_vec(),
            };
            let raw = cd.encode(self.is_reliable());
            self.write_to(&raw, self.turn_serv_addr);
            return Ok(());
        }

        if !alloc.permissions.contains_key(&peer.ip()) {
            self.create_permission(&[peer])?;
        }

        let mut msg = Message::new();
        msg.build(&[
            Box::new(TransactionId::new()),
            Box::new(MessageType::new(METHOD_SEND, CLASS_INDICATION)),
            Box::new(PeerAddress::from(peer)),
            Box::new(Data(data.to_vec())),
            Box::new(stun::fingerprint::FINGERPRINT),
        ])?;
        self.write_to(&msg.raw, self.turn_serv_addr);
        Ok(())
    }

    /// Returns true when the server answered 438 and the nonce was replaced.
    fn take_stale_nonce(&mut self, msg: &Message) -> bool {
        if stun::checks::error_code_of(msg) != Some(CODE_STALE_NONCE) {
            return false;
        }
        match (Nonce::get_from_as(msg, ATTR_NONCE), self.allocation.as_mut()) {
            (Ok(nonce), Some(alloc)) => {
                debug!("stale nonce, retrying with a fresh one");
                alloc.nonce = nonce;
                true
            }
            _ => {
                warn!("stale nonce response without a nonce");
                false
            }
        }
    }

    pub(crate) fn handle_refresh_response(&mut self, msg: Message, lifetime: Duration) -> Result<()> {
        if msg.typ.class == CLASS_ERROR_RESPONSE {
            if self.take_stale_nonce(&msg) {
                self.refresh(lifetime)?;
                return Ok(());
            }
            self.events.push_back(Event::RefreshError(
                msg.transaction_id,
                error_response(&msg),
            ));
            return Ok(());
        }

        if lifetime.is_zero() {
            debug!("allocation deleted");
            self.allocation = None;
            return Ok(());
        }

        let mut updated = Lifetime::default();
        updated.get_from(&msg)?;
        let now = self.now;
        let alloc = self.allocation_mut()?;
        alloc.lifetime = updated.0;
        alloc.refresh_at = now + updated.0 / 2;
        debug!("allocation refreshed, lifetime {}", updated);
        Ok(())
    }

    pub(crate) fn handle_create_permission_response(
        &mut self,
        msg: Message,
        peers: Vec<SocketAddr>,
    ) -> Result<()> {
        if msg.typ.class == CLASS_ERROR_RESPONSE {
            if self.take_stale_nonce(&msg) {
                self.create_permission(&peers)?;
                return Ok(());
            }
            let alloc = self.allocation_mut()?;
            for peer in &peers {
                alloc.permissions.remove(&peer.ip());
            }
            self.events.push_back(Event::CreatePermissionError(
                msg.transaction_id,
                error_response(&msg),
            ));
            return Ok(());
        }

        let alloc = self.allocation_mut()?;
        for peer in &peers {
            if let Some(perm) = alloc.permissions.get_mut(&peer.ip()) {
                perm.state = PermState::Permitted;
            }
        }
        self.events
            .push_back(Event::CreatePermissionResponse(msg.transaction_id, peers));
        Ok(())
    }

    pub(crate) fn handle_channel_bind_response(
        &mut self,
        msg: Message,
        peer: SocketAddr,
        number: u16,
    ) -> Result<()> {
        if msg.typ.class == CLASS_ERROR_RESPONSE {
            if self.take_stale_nonce(&msg) {
                self.channel_bind(peer)?;
                return Ok(());
            }
            self.allocation_mut()?.channels.remove(&peer);
            self.events.push_back(Event::ChannelBindError(
                msg.transaction_id,
                error_response(&msg),
            ));
            return Ok(());
        }

        let now = self.now;
        let alloc = self.allocation_mut()?;
        if let Some(binding) = alloc.channels.get_mut(&peer) {
            binding.bound = true;
        }
        // a channel binding also installs a permission
        alloc.permissions.insert(
            peer.ip(),
            Permission {
                state: PermState::Permitted,
                refresh_at: now + PERM_REFRESH_INTERVAL,
            },
        );
        debug!("channel {} bound to {}", number, peer);
        self.events.push_back(Event::ChannelBindResponse(
            msg.transaction_id,
            peer,
            ChannelNumber(number),
        ));
        Ok(())
    }

    /// Fires allocation, permission and channel refreshes that are due.
    pub(crate) fn refresh_due(&mut self, now: Instant) -> Result<()> {
        let Some(alloc) = self.allocation.as_mut() else {
            return Ok(());
        };

        let refresh_alloc = alloc.refresh_at <= now;
        if refresh_alloc {
            // pushed forward until the response sets the new lifetime
            alloc.refresh_at = now + alloc.lifetime / 2;
        }

        let mut perms: Vec<PeerAddr> = vec![];
        for (ip, perm) in alloc.permissions.iter_mut() {
            if perm.refresh_at <= now {
                perm.refresh_at = now + PERM_REFRESH_INTERVAL;
                perms.push(SocketAddr::new(*ip, 0));
            }
        }

        let mut channels: Vec<PeerAddr> = vec![];
        for (peer, binding) in alloc.channels.iter_mut() {
            if binding.refresh_at <= now {
                binding.refresh_at = now + CHANNEL_REFRESH_INTERVAL;
                channels.push(*peer);
            }
        }

        if refresh_alloc {
            let lifetime = alloc.lifetime;
            self.refresh(lifetime)?;
        }
        if !perms.is_empty() {
            self.create_permission(&perms)?;
        }
        for peer in channels {
            self.channel_bind(peer)?;
        }
        Ok(())
    }

    pub(crate) fn find_addr_by_channel_number(&self, number: ChannelNumber) -> Option<SocketAddr> {
        self.allocation
            .as_ref()
            .and_then(|alloc| alloc.channel_by_number(number))
    }
}

/// Turns an error response into an Error carrying its code and reason.
pub(crate) fn error_response(msg: &Message) -> Error {
    let mut code = ErrorCodeAttribute::default();
    if code.get_from(msg).is_err() {
        Error::ErrTurnErrorResponse(msg.typ.to_string())
    } else {
        Error::ErrTurnErrorResponse(format!("{} (error {})", msg.typ, code))
    }
}
