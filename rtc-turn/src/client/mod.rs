
pub mod relay;
pub(crate) mod transaction;

use bytes::BytesMut;
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use stun::attributes::*;
use stun::checks::error_code_of;
use stun::error_code::*;
use stun::fingerprint::FINGERPRINT;
use stun::integrity::*;
use stun::message::*;
use stun::textattrs::*;
use stun::xoraddr::*;

use crate::proto::chandata::*;
use crate::proto::*;
use relay::{Allocation, error_response};
use shared::error::{Error, Result};
use shared::{TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol};
use transaction::*;

const DEFAULT_RTO: Duration = Duration::from_millis(200);

pub type RelayedAddr = SocketAddr;
pub type ReflexiveAddr = SocketAddr;
pub type PeerAddr = SocketAddr;

#[derive(Debug)]
pub enum Event {
    TransactionTimeout(TransactionId),

    BindingResponse(TransactionId, ReflexiveAddr),
    BindingError(TransactionId, Error),

    AllocateResponse(TransactionId, RelayedAddr),
    AllocateError(TransactionId, Error),

    RefreshError(TransactionId, Error),

    CreatePermissionResponse(TransactionId, Vec<PeerAddr>),
    CreatePermissionError(TransactionId, Error),

    ChannelBindResponse(TransactionId, PeerAddr, ChannelNumber),
    ChannelBindError(TransactionId, Error),

    /// Data relayed from a peer, with the channel it arrived on if any.
    DataIndicationOrChannelData(Option<ChannelNumber>, PeerAddr, BytesMut),
}

/// ClientConfig is a bag of config parameters for Client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub turn_serv_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub transport_protocol: TransportProtocol,
    pub username: String,
    pub password: String,
    pub software: String,
    /// Initial retransmission timeout, 200ms when zero.
    pub rto: Duration,
    /// Requested allocation lifetime, server default when zero.
    pub lifetime: Duration,
}

/// A sans-I/O TURN client holding at most one allocation on one server.
///
/// Inbound datagrams from the server go through `handle_read`, data for
/// peers goes through `handle_write` with the peer as destination.
pub struct Client {
    turn_serv_addr: SocketAddr,
    local_addr: SocketAddr,
    transport_protocol: TransportProtocol,
    username: Username,
    password: String,
    realm: Realm,
    software: Software,
    rto: Duration,
    lifetime: Duration,

    tr_map: TransactionMap,
    allocation: Option<Allocation>,
    transmits: VecDeque<TaggedBytesMut>,
    events: VecDeque<Event>,
    now: Instant,
    closed: bool,
}

impl Client {
    pub fn new(config: ClientConfig, now: Instant) -> Self {
        Client {
            turn_serv_addr: config.turn_serv_addr,
            local_addr: config.local_addr,
            transport_protocol: config.transport_protocol,
            username: Username::new(ATTR_USERNAME, config.username),
            password: config.password,
            realm: Realm::new(ATTR_REALM, String::new()),
            software: Software::new(ATTR_SOFTWARE, config.software),
            rto: if config.rto.is_zero() {
                DEFAULT_RTO
            } else {
                config.rto
            },
            lifetime: config.lifetime,
            tr_map: TransactionMap::default(),
            allocation: None,
            transmits: VecDeque::new(),
            events: VecDeque::new(),
            now,
            closed: false,
        }
    }

    pub fn turn_server_addr(&self) -> SocketAddr {
        self.turn_serv_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The relayed transport address, once allocated.
    pub fn relayed_addr(&self) -> Option<RelayedAddr> {
        self.allocation.as_ref().map(|a| a.relayed_addr)
    }

    /// The server reflexive address reported in the Allocate response.
    pub fn mapped_addr(&self) -> Option<ReflexiveAddr> {
        self.allocation.as_ref().and_then(|a| a.mapped_addr)
    }

    /// Returns true if a permission for `peer`'s IP is installed.
    pub fn has_permission(&self, peer: &SocketAddr) -> bool {
        self.allocation.as_ref().is_some_and(|a| {
            a.permissions
                .get(&peer.ip())
                .is_some_and(|p| p.state == relay::PermState::Permitted)
        })
    }

    fn is_reliable(&self) -> bool {
        self.transport_protocol == TransportProtocol::TCP
    }

    fn requested_transport(&self) -> RequestedTransport {
        RequestedTransport {
            protocol: PROTO_UDP,
        }
    }

    /// Sends a Binding request to the TURN server.
    pub fn send_binding_request(&mut self) -> Result<TransactionId> {
        let mut setters: Vec<Box<dyn Setter>> =
            vec![Box::new(TransactionId::new()), Box::new(BINDING_REQUEST)];
        if !self.software.text.is_empty() {
            setters.push(Box::new(self.software.clone()));
        }
        setters.push(Box::new(FINGERPRINT));

        let mut msg = Message::new();
        msg.build(&setters)?;
        Ok(self.perform_transaction(&msg, TransactionKind::Binding))
    }

    /* RFC 8656 Section 20
    TURN                                 TURN
    client                               server
      |--- Allocate request -------------->|
      |<-- Allocate error response --------|  401, REALM, NONCE
      |--- Allocate request -------------->|  USERNAME, REALM, NONCE, MESSAGE-INTEGRITY
      |<-- Allocate success response ------|  XOR-RELAYED-ADDRESS, LIFETIME, XOR-MAPPED-ADDRESS
    */
    /// Starts an allocation. The first request is unauthenticated and the
    /// 401 answer supplies the realm and nonce for the second.
    pub fn allocate(&mut self) -> Result<TransactionId> {
        if self.allocation.is_some() {
            return Err(Error::ErrAlreadyAllocated);
        }

        let mut setters: Vec<Box<dyn Setter>> = vec![
            Box::new(TransactionId::new()),
            Box::new(MessageType::new(METHOD_ALLOCATE, CLASS_REQUEST)),
            Box::new(self.requested_transport()),
        ];
        if !self.software.text.is_empty() {
            setters.push(Box::new(self.software.clone()));
        }
        setters.push(Box::new(FINGERPRINT));

        let mut msg = Message::new();
        msg.build(&setters)?;
        Ok(self.perform_transaction(&msg, TransactionKind::AllocateAttempt))
    }

    fn authenticated_allocate(&mut self, nonce: Nonce, integrity: &MessageIntegrity) -> Result<()> {
        let mut setters: Vec<Box<dyn Setter>> = vec![
            Box::new(TransactionId::new()),
            Box::new(MessageType::new(METHOD_ALLOCATE, CLASS_REQUEST)),
            Box::new(self.requested_transport()),
        ];
        if !self.lifetime.is_zero() {
            setters.push(Box::new(Lifetime(self.lifetime)));
        }
        if !self.software.text.is_empty() {
            setters.push(Box::new(self.software.clone()));
        }
        setters.push(Box::new(self.username.clone()));
        setters.push(Box::new(self.realm.clone()));
        setters.push(Box::new(nonce.clone()));
        setters.push(Box::new(integrity.clone()));
        setters.push(Box::new(FINGERPRINT));

        let mut msg = Message::new();
        msg.build(&setters)?;
        self.perform_transaction(&msg, TransactionKind::AllocateRequest(nonce));
        Ok(())
    }

    fn handle_allocate_response(&mut self, msg: Message, kind: TransactionKind) -> Result<()> {
        let id = msg.transaction_id;
        match kind {
            TransactionKind::AllocateAttempt => {
                if msg.typ.class != CLASS_ERROR_RESPONSE {
                    // the server accepted an unauthenticated allocation
                    return self.install_allocation(msg, Nonce::new(ATTR_NONCE, String::new()));
                }
                let (nonce, realm) = match (
                    Nonce::get_from_as(&msg, ATTR_NONCE),
                    Realm::get_from_as(&msg, ATTR_REALM),
                ) {
                    (Ok(nonce), Ok(realm)) => (nonce, realm),
                    _ => {
                        self.events
                            .push_back(Event::AllocateError(id, error_response(&msg)));
                        return Ok(());
                    }
                };
                self.realm = realm;
                let integrity = self.long_term_integrity();
                self.authenticated_allocate(nonce, &integrity)
            }
            TransactionKind::AllocateRequest(nonce) => {
                if msg.typ.class == CLASS_ERROR_RESPONSE {
                    if error_code_of(&msg) == Some(CODE_STALE_NONCE) {
                        if let Ok(fresh) = Nonce::get_from_as(&msg, ATTR_NONCE) {
                            let integrity = self.long_term_integrity();
                            return self.authenticated_allocate(fresh, &integrity);
                        }
                    }
                    self.events
                        .push_back(Event::AllocateError(id, error_response(&msg)));
                    return Ok(());
                }
                self.install_allocation(msg, nonce)
            }
            _ => Ok(()),
        }
    }

    fn long_term_integrity(&self) -> MessageIntegrity {
        MessageIntegrity::new_long_term_integrity(
            self.username.text.clone(),
            self.realm.text.clone(),
            self.password.clone(),
        )
    }

    fn install_allocation(&mut self, msg: Message, nonce: Nonce) -> Result<()> {
        let id = msg.transaction_id;

        let mut relayed = RelayedAddress::default();
        if let Err(err) = relayed.get_from(&msg) {
            self.events.push_back(Event::AllocateError(id, err));
            return Ok(());
        }
        let relayed_addr = SocketAddr::from(relayed);

        let mut lifetime = Lifetime(DEFAULT_LIFETIME);
        if lifetime.get_from(&msg).is_err() {
            warn!("allocate response without lifetime, assuming {}", lifetime);
        }

        let mut mapped = XorMappedAddress::default();
        let mapped_addr = mapped
            .get_from(&msg)
            .ok()
            .map(|_| SocketAddr::new(mapped.ip, mapped.port));

        self.allocation = Some(Allocation::new(
            relayed_addr,
            mapped_addr,
            self.long_term_integrity(),
            nonce,
            lifetime.0,
            self.now,
        ));
        debug!("allocated {} on {}", relayed_addr, self.turn_serv_addr);
        self.events
            .push_back(Event::AllocateResponse(id, relayed_addr));
        Ok(())
    }

    fn handle_inbound(&mut self, data: &[u8], from: SocketAddr) -> Result<()> {
        if from != self.turn_serv_addr {
            trace!("dropping {} bytes from unknown source {}", data.len(), from);
            return Ok(());
        }

        if is_message(data) {
            self.handle_stun_message(data)
        } else if ChannelData::is_channel_data(data) {
            self.handle_channel_data(data)
        } else {
            Err(Error::ErrNonStunmessage)
        }
    }

    fn handle_stun_message(&mut self, data: &[u8]) -> Result<()> {
        let mut msg = Message::new();
        msg.write(data)?;

        if msg.typ.class == CLASS_REQUEST {
            return Err(Error::ErrUnexpectedStunrequestMessage);
        }

        if msg.typ.class == CLASS_INDICATION {
            if msg.typ.method == METHOD_DATA {
                let mut peer = PeerAddress::default();
                peer.get_from(&msg)?;
                let mut payload = Data::default();
                payload.get_from(&msg)?;

                trace!("data indication received from {}", peer);
                self.events.push_back(Event::DataIndicationOrChannelData(
                    None,
                    SocketAddr::from(peer),
                    BytesMut::from(&payload.0[..]),
                ));
            }
            return Ok(());
        }

        let Some(tr) = self.tr_map.remove(&msg.transaction_id) else {
            debug!("no transaction for {}", msg);
            return Ok(());
        };

        match tr.kind {
            TransactionKind::Binding => {
                let id = msg.transaction_id;
                if msg.typ.class == CLASS_ERROR_RESPONSE {
                    self.events
                        .push_back(Event::BindingError(id, error_response(&msg)));
                } else {
                    let mut refl = XorMappedAddress::default();
                    match refl.get_from(&msg) {
                        Ok(()) => self.events.push_back(Event::BindingResponse(
                            id,
                            SocketAddr::new(refl.ip, refl.port),
                        )),
                        Err(err) => self.events.push_back(Event::BindingError(id, err)),
                    }
                }
                Ok(())
            }
            kind @ (TransactionKind::AllocateAttempt | TransactionKind::AllocateRequest(_)) => {
                self.handle_allocate_response(msg, kind)
            }
            TransactionKind::Refresh(lifetime) => self.handle_refresh_response(msg, lifetime),
            TransactionKind::CreatePermission(peers) => {
                self.handle_create_permission_response(msg, peers)
            }
            TransactionKind::ChannelBind(peer, number) => {
                self.handle_channel_bind_response(msg, peer, number)
            }
        }
    }

    fn handle_channel_data(&mut self, data: &[u8]) -> Result<()> {
        let ch_data = ChannelData::decode(data)?;
        let peer = self
            .find_addr_by_channel_number(ch_data.number)
            .ok_or(Error::ErrChannelBindNotFound)?;

        trace!("channel data received from {} (ch={})", peer, ch_data.number);
        self.events.push_back(Event::DataIndicationOrChannelData(
            Some(ch_data.number),
            peer,
            BytesMut::from(&ch_data.data[..]),
        ));
        Ok(())
    }

    fn write_to(&mut self, data: &[u8], remote: SocketAddr) {
        self.transmits.push_back(TransportMessage {
            now: self.now,
            transport: TransportContext {
                local_addr: self.local_addr,
                peer_addr: remote,
                transport_protocol: self.transport_protocol,
                ecn: None,
            },
            message: BytesMut::from(data),
        });
    }

    fn perform_transaction(&mut self, msg: &Message, kind: TransactionKind) -> TransactionId {
        let to = self.turn_serv_addr;
        trace!("start {} transaction {:?} to {}", msg.typ, msg.transaction_id, to);

        self.tr_map.insert(Transaction::new(
            msg.transaction_id,
            kind,
            msg.raw.clone(),
            to,
            self.rto,
            self.is_reliable(),
            self.now,
        ));
        self.write_to(&msg.raw, to);
        msg.transaction_id
    }
}

impl sansio::Protocol<TaggedBytesMut, TaggedBytesMut, ()> for Client {
    type Rout = ();
    type Wout = TaggedBytesMut;
    type Eout = Event;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        self.now = msg.now;
        self.handle_inbound(&msg.message[..], msg.transport.peer_addr)
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    /// Relays application data to `msg.transport.peer_addr`.
    fn handle_write(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.closed {
            return Err(Error::ErrClosed);
        }
        self.now = msg.now;
        self.send_to(&msg.message[..], msg.transport.peer_addr)
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.transmits.pop_front()
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        self.now = now;
        for tick in self.tr_map.handle_timeout(now) {
            match tick {
                Tick::Retransmit(to, raw) => self.write_to(&raw, to),
                Tick::TimedOut(tr) => {
                    debug!("transaction {:?} timed out", tr.id);
                    if let TransactionKind::CreatePermission(peers) = &tr.kind {
                        if let Some(alloc) = self.allocation.as_mut() {
                            for peer in peers {
                                alloc.permissions.remove(&peer.ip());
                            }
                        }
                    }
                    self.events.push_back(Event::TransactionTimeout(tr.id));
                }
            }
        }
        if !self.closed {
            self.refresh_due(now)?;
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        let alloc = if self.closed {
            None
        } else {
            self.allocation.as_ref().map(|a| a.next_timeout())
        };
        match (self.tr_map.poll_timeout(), alloc) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Deletes the allocation with a zero-lifetime Refresh.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.tr_map.clear();
        if self.allocation.is_some() {
            self.refresh(Duration::ZERO)?;
        }
        self.closed = true;
        Ok(())
    }
}
