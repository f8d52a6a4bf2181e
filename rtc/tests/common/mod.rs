//! In-memory network and simulated clock shared by the end-to-end tests.
//!
//! Two peer connections exchange datagrams directly: whatever one side
//! hands out of `poll_write` is fed into the other side's `handle_read`
//! with the transport context reversed. Time only moves when the tests
//! move it, jumping to the earliest pending timeout of either side.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rtc::data_channel::{RTCDataChannelId, RTCDataChannelMessage};
use rtc::interceptor::{Interceptor, NoopInterceptor};
use rtc::peer_connection::RTCPeerConnection;
use rtc::peer_connection::configuration::RTCConfiguration;
use rtc::peer_connection::configuration::offer_answer_options::RTCOfferOptions;
use rtc::peer_connection::event::{RTCDataChannelEvent, RTCPeerConnectionEvent};
use rtc::peer_connection::message::RTCMessage;
use rtc::peer_connection::state::RTCPeerConnectionState;
use rtc::peer_connection::transport::{
    CandidateConfig, CandidateHostConfig, RTCIceCandidate, RTCIceCandidateInit,
};
use rtc::sansio::Protocol;
use rtc::shared::TaggedBytesMut;
use rtc::shared::error::{Error, Result};

pub const OFFERER_ADDR: &str = "10.0.0.1:5000";
pub const ANSWERER_ADDR: &str = "10.0.0.2:5000";

const MIN_STEP: Duration = Duration::from_millis(1);
const MAX_STEP: Duration = Duration::from_millis(20);
const MAX_ROUNDS: usize = 100_000;

pub fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

pub fn host_candidate(addr: &str) -> Result<RTCIceCandidateInit> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|err| Error::Other(format!("{addr}: {err}")))?;
    let candidate = CandidateHostConfig {
        base_config: CandidateConfig {
            network: "udp".to_owned(),
            address: addr.ip().to_string(),
            port: addr.port(),
            component: 1,
            ..Default::default()
        },
        ..Default::default()
    }
    .new_candidate_host()?;
    RTCIceCandidate::from(&candidate).to_json()
}

/// One side of the connection plus everything it surfaced so far.
pub struct Peer<I: Interceptor = NoopInterceptor> {
    pub name: &'static str,
    pub pc: RTCPeerConnection<I>,
    pub events: Vec<RTCPeerConnectionEvent>,
    pub messages: Vec<RTCMessage>,
    pub errors: Vec<Error>,
}

impl<I: Interceptor> Peer<I> {
    pub fn new(name: &'static str, config: RTCConfiguration<I>, addr: &str) -> Result<Self> {
        let mut pc = RTCPeerConnection::new(config)?;
        pc.add_local_candidate(host_candidate(addr)?)?;
        Ok(Self {
            name,
            pc,
            events: vec![],
            messages: vec![],
            errors: vec![],
        })
    }

    fn drain(&mut self) {
        while let Some(event) = self.pc.poll_event() {
            log::trace!("{}: {:?}", self.name, event);
            self.events.push(event);
        }
        while let Some(message) = self.pc.poll_read() {
            self.messages.push(message);
        }
    }

    fn record(&mut self, result: Result<()>) {
        if let Err(err) = result {
            log::warn!("{}: {}", self.name, err);
            self.errors.push(err);
        }
    }

    pub fn connection_states(&self) -> Vec<RTCPeerConnectionState> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RTCPeerConnectionEvent::OnConnectionStateChangeEvent(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        self.pc.connection_state() == RTCPeerConnectionState::Connected
    }

    pub fn opened_data_channels(&self) -> Vec<RTCDataChannelId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RTCPeerConnectionEvent::OnDataChannel(RTCDataChannelEvent::OnOpen(id)) => {
                    Some(*id)
                }
                _ => None,
            })
            .collect()
    }

    pub fn data_channel_messages(
        &self,
        id: RTCDataChannelId,
    ) -> impl Iterator<Item = &RTCDataChannelMessage> + '_ {
        self.messages.iter().filter_map(move |message| match message {
            RTCMessage::DataChannelMessage(channel, message) if *channel == id => Some(message),
            _ => None,
        })
    }

    pub fn rtp_packets(&self) -> impl Iterator<Item = &rtc::rtp::Packet> + '_ {
        self.messages.iter().filter_map(|message| match message {
            RTCMessage::RtpPacket(_, packet) => Some(packet),
            _ => None,
        })
    }
}

/// Runs one complete offer/answer exchange with the candidates inlined
/// in the descriptions.
pub fn negotiate<A, B>(
    offerer: &mut Peer<A>,
    answerer: &mut Peer<B>,
    options: Option<RTCOfferOptions>,
) -> Result<()>
where
    A: Interceptor,
    B: Interceptor,
{
    let offer = offerer.pc.create_offer(options)?;
    offerer.pc.set_local_description(offer.clone())?;
    answerer.pc.set_remote_description(offer)?;

    let answer = answerer.pc.create_answer(None)?;
    answerer.pc.set_local_description(answer.clone())?;
    offerer.pc.set_remote_description(answer)
}

fn deliver<I: Interceptor>(to: &mut Peer<I>, now: Instant, msg: TaggedBytesMut) {
    let result = to.pc.handle_read(TaggedBytesMut {
        now,
        transport: msg.transport.reversed(),
        message: msg.message,
    });
    to.record(result);
}

/// Fires due timers and moves datagrams until both sides are quiet.
pub fn pump<A, B>(a: &mut Peer<A>, b: &mut Peer<B>, now: Instant)
where
    A: Interceptor,
    B: Interceptor,
{
    let result = a.pc.handle_timeout(now);
    a.record(result);
    let result = b.pc.handle_timeout(now);
    b.record(result);

    for _ in 0..MAX_ROUNDS {
        a.drain();
        b.drain();

        let mut moved = false;
        while let Some(msg) = a.pc.poll_write() {
            moved = true;
            deliver(b, now, msg);
        }
        while let Some(msg) = b.pc.poll_write() {
            moved = true;
            deliver(a, now, msg);
        }
        if !moved {
            break;
        }
    }
}

/// Pumps and advances `now` until `done` holds or `limit` of simulated
/// time has passed. Returns whether `done` was reached.
pub fn run_until<A, B, F>(
    a: &mut Peer<A>,
    b: &mut Peer<B>,
    now: &mut Instant,
    limit: Duration,
    mut done: F,
) -> Result<bool>
where
    A: Interceptor,
    B: Interceptor,
    F: FnMut(&mut Peer<A>, &mut Peer<B>) -> Result<bool>,
{
    let deadline = *now + limit;
    loop {
        pump(a, b, *now);
        if done(a, b)? {
            return Ok(true);
        }
        if *now >= deadline {
            return Ok(false);
        }

        let cap = *now + MAX_STEP;
        let next = [a.pc.poll_timeout(), b.pc.poll_timeout()]
            .into_iter()
            .flatten()
            .min()
            .map_or(cap, |next| next.min(cap));
        *now = next.max(*now + MIN_STEP).min(deadline);
    }
}

/// Negotiates and runs until both sides report Connected.
pub fn connect<A, B>(offerer: &mut Peer<A>, answerer: &mut Peer<B>, now: &mut Instant) -> Result<()>
where
    A: Interceptor,
    B: Interceptor,
{
    negotiate(offerer, answerer, None)?;
    let connected = run_until(offerer, answerer, now, Duration::from_secs(10), |a, b| {
        Ok(a.is_connected() && b.is_connected())
    })?;
    if connected {
        Ok(())
    } else {
        Err(Error::Other(format!(
            "not connected: offerer {}, answerer {}",
            offerer.pc.connection_state(),
            answerer.pc.connection_state()
        )))
    }
}
