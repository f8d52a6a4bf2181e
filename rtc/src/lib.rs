//! # RTC - Sans-I/O WebRTC Implementation
//!
//! A Rust implementation of the [WebRTC specification](https://www.w3.org/TR/webrtc/) using a
//! **sans-I/O architecture**. The peer connection negotiates sessions with SDP offers and
//! answers, establishes ICE, secures the path with DTLS, and carries data channels over SCTP
//! and media over SRTP, while you keep full control over sockets, threads and time.
//!
//! ## What is Sans-I/O?
//!
//! Sans-I/O (without I/O) is a design pattern that separates protocol logic from I/O operations.
//! Instead of the library performing network reads and writes directly, **you** provide the
//! network data and handle the output. This gives you:
//!
//! - **Runtime Independence**: Works with tokio, async-std, smol, or blocking I/O
//! - **Deterministic Time**: Timers only fire when you call `handle_timeout`
//! - **Testability**: Two peer connections can be wired together in memory
//!
//! ## Quick Start
//!
//! ```no_run
//! use rtc::peer_connection::RTCPeerConnection;
//! use rtc::peer_connection::configuration::RTCConfigurationBuilder;
//! use rtc::peer_connection::sdp::RTCSessionDescription;
//! use rtc::peer_connection::transport::{CandidateConfig, CandidateHostConfig, RTCIceCandidate};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pc = RTCPeerConnection::new(RTCConfigurationBuilder::new().build())?;
//!
//! // 1. Announce the socket the application owns
//! let candidate = CandidateHostConfig {
//!     base_config: CandidateConfig {
//!         network: "udp".to_owned(),
//!         address: "192.168.1.100".to_string(),
//!         port: 8080,
//!         component: 1,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! }
//! .new_candidate_host()?;
//! pc.add_local_candidate(RTCIceCandidate::from(&candidate).to_json()?)?;
//!
//! // 2. Open a data channel and create an offer
//! pc.create_data_channel("chat", None)?;
//! let offer = pc.create_offer(None)?;
//! pc.set_local_description(offer)?;
//!
//! // 3. Apply the answer received over your signaling channel
//! # let answer_sdp = String::new();
//! pc.set_remote_description(RTCSessionDescription::answer(answer_sdp)?)?;
//!
//! // 4. Drive the event loop, see below
//! # Ok(())
//! # }
//! ```
//!
//! ## Event Loop
//!
//! ```no_run
//! use rtc::peer_connection::RTCPeerConnection;
//! use rtc::peer_connection::event::{RTCDataChannelEvent, RTCPeerConnectionEvent};
//! use rtc::peer_connection::message::RTCMessage;
//! use rtc::peer_connection::state::RTCPeerConnectionState;
//! use rtc::shared::{TaggedBytesMut, TransportContext, TransportProtocol};
//! use rtc::sansio::Protocol;
//! use bytes::BytesMut;
//! use std::net::UdpSocket;
//! use std::time::{Duration, Instant};
//!
//! # fn run(mut pc: RTCPeerConnection) -> Result<(), Box<dyn std::error::Error>> {
//! let socket = UdpSocket::bind("0.0.0.0:8080")?;
//! let local_addr = socket.local_addr()?;
//! let mut buf = vec![0u8; 2000];
//!
//! loop {
//!     // outgoing datagrams
//!     while let Some(msg) = pc.poll_write() {
//!         socket.send_to(&msg.message, msg.transport.peer_addr)?;
//!     }
//!
//!     // state changes and notifications
//!     while let Some(event) = pc.poll_event() {
//!         match event {
//!             RTCPeerConnectionEvent::OnConnectionStateChangeEvent(state) => {
//!                 println!("connection state: {state}");
//!                 if state == RTCPeerConnectionState::Failed {
//!                     return Ok(());
//!                 }
//!             }
//!             RTCPeerConnectionEvent::OnDataChannel(RTCDataChannelEvent::OnOpen(id)) => {
//!                 if let Some(mut dc) = pc.data_channel(id) {
//!                     dc.send_text("hello")?;
//!                 }
//!             }
//!             RTCPeerConnectionEvent::OnTrack(track) => {
//!                 println!("remote track {} on {:?}", track.track_id, track.receiver_id);
//!             }
//!             _ => {}
//!         }
//!     }
//!
//!     // application messages
//!     while let Some(message) = pc.poll_read() {
//!         match message {
//!             RTCMessage::RtpPacket(track_id, packet) => {
//!                 println!("{track_id}: rtp seq {}", packet.header.sequence_number);
//!             }
//!             RTCMessage::RtcpPacket(track_id, packets) => {
//!                 println!("{track_id}: {} rtcp packets", packets.len());
//!             }
//!             RTCMessage::DataChannelMessage(id, message) => {
//!                 println!("channel {id}: {} bytes", message.data.len());
//!             }
//!         }
//!     }
//!
//!     // wait for a datagram or the next timer
//!     let now = Instant::now();
//!     let deadline = pc.poll_timeout().unwrap_or(now + Duration::from_secs(1));
//!     let delay = deadline.saturating_duration_since(now);
//!     if delay.is_zero() {
//!         pc.handle_timeout(now)?;
//!         continue;
//!     }
//!     socket.set_read_timeout(Some(delay))?;
//!     match socket.recv_from(&mut buf) {
//!         Ok((n, peer_addr)) => pc.handle_read(TaggedBytesMut {
//!             now: Instant::now(),
//!             transport: TransportContext {
//!                 local_addr,
//!                 peer_addr,
//!                 ecn: None,
//!                 transport_protocol: TransportProtocol::UDP,
//!             },
//!             message: BytesMut::from(&buf[..n]),
//!         })?,
//!         Err(_) => pc.handle_timeout(Instant::now())?,
//!     }
//! }
//! # }
//! ```
//!
//! The six core methods come from [`sansio::Protocol`]:
//!
//! 1. **`poll_write()`** - Datagrams to send
//! 2. **`poll_event()`** - State changes, data channel and track events
//! 3. **`poll_read()`** - Incoming RTP, RTCP and data channel messages
//! 4. **`poll_timeout()`** - Next deadline of ICE, DTLS, SCTP or the interceptors
//! 5. **`handle_read()`** - Feed a received datagram
//! 6. **`handle_timeout()`** - Advance time
//!
//! **`handle_write()`** queues an application message; the sender and data channel
//! handles call it for you.
//!
//! ## Media
//!
//! ```no_run
//! use rtc::peer_connection::RTCPeerConnection;
//! use rtc::peer_connection::configuration::RTCConfigurationBuilder;
//! use rtc::peer_connection::configuration::interceptor_registry::register_default_interceptors;
//! use rtc::peer_connection::configuration::media_engine::{MediaEngine, MIME_TYPE_OPUS};
//! use rtc::media_stream::Sample;
//! use rtc::media_stream::track::MediaStreamTrack;
//! use rtc::rtp_transceiver::rtp_sender::{RTCRtpCodec, RtpCodecKind};
//! use rtc::interceptor::Registry;
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut media_engine = MediaEngine::default();
//! media_engine.register_default_codecs()?;
//! let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
//!
//! let config = RTCConfigurationBuilder::new()
//!     .with_media_engine(media_engine)
//!     .with_interceptor_registry(registry)
//!     .build();
//! let mut pc = RTCPeerConnection::new(config)?;
//!
//! let track = MediaStreamTrack::new(
//!     "stream".to_owned(),
//!     "audio".to_owned(),
//!     "microphone".to_owned(),
//!     RtpCodecKind::Audio,
//!     RTCRtpCodec {
//!         mime_type: MIME_TYPE_OPUS.to_owned(),
//!         clock_rate: 48000,
//!         channels: 2,
//!         ..Default::default()
//!     },
//! );
//! let sender_id = pc.add_track(track)?;
//!
//! // once negotiated and connected
//! if let Some(mut sender) = pc.rtp_sender(sender_id) {
//!     sender.write_sample(&Sample {
//!         data: Bytes::from_static(&[0u8; 80]),
//!         duration: Duration::from_millis(20),
//!         ..Default::default()
//!     })?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - **[`peer_connection`]** - [`RTCPeerConnection`](peer_connection::RTCPeerConnection),
//!   its configuration, events, messages, SDP and state types
//! - **[`data_channel`]** - [`RTCDataChannel`](data_channel::RTCDataChannel) handles and
//!   [`RTCDataChannelInit`](data_channel::RTCDataChannelInit)
//! - **[`rtp_transceiver`]** - transceivers,
//!   [`RTCRtpSender`](rtp_transceiver::rtp_sender::RTCRtpSender) and
//!   [`RTCRtpReceiver`](rtp_transceiver::rtp_receiver::RTCRtpReceiver)
//! - **[`media_stream`]** - [`MediaStreamTrack`](media_stream::track::MediaStreamTrack) and
//!   [`Sample`](media_stream::Sample)
//!
//! The protocol crates the peer connection is built from are re-exported:
//! [`ice`], [`stun`], [`turn`], [`dtls`], [`srtp`], [`sctp`], [`datachannel`], [`rtp`],
//! [`rtcp`], [`sdp`], [`interceptor`] and [`shared`].
//!
//! ## Specification Compliance
//!
//! - [W3C WebRTC 1.0] - Main WebRTC API specification
//! - [RFC 8829] - JSEP: JavaScript Session Establishment Protocol
//! - [RFC 8866] - SDP: Session Description Protocol
//! - [RFC 8445] - ICE: Interactive Connectivity Establishment
//! - [RFC 6347] - DTLS: Datagram Transport Layer Security
//! - [RFC 8831] - WebRTC Data Channels
//! - [RFC 3550] - RTP: Real-time Transport Protocol
//!
//! [W3C WebRTC 1.0]: https://www.w3.org/TR/webrtc/
//! [RFC 8829]: https://datatracker.ietf.org/doc/html/rfc8829
//! [RFC 8866]: https://datatracker.ietf.org/doc/html/rfc8866
//! [RFC 8445]: https://datatracker.ietf.org/doc/html/rfc8445
//! [RFC 6347]: https://datatracker.ietf.org/doc/html/rfc6347
//! [RFC 8831]: https://datatracker.ietf.org/doc/html/rfc8831
//! [RFC 3550]: https://datatracker.ietf.org/doc/html/rfc3550

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/webrtc-rs/webrtc-rs.github.io/master/res/rtc.png"
)]
#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub use {
    datachannel, dtls, ice, interceptor, rtcp, rtp, sansio, sctp, sdp, shared, srtp, stun, turn,
};

pub mod data_channel;
pub mod media_stream;
pub mod peer_connection;
pub mod rtp_transceiver;
