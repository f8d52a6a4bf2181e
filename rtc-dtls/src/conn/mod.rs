#[cfg(test)]
mod conn_test;

use std::collections::VecDeque;
use std::io::{BufReader, BufWriter};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use log::*;
use shared::crypto::KeyingMaterialExporter;
use shared::{error::*, replay_detector::*};

use crate::alert::*;
use crate::application_data::*;
use crate::config::*;
use crate::content::*;
use crate::curve::named_curve::NamedCurve;
use crate::extension::extension_use_srtp::*;
use crate::flight::flight0::*;
use crate::flight::flight1::*;
use crate::flight::flight5::*;
use crate::flight::flight6::*;
use crate::flight::*;
use crate::fragment_buffer::*;
use crate::handshake::handshake_cache::*;
use crate::handshake::handshake_header::*;
use crate::handshake::*;
use crate::handshaker::*;
use crate::record_layer::record_layer_header::*;
use crate::record_layer::*;
use crate::state::*;

pub(crate) const INITIAL_TICKER_INTERVAL: Duration = Duration::from_secs(1);
pub(crate) const COOKIE_LENGTH: usize = 20;
pub(crate) const DEFAULT_NAMED_CURVE: NamedCurve = NamedCurve::X25519;
// Default replay protection window is specified by RFC 6347 Section 4.1.2.6
pub(crate) const DEFAULT_REPLAY_PROTECTION_WINDOW: usize = 64;
// nonce (8) + GCM tag (16)
const RECORD_ENCRYPTION_OVERHEAD: usize = 24;

pub(crate) static INVALID_KEYING_LABELS: &[&str] = &[
    "client finished",
    "server finished",
    "master secret",
    "key expansion",
];

/// A single DTLS association driven without I/O: datagrams go in through
/// [`read_and_buffer`](DTLSConn::read_and_buffer) and come out of
/// [`outgoing_raw_packet`](DTLSConn::outgoing_raw_packet), time is advanced by the caller.
pub struct DTLSConn {
    is_client: bool,
    maximum_transmission_unit: usize,
    replay_protection_window: usize,
    replay_detector: Vec<Box<dyn ReplayDetector + Send>>,
    incoming_decrypted_packets: VecDeque<BytesMut>, // Decrypted Application Data, pull by calling `incoming_application_data`
    incoming_encrypted_packets: VecDeque<Vec<u8>>,
    fragment_buffer: FragmentBuffer,
    pub(crate) cache: HandshakeCache, // caching of handshake messages for verifyData generation
    outgoing_packets: VecDeque<Packet>,
    outgoing_queued_packets: VecDeque<Packet>,
    outgoing_compacted_raw_packets: VecDeque<BytesMut>,

    pub(crate) state: State, // Internal state

    handshake_completed: bool,
    closed: bool,

    pub(crate) current_handshake_state: HandshakeState,
    pub(crate) current_retransmit_timer: Option<Instant>,
    pub(crate) current_retransmit_interval: Duration,
    pub(crate) current_retransmit_count: usize,
    pub(crate) handshake_deadline: Option<Instant>,

    pub(crate) current_flight: Box<dyn Flight + Send + Sync>,
    pub(crate) flights: Option<Vec<Packet>>,
    pub(crate) cfg: Arc<HandshakeConfig>,
    pub(crate) retransmit: bool,
    pub(crate) handshake_rx: Option<()>,
}

impl DTLSConn {
    pub fn new(
        handshake_config: Arc<HandshakeConfig>,
        is_client: bool,
        initial_state: Option<State>,
    ) -> Self {
        let (state, flight, initial_fsm_state) = if let Some(state) = initial_state {
            let flight = if is_client {
                Box::new(Flight5 {}) as Box<dyn Flight + Send + Sync>
            } else {
                Box::new(Flight6 {}) as Box<dyn Flight + Send + Sync>
            };

            (state, flight, HandshakeState::Finished)
        } else {
            let flight = if is_client {
                Box::new(Flight1 {}) as Box<dyn Flight + Send + Sync>
            } else {
                Box::new(Flight0 {}) as Box<dyn Flight + Send + Sync>
            };

            (State::new(is_client), flight, HandshakeState::Preparing)
        };

        Self {
            is_client,
            maximum_transmission_unit: handshake_config.maximum_transmission_unit,
            replay_protection_window: handshake_config.replay_protection_window,
            replay_detector: vec![],
            incoming_decrypted_packets: VecDeque::new(),
            incoming_encrypted_packets: VecDeque::new(),
            fragment_buffer: FragmentBuffer::new(),
            outgoing_packets: VecDeque::new(),
            outgoing_queued_packets: VecDeque::new(),
            outgoing_compacted_raw_packets: VecDeque::new(),

            cache: HandshakeCache::new(),
            state,
            handshake_completed: false,
            closed: false,

            current_handshake_state: initial_fsm_state,
            current_retransmit_timer: None,
            current_retransmit_interval: handshake_config.retransmit_interval,
            current_retransmit_count: 0,
            handshake_deadline: None,

            current_flight: flight,
            flights: None,
            cfg: handshake_config,
            retransmit: false,
            handshake_rx: None,
        }
    }

    /// Drives the handshake as far as the buffered input allows. Records of the next
    /// epoch that were held back are replayed once the cipher suite is ready.
    pub fn handshake(&mut self, now: Instant) -> Result<()> {
        if self.handshake_deadline.is_none() && !self.is_handshake_completed() {
            self.handshake_deadline = Some(now + self.cfg.handshake_timeout);
        }

        loop {
            self.handshake_fsm(now)?;

            let cipher_ready = self
                .state
                .cipher_suite
                .as_ref()
                .is_some_and(|cs| cs.is_initialized());
            if !cipher_ready || self.incoming_encrypted_packets.is_empty() {
                return Ok(());
            }

            let queued = self.incoming_encrypted_packets.len();
            self.handle_incoming_queued_packets()?;
            if self.handshake_rx.is_none() && self.incoming_encrypted_packets.len() >= queued {
                return Ok(());
            }
        }
    }

    /// Decrypted application data, available once the handshake completed.
    pub fn incoming_application_data(&mut self) -> Option<BytesMut> {
        if !self.is_handshake_completed() {
            None
        } else {
            self.incoming_decrypted_packets.pop_front()
        }
    }

    pub fn outgoing_raw_packet(&mut self) -> Option<BytesMut> {
        if let Err(err) = self.handle_outgoing_packets() {
            warn!(
                "handle_outgoing_packets [{}] with error {}",
                srv_cli_str(self.is_client),
                err
            );
        }
        self.outgoing_compacted_raw_packets.pop_front()
    }

    /// Queues `p` as application data. Data written before the handshake completes is
    /// held back and flushed with the first flight after completion.
    pub fn write(&mut self, p: &[u8]) -> Result<()> {
        if self.is_connection_closed() {
            return Err(Error::ErrConnClosed);
        }

        let pkt = Packet {
            record: RecordLayer::new(
                PROTOCOL_VERSION1_2,
                self.get_local_epoch(),
                Content::ApplicationData(ApplicationData {
                    data: BytesMut::from(p),
                }),
            ),
            should_encrypt: true,
        };

        if self.is_handshake_completed() {
            self.write_packets(vec![pkt]);
        } else {
            self.outgoing_queued_packets.push_back(pkt);
        }

        Ok(())
    }

    /// Sends close_notify once; later calls are no-ops.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.notify(AlertLevel::Warning, AlertDescription::CloseNotify);
        }
    }

    /// connection_state returns basic DTLS details about the connection.
    pub fn connection_state(&self) -> &State {
        &self.state
    }

    pub fn selected_srtp_protection_profile(&self) -> SrtpProtectionProfile {
        self.state.srtp_protection_profile
    }

    /// Derives keying material as described in RFC 5705.
    pub fn export_keying_material(
        &self,
        label: &str,
        context: &[u8],
        length: usize,
    ) -> Result<Vec<u8>> {
        if !self.is_handshake_completed() {
            return Err(Error::HandshakeInProgress);
        }
        self.state.export_keying_material(label, context, length)
    }

    /// Earliest instant at which [`handle_timeout`](DTLSConn::handle_timeout) has work to do.
    pub fn poll_timeout(&self) -> Option<Instant> {
        if self.is_handshake_completed() || self.current_handshake_state == HandshakeState::Errored
        {
            return None;
        }
        match (self.current_retransmit_timer, self.handshake_deadline) {
            (Some(timer), Some(deadline)) => Some(timer.min(deadline)),
            (timer, deadline) => timer.or(deadline),
        }
    }

    pub fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if self.is_handshake_completed() {
            return Ok(());
        }

        if let Some(deadline) = self.handshake_deadline {
            if now >= deadline {
                warn!(
                    "[handshake:{}] {} timed out",
                    srv_cli_str(self.is_client),
                    self.current_flight
                );
                self.current_handshake_state = HandshakeState::Errored;
                self.current_retransmit_timer = None;
                return Err(Error::ErrHandshakeTimeout);
            }
        }

        if let Some(timer) = self.current_retransmit_timer {
            if now >= timer {
                self.current_retransmit_timer = None;
                self.handshake_timeout(now)?;
            }
        }

        Ok(())
    }

    pub(crate) fn notify(&mut self, level: AlertLevel, desc: AlertDescription) {
        self.write_packets(vec![Packet {
            record: RecordLayer::new(
                PROTOCOL_VERSION1_2,
                self.get_local_epoch(),
                Content::Alert(Alert {
                    alert_level: level,
                    alert_description: desc,
                }),
            ),
            should_encrypt: self.get_local_epoch() != 0,
        }]);
    }

    pub(crate) fn write_packets(&mut self, pkts: Vec<Packet>) {
        for pkt in pkts {
            self.outgoing_packets.push_back(pkt);
        }
    }

    fn handle_outgoing_packets(&mut self) -> Result<()> {
        if self.is_handshake_completed() {
            while let Some(mut pkt) = self.outgoing_queued_packets.pop_front() {
                pkt.record.record_layer_header.epoch = self.get_local_epoch();
                self.write_packets(vec![pkt]);
            }
        }

        let mut raw_packets = vec![];
        while let Some(p) = self.outgoing_packets.pop_front() {
            if let Content::Handshake(h) = &p.record.content {
                debug!(
                    "Send [handshake:{}] -> {} (epoch: {}, seq: {})",
                    srv_cli_str(self.is_client),
                    h.handshake_header.handshake_type.to_string(),
                    p.record.record_layer_header.epoch,
                    h.handshake_header.message_sequence
                );

                let raw_handshake_packets = self.process_handshake_packet(&p, h)?;
                raw_packets.extend(raw_handshake_packets);
            } else {
                let raw_packet = self.process_packet(p)?;
                raw_packets.push(raw_packet);
            }
        }

        if !raw_packets.is_empty() {
            let compacted_raw_packets =
                compact_raw_packets(&raw_packets, self.maximum_transmission_unit);

            self.outgoing_compacted_raw_packets
                .extend(compacted_raw_packets);
        }

        Ok(())
    }

    fn next_sequence_number(&mut self, epoch: usize) -> Result<u64> {
        while self.state.local_sequence_number.len() <= epoch {
            self.state.local_sequence_number.push(0);
        }

        let seq = self.state.local_sequence_number[epoch];
        if seq > MAX_SEQUENCE_NUMBER {
            // RFC 6347 Section 4.1.0
            // The implementation must either abandon an association or rehandshake
            // prior to allowing the sequence number to wrap.
            return Err(Error::ErrSequenceNumberOverflow);
        }
        self.state.local_sequence_number[epoch] += 1;

        Ok(seq)
    }

    fn process_packet(&mut self, mut p: Packet) -> Result<Vec<u8>> {
        let epoch = p.record.record_layer_header.epoch as usize;
        p.record.record_layer_header.sequence_number = self.next_sequence_number(epoch)?;
        p.record.record_layer_header.content_len = p.record.content.size() as u16;

        let mut raw_packet = vec![];
        {
            let mut writer = BufWriter::<&mut Vec<u8>>::new(raw_packet.as_mut());
            p.record.marshal(&mut writer)?;
        }

        if p.should_encrypt {
            raw_packet = self.encrypt(&p.record.record_layer_header, raw_packet)?;
        }

        Ok(raw_packet)
    }

    fn process_handshake_packet(&mut self, p: &Packet, h: &Handshake) -> Result<Vec<Vec<u8>>> {
        let mut raw_packets = vec![];

        let overhead = RECORD_LAYER_HEADER_SIZE
            + HANDSHAKE_HEADER_LENGTH
            + if p.should_encrypt {
                RECORD_ENCRYPTION_OVERHEAD
            } else {
                0
            };
        let fragment_len = self.maximum_transmission_unit.saturating_sub(overhead).max(1);
        let handshake_fragments = fragment_handshake(fragment_len, h)?;

        let epoch = p.record.record_layer_header.epoch;

        for handshake_fragment in &handshake_fragments {
            let record_layer_header = RecordLayerHeader {
                protocol_version: p.record.record_layer_header.protocol_version,
                content_type: p.record.record_layer_header.content_type,
                content_len: handshake_fragment.len() as u16,
                epoch,
                sequence_number: self.next_sequence_number(epoch as usize)?,
            };

            let mut raw_packet = vec![];
            {
                let mut writer = BufWriter::<&mut Vec<u8>>::new(raw_packet.as_mut());
                record_layer_header.marshal(&mut writer)?;
            }
            raw_packet.extend_from_slice(handshake_fragment);

            if p.should_encrypt {
                raw_packet = self.encrypt(&record_layer_header, raw_packet)?;
            }

            raw_packets.push(raw_packet);
        }

        Ok(raw_packets)
    }

    fn encrypt(&self, header: &RecordLayerHeader, raw_packet: Vec<u8>) -> Result<Vec<u8>> {
        match &self.state.cipher_suite {
            Some(cipher_suite) if cipher_suite.is_initialized() => {
                cipher_suite.encrypt(header, &raw_packet)
            }
            _ => Err(Error::CipherSuiteUnset),
        }
    }

    pub(crate) fn set_handshake_completed(&mut self) {
        self.handshake_completed = true;
        self.handshake_deadline = None;
        self.current_retransmit_timer = None;
    }

    pub fn is_handshake_completed(&self) -> bool {
        self.handshake_completed
    }

    /// Unpacks a datagram and buffers what it carries: handshake messages go to the
    /// handshake cache, application data to the read queue, records of a future epoch
    /// are held until they can be decrypted.
    pub fn read_and_buffer(&mut self, buf: &[u8]) -> Result<()> {
        for pkt in unpack_datagram(buf)? {
            self.handle_incoming(pkt, true)?;
        }

        Ok(())
    }

    pub(crate) fn handle_incoming_queued_packets(&mut self) -> Result<()> {
        let queued: Vec<Vec<u8>> = self.incoming_encrypted_packets.drain(..).collect();
        for p in queued {
            self.handle_incoming(p, true)?;
        }

        Ok(())
    }

    fn handle_incoming(&mut self, pkt: Vec<u8>, enqueue: bool) -> Result<()> {
        let (hs, alert, err) = self.handle_incoming_packet(pkt, enqueue);
        if let Some(alert) = alert {
            self.notify(alert.alert_level, alert.alert_description);

            if alert.alert_level == AlertLevel::Fatal {
                self.current_handshake_state = HandshakeState::Errored;
                self.current_retransmit_timer = None;
                return Err(err.unwrap_or(Error::ErrAlertFatalOrClose));
            }
        }

        if let Some(err) = err {
            return Err(err);
        }

        if hs {
            self.handshake_rx = Some(());
        }

        Ok(())
    }

    fn handle_incoming_packet(
        &mut self,
        mut pkt: Vec<u8>,
        enqueue: bool,
    ) -> (bool, Option<Alert>, Option<Error>) {
        let mut reader = BufReader::new(pkt.as_slice());
        let h = match RecordLayerHeader::unmarshal(&mut reader) {
            Ok(h) => h,
            Err(err) => {
                // Decode error must be silently discarded
                // [RFC6347 Section-4.1.2.7]
                debug!(
                    "{}: discarded broken packet: {}",
                    srv_cli_str(self.is_client),
                    err
                );
                return (false, None, None);
            }
        };

        // Validate epoch
        let epoch = self.state.remote_epoch;
        if h.epoch > epoch {
            if h.epoch > epoch + 1 {
                debug!(
                    "{}: discarded future packet (epoch: {}, seq: {})",
                    srv_cli_str(self.is_client),
                    h.epoch,
                    h.sequence_number,
                );
                return (false, None, None);
            }
            if enqueue {
                debug!(
                    "{}: received packet of next epoch, queuing packet",
                    srv_cli_str(self.is_client)
                );
                self.incoming_encrypted_packets.push_back(pkt);
            }
            return (false, None, None);
        }

        // Anti-replay protection
        while self.replay_detector.len() <= h.epoch as usize {
            self.replay_detector
                .push(Box::new(SlidingWindowDetector::new(
                    self.replay_protection_window,
                    MAX_SEQUENCE_NUMBER,
                )));
        }

        let ok = self.replay_detector[h.epoch as usize].check(h.sequence_number);
        if !ok {
            debug!(
                "{}: discarded duplicated packet (epoch: {}, seq: {})",
                srv_cli_str(self.is_client),
                h.epoch,
                h.sequence_number,
            );
            return (false, None, None);
        }

        // Decrypt
        if h.epoch != 0 {
            let cipher_suite = match &self.state.cipher_suite {
                Some(cipher_suite) if cipher_suite.is_initialized() => cipher_suite,
                _ => {
                    if enqueue {
                        debug!(
                            "{}: handshake not finished, queuing packet",
                            srv_cli_str(self.is_client)
                        );
                        self.incoming_encrypted_packets.push_back(pkt);
                    }
                    return (false, None, None);
                }
            };

            pkt = match cipher_suite.decrypt(&pkt) {
                Ok(pkt) => pkt,
                Err(err) => {
                    debug!("{}: decrypt failed: {}", srv_cli_str(self.is_client), err);
                    return (false, None, None);
                }
            };
        }

        let (is_handshake, is_retransmit) = match self.fragment_buffer.push(&pkt) {
            Ok(result) => result,
            Err(err) => {
                // Decode error must be silently discarded
                // [RFC6347 Section-4.1.2.7]
                debug!(
                    "{}: defragment failed: {}",
                    srv_cli_str(self.is_client),
                    err
                );
                return (false, None, None);
            }
        };
        if is_handshake {
            self.replay_detector[h.epoch as usize].accept();
            let mut received = is_retransmit;
            while let Some((out, epoch)) = self.fragment_buffer.pop() {
                let mut reader = BufReader::new(out.as_slice());
                let raw_handshake = match Handshake::unmarshal(&mut reader) {
                    Ok(rh) => {
                        debug!(
                            "Recv [handshake:{}] -> {} (epoch: {}, seq: {})",
                            srv_cli_str(self.is_client),
                            rh.handshake_header.handshake_type.to_string(),
                            h.epoch,
                            rh.handshake_header.message_sequence
                        );
                        rh
                    }
                    Err(err) => {
                        debug!(
                            "{}: handshake parse failed: {}",
                            srv_cli_str(self.is_client),
                            err
                        );
                        continue;
                    }
                };

                self.cache.push(
                    out,
                    epoch,
                    raw_handshake.handshake_header.message_sequence,
                    raw_handshake.handshake_header.handshake_type,
                    !self.is_client,
                );
                received = true;
            }

            return (received, None, None);
        }

        let mut reader = BufReader::new(pkt.as_slice());
        let r = match RecordLayer::unmarshal(&mut reader) {
            Ok(r) => r,
            Err(err) => {
                return (
                    false,
                    Some(Alert {
                        alert_level: AlertLevel::Fatal,
                        alert_description: AlertDescription::DecodeError,
                    }),
                    Some(err),
                );
            }
        };

        match r.content {
            Content::Alert(a) => {
                debug!("{}: <- {}", srv_cli_str(self.is_client), a);
                self.replay_detector[h.epoch as usize].accept();
                if a.alert_description == AlertDescription::CloseNotify {
                    // Respond with a close_notify [RFC5246 Section 7.2.1]
                    if !self.closed {
                        self.close();
                    }
                    return (false, None, None);
                }
                if a.alert_level == AlertLevel::Fatal {
                    self.closed = true;
                    self.current_handshake_state = HandshakeState::Errored;
                    self.current_retransmit_timer = None;
                    return (false, None, Some(Error::ErrAlertFatalOrClose));
                }
            }
            Content::ChangeCipherSpec(_) => {
                let cipher_ready = self
                    .state
                    .cipher_suite
                    .as_ref()
                    .is_some_and(|cs| cs.is_initialized());

                if !cipher_ready {
                    if enqueue {
                        debug!(
                            "{}: CipherSuite not initialized, queuing packet",
                            srv_cli_str(self.is_client)
                        );
                        self.incoming_encrypted_packets.push_back(pkt);
                    }
                    return (false, None, None);
                }

                let new_remote_epoch = h.epoch + 1;
                debug!(
                    "{}: <- ChangeCipherSpec (epoch: {})",
                    srv_cli_str(self.is_client),
                    new_remote_epoch
                );

                if epoch + 1 == new_remote_epoch {
                    self.state.remote_epoch = new_remote_epoch;
                    self.replay_detector[h.epoch as usize].accept();
                }
            }
            Content::ApplicationData(a) => {
                if h.epoch == 0 {
                    warn!(
                        "{}: <- Unexpected ApplicationData Message",
                        srv_cli_str(self.is_client),
                    );
                    return (
                        false,
                        Some(Alert {
                            alert_level: AlertLevel::Fatal,
                            alert_description: AlertDescription::UnexpectedMessage,
                        }),
                        Some(Error::ErrApplicationDataEpochZero),
                    );
                }

                self.replay_detector[h.epoch as usize].accept();

                self.incoming_decrypted_packets.push_back(a.data);
            }
            Content::Handshake(_) => {
                warn!(
                    "{}: <- Unexpected Handshake Message",
                    srv_cli_str(self.is_client),
                );
                return (
                    false,
                    Some(Alert {
                        alert_level: AlertLevel::Fatal,
                        alert_description: AlertDescription::UnexpectedMessage,
                    }),
                    Some(Error::ErrUnhandledContextType),
                );
            }
        };

        (false, None, None)
    }

    pub fn is_connection_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn set_local_epoch(&mut self, epoch: u16) {
        self.state.local_epoch = epoch;
    }

    pub(crate) fn get_local_epoch(&self) -> u16 {
        self.state.local_epoch
    }
}

fn fragment_handshake(fragment_len: usize, h: &Handshake) -> Result<Vec<Vec<u8>>> {
    let mut content = vec![];
    {
        let mut writer = BufWriter::<&mut Vec<u8>>::new(content.as_mut());
        h.handshake_message.marshal(&mut writer)?;
    }

    let mut fragmented_handshakes = vec![];

    let mut content_fragments = split_bytes(&content, fragment_len);
    if content_fragments.is_empty() {
        content_fragments = vec![vec![]];
    }

    let mut offset = 0;
    for content_fragment in &content_fragments {
        let content_fragment_len = content_fragment.len();

        let handshake_header_fragment = HandshakeHeader {
            handshake_type: h.handshake_header.handshake_type,
            length: h.handshake_header.length,
            message_sequence: h.handshake_header.message_sequence,
            fragment_offset: offset as u32,
            fragment_length: content_fragment_len as u32,
        };

        offset += content_fragment_len;

        let mut fragmented_handshake = vec![];
        {
            let mut writer = BufWriter::<&mut Vec<u8>>::new(fragmented_handshake.as_mut());
            handshake_header_fragment.marshal(&mut writer)?;
        }
        fragmented_handshake.extend_from_slice(content_fragment);

        fragmented_handshakes.push(fragmented_handshake);
    }

    Ok(fragmented_handshakes)
}

fn compact_raw_packets(raw_packets: &[Vec<u8>], maximum_transmission_unit: usize) -> Vec<BytesMut> {
    let mut combined_raw_packets = vec![];
    let mut current_combined_raw_packet = BytesMut::new();

    for raw_packet in raw_packets {
        if !current_combined_raw_packet.is_empty()
            && current_combined_raw_packet.len() + raw_packet.len() > maximum_transmission_unit
        {
            combined_raw_packets.push(current_combined_raw_packet);
            current_combined_raw_packet = BytesMut::new();
        }
        current_combined_raw_packet.extend_from_slice(raw_packet);
    }

    if !current_combined_raw_packet.is_empty() {
        combined_raw_packets.push(current_combined_raw_packet);
    }

    combined_raw_packets
}

fn split_bytes(bytes: &[u8], split_len: usize) -> Vec<Vec<u8>> {
    bytes.chunks(split_len).map(|c| c.to_vec()).collect()
}
