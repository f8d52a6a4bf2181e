pub(crate) mod flight0;
pub(crate) mod flight1;
pub(crate) mod flight2;
pub(crate) mod flight3;
pub(crate) mod flight4;
pub(crate) mod flight5;
pub(crate) mod flight6;

use std::fmt;

use shared::error::Error;
use subtle::ConstantTimeEq;

use crate::alert::*;
use crate::config::*;
use crate::handshake::handshake_cache::*;
use crate::handshake::*;
use crate::content::*;
use crate::record_layer::record_layer_header::*;
use crate::record_layer::*;
use crate::state::*;

/*
  DTLS messages are grouped into a series of message flights, according
  to the diagrams below.  Although each flight of messages may consist
  of a number of messages, they should be viewed as monolithic for the
  purpose of timeout and retransmission.
  https://tools.ietf.org/html/rfc4347#section-4.2.4
  Client                                          Server
  ------                                          ------
                                      Waiting                 Flight 0

  ClientHello             -------->                           Flight 1

                          <-------    HelloVerifyRequest      Flight 2

  ClientHello              -------->                           Flight 3

                                             ServerHello    \
                                            Certificate*     \
                                      ServerKeyExchange*      Flight 4
                                     CertificateRequest*     /
                          <--------      ServerHelloDone    /

  Certificate*                                              \
  ClientKeyExchange                                          \
  CertificateVerify*                                          Flight 5
  [ChangeCipherSpec]                                         /
  Finished                -------->                         /

                                      [ChangeCipherSpec]    \ Flight 6
                          <--------             Finished    /

*/

#[derive(Clone, Debug)]
pub(crate) struct Packet {
    pub(crate) record: RecordLayer,
    pub(crate) should_encrypt: bool,
}

pub(crate) trait Flight: fmt::Display + fmt::Debug {
    fn is_last_send_flight(&self) -> bool {
        false
    }

    fn is_last_recv_flight(&self) -> bool {
        false
    }

    fn has_retransmit(&self) -> bool {
        true
    }

    /// Consumes the peer's next flight from the cache. `Err((None, None))` means
    /// the flight has not fully arrived yet.
    fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Box<dyn Flight + Send + Sync>, (Option<Alert>, Option<Error>)>;

    fn generate(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Vec<Packet>, (Option<Alert>, Option<Error>)>;
}

pub(crate) fn fatal(alert_description: AlertDescription) -> Option<Alert> {
    Some(Alert {
        alert_level: AlertLevel::Fatal,
        alert_description,
    })
}

/// Serializes the handshake messages of `pkts` with the message sequence numbers
/// they will be sent with, for transcripts that include messages not yet cached.
pub(crate) fn marshal_with_predicted_sequence(
    pkts: &mut [Packet],
    mut sequence: u16,
) -> shared::error::Result<Vec<u8>> {
    let mut merged = vec![];
    for p in pkts {
        if let Content::Handshake(h) = &mut p.record.content {
            h.handshake_header.message_sequence = sequence;
            sequence += 1;
            merged.extend_from_slice(&h.marshal_to_vec()?);
        }
    }
    Ok(merged)
}

pub(crate) fn pull_rule(
    typ: HandshakeType,
    epoch: u16,
    is_client: bool,
    optional: bool,
) -> HandshakeCachePullRule {
    HandshakeCachePullRule {
        typ,
        epoch,
        is_client,
        optional,
    }
}

/// Handshake messages covered by the CertificateVerify signature.
pub(crate) fn certificate_verify_transcript(epoch: u16) -> Vec<HandshakeCachePullRule> {
    vec![
        pull_rule(HandshakeType::ClientHello, epoch, true, false),
        pull_rule(HandshakeType::ServerHello, epoch, false, false),
        pull_rule(HandshakeType::Certificate, epoch, false, false),
        pull_rule(HandshakeType::ServerKeyExchange, epoch, false, false),
        pull_rule(HandshakeType::CertificateRequest, epoch, false, false),
        pull_rule(HandshakeType::ServerHelloDone, epoch, false, false),
        pull_rule(HandshakeType::Certificate, epoch, true, false),
        pull_rule(HandshakeType::ClientKeyExchange, epoch, true, false),
    ]
}

/// Handshake messages covered by the client's Finished verify_data.
pub(crate) fn client_finished_transcript(epoch: u16) -> Vec<HandshakeCachePullRule> {
    let mut rules = certificate_verify_transcript(epoch);
    rules.push(pull_rule(HandshakeType::CertificateVerify, epoch, true, false));
    rules
}

/// Handshake messages covered by the server's Finished verify_data.
pub(crate) fn server_finished_transcript(epoch: u16) -> Vec<HandshakeCachePullRule> {
    let mut rules = client_finished_transcript(epoch);
    rules.push(pull_rule(HandshakeType::Finished, epoch + 1, true, false));
    rules
}

/// Constant-time comparison for cookies and Finished verify_data.
pub(crate) fn bytes_eq(a: &[u8], b: &[u8]) -> bool {
    bool::from(a.ct_eq(b))
}

pub(crate) fn handshake_packet(epoch: u16, message: HandshakeMessage) -> Packet {
    Packet {
        record: RecordLayer::new(
            PROTOCOL_VERSION1_2,
            epoch,
            Content::Handshake(Handshake::new(message)),
        ),
        should_encrypt: epoch != 0,
    }
}
