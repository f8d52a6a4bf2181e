use std::fmt;

use shared::error::Error;

use super::flight0::client_hello_extensions;
use super::flight3::*;
use super::*;
use crate::compression_methods::*;
use crate::conn::*;
use crate::handshake::handshake_message_client_hello::*;
use crate::record_layer::record_layer_header::*;

#[derive(Debug, PartialEq)]
pub(crate) struct Flight1;

impl fmt::Display for Flight1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight 1")
    }
}

impl Flight for Flight1 {
    fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Box<dyn Flight + Send + Sync>, (Option<Alert>, Option<Error>)> {
        // HelloVerifyRequest can be skipped by the server,
        // so allow ServerHello during flight1 also
        let (seq, msgs) = match cache.full_pull_map(
            state.handshake_recv_sequence,
            &[pull_rule(
                HandshakeType::HelloVerifyRequest,
                cfg.initial_epoch,
                false,
                true,
            )],
        ) {
            Ok((seq, msgs)) => (seq, msgs),
            Err(_) => return Err((None, None)),
        };

        match msgs.get(&HandshakeType::HelloVerifyRequest) {
            Some(HandshakeMessage::HelloVerifyRequest(h)) => {
                // DTLS 1.2 clients must not assume that the server will
                // use the protocol version specified in HelloVerifyRequest message.
                // RFC 6347 Section 4.2.1
                if h.version != PROTOCOL_VERSION1_0 && h.version != PROTOCOL_VERSION1_2 {
                    return Err((
                        fatal(AlertDescription::ProtocolVersion),
                        Some(Error::ErrUnsupportedProtocolVersion),
                    ));
                }

                state.cookie.clone_from(&h.cookie);
                state.handshake_recv_sequence = seq;
                Ok(Box::new(Flight3 {}))
            }
            Some(_) => Err((fatal(AlertDescription::InternalError), None)),
            None => Flight3 {}.parse(state, cache, cfg),
        }
    }

    fn generate(
        &self,
        state: &mut State,
        _cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Vec<Packet>, (Option<Alert>, Option<Error>)> {
        state.local_epoch = 0;
        state.remote_epoch = 0;
        state.named_curve = DEFAULT_NAMED_CURVE;
        state.cookie = vec![];
        state.local_random.populate();

        Ok(vec![client_hello_packet(state, cfg)])
    }
}

pub(crate) fn client_hello_packet(state: &State, cfg: &HandshakeConfig) -> Packet {
    handshake_packet(
        0,
        HandshakeMessage::ClientHello(HandshakeMessageClientHello {
            version: PROTOCOL_VERSION1_2,
            random: state.local_random.clone(),
            cookie: state.cookie.clone(),
            cipher_suites: cfg.local_cipher_suites.clone(),
            compression_methods: default_compression_methods(),
            extensions: client_hello_extensions(cfg),
        }),
    )
}
