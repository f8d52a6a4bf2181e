use std::fmt;

use shared::error::Error;

use super::flight0::*;
use super::flight4::*;
use super::*;
use crate::handshake::handshake_message_hello_verify_request::*;
use crate::record_layer::record_layer_header::*;

#[derive(Debug, PartialEq)]
pub(crate) struct Flight2;

impl fmt::Display for Flight2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight 2")
    }
}

impl Flight for Flight2 {
    fn has_retransmit(&self) -> bool {
        false
    }

    fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Box<dyn Flight + Send + Sync>, (Option<Alert>, Option<Error>)> {
        let (seq, msgs) = match cache.full_pull_map(
            state.handshake_recv_sequence,
            &[pull_rule(
                HandshakeType::ClientHello,
                cfg.initial_epoch,
                true,
                false,
            )],
        ) {
            Ok((seq, msgs)) => (seq, msgs),
            // The client retransmits its first ClientHello when the HelloVerifyRequest is lost.
            Err(_) => return Flight0 {}.parse(state, cache, cfg),
        };

        let client_hello = match msgs.get(&HandshakeType::ClientHello) {
            Some(HandshakeMessage::ClientHello(client_hello)) => client_hello,
            _ => return Err((fatal(AlertDescription::InternalError), None)),
        };

        if client_hello.cookie.is_empty() {
            return Err((None, None));
        }

        if !bytes_eq(&state.cookie, &client_hello.cookie) {
            return Err((
                fatal(AlertDescription::AccessDenied),
                Some(Error::ErrCookieMismatch),
            ));
        }

        state.handshake_recv_sequence = seq;

        Ok(Box::new(Flight4 {}))
    }

    fn generate(
        &self,
        state: &mut State,
        _cache: &HandshakeCache,
        _cfg: &HandshakeConfig,
    ) -> Result<Vec<Packet>, (Option<Alert>, Option<Error>)> {
        state.handshake_send_sequence = 0;
        Ok(vec![handshake_packet(
            0,
            HandshakeMessage::HelloVerifyRequest(HandshakeMessageHelloVerifyRequest {
                version: PROTOCOL_VERSION1_2,
                cookie: state.cookie.clone(),
            }),
        )])
    }
}
