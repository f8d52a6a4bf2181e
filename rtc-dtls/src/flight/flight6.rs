use std::fmt;

use shared::error::Error;

use super::*;
use crate::change_cipher_spec::*;
use crate::content::*;
use crate::handshake::handshake_message_finished::*;
use crate::prf::*;
use crate::record_layer::record_layer_header::*;

#[derive(Debug, PartialEq)]
pub(crate) struct Flight6;

impl fmt::Display for Flight6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight 6")
    }
}

impl Flight for Flight6 {
    fn is_last_send_flight(&self) -> bool {
        true
    }

    /// Matches a retransmitted client Finished, so the last flight is sent again.
    fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Box<dyn Flight + Send + Sync>, (Option<Alert>, Option<Error>)> {
        match cache.full_pull_map(
            state.handshake_recv_sequence - 1,
            &[pull_rule(
                HandshakeType::Finished,
                cfg.initial_epoch + 1,
                true,
                false,
            )],
        ) {
            Ok(_) => Ok(Box::new(Flight6 {})),
            // Other party may re-transmit the last flight. Keep state to be flight6.
            Err(_) => Err((None, None)),
        }
    }

    fn generate(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Vec<Packet>, (Option<Alert>, Option<Error>)> {
        let plain_text = cache.pull_and_merge(&server_finished_transcript(cfg.initial_epoch));

        let verify_data = match prf_verify_data_server(&state.master_secret, &plain_text) {
            Ok(verify_data) => verify_data,
            Err(err) => return Err((fatal(AlertDescription::InternalError), Some(err))),
        };

        Ok(vec![
            Packet {
                record: RecordLayer::new(
                    PROTOCOL_VERSION1_2,
                    0,
                    Content::ChangeCipherSpec(ChangeCipherSpec),
                ),
                should_encrypt: false,
            },
            handshake_packet(
                cfg.initial_epoch + 1,
                HandshakeMessage::Finished(HandshakeMessageFinished { verify_data }),
            ),
        ])
    }
}
