use std::fmt;

use shared::error::Error;

use super::*;
use crate::change_cipher_spec::*;
use crate::content::*;
use crate::crypto::*;
use crate::handshake::handshake_message_certificate::*;
use crate::handshake::handshake_message_certificate_verify::*;
use crate::handshake::handshake_message_client_key_exchange::*;
use crate::handshake::handshake_message_finished::*;
use crate::prf::*;
use crate::record_layer::record_layer_header::*;
use crate::signature_hash_algorithm::*;

#[derive(Debug, PartialEq)]
pub(crate) struct Flight5;

impl fmt::Display for Flight5 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight 5")
    }
}

impl Flight for Flight5 {
    fn is_last_recv_flight(&self) -> bool {
        true
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
                HandshakeType::Finished,
                cfg.initial_epoch + 1,
                false,
                false,
            )],
        ) {
            Ok((seq, msgs)) => (seq, msgs),
            Err(_) => return Err((None, None)),
        };

        let finished = match msgs.get(&HandshakeType::Finished) {
            Some(HandshakeMessage::Finished(h)) => h,
            _ => return Err((fatal(AlertDescription::InternalError), None)),
        };

        let plain_text = cache.pull_and_merge(&server_finished_transcript(cfg.initial_epoch));
        let expected = match prf_verify_data_server(&state.master_secret, &plain_text) {
            Ok(expected) => expected,
            Err(err) => return Err((fatal(AlertDescription::InternalError), Some(err))),
        };
        if !bytes_eq(&expected, &finished.verify_data) {
            return Err((
                fatal(AlertDescription::HandshakeFailure),
                Some(Error::ErrVerifyDataMismatch),
            ));
        }

        state.handshake_recv_sequence = seq;

        Ok(Box::new(Flight5 {}))
    }

    fn generate(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Vec<Packet>, (Option<Alert>, Option<Error>)> {
        // Without a certificate of our own an empty Certificate message is
        // sent and the server decides whether that is acceptable.
        let certificate = if state.remote_requested_certificate
            && !cfg.local_certificates.is_empty()
        {
            match cfg.get_certificate(&cfg.server_name) {
                Ok(certificate) => Some(certificate),
                Err(err) => return Err((fatal(AlertDescription::HandshakeFailure), Some(err))),
            }
        } else {
            None
        };

        let mut pkts = vec![];
        if state.remote_requested_certificate {
            pkts.push(handshake_packet(
                0,
                HandshakeMessage::Certificate(HandshakeMessageCertificate {
                    certificate: certificate
                        .as_ref()
                        .map(|certificate| certificate.certificate.clone())
                        .unwrap_or_default(),
                }),
            ));
        }

        let public_key = match &state.local_keypair {
            Some(local_keypair) => local_keypair.public_key.clone(),
            None => {
                return Err((
                    fatal(AlertDescription::InternalError),
                    Some(Error::ErrInvalidNamedCurve),
                ))
            }
        };
        pkts.push(handshake_packet(
            0,
            HandshakeMessage::ClientKeyExchange(HandshakeMessageClientKeyExchange { public_key }),
        ));

        let server_transcript = cache.pull_and_merge(&[
            pull_rule(HandshakeType::ClientHello, cfg.initial_epoch, true, false),
            pull_rule(HandshakeType::ServerHello, cfg.initial_epoch, false, false),
            pull_rule(HandshakeType::Certificate, cfg.initial_epoch, false, false),
            pull_rule(
                HandshakeType::ServerKeyExchange,
                cfg.initial_epoch,
                false,
                false,
            ),
            pull_rule(
                HandshakeType::CertificateRequest,
                cfg.initial_epoch,
                false,
                false,
            ),
            pull_rule(
                HandshakeType::ServerHelloDone,
                cfg.initial_epoch,
                false,
                false,
            ),
        ]);

        let send_sequence = state.handshake_send_sequence as u16;
        let own_messages = match marshal_with_predicted_sequence(&mut pkts, send_sequence) {
            Ok(own_messages) => own_messages,
            Err(err) => return Err((fatal(AlertDescription::InternalError), Some(err))),
        };

        if state.master_secret.is_empty() {
            let master_secret = if state.extended_master_secret {
                cache
                    .session_hash(cfg.initial_epoch, &own_messages)
                    .and_then(|session_hash| {
                        prf_extended_master_secret(&state.pre_master_secret, &session_hash)
                    })
            } else {
                prf_master_secret(
                    &state.pre_master_secret,
                    &state.local_random.marshal_fixed(),
                    &state.remote_random.marshal_fixed(),
                )
            };
            state.master_secret = match master_secret {
                Ok(master_secret) => master_secret,
                Err(err) => return Err((fatal(AlertDescription::InternalError), Some(err))),
            };
        }

        if let Err(err) = state.init_cipher_suite() {
            return Err((fatal(AlertDescription::InternalError), Some(err)));
        }

        if let Some(certificate) = &certificate {
            let mut plain_text = server_transcript.clone();
            plain_text.extend_from_slice(&own_messages);

            let algorithm = match select_signature_scheme(
                &cfg.local_signature_schemes,
                &certificate.private_key.kind,
            ) {
                Ok(algorithm) => algorithm,
                Err(err) => {
                    return Err((fatal(AlertDescription::InsufficientSecurity), Some(err)))
                }
            };

            let signature = match generate_certificate_verify(&plain_text, &certificate.private_key)
            {
                Ok(signature) => signature,
                Err(err) => return Err((fatal(AlertDescription::InternalError), Some(err))),
            };

            pkts.push(handshake_packet(
                0,
                HandshakeMessage::CertificateVerify(HandshakeMessageCertificateVerify {
                    algorithm,
                    signature,
                }),
            ));
        }

        let mut plain_text = server_transcript;
        match marshal_with_predicted_sequence(&mut pkts, send_sequence) {
            Ok(own_messages) => plain_text.extend_from_slice(&own_messages),
            Err(err) => return Err((fatal(AlertDescription::InternalError), Some(err))),
        }

        let verify_data = match prf_verify_data_client(&state.master_secret, &plain_text) {
            Ok(verify_data) => verify_data,
            Err(err) => return Err((fatal(AlertDescription::InternalError), Some(err))),
        };

        pkts.push(Packet {
            record: RecordLayer::new(
                PROTOCOL_VERSION1_2,
                0,
                Content::ChangeCipherSpec(ChangeCipherSpec),
            ),
            should_encrypt: false,
        });

        pkts.push(handshake_packet(
            1,
            HandshakeMessage::Finished(HandshakeMessageFinished { verify_data }),
        ));

        Ok(pkts)
    }
}
