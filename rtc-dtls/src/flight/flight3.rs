use std::fmt;

use log::debug;
use shared::error::Error;

use super::flight1::client_hello_packet;
use super::flight5::*;
use super::*;
use crate::crypto::*;
use crate::extension::*;
use crate::handshake::handshake_message_server_hello::*;
use crate::handshaker::srv_cli_str;
use crate::prf::*;
use crate::record_layer::record_layer_header::*;
use crate::*;

#[derive(Debug, PartialEq)]
pub(crate) struct Flight3;

impl fmt::Display for Flight3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight 3")
    }
}

impl Flight for Flight3 {
    fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Box<dyn Flight + Send + Sync>, (Option<Alert>, Option<Error>)> {
        // Clients may receive multiple HelloVerifyRequest messages with different cookies.
        // Clients SHOULD handle this by sending a new ClientHello with a cookie in response
        // to the new HelloVerifyRequest. RFC 6347 Section 4.2.1
        if let Ok((seq, msgs)) = cache.full_pull_map(
            state.handshake_recv_sequence,
            &[pull_rule(
                HandshakeType::HelloVerifyRequest,
                cfg.initial_epoch,
                false,
                true,
            )],
        ) {
            if let Some(HandshakeMessage::HelloVerifyRequest(h)) =
                msgs.get(&HandshakeType::HelloVerifyRequest)
            {
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
                return Ok(Box::new(Flight3 {}));
            }
        }

        let (seq, msgs) = match cache.full_pull_map(
            state.handshake_recv_sequence,
            &[
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
                    true,
                ),
                pull_rule(
                    HandshakeType::ServerHelloDone,
                    cfg.initial_epoch,
                    false,
                    false,
                ),
            ],
        ) {
            Ok((seq, msgs)) => (seq, msgs),
            Err(_) => return Err((None, None)),
        };

        let server_hello = match msgs.get(&HandshakeType::ServerHello) {
            Some(HandshakeMessage::ServerHello(h)) => h,
            _ => return Err((fatal(AlertDescription::InternalError), None)),
        };
        handle_server_hello(state, cfg, server_hello)?;

        let certificate = match msgs.get(&HandshakeType::Certificate) {
            Some(HandshakeMessage::Certificate(h)) => h,
            _ => return Err((fatal(AlertDescription::InternalError), None)),
        };
        let server_key_exchange = match msgs.get(&HandshakeType::ServerKeyExchange) {
            Some(HandshakeMessage::ServerKeyExchange(h)) => h,
            _ => return Err((fatal(AlertDescription::InternalError), None)),
        };

        state.peer_certificates.clone_from(&certificate.certificate);

        if let Err(err) = verify_key_signature(
            &state.local_random.marshal_fixed(),
            &state.remote_random.marshal_fixed(),
            &server_key_exchange.public_key,
            server_key_exchange.named_curve,
            server_key_exchange.algorithm.hash,
            &server_key_exchange.signature,
            &state.peer_certificates,
        ) {
            return Err((fatal(AlertDescription::BadCertificate), Some(err)));
        }

        if !cfg.insecure_skip_verify {
            if let Err(err) = verify_certificate_validity(&state.peer_certificates) {
                return Err((fatal(AlertDescription::BadCertificate), Some(err)));
            }
        }
        if let Some(verify_peer_certificate) = &cfg.verify_peer_certificate {
            if let Err(err) = verify_peer_certificate(&state.peer_certificates) {
                return Err((fatal(AlertDescription::BadCertificate), Some(err)));
            }
        }
        state.peer_certificates_verified = true;

        if !cfg.local_elliptic_curves.contains(&server_key_exchange.named_curve) {
            return Err((
                fatal(AlertDescription::IllegalParameter),
                Some(Error::ErrInvalidNamedCurve),
            ));
        }
        state.named_curve = server_key_exchange.named_curve;

        let keypair = match server_key_exchange.named_curve.generate_keypair() {
            Ok(keypair) => keypair,
            Err(err) => return Err((fatal(AlertDescription::IllegalParameter), Some(err))),
        };
        state.pre_master_secret =
            match prf_pre_master_secret(&server_key_exchange.public_key, &keypair.private_key) {
                Ok(pre_master_secret) => pre_master_secret,
                Err(err) => return Err((fatal(AlertDescription::IllegalParameter), Some(err))),
            };
        state.local_keypair = Some(keypair);

        state.remote_requested_certificate =
            msgs.contains_key(&HandshakeType::CertificateRequest);

        state.handshake_recv_sequence = seq;

        Ok(Box::new(Flight5 {}))
    }

    fn generate(
        &self,
        state: &mut State,
        _cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Vec<Packet>, (Option<Alert>, Option<Error>)> {
        Ok(vec![client_hello_packet(state, cfg)])
    }
}

fn handle_server_hello(
    state: &mut State,
    cfg: &HandshakeConfig,
    h: &HandshakeMessageServerHello,
) -> Result<(), (Option<Alert>, Option<Error>)> {
    if h.version != PROTOCOL_VERSION1_2 {
        return Err((
            fatal(AlertDescription::ProtocolVersion),
            Some(Error::ErrUnsupportedProtocolVersion),
        ));
    }

    let mut use_srtp = None;
    let mut extended_master_secret = false;
    for extension in &h.extensions {
        match extension {
            Extension::UseSrtp(e) => use_srtp = Some(e),
            Extension::UseExtendedMasterSecret(_) => {
                if cfg.extended_master_secret != ExtendedMasterSecretType::Disable {
                    extended_master_secret = true;
                }
            }
            _ => {}
        }
    }

    if let Some(e) = use_srtp {
        match find_matching_srtp_profile(
            &e.protection_profiles,
            &cfg.local_srtp_protection_profiles,
        ) {
            Some(profile) => state.srtp_protection_profile = profile,
            None => {
                return Err((
                    fatal(AlertDescription::IllegalParameter),
                    Some(Error::ErrClientNoMatchingSrtpProfile),
                ))
            }
        }
    } else if !cfg.local_srtp_protection_profiles.is_empty() {
        return Err((
            fatal(AlertDescription::InsufficientSecurity),
            Some(Error::ErrRequestedButNoSrtpExtension),
        ));
    }

    if cfg.extended_master_secret == ExtendedMasterSecretType::Require && !extended_master_secret
    {
        return Err((
            fatal(AlertDescription::InsufficientSecurity),
            Some(Error::ErrClientRequiredButNoServerEms),
        ));
    }
    state.extended_master_secret = extended_master_secret;

    if !cfg.local_cipher_suites.contains(&h.cipher_suite) {
        return Err((
            fatal(AlertDescription::InsufficientSecurity),
            Some(Error::ErrInvalidCipherSuite),
        ));
    }
    let cipher_suite = cipher_suite_for_id(h.cipher_suite)
        .map_err(|err| (fatal(AlertDescription::InsufficientSecurity), Some(err)))?;
    debug!(
        "[handshake:{}] use cipher suite: {}",
        srv_cli_str(state.is_client),
        cipher_suite.to_string()
    );
    state.cipher_suite = Some(cipher_suite);

    state.remote_random = h.random.clone();

    Ok(())
}
