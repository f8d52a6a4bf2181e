use std::fmt;

use shared::error::Error;

use super::flight6::*;
use super::*;
use crate::client_certificate_type::*;
use crate::compression_methods::*;
use crate::crypto::*;
use crate::curve::*;
use crate::extension::extension_supported_point_formats::*;
use crate::extension::extension_use_extended_master_secret::*;
use crate::extension::extension_use_srtp::*;
use crate::extension::renegotiation_info::*;
use crate::extension::*;
use crate::handshake::handshake_message_certificate::*;
use crate::handshake::handshake_message_certificate_request::*;
use crate::handshake::handshake_message_server_hello::*;
use crate::handshake::handshake_message_server_hello_done::*;
use crate::handshake::handshake_message_server_key_exchange::*;
use crate::prf::*;
use crate::record_layer::record_layer_header::*;
use crate::signature_hash_algorithm::*;

#[derive(Debug, PartialEq)]
pub(crate) struct Flight4;

impl fmt::Display for Flight4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight 4")
    }
}

impl Flight for Flight4 {
    fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Box<dyn Flight + Send + Sync>, (Option<Alert>, Option<Error>)> {
        let (seq, msgs) = match cache.full_pull_map(
            state.handshake_recv_sequence,
            &[
                pull_rule(HandshakeType::Certificate, cfg.initial_epoch, true, true),
                pull_rule(
                    HandshakeType::ClientKeyExchange,
                    cfg.initial_epoch,
                    true,
                    false,
                ),
                pull_rule(
                    HandshakeType::CertificateVerify,
                    cfg.initial_epoch,
                    true,
                    true,
                ),
            ],
        ) {
            Ok((seq, msgs)) => (seq, msgs),
            Err(_) => return Err((None, None)),
        };

        let client_key_exchange = match msgs.get(&HandshakeType::ClientKeyExchange) {
            Some(HandshakeMessage::ClientKeyExchange(h)) => h,
            _ => return Err((fatal(AlertDescription::InternalError), None)),
        };

        if let Some(message) = msgs.get(&HandshakeType::Certificate) {
            match message {
                HandshakeMessage::Certificate(h) => {
                    state.peer_certificates.clone_from(&h.certificate);
                }
                _ => return Err((fatal(AlertDescription::InternalError), None)),
            }
        }

        if let Some(message) = msgs.get(&HandshakeType::CertificateVerify) {
            let h = match message {
                HandshakeMessage::CertificateVerify(h) => h,
                _ => return Err((fatal(AlertDescription::InternalError), None)),
            };

            if state.peer_certificates.is_empty() {
                return Err((
                    fatal(AlertDescription::NoCertificate),
                    Some(Error::ErrCertificateVerifyNoCertificate),
                ));
            }

            let plain_text =
                cache.pull_and_merge(&certificate_verify_transcript(cfg.initial_epoch));

            // Verify that the pair of hash algorithm and signature is listed.
            let valid_signature_scheme = cfg
                .local_signature_schemes
                .iter()
                .any(|ss| ss.hash == h.algorithm.hash && ss.signature == h.algorithm.signature);
            if !valid_signature_scheme {
                return Err((
                    fatal(AlertDescription::InsufficientSecurity),
                    Some(Error::ErrNoAvailableSignatureSchemes),
                ));
            }

            if let Err(err) = verify_certificate_verify(
                &plain_text,
                h.algorithm.hash,
                &h.signature,
                &state.peer_certificates,
            ) {
                return Err((fatal(AlertDescription::BadCertificate), Some(err)));
            }

            if cfg.client_auth >= ClientAuthType::VerifyClientCertIfGiven {
                if let Err(err) = verify_certificate_validity(&state.peer_certificates) {
                    return Err((fatal(AlertDescription::BadCertificate), Some(err)));
                }
                state.peer_certificates_verified = true;
            }
        } else if !state.peer_certificates.is_empty() {
            // possession of the certificate key is only proven by a CertificateVerify
            return Err((
                fatal(AlertDescription::NoCertificate),
                Some(Error::ErrClientCertificateNotVerified),
            ));
        }

        match cfg.client_auth {
            ClientAuthType::RequireAnyClientCert => {
                if state.peer_certificates.is_empty() {
                    return Err((
                        fatal(AlertDescription::NoCertificate),
                        Some(Error::ErrClientCertificateRequired),
                    ));
                }
            }
            ClientAuthType::VerifyClientCertIfGiven => {
                if !state.peer_certificates.is_empty() && !state.peer_certificates_verified {
                    return Err((
                        fatal(AlertDescription::BadCertificate),
                        Some(Error::ErrClientCertificateNotVerified),
                    ));
                }
            }
            ClientAuthType::RequireAndVerifyClientCert => {
                if state.peer_certificates.is_empty() {
                    return Err((
                        fatal(AlertDescription::NoCertificate),
                        Some(Error::ErrClientCertificateRequired),
                    ));
                }
                if !state.peer_certificates_verified {
                    return Err((
                        fatal(AlertDescription::BadCertificate),
                        Some(Error::ErrClientCertificateNotVerified),
                    ));
                }
            }
            ClientAuthType::NoClientCert | ClientAuthType::RequestClientCert => {}
        }

        if let Some(verify_peer_certificate) = &cfg.verify_peer_certificate {
            if let Err(err) = verify_peer_certificate(&state.peer_certificates) {
                return Err((fatal(AlertDescription::BadCertificate), Some(err)));
            }
        }

        if state.master_secret.is_empty() {
            let local_keypair = match &state.local_keypair {
                Some(local_keypair) => local_keypair,
                None => return Err((fatal(AlertDescription::InternalError), None)),
            };
            state.pre_master_secret = match prf_pre_master_secret(
                &client_key_exchange.public_key,
                &local_keypair.private_key,
            ) {
                Ok(pre_master_secret) => pre_master_secret,
                Err(err) => return Err((fatal(AlertDescription::IllegalParameter), Some(err))),
            };

            let master_secret = if state.extended_master_secret {
                cache
                    .session_hash(cfg.initial_epoch, &[])
                    .and_then(|session_hash| {
                        prf_extended_master_secret(&state.pre_master_secret, &session_hash)
                    })
            } else {
                prf_master_secret(
                    &state.pre_master_secret,
                    &state.remote_random.marshal_fixed(),
                    &state.local_random.marshal_fixed(),
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

        // The client Finished arrives at epoch 1 once the cipher suite is ready.
        let (seq, msgs) = match cache.full_pull_map(
            seq,
            &[pull_rule(
                HandshakeType::Finished,
                cfg.initial_epoch + 1,
                true,
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

        let plain_text = cache.pull_and_merge(&client_finished_transcript(cfg.initial_epoch));
        let expected = match prf_verify_data_client(&state.master_secret, &plain_text) {
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

        Ok(Box::new(Flight6 {}))
    }

    fn generate(
        &self,
        state: &mut State,
        _cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Vec<Packet>, (Option<Alert>, Option<Error>)> {
        let mut extensions = vec![Extension::RenegotiationInfo(ExtensionRenegotiationInfo {
            renegotiated_connection: 0,
        })];

        if state.extended_master_secret {
            extensions.push(Extension::UseExtendedMasterSecret(
                ExtensionUseExtendedMasterSecret { supported: true },
            ));
        }

        if state.srtp_protection_profile != SrtpProtectionProfile::Unsupported {
            extensions.push(Extension::UseSrtp(ExtensionUseSrtp {
                protection_profiles: vec![state.srtp_protection_profile],
            }));
        }

        extensions.push(Extension::SupportedPointFormats(
            ExtensionSupportedPointFormats {
                point_formats: vec![ELLIPTIC_CURVE_POINT_FORMAT_UNCOMPRESSED],
            },
        ));

        let cipher_suite = match state.cipher_suite() {
            Some(cipher_suite) => cipher_suite.id(),
            None => {
                return Err((
                    fatal(AlertDescription::InternalError),
                    Some(Error::CipherSuiteUnset),
                ))
            }
        };

        let mut pkts = vec![handshake_packet(0, HandshakeMessage::ServerHello(
            HandshakeMessageServerHello {
                version: PROTOCOL_VERSION1_2,
                random: state.local_random.clone(),
                cipher_suite,
                compression_method: CompressionMethodId::Null,
                extensions,
            },
        ))];

        let certificate = match cfg.get_certificate(&state.server_name) {
            Ok(cert) => cert,
            Err(err) => return Err((fatal(AlertDescription::HandshakeFailure), Some(err))),
        };

        pkts.push(handshake_packet(0, HandshakeMessage::Certificate(
            HandshakeMessageCertificate {
                certificate: certificate.certificate.clone(),
            },
        )));

        let local_keypair = match &state.local_keypair {
            Some(local_keypair) => local_keypair,
            None => {
                return Err((
                    fatal(AlertDescription::InternalError),
                    Some(Error::ErrInvalidNamedCurve),
                ))
            }
        };

        let signature_hash_algo = match select_signature_scheme(
            &cfg.local_signature_schemes,
            &certificate.private_key.kind,
        ) {
            Ok(algo) => algo,
            Err(err) => return Err((fatal(AlertDescription::InsufficientSecurity), Some(err))),
        };

        let signature = match generate_key_signature(
            &state.remote_random.marshal_fixed(),
            &state.local_random.marshal_fixed(),
            &local_keypair.public_key,
            state.named_curve,
            &certificate.private_key,
        ) {
            Ok(signature) => signature,
            Err(err) => return Err((fatal(AlertDescription::InternalError), Some(err))),
        };

        pkts.push(handshake_packet(0, HandshakeMessage::ServerKeyExchange(
            HandshakeMessageServerKeyExchange {
                elliptic_curve_type: EllipticCurveType::NamedCurve,
                named_curve: state.named_curve,
                public_key: local_keypair.public_key.clone(),
                algorithm: signature_hash_algo,
                signature,
            },
        )));

        if cfg.client_auth != ClientAuthType::NoClientCert {
            pkts.push(handshake_packet(0, HandshakeMessage::CertificateRequest(
                HandshakeMessageCertificateRequest {
                    certificate_types: vec![ClientCertificateType::EcdsaSign],
                    signature_hash_algorithms: cfg.local_signature_schemes.clone(),
                },
            )));
        }

        pkts.push(handshake_packet(0, HandshakeMessage::ServerHelloDone(
            HandshakeMessageServerHelloDone,
        )));

        Ok(pkts)
    }
}
