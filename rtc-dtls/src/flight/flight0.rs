use std::fmt;

use log::debug;
use rand::Rng;
use shared::error::Error;

use super::flight2::*;
use super::*;
use crate::conn::*;
use crate::extension::extension_server_name::*;
use crate::extension::extension_supported_elliptic_curves::*;
use crate::extension::extension_supported_point_formats::*;
use crate::extension::extension_supported_signature_algorithms::*;
use crate::extension::extension_use_extended_master_secret::*;
use crate::extension::extension_use_srtp::*;
use crate::extension::renegotiation_info::*;
use crate::extension::*;
use crate::handshake::handshake_message_client_hello::*;
use crate::handshaker::srv_cli_str;
use crate::record_layer::record_layer_header::*;
use crate::*;

#[derive(Debug, PartialEq)]
pub(crate) struct Flight0;

impl fmt::Display for Flight0 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight 0")
    }
}

impl Flight for Flight0 {
    fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Box<dyn Flight + Send + Sync>, (Option<Alert>, Option<Error>)> {
        let (seq, msgs) = match cache.full_pull_map(
            0,
            &[pull_rule(
                HandshakeType::ClientHello,
                cfg.initial_epoch,
                true,
                false,
            )],
        ) {
            Ok((seq, msgs)) => (seq, msgs),
            Err(_) => return Err((None, None)),
        };

        let client_hello = match msgs.get(&HandshakeType::ClientHello) {
            Some(HandshakeMessage::ClientHello(client_hello)) => client_hello,
            _ => return Err((fatal(AlertDescription::InternalError), None)),
        };

        handle_client_hello(state, cfg, client_hello)?;

        if state.local_keypair.is_none() {
            state.local_keypair = match state.named_curve.generate_keypair() {
                Ok(local_keypair) => Some(local_keypair),
                Err(err) => return Err((fatal(AlertDescription::IllegalParameter), Some(err))),
            };
        }

        state.handshake_recv_sequence = seq;

        Ok(Box::new(Flight2 {}))
    }

    fn generate(
        &self,
        state: &mut State,
        _cache: &HandshakeCache,
        _cfg: &HandshakeConfig,
    ) -> Result<Vec<Packet>, (Option<Alert>, Option<Error>)> {
        // Initialize
        state.cookie = vec![0; COOKIE_LENGTH];
        rand::rng().fill(state.cookie.as_mut_slice());

        state.local_epoch = 0;
        state.remote_epoch = 0;

        state.named_curve = DEFAULT_NAMED_CURVE;
        state.local_random.populate();

        Ok(vec![])
    }
}

/// Negotiates version, cipher suite, curve, SRTP profile and extended master secret
/// from a ClientHello.
fn handle_client_hello(
    state: &mut State,
    cfg: &HandshakeConfig,
    client_hello: &HandshakeMessageClientHello,
) -> Result<(), (Option<Alert>, Option<Error>)> {
    if client_hello.version != PROTOCOL_VERSION1_2 {
        return Err((
            fatal(AlertDescription::ProtocolVersion),
            Some(Error::ErrUnsupportedProtocolVersion),
        ));
    }

    state.remote_random = client_hello.random.clone();

    let id = match find_matching_cipher_suite(&client_hello.cipher_suites, &cfg.local_cipher_suites)
    {
        Some(id) => id,
        None => {
            return Err((
                fatal(AlertDescription::InsufficientSecurity),
                Some(Error::ErrCipherSuiteNoIntersection),
            ))
        }
    };
    let already_chosen = state.cipher_suite.as_ref().map(|cs| cs.id()) == Some(id);
    if !already_chosen {
        let cipher_suite = cipher_suite_for_id(id)
            .map_err(|err| (fatal(AlertDescription::InternalError), Some(err)))?;
        debug!(
            "[handshake:{}] use cipher suite: {}",
            srv_cli_str(state.is_client),
            cipher_suite.to_string()
        );
        state.cipher_suite = Some(cipher_suite);
    }

    let mut offered_srtp = false;
    state.extended_master_secret = false;
    for extension in &client_hello.extensions {
        match extension {
            Extension::SupportedEllipticCurves(e) => {
                let curve = e
                    .elliptic_curves
                    .iter()
                    .find(|curve| cfg.local_elliptic_curves.contains(curve));
                match curve {
                    Some(curve) => state.named_curve = *curve,
                    None => {
                        return Err((
                            fatal(AlertDescription::InsufficientSecurity),
                            Some(Error::ErrNoSupportedEllipticCurves),
                        ))
                    }
                }
            }
            Extension::UseSrtp(e) => {
                offered_srtp = true;
                if let Some(profile) = find_matching_srtp_profile(
                    &e.protection_profiles,
                    &cfg.local_srtp_protection_profiles,
                ) {
                    state.srtp_protection_profile = profile;
                } else {
                    return Err((
                        fatal(AlertDescription::InsufficientSecurity),
                        Some(Error::ErrServerNoMatchingSrtpProfile),
                    ));
                }
            }
            Extension::UseExtendedMasterSecret(_) => {
                if cfg.extended_master_secret != ExtendedMasterSecretType::Disable {
                    state.extended_master_secret = true;
                }
            }
            Extension::ServerName(e) => {
                state.server_name.clone_from(&e.server_name); // remote server name
            }
            _ => {}
        }
    }

    if !offered_srtp && !cfg.local_srtp_protection_profiles.is_empty() {
        debug!(
            "[handshake:{}] client did not offer use_srtp",
            srv_cli_str(state.is_client)
        );
    }

    if cfg.extended_master_secret == ExtendedMasterSecretType::Require
        && !state.extended_master_secret
    {
        return Err((
            fatal(AlertDescription::InsufficientSecurity),
            Some(Error::ErrServerRequiredButNoClientEms),
        ));
    }

    Ok(())
}

/// Extensions the client offers in every ClientHello it sends.
pub(crate) fn client_hello_extensions(cfg: &HandshakeConfig) -> Vec<Extension> {
    let mut extensions = vec![
        Extension::SupportedSignatureAlgorithms(ExtensionSupportedSignatureAlgorithms {
            signature_hash_algorithms: cfg.local_signature_schemes.clone(),
        }),
        Extension::RenegotiationInfo(ExtensionRenegotiationInfo {
            renegotiated_connection: 0,
        }),
        Extension::SupportedEllipticCurves(ExtensionSupportedEllipticCurves {
            elliptic_curves: cfg.local_elliptic_curves.clone(),
        }),
        Extension::SupportedPointFormats(ExtensionSupportedPointFormats {
            point_formats: vec![ELLIPTIC_CURVE_POINT_FORMAT_UNCOMPRESSED],
        }),
    ];

    if !cfg.local_srtp_protection_profiles.is_empty() {
        extensions.push(Extension::UseSrtp(ExtensionUseSrtp {
            protection_profiles: cfg.local_srtp_protection_profiles.clone(),
        }));
    }

    if cfg.extended_master_secret != ExtendedMasterSecretType::Disable {
        extensions.push(Extension::UseExtendedMasterSecret(
            ExtensionUseExtendedMasterSecret { supported: true },
        ));
    }

    if !cfg.server_name.is_empty() && cfg.server_name.parse::<std::net::IpAddr>().is_err() {
        extensions.push(Extension::ServerName(ExtensionServerName {
            server_name: cfg.server_name.clone(),
        }));
    }

    extensions
}
