use std::sync::Arc;
use std::time::{Duration, Instant};

use super::*;
use crate::crypto::Certificate;
use crate::extension::extension_use_srtp::SrtpProtectionProfile;

fn certificate() -> Certificate {
    Certificate::generate_self_signed(vec!["localhost".to_owned()]).unwrap()
}

fn client_builder() -> ConfigBuilder {
    ConfigBuilder::default()
        .with_server_name("localhost".to_owned())
        .with_srtp_protection_profiles(vec![SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80])
}

fn server_builder() -> ConfigBuilder {
    ConfigBuilder::default()
        .with_certificates(vec![certificate()])
        .with_srtp_protection_profiles(vec![SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80])
}

fn pair(client: ConfigBuilder, server: ConfigBuilder) -> (DTLSConn, DTLSConn) {
    let client_cfg = Arc::new(client.build(true, None).unwrap());
    let server_cfg = Arc::new(server.build(false, None).unwrap());
    (
        DTLSConn::new(client_cfg, true, None),
        DTLSConn::new(server_cfg, false, None),
    )
}

fn collect(conn: &mut DTLSConn) -> Vec<BytesMut> {
    let mut out = vec![];
    while let Some(pkt) = conn.outgoing_raw_packet() {
        out.push(pkt);
    }
    out
}

fn deliver(to: &mut DTLSConn, datagrams: Vec<BytesMut>, now: Instant) -> Result<()> {
    for datagram in datagrams {
        to.read_and_buffer(&datagram)?;
        to.handshake(now)?;
    }
    Ok(())
}

/// Moves datagrams between the two sides until both go quiet.
fn pump(client: &mut DTLSConn, server: &mut DTLSConn, now: Instant) -> Result<()> {
    for _ in 0..32 {
        let to_server = collect(client);
        let to_client = collect(server);
        if to_server.is_empty() && to_client.is_empty() {
            return Ok(());
        }
        deliver(server, to_server, now)?;
        deliver(client, to_client, now)?;
    }
    Ok(())
}

fn connect(client: &mut DTLSConn, server: &mut DTLSConn, now: Instant) -> Result<()> {
    client.handshake(now)?;
    pump(client, server, now)
}

#[test]
fn test_handshake_completes() -> Result<()> {
    let _ = env_logger::try_init();

    let now = Instant::now();
    let (mut client, mut server) = pair(client_builder(), server_builder());
    connect(&mut client, &mut server, now)?;

    assert!(client.is_handshake_completed());
    assert!(server.is_handshake_completed());
    assert_eq!(
        client.selected_srtp_protection_profile(),
        SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80
    );
    assert_eq!(
        server.selected_srtp_protection_profile(),
        SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80
    );
    assert!(client.connection_state().extended_master_secret());
    assert!(server.connection_state().extended_master_secret());
    assert_eq!(client.connection_state().peer_certificates.len(), 1);
    assert!(server.connection_state().peer_certificates.is_empty());
    assert_eq!(client.poll_timeout(), None);
    assert_eq!(server.poll_timeout(), None);

    Ok(())
}

#[test]
fn test_export_keying_material_matches() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = pair(client_builder(), server_builder());

    assert_eq!(
        client.export_keying_material("EXTRACTOR-dtls_srtp", &[], 60),
        Err(Error::HandshakeInProgress)
    );

    connect(&mut client, &mut server, now)?;

    let client_keys = client.export_keying_material("EXTRACTOR-dtls_srtp", &[], 60)?;
    let server_keys = server.export_keying_material("EXTRACTOR-dtls_srtp", &[], 60)?;
    assert_eq!(client_keys.len(), 60);
    assert_eq!(client_keys, server_keys);

    assert_eq!(
        client.export_keying_material("master secret", &[], 60),
        Err(Error::ReservedExportKeyingMaterial)
    );
    assert_eq!(
        client.export_keying_material("EXTRACTOR-dtls_srtp", &[1, 2], 60),
        Err(Error::ContextUnsupported)
    );

    Ok(())
}

#[test]
fn test_server_starts_with_hello_verify_request() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = pair(client_builder(), server_builder());

    client.handshake(now)?;
    let client_hello = collect(&mut client);
    assert_eq!(client_hello.len(), 1);

    deliver(&mut server, client_hello, now)?;
    let reply = collect(&mut server);
    assert_eq!(reply.len(), 1);
    // record header (13) then handshake type
    assert_eq!(reply[0][0], ContentType::Handshake as u8);
    assert_eq!(reply[0][RECORD_LAYER_HEADER_SIZE], 3, "HelloVerifyRequest");
    assert!(!server.is_handshake_completed());

    Ok(())
}

#[test]
fn test_application_data_queued_until_handshake_completes() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = pair(client_builder(), server_builder());

    client.write(b"early")?;
    connect(&mut client, &mut server, now)?;
    pump(&mut client, &mut server, now)?;

    assert_eq!(
        server.incoming_application_data(),
        Some(BytesMut::from(&b"early"[..]))
    );

    server.write(b"pong")?;
    pump(&mut client, &mut server, now)?;
    assert_eq!(
        client.incoming_application_data(),
        Some(BytesMut::from(&b"pong"[..]))
    );
    assert_eq!(client.incoming_application_data(), None);

    Ok(())
}

#[test]
fn test_retransmit_interval_doubles() -> Result<()> {
    let start = Instant::now();
    let (mut client, _) = pair(
        client_builder().with_flight_interval(Duration::from_secs(1)),
        server_builder(),
    );

    client.handshake(start)?;
    assert_eq!(collect(&mut client).len(), 1);

    // the deadline is later than the retransmit timer
    assert_eq!(client.poll_timeout(), Some(start + Duration::from_secs(1)));

    let first = start + Duration::from_secs(1);
    client.handle_timeout(first)?;
    assert_eq!(collect(&mut client).len(), 1);
    assert_eq!(client.poll_timeout(), Some(first + Duration::from_secs(2)));

    let second = first + Duration::from_secs(2);
    client.handle_timeout(second)?;
    assert_eq!(collect(&mut client).len(), 1);
    assert_eq!(client.poll_timeout(), Some(second + Duration::from_secs(4)));

    // nothing happens before the timer fires
    client.handle_timeout(second + Duration::from_secs(1))?;
    assert!(collect(&mut client).is_empty());

    Ok(())
}

#[test]
fn test_retransmit_interval_is_capped() -> Result<()> {
    let start = Instant::now();
    let (mut client, _) = pair(
        client_builder()
            .with_flight_interval(Duration::from_secs(40))
            .with_handshake_timeout(Duration::from_secs(3600)),
        server_builder(),
    );

    client.handshake(start)?;
    collect(&mut client);

    let first = start + Duration::from_secs(40);
    client.handle_timeout(first)?;
    assert_eq!(client.poll_timeout(), Some(first + Duration::from_secs(60)));

    Ok(())
}

#[test]
fn test_handshake_deadline() -> Result<()> {
    let start = Instant::now();
    let (mut client, _) = pair(
        client_builder().with_handshake_timeout(Duration::from_secs(5)),
        server_builder(),
    );

    client.handshake(start)?;
    collect(&mut client);

    let mut result = Ok(());
    for _ in 0..10 {
        let Some(timeout) = client.poll_timeout() else {
            break;
        };
        result = client.handle_timeout(timeout);
        if result.is_err() {
            break;
        }
    }

    assert_eq!(result, Err(Error::ErrHandshakeTimeout));
    assert_eq!(client.poll_timeout(), None);

    Ok(())
}

#[test]
fn test_lost_flight_is_retransmitted() -> Result<()> {
    let start = Instant::now();
    let (mut client, mut server) = pair(client_builder(), server_builder());

    client.handshake(start)?;
    // ClientHello lost on the way
    collect(&mut client);

    let later = start + Duration::from_secs(1);
    client.handle_timeout(later)?;
    let retransmitted = collect(&mut client);
    assert_eq!(retransmitted.len(), 1);

    deliver(&mut server, retransmitted, later)?;
    pump(&mut client, &mut server, later)?;

    assert!(client.is_handshake_completed());
    assert!(server.is_handshake_completed());

    Ok(())
}

#[test]
fn test_small_mtu_fragments_handshake() -> Result<()> {
    const MTU: usize = 200;

    let now = Instant::now();
    let (mut client, mut server) = pair(
        client_builder().with_mtu(MTU),
        server_builder().with_mtu(MTU),
    );

    client.handshake(now)?;
    for _ in 0..32 {
        let to_server = collect(&mut client);
        let to_client = collect(&mut server);
        if to_server.is_empty() && to_client.is_empty() {
            break;
        }
        for datagram in to_server.iter().chain(to_client.iter()) {
            assert!(datagram.len() <= MTU, "datagram of {} bytes", datagram.len());
        }
        deliver(&mut server, to_server, now)?;
        deliver(&mut client, to_client, now)?;
    }

    assert!(client.is_handshake_completed());
    assert!(server.is_handshake_completed());

    Ok(())
}

#[test]
fn test_p256_key_exchange() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = pair(
        client_builder().with_elliptic_curves(vec![NamedCurve::P256]),
        server_builder(),
    );
    connect(&mut client, &mut server, now)?;

    assert!(client.is_handshake_completed());
    assert_eq!(client.connection_state().named_curve, NamedCurve::P256);
    assert_eq!(server.connection_state().named_curve, NamedCurve::P256);

    Ok(())
}

#[test]
fn test_no_shared_curve() {
    let now = Instant::now();
    let (mut client, mut server) = pair(
        client_builder().with_elliptic_curves(vec![NamedCurve::P256]),
        server_builder().with_elliptic_curves(vec![NamedCurve::X25519]),
    );

    let result = connect(&mut client, &mut server, now);
    assert_eq!(result, Err(Error::ErrNoSupportedEllipticCurves));
}

#[test]
fn test_verify_peer_certificate_rejects() {
    let now = Instant::now();
    let verify: VerifyPeerCertificateFn =
        Arc::new(|_certs: &[Vec<u8>]| Err(Error::Other("fingerprint mismatch".to_owned())));
    let (mut client, mut server) = pair(
        client_builder().with_verify_peer_certificate(Some(verify)),
        server_builder(),
    );

    let result = connect(&mut client, &mut server, now);
    assert_eq!(
        result,
        Err(Error::Other("fingerprint mismatch".to_owned()))
    );
    assert!(!client.is_handshake_completed());

    // the bad_certificate alert reaches the server
    let alert = collect(&mut client);
    assert!(!alert.is_empty());
    assert_eq!(alert[0][0], ContentType::Alert as u8);
    assert_eq!(
        deliver(&mut server, alert, now),
        Err(Error::ErrAlertFatalOrClose)
    );
}

#[test]
fn test_verify_peer_certificate_sees_chain() -> Result<()> {
    let now = Instant::now();
    let server_certificate = certificate();
    let expected = server_certificate.certificate.clone();
    let verify: VerifyPeerCertificateFn = Arc::new(move |certs: &[Vec<u8>]| {
        if certs == expected.as_slice() {
            Ok(())
        } else {
            Err(Error::ErrInvalidCertificate)
        }
    });
    let (mut client, mut server) = pair(
        ConfigBuilder::default()
            .with_server_name("localhost".to_owned())
            .with_verify_peer_certificate(Some(verify)),
        ConfigBuilder::default().with_certificates(vec![server_certificate]),
    );
    connect(&mut client, &mut server, now)?;

    assert!(client.is_handshake_completed());
    assert_eq!(
        client.selected_srtp_protection_profile(),
        SrtpProtectionProfile::Unsupported
    );

    Ok(())
}

#[test]
fn test_client_certificate_required() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = pair(
        client_builder().with_certificates(vec![certificate()]),
        server_builder().with_client_auth(ClientAuthType::RequireAnyClientCert),
    );
    connect(&mut client, &mut server, now)?;

    assert!(server.is_handshake_completed());
    assert_eq!(server.connection_state().peer_certificates.len(), 1);

    Ok(())
}

#[test]
fn test_client_certificate_missing() {
    let now = Instant::now();
    let (mut client, mut server) = pair(
        client_builder(),
        server_builder().with_client_auth(ClientAuthType::RequireAnyClientCert),
    );

    let result = connect(&mut client, &mut server, now);
    assert_eq!(result, Err(Error::ErrClientCertificateRequired));
}

#[test]
fn test_client_certificate_requested_but_absent() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = pair(
        client_builder(),
        server_builder().with_client_auth(ClientAuthType::RequestClientCert),
    );
    connect(&mut client, &mut server, now)?;

    assert!(client.is_handshake_completed());
    assert!(server.is_handshake_completed());
    assert!(server.connection_state().peer_certificates.is_empty());

    Ok(())
}

#[test]
fn test_extended_master_secret_required() {
    let now = Instant::now();
    let (mut client, mut server) = pair(
        client_builder().with_extended_master_secret(ExtendedMasterSecretType::Disable),
        server_builder().with_extended_master_secret(ExtendedMasterSecretType::Require),
    );

    let result = connect(&mut client, &mut server, now);
    assert_eq!(result, Err(Error::ErrServerRequiredButNoClientEms));
}

#[test]
fn test_extended_master_secret_disabled() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = pair(
        client_builder().with_extended_master_secret(ExtendedMasterSecretType::Disable),
        server_builder(),
    );
    connect(&mut client, &mut server, now)?;

    assert!(!client.connection_state().extended_master_secret());
    assert!(!server.connection_state().extended_master_secret());
    assert_eq!(
        client.export_keying_material("EXTRACTOR-dtls_srtp", &[], 30)?,
        server.export_keying_material("EXTRACTOR-dtls_srtp", &[], 30)?
    );

    Ok(())
}

#[test]
fn test_srtp_profile_mismatch() {
    let now = Instant::now();
    let (mut client, mut server) = pair(
        client_builder(),
        server_builder()
            .with_srtp_protection_profiles(vec![SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm]),
    );

    let result = connect(&mut client, &mut server, now);
    assert_eq!(result, Err(Error::ErrServerNoMatchingSrtpProfile));
}

#[test]
fn test_close_notify() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = pair(client_builder(), server_builder());
    connect(&mut client, &mut server, now)?;

    client.close();
    assert!(client.is_connection_closed());
    assert_eq!(client.write(b"late"), Err(Error::ErrConnClosed));

    let alert = collect(&mut client);
    assert_eq!(alert.len(), 1);
    deliver(&mut server, alert, now)?;
    assert!(server.is_connection_closed());

    // the server answers with its own close_notify, once
    let reply = collect(&mut server);
    assert_eq!(reply.len(), 1);
    server.close();
    assert!(collect(&mut server).is_empty());

    Ok(())
}

#[test]
fn test_duplicate_record_is_dropped() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = pair(client_builder(), server_builder());
    connect(&mut client, &mut server, now)?;

    client.write(b"once")?;
    let datagrams = collect(&mut client);
    assert_eq!(datagrams.len(), 1);
    deliver(&mut server, vec![datagrams[0].clone(), datagrams[0].clone()], now)?;

    assert_eq!(
        server.incoming_application_data(),
        Some(BytesMut::from(&b"once"[..]))
    );
    assert_eq!(server.incoming_application_data(), None);

    Ok(())
}

#[test]
fn test_garbage_is_discarded() -> Result<()> {
    let now = Instant::now();
    let (_, mut server) = pair(client_builder(), server_builder());

    // a lone handshake record header with a bogus body length is rejected at unpack
    assert_eq!(
        server.read_and_buffer(&[22, 254, 253, 0, 0, 0, 0, 0, 0, 0, 0, 0, 200, 1]),
        Err(Error::ErrInvalidPacketLength)
    );
    server.handshake(now)?;
    assert!(collect(&mut server).is_empty());

    Ok(())
}

#[test]
fn test_both_sides_end_in_finished_state() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = pair(client_builder(), server_builder());
    connect(&mut client, &mut server, now)?;

    assert_eq!(client.current_handshake_state, HandshakeState::Finished);
    assert_eq!(server.current_handshake_state, HandshakeState::Finished);

    Ok(())
}
