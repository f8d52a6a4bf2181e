use super::chunk_abort::ChunkAbort;
use super::chunk_forward_tsn::{ChunkForwardTsn, ChunkForwardTsnStream};
use super::chunk_heartbeat::{ChunkHeartbeat, ChunkHeartbeatAck};
use super::chunk_init::ChunkInit;
use super::chunk_payload_data::{ChunkPayloadData, PayloadProtocolIdentifier};
use super::chunk_reconfig::ChunkReconfig;
use super::chunk_selective_ack::{ChunkSelectiveAck, GapAckBlock};
use super::chunk_shutdown::{ChunkShutdown, ChunkShutdownComplete};
use super::error_cause::{ErrorCause, ErrorCauseCode};
use super::*;
use crate::param::Param;
use crate::param::param_outgoing_reset_request::ParamOutgoingResetRequest;

use bytes::Bytes;
use shared::error::Error;

fn reparse(chunk: &Chunk) -> Chunk {
    let raw = chunk.marshal().expect("marshal");
    assert_eq!(raw.len(), chunk.marshal_size());
    let (parsed, consumed) = Chunk::unmarshal(&raw).expect("unmarshal");
    assert_eq!(consumed, raw.len());
    parsed
}

#[test]
fn test_chunk_header_errors() {
    assert_eq!(
        Chunk::unmarshal(&Bytes::from_static(&[0x00, 0x03])).unwrap_err(),
        Error::ErrChunkHeaderTooSmall
    );
    // length smaller than the header itself
    assert_eq!(
        Chunk::unmarshal(&Bytes::from_static(&[0x0b, 0x00, 0x00, 0x02])).unwrap_err(),
        Error::ErrChunkHeaderInvalidLength
    );
    // length points past the end of the buffer
    assert_eq!(
        Chunk::unmarshal(&Bytes::from_static(&[0x0a, 0x00, 0x00, 0x08, 0x01])).unwrap_err(),
        Error::ErrChunkHeaderNotEnoughSpace
    );
    // non-zero padding after a 5 byte cookie echo
    assert_eq!(
        Chunk::unmarshal(&Bytes::from_static(&[
            0x0a, 0x00, 0x00, 0x05, 0x01, 0x00, 0x01, 0x00
        ]))
        .unwrap_err(),
        Error::ErrChunkHeaderPaddingNonZero
    );
}

#[test]
fn test_payload_data_wire_format() {
    let raw = Bytes::from_static(&[
        0x00, 0x03, 0x00, 0x14, // DATA, B|E, length 20
        0x00, 0x00, 0x00, 0x2a, // tsn 42
        0x00, 0x01, 0x00, 0x07, // si 1, ssn 7
        0x00, 0x00, 0x00, 0x33, // ppi 51
        0x61, 0x62, 0x63, 0x64, // "abcd"
    ]);

    let (chunk, consumed) = Chunk::unmarshal(&raw).unwrap();
    assert_eq!(consumed, raw.len());
    let Chunk::PayloadData(data) = &chunk else {
        panic!("expected DATA, got {chunk}");
    };
    assert!(data.beginning_fragment && data.ending_fragment);
    assert!(!data.unordered && !data.immediate_sack);
    assert_eq!(data.tsn, 42);
    assert_eq!(data.stream_identifier, 1);
    assert_eq!(data.stream_sequence_number, 7);
    assert_eq!(data.payload_type, PayloadProtocolIdentifier::String);
    assert_eq!(&data.user_data[..], b"abcd");

    assert_eq!(chunk.marshal().unwrap(), raw);
}

#[test]
fn test_payload_data_too_small() {
    let raw = Bytes::from_static(&[0x00, 0x03, 0x00, 0x08, 0, 0, 0, 1]);
    assert_eq!(
        Chunk::unmarshal(&raw).unwrap_err(),
        Error::ErrChunkPayloadSmall
    );
}

#[test]
fn test_payload_data_unordered_immediate_sack_flags() {
    let chunk = Chunk::PayloadData(ChunkPayloadData {
        unordered: true,
        immediate_sack: true,
        beginning_fragment: true,
        tsn: 1,
        payload_type: PayloadProtocolIdentifier::Binary,
        user_data: Bytes::from_static(b"x"),
        ..Default::default()
    });
    let raw = chunk.marshal().unwrap();
    assert_eq!(raw[1], 0x0e);
    // 4 header + 12 data header + 1 byte + 3 padding
    assert_eq!(raw.len(), 20);

    let Chunk::PayloadData(parsed) = reparse(&chunk) else {
        panic!("expected DATA");
    };
    assert!(parsed.unordered && parsed.immediate_sack && parsed.beginning_fragment);
    assert!(!parsed.ending_fragment);
}

#[test]
fn test_payload_abandoned_needs_all_fragments_in_flight() {
    let mut first = ChunkPayloadData {
        beginning_fragment: true,
        ..Default::default()
    };
    let mut last = ChunkPayloadData {
        ending_fragment: true,
        abandoned: first.abandoned.clone(),
        all_inflight: first.all_inflight.clone(),
        ..Default::default()
    };

    first.set_abandoned(true);
    first.set_all_inflight();
    assert!(!first.abandoned());

    last.set_all_inflight();
    assert!(first.abandoned());
    assert!(last.abandoned());
}

#[test]
fn test_init_chunk() {
    let init = ChunkInit {
        is_ack: false,
        initiate_tag: 0x1234_5678,
        advertised_receiver_window_credit: 1024 * 1024,
        num_outbound_streams: 1024,
        num_inbound_streams: 1024,
        initial_tsn: 4242,
        params: vec![
            Param::ForwardTsnSupported,
            Param::SupportedExtensions(vec![CT_RECONFIG, CT_FORWARD_TSN]),
        ],
    };
    assert!(init.check().is_ok());
    assert!(init.supports_forward_tsn());

    let chunk = Chunk::Init(init.clone());
    let raw = chunk.marshal().unwrap();
    assert_eq!(raw[0], CT_INIT.0);

    let Chunk::Init(parsed) = reparse(&chunk) else {
        panic!("expected INIT");
    };
    assert_eq!(parsed, init);
}

#[test]
fn test_init_ack_state_cookie() {
    let cookie = Bytes::from_static(&[7u8; 32]);
    let init_ack = ChunkInit {
        is_ack: true,
        initiate_tag: 1,
        advertised_receiver_window_credit: 1500,
        num_outbound_streams: 1,
        num_inbound_streams: 1,
        initial_tsn: 0,
        params: vec![Param::StateCookie(cookie.clone())],
    };

    let Chunk::Init(parsed) = reparse(&Chunk::Init(init_ack)) else {
        panic!("expected INIT ACK");
    };
    assert!(parsed.is_ack);
    assert_eq!(parsed.state_cookie(), Some(cookie));
    assert!(!parsed.supports_forward_tsn());
}

#[test]
fn test_init_checks() {
    let valid = ChunkInit {
        initiate_tag: 1,
        advertised_receiver_window_credit: 1500,
        num_outbound_streams: 1,
        num_inbound_streams: 1,
        ..Default::default()
    };
    assert!(valid.check().is_ok());

    let tests = vec![
        (
            ChunkInit {
                initiate_tag: 0,
                ..valid.clone()
            },
            Error::ErrChunkTypeInitInitiateTagZero,
        ),
        (
            ChunkInit {
                num_inbound_streams: 0,
                ..valid.clone()
            },
            Error::ErrInitInboundStreamRequestZero,
        ),
        (
            ChunkInit {
                num_outbound_streams: 0,
                ..valid.clone()
            },
            Error::ErrInitOutboundStreamRequestZero,
        ),
        (
            ChunkInit {
                advertised_receiver_window_credit: 1499,
                ..valid.clone()
            },
            Error::ErrInitAdvertisedReceiver1500,
        ),
    ];

    for (init, expected) in tests {
        assert_eq!(init.check().unwrap_err(), expected);
    }
}

#[test]
fn test_init_rejects_flags() {
    let mut raw = Chunk::Init(ChunkInit {
        initiate_tag: 1,
        advertised_receiver_window_credit: 1500,
        num_outbound_streams: 1,
        num_inbound_streams: 1,
        ..Default::default()
    })
    .marshal()
    .unwrap()
    .to_vec();
    raw[1] = 1;
    assert_eq!(
        Chunk::unmarshal(&Bytes::from(raw)).unwrap_err(),
        Error::ErrChunkTypeInitFlagZero
    );
}

#[test]
fn test_selective_ack_with_gaps_and_duplicates() {
    let sack = ChunkSelectiveAck {
        cumulative_tsn_ack: 100,
        advertised_receiver_window_credit: 65535,
        gap_ack_blocks: vec![
            GapAckBlock { start: 2, end: 3 },
            GapAckBlock { start: 6, end: 6 },
        ],
        duplicate_tsn: vec![99, 100],
    };

    let chunk = Chunk::SelectiveAck(sack.clone());
    assert_eq!(chunk.marshal_size(), 4 + 12 + 8 + 8);

    let Chunk::SelectiveAck(parsed) = reparse(&chunk) else {
        panic!("expected SACK");
    };
    assert_eq!(parsed, sack);
}

#[test]
fn test_selective_ack_truncated() {
    // claims one gap block but carries none
    let raw = Bytes::from_static(&[
        0x03, 0x00, 0x00, 0x10, 0, 0, 0, 1, 0, 0, 0x10, 0, 0x00, 0x01, 0x00, 0x00,
    ]);
    assert_eq!(
        Chunk::unmarshal(&raw).unwrap_err(),
        Error::ErrSackSizeNotLargeEnoughInfo
    );
}

#[test]
fn test_heartbeat_and_ack() {
    let info = Bytes::from_static(b"probe-1");
    let hb = ChunkHeartbeat {
        params: vec![Param::HeartbeatInfo(info.clone())],
    };
    let Chunk::Heartbeat(parsed) = reparse(&Chunk::Heartbeat(hb)) else {
        panic!("expected HEARTBEAT");
    };
    assert_eq!(parsed.info(), Some(info.clone()));

    let ack = ChunkHeartbeatAck {
        params: vec![Param::HeartbeatInfo(info)],
    };
    let Chunk::HeartbeatAck(parsed) = reparse(&Chunk::HeartbeatAck(ack.clone())) else {
        panic!("expected HEARTBEAT ACK");
    };
    assert_eq!(parsed, ack);
}

#[test]
fn test_heartbeat_errors() {
    assert_eq!(
        Chunk::unmarshal(&Bytes::from_static(&[0x04, 0x00, 0x00, 0x04])).unwrap_err(),
        Error::ErrHeartbeatNotLongEnoughInfo
    );
    // state cookie instead of heartbeat info
    assert_eq!(
        Chunk::unmarshal(&Bytes::from_static(&[
            0x04, 0x00, 0x00, 0x08, 0x00, 0x07, 0x00, 0x04
        ]))
        .unwrap_err(),
        Error::ErrHeartbeatParam
    );

    let ack = ChunkHeartbeatAck { params: vec![] };
    assert_eq!(ack.check().unwrap_err(), Error::ErrHeartbeatAckParams);
    let ack = ChunkHeartbeatAck {
        params: vec![Param::StateCookie(Bytes::new())],
    };
    assert_eq!(
        ack.check().unwrap_err(),
        Error::ErrHeartbeatAckNotHeartbeatInfo
    );
}

#[test]
fn test_abort_with_causes() {
    let abort = ChunkAbort {
        verification_tag_reflected: true,
        error_causes: vec![
            ErrorCause::new(ErrorCauseCode::USER_INITIATED_ABORT, Bytes::from_static(b"bye")),
            ErrorCause::new(ErrorCauseCode::PROTOCOL_VIOLATION, Bytes::new()),
        ],
    };
    let chunk = Chunk::Abort(abort.clone());
    let raw = chunk.marshal().unwrap();
    assert_eq!(raw[1], 1);
    // first cause is padded from 7 to 8, the last one is not
    assert_eq!(u16::from_be_bytes([raw[2], raw[3]]), 4 + 8 + 4);

    let Chunk::Abort(parsed) = reparse(&chunk) else {
        panic!("expected ABORT");
    };
    assert_eq!(parsed, abort);
    assert_eq!(
        parsed.error_causes[0].code.to_string(),
        "User Initiated Abort"
    );
}

#[test]
fn test_shutdown_family() {
    let Chunk::Shutdown(parsed) = reparse(&Chunk::Shutdown(ChunkShutdown {
        cumulative_tsn_ack: 0xdead_beef,
    })) else {
        panic!("expected SHUTDOWN");
    };
    assert_eq!(parsed.cumulative_tsn_ack, 0xdead_beef);

    assert_eq!(
        Chunk::unmarshal(&Bytes::from_static(&[0x07, 0x00, 0x00, 0x06, 0, 0, 0, 0])).unwrap_err(),
        Error::ErrInvalidChunkSize
    );

    let (chunk, _) = Chunk::unmarshal(&Bytes::from_static(&[0x08, 0x00, 0x00, 0x04])).unwrap();
    assert_eq!(chunk.chunk_type(), CT_SHUTDOWN_ACK);

    let Chunk::ShutdownComplete(parsed) =
        reparse(&Chunk::ShutdownComplete(ChunkShutdownComplete {
            verification_tag_reflected: true,
        }))
    else {
        panic!("expected SHUTDOWN COMPLETE");
    };
    assert!(parsed.verification_tag_reflected);
}

#[test]
fn test_cookie_echo_and_ack() {
    let raw = Bytes::from_static(&[0x0a, 0x00, 0x00, 0x08, 0x01, 0x02, 0x03, 0x04]);
    let (chunk, consumed) = Chunk::unmarshal(&raw).unwrap();
    assert_eq!(consumed, 8);
    let Chunk::CookieEcho(echo) = &chunk else {
        panic!("expected COOKIE ECHO");
    };
    assert_eq!(&echo.cookie[..], &[1, 2, 3, 4]);
    assert_eq!(chunk.marshal().unwrap(), raw);

    let (ack, _) = Chunk::unmarshal(&Bytes::from_static(&[0x0b, 0x00, 0x00, 0x04])).unwrap();
    assert_eq!(ack.chunk_type(), CT_COOKIE_ACK);
}

#[test]
fn test_reconfig_chunk() {
    let reconfig = ChunkReconfig {
        param_a: Some(Param::OutgoingResetRequest(ParamOutgoingResetRequest {
            reconfig_request_sequence_number: 1,
            reconfig_response_sequence_number: 0,
            sender_last_tsn: 99,
            stream_identifiers: vec![3],
        })),
        param_b: None,
    };
    let Chunk::Reconfig(parsed) = reparse(&Chunk::Reconfig(reconfig.clone())) else {
        panic!("expected RE-CONFIG");
    };
    assert_eq!(parsed, reconfig);

    let empty = Chunk::Reconfig(ChunkReconfig::default());
    assert_eq!(
        empty.marshal().unwrap_err(),
        Error::ErrChunkReconfigInvalidParamA
    );
    assert_eq!(
        Chunk::unmarshal(&Bytes::from_static(&[0x82, 0x00, 0x00, 0x04])).unwrap_err(),
        Error::ErrChunkReconfigInvalidParamA
    );
}

#[test]
fn test_forward_tsn_chunk() {
    let raw = Bytes::from_static(&[
        0xc0, 0x00, 0x00, 0x10, // FORWARD TSN, length 16
        0x00, 0x00, 0x00, 0x03, // new cumulative tsn 3
        0x00, 0x04, 0x00, 0x05, // si 4, ssn 5
        0x00, 0x06, 0x00, 0x07, // si 6, ssn 7
    ]);
    let (chunk, _) = Chunk::unmarshal(&raw).unwrap();
    let Chunk::ForwardTsn(fwd) = &chunk else {
        panic!("expected FORWARD TSN");
    };
    assert_eq!(
        *fwd,
        ChunkForwardTsn {
            new_cumulative_tsn: 3,
            streams: vec![
                ChunkForwardTsnStream {
                    identifier: 4,
                    sequence: 5
                },
                ChunkForwardTsnStream {
                    identifier: 6,
                    sequence: 7
                },
            ],
        }
    );
    assert_eq!(chunk.marshal().unwrap(), raw);

    assert_eq!(
        Chunk::unmarshal(&Bytes::from_static(&[0xc0, 0x00, 0x00, 0x06, 0, 0, 0, 0])).unwrap_err(),
        Error::ErrChunkTooShort
    );
}

#[test]
fn test_unknown_chunk_action_bits() {
    let tests = vec![
        (0x3fu8, true, false),
        (0x7f, true, true),
        (0xbf, false, false),
        (0xff, false, true),
    ];
    for (typ, skip, report) in tests {
        let raw = Bytes::from(vec![typ, 0, 0, 4]);
        let (chunk, _) = Chunk::unmarshal(&raw).unwrap();
        let Chunk::Unknown(unknown) = chunk else {
            panic!("0x{typ:x} should be unknown");
        };
        assert_eq!(unknown.skip_remaining(), skip, "type 0x{typ:x}");
        assert_eq!(unknown.report(), report, "type 0x{typ:x}");
    }
}
