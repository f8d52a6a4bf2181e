use super::generator::NackGeneratorBuilder;
use super::receive_log::ReceiveLog;
use super::responder::NackResponderBuilder;
use super::send_buffer::SendBuffer;
use super::*;
use crate::stream_info::RTCPFeedback;
use crate::{Interceptor, Packet, Registry, TaggedPacket};
use rtcp::transport_feedbacks::transport_layer_nack::{NackPair, TransportLayerNack};
use sansio::Protocol;
use shared::error::Result;
use std::time::{Duration, Instant};

fn nack_stream(ssrc: u32) -> StreamInfo {
    StreamInfo {
        ssrc,
        payload_type: 96,
        mime_type: "video/VP8".to_owned(),
        clock_rate: 90000,
        rtcp_feedback: vec![RTCPFeedback::new("nack", "")],
        ..Default::default()
    }
}

fn rtp(now: Instant, ssrc: u32, seq: u16, payload: &[u8]) -> TaggedPacket {
    TaggedPacket {
        now,
        transport: Default::default(),
        message: Packet::Rtp(rtp::Packet {
            header: rtp::header::Header {
                version: 2,
                ssrc,
                sequence_number: seq,
                timestamp: 3000,
                payload_type: 96,
                ..Default::default()
            },
            payload: payload.to_vec().into(),
            ..Default::default()
        }),
    }
}

fn nack(now: Instant, media_ssrc: u32, pairs: Vec<NackPair>) -> TaggedPacket {
    TaggedPacket {
        now,
        transport: Default::default(),
        message: Packet::Rtcp(vec![Box::new(TransportLayerNack {
            sender_ssrc: 1,
            media_ssrc,
            nacks: pairs,
        })]),
    }
}

fn nacked_seqs(msg: &TaggedPacket) -> Vec<u16> {
    crate::rtcp_packets_of::<TransportLayerNack>(msg)
        .flat_map(|n| n.nacks.iter().flat_map(|p| p.packet_list()))
        .collect()
}

#[test]
fn test_window_size_validation() {
    for size in [64u16, 128, 512, 4096, 32768] {
        assert!(validate_window_size(size).is_ok(), "{size}");
    }
    for size in [0u16, 1, 32, 63, 100, 1000, 65535] {
        assert!(validate_window_size(size).is_err(), "{size}");
    }
    assert!(ReceiveLog::new(96).is_err());
    assert!(SendBuffer::new(32).is_err());
}

#[test]
fn test_receive_log_reports_gaps() -> Result<()> {
    let mut log = ReceiveLog::new(128)?;
    for seq in [10u16, 11, 12, 14, 15, 18] {
        log.add(seq);
    }
    assert_eq!(log.missing_seq_numbers(0), vec![13, 16, 17]);
    assert_eq!(log.missing_seq_numbers(2), vec![13, 16]);
    assert!(log.contains(14));
    assert!(!log.contains(16));

    log.add(13);
    log.add(16);
    log.add(17);
    assert!(log.missing_seq_numbers(0).is_empty());
    Ok(())
}

#[test]
fn test_receive_log_wraps_around() -> Result<()> {
    let mut log = ReceiveLog::new(64)?;
    log.add(65534);
    log.add(65535);
    log.add(1);
    log.add(3);
    assert_eq!(log.missing_seq_numbers(0), vec![0, 2]);
    Ok(())
}

#[test]
fn test_receive_log_forgets_old_gaps() -> Result<()> {
    let mut log = ReceiveLog::new(64)?;
    log.add(0);
    log.add(2);
    // jump far beyond the window: the gap at 1 falls out of it
    log.add(200);
    let missing = log.missing_seq_numbers(0);
    assert!(!missing.contains(&1));
    assert!(missing.iter().all(|&s| 200 - s < 64));
    assert!(!log.contains(2));
    Ok(())
}

#[test]
fn test_send_buffer_window_edges() -> Result<()> {
    let size = 64u16;
    let mut buffer = SendBuffer::new(size)?;
    let n = 1000u16;
    for seq in 800..=n {
        buffer.add(rtp::Packet {
            header: rtp::header::Header {
                sequence_number: seq,
                ..Default::default()
            },
            ..Default::default()
        });
    }

    let oldest = n - size + 1;
    assert_eq!(
        buffer.get(oldest).map(|p| p.header.sequence_number),
        Some(oldest)
    );
    assert!(buffer.get(n - size).is_none());
    assert!(buffer.get(n).is_some());
    assert!(buffer.get(n + 1).is_none());
    Ok(())
}

#[test]
fn test_send_buffer_skipped_seqs_are_empty() -> Result<()> {
    let mut buffer = SendBuffer::new(64)?;
    for seq in [1u16, 2, 5] {
        buffer.add(rtp::Packet {
            header: rtp::header::Header {
                sequence_number: seq,
                ..Default::default()
            },
            ..Default::default()
        });
    }
    assert!(buffer.get(3).is_none());
    assert!(buffer.get(4).is_none());
    assert!(buffer.get(5).is_some());
    Ok(())
}

#[test]
fn test_stream_supports_nack() {
    assert!(stream_supports_nack(&nack_stream(1)));

    let pli_only = StreamInfo {
        rtcp_feedback: vec![RTCPFeedback::new("nack", "pli")],
        ..Default::default()
    };
    assert!(!stream_supports_nack(&pli_only));
    assert!(!stream_supports_nack(&StreamInfo::default()));
}

#[test]
fn test_generator_emits_nack_every_interval() -> Result<()> {
    let mut chain = Registry::new()
        .with(
            NackGeneratorBuilder::new()
                .with_size(64)
                .with_sender_ssrc(0xabcd)
                .build(),
        )
        .build();
    chain.bind_remote_stream(&nack_stream(5000));

    let start = Instant::now();
    assert!(chain.poll_timeout().is_none());

    for seq in [100u16, 101, 103, 106] {
        chain.handle_read(rtp(start, 5000, seq, b"x"))?;
        assert!(chain.poll_read().is_some());
    }

    let eto = chain.poll_timeout().expect("timer armed by first packet");
    assert_eq!(eto, start + Duration::from_millis(100));

    chain.handle_timeout(eto)?;
    let msg = chain.poll_write().expect("nack generated");
    assert_eq!(nacked_seqs(&msg), vec![102, 104, 105]);
    let n = crate::rtcp_packets_of::<TransportLayerNack>(&msg)
        .next()
        .expect("nack packet");
    assert_eq!(n.sender_ssrc, 0xabcd);
    assert_eq!(n.media_ssrc, 5000);
    assert!(chain.poll_write().is_none());

    // still missing: asked again next interval
    let next = eto + Duration::from_millis(100);
    assert_eq!(chain.poll_timeout(), Some(next));
    chain.handle_timeout(next)?;
    assert!(chain.poll_write().is_some());

    // repaired: nothing more to ask for
    for seq in [102u16, 104, 105] {
        chain.handle_read(rtp(next, 5000, seq, b"x"))?;
    }
    chain.handle_timeout(next + Duration::from_millis(100))?;
    assert!(chain.poll_write().is_none());
    Ok(())
}

#[test]
fn test_generator_skip_last_n_and_max_nacks() -> Result<()> {
    let mut chain = Registry::new()
        .with(
            NackGeneratorBuilder::new()
                .with_size(64)
                .with_skip_last_n(2)
                .with_max_nacks_per_packet(1)
                .build(),
        )
        .build();
    chain.bind_remote_stream(&nack_stream(1));

    let start = Instant::now();
    for seq in [1u16, 3, 5, 6] {
        chain.handle_read(rtp(start, 1, seq, b""))?;
    }

    let t = start + Duration::from_millis(100);
    chain.handle_timeout(t)?;
    let msg = chain.poll_write().expect("nack");
    // 6 and 5 are the newest two and not reported yet
    assert_eq!(nacked_seqs(&msg), vec![2, 4]);

    chain.handle_read(rtp(t, 1, 9, b""))?;
    chain.handle_timeout(t + Duration::from_millis(100))?;
    let msg = chain.poll_write().expect("nack");
    // 2 and 4 were already asked for once
    assert_eq!(nacked_seqs(&msg), vec![7]);
    Ok(())
}

#[test]
fn test_generator_ignores_streams_without_nack() -> Result<()> {
    let mut chain = Registry::new()
        .with(NackGeneratorBuilder::new().build())
        .build();
    chain.bind_remote_stream(&StreamInfo {
        ssrc: 7,
        ..Default::default()
    });

    let start = Instant::now();
    chain.handle_read(rtp(start, 7, 1, b""))?;
    chain.handle_read(rtp(start, 7, 10, b""))?;
    assert!(chain.poll_timeout().is_none());
    chain.handle_timeout(start + Duration::from_secs(1))?;
    assert!(chain.poll_write().is_none());
    Ok(())
}

#[test]
fn test_responder_resends_buffered_packets() -> Result<()> {
    let mut chain = Registry::new()
        .with(NackResponderBuilder::new().with_size(64).build())
        .build();
    chain.bind_local_stream(&nack_stream(42));

    let now = Instant::now();
    for seq in 10u16..20 {
        chain.handle_write(rtp(now, 42, seq, &[seq as u8]))?;
        assert!(chain.poll_write().is_some());
    }

    // 11 plus 13 via the bitmap
    chain.handle_read(nack(
        now,
        42,
        vec![NackPair {
            packet_id: 11,
            lost_packets: 0b10,
        }],
    ))?;
    assert!(chain.poll_read().is_some());

    let mut resent = vec![];
    while let Some(msg) = chain.poll_write() {
        let Packet::Rtp(p) = msg.message else {
            panic!("expected rtp");
        };
        assert_eq!(p.header.ssrc, 42);
        assert_eq!(p.payload[0] as u16, p.header.sequence_number);
        resent.push(p.header.sequence_number);
    }
    assert_eq!(resent, vec![11, 13]);
    Ok(())
}

#[test]
fn test_responder_wraps_rtx() -> Result<()> {
    let mut chain = Registry::new()
        .with(NackResponderBuilder::new().with_size(64).build())
        .build();
    let mut info = nack_stream(42);
    info.ssrc_rtx = Some(43);
    info.payload_type_rtx = Some(97);
    chain.bind_local_stream(&info);

    let now = Instant::now();
    for seq in [500u16, 501] {
        chain.handle_write(rtp(now, 42, seq, b"media"))?;
        chain.poll_write();
    }

    chain.handle_read(nack(
        now,
        42,
        vec![NackPair {
            packet_id: 500,
            lost_packets: 1,
        }],
    ))?;

    let mut rtx_seqs = vec![];
    for osn in [500u16, 501] {
        let Some(TaggedPacket {
            message: Packet::Rtp(p),
            ..
        }) = chain.poll_write()
        else {
            panic!("expected rtx packet");
        };
        assert_eq!(p.header.ssrc, 43);
        assert_eq!(p.header.payload_type, 97);
        assert_eq!(p.header.timestamp, 3000);
        assert_eq!(&p.payload[..2], &osn.to_be_bytes());
        assert_eq!(&p.payload[2..], b"media");
        rtx_seqs.push(p.header.sequence_number);
    }
    assert_eq!(rtx_seqs[1], rtx_seqs[0].wrapping_add(1));
    Ok(())
}

#[test]
fn test_responder_ignores_unknown_and_expired() -> Result<()> {
    let mut chain = Registry::new()
        .with(NackResponderBuilder::new().with_size(64).build())
        .build();
    chain.bind_local_stream(&nack_stream(42));

    let now = Instant::now();
    for seq in 0u16..200 {
        chain.handle_write(rtp(now, 42, seq, b""))?;
        chain.poll_write();
    }

    chain.handle_read(nack(now, 42, vec![NackPair::new(10)]))?;
    chain.handle_read(nack(now, 99, vec![NackPair::new(150)]))?;
    assert!(chain.poll_write().is_none());
    Ok(())
}

#[test]
fn test_generator_and_responder_recover_loss() -> Result<()> {
    let mut sender = Registry::new()
        .with(NackResponderBuilder::new().with_size(64).build())
        .build();
    let mut receiver = Registry::new()
        .with(NackGeneratorBuilder::new().with_size(64).build())
        .build();
    sender.bind_local_stream(&nack_stream(9));
    receiver.bind_remote_stream(&nack_stream(9));

    let now = Instant::now();
    for seq in 0u16..10 {
        sender.handle_write(rtp(now, 9, seq, &[seq as u8]))?;
        let msg = sender.poll_write().expect("sent");
        if seq != 4 {
            receiver.handle_read(msg)?;
            receiver.poll_read();
        }
    }

    receiver.handle_timeout(now + Duration::from_millis(100))?;
    let request = receiver.poll_write().expect("nack");
    sender.handle_read(request)?;
    sender.poll_read();

    let resent = sender.poll_write().expect("retransmission");
    receiver.handle_read(resent)?;
    let Some(TaggedPacket {
        message: Packet::Rtp(p),
        ..
    }) = receiver.poll_read()
    else {
        panic!("expected rtp");
    };
    assert_eq!(p.header.sequence_number, 4);

    receiver.handle_timeout(now + Duration::from_millis(200))?;
    assert!(receiver.poll_write().is_none());
    Ok(())
}
