use super::receiver::ReceiverReportBuilder;
use super::sender::SenderReportBuilder;
use crate::{Interceptor, Packet, Registry, StreamInfo, TaggedPacket, rtcp_packets_of};
use rtcp::receiver_report::ReceiverReport;
use rtcp::reception_report::ReceptionReport;
use rtcp::sender_report::SenderReport;
use sansio::Protocol;
use shared::error::Result;
use shared::time::{SystemInstant, ntp_middle32};
use std::time::{Duration, Instant};

fn video_stream(ssrc: u32) -> StreamInfo {
    StreamInfo {
        ssrc,
        payload_type: 96,
        mime_type: "video/VP8".to_owned(),
        clock_rate: 90000,
        ..Default::default()
    }
}

fn rtp(now: Instant, ssrc: u32, seq: u16, timestamp: u32, payload_len: usize) -> TaggedPacket {
    TaggedPacket {
        now,
        transport: Default::default(),
        message: Packet::Rtp(rtp::Packet {
            header: rtp::header::Header {
                version: 2,
                ssrc,
                sequence_number: seq,
                timestamp,
                ..Default::default()
            },
            payload: vec![0u8; payload_len].into(),
            ..Default::default()
        }),
    }
}

fn single_reception_report(msg: &TaggedPacket) -> ReceptionReport {
    let rr = rtcp_packets_of::<ReceiverReport>(msg)
        .next()
        .expect("receiver report");
    assert_eq!(rr.reports.len(), 1);
    rr.reports[0].clone()
}

#[test]
fn test_sender_report_counts_and_clocks() -> Result<()> {
    let start = Instant::now();
    let wall = Duration::from_secs(1_700_000_000);
    let mut chain = Registry::new()
        .with(
            SenderReportBuilder::new()
                .with_time_baseline(SystemInstant::new(start, wall))
                .build(),
        )
        .build();
    chain.bind_local_stream(&video_stream(1111));

    assert!(chain.poll_timeout().is_none());

    // two packets of one frame, then the first packet of the next
    chain.handle_write(rtp(start, 1111, 1, 1000, 100))?;
    chain.handle_write(rtp(start + Duration::from_millis(5), 1111, 2, 1000, 100))?;
    chain.handle_write(rtp(start + Duration::from_millis(500), 1111, 3, 46000, 50))?;
    for _ in 0..3 {
        assert!(chain.poll_write().is_some());
    }

    let eto = chain.poll_timeout().expect("armed");
    assert_eq!(eto, start + Duration::from_secs(1));
    chain.handle_timeout(eto)?;

    let msg = chain.poll_write().expect("sender report");
    let sr = rtcp_packets_of::<SenderReport>(&msg)
        .next()
        .expect("sender report");
    assert_eq!(sr.ssrc, 1111);
    assert_eq!(sr.packet_count, 3);
    assert_eq!(sr.octet_count, 250);
    assert_eq!(
        sr.ntp_time,
        SystemInstant::unix2ntp(wall + Duration::from_secs(1))
    );
    // 46000 + 0.5 s at 90 kHz
    assert!(sr.rtp_time.abs_diff(91000) <= 1, "{}", sr.rtp_time);
    assert!(chain.poll_write().is_none());
    Ok(())
}

#[test]
fn test_sender_report_ignores_unbound_and_silent_streams() -> Result<()> {
    let start = Instant::now();
    let mut chain = Registry::new()
        .with(SenderReportBuilder::new().build())
        .build();
    chain.bind_local_stream(&video_stream(1));
    chain.bind_local_stream(&video_stream(2));

    chain.handle_write(rtp(start, 1, 0, 0, 10))?;
    chain.handle_write(rtp(start, 99, 0, 0, 10))?;
    while chain.poll_write().is_some() {}

    chain.handle_timeout(start + Duration::from_secs(1))?;
    let reports: Vec<u32> = std::iter::from_fn(|| chain.poll_write())
        .flat_map(|m| {
            rtcp_packets_of::<SenderReport>(&m)
                .map(|sr| sr.ssrc)
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(reports, vec![1]);
    Ok(())
}

#[test]
fn test_receiver_report_loss_and_lsr() -> Result<()> {
    let start = Instant::now();
    let mut chain = Registry::new()
        .with(ReceiverReportBuilder::new().with_receiver_ssrc(42).build())
        .build();
    chain.bind_remote_stream(&video_stream(2222));

    for seq in (0u16..10).filter(|s| *s != 3 && *s != 7) {
        chain.handle_read(rtp(start, 2222, seq, u32::from(seq) * 3000, 10))?;
    }

    let sr_at = start + Duration::from_millis(500);
    let sr_ntp = SystemInstant::unix2ntp(Duration::from_secs(1_700_000_000));
    chain.handle_read(TaggedPacket {
        now: sr_at,
        transport: Default::default(),
        message: Packet::Rtcp(vec![Box::new(SenderReport {
            ssrc: 2222,
            ntp_time: sr_ntp,
            ..Default::default()
        })]),
    })?;
    while chain.poll_read().is_some() {}

    chain.handle_timeout(start + Duration::from_secs(1))?;
    let msg = chain.poll_write().expect("receiver report");
    let rr = rtcp_packets_of::<ReceiverReport>(&msg)
        .next()
        .expect("receiver report");
    assert_eq!(rr.ssrc, 42);
    let report = single_reception_report(&msg);
    assert_eq!(report.ssrc, 2222);
    assert_eq!(report.last_sequence_number, 9);
    assert_eq!(report.total_lost, 2);
    assert_eq!(report.fraction_lost, (2 * 256 / 10) as u8);
    assert_eq!(report.last_sender_report, ntp_middle32(sr_ntp));
    assert_eq!(report.delay, 32768);

    // a clean interval: loss fraction resets, the cumulative count stays
    let next = start + Duration::from_millis(1500);
    for seq in 10u16..20 {
        chain.handle_read(rtp(next, 2222, seq, u32::from(seq) * 3000, 10))?;
    }
    chain.handle_timeout(start + Duration::from_secs(2))?;
    let report = single_reception_report(&chain.poll_write().expect("receiver report"));
    assert_eq!(report.last_sequence_number, 19);
    assert_eq!(report.total_lost, 2);
    assert_eq!(report.fraction_lost, 0);
    Ok(())
}

#[test]
fn test_receiver_report_sequence_wrap() -> Result<()> {
    let start = Instant::now();
    let mut chain = Registry::new()
        .with(ReceiverReportBuilder::new().build())
        .build();
    chain.bind_remote_stream(&video_stream(5));

    for seq in [65534u16, 65535, 0, 1] {
        chain.handle_read(rtp(start, 5, seq, 0, 1))?;
    }
    chain.handle_timeout(start + Duration::from_secs(1))?;
    let report = single_reception_report(&chain.poll_write().expect("receiver report"));
    assert_eq!(report.last_sequence_number, (1 << 16) | 1);
    assert_eq!(report.total_lost, 0);
    Ok(())
}

#[test]
fn test_receiver_report_jitter() -> Result<()> {
    let start = Instant::now();
    let mut chain = Registry::new()
        .with(ReceiverReportBuilder::new().build())
        .build();
    chain.bind_remote_stream(&video_stream(5));

    // 20 ms apart in both clocks: no jitter
    for i in 0u16..10 {
        let at = start + Duration::from_millis(20 * u64::from(i));
        chain.handle_read(rtp(at, 5, i, u32::from(i) * 1800, 1))?;
    }
    chain.handle_timeout(start + Duration::from_secs(1))?;
    let report = single_reception_report(&chain.poll_write().expect("receiver report"));
    assert_eq!(report.jitter, 0);

    // one packet 10 ms late
    let at = start + Duration::from_millis(20 * 10 + 10);
    chain.handle_read(rtp(at, 5, 10, 10 * 1800, 1))?;
    chain.handle_timeout(start + Duration::from_secs(2))?;
    let report = single_reception_report(&chain.poll_write().expect("receiver report"));
    // |D| = 900 timestamp units, J = 900 / 16
    assert!(report.jitter.abs_diff(56) <= 1, "{}", report.jitter);
    Ok(())
}

#[test]
fn test_no_reports_before_media() -> Result<()> {
    let start = Instant::now();
    let mut chain = Registry::new()
        .with(ReceiverReportBuilder::new().build())
        .with(SenderReportBuilder::new().build())
        .build();
    chain.bind_remote_stream(&video_stream(1));
    chain.bind_local_stream(&video_stream(2));

    assert!(chain.poll_timeout().is_none());
    chain.handle_timeout(start + Duration::from_secs(5))?;
    assert!(chain.poll_write().is_none());
    Ok(())
}
