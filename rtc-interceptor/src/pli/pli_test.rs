use super::*;
use crate::{Interceptor, Packet, RTCPFeedback, Registry, StreamInfo, TaggedPacket, rtcp_packets_of};
use rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use sansio::Protocol;
use shared::error::Result;
use std::time::{Duration, Instant};

fn video_stream(ssrc: u32) -> StreamInfo {
    StreamInfo {
        ssrc,
        mime_type: "video/VP8".to_owned(),
        clock_rate: 90000,
        rtcp_feedback: vec![RTCPFeedback::new("nack", "pli")],
        ..Default::default()
    }
}

fn rtp(now: Instant, ssrc: u32) -> TaggedPacket {
    TaggedPacket {
        now,
        transport: Default::default(),
        message: Packet::Rtp(rtp::Packet {
            header: rtp::header::Header {
                version: 2,
                ssrc,
                ..Default::default()
            },
            ..Default::default()
        }),
    }
}

fn pli_targets(msg: &TaggedPacket) -> Vec<u32> {
    rtcp_packets_of::<PictureLossIndication>(msg)
        .map(|pli| pli.media_ssrc)
        .collect()
}

#[test]
fn test_pli_on_first_packet_then_every_interval() -> Result<()> {
    let mut chain = Registry::new()
        .with(
            PliGeneratorBuilder::new()
                .with_interval(Duration::from_secs(1))
                .with_sender_ssrc(5)
                .build(),
        )
        .build();
    chain.bind_remote_stream(&video_stream(10));
    chain.bind_remote_stream(&video_stream(20));

    let start = Instant::now();
    assert!(chain.poll_timeout().is_none());

    chain.handle_read(rtp(start, 10))?;
    let msg = chain.poll_write().expect("pli");
    assert_eq!(pli_targets(&msg), vec![10]);
    let pli = rtcp_packets_of::<PictureLossIndication>(&msg)
        .next()
        .expect("pli");
    assert_eq!(pli.sender_ssrc, 5);

    // a second packet of the same stream asks for nothing
    chain.handle_read(rtp(start, 10))?;
    while chain.poll_read().is_some() {}
    assert!(chain.poll_write().is_none());

    chain.handle_read(rtp(start + Duration::from_millis(10), 20))?;
    assert_eq!(pli_targets(&chain.poll_write().expect("pli")), vec![20]);

    assert_eq!(chain.poll_timeout(), Some(start + Duration::from_secs(1)));
    chain.handle_timeout(start + Duration::from_millis(500))?;
    assert!(chain.poll_write().is_none());

    chain.handle_timeout(start + Duration::from_secs(1))?;
    assert_eq!(pli_targets(&chain.poll_write().expect("pli")), vec![10, 20]);
    assert_eq!(chain.poll_timeout(), Some(start + Duration::from_secs(2)));
    Ok(())
}

#[test]
fn test_pli_requires_negotiated_feedback() -> Result<()> {
    let mut chain = Registry::new()
        .with(PliGeneratorBuilder::new().build())
        .build();
    chain.bind_remote_stream(&StreamInfo {
        ssrc: 10,
        rtcp_feedback: vec![RTCPFeedback::new("nack", "")],
        ..Default::default()
    });

    let now = Instant::now();
    chain.handle_read(rtp(now, 10))?;
    chain.handle_read(rtp(now, 11))?;
    assert!(chain.poll_write().is_none());
    assert!(chain.poll_timeout().is_none());
    Ok(())
}

#[test]
fn test_pli_stops_after_unbind() -> Result<()> {
    let mut chain = Registry::new()
        .with(PliGeneratorBuilder::new().build())
        .build();
    let info = video_stream(10);
    chain.bind_remote_stream(&info);

    let now = Instant::now();
    chain.handle_read(rtp(now, 10))?;
    assert!(chain.poll_write().is_some());

    chain.unbind_remote_stream(&info);
    assert!(chain.poll_timeout().is_none());
    chain.handle_timeout(now + Duration::from_secs(10))?;
    assert!(chain.poll_write().is_none());
    Ok(())
}
