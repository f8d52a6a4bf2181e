/// A VP8 stream protected with FlexFEC survives the loss of two out of
/// every five media packets: the receiver recovers all of them from the
/// repair packets.
mod common;

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use bytes::Bytes;
use rtc::interceptor::{Interceptor, Packet, Registry, StreamInfo, TaggedPacket};
use rtc::media_stream::track::MediaStreamTrack;
use rtc::peer_connection::configuration::RTCConfigurationBuilder;
use rtc::peer_connection::configuration::interceptor_registry::{
    FLEXFEC_PAYLOAD_TYPE, configure_flexfec,
};
use rtc::peer_connection::configuration::media_engine::{MIME_TYPE_VP8, MediaEngine};
use rtc::peer_connection::event::RTCPeerConnectionEvent;
use rtc::rtp_transceiver::rtp_sender::{RTCRtpCodec, RTCRtpCodecParameters, RtpCodecKind};
use rtc::shared::error::{Error, Result};

use common::{ANSWERER_ADDR, OFFERER_ADDR, Peer, connect, init_logger, run_until};

const NUM_PACKETS: u16 = 200;

/// Drops media packets whose sequence number is 0 or 1 modulo 5 on the
/// way out. Repair packets are generated outside of it and pass.
#[derive(Default)]
struct DropInterceptor {
    media_ssrcs: HashSet<u32>,
    dropped: usize,
    read_queue: VecDeque<TaggedPacket>,
    write_queue: VecDeque<TaggedPacket>,
}

impl rtc::sansio::Protocol<TaggedPacket, TaggedPacket, ()> for DropInterceptor {
    type Rout = TaggedPacket;
    type Wout = TaggedPacket;
    type Eout = ();
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedPacket) -> Result<()> {
        self.read_queue.push_back(msg);
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.read_queue.pop_front()
    }

    fn handle_write(&mut self, msg: TaggedPacket) -> Result<()> {
        if let Packet::Rtp(packet) = &msg.message {
            let seq = packet.header.sequence_number;
            if self.media_ssrcs.contains(&packet.header.ssrc) && seq % 5 <= 1 {
                log::debug!("dropping media packet seq={seq}");
                self.dropped += 1;
                return Ok(());
            }
        }
        self.write_queue.push_back(msg);
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.write_queue.pop_front()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        None
    }

    fn handle_timeout(&mut self, _now: Instant) -> Result<()> {
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        None
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Interceptor for DropInterceptor {
    fn bind_local_stream(&mut self, info: &StreamInfo) {
        self.media_ssrcs.insert(info.ssrc);
    }

    fn unbind_local_stream(&mut self, info: &StreamInfo) {
        self.media_ssrcs.remove(&info.ssrc);
    }

    fn bind_remote_stream(&mut self, _info: &StreamInfo) {}

    fn unbind_remote_stream(&mut self, _info: &StreamInfo) {}
}

fn vp8() -> RTCRtpCodec {
    RTCRtpCodec {
        mime_type: MIME_TYPE_VP8.to_owned(),
        clock_rate: 90000,
        ..Default::default()
    }
}

fn vp8_media_engine() -> Result<MediaEngine> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_codec(
        RTCRtpCodecParameters {
            rtp_codec: vp8(),
            payload_type: 96,
        },
        RtpCodecKind::Video,
    )?;
    Ok(media_engine)
}

#[test]
fn test_flexfec_recovers_dropped_packets() -> Result<()> {
    init_logger();

    let mut offerer_media_engine = vp8_media_engine()?;
    let offerer_registry = configure_flexfec(
        Registry::from(DropInterceptor::default()),
        &mut offerer_media_engine,
    )?;
    let mut offerer = Peer::new(
        "offerer",
        RTCConfigurationBuilder::new()
            .with_media_engine(offerer_media_engine)
            .with_interceptor_registry(offerer_registry)
            .build(),
        OFFERER_ADDR,
    )?;

    let mut answerer_media_engine = vp8_media_engine()?;
    let answerer_registry = configure_flexfec(Registry::new(), &mut answerer_media_engine)?;
    let mut answerer = Peer::new(
        "answerer",
        RTCConfigurationBuilder::new()
            .with_media_engine(answerer_media_engine)
            .with_interceptor_registry(answerer_registry)
            .build(),
        ANSWERER_ADDR,
    )?;

    let sender_id = offerer.pc.add_track(MediaStreamTrack::new(
        "stream".to_owned(),
        "video".to_owned(),
        "video".to_owned(),
        RtpCodecKind::Video,
        vp8(),
    ))?;

    let mut now = Instant::now();
    connect(&mut offerer, &mut answerer, &mut now)?;

    let offer = offerer
        .pc
        .current_local_description()
        .expect("offer applied");
    assert!(offer.sdp.contains("flexfec-03"), "{}", offer.sdp);
    assert!(offer.sdp.contains("FEC-FR"), "{}", offer.sdp);

    log::info!("writing {NUM_PACKETS} packets");
    {
        let mut sender = offerer.pc.rtp_sender(sender_id).expect("sender");
        for seq in 0..NUM_PACKETS {
            sender.write_rtp(rtc::rtp::Packet {
                header: rtc::rtp::header::Header {
                    version: 2,
                    marker: true,
                    sequence_number: seq,
                    timestamp: u32::from(seq) * 3000,
                    ..Default::default()
                },
                payload: Bytes::from(vec![seq as u8; 100]),
                ..Default::default()
            })?;
        }
    }

    let recovered = run_until(
        &mut offerer,
        &mut answerer,
        &mut now,
        Duration::from_secs(5),
        |_, a| {
            let media = a
                .rtp_packets()
                .filter(|p| p.header.payload_type != FLEXFEC_PAYLOAD_TYPE)
                .count();
            Ok(media >= NUM_PACKETS as usize)
        },
    )?;

    let received: HashSet<u16> = answerer
        .rtp_packets()
        .filter(|p| p.header.payload_type != FLEXFEC_PAYLOAD_TYPE)
        .map(|p| p.header.sequence_number)
        .collect();
    log::info!("answerer holds {} distinct media packets", received.len());
    assert!(recovered, "only {} packets arrived", received.len());
    assert_eq!(received.len(), NUM_PACKETS as usize);
    for packet in answerer.rtp_packets() {
        let seq = packet.header.sequence_number;
        assert_eq!(packet.payload, Bytes::from(vec![seq as u8; 100]), "seq {seq}");
    }

    assert!(
        answerer
            .events
            .iter()
            .any(|event| matches!(event, RTCPeerConnectionEvent::OnTrack(_)))
    );
    Ok(())
}
