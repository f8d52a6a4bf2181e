//! Helpers that add the standard interceptors to a [`Registry`] and register
//! the RTCP feedback, header extensions and codecs they rely on.
//!
//! Each helper wraps the chain it is given, so the order of the calls is the
//! order packets are seen in on write, from the last helper inwards.

use interceptor::{
    FlexFecDecoderBuilder, FlexFecEncoderBuilder, Interceptor, NackGeneratorBuilder,
    NackResponderBuilder, ReceiverReportBuilder, Registry, SenderReportBuilder,
    TwccReceiverBuilder, TwccSenderBuilder,
};
use shared::error::Result;

use crate::peer_connection::configuration::media_engine::{MIME_TYPE_FLEX_FEC03, MediaEngine};
use crate::rtp_transceiver::rtp_sender::rtcp_parameters::{
    TYPE_RTCP_FB_NACK, TYPE_RTCP_FB_TRANSPORT_CC,
};
use crate::rtp_transceiver::rtp_sender::{
    RTCPFeedback, RTCRtpCodec, RTCRtpCodecParameters, RTCRtpHeaderExtensionCapability,
    RTCRtpHeaderExtensionParameters, RtpCodecKind,
};
use crate::rtp_transceiver::{PayloadType, SSRC};

/// Payload type `video/flexfec-03` is registered under.
pub const FLEXFEC_PAYLOAD_TYPE: PayloadType = 118;
/// Media packets per FlexFEC protection group.
pub const FLEXFEC_NUM_MEDIA_PACKETS: usize = 5;
/// Repair packets per FlexFEC protection group.
pub const FLEXFEC_NUM_FEC_PACKETS: usize = 2;

/// NACK, RTCP reports and TWCC feedback generation.
pub fn register_default_interceptors<P>(
    registry: Registry<P>,
    media_engine: &mut MediaEngine,
) -> Result<Registry<impl Interceptor + use<P>>>
where
    P: Interceptor,
{
    let registry = configure_nack(registry, media_engine);

    let registry = configure_rtcp_reports(registry);

    let registry = configure_twcc_receiver_only(registry, media_engine)?;

    Ok(registry)
}

/// Generates NACKs for missing inbound packets and resends outbound ones
/// that were NACKed. Announces `nack` and `nack pli` on video codecs.
pub fn configure_nack<P>(
    registry: Registry<P>,
    media_engine: &mut MediaEngine,
) -> Registry<impl Interceptor + use<P>>
where
    P: Interceptor,
{
    media_engine.register_feedback(
        RTCPFeedback {
            typ: TYPE_RTCP_FB_NACK.to_owned(),
            parameter: "".to_owned(),
        },
        RtpCodecKind::Video,
    );
    media_engine.register_feedback(
        RTCPFeedback {
            typ: TYPE_RTCP_FB_NACK.to_owned(),
            parameter: "pli".to_owned(),
        },
        RtpCodecKind::Video,
    );

    registry
        .with(NackGeneratorBuilder::new().build())
        .with(NackResponderBuilder::new().build())
}

/// Sender and Receiver Reports.
pub fn configure_rtcp_reports<P>(registry: Registry<P>) -> Registry<impl Interceptor + use<P>>
where
    P: Interceptor,
{
    registry
        .with(ReceiverReportBuilder::new().build())
        .with(SenderReportBuilder::new().build())
}

fn register_twcc(media_engine: &mut MediaEngine) -> Result<()> {
    for kind in [RtpCodecKind::Video, RtpCodecKind::Audio] {
        media_engine.register_feedback(
            RTCPFeedback {
                typ: TYPE_RTCP_FB_TRANSPORT_CC.to_owned(),
                ..Default::default()
            },
            kind,
        );
        media_engine.register_header_extension(
            RTCRtpHeaderExtensionCapability {
                uri: sdp::extmap::TRANSPORT_CC_URI.to_owned(),
            },
            kind,
            None,
        )?;
    }
    Ok(())
}

/// Stamps transport-wide sequence numbers on outbound packets and sends
/// TWCC feedback for inbound ones.
pub fn configure_twcc<P>(
    registry: Registry<P>,
    media_engine: &mut MediaEngine,
) -> Result<Registry<impl Interceptor + use<P>>>
where
    P: Interceptor,
{
    register_twcc(media_engine)?;

    Ok(registry
        .with(TwccSenderBuilder::new().build())
        .with(TwccReceiverBuilder::new().build()))
}

pub fn configure_twcc_sender_only<P>(
    registry: Registry<P>,
    media_engine: &mut MediaEngine,
) -> Result<Registry<impl Interceptor + use<P>>>
where
    P: Interceptor,
{
    register_twcc(media_engine)?;

    Ok(registry.with(TwccSenderBuilder::new().build()))
}

pub fn configure_twcc_receiver_only<P>(
    registry: Registry<P>,
    media_engine: &mut MediaEngine,
) -> Result<Registry<impl Interceptor + use<P>>>
where
    P: Interceptor,
{
    register_twcc(media_engine)?;

    Ok(registry.with(TwccReceiverBuilder::new().build()))
}

/// FlexFEC-03 protection of video streams: every 5 media packets are
/// followed by 2 repair packets on their own SSRC, and inbound repair
/// packets restore lost media before it reaches the receiver.
///
/// Registers `video/flexfec-03` under payload type 118. Add it before
/// anything that rewrites outbound packets, such as TWCC, so repairs are
/// computed over the packets as they are sent.
pub fn configure_flexfec<P>(
    registry: Registry<P>,
    media_engine: &mut MediaEngine,
) -> Result<Registry<impl Interceptor + use<P>>>
where
    P: Interceptor,
{
    media_engine.register_codec(
        RTCRtpCodecParameters {
            rtp_codec: RTCRtpCodec {
                mime_type: MIME_TYPE_FLEX_FEC03.to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: "repair-window=10000000".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: FLEXFEC_PAYLOAD_TYPE,
        },
        RtpCodecKind::Video,
    )?;

    Ok(registry
        .with(
            FlexFecEncoderBuilder::new()
                .with_num_media_packets(FLEXFEC_NUM_MEDIA_PACKETS)
                .with_num_fec_packets(FLEXFEC_NUM_FEC_PACKETS)
                .build(),
        )
        .with(FlexFecDecoderBuilder::new().build()))
}

/// What interceptors learn about a stream when it is bound.
#[allow(clippy::too_many_arguments)]
pub(crate) fn create_stream_info(
    id: String,
    ssrc: SSRC,
    ssrc_rtx: Option<SSRC>,
    ssrc_fec: Option<SSRC>,
    payload_type: PayloadType,
    payload_type_rtx: Option<PayloadType>,
    payload_type_fec: Option<PayloadType>,
    codec: &RTCRtpCodec,
    header_extensions: &[RTCRtpHeaderExtensionParameters],
) -> interceptor::StreamInfo {
    let rtp_header_extensions = header_extensions
        .iter()
        .map(|h| interceptor::RTPHeaderExtension {
            id: h.id,
            uri: h.uri.clone(),
        })
        .collect();

    let rtcp_feedback = codec
        .rtcp_feedback
        .iter()
        .map(|f| interceptor::RTCPFeedback {
            typ: f.typ.clone(),
            parameter: f.parameter.clone(),
        })
        .collect();

    interceptor::StreamInfo {
        id,
        ssrc,
        ssrc_rtx,
        ssrc_fec,
        payload_type,
        payload_type_rtx,
        payload_type_fec,
        rtp_header_extensions,
        mime_type: codec.mime_type.clone(),
        clock_rate: codec.clock_rate,
        channels: codec.channels,
        sdp_fmtp_line: codec.sdp_fmtp_line.clone(),
        rtcp_feedback,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peer_connection::configuration::media_engine::MIME_TYPE_VP8;

    #[test]
    fn test_configure_nack_registers_feedback() -> Result<()> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let _registry = configure_nack(Registry::new(), &mut media_engine);

        let vp8 = media_engine
            .video_codecs
            .iter()
            .find(|c| c.rtp_codec.mime_type == MIME_TYPE_VP8)
            .cloned()
            .unwrap_or_default();
        assert!(vp8.rtp_codec.rtcp_feedback.contains(&RTCPFeedback {
            typ: "nack".to_owned(),
            parameter: "pli".to_owned(),
        }));
        Ok(())
    }

    #[test]
    fn test_configure_twcc_registers_extension() -> Result<()> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let _registry = configure_twcc(Registry::new(), &mut media_engine)?;

        assert!(
            media_engine
                .header_extensions
                .iter()
                .any(|ext| ext.uri == sdp::extmap::TRANSPORT_CC_URI && ext.is_audio && ext.is_video)
        );
        Ok(())
    }

    #[test]
    fn test_configure_flexfec_registers_codec() -> Result<()> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let _registry = configure_flexfec(Registry::new(), &mut media_engine)?;

        let flexfec = media_engine
            .video_codecs
            .iter()
            .find(|c| c.rtp_codec.mime_type == MIME_TYPE_FLEX_FEC03);
        assert_eq!(flexfec.map(|c| c.payload_type), Some(FLEXFEC_PAYLOAD_TYPE));
        assert_eq!(
            flexfec.map(|c| c.rtp_codec.sdp_fmtp_line.as_str()),
            Some("repair-window=10000000")
        );
        Ok(())
    }

    #[test]
    fn test_create_stream_info() {
        let codec = RTCRtpCodec {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            rtcp_feedback: vec![RTCPFeedback {
                typ: "nack".to_owned(),
                parameter: "".to_owned(),
            }],
            ..Default::default()
        };
        let info = create_stream_info(
            "video".to_owned(),
            1234,
            None,
            Some(5678),
            96,
            None,
            Some(FLEXFEC_PAYLOAD_TYPE),
            &codec,
            &[RTCRtpHeaderExtensionParameters {
                uri: sdp::extmap::TRANSPORT_CC_URI.to_owned(),
                id: 3,
                ..Default::default()
            }],
        );

        assert_eq!(info.ssrc, 1234);
        assert_eq!(info.ssrc_fec, Some(5678));
        assert_eq!(info.payload_type_fec, Some(FLEXFEC_PAYLOAD_TYPE));
        assert!(info.has_feedback("nack", ""));
        assert_eq!(info.header_extension_id(sdp::extmap::TRANSPORT_CC_URI), Some(3));
    }
}
