use datachannel::message::message_channel_open::CHANNEL_PRIORITY_NORMAL;
use datachannel::{DataChannel, DataChannelConfig};
use sctp::Stream;
use shared::error::Result;

use crate::data_channel::RTCDataChannelId;
use crate::data_channel::state::RTCDataChannelState;

/// Per channel bookkeeping of a peer connection. `data_channel` is None
/// until the SCTP association is up and the channel was dialed or accepted.
#[derive(Default, Debug, Clone)]
pub(crate) struct RTCDataChannelInternal {
    pub(crate) id: RTCDataChannelId,
    pub(crate) label: String,
    pub(crate) ordered: bool,
    pub(crate) max_packet_life_time: Option<u16>,
    pub(crate) max_retransmits: Option<u16>,
    pub(crate) protocol: String,
    pub(crate) negotiated: bool,
    pub(crate) ready_state: RTCDataChannelState,
    pub(crate) buffered_amount_low_threshold: usize,

    pub(crate) data_channel: Option<DataChannel>,
}

impl RTCDataChannelInternal {
    pub(crate) fn new(
        id: RTCDataChannelId,
        label: String,
        ordered: bool,
        max_packet_life_time: Option<u16>,
        max_retransmits: Option<u16>,
        protocol: String,
        negotiated: bool,
    ) -> Self {
        Self {
            id,
            label,
            ordered,
            max_packet_life_time,
            max_retransmits,
            protocol,
            negotiated,
            ready_state: RTCDataChannelState::Connecting,
            buffered_amount_low_threshold: 0,
            data_channel: None,
        }
    }

    /// Opens the channel on a locally created stream. Negotiated channels
    /// are open right away, others once the peer acknowledges.
    pub(crate) fn dial(&mut self, stream: &mut Stream<'_>) -> Result<()> {
        let (channel_type, reliability_parameter) =
            DataChannel::get_channel_type_and_reliability_parameter(
                self.ordered,
                self.max_retransmits,
                self.max_packet_life_time,
            );

        let config = DataChannelConfig {
            channel_type,
            negotiated: self.negotiated,
            priority: CHANNEL_PRIORITY_NORMAL,
            reliability_parameter,
            label: self.label.clone(),
            protocol: self.protocol.clone(),
        };

        let data_channel = DataChannel::dial(config, stream)?;
        if self.buffered_amount_low_threshold > 0 {
            data_channel
                .set_buffered_amount_low_threshold(stream, self.buffered_amount_low_threshold)?;
        }

        self.ready_state = data_channel.state().into();
        self.data_channel = Some(data_channel);

        Ok(())
    }

    /// Accepts a channel the peer opened with DATA_CHANNEL_OPEN.
    pub(crate) fn accept(stream: &mut Stream<'_>) -> Result<Self> {
        let data_channel = DataChannel::accept(DataChannelConfig::default(), stream)?;

        let config = data_channel.config();
        let (unordered, reliability_type) =
            DataChannel::get_reliability_params(config.channel_type);
        let (max_retransmits, max_packet_life_time) = match reliability_type {
            sctp::ReliabilityType::Rexmit => (Some(config.reliability_parameter as u16), None),
            sctp::ReliabilityType::Timed => (None, Some(config.reliability_parameter as u16)),
            sctp::ReliabilityType::Reliable => (None, None),
        };

        let mut internal = RTCDataChannelInternal::new(
            stream.stream_identifier(),
            config.label.clone(),
            !unordered,
            max_packet_life_time,
            max_retransmits,
            config.protocol.clone(),
            false,
        );
        internal.ready_state = data_channel.state().into();
        internal.data_channel = Some(data_channel);

        Ok(internal)
    }
}
