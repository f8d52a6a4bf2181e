use rtcp::transport_feedbacks::transport_layer_cc::{
    PacketStatusChunk, RecvDelta, RunLengthChunk, StatusChunkTypeTcc, StatusVectorChunk,
    SymbolSizeTypeTcc, SymbolTypeTcc, TYPE_TCC_DELTA_SCALE_FACTOR, TransportLayerCc,
};
use std::collections::BTreeMap;
use std::time::Instant;

/// Reference time unit of a feedback packet.
const REFERENCE_TIME_US: i64 = 64_000;
const MAX_RUN_LENGTH: usize = 0x1FFF;
const SYMBOLS_PER_VECTOR: usize = 7;
/// Runs at least this long are cheaper as a run-length chunk.
const MIN_RUN_LENGTH: usize = SYMBOLS_PER_VECTOR;

/// Collects transport-wide sequence number arrivals between two feedback
/// packets.
pub(crate) struct Recorder {
    sender_ssrc: u32,
    media_ssrc: u32,
    fb_pkt_count: u8,
    start: Option<Instant>,
    last_unwrapped: Option<i64>,
    /// Unwrapped sequence number to arrival time in microseconds since start.
    arrivals: BTreeMap<i64, i64>,
}

impl Recorder {
    pub(crate) fn new(sender_ssrc: u32) -> Self {
        Self {
            sender_ssrc,
            media_ssrc: 0,
            fb_pkt_count: 0,
            start: None,
            last_unwrapped: None,
            arrivals: BTreeMap::new(),
        }
    }

    pub(crate) fn record(&mut self, media_ssrc: u32, seq: u16, now: Instant) {
        let start = *self.start.get_or_insert(now);
        let arrival = now.saturating_duration_since(start).as_micros() as i64;

        let unwrapped = match self.last_unwrapped {
            Some(last) => last + i64::from(seq.wrapping_sub(last as u16) as i16),
            None => i64::from(seq),
        };
        if self.last_unwrapped.is_none_or(|last| unwrapped > last) {
            self.last_unwrapped = Some(unwrapped);
        }

        self.media_ssrc = media_ssrc;
        self.arrivals.entry(unwrapped).or_insert(arrival);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.arrivals.is_empty()
    }

    /// Drains everything recorded so far into one feedback packet.
    pub(crate) fn build_feedback(&mut self) -> Option<TransportLayerCc> {
        let (&base, &first_arrival) = self.arrivals.first_key_value()?;
        let (&end, _) = self.arrivals.last_key_value()?;
        let arrivals = std::mem::take(&mut self.arrivals);

        // a feedback packet describes at most u16::MAX sequence numbers
        let end = end.min(base + i64::from(u16::MAX) - 1);

        let reference_time = first_arrival / REFERENCE_TIME_US;
        let mut last_time = reference_time * REFERENCE_TIME_US;

        let mut symbols = Vec::with_capacity((end - base + 1) as usize);
        let mut recv_deltas = vec![];
        for seq in base..=end {
            let Some(&arrival) = arrivals.get(&seq) else {
                symbols.push(SymbolTypeTcc::PacketNotReceived);
                continue;
            };

            let units = ((arrival - last_time) / TYPE_TCC_DELTA_SCALE_FACTOR)
                .clamp(i64::from(i16::MIN), i64::from(i16::MAX));
            let symbol = if (0..=255).contains(&units) {
                SymbolTypeTcc::PacketReceivedSmallDelta
            } else {
                SymbolTypeTcc::PacketReceivedLargeDelta
            };
            symbols.push(symbol);
            recv_deltas.push(RecvDelta {
                type_tcc_packet: symbol,
                delta: units * TYPE_TCC_DELTA_SCALE_FACTOR,
            });
            last_time += units * TYPE_TCC_DELTA_SCALE_FACTOR;
        }

        let feedback = TransportLayerCc {
            sender_ssrc: self.sender_ssrc,
            media_ssrc: self.media_ssrc,
            base_sequence_number: base as u16,
            packet_status_count: symbols.len() as u16,
            reference_time: (reference_time as u32) & 0xFF_FFFF,
            fb_pkt_count: self.fb_pkt_count,
            packet_chunks: encode_chunks(&symbols),
            recv_deltas,
        };
        self.fb_pkt_count = self.fb_pkt_count.wrapping_add(1);
        Some(feedback)
    }
}

/// Run-length chunks for long runs, two-bit status vectors for the rest.
fn encode_chunks(symbols: &[SymbolTypeTcc]) -> Vec<PacketStatusChunk> {
    let mut chunks = vec![];
    let mut i = 0;
    while i < symbols.len() {
        let run = symbols[i..]
            .iter()
            .take(MAX_RUN_LENGTH)
            .take_while(|s| **s == symbols[i])
            .count();

        if run >= MIN_RUN_LENGTH {
            chunks.push(PacketStatusChunk::RunLengthChunk(RunLengthChunk {
                type_tcc: StatusChunkTypeTcc::RunLengthChunk,
                packet_status_symbol: symbols[i],
                run_length: run as u16,
            }));
            i += run;
            continue;
        }

        let n = SYMBOLS_PER_VECTOR.min(symbols.len() - i);
        let mut symbol_list = symbols[i..i + n].to_vec();
        symbol_list.resize(SYMBOLS_PER_VECTOR, SymbolTypeTcc::PacketNotReceived);
        chunks.push(PacketStatusChunk::StatusVectorChunk(StatusVectorChunk {
            type_tcc: StatusChunkTypeTcc::StatusVectorChunk,
            symbol_size: SymbolSizeTypeTcc::TwoBit,
            symbol_list,
        }));
        i += n;
    }
    chunks
}
