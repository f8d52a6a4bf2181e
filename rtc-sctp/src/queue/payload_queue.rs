use crate::chunk::chunk_payload_data::ChunkPayloadData;
use crate::chunk::chunk_selective_ack::GapAckBlock;
use crate::util::*;

use std::collections::{HashMap, VecDeque};

/// DATA chunks keyed by TSN, kept in TSN order.
///
/// Used twice per association: as the inflight queue on the sending side and as the
/// out-of-order receive buffer that produces SACK gap blocks on the receiving side.
#[derive(Default, Debug)]
pub(crate) struct PayloadQueue {
    pub(crate) chunk_map: HashMap<u32, ChunkPayloadData>,
    pub(crate) sorted: VecDeque<u32>,
    pub(crate) dup_tsn: Vec<u32>,
    pub(crate) n_bytes: usize,
}

impl PayloadQueue {
    pub(crate) fn new() -> Self {
        PayloadQueue::default()
    }

    /// Appends a chunk whose TSN is known to be the highest so far.
    pub(crate) fn push_no_check(&mut self, p: ChunkPayloadData) {
        self.n_bytes += p.user_data.len();
        self.sorted.push_back(p.tsn);
        self.chunk_map.insert(p.tsn, p);
    }

    /// Inserts a received chunk. Chunks at or below `cumulative_tsn`, or already present,
    /// are recorded as duplicates and dropped.
    pub(crate) fn push(&mut self, p: ChunkPayloadData, cumulative_tsn: u32) -> bool {
        if self.chunk_map.contains_key(&p.tsn) || sna32lte(p.tsn, cumulative_tsn) {
            self.dup_tsn.push(p.tsn);
            return false;
        }

        let tsn = p.tsn;
        self.n_bytes += p.user_data.len();
        self.chunk_map.insert(tsn, p);

        let pos = self
            .sorted
            .iter()
            .rposition(|t| sna32lt(*t, tsn))
            .map(|i| i + 1)
            .unwrap_or(0);
        self.sorted.insert(pos, tsn);
        true
    }

    /// Whether `tsn` is new relative to what was received so far.
    pub(crate) fn can_push(&self, tsn: u32, cumulative_tsn: u32) -> bool {
        !(self.chunk_map.contains_key(&tsn) || sna32lte(tsn, cumulative_tsn))
    }

    /// Removes the chunk if it is the lowest TSN in the queue.
    pub(crate) fn pop(&mut self, tsn: u32) -> Option<ChunkPayloadData> {
        if self.sorted.front() == Some(&tsn) {
            self.sorted.pop_front();
            if let Some(c) = self.chunk_map.remove(&tsn) {
                self.n_bytes -= c.user_data.len();
                return Some(c);
            }
        }
        None
    }

    pub(crate) fn get(&self, tsn: u32) -> Option<&ChunkPayloadData> {
        self.chunk_map.get(&tsn)
    }

    pub(crate) fn get_mut(&mut self, tsn: u32) -> Option<&mut ChunkPayloadData> {
        self.chunk_map.get_mut(&tsn)
    }

    pub(crate) fn pop_duplicates(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.dup_tsn)
    }

    /// Gap ack blocks for everything above `cumulative_tsn`, as offsets from it.
    pub(crate) fn get_gap_ack_blocks(&self, cumulative_tsn: u32) -> Vec<GapAckBlock> {
        let mut gap_ack_blocks = vec![];
        let mut current: Option<GapAckBlock> = None;

        for tsn in &self.sorted {
            let diff = tsn.wrapping_sub(cumulative_tsn) as u16;
            current = match current {
                None => Some(GapAckBlock {
                    start: diff,
                    end: diff,
                }),
                Some(mut block) => {
                    if block.end.wrapping_add(1) == diff {
                        block.end = diff;
                        Some(block)
                    } else {
                        gap_ack_blocks.push(block);
                        Some(GapAckBlock {
                            start: diff,
                            end: diff,
                        })
                    }
                }
            };
        }

        if let Some(block) = current {
            gap_ack_blocks.push(block);
        }

        gap_ack_blocks
    }

    pub(crate) fn get_gap_ack_blocks_string(&self, cumulative_tsn: u32) -> String {
        let mut s = format!("cumTSN={cumulative_tsn}");
        for b in self.get_gap_ack_blocks(cumulative_tsn) {
            s += format!(",{}-{}", b.start, b.end).as_str();
        }
        s
    }

    /// Marks a chunk acked and releases its user data. Returns the number of bytes released.
    pub(crate) fn mark_as_acked(&mut self, tsn: u32) -> usize {
        let n_bytes_acked = if let Some(c) = self.chunk_map.get_mut(&tsn) {
            c.acked = true;
            c.retransmit = false;
            let n = c.user_data.len();
            c.user_data.clear();
            n
        } else {
            0
        };

        self.n_bytes -= n_bytes_acked;
        n_bytes_acked
    }

    pub(crate) fn get_last_tsn_received(&self) -> Option<&u32> {
        self.sorted.back()
    }

    pub(crate) fn mark_all_to_retransmit(&mut self) {
        for c in self.chunk_map.values_mut() {
            if c.acked || c.abandoned() {
                continue;
            }
            c.retransmit = true;
        }
    }

    pub(crate) fn get_num_bytes(&self) -> usize {
        self.n_bytes
    }

    pub(crate) fn len(&self) -> usize {
        self.chunk_map.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
