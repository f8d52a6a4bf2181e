use crate::chunk::chunk_payload_data::{ChunkPayloadData, PayloadProtocolIdentifier};
use crate::util::*;

use bytes::{Bytes, BytesMut};
use shared::error::{Error, Result};
use std::cmp::Ordering;

fn sort_chunks_by_tsn(c: &mut [ChunkPayloadData]) {
    c.sort_by(|a, b| {
        if sna32lt(a.tsn, b.tsn) {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    });
}

fn sort_chunks_by_ssn(c: &mut [Chunks]) {
    c.sort_by(|a, b| {
        if sna16lt(a.ssn, b.ssn) {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    });
}

/// A complete, reassembled user message made of one or more DATA fragments.
#[derive(Debug, Default, Clone)]
pub struct Chunks {
    pub(crate) ssn: u16,
    pub ppi: PayloadProtocolIdentifier,
    pub(crate) chunks: Vec<ChunkPayloadData>,
}

impl Chunks {
    pub(crate) fn new(ssn: u16, ppi: PayloadProtocolIdentifier, chunks: Vec<ChunkPayloadData>) -> Self {
        Chunks { ssn, ppi, chunks }
    }

    /// Total length of the message in bytes.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.user_data.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the whole message into `buf`. Fails with `ErrShortBuffer` when it does not fit.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let length = self.len();
        if length > buf.len() {
            return Err(Error::ErrShortBuffer);
        }

        let mut n = 0;
        for c in &self.chunks {
            let to_copy = c.user_data.len();
            buf[n..n + to_copy].copy_from_slice(&c.user_data);
            n += to_copy;
        }
        Ok(n)
    }

    /// The message as a single contiguous buffer.
    pub fn data(&self) -> Bytes {
        if self.chunks.len() == 1 {
            return self.chunks[0].user_data.clone();
        }
        let mut buf = BytesMut::with_capacity(self.len());
        for c in &self.chunks {
            buf.extend_from_slice(&c.user_data);
        }
        buf.freeze()
    }

    fn push(&mut self, chunk: ChunkPayloadData) -> bool {
        // check if dup
        if self.chunks.iter().any(|c| c.tsn == chunk.tsn) {
            return false;
        }

        self.chunks.push(chunk);
        sort_chunks_by_tsn(&mut self.chunks);

        self.is_complete()
    }

    fn is_complete(&self) -> bool {
        // Condition for complete set
        //   0. Has at least one chunk.
        //   1. Begins with beginningFragment set to true
        //   2. Ends with endingFragment set to true
        //   3. TSN monotinically increase by 1 from beginning to end

        let n_chunks = self.chunks.len();
        if n_chunks == 0 {
            return false;
        }

        if !self.chunks[0].beginning_fragment {
            return false;
        }

        if !self.chunks[n_chunks - 1].ending_fragment {
            return false;
        }

        let mut last_tsn = 0u32;
        for (i, c) in self.chunks.iter().enumerate() {
            if i > 0 && c.tsn != last_tsn.wrapping_add(1) {
                // mid or end fragment is missing
                return false;
            }
            last_tsn = c.tsn;
        }

        true
    }
}

/// Per-stream receive buffer that turns DATA fragments into user messages.
#[derive(Default, Debug)]
pub(crate) struct ReassemblyQueue {
    pub(crate) si: u16,
    /// expected SSN for next ordered chunk
    pub(crate) next_ssn: u16,
    pub(crate) ordered: Vec<Chunks>,
    pub(crate) unordered: Vec<Chunks>,
    pub(crate) unordered_chunks: Vec<ChunkPayloadData>,
    pub(crate) n_bytes: usize,
}

impl ReassemblyQueue {
    pub(crate) fn new(si: u16) -> Self {
        ReassemblyQueue {
            si,
            ..Default::default()
        }
    }

    /// Returns true when the chunk completed a message.
    pub(crate) fn push(&mut self, chunk: ChunkPayloadData) -> bool {
        if chunk.stream_identifier != self.si {
            return false;
        }

        if chunk.unordered {
            // First, insert into unordered_chunks array
            self.n_bytes += chunk.user_data.len();
            self.unordered_chunks.push(chunk);
            sort_chunks_by_tsn(&mut self.unordered_chunks);

            // Scan unordered_chunks that are contiguous (in TSN)
            // If found, append the complete set to the unordered array
            if let Some(cset) = self.find_complete_unordered_chunk_set() {
                self.unordered.push(cset);
                return true;
            }

            false
        } else {
            // This is an ordered chunk
            if sna16lt(chunk.stream_sequence_number, self.next_ssn) {
                return false;
            }

            // Check if a chunkSet with the SSN already exists
            let len = chunk.user_data.len();
            for s in &mut self.ordered {
                if s.ssn == chunk.stream_sequence_number {
                    if s.chunks.iter().any(|c| c.tsn == chunk.tsn) {
                        return false;
                    }
                    self.n_bytes += len;
                    return s.push(chunk);
                }
            }
            self.n_bytes += len;

            // If not found, create a new chunkSet
            let mut cset = Chunks::new(chunk.stream_sequence_number, chunk.payload_type, vec![]);
            let complete = cset.push(chunk);
            self.ordered.push(cset);
            sort_chunks_by_ssn(&mut self.ordered);

            complete
        }
    }

    fn find_complete_unordered_chunk_set(&mut self) -> Option<Chunks> {
        let mut start_idx = -1isize;
        let mut n_chunks = 0usize;
        let mut last_tsn = 0u32;
        let mut found = false;

        for (i, c) in self.unordered_chunks.iter().enumerate() {
            // seek beginning
            if c.beginning_fragment {
                start_idx = i as isize;
                n_chunks = 1;
                last_tsn = c.tsn;

                if c.ending_fragment {
                    found = true;
                    break;
                }
                continue;
            }

            if start_idx < 0 {
                continue;
            }

            // Check if contiguous in TSN
            if c.tsn != last_tsn.wrapping_add(1) {
                start_idx = -1;
                continue;
            }

            last_tsn = c.tsn;
            n_chunks += 1;

            if c.ending_fragment {
                found = true;
                break;
            }
        }

        if !found {
            return None;
        }

        // Extract the range of chunks
        let start = start_idx as usize;
        let chunks: Vec<ChunkPayloadData> = self
            .unordered_chunks
            .drain(start..start + n_chunks)
            .collect();

        let ppi = chunks[0].payload_type;
        Some(Chunks::new(0, ppi, chunks))
    }

    pub(crate) fn is_readable(&self) -> bool {
        // Check unordered first
        if !self.unordered.is_empty() {
            // The chunk sets in r.unordered should all be complete.
            return true;
        }

        // Check ordered sets
        if let Some(cset) = self.ordered.first() {
            if cset.is_complete() && sna16lte(cset.ssn, self.next_ssn) {
                return true;
            }
        }
        false
    }

    /// Pops the next deliverable message, unordered ones first.
    pub(crate) fn read(&mut self) -> Option<Chunks> {
        // Check unordered first
        let cset = if !self.unordered.is_empty() {
            self.unordered.remove(0)
        } else if !self.ordered.is_empty() {
            // Now, check ordered
            let cset = &self.ordered[0];
            if !cset.is_complete() {
                return None;
            }
            if sna16gt(cset.ssn, self.next_ssn) {
                return None;
            }
            if cset.ssn == self.next_ssn {
                self.next_ssn = self.next_ssn.wrapping_add(1);
            }
            self.ordered.remove(0)
        } else {
            return None;
        };

        self.subtract_num_bytes(cset.len());
        Some(cset)
    }

    /// Drops incomplete ordered messages up to `last_ssn` after a FORWARD TSN.
    pub(crate) fn forward_tsn_for_ordered(&mut self, last_ssn: u16) {
        let num_bytes: usize = self
            .ordered
            .iter()
            .filter(|s| sna16lte(s.ssn, last_ssn) && !s.is_complete())
            .map(|s| s.len())
            .sum();
        self.subtract_num_bytes(num_bytes);

        self.ordered
            .retain(|s| !sna16lte(s.ssn, last_ssn) || s.is_complete());

        // Finally, forward next_ssn
        if sna16lte(self.next_ssn, last_ssn) {
            self.next_ssn = last_ssn.wrapping_add(1);
        }
    }

    /// Drops unordered fragments at or below `new_cumulative_tsn` after a FORWARD TSN.
    pub(crate) fn forward_tsn_for_unordered(&mut self, new_cumulative_tsn: u32) {
        let mut last_idx: isize = -1;
        for (i, c) in self.unordered_chunks.iter().enumerate() {
            if sna32gt(c.tsn, new_cumulative_tsn) {
                break;
            }
            last_idx = i as isize;
        }
        if last_idx >= 0 {
            let drained: usize = self
                .unordered_chunks
                .drain(0..(last_idx + 1) as usize)
                .map(|c| c.user_data.len())
                .sum();
            self.subtract_num_bytes(drained);
        }
    }

    fn subtract_num_bytes(&mut self, n_bytes: usize) {
        self.n_bytes = self.n_bytes.saturating_sub(n_bytes);
    }

    pub(crate) fn get_num_bytes(&self) -> usize {
        self.n_bytes
    }
}
