use super::{UINT16_SIZE_HALF, validate_window_size};
use shared::error::Result;

/// Bitmap of the sequence numbers seen on one remote stream.
///
/// Only the latest `size` sequence numbers are remembered; anything older than
/// that has either arrived or been given up on.
pub(crate) struct ReceiveLog {
    bits: Vec<u64>,
    size: u16,
    end: u16,
    started: bool,
    /// Every sequence number up to and including this one has been seen.
    last_consecutive: u16,
}

impl ReceiveLog {
    pub(crate) fn new(size: u16) -> Result<Self> {
        validate_window_size(size)?;
        Ok(Self {
            bits: vec![0; usize::from(size) / 64],
            size,
            end: 0,
            started: false,
            last_consecutive: 0,
        })
    }

    pub(crate) fn add(&mut self, seq: u16) {
        if !self.started {
            self.started = true;
            self.end = seq;
            self.last_consecutive = seq;
            self.set(seq, true);
            return;
        }

        let ahead = seq.wrapping_sub(self.end);
        if ahead == 0 {
            return;
        }

        if ahead < UINT16_SIZE_HALF {
            // slots between the old end and seq may hold bits from a lap ago
            let mut s = self.end.wrapping_add(1);
            while s != seq {
                self.set(s, false);
                s = s.wrapping_add(1);
            }
            self.end = seq;

            if self.last_consecutive.wrapping_add(1) == seq {
                self.last_consecutive = seq;
            } else if seq.wrapping_sub(self.last_consecutive) > self.size {
                self.last_consecutive = seq.wrapping_sub(self.size);
                self.advance_last_consecutive();
            }
        } else if self.last_consecutive.wrapping_add(1) == seq {
            self.last_consecutive = seq;
            self.advance_last_consecutive();
        }

        self.set(seq, true);
    }

    pub(crate) fn contains(&self, seq: u16) -> bool {
        let behind = self.end.wrapping_sub(seq);
        if behind >= UINT16_SIZE_HALF || behind >= self.size {
            return false;
        }
        self.is_set(seq)
    }

    /// Gaps after the consecutive run, ignoring the newest `skip_last_n`
    /// sequence numbers which may just be late.
    pub(crate) fn missing_seq_numbers(&self, skip_last_n: u16) -> Vec<u16> {
        let until = self.end.wrapping_sub(skip_last_n);
        if until.wrapping_sub(self.last_consecutive) >= UINT16_SIZE_HALF {
            return vec![];
        }

        let mut missing = vec![];
        let mut s = self.last_consecutive.wrapping_add(1);
        while s != until.wrapping_add(1) {
            if !self.is_set(s) {
                missing.push(s);
            }
            s = s.wrapping_add(1);
        }
        missing
    }

    fn slot(&self, seq: u16) -> (usize, u64) {
        let pos = seq % self.size;
        (usize::from(pos / 64), 1u64 << (pos % 64))
    }

    fn set(&mut self, seq: u16, received: bool) {
        let (word, mask) = self.slot(seq);
        if received {
            self.bits[word] |= mask;
        } else {
            self.bits[word] &= !mask;
        }
    }

    fn is_set(&self, seq: u16) -> bool {
        let (word, mask) = self.slot(seq);
        self.bits[word] & mask != 0
    }

    fn advance_last_consecutive(&mut self) {
        let mut s = self.last_consecutive.wrapping_add(1);
        while s != self.end.wrapping_add(1) && self.is_set(s) {
            s = s.wrapping_add(1);
        }
        self.last_consecutive = s.wrapping_sub(1);
    }
}
