use super::{UINT16_SIZE_HALF, validate_window_size};
use shared::error::Result;

/// Ring of the last `size` packets sent on one local stream, indexed by
/// sequence number.
pub(crate) struct SendBuffer {
    slots: Vec<Option<rtp::Packet>>,
    size: u16,
    highest: u16,
    started: bool,
}

impl SendBuffer {
    pub(crate) fn new(size: u16) -> Result<Self> {
        validate_window_size(size)?;
        Ok(Self {
            slots: vec![None; usize::from(size)],
            size,
            highest: 0,
            started: false,
        })
    }

    pub(crate) fn add(&mut self, packet: rtp::Packet) {
        let seq = packet.header.sequence_number;

        if self.started {
            let ahead = seq.wrapping_sub(self.highest);
            if ahead == 0 {
                return;
            }
            if ahead < UINT16_SIZE_HALF {
                let mut s = self.highest.wrapping_add(1);
                while s != seq {
                    let idx = self.index(s);
                    self.slots[idx] = None;
                    s = s.wrapping_add(1);
                }
                self.highest = seq;
            }
        } else {
            self.started = true;
            self.highest = seq;
        }

        let idx = self.index(seq);
        self.slots[idx] = Some(packet);
    }

    /// The packet sent with `seq`, if it is among the last `size` sent.
    pub(crate) fn get(&self, seq: u16) -> Option<&rtp::Packet> {
        if !self.started {
            return None;
        }
        let behind = self.highest.wrapping_sub(seq);
        if behind >= UINT16_SIZE_HALF || behind >= self.size {
            return None;
        }

        self.slots[self.index(seq)]
            .as_ref()
            .filter(|p| p.header.sequence_number == seq)
    }

    fn index(&self, seq: u16) -> usize {
        usize::from(seq % self.size)
    }
}
