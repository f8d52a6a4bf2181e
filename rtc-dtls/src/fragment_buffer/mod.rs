
use std::collections::HashMap;

use shared::error::*;

use crate::content::*;
use crate::handshake::handshake_header::*;
use crate::record_layer::record_layer_header::*;

// 2 megabytes
const FRAGMENT_BUFFER_MAX_SIZE: usize = 2_000_000;

pub(crate) struct Fragment {
    record_layer_header: RecordLayerHeader,
    handshake_header: HandshakeHeader,
    data: Vec<u8>,
}

/// Reassembles handshake messages that arrive split across records.
#[derive(Default)]
pub(crate) struct FragmentBuffer {
    // map of MessageSequenceNumbers that hold slices of fragments
    cache: HashMap<u16, Vec<Fragment>>,

    current_message_sequence_number: u16,
}

impl FragmentBuffer {
    pub fn new() -> Self {
        FragmentBuffer {
            cache: HashMap::new(),
            current_message_sequence_number: 0,
        }
    }

    // Attempts to push a DTLS packet to the FragmentBuffer. Returns whether the record
    // was a handshake record (and so consumed by the buffer) and whether it carried a
    // message that had already been delivered.
    // when an error returns it is fatal, and the DTLS connection should be stopped
    pub fn push(&mut self, mut buf: &[u8]) -> Result<(bool, bool)> {
        let current_size = self.size();
        if current_size + buf.len() >= FRAGMENT_BUFFER_MAX_SIZE {
            return Err(Error::ErrFragmentBufferOverflow);
        }

        let mut reader = buf;
        let record_layer_header = RecordLayerHeader::unmarshal(&mut reader)?;

        // Fragment isn't a handshake, we don't need to handle it
        if record_layer_header.content_type != ContentType::Handshake {
            return Ok((false, false));
        }

        let mut is_retransmit = false;
        buf = &buf[RECORD_LAYER_HEADER_SIZE..];
        while !buf.is_empty() {
            let mut reader = buf;
            let handshake_header = HandshakeHeader::unmarshal(&mut reader)?;

            let mut end = HANDSHAKE_HEADER_LENGTH + handshake_header.fragment_length as usize;
            if end > buf.len() {
                end = buf.len();
            }

            // retransmits of messages already delivered are dropped
            if handshake_header.message_sequence >= self.current_message_sequence_number {
                // Discard all headers, when rebuilding the packet we will re-build
                let data = buf[HANDSHAKE_HEADER_LENGTH..end].to_vec();

                self.cache
                    .entry(handshake_header.message_sequence)
                    .or_default()
                    .push(Fragment {
                        record_layer_header,
                        handshake_header,
                        data,
                    });
            } else {
                is_retransmit = true;
            }

            buf = &buf[end..];
        }

        Ok((true, is_retransmit))
    }

    /// Returns the next complete handshake message with its epoch, if every fragment arrived.
    pub fn pop(&mut self) -> Option<(Vec<u8>, u16)> {
        let seq_num = self.current_message_sequence_number;
        let frags = self.cache.get(&seq_num)?;

        let mut raw_message = vec![];
        if !append_message(0, frags, &mut raw_message) {
            return None;
        }

        let mut first_header = frags[0].handshake_header;
        first_header.fragment_offset = 0;
        first_header.fragment_length = first_header.length;

        let mut raw_header = vec![];
        first_header.marshal(&mut raw_header).ok()?;

        let message_epoch = frags[0].record_layer_header.epoch;

        raw_header.extend_from_slice(&raw_message);

        self.cache.remove(&seq_num);
        self.current_message_sequence_number += 1;

        Some((raw_header, message_epoch))
    }

    fn size(&self) -> usize {
        self.cache
            .values()
            .map(|frags| frags.iter().map(|f| f.data.len()).sum::<usize>())
            .sum()
    }
}

fn append_message(target_offset: u32, frags: &[Fragment], raw_message: &mut Vec<u8>) -> bool {
    for f in frags {
        if f.handshake_header.fragment_offset == target_offset {
            let fragment_end = f.handshake_header.fragment_offset + f.handshake_header.fragment_length;
            if fragment_end != f.handshake_header.length
                && f.handshake_header.fragment_length != 0
                && !append_message(fragment_end, frags, raw_message)
            {
                return false;
            }

            let mut message = f.data.clone();
            message.extend_from_slice(raw_message);
            *raw_message = message;
            return true;
        }
    }

    false
}
