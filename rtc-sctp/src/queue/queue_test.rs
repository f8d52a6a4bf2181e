use super::payload_queue::PayloadQueue;
use super::pending_queue::PendingQueue;
use super::reassembly_queue::ReassemblyQueue;
use crate::chunk::chunk_payload_data::{ChunkPayloadData, PayloadProtocolIdentifier};
use crate::chunk::chunk_selective_ack::GapAckBlock;

use bytes::Bytes;
use shared::error::Error;

fn make_payload(tsn: u32, n_bytes: usize) -> ChunkPayloadData {
    ChunkPayloadData {
        tsn,
        user_data: Bytes::from(vec![0u8; n_bytes]),
        ..Default::default()
    }
}

fn make_fragment(
    tsn: u32,
    ssn: u16,
    beginning: bool,
    ending: bool,
    unordered: bool,
    data: &'static [u8],
) -> ChunkPayloadData {
    ChunkPayloadData {
        tsn,
        stream_identifier: 0,
        stream_sequence_number: ssn,
        beginning_fragment: beginning,
        ending_fragment: ending,
        unordered,
        payload_type: PayloadProtocolIdentifier::Binary,
        user_data: Bytes::from_static(data),
        ..Default::default()
    }
}

#[test]
fn test_payload_queue_push_and_pop_in_order() {
    let mut pq = PayloadQueue::new();
    pq.push_no_check(make_payload(0, 10));
    assert_eq!(pq.get_num_bytes(), 10);
    pq.push_no_check(make_payload(1, 11));
    assert_eq!(pq.get_num_bytes(), 21);
    pq.push_no_check(make_payload(2, 12));
    assert_eq!(pq.get_num_bytes(), 33);

    // only the lowest TSN may be popped
    assert!(pq.pop(1).is_none());
    for (tsn, remaining) in [(0u32, 23usize), (1, 12), (2, 0)] {
        let c = pq.pop(tsn).expect("pop");
        assert_eq!(c.tsn, tsn);
        assert_eq!(pq.get_num_bytes(), remaining);
    }
    assert!(pq.is_empty());
}

#[test]
fn test_payload_queue_duplicates() {
    let mut pq = PayloadQueue::new();
    assert!(pq.push(make_payload(1, 4), 0));
    assert!(!pq.push(make_payload(1, 4), 0), "same tsn twice");
    assert!(!pq.push(make_payload(0, 4), 0), "at the cumulative tsn");
    assert!(!pq.can_push(1, 0));
    assert!(pq.can_push(2, 0));

    assert_eq!(pq.pop_duplicates(), vec![1, 0]);
    assert!(pq.pop_duplicates().is_empty());
    assert_eq!(pq.get_num_bytes(), 4);
}

#[test]
fn test_payload_queue_gap_ack_blocks() {
    let mut pq = PayloadQueue::new();
    for tsn in [2u32, 3, 5, 9, 10, 7] {
        pq.push(make_payload(tsn, 1), 0);
    }
    assert_eq!(pq.get_last_tsn_received(), Some(&10));
    assert_eq!(
        pq.get_gap_ack_blocks(0),
        vec![
            GapAckBlock { start: 2, end: 3 },
            GapAckBlock { start: 5, end: 5 },
            GapAckBlock { start: 7, end: 7 },
            GapAckBlock { start: 9, end: 10 },
        ]
    );
    assert_eq!(pq.get_gap_ack_blocks_string(0), "cumTSN=0,2-3,5-5,7-7,9-10");
}

#[test]
fn test_payload_queue_gap_blocks_across_wrap() {
    let mut pq = PayloadQueue::new();
    let cum = u32::MAX - 1;
    pq.push(make_payload(u32::MAX, 1), cum);
    pq.push(make_payload(1, 1), cum);
    pq.push(make_payload(0, 1), cum);
    assert_eq!(
        pq.get_gap_ack_blocks(cum),
        vec![GapAckBlock { start: 1, end: 3 }]
    );
}

#[test]
fn test_payload_queue_mark_as_acked() {
    let mut pq = PayloadQueue::new();
    pq.push_no_check(make_payload(0, 10));
    pq.push_no_check(make_payload(1, 11));
    pq.push_no_check(make_payload(2, 12));

    pq.mark_all_to_retransmit();
    assert_eq!(pq.mark_as_acked(1), 11);
    assert_eq!(pq.get_num_bytes(), 22);

    let c = pq.get(1).expect("tsn 1");
    assert!(c.acked);
    assert!(!c.retransmit);
    assert!(c.user_data.is_empty());
    assert!(pq.get(0).map(|c| c.retransmit).unwrap_or(false));
    assert_eq!(pq.mark_as_acked(42), 0);
}

#[test]
fn test_pending_queue_unordered_first() {
    let mut pq = PendingQueue::new();
    pq.push(make_fragment(0, 0, true, true, false, b"ordered"));
    pq.push(make_fragment(0, 0, true, true, true, b"unordered"));
    assert_eq!(pq.len(), 2);
    assert_eq!(pq.get_num_bytes(), 16);

    let c = pq.peek().expect("peek");
    assert!(c.unordered);
    let c = pq.pop(true, true).expect("pop");
    assert_eq!(&c.user_data[..], b"unordered");

    let c = pq.pop(true, false).expect("pop");
    assert_eq!(&c.user_data[..], b"ordered");
    assert!(pq.is_empty());
    assert_eq!(pq.get_num_bytes(), 0);
}

#[test]
fn test_pending_queue_does_not_interleave_fragments() {
    let mut pq = PendingQueue::new();
    pq.push(make_fragment(0, 0, true, false, false, b"a"));
    pq.push(make_fragment(0, 0, false, false, false, b"b"));
    pq.push(make_fragment(0, 0, false, true, false, b"c"));

    let first = pq.pop(true, false).expect("first fragment");
    assert_eq!(&first.user_data[..], b"a");

    // an unordered message arrives in the middle of the ordered one
    pq.push(make_fragment(0, 0, true, true, true, b"u"));
    assert_eq!(&pq.peek().expect("peek").user_data[..], b"b");
    assert_eq!(&pq.pop(false, false).expect("b").user_data[..], b"b");
    assert_eq!(&pq.pop(false, false).expect("c").user_data[..], b"c");

    // selection released after the ending fragment
    assert_eq!(&pq.peek().expect("peek").user_data[..], b"u");
    assert!(pq.pop(false, true).is_none(), "must start at a beginning fragment");
    assert!(pq.pop(true, true).is_some());
}

#[test]
fn test_reassembly_queue_ordered_fragments() {
    let mut rq = ReassemblyQueue::new(0);
    assert!(!rq.push(make_fragment(10, 0, true, false, false, b"hel")));
    assert!(!rq.push(make_fragment(12, 0, false, true, false, b"ld")));
    assert!(!rq.is_readable());
    assert!(rq.push(make_fragment(11, 0, false, false, false, b"lo wor")));
    assert!(rq.is_readable());
    assert_eq!(rq.get_num_bytes(), 11);

    let msg = rq.read().expect("message");
    assert_eq!(msg.len(), 11);
    assert_eq!(msg.ppi, PayloadProtocolIdentifier::Binary);
    let mut buf = [0u8; 32];
    let n = msg.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"hello world");
    assert_eq!(&msg.data()[..], b"hello world");
    assert_eq!(rq.get_num_bytes(), 0);
    assert_eq!(rq.next_ssn, 1);
}

#[test]
fn test_reassembly_queue_ordered_waits_for_ssn() {
    let mut rq = ReassemblyQueue::new(0);
    assert!(rq.push(make_fragment(2, 1, true, true, false, b"second")));
    assert!(!rq.is_readable(), "ssn 0 has not arrived");
    assert!(rq.read().is_none());

    assert!(rq.push(make_fragment(1, 0, true, true, false, b"first")));
    assert_eq!(&rq.read().expect("first").data()[..], b"first");
    assert_eq!(&rq.read().expect("second").data()[..], b"second");
    assert!(rq.read().is_none());

    // stale SSN is refused
    assert!(!rq.push(make_fragment(3, 0, true, true, false, b"old")));
}

#[test]
fn test_reassembly_queue_unordered_bypasses_ssn() {
    let mut rq = ReassemblyQueue::new(0);
    assert!(!rq.push(make_fragment(5, 0, false, true, true, b"b")));
    assert!(rq.push(make_fragment(4, 0, true, false, true, b"a")));
    assert!(rq.push(make_fragment(7, 0, true, true, true, b"c")));

    assert_eq!(&rq.read().expect("ab").data()[..], b"ab");
    assert_eq!(&rq.read().expect("c").data()[..], b"c");
    assert!(rq.unordered_chunks.is_empty());
}

#[test]
fn test_reassembly_queue_ignores_other_streams() {
    let mut rq = ReassemblyQueue::new(1);
    assert!(!rq.push(make_fragment(0, 0, true, true, false, b"x")));
    assert_eq!(rq.get_num_bytes(), 0);
}

#[test]
fn test_reassembly_queue_forward_tsn() {
    let mut rq = ReassemblyQueue::new(0);
    // incomplete ordered message with ssn 0, complete one with ssn 1
    rq.push(make_fragment(10, 0, true, false, false, b"lost"));
    rq.push(make_fragment(12, 1, true, true, false, b"kept"));
    // incomplete unordered fragment
    rq.push(make_fragment(11, 0, true, false, true, b"gone"));
    assert_eq!(rq.get_num_bytes(), 12);

    rq.forward_tsn_for_ordered(0);
    assert_eq!(rq.next_ssn, 1);
    rq.forward_tsn_for_unordered(11);
    assert_eq!(rq.get_num_bytes(), 4);

    assert_eq!(&rq.read().expect("kept").data()[..], b"kept");
}

#[test]
fn test_chunks_read_short_buffer() {
    let mut rq = ReassemblyQueue::new(0);
    rq.push(make_fragment(0, 0, true, true, false, b"0123456789"));
    let msg = rq.read().expect("message");
    let mut buf = [0u8; 4];
    assert_eq!(msg.read(&mut buf).unwrap_err(), Error::ErrShortBuffer);
}
