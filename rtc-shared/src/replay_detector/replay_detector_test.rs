use super::*;

const LARGE_SEQ: u64 = 0x100000000000;

struct Case {
    name: &'static str,
    window_size: usize,
    max_seq: u64,
    input: Vec<u64>,
    valid: Vec<bool>,
    expected: Vec<u64>,
}

fn run(cases: Vec<Case>, wrapped: bool) {
    for c in cases {
        let mut det: Box<dyn ReplayDetector> = if wrapped {
            Box::new(WrappedSlidingWindowDetector::new(c.window_size, c.max_seq))
        } else {
            Box::new(SlidingWindowDetector::new(c.window_size, c.max_seq))
        };
        let mut out = vec![];
        for (i, seq) in c.input.iter().enumerate() {
            if det.check(*seq) && c.valid[i] {
                out.push(*seq);
                det.accept();
            }
        }
        assert_eq!(out, c.expected, "{}", c.name);
    }
}

#[test]
fn test_sliding_window_detector() {
    let cases = vec![
        Case {
            name: "Continuous",
            window_size: 16,
            max_seq: 0x0000FFFFFFFFFFFF,
            input: vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20],
            valid: vec![true; 21],
            expected: (0..=20).collect(),
        },
        Case {
            name: "ValidLargeJump",
            window_size: 16,
            max_seq: 0x0000FFFFFFFFFFFF,
            input: vec![0, 1, 2, LARGE_SEQ, LARGE_SEQ + 1, LARGE_SEQ + 2],
            valid: vec![true; 6],
            expected: vec![0, 1, 2, LARGE_SEQ, LARGE_SEQ + 1, LARGE_SEQ + 2],
        },
        Case {
            name: "InvalidLargeJump",
            window_size: 16,
            max_seq: 0x0000FFFFFFFFFFFF,
            input: vec![0, 1, 2, LARGE_SEQ, 3, 4],
            valid: vec![true, true, true, false, true, true],
            expected: vec![0, 1, 2, 3, 4],
        },
        Case {
            name: "DuplicateAfterValidJump",
            window_size: 196,
            max_seq: 0x0000FFFFFFFFFFFF,
            input: vec![0, 1, 2, 129, 0, 1, 2],
            valid: vec![true; 7],
            expected: vec![0, 1, 2, 129],
        },
        Case {
            name: "DuplicateAfterInvalidJump",
            window_size: 196,
            max_seq: 0x0000FFFFFFFFFFFF,
            input: vec![0, 1, 2, 128, 0, 1, 2],
            valid: vec![true, true, true, false, true, true, true],
            expected: vec![0, 1, 2],
        },
        Case {
            name: "ContinuousOffset",
            window_size: 16,
            max_seq: 0x0000FFFFFFFFFFFF,
            input: vec![100, 101, 102, 103, 104, 105, 106, 107, 108, 109, 110],
            valid: vec![true; 11],
            expected: (100..=110).collect(),
        },
        Case {
            name: "Reordered",
            window_size: 128,
            max_seq: 0x0000FFFFFFFFFFFF,
            input: vec![96, 64, 16, 80, 32, 48, 8, 24, 88, 40, 128],
            valid: vec![true; 11],
            expected: vec![96, 64, 16, 80, 32, 48, 8, 24, 88, 40, 128],
        },
        Case {
            name: "Old",
            window_size: 64,
            max_seq: 0x0000FFFFFFFFFFFF,
            input: vec![24, 22, 90, 18, 16, 10, 8, 6, 4, 2, 0],
            valid: vec![true; 11],
            expected: vec![24, 22, 90],
        },
        Case {
            name: "ReplayedLater",
            window_size: 128,
            max_seq: 0x0000FFFFFFFFFFFF,
            input: vec![256, 16, 32, 1000, 16, 256, 1004, 256],
            valid: vec![true; 8],
            expected: vec![256, 1000, 1004],
        },
        Case {
            name: "ReplayedQuick",
            window_size: 128,
            max_seq: 0x0000FFFFFFFFFFFF,
            input: vec![2, 2, 4, 4],
            valid: vec![true; 4],
            expected: vec![2, 4],
        },
        Case {
            name: "ExceedMaxSeq",
            window_size: 128,
            max_seq: 0xFFFF,
            input: vec![0x10000, 1],
            valid: vec![true; 2],
            expected: vec![1],
        },
    ];
    run(cases, false);
}

#[test]
fn test_wrapped_sliding_window_detector() {
    let cases = vec![
        Case {
            name: "WrapContinuous",
            window_size: 64,
            max_seq: 0xFFFF,
            input: vec![0xFFFC, 0xFFFD, 0xFFFE, 0xFFFF, 0x0000, 0x0001, 0x0002, 0x0003],
            valid: vec![true; 8],
            expected: vec![0xFFFC, 0xFFFD, 0xFFFE, 0xFFFF, 0x0000, 0x0001, 0x0002, 0x0003],
        },
        Case {
            name: "WrapReplayed",
            window_size: 64,
            max_seq: 0xFFFF,
            input: vec![0xFFFF, 0x0000, 0xFFFF, 0x0000, 0x0001],
            valid: vec![true; 5],
            expected: vec![0xFFFF, 0x0000, 0x0001],
        },
        Case {
            name: "WrapOld",
            window_size: 16,
            max_seq: 0xFFFF,
            input: vec![0x0010, 0xFFF0, 0x0011],
            valid: vec![true; 3],
            expected: vec![0x0010, 0x0011],
        },
        Case {
            name: "FirstZero",
            window_size: 64,
            max_seq: 0x7FFFFFFF,
            input: vec![0, 1, 1, 2],
            valid: vec![true; 4],
            expected: vec![0, 1, 2],
        },
    ];
    run(cases, true);
}

#[test]
fn test_no_op_replay_detector() {
    let mut det = NoOpReplayDetector;
    assert!(det.check(1));
    det.accept();
    assert!(det.check(1));
}
