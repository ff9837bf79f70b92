//! Frame ring integration tests.
//! Covers FIFO ordering through the public API, the wrap path, the error
//! contract, and a two-thread contention run. Property checks live behind
//! the `proptest` feature.
#![cfg(not(feature = "loom"))]

use std::thread;

use frame_ring::{FrameRing, RegionBacking, RingConfig, RingError, HEADER_LEN};
use rand::prelude::*;

fn random_stream(seed: u64, total: usize, max_len: usize) -> (Vec<u8>, Vec<(usize, usize)>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bytes = vec![0u8; total];
    rng.fill_bytes(&mut bytes);

    let mut spans = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + rng.gen_range(0..=max_len)).min(total);
        spans.push((start, end));
        start = end;
    }
    (bytes, spans)
}

/// Payloads pushed in order come back in order, byte for byte, empty ones included.
#[test]
fn fifo_round_trip_with_empty_payloads() {
    let mut ring = FrameRing::new(256).expect("ring");
    let payloads: Vec<Vec<u8>> = vec![
        b"alpha".to_vec(),
        Vec::new(),
        vec![0xFF; 40],
        Vec::new(),
        b"omega".to_vec(),
    ];

    for payload in &payloads {
        ring.push(payload).expect("push");
    }
    let occupied: usize = payloads.iter().map(|p| HEADER_LEN + p.len()).sum();
    assert_eq!(ring.len_bytes(), occupied as u64);

    let mut out = Vec::new();
    for payload in &payloads {
        out.clear();
        assert_eq!(ring.pop_into(&mut out), Ok(payload.len()));
        assert_eq!(&out, payload);
    }
    assert_eq!(ring.pop(), Err(RingError::Empty));
}

/// Seven 4-byte frames walk the cursors to 56 of 63; a 6-byte frame must wrap.
#[test]
fn six_byte_frame_wraps_past_physical_end() {
    let mut ring = FrameRing::new(63).expect("ring");
    for i in 0..7u8 {
        ring.push(&[i, 2, 3, 4]).expect("push");
        let mut buf = Vec::with_capacity(4);
        ring.pop_into(&mut buf).expect("pop");
    }
    assert!(ring.is_empty());

    let input = [1u8, 2, 3, 4, 5, 6];
    ring.push(&input).expect("push");
    // The skipped tail counts as occupied until the frame is consumed.
    assert_eq!(ring.len_bytes(), 7 + 4 + 6);
    assert_eq!(ring.pop().expect("pop"), input);
    assert!(ring.is_empty());
}

#[test]
fn capacity_boundary_on_fresh_ring() {
    let ring = FrameRing::new(64).expect("ring");
    assert!(!ring.is_full(60));
    assert!(ring.is_full(61));
}

#[test]
fn errors_leave_the_ring_untouched() {
    let mut ring = FrameRing::new(16).expect("ring");
    assert_eq!(ring.pop(), Err(RingError::Empty));
    assert_eq!(ring.len_bytes(), 0);

    ring.push(&[1; 8]).expect("push");
    let err = ring.push(&[2; 8]).unwrap_err();
    assert_eq!(err, RingError::Full { need: 12 });
    assert!(err.is_retryable());
    assert_eq!(ring.len_bytes(), 12);
    assert_eq!(ring.pop().expect("pop"), vec![1; 8]);
}

#[test]
fn invalid_capacity_is_rejected_up_front() {
    assert!(matches!(
        FrameRing::new(0),
        Err(RingError::InvalidCapacity { requested: 0, .. })
    ));
    let config = RingConfig::new(u64::MAX).with_backing(RegionBacking::Heap);
    assert!(matches!(
        FrameRing::with_config(config),
        Err(RingError::InvalidCapacity { .. })
    ));
}

/// One producer thread and one consumer thread move a random stream through a
/// small ring; the consumer must reassemble it exactly.
#[test]
fn concurrent_stream_reassembles_exactly() {
    const CAPACITY: u64 = 512;
    let (input, spans) = random_stream(0xC0FFEE, 1 << 20, 63);
    let frame_count = spans.len();

    let (mut producer, mut consumer) = FrameRing::new(CAPACITY).expect("ring").split();

    let writer = {
        let input = input.clone();
        thread::spawn(move || {
            for (start, end) in spans {
                loop {
                    match producer.push(&input[start..end]) {
                        Ok(()) => break,
                        Err(RingError::Full { .. }) => thread::yield_now(),
                        Err(err) => panic!("producer failed: {err}"),
                    }
                }
                assert!(producer.len_bytes() <= CAPACITY);
            }
        })
    };

    let reader = thread::spawn(move || {
        let mut output = Vec::with_capacity(1 << 20);
        let mut frames = 0usize;
        while frames < frame_count {
            match consumer.pop_into(&mut output) {
                Ok(_) => frames += 1,
                Err(RingError::Empty) => thread::yield_now(),
                Err(err) => panic!("consumer failed: {err}"),
            }
        }
        assert!(consumer.is_empty());
        output
    });

    writer.join().expect("writer thread");
    let output = reader.join().expect("reader thread");
    assert_eq!(output.len(), input.len());
    assert!(output == input, "reassembled stream differs from input");
}

#[cfg(feature = "proptest")]
mod prop {
    use super::*;
    use proptest::collection;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    #[derive(Clone, Debug)]
    enum Op {
        Push(usize),
        Pop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![(0usize..48).prop_map(Op::Push), Just(Op::Pop)]
    }

    proptest! {
        /// Random push/pop sequences keep FIFO order, never exceed capacity,
        /// and occupy exactly the bytes a cursor model predicts.
        #[test]
        fn frame_ring_matches_cursor_model(
            capacity in 1u64..160,
            ops in collection::vec(op(), 1..400),
        ) {
            let mut ring = FrameRing::new(capacity).expect("ring");
            let mut frames = VecDeque::<(Vec<u8>, u64)>::new();
            let (mut read, mut write) = (0u64, 0u64);
            let mut counter = 0u8;

            for op in ops {
                match op {
                    Op::Push(len) => {
                        let payload: Vec<u8> = (0..len).map(|_| { counter = counter.wrapping_add(1); counter }).collect();
                        match ring.push(&payload) {
                            Ok(()) => {
                                let cost = (HEADER_LEN + len) as u64;
                                let tail = capacity - write % capacity;
                                if tail < cost {
                                    write += tail;
                                }
                                write += cost;
                                frames.push_back((payload, write));
                            }
                            Err(RingError::Full { need }) => {
                                prop_assert_eq!(need, (HEADER_LEN + len) as u64);
                            }
                            Err(err) => prop_assert!(false, "unexpected push error {}", err),
                        }
                    }
                    Op::Pop => match ring.pop() {
                        Ok(payload) => {
                            let (expected, end) = frames.pop_front().expect("model has a frame");
                            prop_assert_eq!(payload, expected);
                            read = end;
                        }
                        Err(RingError::Empty) => prop_assert!(frames.is_empty()),
                        Err(err) => prop_assert!(false, "unexpected pop error {}", err),
                    },
                }
                prop_assert!(ring.len_bytes() <= capacity);
                prop_assert_eq!(ring.len_bytes(), write - read);
            }
        }
    }
}
