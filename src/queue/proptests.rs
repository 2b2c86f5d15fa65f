//! Property-based tests for the concurrent queue using proptest
//!
//! Queue behaviour is compared against a `VecDeque` model under random
//! operation sequences.

use crate::lock::{NoLock, SpinLock};
use crate::queue::ConcurrentQueue;
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Op {
    Push(i32),
    Pull,
    Close,
    Clear,
    AppendFrom(Vec<i32>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => any::<i32>().prop_map(Op::Push),
        4 => Just(Op::Pull),
        1 => Just(Op::Close),
        1 => Just(Op::Clear),
        2 => prop::collection::vec(any::<i32>(), 0..8).prop_map(Op::AppendFrom),
    ]
}

proptest! {
    #[test]
    fn test_fifo_ordering_single_thread(
        batches in prop::collection::vec(prop::collection::vec(any::<i32>(), 1..10), 1..5)
    ) {
        let queue: ConcurrentQueue<i32> = ConcurrentQueue::new();
        let mut expected = Vec::new();

        for batch in &batches {
            for &value in batch {
                prop_assert!(queue.push(value));
                expected.push(value);
            }
        }

        prop_assert_eq!(queue.len(), expected.len());
        for value in expected {
            prop_assert_eq!(queue.pull(), Some(value));
        }
        prop_assert!(queue.is_empty());
    }

    #[test]
    fn test_matches_model(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let queue: ConcurrentQueue<i32, SpinLock> = ConcurrentQueue::new();
        let mut model = VecDeque::new();
        let mut closed = false;

        for op in ops {
            match op {
                Op::Push(value) => {
                    prop_assert_eq!(queue.push(value), !closed);
                    if !closed {
                        model.push_back(value);
                    }
                }
                Op::Pull => {
                    prop_assert_eq!(queue.pull(), model.pop_front());
                }
                Op::Close => {
                    queue.close();
                    closed = true;
                }
                Op::Clear => {
                    queue.clear();
                    model.clear();
                    closed = false;
                }
                Op::AppendFrom(values) => {
                    let source: ConcurrentQueue<i32, NoLock> = values.iter().copied().collect();
                    prop_assert_eq!(queue.append(&source), !closed);
                    if !closed {
                        model.extend(values);
                        prop_assert!(source.is_empty());
                    } else {
                        prop_assert_eq!(source.len(), values.len());
                    }
                }
            }
            prop_assert_eq!(queue.len(), model.len());
            prop_assert_eq!(queue.is_closed(), closed);
        }

        prop_assert_eq!(queue.into_iter().collect::<Vec<_>>(), Vec::from(model));
    }

    #[test]
    fn test_copy_is_independent(
        values in prop::collection::vec(any::<i16>(), 0..32),
        extra in any::<i16>(),
    ) {
        let original: ConcurrentQueue<i16> = values.iter().copied().collect();
        let copy: ConcurrentQueue<i32, SpinLock> = ConcurrentQueue::from_queue(&original);

        prop_assert!(copy.push(extra));
        if let Some(first) = original.pull() {
            prop_assert_eq!(first, values[0]);
        }

        let mut expected: Vec<i32> = values.iter().map(|&v| i32::from(v)).collect();
        expected.push(i32::from(extra));
        prop_assert_eq!(copy.into_iter().collect::<Vec<_>>(), expected);
        prop_assert_eq!(original.len(), values.len().saturating_sub(1));
    }

    #[test]
    fn test_close_is_idempotent(values in prop::collection::vec(any::<u8>(), 0..16), closes in 1usize..5) {
        let queue: ConcurrentQueue<u8> = values.iter().copied().collect();

        for _ in 0..closes {
            queue.close();
            prop_assert!(queue.is_closed());
            prop_assert_eq!(queue.len(), values.len());
        }

        for &value in &values {
            prop_assert_eq!(queue.wait_pull(), Some(value));
        }
        prop_assert_eq!(queue.wait_pull(), None);
    }

    #[test]
    fn test_try_assign_is_all_or_nothing(
        source in prop::collection::vec(-50i32..300, 0..16),
        target in prop::collection::vec(any::<u8>(), 0..8),
    ) {
        let from: ConcurrentQueue<i32> = source.iter().copied().collect();
        let into: ConcurrentQueue<u8, SpinLock> = target.iter().copied().collect();

        let converted: Result<Vec<u8>, _> = source.iter().map(|&v| u8::try_from(v)).collect();
        let result = into.try_assign_from(&from);
        prop_assert_eq!(result.is_ok(), converted.is_ok());

        let remaining = into.into_iter().collect::<Vec<_>>();
        match converted {
            Ok(expected) => {
                prop_assert_eq!(remaining, expected);
            }
            Err(_) => {
                prop_assert_eq!(remaining, target);
            }
        }
        prop_assert_eq!(from.len(), source.len());
    }
}
