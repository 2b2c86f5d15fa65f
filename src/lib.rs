//! # concurrent-utils
//!
//! Two building blocks for concurrent code that has to juggle more than one lock.
//!
//! ## Features
//!
//! - **OrderedLock**: acquires two locks in address order, so two threads locking
//!   the same pair in opposite argument order serialize instead of deadlocking
//! - **ConcurrentQueue**: an unbounded FIFO guarded by a caller-chosen lock, with
//!   blocking and non-blocking pulls, a one-way close, and copy/move/swap/append
//!   between queues of different lock and element types
//! - **SpinLock**: a test-and-set lock with configurable back-off, usable as the
//!   lock of either of the above
//!
//! ## Quick Start
//!
//! ```rust
//! use concurrent_utils::ConcurrentQueue;
//!
//! let queue: ConcurrentQueue<i32> = ConcurrentQueue::new();
//! assert!(queue.push(42));
//! assert_eq!(queue.pull(), Some(42));
//!
//! queue.close();
//! assert!(!queue.push(7));
//! assert_eq!(queue.wait_pull(), None);
//! ```
//!
//! ## Choosing a lock
//!
//! The second type parameter of [`ConcurrentQueue`] is any [`Lockable`]:
//! - [`parking_lot::RawMutex`] (the default) for general use
//! - [`SpinLock`] for very short critical sections
//! - [`NoLock`] when the queue never leaves one thread; such a queue is `!Sync`,
//!   so the compiler rejects sharing it

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod lock;
pub mod queue;

pub use crate::lock::ordered::OrderedLock;
pub use crate::lock::spin::SpinLock;
pub use crate::lock::{Lockable, LockGuard, NoLock};
pub use crate::queue::ConcurrentQueue;

/// Common utilities and helper types
pub mod util {
    use core::ops::{Deref, DerefMut};

    /// Cache line size for alignment purposes
    pub const CACHE_LINE_SIZE: usize = 64;

    /// Pad a value to cache line size
    #[repr(align(64))]
    #[derive(Default)]
    pub struct CachePadded<T> {
        value: T,
    }

    impl<T> CachePadded<T> {
        /// Create a new cache-padded value
        #[inline]
        pub const fn new(value: T) -> Self {
            Self { value }
        }

        /// Get the inner value
        #[inline]
        pub fn into_inner(self) -> T {
            self.value
        }
    }

    impl<T> Deref for CachePadded<T> {
        type Target = T;

        #[inline]
        fn deref(&self) -> &T {
            &self.value
        }
    }

    impl<T> DerefMut for CachePadded<T> {
        #[inline]
        fn deref_mut(&mut self) -> &mut T {
            &mut self.value
        }
    }

    impl<T: core::fmt::Debug> core::fmt::Debug for CachePadded<T> {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            core::fmt::Debug::fmt(&self.value, f)
        }
    }
}

/// Error types for lock misuse
///
/// Both variants are precondition violations: the guard was driven into a state
/// its caller should never have produced. They are reported instead of
/// panicking so that callers can decide how loud to be about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The guard does not hold a usable pair of locks for this operation
    #[error("Operation not permitted")]
    OperationNotPermitted,
    /// Locking would re-acquire locks the guard already owns
    #[error("Resource deadlock would occur")]
    DeadlockWouldOccur,
}

/// Result type for concurrent-utils operations
pub type Result<T> = core::result::Result<T, Error>;
