//! Queue implementations
//!
//! This module provides a closable, blocking FIFO queue whose lock is a type
//! parameter.
//!
//! ## Available Queues
//!
//! - [`ConcurrentQueue`]: Unbounded multi-producer, multi-consumer queue with
//!   blocking [`wait_pull`](ConcurrentQueue::wait_pull) and [`close`](ConcurrentQueue::close)
//!
//! ## Choosing a Lock
//!
//! | Lock | Blocking | `Sync` | Good for |
//! |------|----------|--------|----------|
//! | [`parking_lot::RawMutex`] (default) | Parks the thread | Yes | General use |
//! | [`SpinLock`](crate::SpinLock) | Spins, then sleeps | Yes | Very short critical sections |
//! | [`NoLock`](crate::NoLock) | Never | No | Single-threaded use |
//!
//! ## Performance Characteristics
//!
//! | Operation | Cost | Under lock |
//! |-----------|------|------------|
//! | `push` / `pull` | O(1) | Pointer relinking only |
//! | `append` | O(1) | Splice of two chains |
//! | `swap` / `take_from` | O(1) | Two pointer exchanges |
//! | `assign_from` / `from_queue` | O(n) | Element conversion |
//! | `clear` | O(n) | O(1); nodes freed after unlock |
//!
//! ## Examples
//!
//! ```rust
//! use concurrent_utils::queue::ConcurrentQueue;
//! use concurrent_utils::SpinLock;
//!
//! let jobs: ConcurrentQueue<&str, SpinLock> = ConcurrentQueue::new();
//! jobs.push("build");
//! jobs.push("test");
//!
//! let backlog: ConcurrentQueue<&str> = ConcurrentQueue::new();
//! backlog.push("deploy");
//!
//! assert!(jobs.append(&backlog));
//! assert_eq!(jobs.into_iter().collect::<Vec<_>>(), ["build", "test", "deploy"]);
//! ```
pub mod concurrent;
mod list;

pub use concurrent::{ConcurrentQueue, IntoIter};


#[cfg(test)]
mod proptests;
