//! Condition variable for arbitrary [`Lockable`] types
//!
//! `parking_lot::Condvar` only cooperates with `parking_lot::Mutex`. Queues may be
//! guarded by any `Lockable`, so waiting goes through a small internal gate mutex
//! instead:
//!
//! ```text
//! waiter                               notifier
//! ------                               --------
//! holds L, predicate false             (blocked on L)
//! lock gate
//! unlock L                    ---->    lock L, change state, unlock L
//! wait on cond (releases gate)         lock gate
//!                             <----    notify, unlock gate
//! unlock gate, lock L
//! ```
//!
//! The waiter takes the gate before it lets go of `L`, and the notifier needs the
//! gate to signal, so a notification issued after the state change can never
//! slip in between the predicate check and the wait.

use super::{LockGuard, Lockable};
use parking_lot::{Condvar, Mutex};
use std::time::Instant;

/// A condition variable that works with any [`LockGuard`].
#[derive(Debug, Default)]
pub struct AnyCondvar {
    gate: Mutex<()>,
    cond: Condvar,
}

impl AnyCondvar {
    /// Create a new condition variable
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases the guarded lock, blocks until notified, then re-acquires it.
    ///
    /// Spurious wakeups are possible; callers re-check their predicate.
    pub fn wait<L: Lockable>(&self, guard: &mut LockGuard<'_, L>) {
        let mut gate = self.gate.lock();
        // SAFETY: the guard holds the lock; it is re-acquired before returning.
        unsafe { guard.lock.unlock() };
        self.cond.wait(&mut gate);
        drop(gate);
        guard.lock.lock();
    }

    /// Like [`wait`](Self::wait), but gives up at `deadline`.
    ///
    /// Returns `true` if the deadline passed without a notification.
    pub fn wait_until<L: Lockable>(&self, guard: &mut LockGuard<'_, L>, deadline: Instant) -> bool {
        let mut gate = self.gate.lock();
        // SAFETY: as in `wait`.
        unsafe { guard.lock.unlock() };
        let timed_out = self.cond.wait_until(&mut gate, deadline).timed_out();
        drop(gate);
        guard.lock.lock();
        timed_out
    }

    /// Wakes one waiting thread, if any. Returns whether a thread was woken.
    pub fn notify_one(&self) -> bool {
        let _gate = self.gate.lock();
        self.cond.notify_one()
    }

    /// Wakes every waiting thread. Returns how many were woken.
    pub fn notify_all(&self) -> usize {
        let _gate = self.gate.lock();
        self.cond.notify_all()
    }
}
