//! Spin Lock Implementation
//!
//! A test-and-set lock for very short critical sections. Between failed attempts
//! the lock either backs off on the CPU (sleep duration of zero, the default) or
//! puts the thread to sleep for a configurable number of microseconds.

use super::Lockable;
use crate::util::CachePadded;
use crossbeam::utils::Backoff;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// A test-and-set spin lock with configurable waiting strategy
///
/// # Examples
///
/// ```rust
/// use concurrent_utils::{Lockable, SpinLock};
/// use std::time::Duration;
///
/// let lock = SpinLock::new(0);
/// lock.lock();
/// assert!(!lock.try_lock_for(Duration::from_millis(1)));
/// unsafe { lock.unlock() };
/// assert!(lock.try_lock());
/// unsafe { lock.unlock() };
/// ```
#[derive(Debug, Default)]
pub struct SpinLock {
    // Cache-padded so that spinning readers do not share a line with neighbours
    flag: CachePadded<AtomicBool>,
    sleep_micros: AtomicU32,
}

impl SpinLock {
    /// Create a spin lock that sleeps `sleep_micros` microseconds between attempts
    ///
    /// Zero means back off on the CPU instead of sleeping.
    pub const fn new(sleep_micros: u32) -> Self {
        Self {
            flag: CachePadded::new(AtomicBool::new(false)),
            sleep_micros: AtomicU32::new(sleep_micros),
        }
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        !self.flag.swap(true, Ordering::Acquire)
    }

    fn pause(&self, backoff: &Backoff) {
        match self.sleep_micros.load(Ordering::Relaxed) {
            0 => backoff.snooze(),
            micros => thread::sleep(Duration::from_micros(u64::from(micros))),
        }
    }

    /// Try to acquire the lock up to `attempts` times
    ///
    /// At least one attempt is always made.
    pub fn try_lock_n(&self, attempts: u32) -> bool {
        let backoff = Backoff::new();
        let mut remaining = attempts.max(1);
        while !self.try_acquire() {
            remaining -= 1;
            if remaining == 0 {
                return false;
            }
            self.pause(&backoff);
        }
        true
    }

    /// Try to acquire the lock until `deadline` passes
    pub fn try_lock_until(&self, deadline: Instant) -> bool {
        let backoff = Backoff::new();
        while !self.try_acquire() {
            if Instant::now() >= deadline {
                return false;
            }
            self.pause(&backoff);
        }
        true
    }

    /// Try to acquire the lock for at most `timeout`
    pub fn try_lock_for(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.try_lock_until(deadline),
            None => {
                Lockable::lock(self);
                true
            }
        }
    }

    /// Whether some holder currently owns the lock
    pub fn is_locked(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Time slept between failed attempts
    pub fn sleep_duration(&self) -> Duration {
        Duration::from_micros(u64::from(self.sleep_micros.load(Ordering::Relaxed)))
    }

    /// Set the time slept between failed attempts, in microseconds
    pub fn set_sleep_micros(&self, micros: u32) {
        self.sleep_micros.store(micros, Ordering::Relaxed);
    }

    /// Set the time slept between failed attempts
    ///
    /// Durations beyond `u32::MAX` microseconds saturate.
    pub fn set_sleep_duration(&self, duration: Duration) {
        let micros = u32::try_from(duration.as_micros()).unwrap_or(u32::MAX);
        self.set_sleep_micros(micros);
    }

    /// Go back to spinning on the CPU between attempts
    pub fn reset_sleep_duration(&self) {
        self.set_sleep_micros(0);
    }
}

unsafe impl Lockable for SpinLock {
    fn init() -> Self {
        Self::new(0)
    }

    fn lock(&self) {
        let backoff = Backoff::new();
        while !self.try_acquire() {
            self.pause(&backoff);
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.try_acquire()
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
