//! Ordered acquisition of two locks
//!
//! Code that needs two locks at once (copying one queue into another, swapping
//! two queues) deadlocks as soon as two threads take the same pair in opposite
//! order. [`OrderedLock`] always acquires the lock at the lower address first, so
//! every thread agrees on one global order no matter how it names the pair.

use super::Lockable;
use crate::{Error, Result};
use core::fmt;
use core::mem;

/// Guard owning two locks acquired in address order
///
/// The guard is in one of three states:
/// - bound to two locks (held or not, see [`owns_lock`](Self::owns_lock))
/// - empty: bound to nothing; `lock`/`unlock` only flip the flag
/// - released: the locks were handed back by [`release`](Self::release) and the
///   caller took over the obligation to unlock them
///
/// # Examples
///
/// ```rust
/// use concurrent_utils::{OrderedLock, SpinLock};
///
/// let a = SpinLock::new(0);
/// let b = SpinLock::new(0);
///
/// // Another thread may write `OrderedLock::new(&b, &a)` at the same time
/// // without risking a deadlock.
/// let guard = OrderedLock::new(&a, &b);
/// assert!(guard.owns_lock());
/// assert!(a.is_locked() && b.is_locked());
///
/// drop(guard);
/// assert!(!a.is_locked() && !b.is_locked());
/// ```
#[must_use = "the locks are released as soon as the guard is dropped"]
pub struct OrderedLock<'a, L1: Lockable, L2: Lockable> {
    locks: (Option<&'a L1>, Option<&'a L2>),
    locked: bool,
}

#[inline]
fn address_of<T>(value: &T) -> usize {
    value as *const T as usize
}

impl<'a, L1: Lockable, L2: Lockable> OrderedLock<'a, L1, L2> {
    /// Creates a guard bound to no locks
    pub const fn empty() -> Self {
        Self {
            locks: (None, None),
            locked: false,
        }
    }

    /// Binds `first` and `second` and acquires both
    pub fn new(first: &'a L1, second: &'a L2) -> Self {
        Self::acquire(first, second);
        Self {
            locks: (Some(first), Some(second)),
            locked: true,
        }
    }

    /// Binds `first` and `second` without acquiring them; see [`lock`](Self::lock)
    pub const fn deferred(first: &'a L1, second: &'a L2) -> Self {
        Self {
            locks: (Some(first), Some(second)),
            locked: false,
        }
    }

    /// Binds `first` and `second`, which the caller has already acquired
    ///
    /// # Safety
    ///
    /// Both locks must be held by the current context. The guard releases them
    /// when it is dropped or unlocked.
    pub const unsafe fn adopt(first: &'a L1, second: &'a L2) -> Self {
        Self {
            locks: (Some(first), Some(second)),
            locked: true,
        }
    }

    fn acquire(first: &L1, second: &L2) {
        let (a, b) = (address_of(first), address_of(second));
        if a == b {
            first.lock();
        } else if a < b {
            first.lock();
            second.lock();
        } else {
            second.lock();
            first.lock();
        }
    }

    /// # Safety
    ///
    /// Both locks must be held, as acquired by `acquire`.
    unsafe fn release_both(first: &L1, second: &L2) {
        let (a, b) = (address_of(first), address_of(second));
        if a == b {
            first.unlock();
        } else if a < b {
            first.unlock();
            second.unlock();
        } else {
            second.unlock();
            first.unlock();
        }
    }

    /// Acquires both locks, lower address first
    ///
    /// An empty guard just records that it is locked.
    ///
    /// # Errors
    ///
    /// - [`Error::OperationNotPermitted`] if only one lock is bound
    /// - [`Error::DeadlockWouldOccur`] if the guard is already locked
    pub fn lock(&mut self) -> Result<()> {
        match self.locks {
            (None, None) if !self.locked => {
                self.locked = true;
                Ok(())
            }
            (Some(first), Some(second)) if !self.locked => {
                Self::acquire(first, second);
                self.locked = true;
                Ok(())
            }
            (None, None) | (Some(_), Some(_)) => {
                tracing::debug!("ordered lock re-locked while owning its locks");
                Err(Error::DeadlockWouldOccur)
            }
            _ => {
                tracing::debug!("ordered lock used with a single bound lock");
                Err(Error::OperationNotPermitted)
            }
        }
    }

    /// Releases both locks
    ///
    /// An empty guard just records that it is unlocked.
    ///
    /// # Errors
    ///
    /// [`Error::OperationNotPermitted`] if the guard is not locked or only one
    /// lock is bound.
    pub fn unlock(&mut self) -> Result<()> {
        match self.locks {
            (None, None) if self.locked => {
                self.locked = false;
                Ok(())
            }
            (Some(first), Some(second)) if self.locked => {
                // SAFETY: `locked` means both locks were acquired or adopted.
                unsafe { Self::release_both(first, second) };
                self.locked = false;
                Ok(())
            }
            _ => {
                tracing::debug!(locked = self.locked, "ordered lock unlocked in an invalid state");
                Err(Error::OperationNotPermitted)
            }
        }
    }

    /// Hands the bound locks back without unlocking them
    ///
    /// If the guard owned the locks, the caller now has to unlock them. The
    /// [`owns_lock`](Self::owns_lock) flag is left as it was.
    pub fn release(&mut self) -> (Option<&'a L1>, Option<&'a L2>) {
        mem::replace(&mut self.locks, (None, None))
    }

    /// Moves the bound locks and the unlock obligation into a new guard,
    /// leaving this one empty and unlocked
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::empty())
    }

    /// Exchanges bound locks and lock state with `other`
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Whether the guard is currently locked
    pub fn owns_lock(&self) -> bool {
        self.locked
    }
}

impl<L1: Lockable, L2: Lockable> Default for OrderedLock<'_, L1, L2> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<L1: Lockable, L2: Lockable> Drop for OrderedLock<'_, L1, L2> {
    fn drop(&mut self) {
        if self.locked {
            // Only fails for a half-bound guard, which has nothing to release.
            let _ = self.unlock();
        }
    }
}

impl<L1: Lockable, L2: Lockable> fmt::Debug for OrderedLock<'_, L1, L2> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedLock")
            .field("first", &self.locks.0.map(|l| l as *const L1))
            .field("second", &self.locks.1.map(|l| l as *const L2))
            .field("locked", &self.locked)
            .finish()
    }
}
