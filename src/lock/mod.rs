//! Lock types and the capability they share
//!
//! Everything that can guard a [`ConcurrentQueue`](crate::ConcurrentQueue) or take
//! part in an [`OrderedLock`] implements [`Lockable`]: a blocking acquire, a
//! non-blocking attempt, and a release.
//!
//! ## Available Locks
//!
//! - [`parking_lot::RawMutex`]: general-purpose blocking mutex, the default choice
//! - [`SpinLock`]: test-and-set lock with configurable back-off
//! - [`NoLock`]: non-blocking stand-in for data that never leaves one thread
//!
//! ## Choosing a Lock
//!
//! | Lock | Contended acquire | Shareable across threads |
//! |------|-------------------|--------------------------|
//! | `parking_lot::RawMutex` | parks the thread | yes |
//! | `SpinLock` | spins or sleeps | yes |
//! | `NoLock` | panics on nested use | no (`!Sync`) |

pub mod condvar;
pub mod ordered;
pub mod spin;

pub use self::condvar::AnyCondvar;
pub use self::ordered::OrderedLock;
pub use self::spin::SpinLock;

use core::cell::Cell;
use core::fmt;
use parking_lot::lock_api::RawMutex as RawMutexApi;


/// A raw mutual-exclusion primitive.
///
/// # Safety
///
/// Queues hand out `&mut` access to their contents while the lock is held, so an
/// implementor must guarantee that at most one holder exists at a time. A `Sync`
/// implementor guarantees it across threads. Every implementor guarantees it on a
/// single thread too: acquiring a lock that is already held must block (and so
/// deadlock) or panic, never succeed. See [`NoLock`].
pub unsafe trait Lockable {
    /// Creates the lock in its unlocked state.
    fn init() -> Self
    where
        Self: Sized;

    /// Acquires the lock, blocking the current thread until it is available.
    fn lock(&self);

    /// Attempts to acquire the lock without blocking.
    fn try_lock(&self) -> bool;

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// The lock must be held by the current context.
    unsafe fn unlock(&self);
}

unsafe impl Lockable for parking_lot::RawMutex {
    fn init() -> Self {
        <Self as RawMutexApi>::INIT
    }

    #[inline]
    fn lock(&self) {
        RawMutexApi::lock(self);
    }

    #[inline]
    fn try_lock(&self) -> bool {
        RawMutexApi::try_lock(self)
    }

    #[inline]
    unsafe fn unlock(&self) {
        RawMutexApi::unlock(self);
    }
}

/// A lock for data that never leaves one thread.
///
/// Use it to skip synchronization cost when a queue is confined to one thread.
/// `NoLock` is `!Sync`, so anything guarded by it cannot be shared across threads.
///
/// Acquiring never blocks; it only records that the lock is held. Acquiring it
/// again before the release (for example from a `Clone` impl that pushes into the
/// queue being copied) panics, the way a second `RefCell::borrow_mut` does.
#[derive(Default)]
pub struct NoLock {
    held: Cell<bool>,
}

impl NoLock {
    /// Create a new, released lock
    pub const fn new() -> Self {
        Self {
            held: Cell::new(false),
        }
    }

    /// Whether the lock is currently held
    pub fn is_locked(&self) -> bool {
        self.held.get()
    }
}

impl fmt::Debug for NoLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoLock").field("held", &self.held.get()).finish()
    }
}

// SAFETY: NoLock is !Sync, so only one thread can ever reach it, and nested
// acquisition on that thread panics before a second holder exists.
unsafe impl Lockable for NoLock {
    fn init() -> Self {
        Self::new()
    }

    #[inline]
    fn lock(&self) {
        if self.held.replace(true) {
            panic!("NoLock acquired again while already held");
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        !self.held.replace(true)
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.held.set(false);
    }
}

/// Scoped ownership of a single lock: acquired on creation, released on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a, L: Lockable> {
    lock: &'a L,
}

impl<'a, L: Lockable> LockGuard<'a, L> {
    /// Acquire `lock` and return a guard that releases it when dropped
    pub fn new(lock: &'a L) -> Self {
        lock.lock();
        Self { lock }
    }

    /// The lock this guard holds
    pub fn lockable(&self) -> &'a L {
        self.lock
    }
}

impl<L: Lockable> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        // SAFETY: the guard acquired the lock in `new` and holds it until now.
        unsafe { self.lock.unlock() }
    }
}

impl<L: Lockable> fmt::Debug for LockGuard<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock", &(self.lock as *const L))
            .finish()
    }
}
