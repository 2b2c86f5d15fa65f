//! Closable blocking FIFO queue, generic over its lock
//!
//! [`ConcurrentQueue<T, L>`] stores elements of type `T` in a linked chain guarded
//! by a lock of type `L`. Any number of threads may push and pull concurrently;
//! [`wait_pull`](ConcurrentQueue::wait_pull) blocks on a condition variable until
//! an element arrives or the queue is closed.
//!
//! ## Lifecycle
//!
//! ```text
//!            push / pull                      pull
//!           +-----------+                  +--------+
//!           v           |                  v        |
//!        [ Open ] ------+--- close() ---> [ Closed ]
//!           ^                                  |
//!           +----------- clear() --------------+
//! ```
//!
//! - `push` fails on a closed queue; elements already inside can still be pulled
//! - `wait_pull` on a closed queue drains the remaining elements and then fails
//!   immediately instead of blocking
//! - `clear` swaps in a brand-new queue state, which also reopens a closed queue
//!
//! ## Operations across queues
//!
//! Swapping, copying, moving and appending work between queues with different
//! lock types, and copying also between different element types as long as the
//! target element can be built from the source element. Whenever two queues are
//! involved both locks are taken through [`OrderedLock`], so two threads
//! swapping `a` with `b` and `b` with `a` at the same time cannot deadlock.
//!
//! ## Critical sections
//!
//! Nodes are allocated before the lock is taken and freed after it is released;
//! the lock only covers O(1) relinking. Copies build a complete side list while
//! holding the locks and install it only once every element was converted, so a
//! failed conversion leaves the target exactly as it was.

use crate::lock::{AnyCondvar, LockGuard, Lockable, OrderedLock};
use crate::queue::list::{List, Node};
use core::cell::UnsafeCell;
use core::convert::Infallible;
use core::fmt;
use core::mem;
use std::time::{Duration, Instant};

/// Everything the queue lock protects
struct State<T> {
    list: List<T>,
    closed: bool,
}

impl<T> Default for State<T> {
    fn default() -> Self {
        Self {
            list: List::new(),
            closed: false,
        }
    }
}

impl<T> State<T> {
    #[inline]
    fn has_news(&self) -> bool {
        !self.list.is_empty() || self.closed
    }
}

/// An unbounded, closable FIFO queue guarded by a lock of type `L`
///
/// # Type Parameters
///
/// * `T` - The type of elements stored in the queue
/// * `L` - The lock guarding the queue; [`parking_lot::RawMutex`] by default
///
/// # Examples
///
/// ```rust
/// use concurrent_utils::ConcurrentQueue;
/// use std::sync::Arc;
/// use std::thread;
///
/// let queue: Arc<ConcurrentQueue<u64>> = Arc::new(ConcurrentQueue::new());
///
/// let consumer = thread::spawn({
///     let queue = Arc::clone(&queue);
///     move || {
///         let mut sum = 0;
///         while let Some(value) = queue.wait_pull() {
///             sum += value;
///         }
///         sum
///     }
/// });
///
/// for i in 0..100u64 {
///     assert!(queue.push(i));
/// }
/// queue.close();
///
/// assert_eq!(consumer.join().unwrap(), 4950);
/// ```
///
/// # Thread Safety
///
/// The queue is `Sync` when `T: Send` and `L: Sync`. With [`NoLock`](crate::NoLock)
/// it is confined to a single thread.
pub struct ConcurrentQueue<T, L: Lockable = parking_lot::RawMutex> {
    lock: L,
    ready: AnyCondvar,
    state: UnsafeCell<State<T>>,
}

// SAFETY: `state` is only reached through `&mut self` or while `lock` is held, and
// `Lockable` implementors that are `Sync` guarantee mutual exclusion.
unsafe impl<T: Send, L: Lockable + Sync> Sync for ConcurrentQueue<T, L> {}

impl<T, L: Lockable> ConcurrentQueue<T, L> {
    /// Create a new, empty and open queue
    ///
    /// # Examples
    ///
    /// ```rust
    /// use concurrent_utils::{ConcurrentQueue, NoLock};
    ///
    /// let queue: ConcurrentQueue<String, NoLock> = ConcurrentQueue::new();
    /// assert!(queue.is_empty());
    /// assert!(!queue.is_closed());
    /// ```
    pub fn new() -> Self {
        Self::with_state(State::default())
    }

    fn with_state(state: State<T>) -> Self {
        Self {
            lock: L::init(),
            ready: AnyCondvar::new(),
            state: UnsafeCell::new(state),
        }
    }

    #[inline]
    fn guard(&self) -> LockGuard<'_, L> {
        LockGuard::new(&self.lock)
    }

    /// Access the protected state through a guard of this queue's own lock
    #[inline]
    fn state_mut<'g>(&'g self, guard: &'g mut LockGuard<'_, L>) -> &'g mut State<T> {
        debug_assert!(core::ptr::eq(guard.lockable(), &self.lock));
        // SAFETY: the guard holds `self.lock`, and borrowing it mutably for 'g
        // prevents waiting on the condvar (which releases the lock) meanwhile.
        unsafe { &mut *self.state.get() }
    }

    /// Whether `self` and `other` are the same object
    #[inline]
    fn is_same<U, L2: Lockable>(&self, other: &ConcurrentQueue<U, L2>) -> bool {
        core::ptr::eq(
            self as *const Self as *const u8,
            other as *const ConcurrentQueue<U, L2> as *const u8,
        )
    }

    /// Returns true if the queue holds no elements
    pub fn is_empty(&self) -> bool {
        let mut guard = self.guard();
        self.state_mut(&mut guard).list.is_empty()
    }

    /// Number of elements currently in the queue
    pub fn len(&self) -> usize {
        let mut guard = self.guard();
        self.state_mut(&mut guard).list.len()
    }

    /// Returns true once [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        let mut guard = self.guard();
        self.state_mut(&mut guard).closed
    }

    /// Append a value to the back of the queue
    ///
    /// The element is built from `value` before the lock is taken. Returns
    /// `false` and drops the element if the queue is closed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use concurrent_utils::ConcurrentQueue;
    ///
    /// let queue: ConcurrentQueue<String> = ConcurrentQueue::new();
    /// assert!(queue.push("hello"));
    /// queue.close();
    /// assert!(!queue.push("world"));
    /// assert_eq!(queue.pull().as_deref(), Some("hello"));
    /// ```
    pub fn push<V: Into<T>>(&self, value: V) -> bool {
        let node = Node::boxed(value.into());
        {
            let mut guard = self.guard();
            let state = self.state_mut(&mut guard);
            if state.closed {
                return false;
            }
            state.list.hook(node);
        }
        self.ready.notify_one();
        true
    }

    /// [`push`](Self::push) without taking the lock
    ///
    /// `&mut self` already proves that no other thread can reach the queue, e.g.
    /// while it is being filled before it is shared.
    pub fn push_unlocked<V: Into<T>>(&mut self, value: V) -> bool {
        let state = self.state.get_mut();
        if state.closed {
            return false;
        }
        state.list.push_back(value.into());
        true
    }

    /// Remove the front element without blocking
    ///
    /// Returns `None` if the queue is empty. Elements left in a closed queue are
    /// still returned.
    pub fn pull(&self) -> Option<T> {
        let node = {
            let mut guard = self.guard();
            self.state_mut(&mut guard).list.unhook_front()
        };
        node.map(Node::into_value)
    }

    /// Remove the front element into `value` without blocking
    ///
    /// Returns `false` and leaves `value` untouched if the queue is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use concurrent_utils::ConcurrentQueue;
    ///
    /// let queue: ConcurrentQueue<i32> = ConcurrentQueue::new();
    /// let mut value = -99;
    /// assert!(!queue.pull_into(&mut value));
    /// assert_eq!(value, -99);
    /// ```
    pub fn pull_into(&self, value: &mut T) -> bool {
        match self.pull() {
            Some(pulled) => {
                *value = pulled;
                true
            }
            None => false,
        }
    }

    /// [`pull`](Self::pull) without taking the lock
    pub fn pull_unlocked(&mut self) -> Option<T> {
        self.state.get_mut().list.pop_front()
    }

    /// Remove the front element, blocking while the queue is empty and open
    ///
    /// Returns `None` only once the queue is closed and drained.
    pub fn wait_pull(&self) -> Option<T> {
        let node = {
            let mut guard = self.guard();
            loop {
                let state = self.state_mut(&mut guard);
                if state.has_news() {
                    break state.list.unhook_front();
                }
                self.ready.wait(&mut guard);
            }
        };
        node.map(Node::into_value)
    }

    /// Like [`wait_pull`](Self::wait_pull), but gives up at `deadline`
    ///
    /// The queue is checked once more after the deadline passes, so an element
    /// that arrived just in time is still returned.
    pub fn wait_pull_until(&self, deadline: Instant) -> Option<T> {
        let node = {
            let mut guard = self.guard();
            loop {
                let state = self.state_mut(&mut guard);
                if state.has_news() {
                    break state.list.unhook_front();
                }
                if self.ready.wait_until(&mut guard, deadline) {
                    break self.state_mut(&mut guard).list.unhook_front();
                }
            }
        };
        node.map(Node::into_value)
    }

    /// Like [`wait_pull`](Self::wait_pull), but gives up after `timeout`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use concurrent_utils::ConcurrentQueue;
    /// use std::time::Duration;
    ///
    /// let queue: ConcurrentQueue<i32> = ConcurrentQueue::new();
    /// assert_eq!(queue.wait_pull_for(Duration::from_millis(10)), None);
    /// ```
    pub fn wait_pull_for(&self, timeout: Duration) -> Option<T> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_pull_until(deadline),
            None => self.wait_pull(),
        }
    }

    /// Close the queue and wake every waiting thread
    ///
    /// Further pushes fail. Closing an already closed queue does nothing.
    pub fn close(&self) {
        {
            let mut guard = self.guard();
            let state = self.state_mut(&mut guard);
            if state.closed {
                return;
            }
            state.closed = true;
        }
        let woken = self.ready.notify_all();
        tracing::debug!(woken, "queue closed");
    }

    /// Discard every element by swapping in a brand-new queue state
    ///
    /// The fresh state is open, so clearing a closed queue reopens it.
    pub fn clear(&self) {
        let old = {
            let mut guard = self.guard();
            mem::take(self.state_mut(&mut guard))
        };
        tracing::trace!(discarded = old.list.len(), reopened = old.closed, "queue cleared");
    }

    /// Exchange contents and closed state with `other`
    ///
    /// Both locks are taken in address order. Waiters on either queue are woken
    /// if their queue now has elements or is closed.
    pub fn swap<L2: Lockable>(&self, other: &ConcurrentQueue<T, L2>) {
        if self.is_same(other) {
            return;
        }
        let (wake_self, wake_other) = {
            let _locks = OrderedLock::new(&self.lock, &other.lock);
            // SAFETY: both locks are held by `_locks` and the queues are distinct.
            let (mine, theirs) = unsafe { (&mut *self.state.get(), &mut *other.state.get()) };
            mem::swap(mine, theirs);
            (mine.has_news(), theirs.has_news())
        };
        if wake_self {
            self.ready.notify_all();
        }
        if wake_other {
            other.ready.notify_all();
        }
        tracing::trace!("queues swapped");
    }

    /// [`swap`](Self::swap) without taking any lock
    pub fn swap_unlocked<L2: Lockable>(&mut self, other: &mut ConcurrentQueue<T, L2>) {
        mem::swap(self.state.get_mut(), other.state.get_mut());
    }

    /// Create an open queue holding converted copies of `other`'s elements
    ///
    /// # Examples
    ///
    /// ```rust
    /// use concurrent_utils::{ConcurrentQueue, NoLock};
    ///
    /// let ints: ConcurrentQueue<i32> = ConcurrentQueue::new();
    /// ints.push(1);
    /// ints.push(2);
    ///
    /// let floats: ConcurrentQueue<f64, NoLock> = ConcurrentQueue::from_queue(&ints);
    /// assert_eq!(floats.pull(), Some(1.0));
    /// assert_eq!(ints.len(), 2);
    /// ```
    pub fn from_queue<U, L2>(other: &ConcurrentQueue<U, L2>) -> Self
    where
        U: Clone,
        T: From<U>,
        L2: Lockable,
    {
        match Self::try_from_queue_with(other, |value| Ok::<_, Infallible>(T::from(value.clone()))) {
            Ok(queue) => queue,
            Err(never) => match never {},
        }
    }

    /// Fallible [`from_queue`](Self::from_queue)
    ///
    /// # Errors
    ///
    /// Returns the first conversion error; no queue is created.
    pub fn try_from_queue<U, L2>(other: &ConcurrentQueue<U, L2>) -> Result<Self, T::Error>
    where
        U: Clone,
        T: TryFrom<U>,
        L2: Lockable,
    {
        Self::try_from_queue_with(other, |value| T::try_from(value.clone()))
    }

    fn try_from_queue_with<U, L2, E, F>(other: &ConcurrentQueue<U, L2>, convert: F) -> Result<Self, E>
    where
        L2: Lockable,
        F: FnMut(&U) -> Result<T, E>,
    {
        let list = {
            let mut guard = other.guard();
            other.state_mut(&mut guard).list.try_map(convert)?
        };
        tracing::trace!(copied = list.len(), "queue copied");
        Ok(Self::with_state(State { list, closed: false }))
    }

    /// Replace this queue's elements with converted copies of `other`'s
    ///
    /// The closed state of `self` is kept. Assigning a queue to itself does
    /// nothing.
    pub fn assign_from<U, L2>(&self, other: &ConcurrentQueue<U, L2>)
    where
        U: Clone,
        T: From<U>,
        L2: Lockable,
    {
        match self.try_assign_with(other, |value| Ok::<_, Infallible>(T::from(value.clone()))) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Fallible [`assign_from`](Self::assign_from)
    ///
    /// # Errors
    ///
    /// Returns the first conversion error, in which case `self` is unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use concurrent_utils::ConcurrentQueue;
    ///
    /// let wide: ConcurrentQueue<i64> = ConcurrentQueue::new();
    /// wide.push(1);
    /// wide.push(1_000);
    ///
    /// let narrow: ConcurrentQueue<u8> = ConcurrentQueue::new();
    /// narrow.push(7);
    ///
    /// assert!(narrow.try_assign_from(&wide).is_err());
    /// assert_eq!(narrow.pull(), Some(7));
    /// assert!(narrow.is_empty());
    /// ```
    pub fn try_assign_from<U, L2>(&self, other: &ConcurrentQueue<U, L2>) -> Result<(), T::Error>
    where
        U: Clone,
        T: TryFrom<U>,
        L2: Lockable,
    {
        self.try_assign_with(other, |value| T::try_from(value.clone()))
    }

    fn try_assign_with<U, L2, E, F>(&self, other: &ConcurrentQueue<U, L2>, convert: F) -> Result<(), E>
    where
        L2: Lockable,
        F: FnMut(&U) -> Result<T, E>,
    {
        if self.is_same(other) {
            return Ok(());
        }
        let (old, has_news) = {
            let _locks = OrderedLock::new(&self.lock, &other.lock);
            // SAFETY: both locks are held by `_locks` and the queues are distinct.
            let (mine, theirs) = unsafe { (&mut *self.state.get(), &*other.state.get()) };
            let copy = theirs.list.try_map(convert)?;
            let old = mem::replace(&mut mine.list, copy);
            (old, mine.has_news())
        };
        if has_news {
            self.ready.notify_all();
        }
        tracing::trace!(discarded = old.len(), "queue assigned");
        Ok(())
    }

    /// Move this queue, elements and closed state, behind a different lock type
    pub fn into_lock<L2: Lockable>(mut self) -> ConcurrentQueue<T, L2> {
        ConcurrentQueue::with_state(mem::take(self.state.get_mut()))
    }

    /// Take over `other`'s elements and closed state, leaving `other` empty and open
    ///
    /// The previous elements of `self` are dropped.
    pub fn take_from<L2: Lockable>(&self, other: &ConcurrentQueue<T, L2>) {
        if self.is_same(other) {
            return;
        }
        let (old, has_news) = {
            let _locks = OrderedLock::new(&self.lock, &other.lock);
            // SAFETY: both locks are held by `_locks` and the queues are distinct.
            let (mine, theirs) = unsafe { (&mut *self.state.get(), &mut *other.state.get()) };
            let old = mem::replace(mine, mem::take(theirs));
            (old, mine.has_news())
        };
        if has_news {
            self.ready.notify_all();
        }
        tracing::trace!(discarded = old.list.len(), "queue moved");
    }

    /// Move every element of `other` to the back of this queue in O(1)
    ///
    /// Returns `false`, leaving both queues untouched, if `self` is closed or
    /// `other` is `self`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use concurrent_utils::{ConcurrentQueue, SpinLock};
    ///
    /// let a: ConcurrentQueue<i32> = ConcurrentQueue::new();
    /// let b: ConcurrentQueue<i32, SpinLock> = ConcurrentQueue::new();
    /// a.push(1);
    /// b.push(2);
    ///
    /// assert!(a.append(&b));
    /// assert!(b.is_empty());
    /// assert_eq!(a.pull(), Some(1));
    /// assert_eq!(a.pull(), Some(2));
    /// ```
    pub fn append<L2: Lockable>(&self, other: &ConcurrentQueue<T, L2>) -> bool {
        if self.is_same(other) {
            return false;
        }
        let moved = {
            let _locks = OrderedLock::new(&self.lock, &other.lock);
            // SAFETY: both locks are held by `_locks` and the queues are distinct.
            let (mine, theirs) = unsafe { (&mut *self.state.get(), &mut *other.state.get()) };
            if mine.closed {
                return false;
            }
            let moved = theirs.list.len();
            mine.list.splice(&mut theirs.list);
            moved
        };
        if moved > 0 {
            self.ready.notify_all();
        }
        tracing::trace!(moved, "queue appended");
        true
    }

    /// Append converted copies of `other`'s elements, leaving `other` untouched
    ///
    /// The copies are made under `other`'s lock only and then spliced on under
    /// `self`'s lock, so appending a queue to itself duplicates its elements.
    /// Returns `false` if `self` is closed.
    pub fn append_cloned<U, L2>(&self, other: &ConcurrentQueue<U, L2>) -> bool
    where
        U: Clone,
        T: From<U>,
        L2: Lockable,
    {
        let copied = {
            let mut guard = other.guard();
            other
                .state_mut(&mut guard)
                .list
                .try_map(|value| Ok::<_, Infallible>(T::from(value.clone())))
        };
        let mut copied = match copied {
            Ok(list) => list,
            Err(never) => match never {},
        };
        let count = copied.len();
        {
            let mut guard = self.guard();
            let state = self.state_mut(&mut guard);
            if state.closed {
                return false;
            }
            state.list.splice(&mut copied);
        }
        if count > 0 {
            self.ready.notify_all();
        }
        tracing::trace!(copied = count, "queue appended by copy");
        true
    }
}

impl<T, L: Lockable> Default for ConcurrentQueue<T, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, L: Lockable> Clone for ConcurrentQueue<T, L> {
    /// Copies the elements into a new, open queue
    fn clone(&self) -> Self {
        Self::from_queue(self)
    }
}

impl<T, L: Lockable> fmt::Debug for ConcurrentQueue<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (len, closed) = {
            let mut guard = self.guard();
            let state = self.state_mut(&mut guard);
            (state.list.len(), state.closed)
        };
        f.debug_struct("ConcurrentQueue")
            .field("len", &len)
            .field("closed", &closed)
            .finish()
    }
}

impl<T, L: Lockable> FromIterator<T> for ConcurrentQueue<T, L> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = List::new();
        for value in iter {
            list.push_back(value);
        }
        Self::with_state(State { list, closed: false })
    }
}

impl<T, L: Lockable> Extend<T> for ConcurrentQueue<T, L> {
    /// Pushes every value; stops silently once the queue is closed
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            if !self.push_unlocked(value) {
                break;
            }
        }
    }
}

/// Owning iterator draining a queue front to back
pub struct IntoIter<T> {
    list: List<T>,
}

impl<T> fmt::Debug for IntoIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoIter").field("remaining", &self.list.len()).finish()
    }
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.list.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.list.len(), Some(self.list.len()))
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<T, L: Lockable> IntoIterator for ConcurrentQueue<T, L> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(mut self) -> IntoIter<T> {
        IntoIter {
            list: mem::take(&mut self.state.get_mut().list),
        }
    }
}
