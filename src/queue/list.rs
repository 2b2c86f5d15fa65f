//! Singly-linked FIFO chain backing [`ConcurrentQueue`](super::ConcurrentQueue)
//!
//! Each node is owned by exactly one party: the chain, while it is linked, or a
//! `Box` handle while it is being created or removed. Allocation and
//! deallocation therefore happen outside any lock; only the O(1) relinking runs
//! inside the critical section.
//!
//! ```text
//! head                              tail
//!  |                                 |
//!  v                                 v
//! [a|*] ---> [b|*] ---> [c|*] ---> [d|null]
//! ```
//!
//! Invariants: `head` is `None` iff `tail` is `None` iff `len == 0`, and
//! following `next` from `head` reaches `tail` after `len - 1` steps.

use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

/// A node in the chain
pub(crate) struct Node<T> {
    next: Option<NonNull<Node<T>>>,
    value: T,
}

impl<T> Node<T> {
    /// Allocate an unlinked node holding `value`
    pub(crate) fn boxed(value: T) -> Box<Self> {
        Box::new(Self { next: None, value })
    }

    /// Free the node and hand back its value
    pub(crate) fn into_value(self: Box<Self>) -> T {
        let node = *self;
        node.value
    }
}

/// Owning singly-linked list with O(1) append at the tail and removal at the head
pub(crate) struct List<T> {
    head: Option<NonNull<Node<T>>>,
    tail: Option<NonNull<Node<T>>>,
    len: usize,
    _owns: PhantomData<Box<Node<T>>>,
}

// SAFETY: the list uniquely owns its nodes, like a `Vec<T>` would.
unsafe impl<T: Send> Send for List<T> {}
unsafe impl<T: Sync> Sync for List<T> {}

impl<T> List<T> {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            _owns: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.tail.is_none()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Link a detached node after the current tail
    pub(crate) fn hook(&mut self, node: Box<Node<T>>) {
        debug_assert!(node.next.is_none());
        let node = NonNull::from(Box::leak(node));
        match self.tail {
            // SAFETY: `tail` points at a node owned by this list.
            Some(tail) => unsafe { (*tail.as_ptr()).next = Some(node) },
            None => self.head = Some(node),
        }
        self.tail = Some(node);
        self.len += 1;
    }

    /// Detach the head node, transferring its ownership to the caller
    pub(crate) fn unhook_front(&mut self) -> Option<Box<Node<T>>> {
        self.head.map(|head| {
            // SAFETY: `head` was leaked from a `Box` in `hook` and is still linked,
            // so this list is its only owner.
            let mut node = unsafe { Box::from_raw(head.as_ptr()) };
            self.head = node.next.take();
            if self.head.is_none() {
                self.tail = None;
            }
            self.len -= 1;
            node
        })
    }

    pub(crate) fn push_back(&mut self, value: T) {
        self.hook(Node::boxed(value));
    }

    pub(crate) fn pop_front(&mut self) -> Option<T> {
        self.unhook_front().map(Node::into_value)
    }

    /// Move every node of `other` onto the end of `self` without reallocating
    pub(crate) fn splice(&mut self, other: &mut Self) {
        let Some(other_head) = other.head.take() else {
            return;
        };
        match self.tail {
            // SAFETY: `tail` points at a node owned by this list.
            Some(tail) => unsafe { (*tail.as_ptr()).next = Some(other_head) },
            None => self.head = Some(other_head),
        }
        self.tail = other.tail.take();
        self.len += other.len;
        other.len = 0;
    }

    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head,
            remaining: self.len,
            _list: PhantomData,
        }
    }

    /// Build an independent list by converting every value in order
    ///
    /// On the first error the partially built list is dropped and `self` is left
    /// untouched.
    pub(crate) fn try_map<U, E, F>(&self, mut f: F) -> Result<List<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        let mut mapped = List::new();
        for value in self.iter() {
            mapped.push_back(f(value)?);
        }
        Ok(mapped)
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        // Iterative, so that long chains cannot overflow the stack
        while self.unhook_front().is_some() {}
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Borrowing iterator over a [`List`], head to tail
pub(crate) struct Iter<'a, T> {
    next: Option<NonNull<Node<T>>>,
    remaining: usize,
    _list: PhantomData<&'a List<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        self.next.map(|node| {
            // SAFETY: the list is borrowed for 'a, so its nodes stay alive and linked.
            let node = unsafe { &*node.as_ptr() };
            self.next = node.next;
            self.remaining -= 1;
            &node.value
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn collect<T: Clone>(list: &List<T>) -> Vec<T> {
        list.iter().cloned().collect()
    }

    #[test]
    fn test_basic_operations() {
        let mut list = List::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert_eq!(list.pop_front(), None);

        list.push_back(1);
        list.push_back(2);
        list.push_back(3);
        assert!(!list.is_empty());
        assert_eq!(list.len(), 3);
        assert_eq!(collect(&list), vec![1, 2, 3]);

        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_front(), Some(2));
        list.push_back(4);
        assert_eq!(list.pop_front(), Some(3));
        assert_eq!(list.pop_front(), Some(4));
        assert_eq!(list.pop_front(), None);

        assert!(list.is_empty());
        assert!(list.head.is_none() && list.tail.is_none());
    }

    #[test]
    fn test_hook_and_unhook_keep_node_identity() {
        let mut list = List::new();
        let node = Node::boxed(String::from("node"));
        let address = &*node as *const Node<String>;

        list.hook(node);
        let node = list.unhook_front().unwrap();
        assert_eq!(&*node as *const Node<String>, address);
        assert!(node.next.is_none());
        assert_eq!(node.into_value(), "node");
    }

    #[test]
    fn test_splice() {
        let mut front = List::new();
        let mut back = List::new();
        for i in 1..=3 {
            front.push_back(i);
        }
        back.push_back(4);
        back.push_back(5);

        front.splice(&mut back);
        assert_eq!(collect(&front), vec![1, 2, 3, 4, 5]);
        assert_eq!(front.len(), 5);
        assert!(back.is_empty());
        assert_eq!(back.len(), 0);

        // splicing into an empty list takes over head and tail
        back.splice(&mut front);
        assert!(front.is_empty());
        assert_eq!(collect(&back), vec![1, 2, 3, 4, 5]);
        back.push_back(6);
        assert_eq!(collect(&back), vec![1, 2, 3, 4, 5, 6]);

        // splicing an empty list is a no-op
        back.splice(&mut front);
        assert_eq!(back.len(), 6);
    }

    #[test]
    fn test_try_map_is_independent() {
        let mut source = List::new();
        source.push_back(1u8);
        source.push_back(2u8);

        let mut copy: List<u32> = source
            .try_map(|&v| Ok::<_, ()>(u32::from(v) * 100))
            .unwrap();
        source.push_back(3);

        assert_eq!(collect(&copy), vec![100, 200]);
        assert_eq!(copy.pop_front(), Some(100));
        assert_eq!(collect(&source), vec![1, 2, 3]);
    }

    #[test]
    fn test_try_map_failure_frees_partial_copy() {
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let mut source = List::new();
        for i in 0..5 {
            source.push_back(i);
        }

        let result = source.try_map(|&v| {
            if v == 3 {
                Err(v)
            } else {
                Ok(Tracked(Arc::clone(&drops)))
            }
        });

        assert_eq!(result.err(), Some(3));
        assert_eq!(drops.load(Ordering::SeqCst), 3);
        assert_eq!(source.len(), 5);
    }

    #[test]
    fn test_drop_long_chain() {
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct DropCounter;
        impl Drop for DropCounter {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut list = List::new();
        for _ in 0..1_000_000 {
            list.push_back(DropCounter);
        }
        drop(list.pop_front());
        drop(list);

        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), 1_000_000);
    }
}
