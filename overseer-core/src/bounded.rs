//! Bounded deque used for every fixed-capacity feed in the store.
//!
//! Outputs, activities, tool executions, and decision ledgers all share the
//! same push-evict-oldest behavior; this type is that behavior in one place.

use std::collections::VecDeque;

/// A deque that never grows past its capacity.
///
/// `push_back` evicts from the front (oldest-first feeds such as transcript
/// buffers); `push_front` evicts from the back (most-recent-first feeds such
/// as decision ledgers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedDeque<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedDeque<T> {
    /// Capacity must be non-zero; a zero-capacity buffer can hold nothing and
    /// is always a caller bug.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedDeque capacity must be > 0");
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append, evicting the oldest (front) entry when full.
    pub fn push_back(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Prepend, evicting the last (back) entry when full.
    pub fn push_front(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_back();
        }
        self.items.push_front(item);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Replace the whole contents, keeping only the newest `capacity` items
    /// (the tail of the iterator).
    pub fn replace_with<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.items.clear();
        for item in items {
            self.push_back(item);
        }
    }
}

impl<T: Clone> BoundedDeque<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<'a, T> IntoIterator for &'a BoundedDeque<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
