//! # Intra-process buffer.
//!
//! Bounded FIFO sized from the subscription's QoS depth. What happens when it is full
//! is the buffer type chosen in the subscription options:
//!
//! | Type           | On full                                  |
//! |----------------|------------------------------------------|
//! | `DropOldest`   | evict the oldest message, accept the new |
//! | `RejectNewest` | keep the buffer as is, refuse the new    |

use std::collections::VecDeque;

/// Overflow behaviour of an intra-process buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntraProcessBufferType {
    /// Ring buffer: newest data wins.
    #[default]
    DropOldest,
    /// Bounded queue: oldest data wins.
    RejectNewest,
}

/// Bounded message buffer.
#[derive(Debug)]
pub struct IntraProcessBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    kind: IntraProcessBufferType,
}

impl<T> IntraProcessBuffer<T> {
    /// Creates a buffer holding at most `capacity` items (min 1).
    pub fn new(capacity: usize, kind: IntraProcessBufferType) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            kind,
        }
    }

    /// Stores `item`; returns `false` when it was refused.
    pub fn add(&mut self, item: T) -> bool {
        if self.items.len() >= self.capacity {
            match self.kind {
                IntraProcessBufferType::DropOldest => {
                    self.items.pop_front();
                }
                IntraProcessBufferType::RejectNewest => return false,
            }
        }
        self.items.push_back(item);
        true
    }

    pub fn consume(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn has_data(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_oldest_keeps_newest() {
        let mut buf = IntraProcessBuffer::new(2, IntraProcessBufferType::DropOldest);
        assert!(buf.add(1));
        assert!(buf.add(2));
        assert!(buf.add(3));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.consume(), Some(2));
        assert_eq!(buf.consume(), Some(3));
        assert!(!buf.has_data());
    }

    #[test]
    fn test_reject_newest_keeps_oldest() {
        let mut buf = IntraProcessBuffer::new(2, IntraProcessBufferType::RejectNewest);
        assert!(buf.add(1));
        assert!(buf.add(2));
        assert!(!buf.add(3));
        assert_eq!(buf.consume(), Some(1));
        assert_eq!(buf.consume(), Some(2));
        assert_eq!(buf.consume(), None);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buf = IntraProcessBuffer::new(0, IntraProcessBufferType::DropOldest);
        assert_eq!(buf.capacity(), 1);
        assert!(buf.add("a"));
        buf.clear();
        assert!(buf.is_empty());
    }
}
