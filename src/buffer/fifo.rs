//! Reject-on-full queue of outgoing encoded envelopes.

use std::collections::VecDeque;

/// Fixed-capacity first-in first-out queue.
///
/// When the queue holds `N` items further pushes are refused and the item is
/// handed back. Nothing already queued is ever overwritten, so the order of
/// queued chunks cannot be disturbed by a late producer.
///
/// # Examples
///
/// ```
/// use chunkbus::buffer::BoundedFifo;
/// let mut fifo: BoundedFifo<u8, 2> = BoundedFifo::new();
/// assert!(fifo.push(1).is_ok());
/// assert!(fifo.push(2).is_ok());
/// assert_eq!(fifo.push(3), Err(3));
/// assert_eq!(fifo.pop(), Some(1));
/// ```
#[derive(Clone, Debug)]
pub struct BoundedFifo<T, const N: usize> {
    items: VecDeque<T>,
}

impl<T, const N: usize> BoundedFifo<T, N> {
    /// Create an empty queue with room for `N` items.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: VecDeque::with_capacity(N),
        }
    }

    /// Append `item` unless the queue is full.
    ///
    /// # Errors
    ///
    /// Returns the item unchanged when the queue already holds `N` items.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Remove and return the oldest item.
    pub fn pop(&mut self) -> Option<T> { self.items.pop_front() }

    /// Borrow the oldest item without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&T> { self.items.front() }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize { self.items.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    #[must_use]
    pub fn is_full(&self) -> bool { self.items.len() >= N }

    /// Maximum number of queued items.
    #[must_use]
    pub const fn capacity(&self) -> usize { N }

    /// Drop every queued item.
    pub fn clear(&mut self) { self.items.clear(); }
}

impl<T, const N: usize> Default for BoundedFifo<T, N> {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::BoundedFifo;

    #[test]
    fn pops_in_push_order_then_reports_empty() {
        let mut fifo: BoundedFifo<&str, 4> = BoundedFifo::new();
        for item in ["E0", "E1", "E2"] {
            fifo.push(item).expect("queue has room");
        }
        assert_eq!(fifo.len(), 3);
        assert_eq!(fifo.pop(), Some("E0"));
        assert_eq!(fifo.pop(), Some("E1"));
        assert_eq!(fifo.pop(), Some("E2"));
        assert_eq!(fifo.pop(), None);
        assert!(fifo.is_empty());
    }

    #[test]
    fn full_queue_rejects_new_items_without_disturbing_old_ones() {
        let mut fifo: BoundedFifo<u32, 2> = BoundedFifo::new();
        fifo.push(10).expect("first push");
        fifo.push(11).expect("second push");
        assert!(fifo.is_full());
        assert_eq!(fifo.push(12), Err(12));
        assert_eq!(fifo.len(), 2);
        assert_eq!(fifo.peek(), Some(&10));

        assert_eq!(fifo.pop(), Some(10));
        fifo.push(13).expect("room after pop");
        assert_eq!(fifo.pop(), Some(11));
        assert_eq!(fifo.pop(), Some(13));
    }

    #[test]
    fn clear_empties_the_queue() {
        let mut fifo: BoundedFifo<u8, 3> = BoundedFifo::default();
        fifo.push(1).expect("push");
        fifo.push(2).expect("push");
        fifo.clear();
        assert!(fifo.is_empty());
        assert_eq!(fifo.capacity(), 3);
    }
}
