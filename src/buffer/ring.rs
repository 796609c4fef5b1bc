//! Evict-oldest circular buffer of completed messages.
//!
//! [`MessageRing`] keeps the most recent messages and gives up the oldest one
//! when a producer needs room. It is a best-effort cache for a single
//! consumer, not a reliable delivery channel.
//!
//! The ring carries an advisory [`WriteFlag`]. A context that is about to
//! mutate the ring raises the flag through [`WriteFlag::begin`]; producers
//! running in callback context check [`WriteFlag::is_writing`] and skip
//! their work for that cycle instead of waiting.

use std::fmt;

use crate::sync::{Arc, AtomicBool, Ordering};

/// Shared advisory marker for a ring's critical sections.
#[derive(Clone, Debug)]
pub struct WriteFlag(Arc<AtomicBool>);

impl WriteFlag {
    /// Create a lowered flag.
    #[must_use]
    pub fn new() -> Self { Self(Arc::new(AtomicBool::new(false))) }

    /// Raise the flag until the returned guard is dropped.
    ///
    /// Returns `None` if the flag is already raised by another context.
    #[must_use]
    pub fn begin(&self) -> Option<WriteGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| WriteGuard { flag: self })
    }

    /// Whether a critical section is in progress.
    #[must_use]
    pub fn is_writing(&self) -> bool { self.0.load(Ordering::Acquire) }
}

impl Default for WriteFlag {
    fn default() -> Self { Self::new() }
}

/// Lowers its [`WriteFlag`] on drop.
#[must_use = "the flag is lowered as soon as the guard is dropped"]
pub struct WriteGuard<'a> {
    flag: &'a WriteFlag,
}

impl fmt::Debug for WriteGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteGuard").finish_non_exhaustive()
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) { self.flag.0.store(false, Ordering::Release); }
}

/// Circular buffer with `N` slots, one of which always stays free.
///
/// Keeping a slot free lets `head == tail` mean "empty" without a separate
/// counter, so the ring holds at most `N - 1` items.
///
/// # Examples
///
/// ```
/// use chunkbus::buffer::MessageRing;
/// let mut ring: MessageRing<u8, 3> = MessageRing::new();
/// assert_eq!(ring.push(1), None);
/// assert_eq!(ring.push(2), None);
/// assert_eq!(ring.push(3), Some(1));
/// assert_eq!(ring.pop(), 2);
/// ```
pub struct MessageRing<T, const N: usize> {
    slots: [Option<T>; N],
    head: usize,
    tail: usize,
    write_flag: WriteFlag,
}

impl<T, const N: usize> MessageRing<T, N> {
    const SLOTS_AVAILABLE: () = assert!(N >= 2, "a ring needs at least two slots");

    /// Create an empty ring.
    #[must_use]
    pub fn new() -> Self {
        let () = Self::SLOTS_AVAILABLE;
        Self {
            slots: std::array::from_fn(|_| None),
            head: 0,
            tail: 0,
            write_flag: WriteFlag::new(),
        }
    }

    /// Store `item`, evicting and returning the oldest entry if the ring was
    /// full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() { self.try_pop() } else { None };
        self.store(item);
        evicted
    }

    /// Store `item` only if there is room.
    ///
    /// # Errors
    ///
    /// Returns the item unchanged when the ring is full.
    pub fn try_push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.store(item);
        Ok(())
    }

    /// Remove and return the oldest entry, or `None` when empty.
    pub fn try_pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % N;
        item
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.head == self.tail }

    #[must_use]
    pub fn is_full(&self) -> bool { (self.tail + 1) % N == self.head }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.tail >= self.head {
            self.tail - self.head
        } else {
            N - (self.head - self.tail)
        }
    }

    /// Maximum number of stored entries, `N - 1`.
    #[must_use]
    pub const fn capacity(&self) -> usize { N - 1 }

    /// Drop every entry.
    pub fn clear(&mut self) {
        while self.try_pop().is_some() {}
        self.head = 0;
        self.tail = 0;
    }

    /// Handle to this ring's advisory write flag.
    #[must_use]
    pub fn write_flag(&self) -> &WriteFlag { &self.write_flag }

    fn store(&mut self, item: T) {
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % N;
    }
}

impl<T: Default, const N: usize> MessageRing<T, N> {
    /// Remove and return the oldest entry, or `T::default()` when empty.
    ///
    /// An empty ring and a stored default value look the same here; check
    /// [`MessageRing::is_empty`] first or use [`MessageRing::try_pop`].
    pub fn pop(&mut self) -> T { self.try_pop().unwrap_or_default() }
}

impl<T, const N: usize> Default for MessageRing<T, N> {
    fn default() -> Self { Self::new() }
}

impl<T, const N: usize> fmt::Debug for MessageRing<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRing")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("writing", &self.write_flag.is_writing())
            .finish()
    }
}
