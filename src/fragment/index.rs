//! Zero-based chunk positioning within a message.
//!
//! Provides [`ChunkIndex`], a type-safe wrapper around `u32` that offers
//! overflow-safe increment operations for tracking chunk order.

use std::num::TryFromIntError;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Zero-based ordinal describing a chunk's position within its message.
///
/// Serialises transparently as the bare number carried in the `cn` field.
///
/// # Examples
///
/// ```
/// use chunkbus::fragment::ChunkIndex;
/// let index = ChunkIndex::new(3);
/// assert_eq!(index.get(), 3);
/// assert_eq!(index.checked_increment(), Some(ChunkIndex::new(4)));
/// ```
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    From,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct ChunkIndex(u32);

impl ChunkIndex {
    /// Construct an index from a `u32` value.
    #[must_use]
    pub const fn new(value: u32) -> Self { Self(value) }

    /// Return the first valid chunk index.
    #[must_use]
    pub const fn zero() -> Self { Self(0) }

    /// Return the underlying numeric value.
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    /// Whether this index opens a new message.
    #[must_use]
    pub const fn is_first(self) -> bool { self.0 == 0 }

    /// Increment the index, returning `None` on overflow.
    #[must_use]
    pub fn checked_increment(self) -> Option<Self> { self.0.checked_add(1).map(Self) }
}

impl TryFrom<usize> for ChunkIndex {
    type Error = TryFromIntError;

    fn try_from(value: usize) -> Result<Self, Self::Error> { u32::try_from(value).map(Self) }
}

impl From<ChunkIndex> for u32 {
    fn from(value: ChunkIndex) -> Self { value.0 }
}
