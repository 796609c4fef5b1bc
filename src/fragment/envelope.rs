//! The chunk envelope carried by one bus record.

use serde::{Deserialize, Serialize};

use super::{ChunkIndex, EnvelopeError};

/// A single sequenced fragment of a larger message.
///
/// The field names on the wire are the short keys `cn` (chunk number), `tc`
/// (total chunks) and `data`. Construction checks `sequence < total`, which
/// also implies `total >= 1`.
///
/// # Examples
///
/// ```
/// use chunkbus::fragment::{ChunkEnvelope, ChunkIndex};
/// let envelope = ChunkEnvelope::new(ChunkIndex::new(1), 3, "OWOR").expect("valid envelope");
/// assert!(!envelope.is_last());
/// assert_eq!(envelope.payload(), "OWOR");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkEnvelope {
    #[serde(rename = "cn")]
    sequence: ChunkIndex,
    #[serde(rename = "tc")]
    total: u32,
    #[serde(rename = "data")]
    payload: String,
}

impl ChunkEnvelope {
    /// Create an envelope after checking its sequence invariant.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::EmptySeries`] when `total` is zero and
    /// [`EnvelopeError::SequenceOutOfRange`] when `sequence >= total`.
    pub fn new(
        sequence: ChunkIndex,
        total: u32,
        payload: impl Into<String>,
    ) -> Result<Self, EnvelopeError> {
        let envelope = Self {
            sequence,
            total,
            payload: payload.into(),
        };
        envelope.check()?;
        Ok(envelope)
    }

    /// Re-check the sequence invariant, for envelopes built by deserialisation.
    ///
    /// # Errors
    ///
    /// See [`ChunkEnvelope::new`].
    pub fn check(&self) -> Result<(), EnvelopeError> {
        if self.total == 0 {
            return Err(EnvelopeError::EmptySeries);
        }
        if self.sequence.get() >= self.total {
            return Err(EnvelopeError::SequenceOutOfRange {
                sequence: self.sequence,
                total: self.total,
            });
        }
        Ok(())
    }

    /// Position of this chunk within its message.
    #[must_use]
    pub const fn sequence(&self) -> ChunkIndex { self.sequence }

    /// Number of chunks the message was split into.
    #[must_use]
    pub const fn total(&self) -> u32 { self.total }

    /// Borrow the chunk payload.
    #[must_use]
    pub fn payload(&self) -> &str { &self.payload }

    /// Whether this chunk completes its message.
    #[must_use]
    pub fn is_last(&self) -> bool { self.sequence.get().checked_add(1) == Some(self.total) }

    /// Consume the envelope, returning its components.
    #[must_use]
    pub fn into_parts(self) -> (ChunkIndex, u32, String) {
        (self.sequence, self.total, self.payload)
    }
}
