//! Inbound helper that stitches chunk envelopes back into messages.
//!
//! [`Reassembler`] mirrors the outbound [`Fragmenter`](crate::fragment::Fragmenter).
//! It owns a single assembly buffer, so exactly one message is in flight at
//! a time. Chunks must arrive strictly in order. Any violation discards the
//! partial message and returns the automaton to its initial state; a chunk
//! numbered zero always opens a fresh message, which is how the stream
//! resynchronises after an error.

use std::{fmt, num::NonZeroUsize};

use log::{debug, warn};

use super::{
    ChunkEnvelope,
    ChunkIndex,
    ChunkStatus,
    JsonObjectDelimiters,
    PayloadValidator,
    ReassemblyError,
};
use crate::{message::Message, metrics};

/// Restartable single-message reassembly automaton.
pub struct Reassembler {
    capacity: NonZeroUsize,
    buffer: String,
    last: Option<ChunkIndex>,
    total: Option<u32>,
    validator: Box<dyn PayloadValidator>,
}

impl Reassembler {
    /// Create a reassembler whose buffer holds fewer than `capacity` bytes and
    /// which validates completed messages with [`JsonObjectDelimiters`].
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_validator(capacity, JsonObjectDelimiters)
    }

    /// Create a reassembler with a custom completion check.
    #[must_use]
    pub fn with_validator(capacity: NonZeroUsize, validator: impl PayloadValidator + 'static) -> Self {
        Self {
            capacity,
            buffer: String::with_capacity(capacity.get()),
            last: None,
            total: None,
            validator: Box::new(validator),
        }
    }

    /// Feed one envelope into the automaton.
    ///
    /// Returns [`ChunkStatus::Completed`] with the validated message when the
    /// envelope finishes its series and [`ChunkStatus::InProgress`] otherwise.
    /// A chunk numbered zero abandons any partial message and starts anew.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError`] when the chunk is out of order, would fill
    /// the assembly buffer, changes the announced total, or completes a
    /// message that fails validation. The partial message is discarded and
    /// the automaton is reset before the error is returned.
    pub fn on_chunk(&mut self, envelope: ChunkEnvelope) -> Result<ChunkStatus, ReassemblyError> {
        let (sequence, total, payload) = envelope.into_parts();

        if sequence.is_first() && self.in_flight() {
            warn!(
                "abandoning partial message: buffered={}, last_chunk={:?}",
                self.buffer.len(),
                self.last
            );
            metrics::inc_reassembly_errors("abandoned");
            self.reset();
        }

        let expected = self.expected();
        if sequence != expected {
            self.reset();
            return Err(self.fail(ReassemblyError::OrderError {
                expected,
                found: sequence,
            }));
        }

        match self.total {
            Some(announced) if announced != total => {
                self.reset();
                return Err(self.fail(ReassemblyError::TotalMismatch {
                    expected: announced,
                    found: total,
                }));
            }
            Some(_) => {}
            None => self.total = Some(total),
        }

        let attempted = self.buffer.len().saturating_add(payload.len());
        if attempted >= self.capacity.get() {
            self.reset();
            return Err(self.fail(ReassemblyError::OverflowError {
                attempted,
                capacity: self.capacity.get(),
            }));
        }

        self.buffer.push_str(&payload);
        self.last = Some(sequence);

        if sequence.get().checked_add(1) != Some(total) {
            return Ok(ChunkStatus::InProgress);
        }

        let verdict = self.validator.validate(&self.buffer);
        let text = self.buffer.clone();
        self.reset();
        match verdict {
            Ok(()) => {
                debug!("message reassembled: bytes={}, chunks={total}", text.len());
                metrics::inc_completed();
                Ok(ChunkStatus::Completed(Message::new(text)))
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    /// Discard any partial message and expect chunk zero next.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last = None;
        self.total = None;
    }

    /// Whether part of a message has been accepted.
    #[must_use]
    pub fn in_flight(&self) -> bool { self.last.is_some() }

    /// Bytes currently held in the assembly buffer.
    #[must_use]
    pub fn buffered_len(&self) -> usize { self.buffer.len() }

    /// Capacity of the assembly buffer.
    #[must_use]
    pub const fn capacity(&self) -> NonZeroUsize { self.capacity }

    /// Sequence number the next chunk must carry.
    #[must_use]
    pub fn expected(&self) -> ChunkIndex {
        self.last
            .and_then(ChunkIndex::checked_increment)
            .unwrap_or_else(ChunkIndex::zero)
    }

    fn fail(&self, err: ReassemblyError) -> ReassemblyError {
        warn!("discarding partial message: {err}");
        metrics::inc_reassembly_errors(match err {
            ReassemblyError::OrderError { .. } => "order",
            ReassemblyError::OverflowError { .. } => "overflow",
            ReassemblyError::TotalMismatch { .. } => "total",
            ReassemblyError::Validation(_) => "validation",
        });
        debug_assert!(!self.in_flight(), "errors are reported after reset");
        err
    }
}

impl fmt::Debug for Reassembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reassembler")
            .field("capacity", &self.capacity)
            .field("buffered", &self.buffer.len())
            .field("last", &self.last)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}
