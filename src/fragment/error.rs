//! Error and status types emitted by the fragmentation layer.
//!
//! Every variant describes a local, recoverable condition. The reassembler
//! resets itself before returning any of them, so callers only need to
//! report the error and carry on polling.

use thiserror::Error;

use super::ChunkIndex;
use crate::{codec::CodecError, message::Message};

/// Result of feeding an in-order chunk into the
/// [`Reassembler`](crate::fragment::Reassembler).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkStatus {
    /// The message still expects more chunks.
    InProgress,
    /// The chunk completed and validated the message.
    Completed(Message),
}

/// Envelope invariants violated at construction or after decoding.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// An envelope announced a message of zero chunks.
    #[error("envelope announces zero total chunks")]
    EmptySeries,
    /// The chunk number lies outside the announced total.
    #[error("chunk number {sequence} is out of range for {total} total chunks")]
    SequenceOutOfRange { sequence: ChunkIndex, total: u32 },
}

/// Errors produced while fragmenting outbound messages.
#[derive(Debug, Error)]
pub enum FragmentationError {
    /// Encoding an envelope into a record failed.
    #[error("failed to encode chunk envelope: {0}")]
    Encode(#[from] CodecError),
    /// The chunk index cannot advance because it would overflow `u32`.
    #[error("chunk index overflow after {last}")]
    IndexOverflow { last: ChunkIndex },
    /// A character is wider than the chunk size and cannot be split.
    #[error("character of {width} bytes does not fit a {chunk_size} byte chunk")]
    CharacterTooWide { width: usize, chunk_size: usize },
    /// Even a one-character chunk encodes to more than the record limit.
    #[error("encoded record needs {needed} bytes, limit is {limit}")]
    RecordTooLarge { needed: usize, limit: usize },
}

/// Structural check failures on a completed assembly.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The assembled payload was empty.
    #[error("assembled payload is empty")]
    Empty,
    /// The payload does not open and close with the expected delimiters.
    #[error("assembled payload is not enclosed in '{open}' and '{close}'")]
    Unbalanced { open: char, close: char },
}

/// Errors produced by the [`Reassembler`](crate::fragment::Reassembler).
///
/// Each one means the partial message was discarded.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    /// A chunk arrived that is not the next one in sequence.
    #[error("chunk order mismatch: expected {expected}, found {found}")]
    OrderError {
        expected: ChunkIndex,
        found: ChunkIndex,
    },
    /// Appending the chunk would fill the assembly buffer.
    #[error("assembly buffer overflow: {attempted} bytes do not fit below {capacity}")]
    OverflowError { attempted: usize, capacity: usize },
    /// An in-order chunk announced a different total than its predecessors.
    #[error("total chunk count changed mid-message: expected {expected}, found {found}")]
    TotalMismatch { expected: u32, found: u32 },
    /// The completed assembly failed its structural check.
    #[error("assembled message rejected: {0}")]
    Validation(#[from] ValidationError),
}
