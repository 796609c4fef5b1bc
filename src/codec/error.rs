//! Error types for the envelope codec.
//!
//! - [`CodecError::Malformed`]: the record is not a decodable envelope.
//! - [`CodecError::InvalidEnvelope`]: the record decoded but breaks the
//!   envelope sequence invariant.
//! - [`CodecError::RecordTooLong`]: no terminator was found within the record
//!   limit; the decoder skips ahead to the next terminator.
//!
//! All of them are recoverable. The decoder stays usable after returning one.

use std::io;

use thiserror::Error;

use crate::fragment::EnvelopeError;

/// Top-level codec error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Encoding an envelope into a record failed.
    #[error("failed to encode envelope: {0}")]
    Encode(String),
    /// A record could not be decoded into an envelope.
    #[error("malformed envelope record: {0}")]
    Malformed(String),
    /// A decoded envelope violated its sequence invariant.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[from] EnvelopeError),
    /// A record grew past the configured limit without a terminator.
    #[error("record exceeds {limit} bytes without a terminator")]
    RecordTooLong { limit: usize },
    /// I/O error surfaced through the `tokio_util` codec traits.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Whether the error was caused by the bytes of a single record, as
    /// opposed to the underlying transport.
    #[must_use]
    pub fn is_malformed_envelope(&self) -> bool {
        matches!(
            self,
            Self::Malformed(_) | Self::InvalidEnvelope(_) | Self::RecordTooLong { .. }
        )
    }
}
