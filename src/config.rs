//! Compile-time sizing for the gateway buffers.
//!
//! Every size the protocol depends on is fixed when the crate is built. The
//! ring and FIFO capacities are const generic parameters of their containers;
//! the byte limits travel in a [`GatewayConfig`] value that is validated once
//! when a [`GatewayContext`](crate::gateway::GatewayContext) is constructed.

use std::num::NonZeroUsize;

use static_assertions::const_assert;
use thiserror::Error;

/// Slots in each message ring. One slot stays free, so a ring holds
/// `RING_BUFFER_SIZE - 1` messages.
pub const RING_BUFFER_SIZE: usize = 10;
/// Encoded envelopes the outgoing FIFO can hold.
pub const SIMPLE_QUEUE_SIZE: usize = 500;
/// Largest encoded envelope record the codec accepts, excluding the terminator.
pub const JSON_DOCUMENT_SIZE: usize = 1500;
/// Payload bytes carried by each outbound envelope.
pub const MAX_CHUNK_SIZE_SLAVE: usize = 64;
/// Bytes requested from the responder per poll. Must leave room for the
/// envelope overhead around a full outbound chunk.
pub const MAX_CHUNK_SIZE: usize = 128;
/// Capacity of the reassembly buffer.
pub const MAX_DATA_SIZE: usize = 5000;

const_assert!(RING_BUFFER_SIZE >= 2);
const_assert!(SIMPLE_QUEUE_SIZE >= 1);
const_assert!(MAX_CHUNK_SIZE_SLAVE >= 1);
const_assert!(MAX_CHUNK_SIZE > MAX_CHUNK_SIZE_SLAVE);
const_assert!(JSON_DOCUMENT_SIZE >= MAX_CHUNK_SIZE);
const_assert!(MAX_DATA_SIZE > MAX_CHUNK_SIZE_SLAVE);

/// Rejected combinations of gateway sizes.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The poll size cannot carry one full chunk plus envelope overhead.
    #[error("poll size {poll} must exceed outbound chunk size {chunk}")]
    PollTooSmall { poll: usize, chunk: usize },
    /// The codec record limit is smaller than a single poll.
    #[error("record limit {record} must be at least the poll size {poll}")]
    RecordLimitTooSmall { record: usize, poll: usize },
    /// The assembly buffer cannot hold even one chunk.
    #[error("assembly capacity {capacity} must exceed outbound chunk size {chunk}")]
    AssemblyTooSmall { capacity: usize, chunk: usize },
}

/// Byte limits shared by the fragmenter, codec and reassembler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Payload bytes per outbound envelope.
    pub chunk_size: NonZeroUsize,
    /// Bytes requested from the responder in one poll.
    pub poll_size: NonZeroUsize,
    /// Longest encoded record the line decoder buffers.
    pub max_record_len: NonZeroUsize,
    /// Capacity of the reassembly buffer.
    pub max_data_size: NonZeroUsize,
}

impl GatewayConfig {
    /// Build a configuration from explicit limits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the limits are inconsistent with each
    /// other.
    pub fn new(
        chunk_size: NonZeroUsize,
        poll_size: NonZeroUsize,
        max_record_len: NonZeroUsize,
        max_data_size: NonZeroUsize,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            chunk_size,
            poll_size,
            max_record_len,
            max_data_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the relationships between the limits.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chunk = self.chunk_size.get();
        let poll = self.poll_size.get();
        if poll <= chunk {
            return Err(ConfigError::PollTooSmall { poll, chunk });
        }
        let record = self.max_record_len.get();
        if record < poll {
            return Err(ConfigError::RecordLimitTooSmall { record, poll });
        }
        let capacity = self.max_data_size.get();
        if capacity <= chunk {
            return Err(ConfigError::AssemblyTooSmall { capacity, chunk });
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            chunk_size: NonZeroUsize::new(MAX_CHUNK_SIZE_SLAVE).unwrap_or(NonZeroUsize::MIN),
            poll_size: NonZeroUsize::new(MAX_CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN),
            max_record_len: NonZeroUsize::new(JSON_DOCUMENT_SIZE).unwrap_or(NonZeroUsize::MIN),
            max_data_size: NonZeroUsize::new(MAX_DATA_SIZE).unwrap_or(NonZeroUsize::MIN),
        }
    }
}
