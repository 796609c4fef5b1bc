//! Metric helpers for `chunkbus`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking envelopes moved over the bus.
pub const CHUNKS_PROCESSED: &str = "chunkbus_chunks_processed_total";
/// Name of the counter tracking reassembled messages.
pub const MESSAGES_COMPLETED: &str = "chunkbus_messages_completed_total";
/// Name of the counter tracking discarded partial messages.
pub const REASSEMBLY_ERRORS: &str = "chunkbus_reassembly_errors_total";
/// Name of the counter tracking outbound chunks refused by a full FIFO.
pub const CHUNKS_DROPPED: &str = "chunkbus_chunks_dropped_total";
/// Name of the counter tracking messages evicted from a full ring.
pub const MESSAGES_EVICTED: &str = "chunkbus_messages_evicted_total";

/// Direction of chunk processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Envelopes decoded from the bus.
    Inbound,
    /// Envelopes written to the bus.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Record a processed chunk for the given direction.
pub fn inc_chunks(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(CHUNKS_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a completed message.
pub fn inc_completed() {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_COMPLETED).increment(1);
}

/// Record a discarded partial message, labelled by cause.
pub fn inc_reassembly_errors(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(REASSEMBLY_ERRORS, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record outbound chunks lost to a full FIFO.
pub fn add_dropped_chunks(count: u64) {
    #[cfg(feature = "metrics")]
    counter!(CHUNKS_DROPPED).increment(count);
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

/// Record a message evicted from a full ring.
pub fn inc_evicted() {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_EVICTED).increment(1);
}
