#![doc(html_root_url = "https://docs.rs/chunkbus/latest")]
//! Public API for the `chunkbus` library.
//!
//! This crate moves whole text messages across a polled two-wire bus whose
//! transactions carry only a few dozen bytes. Messages are split into
//! numbered chunk envelopes, queued for transport and reassembled in order
//! on the other side, with bounded buffers throughout.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod fragment;
pub mod gateway;
pub mod message;
pub mod metrics;
mod sync;

pub use buffer::{BoundedFifo, MessageRing, WriteFlag, WriteGuard};
pub use codec::{ChunkCodec, CodecError, EnvelopeLineCodec, JsonLineCodec};
pub use config::{ConfigError, GatewayConfig};
pub use error::{GatewayError, Result};
pub use fragment::{
    ChunkEnvelope,
    ChunkIndex,
    ChunkStatus,
    FragmentBatch,
    FragmentationError,
    Fragmenter,
    Reassembler,
    ReassemblyError,
};
pub use gateway::{
    ChunkEvent,
    DeviceAddress,
    GatewayContext,
    ReceiveReport,
    RequestOutcome,
    ResponderState,
    SubmitOutcome,
};
pub use message::Message;
pub use metrics::{CHUNKS_PROCESSED, Direction, MESSAGES_COMPLETED, REASSEMBLY_ERRORS};
