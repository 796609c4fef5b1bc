//! Canonical error and result types for the crate.
//!
//! Each layer keeps its own error enum; [`GatewayError`] collects them for
//! callers that drive a whole gateway and only want one type to propagate.

use std::io;

use thiserror::Error;

use crate::{
    codec::CodecError,
    config::ConfigError,
    fragment::{FragmentationError, ReassemblyError},
    gateway::AddressError,
};

/// Top-level error type exposed by `chunkbus`.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway sizes are inconsistent.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// A bus address is outside the usable range.
    #[error(transparent)]
    Address(#[from] AddressError),
    /// The platform bus reported a transport failure.
    #[error("bus transport error: {0}")]
    Io(#[from] io::Error),
    /// Encoding or decoding an envelope record failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// An outbound message could not be fragmented.
    #[error("fragmentation error: {0}")]
    Fragmentation(#[from] FragmentationError),
    /// An inbound message was discarded.
    #[error("reassembly error: {0}")]
    Reassembly(#[from] ReassemblyError),
}

/// Canonical result alias used by `chunkbus` public APIs.
pub type Result<T> = std::result::Result<T, GatewayError>;
