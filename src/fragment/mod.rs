//! Chunk envelope primitives for splitting messages across bus polls.
//!
//! This module collects the domain types used by the fragmentation and
//! reassembly layer. Each sub-module focuses on a single concept to keep the
//! code small and easy to audit while still providing a cohesive API at the
//! crate root.

pub mod envelope;
pub mod error;
pub mod fragmenter;
pub mod index;
pub mod reassembler;
pub mod validate;

pub use envelope::ChunkEnvelope;
pub use error::{
    ChunkStatus,
    EnvelopeError,
    FragmentationError,
    ReassemblyError,
    ValidationError,
};
pub use fragmenter::{EnqueueReport, FragmentBatch, Fragmenter};
pub use index::ChunkIndex;
pub use reassembler::Reassembler;
pub use validate::{AcceptAny, JsonObjectDelimiters, PayloadValidator};
