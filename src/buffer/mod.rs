//! Bounded containers that decouple bus callbacks from the main loop.
//!
//! The two containers deliberately differ in what happens when they are
//! full: [`BoundedFifo`] refuses the new item, [`MessageRing`] evicts the
//! oldest one.

pub mod fifo;
pub mod ring;

pub use fifo::BoundedFifo;
pub use ring::{MessageRing, WriteFlag, WriteGuard};
