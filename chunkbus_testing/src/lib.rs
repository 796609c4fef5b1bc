//! Test helpers shared by the `chunkbus` integration tests.
//!
//! ```rust
//! use chunkbus_testing::{RecordingBus, record};
//! use chunkbus::gateway::BusWrite;
//!
//! let mut bus = RecordingBus::default();
//! bus.write(&record(0, 1, "hi"));
//! assert_eq!(bus.concatenated(), b"{\"cn\":0,\"tc\":1,\"data\":\"hi\"}\n");
//! ```

pub mod bus;
pub mod logging;

pub use bus::{RecordingBus, ScriptedBus, envelope, record};
pub use logging::{LoggerHandle, logger};
