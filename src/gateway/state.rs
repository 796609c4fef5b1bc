//! Re-entrancy guard for the responder's request handler.
//!
//! The responder moves between three states. Transitions are single atomic
//! compare-and-swap operations, so a request arriving while another one is
//! still being serviced observes `Servicing` and backs off.
//!
//! ```text
//!             enable                begin_service
//!  Disabled ---------> Idle  <-------------------> Servicing
//!     ^                 |          guard dropped        |
//!     |     disable     |                               |
//!     +-----------------+-------------------------------+
//! ```

use std::fmt;

use crate::sync::{AtomicU8, Ordering};

/// State of the responder's request servicing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponderState {
    /// Requests are ignored until [`ResponderGate::enable`] is called.
    Disabled = 0,
    /// Ready to service the next request.
    Idle = 1,
    /// A request is being serviced; nested requests are refused.
    Servicing = 2,
}

impl ResponderState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Disabled,
            2 => Self::Servicing,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for ResponderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "disabled",
            Self::Idle => "idle",
            Self::Servicing => "servicing",
        })
    }
}

/// Atomic holder of a [`ResponderState`].
pub struct ResponderGate {
    state: AtomicU8,
}

impl ResponderGate {
    /// Create a gate that accepts requests.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ResponderState::Idle as u8),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ResponderState {
        ResponderState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move `Idle → Servicing`.
    ///
    /// The returned guard moves the gate back to `Idle` when dropped, unless
    /// the responder was disabled in the meantime.
    ///
    /// # Errors
    ///
    /// Returns the state that prevented servicing (`Disabled` or
    /// `Servicing`).
    pub fn begin_service(&self) -> Result<ServiceGuard<'_>, ResponderState> {
        self.transition(ResponderState::Idle, ResponderState::Servicing)
            .map(|()| ServiceGuard { gate: self })
    }

    /// Move `Disabled → Idle`. Returns whether the gate changed.
    pub fn enable(&self) -> bool {
        self.transition(ResponderState::Disabled, ResponderState::Idle)
            .is_ok()
    }

    /// Move to `Disabled` from any state, returning the previous state.
    pub fn disable(&self) -> ResponderState {
        ResponderState::from_u8(
            self.state
                .swap(ResponderState::Disabled as u8, Ordering::AcqRel),
        )
    }

    /// Force the gate back to `Idle`.
    pub fn reset(&self) { self.state.store(ResponderState::Idle as u8, Ordering::Release); }

    fn transition(&self, from: ResponderState, to: ResponderState) -> Result<(), ResponderState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ResponderState::from_u8)
    }
}

impl Default for ResponderGate {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for ResponderGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResponderGate").field(&self.state()).finish()
    }
}

/// Held while a request is serviced.
#[must_use = "servicing ends as soon as the guard is dropped"]
pub struct ServiceGuard<'a> {
    gate: &'a ResponderGate,
}

impl fmt::Debug for ServiceGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceGuard").finish_non_exhaustive()
    }
}

impl Drop for ServiceGuard<'_> {
    fn drop(&mut self) {
        // Fails harmlessly when the responder was disabled mid-service.
        let _ = self
            .gate
            .transition(ResponderState::Servicing, ResponderState::Idle);
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn nested_service_is_refused() {
        let gate = ResponderGate::new();
        let guard = gate.begin_service().expect("idle gate");
        assert_eq!(gate.state(), ResponderState::Servicing);
        assert_eq!(
            gate.begin_service().expect_err("nested request"),
            ResponderState::Servicing
        );
        drop(guard);
        assert_eq!(gate.state(), ResponderState::Idle);
    }

    #[test]
    fn disabled_gate_refuses_until_enabled() {
        let gate = ResponderGate::new();
        assert_eq!(gate.disable(), ResponderState::Idle);
        assert_eq!(
            gate.begin_service().expect_err("disabled"),
            ResponderState::Disabled
        );
        assert!(gate.enable());
        assert!(!gate.enable());
        assert!(gate.begin_service().is_ok());
    }

    #[test]
    fn disable_during_service_survives_guard_drop() {
        let gate = ResponderGate::new();
        let guard = gate.begin_service().expect("idle gate");
        assert_eq!(gate.disable(), ResponderState::Servicing);
        drop(guard);
        assert_eq!(gate.state(), ResponderState::Disabled);
    }
}
