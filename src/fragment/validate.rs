//! Structural checks applied to a completed assembly before it is released.

use super::ValidationError;

/// Decides whether an assembled payload is fit to hand to the application.
pub trait PayloadValidator: Send + Sync {
    /// Check `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] describing why the payload was rejected.
    fn validate(&self, payload: &str) -> Result<(), ValidationError>;
}

/// Accepts payloads that start with `{` and end with `}`.
///
/// This is a cheap shape check, not a JSON parser: it catches truncated or
/// spliced assemblies without paying for a full parse in callback context.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonObjectDelimiters;

impl PayloadValidator for JsonObjectDelimiters {
    fn validate(&self, payload: &str) -> Result<(), ValidationError> {
        if payload.is_empty() {
            return Err(ValidationError::Empty);
        }
        if payload.starts_with('{') && payload.ends_with('}') {
            Ok(())
        } else {
            Err(ValidationError::Unbalanced {
                open: '{',
                close: '}',
            })
        }
    }
}

/// Accepts every payload, including the empty one.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAny;

impl PayloadValidator for AcceptAny {
    fn validate(&self, _payload: &str) -> Result<(), ValidationError> { Ok(()) }
}
