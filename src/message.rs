//! The unit of data applications exchange over the bus.

use derive_more::{Display, From};

/// An owned text payload sent or received as a whole.
///
/// The default value is the empty message, which
/// [`MessageRing::pop`](crate::buffer::MessageRing::pop) returns when there
/// is nothing to take.
///
/// # Examples
///
/// ```
/// use chunkbus::Message;
/// let message = Message::from("{\"t\":21}");
/// assert_eq!(message.len(), 8);
/// assert!(!message.is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Display, From)]
#[display("{_0}")]
pub struct Message(String);

impl Message {
    /// Wrap `text` as a message.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self { Self(text.into()) }

    /// Borrow the message text.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    /// Length of the message in bytes.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether the message carries no text.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Consume the message, returning the owned text.
    #[must_use]
    pub fn into_string(self) -> String { self.0 }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

impl AsRef<str> for Message {
    fn as_ref(&self) -> &str { &self.0 }
}
