//! Narrow platform traits through which the gateway touches the bus.
//!
//! Electrical setup, clocking and address scanning belong to the platform.
//! The gateway only needs to read a bounded response from a responder
//! ([`PollBus`]) and to write bytes into the current transaction
//! ([`BusWrite`]).

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use derive_more::Display;
use thiserror::Error;

/// Lowest usable 7-bit bus address.
pub const MIN_DEVICE_ADDRESS: u8 = 0x01;
/// Highest usable 7-bit bus address.
pub const MAX_DEVICE_ADDRESS: u8 = 0x7E;

/// Address outside the usable 7-bit range.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("device address {0:#04x} is outside {MIN_DEVICE_ADDRESS:#04x}..={MAX_DEVICE_ADDRESS:#04x}")]
pub struct AddressError(pub u8);

/// A 7-bit responder address.
///
/// # Examples
///
/// ```
/// use chunkbus::gateway::DeviceAddress;
/// let address = DeviceAddress::new(0x42).expect("valid address");
/// assert_eq!(address.get(), 0x42);
/// assert!(DeviceAddress::new(0x7F).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{_0:#04x}")]
pub struct DeviceAddress(u8);

impl DeviceAddress {
    /// Validate and wrap `value`.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] for reserved addresses.
    pub const fn new(value: u8) -> Result<Self, AddressError> {
        if value < MIN_DEVICE_ADDRESS || value > MAX_DEVICE_ADDRESS {
            return Err(AddressError(value));
        }
        Ok(Self(value))
    }

    /// Return the raw address.
    #[must_use]
    pub const fn get(self) -> u8 { self.0 }
}

impl TryFrom<u8> for DeviceAddress {
    type Error = AddressError;

    fn try_from(value: u8) -> Result<Self, Self::Error> { Self::new(value) }
}

/// Initiator-side bus access: one bounded read per poll.
pub trait PollBus {
    /// Ask the responder at `address` for up to `max_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns any transport failure reported by the platform.
    fn request(&mut self, address: DeviceAddress, max_len: usize) -> io::Result<Bytes>;
}

/// Destination for bytes written during a bus transaction.
pub trait BusWrite {
    /// Write `bytes`, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> usize;
}

impl BusWrite for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) -> usize {
        self.extend_from_slice(bytes);
        bytes.len()
    }
}

impl BusWrite for BytesMut {
    fn write(&mut self, bytes: &[u8]) -> usize {
        self.put_slice(bytes);
        bytes.len()
    }
}
