//! In-memory bus that wires an initiator straight to a responder.
//!
//! Useful for demos and tests: [`Loopback`] answers polls by running the
//! responder's request handler, and [`ReceiveSink`] delivers written bytes
//! to the other side's receive handler.

use std::io;

use bytes::{Bytes, BytesMut};

use super::{BusWrite, DeviceAddress, GatewayContext, PollBus};
use crate::codec::ChunkCodec;

/// [`PollBus`] backed by a single in-process responder.
#[derive(Debug)]
pub struct Loopback<'a, C> {
    responder: &'a GatewayContext<C>,
}

impl<'a, C: ChunkCodec + Clone> Loopback<'a, C> {
    /// Route polls to `responder`.
    #[must_use]
    pub const fn new(responder: &'a GatewayContext<C>) -> Self { Self { responder } }
}

impl<C: ChunkCodec + Clone> PollBus for Loopback<'_, C> {
    fn request(&mut self, address: DeviceAddress, max_len: usize) -> io::Result<Bytes> {
        if self
            .responder
            .address()
            .is_some_and(|own| own != address)
        {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no responder at {address}"),
            ));
        }
        let mut response = BytesMut::with_capacity(max_len);
        self.responder.on_request(&mut response);
        response.truncate(max_len);
        Ok(response.freeze())
    }
}

/// [`BusWrite`] that hands every write to a receiver's `on_receive`.
#[derive(Debug)]
pub struct ReceiveSink<'a, C> {
    receiver: &'a GatewayContext<C>,
}

impl<'a, C: ChunkCodec + Clone> ReceiveSink<'a, C> {
    /// Deliver writes to `receiver`.
    #[must_use]
    pub const fn new(receiver: &'a GatewayContext<C>) -> Self { Self { receiver } }
}

impl<C: ChunkCodec + Clone> BusWrite for ReceiveSink<'_, C> {
    fn write(&mut self, bytes: &[u8]) -> usize {
        let report = self.receiver.on_receive(bytes);
        if report.skipped { 0 } else { bytes.len() }
    }
}
