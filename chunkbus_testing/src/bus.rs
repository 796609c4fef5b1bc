//! Bus doubles and record builders.

use std::{collections::VecDeque, io};

use bytes::Bytes;
use chunkbus::{
    ChunkEnvelope,
    ChunkIndex,
    codec::{ChunkCodec, JsonLineCodec},
    gateway::{BusWrite, DeviceAddress, PollBus},
};

/// Build an envelope, panicking on invalid fields.
///
/// # Panics
///
/// Panics when `sequence >= total`.
#[must_use]
pub fn envelope(sequence: u32, total: u32, payload: &str) -> ChunkEnvelope {
    ChunkEnvelope::new(ChunkIndex::new(sequence), total, payload).expect("valid envelope")
}

/// Encode an envelope as a terminated JSON line.
///
/// # Panics
///
/// Panics when the envelope is invalid or cannot be encoded.
#[must_use]
pub fn record(sequence: u32, total: u32, payload: &str) -> Bytes {
    JsonLineCodec
        .encode(&envelope(sequence, total, payload))
        .expect("encodable envelope")
}

/// [`BusWrite`] that keeps each write as a separate transaction.
#[derive(Debug, Default)]
pub struct RecordingBus {
    /// Bytes of every write, in order.
    pub transactions: Vec<Vec<u8>>,
}

impl RecordingBus {
    /// All written bytes concatenated.
    #[must_use]
    pub fn concatenated(&self) -> Vec<u8> { self.transactions.concat() }
}

impl BusWrite for RecordingBus {
    fn write(&mut self, bytes: &[u8]) -> usize {
        self.transactions.push(bytes.to_vec());
        bytes.len()
    }
}

/// [`PollBus`] that replays canned responses and remembers each poll.
#[derive(Debug, Default)]
pub struct ScriptedBus {
    responses: VecDeque<io::Result<Bytes>>,
    /// Address and length of every request made.
    pub polls: Vec<(DeviceAddress, usize)>,
}

impl ScriptedBus {
    /// Queue a successful response.
    #[must_use]
    pub fn respond(mut self, bytes: impl Into<Bytes>) -> Self {
        self.responses.push_back(Ok(bytes.into()));
        self
    }

    /// Queue a transport failure.
    #[must_use]
    pub fn fail(mut self, kind: io::ErrorKind) -> Self {
        self.responses
            .push_back(Err(io::Error::new(kind, "scripted failure")));
        self
    }
}

impl PollBus for ScriptedBus {
    fn request(&mut self, address: DeviceAddress, max_len: usize) -> io::Result<Bytes> {
        self.polls.push((address, max_len));
        self.responses.pop_front().unwrap_or_else(|| Ok(Bytes::new()))
    }
}
