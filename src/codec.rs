//! Envelope codecs for the polled bus.
//!
//! A [`ChunkCodec`] turns one [`ChunkEnvelope`] into one record and back.
//! Records are separated on the wire by [`RECORD_TERMINATOR`], so a codec
//! must never emit that byte inside a record. [`JsonLineCodec`] is the
//! default and produces `{"cn":0,"tc":3,"data":"HELL"}` followed by `\n`.
//!
//! [`EnvelopeLineCodec`] adapts any [`ChunkCodec`] to the `tokio_util`
//! [`Decoder`] and [`Encoder`] traits. The decoder splits an incoming byte
//! stream on the terminator, bounds how much it buffers while waiting for
//! one, and keeps partial records across calls so a record may span several
//! bus polls.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::fragment::ChunkEnvelope;

pub mod error;

pub use error::CodecError;

/// Byte marking the end of every record on the transport stream.
pub const RECORD_TERMINATOR: u8 = b'\n';

/// Encode and decode single envelope records.
pub trait ChunkCodec: Send + Sync {
    /// Encode `envelope` into a record, including the trailing terminator.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the envelope cannot be represented.
    fn encode(&self, envelope: &ChunkEnvelope) -> Result<Bytes, CodecError>;

    /// Decode a record with its terminator already stripped.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] when the bytes do not form an
    /// envelope and [`CodecError::InvalidEnvelope`] when the decoded fields
    /// break the sequence invariant.
    fn decode(&self, record: &[u8]) -> Result<ChunkEnvelope, CodecError>;
}

/// JSON object per record, keys `cn`, `tc` and `data`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonLineCodec;

impl ChunkCodec for JsonLineCodec {
    fn encode(&self, envelope: &ChunkEnvelope) -> Result<Bytes, CodecError> {
        let mut record =
            serde_json::to_vec(envelope).map_err(|err| CodecError::Encode(err.to_string()))?;
        // serde_json escapes control characters inside strings.
        debug_assert!(!record.contains(&RECORD_TERMINATOR));
        record.push(RECORD_TERMINATOR);
        Ok(Bytes::from(record))
    }

    fn decode(&self, record: &[u8]) -> Result<ChunkEnvelope, CodecError> {
        let envelope: ChunkEnvelope =
            serde_json::from_slice(record).map_err(|err| CodecError::Malformed(err.to_string()))?;
        envelope.check()?;
        Ok(envelope)
    }
}

/// Line-delimited envelope stream codec.
#[derive(Clone, Debug)]
pub struct EnvelopeLineCodec<C = JsonLineCodec> {
    codec: C,
    max_record_len: usize,
    next_index: usize,
    discarding: bool,
}

impl EnvelopeLineCodec<JsonLineCodec> {
    /// Create a JSON line codec that buffers at most `max_record_len` bytes
    /// per record.
    #[must_use]
    pub fn new(max_record_len: usize) -> Self { Self::with_codec(JsonLineCodec, max_record_len) }
}

impl<C: ChunkCodec> EnvelopeLineCodec<C> {
    /// Wrap a custom record codec.
    #[must_use]
    pub fn with_codec(codec: C, max_record_len: usize) -> Self {
        Self {
            codec,
            max_record_len,
            next_index: 0,
            discarding: false,
        }
    }

    /// Borrow the record codec.
    #[must_use]
    pub fn codec(&self) -> &C { &self.codec }

    /// Longest record accepted, excluding the terminator.
    #[must_use]
    pub const fn max_record_len(&self) -> usize { self.max_record_len }

    /// Forget any scan progress, for use after the caller clears its buffer.
    pub fn reset(&mut self) {
        self.next_index = 0;
        self.discarding = false;
    }
}

impl<C: ChunkCodec> Decoder for EnvelopeLineCodec<C> {
    type Item = ChunkEnvelope;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let read_to = src.len().min(self.max_record_len.saturating_add(1));
            let scan_from = self.next_index.min(read_to);
            let terminator = src[scan_from..read_to]
                .iter()
                .position(|byte| *byte == RECORD_TERMINATOR)
                .map(|offset| offset + scan_from);

            match (self.discarding, terminator) {
                (true, Some(end)) => {
                    src.advance(end + 1);
                    self.reset();
                }
                (true, None) => {
                    src.advance(read_to);
                    self.next_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(end)) => {
                    self.next_index = 0;
                    let record = src.split_to(end + 1);
                    let body = &record[..end];
                    if body.is_empty() {
                        continue;
                    }
                    return self.codec.decode(body).map(Some);
                }
                (false, None) if src.len() > self.max_record_len => {
                    self.discarding = true;
                    return Err(CodecError::RecordTooLong {
                        limit: self.max_record_len,
                    });
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }
}

impl<C: ChunkCodec> Encoder<ChunkEnvelope> for EnvelopeLineCodec<C> {
    type Error = CodecError;

    fn encode(&mut self, item: ChunkEnvelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let record = self.codec.encode(&item)?;
        dst.reserve(record.len());
        dst.put_slice(&record);
        Ok(())
    }
}
