//! Outbound helper that splits messages into chunk envelopes.
//!
//! [`Fragmenter`] cuts a message into fixed-size chunks and tags each with
//! its sequence number and the total chunk count. The count is known before
//! the first envelope is built, so every envelope of a message carries the
//! same total. [`Fragmenter::enqueue`] additionally encodes the envelopes and
//! queues them for transport.
//!
//! A fragmenter built [`with_record_limit`](Fragmenter::with_record_limit)
//! also bounds the encoded record. Escaping can grow a payload several
//! times over, so chunks are shortened until each record, terminator
//! included, fits in one bus poll.

use std::num::NonZeroUsize;

use bytes::Bytes;
use log::{debug, warn};

use super::{ChunkEnvelope, ChunkIndex, FragmentationError};
use crate::{buffer::BoundedFifo, codec::ChunkCodec, message::Message, metrics};

/// Splits messages into chunk-sized envelopes.
#[derive(Clone, Copy, Debug)]
pub struct Fragmenter {
    chunk_size: NonZeroUsize,
    record_limit: Option<NonZeroUsize>,
}

impl Fragmenter {
    /// Create a fragmenter that caps chunk payloads at `chunk_size` bytes.
    ///
    /// Characters are never split, so `chunk_size` must be at least as wide
    /// as the widest character sent (4 bytes covers all of UTF-8).
    #[must_use]
    pub const fn new(chunk_size: NonZeroUsize) -> Self {
        Self {
            chunk_size,
            record_limit: None,
        }
    }

    /// Also cap every encoded record, terminator included, at `limit` bytes.
    #[must_use]
    pub const fn with_record_limit(mut self, limit: NonZeroUsize) -> Self {
        self.record_limit = Some(limit);
        self
    }

    /// Return the maximum chunk payload size in bytes.
    #[must_use]
    pub const fn chunk_size(&self) -> NonZeroUsize { self.chunk_size }

    /// Return the encoded record limit, if one was set.
    #[must_use]
    pub const fn record_limit(&self) -> Option<NonZeroUsize> { self.record_limit }

    /// Split `message` into envelopes numbered `0..total`.
    ///
    /// Chunks are cut on character boundaries. For ASCII text the number of
    /// chunks is `ceil(len / chunk_size)`. An empty message still produces a
    /// single empty envelope so the receiver sees a complete series.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError::IndexOverflow`] if the message needs more
    /// chunks than a `u32` can number, and
    /// [`FragmentationError::CharacterTooWide`] if a character is wider than
    /// the chunk size.
    pub fn fragment(&self, message: &Message) -> Result<FragmentBatch, FragmentationError> {
        let pieces = split_on_char_boundaries(message.as_str(), self.chunk_size.get())?;
        let batch = build_batch(pieces)?;
        debug!(
            "fragmented message: bytes={}, chunks={}, chunk_size={}",
            message.len(),
            batch.len(),
            self.chunk_size
        );
        Ok(batch)
    }

    /// Fragment `message` and encode every envelope with `codec`.
    ///
    /// Without a record limit this is [`Fragmenter::fragment`] followed by
    /// encoding. With one, chunks are cut short on character boundaries
    /// until every record fits, and the total is taken from the final cut.
    ///
    /// # Errors
    ///
    /// As for [`Fragmenter::fragment`], plus
    /// [`FragmentationError::RecordTooLarge`] when a single character cannot
    /// be encoded within the limit, and [`FragmentationError::Encode`] when
    /// the codec fails.
    pub fn encode<C: ChunkCodec>(
        &self,
        message: &Message,
        codec: &C,
    ) -> Result<Vec<Bytes>, FragmentationError> {
        let Some(limit) = self.record_limit else {
            return encode_batch(&self.fragment(message)?, codec);
        };
        let limit = limit.get();
        let text = message.as_str();

        let mut estimate = split_on_char_boundaries(text, self.chunk_size.get())?.len();
        loop {
            let pieces = self.cut_within(text, codec, limit, estimate)?;
            let count = pieces.len();
            let records = encode_batch(&build_batch(pieces)?, codec)?;
            match records.iter().map(Bytes::len).max() {
                Some(longest) if longest > limit => {
                    // Measured against a total narrower than the real one.
                    if count <= estimate {
                        return Err(FragmentationError::RecordTooLarge {
                            needed: longest,
                            limit,
                        });
                    }
                    estimate = count;
                }
                _ => {
                    debug!(
                        "fragmented message: bytes={}, chunks={count}, record_limit={limit}",
                        message.len()
                    );
                    return Ok(records);
                }
            }
        }
    }

    fn cut_within<'a, C: ChunkCodec>(
        &self,
        text: &'a str,
        codec: &C,
        limit: usize,
        estimate: usize,
    ) -> Result<Vec<&'a str>, FragmentationError> {
        if text.is_empty() {
            return Ok(vec![""]);
        }
        let mut pieces = Vec::with_capacity(estimate);
        let mut rest = text;
        while !rest.is_empty() {
            let mut end = first_cut(rest, self.chunk_size.get())?;
            loop {
                let needed = encoded_len(codec, pieces.len(), estimate, &rest[..end])?;
                if needed <= limit {
                    break;
                }
                end = rest[..end].char_indices().next_back().map_or(0, |(at, _)| at);
                if end == 0 {
                    return Err(FragmentationError::RecordTooLarge { needed, limit });
                }
            }
            let (piece, tail) = rest.split_at(end);
            pieces.push(piece);
            rest = tail;
        }
        Ok(pieces)
    }

    /// Encode `message` as for [`Fragmenter::encode`] and push the records
    /// into `fifo` in sequence order.
    ///
    /// A full FIFO refuses the record and that chunk is lost; the report
    /// counts how many were queued and how many were dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError`] when splitting or encoding fails. No
    /// record is queued in that case.
    pub fn enqueue<C: ChunkCodec, const N: usize>(
        &self,
        message: &Message,
        codec: &C,
        fifo: &mut BoundedFifo<Bytes, N>,
    ) -> Result<EnqueueReport, FragmentationError> {
        let records = self.encode(message, codec)?;

        let mut report = EnqueueReport::default();
        for record in records {
            match fifo.push(record) {
                Ok(()) => report.enqueued += 1,
                Err(_) => report.dropped += 1,
            }
        }
        if report.dropped > 0 {
            warn!(
                "outgoing chunk queue full: enqueued={}, dropped={}, capacity={N}",
                report.enqueued, report.dropped
            );
            metrics::add_dropped_chunks(report.dropped as u64);
        }
        Ok(report)
    }
}

/// Outcome of [`Fragmenter::enqueue`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnqueueReport {
    /// Records accepted by the FIFO.
    pub enqueued: usize,
    /// Records refused because the FIFO was full.
    pub dropped: usize,
}

impl EnqueueReport {
    /// Whether every chunk of the message was queued.
    #[must_use]
    pub const fn is_complete(&self) -> bool { self.dropped == 0 }
}

/// Envelopes produced for a single message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentBatch {
    envelopes: Vec<ChunkEnvelope>,
}

impl FragmentBatch {
    fn new(envelopes: Vec<ChunkEnvelope>) -> Self {
        debug_assert!(!envelopes.is_empty(), "fragment batches must not be empty");
        Self { envelopes }
    }

    /// Return the envelopes as a slice.
    #[must_use]
    pub fn envelopes(&self) -> &[ChunkEnvelope] { self.envelopes.as_slice() }

    /// Iterate over the envelopes in sequence order.
    pub fn iter(&self) -> std::slice::Iter<'_, ChunkEnvelope> { self.envelopes.iter() }

    /// Number of envelopes in the batch.
    #[expect(
        clippy::len_without_is_empty,
        reason = "batches are guaranteed non-empty"
    )]
    #[must_use]
    pub fn len(&self) -> usize { self.envelopes.len() }

    /// Whether the message required more than one chunk.
    #[must_use]
    pub fn is_fragmented(&self) -> bool { self.len() > 1 }
}

impl IntoIterator for FragmentBatch {
    type Item = ChunkEnvelope;
    type IntoIter = std::vec::IntoIter<ChunkEnvelope>;

    fn into_iter(self) -> Self::IntoIter { self.envelopes.into_iter() }
}

fn build_batch(pieces: Vec<&str>) -> Result<FragmentBatch, FragmentationError> {
    let total = u32::try_from(pieces.len()).map_err(|_| FragmentationError::IndexOverflow {
        last: ChunkIndex::new(u32::MAX),
    })?;

    let mut envelopes = Vec::with_capacity(pieces.len());
    let mut index = ChunkIndex::zero();
    for (position, piece) in pieces.into_iter().enumerate() {
        if position > 0 {
            index = index
                .checked_increment()
                .ok_or(FragmentationError::IndexOverflow { last: index })?;
        }
        let envelope = ChunkEnvelope::new(index, total, piece)
            .map_err(|_| FragmentationError::IndexOverflow { last: index })?;
        envelopes.push(envelope);
    }
    Ok(FragmentBatch::new(envelopes))
}

fn encode_batch<C: ChunkCodec>(
    batch: &FragmentBatch,
    codec: &C,
) -> Result<Vec<Bytes>, FragmentationError> {
    batch
        .iter()
        .map(|envelope| codec.encode(envelope).map_err(FragmentationError::from))
        .collect()
}

/// Encoded size of chunk `position` when the message has at least
/// `estimate` chunks.
fn encoded_len<C: ChunkCodec>(
    codec: &C,
    position: usize,
    estimate: usize,
    piece: &str,
) -> Result<usize, FragmentationError> {
    let overflow = || FragmentationError::IndexOverflow {
        last: ChunkIndex::new(u32::MAX),
    };
    let sequence = u32::try_from(position).map_err(|_| overflow())?;
    let total = u32::try_from(estimate.max(position + 1)).map_err(|_| overflow())?;
    let envelope = ChunkEnvelope::new(ChunkIndex::new(sequence), total, piece)
        .map_err(|_| overflow())?;
    Ok(codec.encode(&envelope)?.len())
}

/// Longest prefix of `rest` within `max` bytes that ends on a character
/// boundary.
fn first_cut(rest: &str, max: usize) -> Result<usize, FragmentationError> {
    let mut end = max.min(rest.len());
    while !rest.is_char_boundary(end) {
        end -= 1;
    }
    if end == 0 {
        let width = rest.chars().next().map_or(0, char::len_utf8);
        return Err(FragmentationError::CharacterTooWide {
            width,
            chunk_size: max,
        });
    }
    Ok(end)
}

fn split_on_char_boundaries(text: &str, max: usize) -> Result<Vec<&str>, FragmentationError> {
    if text.is_empty() {
        return Ok(vec![""]);
    }

    let mut pieces = Vec::with_capacity(text.len().div_ceil(max));
    let mut rest = text;
    while !rest.is_empty() {
        let (piece, tail) = rest.split_at(first_cut(rest, max)?);
        pieces.push(piece);
        rest = tail;
    }
    Ok(pieces)
}
