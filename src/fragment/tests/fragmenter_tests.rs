//! Tests for outbound fragmentation and FIFO queueing.

use std::num::NonZeroUsize;

use bytes::Bytes;

use crate::{
    buffer::BoundedFifo,
    codec::{ChunkCodec, JsonLineCodec},
    fragment::{ChunkEnvelope, ChunkIndex, FragmentBatch, FragmentationError, Fragmenter},
    message::Message,
};

fn fragmenter(chunk_size: usize) -> Fragmenter {
    Fragmenter::new(NonZeroUsize::new(chunk_size).expect("non-zero"))
}

fn assert_envelope(batch: &FragmentBatch, index: usize, payload: &str, total: u32) {
    let envelope = batch
        .envelopes()
        .get(index)
        .expect("envelope missing at requested index");
    assert_eq!(envelope.sequence().get() as usize, index);
    assert_eq!(envelope.total(), total);
    assert_eq!(envelope.payload(), payload);
}

#[test]
fn helloworld_splits_into_three_chunks_of_four() {
    let batch = fragmenter(4)
        .fragment(&Message::from("HELLOWORLD"))
        .expect("fragment message");

    assert_eq!(batch.len(), 3);
    assert!(batch.is_fragmented());
    assert_envelope(&batch, 0, "HELL", 3);
    assert_envelope(&batch, 1, "OWOR", 3);
    assert_envelope(&batch, 2, "LD", 3);
}

#[test]
fn exact_multiple_does_not_add_an_empty_chunk() {
    let batch = fragmenter(5)
        .fragment(&Message::from("HELLOWORLD"))
        .expect("fragment message");
    assert_eq!(batch.len(), 2);
    assert_envelope(&batch, 1, "WORLD", 2);
}

#[test]
fn empty_message_yields_single_empty_envelope() {
    let batch = fragmenter(8)
        .fragment(&Message::default())
        .expect("fragment empty");

    assert_eq!(batch.len(), 1);
    assert!(!batch.is_fragmented());
    assert_envelope(&batch, 0, "", 1);
}

#[test]
fn multibyte_characters_are_never_split() {
    let text = "aé€😀b";
    let batch = fragmenter(4)
        .fragment(&Message::from(text))
        .expect("fragment message");

    let payloads: Vec<&str> = batch.iter().map(ChunkEnvelope::payload).collect();
    assert_eq!(payloads.concat(), text);
    assert!(payloads.iter().all(|p| !p.is_empty()));
    let total = batch.len() as u32;
    assert!(batch.iter().all(|e| e.total() == total));
}

#[test]
fn character_wider_than_chunk_is_rejected() {
    let err = fragmenter(2)
        .fragment(&Message::from("a€b"))
        .expect_err("three byte character cannot fit two byte chunks");
    assert!(matches!(
        err,
        FragmentationError::CharacterTooWide {
            width: 3,
            chunk_size: 2
        }
    ));
}

#[test]
fn escape_heavy_records_are_cut_to_the_record_limit() {
    let text = format!("{{\"l\":[{}]}}", vec!["\"\""; 60].join(","));
    let limit = 128;
    let bounded = fragmenter(64).with_record_limit(NonZeroUsize::new(limit).expect("non-zero"));
    let message = Message::from(text.as_str());
    let unbounded = fragmenter(64)
        .encode(&message, &JsonLineCodec)
        .expect("encode unbounded");
    assert!(unbounded.iter().any(|r| r.len() > limit));

    let records = bounded
        .encode(&message, &JsonLineCodec)
        .expect("encode message");
    assert!(records.len() > unbounded.len());
    assert!(records.iter().all(|r| r.len() <= limit));
    let envelopes: Vec<ChunkEnvelope> = records
        .iter()
        .map(|r| JsonLineCodec.decode(&r[..r.len() - 1]).expect("decode record"))
        .collect();
    let total = records.len() as u32;
    assert!(envelopes.iter().all(|e| e.total() == total));
    let payload: String = envelopes.iter().map(ChunkEnvelope::payload).collect();
    assert_eq!(payload, text);
}

#[test]
fn record_limit_leaves_plain_text_unchanged() {
    let message = Message::from("HELLOWORLD");
    let bounded = fragmenter(4)
        .with_record_limit(NonZeroUsize::new(128).expect("non-zero"))
        .encode(&message, &JsonLineCodec)
        .expect("encode bounded");
    let unbounded = fragmenter(4)
        .encode(&message, &JsonLineCodec)
        .expect("encode unbounded");
    assert_eq!(bounded, unbounded);
}

#[test]
fn record_limit_below_envelope_overhead_is_an_error() {
    let err = fragmenter(4)
        .with_record_limit(NonZeroUsize::new(16).expect("non-zero"))
        .encode(&Message::from("abc"), &JsonLineCodec)
        .expect_err("no record fits sixteen bytes");
    assert!(matches!(
        err,
        FragmentationError::RecordTooLarge { limit: 16, .. }
    ));
}

#[test]
fn enqueue_fails_without_queueing_when_a_record_cannot_fit() {
    let mut fifo: BoundedFifo<Bytes, 8> = BoundedFifo::new();
    let result = fragmenter(4)
        .with_record_limit(NonZeroUsize::new(16).expect("non-zero"))
        .enqueue(&Message::from("abc"), &JsonLineCodec, &mut fifo);
    assert!(result.is_err());
    assert!(fifo.is_empty());
}

#[test]
fn batch_into_iterator_yields_envelopes_in_order() {
    let batch = fragmenter(2)
        .fragment(&Message::from("abc"))
        .expect("fragment message");
    let sequences: Vec<ChunkIndex> = batch.into_iter().map(|e| e.sequence()).collect();
    assert_eq!(sequences, vec![ChunkIndex::zero(), ChunkIndex::new(1)]);
}

#[test]
fn enqueue_pushes_encoded_records_in_sequence() {
    let mut fifo: BoundedFifo<Bytes, 8> = BoundedFifo::new();
    let report = fragmenter(4)
        .enqueue(&Message::from("HELLOWORLD"), &JsonLineCodec, &mut fifo)
        .expect("enqueue message");

    assert!(report.is_complete());
    assert_eq!(report.enqueued, 3);
    assert_eq!(fifo.len(), 3);
    let first = fifo.pop().expect("first record");
    assert_eq!(&first[..], b"{\"cn\":0,\"tc\":3,\"data\":\"HELL\"}\n");
    let second = fifo.pop().expect("second record");
    let decoded = JsonLineCodec
        .decode(&second[..second.len() - 1])
        .expect("decode record");
    assert_eq!(decoded.payload(), "OWOR");
}

#[test]
fn enqueue_drops_chunks_that_do_not_fit() {
    let mut fifo: BoundedFifo<Bytes, 2> = BoundedFifo::new();
    let report = fragmenter(4)
        .enqueue(&Message::from("HELLOWORLD"), &JsonLineCodec, &mut fifo)
        .expect("enqueue message");

    assert_eq!(report.enqueued, 2);
    assert_eq!(report.dropped, 1);
    assert!(!report.is_complete());
    let first = fifo.pop().expect("first record");
    assert!(first.starts_with(b"{\"cn\":0"));
}
