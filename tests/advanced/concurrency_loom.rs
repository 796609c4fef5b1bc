#![cfg(all(feature = "advanced-tests", loom))]
//! Concurrency tests for the gateway's callback guards using loom.
//!
//! These tests share one `GatewayContext` between model threads. `loom`
//! explores interleavings to check that the responder never services two
//! requests at once and that refills never race the main loop's writes.

use chunkbus::{GatewayConfig, GatewayContext, RequestOutcome, SubmitOutcome};
use loom::{model, sync::Arc, thread};

#[test]
fn concurrent_requests_send_the_record_once() {
    model(|| {
        let gateway = Arc::new(GatewayContext::new(GatewayConfig::default()).expect("context"));
        assert_eq!(gateway.submit("{\"a\":1}"), SubmitOutcome::Queued);

        let other = Arc::clone(&gateway);
        let t = thread::spawn(move || {
            let mut wire = Vec::new();
            (other.on_request(&mut wire), wire)
        });
        let mut wire = Vec::new();
        let here = gateway.on_request(&mut wire);
        let (there, other_wire) = t.join().expect("request thread panicked");

        let sent = [here, there]
            .iter()
            .filter(|outcome| matches!(outcome, RequestOutcome::Sent { .. }))
            .count();
        assert_eq!(sent, 1, "outcomes: {here:?}, {there:?}");
        assert_eq!(
            [wire, other_wire].concat(),
            b"{\"cn\":0,\"tc\":1,\"data\":\"{\\\"a\\\":1}\"}\n"
        );
        assert_eq!(gateway.outgoing_len(), 0);
        assert_eq!(gateway.pending_chunks(), 0);
    });
}

#[test]
fn refill_and_submit_never_lose_a_message() {
    model(|| {
        let gateway = Arc::new(GatewayContext::new(GatewayConfig::default()).expect("context"));

        let responder = Arc::clone(&gateway);
        let t = thread::spawn(move || responder.on_request(&mut Vec::new()));
        gateway.submit("{\"b\":2}");
        let outcome = t.join().expect("request thread panicked");

        match outcome {
            RequestOutcome::Sent { .. } => assert_eq!(gateway.outgoing_len(), 0),
            RequestOutcome::Idle => assert_eq!(gateway.outgoing_len(), 1),
            RequestOutcome::Skipped(reason) => panic!("unexpected skip: {reason:?}"),
        }
        assert_eq!(gateway.pending_chunks(), 0);
    });
}
