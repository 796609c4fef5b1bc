//! Integration tests driving two gateway contexts over in-memory buses.
#![cfg(not(loom))]

use std::{sync::Arc, time::Duration};

use chunkbus::{
    ChunkEvent,
    DeviceAddress,
    GatewayConfig,
    GatewayContext,
    Message,
    ReassemblyError,
    RequestOutcome,
    codec::JsonLineCodec,
    fragment::AcceptAny,
    gateway::Loopback,
};
use chunkbus_testing::{LoggerHandle, RecordingBus, ScriptedBus, logger, record};
use log::Level;
use rstest::{fixture, rstest};

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[fixture]
fn address() -> DeviceAddress { DeviceAddress::new(0x42).expect("valid address") }

#[fixture]
fn config() -> GatewayConfig { GatewayConfig::default() }

#[rstest]
fn responder_writes_one_record_per_request(config: GatewayConfig) -> TestResult {
    let responder = GatewayContext::new(config)?;
    let document = format!("{{\"reading\":\"{}\"}}", "x".repeat(150));
    responder.submit(document.as_str());

    let mut bus = RecordingBus::default();
    while let RequestOutcome::Sent { .. } = responder.on_request(&mut bus) {}

    assert_eq!(bus.transactions.len(), 3);
    assert!(bus.transactions.iter().all(|t| t.ends_with(b"\n")));
    assert_eq!(bus.transactions[0], record(0, 3, &document[..64]).to_vec());
    assert_eq!(bus.transactions[2], record(2, 3, &document[128..]).to_vec());
    Ok(())
}

#[rstest]
fn messages_arrive_in_submission_order(config: GatewayConfig, address: DeviceAddress) -> TestResult {
    let responder = GatewayContext::new(config)?.with_address(address);
    let initiator = GatewayContext::with_codec(config, JsonLineCodec, AcceptAny)?;
    for text in ["first", "second", "third"] {
        responder.submit(text);
    }

    let mut received = Vec::new();
    let mut bus = Loopback::new(&responder);
    for _ in 0..10 {
        initiator.receive_poll(&mut bus, address)?;
        received.extend(std::iter::from_fn(|| initiator.take_message()));
    }
    assert_eq!(received, ["first", "second", "third"].map(Message::from));
    Ok(())
}

#[rstest]
fn escape_dense_documents_fit_the_poll_size(config: GatewayConfig) -> TestResult {
    let responder = GatewayContext::new(config)?;
    let document = format!("{{\"l\":[{}]}}", vec!["\"\""; 60].join(","));
    responder.submit(document.as_str());

    let mut bus = RecordingBus::default();
    while let RequestOutcome::Sent { .. } = responder.on_request(&mut bus) {}

    assert!(bus.transactions.len() > 3);
    assert!(
        bus.transactions
            .iter()
            .all(|t| t.len() <= config.poll_size.get())
    );
    Ok(())
}

#[rstest]
fn escape_dense_document_is_followed_by_the_next_message(
    config: GatewayConfig,
    address: DeviceAddress,
) -> TestResult {
    let responder = GatewayContext::new(config)?.with_address(address);
    let initiator = GatewayContext::new(config)?;
    let document = format!("{{\"l\":[{}]}}", vec!["\"\""; 60].join(","));
    responder.submit(document.as_str());
    responder.submit(r#"{"next":1}"#);

    let mut received = Vec::new();
    let mut bus = Loopback::new(&responder);
    for _ in 0..20 {
        let report = initiator.receive_poll(&mut bus, address)?;
        assert!(!report.has_errors(), "unexpected events: {:?}", report.events);
        received.extend(std::iter::from_fn(|| initiator.take_message()));
    }

    assert_eq!(received.len(), 2);
    assert!(received[0].as_str().contains(r#""l":["","""#));
    assert!(received[1].as_str().contains(r#""next":1"#));
    Ok(())
}

#[rstest]
fn polling_an_unknown_address_is_an_io_error(config: GatewayConfig, address: DeviceAddress) {
    let responder = GatewayContext::new(config)
        .expect("context")
        .with_address(address);
    let initiator = GatewayContext::new(config).expect("context");
    let other = DeviceAddress::new(0x10).expect("valid address");

    let err = initiator
        .receive_poll(&mut Loopback::new(&responder), other)
        .expect_err("nobody at 0x10");
    assert!(matches!(err, chunkbus::GatewayError::Io(_)));
}

#[rstest]
fn residual_bytes_resume_on_the_next_poll(config: GatewayConfig, address: DeviceAddress) -> TestResult {
    let initiator = GatewayContext::new(config)?;
    let line = record(0, 1, r#"{"t":21}"#);
    let (head, tail) = line.split_at(10);
    let mut bus = ScriptedBus::default()
        .respond(head.to_vec())
        .respond([tail, &[0xFF; 8][..]].concat());

    assert_eq!(initiator.receive_poll(&mut bus, address)?.pending_bytes, 10);
    assert_eq!(initiator.receive_poll(&mut bus, address)?.completed(), 1);
    assert_eq!(initiator.take_message(), Some(Message::from(r#"{"t":21}"#)));
    assert_eq!(bus.polls, vec![(address, 128), (address, 128)]);
    Ok(())
}

#[rstest]
fn unbalanced_document_is_rejected_on_completion(config: GatewayConfig) -> TestResult {
    let receiver = GatewayContext::new(config)?;
    let report = receiver.on_receive(&record(0, 1, r#"{"open":{"#));
    assert!(matches!(
        report.events.as_slice(),
        [ChunkEvent::Discarded(ReassemblyError::Validation(_))]
    ));
    assert_eq!(receiver.take_message(), None);
    Ok(())
}

#[rstest]
fn order_error_is_logged_as_a_warning(mut logger: LoggerHandle, config: GatewayConfig) -> TestResult {
    let receiver = GatewayContext::new(config)?;
    receiver.on_receive(&record(0, 3, "{\"a\":"));
    receiver.on_receive(&record(2, 3, "1}"));

    let warnings = logger.messages_at(Level::Warn);
    assert!(
        warnings
            .iter()
            .any(|message| message.contains("discarding partial message")
                && message.contains("expected 1, found 2")),
        "missing order warning: {warnings:?}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn producer_and_poller_share_one_responder() -> TestResult {
    let address = DeviceAddress::new(0x21)?;
    let responder = Arc::new(GatewayContext::new(GatewayConfig::default())?.with_address(address));
    let initiator = Arc::new(GatewayContext::new(GatewayConfig::default())?);

    let producer = {
        let responder = Arc::clone(&responder);
        tokio::spawn(async move {
            for n in 0..5 {
                responder.submit(format!("{{\"n\":{n},\"pad\":\"{}\"}}", "p".repeat(100)));
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
    };

    let poller = {
        let responder = Arc::clone(&responder);
        let initiator = Arc::clone(&initiator);
        tokio::spawn(async move {
            let mut received = Vec::new();
            let mut ticker = tokio::time::interval(Duration::from_millis(1));
            while received.len() < 5 {
                ticker.tick().await;
                initiator
                    .receive_poll(&mut Loopback::new(&responder), address)
                    .expect("loopback poll");
                received.extend(std::iter::from_fn(|| initiator.take_message()));
            }
            received
        })
    };

    producer.await?;
    let received = tokio::time::timeout(Duration::from_secs(5), poller).await??;
    for (n, message) in received.iter().enumerate() {
        let value: serde_json::Value = serde_json::from_str(message.as_str())?;
        assert_eq!(value["n"], n);
        assert_eq!(value["SlaveID"], 0x21);
    }
    Ok(())
}
