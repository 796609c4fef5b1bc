//! Demonstration binary for `chunkbus`.
//!
//! `fragment` prints the records a message becomes on the wire. `loopback`
//! runs an initiator and a responder in one process and polls on a timer
//! until the message arrives.

mod cli;

use std::{
    io::{self, Write},
    num::NonZeroUsize,
    process::ExitCode,
    time::Duration,
};

use chunkbus::{
    GatewayConfig,
    GatewayContext,
    Message,
    codec::{ChunkCodec, JsonLineCodec},
    fragment::{AcceptAny, Fragmenter},
    gateway::{DeviceAddress, Loopback},
};
use clap::Parser;
use tracing::{debug, error, info};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let result = match Cli::parse().command {
        Command::Fragment {
            message,
            chunk_size,
        } => fragment(&message, chunk_size),
        Command::Loopback {
            message,
            address,
            interval_ms,
            max_polls,
            raw,
        } => {
            loopback(
                &message,
                address,
                Duration::from_millis(interval_ms),
                max_polls,
                raw,
            )
            .await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn fragment(message: &str, chunk_size: NonZeroUsize) -> chunkbus::Result<()> {
    let batch = Fragmenter::new(chunk_size).fragment(&Message::from(message))?;
    let mut out = io::stdout().lock();
    for envelope in batch.iter() {
        out.write_all(&JsonLineCodec.encode(envelope)?)?;
    }
    Ok(())
}

async fn loopback(
    message: &str,
    address: u8,
    interval: Duration,
    max_polls: usize,
    raw: bool,
) -> chunkbus::Result<()> {
    let address = DeviceAddress::new(address)?;
    let config = GatewayConfig::default();
    let responder = GatewayContext::new(config)?.with_address(address);
    let initiator = if raw {
        GatewayContext::with_codec(config, JsonLineCodec, AcceptAny)?
    } else {
        GatewayContext::new(config)?
    };

    let outcome = responder.submit(message);
    info!(%address, ?outcome, "message submitted");
    let mut ticker = tokio::time::interval(interval);
    for poll in 1..=max_polls {
        ticker.tick().await;
        let report = initiator.receive_poll(&mut Loopback::new(&responder), address)?;
        for event in &report.events {
            debug!(poll, ?event, "chunk processed");
        }
        if let Some(received) = initiator.take_message() {
            info!(polls = poll, bytes = received.len(), "message received");
            println!("{received}");
            return Ok(());
        }
    }
    Err(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("no message after {max_polls} polls"),
    )
    .into())
}
