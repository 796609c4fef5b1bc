//! Command line interface for the `chunkbus` binary.
//!
//! Kept free of crate types so the build script can render a man page from
//! the same definition.

use std::num::NonZeroUsize;

use clap::{Parser, Subcommand};

/// Command line arguments for the `chunkbus` binary.
#[derive(Debug, Parser)]
#[command(
    name = "chunkbus",
    version,
    about = "Split and reassemble messages over a polled bus"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the envelope records a message is split into.
    Fragment {
        /// Message text.
        message: String,
        /// Payload bytes per chunk.
        #[arg(short, long, default_value = "64")]
        chunk_size: NonZeroUsize,
    },
    /// Pass a message from an in-process responder to an initiator.
    Loopback {
        /// Message text submitted by the responder.
        message: String,
        /// Responder bus address, decimal or `0x` hex.
        #[arg(short, long, default_value = "0x42", value_parser = parse_address)]
        address: u8,
        /// Milliseconds between polls.
        #[arg(long, default_value_t = 10)]
        interval_ms: u64,
        /// Give up after this many polls.
        #[arg(long, default_value_t = 1000)]
        max_polls: usize,
        /// Accept payloads that are not JSON objects.
        #[arg(long)]
        raw: bool,
    },
}

fn parse_address(text: &str) -> Result<u8, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|err| format!("invalid address {text:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::{Cli, Command};

    #[test]
    fn fragment_uses_default_chunk_size() {
        let cli = Cli::parse_from(["chunkbus", "fragment", "HELLOWORLD"]);
        let Command::Fragment {
            message,
            chunk_size,
        } = cli.command
        else {
            panic!("expected fragment subcommand");
        };
        assert_eq!(message, "HELLOWORLD");
        assert_eq!(chunk_size.get(), 64);
    }

    #[rstest]
    #[case("0x42", 0x42)]
    #[case("0X7e", 0x7E)]
    #[case("17", 17)]
    fn loopback_parses_addresses(#[case] text: &str, #[case] expected: u8) {
        let cli = Cli::parse_from(["chunkbus", "loopback", "{}", "--address", text]);
        let Command::Loopback { address, raw, .. } = cli.command else {
            panic!("expected loopback subcommand");
        };
        assert_eq!(address, expected);
        assert!(!raw);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(Cli::try_parse_from(["chunkbus", "fragment", "x", "--chunk-size", "0"]).is_err());
    }
}
