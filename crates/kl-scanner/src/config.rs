//! Scanner configuration, loadable from TOML.

use std::time::Duration;

use serde::Deserialize;

use kl_codec::{Ds2Codec, FrameCodec, Kwp2000Codec, Request};
use kl_protocol::{Address, Protocol};

use crate::scan::RunPolicy;

/// Top-level configuration for the scanner.
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Serial device of the K-Line adapter (e.g., "/dev/ttyUSB0").
    pub device: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default)]
    pub parity: Parity,
    /// Per-read timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Pause between transactions in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Extra attempts for a query that failed with a retryable error
    /// (ECU busy, corrupted reply).
    #[serde(default)]
    pub busy_retries: u32,
    /// Keep listening to the bus after the queries have run.
    #[serde(default)]
    pub sniff: bool,
    /// Framing used by the sniffer.
    #[serde(default = "default_sniff_protocol")]
    pub sniff_protocol: Protocol,
    /// Stop sniffing after this many frames. None listens forever.
    #[serde(default)]
    pub sniff_frames: Option<usize>,
    #[serde(default)]
    pub queries: Vec<QueryConfig>,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_timeout_ms() -> u64 {
    500
}

fn default_settle_ms() -> u64 {
    30
}

fn default_sniff_protocol() -> Protocol {
    Protocol::Kwp2000
}

impl ScannerConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Retry and pacing policy for `scan::run_queries`.
    pub fn policy(&self) -> RunPolicy {
        RunPolicy {
            timeout: self.timeout(),
            settle: Duration::from_millis(self.settle_ms),
            busy_retries: self.busy_retries,
        }
    }
}

/// Serial parity. K-Line adapters for DS2 run 8E1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    #[default]
    Even,
    Odd,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        }
    }
}

/// One command to send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryConfig {
    pub protocol: Protocol,
    pub address: Address,
    /// Tester address for KWP2000 frames.
    #[serde(default = "default_source")]
    pub source: Address,
    pub command: Vec<u8>,
}

fn default_source() -> Address {
    Address::TESTER
}

impl QueryConfig {
    pub fn request(&self) -> Request {
        let request = Request::new(self.address, self.command.clone());
        match self.protocol {
            Protocol::Ds2 => request,
            Protocol::Kwp2000 => request.with_source(self.source),
        }
    }

    pub fn codec(&self) -> Box<dyn FrameCodec> {
        codec_for(self.protocol, self.source)
    }
}

/// Codec for a framing, with `source` as the KWP2000 tester address.
pub fn codec_for(protocol: Protocol, source: Address) -> Box<dyn FrameCodec> {
    match protocol {
        Protocol::Ds2 => Box::new(Ds2Codec),
        Protocol::Kwp2000 => Box::new(Kwp2000Codec::new(source)),
    }
}
