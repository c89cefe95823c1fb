//! K-Line error types.

use kl_protocol::{Address, Protocol, Status};
use thiserror::Error;

/// Errors that can occur while talking to an ECU over K-Line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KlineError {
    #[error("byte channel error: {0}")]
    Channel(String),

    /// Raw channel timeout; `received` bytes arrived before the deadline.
    #[error("read timeout after {timeout_ms}ms ({received} bytes received)")]
    Timeout { timeout_ms: u64, received: usize },

    #[error("no reply within {timeout_ms}ms")]
    NoReply { timeout_ms: u64 },

    #[error("incomplete frame: expected {expected} bytes, got {received}")]
    IncompleteFrame { expected: usize, received: usize },

    #[error("invalid DS2 length byte {length} (minimum 3)")]
    InvalidLength { length: u8 },

    #[error("payload of {len} bytes exceeds frame limit of {max}")]
    PayloadTooLong { len: usize, max: usize },

    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    Checksum { expected: u8, actual: u8 },

    #[error("unexpected header byte 0x{header:02X}")]
    UnexpectedHeader { header: u8 },

    #[error("unexpected sender {actual}, expected {expected}")]
    UnexpectedSender { expected: Address, actual: Address },

    #[error("bus error while reading echo: {0}")]
    Bus(Box<KlineError>),

    #[error("ECU rejected request: {0}")]
    Device(Status),

    #[error("no payload layout for {protocol} command {command:02X?} on {address}")]
    UnrecognizedCommand {
        protocol: Protocol,
        address: Address,
        command: Vec<u8>,
    },

    #[error("insufficient payload length for {field}: need {needed} bytes, got {actual}")]
    InsufficientPayload {
        field: &'static str,
        needed: usize,
        actual: usize,
    },
}

impl KlineError {
    /// Whether the next transaction on the same channel can proceed normally.
    ///
    /// Only a broken channel and programmer errors (missing layouts,
    /// oversized requests) are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            KlineError::Channel(_)
            | KlineError::UnrecognizedCommand { .. }
            | KlineError::PayloadTooLong { .. } => false,
            KlineError::Bus(inner) => inner.is_recoverable(),
            _ => true,
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            KlineError::Device(Status::ComputerBusy) | KlineError::Checksum { .. } => true,
            KlineError::Bus(inner) => inner.is_retryable(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for KlineError {
    fn from(err: std::io::Error) -> Self {
        KlineError::Channel(err.to_string())
    }
}

/// Convenience alias for K-Line results.
pub type KlineResult<T> = Result<T, KlineError>;
