//! Requests, validated frames, and the `FrameCodec` trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use kl_protocol::{Address, Protocol};

use crate::channel::ByteChannel;
use crate::error::{KlineError, KlineResult};

// ── Request ─────────────────────────────────────────────────────

/// One command addressed to an ECU. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    target: Address,
    /// Tester address, KWP2000 only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    source: Option<Address>,
    #[serde(with = "kl_protocol::hex::bytes")]
    command: Vec<u8>,
}

impl Request {
    pub fn new(target: Address, command: impl Into<Vec<u8>>) -> Self {
        Self {
            target,
            source: None,
            command: command.into(),
        }
    }

    /// Same request, sent from an explicit source address.
    pub fn with_source(self, source: Address) -> Self {
        Self {
            source: Some(source),
            ..self
        }
    }

    pub fn target(&self) -> Address {
        self.target
    }

    pub fn source(&self) -> Option<Address> {
        self.source
    }

    /// Command payload, possibly empty.
    pub fn command(&self) -> &[u8] {
        &self.command
    }
}

// ── Frame ───────────────────────────────────────────────────────

/// A complete frame whose checksum has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    protocol: Protocol,
    #[serde(with = "kl_protocol::hex::bytes")]
    bytes: Vec<u8>,
}

impl Frame {
    /// Wrap bytes that already passed framing and checksum validation.
    pub(crate) fn validated(protocol: Protocol, bytes: Vec<u8>) -> Self {
        Self { protocol, bytes }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Bytes before the payload: 2 for DS2, 4 for KWP2000.
    pub fn header_len(&self) -> usize {
        match self.protocol {
            Protocol::Ds2 => 2,
            Protocol::Kwp2000 => 4,
        }
    }

    /// First byte: the ECU address (DS2) or the `0xB8` header (KWP2000).
    pub fn first(&self) -> u8 {
        self.bytes[0]
    }

    /// Address byte of the frame: the ECU for DS2 (in both directions),
    /// the destination for KWP2000.
    pub fn address(&self) -> Address {
        match self.protocol {
            Protocol::Ds2 => Address(self.bytes[0]),
            Protocol::Kwp2000 => Address(self.bytes[1]),
        }
    }

    /// Source address (KWP2000 only).
    pub fn source(&self) -> Option<Address> {
        match self.protocol {
            Protocol::Ds2 => None,
            Protocol::Kwp2000 => Some(Address(self.bytes[2])),
        }
    }

    /// Declared length byte: total frame length for DS2, payload length
    /// for KWP2000.
    pub fn length(&self) -> u8 {
        self.bytes[self.header_len() - 1]
    }

    /// Payload between header and checksum.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.header_len()..self.bytes.len() - 1]
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// Total frame length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// ── FrameCodec trait ────────────────────────────────────────────

/// A framing convention: how requests go on the wire and how replies come off.
#[async_trait]
pub trait FrameCodec: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Encode a request into a complete frame including checksum.
    fn encode(&self, request: &Request) -> KlineResult<Vec<u8>>;

    /// Read and validate one frame from the channel.
    ///
    /// Silence before the first byte is `NoReply`; silence mid-frame is
    /// `IncompleteFrame`. Never reads past the declared frame boundary.
    async fn read_frame(
        &self,
        channel: &mut dyn ByteChannel,
        timeout: Duration,
    ) -> KlineResult<Frame>;

    /// Check a reply against its request and return the payload for decoding.
    fn interpret(&self, request: &Request, reply: &Frame) -> KlineResult<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// Channel read helpers shared by both framings
// ---------------------------------------------------------------------------

/// Read the first byte of a frame. A timeout with nothing received is `NoReply`.
pub(crate) async fn read_first(channel: &mut dyn ByteChannel, timeout: Duration) -> KlineResult<u8> {
    match channel.read_exact(1, timeout).await {
        Ok(bytes) => Ok(bytes[0]),
        Err(KlineError::Timeout { timeout_ms, .. }) => Err(KlineError::NoReply { timeout_ms }),
        Err(e) => Err(e),
    }
}

/// Read `n` more bytes of a frame of `expected` total bytes, `have` of which
/// are already in hand.
pub(crate) async fn read_rest(
    channel: &mut dyn ByteChannel,
    n: usize,
    have: usize,
    expected: usize,
    timeout: Duration,
) -> KlineResult<Vec<u8>> {
    match channel.read_exact(n, timeout).await {
        Ok(bytes) => Ok(bytes),
        Err(KlineError::Timeout { received, .. }) => Err(KlineError::IncompleteFrame {
            expected,
            received: have + received,
        }),
        Err(e) => Err(e),
    }
}
