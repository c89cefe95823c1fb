//! One request/reply exchange over a half-duplex byte channel.
//!
//! ```text
//! Idle ──write──▶ AwaitingEcho ──echo──▶ AwaitingReply ──reply──▶ Complete
//!                       │                      │
//!                       └──────────────────────┴──────▶ Failed(reason)
//! ```
//!
//! Every byte written on the K-Line comes straight back to the sender, so
//! the first frame read after a write is our own request. It is framed,
//! then dropped. No retries happen here; `run` can simply be called again.

use serde::Serialize;
use std::time::Duration;

use kl_protocol::hex;
use kl_protocol::{Address, DecodedRecord, Protocol};

use crate::channel::ByteChannel;
use crate::decoder;
use crate::error::{KlineError, KlineResult};
use crate::frame::{Frame, FrameCodec, Request};

/// Default per-read timeout, matching the 500 ms serial timeout of a
/// typical K-Line adapter.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Where a transaction is in its exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionState {
    Idle,
    AwaitingEcho,
    AwaitingReply,
    Complete,
    Failed(KlineError),
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Complete | TransactionState::Failed(_))
    }
}

/// Successful, validated reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub protocol: Protocol,
    pub request: Request,
    pub frame: Frame,
    /// Payload for the decoder: after the status byte (DS2) or the
    /// 4-byte header (KWP2000).
    #[serde(with = "kl_protocol::hex::bytes")]
    pub payload: Vec<u8>,
}

impl Reply {
    /// Decode the payload with the layout of the issued command.
    pub fn decode(&self) -> KlineResult<DecodedRecord> {
        decoder::decode_payload(
            self.protocol,
            self.request.target(),
            self.request.command(),
            &self.payload,
        )
    }
}

/// Result of an exchange that did not fail.
///
/// An absent ECU is routine on a shared bus, so it is an outcome rather
/// than an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Reply(Reply),
    Unreachable { address: Address },
}

impl Outcome {
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            Outcome::Reply(reply) => Some(reply),
            Outcome::Unreachable { .. } => None,
        }
    }

    pub fn into_reply(self) -> Option<Reply> {
        match self {
            Outcome::Reply(reply) => Some(reply),
            Outcome::Unreachable { .. } => None,
        }
    }
}

/// Drives one request/reply exchange.
///
/// Holds the channel exclusively for its lifetime.
pub struct Transaction<'a, C: FrameCodec + ?Sized> {
    codec: &'a C,
    channel: &'a mut dyn ByteChannel,
    request: Request,
    timeout: Duration,
    state: TransactionState,
}

impl<'a, C: FrameCodec + ?Sized> Transaction<'a, C> {
    pub fn new(codec: &'a C, channel: &'a mut dyn ByteChannel, request: Request) -> Self {
        Self {
            codec,
            channel,
            request,
            timeout: DEFAULT_TIMEOUT,
            state: TransactionState::Idle,
        }
    }

    /// Per-read timeout (default 500 ms).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> &TransactionState {
        &self.state
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Run the exchange from the start.
    pub async fn run(&mut self) -> KlineResult<Outcome> {
        self.state = TransactionState::Idle;
        let target = self.request.target();

        let frame = match self.codec.encode(&self.request) {
            Ok(frame) => frame,
            Err(e) => return Err(self.fail(e)),
        };

        tracing::debug!(
            protocol = %self.codec.protocol(),
            address = %target,
            frame = %hex::spaced(&frame),
            "tx"
        );
        if let Err(e) = self.channel.write(&frame).await {
            return Err(self.fail(e));
        }
        self.state = TransactionState::AwaitingEcho;

        match self.codec.read_frame(&mut *self.channel, self.timeout).await {
            Ok(echo) => {
                if echo.as_bytes() != frame.as_slice() {
                    tracing::warn!(
                        sent = %hex::spaced(&frame),
                        echo = %hex::spaced(echo.as_bytes()),
                        "echo differs from transmitted frame"
                    );
                }
            }
            Err(e) => return Err(self.fail(KlineError::Bus(Box::new(e)))),
        }
        self.state = TransactionState::AwaitingReply;

        let reply = match self.codec.read_frame(&mut *self.channel, self.timeout).await {
            Ok(reply) => reply,
            Err(KlineError::NoReply { timeout_ms }) => {
                tracing::debug!(address = %target, timeout_ms, "address unreachable");
                self.state = TransactionState::Complete;
                return Ok(Outcome::Unreachable { address: target });
            }
            Err(e) => return Err(self.fail(e)),
        };

        let payload = match self.codec.interpret(&self.request, &reply) {
            Ok(payload) => payload,
            Err(e) => return Err(self.fail(e)),
        };

        self.state = TransactionState::Complete;
        Ok(Outcome::Reply(Reply {
            protocol: self.codec.protocol(),
            request: self.request.clone(),
            frame: reply,
            payload,
        }))
    }

    fn fail(&mut self, error: KlineError) -> KlineError {
        tracing::debug!(address = %self.request.target(), %error, "transaction failed");
        self.state = TransactionState::Failed(error.clone());
        error
    }
}

/// Run one transaction with the given codec and channel.
pub async fn execute<C: FrameCodec + ?Sized>(
    codec: &C,
    channel: &mut dyn ByteChannel,
    request: Request,
    timeout: Duration,
) -> KlineResult<Outcome> {
    Transaction::new(codec, channel, request)
        .with_timeout(timeout)
        .run()
        .await
}
