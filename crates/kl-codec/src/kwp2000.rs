//! KWP2000 framing: `[0xB8][target][source][len][payload..][checksum]`.

use async_trait::async_trait;
use std::time::Duration;

use kl_protocol::hex;
use kl_protocol::{Address, Protocol};

use crate::channel::ByteChannel;
use crate::checksum;
use crate::error::{KlineError, KlineResult};
use crate::frame::{Frame, FrameCodec, Request, read_first, read_rest};

/// Format byte opening every frame.
pub const HEADER: u8 = 0xB8;

/// Header (format, target, source, length) + checksum.
pub const OVERHEAD: usize = 5;

/// Largest payload the length byte can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Encode a KWP2000 frame.
pub fn encode(target: Address, source: Address, payload: &[u8]) -> KlineResult<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD {
        return Err(KlineError::PayloadTooLong {
            len: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let mut frame = Vec::with_capacity(payload.len() + OVERHEAD);
    frame.push(HEADER);
    frame.push(target.byte());
    frame.push(source.byte());
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum::checksum(&frame));
    Ok(frame)
}

/// Validate one KWP2000 frame at the start of `bytes`.
///
/// Bytes past the declared length are not examined.
pub fn parse(bytes: &[u8]) -> KlineResult<Frame> {
    let Some(&header) = bytes.first() else {
        return Err(KlineError::IncompleteFrame {
            expected: OVERHEAD,
            received: 0,
        });
    };
    if header != HEADER {
        return Err(KlineError::UnexpectedHeader { header });
    }
    if bytes.len() < 4 {
        return Err(KlineError::IncompleteFrame {
            expected: OVERHEAD,
            received: bytes.len(),
        });
    }
    let total = bytes[3] as usize + OVERHEAD;
    if bytes.len() < total {
        return Err(KlineError::IncompleteFrame {
            expected: total,
            received: bytes.len(),
        });
    }
    finish(bytes[..total].to_vec())
}

/// Read one KWP2000 frame from the channel.
///
/// A wrong first byte is reported as `UnexpectedHeader` after consuming
/// only that byte; resynchronising is up to the caller.
pub async fn read(channel: &mut dyn ByteChannel, timeout: Duration) -> KlineResult<Frame> {
    let header = read_first(channel, timeout).await?;
    if header != HEADER {
        return Err(KlineError::UnexpectedHeader { header });
    }

    let addressing = read_rest(channel, 3, 1, OVERHEAD, timeout).await?;
    let total = addressing[2] as usize + OVERHEAD;
    let rest = read_rest(channel, total - 4, 4, total, timeout).await?;

    let mut bytes = Vec::with_capacity(total);
    bytes.push(header);
    bytes.extend_from_slice(&addressing);
    bytes.extend_from_slice(&rest);
    finish(bytes)
}

fn finish(bytes: Vec<u8>) -> KlineResult<Frame> {
    tracing::debug!(frame = %hex::spaced(&bytes), "kwp2000 rx");
    if let Err((expected, actual)) = checksum::verify(&bytes) {
        tracing::warn!(
            frame = %hex::spaced(&bytes),
            expected,
            actual,
            "kwp2000 checksum mismatch"
        );
        return Err(KlineError::Checksum { expected, actual });
    }
    Ok(Frame::validated(Protocol::Kwp2000, bytes))
}

/// KWP2000 `FrameCodec`.
///
/// `source` is used for requests that do not name their own source address.
#[derive(Debug, Clone, Copy)]
pub struct Kwp2000Codec {
    pub source: Address,
}

impl Kwp2000Codec {
    pub fn new(source: Address) -> Self {
        Self { source }
    }
}

impl Default for Kwp2000Codec {
    fn default() -> Self {
        Self::new(Address::TESTER)
    }
}

#[async_trait]
impl FrameCodec for Kwp2000Codec {
    fn protocol(&self) -> Protocol {
        Protocol::Kwp2000
    }

    fn encode(&self, request: &Request) -> KlineResult<Vec<u8>> {
        let source = request.source().unwrap_or(self.source);
        encode(request.target(), source, request.command())
    }

    async fn read_frame(
        &self,
        channel: &mut dyn ByteChannel,
        timeout: Duration,
    ) -> KlineResult<Frame> {
        read(channel, timeout).await
    }

    /// No status byte: a framed reply with the right header is a success.
    fn interpret(&self, request: &Request, reply: &Frame) -> KlineResult<Vec<u8>> {
        if reply.first() != HEADER {
            return Err(KlineError::UnexpectedHeader {
                header: reply.first(),
            });
        }
        if reply.source() != Some(request.target()) {
            tracing::debug!(
                expected = %request.target(),
                source = ?reply.source(),
                "kwp2000 reply from unexpected source"
            );
        }
        Ok(reply.payload().to_vec())
    }
}
