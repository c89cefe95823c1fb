//! Mock byte channel for testing.
//!
//! Supports scripted inbound bytes, write recording, and an optional
//! loopback that emulates the K-Line echo. All tests use this instead of a
//! real serial port so the suite runs in CI on any platform.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use crate::channel::ByteChannel;
use crate::error::{KlineError, KlineResult};

/// Mock byte channel with scripted inbound bytes and write recording.
#[derive(Debug, Default)]
pub struct MockChannel {
    /// Bytes returned by `read_exact` (FIFO order).
    inbound: VecDeque<u8>,
    /// Every buffer passed to `write` (for test assertions).
    writes: Vec<Vec<u8>>,
    /// Echo written bytes ahead of anything already queued.
    loopback: bool,
    /// Fail the next write with this message.
    fail_write: Option<String>,
}

impl MockChannel {
    /// Create a new mock with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock pre-loaded with inbound bytes.
    pub fn with_bytes(bytes: &[u8]) -> Self {
        Self {
            inbound: bytes.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Create a mock that echoes every write back, like a real K-Line.
    ///
    /// The echo is placed in front of already queued bytes, so a reply
    /// queued up front is read after the echo of the request.
    pub fn with_loopback() -> Self {
        Self {
            loopback: true,
            ..Self::default()
        }
    }

    /// Queue additional inbound bytes.
    pub fn queue(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Make the next write fail with a channel error.
    pub fn fail_next_write(&mut self, message: impl Into<String>) {
        self.fail_write = Some(message.into());
    }

    /// All buffers that were written.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// The last written buffer, if any.
    pub fn last_write(&self) -> Option<&[u8]> {
        self.writes.last().map(Vec::as_slice)
    }

    /// Number of inbound bytes not yet read.
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }
}

#[async_trait]
impl ByteChannel for MockChannel {
    async fn write(&mut self, bytes: &[u8]) -> KlineResult<()> {
        if let Some(message) = self.fail_write.take() {
            return Err(KlineError::Channel(message));
        }
        if self.loopback {
            for &b in bytes.iter().rev() {
                self.inbound.push_front(b);
            }
        }
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    async fn read_exact(&mut self, n: usize, timeout: Duration) -> KlineResult<Vec<u8>> {
        if self.inbound.len() < n {
            let received = self.inbound.len();
            self.inbound.clear();
            return Err(KlineError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
                received,
            });
        }
        Ok(self.inbound.drain(..n).collect())
    }
}
