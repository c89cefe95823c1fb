//! Byte channel abstraction.
//!
//! `ByteChannel` is the only stateful resource the codec touches. Two impls:
//! - `MockChannel`: scripted inbound bytes, all platforms (in `mock.rs`)
//! - `SerialChannel`: real serial port, in the scanner crate
//!
//! A channel is owned by exactly one transaction at a time; the K-Line is
//! half-duplex and shared, so nothing here serializes concurrent access.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::KlineResult;

/// Trait for the raw byte source/sink under the codec.
#[async_trait]
pub trait ByteChannel: Send {
    /// Write all bytes to the bus.
    async fn write(&mut self, bytes: &[u8]) -> KlineResult<()>;

    /// Read exactly `n` bytes, waiting up to `timeout`.
    ///
    /// Fewer bytes before the deadline yields `KlineError::Timeout` with the
    /// number of bytes that did arrive; those bytes are consumed.
    async fn read_exact(&mut self, n: usize, timeout: Duration) -> KlineResult<Vec<u8>>;
}

#[async_trait]
impl<T: ByteChannel + ?Sized> ByteChannel for &mut T {
    async fn write(&mut self, bytes: &[u8]) -> KlineResult<()> {
        (**self).write(bytes).await
    }

    async fn read_exact(&mut self, n: usize, timeout: Duration) -> KlineResult<Vec<u8>> {
        (**self).read_exact(n, timeout).await
    }
}

#[async_trait]
impl<T: ByteChannel + ?Sized> ByteChannel for Box<T> {
    async fn write(&mut self, bytes: &[u8]) -> KlineResult<()> {
        (**self).write(bytes).await
    }

    async fn read_exact(&mut self, n: usize, timeout: Duration) -> KlineResult<Vec<u8>> {
        (**self).read_exact(n, timeout).await
    }
}
