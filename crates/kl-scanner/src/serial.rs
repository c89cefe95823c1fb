//! `ByteChannel` over a serial K-Line adapter.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tokio_serial::{DataBits, SerialPortBuilderExt, SerialStream, StopBits};

use kl_codec::{ByteChannel, KlineError, KlineResult};

use crate::config::{Parity, ScannerConfig};

/// Serial port in 8-N/E/O-1 configuration.
pub struct SerialChannel {
    port: SerialStream,
}

impl SerialChannel {
    pub fn open(device: &str, baud_rate: u32, parity: Parity) -> KlineResult<Self> {
        let port = tokio_serial::new(device, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(parity.into())
            .stop_bits(StopBits::One)
            .open_native_async()
            .map_err(|e| KlineError::Channel(format!("{device}: {e}")))?;

        tracing::info!(device, baud_rate, ?parity, "serial port open");
        Ok(Self { port })
    }

    pub fn from_config(config: &ScannerConfig) -> KlineResult<Self> {
        Self::open(&config.device, config.baud_rate, config.parity)
    }
}

#[async_trait]
impl ByteChannel for SerialChannel {
    async fn write(&mut self, bytes: &[u8]) -> KlineResult<()> {
        self.port.write_all(bytes).await?;
        self.port.flush().await?;
        Ok(())
    }

    /// Reads one byte at a time under a shared deadline, so a short read
    /// still reports how many bytes made it.
    async fn read_exact(&mut self, n: usize, timeout: Duration) -> KlineResult<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut bytes = Vec::with_capacity(n);
        while bytes.len() < n {
            match tokio::time::timeout_at(deadline, self.port.read_u8()).await {
                Ok(Ok(byte)) => bytes.push(byte),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(KlineError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                        received: bytes.len(),
                    });
                }
            }
        }
        Ok(bytes)
    }
}
