//! Passive bus sniffer: frame and log whatever goes over the K-Line.

use std::time::Duration;

use serde::Serialize;

use kl_codec::{ByteChannel, Frame, FrameCodec, KlineError, KlineResult};
use kl_protocol::hex;

/// When the sniffer stops on its own. Without limits it runs until the
/// channel fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SniffLimits {
    /// Stop after this many valid frames.
    pub frames: Option<usize>,
    /// Stop after this many consecutive silent timeouts.
    pub idle_timeouts: Option<usize>,
}

/// What a sniffing session saw.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SniffSummary {
    pub frames: usize,
    /// Frames dropped for a checksum, length or header error.
    pub dropped: usize,
    /// Timeouts with no traffic at all.
    pub idle_timeouts: usize,
}

/// Read frames until a limit is reached or the channel fails.
///
/// Every valid frame is passed to `on_frame`. Corrupted frames are logged
/// and dropped. A wrong KWP2000 header consumes only that byte, so reading
/// resumes at the next one; a checksum failure consumes the whole declared
/// frame.
pub async fn sniff<F>(
    codec: &dyn FrameCodec,
    channel: &mut dyn ByteChannel,
    timeout: Duration,
    limits: SniffLimits,
    mut on_frame: F,
) -> KlineResult<SniffSummary>
where
    F: FnMut(&Frame),
{
    let mut summary = SniffSummary::default();
    let mut idle = 0;

    loop {
        match codec.read_frame(&mut *channel, timeout).await {
            Ok(frame) => {
                idle = 0;
                summary.frames += 1;
                tracing::info!(
                    protocol = %frame.protocol(),
                    address = %frame.address(),
                    frame = %hex::spaced(frame.as_bytes()),
                    "bus frame"
                );
                on_frame(&frame);
                if limits.frames.is_some_and(|max| summary.frames >= max) {
                    break;
                }
            }
            Err(KlineError::NoReply { .. }) => {
                idle += 1;
                summary.idle_timeouts += 1;
                if limits.idle_timeouts.is_some_and(|max| idle >= max) {
                    break;
                }
            }
            Err(e) if e.is_recoverable() => {
                idle = 0;
                summary.dropped += 1;
                tracing::warn!(error = %e, "dropping corrupted frame");
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        frames = summary.frames,
        dropped = summary.dropped,
        "sniffer stopped"
    );
    Ok(summary)
}
