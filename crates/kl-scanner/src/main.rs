//! K-Line scanner: queries the configured ECUs over a serial adapter and
//! prints one JSON report per query.

use tracing_subscriber::EnvFilter;

use kl_scanner::config::{ScannerConfig, codec_for};
use kl_scanner::scan;
use kl_scanner::serial::SerialChannel;
use kl_scanner::sniff::{self, SniffLimits};

use kl_protocol::Address;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "kl-scanner starting");

    // ── Load config ─────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/kline/scanner.toml".to_string());

    let config = ScannerConfig::from_file(&config_path)?;
    tracing::info!(
        device = %config.device,
        queries = config.queries.len(),
        "config loaded"
    );

    // ── Serial port ─────────────────────────────────────────────
    let mut channel = SerialChannel::from_config(&config)?;

    // ── Queries ─────────────────────────────────────────────────
    let reports = scan::run_queries(&mut channel, &config.queries, &config.policy()).await;
    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }

    // ── Sniffer ─────────────────────────────────────────────────
    if config.sniff {
        let codec = codec_for(config.sniff_protocol, Address::TESTER);
        let limits = SniffLimits {
            frames: config.sniff_frames,
            idle_timeouts: None,
        };
        tracing::info!(protocol = %config.sniff_protocol, "sniffing bus traffic");
        let summary = sniff::sniff(&*codec, &mut channel, config.timeout(), limits, |frame| {
            match serde_json::to_string(frame) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "frame not serializable"),
            }
        })
        .await?;
        tracing::info!(frames = summary.frames, "sniffer done");
    }

    tracing::info!("kl-scanner finished");
    Ok(())
}
