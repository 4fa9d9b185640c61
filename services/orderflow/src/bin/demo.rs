use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use types::ids::InstrumentId;
use types::time::format_millis;

use orderflow::replay::ReplayEngine;
use orderflow::synthetic::{SyntheticConfig, SyntheticFeed};
use orderflow::{FootprintConfig, FootprintService, ServiceConfig};

#[derive(Parser)]
#[command(
    name = "orderflow-demo",
    about = "Run the footprint engine on a synthetic feed or a JSON-lines print journal"
)]
struct Cli {
    /// Instrument symbol
    #[arg(long, default_value = "NIFTY")]
    symbol: String,

    /// Replay this journal instead of generating prints
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Fail if the replayed state checksum differs
    #[arg(long, requires = "replay")]
    expected_checksum: Option<String>,

    /// Synthetic prints to generate
    #[arg(long, default_value_t = 2_000)]
    prints: usize,

    /// Synthetic feed seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = FootprintConfig::default()
        .with_env()
        .context("invalid footprint configuration in environment")?;
    let instrument = InstrumentId::try_new(cli.symbol.as_str()).context("symbol must not be blank")?;

    match &cli.replay {
        Some(path) => replay(instrument, config, path, cli.expected_checksum.clone()),
        None => synthetic(instrument, config, cli.prints, cli.seed).await,
    }
}

fn replay(
    instrument: InstrumentId,
    config: FootprintConfig,
    path: &Path,
    expected_checksum: Option<String>,
) -> Result<(), anyhow::Error> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut engine = ReplayEngine::new(instrument, config);
    if let Some(checksum) = expected_checksum {
        engine = engine.with_expected_checksum(checksum);
    }

    let mut result = engine.replay_reader(BufReader::new(file))?;
    let snapshot = result.pipeline.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    tracing::info!(
        checksum = %result.metrics.state_checksum,
        prints = result.metrics.prints_replayed,
        skipped = result.metrics.prints_skipped,
        "journal replayed"
    );
    Ok(())
}

async fn synthetic(
    instrument: InstrumentId,
    config: FootprintConfig,
    prints: usize,
    seed: u64,
) -> Result<(), anyhow::Error> {
    tracing::info!(instrument = %instrument, prints, seed, "Running in demo mode with synthetic prints");

    let service = FootprintService::new(config, ServiceConfig::default());
    let mut snapshots = service.subscribe(instrument.clone()).await?;

    let watcher = tokio::spawn(async move {
        let mut last_logged: Option<i64> = None;
        loop {
            match snapshots.recv().await {
                Ok(snapshot) => {
                    let newest_closed = snapshot.candles.iter().rev().find(|v| v.candle.closed);
                    if let Some(view) = newest_closed {
                        if last_logged != Some(view.candle.window_start) {
                            last_logged = Some(view.candle.window_start);
                            let c = &view.candle;
                            tracing::info!(
                                window = %format_millis(c.window_start),
                                open = %c.open,
                                high = %c.high,
                                low = %c.low,
                                close = %c.close,
                                volume = %c.total_volume,
                                delta = %c.total_delta,
                                cvd = %view.cvd,
                                poc = ?c.poc.map(|p| p.to_string()),
                                imbalances = c.imbalance.len(),
                                absorption = c.has_absorption(),
                                divergence = ?snapshot.divergence,
                                "candle"
                            );
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "snapshot watcher lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let feed = SyntheticFeed::new(SyntheticConfig::default(), seed);
    for print in feed.take(prints) {
        service.ingest(&instrument, print).await?;
    }

    let snapshot = service.snapshot(&instrument).await?;
    let metrics = service.metrics(&instrument).await?;
    let alerts = service.alerts(&instrument).await?;
    service.shutdown().await;
    watcher.await.context("snapshot watcher panicked")?;

    tracing::info!(
        candles = snapshot.candles.len(),
        cvd = %snapshot.cvd,
        checksum = %snapshot.checksum,
        alerts = alerts.len(),
        "demo finished"
    );
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
