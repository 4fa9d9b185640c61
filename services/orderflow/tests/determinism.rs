//! Determinism tests for the footprint engine
//!
//! The same prints under the same configuration must always produce the
//! same state, whichever path they take through the crate.
//!
//! Tests include:
//! - Dual pipeline comparison
//! - Journal replay twice, with expected checksum
//! - Pipeline vs. async service
//! - Missing print detection

use orderflow::replay::{ReplayEngine, ReplayError};
use orderflow::synthetic::{SyntheticConfig, SyntheticFeed};
use orderflow::{FootprintConfig, FootprintPipeline, FootprintService, ServiceConfig};
use orderflow::ingestion::RawPrint;
use types::ids::InstrumentId;

fn feed(seed: u64, n: usize) -> Vec<RawPrint> {
    SyntheticFeed::new(SyntheticConfig::default(), seed).take(n).collect()
}

fn run(prints: &[RawPrint], config: FootprintConfig) -> FootprintPipeline {
    let mut pipeline = FootprintPipeline::new(InstrumentId::new("NIFTY"), config).unwrap();
    for print in prints {
        pipeline.process(print).unwrap();
    }
    pipeline
}

fn journal(prints: &[RawPrint]) -> String {
    prints
        .iter()
        .map(|p| serde_json::to_string(p).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_dual_pipeline_identical_state() {
    let prints = feed(11, 3_000);
    let a = run(&prints, FootprintConfig::default());
    let b = run(&prints, FootprintConfig::default());

    assert_eq!(a.state_checksum(), b.state_checksum());
    assert_ne!(a.session_id(), b.session_id());

    let ca: Vec<_> = a.candles().cloned().collect();
    let cb: Vec<_> = b.candles().cloned().collect();
    assert_eq!(ca, cb);
    assert_eq!(a.cumulative_delta(), b.cumulative_delta());
}

#[test]
fn test_replay_twice_same_checksum() {
    let text = journal(&feed(5, 1_500));
    let engine = || ReplayEngine::new(InstrumentId::new("NIFTY"), FootprintConfig::default());

    let first = engine().replay_reader(text.as_bytes()).unwrap();
    let second = engine()
        .with_expected_checksum(first.metrics.state_checksum.clone())
        .replay_reader(text.as_bytes())
        .unwrap();

    assert_eq!(first.metrics.state_checksum, second.metrics.state_checksum);
    assert_eq!(first.metrics.prints_replayed, 1_500);
}

#[test]
fn test_replay_matches_direct_pipeline() {
    let prints = feed(9, 800);
    let direct = run(&prints, FootprintConfig::default());
    let replayed = ReplayEngine::new(InstrumentId::new("NIFTY"), FootprintConfig::default())
        .replay_reader(journal(&prints).as_bytes())
        .unwrap();

    assert_eq!(direct.state_checksum(), replayed.metrics.state_checksum);
}

#[test]
fn test_config_changes_checksum() {
    let text = journal(&feed(3, 600));
    let baseline = ReplayEngine::new(InstrumentId::new("NIFTY"), FootprintConfig::default())
        .replay_reader(text.as_bytes())
        .unwrap();

    let config = FootprintConfig {
        interval_secs: 30,
        ..FootprintConfig::default()
    };
    let result = ReplayEngine::new(InstrumentId::new("NIFTY"), config)
        .with_expected_checksum(baseline.metrics.state_checksum)
        .replay_reader(text.as_bytes());
    assert!(matches!(result, Err(ReplayError::ChecksumMismatch { .. })));
}

#[test]
fn test_missing_print_detected() {
    let mut prints = feed(21, 200);
    let baseline = run(&prints, FootprintConfig::default()).state_checksum();

    prints.remove(100);
    assert_ne!(run(&prints, FootprintConfig::default()).state_checksum(), baseline);
}

#[tokio::test]
async fn test_service_matches_pipeline() {
    let prints = feed(13, 1_000);
    let mut direct = run(&prints, FootprintConfig::default());

    let service = FootprintService::new(FootprintConfig::default(), ServiceConfig::default());
    let id = InstrumentId::new("NIFTY");
    service.subscribe(id.clone()).await.unwrap();
    for print in &prints {
        service.ingest(&id, print.clone()).await.unwrap();
    }
    let snapshot = service.snapshot(&id).await.unwrap();

    assert_eq!(snapshot.checksum, direct.snapshot().checksum);
    service.shutdown().await;
}
