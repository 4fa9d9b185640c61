//! Journal replay
//!
//! Rebuilds a pipeline from a JSON-lines print journal (one `RawPrint` per
//! line). Replay is deterministic: the same journal under the same
//! configuration always yields the same state checksum, which can be
//! checked against an expected value.

use std::io::BufRead;
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info, warn};
use types::errors::ConfigError;
use types::ids::InstrumentId;

use crate::config::FootprintConfig;
use crate::ingestion::RawPrint;
use crate::pipeline::{FootprintPipeline, PipelineError};

/// Metrics collected during replay.
#[derive(Debug, Clone)]
pub struct ReplayMetrics {
    pub prints_replayed: u64,
    /// Invalid or late prints skipped (lenient mode only).
    pub prints_skipped: u64,
    pub duration_ms: u128,
    pub prints_per_second: f64,
    pub state_checksum: String,
}

/// Result of a replay operation.
#[derive(Debug)]
pub struct ReplayResult {
    pub pipeline: FootprintPipeline,
    pub metrics: ReplayMetrics,
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("journal corruption at line {line}: {reason}")]
    JournalCorruption { line: usize, reason: String },

    #[error("print rejected at line {line}: {source}")]
    Rejected { line: usize, source: PipelineError },

    #[error("state checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("journal read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Replays a print journal into a fresh pipeline.
pub struct ReplayEngine {
    instrument: InstrumentId,
    config: FootprintConfig,
    expected_checksum: Option<String>,
    /// Fail on the first rejected print instead of skipping it.
    strict: bool,
}

impl ReplayEngine {
    pub fn new(instrument: InstrumentId, config: FootprintConfig) -> Self {
        Self {
            instrument,
            config,
            expected_checksum: None,
            strict: false,
        }
    }

    /// Set the expected state checksum for post-replay validation.
    pub fn with_expected_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.expected_checksum = Some(checksum.into());
        self
    }

    pub fn with_strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Replay JSON lines from a reader. Blank lines are ignored.
    pub fn replay_reader<R: BufRead>(&self, reader: R) -> Result<ReplayResult, ReplayError> {
        let mut prints = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let print: RawPrint =
                serde_json::from_str(&line).map_err(|e| ReplayError::JournalCorruption {
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            prints.push((idx + 1, print));
        }
        self.run(prints)
    }

    /// Replay an in-memory sequence of prints.
    pub fn replay(&self, prints: &[RawPrint]) -> Result<ReplayResult, ReplayError> {
        self.run(prints.iter().cloned().enumerate().map(|(i, p)| (i + 1, p)))
    }

    fn run<I>(&self, prints: I) -> Result<ReplayResult, ReplayError>
    where
        I: IntoIterator<Item = (usize, RawPrint)>,
    {
        let start = Instant::now();
        info!(instrument = %self.instrument, strict = self.strict, "Starting print replay");

        let mut pipeline = FootprintPipeline::new(self.instrument.clone(), self.config.clone())?;
        let mut replayed: u64 = 0;
        let mut skipped: u64 = 0;

        for (line, print) in prints {
            match pipeline.process(&print) {
                Ok(_) => replayed += 1,
                Err(source) if self.strict => {
                    return Err(ReplayError::Rejected { line, source });
                }
                Err(err) => {
                    warn!(line, error = %err, "skipping journal print");
                    skipped += 1;
                }
            }
        }

        let duration_ms = start.elapsed().as_millis();
        let prints_per_second = if duration_ms > 0 {
            (replayed as f64 / duration_ms as f64) * 1000.0
        } else {
            replayed as f64
        };
        let state_checksum = pipeline.state_checksum();

        if let Some(expected) = &self.expected_checksum {
            if &state_checksum != expected {
                error!(
                    expected = %expected,
                    actual = %state_checksum,
                    "State checksum mismatch after replay"
                );
                return Err(ReplayError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual: state_checksum,
                });
            }
        }

        let metrics = ReplayMetrics {
            prints_replayed: replayed,
            prints_skipped: skipped,
            duration_ms,
            prints_per_second,
            state_checksum,
        };
        info!(
            prints_replayed = metrics.prints_replayed,
            prints_skipped = metrics.prints_skipped,
            duration_ms = metrics.duration_ms,
            pps = %format!("{:.0}", metrics.prints_per_second),
            "Replay completed"
        );

        Ok(ReplayResult { pipeline, metrics })
    }
}
