//! Pipeline observability
//!
//! Counters and latency samples for the footprint pipeline and service.
//! Counters are atomics so a metrics handle can be shared with the service
//! task and read from anywhere; `export` gives a sorted view for scraping.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Core metrics for one footprint pipeline.
#[derive(Debug)]
pub struct PipelineMetrics {
    // Ingress
    pub prints_processed: AtomicU64,
    pub prints_rejected: AtomicU64,
    pub late_trades: AtomicU64,
    pub processing_ns: Mutex<LatencyTracker>,

    // Candles
    pub candles_opened: AtomicU64,
    pub candles_closed: AtomicU64,

    // Egress
    pub snapshots_built: AtomicU64,
    pub snapshot_build_ns: Mutex<LatencyTracker>,
    pub snapshots_unread: AtomicU64,

    // Configuration
    pub reconfigurations: AtomicU64,
    pub reconfigurations_rejected: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            prints_processed: AtomicU64::new(0),
            prints_rejected: AtomicU64::new(0),
            late_trades: AtomicU64::new(0),
            processing_ns: Mutex::new(LatencyTracker::new(1000)),
            candles_opened: AtomicU64::new(0),
            candles_closed: AtomicU64::new(0),
            snapshots_built: AtomicU64::new(0),
            snapshot_build_ns: Mutex::new(LatencyTracker::new(100)),
            snapshots_unread: AtomicU64::new(0),
            reconfigurations: AtomicU64::new(0),
            reconfigurations_rejected: AtomicU64::new(0),
        }
    }

    /// Record a print that reached the candle.
    pub fn record_processed(&self, latency_ns: u64) {
        self.prints_processed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut tracker) = self.processing_ns.lock() {
            tracker.record(latency_ns);
        }
    }

    pub fn record_rejected(&self) {
        self.prints_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_late_trade(&self) {
        self.late_trades.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_candle_opened(&self) {
        self.candles_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_candle_closed(&self) {
        self.candles_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot(&self, build_ns: u64) {
        self.snapshots_built.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut tracker) = self.snapshot_build_ns.lock() {
            tracker.record(build_ns);
        }
    }

    /// Record a published snapshot nobody was subscribed to.
    pub fn record_unread_snapshot(&self) {
        self.snapshots_unread.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconfiguration(&self, accepted: bool) {
        if accepted {
            self.reconfigurations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reconfigurations_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// p99 processing latency, if any print has been processed.
    pub fn processing_p99_ns(&self) -> Option<u64> {
        self.processing_ns.lock().ok()?.percentile(99)
    }

    /// Check alert thresholds and generate alerts.
    pub fn check_thresholds(&self, thresholds: &AlertThresholds) -> Vec<Alert> {
        let mut alerts = Vec::new();

        let rejected = self.prints_rejected.load(Ordering::Relaxed);
        if rejected > thresholds.max_prints_rejected {
            alerts.push(Alert {
                level: AlertLevel::Warning,
                metric: "prints_rejected".to_string(),
                message: format!(
                    "Prints rejected: {} > threshold {}",
                    rejected, thresholds.max_prints_rejected
                ),
            });
        }

        let late = self.late_trades.load(Ordering::Relaxed);
        if late > thresholds.max_late_trades {
            alerts.push(Alert {
                level: AlertLevel::Warning,
                metric: "late_trades".to_string(),
                message: format!("Late trades: {} > threshold {}", late, thresholds.max_late_trades),
            });
        }

        if let Some(p99) = self.processing_p99_ns() {
            if p99 > thresholds.max_processing_p99_ns {
                alerts.push(Alert {
                    level: AlertLevel::Critical,
                    metric: "processing_p99".to_string(),
                    message: format!(
                        "Print processing p99: {}ns > threshold {}ns",
                        p99, thresholds.max_processing_p99_ns
                    ),
                });
            }
        }

        alerts
    }

    /// Export metrics as a BTreeMap for Prometheus-style exposition.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let counters = [
            ("prints_processed", &self.prints_processed),
            ("prints_rejected", &self.prints_rejected),
            ("late_trades", &self.late_trades),
            ("candles_opened", &self.candles_opened),
            ("candles_closed", &self.candles_closed),
            ("snapshots_built", &self.snapshots_built),
            ("snapshots_unread", &self.snapshots_unread),
            ("reconfigurations", &self.reconfigurations),
            ("reconfigurations_rejected", &self.reconfigurations_rejected),
        ];
        let mut m: BTreeMap<String, u64> = counters
            .into_iter()
            .map(|(name, counter)| (name.to_string(), counter.load(Ordering::Relaxed)))
            .collect();
        if let Some(p99) = self.processing_p99_ns() {
            m.insert("processing_p99_ns".to_string(), p99);
        }
        m
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks latency samples for percentile calculation.
#[derive(Debug)]
pub struct LatencyTracker {
    samples: VecDeque<u64>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Record a latency sample, evicting the oldest when full.
    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Get a percentile value (0-100).
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (p as f64 / 100.0 * (sorted.len() - 1) as f64) as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    pub fn average(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().sum();
        Some(sum / self.samples.len() as u64)
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}

/// Alert severity level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Critical,
}

/// An alert triggered by threshold breach.
#[derive(Debug, Clone)]
pub struct Alert {
    pub level: AlertLevel,
    pub metric: String,
    pub message: String,
}

/// Configurable alert thresholds.
#[derive(Debug, Clone)]
pub struct AlertThresholds {
    pub max_prints_rejected: u64,
    pub max_late_trades: u64,
    /// Nanoseconds.
    pub max_processing_p99_ns: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_prints_rejected: 100,
            max_late_trades: 100,
            max_processing_p99_ns: 1_000_000, // 1ms
        }
    }
}
