//! Footprint pipeline driver
//!
//! Owns one instrument's state and pushes each raw print, in order,
//! through validation → classification → candle routing → footprint
//! update → signal recomputation → CVD rebuild. A pipeline is a plain
//! owned struct mutated through `&mut self`: exactly one writer, and a
//! reconfiguration always lands between two prints.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};
use types::errors::{ConfigError, PrintError};
use types::ids::{InstrumentId, SessionId};
use types::trade::Trade;

use crate::candles::{AggregationError, CandleAggregator, FootprintCandle};
use crate::classifier::TickClassifier;
use crate::config::{ConfigUpdate, FootprintConfig};
use crate::delta::{build_cumulative_delta, detect_cvd_divergence, CvdPoint, Divergence};
use crate::footprint;
use crate::ingestion::{PrintValidator, RawPrint};
use crate::metrics::PipelineMetrics;
use crate::snapshot::{candle_views, compute_checksum, FootprintSnapshot, SnapshotBuilder, TapeState};

/// Why a print did not reach a candle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Print(#[from] PrintError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

/// What one accepted print did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub trade: Trade,
    pub window_start: i64,
    /// The print opened a new candle.
    pub opened: bool,
    /// Window start of the candle the print closed, if any.
    pub closed: Option<i64>,
}

/// Single-instrument footprint engine.
#[derive(Debug)]
pub struct FootprintPipeline {
    instrument: InstrumentId,
    session_id: SessionId,
    config: FootprintConfig,
    validator: PrintValidator,
    classifier: TickClassifier,
    aggregator: CandleAggregator,
    tape: TapeState,
    cvd_series: Vec<CvdPoint>,
    divergence: Divergence,
    snapshots: SnapshotBuilder,
    metrics: Arc<PipelineMetrics>,
}

impl FootprintPipeline {
    pub fn new(instrument: InstrumentId, config: FootprintConfig) -> Result<Self, ConfigError> {
        Self::with_metrics(instrument, config, Arc::new(PipelineMetrics::new()))
    }

    /// Create a pipeline reporting into a shared metrics handle.
    pub fn with_metrics(
        instrument: InstrumentId,
        config: FootprintConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let interval = config.interval()?;
        let session_id = SessionId::new();

        info!(
            instrument = %instrument,
            session = %session_id,
            interval_secs = config.interval_secs,
            imbalance_ratio = %config.imbalance_ratio,
            "FootprintPipeline initialized"
        );

        Ok(Self {
            validator: PrintValidator::new(config.tick_size),
            classifier: TickClassifier::new(config.tie_default_side),
            aggregator: CandleAggregator::new(interval, config.history_limit),
            instrument,
            session_id,
            config,
            tape: TapeState::default(),
            cvd_series: Vec::new(),
            divergence: Divergence::None,
            snapshots: SnapshotBuilder::new(),
            metrics,
        })
    }

    /// Process one raw print.
    ///
    /// A rejected print (invalid, or earlier than the live window) leaves
    /// every piece of state untouched apart from the rejection counters.
    pub fn process(&mut self, raw: &RawPrint) -> Result<ProcessOutcome, PipelineError> {
        let started = Instant::now();

        let print = match self.validator.validate(raw) {
            Ok(print) => print,
            Err(err) => {
                self.metrics.record_rejected();
                return Err(err.into());
            }
        };
        if let Err(err) = self.aggregator.admit(print.timestamp) {
            warn!(instrument = %self.instrument, error = %err, "late print skipped");
            self.metrics.record_late_trade();
            return Err(err.into());
        }

        let side = match self.classifier.classify(&print, self.tape.last_price) {
            Ok(side) => side,
            Err(err) => {
                self.metrics.record_rejected();
                return Err(err.into());
            }
        };
        let trade = Trade::new(print.price, print.quantity, side, print.timestamp);

        let routed = self.aggregator.route(&trade)?;
        footprint::apply(routed.candle, &trade);
        footprint::refresh_signals(routed.candle, &self.config);
        let outcome = ProcessOutcome {
            trade,
            window_start: routed.candle.window_start,
            opened: routed.opened,
            closed: routed.closed,
        };

        if outcome.opened {
            self.metrics.record_candle_opened();
        }
        if outcome.closed.is_some() {
            self.metrics.record_candle_closed();
        }

        self.tape.last_price = Some(print.price);
        if print.best_bid.is_some() {
            self.tape.best_bid = print.best_bid;
        }
        if print.best_ask.is_some() {
            self.tape.best_ask = print.best_ask;
        }
        self.tape.last_timestamp = Some(print.timestamp);
        self.tape.tick_count += 1;
        self.rebuild_cvd();

        self.metrics.record_processed(started.elapsed().as_nanos() as u64);
        debug!(
            instrument = %self.instrument,
            price = %trade.price,
            quantity = %trade.quantity,
            side = ?trade.side,
            window_start = outcome.window_start,
            "print applied"
        );

        Ok(outcome)
    }

    /// Apply a partial configuration change atomically.
    ///
    /// On error the previous configuration stays in effect. Candles already
    /// open keep their interval; the live candle's signals are recomputed
    /// with the new parameters.
    pub fn reconfigure(&mut self, update: &ConfigUpdate) -> Result<(), ConfigError> {
        let next = match self.config.apply(update).and_then(|c| c.interval().map(|i| (c, i))) {
            Ok(next) => next,
            Err(err) => {
                self.metrics.record_reconfiguration(false);
                return Err(err);
            }
        };
        let (config, interval) = next;

        self.aggregator.set_interval(interval);
        self.aggregator.set_history_limit(config.history_limit);
        self.validator.set_tick_size(config.tick_size);
        self.classifier.set_tie_default(config.tie_default_side);
        if let Some(live) = self.aggregator.live_mut() {
            footprint::refresh_signals(live, &config);
        }
        self.config = config;
        self.rebuild_cvd();
        self.metrics.record_reconfiguration(true);

        info!(
            instrument = %self.instrument,
            interval_secs = self.config.interval_secs,
            "pipeline reconfigured"
        );
        Ok(())
    }

    fn rebuild_cvd(&mut self) {
        self.cvd_series =
            build_cumulative_delta(self.aggregator.candles(), self.aggregator.evicted_delta());
        let closes: Vec<Decimal> = self.aggregator.candles().map(|c| c.close.as_decimal()).collect();
        let cvds: Vec<Decimal> = self.cvd_series.iter().map(|p| p.cvd).collect();

        let divergence = detect_cvd_divergence(&closes, &cvds);
        if divergence != Divergence::None && divergence != self.divergence {
            info!(instrument = %self.instrument, ?divergence, "CVD divergence");
        }
        self.divergence = divergence;
    }

    /// Build a snapshot of the most recent `snapshot_depth` candles.
    pub fn snapshot(&mut self) -> FootprintSnapshot {
        let started = Instant::now();
        let views = candle_views(
            self.aggregator.candles(),
            &self.cvd_series,
            self.config.snapshot_depth,
        );
        let snapshot = self.snapshots.build(
            &self.instrument,
            self.session_id,
            self.config.interval_secs,
            views,
            &self.tape,
            self.cvd(),
            self.divergence,
        );
        self.metrics.record_snapshot(started.elapsed().as_nanos() as u64);
        snapshot
    }

    /// Checksum over every retained candle, independent of snapshot depth.
    pub fn state_checksum(&self) -> String {
        let views = candle_views(self.aggregator.candles(), &self.cvd_series, usize::MAX);
        compute_checksum(&views, &self.tape, self.cvd(), self.divergence)
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn config(&self) -> &FootprintConfig {
        &self.config
    }

    pub fn live(&self) -> Option<&FootprintCandle> {
        self.aggregator.live()
    }

    /// All retained candles in window order, live last.
    pub fn candles(&self) -> impl DoubleEndedIterator<Item = &FootprintCandle> {
        self.aggregator.candles()
    }

    pub fn candle(&self, window_start: i64) -> Option<&FootprintCandle> {
        self.aggregator.candle(window_start)
    }

    pub fn cumulative_delta(&self) -> &[CvdPoint] {
        &self.cvd_series
    }

    /// Session cumulative delta.
    pub fn cvd(&self) -> Decimal {
        self.cvd_series
            .last()
            .map(|p| p.cvd)
            .unwrap_or_else(|| self.aggregator.evicted_delta())
    }

    pub fn divergence(&self) -> Divergence {
        self.divergence
    }

    pub fn tape(&self) -> &TapeState {
        &self.tape
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Prints applied to a candle.
    pub fn prints_accepted(&self) -> u64 {
        self.metrics.prints_processed.load(Ordering::Relaxed)
    }

    /// Prints dropped as invalid or late.
    pub fn prints_rejected(&self) -> u64 {
        self.metrics.prints_rejected.load(Ordering::Relaxed)
            + self.metrics.late_trades.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use types::numeric::Price;
    use types::trade::Side;

    fn pipeline() -> FootprintPipeline {
        FootprintPipeline::new(InstrumentId::new("NIFTY"), FootprintConfig::default()).unwrap()
    }

    fn tagged(price: f64, qty: f64, ts: i64, side: &str) -> RawPrint {
        RawPrint::new(price, qty, ts).with_aggressor(side)
    }

    #[test]
    fn test_three_trade_scenario() {
        let mut p = pipeline();
        p.process(&tagged(100.0, 10.0, 1_000, "buy")).unwrap();
        p.process(&tagged(100.05, 5.0, 2_000, "sell")).unwrap();
        p.process(&tagged(100.0, 20.0, 3_000, "buy")).unwrap();

        let live = p.live().unwrap();
        assert_eq!(live.open, Price::from_u64(100));
        assert_eq!(live.high, Price::from_str("100.05").unwrap());
        assert_eq!(live.low, Price::from_u64(100));
        assert_eq!(live.close, Price::from_u64(100));
        assert_eq!(live.total_volume, Decimal::from(35));
        assert_eq!(live.total_delta, Decimal::from(25));
        assert_eq!(live.poc, Some(Price::from_u64(100)));
        assert_eq!(p.cvd(), Decimal::from(25));
        assert_eq!(p.tape().tick_count, 3);
    }

    #[test]
    fn test_quote_classification_flows_through() {
        let mut p = pipeline();
        let outcome = p
            .process(&RawPrint::new(100.5, 2.0, 0).with_quote(100.0, 100.5))
            .unwrap();
        assert_eq!(outcome.trade.side, Side::Buy);
        assert_eq!(p.tape().best_ask, Price::from_str("100.5").ok());
    }

    #[test]
    fn test_invalid_print_leaves_state() {
        let mut p = pipeline();
        p.process(&tagged(100.0, 1.0, 0, "buy")).unwrap();
        let checksum = p.state_checksum();

        assert!(matches!(
            p.process(&RawPrint::new(100.0, -1.0, 10)),
            Err(PipelineError::Print(_))
        ));
        assert_eq!(p.state_checksum(), checksum);
        assert_eq!(p.prints_rejected(), 1);
        assert_eq!(p.metrics().export()["prints_rejected"], 1);
    }

    #[test]
    fn test_late_print_leaves_state() {
        let mut p = pipeline();
        p.process(&tagged(100.0, 1.0, 65_000, "buy")).unwrap();
        let checksum = p.state_checksum();

        let err = p.process(&tagged(99.0, 1.0, 30_000, "sell")).unwrap_err();
        assert!(matches!(err, PipelineError::Aggregation(AggregationError::LateTrade { .. })));
        assert_eq!(p.state_checksum(), checksum);
        assert_eq!(p.metrics().export()["late_trades"], 1);
        assert_eq!(p.prints_accepted(), 1);
        assert_eq!(p.prints_rejected(), 1);
    }

    #[test]
    fn test_window_roll_and_cvd_series() {
        let mut p = pipeline();
        p.process(&tagged(100.0, 10.0, 1_000, "buy")).unwrap();
        let outcome = p.process(&tagged(101.0, 4.0, 61_000, "sell")).unwrap();

        assert!(outcome.opened);
        assert_eq!(outcome.closed, Some(0));
        assert!(p.candle(0).unwrap().closed);

        let series = p.cumulative_delta();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].cvd, Decimal::from(10));
        assert_eq!(series[1].cvd, Decimal::from(6));
    }

    #[test]
    fn test_bearish_divergence_detected() {
        let mut p = pipeline();
        // Closes 100 < 101 < 102, deltas keep CVD falling: -1, -2, -3
        for (i, price) in [100.0, 101.0, 102.0].into_iter().enumerate() {
            p.process(&tagged(price, 1.0, i as i64 * 60_000, "sell")).unwrap();
        }
        assert_eq!(p.divergence(), Divergence::Bearish);
    }

    #[test]
    fn test_reconfigure_rejected_keeps_config() {
        let mut p = pipeline();
        let update = ConfigUpdate {
            value_area_fraction: Some(Decimal::from(2)),
            ..ConfigUpdate::default()
        };
        assert!(p.reconfigure(&update).is_err());
        assert_eq!(p.config(), &FootprintConfig::default());
        assert_eq!(p.metrics().export()["reconfigurations_rejected"], 1);
    }

    #[test]
    fn test_reconfigure_ratio_refreshes_live() {
        let mut p = pipeline();
        for (price, qty, side) in [(99.0, 1.0, "buy"), (99.0, 1.0, "sell"), (100.0, 10.0, "buy"),
            (100.0, 1.0, "sell"), (101.0, 1.0, "buy"), (101.0, 1.0, "sell")]
        {
            p.process(&tagged(price, qty, 1_000, side)).unwrap();
        }
        assert!(p.live().unwrap().imbalance.is_empty());

        let update = ConfigUpdate {
            imbalance_ratio: Some(Decimal::from(2)),
            ..ConfigUpdate::default()
        };
        p.reconfigure(&update).unwrap();
        assert_eq!(p.live().unwrap().imbalance.len(), 1);
    }

    #[test]
    fn test_snapshot_depth_and_integrity() {
        let config = FootprintConfig {
            snapshot_depth: 2,
            ..FootprintConfig::default()
        };
        let mut p = FootprintPipeline::new(InstrumentId::new("nifty"), config).unwrap();
        for i in 0..5 {
            p.process(&tagged(100.0, 1.0, i * 60_000, "buy")).unwrap();
        }

        let snap = p.snapshot();
        assert_eq!(snap.instrument.as_str(), "NIFTY");
        assert_eq!(snap.candles.len(), 2);
        assert_eq!(snap.candles[1].cvd, Decimal::from(5));
        assert_eq!(snap.cvd, Decimal::from(5));
        assert!(snap.live().is_some());
        assert!(crate::snapshot::verify_snapshot_integrity(&snap));
        assert_eq!(p.snapshot().version, 2);
    }

    #[test]
    fn test_history_limit_keeps_cvd_continuous() {
        let config = FootprintConfig {
            history_limit: Some(2),
            ..FootprintConfig::default()
        };
        let mut p = FootprintPipeline::new(InstrumentId::new("NIFTY"), config).unwrap();
        for i in 0..6 {
            p.process(&tagged(100.0, 2.0, i * 60_000, "buy")).unwrap();
        }

        assert_eq!(p.candles().count(), 3);
        assert_eq!(p.cvd(), Decimal::from(12));
        assert_eq!(p.cumulative_delta()[0].cvd, Decimal::from(8));
    }
}
