//! Footprint candle aggregation
//!
//! Buckets classified trades into tumbling, epoch-aligned windows. Each
//! window owns a footprint candle: OHLC, totals and a price-level table,
//! plus the derived signals recomputed after every trade.
//!
//! Windows close on trade arrival, never on a timer: the first trade that
//! aligns past the live window closes it exactly once and opens the next.
//! Closed candles are frozen and keyed by window start (BTreeMap for
//! deterministic order).

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use types::errors::ConfigError;
use types::numeric::Price;
use types::time::MILLIS_PER_SECOND;
use types::trade::Trade;

use crate::advanced::{AbsorptionLevel, UnfinishedAuction};
use crate::imbalance::{ImbalanceMap, StackedRun};
use crate::levels::PriceLevelTable;
use crate::profile::ValueArea;

/// Longest accepted window (one year); keeps millisecond arithmetic in range.
const MAX_INTERVAL_SECS: u64 = 366 * 86_400;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("late trade at {timestamp} precedes live window starting {window_start}")]
    LateTrade { timestamp: i64, window_start: i64 },
}

/// Validated candle window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowInterval {
    secs: u64,
}

impl WindowInterval {
    pub fn try_new(secs: u64) -> Result<Self, ConfigError> {
        if secs == 0 {
            return Err(ConfigError::NonPositiveInterval);
        }
        if secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::Malformed(format!(
                "interval of {secs}s exceeds {MAX_INTERVAL_SECS}s"
            )));
        }
        Ok(Self { secs })
    }

    pub fn secs(&self) -> u64 {
        self.secs
    }

    /// Duration of this window in milliseconds.
    pub fn duration_millis(&self) -> i64 {
        self.secs as i64 * MILLIS_PER_SECOND
    }

    /// Align a timestamp to this interval's boundary (floor, also for
    /// pre-epoch timestamps). Saturates at `i64::MIN`.
    pub fn align(&self, timestamp_ms: i64) -> i64 {
        let duration = self.duration_millis();
        timestamp_ms.div_euclid(duration).saturating_mul(duration)
    }
}

/// Start of the window containing `timestamp_ms`.
pub fn assign_window(timestamp_ms: i64, interval: WindowInterval) -> i64 {
    interval.align(timestamp_ms)
}

/// One time window of footprint data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootprintCandle {
    pub window_start: i64,
    /// Interval the candle was opened with; later reconfiguration does not
    /// re-bucket it.
    pub interval_secs: u64,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub total_volume: Decimal,
    pub total_delta: Decimal,
    pub trade_count: u64,
    pub levels: PriceLevelTable,
    pub imbalance: ImbalanceMap,
    pub stacked_imbalances: Vec<StackedRun>,
    pub poc: Option<Price>,
    pub value_area: Option<ValueArea>,
    pub absorption: Vec<AbsorptionLevel>,
    pub unfinished_auction: UnfinishedAuction,
    pub closed: bool,
}

impl FootprintCandle {
    /// Open an empty candle at `price`; the opening trade is applied
    /// separately.
    pub fn new(window_start: i64, interval_secs: u64, price: Price) -> Self {
        Self {
            window_start,
            interval_secs,
            open: price,
            high: price,
            low: price,
            close: price,
            total_volume: Decimal::ZERO,
            total_delta: Decimal::ZERO,
            trade_count: 0,
            levels: PriceLevelTable::new(),
            imbalance: ImbalanceMap::new(),
            stacked_imbalances: Vec::new(),
            poc: None,
            value_area: None,
            absorption: Vec::new(),
            unfinished_auction: UnfinishedAuction::default(),
            closed: false,
        }
    }

    /// Nominal end of the window (exclusive).
    pub fn window_end(&self) -> i64 {
        self.window_start
            .saturating_add(self.interval_secs as i64 * MILLIS_PER_SECOND)
    }

    pub fn has_absorption(&self) -> bool {
        !self.absorption.is_empty()
    }

    /// Validate OHLC bounds and non-negative volume.
    pub fn is_valid(&self) -> bool {
        self.high >= self.open
            && self.high >= self.close
            && self.high >= self.low
            && self.low <= self.open
            && self.low <= self.close
            && self.total_volume >= Decimal::ZERO
            && self.total_delta.abs() <= self.total_volume
    }

    /// Candle totals agree with the level table.
    pub fn is_consistent(&self) -> bool {
        self.total_volume == self.levels.total_volume()
            && self.total_delta == self.levels.total_delta()
    }
}

/// Where a trade landed.
#[derive(Debug)]
pub struct Routed<'a> {
    /// Live candle the trade belongs to.
    pub candle: &'a mut FootprintCandle,
    /// The trade opened this candle.
    pub opened: bool,
    /// Window start of the candle this trade closed, if any.
    pub closed: Option<i64>,
}

/// Keeps the live and closed candles of one instrument.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    interval: WindowInterval,
    current: Option<FootprintCandle>,
    closed: BTreeMap<i64, FootprintCandle>,
    history_limit: Option<usize>,
    /// Sum of `total_delta` over evicted candles.
    evicted_delta: Decimal,
    evicted: u64,
    late_trades: u64,
}

impl CandleAggregator {
    pub fn new(interval: WindowInterval, history_limit: Option<usize>) -> Self {
        Self {
            interval,
            current: None,
            closed: BTreeMap::new(),
            history_limit,
            evicted_delta: Decimal::ZERO,
            evicted: 0,
            late_trades: 0,
        }
    }

    pub fn interval(&self) -> WindowInterval {
        self.interval
    }

    /// Change the interval for future windows; the live candle is kept.
    pub fn set_interval(&mut self, interval: WindowInterval) {
        if interval != self.interval {
            info!(
                from_secs = self.interval.secs(),
                to_secs = interval.secs(),
                "candle interval changed"
            );
        }
        self.interval = interval;
    }

    pub fn set_history_limit(&mut self, limit: Option<usize>) {
        self.history_limit = limit;
        self.trim_history();
    }

    /// Find (or open) the live candle for `trade`.
    ///
    /// A trade aligning past the live window closes it. A trade aligning at
    /// or before the live window but not earlier than its start is folded
    /// into it, which is how candles opened under a previous interval absorb
    /// trades after reconfiguration. Anything earlier is rejected untouched.
    pub fn route(&mut self, trade: &Trade) -> Result<Routed<'_>, AggregationError> {
        self.admit(trade.timestamp)?;
        let aligned = self.interval.align(trade.timestamp);
        let mut closed = None;

        if let Some(live) = &self.current {
            if aligned > live.window_start {
                closed = self.close_current();
            }
        }

        let opened = self.current.is_none();
        let interval_secs = self.interval.secs();
        let candle = self.current.get_or_insert_with(|| {
            debug!(window_start = aligned, interval_secs, "candle opened");
            FootprintCandle::new(aligned, interval_secs, trade.price)
        });

        Ok(Routed {
            candle,
            opened,
            closed,
        })
    }

    /// Reject a timestamp earlier than the live window.
    ///
    /// Lets callers refuse a late print before any other state (such as
    /// the classifier's carried side) is touched.
    pub fn admit(&mut self, timestamp: i64) -> Result<(), AggregationError> {
        match &self.current {
            Some(live) if timestamp < live.window_start => {
                self.late_trades += 1;
                Err(AggregationError::LateTrade {
                    timestamp,
                    window_start: live.window_start,
                })
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn live_mut(&mut self) -> Option<&mut FootprintCandle> {
        self.current.as_mut()
    }

    fn close_current(&mut self) -> Option<i64> {
        let mut candle = self.current.take()?;
        candle.closed = true;
        let window_start = candle.window_start;
        info!(
            window_start,
            volume = %candle.total_volume,
            delta = %candle.total_delta,
            trades = candle.trade_count,
            "candle closed"
        );
        self.closed.insert(window_start, candle);
        self.trim_history();
        Some(window_start)
    }

    fn trim_history(&mut self) {
        let Some(limit) = self.history_limit else {
            return;
        };
        while self.closed.len() > limit {
            if let Some((_, candle)) = self.closed.pop_first() {
                self.evicted_delta += candle.total_delta;
                self.evicted += 1;
            }
        }
    }

    /// Closed candles then the live one, in window order.
    pub fn candles(&self) -> impl DoubleEndedIterator<Item = &FootprintCandle> {
        self.closed.values().chain(self.current.iter())
    }

    pub fn candle(&self, window_start: i64) -> Option<&FootprintCandle> {
        match &self.current {
            Some(live) if live.window_start == window_start => Some(live),
            _ => self.closed.get(&window_start),
        }
    }

    pub fn live(&self) -> Option<&FootprintCandle> {
        self.current.as_ref()
    }

    /// Retained candles, live included.
    pub fn len(&self) -> usize {
        self.closed.len() + usize::from(self.current.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn closed_count(&self) -> usize {
        self.closed.len()
    }

    /// Cumulative delta carried by candles evicted from history.
    pub fn evicted_delta(&self) -> Decimal {
        self.evicted_delta
    }

    pub fn evicted_count(&self) -> u64 {
        self.evicted
    }

    pub fn late_trades(&self) -> u64 {
        self.late_trades
    }
}
