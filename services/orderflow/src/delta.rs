//! Cumulative volume delta (CVD) and divergence detection
//!
//! The CVD series is a running sum of per-candle delta in window order. It
//! is rebuilt from the retained candle history after every update, which is
//! O(n) in the number of candles and idempotent for a given candle set.
//! `CumulativeDelta` keeps the same sum incrementally for callers that only
//! append.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::candles::FootprintCandle;

/// One point of the cumulative delta series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvdPoint {
    pub window_start: i64,
    pub delta: Decimal,
    pub cvd: Decimal,
}

/// Divergence between price and CVD over the last three points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Divergence {
    /// Price rose twice while CVD fell twice.
    Bearish,
    /// Price fell twice while CVD rose twice.
    Bullish,
    #[default]
    None,
}

/// Running sum of `total_delta` over candles ordered by window start.
///
/// `base` is the cumulative delta carried in from candles no longer
/// retained; it is zero for a session that has evicted nothing.
pub fn build_cumulative_delta<'a, I>(candles: I, base: Decimal) -> Vec<CvdPoint>
where
    I: IntoIterator<Item = &'a FootprintCandle>,
{
    let mut running = base;
    candles
        .into_iter()
        .map(|candle| {
            running += candle.total_delta;
            CvdPoint {
                window_start: candle.window_start,
                delta: candle.total_delta,
                cvd: running,
            }
        })
        .collect()
}

/// Compare the last three closes against the last three CVD values.
///
/// Needs at least three points in each series and series of equal length;
/// anything else yields `Divergence::None`.
pub fn detect_cvd_divergence(closes: &[Decimal], cvds: &[Decimal]) -> Divergence {
    if closes.len() < 3 || closes.len() != cvds.len() {
        return Divergence::None;
    }
    let p = &closes[closes.len() - 3..];
    let c = &cvds[cvds.len() - 3..];

    let price_up = p[0] < p[1] && p[1] < p[2];
    let price_down = p[0] > p[1] && p[1] > p[2];
    let cvd_up = c[0] < c[1] && c[1] < c[2];
    let cvd_down = c[0] > c[1] && c[1] > c[2];

    if price_up && cvd_down {
        Divergence::Bearish
    } else if price_down && cvd_up {
        Divergence::Bullish
    } else {
        Divergence::None
    }
}

/// Incremental CVD tracker.
///
/// Tracks the completed (closed) total and the live candle's delta
/// separately so that live updates replace, rather than add to, the last
/// contribution.
#[derive(Debug, Clone, Default)]
pub struct CumulativeDelta {
    closed_total: Decimal,
    live_window: Option<i64>,
    live_delta: Decimal,
}

impl CumulativeDelta {
    pub fn new(base: Decimal) -> Self {
        Self {
            closed_total: base,
            live_window: None,
            live_delta: Decimal::ZERO,
        }
    }

    /// Fold the current state of the live candle into the running total.
    pub fn update(&mut self, candle: &FootprintCandle) -> Decimal {
        match self.live_window {
            Some(window) if window == candle.window_start => {}
            Some(_) => {
                self.closed_total += self.live_delta;
                self.live_window = Some(candle.window_start);
            }
            None => self.live_window = Some(candle.window_start),
        }
        self.live_delta = candle.total_delta;
        self.value()
    }

    pub fn value(&self) -> Decimal {
        self.closed_total + self.live_delta
    }
}
