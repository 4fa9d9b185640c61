//! Snapshot egress
//!
//! A snapshot is the serializable view a consumer needs to draw one
//! instrument's footprint: the most recent candles (live one last), each
//! tagged with its running CVD, plus the last quote/trade state. Snapshots
//! are versioned and carry a SHA-256 checksum over their market content so
//! two pipelines fed the same prints can be compared cheaply.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use types::ids::{InstrumentId, SessionId};
use types::numeric::Price;

use crate::candles::FootprintCandle;
use crate::delta::{CvdPoint, Divergence};

/// Last-seen trade and quote state of an instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeState {
    pub last_price: Option<Price>,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub last_timestamp: Option<i64>,
    /// Trades applied to candles this session.
    pub tick_count: u64,
}

/// A candle together with the CVD at its close (or now, for the live one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleView {
    pub candle: FootprintCandle,
    pub cvd: Decimal,
}

/// A versioned, checksummed view of one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootprintSnapshot {
    /// Monotonic per pipeline.
    pub version: u64,
    pub instrument: InstrumentId,
    /// Changes when the pipeline restarts.
    pub session_id: SessionId,
    pub interval_secs: u64,
    /// Oldest first; the last entry is the live candle when one is open.
    pub candles: Vec<CandleView>,
    pub tape: TapeState,
    /// Session cumulative delta.
    pub cvd: Decimal,
    pub divergence: Divergence,
    /// SHA-256 over the market content (not version or session).
    pub checksum: String,
}

impl FootprintSnapshot {
    pub fn live(&self) -> Option<&FootprintCandle> {
        self.candles
            .last()
            .map(|view| &view.candle)
            .filter(|candle| !candle.closed)
    }
}

/// Pair the last `depth` candles with their CVD points.
///
/// `candles` and `series` must cover the same windows in the same order.
pub fn candle_views<'a, I>(candles: I, series: &[CvdPoint], depth: usize) -> Vec<CandleView>
where
    I: DoubleEndedIterator<Item = &'a FootprintCandle>,
{
    let mut views: Vec<CandleView> = candles
        .rev()
        .zip(series.iter().rev())
        .take(depth)
        .map(|(candle, point)| CandleView {
            candle: candle.clone(),
            cvd: point.cvd,
        })
        .collect();
    views.reverse();
    views
}

/// Builds versioned snapshots.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    version_counter: u64,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self { version_counter: 0 }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &mut self,
        instrument: &InstrumentId,
        session_id: SessionId,
        interval_secs: u64,
        candles: Vec<CandleView>,
        tape: &TapeState,
        cvd: Decimal,
        divergence: Divergence,
    ) -> FootprintSnapshot {
        self.version_counter += 1;
        let checksum = compute_checksum(&candles, tape, cvd, divergence);

        FootprintSnapshot {
            version: self.version_counter,
            instrument: instrument.clone(),
            session_id,
            interval_secs,
            candles,
            tape: tape.clone(),
            cvd,
            divergence,
            checksum,
        }
    }

    pub fn current_version(&self) -> u64 {
        self.version_counter
    }
}

/// SHA-256 over candles, tape and CVD, rendered as lowercase hex.
///
/// Decimals are hashed through their normalized string form so that equal
/// values hash equally regardless of scale.
pub fn compute_checksum(
    candles: &[CandleView],
    tape: &TapeState,
    cvd: Decimal,
    divergence: Divergence,
) -> String {
    let mut hasher = Sha256::new();

    for view in candles {
        let c = &view.candle;
        hasher.update(c.window_start.to_le_bytes());
        hasher.update(c.interval_secs.to_le_bytes());
        for price in [c.open, c.high, c.low, c.close] {
            hash_decimal(&mut hasher, price.as_decimal());
        }
        hash_decimal(&mut hasher, c.total_volume);
        hash_decimal(&mut hasher, c.total_delta);
        hasher.update(c.trade_count.to_le_bytes());
        hash_decimal(&mut hasher, view.cvd);

        for level in c.levels.iter() {
            hash_decimal(&mut hasher, level.price.as_decimal());
            hash_decimal(&mut hasher, level.bid_volume);
            hash_decimal(&mut hasher, level.ask_volume);
        }
        hasher.update(b"|");
        for (price, tag) in &c.imbalance {
            hash_decimal(&mut hasher, price.as_decimal());
            hasher.update(format!("{tag:?}").as_bytes());
        }
        if let Some(poc) = c.poc {
            hash_decimal(&mut hasher, poc.as_decimal());
        }
        if let Some(va) = &c.value_area {
            hash_decimal(&mut hasher, va.high.as_decimal());
            hash_decimal(&mut hasher, va.low.as_decimal());
        }
        hasher.update([u8::from(c.closed)]);
        hasher.update(b"---");
    }

    for price in [tape.last_price, tape.best_bid, tape.best_ask] {
        match price {
            Some(p) => hash_decimal(&mut hasher, p.as_decimal()),
            None => hasher.update(b"-"),
        }
    }
    hasher.update(tape.tick_count.to_le_bytes());
    hash_decimal(&mut hasher, cvd);
    hasher.update(format!("{divergence:?}").as_bytes());

    format!("{:x}", hasher.finalize())
}

fn hash_decimal(hasher: &mut Sha256, value: Decimal) {
    hasher.update(value.normalize().to_string().as_bytes());
    hasher.update(b":");
}

/// Verify that a snapshot's checksum matches its content.
pub fn verify_snapshot_integrity(snapshot: &FootprintSnapshot) -> bool {
    let expected = compute_checksum(
        &snapshot.candles,
        &snapshot.tape,
        snapshot.cvd,
        snapshot.divergence,
    );
    snapshot.checksum == expected
}
