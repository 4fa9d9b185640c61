//! Footprint updater
//!
//! Applies one classified trade to a candle, then recomputes the derived
//! signals from the candle's level table. Pure mutation; no I/O.

use rust_decimal::Decimal;
use types::trade::Trade;

use crate::advanced::{detect_absorption, detect_unfinished_auction};
use crate::candles::FootprintCandle;
use crate::config::FootprintConfig;
use crate::imbalance::{detect_imbalance, detect_stacked_imbalance};
use crate::profile::{compute_poc, compute_value_area};

/// Fold `trade` into the candle's OHLC, totals and level table.
pub fn apply(candle: &mut FootprintCandle, trade: &Trade) {
    candle.levels.record(trade.price, trade.side, trade.quantity);

    if trade.price > candle.high {
        candle.high = trade.price;
    }
    if trade.price < candle.low {
        candle.low = trade.price;
    }
    candle.close = trade.price;
    candle.total_volume += trade.quantity.as_decimal();
    candle.total_delta += trade.signed_quantity();
    candle.trade_count += 1;
}

/// Recompute every derived signal of the candle from scratch.
pub fn refresh_signals(candle: &mut FootprintCandle, config: &FootprintConfig) {
    let mut imbalance = detect_imbalance(&candle.levels, config.imbalance_ratio);
    candle.stacked_imbalances =
        detect_stacked_imbalance(&candle.levels, &mut imbalance, config.stack_min);
    candle.imbalance = imbalance;

    candle.poc = compute_poc(&candle.levels);
    candle.value_area = if candle.total_volume > Decimal::ZERO {
        compute_value_area(&candle.levels, candle.total_volume, config.value_area_fraction)
    } else {
        None
    };

    candle.absorption = detect_absorption(&candle.levels, config.absorption_multiplier);
    candle.unfinished_auction = detect_unfinished_auction(&candle.levels);
}
