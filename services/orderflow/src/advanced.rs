//! Advanced footprint signals: absorption and unfinished auctions
//!
//! Absorption: a level trades far more than the candle's average level yet
//! is not one of the candle's extremes, i.e. passive liquidity soaked up the
//! aggressive flow without letting price continue through it.
//!
//! Unfinished auction: the candle's top (bottom) traded level shows no
//! sell-side (buy-side) aggressive volume, so the auction never completed
//! at that extreme.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::numeric::Price;
use types::trade::Side;

use crate::levels::PriceLevelTable;

/// A level flagged as absorbing aggressive flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsorptionLevel {
    pub price: Price,
    pub volume: Decimal,
    /// `volume / mean level volume`
    pub volume_ratio: Decimal,
    /// Aggressor side that was absorbed; `None` when the level's delta is flat.
    pub absorbed_side: Option<Side>,
}

/// Unfinished-auction flags for a candle's two extremes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnfinishedAuction {
    pub at_high: bool,
    pub at_low: bool,
}

impl UnfinishedAuction {
    pub fn is_detected(&self) -> bool {
        self.at_high || self.at_low
    }
}

/// Find non-extreme levels whose volume is at least `multiplier` times the
/// mean level volume.
///
/// Returns levels in descending price order. Candles with fewer than three
/// levels have no interior level and never show absorption.
pub fn detect_absorption(levels: &PriceLevelTable, multiplier: Decimal) -> Vec<AbsorptionLevel> {
    let (Some(top), Some(bottom)) = (levels.highest(), levels.lowest()) else {
        return Vec::new();
    };
    if levels.len() < 3 {
        return Vec::new();
    }

    let mean = levels.total_volume() / Decimal::from(levels.len());
    if mean.is_zero() {
        return Vec::new();
    }
    let Some(threshold) = mean.checked_mul(multiplier) else {
        return Vec::new();
    };

    levels
        .iter_desc()
        .filter(|l| l.price != top.price && l.price != bottom.price)
        .filter(|l| l.total_volume() >= threshold)
        .map(|l| {
            let delta = l.delta();
            let absorbed_side = if delta > Decimal::ZERO {
                Some(Side::Buy)
            } else if delta < Decimal::ZERO {
                Some(Side::Sell)
            } else {
                None
            };
            AbsorptionLevel {
                price: l.price,
                volume: l.total_volume(),
                volume_ratio: (l.total_volume() / mean).round_dp(4),
                absorbed_side,
            }
        })
        .collect()
}

/// Check whether either extreme lacks opposing aggressive volume.
///
/// A single-level candle is checked at both ends against the same level.
pub fn detect_unfinished_auction(levels: &PriceLevelTable) -> UnfinishedAuction {
    let (Some(top), Some(bottom)) = (levels.highest(), levels.lowest()) else {
        return UnfinishedAuction::default();
    };

    UnfinishedAuction {
        at_high: top.ask_volume.is_zero(),
        at_low: bottom.bid_volume.is_zero(),
    }
}
