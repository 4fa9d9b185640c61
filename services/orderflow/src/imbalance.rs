//! Imbalance engine
//!
//! Flags price levels whose one-sided aggressive volume dwarfs the candle's
//! average on that side, then groups adjacent flagged levels into stacked
//! imbalances. Both passes are recomputed from scratch on every trade; a
//! candle holds at most a few hundred levels.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::numeric::Price;
use types::trade::Side;

use crate::levels::{PriceLevel, PriceLevelTable};

/// Classification of an imbalanced level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImbalanceTag {
    Buy,
    Sell,
    StackedBuy,
    StackedSell,
}

impl ImbalanceTag {
    pub fn side(&self) -> Side {
        match self {
            ImbalanceTag::Buy | ImbalanceTag::StackedBuy => Side::Buy,
            ImbalanceTag::Sell | ImbalanceTag::StackedSell => Side::Sell,
        }
    }

    pub fn is_stacked(&self) -> bool {
        matches!(self, ImbalanceTag::StackedBuy | ImbalanceTag::StackedSell)
    }

    fn stacked(side: Side) -> Self {
        match side {
            Side::Buy => ImbalanceTag::StackedBuy,
            Side::Sell => ImbalanceTag::StackedSell,
        }
    }
}

/// Price → tag for every imbalanced level of a candle.
pub type ImbalanceMap = BTreeMap<Price, ImbalanceTag>;

/// A run of adjacent levels sharing one imbalance side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackedRun {
    pub side: Side,
    pub top: Price,
    pub bottom: Price,
    pub levels: usize,
}

/// Tag levels whose one-sided volume is at least `ratio` times the candle's
/// mean on that side and that outweigh the opposite side.
///
/// An empty table yields an empty map.
pub fn detect_imbalance(levels: &PriceLevelTable, ratio: Decimal) -> ImbalanceMap {
    let mut tags = ImbalanceMap::new();
    if levels.is_empty() {
        return tags;
    }

    let count = Decimal::from(levels.len());
    let avg_bid = levels.iter().map(|l| l.bid_volume).sum::<Decimal>() / count;
    let avg_ask = levels.iter().map(|l| l.ask_volume).sum::<Decimal>() / count;
    // A threshold past Decimal's range is unreachable
    let bid_threshold = avg_bid.checked_mul(ratio).unwrap_or(Decimal::MAX);
    let ask_threshold = avg_ask.checked_mul(ratio).unwrap_or(Decimal::MAX);

    for level in levels.iter() {
        if level.bid_volume >= bid_threshold && level.bid_volume > level.ask_volume {
            tags.insert(level.price, ImbalanceTag::Buy);
        } else if level.ask_volume >= ask_threshold && level.ask_volume > level.bid_volume {
            tags.insert(level.price, ImbalanceTag::Sell);
        }
    }

    tags
}

/// Re-tag runs of `min_stack` adjacent same-side imbalances as stacked.
///
/// Levels are scanned from the highest price down. A level consumed by one
/// run is never reused, and scanning resumes right after the matched run.
/// Untagged levels break a run.
pub fn detect_stacked_imbalance(
    levels: &PriceLevelTable,
    tags: &mut ImbalanceMap,
    min_stack: usize,
) -> Vec<StackedRun> {
    let mut runs = Vec::new();
    if min_stack == 0 || tags.is_empty() {
        return runs;
    }

    let desc: Vec<&PriceLevel> = levels.iter_desc().collect();
    let mut i = 0;
    while i + min_stack <= desc.len() {
        let window = &desc[i..i + min_stack];
        let side = tags
            .get(&window[0].price)
            .filter(|tag| !tag.is_stacked())
            .map(ImbalanceTag::side);

        let matched = side.filter(|side| {
            window.iter().all(|level| {
                tags.get(&level.price)
                    .is_some_and(|tag| !tag.is_stacked() && tag.side() == *side)
            })
        });

        match matched {
            Some(side) => {
                for level in window {
                    tags.insert(level.price, ImbalanceTag::stacked(side));
                }
                runs.push(StackedRun {
                    side,
                    top: window[0].price,
                    bottom: window[min_stack - 1].price,
                    levels: min_stack,
                });
                i += min_stack;
            }
            None => i += 1,
        }
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::numeric::Quantity;

    fn table(levels: &[(u64, u64, u64)]) -> PriceLevelTable {
        let mut table = PriceLevelTable::new();
        for &(price, bid, ask) in levels {
            let level = table.level_mut(Price::from_u64(price));
            if bid > 0 {
                level.record(Side::Buy, Quantity::from_u64(bid));
            }
            if ask > 0 {
                level.record(Side::Sell, Quantity::from_u64(ask));
            }
        }
        table
    }

    #[test]
    fn test_boundary_arithmetic_not_flagged() {
        // avg_bid = 12 / 3 = 4, threshold = 12, level 100 has 10 < 12
        let levels = table(&[(99, 1, 1), (100, 10, 1), (101, 1, 1)]);
        let tags = detect_imbalance(&levels, Decimal::from(3));
        assert!(tags.is_empty());
    }

    #[test]
    fn test_boundary_arithmetic_flagged_at_lower_ratio() {
        // threshold = 4 * 2 = 8, level 100 has 10 >= 8
        let levels = table(&[(99, 1, 1), (100, 10, 1), (101, 1, 1)]);
        let tags = detect_imbalance(&levels, Decimal::from(2));
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[&Price::from_u64(100)], ImbalanceTag::Buy);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // avg_bid = (12 + 0 + 0) / 3 = 4, ratio 3 => threshold 12
        let levels = table(&[(99, 0, 1), (100, 12, 1), (101, 0, 1)]);
        let tags = detect_imbalance(&levels, Decimal::from(3));
        assert_eq!(tags[&Price::from_u64(100)], ImbalanceTag::Buy);
    }

    #[test]
    fn test_sell_imbalance() {
        let levels = table(&[(99, 1, 30), (100, 1, 1), (101, 1, 1), (102, 1, 1)]);
        let tags = detect_imbalance(&levels, Decimal::from(3));
        assert_eq!(tags[&Price::from_u64(99)], ImbalanceTag::Sell);
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_requires_dominance_over_opposite_side() {
        // Bid is 3x the average but not greater than the ask at that level
        let levels = table(&[(100, 9, 9)]);
        let tags = detect_imbalance(&levels, Decimal::ONE);
        assert!(tags.is_empty());
    }

    #[test]
    fn test_unreachable_ratio_no_signal() {
        let levels = table(&[(99, 1, 1), (100, 1_000_000, 1), (101, 1, 1)]);
        assert!(detect_imbalance(&levels, Decimal::MAX).is_empty());
    }

    #[test]
    fn test_empty_table_no_signal() {
        let levels = PriceLevelTable::new();
        assert!(detect_imbalance(&levels, Decimal::from(3)).is_empty());
    }

    #[test]
    fn test_stacked_run_of_two() {
        let levels = table(&[
            (104, 1, 1),
            (103, 20, 1),
            (102, 20, 1),
            (101, 1, 1),
            (100, 1, 1),
        ]);
        let mut tags = detect_imbalance(&levels, Decimal::from(2));
        let runs = detect_stacked_imbalance(&levels, &mut tags, 2);

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].side, Side::Buy);
        assert_eq!(runs[0].top, Price::from_u64(103));
        assert_eq!(runs[0].bottom, Price::from_u64(102));
        assert_eq!(tags[&Price::from_u64(103)], ImbalanceTag::StackedBuy);
        assert_eq!(tags[&Price::from_u64(102)], ImbalanceTag::StackedBuy);
    }

    #[test]
    fn test_stacked_runs_do_not_overlap() {
        // Three adjacent buy imbalances with min_stack 2: the top two form a
        // run, the third is left as a plain imbalance.
        let levels = table(&[
            (105, 1, 1),
            (104, 30, 1),
            (103, 30, 1),
            (102, 30, 1),
            (101, 1, 1),
            (100, 1, 1),
            (99, 1, 1),
            (98, 1, 1),
            (97, 1, 1),
            (96, 1, 1),
        ]);
        let mut tags = detect_imbalance(&levels, Decimal::from(2));
        assert_eq!(tags.len(), 3);

        let runs = detect_stacked_imbalance(&levels, &mut tags, 2);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].top, Price::from_u64(104));
        assert_eq!(runs[0].bottom, Price::from_u64(103));
        assert_eq!(tags[&Price::from_u64(102)], ImbalanceTag::Buy);
    }

    #[test]
    fn test_mixed_sides_break_runs() {
        let levels = table(&[
            (103, 40, 1),
            (102, 1, 40),
            (101, 1, 1),
            (100, 1, 1),
            (99, 1, 1),
            (98, 1, 1),
        ]);
        let mut tags = detect_imbalance(&levels, Decimal::from(2));
        assert_eq!(tags.len(), 2);

        let runs = detect_stacked_imbalance(&levels, &mut tags, 2);
        assert!(runs.is_empty());
        assert!(tags.values().all(|t| !t.is_stacked()));
    }
}
