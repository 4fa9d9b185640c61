//! Point-of-control and value-area engine
//!
//! Both computations are deterministic under ties (lowest price wins) so
//! that replays of the same prints reproduce the same profile.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::numeric::Price;

use crate::levels::{PriceLevel, PriceLevelTable};

/// Contiguous price band holding the target share of a candle's volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueArea {
    pub high: Price,
    pub low: Price,
    /// Volume inside the band.
    pub volume: Decimal,
}

impl ValueArea {
    pub fn contains(&self, price: Price) -> bool {
        self.low <= price && price <= self.high
    }
}

/// Price with the greatest total volume; ties resolve to the lowest price.
pub fn compute_poc(levels: &PriceLevelTable) -> Option<Price> {
    let mut best: Option<&PriceLevel> = None;
    // Ascending scan, replacing only on strictly greater volume.
    for level in levels.iter() {
        match best {
            Some(b) if level.total_volume() <= b.total_volume() => {}
            _ => best = Some(level),
        }
    }
    best.map(|l| l.price)
}

/// Grow a band outwards from the POC until it holds at least
/// `fraction × total_volume`.
///
/// At each step the neighbour (next level above or below the band) with the
/// larger volume is added; equal volumes add the lower level first.
pub fn compute_value_area(
    levels: &PriceLevelTable,
    total_volume: Decimal,
    fraction: Decimal,
) -> Option<ValueArea> {
    let poc = compute_poc(levels)?;
    let ladder = levels.to_vec();
    let poc_idx = ladder.iter().position(|l| l.price == poc)?;

    let target = total_volume * fraction;
    let mut lo = poc_idx;
    let mut hi = poc_idx;
    let mut volume = ladder[poc_idx].total_volume();

    while volume < target {
        let below = lo.checked_sub(1).map(|i| ladder[i].total_volume());
        let above = ladder.get(hi + 1).map(|l| l.total_volume());

        match (below, above) {
            (Some(b), Some(a)) if b >= a => {
                lo -= 1;
                volume += b;
            }
            (_, Some(a)) => {
                hi += 1;
                volume += a;
            }
            (Some(b), None) => {
                lo -= 1;
                volume += b;
            }
            (None, None) => break,
        }
    }

    Some(ValueArea {
        high: ladder[hi].price,
        low: ladder[lo].price,
        volume,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::numeric::Quantity;
    use types::trade::Side;

    fn table(levels: &[(u64, u64)]) -> PriceLevelTable {
        let mut table = PriceLevelTable::new();
        for &(price, volume) in levels {
            table.record(Price::from_u64(price), Side::Buy, Quantity::from_u64(volume));
        }
        table
    }

    #[test]
    fn test_poc_max_volume() {
        let levels = table(&[(99, 5), (100, 40), (101, 10)]);
        assert_eq!(compute_poc(&levels), Some(Price::from_u64(100)));
    }

    #[test]
    fn test_poc_tie_breaks_to_lowest_price() {
        let levels = table(&[(99, 10), (100, 40), (101, 40), (102, 5)]);
        assert_eq!(compute_poc(&levels), Some(Price::from_u64(100)));
    }

    #[test]
    fn test_poc_empty() {
        assert_eq!(compute_poc(&PriceLevelTable::new()), None);
        assert_eq!(
            compute_value_area(&PriceLevelTable::new(), Decimal::ZERO, Decimal::new(70, 2)),
            None
        );
    }

    #[test]
    fn test_value_area_single_level() {
        let levels = table(&[(100, 7)]);
        let va = compute_value_area(&levels, Decimal::from(7), Decimal::new(70, 2)).unwrap();
        assert_eq!(va.high, Price::from_u64(100));
        assert_eq!(va.low, Price::from_u64(100));
        assert_eq!(va.volume, Decimal::from(7));
    }

    #[test]
    fn test_value_area_expands_toward_heavier_side() {
        // total = 100, target = 70
        let levels = table(&[(98, 5), (99, 10), (100, 40), (101, 25), (102, 20)]);
        let va = compute_value_area(&levels, Decimal::from(100), Decimal::new(70, 2)).unwrap();
        // 40 -> +25 (101) = 65 -> +20 (102, beats 10) = 85
        assert_eq!(va.low, Price::from_u64(100));
        assert_eq!(va.high, Price::from_u64(102));
        assert_eq!(va.volume, Decimal::from(85));
    }

    #[test]
    fn test_value_area_tie_adds_lower_level() {
        let levels = table(&[(99, 10), (100, 20), (101, 10)]);
        let va = compute_value_area(&levels, Decimal::from(40), Decimal::new(70, 2)).unwrap();
        // target 28: 20 -> +10 (99, tie goes low) = 30
        assert_eq!(va.low, Price::from_u64(99));
        assert_eq!(va.high, Price::from_u64(100));
    }

    #[test]
    fn test_value_area_runs_off_one_edge() {
        let levels = table(&[(100, 50), (101, 30), (102, 20)]);
        let va = compute_value_area(&levels, Decimal::from(100), Decimal::ONE).unwrap();
        assert_eq!(va.low, Price::from_u64(100));
        assert_eq!(va.high, Price::from_u64(102));
        assert_eq!(va.volume, Decimal::from(100));
    }

    #[test]
    fn test_value_area_contains() {
        let va = ValueArea {
            high: Price::from_u64(102),
            low: Price::from_u64(100),
            volume: Decimal::from(10),
        };
        assert!(va.contains(Price::from_u64(101)));
        assert!(!va.contains(Price::from_u64(103)));
    }
}
