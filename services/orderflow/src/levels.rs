//! Price level table for a single footprint candle
//!
//! Maps each traded price to the aggressive volume printed there. Levels are
//! created lazily on the first trade at a price and live as long as their
//! owning candle. A `BTreeMap` keeps them in price order, so the engines can
//! walk the table upwards or downwards.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::numeric::{Price, Quantity};
use types::trade::Side;

/// Aggressive volume traded at one price inside one candle.
///
/// `bid_volume` accumulates buy-aggressor volume and `ask_volume`
/// sell-aggressor volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub bid_volume: Decimal,
    pub ask_volume: Decimal,
}

impl PriceLevel {
    pub fn new(price: Price) -> Self {
        Self {
            price,
            bid_volume: Decimal::ZERO,
            ask_volume: Decimal::ZERO,
        }
    }

    /// Add aggressive volume on the given side.
    pub fn record(&mut self, side: Side, quantity: Quantity) {
        match side {
            Side::Buy => self.bid_volume += quantity.as_decimal(),
            Side::Sell => self.ask_volume += quantity.as_decimal(),
        }
    }

    pub fn total_volume(&self) -> Decimal {
        self.bid_volume + self.ask_volume
    }

    /// Buy volume minus sell volume.
    pub fn delta(&self) -> Decimal {
        self.bid_volume - self.ask_volume
    }

    /// Volume traded by the given aggressor side.
    pub fn volume_for(&self, side: Side) -> Decimal {
        match side {
            Side::Buy => self.bid_volume,
            Side::Sell => self.ask_volume,
        }
    }
}

/// Price-ordered collection of levels (unique by price).
///
/// Serialized as a list of levels in descending price order, the way a
/// footprint ladder is read top-down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PriceLevel>", into = "Vec<PriceLevel>")]
pub struct PriceLevelTable {
    levels: BTreeMap<Price, PriceLevel>,
}

impl PriceLevelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate the level at `price`, creating it on first touch.
    pub fn level_mut(&mut self, price: Price) -> &mut PriceLevel {
        self.levels
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
    }

    /// Record a trade's volume at its price.
    pub fn record(&mut self, price: Price, side: Side, quantity: Quantity) {
        self.level_mut(price).record(side, quantity);
    }

    pub fn get(&self, price: &Price) -> Option<&PriceLevel> {
        self.levels.get(price)
    }

    /// Levels in ascending price order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PriceLevel> + ExactSizeIterator {
        self.levels.values()
    }

    /// Levels in descending price order.
    pub fn iter_desc(&self) -> impl Iterator<Item = &PriceLevel> {
        self.levels.values().rev()
    }

    /// Levels in ascending price order, collected for index-based scans.
    pub fn to_vec(&self) -> Vec<&PriceLevel> {
        self.levels.values().collect()
    }

    /// Topmost traded level.
    pub fn highest(&self) -> Option<&PriceLevel> {
        self.levels.values().next_back()
    }

    /// Bottommost traded level.
    pub fn lowest(&self) -> Option<&PriceLevel> {
        self.levels.values().next()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Sum of total volume across all levels.
    pub fn total_volume(&self) -> Decimal {
        self.levels.values().map(PriceLevel::total_volume).sum()
    }

    /// Sum of delta across all levels.
    pub fn total_delta(&self) -> Decimal {
        self.levels.values().map(PriceLevel::delta).sum()
    }
}

impl From<Vec<PriceLevel>> for PriceLevelTable {
    fn from(levels: Vec<PriceLevel>) -> Self {
        let mut table = PriceLevelTable::new();
        for level in levels {
            let entry = table.level_mut(level.price);
            entry.bid_volume += level.bid_volume;
            entry.ask_volume += level.ask_volume;
        }
        table
    }
}

impl From<PriceLevelTable> for Vec<PriceLevel> {
    fn from(table: PriceLevelTable) -> Self {
        table.levels.into_values().rev().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn px(s: &str) -> Price {
        Price::from_str(s).unwrap()
    }

    #[test]
    fn test_level_lazily_created() {
        let mut table = PriceLevelTable::new();
        assert!(table.is_empty());

        table.record(px("100"), Side::Buy, Quantity::from_u64(10));
        assert_eq!(table.len(), 1);

        let level = table.get(&px("100")).unwrap();
        assert_eq!(level.bid_volume, Decimal::from(10));
        assert_eq!(level.ask_volume, Decimal::ZERO);
    }

    #[test]
    fn test_level_derived_values() {
        let mut level = PriceLevel::new(px("100"));
        level.record(Side::Buy, Quantity::from_u64(7));
        level.record(Side::Sell, Quantity::from_u64(3));

        assert_eq!(level.total_volume(), Decimal::from(10));
        assert_eq!(level.delta(), Decimal::from(4));
        assert_eq!(level.volume_for(Side::Sell), Decimal::from(3));
    }

    #[test]
    fn test_same_price_accumulates() {
        let mut table = PriceLevelTable::new();
        table.record(px("100.0"), Side::Buy, Quantity::from_u64(10));
        table.record(px("100"), Side::Buy, Quantity::from_u64(20));

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&px("100")).unwrap().bid_volume, Decimal::from(30));
    }

    #[test]
    fn test_ordering_and_extremes() {
        let mut table = PriceLevelTable::new();
        table.record(px("100.05"), Side::Sell, Quantity::from_u64(5));
        table.record(px("99.95"), Side::Buy, Quantity::from_u64(1));
        table.record(px("100"), Side::Buy, Quantity::from_u64(2));

        let asc: Vec<Price> = table.iter().map(|l| l.price).collect();
        assert_eq!(asc, vec![px("99.95"), px("100"), px("100.05")]);

        let desc: Vec<Price> = table.iter_desc().map(|l| l.price).collect();
        assert_eq!(desc, vec![px("100.05"), px("100"), px("99.95")]);

        assert_eq!(table.highest().unwrap().price, px("100.05"));
        assert_eq!(table.lowest().unwrap().price, px("99.95"));
    }

    #[test]
    fn test_totals() {
        let mut table = PriceLevelTable::new();
        table.record(px("100"), Side::Buy, Quantity::from_u64(30));
        table.record(px("100.05"), Side::Sell, Quantity::from_u64(5));

        assert_eq!(table.total_volume(), Decimal::from(35));
        assert_eq!(table.total_delta(), Decimal::from(25));
    }

    #[test]
    fn test_serializes_top_down() {
        let mut table = PriceLevelTable::new();
        table.record(px("100"), Side::Buy, Quantity::from_u64(1));
        table.record(px("101"), Side::Sell, Quantity::from_u64(2));

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json[0]["price"], "101");
        assert_eq!(json[1]["price"], "100");

        let back: PriceLevelTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }
}
