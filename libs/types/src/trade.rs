//! Aggressor side and classified trade types

use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggressor side of a trade
///
/// `Buy` means the buyer lifted the offer; `Sell` means the seller hit the bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Resolve a loosely-typed feed tag ("buy", "B", "bid", "sell", "S", "ask").
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "buy" | "b" | "bid" => Some(Side::Buy),
            "sell" | "s" | "ask" | "offer" => Some(Side::Sell),
            _ => None,
        }
    }

    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

/// One classified trade
///
/// Created once the aggressor side is known; never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub price: Price,
    pub quantity: Quantity,
    pub side: Side,
    pub timestamp: i64, // Unix millis
}

impl Trade {
    pub fn new(price: Price, quantity: Quantity, side: Side, timestamp: i64) -> Self {
        Self {
            price,
            quantity,
            side,
            timestamp,
        }
    }

    /// Signed contribution of this trade to delta.
    pub fn signed_quantity(&self) -> Decimal {
        self.side.sign() * self.quantity.as_decimal()
    }
}
