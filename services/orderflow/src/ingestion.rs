//! Print ingestion layer
//!
//! Validates raw feed prints at the boundary: a calendar-representable
//! timestamp, finite and strictly positive price and quantity capped at
//! `types::numeric::MAX_MAGNITUDE`, loose aggressor tags resolved to a
//! `Side`, and (optionally) prices snapped to the instrument's tick grid.
//! Rejected prints are logged and counted, never forwarded.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use types::errors::{NumericError, PrintError};
use types::numeric::{Price, Quantity};
use types::time::to_datetime;
use types::trade::Side;

/// A trade print as it arrives from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPrint {
    pub price: f64,
    pub quantity: f64,
    #[serde(default)]
    pub best_bid: Option<f64>,
    #[serde(default)]
    pub best_ask: Option<f64>,
    /// Unix millis
    pub timestamp: i64,
    /// Aggressor tag supplied by the feed ("buy", "S", "ask", ...).
    #[serde(default)]
    pub aggressor: Option<String>,
}

impl RawPrint {
    pub fn new(price: f64, quantity: f64, timestamp: i64) -> Self {
        Self {
            price,
            quantity,
            best_bid: None,
            best_ask: None,
            timestamp,
            aggressor: None,
        }
    }

    pub fn with_quote(mut self, bid: f64, ask: f64) -> Self {
        self.best_bid = Some(bid);
        self.best_ask = Some(ask);
        self
    }

    pub fn with_aggressor(mut self, tag: impl Into<String>) -> Self {
        self.aggressor = Some(tag.into());
        self
    }
}

/// A validated print, ready for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Print {
    pub price: Price,
    pub quantity: Quantity,
    /// `None` when the feed sent no usable bid.
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub timestamp: i64,
    pub aggressor: Option<Side>,
}

/// Price grid prints are snapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickGrid {
    tick: Decimal,
}

impl TickGrid {
    /// `None` for a non-positive tick size.
    pub fn new(tick: Decimal) -> Option<Self> {
        (tick > Decimal::ZERO).then_some(Self { tick })
    }

    pub fn tick(&self) -> Decimal {
        self.tick
    }

    /// Nearest multiple of the tick; halves round away from zero.
    ///
    /// `None` when the tick count does not fit in a `Decimal`.
    pub fn snap(&self, value: Decimal) -> Option<Decimal> {
        let ticks = value
            .checked_div(self.tick)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Some(ticks.checked_mul(self.tick)?.normalize())
    }
}

/// Boundary validator for raw prints.
#[derive(Debug, Clone, Default)]
pub struct PrintValidator {
    grid: Option<TickGrid>,
    accepted: u64,
    rejected: u64,
}

impl PrintValidator {
    pub fn new(tick_size: Option<Decimal>) -> Self {
        Self {
            grid: tick_size.and_then(TickGrid::new),
            accepted: 0,
            rejected: 0,
        }
    }

    pub fn set_tick_size(&mut self, tick_size: Option<Decimal>) {
        self.grid = tick_size.and_then(TickGrid::new);
    }

    pub fn grid(&self) -> Option<TickGrid> {
        self.grid
    }

    /// Validate one raw print.
    pub fn validate(&mut self, raw: &RawPrint) -> Result<Print, PrintError> {
        match self.check(raw) {
            Ok(print) => {
                self.accepted += 1;
                debug!(
                    price = %print.price,
                    quantity = %print.quantity,
                    timestamp = print.timestamp,
                    "print accepted"
                );
                Ok(print)
            }
            Err(err) => {
                self.rejected += 1;
                warn!(error = %err, timestamp = raw.timestamp, "print rejected");
                Err(err)
            }
        }
    }

    fn check(&self, raw: &RawPrint) -> Result<Print, PrintError> {
        if to_datetime(raw.timestamp).is_none() {
            return Err(PrintError::InvalidTimestamp(raw.timestamp));
        }
        let price = self
            .price(raw.price)
            .map_err(|source| PrintError::InvalidPrice {
                value: raw.price,
                source,
            })?;
        let quantity = Quantity::from_f64(raw.quantity).map_err(|source| {
            PrintError::InvalidQuantity {
                value: raw.quantity,
                source,
            }
        })?;
        let aggressor = match raw.aggressor.as_deref() {
            Some(tag) => Some(
                Side::from_tag(tag).ok_or_else(|| PrintError::UnknownAggressor(tag.to_string()))?,
            ),
            None => None,
        };

        Ok(Print {
            price,
            quantity,
            best_bid: raw.best_bid.and_then(|q| self.quote(q)),
            best_ask: raw.best_ask.and_then(|q| self.quote(q)),
            timestamp: raw.timestamp,
            aggressor,
        })
    }

    fn price(&self, value: f64) -> Result<Price, NumericError> {
        match self.grid {
            None => Price::from_f64(value),
            Some(grid) => {
                let raw = Price::from_f64(value)?.as_decimal();
                let snapped = grid
                    .snap(raw)
                    .ok_or_else(|| NumericError::OutOfRange(raw.to_string()))?;
                Price::try_new(snapped).ok_or_else(|| NumericError::NonPositive(snapped.to_string()))
            }
        }
    }

    /// Quotes are best effort: a zero, negative or non-finite quote means
    /// "no quote" and classification falls back to the tick test.
    fn quote(&self, value: f64) -> Option<Price> {
        self.price(value).ok()
    }

    /// Prints that passed validation; a later stage may still drop them.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
