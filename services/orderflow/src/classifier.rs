//! Aggressor-side classification (Lee-Ready)
//!
//! Quote rule first: a print above the bid/ask midpoint was bought, below
//! it was sold. Prints at the midpoint, or without a usable quote, fall
//! back to the tick test against the previous trade price. An unchanged
//! price inherits the last classification.

use rust_decimal::Decimal;
use types::errors::{NumericError, PrintError};
use types::numeric::Price;
use types::trade::Side;

use crate::ingestion::Print;

/// Stateful classifier; carries only the last classification.
#[derive(Debug, Clone)]
pub struct TickClassifier {
    last_side: Option<Side>,
    tie_default: Side,
}

impl TickClassifier {
    /// `tie_default` is used for a tie before anything has been classified.
    pub fn new(tie_default: Side) -> Self {
        Self {
            last_side: None,
            tie_default,
        }
    }

    pub fn set_tie_default(&mut self, side: Side) {
        self.tie_default = side;
    }

    pub fn last_side(&self) -> Option<Side> {
        self.last_side
    }

    /// Classify `print` given the previous trade's price.
    ///
    /// A feed-supplied aggressor overrides the rules but still becomes the
    /// carried classification.
    pub fn classify(
        &mut self,
        print: &Print,
        previous_price: Option<Price>,
    ) -> Result<Side, PrintError> {
        if print.quantity.is_zero() {
            return Err(PrintError::InvalidQuantity {
                value: 0.0,
                source: NumericError::NonPositive(print.quantity.to_string()),
            });
        }

        let side = match print.aggressor {
            Some(side) => side,
            None => self.quote_rule(print).unwrap_or_else(|| self.tick_test(print.price, previous_price)),
        };
        self.last_side = Some(side);
        Ok(side)
    }

    /// `None` on a midpoint print or when the quote is missing or crossed.
    fn quote_rule(&self, print: &Print) -> Option<Side> {
        let (bid, ask) = (print.best_bid?, print.best_ask?);
        if bid > ask {
            return None;
        }
        let mid = Price::midpoint(bid, ask);
        let price: Decimal = print.price.into();
        if price > mid {
            Some(Side::Buy)
        } else if price < mid {
            Some(Side::Sell)
        } else {
            None
        }
    }

    fn tick_test(&self, price: Price, previous: Option<Price>) -> Side {
        match previous {
            Some(prev) if price > prev => Side::Buy,
            Some(prev) if price < prev => Side::Sell,
            _ => self.last_side.unwrap_or(self.tie_default),
        }
    }
}
