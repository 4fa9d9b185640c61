//! Fixed-point decimal types for prices and quantities
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Values are normalized on construction so that `100.50` and `100.5` hash,
//! order and print identically when used as price-level keys.

use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::NumericError;

/// Largest price or quantity accepted from a float feed.
///
/// Keeps per-candle sums and signal thresholds far inside `Decimal`'s range.
pub const MAX_MAGNITUDE: i64 = 1_000_000_000_000;

/// Finite float to `Decimal`, capped at `MAX_MAGNITUDE`.
fn bounded_decimal(value: f64) -> Result<Decimal, NumericError> {
    if !value.is_finite() {
        return Err(NumericError::NonFinite);
    }
    let dec = Decimal::from_f64(value).ok_or_else(|| NumericError::InvalidDecimal(value.to_string()))?;
    if dec.abs() > Decimal::from(MAX_MAGNITUDE) {
        return Err(NumericError::OutOfRange(dec.to_string()));
    }
    Ok(dec)
}

/// A strictly positive price on the instrument's tick grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Create a price from a decimal.
    ///
    /// # Panics
    /// Panics if the value is not strictly positive
    pub fn new(value: Decimal) -> Self {
        Self::try_new(value).expect("Price must be strictly positive")
    }

    /// Try to create a price, returning None if not strictly positive
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value.normalize()))
        } else {
            None
        }
    }

    /// Convert a finite, positive float no larger than `MAX_MAGNITUDE`.
    pub fn from_f64(value: f64) -> Result<Self, NumericError> {
        let dec = bounded_decimal(value)?;
        Self::try_new(dec).ok_or_else(|| NumericError::NonPositive(dec.to_string()))
    }

    pub fn from_u64(value: u64) -> Self {
        Self::new(Decimal::from(value))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Midpoint between two prices (not snapped to any grid).
    pub fn midpoint(a: Price, b: Price) -> Decimal {
        // Both sides are positive, so neither step can leave Decimal's range
        a.0 + (b.0 - a.0) / Decimal::TWO
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dec = Decimal::from_str(s).map_err(|_| NumericError::InvalidDecimal(s.to_string()))?;
        Self::try_new(dec).ok_or_else(|| NumericError::NonPositive(s.to_string()))
    }
}

impl TryFrom<Decimal> for Price {
    type Error = NumericError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::try_new(value).ok_or_else(|| NumericError::NonPositive(value.to_string()))
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

/// A non-negative traded quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    /// Try to create a quantity, returning None if negative
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value.normalize()))
        } else {
            None
        }
    }

    /// Convert a finite, strictly positive float no larger than
    /// `MAX_MAGNITUDE` into a trade quantity.
    pub fn from_f64(value: f64) -> Result<Self, NumericError> {
        let dec = bounded_decimal(value)?;
        if dec <= Decimal::ZERO {
            return Err(NumericError::NonPositive(dec.to_string()));
        }
        Ok(Self(dec.normalize()))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity((self.0 + rhs.0).normalize())
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        *self = *self + rhs;
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Quantity {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dec = Decimal::from_str(s).map_err(|_| NumericError::InvalidDecimal(s.to_string()))?;
        Self::try_new(dec).ok_or_else(|| NumericError::Negative(s.to_string()))
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = NumericError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::try_new(value).ok_or_else(|| NumericError::Negative(value.to_string()))
    }
}

impl From<Quantity> for Decimal {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_price_normalization() {
        let a = Price::from_str("100.50").unwrap();
        let b = Price::from_str("100.5").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "100.5");
    }

    #[test]
    fn test_price_rejects_non_positive() {
        assert!(Price::try_new(Decimal::ZERO).is_none());
        assert!(Price::try_new(Decimal::from(-1)).is_none());
        assert_eq!(
            Price::from_str("0"),
            Err(NumericError::NonPositive("0".to_string()))
        );
    }

    #[test]
    fn test_price_from_f64() {
        assert_eq!(Price::from_f64(100.05).unwrap(), Price::from_str("100.05").unwrap());
        assert_eq!(Price::from_f64(f64::NAN), Err(NumericError::NonFinite));
        assert_eq!(Price::from_f64(f64::INFINITY), Err(NumericError::NonFinite));
        assert!(Price::from_f64(-3.0).is_err());
    }

    #[test]
    fn test_midpoint() {
        let mid = Price::midpoint(Price::from_u64(100), Price::from_str("100.1").unwrap());
        assert_eq!(mid, Decimal::from_str("100.05").unwrap());
    }

    #[test]
    fn test_quantity_from_f64() {
        assert_eq!(Quantity::from_f64(10.0).unwrap(), Quantity::from_u64(10));
        assert!(Quantity::from_f64(0.0).is_err());
        assert!(Quantity::from_f64(-1.0).is_err());
        assert_eq!(Quantity::from_f64(f64::NAN), Err(NumericError::NonFinite));
    }

    #[test]
    fn test_from_f64_rejects_out_of_range() {
        assert!(matches!(Quantity::from_f64(5e28), Err(NumericError::OutOfRange(_))));
        assert!(matches!(Price::from_f64(1e13), Err(NumericError::OutOfRange(_))));
        assert!(Quantity::from_f64(MAX_MAGNITUDE as f64).is_ok());
    }

    #[test]
    fn test_midpoint_near_decimal_max() {
        let top = Price::new(Decimal::MAX);
        assert_eq!(Price::midpoint(top, top), Decimal::MAX);
        assert!(Price::midpoint(Price::from_u64(1), top) > Decimal::ONE);
    }

    #[test]
    fn test_quantity_addition() {
        let mut q = Quantity::zero();
        q += Quantity::from_str("1.5").unwrap();
        q += Quantity::from_str("2.5").unwrap();
        assert_eq!(q, Quantity::from_u64(4));
    }

    #[test]
    fn test_price_serialization() {
        let price = Price::from_str("22500.05").unwrap();
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"22500.05\"");
        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(price, back);

        assert!(serde_json::from_str::<Price>("\"-1\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_price_ordering_matches_decimal(a in 1u64..1_000_000, b in 1u64..1_000_000) {
            let pa = Price::from_u64(a);
            let pb = Price::from_u64(b);
            prop_assert_eq!(pa.cmp(&pb), a.cmp(&b));
        }
    }
}
