//! Error types for the footprint engine
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Numeric conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),

    #[error("Value must not be negative: {0}")]
    Negative(String),

    #[error("Value must be strictly positive: {0}")]
    NonPositive(String),

    #[error("Value is not finite")]
    NonFinite,

    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

/// Invalid raw prints, rejected before they reach the aggregator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrintError {
    #[error("Invalid price {value}: {source}")]
    InvalidPrice { value: f64, source: NumericError },

    #[error("Invalid quantity {value}: {source}")]
    InvalidQuantity { value: f64, source: NumericError },

    #[error("Unknown aggressor tag: {0}")]
    UnknownAggressor(String),

    #[error("Timestamp {0} is outside the representable calendar range")]
    InvalidTimestamp(i64),
}

/// Inconsistent configuration, rejected at configuration time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Window interval must be positive")]
    NonPositiveInterval,

    #[error("{name} must be strictly positive, got {value}")]
    NonPositiveParameter { name: &'static str, value: String },

    #[error("Value area fraction must be in (0, 1], got {0}")]
    FractionOutOfRange(String),

    #[error("Stack minimum must be at least 1")]
    StackMinTooSmall,

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Malformed config: {0}")]
    Malformed(String),
}
