//! Epoch-millisecond timestamp helpers
//!
//! Timestamps travel through the pipeline as Unix milliseconds (`i64`);
//! these helpers convert them for logs and snapshots.

use chrono::{DateTime, TimeZone, Utc};

pub const MILLIS_PER_SECOND: i64 = 1_000;

/// Convert Unix milliseconds to a UTC datetime, if representable.
pub fn to_datetime(timestamp_ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(timestamp_ms).single()
}

/// Render Unix milliseconds as RFC 3339, falling back to the raw number.
pub fn format_millis(timestamp_ms: i64) -> String {
    to_datetime(timestamp_ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| timestamp_ms.to_string())
}
