//! Identifier types for instruments and pipeline sessions
//!
//! Session IDs use UUID v7 so that restarts of a pipeline are ordered in
//! time and consumers can tell a fresh session from a continued one.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for one pipeline session
///
/// A new session ID is minted every time a pipeline is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new SessionId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instrument identifier (e.g. "NIFTY25MARFUT", "BTCUSDT")
///
/// Symbols are trimmed and upper-cased so that "nifty" and "NIFTY " name the
/// same instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentId(String);

impl InstrumentId {
    /// Create a new InstrumentId from a symbol
    ///
    /// # Panics
    /// Panics if the symbol is blank
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::try_new(symbol).expect("InstrumentId must not be blank")
    }

    /// Try to create an InstrumentId, returning None if blank
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into().trim().to_uppercase();
        if s.is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl TryFrom<String> for InstrumentId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(value).ok_or_else(|| "instrument symbol must not be blank".to_string())
    }
}

impl From<InstrumentId> for String {
    fn from(id: InstrumentId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_creation() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2, "SessionIds should be unique");
    }

    #[test]
    fn test_session_ids_are_time_ordered() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert!(id1 < id2);
    }

    #[test]
    fn test_instrument_id_normalization() {
        let id = InstrumentId::new("  nifty25marfut ");
        assert_eq!(id.as_str(), "NIFTY25MARFUT");
        assert_eq!(id, InstrumentId::from("NIFTY25MARFUT"));
    }

    #[test]
    fn test_instrument_id_try_new() {
        assert!(InstrumentId::try_new("BANKNIFTY").is_some());
        assert!(InstrumentId::try_new("   ").is_none());
    }

    #[test]
    #[should_panic(expected = "InstrumentId must not be blank")]
    fn test_instrument_id_blank() {
        InstrumentId::new("");
    }

    #[test]
    fn test_instrument_id_serialization() {
        let id = InstrumentId::new("btcusdt");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"BTCUSDT\"");

        let deserialized: InstrumentId = serde_json::from_str("\"btcusdt\"").unwrap();
        assert_eq!(id, deserialized);

        assert!(serde_json::from_str::<InstrumentId>("\"\"").is_err());
    }
}
