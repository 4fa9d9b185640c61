//! Pipeline configuration
//!
//! All parameters are injectable at construction and may be changed at
//! runtime through a [`ConfigUpdate`]. An update is validated as a whole
//! before it replaces the active configuration; a rejected update leaves
//! the previous configuration in effect.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use types::errors::ConfigError;
use types::trade::Side;

use crate::candles::WindowInterval;

/// Parameters of one footprint pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootprintConfig {
    /// Candle window length in seconds.
    pub interval_secs: u64,
    /// Multiple of the per-side average that marks a level imbalanced.
    pub imbalance_ratio: Decimal,
    /// Adjacent same-side imbalances needed for a stacked imbalance.
    pub stack_min: usize,
    /// Share of candle volume the value area must hold.
    pub value_area_fraction: Decimal,
    /// Multiple of the mean level volume that marks absorption.
    pub absorption_multiplier: Decimal,
    /// Side assumed for a midpoint print when nothing has been classified yet.
    pub tie_default_side: Side,
    /// Closed candles to retain; `None` keeps the whole session.
    pub history_limit: Option<usize>,
    /// Candles included in an egress snapshot (newest last).
    pub snapshot_depth: usize,
    /// Tick grid applied at ingestion; `None` trusts upstream snapping.
    pub tick_size: Option<Decimal>,
}

impl Default for FootprintConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            imbalance_ratio: Decimal::from(3),
            stack_min: 2,
            value_area_fraction: Decimal::new(70, 2),
            absorption_multiplier: Decimal::new(25, 1),
            tie_default_side: Side::Buy,
            history_limit: None,
            snapshot_depth: 50,
            tick_size: None,
        }
    }
}

impl FootprintConfig {
    /// Check every parameter, reporting the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        WindowInterval::try_new(self.interval_secs)?;
        positive("imbalance_ratio", self.imbalance_ratio)?;
        positive("absorption_multiplier", self.absorption_multiplier)?;
        if self.value_area_fraction <= Decimal::ZERO || self.value_area_fraction > Decimal::ONE {
            return Err(ConfigError::FractionOutOfRange(
                self.value_area_fraction.to_string(),
            ));
        }
        if self.stack_min < 1 {
            return Err(ConfigError::StackMinTooSmall);
        }
        if let Some(tick) = self.tick_size {
            positive("tick_size", tick)?;
        }
        Ok(())
    }

    /// Validated window interval.
    pub fn interval(&self) -> Result<WindowInterval, ConfigError> {
        WindowInterval::try_new(self.interval_secs)
    }

    /// Parse and validate a JSON document; missing keys take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: FootprintConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables on this configuration.
    ///
    /// Recognized keys: `CANDLE_SECONDS`, `IMBALANCE_RATIO`, `STACK_MIN`,
    /// `VALUE_AREA_FRACTION`, `ABSORPTION_MULTIPLIER`, `TICK_SIZE`.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary lookup (environment, test map, ...).
    pub fn with_vars<F>(self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let update = ConfigUpdate {
            interval_secs: parse_var(&lookup, "CANDLE_SECONDS")?,
            imbalance_ratio: parse_var(&lookup, "IMBALANCE_RATIO")?,
            stack_min: parse_var(&lookup, "STACK_MIN")?,
            value_area_fraction: parse_var(&lookup, "VALUE_AREA_FRACTION")?,
            absorption_multiplier: parse_var(&lookup, "ABSORPTION_MULTIPLIER")?,
            tick_size: parse_var::<Decimal, _>(&lookup, "TICK_SIZE")?.map(Some),
            ..ConfigUpdate::default()
        };
        self.apply(&update)
    }

    /// Build the configuration that results from `update`, validating it.
    ///
    /// `self` is untouched; callers swap the result in only on success.
    pub fn apply(&self, update: &ConfigUpdate) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        if let Some(v) = update.interval_secs {
            next.interval_secs = v;
        }
        if let Some(v) = update.imbalance_ratio {
            next.imbalance_ratio = v;
        }
        if let Some(v) = update.stack_min {
            next.stack_min = v;
        }
        if let Some(v) = update.value_area_fraction {
            next.value_area_fraction = v;
        }
        if let Some(v) = update.absorption_multiplier {
            next.absorption_multiplier = v;
        }
        if let Some(v) = update.tie_default_side {
            next.tie_default_side = v;
        }
        if let Some(v) = update.history_limit {
            next.history_limit = v;
        }
        if let Some(v) = update.snapshot_depth {
            next.snapshot_depth = v;
        }
        if let Some(v) = update.tick_size {
            next.tick_size = v;
        }

        match next.validate() {
            Ok(()) => {
                info!(?update, "configuration update accepted");
                Ok(next)
            }
            Err(err) => {
                warn!(error = %err, ?update, "configuration update rejected");
                Err(err)
            }
        }
    }
}

/// Partial configuration change; `None` fields keep their current value.
///
/// `history_limit` and `tick_size` are doubly optional so an update can
/// clear them (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub interval_secs: Option<u64>,
    pub imbalance_ratio: Option<Decimal>,
    pub stack_min: Option<usize>,
    pub value_area_fraction: Option<Decimal>,
    pub absorption_multiplier: Option<Decimal>,
    pub tie_default_side: Option<Side>,
    pub history_limit: Option<Option<usize>>,
    pub snapshot_depth: Option<usize>,
    pub tick_size: Option<Option<Decimal>>,
}

impl ConfigUpdate {
    pub fn interval(secs: u64) -> Self {
        Self {
            interval_secs: Some(secs),
            ..Self::default()
        }
    }
}

fn positive(name: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveParameter {
            name,
            value: value.to_string(),
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value: raw,
            }),
    }
}
