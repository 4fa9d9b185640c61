//! Order-Flow Footprint Engine
//!
//! Consumes a stream of trade prints per instrument and produces:
//! - Aggressor-side classification (Lee-Ready quote rule, tick-test fallback)
//! - Epoch-aligned footprint candles with per-price bid/ask volume
//! - Imbalance and stacked-imbalance tags
//! - Point of control and value area
//! - Absorption and unfinished-auction signals
//! - Cumulative volume delta with price/CVD divergence
//!
//! Every print is processed sequentially by a single owner per instrument,
//! and all price and volume arithmetic is `Decimal`, so replaying the same
//! prints always reproduces the same state checksum.
//!
//! # Architecture
//!
//! ```text
//!        Raw prints
//!            │
//!      ┌─────▼─────┐
//!      │ Ingestion │  ← validates, resolves tags, snaps to tick grid
//!      └─────┬─────┘
//!      ┌─────▼──────┐
//!      │ Classifier │  ← Lee-Ready side
//!      └─────┬──────┘
//!      ┌─────▼──────┐
//!      │ Aggregator │  ← window routing, close on roll
//!      └─────┬──────┘
//!      ┌─────▼──────┐
//!      │ Footprint  │  ← OHLC, totals, price levels
//!      └─────┬──────┘
//!   ┌────────┼─────────┬──────────┐
//! ┌─▼───────┐┌▼───────┐┌▼───────┐┌─▼──────┐
//! │Imbalance││Profile ││Advanced││CVD     │
//! └─┬───────┘└┬───────┘└┬───────┘└─┬──────┘
//!   └─────────┴────┬────┴──────────┘
//!           ┌──────▼──────┐
//!           │  Snapshot   │  → broadcast (service)
//!           └─────────────┘
//! ```

pub mod advanced;
pub mod candles;
pub mod classifier;
pub mod config;
pub mod delta;
pub mod footprint;
pub mod imbalance;
pub mod ingestion;
pub mod levels;
pub mod metrics;
pub mod pipeline;
pub mod profile;
pub mod replay;
pub mod service;
pub mod snapshot;
pub mod synthetic;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";

pub use config::{ConfigUpdate, FootprintConfig};
pub use pipeline::{FootprintPipeline, PipelineError, ProcessOutcome};
pub use service::{FootprintService, ServiceConfig, ServiceError};
