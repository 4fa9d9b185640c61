//! Synthetic print feed
//!
//! Seeded random-walk generator for demos, benches and tests. The price
//! takes a Gaussian step per print and is snapped to the tick grid; the
//! quote straddles it symmetrically.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::ingestion::RawPrint;

/// Configuration for the synthetic feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub start_price: f64,
    /// Standard deviation of one price step.
    pub volatility: f64,
    pub tick_size: f64,
    /// Distance from the print to each side of the quote.
    pub half_spread: f64,
    pub min_quantity: u32,
    pub max_quantity: u32,
    /// Unix millis of the first print.
    pub start_timestamp: i64,
    pub step_millis: i64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            start_price: 22_500.0,
            volatility: 5.0,
            tick_size: 0.05,
            half_spread: 0.5,
            min_quantity: 50,
            max_quantity: 500,
            start_timestamp: 1_700_000_000_000,
            step_millis: 300,
        }
    }
}

/// Endless, deterministic stream of raw prints.
pub struct SyntheticFeed {
    config: SyntheticConfig,
    rng: ChaCha8Rng,
    price: f64,
    timestamp: i64,
    emitted: u64,
}

impl SyntheticFeed {
    pub fn new(config: SyntheticConfig, seed: u64) -> Self {
        Self {
            price: config.start_price,
            timestamp: config.start_timestamp,
            rng: ChaCha8Rng::seed_from_u64(seed),
            config,
            emitted: 0,
        }
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Standard normal sample (Box-Muller).
    fn gaussian(&mut self) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn snap(&self, value: f64) -> f64 {
        let steps = (value / self.config.tick_size).round();
        // Round off float noise from the multiplication
        (steps * self.config.tick_size * 1e8).round() / 1e8
    }

    pub fn next_print(&mut self) -> RawPrint {
        let step = self.gaussian() * self.config.volatility;
        let floor = self.config.tick_size.max(self.config.half_spread + self.config.tick_size);
        self.price = self.snap((self.price + step).max(floor));

        let quantity = self
            .rng
            .gen_range(self.config.min_quantity..=self.config.max_quantity.max(self.config.min_quantity));
        let print = RawPrint::new(self.price, f64::from(quantity), self.timestamp).with_quote(
            self.price - self.config.half_spread,
            self.price + self.config.half_spread,
        );

        self.timestamp += self.config.step_millis;
        self.emitted += 1;
        print
    }
}

impl Iterator for SyntheticFeed {
    type Item = RawPrint;

    fn next(&mut self) -> Option<RawPrint> {
        Some(self.next_print())
    }
}
