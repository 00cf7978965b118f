//! Deterministic random-walk bars for offline runs and demos.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{DataError, DataProvider, DataSource};
use crate::domain::{Bar, BarSeries};

/// Seeded per symbol (blake3 of the symbol name) and anchored to a fixed
/// start date, so any sub-range of one symbol's walk is always the same bars.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    anchor: NaiveDate,
    daily_range: f64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            anchor: NaiveDate::from_ymd_opt(2000, 1, 3).unwrap_or_default(),
            daily_range: 0.03,
        }
    }
}

impl SyntheticProvider {
    pub fn new(anchor: NaiveDate, daily_range: f64) -> Self {
        Self {
            anchor,
            daily_range: daily_range.abs(),
        }
    }

    /// Weekday bars from the anchor (or `start`, if earlier) through `end`.
    pub fn generate(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let mut bars = Vec::new();
        let mut price = 100.0_f64;
        let mut current = self.anchor.min(start);

        while current <= end {
            if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                current += chrono::Duration::days(1);
                continue;
            }

            let daily_return: f64 = if self.daily_range > 0.0 {
                rng.gen_range(-self.daily_range..self.daily_range)
            } else {
                0.0
            };
            let open = price;
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(500_000..5_000_000u64);

            if current >= start {
                bars.push(Bar {
                    date: current,
                    open,
                    high,
                    low,
                    close,
                    volume,
                });
            }

            price = close;
            current += chrono::Duration::days(1);
        }

        bars
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BarSeries, DataError> {
        BarSeries::new(symbol, self.generate(symbol, start, end))
    }
}
