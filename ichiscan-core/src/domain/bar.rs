//! Bar and BarSeries: the fundamental market data units.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::provider::DataError;

/// OHLCV bar for a single symbol on a single day.
///
/// Prices are split/dividend adjusted by the provider before they reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN or infinite (void bar).
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// Close × volume, the liquidity proxy used by the dollar-volume filter.
    pub fn dollar_volume(&self) -> f64 {
        self.close * self.volume as f64
    }
}

/// Daily bars for one symbol, ordered by date.
///
/// Construction enforces the series contract: non-empty, dates strictly
/// increasing, every OHLC value finite. A series is never mutated after it
/// has been fetched for a scan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, DataError> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(DataError::Empty { symbol });
        }
        if let Some(bar) = bars.iter().find(|b| b.is_void()) {
            return Err(DataError::Malformed {
                symbol,
                reason: format!("non-finite OHLC on {}", bar.date),
            });
        }
        if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(DataError::Malformed {
                symbol,
                reason: format!(
                    "dates not strictly increasing: {} followed by {}",
                    pair[0].date, pair[1].date
                ),
            });
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Restrict the series to bars dated within `[start, end]`.
    ///
    /// Returns `None` when no bar falls inside the range.
    pub fn slice_range(&self, start: NaiveDate, end: NaiveDate) -> Option<BarSeries> {
        let bars: Vec<Bar> = self
            .bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .copied()
            .collect();
        if bars.is_empty() {
            return None;
        }
        Some(Self {
            symbol: self.symbol.clone(),
            bars,
        })
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}
