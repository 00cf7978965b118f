//! Post-detection filter chain.
//!
//! Filters see a candidate `(symbol, series, record)` and answer keep/drop.
//! They can only remove matches. The chain evaluates enabled filters in
//! registration order and stops at the first rejection. A filter that errors
//! or panics rejects the candidate; the failure is logged with the symbol and
//! filter name and stays contained to that symbol.

pub mod macd;
pub mod price;
pub mod rsi;
pub mod volume;

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BarSeries, MatchRecord};
use crate::indicators::{Macd, Rsi};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("filter '{name}' is already registered")]
    DuplicateName { name: String },

    #[error("no filter named '{name}'")]
    UnknownFilter { name: String },

    #[error("filter evaluation failed: {0}")]
    Evaluation(String),
}

type Predicate =
    dyn Fn(&str, &BarSeries, &MatchRecord) -> Result<bool, FilterError> + Send + Sync;

/// User-supplied predicate.
#[derive(Clone)]
pub struct CustomFilter(Arc<Predicate>);

impl CustomFilter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &BarSeries, &MatchRecord) -> Result<bool, FilterError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for CustomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomFilter(..)")
    }
}

/// The filter catalog.
#[derive(Debug, Clone)]
pub enum Filter {
    MinDollarVolume { min: f64 },
    MinPrice { min: f64 },
    MacdHistogram { fast: usize, slow: usize, signal: usize },
    RsiRange {
        period: usize,
        min: Option<f64>,
        max: Option<f64>,
    },
    Custom(CustomFilter),
}

impl Filter {
    /// MACD 12/26/9.
    pub fn macd_default() -> Self {
        let m = Macd::default();
        Self::MacdHistogram {
            fast: m.fast,
            slow: m.slow,
            signal: m.signal,
        }
    }

    /// `true` keeps the candidate.
    pub fn evaluate(
        &self,
        symbol: &str,
        series: &BarSeries,
        record: &MatchRecord,
    ) -> Result<bool, FilterError> {
        match self {
            Self::MinDollarVolume { min } => Ok(volume::passes(*min, series, record)),
            Self::MinPrice { min } => Ok(price::passes(*min, record)),
            Self::MacdHistogram { fast, slow, signal } => {
                if *fast == 0 || *slow == 0 || *signal == 0 {
                    return Err(FilterError::Evaluation(
                        "MACD periods must be > 0".into(),
                    ));
                }
                let m = Macd {
                    fast: *fast,
                    slow: *slow,
                    signal: *signal,
                };
                Ok(macd::passes(&m, series))
            }
            Self::RsiRange { period, min, max } => {
                if *period == 0 {
                    return Err(FilterError::Evaluation("RSI period must be > 0".into()));
                }
                Ok(rsi::passes(&Rsi::new(*period), *min, *max, series))
            }
            Self::Custom(f) => (f.0)(symbol, series, record),
        }
    }
}

/// Outcome of running a candidate through the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterVerdict {
    Passed,
    /// Rejected by the named filter (including by error or panic).
    Rejected(String),
}

impl FilterVerdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    filter: Filter,
    enabled: bool,
}

/// Ordered, uniquely named filters. Registration order is evaluation order.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    entries: Vec<Entry>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        filter: Filter,
        enabled: bool,
    ) -> Result<(), FilterError> {
        let name = name.into();
        if self.entries.iter().any(|e| e.name == name) {
            return Err(FilterError::DuplicateName { name });
        }
        self.entries.push(Entry {
            name,
            filter,
            enabled,
        });
        Ok(())
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), FilterError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| FilterError::UnknownFilter {
                name: name.to_string(),
            })?;
        entry.enabled = enabled;
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.enabled)
    }

    /// Names in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn enabled_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn apply(&self, symbol: &str, series: &BarSeries, record: &MatchRecord) -> FilterVerdict {
        for entry in self.entries.iter().filter(|e| e.enabled) {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                entry.filter.evaluate(symbol, series, record)
            }));
            let keep = match outcome {
                Ok(Ok(keep)) => keep,
                Ok(Err(e)) => {
                    tracing::warn!(symbol, filter = %entry.name, error = %e, "filter failed");
                    false
                }
                Err(_) => {
                    tracing::error!(symbol, filter = %entry.name, "filter panicked");
                    false
                }
            };
            if !keep {
                tracing::debug!(symbol, filter = %entry.name, "filtered out");
                return FilterVerdict::Rejected(entry.name.clone());
            }
        }
        FilterVerdict::Passed
    }
}
