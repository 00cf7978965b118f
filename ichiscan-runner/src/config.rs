//! Scan configuration: a flat TOML table, validated before any fetch.
//!
//! ```toml
//! tenkan_period = 9
//! kijun_period = 26
//! senkou_period = 52
//! # senkou_shift defaults to kijun_period
//! lookback_not_above = 10
//! min_price = 5.0
//! min_avg_dollar_volume = 1_000_000.0
//! strict_cross = true
//! worker_count = 8
//! macd_filter = false
//! rsi_min = 40.0
//! rsi_max = 70.0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ichiscan_core::filters::{Filter, FilterChain, FilterError};
use ichiscan_core::params::{validate_floor, ParamsError, ScanParams};

/// RSI lookback used by the `rsi` filter.
pub const RSI_PERIOD: usize = 14;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse scan config TOML: {0}")]
    Parse(String),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error("worker_count must be > 0")]
    NoWorkers,

    #[error("{name} must be within [0, 100] (got {value})")]
    RsiOutOfRange { name: &'static str, value: f64 },

    #[error("rsi_min ({min}) must not exceed rsi_max ({max})")]
    RsiInverted { min: f64, max: f64 },

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Everything a scan run needs besides the symbol list and date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub tenkan_period: usize,
    pub kijun_period: usize,
    pub senkou_period: usize,
    /// `None` follows `kijun_period`.
    pub senkou_shift: Option<usize>,
    pub lookback_not_above: usize,
    pub min_price: f64,
    pub min_avg_dollar_volume: f64,
    pub strict_cross: bool,
    pub worker_count: usize,
    pub macd_filter: bool,
    pub rsi_min: Option<f64>,
    pub rsi_max: Option<f64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let p = ScanParams::default();
        Self {
            tenkan_period: p.tenkan_period,
            kijun_period: p.kijun_period,
            senkou_period: p.senkou_period,
            senkou_shift: None,
            lookback_not_above: p.lookback_not_above,
            min_price: p.min_price,
            min_avg_dollar_volume: 0.0,
            strict_cross: p.strict_cross,
            worker_count: 8,
            macd_filter: false,
            rsi_min: None,
            rsi_max: None,
        }
    }
}

impl ScanConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn senkou_shift(&self) -> usize {
        self.senkou_shift.unwrap_or(self.kijun_period)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector_params().validate()?;
        validate_floor("min_avg_dollar_volume", self.min_avg_dollar_volume)?;
        if self.worker_count == 0 {
            return Err(ConfigError::NoWorkers);
        }
        for (name, bound) in [("rsi_min", self.rsi_min), ("rsi_max", self.rsi_max)] {
            if let Some(value) = bound {
                if !(0.0..=100.0).contains(&value) {
                    return Err(ConfigError::RsiOutOfRange { name, value });
                }
            }
        }
        if let (Some(min), Some(max)) = (self.rsi_min, self.rsi_max) {
            if min > max {
                return Err(ConfigError::RsiInverted { min, max });
            }
        }
        Ok(())
    }

    fn detector_params(&self) -> ScanParams {
        ScanParams {
            tenkan_period: self.tenkan_period,
            kijun_period: self.kijun_period,
            senkou_period: self.senkou_period,
            senkou_shift: self.senkou_shift(),
            lookback_not_above: self.lookback_not_above,
            min_price: self.min_price,
            strict_cross: self.strict_cross,
        }
    }

    /// Validated detector parameters.
    pub fn params(&self) -> Result<ScanParams, ConfigError> {
        self.validate()?;
        Ok(self.detector_params())
    }

    /// `volume`, `min_price`, `macd`, `rsi`, in that order, each enabled only
    /// when configured.
    pub fn filter_chain(&self) -> Result<FilterChain, ConfigError> {
        self.validate()?;
        let mut chain = FilterChain::new();
        chain.register(
            "volume",
            Filter::MinDollarVolume {
                min: self.min_avg_dollar_volume,
            },
            self.min_avg_dollar_volume > 0.0,
        )?;
        chain.register(
            "min_price",
            Filter::MinPrice {
                min: self.min_price,
            },
            self.min_price > 0.0,
        )?;
        chain.register("macd", Filter::macd_default(), self.macd_filter)?;
        chain.register(
            "rsi",
            Filter::RsiRange {
                period: RSI_PERIOD,
                min: self.rsi_min,
                max: self.rsi_max,
            },
            self.rsi_min.is_some() || self.rsi_max.is_some(),
        )?;
        Ok(chain)
    }
}
