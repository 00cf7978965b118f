//! Scan parameters: the detector's fixed inputs for one scan run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::indicators::Ichimoku;

/// Invalid scan parameter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("{name} must be > 0 (got {value})")]
    NonPositivePeriod { name: &'static str, value: usize },

    #[error("{name} must be a finite number >= 0 (got {value})")]
    InvalidFloor { name: &'static str, value: f64 },
}

/// Breakout scan parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    pub tenkan_period: usize,
    pub kijun_period: usize,
    pub senkou_period: usize,
    /// Span displacement; conventionally equal to `kijun_period`. Zero gives an
    /// unshifted cloud.
    pub senkou_shift: usize,
    /// Bars before the scored bar that must not have closed above the cloud.
    pub lookback_not_above: usize,
    pub min_price: f64,
    /// Also require the bar before the scored bar to close at or below the cloud.
    pub strict_cross: bool,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            tenkan_period: 9,
            kijun_period: 26,
            senkou_period: 52,
            senkou_shift: 26,
            lookback_not_above: 10,
            min_price: 0.0,
            strict_cross: true,
        }
    }
}

impl ScanParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        for (name, value) in [
            ("tenkan_period", self.tenkan_period),
            ("kijun_period", self.kijun_period),
            ("senkou_period", self.senkou_period),
            ("lookback_not_above", self.lookback_not_above),
        ] {
            if value == 0 {
                return Err(ParamsError::NonPositivePeriod { name, value });
            }
        }
        validate_floor("min_price", self.min_price)
    }

    pub fn ichimoku(&self) -> Ichimoku {
        Ichimoku::new(
            self.tenkan_period,
            self.kijun_period,
            self.senkou_period,
            self.senkou_shift,
        )
    }

    /// Minimum bars a series needs before the detector will score it.
    pub fn min_history(&self) -> usize {
        let strict = if self.strict_cross { 3 } else { 2 };
        self.ichimoku()
            .min_bars()
            .max(self.lookback_not_above + 2)
            .max(strict)
    }
}

/// Money floors (price, dollar volume) must be finite and non-negative.
pub fn validate_floor(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ParamsError::InvalidFloor { name, value });
    }
    Ok(())
}
