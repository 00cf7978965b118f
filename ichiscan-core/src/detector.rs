//! Breakout detector: first close above the Ichimoku cloud.
//!
//! The scored bar is the second-to-last bar of the series ("yesterday"). The
//! last bar is treated as a possibly incomplete session and never scored.
//! Checks, in order:
//!
//! 1. yesterday's close and cloud top must be defined,
//! 2. yesterday's close must be at least `min_price`,
//! 3. yesterday must close strictly above the cloud top,
//! 4. none of the `lookback_not_above` bars before yesterday may have closed
//!    above its cloud top,
//! 5. with `strict_cross`, the bar before yesterday must be defined and at or
//!    below its cloud top.
//!
//! Undefined values never raise; they reject the symbol.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{Bar, BarSeries, MatchRecord};
use crate::indicators::ichimoku::defined;
use crate::indicators::{Ichimoku, IchimokuSeries};
use crate::params::ScanParams;

/// Bars averaged for `MatchRecord::avg_dollar_volume_20`. Independent of the lookback.
pub const DOLLAR_VOLUME_WINDOW: usize = 20;

/// Why a symbol produced no match.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("insufficient history: {bars} bars, need {required}")]
    InsufficientHistory { bars: usize, required: usize },

    #[error("undefined close or cloud on {date}")]
    UndefinedValue { date: NaiveDate },

    #[error("close {close} below minimum price {min_price}")]
    BelowMinPrice { close: f64, min_price: f64 },

    #[error("close not above cloud on {date}")]
    NotAboveCloud { date: NaiveDate },

    #[error("already closed above cloud on {date}")]
    PriorBreakout { date: NaiveDate },

    #[error("bar before {date} was not at or below the cloud")]
    NotStrictCross { date: NaiveDate },
}

impl Rejection {
    /// Stable snake_case label for reports and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::UndefinedValue { .. } => "undefined_value",
            Self::BelowMinPrice { .. } => "below_min_price",
            Self::NotAboveCloud { .. } => "not_above_cloud",
            Self::PriorBreakout { .. } => "prior_breakout",
            Self::NotStrictCross { .. } => "not_strict_cross",
        }
    }
}

/// Mean of close × volume over the last `window` bars (all bars if fewer).
///
/// `None` for an empty slice or a zero window.
pub fn avg_dollar_volume(bars: &[Bar], window: usize) -> Option<f64> {
    if bars.is_empty() || window == 0 {
        return None;
    }
    let tail = &bars[bars.len().saturating_sub(window)..];
    let total: f64 = tail.iter().map(Bar::dollar_volume).sum();
    Some(total / tail.len() as f64)
}

/// Score one symbol against precomputed Ichimoku columns.
///
/// `ichimoku` must be computed from `bars` with `params`' periods.
pub fn evaluate(
    symbol: &str,
    bars: &[Bar],
    ichimoku: &IchimokuSeries,
    params: &ScanParams,
) -> Result<MatchRecord, Rejection> {
    let result = evaluate_inner(symbol, bars, ichimoku, params);
    if let Err(reason) = &result {
        tracing::debug!(symbol, reason = %reason, "no breakout");
    }
    result
}

/// [`evaluate`] without the rejection reason.
pub fn detect(
    symbol: &str,
    bars: &[Bar],
    ichimoku: &IchimokuSeries,
    params: &ScanParams,
) -> Option<MatchRecord> {
    evaluate(symbol, bars, ichimoku, params).ok()
}

fn evaluate_inner(
    symbol: &str,
    bars: &[Bar],
    ichi: &IchimokuSeries,
    params: &ScanParams,
) -> Result<MatchRecord, Rejection> {
    assert_eq!(
        bars.len(),
        ichi.len(),
        "indicator columns must be aligned with bars"
    );

    let n = bars.len();
    let required = params.min_history();
    if n < required {
        return Err(Rejection::InsufficientHistory { bars: n, required });
    }

    let y = n - 2;
    let window_start = y - params.lookback_not_above;
    let yesterday = &bars[y];

    let close = defined(yesterday.close).ok_or(Rejection::UndefinedValue {
        date: yesterday.date,
    })?;
    let cloud_top = defined(ichi.cloud_top[y]).ok_or(Rejection::UndefinedValue {
        date: yesterday.date,
    })?;

    if close < params.min_price {
        return Err(Rejection::BelowMinPrice {
            close,
            min_price: params.min_price,
        });
    }

    if close <= cloud_top {
        return Err(Rejection::NotAboveCloud {
            date: yesterday.date,
        });
    }

    // NaN comparisons are false, so undefined bars never count as a prior breakout.
    if let Some(prior) = (window_start..y).find(|&i| bars[i].close > ichi.cloud_top[i]) {
        return Err(Rejection::PriorBreakout {
            date: bars[prior].date,
        });
    }

    if params.strict_cross {
        let before = y - 1;
        let below = matches!(
            (defined(bars[before].close), defined(ichi.cloud_top[before])),
            (Some(c), Some(t)) if c <= t
        );
        if !below {
            return Err(Rejection::NotStrictCross {
                date: yesterday.date,
            });
        }
    }

    Ok(MatchRecord {
        symbol: symbol.to_string(),
        match_date: yesterday.date,
        close,
        cloud_top,
        cloud_bottom: ichi.cloud_bottom[y],
        distance_pct: (close - cloud_top) / cloud_top * 100.0,
        tenkan: defined(ichi.tenkan[y]),
        kijun: defined(ichi.kijun[y]),
        avg_dollar_volume_20: avg_dollar_volume(bars, DOLLAR_VOLUME_WINDOW),
        lookback_checked: params.lookback_not_above,
    })
}

/// Detector bound to one set of scan parameters.
#[derive(Debug, Clone)]
pub struct BreakoutDetector {
    params: ScanParams,
    ichimoku: Ichimoku,
}

impl BreakoutDetector {
    pub fn new(params: ScanParams) -> Self {
        let ichimoku = params.ichimoku();
        Self { params, ichimoku }
    }

    pub fn params(&self) -> &ScanParams {
        &self.params
    }

    /// Compute the indicators for `series` and score it.
    pub fn evaluate_series(&self, series: &BarSeries) -> Result<MatchRecord, Rejection> {
        let ichi = self.ichimoku.compute(series.bars());
        evaluate(series.symbol(), series.bars(), &ichi, &self.params)
    }

    pub fn scan_symbol(&self, series: &BarSeries) -> Option<MatchRecord> {
        self.evaluate_series(series).ok()
    }
}
