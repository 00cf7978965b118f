//! RSI band on the matched bar.

use crate::domain::BarSeries;
use crate::indicators::Rsi;

/// RSI at the second-to-last bar must be defined and inside `[min, max]`.
/// With neither bound set the filter is a no-op.
pub fn passes(rsi: &Rsi, min: Option<f64>, max: Option<f64>, series: &BarSeries) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(idx) = series.len().checked_sub(2) else {
        return false;
    };
    let value = rsi.compute(&series.closes())[idx];
    if value.is_nan() {
        return false;
    }
    min.map_or(true, |lo| value >= lo) && max.map_or(true, |hi| value <= hi)
}
