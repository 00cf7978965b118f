//! Positive MACD histogram on the matched bar.

use crate::domain::BarSeries;
use crate::indicators::Macd;

/// Histogram at the second-to-last bar must be defined and positive.
pub fn passes(macd: &Macd, series: &BarSeries) -> bool {
    let Some(idx) = series.len().checked_sub(2) else {
        return false;
    };
    let hist = macd.compute(&series.closes()).histogram[idx];
    hist > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::tests::series_from;

    #[test]
    fn accelerating_uptrend_passes() {
        let closes: Vec<f64> = (0..60).map(|i| 50.0 + (i as f64).powi(2) * 0.02).collect();
        assert!(passes(&Macd::default(), &series_from(&closes, 1_000)));
    }

    #[test]
    fn flat_series_fails() {
        assert!(!passes(&Macd::default(), &series_from(&[20.0; 40], 1_000)));
    }

    #[test]
    fn single_bar_fails() {
        assert!(!passes(&Macd::default(), &series_from(&[20.0], 1_000)));
    }

    #[test]
    fn last_bar_is_ignored() {
        // Steady decline, then a huge jump only on the final bar.
        let mut closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64 * 0.5).collect();
        closes.push(1_000.0);
        assert!(!passes(&Macd::default(), &series_from(&closes, 1_000)));
    }
}
