//! MACD on adjusted exponential weighting.
//!
//! `macd = ewm(close, fast) - ewm(close, slow)`, `signal = ewm(macd, signal)`,
//! `histogram = macd - signal`. Every line is defined from the first bar:
//! adjusted weighting normalizes by the weights seen so far instead of seeding
//! with an SMA.

/// Adjusted exponentially weighted mean with `alpha = 2 / (span + 1)`.
///
/// `y[t] = Σ (1-α)^i · x[t-i] / Σ (1-α)^i` over the non-NaN observations so far.
/// A NaN input decays the weights without contributing, so the output at that
/// position repeats the previous mean.
pub fn ewm_adjusted(values: &[f64], span: usize) -> Vec<f64> {
    assert!(span >= 1, "EWM span must be >= 1");
    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;

    let mut num = 0.0;
    let mut den = 0.0;
    values
        .iter()
        .map(|&x| {
            num *= decay;
            den *= decay;
            if !x.is_nan() {
                num += x;
                den += 1.0;
            }
            if den > 0.0 {
                num / den
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// MACD periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Macd {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// MACD line, signal line and histogram, index-aligned with the closes.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn compute(&self, closes: &[f64]) -> MacdSeries {
        let fast = ewm_adjusted(closes, self.fast);
        let slow = ewm_adjusted(closes, self.slow);
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ewm_adjusted(&macd, self.signal);
        let histogram = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();
        MacdSeries {
            macd,
            signal,
            histogram,
        }
    }
}
