//! Rolling-window primitives and the series shift used for cloud alignment.
//!
//! Every function returns a `Vec<f64>` the same length as its input, with
//! `f64::NAN` marking undefined positions. A window containing any NaN is
//! undefined; NaN never silently becomes a number.

/// Highest value over the trailing `window` positions (inclusive of `t`).
///
/// Undefined for the first `window - 1` positions.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    rolling_fold(values, window, f64::NEG_INFINITY, f64::max)
}

/// Lowest value over the trailing `window` positions (inclusive of `t`).
pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    rolling_fold(values, window, f64::INFINITY, f64::min)
}

/// Simple mean over the trailing `window` positions.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || n < window {
        return result;
    }
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = slice.iter().sum::<f64>() / window as f64;
    }
    result
}

/// `(rolling_max(high) + rolling_min(low)) / 2`, the Ichimoku midpoint line.
pub fn midpoint(high: &[f64], low: &[f64], window: usize) -> Vec<f64> {
    let hi = rolling_max(high, window);
    let lo = rolling_min(low, window);
    hi.iter().zip(&lo).map(|(h, l)| (h + l) / 2.0).collect()
}

/// Shift a series by `periods` positions.
///
/// Positive `periods` moves values forward in time: `out[t] = values[t - periods]`,
/// and the first `periods` entries become undefined. Negative `periods` moves
/// values backward: `out[t] = values[t + |periods|]`, and the last `|periods|`
/// entries become undefined.
pub fn shift(values: &[f64], periods: isize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    let offset = periods.unsigned_abs();
    if offset >= n {
        return result;
    }
    if periods >= 0 {
        result[offset..].copy_from_slice(&values[..n - offset]);
    } else {
        result[..n - offset].copy_from_slice(&values[offset..]);
    }
    result
}

fn rolling_fold(values: &[f64], window: usize, init: f64, f: fn(f64, f64) -> f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || n < window {
        return result;
    }
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        // f64::max/min skip NaN, so undefined inputs have to be caught explicitly.
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = slice.iter().copied().fold(init, f);
    }
    result
}
