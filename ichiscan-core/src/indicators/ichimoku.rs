//! Ichimoku Kinko Hyo, aligned for same-bar price comparison.
//!
//! - Tenkan: midpoint of high/low over `tenkan_period`
//! - Kijun: midpoint of high/low over `kijun_period`
//! - Senkou A: `(tenkan + kijun) / 2`, shifted forward by `senkou_shift`
//! - Senkou B: midpoint of high/low over `senkou_period`, shifted forward by `senkou_shift`
//! - Cloud top/bottom: max/min of the two spans, undefined if either span is undefined
//!
//! After the forward shift, `cloud_top[t]` is the cloud that sits under bar `t`
//! on a chart, so callers compare it with `close[t]` directly.

use serde::{Deserialize, Serialize};

use super::rolling::{midpoint, shift};
use crate::domain::Bar;

/// Ichimoku periods and span displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ichimoku {
    pub tenkan_period: usize,
    pub kijun_period: usize,
    pub senkou_period: usize,
    pub senkou_shift: usize,
}

impl Default for Ichimoku {
    fn default() -> Self {
        Self::new(9, 26, 52, 26)
    }
}

impl Ichimoku {
    pub fn new(
        tenkan_period: usize,
        kijun_period: usize,
        senkou_period: usize,
        senkou_shift: usize,
    ) -> Self {
        assert!(tenkan_period >= 1, "tenkan period must be >= 1");
        assert!(kijun_period >= 1, "kijun period must be >= 1");
        assert!(senkou_period >= 1, "senkou period must be >= 1");
        Self {
            tenkan_period,
            kijun_period,
            senkou_period,
            senkou_shift,
        }
    }

    /// Bars of history needed before the cloud is considered stable.
    pub fn min_bars(&self) -> usize {
        self.senkou_period + self.senkou_shift
    }

    /// Index of the first bar whose senkou B can be defined.
    pub fn first_senkou_b_index(&self) -> usize {
        self.senkou_period - 1 + self.senkou_shift
    }

    pub fn compute(&self, bars: &[Bar]) -> IchimokuSeries {
        let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
        self.compute_hl(&high, &low)
    }

    /// Compute from raw high/low columns of equal length.
    pub fn compute_hl(&self, high: &[f64], low: &[f64]) -> IchimokuSeries {
        assert_eq!(high.len(), low.len(), "high/low length mismatch");

        let tenkan = midpoint(high, low, self.tenkan_period);
        let kijun = midpoint(high, low, self.kijun_period);

        let span_a_raw: Vec<f64> = tenkan.iter().zip(&kijun).map(|(t, k)| (t + k) / 2.0).collect();
        let span_b_raw = midpoint(high, low, self.senkou_period);

        let senkou_a = self.align_to_price(&span_a_raw);
        let senkou_b = self.align_to_price(&span_b_raw);

        let (cloud_top, cloud_bottom) = cloud_envelope(&senkou_a, &senkou_b);

        IchimokuSeries {
            tenkan,
            kijun,
            senkou_a,
            senkou_b,
            cloud_top,
            cloud_bottom,
        }
    }

    /// Displace a span forward so index `t` holds the value computed at `t - senkou_shift`.
    pub fn align_to_price(&self, span: &[f64]) -> Vec<f64> {
        shift(span, self.senkou_shift as isize)
    }
}

/// Max/min envelope of two spans. Undefined wherever either span is undefined.
pub fn cloud_envelope(a: &[f64], b: &[f64]) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .zip(b)
        .map(|(&a, &b)| {
            if a.is_nan() || b.is_nan() {
                (f64::NAN, f64::NAN)
            } else {
                (a.max(b), a.min(b))
            }
        })
        .unzip()
}

/// Ichimoku component columns, index-aligned with the input bars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IchimokuSeries {
    pub tenkan: Vec<f64>,
    pub kijun: Vec<f64>,
    pub senkou_a: Vec<f64>,
    pub senkou_b: Vec<f64>,
    pub cloud_top: Vec<f64>,
    pub cloud_bottom: Vec<f64>,
}

/// Ichimoku values at one bar, with undefined values as `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IchimokuPoint {
    pub tenkan: Option<f64>,
    pub kijun: Option<f64>,
    pub senkou_a: Option<f64>,
    pub senkou_b: Option<f64>,
    pub cloud_top: Option<f64>,
    pub cloud_bottom: Option<f64>,
}

impl IchimokuSeries {
    pub fn len(&self) -> usize {
        self.cloud_top.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cloud_top.is_empty()
    }

    /// Values at `index`, or `None` if out of bounds.
    pub fn point(&self, index: usize) -> Option<IchimokuPoint> {
        if index >= self.len() {
            return None;
        }
        Some(IchimokuPoint {
            tenkan: defined(self.tenkan[index]),
            kijun: defined(self.kijun[index]),
            senkou_a: defined(self.senkou_a[index]),
            senkou_b: defined(self.senkou_b[index]),
            cloud_top: defined(self.cloud_top[index]),
            cloud_bottom: defined(self.cloud_bottom[index]),
        })
    }
}

/// NaN → None.
pub fn defined(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}
