//! MatchRecord: one qualifying symbol's breakout snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Snapshot of the bar on which a symbol first closed above the cloud.
///
/// Created once by the detector. Filters read it; nothing mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub symbol: String,
    /// Date of the scored bar ("yesterday", the second-to-last bar of the series).
    pub match_date: NaiveDate,
    pub close: f64,
    pub cloud_top: f64,
    pub cloud_bottom: f64,
    /// `(close - cloud_top) / cloud_top * 100`.
    pub distance_pct: f64,
    pub tenkan: Option<f64>,
    pub kijun: Option<f64>,
    /// Mean of close × volume over the trailing 20 bars of the series.
    pub avg_dollar_volume_20: Option<f64>,
    /// The `lookback_not_above` value the record was scored with.
    pub lookback_checked: usize,
}

impl MatchRecord {
    /// Ordering key for presentation: symbol, then match date.
    pub fn sort_key(&self) -> (&str, NaiveDate) {
        (&self.symbol, self.match_date)
    }
}
