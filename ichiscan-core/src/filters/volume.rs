//! Liquidity floor on trailing average dollar volume.

use crate::detector::{avg_dollar_volume, DOLLAR_VOLUME_WINDOW};
use crate::domain::{BarSeries, MatchRecord};

/// Uses the detector's figure when present, otherwise recomputes it with the
/// same function. `min <= 0` disables the floor.
pub fn passes(min: f64, series: &BarSeries, record: &MatchRecord) -> bool {
    if min <= 0.0 {
        return true;
    }
    record
        .avg_dollar_volume_20
        .or_else(|| avg_dollar_volume(series.bars(), DOLLAR_VOLUME_WINDOW))
        .is_some_and(|adv| adv >= min)
}
