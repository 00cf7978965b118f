//! Minimum price on the matched bar.

use crate::domain::MatchRecord;

pub fn passes(min: f64, record: &MatchRecord) -> bool {
    min <= 0.0 || record.close >= min
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::tests::{record_for, series_from};

    #[test]
    fn inclusive_floor() {
        let series = series_from(&[12.5; 3], 10);
        let rec = record_for(&series);
        assert!(passes(12.5, &rec));
        assert!(!passes(12.51, &rec));
        assert!(passes(0.0, &rec));
    }
}
