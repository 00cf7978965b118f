//! Domain types: bars, bar series, match records.

pub mod bar;
pub mod match_record;

pub use bar::{Bar, BarSeries};
pub use match_record::MatchRecord;
