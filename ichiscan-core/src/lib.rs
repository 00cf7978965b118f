//! ichiscan core: bar series, Ichimoku indicators, breakout detection, filters, data.
//!
//! This crate contains the signal-detection engine:
//! - Domain types (bars, bar series, match records)
//! - Indicator engine (rolling midpoints, explicit span shift, MACD, RSI)
//! - Breakout detector (first close above the cloud, strict-cross option)
//! - Filter chain (ordered, named, short-circuiting)
//! - Data providers (Yahoo, CSV, synthetic) and the read-through Parquet cache
//!
//! Everything here is synchronous and free of shared mutable state, so the
//! runner can fan symbols out across worker threads.

pub mod data;
pub mod detector;
pub mod domain;
pub mod filters;
pub mod indicators;
pub mod params;

pub use detector::{BreakoutDetector, Rejection};
pub use domain::{Bar, BarSeries, MatchRecord};
pub use filters::{CustomFilter, Filter, FilterChain, FilterError, FilterVerdict};
pub use params::{ParamsError, ScanParams};
