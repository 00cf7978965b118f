//! ichiscan runner: configuration, the parallel scan pipeline and result sinks.
//!
//! Builds on `ichiscan-core` to provide:
//! - TOML scan configuration, validated before any fetch
//! - Two-phase scan (fetch, then detect + filter) on a bounded worker pool
//! - Cooperative cancellation and per-symbol fault isolation
//! - CSV and JSON result sinks
//! - Logging setup for the binary

pub mod config;
pub mod export;
pub mod logging;
pub mod scan;

pub use config::{ConfigError, ScanConfig, RSI_PERIOD};
pub use export::{
    matches_csv, summary_json, CsvSink, JsonSummarySink, ResultSink, ScanSummary, SinkError,
};
pub use logging::{init_logging, LogFormat};
pub use scan::{
    normalize_symbols, CancelToken, DateRange, DropStage, DroppedSymbol, DryRunSummary,
    ScanCounts, ScanError, ScanReport, ScanRunner, SymbolOutcome,
};
