//! Scan orchestration: parallel fetch, then parallel detect + filter.
//!
//! A run has two phases on a private rayon pool sized `worker_count`:
//!
//! 1. **Fetch**: one task per unique symbol. Failed, empty, malformed or too
//!    short series are dropped with a warning and recorded in the report.
//! 2. **Detect**: starts only after every fetch has returned. One task per
//!    fetched symbol runs the detector and the filter chain under
//!    `catch_unwind`, so a panic costs only that symbol.
//!
//! Tasks share nothing mutable. Each returns a tagged outcome and a single
//! fold builds the `ScanReport`.

use std::collections::{BTreeMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ichiscan_core::data::DataProvider;
use ichiscan_core::detector::{BreakoutDetector, Rejection};
use ichiscan_core::domain::{BarSeries, MatchRecord};
use ichiscan_core::filters::{FilterChain, FilterVerdict};
use ichiscan_core::params::ScanParams;

use crate::config::{ConfigError, ScanConfig};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Inclusive date range requested from the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ScanError> {
        if start > end {
            return Err(ScanError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }
}

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// What the detect phase concluded for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Matched(MatchRecord),
    NoMatch(Rejection),
    Filtered { filter: String },
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropStage {
    Fetch,
    Detect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedSymbol {
    pub symbol: String,
    pub stage: DropStage,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounts {
    /// Symbols passed in, before normalization.
    pub requested: usize,
    /// After trimming, uppercasing and de-duplication.
    pub unique: usize,
    pub fetched: usize,
    /// Symbols that went through the detect phase.
    pub scanned: usize,
    pub matched: usize,
    /// Detector matches removed by a filter.
    pub filtered: usize,
    /// Symbols dropped in either phase (see `ScanReport::dropped`).
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_time: chrono::NaiveDateTime,
    pub range: DateRange,
    pub params: ScanParams,
    pub enabled_filters: Vec<String>,
    /// Sorted by symbol.
    pub matches: Vec<MatchRecord>,
    pub counts: ScanCounts,
    /// Sorted by symbol.
    pub dropped: Vec<DroppedSymbol>,
    /// Non-matching symbols per rejection label.
    pub rejections: BTreeMap<String, usize>,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl ScanReport {
    pub fn matched_symbols(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.symbol.as_str()).collect()
    }
}

/// What a run would do, without touching the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DryRunSummary {
    pub symbols: Vec<String>,
    pub requested: usize,
    pub range: DateRange,
    pub params: ScanParams,
    pub enabled_filters: Vec<String>,
    pub worker_count: usize,
    /// Bars each symbol needs before it can be scored.
    pub min_history: usize,
}

/// Trim, uppercase, drop empties, de-duplicate keeping first occurrence.
pub fn normalize_symbols<S: AsRef<str>>(symbols: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols
        .iter()
        .map(|s| s.as_ref().trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

enum FetchOutcome {
    Fetched(BarSeries),
    Dropped(String),
}

pub struct ScanRunner {
    config: ScanConfig,
    detector: BreakoutDetector,
    filters: FilterChain,
    cancel: CancelToken,
}

impl ScanRunner {
    /// Validates the configuration; nothing is fetched on failure.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let params = config.params()?;
        let filters = config.filter_chain()?;
        Ok(Self {
            config,
            detector: BreakoutDetector::new(params),
            filters,
            cancel: CancelToken::new(),
        })
    }

    /// Replace the configured filter chain (e.g. to add custom filters).
    pub fn with_filter_chain(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn filter_chain_mut(&mut self) -> &mut FilterChain {
        &mut self.filters
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn params(&self) -> &ScanParams {
        self.detector.params()
    }

    fn enabled_filters(&self) -> Vec<String> {
        self.filters
            .enabled_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn dry_run<S: AsRef<str>>(&self, symbols: &[S], range: DateRange) -> DryRunSummary {
        let unique = normalize_symbols(symbols);
        tracing::info!(
            symbols = unique.len(),
            start = %range.start,
            end = %range.end,
            "dry run: no data will be fetched"
        );
        DryRunSummary {
            symbols: unique,
            requested: symbols.len(),
            range,
            params: self.params().clone(),
            enabled_filters: self.enabled_filters(),
            worker_count: self.config.worker_count,
            min_history: self.params().min_history(),
        }
    }

    pub fn run<S, P>(
        &self,
        symbols: &[S],
        range: DateRange,
        provider: &P,
    ) -> Result<ScanReport, ScanError>
    where
        S: AsRef<str>,
        P: DataProvider + ?Sized,
    {
        let started = Instant::now();
        let unique = normalize_symbols(symbols);
        let mut report = ScanReport {
            scan_time: chrono::Local::now().naive_local(),
            range,
            params: self.params().clone(),
            enabled_filters: self.enabled_filters(),
            matches: Vec::new(),
            counts: ScanCounts {
                requested: symbols.len(),
                unique: unique.len(),
                ..ScanCounts::default()
            },
            dropped: Vec::new(),
            rejections: BTreeMap::new(),
            cancelled: false,
            elapsed_ms: 0,
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_count)
            .thread_name(|i| format!("ichiscan-scan-{i}"))
            .build()
            .map_err(|e| ScanError::ThreadPool(e.to_string()))?;

        tracing::info!(
            symbols = unique.len(),
            workers = self.config.worker_count,
            provider = provider.name(),
            start = %range.start,
            end = %range.end,
            "scan started"
        );

        // ── Phase 1: fetch ──
        let fetched: Vec<(String, Option<FetchOutcome>)> = pool.install(|| {
            unique
                .par_iter()
                .map(|symbol| (symbol.clone(), self.fetch_one(symbol, range, provider)))
                .collect()
        });

        if self.cancel.is_cancelled() {
            return Ok(self.cancelled(report, started));
        }

        let mut series = Vec::with_capacity(fetched.len());
        for (symbol, outcome) in fetched {
            match outcome {
                Some(FetchOutcome::Fetched(s)) => series.push(s),
                Some(FetchOutcome::Dropped(reason)) => report.dropped.push(DroppedSymbol {
                    symbol,
                    stage: DropStage::Fetch,
                    reason,
                }),
                None => return Ok(self.cancelled(report, started)),
            }
        }
        report.counts.fetched = series.len();
        tracing::info!(
            fetched = series.len(),
            dropped = report.dropped.len(),
            "fetch phase complete"
        );

        // ── Phase 2: detect + filter ──
        let outcomes: Vec<(String, Option<SymbolOutcome>)> = pool.install(|| {
            series
                .par_iter()
                .map(|s| (s.symbol().to_string(), self.detect_one(s)))
                .collect()
        });

        if self.cancel.is_cancelled() {
            return Ok(self.cancelled(report, started));
        }

        // ── Aggregate ──
        for (symbol, outcome) in outcomes {
            let Some(outcome) = outcome else {
                return Ok(self.cancelled(report, started));
            };
            report.counts.scanned += 1;
            match outcome {
                SymbolOutcome::Matched(record) => {
                    tracing::info!(
                        symbol = %record.symbol,
                        date = %record.match_date,
                        close = record.close,
                        cloud_top = record.cloud_top,
                        "MATCH"
                    );
                    report.matches.push(record);
                }
                SymbolOutcome::NoMatch(reason) => {
                    *report
                        .rejections
                        .entry(reason.label().to_string())
                        .or_default() += 1;
                }
                SymbolOutcome::Filtered { .. } => report.counts.filtered += 1,
                SymbolOutcome::Failed(reason) => report.dropped.push(DroppedSymbol {
                    symbol,
                    stage: DropStage::Detect,
                    reason,
                }),
            }
        }

        report
            .matches
            .sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        report.dropped.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        report.counts.matched = report.matches.len();
        report.counts.failed = report.dropped.len();
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            scanned = report.counts.scanned,
            matched = report.counts.matched,
            filtered = report.counts.filtered,
            failed = report.counts.failed,
            elapsed_ms = report.elapsed_ms,
            "scan complete"
        );
        Ok(report)
    }

    /// `None` if cancelled before the task started.
    fn fetch_one<P>(&self, symbol: &str, range: DateRange, provider: &P) -> Option<FetchOutcome>
    where
        P: DataProvider + ?Sized,
    {
        if self.cancel.is_cancelled() {
            return None;
        }
        let outcome = match catch_unwind(AssertUnwindSafe(|| {
            provider.fetch(symbol, range.start, range.end)
        })) {
            Ok(Ok(series)) if series.len() < self.params().min_history() => {
                FetchOutcome::Dropped(format!(
                    "insufficient history: {} bars, need {}",
                    series.len(),
                    self.params().min_history()
                ))
            }
            Ok(Ok(series)) => FetchOutcome::Fetched(series),
            Ok(Err(e)) => FetchOutcome::Dropped(e.to_string()),
            Err(payload) => FetchOutcome::Dropped(format!(
                "provider panicked: {}",
                panic_message(payload.as_ref())
            )),
        };
        if let FetchOutcome::Dropped(reason) = &outcome {
            tracing::warn!(symbol, reason = %reason, "dropping symbol");
        }
        Some(outcome)
    }

    /// `None` if cancelled before the task started.
    fn detect_one(&self, series: &BarSeries) -> Option<SymbolOutcome> {
        if self.cancel.is_cancelled() {
            return None;
        }
        Some(self.evaluate_symbol(series))
    }

    /// Detector then filter chain for one fetched series. Never panics.
    pub fn evaluate_symbol(&self, series: &BarSeries) -> SymbolOutcome {
        let symbol = series.symbol();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            match self.detector.evaluate_series(series) {
                Ok(record) => match self.filters.apply(symbol, series, &record) {
                    FilterVerdict::Passed => SymbolOutcome::Matched(record),
                    FilterVerdict::Rejected(filter) => SymbolOutcome::Filtered { filter },
                },
                Err(reason) => SymbolOutcome::NoMatch(reason),
            }
        }));
        outcome.unwrap_or_else(|payload| {
            let msg = panic_message(payload.as_ref());
            tracing::error!(symbol, panic = %msg, "detection panicked");
            SymbolOutcome::Failed(format!("detection panicked: {msg}"))
        })
    }

    fn cancelled(&self, mut report: ScanReport, started: Instant) -> ScanReport {
        tracing::warn!("scan cancelled, discarding partial results");
        report.cancelled = true;
        report.matches.clear();
        report.dropped.clear();
        report.rejections.clear();
        report.counts = ScanCounts {
            requested: report.counts.requested,
            unique: report.counts.unique,
            ..ScanCounts::default()
        };
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
