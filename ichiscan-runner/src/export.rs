//! Result sinks: CSV match table and JSON run summary.
//!
//! - **CSV**: one row per match, every `MatchRecord` field
//! - **JSON**: scan timestamp, parameters, counts and matched symbols
//!
//! Files are written to a sibling `.tmp` and renamed into place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use ichiscan_core::params::ScanParams;

use crate::scan::{DateRange, DroppedSymbol, ScanCounts, ScanReport};

/// Version stamped into JSON summaries.
pub const SUMMARY_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Receives the finished report of a scan run.
pub trait ResultSink {
    fn write(&self, report: &ScanReport) -> Result<(), SinkError>;
}

// ─── CSV ────────────────────────────────────────────────────────────

const CSV_HEADER: [&str; 10] = [
    "symbol",
    "match_date",
    "close",
    "cloud_top",
    "cloud_bottom",
    "distance_pct",
    "tenkan",
    "kijun",
    "avg_dollar_volume_20",
    "lookback_checked",
];

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

/// Render the match table. Undefined optional values are empty cells.
pub fn matches_csv(report: &ScanReport) -> Result<String, SinkError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(CSV_HEADER)?;
    for m in &report.matches {
        wtr.write_record([
            m.symbol.clone(),
            m.match_date.to_string(),
            format!("{:.6}", m.close),
            format!("{:.6}", m.cloud_top),
            format!("{:.6}", m.cloud_bottom),
            format!("{:.4}", m.distance_pct),
            opt(m.tenkan),
            opt(m.kijun),
            opt(m.avg_dollar_volume_20),
            m.lookback_checked.to_string(),
        ])?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| SinkError::Csv(csv::Error::from(e.into_error())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for CsvSink {
    fn write(&self, report: &ScanReport) -> Result<(), SinkError> {
        write_atomic(&self.path, matches_csv(report)?.as_bytes())?;
        tracing::info!(path = %self.path.display(), rows = report.matches.len(), "wrote results csv");
        Ok(())
    }
}

// ─── JSON summary ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ScanSummary<'a> {
    pub schema_version: u32,
    pub scan_time: chrono::NaiveDateTime,
    pub range: DateRange,
    pub parameters: &'a ScanParams,
    pub enabled_filters: &'a [String],
    pub counts: ScanCounts,
    pub results_count: usize,
    pub symbols: Vec<&'a str>,
    pub dropped: &'a [DroppedSymbol],
    pub cancelled: bool,
}

impl<'a> ScanSummary<'a> {
    pub fn from_report(report: &'a ScanReport) -> Self {
        Self {
            schema_version: SUMMARY_SCHEMA_VERSION,
            scan_time: report.scan_time,
            range: report.range,
            parameters: &report.params,
            enabled_filters: &report.enabled_filters,
            counts: report.counts,
            results_count: report.matches.len(),
            symbols: report.matched_symbols(),
            dropped: &report.dropped,
            cancelled: report.cancelled,
        }
    }
}

pub fn summary_json(report: &ScanReport) -> Result<String, SinkError> {
    Ok(serde_json::to_string_pretty(&ScanSummary::from_report(report))?)
}

pub struct JsonSummarySink {
    path: PathBuf,
}

impl JsonSummarySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `results.csv` → `results.json`.
    pub fn beside(csv_path: &Path) -> Self {
        Self::new(csv_path.with_extension("json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonSummarySink {
    fn write(&self, report: &ScanReport) -> Result<(), SinkError> {
        write_atomic(&self.path, summary_json(report)?.as_bytes())?;
        tracing::info!(path = %self.path.display(), "wrote scan summary");
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), SinkError> {
    let io_err = |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        io_err(e)
    })
}
