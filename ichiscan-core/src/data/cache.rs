//! Parquet bar cache with Hive-style partitioning.
//!
//! Layout: `{cache_dir}/symbol={SYMBOL}/{year}.parquet` plus a `meta.json`
//! sidecar per symbol recording the covered date window and a content hash.
//!
//! - Writes are atomic per file (write `.tmp`, rename into place) and replace
//!   any earlier partitions for the symbol.
//! - Loads validate schema and row count; corrupt partitions are quarantined
//!   (`{file}.quarantined`) and reported as a miss.
//! - f64 columns round-trip exactly, so a cache hit is bit-identical to the
//!   fetch that populated it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::provider::DataError;
use crate::domain::Bar;

/// Metadata sidecar for a cached symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    /// Requested window the cached bars answer for. Wider than the bar dates
    /// when the window starts or ends on a non-trading day.
    pub covered_start: NaiveDate,
    pub covered_end: NaiveDate,
    pub first_bar: NaiveDate,
    pub last_bar: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: chrono::NaiveDateTime,
}

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("symbol={symbol}"))
    }

    fn year_path(&self, symbol: &str, year: i32) -> PathBuf {
        self.symbol_dir(symbol).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("meta.json")
    }

    /// Replace the cached bars for `symbol`, recording `[covered_start, covered_end]`
    /// as the window they answer for.
    pub fn write(
        &self,
        symbol: &str,
        bars: &[Bar],
        covered_start: NaiveDate,
        covered_end: NaiveDate,
        source: &str,
    ) -> Result<(), DataError> {
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Err(DataError::CacheError("no bars to cache".into()));
        };

        let sym_dir = self.symbol_dir(symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;
        remove_partitions(&sym_dir)?;

        let mut by_year: BTreeMap<i32, Vec<&Bar>> = BTreeMap::new();
        for bar in bars {
            by_year.entry(bar.date.year()).or_default().push(bar);
        }

        for (year, year_bars) in &by_year {
            let df = bars_to_dataframe(year_bars)?;
            let path = self.year_path(symbol, *year);
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&df, &tmp_path)?;
            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::CacheError(format!("atomic rename failed: {e}"))
            })?;
        }

        let meta = CacheMeta {
            symbol: symbol.to_string(),
            covered_start: covered_start.min(first.date),
            covered_end: covered_end.max(last.date),
            first_bar: first.date,
            last_bar: last.date,
            bar_count: bars.len(),
            data_hash: data_hash(bars)?,
            source: source.to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        let meta_path = self.meta_path(symbol);
        let tmp_meta = meta_path.with_extension("json.tmp");
        fs::write(&tmp_meta, meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;
        fs::rename(&tmp_meta, &meta_path)
            .map_err(|e| DataError::CacheError(format!("meta rename: {e}")))?;

        tracing::debug!(symbol, bars = bars.len(), "cached series");
        Ok(())
    }

    /// Load all cached bars for a symbol, sorted by date ascending.
    pub fn load(&self, symbol: &str) -> Result<Vec<Bar>, DataError> {
        let sym_dir = self.symbol_dir(symbol);
        if !sym_dir.exists() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        let entries =
            fs::read_dir(&sym_dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut all_bars = Vec::new();
        let mut quarantined = false;
        for entry in entries {
            let path = entry
                .map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(&path) {
                Ok(bars) => all_bars.extend(bars),
                Err(e) => {
                    tracing::warn!(
                        symbol,
                        path = %path.display(),
                        error = %e,
                        "quarantining corrupt cache file"
                    );
                    let _ = fs::rename(&path, path.with_extension("parquet.quarantined"));
                    quarantined = true;
                }
            }
        }

        if quarantined {
            // The sidecar no longer describes what is on disk.
            let _ = fs::remove_file(self.meta_path(symbol));
        }
        if quarantined || all_bars.is_empty() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        all_bars.sort_by_key(|b| b.date);
        Ok(all_bars)
    }

    pub fn get_meta(&self, symbol: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Symbols with a `symbol=` partition directory, sorted.
    pub fn cached_symbols(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut symbols: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix("symbol="))
                    .map(str::to_string)
            })
            .collect();
        symbols.sort();
        symbols
    }

    pub fn status(&self, symbols: &[&str]) -> Vec<CacheStatus> {
        symbols
            .iter()
            .map(|sym| {
                let meta = self.get_meta(sym);
                CacheStatus {
                    symbol: sym.to_string(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.first_bar),
                    end_date: meta.as_ref().map(|m| m.last_bar),
                    bar_count: meta.as_ref().map(|m| m.bar_count),
                    size_bytes: dir_size(&self.symbol_dir(sym)),
                }
            })
            .collect()
    }

    pub fn covers_range(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> CoverageResult {
        match self.get_meta(symbol) {
            None => CoverageResult::NotCached,
            Some(meta) if meta.covered_start <= start && meta.covered_end >= end => {
                CoverageResult::FullyCovered
            }
            Some(meta) => CoverageResult::PartiallyCovered {
                cached_start: meta.covered_start,
                cached_end: meta.covered_end,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub symbol: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: Option<usize>,
    pub size_bytes: u64,
}

/// How well the cache covers the requested date range.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

/// blake3 over the JSON encoding of the bars.
pub fn data_hash(bars: &[Bar]) -> Result<String, DataError> {
    let bytes = serde_json::to_vec(bars)
        .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

fn remove_partitions(sym_dir: &Path) -> Result<(), DataError> {
    let entries =
        fs::read_dir(sym_dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
            fs::remove_file(&path)
                .map_err(|e| DataError::CacheError(format!("remove stale partition: {e}")))?;
        }
    }
    Ok(())
}

fn dir_size(dir: &Path) -> u64 {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.metadata().ok())
                .filter(|m| m.is_file())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

const COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn bars_to_dataframe(bars: &[&Bar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::CacheError("empty parquet file".into()));
    }
    for col_name in COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::CacheError(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, DataError> {
    let column = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::ParquetError(format!("column read: {e}")))
    };
    let type_err = |name: &str, e: PolarsError| {
        DataError::ParquetError(format!("{name} column type: {e}"))
    };

    let date_ca = column("date")?.date().map_err(|e| type_err("date", e))?;
    let open_ca = column("open")?.f64().map_err(|e| type_err("open", e))?;
    let high_ca = column("high")?.f64().map_err(|e| type_err("high", e))?;
    let low_ca = column("low")?.f64().map_err(|e| type_err("low", e))?;
    let close_ca = column("close")?.f64().map_err(|e| type_err("close", e))?;
    let vol_ca = column("volume")?.u64().map_err(|e| type_err("volume", e))?;

    let null_at = |name: &str, row: usize| DataError::ParquetError(format!("null {name} at row {row}"));

    (0..df.height())
        .map(|i| {
            let days = date_ca.get(i).ok_or_else(|| null_at("date", i))?;
            Ok(Bar {
                date: epoch() + chrono::Duration::days(days as i64),
                open: open_ca.get(i).ok_or_else(|| null_at("open", i))?,
                high: high_ca.get(i).ok_or_else(|| null_at("high", i))?,
                low: low_ca.get(i).ok_or_else(|| null_at("low", i))?,
                close: close_ca.get(i).ok_or_else(|| null_at("close", i))?,
                volume: vol_ca.get(i).ok_or_else(|| null_at("volume", i))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_bars() -> Vec<Bar> {
        vec![
            Bar {
                date: d(2023, 12, 29),
                open: 99.5,
                high: 100.25,
                low: 98.0,
                close: 100.0,
                volume: 900,
            },
            Bar {
                date: d(2024, 1, 2),
                open: 100.0,
                high: 102.0,
                low: 99.0,
                close: 101.0 / 3.0,
                volume: 1000,
            },
            Bar {
                date: d(2024, 1, 3),
                open: 101.0,
                high: 103.0,
                low: 100.0,
                close: 102.0,
                volume: 1100,
            },
        ]
    }

    #[test]
    fn write_and_load_roundtrip_is_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());

        let bars = sample_bars();
        cache
            .write("SPY", &bars, d(2023, 12, 28), d(2024, 1, 3), "test")
            .unwrap();
        let loaded = cache.load("SPY").unwrap();

        assert_eq!(loaded.len(), 3);
        for (a, b) in loaded.iter().zip(&bars) {
            assert_eq!(a.date, b.date);
            assert_eq!(a.close.to_bits(), b.close.to_bits());
            assert_eq!(a.volume, b.volume);
        }
        assert_eq!(data_hash(&loaded).unwrap(), cache.get_meta("SPY").unwrap().data_hash);
    }

    #[test]
    fn load_nonexistent_returns_no_cached_data() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert!(matches!(
            cache.load("NONEXISTENT"),
            Err(DataError::NoCachedData { .. })
        ));
    }

    #[test]
    fn meta_records_requested_window() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache
            .write("SPY", &sample_bars(), d(2023, 12, 25), d(2024, 1, 5), "test")
            .unwrap();
        let meta = cache.get_meta("SPY").unwrap();
        assert_eq!(meta.bar_count, 3);
        assert_eq!(meta.covered_start, d(2023, 12, 25));
        assert_eq!(meta.first_bar, d(2023, 12, 29));
        assert_eq!(meta.covered_end, d(2024, 1, 5));
    }

    #[test]
    fn coverage_check() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache
            .write("SPY", &sample_bars(), d(2023, 12, 29), d(2024, 1, 3), "test")
            .unwrap();

        assert_eq!(
            cache.covers_range("SPY", d(2024, 1, 1), d(2024, 1, 3)),
            CoverageResult::FullyCovered
        );
        assert_eq!(
            cache.covers_range("SPY", d(2024, 1, 1), d(2024, 2, 1)),
            CoverageResult::PartiallyCovered {
                cached_start: d(2023, 12, 29),
                cached_end: d(2024, 1, 3),
            }
        );
        assert_eq!(
            cache.covers_range("QQQ", d(2024, 1, 1), d(2024, 1, 3)),
            CoverageResult::NotCached
        );
    }

    #[test]
    fn rewrite_replaces_old_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let bars = sample_bars();
        cache
            .write("SPY", &bars, d(2023, 12, 29), d(2024, 1, 3), "test")
            .unwrap();
        cache
            .write("SPY", &bars[1..], d(2024, 1, 2), d(2024, 1, 3), "test")
            .unwrap();
        assert_eq!(cache.load("SPY").unwrap().len(), 2);
    }

    #[test]
    fn corrupt_partition_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache
            .write("SPY", &sample_bars(), d(2023, 12, 29), d(2024, 1, 3), "test")
            .unwrap();
        let path = cache.year_path("SPY", 2024);
        fs::write(&path, b"not parquet").unwrap();

        assert!(cache.load("SPY").is_err());
        assert!(path.with_extension("parquet.quarantined").exists());
        assert!(cache.get_meta("SPY").is_none());
    }

    #[test]
    fn status_and_symbol_listing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache
            .write("SPY", &sample_bars(), d(2023, 12, 29), d(2024, 1, 3), "test")
            .unwrap();

        assert_eq!(cache.cached_symbols(), vec!["SPY".to_string()]);
        let statuses = cache.status(&["SPY", "QQQ"]);
        assert!(statuses[0].cached);
        assert!(statuses[0].size_bytes > 0);
        assert!(!statuses[1].cached);
        assert_eq!(statuses[1].size_bytes, 0);
    }
}
