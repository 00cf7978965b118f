//! CSV file provider.
//!
//! Reads a long-format file with a header row
//! `symbol,date,open,high,low,close,volume` (dates as `YYYY-MM-DD`). The file
//! is parsed once at construction; fetches slice the in-memory series.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use super::provider::{DataError, DataProvider, DataSource};
use crate::domain::{Bar, BarSeries};

#[derive(Debug, Deserialize)]
struct CsvRow {
    symbol: String,
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Default)]
pub struct CsvProvider {
    bars: HashMap<String, Vec<Bar>>,
}

impl CsvProvider {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| DataError::Csv(format!("open {}: {e}", path.display())))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut bars: HashMap<String, Vec<Bar>> = HashMap::new();
        for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
            // +2: one for the header, one for 1-based line numbers.
            let row = row.map_err(|e| DataError::Csv(format!("line {}: {e}", line + 2)))?;
            if row.volume < 0.0 || !row.volume.is_finite() {
                return Err(DataError::Csv(format!(
                    "line {}: invalid volume {}",
                    line + 2,
                    row.volume
                )));
            }
            bars.entry(row.symbol.trim().to_uppercase())
                .or_default()
                .push(Bar {
                    date: row.date,
                    open: row.open,
                    high: row.high,
                    low: row.low,
                    close: row.close,
                    volume: row.volume.round() as u64,
                });
        }

        for series in bars.values_mut() {
            series.sort_by_key(|b| b.date);
        }
        tracing::debug!(symbols = bars.len(), "loaded csv bars");
        Ok(Self { bars })
    }

    /// Symbols present in the file, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.bars.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn source(&self) -> DataSource {
        DataSource::CsvFile
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BarSeries, DataError> {
        let bars = self
            .bars
            .get(&symbol.to_uppercase())
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;
        let in_range: Vec<Bar> = bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .copied()
            .collect();
        BarSeries::new(symbol, in_range)
    }
}
