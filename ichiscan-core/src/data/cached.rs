//! Read-through cache in front of any provider.

use chrono::NaiveDate;

use super::cache::{CoverageResult, ParquetCache};
use super::provider::{DataError, DataProvider, DataSource};
use crate::domain::BarSeries;

/// Serves fully covered ranges from the Parquet cache and fetches everything
/// else from `inner`, writing the fresh series back.
pub struct CachedProvider<P> {
    inner: P,
    cache: ParquetCache,
}

impl<P: DataProvider> CachedProvider<P> {
    pub fn new(inner: P, cache: ParquetCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &ParquetCache {
        &self.cache
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn load_cached(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BarSeries, DataError> {
        let bars = self.cache.load(symbol)?;
        BarSeries::new(symbol, bars)?
            .slice_range(start, end)
            .ok_or_else(|| DataError::Empty {
                symbol: symbol.to_string(),
            })
    }
}

impl<P: DataProvider> DataProvider for CachedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn source(&self) -> DataSource {
        self.inner.source()
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BarSeries, DataError> {
        match self.cache.covers_range(symbol, start, end) {
            CoverageResult::FullyCovered => match self.load_cached(symbol, start, end) {
                Ok(series) => {
                    tracing::debug!(symbol, bars = series.len(), "cache hit");
                    return Ok(series);
                }
                Err(DataError::Empty { .. }) => {
                    // Covered window with no sessions in it: same answer a fetch gives.
                    return Err(DataError::Empty {
                        symbol: symbol.to_string(),
                    });
                }
                Err(e) => tracing::warn!(symbol, error = %e, "cache read failed, refetching"),
            },
            CoverageResult::PartiallyCovered {
                cached_start,
                cached_end,
            } => tracing::debug!(
                symbol,
                %cached_start,
                %cached_end,
                "cache partially covers range, refetching"
            ),
            CoverageResult::NotCached => tracing::debug!(symbol, "cache miss"),
        }

        let series = self.inner.fetch(symbol, start, end)?;
        if let Err(e) = self
            .cache
            .write(symbol, series.bars(), start, end, self.inner.name())
        {
            tracing::warn!(symbol, error = %e, "failed to write cache");
        }
        Ok(series)
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }
}
