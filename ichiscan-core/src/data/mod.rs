//! Bar sources, the Parquet cache and the read-through wrapper.

pub mod cache;
pub mod cached;
pub mod circuit_breaker;
pub mod csv_source;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use cache::{CacheMeta, CacheStatus, CoverageResult, ParquetCache};
pub use cached::CachedProvider;
pub use circuit_breaker::CircuitBreaker;
pub use csv_source::CsvProvider;
pub use provider::{DataError, DataProvider, DataSource, RawBar};
pub use synthetic::SyntheticProvider;
pub use yahoo::YahooProvider;
