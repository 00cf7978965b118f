//! ichiscan CLI: scan and cache management commands.
//!
//! Commands:
//! - `scan`: find symbols whose close has just moved above the Ichimoku cloud
//! - `cache status`: report cached symbols, date ranges and sizes

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ichiscan_core::data::{
    CachedProvider, CircuitBreaker, CsvProvider, DataProvider, ParquetCache, SyntheticProvider,
    YahooProvider,
};
use ichiscan_runner::{
    init_logging, CsvSink, DateRange, JsonSummarySink, LogFormat, ResultSink, ScanConfig,
    ScanReport, ScanRunner,
};

#[derive(Parser)]
#[command(
    name = "ichiscan",
    about = "ichiscan: first close above the Ichimoku cloud screener"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG overrides.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: pretty or json.
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Yahoo,
    Csv,
    Synthetic,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a symbol list for first closes above the cloud.
    Scan(ScanArgs),
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    start: String,

    /// End date (YYYY-MM-DD or "today"). Defaults to today.
    #[arg(long, default_value = "today")]
    end: String,

    /// Comma-separated symbols (e.g., AAPL,MSFT,SPY).
    #[arg(long)]
    tickers: Option<String>,

    /// File with one symbol per line.
    #[arg(long)]
    tickers_file: Option<PathBuf>,

    /// TOML scan config. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    ichi_tenkan: Option<usize>,

    #[arg(long)]
    ichi_kijun: Option<usize>,

    #[arg(long)]
    ichi_senkou: Option<usize>,

    /// Bars before the match that must not have closed above the cloud.
    #[arg(long)]
    lookback_not_above: Option<usize>,

    #[arg(long)]
    min_price: Option<f64>,

    /// Minimum 20-day average dollar volume.
    #[arg(long)]
    min_avg_dollar_volume: Option<f64>,

    /// Do not require the prior bar to close at or below the cloud.
    #[arg(long, default_value_t = false)]
    no_strict_cross: bool,

    /// Require a positive MACD histogram on the match bar.
    #[arg(long, default_value_t = false)]
    macd: bool,

    #[arg(long)]
    rsi_min: Option<f64>,

    #[arg(long)]
    rsi_max: Option<f64>,

    /// Worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Where bars come from.
    #[arg(long, value_enum, default_value = "yahoo")]
    source: Source,

    /// Long-format CSV (symbol,date,open,high,low,close,volume) for --source csv.
    #[arg(long)]
    csv_file: Option<PathBuf>,

    /// Parquet cache for Yahoo data. Defaults to ./data.
    #[arg(long, default_value = "data")]
    cache_dir: PathBuf,

    /// Write matches to this CSV, plus a .json summary beside it.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the resolved plan without fetching anything.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached symbols, date ranges and sizes.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Scan(args) => run_scan(args),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
        },
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    if s.eq_ignore_ascii_case("today") {
        return Ok(chrono::Local::now().date_naive());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

/// Symbols from the file (one per line) followed by the comma list.
fn collect_tickers(file_contents: Option<&str>, list: Option<&str>) -> Vec<String> {
    let from_file = file_contents.into_iter().flat_map(str::lines);
    let from_list = list.into_iter().flat_map(|l| l.split(','));
    from_file
        .chain(from_list)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolve_config(args: &ScanArgs) -> Result<ScanConfig> {
    let mut cfg = match &args.config {
        Some(path) => ScanConfig::from_file(path)?,
        None => ScanConfig::default(),
    };
    if let Some(v) = args.ichi_tenkan {
        cfg.tenkan_period = v;
    }
    if let Some(v) = args.ichi_kijun {
        cfg.kijun_period = v;
    }
    if let Some(v) = args.ichi_senkou {
        cfg.senkou_period = v;
    }
    if let Some(v) = args.lookback_not_above {
        cfg.lookback_not_above = v;
    }
    if let Some(v) = args.min_price {
        cfg.min_price = v;
    }
    if let Some(v) = args.min_avg_dollar_volume {
        cfg.min_avg_dollar_volume = v;
    }
    if args.no_strict_cross {
        cfg.strict_cross = false;
    }
    if args.macd {
        cfg.macd_filter = true;
    }
    if args.rsi_min.is_some() {
        cfg.rsi_min = args.rsi_min;
    }
    if args.rsi_max.is_some() {
        cfg.rsi_max = args.rsi_max;
    }
    if let Some(v) = args.threads {
        cfg.worker_count = v;
    }
    Ok(cfg)
}

fn build_provider(args: &ScanArgs) -> Result<Box<dyn DataProvider>> {
    let provider: Box<dyn DataProvider> = match args.source {
        Source::Yahoo => {
            let breaker = Arc::new(CircuitBreaker::default_provider());
            let yahoo = YahooProvider::new(breaker)?;
            Box::new(CachedProvider::new(yahoo, ParquetCache::new(&args.cache_dir)))
        }
        Source::Csv => {
            let Some(path) = &args.csv_file else {
                bail!("--source csv requires --csv-file");
            };
            Box::new(CsvProvider::from_path(path)?)
        }
        Source::Synthetic => Box::new(SyntheticProvider::default()),
    };
    Ok(provider)
}

fn run_scan(args: ScanArgs) -> Result<()> {
    let file_contents = args
        .tickers_file
        .as_ref()
        .map(|p| {
            std::fs::read_to_string(p)
                .with_context(|| format!("failed to read tickers file {}", p.display()))
        })
        .transpose()?;
    let tickers = collect_tickers(file_contents.as_deref(), args.tickers.as_deref());
    if tickers.is_empty() {
        bail!("no tickers given; pass --tickers or --tickers-file");
    }
    tracing::debug!(tickers = tickers.len(), "resolved ticker list");

    let range = DateRange::new(parse_date(&args.start)?, parse_date(&args.end)?)?;
    let runner = ScanRunner::new(resolve_config(&args)?)?;

    if args.dry_run {
        let plan = runner.dry_run(&tickers[..], range);
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let provider = build_provider(&args)?;
    let report = runner.run(&tickers[..], range, provider.as_ref())?;

    print_report(&report);

    if let Some(path) = &args.output {
        let csv = CsvSink::new(path);
        let summary = JsonSummarySink::beside(path);
        csv.write(&report)?;
        summary.write(&report)?;
        println!("Results saved to: {}", csv.path().display());
        println!("Summary saved to: {}", summary.path().display());
    }

    Ok(())
}

fn print_report(report: &ScanReport) {
    println!();
    println!("=== Ichimoku Cloud Scan ===");
    println!("Period:    {} to {}", report.range.start, report.range.end);
    println!(
        "Symbols:   {} requested, {} scanned, {} failed",
        report.counts.requested, report.counts.scanned, report.counts.failed
    );
    println!(
        "Matches:   {} ({} removed by filters)",
        report.counts.matched, report.counts.filtered
    );
    if report.cancelled {
        println!();
        println!("WARNING: scan was cancelled; results discarded");
        return;
    }
    println!();

    if report.matches.is_empty() {
        println!("No symbols closed above the cloud for the first time.");
        println!();
        return;
    }

    for line in render_table(report) {
        println!("{line}");
    }
    println!();
}

fn render_table(report: &ScanReport) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{:<8} {:<10} {:>10} {:>10} {:>10} {:>16}",
            "Symbol", "Date", "Close", "Cloud Top", "Distance %", "Avg $ Vol"
        ),
        "-".repeat(69),
    ];
    for m in &report.matches {
        let adv = m
            .avg_dollar_volume_20
            .map(|v| group_thousands(v.round() as u64))
            .unwrap_or_else(|| "n/a".into());
        lines.push(format!(
            "{:<8} {:<10} {:>10.2} {:>10.2} {:>9.2}% {:>16}",
            m.symbol, m.match_date, m.close, m.cloud_top, m.distance_pct, adv
        ));
    }
    lines
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = ParquetCache::new(cache_dir);
    let symbols = cache.cached_symbols();
    if symbols.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let refs: Vec<&str> = symbols.iter().map(String::as_str).collect();
    let rows = cache.status(&refs);
    let total_size: u64 = rows.iter().map(|r| r.size_bytes).sum();

    println!("Cache: {}", cache_dir.display());
    println!("Symbols: {}", rows.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!("{:<8} {:<25} {:<12} {:>10}", "Symbol", "Date Range", "Bars", "Size");
    println!("{}", "-".repeat(58));
    for row in &rows {
        let range = match (row.start_date, row.end_date) {
            (Some(s), Some(e)) => format!("{s} to {e}"),
            _ => "(no meta)".into(),
        };
        let bars = row
            .bar_count
            .map(|n| format!("{n} bars"))
            .unwrap_or_default();
        println!(
            "{:<8} {:<25} {:<12} {:>10}",
            row.symbol,
            range,
            bars,
            format_size(row.size_bytes)
        );
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
