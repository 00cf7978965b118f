//! Criterion benchmarks for the scan hot path.
//!
//! Benchmarks:
//! 1. Ichimoku computation over a long series
//! 2. Full per-symbol evaluation (indicators + detector)
//! 3. Filter chain with the momentum filters enabled

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ichiscan_core::domain::{Bar, BarSeries};
use ichiscan_core::filters::{Filter, FilterChain};
use ichiscan_core::indicators::Ichimoku;
use ichiscan_core::{BreakoutDetector, MatchRecord, ScanParams};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_series(n: usize) -> BarSeries {
    let base_date = chrono::NaiveDate::from_ymd_opt(2000, 1, 3).unwrap();
    let bars = (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open: close - 0.3,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000_000 + (i as u64 % 500_000),
            }
        })
        .collect();
    BarSeries::new("BENCH", bars).unwrap()
}

fn bench_ichimoku(c: &mut Criterion) {
    let mut group = c.benchmark_group("ichimoku");
    for n in [250, 1_000, 5_000] {
        let series = make_series(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &series, |b, s| {
            b.iter(|| Ichimoku::default().compute(black_box(s.bars())))
        });
    }
    group.finish();
}

fn bench_detector(c: &mut Criterion) {
    let det = BreakoutDetector::new(ScanParams::default());
    let mut group = c.benchmark_group("evaluate_series");
    for n in [250, 1_000, 5_000] {
        let series = make_series(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &series, |b, s| {
            b.iter(|| det.evaluate_series(black_box(s)))
        });
    }
    group.finish();
}

fn bench_filter_chain(c: &mut Criterion) {
    let series = make_series(1_000);
    let bar = series.bars()[series.len() - 2];
    let record = MatchRecord {
        symbol: "BENCH".into(),
        match_date: bar.date,
        close: bar.close,
        cloud_top: bar.close - 1.0,
        cloud_bottom: bar.close - 2.0,
        distance_pct: 1.0,
        tenkan: None,
        kijun: None,
        avg_dollar_volume_20: None,
        lookback_checked: 10,
    };

    let mut chain = FilterChain::new();
    chain.register("volume", Filter::MinDollarVolume { min: 1.0 }, true).unwrap();
    chain.register("macd", Filter::macd_default(), true).unwrap();
    chain
        .register(
            "rsi",
            Filter::RsiRange {
                period: 14,
                min: Some(0.0),
                max: Some(100.0),
            },
            true,
        )
        .unwrap();

    c.bench_function("filter_chain_1000", |b| {
        b.iter(|| chain.apply("BENCH", black_box(&series), black_box(&record)))
    });
}

criterion_group!(benches, bench_ichimoku, bench_detector, bench_filter_chain);
criterion_main!(benches);
