//! End-to-end scan runs against an in-memory provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::NaiveDate;

use ichiscan_core::data::{DataError, DataProvider, DataSource};
use ichiscan_core::domain::{Bar, BarSeries};
use ichiscan_core::filters::{CustomFilter, Filter, FilterError};
use ichiscan_runner::{CancelToken, DateRange, DropStage, ScanConfig, ScanRunner};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn series_from(symbol: &str, closes: &[f64]) -> BarSeries {
    let base = d(2023, 1, 2);
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar {
            date: base + chrono::Duration::days(i as i64),
            open: c,
            high: c + 1.0,
            low: c - 1.0,
            close: c,
            volume: 10_000 + i as u64,
        })
        .collect();
    BarSeries::new(symbol, bars).unwrap()
}

/// Long decline, then a jump on the second-to-last bar.
fn breakout(symbol: &str) -> BarSeries {
    let mut closes: Vec<f64> = (0..118).map(|i| 200.0 - i as f64 * 0.8).collect();
    closes.push(300.0);
    closes.push(301.0);
    series_from(symbol, &closes)
}

fn decline(symbol: &str) -> BarSeries {
    let closes: Vec<f64> = (0..200).map(|i| 300.0 - i as f64 * 0.5).collect();
    series_from(symbol, &closes)
}

fn short(symbol: &str) -> BarSeries {
    let closes: Vec<f64> = (0..30).map(|i| 50.0 + i as f64).collect();
    series_from(symbol, &closes)
}

/// Serves canned series; `FAIL` errors, `PANIC` panics, everything else unknown.
#[derive(Default)]
struct StubProvider {
    series: HashMap<String, BarSeries>,
    calls: Mutex<Vec<String>>,
    cancel_on: Option<(String, CancelToken)>,
}

impl StubProvider {
    fn with(mut self, series: BarSeries) -> Self {
        self.series.insert(series.symbol().to_string(), series);
        self
    }

    fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

impl DataProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    fn fetch(
        &self,
        symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<BarSeries, DataError> {
        self.calls.lock().unwrap().push(symbol.to_string());
        if let Some((trigger, token)) = &self.cancel_on {
            if trigger == symbol {
                token.cancel();
            }
        }
        match symbol {
            "FAIL" => Err(DataError::NetworkUnreachable("connection refused".into())),
            "PANIC" => panic!("provider exploded"),
            _ => self
                .series
                .get(symbol)
                .cloned()
                .ok_or_else(|| DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                }),
        }
    }
}

fn universe() -> StubProvider {
    StubProvider::default()
        .with(breakout("AAA"))
        .with(breakout("BBB"))
        .with(breakout("CCC"))
        .with(decline("DDD"))
        .with(short("EEE"))
}

fn range() -> DateRange {
    DateRange::new(d(2023, 1, 1), d(2023, 12, 31)).unwrap()
}

fn runner(workers: usize) -> ScanRunner {
    ScanRunner::new(ScanConfig {
        worker_count: workers,
        ..ScanConfig::default()
    })
    .unwrap()
}

#[test]
fn one_bad_symbol_never_costs_the_others() {
    let provider = universe();
    let mut runner = runner(4);
    runner
        .filter_chain_mut()
        .register(
            "flaky",
            Filter::Custom(CustomFilter::new(|symbol, _, _| {
                if symbol == "BBB" {
                    panic!("flaky filter");
                }
                Ok(true)
            })),
            true,
        )
        .unwrap();

    let symbols = ["AAA", "BBB", "CCC", "DDD", "EEE", "FAIL", "PANIC", "ZZZ"];
    let report = runner.run(&symbols, range(), &provider).unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.matched_symbols(), vec!["AAA", "CCC"]);
    assert_eq!(report.matches[0].match_date, d(2023, 1, 2) + chrono::Duration::days(118));
    assert_eq!(report.counts.requested, 8);
    assert_eq!(report.counts.fetched, 4);
    assert_eq!(report.counts.scanned, 4);
    assert_eq!(report.counts.matched, 2);
    assert_eq!(report.counts.filtered, 1);
    assert_eq!(report.counts.failed, 4);
    assert_eq!(report.rejections.get("not_above_cloud"), Some(&1));

    let dropped: Vec<&str> = report.dropped.iter().map(|x| x.symbol.as_str()).collect();
    assert_eq!(dropped, vec!["EEE", "FAIL", "PANIC", "ZZZ"]);
    assert!(report.dropped.iter().all(|x| x.stage == DropStage::Fetch));
    assert!(report.dropped[0].reason.contains("insufficient history"));
    assert!(report.dropped[2].reason.contains("provider exploded"));
}

#[test]
fn worker_count_does_not_change_results() {
    let provider = universe();
    let symbols = ["EEE", "CCC", "FAIL", "AAA", "DDD", "BBB"];
    let serial = runner(1).run(&symbols, range(), &provider).unwrap();
    let parallel = runner(8).run(&symbols, range(), &provider).unwrap();

    assert_eq!(serial.matches, parallel.matches);
    assert_eq!(serial.counts, parallel.counts);
    assert_eq!(serial.dropped, parallel.dropped);
    assert_eq!(serial.rejections, parallel.rejections);
}

#[test]
fn duplicate_symbols_are_fetched_once() {
    let provider = universe();
    let report = runner(4)
        .run(&["aaa", "AAA ", " aaa", "bbb"], range(), &provider)
        .unwrap();
    assert_eq!(report.counts.requested, 4);
    assert_eq!(report.counts.unique, 2);
    assert_eq!(provider.calls(), vec!["AAA", "BBB"]);
    assert_eq!(report.matched_symbols(), vec!["AAA", "BBB"]);
}

#[test]
fn always_false_filter_empties_results() {
    let provider = universe();
    let mut runner = runner(2);
    runner
        .filter_chain_mut()
        .register("never", Filter::Custom(CustomFilter::new(|_, _, _| Ok(false))), true)
        .unwrap();
    let report = runner.run(&["AAA", "BBB", "DDD"], range(), &provider).unwrap();
    assert!(report.matches.is_empty());
    assert_eq!(report.counts.filtered, 2);
    assert_eq!(report.enabled_filters, vec!["never"]);
}

#[test]
fn filter_error_counts_as_filtered_not_failed() {
    let provider = universe();
    let mut runner = runner(2);
    runner
        .filter_chain_mut()
        .register(
            "broken",
            Filter::Custom(CustomFilter::new(|symbol, _, _| {
                if symbol == "AAA" {
                    Err(FilterError::Evaluation("indicator unavailable".into()))
                } else {
                    Ok(true)
                }
            })),
            true,
        )
        .unwrap();
    let report = runner.run(&["AAA", "BBB"], range(), &provider).unwrap();

    assert_eq!(report.matched_symbols(), vec!["BBB"]);
    assert_eq!(report.counts.filtered, 1);
    assert_eq!(report.counts.failed, 0);
    assert!(report.dropped.is_empty());
}

#[test]
fn disabled_filter_has_no_effect() {
    let provider = universe();
    let baseline = runner(2).run(&["AAA", "BBB", "DDD"], range(), &provider).unwrap();

    let mut gated = runner(2);
    gated
        .filter_chain_mut()
        .register("never", Filter::Custom(CustomFilter::new(|_, _, _| Ok(false))), false)
        .unwrap();
    let report = gated.run(&["AAA", "BBB", "DDD"], range(), &provider).unwrap();

    assert_eq!(report.matches, baseline.matches);
    assert_eq!(report.counts.filtered, 0);
    assert!(report.enabled_filters.is_empty());
}

#[test]
fn price_floor_from_config_drops_cheap_breakouts() {
    let provider = StubProvider::default()
        .with(breakout("AAA"))
        .with(series_from("CHEAP", &{
            let mut c: Vec<f64> = (0..118).map(|i| 4.0 - i as f64 * 0.02).collect();
            c.push(6.0);
            c.push(6.1);
            c
        }));
    let runner = ScanRunner::new(ScanConfig {
        min_price: 100.0,
        ..ScanConfig::default()
    })
    .unwrap();
    let report = runner.run(&["AAA", "CHEAP"], range(), &provider).unwrap();
    assert_eq!(report.matched_symbols(), vec!["AAA"]);
    assert_eq!(report.rejections.get("below_min_price"), Some(&1));
}

#[test]
fn cancelled_before_start_returns_nothing() {
    let provider = universe();
    let token = CancelToken::new();
    token.cancel();
    let runner = runner(4).with_cancel_token(token);
    let report = runner.run(&["AAA", "BBB"], range(), &provider).unwrap();

    assert!(report.cancelled);
    assert!(report.matches.is_empty());
    assert!(report.dropped.is_empty());
    assert_eq!(report.counts.fetched, 0);
    assert!(provider.calls().is_empty());
}

#[test]
fn cancellation_mid_fetch_discards_partial_results() {
    let token = CancelToken::new();
    let provider = StubProvider {
        cancel_on: Some(("AAA".into(), token.clone())),
        ..universe()
    };
    let runner = runner(1).with_cancel_token(token);
    let report = runner
        .run(&["AAA", "BBB", "CCC", "DDD"], range(), &provider)
        .unwrap();

    assert!(report.cancelled);
    assert!(report.matches.is_empty());
    assert_eq!(report.counts.scanned, 0);
    assert!(provider.calls().len() < 4);
}

#[test]
fn evaluate_symbol_classifies_without_fetching() {
    let runner = runner(1);
    assert!(matches!(
        runner.evaluate_symbol(&breakout("AAA")),
        ichiscan_runner::SymbolOutcome::Matched(_)
    ));
    assert!(matches!(
        runner.evaluate_symbol(&decline("DDD")),
        ichiscan_runner::SymbolOutcome::NoMatch(_)
    ));
}

#[test]
fn counter_provider_sees_each_unique_symbol() {
    struct Counting(AtomicUsize);
    impl DataProvider for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        fn source(&self) -> DataSource {
            DataSource::Synthetic
        }
        fn fetch(&self, symbol: &str, _: NaiveDate, _: NaiveDate) -> Result<BarSeries, DataError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(decline(symbol))
        }
    }

    let provider = Counting(AtomicUsize::new(0));
    let symbols: Vec<String> = (0..50).map(|i| format!("S{i:02}")).collect();
    let report = runner(8).run(&symbols, range(), &provider).unwrap();
    assert_eq!(provider.0.load(Ordering::SeqCst), 50);
    assert_eq!(report.counts.scanned, 50);
    assert_eq!(report.rejections.get("not_above_cloud"), Some(&50));
}
