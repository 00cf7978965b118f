//! Property tests for indicator and detector invariants.
//!
//! Uses proptest to verify:
//! 1. Cloud ordering: cloud_top >= cloud_bottom wherever both are defined
//! 2. Shift alignment: the first `shift` span entries are undefined
//! 3. Strict-above: every match closes strictly above its cloud top
//! 4. First occurrence: no bar before the match in the window closed above
//! 5. Determinism: scoring the same series twice gives the same record
//! 6. Disabled filters never change a verdict

use chrono::NaiveDate;
use proptest::prelude::*;

use ichiscan_core::domain::{Bar, BarSeries};
use ichiscan_core::filters::{CustomFilter, Filter, FilterChain};
use ichiscan_core::indicators::rolling::shift;
use ichiscan_core::indicators::Ichimoku;
use ichiscan_core::params::ScanParams;
use ichiscan_core::BreakoutDetector;

// ── Strategies (proptest) ────────────────────────────────────────────

/// Random walk of closes with high/low wrapped around open/close.
fn arb_bars(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((-0.04..0.04_f64, 0.0..0.02_f64, 0.0..0.02_f64, 1u64..1_000_000), min_len..max_len)
        .prop_map(|steps| {
            let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
            let mut price = 50.0_f64;
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (ret, up, down, volume))| {
                    let open = price;
                    let close = price * (1.0 + ret);
                    price = close;
                    Bar {
                        date: base + chrono::Duration::days(i as i64),
                        open,
                        high: open.max(close) * (1.0 + up),
                        low: open.min(close) * (1.0 - down),
                        close,
                        volume,
                    }
                })
                .collect()
        })
}

fn arb_params() -> impl Strategy<Value = ScanParams> {
    (1usize..12, 1usize..20, 1usize..30, 0usize..15, 1usize..12, any::<bool>()).prop_map(
        |(tenkan, kijun, senkou, shift, lookback, strict_cross)| ScanParams {
            tenkan_period: tenkan,
            kijun_period: kijun,
            senkou_period: senkou,
            senkou_shift: shift,
            lookback_not_above: lookback,
            min_price: 0.0,
            strict_cross,
        },
    )
}

// ── 1–2. Indicator engine ────────────────────────────────────────────

proptest! {
    #[test]
    fn cloud_top_never_below_cloud_bottom(bars in arb_bars(1, 200), params in arb_params()) {
        let s = params.ichimoku().compute(&bars);
        for i in 0..s.len() {
            let (top, bottom) = (s.cloud_top[i], s.cloud_bottom[i]);
            prop_assert_eq!(top.is_nan(), bottom.is_nan());
            if !top.is_nan() {
                prop_assert!(top >= bottom);
            }
        }
    }

    #[test]
    fn first_shift_entries_are_undefined(bars in arb_bars(1, 120), shift_by in 0usize..40) {
        let s = Ichimoku::new(1, 1, 1, shift_by).compute(&bars);
        for i in 0..shift_by.min(bars.len()) {
            prop_assert!(s.senkou_a[i].is_nan());
            prop_assert!(s.senkou_b[i].is_nan());
        }
        if shift_by < bars.len() {
            let expected = (bars[0].high + bars[0].low) / 2.0;
            prop_assert_eq!(s.senkou_b[shift_by], expected);
        }
    }

    #[test]
    fn shift_back_and_forth_restores_interior(values in prop::collection::vec(-1e6..1e6_f64, 1..100), k in 0isize..20) {
        let round_trip = shift(&shift(&values, k), -k);
        let n = values.len();
        let k = k as usize;
        for i in 0..n.saturating_sub(k) {
            prop_assert_eq!(round_trip[i], values[i]);
        }
    }
}

// ── 3–5. Breakout detector ───────────────────────────────────────────

proptest! {
    #[test]
    fn matches_close_strictly_above_and_first_in_window(
        bars in arb_bars(2, 150),
        params in arb_params(),
    ) {
        let series = BarSeries::new("PROP", bars).unwrap();
        let ichi = params.ichimoku().compute(series.bars());
        if let Some(rec) = BreakoutDetector::new(params.clone()).scan_symbol(&series) {
            let n = series.len();
            let y = n - 2;
            prop_assert_eq!(rec.match_date, series.bars()[y].date);
            prop_assert!(rec.close > rec.cloud_top);
            prop_assert!(rec.cloud_top >= rec.cloud_bottom);
            prop_assert!(rec.distance_pct > 0.0);
            prop_assert!(y >= params.lookback_not_above);
            for i in y - params.lookback_not_above..y {
                prop_assert!(!(series.bars()[i].close > ichi.cloud_top[i]));
            }
            if params.strict_cross {
                prop_assert!(series.bars()[y - 1].close <= ichi.cloud_top[y - 1]);
            }
        }
    }

    #[test]
    fn detection_is_deterministic(bars in arb_bars(2, 150), params in arb_params()) {
        let series = BarSeries::new("PROP", bars).unwrap();
        let det = BreakoutDetector::new(params);
        prop_assert_eq!(det.evaluate_series(&series), det.evaluate_series(&series.clone()));
    }

    #[test]
    fn relaxing_strict_cross_never_loses_matches(bars in arb_bars(3, 150), params in arb_params()) {
        let series = BarSeries::new("PROP", bars).unwrap();
        let strict = BreakoutDetector::new(ScanParams { strict_cross: true, ..params.clone() });
        let relaxed = BreakoutDetector::new(ScanParams { strict_cross: false, ..params });
        if strict.scan_symbol(&series).is_some() {
            prop_assert!(relaxed.scan_symbol(&series).is_some());
        }
    }
}

// ── 6. Filter chain ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn disabled_filters_never_change_verdict(
        bars in arb_bars(3, 80),
        min_price in 0.0..100.0_f64,
        min_dv in 0.0..5e7_f64,
    ) {
        let series = BarSeries::new("PROP", bars).unwrap();
        let params = ScanParams {
            tenkan_period: 1,
            kijun_period: 1,
            senkou_period: 1,
            senkou_shift: 1,
            lookback_not_above: 1,
            min_price: 0.0,
            strict_cross: false,
        };
        let ichi = params.ichimoku().compute(series.bars());
        let Ok(rec) = ichiscan_core::detector::evaluate("PROP", series.bars(), &ichi, &params) else {
            return Ok(());
        };

        let mut base = FilterChain::new();
        base.register("price", Filter::MinPrice { min: min_price }, true).unwrap();
        base.register("volume", Filter::MinDollarVolume { min: min_dv }, true).unwrap();

        let mut with_disabled = base.clone();
        with_disabled
            .register("never", Filter::Custom(CustomFilter::new(|_, _, _| Ok(false))), false)
            .unwrap();

        prop_assert_eq!(
            base.apply("PROP", &series, &rec),
            with_disabled.apply("PROP", &series, &rec)
        );
    }
}
