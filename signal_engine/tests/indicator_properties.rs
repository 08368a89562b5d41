use chrono::{Days, NaiveDate};
use market_data_ingestor::Bar;
use proptest::prelude::*;
use signal_engine::{IndicatorParams, IndicatorSnapshot, IndicatorState, Thresholds, classify, compute};

fn series(symbol: &str, closes: &[f64]) -> Vec<Bar> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| Bar {
            symbol: symbol.to_string(),
            date: start + Days::new(i as u64),
            open: *close,
            high: *close,
            low: *close,
            close: *close,
            volume: 1_000.0,
        })
        .collect()
}

fn close_enough(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => (x - y).abs() <= 1e-9,
        _ => false,
    }
}

fn same_snapshot(a: &IndicatorSnapshot, b: &IndicatorSnapshot) -> bool {
    a.date == b.date
        && close_enough(a.rsi, b.rsi)
        && close_enough(a.sma, b.sma)
        && close_enough(a.pct_change_5d, b.pct_change_5d)
        && close_enough(a.pct_change_10d, b.pct_change_10d)
        && close_enough(a.decline_pct, b.decline_pct)
}

fn params_strategy() -> impl Strategy<Value = IndicatorParams> {
    (1usize..20, 1usize..25, 1usize..15).prop_map(|(rsi_period, sma_period, decline_lookback_days)| {
        IndicatorParams {
            rsi_period,
            sma_period,
            decline_lookback_days,
        }
    })
}

proptest! {
    #[test]
    fn snapshots_ignore_later_bars(
        params in params_strategy(),
        closes in prop::collection::vec(1.0f64..500.0, 1..60),
        cut in 0usize..60,
    ) {
        let bars = series("AAPL", &closes);
        let cut = cut.min(bars.len());
        let full = compute(&params, &bars).unwrap();
        let prefix = compute(&params, &bars[..cut]).unwrap();
        prop_assert_eq!(&full[..cut], &prefix[..]);
    }

    #[test]
    fn extending_by_one_bar_matches_full_recompute(
        params in params_strategy(),
        closes in prop::collection::vec(1.0f64..500.0, 2..60),
    ) {
        let bars = series("AAPL", &closes);
        let (last, head) = bars.split_last().unwrap();

        let mut state = IndicatorState::new("AAPL", &params).unwrap();
        for bar in head {
            state.push(bar).unwrap();
        }
        let extended = state.push(last).unwrap();

        let full = compute(&params, &bars).unwrap();
        prop_assert!(same_snapshot(full.last().unwrap(), &extended));
    }

    #[test]
    fn rsi_stays_in_bounds(closes in prop::collection::vec(1.0f64..500.0, 1..80)) {
        let snaps = compute(&IndicatorParams::default(), &series("AAPL", &closes)).unwrap();
        for rsi in snaps.iter().filter_map(|s| s.rsi) {
            prop_assert!((0.0..=100.0).contains(&rsi));
        }
    }

    #[test]
    fn non_decreasing_prices_give_rsi_one_hundred(
        steps in prop::collection::vec(0.0f64..5.0, 15..40),
    ) {
        let mut close = 50.0;
        let closes: Vec<f64> = steps.iter().map(|s| { close += s; close }).collect();
        let snaps = compute(&IndicatorParams::default(), &series("AAPL", &closes)).unwrap();
        for rsi in snaps.iter().filter_map(|s| s.rsi) {
            prop_assert_eq!(rsi, 100.0);
        }
    }
}

#[test]
fn steady_decline_is_a_reversal_candidate() {
    let closes: Vec<f64> = (0..20).map(|i| 100.0 - 2.0 * i as f64).collect();
    assert_eq!(closes.last(), Some(&62.0));

    let snaps = compute(&IndicatorParams::default(), &series("INTC", &closes)).unwrap();
    assert!(snaps[..19].iter().all(|s| s.sma.is_none()));

    let last = snaps.last().unwrap();
    assert_eq!(last.sma, Some(81.0));
    assert_eq!(last.rsi, Some(0.0));
    // 62 against the close ten sessions earlier (82).
    let decline = last.decline_pct.unwrap();
    assert!((decline - (62.0 - 82.0) / 82.0 * 100.0).abs() < 1e-9);
    assert!((last.pct_change_5d.unwrap() - (62.0 - 72.0) / 72.0 * 100.0).abs() < 1e-9);

    let verdict = classify(last, &Thresholds::default());
    assert!(verdict.is_oversold);
    assert!(verdict.is_reversal_candidate);
    assert!(!verdict.is_overbought);
}

#[test]
fn rsi_at_threshold_is_not_oversold() {
    let snapshot = IndicatorSnapshot {
        symbol: "AAPL".into(),
        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        rsi: Some(30.0),
        sma: None,
        pct_change_5d: None,
        pct_change_10d: Some(-25.0),
        decline_pct: Some(-25.0),
    };
    let verdict = classify(&snapshot, &Thresholds::default());
    assert!(!verdict.is_oversold);
    assert!(!verdict.is_reversal_candidate);
}

#[test]
fn recompute_is_deterministic() {
    let closes: Vec<f64> = (0..40).map(|i| 100.0 + ((i * 7) % 11) as f64).collect();
    let bars = series("AAPL", &closes);
    let params = IndicatorParams::default();
    assert_eq!(compute(&params, &bars).unwrap(), compute(&params, &bars).unwrap());
}
