use std::{num::NonZeroU32, time::Duration};

use market_data_ingestor::{RateLimiter, clock::ManualClock};
use proptest::prelude::*;

/// Drives the limiter on a virtual clock. Returns `(requested_at, granted_at)`
/// for each call, measured from the clock's origin.
fn simulate(max_calls: u32, window_secs: u64, gaps_ms: &[u64]) -> Vec<(Duration, Duration)> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(async {
        let clock = ManualClock::new();
        let limiter = RateLimiter::with_clock(
            NonZeroU32::new(max_calls).unwrap(),
            Duration::from_secs(window_secs),
            clock.clone(),
        );
        let mut log = Vec::with_capacity(gaps_ms.len());
        for gap in gaps_ms {
            clock.advance(Duration::from_millis(*gap));
            let requested = clock.elapsed();
            limiter.acquire().await;
            log.push((requested, clock.elapsed()));
        }
        log
    })
}

proptest! {
    #[test]
    fn no_window_holds_more_than_the_budget(
        max_calls in 1u32..6,
        window_secs in 1u64..120,
        gaps_ms in prop::collection::vec(0u64..30_000, 1..40),
    ) {
        let log = simulate(max_calls, window_secs, &gaps_ms);
        let window = Duration::from_secs(window_secs);
        let grants: Vec<Duration> = log.iter().map(|(_, g)| *g).collect();

        for (i, start) in grants.iter().enumerate() {
            let in_window = grants[i..].iter().filter(|g| **g - *start < window).count();
            prop_assert!(in_window <= max_calls as usize, "{in_window} grants within {window:?} of {start:?}");
        }
    }

    #[test]
    fn grants_never_precede_requests_and_stay_ordered(
        max_calls in 1u32..6,
        window_secs in 1u64..120,
        gaps_ms in prop::collection::vec(0u64..30_000, 1..40),
    ) {
        let log = simulate(max_calls, window_secs, &gaps_ms);
        for (requested, granted) in &log {
            prop_assert!(granted >= requested);
        }
        for pair in log.windows(2) {
            prop_assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn calls_within_budget_are_never_delayed(
        max_calls in 1u32..6,
        gaps_ms in prop::collection::vec(0u64..1_000, 1..6),
    ) {
        prop_assume!(gaps_ms.len() <= max_calls as usize);
        let log = simulate(max_calls, 60, &gaps_ms);
        for (requested, granted) in log {
            prop_assert_eq!(requested, granted);
        }
    }
}
