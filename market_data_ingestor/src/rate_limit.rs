//! Sliding-window rate limiter for the upstream data provider.
//!
//! The limiter keeps the instants of past grants. On [`RateLimiter::acquire`]
//! it evicts grants that have left the trailing window; if `max_calls` grants
//! remain, it sleeps until the oldest one expires and checks again. No trailing
//! window of length `window` ever contains more than `max_calls` grants.
//!
//! The grant log sits behind a `tokio::sync::Mutex` that is held across the
//! sleep, so concurrent callers (if symbols are ever fetched in parallel) are
//! served strictly in arrival order and the limiter stays the single arbiter
//! of the budget.

use std::{
    collections::VecDeque,
    num::NonZeroU32,
    time::{Duration, Instant},
};

use nonzero_ext::nonzero;
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::{Clock, TokioClock};

/// Length of the trailing window the budget applies to.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct RateLimiter<C: Clock = TokioClock> {
    max_calls: NonZeroU32,
    window: Duration,
    clock: C,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter<TokioClock> {
    /// `max_calls` per rolling minute on wall-clock time.
    pub fn per_minute(max_calls: NonZeroU32) -> Self {
        Self::with_clock(max_calls, DEFAULT_WINDOW, TokioClock)
    }
}

impl Default for RateLimiter<TokioClock> {
    fn default() -> Self {
        // Free-tier budget of the default provider.
        Self::per_minute(nonzero!(5u32))
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(max_calls: NonZeroU32, window: Duration, clock: C) -> Self {
        Self {
            max_calls,
            window,
            clock,
            grants: Mutex::new(VecDeque::with_capacity(max_calls.get() as usize)),
        }
    }

    /// Waits until one more call fits the budget, then records the grant.
    ///
    /// Never fails; it can only delay.
    pub async fn acquire(&self) {
        let mut grants = self.grants.lock().await;
        let max = self.max_calls.get() as usize;

        loop {
            let now = self.clock.now();
            while grants
                .front()
                .is_some_and(|t| now.duration_since(*t) >= self.window)
            {
                grants.pop_front();
            }

            match grants.front().copied() {
                Some(oldest) if grants.len() >= max => {
                    let wait = self.window - now.duration_since(oldest);
                    debug!(
                        wait_ms = wait.as_millis() as u64,
                        in_window = grants.len(),
                        "rate budget exhausted, waiting"
                    );
                    self.clock.sleep(wait).await;
                }
                _ => {
                    grants.push_back(now);
                    return;
                }
            }
        }
    }

    /// Grants still inside the trailing window.
    pub async fn in_window(&self) -> usize {
        let now = self.clock.now();
        let grants = self.grants.lock().await;
        grants
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }

    pub fn max_calls(&self) -> NonZeroU32 {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// The clock this limiter runs on; the fetcher sleeps its retry backoff here too.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}
