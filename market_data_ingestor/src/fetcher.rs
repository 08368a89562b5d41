//! Rate-limited, retrying history fetcher.
//!
//! Every provider call, whether a first page, a follow-up page or a retry,
//! first takes a grant from the shared [`RateLimiter`]. Retryable failures back
//! off exponentially on the limiter's clock, up to [`RetryPolicy::max_attempts`]
//! per page; anything else is returned at once, so a bad symbol or key never
//! burns more of the budget.

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use chrono::NaiveDate;
use nonzero_ext::nonzero;
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::{
    clock::{Clock, TokioClock},
    errors::FetchError,
    models::{bar::Bar, request_params::BarsRequest},
    normalize::normalize_rows,
    providers::{BarsPage, DataProvider, NormalizeSnafu, ValidationSnafu},
    rate_limit::RateLimiter,
};

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: NonZeroU32,
    /// Delay after the first failed attempt; doubles after each further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: nonzero!(3u32),
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

pub struct HistoryFetcher<C: Clock = TokioClock> {
    provider: Box<dyn DataProvider>,
    limiter: Arc<RateLimiter<C>>,
    retry: RetryPolicy,
}

impl<C: Clock> HistoryFetcher<C> {
    pub fn new(provider: Box<dyn DataProvider>, limiter: Arc<RateLimiter<C>>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            limiter,
            retry,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter<C>> {
        &self.limiter
    }

    /// Fetches and normalizes daily bars for `symbol` over `start..=end`.
    ///
    /// Bars come back in provider order (ascending is requested); ordering and
    /// consistency with persisted history are checked by the caller.
    pub async fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, FetchError> {
        if start > end {
            let source = ValidationSnafu {
                message: format!("start {start} is after end {end}"),
            }
            .build();
            return Err(FetchError::Permanent {
                symbol: symbol.to_string(),
                source,
            });
        }

        let request = BarsRequest::new(symbol, start, end);
        let mut rows = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let page = self.fetch_page(&request, cursor.as_deref()).await?;
            pages += 1;
            rows.extend(page.rows);
            match page.next_page {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let normalized = normalize_rows(symbol, rows)
            .context(NormalizeSnafu)
            .map_err(|source| FetchError::Permanent {
                symbol: symbol.to_string(),
                source,
            })?;

        if normalized.dropped_incomplete > 0 {
            debug!(
                symbol,
                dropped = normalized.dropped_incomplete,
                "dropped provider rows with missing OHLCV fields"
            );
        }
        debug!(symbol, pages, bars = normalized.bars.len(), "history fetched");
        Ok(normalized.bars)
    }

    /// One page under the rate budget, retried on retryable failures.
    async fn fetch_page(&self, request: &BarsRequest, cursor: Option<&str>) -> Result<BarsPage, FetchError> {
        let symbol = request.symbol.as_str();
        let max_attempts = self.retry.max_attempts.get();
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.limiter.acquire().await;

            match self.provider.fetch_page(request, cursor).await {
                Ok(page) => return Ok(page),
                Err(source) if source.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        symbol,
                        provider = self.provider.name(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %source,
                        "transient fetch failure, backing off"
                    );
                    self.limiter.clock().sleep(delay).await;
                }
                Err(source) if source.is_retryable() => {
                    return Err(FetchError::Transient {
                        symbol: symbol.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(source) => {
                    return Err(FetchError::Permanent {
                        symbol: symbol.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use super::*;
    use crate::{
        clock::ManualClock,
        models::raw::{RawBar, RawDate},
        providers::{ApiSnafu, ProviderError, StatusSnafu},
    };

    type ScriptedPage = Result<BarsPage, ProviderError>;

    /// Replays scripted pages and counts calls.
    struct Scripted {
        script: Mutex<VecDeque<ScriptedPage>>,
        calls: Arc<Mutex<u32>>,
    }

    #[async_trait]
    impl DataProvider for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_page(&self, _request: &BarsRequest, _cursor: Option<&str>) -> Result<BarsPage, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(BarsPage::default()))
        }
    }

    fn page(rows: Vec<RawBar>) -> ScriptedPage {
        Ok(BarsPage::last(rows))
    }

    fn page_then(rows: Vec<RawBar>, next: &str) -> ScriptedPage {
        Ok(BarsPage {
            rows,
            next_page: Some(next.to_string()),
        })
    }

    fn server_error() -> ScriptedPage {
        StatusSnafu {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "try later",
        }
        .fail()
    }

    fn one_row(date: &str, close: Option<f64>) -> RawBar {
        RawBar {
            date: RawDate::Text(date.into()),
            open: Some(10.0),
            high: Some(11.0),
            low: Some(9.0),
            close,
            volume: Some(500.0),
        }
    }

    fn fetcher(script: Vec<ScriptedPage>) -> (HistoryFetcher<ManualClock>, ManualClock, Arc<Mutex<u32>>) {
        fetcher_with_budget(script, 5)
    }

    fn fetcher_with_budget(
        script: Vec<ScriptedPage>,
        max_calls: u32,
    ) -> (HistoryFetcher<ManualClock>, ManualClock, Arc<Mutex<u32>>) {
        let clock = ManualClock::new();
        let calls = Arc::new(Mutex::new(0));
        let provider = Scripted {
            script: Mutex::new(script.into()),
            calls: calls.clone(),
        };
        let limiter = Arc::new(RateLimiter::with_clock(
            NonZeroU32::new(max_calls).unwrap(),
            Duration::from_secs(60),
            clock.clone(),
        ));
        (
            HistoryFetcher::new(Box::new(provider), limiter, RetryPolicy::default()),
            clock,
            calls,
        )
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn normalizes_and_drops_incomplete_rows() {
        let (f, _clock, calls) = fetcher(vec![page(vec![
            one_row("2024-01-02", Some(10.5)),
            one_row("2024-01-03", None),
        ])]);
        let bars = f.fetch("AAPL", ymd(2024, 1, 2), ymd(2024, 1, 3)).await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, ymd(2024, 1, 2));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn transient_errors_retry_with_exponential_backoff() {
        let (f, clock, calls) = fetcher(vec![
            server_error(),
            server_error(),
            page(vec![one_row("2024-01-02", Some(10.5))]),
        ]);
        let bars = f.fetch("AAPL", ymd(2024, 1, 2), ymd(2024, 1, 2)).await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert_eq!(f.limiter().in_window().await, 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_transient_error() {
        let (f, _clock, calls) = fetcher(vec![server_error(), server_error(), server_error(), server_error()]);
        let err = f.fetch("AAPL", ymd(2024, 1, 2), ymd(2024, 1, 2)).await.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, FetchError::Transient { attempts: 3, .. }));
        assert_eq!(err.symbol(), "AAPL");
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn permanent_error_stops_without_spending_more_budget() {
        let (f, clock, calls) = fetcher(vec![
            ApiSnafu { message: "unknown ticker" }.fail(),
            page(vec![one_row("2024-01-02", Some(10.5))]),
        ]);
        let err = f.fetch("NOPE", ymd(2024, 1, 2), ymd(2024, 1, 2)).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(f.limiter().in_window().await, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn undecodable_dates_are_permanent() {
        let (f, _clock, _calls) = fetcher(vec![page(vec![one_row("02/01/2024", Some(1.0))])]);
        let err = f.fetch("AAPL", ymd(2024, 1, 2), ymd(2024, 1, 2)).await.unwrap_err();
        assert!(matches!(err, FetchError::Permanent { .. }));
    }

    #[tokio::test]
    async fn inverted_range_is_rejected_before_any_call() {
        let (f, _clock, calls) = fetcher(vec![]);
        let err = f.fetch("AAPL", ymd(2024, 1, 5), ymd(2024, 1, 2)).await.unwrap_err();
        assert!(matches!(err, FetchError::Permanent { .. }));
        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(f.limiter().in_window().await, 0);
    }

    #[tokio::test]
    async fn every_page_takes_its_own_grant() {
        let (f, clock, calls) = fetcher_with_budget(
            vec![
                page_then(vec![one_row("2024-01-02", Some(10.5))], "p2"),
                page_then(vec![one_row("2024-01-03", Some(10.6))], "p3"),
                page(vec![one_row("2024-01-04", Some(10.7))]),
            ],
            1,
        );
        let bars = f.fetch("AAPL", ymd(2024, 1, 2), ymd(2024, 1, 4)).await.unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(*calls.lock().unwrap(), 3);
        // One call per minute: the second and third pages each wait a full window.
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60), Duration::from_secs(60)]);
        assert_eq!(clock.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn a_failed_follow_up_page_is_retried_without_refetching_earlier_pages() {
        let (f, clock, calls) = fetcher(vec![
            page_then(vec![one_row("2024-01-02", Some(10.5))], "p2"),
            server_error(),
            page(vec![one_row("2024-01-03", Some(10.6))]),
        ]);
        let bars = f.fetch("AAPL", ymd(2024, 1, 2), ymd(2024, 1, 3)).await.unwrap();
        assert_eq!(
            bars.iter().map(|b| b.date).collect::<Vec<_>>(),
            vec![ymd(2024, 1, 2), ymd(2024, 1, 3)]
        );
        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(f.limiter().in_window().await, 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy {
            max_attempts: NonZeroU32::new(4).unwrap(),
            base_delay: Duration::from_millis(250),
        };
        assert_eq!(p.delay_after(1), Duration::from_millis(250));
        assert_eq!(p.delay_after(2), Duration::from_millis(500));
        assert_eq!(p.delay_after(3), Duration::from_millis(1000));
    }
}
