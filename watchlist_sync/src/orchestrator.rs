//! One ingestion run over the watchlist.
//!
//! Per symbol: find the newest stored bar, fetch only the gap up to the last
//! completed session,
//! screen the new bars against stored history, recompute indicators over a
//! trailing window, and upsert bars, snapshots and verdicts for the new dates.
//! Symbols are processed one at a time; the fetcher's rate limiter is the only
//! point where a run waits.
//!
//! Fetch failures are per-symbol and the run moves on. Store failures and
//! engine errors abort the run: the latter mean malformed bars slipped past the
//! integrity gate, and nothing derived from them is written.

use std::fmt;

use anyhow::Context;
use chrono::{DateTime, Days, NaiveDate, Utc};
use market_data_ingestor::{
    FetchError, HistoryFetcher,
    clock::{Clock, TokioClock},
};
use signal_engine::{IndicatorParams, Thresholds, Verdict, classify, compute};
use tracing::{info, warn};

use crate::{
    config::SyncConfig,
    integrity,
    store::{StatusUpdate, WatchlistStore},
    tz,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    /// Stored history already reaches the last completed session (or was
    /// refreshed recently); no call made.
    UpToDate,
    /// The provider had nothing beyond what is stored.
    NoNewData,
    Updated { new_bars: usize },
    /// Some fetched bars failed the integrity gate; the valid prefix was kept.
    Incomplete { new_bars: usize, reason: String },
    Failed { transient: bool, error: String },
}

impl SymbolOutcome {
    /// Stable code stored in `symbol_status.outcome`.
    pub fn code(&self) -> &'static str {
        match self {
            SymbolOutcome::UpToDate => "up_to_date",
            SymbolOutcome::NoNewData => "no_new_data",
            SymbolOutcome::Updated { .. } => "updated",
            SymbolOutcome::Incomplete { .. } => "incomplete",
            SymbolOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SymbolOutcome::UpToDate | SymbolOutcome::NoNewData | SymbolOutcome::Updated { .. }
        )
    }

    fn error_message(&self) -> Option<&str> {
        match self {
            SymbolOutcome::Incomplete { reason, .. } => Some(reason.as_str()),
            SymbolOutcome::Failed { error, .. } => Some(error.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolReport {
    pub symbol: String,
    pub outcome: SymbolOutcome,
    /// Bar, snapshot and verdict rows this run inserted or changed.
    pub rows_changed: usize,
    /// Verdict for the newest date added by this run.
    pub latest: Option<Verdict>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub reports: Vec<SymbolReport>,
}

impl RunSummary {
    pub fn rows_changed(&self) -> usize {
        self.reports.iter().map(|r| r.rows_changed).sum()
    }

    pub fn count(&self, code: &str) -> usize {
        self.reports.iter().filter(|r| r.outcome.code() == code).count()
    }

    pub fn report(&self, symbol: &str) -> Option<&SymbolReport> {
        self.reports.iter().find(|r| r.symbol == symbol)
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Verdict> {
        self.reports
            .iter()
            .filter_map(|r| r.latest.as_ref())
            .filter(|v| v.is_reversal_candidate)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.reports {
            write!(f, "{:<6} {:<12} rows={}", r.symbol, r.outcome.code(), r.rows_changed)?;
            if let Some(msg) = r.outcome.error_message() {
                write!(f, " error={msg}")?;
            }
            if let Some(v) = r.latest.as_ref().filter(|v| v.is_reversal_candidate) {
                write!(f, " reversal_candidate rsi={:.2}", v.rsi.unwrap_or(f64::NAN))?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "{} symbols: {} updated, {} no new data, {} up to date, {} incomplete, {} failed; {} rows changed",
            self.reports.len(),
            self.count("updated"),
            self.count("no_new_data"),
            self.count("up_to_date"),
            self.count("incomplete"),
            self.count("failed"),
            self.rows_changed()
        )
    }
}

pub struct Orchestrator<S, C: Clock = TokioClock> {
    store: S,
    fetcher: HistoryFetcher<C>,
    params: IndicatorParams,
    thresholds: Thresholds,
    history_days: usize,
    stale_after: Option<chrono::Duration>,
}

impl<S: WatchlistStore, C: Clock> Orchestrator<S, C> {
    pub fn new(store: S, fetcher: HistoryFetcher<C>, config: &SyncConfig) -> Self {
        Self {
            store,
            fetcher,
            params: config.indicator_params(),
            thresholds: config.thresholds(),
            history_days: config.history_days,
            stale_after: config.stale_after(),
        }
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Bars reloaded from the store to seed the indicators.
    pub fn window_len(&self) -> usize {
        self.params.warmup_bars().max(self.history_days)
    }

    pub async fn run(&mut self, symbols: &[String]) -> anyhow::Result<RunSummary> {
        self.run_at(symbols, Utc::now()).await
    }

    /// Runs as if the wall clock read `now`.
    ///
    /// Only sessions closed by `now` are fetched, so a bar is stored once it
    /// is final and never revisited.
    pub async fn run_at(&mut self, symbols: &[String], now: DateTime<Utc>) -> anyhow::Result<RunSummary> {
        let through = tz::last_completed_session(now);
        info!(
            symbols = symbols.len(),
            %through,
            provider = self.fetcher.provider_name(),
            "ingestion run started"
        );

        let mut summary = RunSummary::default();
        for symbol in symbols {
            let report = self
                .sync_symbol(symbol, through, now)
                .await
                .with_context(|| format!("syncing {symbol}"))?;
            summary.reports.push(report);
        }

        info!(
            updated = summary.count("updated"),
            no_new_data = summary.count("no_new_data"),
            up_to_date = summary.count("up_to_date"),
            incomplete = summary.count("incomplete"),
            failed = summary.count("failed"),
            rows_changed = summary.rows_changed(),
            "ingestion run finished"
        );
        Ok(summary)
    }

    async fn sync_symbol(
        &mut self,
        symbol: &str,
        through: NaiveDate,
        now: DateTime<Utc>,
    ) -> anyhow::Result<SymbolReport> {
        if self.refreshed_recently(symbol, now)? {
            info!(symbol, "refreshed recently, skipping");
            return Ok(report(symbol, SymbolOutcome::UpToDate, 0, None));
        }

        let last = self.store.last_bar_date(symbol)?;
        let start = match last {
            Some(last) => last.checked_add_days(Days::new(1)),
            None => Some(backfill_start(through, self.history_days)?),
        };
        let Some(start) = start.filter(|start| *start <= through) else {
            return self.finish(symbol, SymbolOutcome::UpToDate, 0, None, now);
        };

        let fetched = match self.fetcher.fetch(symbol, start, through).await {
            Ok(bars) => bars,
            Err(err) => {
                warn!(symbol, transient = err.is_transient(), error = %err, "fetch failed");
                let outcome = failed(&err);
                return self.finish(symbol, outcome, 0, None, now);
            }
        };

        let tail = self.store.bars_tail(symbol, self.window_len())?;
        let screened = integrity::screen(symbol, &tail, fetched);
        if let Some(rejection) = &screened.rejection {
            warn!(
                symbol,
                accepted = screened.accepted.len(),
                error = %rejection,
                "fetched bars rejected by integrity gate"
            );
        }
        if screened.accepted.is_empty() {
            let outcome = match screened.rejection {
                Some(rejection) => SymbolOutcome::Incomplete {
                    new_bars: 0,
                    reason: rejection.to_string(),
                },
                None => SymbolOutcome::NoNewData,
            };
            return self.finish(symbol, outcome, 0, None, now);
        }

        let new_bars = screened.accepted.len();
        let mut series = tail;
        series.extend(screened.accepted);
        let snapshots = compute(&self.params, &series)
            .with_context(|| format!("computing indicators for {symbol}"))?;

        let first_new = series.len() - new_bars;
        let new_snapshots = &snapshots[first_new..];
        let verdicts: Vec<Verdict> = new_snapshots
            .iter()
            .map(|s| classify(s, &self.thresholds))
            .collect();

        let mut rows_changed = self.store.upsert_bars(symbol, &series[first_new..])?;
        rows_changed += self.store.upsert_snapshots(symbol, new_snapshots)?;
        rows_changed += self.store.upsert_verdicts(symbol, &verdicts)?;

        let latest = verdicts.last().cloned();
        if let Some(v) = latest.as_ref().filter(|v| v.is_reversal_candidate) {
            info!(symbol, date = %v.date, rsi = v.rsi, decline_pct = v.decline_pct, "reversal candidate");
        }

        let outcome = match screened.rejection {
            Some(rejection) => SymbolOutcome::Incomplete {
                new_bars,
                reason: rejection.to_string(),
            },
            None => SymbolOutcome::Updated { new_bars },
        };
        self.finish(symbol, outcome, rows_changed, latest, now)
    }

    fn refreshed_recently(&mut self, symbol: &str, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let Some(stale_after) = self.stale_after else {
            return Ok(false);
        };
        let status = self.store.status(symbol)?;
        Ok(status
            .and_then(|s| s.last_success_at)
            .is_some_and(|at| now - at < stale_after))
    }

    fn finish(
        &mut self,
        symbol: &str,
        outcome: SymbolOutcome,
        rows_changed: usize,
        latest: Option<Verdict>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<SymbolReport> {
        self.store.record_status(
            symbol,
            StatusUpdate {
                outcome: outcome.code(),
                last_error: outcome.error_message(),
                success: outcome.is_success(),
            },
            now,
        )?;
        info!(symbol, outcome = outcome.code(), rows_changed, "symbol synced");
        Ok(report(symbol, outcome, rows_changed, latest))
    }
}

/// First day of the initial backfill for a symbol with no stored bars.
fn backfill_start(through: NaiveDate, history_days: usize) -> anyhow::Result<NaiveDate> {
    u64::try_from(history_days)
        .ok()
        .and_then(|days| through.checked_sub_days(Days::new(days)))
        .with_context(|| format!("history_days = {history_days} reaches past the earliest representable date"))
}

fn failed(err: &FetchError) -> SymbolOutcome {
    SymbolOutcome::Failed {
        transient: err.is_transient(),
        error: err.to_string(),
    }
}

fn report(symbol: &str, outcome: SymbolOutcome, rows_changed: usize, latest: Option<Verdict>) -> SymbolReport {
    SymbolReport {
        symbol: symbol.to_string(),
        outcome,
        rows_changed,
        latest,
    }
}
