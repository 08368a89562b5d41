//! Durable history: bars, indicator snapshots, verdicts and run bookkeeping.
//!
//! Portable surface; the SQLite implementation lives in [`sqlite`].
//!
//! Every write is an upsert keyed by `(symbol, date)` that reports how many rows
//! it actually changed, so re-writing identical data returns `0`. Bars are
//! immutable once stored: an upsert that would change a stored bar fails with
//! [`StoreError::BarConflict`] and writes nothing.

pub mod sqlite;

use chrono::NaiveDate;
use market_data_ingestor::Bar;
use serde::Serialize;
use signal_engine::{IndicatorSnapshot, Verdict};

pub use crate::models::SymbolStatus;
pub use sqlite::SqliteStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),

    #[error("stored bar {symbol} {date} differs from the incoming one")]
    BarConflict { symbol: String, date: NaiveDate },

    #[error("row for {found} passed to an upsert for {expected}")]
    ForeignSymbol { expected: String, found: String },

    #[error(transparent)]
    Decode(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Latest persisted state of one symbol, for the read side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestView {
    pub bar: Bar,
    pub snapshot: Option<IndicatorSnapshot>,
    pub verdict: Option<Verdict>,
}

/// What a run records about one symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusUpdate<'a> {
    pub outcome: &'a str,
    pub last_error: Option<&'a str>,
    /// Whether this run left the symbol's history consistent with the provider.
    pub success: bool,
}

pub trait WatchlistStore {
    /// Date of the newest stored bar.
    fn last_bar_date(&mut self, symbol: &str) -> StoreResult<Option<NaiveDate>>;

    /// The newest `n` bars, oldest first.
    fn bars_tail(&mut self, symbol: &str, n: usize) -> StoreResult<Vec<Bar>>;

    fn upsert_bars(&mut self, symbol: &str, bars: &[Bar]) -> StoreResult<usize>;

    fn upsert_snapshots(&mut self, symbol: &str, snapshots: &[IndicatorSnapshot]) -> StoreResult<usize>;

    fn upsert_verdicts(&mut self, symbol: &str, verdicts: &[Verdict]) -> StoreResult<usize>;

    fn read_latest(&mut self, symbol: &str) -> StoreResult<Option<LatestView>>;

    /// [`read_latest`](Self::read_latest) for every symbol with stored bars, by symbol.
    fn read_latest_all(&mut self) -> StoreResult<Vec<LatestView>>;

    /// Latest verdict per symbol where it is a reversal candidate, lowest RSI first.
    fn list_candidates(&mut self) -> StoreResult<Vec<Verdict>>;

    /// Stored bar count per symbol, by symbol.
    fn bar_counts(&mut self) -> StoreResult<Vec<(String, i64)>>;

    fn status(&mut self, symbol: &str) -> StoreResult<Option<SymbolStatus>>;

    fn record_status(
        &mut self,
        symbol: &str,
        update: StatusUpdate<'_>,
        at: chrono::DateTime<chrono::Utc>,
    ) -> StoreResult<()>;
}
