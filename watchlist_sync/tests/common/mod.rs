#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use market_data_ingestor::{
    Bar, HistoryFetcher, RateLimiter, RetryPolicy,
    clock::ManualClock,
    models::{
        raw::{RawBar, RawDate},
        request_params::BarsRequest,
    },
    providers::{ApiSnafu, BarsPage, DataProvider, ProviderError, StatusSnafu},
};
use tempfile::TempDir;
use watchlist_sync::{
    config::SyncConfig,
    db::{connection, migrate},
    orchestrator::Orchestrator,
    store::SqliteStore,
};

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_sqlite(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn setup_store() -> (TestDb, SqliteStore) {
    let (db, conn) = setup_db();
    (db, SqliteStore::from_connection(conn))
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal");

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

/// 2024-01-01 plus `n` days.
pub fn day(n: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(n)
}

/// After the close in New York on `date`.
pub fn evening_of(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(22, 0, 0).unwrap())
}

/// 11:00 in New York on `date` (EST), mid-session.
pub fn midday_of(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(16, 0, 0).unwrap())
}

pub fn bar(symbol: &str, date: NaiveDate, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        date,
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 1_000_000.0,
    }
}

/// One bar per calendar day from `day(0)`, closes given in order.
pub fn history(symbol: &str, closes: impl IntoIterator<Item = f64>) -> Vec<Bar> {
    closes
        .into_iter()
        .enumerate()
        .map(|(i, close)| bar(symbol, day(i as u64), close))
        .collect()
}

fn raw(bar: &Bar) -> RawBar {
    RawBar {
        date: RawDate::Text(bar.date.format("%Y-%m-%d").to_string()),
        open: Some(bar.open),
        high: Some(bar.high),
        low: Some(bar.low),
        close: Some(bar.close),
        volume: Some(bar.volume),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Failure {
    /// HTTP 503, retryable.
    Unavailable,
    /// Unknown ticker, not retryable.
    UnknownSymbol,
}

#[derive(Default)]
struct MarketState {
    history: HashMap<String, Vec<Bar>>,
    failures: HashMap<String, VecDeque<Failure>>,
    overrides: HashMap<String, VecDeque<Vec<Bar>>>,
    page_size: Option<usize>,
    calls: Vec<(String, NaiveDate, NaiveDate)>,
}

/// In-memory provider serving whatever history a test has published.
#[derive(Clone, Default)]
pub struct FakeMarket {
    state: Arc<Mutex<MarketState>>,
}

impl FakeMarket {
    pub fn publish(&self, bars: Vec<Bar>) {
        let mut state = self.state.lock().unwrap();
        for bar in bars {
            state.history.entry(bar.symbol.clone()).or_default().push(bar);
        }
    }

    /// Replace a published bar with a corrected one for the same date.
    pub fn revise(&self, bar: Bar) {
        let mut state = self.state.lock().unwrap();
        let series = state.history.entry(bar.symbol.clone()).or_default();
        match series.iter_mut().find(|b| b.date == bar.date) {
            Some(existing) => *existing = bar,
            None => series.push(bar),
        }
    }

    /// Split every range response into pages of at most `rows` rows.
    pub fn paginate(&self, rows: usize) {
        self.state.lock().unwrap().page_size = Some(rows);
    }

    /// Queue failures returned by the next calls for `symbol`.
    pub fn fail(&self, symbol: &str, failures: impl IntoIterator<Item = Failure>) {
        let mut state = self.state.lock().unwrap();
        state
            .failures
            .entry(symbol.to_string())
            .or_default()
            .extend(failures);
    }

    /// Serve `bars` verbatim on the next call for `symbol`, ignoring the range.
    pub fn respond_once(&self, symbol: &str, bars: Vec<Bar>) {
        let mut state = self.state.lock().unwrap();
        state
            .overrides
            .entry(symbol.to_string())
            .or_default()
            .push_back(bars);
    }

    pub fn calls(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_for(&self, symbol: &str) -> usize {
        self.calls().iter().filter(|(s, _, _)| s == symbol).count()
    }
}

#[async_trait]
impl DataProvider for FakeMarket {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_page(&self, request: &BarsRequest, cursor: Option<&str>) -> Result<BarsPage, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push((request.symbol.clone(), request.start, request.end));

        if let Some(failure) = state
            .failures
            .get_mut(&request.symbol)
            .and_then(VecDeque::pop_front)
        {
            return match failure {
                Failure::Unavailable => StatusSnafu {
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                    message: "upstream unavailable",
                }
                .fail(),
                Failure::UnknownSymbol => ApiSnafu {
                    message: format!("unknown ticker {}", request.symbol),
                }
                .fail(),
            };
        }

        if let Some(bars) = state
            .overrides
            .get_mut(&request.symbol)
            .and_then(VecDeque::pop_front)
        {
            return Ok(BarsPage::last(bars.iter().map(raw).collect()));
        }

        let rows: Vec<RawBar> = state
            .history
            .get(&request.symbol)
            .into_iter()
            .flatten()
            .filter(|b| request.start <= b.date && b.date <= request.end)
            .map(raw)
            .collect();

        let Some(size) = state.page_size else {
            return Ok(BarsPage::last(rows));
        };
        let offset: usize = cursor.map_or(0, |c| c.parse().unwrap());
        let end = (offset + size).min(rows.len());
        Ok(BarsPage {
            rows: rows[offset..end].to_vec(),
            next_page: (end < rows.len()).then(|| end.to_string()),
        })
    }
}

pub fn test_config(symbols: &[&str]) -> SyncConfig {
    SyncConfig {
        watchlist: symbols.iter().map(|s| s.to_string()).collect(),
        history_days: 30,
        ..SyncConfig::default()
    }
}

pub fn fetcher_for(market: &FakeMarket, config: &SyncConfig) -> (HistoryFetcher<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    let limiter = Arc::new(RateLimiter::with_clock(
        config.max_calls(),
        config.window(),
        clock.clone(),
    ));
    let retry = RetryPolicy {
        max_attempts: config.retry_policy().max_attempts,
        ..RetryPolicy::default()
    };
    let fetcher = HistoryFetcher::new(Box::new(market.clone()), limiter, retry);
    (fetcher, clock)
}

pub fn orchestrator(
    market: &FakeMarket,
    store: SqliteStore,
    config: &SyncConfig,
) -> (Orchestrator<SqliteStore, ManualClock>, ManualClock) {
    let (fetcher, clock) = fetcher_for(market, config);
    (Orchestrator::new(store, fetcher, config), clock)
}
