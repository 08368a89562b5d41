//! Diesel models mapping to the database schema.
//!
//! These mirror the tables created by the embedded migrations:
//! - [`crate::schema::bars`]: immutable daily OHLCV history
//! - [`crate::schema::indicator_snapshots`]: derived indicator values per bar
//! - [`crate::schema::verdicts`]: classifier output per bar
//! - [`crate::schema::symbol_status`]: per-symbol bookkeeping of the last run
//!
//! Conversions to and from the domain types live here so the store never
//! hand-assembles column tuples.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use market_data_ingestor::Bar;
use signal_engine::{IndicatorSnapshot, Verdict};

use crate::{schema::*, tz};

/// A row in [`crate::schema::bars`].
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = bars, check_for_backend(diesel::sqlite::Sqlite))]
pub struct BarRow {
    pub symbol: String,
    /// Trading date as `YYYY-MM-DD`.
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<&Bar> for BarRow {
    fn from(bar: &Bar) -> Self {
        Self {
            symbol: bar.symbol.clone(),
            date: tz::format_date(bar.date),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

impl BarRow {
    pub fn into_bar(self) -> anyhow::Result<Bar> {
        Ok(Bar {
            date: tz::parse_date(&self.date)?,
            symbol: self.symbol,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

/// A row in [`crate::schema::indicator_snapshots`]. `None` columns are warm-up.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = indicator_snapshots, check_for_backend(diesel::sqlite::Sqlite))]
pub struct SnapshotRow {
    pub symbol: String,
    pub date: String,
    pub rsi: Option<f64>,
    pub sma: Option<f64>,
    pub pct_change_5d: Option<f64>,
    pub pct_change_10d: Option<f64>,
    pub decline_pct: Option<f64>,
}

impl From<&IndicatorSnapshot> for SnapshotRow {
    fn from(s: &IndicatorSnapshot) -> Self {
        Self {
            symbol: s.symbol.clone(),
            date: tz::format_date(s.date),
            rsi: s.rsi,
            sma: s.sma,
            pct_change_5d: s.pct_change_5d,
            pct_change_10d: s.pct_change_10d,
            decline_pct: s.decline_pct,
        }
    }
}

impl SnapshotRow {
    pub fn into_snapshot(self) -> anyhow::Result<IndicatorSnapshot> {
        Ok(IndicatorSnapshot {
            date: tz::parse_date(&self.date)?,
            symbol: self.symbol,
            rsi: self.rsi,
            sma: self.sma,
            pct_change_5d: self.pct_change_5d,
            pct_change_10d: self.pct_change_10d,
            decline_pct: self.decline_pct,
        })
    }
}

/// A row in [`crate::schema::verdicts`].
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = verdicts, check_for_backend(diesel::sqlite::Sqlite))]
pub struct VerdictRow {
    pub symbol: String,
    pub date: String,
    pub is_oversold: bool,
    pub is_overbought: bool,
    pub is_reversal_candidate: bool,
    pub rsi: Option<f64>,
    pub decline_pct: Option<f64>,
}

impl From<&Verdict> for VerdictRow {
    fn from(v: &Verdict) -> Self {
        Self {
            symbol: v.symbol.clone(),
            date: tz::format_date(v.date),
            is_oversold: v.is_oversold,
            is_overbought: v.is_overbought,
            is_reversal_candidate: v.is_reversal_candidate,
            rsi: v.rsi,
            decline_pct: v.decline_pct,
        }
    }
}

impl VerdictRow {
    pub fn into_verdict(self) -> anyhow::Result<Verdict> {
        Ok(Verdict {
            date: tz::parse_date(&self.date)?,
            symbol: self.symbol,
            is_oversold: self.is_oversold,
            is_overbought: self.is_overbought,
            is_reversal_candidate: self.is_reversal_candidate,
            rsi: self.rsi,
            decline_pct: self.decline_pct,
        })
    }
}

/// A row in [`crate::schema::symbol_status`].
///
/// `updated_at` is maintained by a trigger and never written from Rust.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = symbol_status, check_for_backend(diesel::sqlite::Sqlite))]
pub struct SymbolStatusRow {
    pub symbol: String,
    /// RFC3339 UTC.
    pub last_run_at: String,
    /// RFC3339 UTC of the last run that left the symbol consistent.
    pub last_success_at: Option<String>,
    /// One of `up_to_date`, `no_new_data`, `updated`, `incomplete`, `failed`.
    pub outcome: String,
    pub last_error: Option<String>,
    pub updated_at: String,
}

/// Insertable form of [`SymbolStatusRow`].
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = symbol_status)]
#[diesel(treat_none_as_null = true)]
pub struct NewSymbolStatus<'a> {
    pub symbol: &'a str,
    pub last_run_at: String,
    pub last_success_at: Option<String>,
    pub outcome: &'a str,
    pub last_error: Option<&'a str>,
}

/// Parsed view of [`SymbolStatusRow`].
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolStatus {
    pub symbol: String,
    pub last_run_at: DateTime<Utc>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub outcome: String,
    pub last_error: Option<String>,
}

impl SymbolStatusRow {
    pub fn into_status(self) -> anyhow::Result<SymbolStatus> {
        Ok(SymbolStatus {
            last_run_at: tz::parse_ts_to_utc(&self.last_run_at)?,
            last_success_at: self
                .last_success_at
                .as_deref()
                .map(tz::parse_ts_to_utc)
                .transpose()?,
            symbol: self.symbol,
            outcome: self.outcome,
            last_error: self.last_error,
        })
    }
}
