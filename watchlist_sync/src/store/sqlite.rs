//! SQLite implementation of [`WatchlistStore`].
use chrono::{DateTime, NaiveDate, Utc};
use diesel::{dsl::count, prelude::*};
use market_data_ingestor::Bar;
use signal_engine::{IndicatorSnapshot, Verdict};
use tracing::debug;

use crate::{
    db::connection::connect_sqlite,
    models::{BarRow, NewSymbolStatus, SnapshotRow, SymbolStatus, SymbolStatusRow, VerdictRow},
    schema::{bars::dsl as b, indicator_snapshots::dsl as s, symbol_status::dsl as st, verdicts::dsl as v},
    store::{LatestView, StatusUpdate, StoreError, StoreResult, WatchlistStore},
    tz,
};

/// Store backed by one SQLite connection.
pub struct SqliteStore {
    conn: SqliteConnection,
}

impl SqliteStore {
    /// Opens `database_url` with the usual PRAGMAs. Migrations must already be applied.
    pub fn open(database_url: &str) -> anyhow::Result<Self> {
        Ok(Self::from_connection(connect_sqlite(database_url)?))
    }

    pub fn from_connection(conn: SqliteConnection) -> Self {
        Self { conn }
    }

    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

fn ensure_symbol(expected: &str, found: &str) -> StoreResult<()> {
    if expected != found {
        return Err(StoreError::ForeignSymbol {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

fn latest_bar_row(conn: &mut SqliteConnection, symbol: &str) -> StoreResult<Option<BarRow>> {
    Ok(b::bars
        .filter(b::symbol.eq(symbol))
        .order(b::date.desc())
        .select(BarRow::as_select())
        .first(conn)
        .optional()?)
}

fn latest_verdict_row(conn: &mut SqliteConnection, symbol: &str) -> StoreResult<Option<VerdictRow>> {
    Ok(v::verdicts
        .filter(v::symbol.eq(symbol))
        .order(v::date.desc())
        .select(VerdictRow::as_select())
        .first(conn)
        .optional()?)
}

fn stored_symbols(conn: &mut SqliteConnection) -> StoreResult<Vec<String>> {
    Ok(b::bars
        .select(b::symbol)
        .distinct()
        .order(b::symbol.asc())
        .load(conn)?)
}

impl WatchlistStore for SqliteStore {
    fn last_bar_date(&mut self, symbol: &str) -> StoreResult<Option<NaiveDate>> {
        let newest: Option<String> = b::bars
            .filter(b::symbol.eq(symbol))
            .select(diesel::dsl::max(b::date))
            .get_result(&mut self.conn)?;
        Ok(newest.as_deref().map(tz::parse_date).transpose()?)
    }

    fn bars_tail(&mut self, symbol: &str, n: usize) -> StoreResult<Vec<Bar>> {
        let mut rows: Vec<BarRow> = b::bars
            .filter(b::symbol.eq(symbol))
            .order(b::date.desc())
            .limit(i64::try_from(n).unwrap_or(i64::MAX))
            .select(BarRow::as_select())
            .load(&mut self.conn)?;
        rows.reverse();
        rows.into_iter()
            .map(|row| row.into_bar().map_err(StoreError::from))
            .collect()
    }

    fn upsert_bars(&mut self, symbol: &str, bars: &[Bar]) -> StoreResult<usize> {
        self.conn.transaction::<_, StoreError, _>(|conn| {
            let mut changed = 0;
            for bar in bars {
                ensure_symbol(symbol, &bar.symbol)?;
                let row = BarRow::from(bar);
                let stored: Option<BarRow> = b::bars
                    .find((row.symbol.as_str(), row.date.as_str()))
                    .select(BarRow::as_select())
                    .first(conn)
                    .optional()?;
                match stored {
                    Some(stored) if stored == row => {}
                    Some(_) => {
                        return Err(StoreError::BarConflict {
                            symbol: bar.symbol.clone(),
                            date: bar.date,
                        });
                    }
                    None => {
                        diesel::insert_into(b::bars).values(&row).execute(conn)?;
                        changed += 1;
                    }
                }
            }
            debug!(symbol, changed, offered = bars.len(), "bars upserted");
            Ok(changed)
        })
    }

    fn upsert_snapshots(&mut self, symbol: &str, snapshots: &[IndicatorSnapshot]) -> StoreResult<usize> {
        self.conn.transaction::<_, StoreError, _>(|conn| {
            let mut changed = 0;
            for snapshot in snapshots {
                ensure_symbol(symbol, &snapshot.symbol)?;
                let row = SnapshotRow::from(snapshot);
                let stored: Option<SnapshotRow> = s::indicator_snapshots
                    .find((row.symbol.as_str(), row.date.as_str()))
                    .select(SnapshotRow::as_select())
                    .first(conn)
                    .optional()?;
                if stored.as_ref() != Some(&row) {
                    diesel::replace_into(s::indicator_snapshots)
                        .values(&row)
                        .execute(conn)?;
                    changed += 1;
                }
            }
            debug!(symbol, changed, offered = snapshots.len(), "snapshots upserted");
            Ok(changed)
        })
    }

    fn upsert_verdicts(&mut self, symbol: &str, verdicts: &[Verdict]) -> StoreResult<usize> {
        self.conn.transaction::<_, StoreError, _>(|conn| {
            let mut changed = 0;
            for verdict in verdicts {
                ensure_symbol(symbol, &verdict.symbol)?;
                let row = VerdictRow::from(verdict);
                let stored: Option<VerdictRow> = v::verdicts
                    .find((row.symbol.as_str(), row.date.as_str()))
                    .select(VerdictRow::as_select())
                    .first(conn)
                    .optional()?;
                if stored.as_ref() != Some(&row) {
                    diesel::replace_into(v::verdicts).values(&row).execute(conn)?;
                    changed += 1;
                }
            }
            debug!(symbol, changed, offered = verdicts.len(), "verdicts upserted");
            Ok(changed)
        })
    }

    fn read_latest(&mut self, symbol: &str) -> StoreResult<Option<LatestView>> {
        let Some(bar_row) = latest_bar_row(&mut self.conn, symbol)? else {
            return Ok(None);
        };

        let key = (bar_row.symbol.as_str(), bar_row.date.as_str());
        let snapshot = s::indicator_snapshots
            .find(key)
            .select(SnapshotRow::as_select())
            .first(&mut self.conn)
            .optional()?
            .map(SnapshotRow::into_snapshot)
            .transpose()?;
        let verdict = v::verdicts
            .find(key)
            .select(VerdictRow::as_select())
            .first(&mut self.conn)
            .optional()?
            .map(VerdictRow::into_verdict)
            .transpose()?;

        Ok(Some(LatestView {
            bar: bar_row.into_bar()?,
            snapshot,
            verdict,
        }))
    }

    fn read_latest_all(&mut self) -> StoreResult<Vec<LatestView>> {
        let mut views = Vec::new();
        for symbol in stored_symbols(&mut self.conn)? {
            if let Some(view) = self.read_latest(&symbol)? {
                views.push(view);
            }
        }
        Ok(views)
    }

    fn list_candidates(&mut self) -> StoreResult<Vec<Verdict>> {
        let mut candidates = Vec::new();
        for symbol in stored_symbols(&mut self.conn)? {
            if let Some(row) = latest_verdict_row(&mut self.conn, &symbol)? {
                if row.is_reversal_candidate {
                    candidates.push(row.into_verdict()?);
                }
            }
        }
        candidates.sort_by(|a, b| {
            a.rsi
                .unwrap_or(f64::INFINITY)
                .total_cmp(&b.rsi.unwrap_or(f64::INFINITY))
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        Ok(candidates)
    }

    fn bar_counts(&mut self) -> StoreResult<Vec<(String, i64)>> {
        Ok(b::bars
            .group_by(b::symbol)
            .select((b::symbol, count(b::date)))
            .order(b::symbol.asc())
            .load(&mut self.conn)?)
    }

    fn status(&mut self, symbol: &str) -> StoreResult<Option<SymbolStatus>> {
        let row = st::symbol_status
            .find(symbol)
            .select(SymbolStatusRow::as_select())
            .first(&mut self.conn)
            .optional()?;
        Ok(row.map(SymbolStatusRow::into_status).transpose()?)
    }

    fn record_status(
        &mut self,
        symbol: &str,
        update: StatusUpdate<'_>,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let last_success_at = if update.success {
            Some(tz::to_rfc3339_millis(at))
        } else {
            st::symbol_status
                .find(symbol)
                .select(st::last_success_at)
                .first::<Option<String>>(&mut self.conn)
                .optional()?
                .flatten()
        };

        let row = NewSymbolStatus {
            symbol,
            last_run_at: tz::to_rfc3339_millis(at),
            last_success_at,
            outcome: update.outcome,
            last_error: update.last_error,
        };
        diesel::insert_into(st::symbol_status)
            .values(&row)
            .on_conflict(st::symbol)
            .do_update()
            .set(&row)
            .execute(&mut self.conn)?;
        Ok(())
    }
}
