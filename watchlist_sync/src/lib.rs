//! Keeps a watchlist's daily history, indicators and reversal verdicts current
//! in SQLite.
//!
//! [`orchestrator::Orchestrator`] drives one run: it fetches only the missing
//! days per symbol, screens them with [`integrity`], recomputes indicators and
//! upserts the results through a [`store::WatchlistStore`].

pub mod config;
pub mod db;
pub mod integrity;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod schema;
pub mod store;
pub mod tz;

/// SQLite file used when `DATABASE_URL` is unset.
pub const DEFAULT_DATABASE_URL: &str = "data/stocks.db";
