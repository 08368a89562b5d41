//! Embedded schema migrations.

use std::path::Path;

use anyhow::{Context, anyhow};
use diesel::{Connection, SqliteConnection, connection::SimpleConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

/// Embedded Diesel migrations bundled with this crate.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Runs pending migrations on the SQLite database at `url`, creating the file
/// (and its parent directory) when missing. Returns how many were applied.
pub fn run_sqlite(url: &str) -> anyhow::Result<usize> {
    let path = url.strip_prefix("sqlite://").unwrap_or(url);
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create database directory {}", parent.display()))?;
        }
    }

    let mut conn = SqliteConnection::establish(path)?;
    conn.batch_execute("PRAGMA journal_mode=WAL;")?;
    let applied = conn.run_pending_migrations(MIGRATIONS).map_err(|e| anyhow!(e))?;

    Ok(applied.len())
}
