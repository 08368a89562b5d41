use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use market_data_ingestor::{HistoryFetcher, RateLimiter, clock::TokioClock};
use shared_utils::env::get_env_var_or;
use tracing_subscriber::EnvFilter;
use watchlist_sync::{
    DEFAULT_DATABASE_URL,
    config::{SyncConfig, load_config_path},
    db::migrate,
    orchestrator::Orchestrator,
    providers::build_provider,
    store::{SqliteStore, WatchlistStore},
};

#[derive(Parser)]
#[command(version, about = "Watchlist ingestion and reversal screening")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply pending schema migrations to DATABASE_URL.
    Migrate,
    /// Fetch missing days, recompute indicators and store verdicts.
    Run {
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Restrict the run to these symbols (comma separated).
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// Latest bar, indicators and verdict per watchlist symbol, as JSON lines.
    Latest {
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Current reversal candidates, lowest RSI first.
    Candidates,
    /// Stored bar count per symbol.
    Status,
}

fn load_config(path: Option<PathBuf>) -> Result<SyncConfig> {
    match path {
        Some(path) => load_config_path(&path).with_context(|| format!("loading {}", path.display())),
        None => Ok(SyncConfig::default()),
    }
}

fn open_store(db_url: &str) -> Result<SqliteStore> {
    migrate::run_sqlite(db_url).with_context(|| format!("migrating {db_url}"))?;
    SqliteStore::open(db_url).with_context(|| format!("opening {db_url}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let db_url = get_env_var_or("DATABASE_URL", DEFAULT_DATABASE_URL);

    match cli.cmd {
        Cmd::Migrate => {
            let applied = migrate::run_sqlite(&db_url)?;
            println!("{applied} migration(s) applied to {db_url}");
        }
        Cmd::Run { config, symbols } => {
            let mut config = load_config(config)?;
            if !symbols.is_empty() {
                config.watchlist = symbols;
                watchlist_sync::config::normalize_config(&mut config)?;
            }

            let provider = build_provider(config.provider).context("building provider")?;
            let limiter = Arc::new(RateLimiter::with_clock(
                config.max_calls(),
                config.window(),
                TokioClock,
            ));
            let fetcher = HistoryFetcher::new(provider, limiter, config.retry_policy());

            let store = open_store(&db_url)?;
            let mut orchestrator = Orchestrator::new(store, fetcher, &config);
            let summary = orchestrator.run(&config.watchlist).await?;
            println!("{summary}");
            let candidates: Vec<&str> = summary.candidates().map(|v| v.symbol.as_str()).collect();
            if !candidates.is_empty() {
                println!("reversal candidates: {}", candidates.join(", "));
            }
        }
        Cmd::Latest { config } => {
            let config = load_config(config)?;
            let mut store = open_store(&db_url)?;
            for symbol in &config.watchlist {
                match store.read_latest(symbol)? {
                    Some(view) => println!("{}", serde_json::to_string(&view)?),
                    None => println!("{{\"symbol\":\"{symbol}\",\"bar\":null}}"),
                }
            }
        }
        Cmd::Candidates => {
            let mut store = open_store(&db_url)?;
            for v in store.list_candidates()? {
                println!(
                    "{:<6} {} rsi={:>6.2} decline={:>7.2}%",
                    v.symbol,
                    v.date,
                    v.rsi.unwrap_or(f64::NAN),
                    v.decline_pct.unwrap_or(f64::NAN)
                );
            }
        }
        Cmd::Status => {
            let mut store = open_store(&db_url)?;
            for (symbol, bars) in store.bar_counts()? {
                let outcome = store
                    .status(&symbol)?
                    .map(|s| format!("{} at {}", s.outcome, s.last_run_at))
                    .unwrap_or_else(|| "never run".to_string());
                println!("{symbol:<6} {bars:>5} bars  {outcome}");
            }
        }
    }

    Ok(())
}
