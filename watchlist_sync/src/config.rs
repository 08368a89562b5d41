//! Run configuration: parsing, normalization, and loading.
//!
//! A TOML file describes the watchlist and every tunable of a run. All keys are
//! optional and unknown keys are rejected:
//!
//! ```toml
//! watchlist = ["aapl", " MSFT ", "AAPL"]   # normalized to ["AAPL", "MSFT"]
//! provider = "polygon"                     # or "alpaca"
//! rsi_period = 14
//! sma_period = 20
//! oversold_threshold = 30.0
//! overbought_threshold = 70.0
//! min_decline_percent = 10.0
//! decline_lookback_days = 10
//! history_days = 100
//! max_calls_per_minute = 5
//! window_seconds = 60
//! stale_after_hours = 0
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 1000
//! ```
//!
//! Entrypoints: [`load_config_str`] and [`load_config_path`]. Both return a
//! normalized, validated [`SyncConfig`].

use std::{num::NonZeroU32, path::Path, time::Duration};

use indexmap::IndexSet;
use market_data_ingestor::RetryPolicy;
use serde::{Deserialize, Serialize};
use signal_engine::{IndicatorParams, Thresholds};
use thiserror::Error;

/// The large-cap list tracked when no watchlist is configured.
/// Longest backfill a fresh store may request, about a century of calendar days.
pub const MAX_HISTORY_DAYS: usize = 36_525;

pub const DEFAULT_WATCHLIST: [&str; 20] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "META", "NVDA", "JPM", "JNJ", "V", "PG", "UNH", "HD",
    "MA", "BAC", "DIS", "ADBE", "CRM", "NFLX", "PYPL",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    #[error("watchlist entry {index} is empty")]
    EmptySymbol { index: usize },

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Polygon,
    Alpaca,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Ordered, de-duplicated, upper-case symbols once normalized.
    pub watchlist: Vec<String>,
    pub provider: ProviderKind,
    pub rsi_period: usize,
    pub sma_period: usize,
    pub oversold_threshold: f64,
    pub overbought_threshold: f64,
    pub min_decline_percent: f64,
    pub decline_lookback_days: usize,
    /// Calendar days fetched for a symbol with no stored history; also the
    /// minimum number of stored bars reloaded for indicator warm-up.
    pub history_days: usize,
    pub max_calls_per_minute: u32,
    pub window_seconds: u64,
    /// Skip symbols whose last successful run is younger than this. `0` disables.
    pub stale_after_hours: u64,
    pub retry: RetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let params = IndicatorParams::default();
        let thresholds = Thresholds::default();
        Self {
            watchlist: DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
            provider: ProviderKind::default(),
            rsi_period: params.rsi_period,
            sma_period: params.sma_period,
            oversold_threshold: thresholds.oversold_threshold,
            overbought_threshold: thresholds.overbought_threshold,
            min_decline_percent: thresholds.min_decline_percent,
            decline_lookback_days: params.decline_lookback_days,
            history_days: 100,
            max_calls_per_minute: 5,
            window_seconds: 60,
            stale_after_hours: 0,
            retry: RetryConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            rsi_period: self.rsi_period,
            sma_period: self.sma_period,
            decline_lookback_days: self.decline_lookback_days,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            oversold_threshold: self.oversold_threshold,
            overbought_threshold: self.overbought_threshold,
            min_decline_percent: self.min_decline_percent,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: NonZeroU32::new(self.retry.max_attempts).unwrap_or(NonZeroU32::MIN),
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
        }
    }

    pub fn max_calls(&self) -> NonZeroU32 {
        NonZeroU32::new(self.max_calls_per_minute).unwrap_or(NonZeroU32::MIN)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    pub fn stale_after(&self) -> Option<chrono::Duration> {
        let hours = i64::try_from(self.stale_after_hours).ok()?;
        (hours > 0).then(|| chrono::Duration::hours(hours))
    }
}

/// Trims, upper-cases and de-duplicates the watchlist, then validates every field.
pub fn normalize_config(cfg: &mut SyncConfig) -> Result<(), ConfigError> {
    let mut seen = IndexSet::with_capacity(cfg.watchlist.len());
    for (index, raw) in cfg.watchlist.iter().enumerate() {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ConfigError::EmptySymbol { index });
        }
        seen.insert(symbol);
    }
    cfg.watchlist = seen.into_iter().collect();

    validate(cfg)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn validate(cfg: &SyncConfig) -> Result<(), ConfigError> {
    for (field, value) in [
        ("rsi_period", cfg.rsi_period),
        ("sma_period", cfg.sma_period),
        ("decline_lookback_days", cfg.decline_lookback_days),
        ("history_days", cfg.history_days),
    ] {
        if value == 0 {
            return Err(invalid(field, "must be at least 1"));
        }
    }
    if cfg.history_days > MAX_HISTORY_DAYS {
        return Err(invalid(
            "history_days",
            format!("{} exceeds the maximum of {MAX_HISTORY_DAYS}", cfg.history_days),
        ));
    }
    if cfg.max_calls_per_minute == 0 {
        return Err(invalid("max_calls_per_minute", "must be at least 1"));
    }
    if cfg.window_seconds == 0 {
        return Err(invalid("window_seconds", "must be at least 1"));
    }
    if cfg.retry.max_attempts == 0 {
        return Err(invalid("retry.max_attempts", "must be at least 1"));
    }
    for (field, value) in [
        ("oversold_threshold", cfg.oversold_threshold),
        ("overbought_threshold", cfg.overbought_threshold),
        ("min_decline_percent", cfg.min_decline_percent),
    ] {
        if !value.is_finite() {
            return Err(invalid(field, format!("{value} is not a finite number")));
        }
    }
    if !(0.0..=100.0).contains(&cfg.oversold_threshold) {
        return Err(invalid("oversold_threshold", "must be within 0..=100"));
    }
    if !(0.0..=100.0).contains(&cfg.overbought_threshold) {
        return Err(invalid("overbought_threshold", "must be within 0..=100"));
    }
    if cfg.min_decline_percent < 0.0 {
        return Err(invalid("min_decline_percent", "is a magnitude and must not be negative"));
    }
    Ok(())
}

pub fn load_config_str(s: &str) -> Result<SyncConfig, ConfigError> {
    let mut cfg: SyncConfig = toml::from_str(s)?;
    normalize_config(&mut cfg)?;
    Ok(cfg)
}

pub fn load_config_path(path: impl AsRef<Path>) -> Result<SyncConfig, ConfigError> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_config_str(&s)
}
