//! Daily OHLCV ingestion: provider adapters, payload normalization, and a
//! rate-limited, retrying [`fetcher::HistoryFetcher`].

pub mod clock;
pub mod errors;
pub mod fetcher;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod rate_limit;

pub use errors::FetchError;
pub use fetcher::{HistoryFetcher, RetryPolicy};
pub use models::bar::Bar;
pub use rate_limit::RateLimiter;
