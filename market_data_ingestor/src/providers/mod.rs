//! Provider abstraction for daily market data sources.
//!
//! This module defines the [`DataProvider`] trait, a unified interface for
//! fetching daily bars from any vendor (Polygon.io, Alpaca, ...). Each concrete
//! provider handles its own URL layout and authentication and serves one page
//! of vendor rows per call as [`RawBar`]s, plus an opaque cursor for the next
//! page. The [`HistoryFetcher`](crate::fetcher::HistoryFetcher) walks the pages,
//! taking a rate grant before each one, and normalizes the rows once.
//!
//! The trait is object safe, so the runtime can pick a provider from
//! configuration and hold it as `Box<dyn DataProvider>`.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_ingestor::models::{raw::RawBar, request_params::BarsRequest};
//! use market_data_ingestor::providers::{BarsPage, DataProvider, ProviderError};
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl DataProvider for MyProvider {
//!     fn name(&self) -> &'static str {
//!         "mine"
//!     }
//!
//!     async fn fetch_page(
//!         &self,
//!         _request: &BarsRequest,
//!         _cursor: Option<&str>,
//!     ) -> Result<BarsPage, ProviderError> {
//!         Ok(BarsPage::last(vec![]))
//!     }
//! }
//! ```

pub mod alpaca_rest;
pub mod polygon_rest;

use async_trait::async_trait;
use reqwest::StatusCode;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::{
    models::{raw::RawBar, request_params::BarsRequest},
    normalize::NormalizeError,
};

/// Trait for fetching daily bars from a market data provider.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Short identifier used in logs (e.g., `"polygon"`).
    fn name(&self) -> &'static str;

    /// Fetches one page of daily rows for the request's inclusive date range.
    ///
    /// `cursor` is `None` for the first page and otherwise the
    /// [`BarsPage::next_page`] of the previous one. Exactly one HTTP call is
    /// made per invocation, so the caller can meter every call.
    ///
    /// # Returns
    ///
    /// * `Ok(BarsPage)` - Vendor rows in the order the vendor sent them
    ///   (possibly empty, e.g. for a weekend-only range).
    /// * `Err(ProviderError)` - Classified by [`ProviderError::is_retryable`].
    async fn fetch_page(&self, request: &BarsRequest, cursor: Option<&str>) -> Result<BarsPage, ProviderError>;
}

/// One page of vendor rows.
#[derive(Debug, Default)]
pub struct BarsPage {
    pub rows: Vec<RawBar>,
    /// Cursor for the following page; `None` on the last one.
    pub next_page: Option<String>,
}

impl BarsPage {
    /// A page with nothing after it.
    pub fn last(rows: Vec<RawBar>) -> Self {
        Self { rows, next_page: None }
    }
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `DataProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, body read, decode).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider answered with a non-success HTTP status.
    #[snafu(display("HTTP {status}: {message}"))]
    Status {
        status: StatusCode,
        message: String,
        backtrace: Backtrace,
    },

    /// The provider's payload itself reported an error (e.g., unknown ticker).
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// The payload could not be normalized into canonical bars.
    #[snafu(display("Malformed provider payload: {source}"))]
    Normalize {
        source: NormalizeError,
        backtrace: Backtrace,
    },
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts, connection failures, HTTP 5xx and HTTP 429 are transient.
    /// Authentication failures, unknown symbols, bad parameters and payloads
    /// that do not decode will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Reqwest { source, .. } => {
                !source.is_decode()
                    && (source.is_timeout()
                        || source.is_connect()
                        || source.is_request()
                        || source.is_body())
            }
            ProviderError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ProviderError::Api { .. }
            | ProviderError::Validation { .. }
            | ProviderError::Normalize { .. } => false,
        }
    }
}
