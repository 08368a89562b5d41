use snafu::Snafu;

use crate::providers::ProviderError;

/// Why a symbol's history could not be fetched.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FetchError {
    /// Every attempt failed with a retryable error. The symbol is simply stale
    /// for this run.
    #[snafu(display("fetching {symbol} failed after {attempts} attempts: {source}"))]
    Transient {
        symbol: String,
        attempts: u32,
        source: ProviderError,
    },

    /// The provider rejected the request in a way retrying cannot fix
    /// (authentication, unknown symbol, malformed payload).
    #[snafu(display("fetching {symbol} failed permanently: {source}"))]
    Permanent {
        symbol: String,
        source: ProviderError,
    },
}

impl FetchError {
    pub fn symbol(&self) -> &str {
        match self {
            FetchError::Transient { symbol, .. } | FetchError::Permanent { symbol, .. } => symbol,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}
