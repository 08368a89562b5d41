use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::providers::{alpaca_rest::params::AlpacaBarsParams, polygon_rest::params::PolygonAggsParams};

/// Vendor-agnostic request for daily bars of one symbol.
///
/// Both ends of the range are inclusive trading dates. Narrowing the range to
/// what is not yet persisted is the caller's job; providers fetch exactly what
/// they are asked for.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BarsRequest {
    /// Symbol to request (e.g., `"AAPL"`).
    pub symbol: String,

    /// First trading date to include.
    pub start: NaiveDate,

    /// Last trading date to include.
    pub end: NaiveDate,

    /// Optional, provider-specific parameters.
    #[serde(default)]
    pub provider_specific: ProviderParams,
}

impl BarsRequest {
    pub fn new(symbol: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
            provider_specific: ProviderParams::None,
        }
    }
}

/// Per-request options for a particular provider, kept out of the universal
/// [`BarsRequest`] fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum ProviderParams {
    #[default]
    None,
    Alpaca(AlpacaBarsParams),
    Polygon(PolygonAggsParams),
}
