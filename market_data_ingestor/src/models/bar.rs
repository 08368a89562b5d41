//! Canonical in-memory representation of one trading day (OHLCV).
//!
//! Every [`DataProvider`](crate::providers::DataProvider) payload is normalized
//! into this shape before it leaves the ingestor, regardless of how the vendor
//! encoded dates or which fields it chose to omit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily bar for one symbol.
///
/// Dates are exchange-local trading dates, so a bar stamped
/// `2024-01-02T05:00:00Z` by a vendor lands on `2024-01-02`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// The symbol this bar belongs to (e.g., "AAPL").
    pub symbol: String,

    /// Trading date.
    pub date: NaiveDate,

    /// Opening price.
    pub open: f64,

    /// Highest price of the session.
    pub high: f64,

    /// Lowest price of the session.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Shares traded during the session.
    pub volume: f64,
}

impl Bar {
    /// True when every price and the volume are finite and strictly positive,
    /// and the high/low pair brackets the session.
    pub fn is_well_formed(&self) -> bool {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        fields.iter().all(|v| v.is_finite() && *v > 0.0) && self.high >= self.low
    }
}
