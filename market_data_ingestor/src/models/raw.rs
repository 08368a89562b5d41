//! Loosely-typed rows as vendors send them, before normalization.

use serde::Deserialize;

/// A date as encoded by a vendor payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDate {
    /// Unix epoch milliseconds (Polygon aggregates).
    EpochMillis(i64),
    /// RFC 3339 timestamp (Alpaca) or a plain `YYYY-MM-DD` date.
    Text(String),
}

/// One provider row with every field optional.
///
/// Provider adapters map their response structs into this shape;
/// [`crate::normalize::normalize_rows`] turns it into a canonical
/// [`Bar`](crate::models::bar::Bar) or drops it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub date: RawDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}
