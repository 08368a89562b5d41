use serde::Deserialize;

use crate::models::raw::{RawBar, RawDate};

/// One aggregate row. Polygon omits fields it has no value for.
#[derive(Deserialize, Debug)]
pub struct PolygonAgg {
    #[serde(rename = "t")]
    pub timestamp: RawDate,
    #[serde(rename = "o")]
    pub open: Option<f64>,
    #[serde(rename = "h")]
    pub high: Option<f64>,
    #[serde(rename = "l")]
    pub low: Option<f64>,
    #[serde(rename = "c")]
    pub close: Option<f64>,
    #[serde(rename = "v")]
    pub volume: Option<f64>,
    #[serde(rename = "vw")]
    pub vwap: Option<f64>,
    #[serde(rename = "n")]
    pub trade_count: Option<u64>,
}

#[derive(Deserialize, Debug)]
pub struct PolygonAggsResponse {
    pub status: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<PolygonAgg>>,
    pub next_url: Option<String>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl PolygonAggsResponse {
    /// The payload-level error, if the vendor flagged one despite a 2xx status.
    pub fn api_error(&self) -> Option<String> {
        match self.status.as_deref() {
            Some("ERROR") | Some("NOT_AUTHORIZED") => Some(
                self.error
                    .clone()
                    .or_else(|| self.message.clone())
                    .unwrap_or_else(|| "unspecified polygon error".to_string()),
            ),
            _ => None,
        }
    }
}

impl From<PolygonAgg> for RawBar {
    fn from(agg: PolygonAgg) -> Self {
        RawBar {
            date: agg.timestamp,
            open: agg.open,
            high: agg.high,
            low: agg.low,
            close: agg.close,
            volume: agg.volume,
        }
    }
}
