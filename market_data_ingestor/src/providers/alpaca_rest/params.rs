use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    models::request_params::{BarsRequest, ProviderParams},
    providers::{ProviderError, ValidationSnafu},
};

/// Specifies the corporate action adjustment for stock data.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    #[default]
    Raw,
    Split,
    Dividend,
    All,
}

/// Specifies the source feed for stock data. The free plan only serves `iex`.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    Sip,
    #[default]
    Iex,
    Otc,
}

/// Alpaca-specific parameters for a bars request.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AlpacaBarsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<Adjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<Feed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

fn adjustment_str(a: &Adjustment) -> &'static str {
    match a {
        Adjustment::Raw => "raw",
        Adjustment::Split => "split",
        Adjustment::Dividend => "dividend",
        Adjustment::All => "all",
    }
}

fn feed_str(f: &Feed) -> &'static str {
    match f {
        Feed::Sip => "sip",
        Feed::Iex => "iex",
        Feed::Otc => "otc",
    }
}

/// Alpaca's `end` is an exclusive instant, so the day after the last wanted
/// trading date is sent.
fn exclusive_end(end: NaiveDate) -> Result<NaiveDate, ProviderError> {
    end.checked_add_days(Days::new(1))
        .ok_or_else(|| ValidationSnafu { message: format!("end date {end} out of range") }.build())
}

pub fn validate_request(request: &BarsRequest) -> Result<(), ProviderError> {
    if request.symbol.trim().is_empty() {
        return ValidationSnafu { message: "symbol must not be empty" }.fail();
    }
    if request.start > request.end {
        return ValidationSnafu {
            message: format!("start {} is after end {}", request.start, request.end),
        }
        .fail();
    }
    Ok(())
}

/// Builds the query string pairs for one request.
pub fn construct_params(request: &BarsRequest) -> Result<Vec<(String, String)>, ProviderError> {
    let mut query = vec![
        ("symbols".to_string(), request.symbol.clone()),
        ("timeframe".to_string(), "1Day".to_string()),
        ("start".to_string(), request.start.format("%Y-%m-%d").to_string()),
        (
            "end".to_string(),
            exclusive_end(request.end)?.format("%Y-%m-%d").to_string(),
        ),
        ("sort".to_string(), "asc".to_string()),
    ];

    let specific = match &request.provider_specific {
        ProviderParams::Alpaca(p) => p.clone(),
        _ => AlpacaBarsParams::default(),
    };
    query.push((
        "adjustment".to_string(),
        adjustment_str(&specific.adjustment.unwrap_or(Adjustment::All)).to_string(),
    ));
    query.push((
        "feed".to_string(),
        feed_str(&specific.feed.unwrap_or_default()).to_string(),
    ));
    if let Some(limit) = specific.limit {
        query.push(("limit".to_string(), limit.to_string()));
    }

    Ok(query)
}
