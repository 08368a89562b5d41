//! Strict conversion of vendor rows into canonical [`Bar`]s.
//!
//! Rows missing any of open/high/low/close/volume are dropped, never
//! zero-filled. A row whose date cannot be interpreted fails the whole
//! payload: a vendor changing its date encoding is not something to paper over.
//!
//! Timestamps are converted to the trading date in the exchange time zone
//! ([`EXCHANGE_TZ`]); daily aggregates are stamped at local midnight, which is
//! the previous calendar day in UTC for some vendors.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::models::{
    bar::Bar,
    raw::{RawBar, RawDate},
};

/// Time zone the watchlist's exchanges settle in.
pub const EXCHANGE_TZ: Tz = chrono_tz::America::New_York;

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("epoch milliseconds out of range: {0}")]
    EpochOutOfRange(i64),

    #[error("unrecognized date encoding: {0:?}")]
    UnrecognizedDate(String),
}

/// Outcome of normalizing one payload.
#[derive(Debug, Default, PartialEq)]
pub struct Normalized {
    /// Canonical bars, in payload order.
    pub bars: Vec<Bar>,
    /// Rows dropped because an OHLCV field was absent.
    pub dropped_incomplete: usize,
}

impl RawDate {
    /// Resolves this vendor date to a trading date in `tz`.
    pub fn to_trading_date(&self, tz: Tz) -> Result<NaiveDate, NormalizeError> {
        match self {
            RawDate::EpochMillis(ms) => DateTime::<Utc>::from_timestamp_millis(*ms)
                .map(|dt| dt.with_timezone(&tz).date_naive())
                .ok_or(NormalizeError::EpochOutOfRange(*ms)),
            RawDate::Text(s) => {
                let s = s.trim();
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    return Ok(d);
                }
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&tz).date_naive())
                    .map_err(|_| NormalizeError::UnrecognizedDate(s.to_string()))
            }
        }
    }
}

/// Normalizes a vendor payload for `symbol` into canonical bars.
pub fn normalize_rows(symbol: &str, rows: Vec<RawBar>) -> Result<Normalized, NormalizeError> {
    let mut out = Normalized {
        bars: Vec::with_capacity(rows.len()),
        dropped_incomplete: 0,
    };

    for row in rows {
        let date = row.date.to_trading_date(EXCHANGE_TZ)?;
        match (row.open, row.high, row.low, row.close, row.volume) {
            (Some(open), Some(high), Some(low), Some(close), Some(volume)) => out.bars.push(Bar {
                symbol: symbol.to_string(),
                date,
                open,
                high,
                low,
                close,
                volume,
            }),
            _ => out.dropped_incomplete += 1,
        }
    }

    Ok(out)
}
