//! Date and timestamp encoding for the store, plus the exchange session calendar.
//!
//! - Trading dates are stored as `YYYY-MM-DD` text ([`format_date`] / [`parse_date`]).
//! - Run timestamps are stored as RFC-3339 UTC with millisecond precision
//!   ([`to_rfc3339_millis`] / [`parse_ts_to_utc`]).
//! - Sessions follow the `America/New_York` calendar, and a session's bar is
//!   final only once the regular session has closed ([`last_completed_session`]).

use anyhow::Context;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use market_data_ingestor::normalize::EXCHANGE_TZ;

const DATE_FMT: &str = "%Y-%m-%d";

/// Regular-session close, New York time.
pub const MARKET_CLOSE: NaiveTime = match NaiveTime::from_hms_opt(16, 0, 0) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).with_context(|| format!("bad date: {s}"))
}

/// Newest calendar day whose regular session has closed at `now`.
///
/// Before 16:00 New York time that is yesterday, so an intraday run never sees
/// a half-formed bar. Weekends and holidays are not special-cased; the
/// provider simply has no bar for them.
pub fn last_completed_session(now: DateTime<Utc>) -> NaiveDate {
    let local = now.with_timezone(&EXCHANGE_TZ);
    let today = local.date_naive();
    if local.time() >= MARKET_CLOSE {
        today
    } else {
        today.checked_sub_days(Days::new(1)).unwrap_or(today)
    }
}
