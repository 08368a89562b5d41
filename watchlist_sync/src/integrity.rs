//! Gate between freshly fetched bars and stored history.
//!
//! Fetched bars are screened in order. Bars identical to stored history are
//! skipped; everything else must extend history strictly forward with sane
//! values. The first violation stops the screen, so only a gap-free prefix is
//! ever accepted.

use chrono::NaiveDate;
use market_data_ingestor::Bar;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityError {
    #[error("bar for {found} in a batch for {expected}")]
    ForeignSymbol { expected: String, found: String },

    #[error("{date} arrives after {previous}")]
    OutOfOrder { date: NaiveDate, previous: NaiveDate },

    #[error("{date} appears twice in the fetched batch")]
    DuplicateInBatch { date: NaiveDate },

    #[error("{date} differs from the finalized stored bar")]
    ConflictingDuplicate { date: NaiveDate },

    #[error("{date} has a non-positive or non-finite price or volume, or high below low")]
    InvalidValues { date: NaiveDate },
}

/// Outcome of [`screen`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Screened {
    /// New bars, strictly after the stored tail, ascending.
    pub accepted: Vec<Bar>,
    /// Bars dropped because an identical bar is already stored.
    pub already_stored: usize,
    /// The violation that stopped the screen, if any.
    pub rejection: Option<IntegrityError>,
}

/// Screens `fetched` against `stored_tail` (ascending, newest last).
pub fn screen(symbol: &str, stored_tail: &[Bar], fetched: Vec<Bar>) -> Screened {
    let stored_last = stored_tail.last().map(|b| b.date);
    let mut out = Screened::default();

    for bar in fetched {
        if let Err(rejection) = check(symbol, stored_tail, stored_last, &mut out, &bar) {
            out.rejection = Some(rejection);
            break;
        }
    }
    out
}

/// Accepts, skips, or rejects one bar.
fn check(
    symbol: &str,
    stored_tail: &[Bar],
    stored_last: Option<NaiveDate>,
    out: &mut Screened,
    bar: &Bar,
) -> Result<(), IntegrityError> {
    if bar.symbol != symbol {
        return Err(IntegrityError::ForeignSymbol {
            expected: symbol.to_string(),
            found: bar.symbol.clone(),
        });
    }

    let frontier = out.accepted.last().map(|b| b.date).or(stored_last);
    if let Some(previous) = frontier.filter(|f| bar.date <= *f) {
        if out.accepted.iter().any(|b| b.date == bar.date) {
            return Err(IntegrityError::DuplicateInBatch { date: bar.date });
        }
        // Re-sent history is only tolerated before the first new bar.
        if out.accepted.is_empty() {
            if let Ok(i) = stored_tail.binary_search_by_key(&bar.date, |b| b.date) {
                if stored_tail[i] == *bar {
                    out.already_stored += 1;
                    return Ok(());
                }
                return Err(IntegrityError::ConflictingDuplicate { date: bar.date });
            }
        }
        return Err(IntegrityError::OutOfOrder {
            date: bar.date,
            previous,
        });
    }

    if !bar.is_well_formed() {
        return Err(IntegrityError::InvalidValues { date: bar.date });
    }
    out.accepted.push(bar.clone());
    Ok(())
}
