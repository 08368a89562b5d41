//! The indicator engine.
//!
//! [`IndicatorState`] is a fold over bars: push them oldest first and each push
//! returns the snapshot for that bar. [`compute`] runs the fold over a whole
//! slice, so a full recompute and a bar-by-bar extension go through exactly
//! the same arithmetic.

use chrono::NaiveDate;
use market_data_ingestor::Bar;
use thiserror::Error;
use tracing::trace;

use crate::{
    indicators::{PctChange, Rsi, Sma},
    snapshot::{IndicatorParams, IndicatorSnapshot},
};

const SHORT_LOOKBACK: usize = 5;
pub(crate) const LONG_LOOKBACK: usize = 10;

/// Input the engine refuses to fold. Bars reaching the engine are expected to
/// have passed the integrity gate already, so any of these is a bug upstream.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("{name} must be at least 1")]
    ZeroPeriod { name: &'static str },

    #[error("bar for {found} pushed into the series of {expected}")]
    MixedSymbols { expected: String, found: String },

    #[error("{symbol}: bar dated {date} does not follow {previous}")]
    OutOfOrder {
        symbol: String,
        previous: NaiveDate,
        date: NaiveDate,
    },

    #[error("{symbol}: close {close} on {date} is not a positive finite price")]
    InvalidClose {
        symbol: String,
        date: NaiveDate,
        close: f64,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorState {
    symbol: String,
    last_date: Option<NaiveDate>,
    rsi: Rsi,
    sma: Sma,
    pct_5d: PctChange,
    pct_10d: PctChange,
    decline: PctChange,
}

impl IndicatorState {
    pub fn new(symbol: impl Into<String>, params: &IndicatorParams) -> Result<Self, EngineError> {
        for (name, value) in [
            ("rsi_period", params.rsi_period),
            ("sma_period", params.sma_period),
            ("decline_lookback_days", params.decline_lookback_days),
        ] {
            if value == 0 {
                return Err(EngineError::ZeroPeriod { name });
            }
        }

        Ok(Self {
            symbol: symbol.into(),
            last_date: None,
            rsi: Rsi::new(params.rsi_period),
            sma: Sma::new(params.sma_period),
            pct_5d: PctChange::new(SHORT_LOOKBACK),
            pct_10d: PctChange::new(LONG_LOOKBACK),
            decline: PctChange::new(params.decline_lookback_days),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.last_date
    }

    /// Folds one bar in and returns its snapshot.
    ///
    /// A rejected bar leaves the state untouched.
    pub fn push(&mut self, bar: &Bar) -> Result<IndicatorSnapshot, EngineError> {
        if bar.symbol != self.symbol {
            return Err(EngineError::MixedSymbols {
                expected: self.symbol.clone(),
                found: bar.symbol.clone(),
            });
        }
        if let Some(previous) = self.last_date {
            if bar.date <= previous {
                return Err(EngineError::OutOfOrder {
                    symbol: self.symbol.clone(),
                    previous,
                    date: bar.date,
                });
            }
        }
        if !(bar.close.is_finite() && bar.close > 0.0) {
            return Err(EngineError::InvalidClose {
                symbol: self.symbol.clone(),
                date: bar.date,
                close: bar.close,
            });
        }

        self.last_date = Some(bar.date);
        Ok(IndicatorSnapshot {
            symbol: self.symbol.clone(),
            date: bar.date,
            rsi: self.rsi.update(bar.close),
            sma: self.sma.update(bar.close),
            pct_change_5d: self.pct_5d.update(bar.close),
            pct_change_10d: self.pct_10d.update(bar.close),
            decline_pct: self.decline.update(bar.close),
        })
    }
}

/// One snapshot per bar, same order and dates as `bars`.
///
/// `bars` must belong to one symbol and be strictly ascending by date.
pub fn compute(params: &IndicatorParams, bars: &[Bar]) -> Result<Vec<IndicatorSnapshot>, EngineError> {
    let Some(first) = bars.first() else {
        return Ok(Vec::new());
    };
    let mut state = IndicatorState::new(first.symbol.clone(), params)?;
    let snapshots = bars
        .iter()
        .map(|bar| state.push(bar))
        .collect::<Result<Vec<_>, _>>()?;
    trace!(symbol = %first.symbol, bars = snapshots.len(), "computed indicator snapshots");
    Ok(snapshots)
}
