use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::snapshot::IndicatorSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// RSI strictly below this is oversold.
    pub oversold_threshold: f64,
    /// RSI strictly above this is overbought.
    pub overbought_threshold: f64,
    /// Minimum decline, as a positive percentage, for a reversal candidate.
    pub min_decline_percent: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            oversold_threshold: 30.0,
            overbought_threshold: 70.0,
            min_decline_percent: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub symbol: String,
    pub date: NaiveDate,
    pub is_oversold: bool,
    pub is_overbought: bool,
    pub is_reversal_candidate: bool,
    pub rsi: Option<f64>,
    pub decline_pct: Option<f64>,
}

/// Applies the threshold rules to one snapshot.
///
/// Missing RSI or decline is an absence of signal: every flag is false.
pub fn classify(snapshot: &IndicatorSnapshot, thresholds: &Thresholds) -> Verdict {
    let is_oversold = snapshot
        .rsi
        .is_some_and(|rsi| rsi < thresholds.oversold_threshold);
    let is_overbought = snapshot
        .rsi
        .is_some_and(|rsi| rsi > thresholds.overbought_threshold);
    let is_reversal_candidate = is_oversold
        && snapshot
            .decline_pct
            .is_some_and(|decline| decline <= -thresholds.min_decline_percent);

    if is_reversal_candidate {
        debug!(
            symbol = %snapshot.symbol,
            date = %snapshot.date,
            rsi = snapshot.rsi,
            decline_pct = snapshot.decline_pct,
            "reversal candidate"
        );
    }

    Verdict {
        symbol: snapshot.symbol.clone(),
        date: snapshot.date,
        is_oversold,
        is_overbought,
        is_reversal_candidate,
        rsi: snapshot.rsi,
        decline_pct: snapshot.decline_pct,
    }
}
