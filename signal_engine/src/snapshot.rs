use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Look-back lengths used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub sma_period: usize,
    /// Look-back of the decline the classifier tests against.
    pub decline_lookback_days: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            sma_period: 20,
            decline_lookback_days: 10,
        }
    }
}

impl IndicatorParams {
    /// Bars needed before every indicator the engine reports is defined.
    pub fn warmup_bars(&self) -> usize {
        self.rsi_period
            .max(self.sma_period)
            .max(self.decline_lookback_days)
            .max(crate::engine::LONG_LOOKBACK)
            + 1
    }
}

/// Indicator values for one `(symbol, date)`. `None` marks the warm-up span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub date: NaiveDate,
    pub rsi: Option<f64>,
    pub sma: Option<f64>,
    pub pct_change_5d: Option<f64>,
    pub pct_change_10d: Option<f64>,
    /// Change over `decline_lookback_days`, in percent.
    pub decline_pct: Option<f64>,
}
