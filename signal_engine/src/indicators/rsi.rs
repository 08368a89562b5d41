/// Relative Strength Index with Wilder smoothing.
///
/// The first `period` deltas are averaged to seed the gain/loss averages; every
/// later delta is folded in as `(prev * (period - 1) + current) / period`.
/// Defined from the bar that completes the `period`-th delta onwards.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    deltas: usize,
    gain_sum: f64,
    loss_sum: f64,
    avg_gain: f64,
    avg_loss: f64,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            deltas: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;

        let change = close - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let p = self.period as f64;

        self.deltas += 1;
        if self.deltas < self.period {
            self.gain_sum += gain;
            self.loss_sum += loss;
            return None;
        }
        if self.deltas == self.period {
            self.avg_gain = (self.gain_sum + gain) / p;
            self.avg_loss = (self.loss_sum + loss) / p;
        } else {
            self.avg_gain = (self.avg_gain * (p - 1.0) + gain) / p;
            self.avg_loss = (self.avg_loss * (p - 1.0) + loss) / p;
        }

        Some(rsi_from_averages(self.avg_gain, self.avg_loss))
    }
}

/// No losses in the window means RSI 100, flat prices included.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}
