use std::collections::VecDeque;

/// Simple moving average of the last `period` closes.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(close);

        // Summing the window directly (rather than keeping a running total)
        // keeps the value independent of how many bars came before it.
        (self.window.len() == self.period)
            .then(|| self.window.iter().sum::<f64>() / self.period as f64)
    }
}
