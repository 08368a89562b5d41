use std::collections::VecDeque;

/// Percentage change of the close against the close `lookback` bars earlier.
#[derive(Debug, Clone)]
pub struct PctChange {
    lookback: usize,
    closes: VecDeque<f64>,
}

impl PctChange {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback,
            closes: VecDeque::with_capacity(lookback + 1),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        if self.closes.len() == self.lookback + 1 {
            self.closes.pop_front();
        }
        self.closes.push_back(close);

        if self.closes.len() <= self.lookback {
            return None;
        }
        let base = *self.closes.front()?;
        Some((close - base) / base * 100.0)
    }
}
