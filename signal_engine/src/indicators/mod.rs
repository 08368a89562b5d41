//! Streaming indicator primitives.
//!
//! Each indicator is fed one close at a time and answers `None` until it has
//! seen enough history. A value produced for a bar never depends on bars
//! pushed after it.

pub mod pct_change;
pub mod rsi;
pub mod sma;

pub use pct_change::PctChange;
pub use rsi::Rsi;
pub use sma::Sma;
