//! Deterministic indicators over daily bars and the threshold rules that turn
//! the latest indicator values into a verdict.
//!
//! Everything here is pure: no I/O, no clocks, no shared state. Feeding the same
//! bars in the same order always yields bit-identical output.

pub mod classifier;
pub mod engine;
pub mod indicators;
pub mod snapshot;

pub use classifier::{Thresholds, Verdict, classify};
pub use engine::{EngineError, IndicatorState, compute};
pub use snapshot::{IndicatorParams, IndicatorSnapshot};
