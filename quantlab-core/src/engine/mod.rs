//! Simulation engine — one canonical accounting policy over bars and signals.
//!
//! The engine consumes a bar sequence, an index-aligned signal sequence, and
//! [`Economics`], and produces a [`BacktestResult`]. It is a pure function:
//! no I/O and no shared state, so any number of runs may execute
//! concurrently.
//!
//! Data-driven outcomes (liquidation, empty data) live in the result.
//! Only caller contract violations are returned as [`EngineError`].

pub mod loop_runner;
pub mod state;

pub use loop_runner::{run, run_over};
pub use state::{BacktestResult, Economics};

use thiserror::Error;

use crate::domain::Signal;

/// Caller-side contract violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("initial equity must be positive, got {0}")]
    NonPositiveEquity(f64),
    #[error("leverage must be >= 1, got {0}")]
    InvalidLeverage(f64),
    #[error("{name} must be a non-negative number, got {value}")]
    InvalidCost { name: &'static str, value: f64 },
    #[error("{name} must be positive when set, got {value}")]
    InvalidExitLevel { name: &'static str, value: f64 },
    #[error("signal length {signal} does not match bar count {bars}")]
    SignalLengthMismatch { bars: usize, signal: usize },
    #[error("signal value {value} at index {index} is not -1, 0 or 1")]
    InvalidSignal { index: usize, value: Signal },
}
