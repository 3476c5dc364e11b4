//! QuantLab Core — bar domain types, indicators, signal library, simulation, metrics.
//!
//! This crate holds everything that is a pure function of its inputs:
//! - Domain types (bars, positions, trades, equity points)
//! - Indicators behind the `Indicator` trait
//! - The signal library and its strategy registry
//! - The single-pass simulation engine
//! - Performance metrics
//! - Bar-series utilities (timeframes, gap fill, hygiene), fee tables,
//!   position sizing, and deterministic synthetic data
//!
//! Nothing here performs I/O or holds shared mutable state.

pub mod data;
pub mod domain;
pub mod engine;
pub mod fees;
pub mod indicators;
pub mod metrics;
pub mod signals;
pub mod sizing;
pub mod synthetic;

pub use domain::{Bar, EquityPoint, ExitReason, Position, Side, Signal, Trade};
pub use engine::{run, run_over, BacktestResult, Economics, EngineError};
pub use metrics::Metrics;
pub use signals::{generate_signal, ParamMap, SignalError, SignalStrategy, StrategyRegistry};

/// Generate signals for `strategy` and simulate them in one call.
///
/// Parameter and contract errors surface as [`BacktestError`]; an empty bar
/// sequence yields a result whose `error` is `"no data"`.
pub fn backtest(
    registry: &StrategyRegistry,
    strategy: &str,
    params: &ParamMap,
    bars: &[Bar],
    economics: &Economics,
) -> Result<BacktestResult, BacktestError> {
    backtest_over(registry, strategy, params, bars, economics, None)
}

/// [`backtest`] with metrics annualized over `time_span_ms` when given.
pub fn backtest_over(
    registry: &StrategyRegistry,
    strategy: &str,
    params: &ParamMap,
    bars: &[Bar],
    economics: &Economics,
    time_span_ms: Option<i64>,
) -> Result<BacktestResult, BacktestError> {
    economics.validate()?;
    let built = registry.build(strategy, params)?;
    if bars.is_empty() {
        return Ok(BacktestResult::no_data());
    }
    let signal = built.generate(bars);
    Ok(run_over(bars, &signal, economics, time_span_ms)?)
}

/// Failure of [`backtest`] before or during simulation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BacktestError {
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
