//! Bar-by-bar simulation loop.
//!
//! Per bar, in order:
//! 1. Liquidated runs report zero equity and do nothing else.
//! 2. Intrabar stop-loss / take-profit check against the bar's range.
//! 3. Signal flip: close at the bar's close when the target differs.
//! 4. Entry at the bar's close when flat and the target is non-zero.
//! 5. Mark-to-market at the bar's close.
//!
//! After the scan, a position still open is closed at the final close.

use tracing::debug;

use super::state::{BacktestResult, Economics, SimState};
use super::EngineError;
use crate::domain::{Bar, Signal};
use crate::metrics::Metrics;

/// Simulate `signal` over `bars` under `economics`, annualizing over the
/// span from the first to the last bar.
///
/// Contract violations (bad economics, a signal of the wrong length or
/// outside {-1, 0, 1}) are errors. An empty bar sequence is not: it yields a
/// result whose `error` is `"no data"`.
pub fn run(
    bars: &[Bar],
    signal: &[Signal],
    economics: &Economics,
) -> Result<BacktestResult, EngineError> {
    run_over(bars, signal, economics, None)
}

/// Like [`run`], with metrics annualized over `time_span_ms` when given.
///
/// Callers that fetched bars for a requested window pass that window's
/// length here.
pub fn run_over(
    bars: &[Bar],
    signal: &[Signal],
    economics: &Economics,
    time_span_ms: Option<i64>,
) -> Result<BacktestResult, EngineError> {
    economics.validate()?;
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Ok(BacktestResult::no_data());
    };
    if signal.len() != bars.len() {
        return Err(EngineError::SignalLengthMismatch {
            bars: bars.len(),
            signal: signal.len(),
        });
    }
    if let Some((index, &value)) = signal
        .iter()
        .enumerate()
        .find(|(_, s)| !(-1..=1).contains(*s))
    {
        return Err(EngineError::InvalidSignal { index, value });
    }

    let mut state = SimState::new(economics);
    let final_index = bars.len() - 1;
    let mut equity_curve: Vec<_> = bars
        .iter()
        .zip(signal)
        .enumerate()
        .map(|(i, (bar, &target))| state.step(bar, target, i < final_index))
        .collect();
    state.finish(last.timestamp, &mut equity_curve);

    let time_span_ms = time_span_ms.unwrap_or(last.timestamp - first.timestamp);
    let metrics = Metrics::compute(
        &equity_curve,
        &state.trades,
        economics.initial_equity,
        time_span_ms,
    );
    debug!(
        bars = bars.len(),
        trades = state.trades.len(),
        final_equity = metrics.final_equity,
        liquidated = state.liquidated,
        "simulation complete"
    );

    Ok(BacktestResult {
        equity_curve,
        trades: state.trades,
        metrics: Some(metrics),
        error: None,
        liquidated: state.liquidated,
    })
}
