//! Walk-forward analysis — rolling train/test folds with per-fold re-optimization.
//!
//! The bar series is cut into `n_splits` consecutive chunks. Within each
//! chunk the first `train_ratio` share is in-sample: every grid combination
//! of the strategy runs there and the best by the objective is kept. The
//! chosen parameters then run once on the remaining out-of-sample bars.
//!
//! Minimum data requirements:
//! - 50 bars total
//! - 20 bars per chunk
//! - 10 training and 5 test bars per fold (shorter folds are skipped)

use quantlab_core::domain::{Bar, EquityPoint};
use quantlab_core::engine::{Economics, EngineError};
use quantlab_core::signals::{ParamMap, SignalError, StrategyRegistry};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::objective::Objective;

pub const MIN_TOTAL_BARS: usize = 50;
pub const MIN_SPLIT_BARS: usize = 20;
pub const MIN_TRAIN_BARS: usize = 10;
pub const MIN_TEST_BARS: usize = 5;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Number of consecutive chunks (default 5).
    pub n_splits: usize,
    /// In-sample share of each chunk (default 0.7).
    pub train_ratio: f64,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            n_splits: 5,
            train_ratio: 0.7,
        }
    }
}

impl WalkForwardConfig {
    pub fn validate(&self) -> Result<(), WalkForwardError> {
        if self.n_splits == 0 {
            return Err(WalkForwardError::InvalidConfig(
                "n_splits must be >= 1".into(),
            ));
        }
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(WalkForwardError::InvalidConfig(format!(
                "train_ratio must be in (0, 1), got {}",
                self.train_ratio
            )));
        }
        Ok(())
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Outcome of one train/test fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldReport {
    pub fold_index: usize,
    pub train_bars: usize,
    pub test_bars: usize,
    /// Parameters chosen in-sample.
    pub params: ParamMap,
    /// Objective value of the chosen parameters in-sample. `None` when every
    /// in-sample run failed and defaults were used.
    pub in_sample_score: Option<f64>,
    pub oos_return_pct: f64,
    pub oos_sharpe: f64,
    pub oos_max_drawdown_pct: f64,
    pub oos_trades: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub strategy: String,
    pub objective: Objective,
    pub folds: Vec<FoldReport>,
    pub avg_oos_return_pct: f64,
    pub avg_oos_sharpe: f64,
    pub avg_oos_max_drawdown_pct: f64,
    /// Out-of-sample equity curves of every completed fold, concatenated.
    pub oos_equity_curve: Vec<EquityPoint>,
}

#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("insufficient data: {total_bars} bars < minimum {min_bars}")]
    InsufficientData { total_bars: usize, min_bars: usize },
    #[error("split too short: {split_bars} bars per split < minimum {min_bars}")]
    SplitTooShort { split_bars: usize, min_bars: usize },
    #[error("invalid walk-forward config: {0}")]
    InvalidConfig(String),
    #[error("no fold completed")]
    NoCompletedFolds,
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error(transparent)]
    Economics(#[from] EngineError),
}

// ─── Orchestration ───────────────────────────────────────────────────

/// Run walk-forward analysis of `strategy` over `bars`.
pub fn walk_forward(
    registry: &StrategyRegistry,
    bars: &[Bar],
    strategy: &str,
    objective: Objective,
    economics: &Economics,
    config: &WalkForwardConfig,
) -> Result<WalkForwardResult, WalkForwardError> {
    config.validate()?;
    economics.validate()?;
    let total_bars = bars.len();
    if total_bars < MIN_TOTAL_BARS {
        return Err(WalkForwardError::InsufficientData {
            total_bars,
            min_bars: MIN_TOTAL_BARS,
        });
    }
    let split_bars = total_bars / config.n_splits;
    if split_bars < MIN_SPLIT_BARS {
        return Err(WalkForwardError::SplitTooShort {
            split_bars,
            min_bars: MIN_SPLIT_BARS,
        });
    }
    let combos = registry.param_grid(strategy)?;
    let defaults = registry.defaults(strategy)?;

    let mut folds = Vec::with_capacity(config.n_splits);
    let mut oos_equity_curve = Vec::new();
    for fold_index in 0..config.n_splits {
        let chunk = &bars[fold_index * split_bars..(fold_index + 1) * split_bars];
        let train_bars = (chunk.len() as f64 * config.train_ratio).floor() as usize;
        let test_bars = chunk.len() - train_bars;
        if train_bars < MIN_TRAIN_BARS || test_bars < MIN_TEST_BARS {
            debug!(fold_index, train_bars, test_bars, "fold skipped: too short");
            continue;
        }
        let (train, test) = chunk.split_at(train_bars);

        let (params, in_sample_score) =
            select_in_sample(registry, strategy, &combos, train, objective, economics)
                .unwrap_or_else(|| (defaults.clone(), None));
        debug!(fold_index, params = ?params, score = ?in_sample_score, "in-sample selection");

        let oos = match quantlab_core::backtest(registry, strategy, &params, test, economics) {
            Ok(result) => result,
            Err(e) => {
                warn!(fold_index, error = %e, "out-of-sample run failed");
                continue;
            }
        };
        let Some(metrics) = oos.metrics.as_ref() else {
            warn!(fold_index, error = ?oos.error, "out-of-sample run produced no metrics");
            continue;
        };
        folds.push(FoldReport {
            fold_index,
            train_bars,
            test_bars,
            params,
            in_sample_score,
            oos_return_pct: metrics.total_return_pct,
            oos_sharpe: metrics.sharpe_ratio,
            oos_max_drawdown_pct: metrics.max_drawdown_pct,
            oos_trades: metrics.num_trades,
        });
        oos_equity_curve.extend_from_slice(&oos.equity_curve);
    }

    if folds.is_empty() {
        return Err(WalkForwardError::NoCompletedFolds);
    }
    let n = folds.len() as f64;
    let avg = |f: fn(&FoldReport) -> f64| folds.iter().map(f).sum::<f64>() / n;
    Ok(WalkForwardResult {
        strategy: strategy.to_string(),
        objective,
        avg_oos_return_pct: avg(|f| f.oos_return_pct),
        avg_oos_sharpe: avg(|f| f.oos_sharpe),
        avg_oos_max_drawdown_pct: avg(|f| f.oos_max_drawdown_pct),
        folds,
        oos_equity_curve,
    })
}

/// Best combination on the training slice; the first wins ties.
///
/// Returns `None` when no combination produced a score.
fn select_in_sample(
    registry: &StrategyRegistry,
    strategy: &str,
    combos: &[ParamMap],
    train: &[Bar],
    objective: Objective,
    economics: &Economics,
) -> Option<(ParamMap, Option<f64>)> {
    let mut best: Option<(&ParamMap, f64)> = None;
    for params in combos {
        let score = quantlab_core::backtest(registry, strategy, params, train, economics)
            .ok()
            .and_then(|result| result.metrics)
            .and_then(|m| objective.score(&m));
        if let Some(score) = score {
            if best.map_or(true, |(_, b)| objective.is_better(score, b)) {
                best = Some((params, score));
            }
        }
    }
    best.map(|(params, score)| (params.clone(), Some(score)))
}
