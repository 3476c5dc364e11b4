//! Parameter-sweep optimizer.
//!
//! The search grid is strategy × timeframe × parameter combination. Each
//! task fetches its own bars, generates the strategy's signal, simulates it,
//! and scores the run with the configured [`Objective`].
//!
//! Tasks run on a bounded Rayon pool. Workers never touch shared state: each
//! returns its entry, results are collected in task order, and the best run
//! is picked by a sequential pass over that order with a strict comparison,
//! so ties go to the earliest task regardless of completion order.
//! Progress is reported from a single reducer on the calling thread.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use quantlab_core::domain::Bar;
use quantlab_core::engine::{BacktestResult, Economics, EngineError};
use quantlab_core::signals::{ParamMap, SignalError, StrategyRegistry};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::objective::Objective;
use crate::source::BarSource;

/// Timeframes searched when none are configured.
pub const DEFAULT_TIMEFRAMES: [&str; 6] = ["1m", "5m", "15m", "1h", "4h", "1d"];

/// Upper bound on pool size when no worker count is configured.
pub const MAX_WORKERS: usize = 32;

/// Combination cap for single-strategy search.
pub const DEFAULT_MAX_COMBOS: usize = 64;

// ─── Configuration ───────────────────────────────────────────────────

/// `since_ms` of a window with no start date.
pub const OPEN_START_MS: i64 = 0;
/// `until_ms` of a window with no end date.
pub const OPEN_END_MS: i64 = i64::MAX;

/// Symbol and time window every task fetches bars for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRequest {
    pub symbol: String,
    pub since_ms: i64,
    pub until_ms: i64,
}

impl BarRequest {
    /// Span that runs over `bars` fetched for this request are annualized over.
    ///
    /// A bounded window contributes its own length. An open start or end
    /// falls back to the first or last bar, so an unbounded request measures
    /// the data it actually got.
    pub fn time_span_ms(&self, bars: &[Bar]) -> Option<i64> {
        let (first, last) = (bars.first()?, bars.last()?);
        let since = if self.since_ms == OPEN_START_MS {
            first.timestamp
        } else {
            self.since_ms
        };
        let until = if self.until_ms == OPEN_END_MS {
            last.timestamp
        } else {
            self.until_ms
        };
        Some(until.saturating_sub(since))
    }
}

/// What a global sweep covers and how it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub strategies: Vec<String>,
    pub timeframes: Vec<String>,
    pub objective: Objective,
    /// Pool size. Defaults to available parallelism, capped at [`MAX_WORKERS`].
    pub max_workers: Option<usize>,
    /// Keep only the first N grid combinations of each strategy.
    pub max_combos_per_strategy: Option<usize>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            strategies: StrategyRegistry::builtin()
                .ids()
                .into_iter()
                .map(String::from)
                .collect(),
            timeframes: DEFAULT_TIMEFRAMES.iter().map(|s| s.to_string()).collect(),
            objective: Objective::default(),
            max_workers: None,
            max_combos_per_strategy: None,
        }
    }
}

/// Options for [`find_optimal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub objective: Objective,
    pub max_combos: usize,
    /// Candidate values replacing the declared grid for some parameters.
    pub grid: Option<BTreeMap<String, Vec<f64>>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            objective: Objective::default(),
            max_combos: DEFAULT_MAX_COMBOS,
            grid: None,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// One evaluated grid point. Failed tasks keep their error in `result.error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub strategy: String,
    pub timeframe: String,
    pub params: ParamMap,
    pub result: BacktestResult,
    /// Raw objective value; `None` for failed runs.
    pub score: Option<f64>,
}

impl SweepEntry {
    pub fn error(&self) -> Option<&str> {
        self.result.error.as_deref()
    }
}

/// Outcome of a sweep.
///
/// `all_results` is in task order. The `best_*` accessors are views onto
/// the entry at `best_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub objective: Objective,
    pub all_results: Vec<SweepEntry>,
    pub best_index: Option<usize>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// The cancel flag stopped at least one task from starting.
    pub cancelled: bool,
}

impl OptimizationResult {
    pub fn best(&self) -> Option<&SweepEntry> {
        self.best_index.and_then(|i| self.all_results.get(i))
    }

    pub fn best_result(&self) -> Option<&BacktestResult> {
        self.best().map(|e| &e.result)
    }

    pub fn best_strategy(&self) -> Option<&str> {
        self.best().map(|e| e.strategy.as_str())
    }

    pub fn best_timeframe(&self) -> Option<&str> {
        self.best().map(|e| e.timeframe.as_str())
    }

    pub fn best_params(&self) -> Option<&ParamMap> {
        self.best().map(|e| &e.params)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best().and_then(|e| e.score)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SweepEntry> {
        self.all_results.iter().filter(|e| e.error().is_some())
    }
}

/// Advisory progress snapshot, emitted once per finished task.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub strategy: String,
    pub timeframe: String,
    pub completed: usize,
    pub total: usize,
    pub best_so_far: Option<f64>,
}

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("empty search grid: {0}")]
    EmptyGrid(&'static str),
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error(transparent)]
    Economics(#[from] EngineError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

// ─── Global sweep ────────────────────────────────────────────────────

struct Task {
    strategy: String,
    timeframe: String,
    params: ParamMap,
}

struct SweepContext<'a> {
    source: &'a dyn BarSource,
    registry: &'a StrategyRegistry,
    request: &'a BarRequest,
    objective: Objective,
    economics: &'a Economics,
}

/// Search every configured strategy, timeframe, and parameter combination.
///
/// - `progress_cb`: called on the calling thread after each task finishes.
/// - `cancel`: checked before each task starts; tasks already running finish.
///
/// Per-task failures (missing data, rejected parameters) are recorded in
/// `all_results` and never abort the sweep.
pub fn find_optimal_global(
    source: &dyn BarSource,
    registry: &StrategyRegistry,
    request: &BarRequest,
    config: &OptimizerConfig,
    economics: &Economics,
    progress_cb: Option<&dyn Fn(&ProgressEvent)>,
    cancel: Option<&AtomicBool>,
) -> Result<OptimizationResult, OptimizerError> {
    economics.validate()?;
    let tasks = build_tasks(registry, config)?;
    let total = tasks.len();
    let workers = config
        .max_workers
        .unwrap_or_else(default_workers)
        .clamp(1, total);
    info!(
        symbol = %request.symbol,
        tasks = total,
        workers,
        objective = %config.objective,
        "starting sweep"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;
    let ctx = SweepContext {
        source,
        registry,
        request,
        objective: config.objective,
        economics,
    };

    let (tx, rx) = mpsc::channel::<(usize, Option<f64>)>();
    let slots: Vec<Option<SweepEntry>> = thread::scope(|scope| {
        let (tasks, ctx, pool) = (&tasks, &ctx, &pool);
        let worker = scope.spawn(move || {
            pool.install(|| {
                tasks
                    .par_iter()
                    .enumerate()
                    .map_with(tx, |tx, (index, task)| {
                        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                            return None;
                        }
                        let entry = evaluate(ctx, task);
                        // The reducer outlives every sender; a failed send only drops progress.
                        let _ = tx.send((index, entry.score));
                        Some(entry)
                    })
                    .collect::<Vec<_>>()
            })
        });
        reduce_progress(&rx, tasks, config.objective, progress_cb);
        worker
            .join()
            .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
    });

    let cancelled = slots.iter().any(Option::is_none);
    let all_results: Vec<SweepEntry> = slots.into_iter().flatten().collect();
    let best_index = select_best(&all_results, config.objective);
    let result = OptimizationResult {
        objective: config.objective,
        completed_tasks: all_results.len(),
        all_results,
        best_index,
        total_tasks: total,
        cancelled,
    };
    if cancelled {
        info!(
            completed = result.completed_tasks,
            total, "sweep cancelled"
        );
    }
    log_best(&result);
    Ok(result)
}

/// Expand the config into tasks: strategy, then timeframe, then combination.
fn build_tasks(
    registry: &StrategyRegistry,
    config: &OptimizerConfig,
) -> Result<Vec<Task>, OptimizerError> {
    if config.strategies.is_empty() {
        return Err(OptimizerError::EmptyGrid("no strategies"));
    }
    if config.timeframes.is_empty() {
        return Err(OptimizerError::EmptyGrid("no timeframes"));
    }
    let mut tasks = Vec::new();
    for strategy in &config.strategies {
        if registry.get(strategy).is_none() {
            return Err(OptimizerError::UnknownStrategy(strategy.clone()));
        }
        let mut combos = registry.param_grid(strategy)?;
        if let Some(max) = config.max_combos_per_strategy {
            combos.truncate(max.max(1));
        }
        for timeframe in &config.timeframes {
            tasks.extend(combos.iter().map(|params| Task {
                strategy: strategy.clone(),
                timeframe: timeframe.clone(),
                params: params.clone(),
            }));
        }
    }
    if tasks.is_empty() {
        return Err(OptimizerError::EmptyGrid("no parameter combinations"));
    }
    Ok(tasks)
}

fn default_workers() -> usize {
    thread::available_parallelism()
        .map_or(1, |n| n.get())
        .min(MAX_WORKERS)
}

fn evaluate(ctx: &SweepContext<'_>, task: &Task) -> SweepEntry {
    let fetched = ctx.source.get_bars(
        &ctx.request.symbol,
        &task.timeframe,
        ctx.request.since_ms,
        ctx.request.until_ms,
    );
    let (result, score) = match fetched {
        Ok(bars) => simulate(
            ctx.registry,
            &task.strategy,
            &task.params,
            &bars,
            ctx.request.time_span_ms(&bars),
            ctx.economics,
            ctx.objective,
        ),
        Err(e) => (BacktestResult::failed(e.to_string()), None),
    };
    match &result.error {
        Some(error) => warn!(
            strategy = %task.strategy,
            timeframe = %task.timeframe,
            error = %error,
            "task failed"
        ),
        None => debug!(
            strategy = %task.strategy,
            timeframe = %task.timeframe,
            params = ?task.params,
            score = ?score,
            "task complete"
        ),
    }
    SweepEntry {
        strategy: task.strategy.clone(),
        timeframe: task.timeframe.clone(),
        params: task.params.clone(),
        result,
        score,
    }
}

/// Signal, simulate, and score one combination on `bars`.
fn simulate(
    registry: &StrategyRegistry,
    strategy: &str,
    params: &ParamMap,
    bars: &[Bar],
    time_span_ms: Option<i64>,
    economics: &Economics,
    objective: Objective,
) -> (BacktestResult, Option<f64>) {
    match quantlab_core::backtest_over(registry, strategy, params, bars, economics, time_span_ms)
    {
        Ok(result) => {
            let score = result.metrics.as_ref().and_then(|m| objective.score(m));
            (result, score)
        }
        Err(e) => (BacktestResult::failed(e.to_string()), None),
    }
}

/// Single reducer for the advisory best-so-far. Runs until every worker
/// has dropped its sender.
fn reduce_progress(
    rx: &mpsc::Receiver<(usize, Option<f64>)>,
    tasks: &[Task],
    objective: Objective,
    progress_cb: Option<&dyn Fn(&ProgressEvent)>,
) {
    let mut completed = 0;
    let mut best: Option<(usize, f64)> = None;
    for (index, score) in rx.iter() {
        completed += 1;
        if let Some(score) = score {
            let replaces = best.map_or(true, |(best_index, best_score)| {
                objective.is_better(score, best_score)
                    || (!objective.is_better(best_score, score) && index < best_index)
            });
            if replaces {
                best = Some((index, score));
            }
        }
        if let Some(cb) = progress_cb {
            let task = &tasks[index];
            cb(&ProgressEvent {
                strategy: task.strategy.clone(),
                timeframe: task.timeframe.clone(),
                completed,
                total: tasks.len(),
                best_so_far: best.map(|(_, s)| s),
            });
        }
    }
}

/// Index of the best-scoring entry; the earliest wins ties.
fn select_best(entries: &[SweepEntry], objective: Objective) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.score.map(|s| (i, s)))
        .fold(None, |best: Option<(usize, f64)>, (i, s)| match best {
            Some((_, b)) if !objective.is_better(s, b) => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}

fn log_best(result: &OptimizationResult) {
    match result.best() {
        Some(best) => info!(
            strategy = %best.strategy,
            timeframe = %best.timeframe,
            params = ?best.params,
            score = ?best.score,
            failures = result.failures().count(),
            "sweep complete"
        ),
        None => warn!(
            completed = result.completed_tasks,
            "sweep complete without a successful run"
        ),
    }
}

// ─── Single-strategy search ──────────────────────────────────────────

/// Search one strategy on one timeframe, sequentially, with bars fetched once.
///
/// The combination list is the strategy's grid (or `options.grid` where
/// given) truncated to `options.max_combos`. A failed fetch yields no best
/// and a single failed entry carrying the strategy defaults.
#[allow(clippy::too_many_arguments)]
pub fn find_optimal(
    source: &dyn BarSource,
    registry: &StrategyRegistry,
    request: &BarRequest,
    strategy: &str,
    timeframe: &str,
    options: &SearchOptions,
    economics: &Economics,
    progress_cb: Option<&dyn Fn(&ProgressEvent)>,
) -> Result<OptimizationResult, OptimizerError> {
    economics.validate()?;
    if registry.get(strategy).is_none() {
        return Err(OptimizerError::UnknownStrategy(strategy.to_string()));
    }
    let mut combos = match &options.grid {
        Some(grid) => registry.param_grid_with(strategy, grid)?,
        None => registry.param_grid(strategy)?,
    };
    combos.truncate(options.max_combos.max(1));
    if combos.is_empty() {
        return Err(OptimizerError::EmptyGrid("no parameter combinations"));
    }
    let total = combos.len();
    let objective = options.objective;

    let entry = |params: ParamMap, (result, score): (BacktestResult, Option<f64>)| SweepEntry {
        strategy: strategy.to_string(),
        timeframe: timeframe.to_string(),
        params,
        result,
        score,
    };

    let bars = match source.get_bars(&request.symbol, timeframe, request.since_ms, request.until_ms)
    {
        Ok(bars) => bars,
        Err(e) => {
            warn!(strategy, timeframe, error = %e, "bar fetch failed");
            let failed = entry(
                registry.defaults(strategy)?,
                (BacktestResult::failed(e.to_string()), None),
            );
            return Ok(OptimizationResult {
                objective,
                all_results: vec![failed],
                best_index: None,
                total_tasks: total,
                completed_tasks: 1,
                cancelled: false,
            });
        }
    };

    let time_span_ms = request.time_span_ms(&bars);
    let mut all_results = Vec::with_capacity(total);
    let mut best: Option<f64> = None;
    for params in combos {
        let outcome = simulate(
            registry,
            strategy,
            &params,
            &bars,
            time_span_ms,
            economics,
            objective,
        );
        if let Some(score) = outcome.1 {
            if best.map_or(true, |b| objective.is_better(score, b)) {
                best = Some(score);
            }
        }
        all_results.push(entry(params, outcome));
        if let Some(cb) = progress_cb {
            cb(&ProgressEvent {
                strategy: strategy.to_string(),
                timeframe: timeframe.to_string(),
                completed: all_results.len(),
                total,
                best_so_far: best,
            });
        }
    }

    let best_index = select_best(&all_results, objective);
    let result = OptimizationResult {
        objective,
        completed_tasks: all_results.len(),
        all_results,
        best_index,
        total_tasks: total,
        cancelled: false,
    };
    log_best(&result);
    Ok(result)
}

// ─── Summaries ───────────────────────────────────────────────────────

/// Best successful entry per (strategy, timeframe), in first-appearance order.
pub fn best_per_combo(result: &OptimizationResult) -> Vec<&SweepEntry> {
    let mut order: Vec<(&str, &str)> = Vec::new();
    let mut best: BTreeMap<(&str, &str), &SweepEntry> = BTreeMap::new();
    for entry in &result.all_results {
        let Some(score) = entry.score else {
            continue;
        };
        let key = (entry.strategy.as_str(), entry.timeframe.as_str());
        match best.get(&key) {
            None => {
                order.push(key);
                best.insert(key, entry);
            }
            Some(current) => {
                let beats = current
                    .score
                    .map_or(true, |c| result.objective.is_better(score, c));
                if beats {
                    best.insert(key, entry);
                }
            }
        }
    }
    order.into_iter().filter_map(|key| best.get(&key).copied()).collect()
}
