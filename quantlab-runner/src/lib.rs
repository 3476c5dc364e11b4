//! QuantLab Runner — parameter sweeps, walk-forward analysis, bar sources, history.
//!
//! This crate builds on `quantlab-core` to provide:
//! - Objectives for ranking runs
//! - The parallel grid optimizer and single-strategy search
//! - Walk-forward analysis with per-fold re-optimization
//! - Bar sources (in-memory, CSV directory, synthetic)
//! - JSONL run history
//! - TOML configuration and logging setup

pub mod config;
pub mod history;
pub mod logging;
pub mod objective;
pub mod optimizer;
pub mod source;
pub mod walk_forward;

pub use config::{ConfigError, MarketConfig, QuantlabConfig, RunId, StrategyConfig};
pub use history::{HistoryError, HistoryRecord, HistoryRecorder, JsonlHistory, RunKey};
pub use objective::{Objective, UnknownObjective};
pub use optimizer::{
    best_per_combo, find_optimal, find_optimal_global, BarRequest, OptimizationResult,
    OptimizerConfig, OptimizerError, ProgressEvent, SearchOptions, SweepEntry,
};
pub use source::{
    load_csv_bars, write_csv_bars, BarSource, InMemorySource, SourceError, SourceOptions,
    SyntheticSource,
};
pub use walk_forward::{
    walk_forward, FoldReport, WalkForwardConfig, WalkForwardError, WalkForwardResult,
};
