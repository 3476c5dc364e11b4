//! QuantLab CLI — backtest, optimize, and walk-forward commands.
//!
//! Commands:
//! - `run`: backtest one strategy over a CSV file or synthetic bars
//! - `optimize`: grid search across strategies and timeframes
//! - `walk-forward`: rolling in-sample selection with out-of-sample scoring
//! - `strategies`: list registered strategies with defaults and grids
//! - `fees`: print the exchange fee table

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use quantlab_core::data::timeframe::{is_known, timeframe_ms};
use quantlab_core::engine::Economics;
use quantlab_core::fees::{self, OrderType};
use quantlab_core::signals::{ParamMap, StrategyRegistry};
use quantlab_core::sizing::kelly_from_trades;
use quantlab_core::synthetic::synthetic_bars;
use quantlab_core::{BacktestResult, Bar};
use quantlab_runner::logging::init_logging;
use quantlab_runner::{
    best_per_combo, find_optimal_global, load_csv_bars, walk_forward, BarRequest, BarSource,
    HistoryRecord, HistoryRecorder, InMemorySource, JsonlHistory, Objective, OptimizationResult,
    ProgressEvent, QuantlabConfig, RunKey, SyntheticSource, WalkForwardConfig, WalkForwardResult,
};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "quantlab",
    about = "QuantLab CLI — signal strategy backtesting and optimization"
)]
struct Cli {
    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest one strategy.
    Run {
        /// Strategy id (see `quantlab strategies`).
        #[arg(long)]
        strategy: String,

        /// Parameter override, e.g. `--param fast=5`. Repeatable.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,

        #[command(flatten)]
        input: BarInput,

        #[command(flatten)]
        series: SeriesArgs,

        #[command(flatten)]
        economics: EconomicsArgs,

        /// Append the run's metrics to this JSONL history file.
        #[arg(long)]
        history: Option<PathBuf>,

        /// User name stored with the history record.
        #[arg(long, default_value = "local")]
        user: String,

        /// Print the full result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Grid search across strategies, timeframes, and parameters.
    Optimize {
        /// TOML config; command-line flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory of `{symbol}_{timeframe}.csv` files.
        #[arg(long, conflicts_with = "synthetic")]
        data_dir: Option<PathBuf>,

        /// Symbol to load from the data directory.
        #[arg(long)]
        symbol: Option<String>,

        /// Generate this many synthetic bars per timeframe instead of loading files.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Seed for synthetic bars.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Comma-separated strategy ids. Defaults to every registered strategy.
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<String>,

        /// Comma-separated timeframes.
        #[arg(long, value_delimiter = ',')]
        timeframes: Vec<String>,

        /// Ranking objective (sharpe_ratio, total_return_pct, annual_return_pct,
        /// calmar_ratio, sortino_ratio, max_drawdown_pct).
        #[arg(long)]
        objective: Option<Objective>,

        /// Worker threads. Defaults to available parallelism.
        #[arg(long)]
        workers: Option<usize>,

        #[command(flatten)]
        economics: EconomicsArgs,

        /// Print the full result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Walk-forward analysis of one strategy.
    WalkForward {
        #[arg(long)]
        strategy: String,

        #[command(flatten)]
        input: BarInput,

        #[command(flatten)]
        series: SeriesArgs,

        /// Number of consecutive folds.
        #[arg(long, default_value_t = 5)]
        splits: usize,

        /// In-sample share of each fold.
        #[arg(long, default_value_t = 0.7)]
        train_ratio: f64,

        #[arg(long, default_value = "sharpe_ratio")]
        objective: Objective,

        #[command(flatten)]
        economics: EconomicsArgs,

        /// Print the full result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List registered strategies.
    Strategies,
    /// Print the exchange fee table.
    Fees,
}

/// Where bars for a single-series command come from.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct BarInput {
    /// CSV file with `timestamp,open,high,low,close,volume` columns.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Generate this many synthetic bars.
    #[arg(long)]
    synthetic: Option<usize>,
}

/// Labels for a single series. The timeframe also spaces synthetic bars.
#[derive(Args)]
struct SeriesArgs {
    #[arg(long, default_value = "BTC/USDT")]
    symbol: String,

    #[arg(long, default_value = "1h")]
    timeframe: String,
}

#[derive(Args)]
struct EconomicsArgs {
    /// Take fee and slippage from this exchange's table entry.
    #[arg(long)]
    exchange: Option<String>,

    /// Use maker instead of taker fees with --exchange.
    #[arg(long, default_value_t = false)]
    maker: bool,

    #[arg(long)]
    initial_equity: Option<f64>,

    #[arg(long)]
    leverage: Option<f64>,

    /// Take-profit distance in percent.
    #[arg(long)]
    tp: Option<f64>,

    /// Stop-loss distance in percent.
    #[arg(long)]
    sl: Option<f64>,

    /// Fee per side in percent.
    #[arg(long)]
    fee: Option<f64>,

    /// Slippage per side in percent.
    #[arg(long)]
    slippage: Option<f64>,
}

impl EconomicsArgs {
    /// Layer the flags over `base`. `--exchange` replaces fee and slippage
    /// first; explicit `--fee`/`--slippage` win over it.
    fn apply(&self, mut base: Economics) -> Economics {
        if let Some(exchange) = &self.exchange {
            let order_type = if self.maker {
                OrderType::Maker
            } else {
                OrderType::Taker
            };
            base.fee_rate_pct = fees::fee_rate(exchange, order_type);
            base.slippage_pct = fees::slippage(exchange);
        }
        if let Some(v) = self.initial_equity {
            base.initial_equity = v;
        }
        if let Some(v) = self.leverage {
            base.leverage = v;
        }
        if self.tp.is_some() {
            base.take_profit_pct = self.tp;
        }
        if self.sl.is_some() {
            base.stop_loss_pct = self.sl;
        }
        if let Some(v) = self.fee {
            base.fee_rate_pct = v;
        }
        if let Some(v) = self.slippage {
            base.slippage_pct = v;
        }
        base
    }
}

const SYNTHETIC_SEED: u64 = 42;
const SYNTHETIC_START_PRICE: f64 = 100.0;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Run {
            strategy,
            params,
            input,
            series,
            economics,
            history,
            user,
            json,
        } => run_backtest_cmd(
            &strategy,
            params.into_iter().collect(),
            &input,
            &series,
            &economics,
            history,
            &user,
            json,
        ),
        Commands::Optimize {
            config,
            data_dir,
            symbol,
            synthetic,
            seed,
            strategies,
            timeframes,
            objective,
            workers,
            economics,
            json,
        } => {
            let mut config = match config {
                Some(path) => QuantlabConfig::load(&path)?,
                None => QuantlabConfig::default(),
            };
            if let Some(symbol) = symbol {
                config.market.symbol = symbol;
            }
            if !strategies.is_empty() {
                config.optimizer.strategies = strategies;
            }
            if !timeframes.is_empty() {
                config.optimizer.timeframes = timeframes;
            }
            if let Some(objective) = objective {
                config.optimizer.objective = objective;
            }
            if workers.is_some() {
                config.optimizer.max_workers = workers;
            }
            config.economics = economics.apply(config.economics);
            config.validate()?;
            let source: Box<dyn BarSource> = match (data_dir, synthetic) {
                (Some(dir), _) => Box::new(
                    InMemorySource::from_csv_dir(&dir)?.with_options(config.market.source_options()),
                ),
                (None, Some(n)) => Box::new(SyntheticSource::new(seed, n)),
                (None, None) => bail!("one of --data-dir or --synthetic is required"),
            };
            run_optimize_cmd(&config, source.as_ref(), json)
        }
        Commands::WalkForward {
            strategy,
            input,
            series,
            splits,
            train_ratio,
            objective,
            economics,
            json,
        } => run_walk_forward_cmd(
            &strategy,
            &load_bars(&input, &series.timeframe)?,
            &WalkForwardConfig {
                n_splits: splits,
                train_ratio,
            },
            objective,
            &economics.apply(Economics::default()),
            json,
        ),
        Commands::Strategies => {
            print_strategies(StrategyRegistry::builtin());
            Ok(())
        }
        Commands::Fees => {
            print_fees();
            Ok(())
        }
    }
}

fn parse_param(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    Ok((key.trim().to_string(), value))
}

fn load_bars(input: &BarInput, timeframe: &str) -> Result<Vec<Bar>> {
    if !is_known(timeframe) {
        bail!("unknown timeframe '{timeframe}'");
    }
    match (&input.csv, input.synthetic) {
        (Some(path), _) => {
            load_csv_bars(path).with_context(|| format!("loading {}", path.display()))
        }
        (None, Some(n)) => Ok(synthetic_bars(
            SYNTHETIC_SEED,
            n,
            0,
            timeframe_ms(timeframe),
            SYNTHETIC_START_PRICE,
        )),
        (None, None) => bail!("one of --csv or --synthetic is required"),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_backtest_cmd(
    strategy: &str,
    params: ParamMap,
    input: &BarInput,
    series: &SeriesArgs,
    economics_args: &EconomicsArgs,
    history: Option<PathBuf>,
    user: &str,
    json: bool,
) -> Result<()> {
    let registry = StrategyRegistry::builtin();
    let economics = economics_args.apply(Economics::default());
    let bars = load_bars(input, &series.timeframe)?;
    info!(strategy, bars = bars.len(), "running backtest");
    let result = quantlab_core::backtest(registry, strategy, &params, &bars, &economics)?;

    if let Some(path) = history {
        let key = RunKey {
            user,
            symbol: &series.symbol,
            exchange: economics_args.exchange.as_deref().unwrap_or(""),
            timeframe: &series.timeframe,
            strategy,
        };
        let resolved = registry.resolve_params(strategy, &params)?;
        if let Some(record) = HistoryRecord::from_result(&key, &resolved, &result) {
            JsonlHistory::new(path).record(&record)?;
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(strategy, &params, &result);
    }
    Ok(())
}

fn run_optimize_cmd(config: &QuantlabConfig, source: &dyn BarSource, json: bool) -> Result<()> {
    let request: BarRequest = config.market.bar_request()?;
    let progress = |event: &ProgressEvent| {
        eprint!(
            "\r[{}/{}] {} {}  best: {}",
            event.completed,
            event.total,
            event.strategy,
            event.timeframe,
            event
                .best_so_far
                .map_or_else(|| "-".to_string(), |s| format!("{s:.4}"))
        );
    };
    let result = find_optimal_global(
        source,
        StrategyRegistry::builtin(),
        &request,
        &config.optimizer,
        &config.economics,
        Some(&progress),
        None,
    )?;
    eprintln!();

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_optimization(&result);
    }
    Ok(())
}

fn run_walk_forward_cmd(
    strategy: &str,
    bars: &[Bar],
    config: &WalkForwardConfig,
    objective: Objective,
    economics: &Economics,
    json: bool,
) -> Result<()> {
    let result = walk_forward(
        StrategyRegistry::builtin(),
        bars,
        strategy,
        objective,
        economics,
        config,
    )?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_walk_forward(&result);
    }
    Ok(())
}

// ─── Output ──────────────────────────────────────────────────────────

fn format_params(params: &ParamMap) -> String {
    let pairs: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.join(" ")
}

fn print_summary(strategy: &str, params: &ParamMap, result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {strategy} {}", format_params(params));
    println!("Bars:           {}", result.equity_curve.len());
    let Some(m) = &result.metrics else {
        println!("No result: {}", result.error.as_deref().unwrap_or("unknown error"));
        println!();
        return;
    };
    println!("Trades:         {}", m.num_trades);
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", m.final_equity);
    println!("Total Return:   {:.2}%", m.total_return_pct);
    println!("Annual Return:  {:.2}%", m.annual_return_pct);
    println!("Sharpe:         {:.3}", m.sharpe_ratio);
    println!("Sortino:        {:.3}", m.sortino_ratio);
    println!("Calmar:         {:.3}", m.calmar_ratio);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown_pct);
    println!("Win Rate:       {:.1}%", m.win_rate_pct);
    println!("Fees:           {:.2}", m.total_fees);

    let kelly = kelly_from_trades(&result.trades);
    println!();
    println!("--- Sizing ---");
    println!(
        "Kelly:          {:.1}% ({:?})",
        kelly.kelly_fraction * 100.0,
        kelly.recommendation
    );
    if result.liquidated {
        println!();
        println!("WARNING: equity reached zero (liquidated)");
    }
    println!();
}

fn print_optimization(result: &OptimizationResult) {
    println!();
    println!("=== Optimization ({}) ===", result.objective);
    println!(
        "Tasks:          {}/{}{}",
        result.completed_tasks,
        result.total_tasks,
        if result.cancelled { " (cancelled)" } else { "" }
    );
    println!("Failures:       {}", result.failures().count());
    println!();
    println!(
        "{:<18} {:<4} {:>12} {:>10} {:>8}  Params",
        "Strategy", "TF", "Score", "Return %", "Trades"
    );
    println!("{}", "-".repeat(72));
    for entry in best_per_combo(result) {
        let (ret, trades) = entry
            .result
            .metrics
            .as_ref()
            .map_or((0.0, 0), |m| (m.total_return_pct, m.num_trades));
        println!(
            "{:<18} {:<4} {:>12.4} {:>10.2} {:>8}  {}",
            entry.strategy,
            entry.timeframe,
            entry.score.unwrap_or(f64::NAN),
            ret,
            trades,
            format_params(&entry.params)
        );
    }
    println!();
    match result.best() {
        Some(best) => println!(
            "Best: {} {} {} (score {:.4})",
            best.strategy,
            best.timeframe,
            format_params(&best.params),
            best.score.unwrap_or(f64::NAN)
        ),
        None => println!("No successful run."),
    }
    println!();
}

fn print_walk_forward(result: &WalkForwardResult) {
    println!();
    println!("=== Walk-Forward: {} ({}) ===", result.strategy, result.objective);
    println!(
        "{:>4} {:>6} {:>6} {:>10} {:>8} {:>8}  Params",
        "Fold", "Train", "Test", "OOS Ret %", "Sharpe", "MDD %"
    );
    println!("{}", "-".repeat(64));
    for fold in &result.folds {
        println!(
            "{:>4} {:>6} {:>6} {:>10.2} {:>8.3} {:>8.2}  {}",
            fold.fold_index,
            fold.train_bars,
            fold.test_bars,
            fold.oos_return_pct,
            fold.oos_sharpe,
            fold.oos_max_drawdown_pct,
            format_params(&fold.params)
        );
    }
    println!("{}", "-".repeat(64));
    println!(
        "Average:  return {:.2}%  sharpe {:.3}  drawdown {:.2}%",
        result.avg_oos_return_pct, result.avg_oos_sharpe, result.avg_oos_max_drawdown_pct
    );
    println!();
}

fn print_strategies(registry: &StrategyRegistry) {
    for def in registry.defs() {
        println!("{:<18} {}", def.id, def.description);
        for p in &def.params {
            let grid: Vec<String> = p.grid.iter().map(|v| v.to_string()).collect();
            println!(
                "    {:<12} default {:<6} grid [{}]",
                p.name,
                p.default,
                grid.join(", ")
            );
        }
    }
}

fn print_fees() {
    for (kind, members) in fees::exchanges_by_kind() {
        println!(
            "{} (slippage {:.2}%)",
            kind.label(),
            kind.default_slippage_pct()
        );
        for e in members {
            let tax = if e.sell_tax_pct > 0.0 {
                format!("  sell tax {:.2}%", e.sell_tax_pct)
            } else {
                String::new()
            };
            println!(
                "    {:<16} {:<28} maker {:>6.3}%  taker {:>6.3}%{tax}",
                e.id, e.name, e.maker_pct, e.taker_pct
            );
        }
    }
}
