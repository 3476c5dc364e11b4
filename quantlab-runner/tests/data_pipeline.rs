//! Integration tests for the file-backed pieces: CSV sources, run history,
//! and config files.

use std::fs;
use std::io::Write;

use quantlab_core::engine::Economics;
use quantlab_core::signals::{ParamMap, StrategyRegistry};
use quantlab_core::synthetic::synthetic_bars;
use quantlab_core::Bar;
use quantlab_runner::{
    find_optimal, find_optimal_global, load_csv_bars, write_csv_bars, BarRequest, BarSource,
    ConfigError, HistoryRecord, HistoryRecorder, InMemorySource, JsonlHistory, Objective,
    QuantlabConfig, RunKey, SearchOptions, SourceError,
};

const HOUR_MS: i64 = 3_600_000;

fn key() -> RunKey<'static> {
    RunKey {
        user: "alice",
        symbol: "BTC/USDT",
        exchange: "binance",
        timeframe: "1h",
        strategy: "sma_cross",
    }
}

// ─── CSV ─────────────────────────────────────────────────────────────

#[test]
fn csv_written_bars_read_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bars.csv");
    let bars = synthetic_bars(5, 200, 0, HOUR_MS, 100.0);

    write_csv_bars(&path, &bars).unwrap();
    let loaded = load_csv_bars(&path).unwrap();

    assert_eq!(loaded, bars);
}

#[test]
fn csv_without_flag_columns_is_accepted_and_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raw.csv");
    let mut file = fs::File::create(&path).unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
    writeln!(file, "7200000,101,103,100,102,5").unwrap();
    writeln!(file, "0,100,101,99,100,3").unwrap();
    writeln!(file, "3600000,100,102,99,101,4").unwrap();
    drop(file);

    let bars = load_csv_bars(&path).unwrap();

    let ts: Vec<i64> = bars.iter().map(|b| b.timestamp).collect();
    assert_eq!(ts, vec![0, 3_600_000, 7_200_000]);
    assert!(bars.iter().all(|b| !b.filled && !b.is_outlier));
}

#[test]
fn malformed_csv_reports_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.csv");
    fs::write(&path, "timestamp,open,high,low,close,volume\n0,abc,1,1,1,1\n").unwrap();

    let err = load_csv_bars(&path).unwrap_err();

    assert!(matches!(&err, SourceError::Csv { path: p, .. } if *p == path));
}

#[test]
fn csv_dir_serves_each_symbol_and_timeframe() {
    let dir = tempfile::tempdir().unwrap();
    write_csv_bars(
        &dir.path().join("ETHUSDT_1h.csv"),
        &synthetic_bars(1, 48, 0, HOUR_MS, 2000.0),
    )
    .unwrap();
    write_csv_bars(
        &dir.path().join("ETHUSDT_4h.csv"),
        &synthetic_bars(2, 12, 0, 4 * HOUR_MS, 2000.0),
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let source = InMemorySource::from_csv_dir(dir.path()).unwrap();

    assert_eq!(source.len(), 2);
    assert_eq!(
        source.get_bars("ETHUSDT", "1h", 0, 48 * HOUR_MS).unwrap().len(),
        48
    );
    assert_eq!(
        source.get_bars("ETHUSDT", "4h", 0, 48 * HOUR_MS).unwrap().len(),
        12
    );
    assert!(matches!(
        source.get_bars("ETHUSDT", "1d", 0, 48 * HOUR_MS),
        Err(SourceError::NoData { .. })
    ));
}

#[test]
fn gaps_in_stored_series_are_filled_on_read() {
    let mut bars = synthetic_bars(3, 10, 0, HOUR_MS, 100.0);
    bars.remove(4);
    let mut source = InMemorySource::new();
    source.insert("BTC/USDT", "1h", bars);

    let window = source.get_bars("BTC/USDT", "1h", 0, 10 * HOUR_MS).unwrap();

    assert_eq!(window.len(), 10);
    assert!(window[4].filled);
    assert_eq!(window[4].close, window[3].close);
    assert_eq!(window.iter().filter(|b| b.filled).count(), 1);
}

#[test]
fn default_config_window_serves_stored_data_without_padding() {
    const DAY_MS: i64 = 86_400_000;
    let dir = tempfile::tempdir().unwrap();
    let mut bars = synthetic_bars(6, 40, 19_723 * DAY_MS, DAY_MS, 100.0);
    bars.remove(10);
    write_csv_bars(&dir.path().join("BTCUSDT_1d.csv"), &bars).unwrap();

    let mut config = QuantlabConfig::default();
    config.market.symbol = "BTCUSDT".into();
    config.optimizer.strategies = vec!["buy_and_hold".into()];
    config.optimizer.timeframes = vec!["1d".into()];
    let request = config.market.bar_request().unwrap();
    let source = InMemorySource::from_csv_dir(dir.path())
        .unwrap()
        .with_options(config.market.source_options());

    let window = source
        .get_bars(&request.symbol, "1d", request.since_ms, request.until_ms)
        .unwrap();
    assert_eq!(window.len(), 40);
    assert_eq!(window[0].timestamp, 19_723 * DAY_MS);
    assert_eq!(window.iter().filter(|b| b.filled).count(), 1);

    let result = find_optimal_global(
        &source,
        StrategyRegistry::builtin(),
        &request,
        &config.optimizer,
        &config.economics,
        None,
        None,
    )
    .unwrap();
    assert_eq!(result.completed_tasks, 1);
    assert!(result.best().is_some());
}

#[test]
fn single_strategy_search_over_csv_data() {
    let dir = tempfile::tempdir().unwrap();
    write_csv_bars(
        &dir.path().join("BTCUSDT_1h.csv"),
        &synthetic_bars(9, 300, 0, HOUR_MS, 100.0),
    )
    .unwrap();
    let source = InMemorySource::from_csv_dir(dir.path()).unwrap();
    let request = BarRequest {
        symbol: "BTCUSDT".into(),
        since_ms: 0,
        until_ms: 300 * HOUR_MS,
    };
    let options = SearchOptions {
        objective: Objective::TotalReturnPct,
        ..SearchOptions::default()
    };

    let result = find_optimal(
        &source,
        StrategyRegistry::builtin(),
        &request,
        "bollinger",
        "1h",
        &options,
        &Economics::default(),
        None,
    )
    .unwrap();

    assert_eq!(result.all_results.len(), 9);
    assert_eq!(result.completed_tasks, 9);
    let best = result.best_score().unwrap();
    assert!(result
        .all_results
        .iter()
        .filter_map(|e| e.score)
        .all(|s| s <= best));
}

#[test]
fn single_strategy_search_with_missing_data_reports_one_failure() {
    let request = BarRequest {
        symbol: "BTCUSDT".into(),
        since_ms: 0,
        until_ms: 10 * HOUR_MS,
    };
    let result = find_optimal(
        &InMemorySource::new(),
        StrategyRegistry::builtin(),
        &request,
        "sma_cross",
        "1h",
        &SearchOptions::default(),
        &Economics::default(),
        None,
    )
    .unwrap();

    assert_eq!(result.all_results.len(), 1);
    assert!(result.best().is_none());
    let failed = &result.all_results[0];
    assert_eq!(failed.params, StrategyRegistry::builtin().defaults("sma_cross").unwrap());
    assert!(failed.error().is_some());
}

// ─── History ─────────────────────────────────────────────────────────

fn finished_run() -> (ParamMap, quantlab_core::BacktestResult) {
    let bars: Vec<Bar> = synthetic_bars(4, 120, 0, HOUR_MS, 100.0);
    let params = ParamMap::new();
    let result = quantlab_core::backtest(
        StrategyRegistry::builtin(),
        "sma_cross",
        &params,
        &bars,
        &Economics::default(),
    )
    .unwrap();
    (params, result)
}

#[test]
fn history_appends_and_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let history = JsonlHistory::new(dir.path().join("nested/history.jsonl"));
    let (params, result) = finished_run();
    let record = HistoryRecord::from_result(&key(), &params, &result).unwrap();

    history.record(&record).unwrap();
    history.record(&record).unwrap();

    let records = history.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], record);
    assert_eq!(records[0].user, "alice");
    assert_eq!(Some(&records[1].metrics), result.metrics.as_ref());
}

#[test]
fn history_skips_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    let history = JsonlHistory::new(dir.path().join("history.jsonl"));
    let (params, result) = finished_run();
    let record = HistoryRecord::from_result(&key(), &params, &result).unwrap();

    history.record(&record).unwrap();
    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(history.path())
        .unwrap();
    writeln!(file, "{{not json").unwrap();
    writeln!(file).unwrap();
    drop(file);
    history.record(&record).unwrap();

    assert_eq!(history.read_all().unwrap().len(), 2);
}

#[test]
fn missing_history_file_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let history = JsonlHistory::new(dir.path().join("absent.jsonl"));
    assert!(history.read_all().unwrap().is_empty());
}

#[test]
fn failed_runs_are_not_recorded() {
    let failed = quantlab_core::BacktestResult::failed("no data");
    assert!(HistoryRecord::from_result(&key(), &ParamMap::new(), &failed).is_none());
}

// ─── Config files ────────────────────────────────────────────────────

#[test]
fn config_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quantlab.toml");
    fs::write(
        &path,
        r#"
        [market]
        symbol = "SOL/USDT"
        timeframe = "15m"

        [optimizer]
        strategies = ["supertrend"]
        timeframes = ["15m", "1h"]
        "#,
    )
    .unwrap();

    let config = QuantlabConfig::load(&path).unwrap();

    assert_eq!(config.market.symbol, "SOL/USDT");
    assert_eq!(config.optimizer.strategies, vec!["supertrend".to_string()]);
    assert_eq!(config.run_id().unwrap(), QuantlabConfig::load(&path).unwrap().run_id().unwrap());
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = QuantlabConfig::load(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
