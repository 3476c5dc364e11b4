//! BDD tests for walk-forward analysis.

use quantlab_core::engine::Economics;
use quantlab_core::signals::StrategyRegistry;
use quantlab_core::synthetic::synthetic_bars;
use quantlab_core::Bar;
use quantlab_runner::{walk_forward, Objective, WalkForwardConfig, WalkForwardError};

const HOUR_MS: i64 = 3_600_000;

fn bars(n: usize) -> Vec<Bar> {
    synthetic_bars(33, n, 0, HOUR_MS, 100.0)
}

#[test]
fn bdd_scenario_each_fold_reoptimizes_in_sample() {
    // GIVEN 600 bars split into 4 chunks of 150
    let bars = bars(600);
    let config = WalkForwardConfig {
        n_splits: 4,
        train_ratio: 0.6,
    };

    // WHEN walk-forward runs sma_cross on Sharpe
    let result = walk_forward(
        StrategyRegistry::builtin(),
        &bars,
        "sma_cross",
        Objective::SharpeRatio,
        &Economics::default(),
        &config,
    )
    .unwrap();

    // THEN every fold trains on 90 bars and tests on the next 60
    assert_eq!(result.folds.len(), 4);
    for (i, fold) in result.folds.iter().enumerate() {
        assert_eq!(fold.fold_index, i);
        assert_eq!(fold.train_bars, 90);
        assert_eq!(fold.test_bars, 60);
    }

    // AND the chosen parameters are the in-sample best
    let registry = StrategyRegistry::builtin();
    for fold in &result.folds {
        let start = fold.fold_index * 150;
        let train = &bars[start..start + 90];
        let chosen = fold.in_sample_score.unwrap();
        for params in registry.param_grid("sma_cross").unwrap() {
            let score = quantlab_core::backtest(
                registry,
                "sma_cross",
                &params,
                train,
                &Economics::default(),
            )
            .unwrap()
            .metrics
            .and_then(|m| Objective::SharpeRatio.score(&m));
            if let Some(score) = score {
                assert!(score <= chosen);
            }
        }
    }

    // AND the out-of-sample curve stitches the test windows together
    assert_eq!(result.oos_equity_curve.len(), 4 * 60);
    let first_test_ts = bars[90].timestamp;
    assert_eq!(result.oos_equity_curve[0].timestamp, first_test_ts);
}

#[test]
fn bdd_scenario_averages_match_folds() {
    let result = walk_forward(
        StrategyRegistry::builtin(),
        &bars(400),
        "ema_cross",
        Objective::CalmarRatio,
        &Economics::default(),
        &WalkForwardConfig::default(),
    )
    .unwrap();

    let n = result.folds.len() as f64;
    let avg_return = result.folds.iter().map(|f| f.oos_return_pct).sum::<f64>() / n;
    assert!((result.avg_oos_return_pct - avg_return).abs() < 1e-9);
    assert_eq!(result.strategy, "ema_cross");
    assert_eq!(result.objective, Objective::CalmarRatio);
}

#[test]
fn bdd_scenario_is_deterministic() {
    let run = || {
        walk_forward(
            StrategyRegistry::builtin(),
            &bars(300),
            "rsi",
            Objective::SortinoRatio,
            &Economics::default(),
            &WalkForwardConfig::default(),
        )
        .unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn unknown_strategy_is_an_error() {
    let err = walk_forward(
        StrategyRegistry::builtin(),
        &bars(300),
        "ichimoku",
        Objective::SharpeRatio,
        &Economics::default(),
        &WalkForwardConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, WalkForwardError::Signal(_)));
}
