//! Performance metrics — pure functions over a finished simulation.
//!
//! Every metric is a pure function of the equity curve and/or trade list.
//! Degenerate inputs (zero variance, zero drawdown, no trades, a wiped-out
//! account) resolve to 0 rather than NaN or infinity, so every reported
//! field is finite.

use serde::{Deserialize, Serialize};

use crate::domain::{EquityPoint, Trade};

/// Milliseconds in an average Gregorian year.
pub const MS_PER_YEAR: f64 = 365.25 * 86_400.0 * 1_000.0;

/// Annualization factor for per-bar Sharpe and Sortino.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Snapshot of a run's return and risk statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub annual_return_pct: f64,
    /// Largest peak-to-trough decline, as a positive percentage.
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub num_trades: usize,
    pub win_rate_pct: f64,
    pub total_fees: f64,
    pub period_bars: usize,
}

impl Metrics {
    /// Compute every metric for a run spanning `time_span_ms`.
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        initial_equity: f64,
        time_span_ms: i64,
    ) -> Self {
        let equities: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let final_equity = equities.last().copied().unwrap_or(initial_equity);

        let total = total_return(final_equity, initial_equity);
        let annual = annualized_return(total, time_span_ms);
        let max_dd = max_drawdown(&equities);
        let returns = bar_returns(&equities);

        Self {
            initial_equity,
            final_equity,
            total_return_pct: finite_or_zero(total * 100.0),
            annual_return_pct: finite_or_zero(annual * 100.0),
            max_drawdown_pct: finite_or_zero(max_dd * 100.0),
            sharpe_ratio: sharpe_ratio(&returns),
            sortino_ratio: sortino_ratio(&returns),
            calmar_ratio: calmar_ratio(annual, max_dd),
            num_trades: trades.len(),
            win_rate_pct: win_rate(trades) * 100.0,
            total_fees: finite_or_zero(trades.iter().map(|t| t.fee).sum()),
            period_bars: equity_curve.len(),
        }
    }

    /// Every reported field is a finite number.
    pub fn is_finite(&self) -> bool {
        [
            self.final_equity,
            self.total_return_pct,
            self.annual_return_pct,
            self.max_drawdown_pct,
            self.sharpe_ratio,
            self.sortino_ratio,
            self.calmar_ratio,
            self.win_rate_pct,
            self.total_fees,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(final_equity: f64, initial_equity: f64) -> f64 {
    if initial_equity <= 0.0 {
        return 0.0;
    }
    (final_equity - initial_equity) / initial_equity
}

/// Annualized return from a total return over `time_span_ms`.
///
/// `(1 + total)^(year / span) - 1`. Returns 0.0 for a non-positive span or a
/// non-positive growth base, where the fractional power is undefined.
pub fn annualized_return(total_return: f64, time_span_ms: i64) -> f64 {
    let base = 1.0 + total_return;
    if time_span_ms <= 0 || base <= 0.0 {
        return 0.0;
    }
    finite_or_zero(base.powf(MS_PER_YEAR / time_span_ms as f64) - 1.0)
}

/// Maximum drawdown as a positive fraction (0.15 = 15% below the running peak).
pub fn max_drawdown(equities: &[f64]) -> f64 {
    let Some(&first) = equities.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equities {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd
}

/// Per-bar simple returns. A step from zero equity counts as 0.
pub fn bar_returns(equities: &[f64]) -> Vec<f64> {
    equities
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Annualized Sharpe ratio: mean / population std * sqrt(252).
///
/// Returns 0.0 for empty input or zero variance.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    finite_or_zero(mean_f64(returns) / std * PERIODS_PER_YEAR.sqrt())
}

/// Annualized Sortino ratio.
///
/// Downside deviation is the root mean square of the negative returns only.
/// Returns 0.0 when there are no negative returns.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if downside.is_empty() {
        return 0.0;
    }
    let downside_std = (downside.iter().map(|r| r * r).sum::<f64>() / downside.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    finite_or_zero(mean_f64(returns) / downside_std * PERIODS_PER_YEAR.sqrt())
}

/// Calmar ratio: annualized return / max drawdown. 0.0 without a drawdown.
pub fn calmar_ratio(annual_return: f64, max_drawdown: f64) -> f64 {
    if max_drawdown <= 0.0 {
        return 0.0;
    }
    finite_or_zero(annual_return / max_drawdown)
}

/// Fraction of trades with positive `pnl_pct`.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExitReason, Side};

    const EPS: f64 = 1e-9;

    fn curve(equities: &[f64]) -> Vec<EquityPoint> {
        equities
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                timestamp: i as i64 * 86_400_000,
                equity,
                position: 0,
            })
            .collect()
    }

    fn trade(pnl_pct: f64, fee: f64) -> Trade {
        Trade {
            entry_ts: 0,
            exit_ts: 1,
            side: Side::Long,
            entry_price: 100.0,
            exit_price: 100.0 * (1.0 + pnl_pct / 100.0),
            pnl_pct,
            profit: pnl_pct * 100.0,
            fee,
            liquidation: false,
            exit_reason: ExitReason::SignalFlip,
        }
    }

    #[test]
    fn total_return_basic() {
        assert!((total_return(11_200.0, 10_000.0) - 0.12).abs() < EPS);
        assert_eq!(total_return(5.0, 0.0), 0.0);
    }

    #[test]
    fn drawdown_uses_running_peak() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]);
        assert!((dd - 0.25).abs() < EPS);
        assert_eq!(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn drawdown_to_zero_is_full() {
        assert!((max_drawdown(&[100.0, 50.0, 0.0, 0.0]) - 1.0).abs() < EPS);
    }

    #[test]
    fn annualized_one_year_equals_total() {
        let annual = annualized_return(0.10, MS_PER_YEAR as i64);
        assert!((annual - 0.10).abs() < 1e-9);
    }

    #[test]
    fn annualized_degenerate_cases() {
        assert_eq!(annualized_return(0.5, 0), 0.0);
        assert_eq!(annualized_return(0.5, -10), 0.0);
        assert_eq!(annualized_return(-1.0, 86_400_000), 0.0);
        assert_eq!(annualized_return(-1.5, 86_400_000), 0.0);
        // Overflow to infinity collapses to 0.
        assert_eq!(annualized_return(10.0, 1), 0.0);
    }

    #[test]
    fn zero_variance_sharpe_and_sortino_are_zero() {
        let returns = bar_returns(&[100.0, 100.0, 100.0, 100.0]);
        assert_eq!(sharpe_ratio(&returns), 0.0);
        assert_eq!(sortino_ratio(&returns), 0.0);

        // Constant positive growth: zero variance, no downside.
        let returns = bar_returns(&[100.0, 110.0, 121.0, 133.1]);
        assert_eq!(sharpe_ratio(&returns), 0.0);
        assert_eq!(sortino_ratio(&returns), 0.0);
    }

    #[test]
    fn sharpe_sign_follows_mean() {
        let returns = [0.01, -0.005, 0.02, 0.0];
        assert!(sharpe_ratio(&returns) > 0.0);
        let neg: Vec<f64> = returns.iter().map(|r| -r).collect();
        assert!(sharpe_ratio(&neg) < 0.0);
    }

    #[test]
    fn sortino_uses_downside_only() {
        let returns = [0.02, -0.01, 0.02, -0.01];
        let mean: f64 = 0.005;
        let expected = mean / 0.01 * 252.0_f64.sqrt();
        assert!((sortino_ratio(&returns) - expected).abs() < 1e-9);
    }

    #[test]
    fn bar_returns_from_zero_equity() {
        assert_eq!(bar_returns(&[100.0, 0.0, 0.0]), vec![-1.0, 0.0]);
    }

    #[test]
    fn calmar_zero_without_drawdown() {
        assert_eq!(calmar_ratio(0.3, 0.0), 0.0);
        assert!((calmar_ratio(0.3, 0.15) - 2.0).abs() < EPS);
    }

    #[test]
    fn win_rate_counts_positive_pnl() {
        let trades = vec![trade(5.0, 0.0), trade(-2.0, 0.0), trade(0.0, 0.0), trade(1.0, 0.0)];
        assert!((win_rate(&trades) - 0.5).abs() < EPS);
        assert_eq!(win_rate(&[]), 0.0);
    }

    #[test]
    fn compute_aggregates() {
        let eq = curve(&[10_000.0, 10_500.0, 11_000.0, 10_800.0, 11_200.0]);
        let trades = vec![trade(12.0, 3.5)];
        let m = Metrics::compute(&eq, &trades, 10_000.0, 4 * 86_400_000);
        assert!((m.total_return_pct - 12.0).abs() < 1e-9);
        assert!((m.final_equity - 11_200.0).abs() < EPS);
        assert_eq!(m.num_trades, 1);
        assert!((m.win_rate_pct - 100.0).abs() < EPS);
        assert!((m.total_fees - 3.5).abs() < EPS);
        assert_eq!(m.period_bars, 5);
        assert!(m.max_drawdown_pct > 0.0);
        assert!(m.is_finite());
    }

    #[test]
    fn compute_empty_curve_is_neutral() {
        let m = Metrics::compute(&[], &[], 10_000.0, 0);
        assert_eq!(m.final_equity, 10_000.0);
        assert_eq!(m.total_return_pct, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.num_trades, 0);
        assert!(m.is_finite());
    }
}
