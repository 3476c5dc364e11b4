//! The metric a search ranks runs by.

use std::fmt;
use std::str::FromStr;

use quantlab_core::metrics::Metrics;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which metric to optimize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    SharpeRatio,
    TotalReturnPct,
    AnnualReturnPct,
    CalmarRatio,
    SortinoRatio,
    MaxDrawdownPct,
}

impl Objective {
    pub const ALL: [Objective; 6] = [
        Self::SharpeRatio,
        Self::TotalReturnPct,
        Self::AnnualReturnPct,
        Self::CalmarRatio,
        Self::SortinoRatio,
        Self::MaxDrawdownPct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SharpeRatio => "sharpe_ratio",
            Self::TotalReturnPct => "total_return_pct",
            Self::AnnualReturnPct => "annual_return_pct",
            Self::CalmarRatio => "calmar_ratio",
            Self::SortinoRatio => "sortino_ratio",
            Self::MaxDrawdownPct => "max_drawdown_pct",
        }
    }

    /// Raw metric value as reported in `Metrics`.
    pub fn extract(&self, metrics: &Metrics) -> f64 {
        match self {
            Self::SharpeRatio => metrics.sharpe_ratio,
            Self::TotalReturnPct => metrics.total_return_pct,
            Self::AnnualReturnPct => metrics.annual_return_pct,
            Self::CalmarRatio => metrics.calmar_ratio,
            Self::SortinoRatio => metrics.sortino_ratio,
            Self::MaxDrawdownPct => metrics.max_drawdown_pct,
        }
    }

    /// Score for ranking, or `None` when the metric is not a finite number.
    pub fn score(&self, metrics: &Metrics) -> Option<f64> {
        Some(self.extract(metrics)).filter(|v| v.is_finite())
    }

    /// Drawdown is a positive magnitude and is minimized; everything else is maximized.
    pub fn is_higher_better(&self) -> bool {
        !matches!(self, Self::MaxDrawdownPct)
    }

    /// Returns true if raw score `a` is strictly better than `b`.
    ///
    /// Strict: equal scores are never better, so the first one seen is kept.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        self.oriented(a) > self.oriented(b)
    }

    fn oriented(&self, value: f64) -> f64 {
        if self.is_higher_better() {
            value
        } else {
            -value
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown objective '{0}' (expected one of sharpe_ratio, total_return_pct, annual_return_pct, calmar_ratio, sortino_ratio, max_drawdown_pct)")]
pub struct UnknownObjective(pub String);

impl FromStr for Objective {
    type Err = UnknownObjective;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| UnknownObjective(s.to_string()))
    }
}
