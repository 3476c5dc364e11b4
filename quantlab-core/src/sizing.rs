//! Position sizing: Kelly, fixed fraction, fixed amount, full equity.
//!
//! Advisory only: the simulation engine always commits full equity per
//! trade. These helpers size live orders and summarize a trade history.

use serde::{Deserialize, Serialize};

use crate::domain::Trade;

/// Upper bound on any Kelly recommendation.
pub const KELLY_CAP: f64 = 0.25;

/// How to size a new position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SizingMethod {
    /// Capped Kelly fraction from win statistics.
    Kelly {
        win_rate: f64,
        avg_win: f64,
        avg_loss: f64,
    },
    /// Risk `risk_pct` of equity between entry and the stop.
    ///
    /// Without a usable stop, `risk_pct` of equity is committed directly.
    FixedFraction {
        risk_pct: f64,
        stop_loss_price: Option<f64>,
    },
    /// A fixed notional before leverage, never more than equity.
    FixedAmount { amount: f64 },
    /// All equity.
    Full,
}

/// Result of [`position_size`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    /// Notional in account currency.
    pub size: f64,
    /// Fraction of equity committed.
    pub fraction: f64,
    /// Size in units of the instrument.
    pub units: f64,
}

/// Kelly fraction `(p*b - q) / b`, clamped to `[0, cap]`.
///
/// Non-positive inputs yield 0.
pub fn kelly_fraction(win_rate: f64, avg_win: f64, avg_loss: f64, cap: f64) -> f64 {
    if avg_loss <= 0.0 || avg_win <= 0.0 || win_rate <= 0.0 {
        return 0.0;
    }
    let b = avg_win / avg_loss;
    let q = 1.0 - win_rate;
    ((win_rate * b - q) / b).clamp(0.0, cap.max(0.0))
}

/// Size a position at `entry_price` with `equity` and `leverage`.
pub fn position_size(
    method: &SizingMethod,
    equity: f64,
    entry_price: f64,
    leverage: f64,
) -> PositionSize {
    let share = |size: f64| if equity > 0.0 { size / equity } else { 0.0 };
    let (size, fraction) = match *method {
        SizingMethod::Kelly {
            win_rate,
            avg_win,
            avg_loss,
        } => {
            let fraction = kelly_fraction(win_rate, avg_win, avg_loss, KELLY_CAP);
            (equity * fraction * leverage, fraction)
        }
        SizingMethod::FixedFraction {
            risk_pct,
            stop_loss_price,
        } => match stop_loss_price.filter(|&sl| sl > 0.0 && sl != entry_price && entry_price > 0.0) {
            Some(stop) => {
                let risk_per_unit = (entry_price - stop).abs();
                let units = equity * risk_pct / 100.0 / risk_per_unit;
                let size = units * entry_price;
                (size, share(size))
            }
            None => {
                let fraction = risk_pct / 100.0;
                (equity * fraction * leverage, fraction)
            }
        },
        SizingMethod::FixedAmount { amount } => {
            let size = (amount * leverage).min(equity);
            (size, share(size))
        }
        SizingMethod::Full => (equity * leverage, 1.0),
    };
    let units = if entry_price > 0.0 {
        size / entry_price
    } else {
        0.0
    };
    PositionSize {
        size,
        fraction,
        units,
    }
}

/// Kelly-based guidance tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Not enough trades to say anything.
    InsufficientData,
    /// Negative expectancy.
    DoNotTrade,
    /// Below 5% of equity.
    VeryLight,
    /// Below 15% of equity.
    Moderate,
    /// The capped Kelly fraction.
    Full,
}

/// Win statistics and Kelly sizing derived from a trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KellyAnalysis {
    pub kelly_fraction: f64,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub total_trades: usize,
    pub recommendation: Recommendation,
}

/// Summarize `trades` by profit into a Kelly recommendation.
pub fn kelly_from_trades(trades: &[Trade]) -> KellyAnalysis {
    if trades.is_empty() {
        return KellyAnalysis {
            kelly_fraction: 0.0,
            win_rate: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            total_trades: 0,
            recommendation: Recommendation::InsufficientData,
        };
    }

    let wins: Vec<f64> = trades.iter().map(|t| t.profit).filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = trades
        .iter()
        .map(|t| t.profit)
        .filter(|&p| p < 0.0)
        .map(f64::abs)
        .collect();
    let mean = |v: &[f64]| {
        if v.is_empty() {
            0.0
        } else {
            v.iter().sum::<f64>() / v.len() as f64
        }
    };

    let win_rate = wins.len() as f64 / trades.len() as f64;
    let avg_win = mean(&wins);
    let avg_loss = mean(&losses);
    let fraction = kelly_fraction(win_rate, avg_win, avg_loss, KELLY_CAP);

    let recommendation = if fraction <= 0.0 {
        Recommendation::DoNotTrade
    } else if fraction < 0.05 {
        Recommendation::VeryLight
    } else if fraction < 0.15 {
        Recommendation::Moderate
    } else {
        Recommendation::Full
    };

    KellyAnalysis {
        kelly_fraction: fraction,
        win_rate,
        avg_win,
        avg_loss,
        total_trades: trades.len(),
        recommendation,
    }
}
