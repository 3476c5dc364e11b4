//! Relative Strength Index (RSI), simple-average variant.
//!
//! Average gain and average loss are plain means of the last `period`
//! close-to-close changes (no Wilder smoothing).
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period.
//! Edge cases: avg_loss == 0 → RSI = 100 (including a flat window);
//! avg_gain == 0 with avg_loss > 0 → RSI = 0.

use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        rsi_of_series(&closes(bars), self.period)
    }
}

/// RSI of an arbitrary price series.
pub fn rsi_of_series(prices: &[f64], period: usize) -> Vec<f64> {
    let n = prices.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n <= period {
        return result;
    }

    for i in period..n {
        let mut gain_sum = 0.0;
        let mut loss_sum = 0.0;
        let mut void = false;
        for j in (i + 1 - period)..=i {
            let change = prices[j] - prices[j - 1];
            if change.is_nan() {
                void = true;
                break;
            }
            if change > 0.0 {
                gain_sum += change;
            } else {
                loss_sum -= change;
            }
        }
        if void {
            continue;
        }
        result[i] = compute_rsi(gain_sum / period as f64, loss_sum / period as f64);
    }

    result
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
