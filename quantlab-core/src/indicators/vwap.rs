//! Rolling Volume-Weighted Average Price.
//!
//! VWAP[t] = sum(typical_price * volume) / sum(volume) over the trailing
//! `period` bars. A window with zero total volume (for example a run of
//! forward-filled bars) falls back to the mean close.
//! Lookback: period - 1.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct RollingVwap {
    period: usize,
    name: String,
}

impl RollingVwap {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "VWAP period must be >= 1");
        Self {
            period,
            name: format!("vwap_{period}"),
        }
    }
}

impl Indicator for RollingVwap {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period {
            return result;
        }

        for i in (self.period - 1)..n {
            let window = &bars[i + 1 - self.period..=i];
            if window.iter().any(Bar::is_void) {
                continue;
            }
            let volume: f64 = window.iter().map(|b| b.volume).sum();
            result[i] = if volume > 0.0 {
                window.iter().map(|b| b.typical_price() * b.volume).sum::<f64>() / volume
            } else {
                window.iter().map(|b| b.close).sum::<f64>() / self.period as f64
            };
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    #[test]
    fn vwap_weights_by_volume() {
        let mut bars = make_ohlc_bars(&[(10.0, 12.0, 9.0, 12.0), (12.0, 21.0, 12.0, 18.0)]);
        bars[0].volume = 100.0;
        bars[1].volume = 300.0;
        // Typical prices: 11 and 17 → (1100 + 5100) / 400 = 15.5
        let result = RollingVwap::new(2).compute(&bars);
        assert!(result[0].is_nan());
        assert_approx(result[1], 15.5, DEFAULT_EPSILON);
    }

    #[test]
    fn vwap_zero_volume_uses_mean_close() {
        let bars = vec![Bar::synthetic(0, 10.0), Bar::synthetic(60_000, 20.0)];
        let result = RollingVwap::new(2).compute(&bars);
        assert_approx(result[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn vwap_lookback() {
        assert_eq!(RollingVwap::new(20).lookback(), 19);
    }
}
