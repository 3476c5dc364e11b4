//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period), seeded with the
//! mean of the first `period` true ranges that have a previous close.
//! Lookback: period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut tr = true_range(bars);
        // TR[0] has no previous close, so the seed window starts at TR[1].
        if let Some(first) = tr.first_mut() {
            *first = f64::NAN;
        }
        wilder_smooth(&tr, self.period)
    }
}

/// True Range series. TR[0] = high[0] - low[0].
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let range = bar.high - bar.low;
        let value = match i.checked_sub(1).map(|p| bars[p].close) {
            None => range,
            Some(pc) => range.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
        };
        // f64::max ignores NaN operands, so check the inputs explicitly.
        let void = bar.high.is_nan()
            || bar.low.is_nan()
            || (i > 0 && bars[i - 1].close.is_nan());
        tr.push(if void { f64::NAN } else { value });
    }
    tr
}

/// Wilder smoothing (alpha = 1/period).
///
/// The seed is the mean of the first run of `period` consecutive non-NaN
/// values. After the seed, a NaN input voids the rest of the output.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    let mut run = 0usize;
    let mut seed_end = None;
    for (i, v) in values.iter().enumerate() {
        if v.is_nan() {
            run = 0;
            continue;
        }
        run += 1;
        if run == period {
            seed_end = Some(i);
            break;
        }
    }
    let Some(seed_end) = seed_end else {
        return result;
    };

    let seed = values[seed_end + 1 - period..=seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in seed_end + 1..n {
        if values[i].is_nan() {
            return result;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    fn five_bars() -> Vec<Bar> {
        make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 10
            (102.0, 108.0, 100.0, 106.0), // TR = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = 9
            (99.0, 103.0, 97.0, 101.0),   // TR = 6
            (101.0, 106.0, 100.0, 105.0), // TR = 6
        ])
    }

    #[test]
    fn true_range_basic() {
        let tr = true_range(&five_bars());
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
        assert_approx(tr[3], 6.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bars = make_ohlc_bars(&[
            (98.0, 102.0, 97.0, 100.0),
            (110.0, 115.0, 108.0, 112.0), // TR = max(7, 15, 8) = 15
        ]);
        assert_approx(true_range(&bars)[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_3() {
        let result = Atr::new(3).compute(&five_bars());
        assert!(result[..3].iter().all(|v| v.is_nan()));
        // Seed over TR[1..=3] = [8, 9, 6] → 23/3
        // ATR[4] = (1/3)*6 + (2/3)*(23/3) = 64/9
        assert_approx(result[3], 23.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(result[4], 64.0 / 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_seed_skips_nan_run() {
        let values = [f64::NAN, 1.0, f64::NAN, 2.0, 4.0, 6.0];
        let result = wilder_smooth(&values, 2);
        assert!(result[..4].iter().all(|v| v.is_nan()));
        assert_approx(result[4], 3.0, DEFAULT_EPSILON);
        assert_approx(result[5], 4.5, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_flat_bars_is_zero() {
        let bars: Vec<Bar> = (0..6).map(|i| Bar::synthetic(i * 60_000, 50.0)).collect();
        let result = Atr::new(3).compute(&bars);
        assert_approx(result[5], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_lookback() {
        assert_eq!(Atr::new(14).lookback(), 14);
    }
}
