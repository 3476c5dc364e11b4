//! Bollinger Bands — moving average +/- standard deviation multiplier.
//!
//! Three bands (separate Indicator instances):
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//!
//! Uses population stddev (divide by N). A zero-variance window collapses
//! all three bands onto the mean.
//! Lookback: period - 1.

use super::{closes, Indicator};
use crate::domain::Bar;

/// Which band of the Bollinger Bands to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Upper)
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Middle)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Lower)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        rolling_mean_std(&closes(bars), self.period)
            .into_iter()
            .map(|(mean, std)| match self.band {
                BollingerBand::Middle => mean,
                BollingerBand::Upper => mean + self.multiplier * std,
                BollingerBand::Lower => mean - self.multiplier * std,
            })
            .collect()
    }
}

/// Rolling (mean, population stddev) over a trailing window.
///
/// Indices before `period - 1`, and windows containing NaN, yield (NaN, NaN).
pub fn rolling_mean_std(values: &[f64], period: usize) -> Vec<(f64, f64)> {
    let n = values.len();
    let mut result = vec![(f64::NAN, f64::NAN); n];

    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        let std = if variance > 0.0 { variance.sqrt() } else { 0.0 };
        result[i] = (mean, std);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn bollinger_middle_is_sma() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let result = Bollinger::middle(3, 2.0).compute(&bars);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 11.0, DEFAULT_EPSILON);
        assert_approx(result[4], 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_bands_symmetric() {
        // Window [10, 12, 14]: mean 12, population variance 8/3
        let bars = make_bars(&[10.0, 12.0, 14.0]);
        let upper = Bollinger::upper(3, 2.0).compute(&bars);
        let lower = Bollinger::lower(3, 2.0).compute(&bars);
        let std = (8.0_f64 / 3.0).sqrt();
        assert_approx(upper[2], 12.0 + 2.0 * std, DEFAULT_EPSILON);
        assert_approx(lower[2], 12.0 - 2.0 * std, DEFAULT_EPSILON);
    }

    #[test]
    fn zero_variance_collapses_to_mean() {
        let bars = make_bars(&[7.0; 4]);
        let upper = Bollinger::upper(3, 2.5).compute(&bars);
        let lower = Bollinger::lower(3, 2.5).compute(&bars);
        assert_approx(upper[3], 7.0, DEFAULT_EPSILON);
        assert_approx(lower[3], 7.0, DEFAULT_EPSILON);
    }

    #[test]
    fn nan_window_is_skipped() {
        let values = [1.0, f64::NAN, 3.0, 4.0, 5.0];
        let result = rolling_mean_std(&values, 2);
        assert!(result[1].0.is_nan());
        assert!(result[2].0.is_nan());
        assert_approx(result[3].0, 3.5, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_names_are_distinct() {
        assert_ne!(Bollinger::upper(20, 2.0).name(), Bollinger::lower(20, 2.0).name());
    }
}
