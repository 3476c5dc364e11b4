//! Donchian Channel — highest high / lowest low over a lookback window.
//!
//! Produces two series (exposed as separate Indicator instances):
//! - Upper: max(high[t-period+1..=t])
//! - Lower: min(low[t-period+1..=t])
//!
//! Lookback: period - 1.

use super::Indicator;
use crate::domain::Bar;

/// Which band of the Donchian channel to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonchianBand {
    Upper,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Donchian {
    period: usize,
    band: DonchianBand,
    name: String,
}

impl Donchian {
    pub fn upper(period: usize) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        Self {
            period,
            band: DonchianBand::Upper,
            name: format!("donchian_upper_{period}"),
        }
    }

    pub fn lower(period: usize) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        Self {
            period,
            band: DonchianBand::Lower,
            name: format!("donchian_lower_{period}"),
        }
    }
}

impl Indicator for Donchian {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        match self.band {
            DonchianBand::Upper => rolling_extreme(bars, self.period, |b| b.high, f64::max),
            DonchianBand::Lower => rolling_extreme(bars, self.period, |b| b.low, f64::min),
        }
    }
}

fn rolling_extreme(
    bars: &[Bar],
    period: usize,
    field: impl Fn(&Bar) -> f64,
    pick: impl Fn(f64, f64) -> f64,
) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &bars[i + 1 - period..=i];
        if window.iter().any(|b| field(b).is_nan()) {
            continue;
        }
        result[i] = window
            .iter()
            .map(&field)
            .reduce(&pick)
            .unwrap_or(f64::NAN);
    }

    result
}
