//! Dual Thrust range breakout.
//!
//! Over the `period` bars before the current one:
//! `range = max(HH - LC, HC - LL)` where HH/LL are the highest high and
//! lowest low and HC/LC the highest and lowest close. The current bar goes
//! long when its close clears `open + k1 * range`, short when it falls below
//! `open - k2 * range`, and otherwise holds.

use serde::{Deserialize, Serialize};

use super::registry::{ParamMap, ParamSpec};
use super::{enter_or_hold, param, param_usize, scan, SignalError, SignalStrategy};
use crate::domain::{Bar, Signal};

pub const ID: &str = "dual_thrust";

pub(crate) fn schema() -> Vec<ParamSpec> {
    vec![
        ParamSpec::int("period", 4, &[3, 4, 5]),
        ParamSpec::positive("k1", 0.5, &[0.4, 0.5, 0.7]),
        ParamSpec::positive("k2", 0.5, &[0.4, 0.5, 0.7]),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DualThrust {
    pub period: usize,
    pub k1: f64,
    pub k2: f64,
}

impl DualThrust {
    pub fn new(period: usize, k1: f64, k2: f64) -> Result<Self, SignalError> {
        let positive = |k: f64| k.is_finite() && k > 0.0;
        if period == 0 || !positive(k1) || !positive(k2) {
            return Err(SignalError::Invalid(format!(
                "{ID} requires period >= 1 and k1, k2 > 0, got {period} / {k1} / {k2}"
            )));
        }
        Ok(Self { period, k1, k2 })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, SignalError> {
        Self::new(
            param_usize(params, "period")?,
            param(params, "k1")?,
            param(params, "k2")?,
        )
    }
}

/// Dual Thrust range of a window of bars.
fn thrust_range(window: &[Bar]) -> f64 {
    let hh = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let ll = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let hc = window.iter().map(|b| b.close).fold(f64::NEG_INFINITY, f64::max);
    let lc = window.iter().map(|b| b.close).fold(f64::INFINITY, f64::min);
    (hh - lc).max(hc - ll)
}

impl SignalStrategy for DualThrust {
    fn id(&self) -> &str {
        ID
    }

    fn warmup_bars(&self) -> usize {
        self.period
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        scan(bars.len(), self.period, |i, prev| {
            let range = thrust_range(&bars[i - self.period..i]);
            let bar = &bars[i];
            enter_or_hold(
                prev,
                bar.close > bar.open + self.k1 * range,
                bar.close < bar.open - self.k2 * range,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    fn quiet() -> Vec<(f64, f64, f64, f64)> {
        vec![
            (100.0, 101.0, 99.0, 100.5),
            (100.5, 101.0, 99.5, 100.0),
            (100.0, 100.8, 99.2, 100.2),
        ]
    }

    #[test]
    fn range_is_max_of_both_spans() {
        let bars = make_ohlc_bars(&quiet());
        // HH 101, LC 100 -> 1.0; HC 100.5, LL 99 -> 1.5
        assert_approx(thrust_range(&bars), 1.5, DEFAULT_EPSILON);
    }

    #[test]
    fn strong_up_bar_goes_long_then_holds() {
        let mut data = quiet();
        data.push((100.0, 102.0, 99.9, 101.5)); // 101.5 > 100 + 0.5 * 1.5
        data.push((101.5, 101.8, 101.0, 101.6)); // small body: hold
        let signal = DualThrust::new(3, 0.5, 0.5).unwrap().generate(&make_ohlc_bars(&data));
        assert_eq!(signal, vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn strong_down_bar_goes_short() {
        let mut data = quiet();
        data.push((100.0, 100.1, 98.0, 98.5));
        let signal = DualThrust::new(3, 0.5, 0.5).unwrap().generate(&make_ohlc_bars(&data));
        assert_eq!(signal[3], -1);
    }
}
