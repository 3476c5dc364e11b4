//! VWAP mean reversion with a neutral zone.
//!
//! `z = (close - vwap) / std`, where VWAP and the population standard
//! deviation of closes cover the trailing `period` bars. Stretched below
//! VWAP (`z <= -threshold`) goes long, stretched above goes short, and a
//! close back within `threshold / 2` of VWAP goes flat. In between, hold.

use serde::{Deserialize, Serialize};

use super::registry::{ParamMap, ParamSpec};
use super::{param, param_usize, scan, SignalError, SignalStrategy};
use crate::domain::{Bar, Signal};
use crate::indicators::bollinger::rolling_mean_std;
use crate::indicators::{closes, Indicator, RollingVwap};

pub const ID: &str = "vwap_reversion";

pub(crate) fn schema() -> Vec<ParamSpec> {
    vec![
        ParamSpec::int("period", 20, &[20, 50]),
        ParamSpec::positive("threshold", 2.0, &[1.0, 2.0, 3.0]),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VwapReversion {
    pub period: usize,
    pub threshold: f64,
}

impl VwapReversion {
    pub fn new(period: usize, threshold: f64) -> Result<Self, SignalError> {
        if period == 0 || !threshold.is_finite() || threshold <= 0.0 {
            return Err(SignalError::Invalid(format!(
                "{ID} requires period >= 1 and threshold > 0, got {period} / {threshold}"
            )));
        }
        Ok(Self { period, threshold })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, SignalError> {
        Self::new(param_usize(params, "period")?, param(params, "threshold")?)
    }

    /// Deviation from VWAP in units of close-price std. Zero std gives 0.
    pub fn deviation(&self, bars: &[Bar]) -> Vec<f64> {
        let vwap = RollingVwap::new(self.period).compute(bars);
        let stats = rolling_mean_std(&closes(bars), self.period);
        bars.iter()
            .zip(vwap.iter().zip(&stats))
            .map(|(bar, (&vwap, &(_, std)))| {
                if std.is_nan() || vwap.is_nan() {
                    f64::NAN
                } else if std > 0.0 {
                    (bar.close - vwap) / std
                } else {
                    0.0
                }
            })
            .collect()
    }
}

impl SignalStrategy for VwapReversion {
    fn id(&self) -> &str {
        ID
    }

    fn warmup_bars(&self) -> usize {
        self.period
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        let z = self.deviation(bars);
        scan(bars.len(), self.period, |i, prev| {
            let z = z[i];
            if z <= -self.threshold {
                1
            } else if z >= self.threshold {
                -1
            } else if z.abs() < self.threshold / 2.0 {
                0
            } else {
                prev
            }
        })
    }
}
