//! Supertrend flip — long in an uptrend, short in a downtrend.
//!
//! Follows the Supertrend indicator's trend state bar by bar. Bars where
//! the indicator is undefined hold the previous target.

use serde::{Deserialize, Serialize};

use super::registry::{ParamMap, ParamSpec};
use super::{param, param_usize, scan, SignalError, SignalStrategy};
use crate::domain::{Bar, Signal};
use crate::indicators::Supertrend;

pub const ID: &str = "supertrend";

pub(crate) fn schema() -> Vec<ParamSpec> {
    vec![
        ParamSpec::int("period", 10, &[7, 10, 14]),
        ParamSpec::positive("multiplier", 3.0, &[2.0, 3.0, 4.0]),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupertrendFlip {
    pub period: usize,
    pub multiplier: f64,
}

impl SupertrendFlip {
    pub fn new(period: usize, multiplier: f64) -> Result<Self, SignalError> {
        if period == 0 || !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(SignalError::Invalid(format!(
                "{ID} requires period >= 1 and multiplier > 0, got {period} / {multiplier}"
            )));
        }
        Ok(Self { period, multiplier })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, SignalError> {
        Self::new(param_usize(params, "period")?, param(params, "multiplier")?)
    }
}

impl SignalStrategy for SupertrendFlip {
    fn id(&self) -> &str {
        ID
    }

    fn warmup_bars(&self) -> usize {
        self.period
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        let series = Supertrend::new(self.period, self.multiplier).series(bars);
        scan(bars.len(), self.period, |i, prev| match series[i].trend {
            0 => prev,
            trend => trend,
        })
    }
}
