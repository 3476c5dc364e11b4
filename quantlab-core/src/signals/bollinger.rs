//! Bollinger band mean reversion.
//!
//! Bands come from the mean and population standard deviation of the
//! `period` closes before the current bar. A close at or below the lower
//! band goes long, at or above the upper band goes short, otherwise hold.
//! Zero deviation collapses both bands onto the mean.

use serde::{Deserialize, Serialize};

use super::registry::{ParamMap, ParamSpec};
use super::{enter_or_hold, param, param_usize, scan, SignalError, SignalStrategy};
use crate::domain::{Bar, Signal};
use crate::indicators::{closes, Bollinger, Indicator};

pub const ID: &str = "bollinger";

pub(crate) fn schema() -> Vec<ParamSpec> {
    vec![
        ParamSpec::int("period", 20, &[15, 20, 25]),
        ParamSpec::positive("std_dev", 2.0, &[1.5, 2.0, 2.5]),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerReversion {
    pub period: usize,
    pub std_dev: f64,
}

impl BollingerReversion {
    pub fn new(period: usize, std_dev: f64) -> Result<Self, SignalError> {
        if period == 0 || !std_dev.is_finite() || std_dev <= 0.0 {
            return Err(SignalError::Invalid(format!(
                "{ID} requires period >= 1 and std_dev > 0, got {period} / {std_dev}"
            )));
        }
        Ok(Self { period, std_dev })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, SignalError> {
        Self::new(param_usize(params, "period")?, param(params, "std_dev")?)
    }
}

impl SignalStrategy for BollingerReversion {
    fn id(&self) -> &str {
        ID
    }

    fn warmup_bars(&self) -> usize {
        self.period
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        let closes = closes(bars);
        let upper = Bollinger::upper(self.period, self.std_dev).compute(bars);
        let lower = Bollinger::lower(self.period, self.std_dev).compute(bars);
        scan(bars.len(), self.period, |i, prev| {
            enter_or_hold(prev, closes[i] <= lower[i - 1], closes[i] >= upper[i - 1])
        })
    }
}
