//! RSI thresholds — long below `oversold`, short above `overbought`.

use serde::{Deserialize, Serialize};

use super::registry::{ParamMap, ParamSpec};
use super::{enter_or_hold, param, param_usize, scan, SignalError, SignalStrategy};
use crate::domain::{Bar, Signal};
use crate::indicators::{Indicator, Rsi};

pub const ID: &str = "rsi";

pub(crate) fn schema() -> Vec<ParamSpec> {
    vec![
        ParamSpec::int("period", 14, &[10, 14, 20]),
        ParamSpec::positive("oversold", 30.0, &[25.0, 30.0]).with_range(0.0, 100.0),
        ParamSpec::positive("overbought", 70.0, &[70.0, 75.0]).with_range(0.0, 100.0),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiThreshold {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl RsiThreshold {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Result<Self, SignalError> {
        if period == 0 {
            return Err(SignalError::Invalid(format!("{ID} period must be >= 1")));
        }
        if !(0.0..=100.0).contains(&oversold)
            || !(0.0..=100.0).contains(&overbought)
            || oversold >= overbought
        {
            return Err(SignalError::Invalid(format!(
                "{ID} requires 0 <= oversold < overbought <= 100, got {oversold} / {overbought}"
            )));
        }
        Ok(Self {
            period,
            oversold,
            overbought,
        })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, SignalError> {
        Self::new(
            param_usize(params, "period")?,
            param(params, "oversold")?,
            param(params, "overbought")?,
        )
    }
}

impl SignalStrategy for RsiThreshold {
    fn id(&self) -> &str {
        ID
    }

    fn warmup_bars(&self) -> usize {
        self.period
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        let rsi = Rsi::new(self.period).compute(bars);
        scan(bars.len(), self.period, |i, prev| {
            enter_or_hold(prev, rsi[i] < self.oversold, rsi[i] > self.overbought)
        })
    }
}
