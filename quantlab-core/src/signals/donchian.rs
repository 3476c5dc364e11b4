//! Donchian channel breakout.
//!
//! The channel spans the highest high and lowest low of the `period` bars
//! before the current one. A close above the channel goes long, a close
//! below goes short, otherwise hold.

use serde::{Deserialize, Serialize};

use super::registry::{ParamMap, ParamSpec};
use super::{enter_or_hold, param_usize, scan, SignalError, SignalStrategy};
use crate::domain::{Bar, Signal};
use crate::indicators::{Donchian, Indicator};

pub const ID: &str = "donchian_channel";

pub(crate) fn schema() -> Vec<ParamSpec> {
    vec![ParamSpec::int("period", 20, &[10, 20, 55])]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonchianChannel {
    pub period: usize,
}

impl DonchianChannel {
    pub fn new(period: usize) -> Result<Self, SignalError> {
        if period == 0 {
            return Err(SignalError::Invalid(format!("{ID} period must be >= 1")));
        }
        Ok(Self { period })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, SignalError> {
        Self::new(param_usize(params, "period")?)
    }
}

impl SignalStrategy for DonchianChannel {
    fn id(&self) -> &str {
        ID
    }

    fn warmup_bars(&self) -> usize {
        self.period
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        let upper = Donchian::upper(self.period).compute(bars);
        let lower = Donchian::lower(self.period).compute(bars);
        scan(bars.len(), self.period, |i, prev| {
            let close = bars[i].close;
            enter_or_hold(prev, close > upper[i - 1], close < lower[i - 1])
        })
    }
}
