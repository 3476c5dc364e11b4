//! EMA crossover — long while the fast EMA is above the slow EMA.

use serde::{Deserialize, Serialize};

use super::registry::{ParamMap, ParamSpec};
use super::{enter_or_hold, param_usize, scan, SignalError, SignalStrategy};
use crate::domain::{Bar, Signal};
use crate::indicators::{Ema, Indicator};

pub const ID: &str = "ema_cross";

pub(crate) fn schema() -> Vec<ParamSpec> {
    vec![
        ParamSpec::int("fast", 12, &[8, 12, 20]),
        ParamSpec::int("slow", 26, &[26, 50]),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmaCross {
    pub fast: usize,
    pub slow: usize,
}

impl EmaCross {
    pub fn new(fast: usize, slow: usize) -> Result<Self, SignalError> {
        if fast == 0 || fast >= slow {
            return Err(SignalError::Invalid(format!(
                "{ID} requires 0 < fast < slow, got fast={fast} slow={slow}"
            )));
        }
        Ok(Self { fast, slow })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, SignalError> {
        Self::new(param_usize(params, "fast")?, param_usize(params, "slow")?)
    }
}

impl SignalStrategy for EmaCross {
    fn id(&self) -> &str {
        ID
    }

    fn warmup_bars(&self) -> usize {
        self.slow
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        let fast = Ema::new(self.fast).compute(bars);
        let slow = Ema::new(self.slow).compute(bars);
        scan(bars.len(), self.slow, |i, prev| {
            enter_or_hold(prev, fast[i] > slow[i], fast[i] < slow[i])
        })
    }
}
