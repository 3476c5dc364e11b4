//! SMA crossover — long while the fast mean is above the slow mean.
//!
//! Both means cover the window ending at the previous bar, so the target at
//! bar i depends only on closes strictly before i. Equal means hold.

use serde::{Deserialize, Serialize};

use super::registry::{ParamMap, ParamSpec};
use super::{enter_or_hold, param_usize, scan, SignalError, SignalStrategy};
use crate::domain::{Bar, Signal};
use crate::indicators::{Indicator, Sma};

pub const ID: &str = "sma_cross";

pub(crate) fn schema() -> Vec<ParamSpec> {
    vec![
        ParamSpec::int("fast", 10, &[5, 10, 15, 20]),
        ParamSpec::int("slow", 30, &[20, 30, 40, 50]),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmaCross {
    pub fast: usize,
    pub slow: usize,
}

impl SmaCross {
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

impl SignalStrategy for SmaCross {
    fn id(&self) -> &str {
        ID
    }

    fn warmup_bars(&self) -> usize {
        self.slow
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        let fast = Sma::new(self.fast).compute(bars);
        let slow = Sma::new(self.slow).compute(bars);
        scan(bars.len(), self.slow, |i, prev| {
            let (f, s) = (fast[i - 1], slow[i - 1]);
            enter_or_hold(prev, f > s, f < s)
        })
    }
}
