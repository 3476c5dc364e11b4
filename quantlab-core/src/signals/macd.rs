//! MACD crossover.
//!
//! MACD line = EMA(fast) - EMA(slow); signal line = EMA(signal) of the MACD
//! line. A cross of the MACD line above the signal line goes long, a cross
//! below goes short, and anything else holds. Warm-up: `slow + signal - 1`.

use serde::{Deserialize, Serialize};

use super::registry::{ParamMap, ParamSpec};
use super::{param_usize, scan, SignalError, SignalStrategy};
use crate::domain::{Bar, Signal};
use crate::indicators::ema::ema_of_series;
use crate::indicators::{Ema, Indicator};

pub const ID: &str = "macd_cross";

pub(crate) fn schema() -> Vec<ParamSpec> {
    vec![
        ParamSpec::int("fast", 12, &[8, 12]),
        ParamSpec::int("slow", 26, &[26]),
        ParamSpec::int("signal", 9, &[9]),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdCross {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl MacdCross {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Result<Self, SignalError> {
        if fast == 0 || signal == 0 || fast >= slow {
            return Err(SignalError::Invalid(format!(
                "{ID} requires 0 < fast < slow and signal >= 1, got {fast}/{slow}/{signal}"
            )));
        }
        Ok(Self { fast, slow, signal })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, SignalError> {
        Self::new(
            param_usize(params, "fast")?,
            param_usize(params, "slow")?,
            param_usize(params, "signal")?,
        )
    }

    /// MACD line and signal line.
    pub fn lines(&self, bars: &[Bar]) -> (Vec<f64>, Vec<f64>) {
        let fast = Ema::new(self.fast).compute(bars);
        let slow = Ema::new(self.slow).compute(bars);
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_of_series(&macd, self.signal);
        (macd, signal)
    }
}

impl SignalStrategy for MacdCross {
    fn id(&self) -> &str {
        ID
    }

    fn warmup_bars(&self) -> usize {
        self.slow.saturating_add(self.signal).saturating_sub(1)
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        let (macd, signal) = self.lines(bars);
        scan(bars.len(), self.warmup_bars(), |i, prev| {
            let (now, before) = (macd[i] - signal[i], macd[i - 1] - signal[i - 1]);
            if now > 0.0 && before <= 0.0 {
                1
            } else if now < 0.0 && before >= 0.0 {
                -1
            } else {
                prev
            }
        })
    }
}
