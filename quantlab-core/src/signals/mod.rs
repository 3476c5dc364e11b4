//! Signal library — bar history in, per-bar position targets out.
//!
//! Every strategy is a pure transformation of the bar series into a vector
//! of targets in {-1, 0, 1}, index-aligned with the input. Strategies are
//! portfolio-agnostic and deterministic: no randomness, no clock, no I/O.
//!
//! Sticky strategies are written as an explicit scan:
//! `signal[i] = step(i, signal[i-1])`, with `signal[i] = 0` inside the
//! warm-up window. The previous target is threaded through the scan rather
//! than read back from a mutable output buffer.

pub mod bollinger;
pub mod buy_and_hold;
pub mod donchian;
pub mod dual_thrust;
pub mod ema_cross;
pub mod macd;
pub mod registry;
pub mod rsi;
pub mod sma_cross;
pub mod supertrend;
pub mod vwap;

pub use bollinger::BollingerReversion;
pub use buy_and_hold::BuyAndHold;
pub use donchian::DonchianChannel;
pub use dual_thrust::DualThrust;
pub use ema_cross::EmaCross;
pub use macd::MacdCross;
pub use registry::{
    generate_signal, ParamKind, ParamMap, ParamSpec, StrategyDef, StrategyFactory,
    StrategyRegistry,
};
pub use rsi::RsiThreshold;
pub use sma_cross::SmaCross;
pub use supertrend::SupertrendFlip;
pub use vwap::VwapReversion;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, Signal};

/// Errors raised at the registry boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
    #[error("strategy '{strategy}' has no parameter '{param}'")]
    UnknownParam { strategy: String, param: String },
    #[error("missing parameter '{0}'")]
    MissingParam(String),
    #[error("parameter '{param}' must be an integer, got {value}")]
    NotAnInteger { param: String, value: f64 },
    #[error("parameter '{param}' = {value} is outside [{min}, {max}]")]
    OutOfRange {
        param: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("invalid parameters: {0}")]
    Invalid(String),
    #[error("no bars supplied")]
    EmptyBars,
    #[error("strategy '{0}' is already registered")]
    DuplicateStrategy(String),
}

/// A configured signal strategy.
///
/// # Architecture invariant
/// `generate` sees bar history only. The target at index `i` may depend on
/// `bars[..=i]` and nothing later.
pub trait SignalStrategy: Send + Sync {
    /// Registry identifier (e.g., "sma_cross").
    fn id(&self) -> &str;

    /// Number of leading bars forced flat.
    fn warmup_bars(&self) -> usize;

    /// Position targets, same length as `bars`.
    fn generate(&self, bars: &[Bar]) -> Vec<Signal>;
}

/// Typed parameters for every built-in strategy, one variant per strategy.
///
/// This is what a validated parameter map turns into at the registry
/// boundary, and what configs serialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BuiltinStrategy {
    SmaCross(SmaCross),
    BuyAndHold(BuyAndHold),
    Rsi(RsiThreshold),
    MacdCross(MacdCross),
    Bollinger(BollingerReversion),
    EmaCross(EmaCross),
    DonchianChannel(DonchianChannel),
    Supertrend(SupertrendFlip),
    DualThrust(DualThrust),
    VwapReversion(VwapReversion),
}

impl BuiltinStrategy {
    /// Build typed parameters for a built-in strategy from a complete map.
    pub fn from_params(id: &str, params: &ParamMap) -> Result<Self, SignalError> {
        Ok(match id {
            sma_cross::ID => Self::SmaCross(SmaCross::from_params(params)?),
            buy_and_hold::ID => Self::BuyAndHold(BuyAndHold),
            rsi::ID => Self::Rsi(RsiThreshold::from_params(params)?),
            macd::ID => Self::MacdCross(MacdCross::from_params(params)?),
            bollinger::ID => Self::Bollinger(BollingerReversion::from_params(params)?),
            ema_cross::ID => Self::EmaCross(EmaCross::from_params(params)?),
            donchian::ID => Self::DonchianChannel(DonchianChannel::from_params(params)?),
            supertrend::ID => Self::Supertrend(SupertrendFlip::from_params(params)?),
            dual_thrust::ID => Self::DualThrust(DualThrust::from_params(params)?),
            vwap::ID => Self::VwapReversion(VwapReversion::from_params(params)?),
            other => return Err(SignalError::UnknownStrategy(other.to_string())),
        })
    }

    fn inner(&self) -> &dyn SignalStrategy {
        match self {
            Self::SmaCross(s) => s,
            Self::BuyAndHold(s) => s,
            Self::Rsi(s) => s,
            Self::MacdCross(s) => s,
            Self::Bollinger(s) => s,
            Self::EmaCross(s) => s,
            Self::DonchianChannel(s) => s,
            Self::Supertrend(s) => s,
            Self::DualThrust(s) => s,
            Self::VwapReversion(s) => s,
        }
    }
}

impl SignalStrategy for BuiltinStrategy {
    fn id(&self) -> &str {
        self.inner().id()
    }

    fn warmup_bars(&self) -> usize {
        self.inner().warmup_bars()
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        self.inner().generate(bars)
    }
}

// ─── Scan helpers ────────────────────────────────────────────────────

/// Run a sticky signal scan.
///
/// Indices below `warmup` are flat. From `warmup` on, `step(i, prev)` maps
/// the previous target to the current one.
pub(crate) fn scan(
    len: usize,
    warmup: usize,
    mut step: impl FnMut(usize, Signal) -> Signal,
) -> Vec<Signal> {
    let mut out = Vec::with_capacity(len);
    let mut prev: Signal = 0;
    for i in 0..len {
        let next = if i < warmup { 0 } else { step(i, prev) };
        out.push(next);
        prev = next;
    }
    out
}

/// Long if `long`, short if `short`, otherwise keep `prev`.
///
/// NaN comparisons are false on both sides, so undefined indicator values
/// hold the previous target.
pub(crate) fn enter_or_hold(prev: Signal, long: bool, short: bool) -> Signal {
    if long {
        1
    } else if short {
        -1
    } else {
        prev
    }
}

/// Read a parameter from a complete map.
pub(crate) fn param(params: &ParamMap, name: &str) -> Result<f64, SignalError> {
    params
        .get(name)
        .copied()
        .ok_or_else(|| SignalError::MissingParam(name.to_string()))
}

/// Read a period-like parameter. Values are validated as integers >= 1 at the registry boundary.
pub(crate) fn param_usize(params: &ParamMap, name: &str) -> Result<usize, SignalError> {
    let value = param(params, name)?;
    if value.fract() != 0.0 || value < 1.0 {
        return Err(SignalError::NotAnInteger {
            param: name.to_string(),
            value,
        });
    }
    Ok(value as usize)
}

/// Test helper: build a parameter map from pairs.
#[cfg(test)]
pub(crate) fn params_of(pairs: &[(&str, f64)]) -> ParamMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}
