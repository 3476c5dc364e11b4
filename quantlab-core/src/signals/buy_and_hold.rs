//! Buy and hold — long from the first bar.

use serde::{Deserialize, Serialize};

use super::registry::ParamSpec;
use super::SignalStrategy;
use crate::domain::{Bar, Signal};

pub const ID: &str = "buy_and_hold";

pub(crate) fn schema() -> Vec<ParamSpec> {
    Vec::new()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyAndHold;

impl SignalStrategy for BuyAndHold {
    fn id(&self) -> &str {
        ID
    }

    fn warmup_bars(&self) -> usize {
        0
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        vec![1; bars.len()]
    }
}
