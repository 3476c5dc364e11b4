//! Closed round trips, and the side/exit-reason vocabulary they use.

use serde::{Deserialize, Serialize};

/// Direction of an open position or a closed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Map a position target to a side. `0` (flat) and anything else map to `None`.
    pub fn from_signal(target: i8) -> Option<Self> {
        match target {
            1 => Some(Self::Long),
            -1 => Some(Self::Short),
            _ => None,
        }
    }

    /// +1 for long, -1 for short.
    pub fn as_i8(self) -> i8 {
        match self {
            Self::Long => 1,
            Self::Short => -1,
        }
    }

    /// Sign multiplier for return calculations.
    pub fn direction(self) -> f64 {
        f64::from(self.as_i8())
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    SignalFlip,
    StopLoss,
    TakeProfit,
    ForcedCloseAtEnd,
    /// Mark-to-market equity reached zero while the position was open.
    Liquidation,
}

/// A completed round-trip trade: entry → exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_ts: i64,
    pub exit_ts: i64,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Realized return on equity in percent, after leverage and costs.
    pub pnl_pct: f64,
    /// Realized profit in account currency.
    pub profit: f64,
    /// Round-trip transaction cost charged on this trade.
    pub fee: f64,
    pub liquidation: bool,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl_pct > 0.0
    }

    /// Holding time in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.exit_ts - self.entry_ts
    }
}
