//! Open-position and equity-curve snapshot types used by the simulation.

use super::trade::Side;
use serde::{Deserialize, Serialize};

/// Transient state of an open position. Exists only during simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub entry_ts: i64,
}

impl Position {
    /// Directional price return from entry to `price`, before leverage.
    pub fn price_return(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price * self.side.direction()
    }

    /// Stop-loss trigger price for a stop `pct` percent away from entry.
    pub fn stop_loss_price(&self, pct: f64) -> f64 {
        match self.side {
            Side::Long => self.entry_price * (1.0 - pct / 100.0),
            Side::Short => self.entry_price * (1.0 + pct / 100.0),
        }
    }

    /// Take-profit trigger price for a target `pct` percent away from entry.
    pub fn take_profit_price(&self, pct: f64) -> f64 {
        match self.side {
            Side::Long => self.entry_price * (1.0 + pct / 100.0),
            Side::Short => self.entry_price * (1.0 - pct / 100.0),
        }
    }
}

/// One mark-to-market snapshot per bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub equity: f64,
    /// Position held at the end of the bar: -1, 0 or 1.
    pub position: i8,
}
