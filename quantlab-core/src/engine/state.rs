//! Engine economics, per-run simulation state, and the run result.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EngineError;
use crate::domain::{Bar, EquityPoint, ExitReason, Position, Side, Signal, Trade};
use crate::fees::{self, OrderType};
use crate::metrics::Metrics;

/// Money-side inputs to a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Economics {
    pub initial_equity: f64,
    /// Notional multiple applied to every price return. Must be >= 1.
    pub leverage: f64,
    /// Take-profit distance from entry, in percent.
    pub take_profit_pct: Option<f64>,
    /// Stop-loss distance from entry, in percent.
    pub stop_loss_pct: Option<f64>,
    /// Fee per side, in percent of notional.
    pub fee_rate_pct: f64,
    /// Slippage per side, in percent of notional.
    pub slippage_pct: f64,
}

impl Default for Economics {
    fn default() -> Self {
        Self {
            initial_equity: 10_000.0,
            leverage: 1.0,
            take_profit_pct: None,
            stop_loss_pct: None,
            fee_rate_pct: 0.0,
            slippage_pct: 0.0,
        }
    }
}

impl Economics {
    /// Defaults with fee and slippage taken from the exchange fee table.
    pub fn for_exchange(exchange: &str, order_type: OrderType) -> Self {
        Self {
            fee_rate_pct: fees::fee_rate(exchange, order_type),
            slippage_pct: fees::slippage(exchange),
            ..Self::default()
        }
    }

    /// Check caller-side preconditions.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.initial_equity.is_finite() || self.initial_equity <= 0.0 {
            return Err(EngineError::NonPositiveEquity(self.initial_equity));
        }
        if !self.leverage.is_finite() || self.leverage < 1.0 {
            return Err(EngineError::InvalidLeverage(self.leverage));
        }
        for (name, value) in [
            ("fee_rate_pct", self.fee_rate_pct),
            ("slippage_pct", self.slippage_pct),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidCost { name, value });
            }
        }
        for (name, level) in [
            ("take_profit_pct", self.take_profit_pct),
            ("stop_loss_pct", self.stop_loss_pct),
        ] {
            if let Some(value) = level {
                if !value.is_finite() || value <= 0.0 {
                    return Err(EngineError::InvalidExitLevel { name, value });
                }
            }
        }
        Ok(())
    }

    /// Fractional cost of one round trip: both sides of fee plus slippage.
    pub fn round_trip_cost(&self) -> f64 {
        2.0 * (self.fee_rate_pct + self.slippage_pct) / 100.0
    }
}

/// Outcome of one simulation.
///
/// Either `error` is set and everything else is empty, or `error` is `None`
/// and the curve, trades, and metrics are populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub metrics: Option<Metrics>,
    pub error: Option<String>,
    /// Equity reached zero at some point during the run.
    pub liquidated: bool,
}

impl BacktestResult {
    /// Empty result carrying an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            equity_curve: Vec::new(),
            trades: Vec::new(),
            metrics: None,
            error: Some(error.into()),
            liquidated: false,
        }
    }

    /// Result for an empty bar sequence.
    pub fn no_data() -> Self {
        Self::failed("no data")
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().map(|p| p.equity)
    }
}

/// Mutable state threaded through the bar loop.
#[derive(Debug)]
pub(crate) struct SimState<'a> {
    economics: &'a Economics,
    pub equity: f64,
    pub position: Option<Position>,
    pub liquidated: bool,
    pub trades: Vec<Trade>,
    /// Last reported equity, carried across bars without usable prices.
    last_mark: f64,
    /// Close of the last bar with usable prices.
    last_close: Option<f64>,
}

impl<'a> SimState<'a> {
    pub fn new(economics: &'a Economics) -> Self {
        Self {
            economics,
            equity: economics.initial_equity,
            position: None,
            liquidated: false,
            trades: Vec::new(),
            last_mark: economics.initial_equity,
            last_close: None,
        }
    }

    fn held(&self) -> Signal {
        self.position.map_or(0, |p| p.side.as_i8())
    }

    /// Process one bar and return its equity snapshot.
    ///
    /// `allow_entry` is false on the final bar, where a new position could
    /// not be held for any time before the end-of-data close.
    pub fn step(&mut self, bar: &Bar, target: Signal, allow_entry: bool) -> EquityPoint {
        let ts = bar.timestamp;
        if self.liquidated {
            return EquityPoint {
                timestamp: ts,
                equity: 0.0,
                position: 0,
            };
        }
        if bar.is_void() || bar.close <= 0.0 {
            return EquityPoint {
                timestamp: ts,
                equity: self.last_mark,
                position: self.held(),
            };
        }
        self.last_close = Some(bar.close);

        // Intrabar stop-loss / take-profit; the exit ends this bar.
        if let Some((price, reason)) = self.bracket_exit(bar) {
            self.close(ts, price, reason);
            return self.mark(ts, bar.close);
        }

        if let Some(pos) = self.position {
            if pos.side.as_i8() != target {
                self.close(ts, bar.close, ExitReason::SignalFlip);
            }
        }

        if self.position.is_none() && !self.liquidated && allow_entry {
            if let Some(side) = Side::from_signal(target) {
                self.position = Some(Position {
                    side,
                    entry_price: bar.close,
                    entry_ts: ts,
                });
            }
        }

        self.mark(ts, bar.close)
    }

    /// Close any position still open after the last bar.
    ///
    /// Overwrites the final equity point with the realized value.
    pub fn finish(&mut self, last_ts: i64, curve: &mut [EquityPoint]) {
        if self.liquidated || self.position.is_none() {
            return;
        }
        let Some(price) = self.last_close else {
            return;
        };
        self.close(last_ts, price, ExitReason::ForcedCloseAtEnd);
        if let Some(point) = curve.last_mut() {
            point.equity = self.equity;
            point.position = 0;
        }
    }

    /// Stop-loss or take-profit price touched by this bar. Stop-loss wins ties.
    fn bracket_exit(&self, bar: &Bar) -> Option<(f64, ExitReason)> {
        let pos = self.position?;
        let stop = self
            .economics
            .stop_loss_pct
            .map(|pct| pos.stop_loss_price(pct))
            .filter(|&price| bar.touches(price));
        if let Some(price) = stop {
            return Some((price, ExitReason::StopLoss));
        }
        self.economics
            .take_profit_pct
            .map(|pct| pos.take_profit_price(pct))
            .filter(|&price| bar.touches(price))
            .map(|price| (price, ExitReason::TakeProfit))
    }

    /// Mark-to-market snapshot at `close`.
    ///
    /// An open position whose marked value reaches zero is liquidated here.
    fn mark(&mut self, ts: i64, close: f64) -> EquityPoint {
        if let Some(pos) = self.position {
            let marked = self.equity * (1.0 + pos.price_return(close) * self.economics.leverage);
            if marked <= 0.0 {
                self.close(ts, close, ExitReason::Liquidation);
            } else {
                self.last_mark = marked;
                return EquityPoint {
                    timestamp: ts,
                    equity: marked,
                    position: pos.side.as_i8(),
                };
            }
        }
        self.last_mark = self.equity;
        EquityPoint {
            timestamp: ts,
            equity: self.equity,
            position: 0,
        }
    }

    /// Realize the open position at `price`.
    fn close(&mut self, exit_ts: i64, price: f64, reason: ExitReason) {
        let Some(pos) = self.position.take() else {
            return;
        };
        let cost = self.economics.round_trip_cost();
        let equity_before = self.equity;
        let mut pnl = pos.price_return(price) * self.economics.leverage - cost;
        self.equity *= 1.0 + pnl;
        let mut profit = equity_before * pnl;
        if self.equity <= 0.0 {
            self.equity = 0.0;
            profit = -equity_before;
            pnl = -1.0;
            self.liquidated = true;
            debug!(exit_ts, ?reason, equity_before, "position liquidated");
        }
        self.trades.push(Trade {
            entry_ts: pos.entry_ts,
            exit_ts,
            side: pos.side,
            entry_price: pos.entry_price,
            exit_price: price,
            pnl_pct: pnl * 100.0,
            profit,
            fee: equity_before * cost,
            liquidation: self.liquidated,
            exit_reason: reason,
        });
    }
}
