//! Domain types: bars, positions, trades, equity snapshots.

pub mod bar;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use position::{EquityPoint, Position};
pub use trade::{ExitReason, Side, Trade};

/// Position target for one bar: -1 short, 0 flat, 1 long.
pub type Signal = i8;
