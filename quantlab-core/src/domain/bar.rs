//! OHLCV bar, the fundamental market data unit.

use serde::{Deserialize, Serialize};

/// OHLCV bar for a single instrument on a single timeframe slot.
///
/// `timestamp` is the slot open time in UTC milliseconds. Synthetic bars
/// produced by gap filling carry `filled = true` and replicate the prior
/// close across OHLC with zero volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub filled: bool,
    #[serde(default)]
    pub is_outlier: bool,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            filled: false,
            is_outlier: false,
        }
    }

    /// Forward-filled bar: OHLC all equal to `price`, zero volume.
    pub fn synthetic(timestamp: i64, price: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
            filled: true,
            is_outlier: false,
        }
    }

    /// Returns true if any OHLCV field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Basic OHLC sanity check: high >= max(open, close) >= min(open, close) >= low.
    ///
    /// Synthetic fill bars are exempt and always report sane.
    pub fn is_sane(&self) -> bool {
        if self.filled {
            return true;
        }
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    /// Midpoint of the bar's range.
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// Typical price: (high + low + close) / 3.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Whether `price` lies inside this bar's [low, high] range.
    pub fn touches(&self, price: f64) -> bool {
        self.low <= price && price <= self.high
    }
}
