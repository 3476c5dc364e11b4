//! Bar sources for the optimizer and CLI.
//!
//! A source answers `(symbol, timeframe, since_ms, until_ms)` with bars
//! sorted ascending by timestamp. Windows include `since_ms` and exclude
//! `until_ms`. Sources are shared across optimizer workers, so they must
//! tolerate concurrent calls.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use quantlab_core::data::{
    align_to_grid, canonicalize, exclude_outliers, fill_gaps, mark_outliers, timeframe_ms,
    DEFAULT_OUTLIER_THRESHOLD,
};
use quantlab_core::domain::Bar;
use quantlab_core::synthetic::{derive_seed, synthetic_bars};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from loading or serving bars.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("no data for {symbol} {timeframe}")]
    NoData { symbol: String, timeframe: String },
    #[error("invalid window: since_ms {since_ms} must be before until_ms {until_ms}")]
    InvalidWindow { since_ms: i64, until_ms: i64 },
}

/// Anything that can deliver bars for one instrument and timeframe.
pub trait BarSource: Send + Sync {
    fn get_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        since_ms: i64,
        until_ms: i64,
    ) -> Result<Vec<Bar>, SourceError>;
}

fn check_window(since_ms: i64, until_ms: i64) -> Result<(), SourceError> {
    if since_ms >= until_ms {
        return Err(SourceError::InvalidWindow { since_ms, until_ms });
    }
    Ok(())
}

// ─── In-memory source ────────────────────────────────────────────────

/// Post-processing applied to every window served by [`InMemorySource`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// Forward-fill missing grid slots between the first and last stored
    /// bar of the window. Slots outside the stored data are never invented.
    pub fill_gaps: bool,
    /// Drop bars whose close deviates from the window mean by more than the threshold.
    pub exclude_outliers: bool,
    pub outlier_threshold: f64,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            fill_gaps: true,
            exclude_outliers: false,
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
        }
    }
}

/// Bar series held in memory, keyed by (symbol, timeframe).
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: HashMap<(String, String), Vec<Bar>>,
    options: SourceOptions,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: SourceOptions) -> Self {
        self.options = options;
        self
    }

    /// Store a series. Bars are sorted and de-duplicated on the way in.
    pub fn insert(&mut self, symbol: &str, timeframe: &str, bars: Vec<Bar>) {
        self.series
            .insert((symbol.to_string(), timeframe.to_string()), canonicalize(&bars));
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Load every `{symbol}_{timeframe}.csv` file in `dir`.
    ///
    /// Files that do not follow the naming pattern are ignored.
    pub fn from_csv_dir(dir: &Path) -> Result<Self, SourceError> {
        let io_err = |source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut source = Self::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some((symbol, timeframe)) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.rsplit_once('_'))
            else {
                continue;
            };
            let bars = load_csv_bars(&path)?;
            debug!(symbol, timeframe, bars = bars.len(), "loaded csv series");
            source.insert(symbol, timeframe, bars);
        }
        Ok(source)
    }
}

impl BarSource for InMemorySource {
    fn get_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        since_ms: i64,
        until_ms: i64,
    ) -> Result<Vec<Bar>, SourceError> {
        check_window(since_ms, until_ms)?;
        let no_data = || SourceError::NoData {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        };
        let series = self
            .series
            .get(&(symbol.to_string(), timeframe.to_string()))
            .ok_or_else(no_data)?;

        let mut window: Vec<Bar> = series
            .iter()
            .filter(|b| b.timestamp >= since_ms && b.timestamp < until_ms)
            .copied()
            .collect();
        if self.options.exclude_outliers {
            mark_outliers(&mut window, self.options.outlier_threshold);
            window = exclude_outliers(&window);
        }
        if self.options.fill_gaps {
            if let (Some(first), Some(last)) = (window.first(), window.last()) {
                let (from, to) = (first.timestamp, last.timestamp);
                window = fill_gaps(&window, from, to, timeframe_ms(timeframe));
                window.retain(|b| b.timestamp >= since_ms);
            }
        }
        if window.is_empty() {
            return Err(no_data());
        }
        Ok(window)
    }
}

// ─── Synthetic source ────────────────────────────────────────────────

/// Deterministic random-walk bars for any (symbol, timeframe).
///
/// Each key gets its own seed derived from the master seed, so different
/// timeframes are independent walks rather than resamples of each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticSource {
    pub seed: u64,
    pub start_price: f64,
    /// Upper bound on bars per request.
    pub max_bars: usize,
}

impl SyntheticSource {
    pub fn new(seed: u64, max_bars: usize) -> Self {
        Self {
            seed,
            start_price: 100.0,
            max_bars,
        }
    }
}

impl BarSource for SyntheticSource {
    fn get_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        since_ms: i64,
        until_ms: i64,
    ) -> Result<Vec<Bar>, SourceError> {
        check_window(since_ms, until_ms)?;
        let tf = timeframe_ms(timeframe);
        let start = align_to_grid(since_ms.saturating_add(tf - 1), tf);
        let slots = if start < until_ms {
            ((until_ms - 1 - start) / tf + 1) as usize
        } else {
            0
        };
        let n = slots.min(self.max_bars);
        if n == 0 {
            return Err(SourceError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        let seed = derive_seed(self.seed, &format!("{symbol}/{timeframe}"));
        Ok(synthetic_bars(seed, n, start, tf, self.start_price))
    }
}

// ─── CSV ─────────────────────────────────────────────────────────────

/// Read bars from a CSV file with a header row.
///
/// Columns: `timestamp,open,high,low,close,volume`, optionally followed by
/// `filled,is_outlier`. The result is sorted and de-duplicated.
pub fn load_csv_bars(path: &Path) -> Result<Vec<Bar>, SourceError> {
    let csv_err = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let bars = reader
        .deserialize::<Bar>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_err)?;
    Ok(canonicalize(&bars))
}

/// Write bars as CSV with the same columns [`load_csv_bars`] reads.
pub fn write_csv_bars(path: &Path, bars: &[Bar]) -> Result<(), SourceError> {
    let csv_err = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for bar in bars {
        writer.serialize(bar).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: i64 = 60_000;

    fn bar(ts: i64, close: f64) -> Bar {
        Bar::new(ts, close, close + 1.0, close - 1.0, close, 10.0)
    }

    fn source(options: SourceOptions) -> InMemorySource {
        let mut s = InMemorySource::new().with_options(options);
        s.insert(
            "BTC/USDT",
            "1m",
            vec![bar(3 * MIN, 103.0), bar(0, 100.0), bar(MIN, 101.0)],
        );
        s
    }

    fn raw() -> SourceOptions {
        SourceOptions {
            fill_gaps: false,
            ..SourceOptions::default()
        }
    }

    #[test]
    fn window_is_half_open_and_sorted() {
        let bars = source(raw()).get_bars("BTC/USDT", "1m", 0, 3 * MIN).unwrap();
        let ts: Vec<i64> = bars.iter().map(|b| b.timestamp).collect();
        assert_eq!(ts, vec![0, MIN]);
    }

    #[test]
    fn gaps_are_filled_inside_window() {
        let bars = source(SourceOptions::default())
            .get_bars("BTC/USDT", "1m", 0, 4 * MIN)
            .unwrap();
        assert_eq!(bars.len(), 4);
        assert!(bars[2].filled);
        assert_eq!(bars[2].close, 101.0);
        assert_eq!(bars[2].volume, 0.0);
    }

    #[test]
    fn open_ended_window_fills_only_between_stored_bars() {
        let bars = source(SourceOptions::default())
            .get_bars("BTC/USDT", "1m", 0, i64::MAX)
            .unwrap();
        let ts: Vec<i64> = bars.iter().map(|b| b.timestamp).collect();
        assert_eq!(ts, vec![0, MIN, 2 * MIN, 3 * MIN]);
        assert_eq!(bars.iter().filter(|b| b.filled).count(), 1);
    }

    #[test]
    fn late_data_gets_no_leading_fill() {
        const DAY: i64 = 86_400_000;
        let start = 19_723 * DAY;
        let mut s = InMemorySource::new();
        s.insert(
            "BTC/USDT",
            "1d",
            vec![bar(start, 1.0), bar(start + DAY, 2.0), bar(start + 2 * DAY, 3.0)],
        );
        let bars = s.get_bars("BTC/USDT", "1d", 0, start + 30 * DAY).unwrap();
        assert_eq!(bars.len(), 3);
        assert!(bars.iter().all(|b| !b.filled));
    }

    #[test]
    fn unknown_key_is_no_data() {
        let err = source(raw()).get_bars("ETH/USDT", "1m", 0, MIN).unwrap_err();
        assert!(matches!(err, SourceError::NoData { .. }));
    }

    #[test]
    fn empty_window_is_no_data() {
        let err = source(raw())
            .get_bars("BTC/USDT", "1m", 10 * MIN, 20 * MIN)
            .unwrap_err();
        assert!(matches!(err, SourceError::NoData { .. }));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let err = source(raw()).get_bars("BTC/USDT", "1m", MIN, MIN).unwrap_err();
        assert!(matches!(err, SourceError::InvalidWindow { .. }));
    }

    #[test]
    fn synthetic_source_is_deterministic_and_aligned() {
        let s = SyntheticSource::new(9, 1_000);
        let a = s.get_bars("X", "1h", 1, 10 * 3_600_000).unwrap();
        let b = s.get_bars("X", "1h", 1, 10 * 3_600_000).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 9);
        assert_eq!(a[0].timestamp, 3_600_000);
        let other = s.get_bars("Y", "1h", 1, 10 * 3_600_000).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn synthetic_source_caps_bar_count() {
        let s = SyntheticSource::new(1, 5);
        assert_eq!(s.get_bars("X", "1m", 0, 100 * MIN).unwrap().len(), 5);
    }
}
