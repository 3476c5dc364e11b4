//! Bar hygiene: ordering, validation, outlier flags, and a content hash.

use std::fmt;

use crate::domain::Bar;

/// Closes deviating from the series mean by more than this fraction are outliers.
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 0.05;

/// Minimum series length before outlier marking applies.
const MIN_BARS_FOR_OUTLIERS: usize = 5;

/// Share of zero closes above which a series is reported.
const ZERO_CLOSE_LIMIT: f64 = 0.10;

/// Sort ascending by timestamp and drop duplicate timestamps (first wins).
pub fn canonicalize(bars: &[Bar]) -> Vec<Bar> {
    let mut out = bars.to_vec();
    out.sort_by_key(|b| b.timestamp);
    out.dedup_by_key(|b| b.timestamp);
    out
}

/// A data-quality problem found by [`validate_ohlcv`].
#[derive(Debug, Clone, PartialEq)]
pub enum BarIssue {
    Empty,
    /// First place where timestamps fail to increase.
    OutOfOrder { index: usize, timestamp: i64, previous: i64 },
    /// First genuine bar whose high is below its low.
    HighBelowLow { index: usize, high: f64, low: f64 },
    TooManyZeroCloses { zero: usize, total: usize },
}

impl fmt::Display for BarIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarIssue::Empty => write!(f, "no bars"),
            BarIssue::OutOfOrder {
                index,
                timestamp,
                previous,
            } => write!(
                f,
                "bar {index} timestamp {timestamp} is not after bar {} ({previous})",
                index - 1
            ),
            BarIssue::HighBelowLow { index, high, low } => {
                write!(f, "bar {index} has high {high} below low {low}")
            }
            BarIssue::TooManyZeroCloses { zero, total } => {
                write!(f, "more than 10% of bars have a zero close ({zero}/{total})")
            }
        }
    }
}

/// Report data-quality problems. An empty report means the series is usable.
pub fn validate_ohlcv(bars: &[Bar]) -> Vec<BarIssue> {
    if bars.is_empty() {
        return vec![BarIssue::Empty];
    }
    let mut issues = Vec::new();

    if let Some(i) = (1..bars.len()).find(|&i| bars[i].timestamp <= bars[i - 1].timestamp) {
        issues.push(BarIssue::OutOfOrder {
            index: i,
            timestamp: bars[i].timestamp,
            previous: bars[i - 1].timestamp,
        });
    }

    if let Some((index, bar)) = bars
        .iter()
        .enumerate()
        .find(|(_, b)| !b.filled && b.high > 0.0 && b.high < b.low)
    {
        issues.push(BarIssue::HighBelowLow {
            index,
            high: bar.high,
            low: bar.low,
        });
    }

    let zero = bars.iter().filter(|b| b.close == 0.0).count();
    if zero as f64 > bars.len() as f64 * ZERO_CLOSE_LIMIT {
        issues.push(BarIssue::TooManyZeroCloses {
            zero,
            total: bars.len(),
        });
    }

    issues
}

/// Flag bars whose close deviates from the mean close by more than `threshold`.
///
/// The mean covers non-zero closes. Series shorter than five bars are left
/// untouched, as are existing flags.
pub fn mark_outliers(bars: &mut [Bar], threshold: f64) {
    if bars.len() < MIN_BARS_FOR_OUTLIERS {
        return;
    }
    let closes: Vec<f64> = bars
        .iter()
        .map(|b| b.close)
        .filter(|&c| c != 0.0 && c.is_finite())
        .collect();
    if closes.is_empty() {
        return;
    }
    let mean = closes.iter().sum::<f64>() / closes.len() as f64;
    if mean <= 0.0 {
        return;
    }
    for bar in bars.iter_mut() {
        if bar.close != 0.0 && ((bar.close - mean).abs() / mean) > threshold {
            bar.is_outlier = true;
        }
    }
}

/// Drop bars flagged as outliers.
pub fn exclude_outliers(bars: &[Bar]) -> Vec<Bar> {
    bars.iter().filter(|b| !b.is_outlier).copied().collect()
}

/// Short content fingerprint for cache checks.
///
/// First 12 hex chars of the blake3 digest of
/// `len:first_ts:last_ts:last_close`; empty for no bars.
pub fn data_hash(bars: &[Bar]) -> String {
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return String::new();
    };
    let key = format!(
        "{}:{}:{}:{}",
        bars.len(),
        first.timestamp,
        last.timestamp,
        last.close
    );
    let hash = blake3::hash(key.as_bytes()).to_hex();
    hash.as_str()[..12].to_string()
}
