//! Time-grid alignment and forward-fill of missing bars.
//!
//! Missing grid slots get a synthetic bar that replicates the previous
//! close across OHLC with zero volume and `filled = true`. Real bars are
//! never modified.

use std::collections::BTreeMap;

use crate::domain::Bar;

/// Snap `timestamp` down to the start of its `timeframe_ms` slot.
///
/// Works for negative timestamps (floor, not truncation). A non-positive
/// timeframe leaves the timestamp unchanged.
pub fn align_to_grid(timestamp: i64, timeframe_ms: i64) -> i64 {
    if timeframe_ms <= 0 {
        return timestamp;
    }
    timestamp - timestamp.rem_euclid(timeframe_ms)
}

/// Forward-fill missing bars on the grid from `since_ms` to `until_ms` inclusive.
///
/// The grid starts at `align_to_grid(since_ms)`. Slots before the first real
/// bar are filled with the first real close. Output is sorted ascending with
/// one bar per timestamp; a real bar wins over a duplicate.
pub fn fill_gaps(bars: &[Bar], since_ms: i64, until_ms: i64, timeframe_ms: i64) -> Vec<Bar> {
    let mut by_ts: BTreeMap<i64, Bar> = BTreeMap::new();
    for bar in bars {
        by_ts.entry(bar.timestamp).or_insert(*bar);
    }
    let Some(mut carried) = by_ts.values().next().map(|b| b.close) else {
        return Vec::new();
    };

    let mut missing = Vec::new();
    if timeframe_ms > 0 {
        let mut cursor = align_to_grid(since_ms, timeframe_ms);
        while cursor <= until_ms {
            if !by_ts.contains_key(&cursor) {
                missing.push(cursor);
            }
            cursor += timeframe_ms;
        }
    }

    // Merge real bars and fill slots in timestamp order, carrying the last
    // real close forward. The two sets never share a timestamp.
    let mut out = Vec::with_capacity(by_ts.len() + missing.len());
    let mut real = by_ts.into_values().peekable();
    let mut slots = missing.into_iter().peekable();
    loop {
        match (real.peek().copied(), slots.peek().copied()) {
            (Some(bar), Some(ts)) if bar.timestamp > ts => {
                out.push(Bar::synthetic(ts, carried));
                slots.next();
            }
            (None, Some(ts)) => {
                out.push(Bar::synthetic(ts, carried));
                slots.next();
            }
            (Some(bar), _) => {
                carried = bar.close;
                out.push(bar);
                real.next();
            }
            (None, None) => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: i64 = 3_600_000;

    fn bar(ts: i64, close: f64) -> Bar {
        Bar::new(ts, close, close + 1.0, close - 1.0, close, 10.0)
    }

    #[test]
    fn align_floors_to_slot() {
        assert_eq!(align_to_grid(3 * H + 17, H), 3 * H);
        assert_eq!(align_to_grid(3 * H, H), 3 * H);
        assert_eq!(align_to_grid(-1, H), -H);
        assert_eq!(align_to_grid(12_345, 0), 12_345);
    }

    #[test]
    fn fills_interior_gap_with_previous_close() {
        let bars = vec![bar(0, 10.0), bar(3 * H, 13.0)];
        let out = fill_gaps(&bars, 0, 3 * H, H);
        let ts: Vec<i64> = out.iter().map(|b| b.timestamp).collect();
        assert_eq!(ts, vec![0, H, 2 * H, 3 * H]);
        assert!(out[1].filled && out[2].filled);
        assert_eq!(out[1].close, 10.0);
        assert_eq!(out[2].open, 10.0);
        assert_eq!(out[2].volume, 0.0);
        assert!(!out[3].filled);
    }

    #[test]
    fn leading_gap_uses_first_real_close() {
        let bars = vec![bar(2 * H, 20.0), bar(3 * H, 21.0)];
        let out = fill_gaps(&bars, 0, 4 * H, H);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0].close, 20.0);
        assert_eq!(out[1].close, 20.0);
        assert!(out[4].filled);
        assert_eq!(out[4].close, 21.0);
    }

    #[test]
    fn unaligned_since_is_snapped() {
        let bars = vec![bar(H, 5.0)];
        let out = fill_gaps(&bars, H + 123, 2 * H, H);
        let ts: Vec<i64> = out.iter().map(|b| b.timestamp).collect();
        assert_eq!(ts, vec![H, 2 * H]);
    }

    #[test]
    fn off_grid_bar_is_kept_and_carried() {
        let bars = vec![bar(0, 1.0), bar(H + 5, 7.0)];
        let out = fill_gaps(&bars, 0, 2 * H, H);
        let ts: Vec<i64> = out.iter().map(|b| b.timestamp).collect();
        assert_eq!(ts, vec![0, H, H + 5, 2 * H]);
        assert_eq!(out[1].close, 1.0);
        assert_eq!(out[3].close, 7.0);
    }

    #[test]
    fn duplicates_collapse_keeping_first() {
        let bars = vec![bar(0, 1.0), bar(0, 99.0), bar(H, 2.0)];
        let out = fill_gaps(&bars, 0, H, H);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].close, 1.0);
    }

    #[test]
    fn empty_stays_empty() {
        assert!(fill_gaps(&[], 0, 10 * H, H).is_empty());
    }
}
