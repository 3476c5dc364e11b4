//! Timeframe identifiers and their bar durations.

/// Supported timeframes and their length in milliseconds.
pub const TIMEFRAMES: &[(&str, i64)] = &[
    ("1m", 60_000),
    ("5m", 300_000),
    ("15m", 900_000),
    ("30m", 1_800_000),
    ("1h", 3_600_000),
    ("4h", 14_400_000),
    ("1d", 86_400_000),
];

/// Fallback for unrecognized ids.
pub const DEFAULT_TIMEFRAME_MS: i64 = 3_600_000;

/// Bar duration for a timeframe id. Unknown ids fall back to one hour.
pub fn timeframe_ms(id: &str) -> i64 {
    TIMEFRAMES
        .iter()
        .find(|(name, _)| *name == id)
        .map_or(DEFAULT_TIMEFRAME_MS, |(_, ms)| *ms)
}

/// Whether `id` is one of [`TIMEFRAMES`].
pub fn is_known(id: &str) -> bool {
    TIMEFRAMES.iter().any(|(name, _)| *name == id)
}
