//! Bar-series utilities: timeframes, grid alignment, gap fill, and hygiene.
//!
//! Everything here is a pure function over bar slices. Fetching and caching
//! belong to the bar source that calls these.

pub mod align;
pub mod canonicalize;
pub mod timeframe;

pub use align::{align_to_grid, fill_gaps};
pub use canonicalize::{
    canonicalize, data_hash, exclude_outliers, mark_outliers, validate_ohlcv, BarIssue,
    DEFAULT_OUTLIER_THRESHOLD,
};
pub use timeframe::{timeframe_ms, TIMEFRAMES};
