//! Append-only JSONL history of successful runs.
//!
//! Each line is one independent JSON object, so a torn write damages at most
//! one record and the file stays easy to stream.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use quantlab_core::engine::BacktestResult;
use quantlab_core::metrics::Metrics;
use quantlab_core::signals::ParamMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("history serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Metrics of one run, keyed by who ran what where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub user: String,
    pub symbol: String,
    pub exchange: String,
    pub timeframe: String,
    pub strategy: String,
    pub params: ParamMap,
    pub timestamp_ms: i64,
    pub metrics: Metrics,
}

/// Identifies the run a record belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunKey<'a> {
    pub user: &'a str,
    pub symbol: &'a str,
    pub exchange: &'a str,
    pub timeframe: &'a str,
    pub strategy: &'a str,
}

impl HistoryRecord {
    /// Record for a finished run, stamped with the current time.
    ///
    /// Returns `None` for failed runs, which have no metrics to keep.
    pub fn from_result(key: &RunKey<'_>, params: &ParamMap, result: &BacktestResult) -> Option<Self> {
        let metrics = result.metrics.clone()?;
        Some(Self {
            user: key.user.to_string(),
            symbol: key.symbol.to_string(),
            exchange: key.exchange.to_string(),
            timeframe: key.timeframe.to_string(),
            strategy: key.strategy.to_string(),
            params: params.clone(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            metrics,
        })
    }
}

/// Where finished runs are handed off to.
pub trait HistoryRecorder: Send + Sync {
    fn record(&self, record: &HistoryRecord) -> Result<(), HistoryError>;
}

/// JSONL history file.
#[derive(Debug, Clone)]
pub struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read all records.
    ///
    /// A missing file reads as empty. Malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => debug!(line = line_no + 1, error = %e, "skipping malformed history line"),
            }
        }
        Ok(records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryRecorder for JsonlHistory {
    fn record(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        let json = serde_json::to_string(record)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()?;
        Ok(())
    }
}
