//! TOML configuration for runs, sweeps, and walk-forward analysis.
//!
//! Every section has defaults, so an empty file is a valid config:
//!
//! ```toml
//! [market]
//! symbol = "BTC/USDT"
//! timeframe = "1h"
//! start_date = "2024-01-01"
//! end_date = "2024-06-30"
//!
//! [strategy]
//! id = "sma_cross"
//! params = { fast = 10, slow = 30 }
//!
//! [economics]
//! leverage = 2.0
//! stop_loss_pct = 5.0
//!
//! [optimizer]
//! strategies = ["sma_cross", "rsi"]
//! timeframes = ["1h", "4h"]
//! objective = "calmar_ratio"
//!
//! [walk_forward]
//! n_splits = 4
//! ```

use std::io;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use quantlab_core::data::timeframe::is_known;
use quantlab_core::engine::Economics;
use quantlab_core::signals::{ParamMap, StrategyRegistry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::optimizer::{BarRequest, OptimizerConfig, OPEN_END_MS, OPEN_START_MS};
use crate::source::SourceOptions;
use crate::walk_forward::WalkForwardConfig;

/// Content-addressed identifier of a config.
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
    #[error("config serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ─── Sections ────────────────────────────────────────────────────────

/// Instrument, venue, and time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub symbol: String,
    pub exchange: String,
    pub timeframe: String,
    /// First day included (UTC).
    pub start_date: Option<NaiveDate>,
    /// Last day included (UTC).
    pub end_date: Option<NaiveDate>,
    pub fill_gaps: bool,
    pub exclude_outliers: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC/USDT".into(),
            exchange: "binance".into(),
            timeframe: "1h".into(),
            start_date: None,
            end_date: None,
            fill_gaps: true,
            exclude_outliers: false,
        }
    }
}

impl MarketConfig {
    /// Half-open `[since_ms, until_ms)` window covering the configured days.
    ///
    /// A missing start means the epoch; a missing end means unbounded.
    pub fn window_ms(&self) -> Result<(i64, i64), ConfigError> {
        let since = self.start_date.map_or(OPEN_START_MS, day_start_ms);
        let until = self
            .end_date
            .map_or(OPEN_END_MS, |d| day_start_ms(d + Duration::days(1)));
        if since >= until {
            return Err(ConfigError::Invalid(format!(
                "start_date must be on or before end_date ({:?} > {:?})",
                self.start_date, self.end_date
            )));
        }
        Ok((since, until))
    }

    pub fn bar_request(&self) -> Result<BarRequest, ConfigError> {
        let (since_ms, until_ms) = self.window_ms()?;
        Ok(BarRequest {
            symbol: self.symbol.clone(),
            since_ms,
            until_ms,
        })
    }

    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            fill_gaps: self.fill_gaps,
            exclude_outliers: self.exclude_outliers,
            ..SourceOptions::default()
        }
    }
}

fn day_start_ms(day: NaiveDate) -> i64 {
    day.and_hms_opt(0, 0, 0)
        .map_or(0, |dt| dt.and_utc().timestamp_millis())
}

/// Strategy for single runs and walk-forward analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub id: String,
    /// Overrides; missing keys take the strategy defaults.
    pub params: ParamMap,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            id: "sma_cross".into(),
            params: ParamMap::new(),
        }
    }
}

// ─── Top-level config ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantlabConfig {
    pub market: MarketConfig,
    pub strategy: StrategyConfig,
    pub economics: Economics,
    pub optimizer: OptimizerConfig,
    pub walk_forward: WalkForwardConfig,
}

impl QuantlabConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the type system cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let registry = StrategyRegistry::builtin();
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        for tf in std::iter::once(&self.market.timeframe).chain(&self.optimizer.timeframes) {
            if !is_known(tf) {
                return invalid(format!("unknown timeframe '{tf}'"));
            }
        }
        self.market.window_ms()?;
        registry
            .build(&self.strategy.id, &self.strategy.params)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if let Some(unknown) = self
            .optimizer
            .strategies
            .iter()
            .find(|id| registry.get(id).is_none())
        {
            return invalid(format!("unknown strategy '{unknown}' in [optimizer]"));
        }
        if self.optimizer.max_workers == Some(0) {
            return invalid("optimizer.max_workers must be >= 1".into());
        }
        self.economics
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.walk_forward
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Deterministic hash of the full config.
    ///
    /// Two configs with identical content share a RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::Objective;

    #[test]
    fn empty_file_is_default() {
        let config = QuantlabConfig::from_toml_str("").unwrap();
        assert_eq!(config, QuantlabConfig::default());
        assert_eq!(config.economics.initial_equity, 10_000.0);
        assert_eq!(config.walk_forward.n_splits, 5);
    }

    #[test]
    fn sections_parse() {
        let config = QuantlabConfig::from_toml_str(
            r#"
            [market]
            symbol = "ETH/USDT"
            timeframe = "4h"
            start_date = "2024-01-01"
            end_date = "2024-01-31"

            [strategy]
            id = "rsi"
            params = { period = 10, oversold = 25 }

            [economics]
            leverage = 3.0
            take_profit_pct = 8.0

            [optimizer]
            strategies = ["rsi", "macd_cross"]
            timeframes = ["1h"]
            objective = "max_drawdown_pct"
            max_workers = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.market.symbol, "ETH/USDT");
        assert_eq!(config.strategy.params["period"], 10.0);
        assert_eq!(config.economics.leverage, 3.0);
        assert_eq!(config.economics.take_profit_pct, Some(8.0));
        assert_eq!(config.optimizer.objective, Objective::MaxDrawdownPct);
        assert_eq!(config.optimizer.max_workers, Some(2));
        assert!(config.market.fill_gaps);
    }

    #[test]
    fn window_covers_whole_days() {
        let market = MarketConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..MarketConfig::default()
        };
        let (since, until) = market.window_ms().unwrap();
        assert_eq!(since, 1_704_067_200_000);
        assert_eq!(until - since, 86_400_000);
    }

    #[test]
    fn inverted_dates_are_rejected() {
        let err = QuantlabConfig::from_toml_str(
            r#"
            [market]
            start_date = "2024-02-01"
            end_date = "2024-01-01"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_date_is_a_parse_error() {
        let err = QuantlabConfig::from_toml_str("[market]\nstart_date = \"01/02/2024\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unknown_values_are_rejected() {
        for text in [
            "[market]\ntimeframe = \"2h\"",
            "[strategy]\nid = \"ichimoku\"",
            "[strategy]\nparams = { fast = 40, slow = 20 }",
            "[optimizer]\nstrategies = [\"nope\"]",
            "[economics]\nleverage = 0.5",
            "[walk_forward]\ntrain_ratio = 1.5",
        ] {
            assert!(
                matches!(QuantlabConfig::from_toml_str(text), Err(ConfigError::Invalid(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn run_id_is_deterministic_and_content_sensitive() {
        let a = QuantlabConfig::default();
        let mut b = a.clone();
        assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());
        b.strategy.params.insert("fast".into(), 5.0);
        assert_ne!(a.run_id().unwrap(), b.run_id().unwrap());
        assert_eq!(a.run_id().unwrap().len(), 64);
    }
}
