//! Strategy registry — id → {parameter schema, defaults, grid, factory}.
//!
//! The registry is the single validation boundary for strategy parameters.
//! Callers hand it loosely-typed parameter maps; it checks them against the
//! declared schema, fills defaults, and hands a complete map to the
//! strategy's factory, which builds the typed strategy.
//!
//! New strategies are added by registering a [`StrategyDef`]; neither the
//! engine nor the optimizer needs to change.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::{
    bollinger, buy_and_hold, donchian, dual_thrust, ema_cross, macd, rsi, sma_cross, supertrend,
    vwap, BuiltinStrategy, SignalError, SignalStrategy,
};
use crate::domain::{Bar, Signal};

/// Parameter map as accepted at the registry boundary.
///
/// Keys are parameter names. Integer parameters are carried as whole-number
/// `f64` values and checked against the schema.
pub type ParamMap = BTreeMap<String, f64>;

/// Builds a strategy from a complete, schema-checked parameter map.
pub type StrategyFactory =
    Arc<dyn Fn(&ParamMap) -> Result<Box<dyn SignalStrategy>, SignalError> + Send + Sync>;

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
}

/// Largest accepted value for integer parameters.
pub const MAX_INT_PARAM: f64 = u32::MAX as f64;

/// Schema entry for one strategy parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub default: f64,
    /// Inclusive lower bound.
    pub min: f64,
    /// Inclusive upper bound.
    pub max: f64,
    /// Candidate values swept by the optimizer.
    pub grid: Vec<f64>,
}

impl ParamSpec {
    /// Integer parameter, valid in `[1, MAX_INT_PARAM]`.
    pub fn int(name: &str, default: usize, grid: &[usize]) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Int,
            default: default as f64,
            min: 1.0,
            max: MAX_INT_PARAM,
            grid: grid.iter().map(|&v| v as f64).collect(),
        }
    }

    /// Strictly positive float parameter.
    pub fn positive(name: &str, default: f64, grid: &[f64]) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Float,
            default,
            min: f64::MIN_POSITIVE,
            max: f64::MAX,
            grid: grid.to_vec(),
        }
    }

    /// Override the inclusive bounds.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Check a single value against this entry.
    pub fn check(&self, value: f64) -> Result<(), SignalError> {
        if self.kind == ParamKind::Int && value.is_finite() && value.fract() != 0.0 {
            return Err(SignalError::NotAnInteger {
                param: self.name.clone(),
                value,
            });
        }
        if !value.is_finite() || value < self.min || value > self.max {
            return Err(SignalError::OutOfRange {
                param: self.name.clone(),
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// A registered strategy.
#[derive(Clone)]
pub struct StrategyDef {
    pub id: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub factory: StrategyFactory,
}

impl StrategyDef {
    pub fn new(
        id: &str,
        description: &str,
        params: Vec<ParamSpec>,
        factory: StrategyFactory,
    ) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            params,
            factory,
        }
    }

    /// Default value for every declared parameter.
    pub fn defaults(&self) -> ParamMap {
        self.params
            .iter()
            .map(|p| (p.name.clone(), p.default))
            .collect()
    }

    /// Validate `params` against the schema and fill in defaults.
    pub fn resolve(&self, params: &ParamMap) -> Result<ParamMap, SignalError> {
        if let Some(unknown) = params
            .keys()
            .find(|k| !self.params.iter().any(|p| &p.name == *k))
        {
            return Err(SignalError::UnknownParam {
                strategy: self.id.clone(),
                param: unknown.clone(),
            });
        }

        let mut resolved = ParamMap::new();
        for spec in &self.params {
            let value = params.get(&spec.name).copied().unwrap_or(spec.default);
            spec.check(value)?;
            resolved.insert(spec.name.clone(), value);
        }
        Ok(resolved)
    }

    /// Validate, fill defaults, and build.
    pub fn build(&self, params: &ParamMap) -> Result<Box<dyn SignalStrategy>, SignalError> {
        let resolved = self.resolve(params)?;
        (self.factory)(&resolved)
    }
}

impl fmt::Debug for StrategyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyDef")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Ordered table of strategy definitions.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    defs: Vec<StrategyDef>,
}

impl StrategyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the ten built-in strategies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (id, description, params) in builtin_table() {
            let owned_id = id.to_string();
            let factory: StrategyFactory = Arc::new(move |p: &ParamMap| {
                BuiltinStrategy::from_params(&owned_id, p)
                    .map(|s| Box::new(s) as Box<dyn SignalStrategy>)
            });
            registry.defs.push(StrategyDef::new(id, description, params, factory));
        }
        registry
    }

    /// Shared built-in registry.
    pub fn builtin() -> &'static StrategyRegistry {
        static BUILTIN: OnceLock<StrategyRegistry> = OnceLock::new();
        BUILTIN.get_or_init(StrategyRegistry::with_builtins)
    }

    /// Add a strategy. Ids must be unique.
    pub fn register(&mut self, def: StrategyDef) -> Result<(), SignalError> {
        if self.get(&def.id).is_some() {
            return Err(SignalError::DuplicateStrategy(def.id));
        }
        self.defs.push(def);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&StrategyDef> {
        self.defs.iter().find(|d| d.id == id)
    }

    fn require(&self, id: &str) -> Result<&StrategyDef, SignalError> {
        self.get(id)
            .ok_or_else(|| SignalError::UnknownStrategy(id.to_string()))
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.defs.iter().map(|d| d.id.as_str()).collect()
    }

    pub fn defs(&self) -> &[StrategyDef] {
        &self.defs
    }

    pub fn defaults(&self, id: &str) -> Result<ParamMap, SignalError> {
        Ok(self.require(id)?.defaults())
    }

    /// Validate `params` for `id` and fill defaults.
    pub fn resolve_params(&self, id: &str, params: &ParamMap) -> Result<ParamMap, SignalError> {
        self.require(id)?.resolve(params)
    }

    pub fn build(&self, id: &str, params: &ParamMap) -> Result<Box<dyn SignalStrategy>, SignalError> {
        self.require(id)?.build(params)
    }

    /// Position targets for `bars` under strategy `id` with `params`.
    pub fn generate_signal(
        &self,
        id: &str,
        bars: &[Bar],
        params: &ParamMap,
    ) -> Result<Vec<Signal>, SignalError> {
        let strategy = self.build(id, params)?;
        if bars.is_empty() {
            return Err(SignalError::EmptyBars);
        }
        Ok(strategy.generate(bars))
    }

    /// Every declared grid combination for `id`, merged over defaults.
    pub fn param_grid(&self, id: &str) -> Result<Vec<ParamMap>, SignalError> {
        self.param_grid_with(id, &BTreeMap::new())
    }

    /// Grid combinations with some parameters' candidate lists replaced.
    ///
    /// Parameters without grid values stay at their default. Combinations
    /// the strategy rejects (e.g. `fast >= slow`) are left out. Order is the
    /// cartesian product in schema order, last parameter varying fastest.
    pub fn param_grid_with(
        &self,
        id: &str,
        overrides: &BTreeMap<String, Vec<f64>>,
    ) -> Result<Vec<ParamMap>, SignalError> {
        let def = self.require(id)?;
        if let Some(unknown) = overrides
            .keys()
            .find(|k| !def.params.iter().any(|p| &p.name == *k))
        {
            return Err(SignalError::UnknownParam {
                strategy: def.id.clone(),
                param: unknown.clone(),
            });
        }

        let mut combos = vec![def.defaults()];
        for spec in &def.params {
            let values = overrides.get(&spec.name).unwrap_or(&spec.grid);
            if values.is_empty() {
                continue;
            }
            combos = combos
                .into_iter()
                .flat_map(|base| {
                    values.iter().map(move |&v| {
                        let mut next = base.clone();
                        next.insert(spec.name.clone(), v);
                        next
                    })
                })
                .collect();
        }

        Ok(combos
            .into_iter()
            .filter(|combo| def.build(combo).is_ok())
            .collect())
    }
}

/// Position targets using the shared built-in registry.
pub fn generate_signal(id: &str, bars: &[Bar], params: &ParamMap) -> Result<Vec<Signal>, SignalError> {
    StrategyRegistry::builtin().generate_signal(id, bars, params)
}

fn builtin_table() -> Vec<(&'static str, &'static str, Vec<ParamSpec>)> {
    vec![
        (sma_cross::ID, "Fast/slow simple moving average crossover", sma_cross::schema()),
        (buy_and_hold::ID, "Always long", buy_and_hold::schema()),
        (rsi::ID, "RSI oversold/overbought thresholds", rsi::schema()),
        (macd::ID, "MACD line crossing its signal line", macd::schema()),
        (bollinger::ID, "Bollinger band mean reversion", bollinger::schema()),
        (ema_cross::ID, "Fast/slow exponential moving average crossover", ema_cross::schema()),
        (donchian::ID, "Donchian channel breakout", donchian::schema()),
        (supertrend::ID, "Supertrend ATR-band trend flip", supertrend::schema()),
        (dual_thrust::ID, "Dual Thrust range breakout", dual_thrust::schema()),
        (vwap::ID, "Rolling VWAP mean reversion with neutral zone", vwap::schema()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;
    use crate::signals::params_of;

    #[test]
    fn builtins_registered_in_order() {
        let registry = StrategyRegistry::with_builtins();
        assert_eq!(
            registry.ids(),
            vec![
                "sma_cross",
                "buy_and_hold",
                "rsi",
                "macd_cross",
                "bollinger",
                "ema_cross",
                "donchian_channel",
                "supertrend",
                "dual_thrust",
                "vwap_reversion",
            ]
        );
    }

    #[test]
    fn resolve_fills_defaults() {
        let registry = StrategyRegistry::with_builtins();
        let resolved = registry
            .resolve_params("sma_cross", &params_of(&[("fast", 5.0)]))
            .unwrap();
        assert_eq!(resolved, params_of(&[("fast", 5.0), ("slow", 30.0)]));
    }

    #[test]
    fn resolve_rejects_unknown_key() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry
            .resolve_params("sma_cross", &params_of(&[("medium", 5.0)]))
            .unwrap_err();
        assert!(matches!(err, SignalError::UnknownParam { .. }));
    }

    #[test]
    fn resolve_rejects_fractional_period() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry
            .resolve_params("rsi", &params_of(&[("period", 14.5)]))
            .unwrap_err();
        assert!(matches!(err, SignalError::NotAnInteger { .. }));
    }

    #[test]
    fn resolve_rejects_out_of_range() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry
            .resolve_params("rsi", &params_of(&[("overbought", 120.0)]))
            .unwrap_err();
        assert!(matches!(err, SignalError::OutOfRange { .. }));
        let err = registry
            .resolve_params("bollinger", &params_of(&[("std_dev", 0.0)]))
            .unwrap_err();
        assert!(matches!(err, SignalError::OutOfRange { .. }));
        let err = registry
            .resolve_params("bollinger", &params_of(&[("std_dev", f64::NAN)]))
            .unwrap_err();
        assert!(matches!(err, SignalError::OutOfRange { .. }));
    }

    #[test]
    fn huge_integer_period_is_rejected() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        let err = generate_signal("macd_cross", &bars, &params_of(&[("slow", 1e20)])).unwrap_err();
        assert!(matches!(err, SignalError::OutOfRange { ref param, .. } if param == "slow"));
    }

    #[test]
    fn largest_integer_period_generates_flat() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        let params = params_of(&[("slow", MAX_INT_PARAM), ("signal", MAX_INT_PARAM)]);
        let signal = generate_signal("macd_cross", &bars, &params).unwrap();
        assert_eq!(signal, vec![0, 0, 0]);
        let signal = generate_signal("rsi", &bars, &params_of(&[("period", MAX_INT_PARAM)])).unwrap();
        assert_eq!(signal, vec![0, 0, 0]);
    }

    #[test]
    fn build_rejects_inverted_cross() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry
            .build("ema_cross", &params_of(&[("fast", 30.0), ("slow", 10.0)]))
            .err()
            .unwrap();
        assert!(matches!(err, SignalError::Invalid(_)));
    }

    #[test]
    fn unknown_strategy() {
        let registry = StrategyRegistry::with_builtins();
        let bars = make_bars(&[1.0, 2.0]);
        let err = registry
            .generate_signal("martingale", &bars, &ParamMap::new())
            .unwrap_err();
        assert_eq!(err, SignalError::UnknownStrategy("martingale".into()));
    }

    #[test]
    fn empty_bars_rejected() {
        let err = generate_signal("buy_and_hold", &[], &ParamMap::new()).unwrap_err();
        assert_eq!(err, SignalError::EmptyBars);
    }

    #[test]
    fn sma_grid_drops_invalid_combinations() {
        let registry = StrategyRegistry::with_builtins();
        let grid = registry.param_grid("sma_cross").unwrap();
        // 4 x 4 minus (fast 20, slow 20)
        assert_eq!(grid.len(), 15);
        assert_eq!(grid[0], params_of(&[("fast", 5.0), ("slow", 20.0)]));
        assert_eq!(grid[1], params_of(&[("fast", 5.0), ("slow", 30.0)]));
        assert!(grid.iter().all(|p| p["fast"] < p["slow"]));
    }

    #[test]
    fn buy_and_hold_grid_is_single_empty_map() {
        let registry = StrategyRegistry::with_builtins();
        assert_eq!(registry.param_grid("buy_and_hold").unwrap(), vec![ParamMap::new()]);
    }

    #[test]
    fn grid_sizes_match_catalogue() {
        let registry = StrategyRegistry::with_builtins();
        let size = |id| registry.param_grid(id).unwrap().len();
        assert_eq!(size("rsi"), 12);
        assert_eq!(size("macd_cross"), 2);
        assert_eq!(size("bollinger"), 9);
        assert_eq!(size("ema_cross"), 6);
        assert_eq!(size("donchian_channel"), 3);
        assert_eq!(size("supertrend"), 9);
        assert_eq!(size("dual_thrust"), 27);
        assert_eq!(size("vwap_reversion"), 6);
    }

    #[test]
    fn grid_override_replaces_candidates() {
        let registry = StrategyRegistry::with_builtins();
        let mut overrides = BTreeMap::new();
        overrides.insert("period".to_string(), vec![5.0, 8.0]);
        let grid = registry.param_grid_with("donchian_channel", &overrides).unwrap();
        assert_eq!(grid, vec![params_of(&[("period", 5.0)]), params_of(&[("period", 8.0)])]);
    }

    #[test]
    fn custom_strategy_registration() {
        struct AlwaysShort;
        impl SignalStrategy for AlwaysShort {
            fn id(&self) -> &str {
                "always_short"
            }
            fn warmup_bars(&self) -> usize {
                0
            }
            fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
                vec![-1; bars.len()]
            }
        }

        let mut registry = StrategyRegistry::with_builtins();
        let factory: StrategyFactory =
            Arc::new(|_: &ParamMap| Ok(Box::new(AlwaysShort) as Box<dyn SignalStrategy>));
        registry
            .register(StrategyDef::new("always_short", "Always short", vec![], factory.clone()))
            .unwrap();
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        assert_eq!(
            registry.generate_signal("always_short", &bars, &ParamMap::new()).unwrap(),
            vec![-1, -1, -1]
        );

        let dup = registry.register(StrategyDef::new("always_short", "again", vec![], factory));
        assert!(matches!(dup, Err(SignalError::DuplicateStrategy(_))));
    }
}
