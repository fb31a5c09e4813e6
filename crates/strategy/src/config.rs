use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use common::{Error, Result};
use indicators::IndicatorParams;

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "sma_cross"
/// symbols = ["EURUSD"]
/// lot_size = 0.1
/// stop_loss_pips = 50.0
/// take_profit_pips = 100.0
/// max_positions = 2
///
/// [strategy.params]
/// fast_period = 10
/// slow_period = 30
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

impl StrategyFileConfig {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigValidation(format!("cannot read strategy config at '{path}': {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::ConfigValidation(format!("cannot parse strategy config at '{path}': {e}"))
        })
    }
}

/// Configuration supplied when a strategy instance is created. Immutable
/// for the instance's lifetime, except the indicator `params` table and
/// the confirmation period (see `StrategyInstance::update_params`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    #[serde(default = "default_id")]
    pub id: String,
    /// Strategy type identifier, e.g. "sma_cross".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Symbols this instance subscribes to, e.g. ["EURUSD", "USDJPY"].
    pub symbols: Vec<String>,
    /// Order size in lots.
    pub lot_size: f64,
    #[serde(default = "default_stop_loss_pips")]
    pub stop_loss_pips: f64,
    #[serde(default = "default_take_profit_pips")]
    pub take_profit_pips: f64,
    /// Upper bound on simultaneously open positions for this instance.
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,
    #[serde(default = "default_risk_percentage")]
    pub risk_percentage: f64,
    /// Consecutive qualifying updates required before a signal is emitted.
    #[serde(default = "default_confirmation_period")]
    pub confirmation_period: u32,
    /// Rolling window capacity per symbol.
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    /// Strategy-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

fn default_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_stop_loss_pips() -> f64 {
    50.0
}

fn default_take_profit_pips() -> f64 {
    100.0
}

fn default_max_positions() -> usize {
    1
}

fn default_risk_percentage() -> f64 {
    1.0
}

fn default_confirmation_period() -> u32 {
    1
}

fn default_window_capacity() -> usize {
    crate::PriceWindow::DEFAULT_CAPACITY
}

impl StrategyConfig {
    /// Check required fields. Creation fails with `ConfigValidation` on
    /// the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.strategy_type.is_empty() {
            return Err(Error::ConfigValidation("strategy type is required".into()));
        }
        if self.symbols.is_empty() {
            return Err(Error::ConfigValidation(
                "at least one symbol is required".into(),
            ));
        }
        if self.symbols.iter().any(|s| s.is_empty()) {
            return Err(Error::ConfigValidation("symbols must be non-empty".into()));
        }
        if !(self.lot_size > 0.0) {
            return Err(Error::ConfigValidation("lot_size must be positive".into()));
        }
        if !(self.stop_loss_pips > 0.0) || !(self.take_profit_pips > 0.0) {
            return Err(Error::ConfigValidation(
                "stop_loss_pips and take_profit_pips must be positive".into(),
            ));
        }
        if self.max_positions == 0 {
            return Err(Error::ConfigValidation(
                "max_positions must be at least 1".into(),
            ));
        }
        if self.confirmation_period == 0 {
            return Err(Error::ConfigValidation(
                "confirmation_period must be at least 1".into(),
            ));
        }
        if !(self.risk_percentage > 0.0 && self.risk_percentage <= 100.0) {
            return Err(Error::ConfigValidation(
                "risk_percentage must be within (0, 100]".into(),
            ));
        }
        Ok(())
    }

    pub fn param_f64(&self, key: &str, default: f64) -> f64 {
        self.params
            .get(key)
            .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
            .unwrap_or(default)
    }

    pub fn param_usize(&self, key: &str, default: usize) -> usize {
        self.params
            .get(key)
            .and_then(|v| v.as_integer())
            .map(|v| v as usize)
            .unwrap_or(default)
    }

    /// Periods for the wholesale indicator snapshot, overridable through
    /// the `params` table.
    pub fn indicator_params(&self) -> IndicatorParams {
        let defaults = IndicatorParams::default();
        IndicatorParams {
            sma_period: self.param_usize("sma_period", defaults.sma_period),
            ema_period: self.param_usize("ema_period", defaults.ema_period),
            rsi_period: self.param_usize("rsi_period", defaults.rsi_period),
            macd_fast: self.param_usize("macd_fast", defaults.macd_fast),
            macd_slow: self.param_usize("macd_slow", defaults.macd_slow),
            macd_signal: self.param_usize("macd_signal", defaults.macd_signal),
            bollinger_period: self.param_usize("bollinger_period", defaults.bollinger_period),
            bollinger_multiplier: self
                .param_f64("bollinger_multiplier", defaults.bollinger_multiplier),
            atr_period: self.param_usize("atr_period", defaults.atr_period),
        }
    }
}
