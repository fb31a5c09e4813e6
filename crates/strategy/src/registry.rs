use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use common::{Error, Result};

use crate::config::StrategyConfig;
use crate::rules::{BollingerBreakout, MacdCross, RsiDivergence, SmaCross};
use crate::SignalRule;

/// Builds one rule (per-symbol state) from a validated config. Invoked
/// once per subscribed symbol at instance creation.
pub type StrategyFactory =
    Arc<dyn Fn(&StrategyConfig) -> Result<Box<dyn SignalRule>> + Send + Sync>;

/// What a strategy type looks like to callers of
/// `list_available_strategies`.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<String>,
    pub category: String,
}

/// Maps strategy type name → descriptor + factory. Independent of any
/// running instance.
pub struct StrategyRegistry {
    entries: HashMap<String, (StrategyDescriptor, StrategyFactory)>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in strategy kinds.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register(
            StrategyDescriptor {
                name: "sma_cross".into(),
                description: "Fast/slow simple moving average crossover".into(),
                parameters: vec!["fast_period".into(), "slow_period".into()],
                category: "trend".into(),
            },
            Arc::new(|cfg| Ok(Box::new(SmaCross::from_config(cfg)?) as Box<dyn SignalRule>)),
        );

        registry.register(
            StrategyDescriptor {
                name: "rsi_divergence".into(),
                description: "Price/RSI divergence in the oversold and overbought zones".into(),
                parameters: vec![
                    "rsi_period".into(),
                    "divergence_lookback".into(),
                    "oversold".into(),
                    "overbought".into(),
                ],
                category: "oscillator".into(),
            },
            Arc::new(|cfg| Ok(Box::new(RsiDivergence::from_config(cfg)?) as Box<dyn SignalRule>)),
        );

        registry.register(
            StrategyDescriptor {
                name: "macd_cross".into(),
                description: "MACD line vs signal line crossover".into(),
                parameters: vec![
                    "macd_fast".into(),
                    "macd_slow".into(),
                    "macd_signal".into(),
                ],
                category: "momentum".into(),
            },
            Arc::new(|cfg| Ok(Box::new(MacdCross::from_config(cfg)?) as Box<dyn SignalRule>)),
        );

        registry.register(
            StrategyDescriptor {
                name: "bollinger_breakout".into(),
                description: "Bollinger band breakout with volume confirmation".into(),
                parameters: vec![
                    "bollinger_period".into(),
                    "bollinger_multiplier".into(),
                    "volume_ratio".into(),
                    "volume_period".into(),
                ],
                category: "volatility".into(),
            },
            Arc::new(|cfg| {
                Ok(Box::new(BollingerBreakout::from_config(cfg)?) as Box<dyn SignalRule>)
            }),
        );

        registry
    }

    /// Register a strategy type. Overwriting an existing name is allowed
    /// but logged so it never happens silently.
    pub fn register(&mut self, descriptor: StrategyDescriptor, factory: StrategyFactory) {
        let name = descriptor.name.clone();
        if self.entries.contains_key(&name) {
            warn!(name = %name, "Overwriting previously registered strategy type");
        } else {
            info!(name = %name, category = %descriptor.category, "Registered strategy type");
        }
        self.entries.insert(name, (descriptor, factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn factory(&self, name: &str) -> Result<StrategyFactory> {
        self.entries
            .get(name)
            .map(|(_, factory)| factory.clone())
            .ok_or_else(|| Error::NotFound(format!("strategy type '{name}'")))
    }

    pub fn descriptors(&self) -> Vec<StrategyDescriptor> {
        let mut list: Vec<StrategyDescriptor> =
            self.entries.values().map(|(d, _)| d.clone()).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
