use std::collections::HashMap;

use tracing::{debug, info};

use common::{Candle, Error, InstanceState, PerformanceSnapshot, Result, Signal, SignalKind};
use indicators::{IndicatorParams, IndicatorSnapshot};

use crate::config::StrategyConfig;
use crate::registry::StrategyFactory;
use crate::window::PriceWindow;

/// One active strategy configuration: owns a rolling price window, an
/// indicator snapshot, a signal rule and confirmation state per subscribed
/// symbol, plus the instance-wide position gate and performance counters.
///
/// Confirmation counters and last-signal kind are scoped per symbol so a
/// multi-symbol instance never leaks debounce state across symbols. A
/// streak only counts consecutive events of the same direction; a flip
/// restarts it.
pub struct StrategyInstance {
    config: StrategyConfig,
    factory: StrategyFactory,
    state: InstanceState,
    indicator_params: IndicatorParams,
    windows: HashMap<String, PriceWindow>,
    snapshots: HashMap<String, IndicatorSnapshot>,
    rules: HashMap<String, Box<dyn crate::SignalRule>>,
    confirmations: HashMap<String, (SignalKind, u32)>,
    last_signal: HashMap<String, SignalKind>,
    open_positions: usize,
    performance: PerformanceSnapshot,
}

impl StrategyInstance {
    /// Build an instance in the `Created` state. The factory is invoked
    /// once per subscribed symbol so every symbol gets its own rule state.
    pub fn new(config: StrategyConfig, factory: StrategyFactory) -> Result<Self> {
        config.validate()?;

        let indicator_params = config.indicator_params();
        let mut windows = HashMap::new();
        let mut rules: HashMap<String, Box<dyn crate::SignalRule>> = HashMap::new();
        for symbol in &config.symbols {
            windows.insert(symbol.clone(), PriceWindow::new(config.window_capacity));
            rules.insert(symbol.clone(), factory(&config)?);
        }

        Ok(Self {
            config,
            factory,
            state: InstanceState::Created,
            indicator_params,
            windows,
            snapshots: HashMap::new(),
            rules,
            confirmations: HashMap::new(),
            last_signal: HashMap::new(),
            open_positions: 0,
            performance: PerformanceSnapshot::default(),
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.strategy_type
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == InstanceState::Active
    }

    pub fn symbols(&self) -> &[String] {
        &self.config.symbols
    }

    pub fn is_subscribed(&self, symbol: &str) -> bool {
        self.config.symbols.iter().any(|s| s == symbol)
    }

    pub fn open_positions(&self) -> usize {
        self.open_positions
    }

    pub fn performance(&self) -> PerformanceSnapshot {
        self.performance
    }

    pub fn last_signal(&self, symbol: &str) -> Option<SignalKind> {
        self.last_signal.get(symbol).copied()
    }

    /// Latest indicator readings for `symbol`, if any update has been
    /// processed for it. Mainly for diagnostics.
    pub fn indicator_snapshot(&self, symbol: &str) -> Option<&IndicatorSnapshot> {
        self.snapshots.get(symbol)
    }

    /// Enter `Active`. Restarting a stopped instance keeps its accumulated
    /// windows; call `reset()` first to discard them. Returns whether the
    /// state actually changed.
    pub fn start(&mut self) -> bool {
        if self.state == InstanceState::Active {
            return false;
        }
        self.state = InstanceState::Active;
        info!(id = %self.config.id, strategy = %self.config.strategy_type, "Strategy started");
        true
    }

    /// Enter `Stopped`. Idempotent: stopping a stopped instance is a
    /// no-op. Returns whether the state actually changed.
    pub fn stop(&mut self) -> bool {
        if self.state == InstanceState::Stopped {
            return false;
        }
        self.state = InstanceState::Stopped;
        info!(id = %self.config.id, strategy = %self.config.strategy_type, "Strategy stopped");
        true
    }

    /// Discard accumulated windows, snapshots, and confirmation state, and
    /// rebuild rule state per symbol. Lifecycle state is unchanged.
    pub fn reset(&mut self) -> Result<()> {
        for window in self.windows.values_mut() {
            *window = PriceWindow::new(self.config.window_capacity);
        }
        self.snapshots.clear();
        self.confirmations.clear();
        self.last_signal.clear();
        for symbol in self.config.symbols.clone() {
            self.rules.insert(symbol, (self.factory)(&self.config)?);
        }
        Ok(())
    }

    /// Replace the indicator `params` table (and optionally the
    /// confirmation period) in place. Rules are rebuilt; windows are kept.
    /// All other config fields require stop + recreate.
    pub fn update_params(
        &mut self,
        params: HashMap<String, toml::Value>,
        confirmation_period: Option<u32>,
    ) -> Result<()> {
        if let Some(period) = confirmation_period {
            if period == 0 {
                return Err(Error::ConfigValidation(
                    "confirmation_period must be at least 1".into(),
                ));
            }
            self.config.confirmation_period = period;
        }
        self.config.params.extend(params);
        self.indicator_params = self.config.indicator_params();
        for symbol in self.config.symbols.clone() {
            self.rules.insert(symbol, (self.factory)(&self.config)?);
        }
        self.confirmations.clear();
        Ok(())
    }

    /// External trade-close notification: updates performance counters and
    /// releases a position slot. Never triggered by signal emission.
    pub fn record_trade_close(&mut self, pnl: f64) {
        self.performance.record_close(pnl);
        self.open_positions = self.open_positions.saturating_sub(1);
        debug!(
            id = %self.config.id,
            pnl = pnl,
            open_positions = self.open_positions,
            "Trade close recorded"
        );
    }

    /// Process one market update for `symbol`.
    ///
    /// Updates for unsubscribed symbols, or while not `Active`, are ignored
    /// without touching any window. Insufficient indicator data is a silent
    /// early return; a rule failure surfaces as `InstanceFault`.
    pub fn on_market_update(&mut self, symbol: &str, candle: Candle) -> Result<Option<Signal>> {
        if self.state != InstanceState::Active || !self.is_subscribed(symbol) {
            return Ok(None);
        }

        let Some(window) = self.windows.get_mut(symbol) else {
            return Ok(None);
        };
        window.push(candle);

        let snapshot = IndicatorSnapshot::compute(
            &window.closes(),
            &window.highs(),
            &window.lows(),
            &self.indicator_params,
        );

        let evaluated = {
            let window = self.windows.get(symbol).expect("window exists");
            let rule = self.rules.get_mut(symbol).expect("rule exists");
            rule.evaluate(window, &snapshot)
        };
        self.snapshots.insert(symbol.to_string(), snapshot);

        let intent = match evaluated {
            Ok(intent) => intent,
            Err(e) => {
                return Err(Error::InstanceFault {
                    strategy_id: self.config.id.clone(),
                    message: e.to_string(),
                })
            }
        };

        let Some(intent) = intent else {
            // Non-qualifying update: confirmation never carries over
            // across unrelated events.
            self.confirmations.remove(symbol);
            return Ok(None);
        };

        // A direction flip starts a new streak; mixed-direction events
        // must never confirm each other.
        let count = match self.confirmations.get_mut(symbol) {
            Some((kind, count)) if *kind == intent.kind => {
                *count += 1;
                *count
            }
            _ => {
                self.confirmations.insert(symbol.to_string(), (intent.kind, 1));
                1
            }
        };
        if count < self.config.confirmation_period {
            debug!(
                id = %self.config.id,
                symbol = symbol,
                kind = %intent.kind,
                count = count,
                needed = self.config.confirmation_period,
                "Qualifying event awaiting confirmation"
            );
            return Ok(None);
        }
        self.confirmations.remove(symbol);

        if self.open_positions >= self.config.max_positions {
            info!(
                id = %self.config.id,
                symbol = symbol,
                max_positions = self.config.max_positions,
                "Signal suppressed — position limit reached"
            );
            return Ok(None);
        }

        let last = self.windows.get(symbol).and_then(|w| w.last());
        let Some(last) = last else {
            return Ok(None);
        };
        let price = last.close;
        let timestamp = last.timestamp;
        let (stop_loss, take_profit) = stop_take_prices(
            price,
            intent.kind,
            self.config.stop_loss_pips,
            self.config.take_profit_pips,
        );

        let signal = Signal {
            id: uuid::Uuid::new_v4().to_string(),
            kind: intent.kind,
            symbol: symbol.to_string(),
            price,
            lot_size: self.config.lot_size,
            stop_loss,
            take_profit,
            confidence: crate::clamp_confidence(intent.confidence),
            reason: intent.reason,
            timestamp,
            strategy_id: self.config.id.clone(),
        };

        // Reserve the position slot at emission; a trade-close
        // notification releases it.
        self.open_positions += 1;
        self.last_signal.insert(symbol.to_string(), intent.kind);
        info!(
            id = %self.config.id,
            symbol = symbol,
            kind = %signal.kind,
            price = signal.price,
            confidence = signal.confidence,
            "Signal emitted"
        );
        Ok(Some(signal))
    }
}

/// Pip size by quote convention: 0.01 for prices quoted at 100 or above
/// (JPY-style pairs), 0.0001 otherwise.
fn pip_size(price: f64) -> f64 {
    if price >= 100.0 {
        0.01
    } else {
        0.0001
    }
}

fn stop_take_prices(entry: f64, kind: SignalKind, sl_pips: f64, tp_pips: f64) -> (f64, f64) {
    let pip = pip_size(entry);
    match kind {
        SignalKind::Buy => (entry - sl_pips * pip, entry + tp_pips * pip),
        SignalKind::Sell => (entry + sl_pips * pip, entry - tp_pips * pip),
        SignalKind::Neutral => (entry, entry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use common::SignalKind;
    use indicators::IndicatorSnapshot;

    use crate::rules::SmaCross;
    use crate::{Intent, SignalRule};

    fn candle(close: f64) -> Candle {
        Candle {
            timestamp: Utc::now(),
            open: close,
            high: close + 0.0005,
            low: close - 0.0005,
            close,
            volume: 100.0,
        }
    }

    fn config(confirmation_period: u32, max_positions: usize) -> StrategyConfig {
        StrategyConfig {
            id: "inst-1".into(),
            strategy_type: "test".into(),
            symbols: vec!["EURUSD".into()],
            lot_size: 0.1,
            stop_loss_pips: 50.0,
            take_profit_pips: 100.0,
            max_positions,
            risk_percentage: 1.0,
            confirmation_period,
            window_capacity: 1000,
            params: Default::default(),
        }
    }

    /// Test rule: qualifies whenever the latest close is above a level.
    struct AboveLevel {
        level: f64,
    }

    impl SignalRule for AboveLevel {
        fn evaluate(
            &mut self,
            window: &PriceWindow,
            _snapshot: &IndicatorSnapshot,
        ) -> common::Result<Option<Intent>> {
            let Some(last) = window.last() else {
                return Ok(None);
            };
            if last.close > self.level {
                Ok(Some(Intent {
                    kind: SignalKind::Buy,
                    confidence: 0.6,
                    reason: "above level".into(),
                }))
            } else {
                Ok(None)
            }
        }
    }

    fn above_level_factory(level: f64) -> StrategyFactory {
        Arc::new(move |_cfg| Ok(Box::new(AboveLevel { level }) as Box<dyn SignalRule>))
    }

    /// Test rule: replays a fixed sequence of intent directions.
    struct Scripted {
        intents: std::collections::VecDeque<Option<SignalKind>>,
    }

    impl SignalRule for Scripted {
        fn evaluate(
            &mut self,
            _window: &PriceWindow,
            _snapshot: &IndicatorSnapshot,
        ) -> common::Result<Option<Intent>> {
            Ok(self.intents.pop_front().flatten().map(|kind| Intent {
                kind,
                confidence: 0.6,
                reason: "scripted".into(),
            }))
        }
    }

    fn scripted_factory(seq: Vec<Option<SignalKind>>) -> StrategyFactory {
        Arc::new(move |_cfg| {
            Ok(Box::new(Scripted {
                intents: seq.clone().into(),
            }) as Box<dyn SignalRule>)
        })
    }

    #[test]
    fn created_and_stopped_instances_ignore_updates() {
        let mut inst = StrategyInstance::new(config(1, 1), above_level_factory(0.0)).unwrap();

        // Created: no mutation, no signal.
        assert!(inst.on_market_update("EURUSD", candle(1.2)).unwrap().is_none());
        assert_eq!(inst.windows["EURUSD"].len(), 0);

        inst.start();
        inst.stop();
        assert!(inst.on_market_update("EURUSD", candle(1.2)).unwrap().is_none());
        assert_eq!(inst.windows["EURUSD"].len(), 0);

        // Restart resumes processing on previously accumulated (empty) state.
        inst.start();
        assert!(inst.on_market_update("EURUSD", candle(1.2)).unwrap().is_some());
        assert_eq!(inst.windows["EURUSD"].len(), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut inst = StrategyInstance::new(config(1, 1), above_level_factory(0.0)).unwrap();
        inst.start();
        assert!(inst.stop());
        assert!(!inst.stop()); // observable only as a no-op
        assert_eq!(inst.state(), InstanceState::Stopped);
    }

    #[test]
    fn unsubscribed_symbols_are_ignored() {
        let mut inst = StrategyInstance::new(config(1, 1), above_level_factory(0.0)).unwrap();
        inst.start();
        assert!(inst.on_market_update("GBPUSD", candle(1.2)).unwrap().is_none());
        assert!(inst.windows.get("GBPUSD").is_none());
    }

    #[test]
    fn confirmation_period_requires_n_consecutive_events() {
        let mut inst = StrategyInstance::new(config(3, 10), above_level_factory(1.0)).unwrap();
        inst.start();

        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_none());
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_none());
        let third = inst.on_market_update("EURUSD", candle(1.5)).unwrap();
        assert!(third.is_some(), "third consecutive qualifying event must emit");

        // Counter was reset by emission: two more qualifying bars stay silent.
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_none());
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_none());
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_some());
    }

    #[test]
    fn non_qualifying_update_resets_confirmation() {
        let mut inst = StrategyInstance::new(config(3, 10), above_level_factory(1.0)).unwrap();
        inst.start();

        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_none());
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_none());
        // One non-qualifying bar wipes the streak.
        assert!(inst.on_market_update("EURUSD", candle(0.5)).unwrap().is_none());
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_none());
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_none());
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_some());
    }

    #[test]
    fn direction_flip_restarts_the_confirmation_streak() {
        use SignalKind::{Buy, Sell};
        let seq = vec![Some(Buy), Some(Buy), Some(Sell), Some(Sell), Some(Sell)];
        let mut inst = StrategyInstance::new(config(3, 10), scripted_factory(seq)).unwrap();
        inst.start();

        assert!(inst.on_market_update("EURUSD", candle(1.2)).unwrap().is_none());
        assert!(inst.on_market_update("EURUSD", candle(1.2)).unwrap().is_none());
        // Two Buys then a Sell: the flip must start a new streak, not
        // complete the Buy one.
        assert!(inst.on_market_update("EURUSD", candle(1.2)).unwrap().is_none());
        assert!(inst.on_market_update("EURUSD", candle(1.2)).unwrap().is_none());
        let third_sell = inst.on_market_update("EURUSD", candle(1.2)).unwrap();
        assert_eq!(
            third_sell.map(|s| s.kind),
            Some(Sell),
            "three consecutive Sells must emit"
        );
    }

    #[test]
    fn snapshots_are_queryable_per_symbol() {
        let mut inst = StrategyInstance::new(config(1, 10), above_level_factory(0.0)).unwrap();
        inst.start();
        assert!(inst.indicator_snapshot("EURUSD").is_none());

        inst.on_market_update("EURUSD", candle(1.2)).unwrap();
        let snap = inst
            .indicator_snapshot("EURUSD")
            .expect("snapshot stored after an update");
        // One bar is below every default period.
        assert!(snap.sma.is_none());
        assert!(inst.indicator_snapshot("GBPUSD").is_none());
    }

    #[test]
    fn max_positions_gates_emission_until_a_close() {
        let mut inst = StrategyInstance::new(config(1, 2), above_level_factory(1.0)).unwrap();
        inst.start();

        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_some());
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_some());
        assert_eq!(inst.open_positions(), 2);

        // At the limit: indicator state is irrelevant, nothing is emitted.
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_none());

        inst.record_trade_close(12.5);
        assert_eq!(inst.open_positions(), 1);
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_some());

        let perf = inst.performance();
        assert_eq!(perf.total_trades, 1);
        assert_eq!(perf.wins, 1);
        assert!((perf.total_pnl - 12.5).abs() < 1e-12);
    }

    #[test]
    fn stop_take_prices_follow_pip_convention() {
        // Standard quote: pips/10000.
        let (sl, tp) = stop_take_prices(1.2000, SignalKind::Buy, 50.0, 100.0);
        assert!((sl - 1.1950).abs() < 1e-9);
        assert!((tp - 1.2100).abs() < 1e-9);

        // JPY-style quote at or above 100: pips/100.
        let (sl, tp) = stop_take_prices(150.00, SignalKind::Sell, 50.0, 100.0);
        assert!((sl - 150.50).abs() < 1e-9);
        assert!((tp - 149.00).abs() < 1e-9);
    }

    #[test]
    fn sma_crossover_end_to_end_exactly_one_buy() {
        let mut cfg = config(1, 10);
        cfg.params.insert("fast_period".into(), toml::Value::Integer(10));
        cfg.params.insert("slow_period".into(), toml::Value::Integer(30));
        let factory: StrategyFactory = Arc::new(|cfg| {
            Ok(Box::new(SmaCross::from_config(cfg)?) as Box<dyn SignalRule>)
        });
        let mut inst = StrategyInstance::new(cfg, factory).unwrap();
        inst.start();

        // Flat series long enough to seed the slow average, then a
        // monotonic rise across it.
        let mut closes = vec![1.1000; 35];
        closes.extend((1..=30).map(|i| 1.1000 + i as f64 * 0.0010));

        let mut signals = Vec::new();
        for &c in &closes {
            if let Some(s) = inst.on_market_update("EURUSD", candle(c)).unwrap() {
                signals.push((s, c));
            }
        }

        assert_eq!(signals.len(), 1, "expected exactly one signal at the crossover");
        let (signal, crossover_close) = &signals[0];
        assert_eq!(signal.kind, SignalKind::Buy);
        assert!((signal.price - crossover_close).abs() < 1e-12);
        assert!((0.1..=0.95).contains(&signal.confidence));
    }

    #[test]
    fn rule_failure_becomes_instance_fault() {
        struct FailingRule;
        impl SignalRule for FailingRule {
            fn evaluate(
                &mut self,
                _window: &PriceWindow,
                _snapshot: &IndicatorSnapshot,
            ) -> common::Result<Option<Intent>> {
                Err(Error::Other("boom".into()))
            }
        }
        let factory: StrategyFactory =
            Arc::new(|_| Ok(Box::new(FailingRule) as Box<dyn SignalRule>));
        let mut inst = StrategyInstance::new(config(1, 1), factory).unwrap();
        inst.start();

        let err = inst.on_market_update("EURUSD", candle(1.2)).unwrap_err();
        assert!(matches!(err, Error::InstanceFault { .. }));
    }

    #[test]
    fn update_params_rebuilds_rules_and_keeps_windows() {
        let mut inst = StrategyInstance::new(config(1, 10), above_level_factory(1.0)).unwrap();
        inst.start();
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_some());
        assert_eq!(inst.windows["EURUSD"].len(), 1);

        let mut params = HashMap::new();
        params.insert("rsi_period".into(), toml::Value::Integer(7));
        inst.update_params(params, Some(2)).unwrap();

        assert_eq!(inst.windows["EURUSD"].len(), 1, "windows survive param updates");
        // New confirmation period applies from scratch.
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_none());
        assert!(inst.on_market_update("EURUSD", candle(1.5)).unwrap().is_some());
    }

    #[test]
    fn reset_clears_accumulated_state() {
        let mut inst = StrategyInstance::new(config(1, 10), above_level_factory(1.0)).unwrap();
        inst.start();
        inst.on_market_update("EURUSD", candle(1.5)).unwrap();
        assert_eq!(inst.windows["EURUSD"].len(), 1);

        inst.reset().unwrap();
        assert_eq!(inst.windows["EURUSD"].len(), 0);
        assert!(inst.last_signal("EURUSD").is_none());
    }
}
