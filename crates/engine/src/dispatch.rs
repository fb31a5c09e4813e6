use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{info, warn};

use common::{
    Candle, EngineEvent, EngineStats, Error, OrderCreator, PerformanceSnapshot, Result,
    RiskGate, Signal,
};
use strategy::{StrategyConfig, StrategyDescriptor, StrategyFactory, StrategyInstance,
    StrategyRegistry};

/// Summary row returned by `list_active_strategies`.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveStrategyInfo {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub performance: PerformanceSnapshot,
}

/// One managed strategy instance: its worker's update queue plus shared
/// access to the instance state for lifecycle and query operations.
struct InstanceHandle {
    name: String,
    symbols: Vec<String>,
    update_tx: mpsc::Sender<(String, Candle)>,
    shared: Arc<Mutex<StrategyInstance>>,
    worker: tokio::task::JoinHandle<()>,
}

/// Owns all active strategy instances, fans incoming market updates out to
/// the subscribed subset, and relays emitted signals to the external risk
/// gate and order creator.
///
/// Each instance is driven by exactly one worker task consuming a bounded
/// queue, so no two updates for the same instance run concurrently while
/// updates to different instances proceed in parallel. The relay runs on
/// its own task: market fan-out never waits on the risk gate.
pub struct DispatchEngine {
    registry: RwLock<StrategyRegistry>,
    instances: RwLock<HashMap<String, InstanceHandle>>,
    event_tx: broadcast::Sender<EngineEvent>,
    signal_tx: mpsc::Sender<Signal>,
    stats: Arc<RwLock<EngineStats>>,
    update_queue_depth: usize,
}

impl DispatchEngine {
    /// Build the engine and spawn its signal relay task. The event channel
    /// is scoped to this engine; subscribe via `subscribe_events`.
    pub fn new(
        registry: StrategyRegistry,
        risk_gate: Arc<dyn RiskGate>,
        order_creator: Arc<dyn OrderCreator>,
        event_buffer: usize,
        update_queue_depth: usize,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));
        let (signal_tx, signal_rx) = mpsc::channel(event_buffer.max(1));
        let stats = Arc::new(RwLock::new(EngineStats::default()));

        tokio::spawn(relay_loop(
            signal_rx,
            risk_gate,
            order_creator,
            event_tx.clone(),
            stats.clone(),
        ));

        Self {
            registry: RwLock::new(registry),
            instances: RwLock::new(HashMap::new()),
            event_tx,
            signal_tx,
            stats,
            update_queue_depth: update_queue_depth.max(1),
        }
    }

    /// Subscribe to this engine's event stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Register (or observably overwrite) a strategy type.
    pub async fn register_strategy(&self, descriptor: StrategyDescriptor, factory: StrategyFactory) {
        self.registry.write().await.register(descriptor, factory);
    }

    pub async fn list_available_strategies(&self) -> Vec<StrategyDescriptor> {
        self.registry.read().await.descriptors()
    }

    /// Create an instance of `type_name` in the `Created` state and spawn
    /// its worker. Fails with `NotFound` for unknown types and
    /// `ConfigValidation` for bad configs.
    pub async fn create_strategy(
        &self,
        type_name: &str,
        mut config: StrategyConfig,
    ) -> Result<String> {
        let factory = self.registry.read().await.factory(type_name)?;
        config.strategy_type = type_name.to_string();

        let instance = StrategyInstance::new(config, factory)?;
        let id = instance.id().to_string();
        let name = instance.name().to_string();
        let symbols = instance.symbols().to_vec();

        let mut instances = self.instances.write().await;
        if instances.contains_key(&id) {
            return Err(Error::ConfigValidation(format!(
                "instance id '{id}' already exists"
            )));
        }

        let shared = Arc::new(Mutex::new(instance));
        let (update_tx, update_rx) = mpsc::channel(self.update_queue_depth);
        let worker = tokio::spawn(instance_worker(
            id.clone(),
            shared.clone(),
            update_rx,
            self.signal_tx.clone(),
            self.event_tx.clone(),
        ));

        instances.insert(
            id.clone(),
            InstanceHandle {
                name: name.clone(),
                symbols,
                update_tx,
                shared,
                worker,
            },
        );
        info!(id = %id, strategy = %name, "Strategy instance created");
        Ok(id)
    }

    /// Activate an instance. Takes effect for all subsequently dispatched
    /// updates.
    pub async fn start(&self, id: &str) -> Result<()> {
        let instances = self.instances.read().await;
        let handle = instances
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("strategy instance '{id}'")))?;
        let changed = handle.shared.lock().await.start();
        if changed {
            let _ = self.event_tx.send(EngineEvent::StrategyStarted {
                id: id.to_string(),
                name: handle.name.clone(),
            });
        }
        Ok(())
    }

    /// Stop an instance. Idempotent; an update already in flight may
    /// finish, but nothing is processed after this returns.
    pub async fn stop(&self, id: &str) -> Result<()> {
        let instances = self.instances.read().await;
        let handle = instances
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("strategy instance '{id}'")))?;
        let changed = handle.shared.lock().await.stop();
        if changed {
            let _ = self.event_tx.send(EngineEvent::StrategyStopped {
                id: id.to_string(),
                name: handle.name.clone(),
            });
        }
        Ok(())
    }

    /// Stop and drop an instance, ending its worker task.
    pub async fn remove_strategy(&self, id: &str) -> Result<()> {
        let handle = self
            .instances
            .write()
            .await
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("strategy instance '{id}'")))?;
        let changed = handle.shared.lock().await.stop();
        if changed {
            let _ = self.event_tx.send(EngineEvent::StrategyStopped {
                id: id.to_string(),
                name: handle.name.clone(),
            });
        }
        // Dropping the queue sender ends the worker loop after the update
        // in flight, if any.
        drop(handle.update_tx);
        drop(handle.worker);
        info!(id = %id, "Strategy instance removed");
        Ok(())
    }

    /// Fan one market update out to every instance subscribed to `symbol`.
    ///
    /// A full instance queue drops the update with a warning instead of
    /// blocking the feed.
    pub async fn on_market_update(&self, symbol: &str, candle: Candle) {
        let instances = self.instances.read().await;
        for (id, handle) in instances.iter() {
            if !handle.symbols.iter().any(|s| s == symbol) {
                continue;
            }
            match handle.update_tx.try_send((symbol.to_string(), candle.clone())) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(id = %id, symbol = symbol, "Instance update queue full — dropped market update");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(id = %id, "Instance worker gone — dropped market update");
                }
            }
        }
    }

    /// External trade-close notification: updates the instance's
    /// performance counters and the engine aggregates.
    pub async fn on_trade_closed(&self, id: &str, pnl: f64) -> Result<()> {
        let instances = self.instances.read().await;
        let handle = instances
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("strategy instance '{id}'")))?;
        handle.shared.lock().await.record_trade_close(pnl);

        let mut stats = self.stats.write().await;
        stats.total_pnl += pnl;
        stats.total_positions = stats.total_positions.saturating_sub(1);
        if pnl >= 0.0 {
            stats.wins += 1;
        } else {
            stats.losses += 1;
        }
        Ok(())
    }

    /// In-place parameter update. Only the indicator `params` table and
    /// the confirmation period support this; other fields require
    /// stop + recreate.
    pub async fn update_strategy_params(
        &self,
        id: &str,
        params: HashMap<String, toml::Value>,
        confirmation_period: Option<u32>,
    ) -> Result<()> {
        let instances = self.instances.read().await;
        let handle = instances
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("strategy instance '{id}'")))?;
        let result = handle
            .shared
            .lock()
            .await
            .update_params(params, confirmation_period);
        result
    }

    pub async fn get_performance(&self, id: &str) -> Result<PerformanceSnapshot> {
        let instances = self.instances.read().await;
        let handle = instances
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("strategy instance '{id}'")))?;
        let perf = handle.shared.lock().await.performance();
        Ok(perf)
    }

    pub async fn overall_performance(&self) -> EngineStats {
        *self.stats.read().await
    }

    pub async fn list_active_strategies(&self) -> Vec<ActiveStrategyInfo> {
        let instances = self.instances.read().await;
        let mut list = Vec::with_capacity(instances.len());
        for (id, handle) in instances.iter() {
            let inst = handle.shared.lock().await;
            list.push(ActiveStrategyInfo {
                id: id.clone(),
                name: handle.name.clone(),
                is_active: inst.is_active(),
                performance: inst.performance(),
            });
        }
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }
}

/// Per-instance worker: serializes updates for one instance and converts
/// rule faults into error events without stopping the loop.
async fn instance_worker(
    id: String,
    shared: Arc<Mutex<StrategyInstance>>,
    mut update_rx: mpsc::Receiver<(String, Candle)>,
    signal_tx: mpsc::Sender<Signal>,
    event_tx: broadcast::Sender<EngineEvent>,
) {
    while let Some((symbol, candle)) = update_rx.recv().await {
        let outcome = shared.lock().await.on_market_update(&symbol, candle);
        match outcome {
            Ok(Some(signal)) => {
                if signal_tx.send(signal).await.is_err() {
                    warn!(id = %id, "Signal relay closed — stopping instance worker");
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(id = %id, error = %e, "Instance fault while processing update");
                let _ = event_tx.send(EngineEvent::Error {
                    strategy_id: id.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Signal relay: counts signals, consults the risk gate, and constructs an
/// order only on approval. Rejections are logged, never errors.
async fn relay_loop(
    mut signal_rx: mpsc::Receiver<Signal>,
    risk_gate: Arc<dyn RiskGate>,
    order_creator: Arc<dyn OrderCreator>,
    event_tx: broadcast::Sender<EngineEvent>,
    stats: Arc<RwLock<EngineStats>>,
) {
    while let Some(signal) = signal_rx.recv().await {
        stats.write().await.total_signals += 1;
        let _ = event_tx.send(EngineEvent::Signal(signal.clone()));

        if !risk_gate.validate_signal(&signal).await {
            info!(
                strategy_id = %signal.strategy_id,
                symbol = %signal.symbol,
                kind = %signal.kind,
                "Signal rejected by risk gate"
            );
            continue;
        }

        match order_creator.create_order(&signal).await {
            Ok(order) => {
                info!(
                    symbol = %order.symbol,
                    side = %order.side,
                    lot_size = order.lot_size,
                    "Order created"
                );
                let mut s = stats.write().await;
                s.total_orders += 1;
                s.total_positions += 1;
                drop(s);
                let _ = event_tx.send(EngineEvent::Order(order));
            }
            Err(e) => {
                warn!(strategy_id = %signal.strategy_id, error = %e, "Order creation failed");
                let _ = event_tx.send(EngineEvent::Error {
                    strategy_id: signal.strategy_id.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
    warn!("Signal relay channel closed");
}
