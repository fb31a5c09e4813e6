use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{Order, OrderCreator, Result, RiskGate, Signal};

/// Simulated risk gate for paper runs.
///
/// Approves a signal when its notional (lot size × price) stays under the
/// per-trade cap and its confidence clears the floor. No real risk
/// subsystem is ever consulted.
pub struct PaperRiskGate {
    max_notional: f64,
    min_confidence: f64,
}

impl PaperRiskGate {
    pub fn new(max_notional: f64, min_confidence: f64) -> Self {
        info!(
            max_notional = max_notional,
            min_confidence = min_confidence,
            "PaperRiskGate initialized"
        );
        Self {
            max_notional,
            min_confidence,
        }
    }
}

#[async_trait]
impl RiskGate for PaperRiskGate {
    async fn validate_signal(&self, signal: &Signal) -> bool {
        let notional = signal.lot_size * signal.price;
        if notional > self.max_notional {
            debug!(
                symbol = %signal.symbol,
                notional = notional,
                cap = self.max_notional,
                "Paper risk gate: notional over cap — rejected"
            );
            return false;
        }
        if signal.confidence < self.min_confidence {
            debug!(
                symbol = %signal.symbol,
                confidence = signal.confidence,
                floor = self.min_confidence,
                "Paper risk gate: confidence below floor — rejected"
            );
            return false;
        }
        true
    }
}

/// Simulated order creator: assigns ids and keeps an in-memory ledger.
#[derive(Default)]
pub struct PaperOrderCreator {
    orders: Arc<RwLock<Vec<Order>>>,
}

impl PaperOrderCreator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose the ledger (for inspection and shutdown reporting).
    pub fn orders_handle(&self) -> Arc<RwLock<Vec<Order>>> {
        self.orders.clone()
    }
}

#[async_trait]
impl OrderCreator for PaperOrderCreator {
    async fn create_order(&self, signal: &Signal) -> Result<Order> {
        let order = Order::from_signal(signal);
        debug!(
            symbol = %order.symbol,
            side = %order.side,
            lot_size = order.lot_size,
            price = order.price,
            "Paper order recorded"
        );
        self.orders.write().await.push(order.clone());
        Ok(order)
    }
}
