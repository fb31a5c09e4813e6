use async_trait::async_trait;

use crate::{Order, Result, Signal};

/// External risk-management collaborator.
///
/// The dispatch engine forwards every emitted signal here before any order
/// is constructed. A `false` result means "do not create an order" and is
/// only logged. The engine never waits on this call while dispatching
/// market updates; relay happens on its own task.
#[async_trait]
pub trait RiskGate: Send + Sync {
    async fn validate_signal(&self, signal: &Signal) -> bool;
}

/// External order-creation collaborator. Called only after the risk gate
/// approves the signal.
#[async_trait]
pub trait OrderCreator: Send + Sync {
    async fn create_order(&self, signal: &Signal) -> Result<Order>;
}
