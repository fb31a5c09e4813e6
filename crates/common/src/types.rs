use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One finalized OHLCV bar pushed by the market data feed.
/// Candles are immutable once appended to a price window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Direction of a trading signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
    Neutral,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
            SignalKind::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Confirmed, confidence-scored trading signal emitted by a strategy
/// instance. Immutable after creation; one per confirmed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub kind: SignalKind,
    pub symbol: String,
    /// Close price of the candle that confirmed the signal.
    pub price: f64,
    pub lot_size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Always within [0.1, 0.95].
    pub confidence: f64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub strategy_id: String,
}

/// An order built from a risk-approved signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: SignalKind,
    pub lot_size: f64,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    pub fn from_signal(signal: &Signal) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: signal.symbol.clone(),
            side: signal.kind,
            lot_size: signal.lot_size,
            price: signal.price,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle state of a strategy instance.
///
/// `Created` instances ignore market updates. `Stopped` is re-enterable:
/// `start()` returns to `Active` without clearing accumulated windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    #[default]
    Created,
    Active,
    Stopped,
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceState::Created => write!(f, "created"),
            InstanceState::Active => write!(f, "active"),
            InstanceState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Per-instance trade outcome counters. Updated only when an external
/// trade-close notification arrives, never by signal emission.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub total_pnl: f64,
}

impl PerformanceSnapshot {
    pub fn record_close(&mut self, pnl: f64) {
        self.total_trades += 1;
        if pnl >= 0.0 {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.total_pnl += pnl;
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.total_trades as f64
        }
    }
}

/// Events published on the engine's broadcast channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Signal(Signal),
    Order(Order),
    StrategyStarted { id: String, name: String },
    StrategyStopped { id: String, name: String },
    Error { strategy_id: String, message: String },
}

/// Engine-wide aggregates across all instances. Written exclusively by
/// the dispatch engine.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EngineStats {
    pub total_signals: u64,
    pub total_orders: u64,
    /// Positions currently open: orders created minus reported closes.
    pub total_positions: u64,
    pub total_pnl: f64,
    pub wins: u64,
    pub losses: u64,
}

impl EngineStats {
    pub fn win_rate(&self) -> f64 {
        let closed = self.wins + self.losses;
        if closed == 0 {
            0.0
        } else {
            self.wins as f64 / closed as f64
        }
    }
}
