use std::sync::Arc;

use chrono::Utc;
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Candle, Config};
use engine::DispatchEngine;
use paper::{PaperOrderCreator, PaperRiskGate};
use strategy::{StrategyFileConfig, StrategyRegistry};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(config = %cfg.strategy_config_path, "SigBot starting");

    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)
        .unwrap_or_else(|e| panic!("Failed to load strategy config: {e}"));

    // ── Engine with paper collaborators ───────────────────────────────────────
    let risk_gate = Arc::new(PaperRiskGate::new(10_000.0, 0.2));
    let order_creator = Arc::new(PaperOrderCreator::new());
    let engine = Arc::new(DispatchEngine::new(
        StrategyRegistry::builtin(),
        risk_gate,
        order_creator,
        cfg.event_buffer,
        cfg.update_queue_depth,
    ));

    // ── Event stream logger ───────────────────────────────────────────────────
    let mut events = engine.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let payload = serde_json::to_string(&event).unwrap_or_default();
                    info!(event = %payload, "Engine event");
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(dropped = n, "Event logger lagged — dropped engine events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    });

    // ── Create and start configured strategies ────────────────────────────────
    let mut symbols: Vec<String> = Vec::new();
    for strategy_cfg in strategy_file.strategies {
        for symbol in &strategy_cfg.symbols {
            if !symbols.contains(symbol) {
                symbols.push(symbol.clone());
            }
        }
        let type_name = strategy_cfg.strategy_type.clone();
        let id = engine
            .create_strategy(&type_name, strategy_cfg)
            .await
            .unwrap_or_else(|e| panic!("Failed to create strategy '{type_name}': {e}"));
        engine
            .start(&id)
            .await
            .unwrap_or_else(|e| panic!("Failed to start strategy '{id}': {e}"));
    }

    // ── Synthetic market feed, one task per symbol ────────────────────────────
    for symbol in symbols {
        let engine = engine.clone();
        let interval = cfg.feed_interval_ms;
        tokio::spawn(async move {
            let mut walk = RandomWalk::seeded_from(&symbol);
            let mut ticker = tokio::time::interval(Duration::from_millis(interval));
            loop {
                ticker.tick().await;
                let candle = walk.next_candle();
                engine.on_market_update(&symbol, candle).await;
            }
        });
    }

    // Keep main alive
    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await.unwrap();
    info!("Shutdown signal received. Exiting.");
}

/// Deterministic per-symbol random-walk candle generator. Stands in for
/// the external market data feed during paper runs.
struct RandomWalk {
    state: u64,
    price: f64,
}

impl RandomWalk {
    fn seeded_from(symbol: &str) -> Self {
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        for b in symbol.bytes() {
            state = state.wrapping_mul(31).wrapping_add(b as u64);
        }
        Self {
            state: state.max(1),
            price: 1.0 + (state % 1000) as f64 / 1000.0,
        }
    }

    fn next_unit(&mut self) -> f64 {
        // xorshift64
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }

    fn next_candle(&mut self) -> Candle {
        let open = self.price;
        let drift = (self.next_unit() - 0.5) * 0.004;
        let close = (open * (1.0 + drift)).max(0.0001);
        let span = open.max(close) * 0.0005;
        self.price = close;
        Candle {
            timestamp: Utc::now(),
            open,
            high: open.max(close) + span,
            low: open.min(close) - span,
            close,
            volume: 50.0 + self.next_unit() * 150.0,
        }
    }
}
