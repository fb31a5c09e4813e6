/// Runtime configuration loaded from environment variables at startup.
/// Every field has a default; malformed values panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the TOML file describing the strategies to create at boot.
    pub strategy_config_path: String,
    /// Capacity of the engine event broadcast channel.
    pub event_buffer: usize,
    /// Depth of each instance's bounded update queue.
    pub update_queue_depth: usize,
    /// Interval of the synthetic candle feed, in milliseconds.
    pub feed_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables, reading `.env` if
    /// present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Config {
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            event_buffer: parsed_env("EVENT_BUFFER", 1024),
            update_queue_depth: parsed_env("UPDATE_QUEUE_DEPTH", 256),
            feed_interval_ms: parsed_env("FEED_INTERVAL_MS", 1000),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match optional_env(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            panic!("Environment variable '{key}' has an unparseable value: '{raw}'")
        }),
        None => default,
    }
}
