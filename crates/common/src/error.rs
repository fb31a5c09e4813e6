use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown strategy type or instance id. Surfaced synchronously to
    /// the caller of the lifecycle operation that triggered it.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid configuration fields at creation time.
    #[error("Configuration error: {0}")]
    ConfigValidation(String),

    /// Unexpected failure while processing one instance's update.
    /// Caught at the dispatch boundary and converted into an error event;
    /// never propagates to other instances.
    #[error("Strategy '{strategy_id}' fault: {message}")]
    InstanceFault { strategy_id: String, message: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
