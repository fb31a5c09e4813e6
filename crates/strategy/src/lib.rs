pub mod config;
pub mod instance;
pub mod registry;
pub mod rules;
pub mod window;

pub use config::{StrategyConfig, StrategyFileConfig};
pub use instance::StrategyInstance;
pub use registry::{StrategyDescriptor, StrategyFactory, StrategyRegistry};
pub use rules::clamp_confidence;
pub use window::PriceWindow;

use common::SignalKind;
use indicators::IndicatorSnapshot;

/// Directional intent produced by a rule before confirmation debouncing
/// and the position gate are applied.
#[derive(Debug, Clone)]
pub struct Intent {
    pub kind: SignalKind,
    pub confidence: f64,
    pub reason: String,
}

/// Per-symbol signal check every strategy kind must satisfy.
///
/// Rules are stateful: they hold the previous indicator values needed for
/// crossover and divergence detection, one rule value per subscribed
/// symbol. `Ok(None)` means "no qualifying event on this bar" (including
/// insufficient data); an `Err` is converted into an instance fault at the
/// dispatch boundary.
pub trait SignalRule: Send {
    fn evaluate(
        &mut self,
        window: &PriceWindow,
        snapshot: &IndicatorSnapshot,
    ) -> common::Result<Option<Intent>>;
}
