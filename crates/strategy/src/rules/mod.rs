pub mod bollinger_breakout;
pub mod macd_cross;
pub mod rsi_divergence;
pub mod sma_cross;

pub use bollinger_breakout::BollingerBreakout;
pub use macd_cross::MacdCross;
pub use rsi_divergence::RsiDivergence;
pub use sma_cross::SmaCross;

/// Clamp a raw strength estimate into the allowed confidence range.
/// Non-finite inputs collapse to the floor.
pub fn clamp_confidence(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.1, 0.95)
    } else {
        0.1
    }
}
