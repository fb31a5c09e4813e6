pub mod atr;
pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod snapshot;

pub use atr::atr;
pub use bollinger::{bollinger, Bollinger};
pub use macd::{macd, Macd};
pub use moving_average::{ema, sma};
pub use rsi::rsi;
pub use snapshot::{IndicatorParams, IndicatorSnapshot};
