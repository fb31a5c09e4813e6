pub mod dispatch;

pub use dispatch::{ActiveStrategyInfo, DispatchEngine};
