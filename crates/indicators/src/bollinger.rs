use serde::Serialize;

use crate::moving_average::sma;

/// Bollinger band levels for the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Bollinger {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Bollinger Bands: middle = SMA(period), bands = middle ± multiplier ×
/// population standard deviation of the last `period` values.
/// Returns `None` when fewer than `period` values are available.
pub fn bollinger(values: &[f64], period: usize, multiplier: f64) -> Option<Bollinger> {
    let middle = sma(values, period)?;
    let tail = &values[values.len() - period..];

    let variance =
        tail.iter().map(|v| (v - middle) * (v - middle)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    Some(Bollinger {
        upper: middle + multiplier * std_dev,
        middle,
        lower: middle - multiplier * std_dev,
    })
}
