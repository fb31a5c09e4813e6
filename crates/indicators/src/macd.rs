use serde::Serialize;

use crate::moving_average::ema;

/// The three MACD values for the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD (Moving Average Convergence/Divergence).
///
/// MACD line = EMA(fast) − EMA(slow) evaluated per prefix from the first
/// bar where the slow EMA exists; signal line = EMA of that MACD series;
/// histogram = macd − signal. Returns `None` below `slow` samples (and
/// while the MACD series is still shorter than `signal_period`).
pub fn macd(values: &[f64], fast: usize, slow: usize, signal_period: usize) -> Option<Macd> {
    if fast == 0 || slow == 0 || signal_period == 0 || fast >= slow {
        return None;
    }
    if values.len() < slow {
        return None;
    }

    let macd_line: Vec<f64> = (slow - 1..values.len())
        .map(|i| {
            let prefix = &values[..=i];
            // Both EMAs exist: prefix length >= slow > fast.
            ema(prefix, fast).unwrap() - ema(prefix, slow).unwrap()
        })
        .collect();

    let signal = ema(&macd_line, signal_period)?;
    let macd_val = *macd_line.last().unwrap();

    Some(Macd {
        macd: macd_val,
        signal,
        histogram: macd_val - signal,
    })
}
