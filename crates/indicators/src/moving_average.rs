/// Simple Moving Average of the last `period` values.
/// Returns `None` when fewer than `period` values are available.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let tail = &values[values.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// Exponential Moving Average over the whole series (oldest first).
///
/// Seeded with the first value; `k = 2 / (period + 1)`. Returns `None`
/// when fewer than `period` values are available.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema_val = values[0];
    for &v in &values[1..] {
        ema_val = v * k + ema_val * (1.0 - k);
    }
    Some(ema_val)
}
