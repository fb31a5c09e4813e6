/// ATR (Average True Range).
///
/// True range = max(high − low, |high − prev close|, |low − prev close|);
/// ATR = mean of the last `period` true ranges. Returns `None` when the
/// series are shorter than `period + 1` bars or differ in length.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    let n = closes.len();
    if period == 0 || n < period + 1 || highs.len() != n || lows.len() != n {
        return None;
    }

    let mut true_ranges = Vec::with_capacity(n - 1);
    for i in 1..n {
        let prev_close = closes[i - 1];
        let tr = (highs[i] - lows[i])
            .max((highs[i] - prev_close).abs())
            .max((lows[i] - prev_close).abs());
        true_ranges.push(tr);
    }

    let tail = &true_ranges[true_ranges.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}
