use serde::Serialize;

use crate::{atr, bollinger, ema, macd, rsi, sma, Bollinger, Macd};

/// Periods used for the wholesale snapshot recompute. Strategy configs may
/// override individual entries through their `params` table.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorParams {
    pub sma_period: usize,
    pub ema_period: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
    pub atr_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            sma_period: 20,
            ema_period: 20,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
            atr_period: 14,
        }
    }
}

/// All indicator values for the current window state, recomputed wholesale
/// on every update. Entries are `None` while their input series is too
/// short — a normal "not yet ready" outcome, never an error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndicatorSnapshot {
    pub sma: Option<f64>,
    pub ema: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<Macd>,
    pub bollinger: Option<Bollinger>,
    pub atr: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn compute(
        closes: &[f64],
        highs: &[f64],
        lows: &[f64],
        params: &IndicatorParams,
    ) -> Self {
        Self {
            sma: sma(closes, params.sma_period),
            ema: ema(closes, params.ema_period),
            rsi: rsi(closes, params.rsi_period),
            macd: macd(closes, params.macd_fast, params.macd_slow, params.macd_signal),
            bollinger: bollinger(closes, params.bollinger_period, params.bollinger_multiplier),
            atr: atr(highs, lows, closes, params.atr_period),
        }
    }
}
