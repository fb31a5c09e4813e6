use std::collections::VecDeque;

use common::{Error, Result, SignalKind};
use indicators::IndicatorSnapshot;

use crate::config::StrategyConfig;
use crate::rules::clamp_confidence;
use crate::window::PriceWindow;
use crate::{Intent, SignalRule};

/// RSI divergence detector.
///
/// Compares price and RSI readings `lookback` bars apart: price making a
/// lower low while RSI makes a higher low inside the oversold zone is a
/// bullish divergence (buy); the mirror image inside the overbought zone
/// is bearish (sell). Confidence grows with the RSI's distance from the
/// midline.
#[derive(Debug)]
pub struct RsiDivergence {
    lookback: usize,
    oversold: f64,
    overbought: f64,
    /// Recent (close, rsi) pairs, oldest first, at most `lookback + 1`.
    history: VecDeque<(f64, f64)>,
}

impl RsiDivergence {
    pub fn new(lookback: usize, oversold: f64, overbought: f64) -> Self {
        Self {
            lookback,
            oversold,
            overbought,
            history: VecDeque::with_capacity(lookback + 1),
        }
    }

    pub fn from_config(cfg: &StrategyConfig) -> Result<Self> {
        let lookback = cfg.param_usize("divergence_lookback", 5);
        let oversold = cfg.param_f64("oversold", 40.0);
        let overbought = cfg.param_f64("overbought", 60.0);
        if lookback < 2 {
            return Err(Error::ConfigValidation(
                "rsi_divergence requires divergence_lookback >= 2".into(),
            ));
        }
        if oversold >= overbought {
            return Err(Error::ConfigValidation(format!(
                "rsi_divergence requires oversold < overbought, got {oversold}/{overbought}"
            )));
        }
        Ok(Self::new(lookback, oversold, overbought))
    }
}

impl SignalRule for RsiDivergence {
    fn evaluate(
        &mut self,
        window: &PriceWindow,
        snapshot: &IndicatorSnapshot,
    ) -> Result<Option<Intent>> {
        let Some(rsi) = snapshot.rsi else {
            return Ok(None);
        };
        let Some(close) = window.last().map(|c| c.close) else {
            return Ok(None);
        };

        if self.history.len() == self.lookback + 1 {
            self.history.pop_front();
        }
        self.history.push_back((close, rsi));

        if self.history.len() < self.lookback + 1 {
            return Ok(None);
        }
        let (old_close, old_rsi) = self.history[0];

        let confidence = clamp_confidence(0.4 + (rsi - 50.0).abs() / 50.0 * 0.5);

        if close < old_close && rsi > old_rsi && rsi <= self.oversold {
            Ok(Some(Intent {
                kind: SignalKind::Buy,
                confidence,
                reason: format!(
                    "bullish RSI divergence over {} bars (rsi {:.1} vs {:.1})",
                    self.lookback, rsi, old_rsi
                ),
            }))
        } else if close > old_close && rsi < old_rsi && rsi >= self.overbought {
            Ok(Some(Intent {
                kind: SignalKind::Sell,
                confidence,
                reason: format!(
                    "bearish RSI divergence over {} bars (rsi {:.1} vs {:.1})",
                    self.lookback, rsi, old_rsi
                ),
            }))
        } else {
            Ok(None)
        }
    }
}
