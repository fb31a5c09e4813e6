use common::{Error, Result, SignalKind};
use indicators::{sma, IndicatorSnapshot};

use crate::config::StrategyConfig;
use crate::rules::clamp_confidence;
use crate::window::PriceWindow;
use crate::{Intent, SignalRule};

/// Fast/slow simple moving average crossover.
///
/// Emits a buy intent when the fast average crosses above the slow one
/// between consecutive bars, and a sell intent on the opposite cross.
/// Confidence grows with the relative separation of the two averages.
#[derive(Debug)]
pub struct SmaCross {
    fast: usize,
    slow: usize,
    prev: Option<(f64, f64)>,
}

impl SmaCross {
    pub fn new(fast: usize, slow: usize) -> Self {
        Self { fast, slow, prev: None }
    }

    pub fn from_config(cfg: &StrategyConfig) -> Result<Self> {
        let fast = cfg.param_usize("fast_period", 10);
        let slow = cfg.param_usize("slow_period", 30);
        if fast == 0 || fast >= slow {
            return Err(Error::ConfigValidation(format!(
                "sma_cross requires 0 < fast_period < slow_period, got {fast}/{slow}"
            )));
        }
        Ok(Self::new(fast, slow))
    }
}

impl SignalRule for SmaCross {
    fn evaluate(
        &mut self,
        window: &PriceWindow,
        _snapshot: &IndicatorSnapshot,
    ) -> Result<Option<Intent>> {
        let closes = window.closes();
        let (fast, slow) = match (sma(&closes, self.fast), sma(&closes, self.slow)) {
            (Some(f), Some(s)) => (f, s),
            _ => {
                // Not enough data yet; nothing to compare against next bar.
                self.prev = None;
                return Ok(None);
            }
        };

        let prev = self.prev.replace((fast, slow));
        let Some((prev_fast, prev_slow)) = prev else {
            return Ok(None);
        };

        let separation = if slow.abs() > f64::EPSILON {
            (fast - slow).abs() / slow.abs()
        } else {
            0.0
        };
        let confidence = clamp_confidence(0.5 + separation * 50.0);

        if prev_fast <= prev_slow && fast > slow {
            Ok(Some(Intent {
                kind: SignalKind::Buy,
                confidence,
                reason: format!(
                    "fast SMA({}) crossed above slow SMA({})",
                    self.fast, self.slow
                ),
            }))
        } else if prev_fast >= prev_slow && fast < slow {
            Ok(Some(Intent {
                kind: SignalKind::Sell,
                confidence,
                reason: format!(
                    "fast SMA({}) crossed below slow SMA({})",
                    self.fast, self.slow
                ),
            }))
        } else {
            Ok(None)
        }
    }
}
