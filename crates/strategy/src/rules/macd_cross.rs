use common::{Result, SignalKind};
use indicators::IndicatorSnapshot;

use crate::config::StrategyConfig;
use crate::rules::clamp_confidence;
use crate::window::PriceWindow;
use crate::{Intent, SignalRule};

/// MACD line vs signal line crossover.
///
/// Uses the snapshot's MACD values (periods come from the instance's
/// indicator params). Confidence grows with the histogram magnitude
/// relative to the current price.
#[derive(Debug, Default)]
pub struct MacdCross {
    prev: Option<(f64, f64)>,
}

impl MacdCross {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(_cfg: &StrategyConfig) -> Result<Self> {
        Ok(Self::new())
    }
}

impl SignalRule for MacdCross {
    fn evaluate(
        &mut self,
        window: &PriceWindow,
        snapshot: &IndicatorSnapshot,
    ) -> Result<Option<Intent>> {
        let Some(macd) = snapshot.macd else {
            self.prev = None;
            return Ok(None);
        };

        let prev = self.prev.replace((macd.macd, macd.signal));
        let Some((prev_macd, prev_signal)) = prev else {
            return Ok(None);
        };

        let close = window.last().map(|c| c.close).unwrap_or(0.0);
        let relative_hist = macd.histogram.abs() / close.abs().max(f64::EPSILON);
        let confidence = clamp_confidence(0.5 + relative_hist * 500.0);

        if prev_macd <= prev_signal && macd.macd > macd.signal {
            Ok(Some(Intent {
                kind: SignalKind::Buy,
                confidence,
                reason: format!(
                    "MACD crossed above signal (histogram {:+.6})",
                    macd.histogram
                ),
            }))
        } else if prev_macd >= prev_signal && macd.macd < macd.signal {
            Ok(Some(Intent {
                kind: SignalKind::Sell,
                confidence,
                reason: format!(
                    "MACD crossed below signal (histogram {:+.6})",
                    macd.histogram
                ),
            }))
        } else {
            Ok(None)
        }
    }
}
