use common::{Error, Result, SignalKind};
use indicators::{sma, IndicatorSnapshot};

use crate::config::StrategyConfig;
use crate::rules::clamp_confidence;
use crate::window::PriceWindow;
use crate::{Intent, SignalRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zone {
    Inside,
    Above,
    Below,
}

/// Bollinger band breakout with volume confirmation.
///
/// Qualifies when the close crosses from inside the bands to outside AND
/// the bar's volume is at least `volume_ratio` times the recent average.
/// Confidence grows with the breach depth relative to the band width.
#[derive(Debug)]
pub struct BollingerBreakout {
    volume_ratio: f64,
    volume_period: usize,
    prev_zone: Option<Zone>,
}

impl BollingerBreakout {
    pub fn new(volume_ratio: f64, volume_period: usize) -> Self {
        Self {
            volume_ratio,
            volume_period,
            prev_zone: None,
        }
    }

    pub fn from_config(cfg: &StrategyConfig) -> Result<Self> {
        let volume_ratio = cfg.param_f64("volume_ratio", 1.5);
        let volume_period = cfg.param_usize("volume_period", 20);
        if !(volume_ratio > 0.0) || volume_period == 0 {
            return Err(Error::ConfigValidation(
                "bollinger_breakout requires positive volume_ratio and volume_period".into(),
            ));
        }
        Ok(Self::new(volume_ratio, volume_period))
    }
}

impl SignalRule for BollingerBreakout {
    fn evaluate(
        &mut self,
        window: &PriceWindow,
        snapshot: &IndicatorSnapshot,
    ) -> Result<Option<Intent>> {
        let Some(bands) = snapshot.bollinger else {
            self.prev_zone = None;
            return Ok(None);
        };
        let Some(last) = window.last() else {
            return Ok(None);
        };
        let close = last.close;
        let volume = last.volume;

        let zone = if close > bands.upper {
            Zone::Above
        } else if close < bands.lower {
            Zone::Below
        } else {
            Zone::Inside
        };
        let prev_zone = self.prev_zone.replace(zone);

        // Edge trigger only: the close must cross out of the bands on this
        // bar, not merely remain outside.
        let crossed_out =
            matches!(prev_zone, Some(Zone::Inside)) && zone != Zone::Inside;
        if !crossed_out {
            return Ok(None);
        }

        let volumes = window.volumes();
        let Some(avg_volume) = sma(&volumes, self.volume_period) else {
            return Ok(None);
        };
        if avg_volume <= 0.0 || volume < avg_volume * self.volume_ratio {
            return Ok(None);
        }

        let width = bands.width().max(1e-12);
        let depth = match zone {
            Zone::Above => (close - bands.upper) / width,
            Zone::Below => (bands.lower - close) / width,
            Zone::Inside => 0.0,
        };
        let confidence = clamp_confidence(0.5 + depth * 4.0);

        let intent = match zone {
            Zone::Above => Intent {
                kind: SignalKind::Buy,
                confidence,
                reason: format!(
                    "close {:.5} broke above upper band {:.5} on {:.1}x volume",
                    close,
                    bands.upper,
                    volume / avg_volume
                ),
            },
            Zone::Below => Intent {
                kind: SignalKind::Sell,
                confidence,
                reason: format!(
                    "close {:.5} broke below lower band {:.5} on {:.1}x volume",
                    close,
                    bands.lower,
                    volume / avg_volume
                ),
            },
            Zone::Inside => return Ok(None),
        };
        Ok(Some(intent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::Candle;
    use indicators::Bollinger;

    fn candle(close: f64, volume: f64) -> Candle {
        Candle {
            timestamp: Utc::now(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    fn snap(lower: f64, upper: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            bollinger: Some(Bollinger {
                upper,
                middle: (upper + lower) / 2.0,
                lower,
            }),
            ..IndicatorSnapshot::default()
        }
    }

    fn seed_inside(rule: &mut BollingerBreakout, window: &mut PriceWindow, bars: usize) {
        for _ in 0..bars {
            window.push(candle(100.0, 100.0));
            assert!(rule
                .evaluate(window, &snap(95.0, 105.0))
                .unwrap()
                .is_none());
        }
    }

    #[test]
    fn buy_on_upper_breakout_with_volume() {
        let mut rule = BollingerBreakout::new(1.5, 3);
        let mut window = PriceWindow::new(50);
        seed_inside(&mut rule, &mut window, 3);

        window.push(candle(106.0, 300.0)); // above band, 3x average volume
        let intent = rule
            .evaluate(&window, &snap(95.0, 105.0))
            .unwrap()
            .expect("expected a breakout intent");
        assert_eq!(intent.kind, SignalKind::Buy);
        assert!((0.1..=0.95).contains(&intent.confidence));
    }

    #[test]
    fn sell_on_lower_breakout_with_volume() {
        let mut rule = BollingerBreakout::new(1.5, 3);
        let mut window = PriceWindow::new(50);
        seed_inside(&mut rule, &mut window, 3);

        window.push(candle(94.0, 300.0));
        let intent = rule
            .evaluate(&window, &snap(95.0, 105.0))
            .unwrap()
            .expect("expected a breakdown intent");
        assert_eq!(intent.kind, SignalKind::Sell);
    }

    #[test]
    fn breakout_without_volume_does_not_qualify() {
        let mut rule = BollingerBreakout::new(1.5, 3);
        let mut window = PriceWindow::new(50);
        seed_inside(&mut rule, &mut window, 3);

        window.push(candle(106.0, 100.0)); // normal volume
        assert!(rule
            .evaluate(&window, &snap(95.0, 105.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn staying_outside_the_band_fires_only_once() {
        let mut rule = BollingerBreakout::new(1.5, 3);
        let mut window = PriceWindow::new(50);
        seed_inside(&mut rule, &mut window, 3);

        window.push(candle(106.0, 300.0));
        assert!(rule
            .evaluate(&window, &snap(95.0, 105.0))
            .unwrap()
            .is_some());

        // Still above the band next bar: no new edge, no new intent.
        window.push(candle(107.0, 300.0));
        assert!(rule
            .evaluate(&window, &snap(95.0, 105.0))
            .unwrap()
            .is_none());
    }
}
