//! Exponential Moving Average over closes.
//!
//! k = 2/(n+1), seeded with the SMA of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_ema(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ema(period);
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut seed_sum = 0.0;

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let valid = i + 1 >= period;
            if i + 1 < period {
                seed_sum += bar.close;
            } else if i + 1 == period {
                seed_sum += bar.close;
                ema = seed_sum / period as f64;
            } else {
                ema = bar.close * k + ema * (1.0 - k);
            }
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid,
                value: IndicatorValue::Simple(if valid { ema } else { 0.0 }),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_bars(closes: &[f64]) -> Vec<OhlcvBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn ema_warmup() {
        let series = calculate_ema(&make_bars(&[10.0, 20.0, 30.0, 40.0]), 3);
        let validity: Vec<bool> = series.values.iter().map(|p| p.valid).collect();
        assert_eq!(validity, vec![false, false, true, true]);
    }

    #[test]
    fn ema_seed_then_recursion() {
        let series = calculate_ema(&make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]), 3);

        let k = 0.5;
        let seed = 20.0;
        let ema_3 = 40.0 * k + seed * (1.0 - k);
        let ema_4 = 50.0 * k + ema_3 * (1.0 - k);

        match series.values[2].value {
            IndicatorValue::Simple(v) => assert!((v - seed).abs() < 1e-9),
            _ => panic!("expected Simple value"),
        }
        assert!((series.latest_simple().unwrap() - ema_4).abs() < 1e-9);
    }

    #[test]
    fn ema_flat_prices() {
        let series = calculate_ema(&make_bars(&[100.0; 6]), 4);
        assert!((series.latest_simple().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn ema_degenerate_inputs() {
        assert!(calculate_ema(&[], 3).values.is_empty());
        assert!(calculate_ema(&make_bars(&[1.0, 2.0]), 0).values.is_empty());
        assert_eq!(calculate_ema(&make_bars(&[1.0, 2.0]), 5).latest_simple(), None);
    }
}
