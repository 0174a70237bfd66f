//! Simple Moving Average over closes (SMA) or lows (SMA-low).
//!
//! SMA(n)[i] = sum(P[i-j] for j in 0..n) / n
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    rolling_mean(bars, period, |b| b.close, IndicatorType::Sma(period))
}

pub fn calculate_sma_low(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    rolling_mean(bars, period, |b| b.low, IndicatorType::SmaLow(period))
}

fn rolling_mean(
    bars: &[OhlcvBar],
    period: usize,
    price: impl Fn(&OhlcvBar) -> f64,
    indicator_type: IndicatorType,
) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        sum += price(bar);
        if i >= period {
            sum -= price(&bars[i - period]);
        }

        let valid = i + 1 >= period;
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid,
            value: IndicatorValue::Simple(if valid { sum / period as f64 } else { 0.0 }),
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_bars(prices: &[(f64, f64)]) -> Vec<OhlcvBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &(low, close))| OhlcvBar {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn sma_warmup() {
        let bars = make_bars(&[(9.0, 10.0), (19.0, 20.0), (29.0, 30.0), (39.0, 40.0)]);
        let series = calculate_sma(&bars, 3);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
    }

    #[test]
    fn sma_rolling_window() {
        let bars = make_bars(&[(9.0, 10.0), (19.0, 20.0), (29.0, 30.0), (39.0, 40.0)]);
        let series = calculate_sma(&bars, 3);

        if let IndicatorValue::Simple(v) = series.values[2].value {
            assert!((v - 20.0).abs() < 1e-9);
        }
        assert!((series.latest_simple().unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn sma_low_uses_lows() {
        let bars = make_bars(&[(9.0, 10.0), (19.0, 20.0), (29.0, 30.0)]);
        let series = calculate_sma_low(&bars, 3);

        assert_eq!(series.indicator_type, IndicatorType::SmaLow(3));
        assert!((series.latest_simple().unwrap() - 19.0).abs() < 1e-9);
    }

    #[test]
    fn sma_period_1_is_price() {
        let bars = make_bars(&[(9.0, 10.0), (19.0, 20.0)]);
        let series = calculate_sma(&bars, 1);
        assert!((series.latest_simple().unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn sma_insufficient_history_has_no_latest() {
        let bars = make_bars(&[(9.0, 10.0), (19.0, 20.0)]);
        let series = calculate_sma(&bars, 89);
        assert_eq!(series.values.len(), 2);
        assert_eq!(series.latest_simple(), None);
    }

    #[test]
    fn sma_empty_and_zero_period() {
        assert!(calculate_sma(&[], 3).values.is_empty());
        let bars = make_bars(&[(9.0, 10.0)]);
        assert!(calculate_sma(&bars, 0).values.is_empty());
    }
}
