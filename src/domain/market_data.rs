//! Parsed market data snapshot.
//!
//! One `ParsedMarketData` per symbol holds up to four timeframe series. Each
//! series holds up to six periods (`P0` newest). Only `P0` carries indicator
//! values, so indicators are stored on the series rather than on each period.
//!
//! The serialized form mirrors the dashboard payload:
//!
//! ```text
//! { "symbol": "SPY", "timeframes": { "1D": { "P0": { "open": .., "indicators": {..} },
//!                                            "P1": { "open": .. } } } }
//! ```

use crate::domain::field_ref::{BandLine, IndicatorField};
use crate::domain::indicator::bollinger::calculate_bollinger;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::sma::{calculate_sma, calculate_sma_low};
use crate::domain::indicator::IndicatorValue;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::{MAX_PERIODS, Period, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentType {
    Index,
    Etf,
    Future,
    Volatility,
    Equity,
    #[default]
    Other,
}

impl InstrumentType {
    /// Best guess for the instruments the dashboard tracks.
    pub fn infer(symbol: &str) -> Self {
        match symbol.to_uppercase().as_str() {
            "SPX" | "NDX" | "RUT" | "DJI" => InstrumentType::Index,
            "SPY" | "QQQ" | "IWM" | "DIA" => InstrumentType::Etf,
            "ES" | "NQ" | "RTY" | "YM" => InstrumentType::Future,
            "VIX" | "VVIX" | "VIX9D" => InstrumentType::Volatility,
            _ => InstrumentType::Equity,
        }
    }
}

/// OHLCV values of one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&OhlcvBar> for PeriodBar {
    fn from(bar: &OhlcvBar) -> Self {
        Self {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            timestamp: Some(bar.timestamp),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Indicator values at `P0`, keyed by indicator length.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Indicators {
    #[serde(default, deserialize_with = "length_keys", skip_serializing_if = "BTreeMap::is_empty")]
    pub sma: BTreeMap<usize, f64>,
    #[serde(
        default,
        rename = "smaLow",
        deserialize_with = "length_keys",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub sma_low: BTreeMap<usize, f64>,
    #[serde(default, deserialize_with = "length_keys", skip_serializing_if = "BTreeMap::is_empty")]
    pub ema: BTreeMap<usize, f64>,
    #[serde(default, deserialize_with = "length_keys", skip_serializing_if = "BTreeMap::is_empty")]
    pub rsi: BTreeMap<usize, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bollinger: Option<BollingerBands>,
}

/// JSON object keys are strings; buffered input (flatten, untagged) does not
/// coerce them to integers, so parse them here.
fn length_keys<'de, D>(deserializer: D) -> Result<BTreeMap<usize, f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, f64>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| match key.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok((n, value)),
            _ => Err(serde::de::Error::custom(format!(
                "invalid indicator length '{}'",
                key
            ))),
        })
        .collect()
}

impl Indicators {
    pub fn lookup(&self, field: IndicatorField) -> Option<f64> {
        match field {
            IndicatorField::Sma(n) => self.sma.get(&n).copied(),
            IndicatorField::SmaLow(n) => self.sma_low.get(&n).copied(),
            IndicatorField::Ema(n) => self.ema.get(&n).copied(),
            IndicatorField::Rsi(n) => self.rsi.get(&n).copied(),
            IndicatorField::Bollinger(line) => self.bollinger.map(|b| match line {
                BandLine::Upper => b.upper,
                BandLine::Middle => b.middle,
                BandLine::Lower => b.lower,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sma.is_empty()
            && self.sma_low.is_empty()
            && self.ema.is_empty()
            && self.rsi.is_empty()
            && self.bollinger.is_none()
    }
}

/// Which indicators the snapshot builder computes for `P0`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSpec {
    pub sma: Vec<usize>,
    pub sma_low: Vec<usize>,
    pub ema: Vec<usize>,
    pub rsi: Vec<usize>,
    pub bollinger: Option<(usize, u32)>,
}

impl Default for IndicatorSpec {
    fn default() -> Self {
        Self {
            sma: vec![20, 50, 89, 200],
            sma_low: vec![89],
            ema: vec![9, 21, 89],
            rsi: vec![14],
            bollinger: Some((20, 200)),
        }
    }
}

impl IndicatorSpec {
    /// Newest value of every configured indicator that has enough history.
    pub fn compute(&self, bars: &[OhlcvBar]) -> Indicators {
        let mut out = Indicators::default();
        for &n in &self.sma {
            if let Some(v) = calculate_sma(bars, n).latest_simple() {
                out.sma.insert(n, v);
            }
        }
        for &n in &self.sma_low {
            if let Some(v) = calculate_sma_low(bars, n).latest_simple() {
                out.sma_low.insert(n, v);
            }
        }
        for &n in &self.ema {
            if let Some(v) = calculate_ema(bars, n).latest_simple() {
                out.ema.insert(n, v);
            }
        }
        for &n in &self.rsi {
            if let Some(v) = calculate_rsi(bars, n).latest_simple() {
                out.rsi.insert(n, v);
            }
        }
        if let Some((period, mult_x100)) = self.bollinger {
            let series = calculate_bollinger(bars, period, mult_x100);
            if let Some(IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            }) = series.latest()
            {
                out.bollinger = Some(BollingerBands {
                    upper: *upper,
                    middle: *middle,
                    lower: *lower,
                });
            }
        }
        out
    }
}

/// Up to six periods of one timeframe, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Period, RawPeriod>", into = "BTreeMap<Period, RawPeriod>")]
pub struct TimeframeSeries {
    periods: Vec<PeriodBar>,
    indicators: Indicators,
}

impl TimeframeSeries {
    /// `periods` is newest first; anything past `P5` is dropped.
    pub fn new(mut periods: Vec<PeriodBar>, indicators: Indicators) -> Self {
        periods.truncate(MAX_PERIODS);
        Self {
            periods,
            indicators,
        }
    }

    /// Build from a chronological (oldest first) history. `P0` is the newest
    /// bar; indicators are computed over the whole history.
    pub fn from_bars(bars: &[OhlcvBar], spec: &IndicatorSpec) -> Option<Self> {
        if bars.is_empty() {
            return None;
        }
        let periods = bars.iter().rev().take(MAX_PERIODS).map(PeriodBar::from).collect();
        Some(Self::new(periods, spec.compute(bars)))
    }

    pub fn period(&self, period: Period) -> Option<&PeriodBar> {
        self.periods.get(period.index())
    }

    pub fn current(&self) -> Option<&PeriodBar> {
        self.periods.first()
    }

    /// Number of populated periods.
    pub fn depth(&self) -> usize {
        self.periods.len()
    }

    /// Indicator values, defined for `P0` only.
    pub fn indicators(&self) -> &Indicators {
        &self.indicators
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPeriod {
    #[serde(flatten)]
    bar: PeriodBar,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    indicators: Option<Indicators>,
}

impl TryFrom<BTreeMap<Period, RawPeriod>> for TimeframeSeries {
    type Error = String;

    fn try_from(raw: BTreeMap<Period, RawPeriod>) -> Result<Self, Self::Error> {
        let mut periods = Vec::with_capacity(raw.len());
        let mut indicators = Indicators::default();

        for (expected, (period, entry)) in raw.into_iter().enumerate() {
            if period.index() != expected {
                return Err(format!(
                    "period P{} is missing while {} is present",
                    expected, period
                ));
            }
            if let Some(ind) = entry.indicators {
                if !period.is_current() {
                    return Err(format!("indicators are only allowed on P0, found on {}", period));
                }
                indicators = ind;
            }
            periods.push(entry.bar);
        }

        Ok(TimeframeSeries::new(periods, indicators))
    }
}

impl From<TimeframeSeries> for BTreeMap<Period, RawPeriod> {
    fn from(series: TimeframeSeries) -> Self {
        let TimeframeSeries {
            periods,
            mut indicators,
        } = series;
        periods
            .into_iter()
            .enumerate()
            .filter_map(|(i, bar)| {
                let period = Period::new(i)?;
                let indicators = if period.is_current() && !indicators.is_empty() {
                    Some(std::mem::take(&mut indicators))
                } else {
                    None
                };
                Some((period, RawPeriod { bar, indicators }))
            })
            .collect()
    }
}

/// Read-only per-symbol snapshot consumed by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMarketData {
    pub symbol: String,
    #[serde(default)]
    pub instrument_type: InstrumentType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub timeframes: BTreeMap<Timeframe, TimeframeSeries>,
    /// Raw dynamic values (e.g. `vix_spot`) addressable by bare name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, f64>,
}

impl ParsedMarketData {
    pub fn new(symbol: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let symbol = symbol.into();
        Self {
            instrument_type: InstrumentType::infer(&symbol),
            symbol,
            timestamp,
            timeframes: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_series(mut self, timeframe: Timeframe, series: TimeframeSeries) -> Self {
        self.timeframes.insert(timeframe, series);
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn series(&self, timeframe: Timeframe) -> Option<&TimeframeSeries> {
        self.timeframes.get(&timeframe)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}
