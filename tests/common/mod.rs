#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use scenariomap::domain::error::ScenarioMapError;
use scenariomap::domain::filter::{FilterValue, Operator, ScenarioFilter};
use scenariomap::domain::market_data::{Indicators, ParsedMarketData, PeriodBar, TimeframeSeries};
use scenariomap::domain::timeframe::Timeframe;
use scenariomap::ports::data_port::MarketDataPort;
use std::collections::HashMap;

pub struct MockMarketDataPort {
    pub snapshots: HashMap<String, ParsedMarketData>,
    pub errors: HashMap<String, String>,
}

impl MockMarketDataPort {
    pub fn new() -> Self {
        Self {
            snapshots: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_snapshot(mut self, data: ParsedMarketData) -> Self {
        self.snapshots.insert(data.symbol.clone(), data);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockMarketDataPort {
    fn load_snapshot(&self, symbol: &str) -> Result<ParsedMarketData, ScenarioMapError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(ScenarioMapError::SnapshotParse {
                reason: reason.clone(),
            });
        }
        self.snapshots
            .get(symbol)
            .cloned()
            .ok_or_else(|| ScenarioMapError::NoData {
                symbol: symbol.to_string(),
            })
    }

    fn list_symbols(&self) -> Result<Vec<String>, ScenarioMapError> {
        let mut symbols: Vec<String> = self
            .snapshots
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn snapshot_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 21, 0, 0).unwrap()
}

pub fn bar(open: f64, high: f64, low: f64, close: f64) -> PeriodBar {
    PeriodBar {
        open,
        high,
        low,
        close,
        volume: 1_000_000.0,
        timestamp: None,
    }
}

/// A flat bar: open, high, low and close all equal.
pub fn flat_bar(price: f64) -> PeriodBar {
    bar(price, price, price, price)
}

pub fn series(periods: Vec<PeriodBar>) -> TimeframeSeries {
    TimeframeSeries::new(periods, Indicators::default())
}

pub fn series_with_sma(periods: Vec<PeriodBar>, sma: &[(usize, f64)]) -> TimeframeSeries {
    let indicators = Indicators {
        sma: sma.iter().copied().collect(),
        ..Indicators::default()
    };
    TimeframeSeries::new(periods, indicators)
}

/// Daily snapshot where today opens at `open` and yesterday's high was `prev_high`.
pub fn gap_snapshot(symbol: &str, open: f64, prev_high: f64) -> ParsedMarketData {
    ParsedMarketData::new(symbol, snapshot_time()).with_series(
        Timeframe::Daily,
        series(vec![
            bar(open, open + 2.0, open - 1.0, open + 1.0),
            bar(prev_high - 3.0, prev_high, prev_high - 5.0, prev_high - 1.0),
        ]),
    )
}

pub fn daily_close_snapshot(symbol: &str, close: f64) -> ParsedMarketData {
    ParsedMarketData::new(symbol, snapshot_time())
        .with_series(Timeframe::Daily, series(vec![flat_bar(close)]))
}

pub fn filter_gt(id: &str, field: &str, value: f64) -> ScenarioFilter {
    ScenarioFilter::new(id, field, Operator::Gt).with_value(FilterValue::Number(value))
}

pub fn filter_expr(id: &str, field: &str, operator: Operator, value: &str) -> ScenarioFilter {
    ScenarioFilter::new(id, field, operator).with_value(FilterValue::Expression(value.to_string()))
}

pub const GAP_SCENARIO_JSON: &str = r#"[
  {
    "id": "open-above-yesterday-high",
    "name": "Open Above Yesterday High",
    "filters": [
      { "id": "gap_up", "field": "1D_P0_open", "operator": "gt", "value": "1D_P1_high" }
    ],
    "probability": {
      "baseProbability": 55,
      "modifiers": [ { "condition": "gap_up", "adjustment": 10 } ]
    },
    "risk": { "level": "low" }
  }
]"#;

pub const GAP_SNAPSHOT_JSON: &str = r#"{
  "symbol": "SPY",
  "timestamp": "2024-03-01T21:00:00Z",
  "timeframes": {
    "1D": {
      "P0": { "open": 105, "high": 107, "low": 104, "close": 106, "volume": 1000,
              "indicators": { "sma": { "89": 95 } } },
      "P1": { "open": 98, "high": 100, "low": 96, "close": 99, "volume": 1200 }
    }
  }
}"#;
