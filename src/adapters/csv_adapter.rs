//! CSV bar-history adapter.
//!
//! Reads one file per symbol and timeframe, `<SYMBOL>_<TF>.csv`, with header
//! `timestamp,open,high,low,close,volume`. Timestamps are RFC 3339 or plain
//! `YYYY-MM-DD` dates (taken as midnight UTC). Each available timeframe
//! becomes one series of the snapshot, with `P0` indicators computed over the
//! whole file.

use crate::domain::error::ScenarioMapError;
use crate::domain::market_data::{IndicatorSpec, ParsedMarketData, TimeframeSeries};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::MarketDataPort;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
    spec: IndicatorSpec,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf, spec: IndicatorSpec) -> Self {
        Self { base_path, spec }
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", symbol, timeframe.code()))
    }

    /// Bars for one timeframe in chronological order. `None` if the file does not exist.
    pub fn load_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<Vec<OhlcvBar>>, ScenarioMapError> {
        let path = self.csv_path(symbol, timeframe);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let bars = parse_bars(&content).map_err(|reason| ScenarioMapError::SnapshotParse {
            reason: format!("{}: {}", path.display(), reason),
        })?;
        debug!(path = %path.display(), bars = bars.len(), "loaded bar history");
        Ok(Some(bars))
    }
}

/// Parse a CSV bar history and sort it oldest first.
pub fn parse_bars(content: &str) -> Result<Vec<OhlcvBar>, String> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let line = row + 2;
        let record = result.map_err(|e| format!("CSV parse error: {}", e))?;

        let raw_ts = record
            .get(0)
            .ok_or_else(|| format!("line {}: missing timestamp column", line))?;
        let timestamp = parse_timestamp(raw_ts)
            .ok_or_else(|| format!("line {}: invalid timestamp '{}'", line, raw_ts))?;

        let column = |idx: usize, name: &str| -> Result<f64, String> {
            let raw = record
                .get(idx)
                .ok_or_else(|| format!("line {}: missing {} column", line, name))?;
            raw.parse::<f64>()
                .map_err(|e| format!("line {}: invalid {} value '{}': {}", line, name, raw, e))
        };

        let bar = OhlcvBar {
            timestamp,
            open: column(1, "open")?,
            high: column(2, "high")?,
            low: column(3, "low")?,
            close: column(4, "close")?,
            volume: column(5, "volume")?,
        };
        if !bar.is_consistent() {
            return Err(format!("line {}: inconsistent bar (check high/low range)", line));
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

impl MarketDataPort for CsvAdapter {
    fn load_snapshot(&self, symbol: &str) -> Result<ParsedMarketData, ScenarioMapError> {
        let mut series = Vec::new();
        for timeframe in Timeframe::ALL {
            let Some(bars) = self.load_bars(symbol, timeframe)? else {
                continue;
            };
            if let Some(s) = TimeframeSeries::from_bars(&bars, &self.spec) {
                series.push((timeframe, s));
            }
        }

        let timestamp = series
            .iter()
            .filter_map(|(_, s)| s.current().and_then(|bar| bar.timestamp))
            .max()
            .ok_or_else(|| ScenarioMapError::NoData {
                symbol: symbol.to_string(),
            })?;

        let snapshot = series
            .into_iter()
            .fold(ParsedMarketData::new(symbol, timestamp), |data, (tf, s)| {
                data.with_series(tf, s)
            });
        Ok(snapshot)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ScenarioMapError> {
        let mut symbols = BTreeSet::new();
        for entry in fs::read_dir(&self.base_path)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name.strip_suffix(".csv") else {
                continue;
            };
            if let Some((symbol, tf)) = stem.rsplit_once('_') {
                if Timeframe::from_code(tf).is_some() && !symbol.is_empty() {
                    symbols.insert(symbol.to_string());
                }
            }
        }
        Ok(symbols.into_iter().collect())
    }
}
