//! JSON snapshot adapter.
//!
//! A snapshot file holds one `ParsedMarketData` object or an array of them,
//! one per symbol.

use crate::domain::error::ScenarioMapError;
use crate::domain::market_data::ParsedMarketData;
use crate::ports::data_port::MarketDataPort;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Many(Vec<ParsedMarketData>),
    One(Box<ParsedMarketData>),
}

#[derive(Debug)]
pub struct JsonSnapshotAdapter {
    snapshots: Vec<ParsedMarketData>,
}

impl JsonSnapshotAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioMapError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_string(&content).map_err(|e| match e {
            ScenarioMapError::SnapshotParse { reason } => ScenarioMapError::SnapshotParse {
                reason: format!("{}: {}", path.display(), reason),
            },
            other => other,
        })
    }

    pub fn from_string(content: &str) -> Result<Self, ScenarioMapError> {
        let file: SnapshotFile =
            serde_json::from_str(content).map_err(|e| ScenarioMapError::SnapshotParse {
                reason: e.to_string(),
            })?;
        let snapshots = match file {
            SnapshotFile::Many(all) => all,
            SnapshotFile::One(one) => vec![*one],
        };
        Ok(Self { snapshots })
    }

    pub fn from_snapshots(snapshots: Vec<ParsedMarketData>) -> Self {
        Self { snapshots }
    }
}

impl MarketDataPort for JsonSnapshotAdapter {
    fn load_snapshot(&self, symbol: &str) -> Result<ParsedMarketData, ScenarioMapError> {
        self.snapshots
            .iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .ok_or_else(|| ScenarioMapError::NoData {
                symbol: symbol.to_string(),
            })
    }

    fn list_symbols(&self) -> Result<Vec<String>, ScenarioMapError> {
        Ok(self.snapshots.iter().map(|s| s.symbol.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::Timeframe;
    use std::io::Write;

    const ONE: &str = r#"{
        "symbol": "SPY",
        "timestamp": "2024-03-01T21:00:00Z",
        "timeframes": { "1D": { "P0": { "open": 105, "high": 107, "low": 104, "close": 106, "volume": 1000 } } },
        "values": { "vix_spot": 14.2 }
    }"#;

    #[test]
    fn single_object() {
        let adapter = JsonSnapshotAdapter::from_string(ONE).unwrap();
        assert_eq!(adapter.list_symbols().unwrap(), vec!["SPY"]);
        let data = adapter.load_snapshot("spy").unwrap();
        assert!(data.series(Timeframe::Daily).is_some());
        assert_eq!(data.value("vix_spot"), Some(14.2));
    }

    #[test]
    fn array_of_snapshots() {
        let content = format!(
            "[{}, {{ \"symbol\": \"VIX\", \"timestamp\": \"2024-03-01T21:00:00Z\" }}]",
            ONE
        );
        let adapter = JsonSnapshotAdapter::from_string(&content).unwrap();
        assert_eq!(adapter.list_symbols().unwrap(), vec!["SPY", "VIX"]);
        assert!(adapter.load_snapshot("VIX").unwrap().timeframes.is_empty());
    }

    #[test]
    fn unknown_symbol_is_no_data() {
        let adapter = JsonSnapshotAdapter::from_string(ONE).unwrap();
        assert!(matches!(
            adapter.load_snapshot("QQQ"),
            Err(ScenarioMapError::NoData { .. })
        ));
    }

    #[test]
    fn malformed_json_is_snapshot_error() {
        let err = JsonSnapshotAdapter::from_string("{ \"symbol\": ").unwrap_err();
        assert!(matches!(err, ScenarioMapError::SnapshotParse { .. }));
    }

    #[test]
    fn from_file_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[1, 2]").unwrap();
        let err = JsonSnapshotAdapter::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));

        let missing = JsonSnapshotAdapter::from_file("/nonexistent/snapshot.json").unwrap_err();
        assert!(matches!(missing, ScenarioMapError::Io(_)));
    }
}
