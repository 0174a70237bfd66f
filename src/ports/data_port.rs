//! Market data access port trait.

use crate::domain::error::ScenarioMapError;
use crate::domain::market_data::ParsedMarketData;

pub trait MarketDataPort {
    /// The current snapshot for `symbol`, or `ScenarioMapError::NoData`.
    fn load_snapshot(&self, symbol: &str) -> Result<ParsedMarketData, ScenarioMapError>;

    fn list_symbols(&self) -> Result<Vec<String>, ScenarioMapError>;
}
