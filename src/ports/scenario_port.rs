//! Scenario configuration source.

use crate::domain::error::ScenarioMapError;
use crate::domain::scenario::Scenario;

pub trait ScenarioPort {
    fn load_scenarios(&self) -> Result<Vec<Scenario>, ScenarioMapError>;
}
