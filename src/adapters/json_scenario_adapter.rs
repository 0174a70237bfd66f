//! JSON scenario file adapter.
//!
//! Accepts either a bare array of scenarios or `{ "scenarios": [...] }`.

use crate::domain::error::ScenarioMapError;
use crate::domain::scenario::Scenario;
use crate::ports::scenario_port::ScenarioPort;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Deserialize)]
#[serde(untagged)]
enum ScenarioFile {
    List(Vec<Scenario>),
    Wrapped { scenarios: Vec<Scenario> },
}

pub struct JsonScenarioAdapter {
    path: PathBuf,
}

impl JsonScenarioAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

/// `file` is only used to label errors.
pub fn parse_scenarios(content: &str, file: &str) -> Result<Vec<Scenario>, ScenarioMapError> {
    let parsed: ScenarioFile =
        serde_json::from_str(content).map_err(|e| ScenarioMapError::ScenarioParse {
            file: file.to_string(),
            reason: e.to_string(),
        })?;
    Ok(match parsed {
        ScenarioFile::List(scenarios) | ScenarioFile::Wrapped { scenarios } => scenarios,
    })
}

impl ScenarioPort for JsonScenarioAdapter {
    fn load_scenarios(&self) -> Result<Vec<Scenario>, ScenarioMapError> {
        let content = fs::read_to_string(&self.path)?;
        let scenarios = parse_scenarios(&content, &self.path.display().to_string())?;
        debug!(path = %self.path.display(), count = scenarios.len(), "loaded scenarios");
        Ok(scenarios)
    }
}
