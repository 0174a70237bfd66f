//! Scenario evaluation output.

use crate::domain::direction::Direction;
use crate::domain::scenario::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioStatus {
    Bullish,
    Bearish,
    /// Part of the output vocabulary; the evaluator does not produce it.
    Overbought,
    /// Part of the output vocabulary; the evaluator does not produce it.
    Oversold,
    NoBias,
}

impl From<Direction> for ScenarioStatus {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Bullish => ScenarioStatus::Bullish,
            Direction::Bearish => ScenarioStatus::Bearish,
        }
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioStatus::Bullish => "BULLISH",
            ScenarioStatus::Bearish => "BEARISH",
            ScenarioStatus::Overbought => "OVERBOUGHT",
            ScenarioStatus::Oversold => "OVERSOLD",
            ScenarioStatus::NoBias => "NO_BIAS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: f64,
    #[serde(default)]
    pub factors: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioEvaluation {
    pub scenario_id: String,
    pub status: ScenarioStatus,
    /// Percentage of filters that passed, 0..=100.
    pub confidence: f64,
    pub probability: f64,
    pub risk: RiskAssessment,
    /// Filter id to pass/fail.
    pub filters: BTreeMap<String, bool>,
    pub passed_count: usize,
    pub total_count: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ScenarioEvaluation {
    /// A result with no directional call and nothing evaluated.
    pub fn no_bias(
        scenario_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        risk: RiskAssessment,
        message: impl Into<String>,
    ) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            status: ScenarioStatus::NoBias,
            confidence: 0.0,
            probability: 0.0,
            risk,
            filters: BTreeMap::new(),
            passed_count: 0,
            total_count: 0,
            timestamp,
            message: Some(message.into()),
        }
    }

    pub fn is_directional(&self) -> bool {
        matches!(self.status, ScenarioStatus::Bullish | ScenarioStatus::Bearish)
    }
}

/// Group evaluations by status, keeping input order within each group.
pub fn group_by_status(
    evaluations: &[ScenarioEvaluation],
) -> BTreeMap<ScenarioStatus, Vec<&ScenarioEvaluation>> {
    let mut groups: BTreeMap<ScenarioStatus, Vec<&ScenarioEvaluation>> = BTreeMap::new();
    for evaluation in evaluations {
        groups.entry(evaluation.status).or_default().push(evaluation);
    }
    groups
}
