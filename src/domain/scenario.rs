//! Scenario configuration.
//!
//! A scenario bundles filters with trade zones and probability and risk
//! metadata. Scenarios are loaded once, compiled once into a
//! [`CompiledScenario`] and then shared read-only between evaluations.

use crate::domain::direction::{self, Direction, DirectionSource};
use crate::domain::error::ScenarioMapError;
use crate::domain::filter::{
    CompiledFilter, FilterError, FilterType, FilterValue, Operator, ScenarioFilter,
};
use crate::domain::timeframe::{Period, Timeframe};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ZoneType {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeZone {
    #[serde(rename = "type")]
    pub zone_type: ZoneType,
    pub min_price: f64,
    pub max_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityModifier {
    pub condition: String,
    pub adjustment: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_probability: Option<f64>,
    #[serde(default)]
    pub modifiers: Vec<ProbabilityModifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
    Extreme,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Extreme => "extreme",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskConfig {
    #[serde(default)]
    pub level: RiskLevel,
    #[serde(default)]
    pub factors: Vec<String>,
    #[serde(default)]
    pub mitigation: Vec<String>,
}

/// Pre-filter condition shape. Converted to [`ScenarioFilter`] on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCondition {
    #[serde(default)]
    pub id: Option<String>,
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<FilterValue>,
    #[serde(default)]
    pub min_value: Option<FilterValue>,
    #[serde(default)]
    pub max_value: Option<FilterValue>,
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl LegacyCondition {
    /// `index` numbers conditions that carry no id of their own.
    pub fn into_filter(self, index: usize) -> ScenarioFilter {
        let id = self
            .id
            .unwrap_or_else(|| format!("condition_{}", index + 1));
        let mut filter = ScenarioFilter::new(id, self.field, self.operator);
        filter.filter_type = Some(FilterType::infer(&filter.field));
        filter.value = self.value;
        filter.min_value = self.min_value;
        filter.max_value = self.max_value;
        filter.timeframe = self.timeframe;
        filter.period = self.period;
        filter.description = self.description;
        if let Some(weight) = self.weight {
            filter.weight = weight;
        }
        filter
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub filters: Vec<ScenarioFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<LegacyCondition>,
    #[serde(default)]
    pub trade_zones: Vec<TradeZone>,
    #[serde(default)]
    pub probability: ProbabilityConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    /// Symbols the scenario applies to. Empty means every symbol.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instruments: Vec<String>,
}

impl Scenario {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            filters: Vec::new(),
            conditions: Vec::new(),
            trade_zones: Vec::new(),
            probability: ProbabilityConfig::default(),
            risk: RiskConfig::default(),
            instruments: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: ScenarioFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Explicit filters, or converted legacy conditions when there are none.
    pub fn normalized_filters(&self) -> Vec<ScenarioFilter> {
        if !self.filters.is_empty() || self.conditions.is_empty() {
            return self.filters.clone();
        }
        self.conditions
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, c)| c.into_filter(i))
            .collect()
    }

    pub fn applies_to(&self, symbol: &str) -> bool {
        self.instruments.is_empty()
            || self
                .instruments
                .iter()
                .any(|s| s.eq_ignore_ascii_case(symbol))
    }
}

/// A probability modifier condition over filter results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifierCondition {
    FilterPassed(String),
    FilterFailed(String),
    All,
    Any,
    None,
}

impl ModifierCondition {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "all" => ModifierCondition::All,
            "any" => ModifierCondition::Any,
            "none" => ModifierCondition::None,
            _ => match raw.strip_prefix('!') {
                Some(id) => ModifierCondition::FilterFailed(id.trim().to_string()),
                None => ModifierCondition::FilterPassed(raw.to_string()),
            },
        }
    }

    fn filter_id(&self) -> Option<&str> {
        match self {
            ModifierCondition::FilterPassed(id) | ModifierCondition::FilterFailed(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModifier {
    pub condition: ModifierCondition,
    pub adjustment: f64,
}

/// A filter that failed to compile. It still counts toward the total and
/// always evaluates `false`, unless it only repeats an earlier filter's id.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedFilter {
    pub id: String,
    pub error: FilterError,
}

impl RejectedFilter {
    pub fn is_duplicate(&self) -> bool {
        matches!(self.error, FilterError::DuplicateId { .. })
    }
}

#[derive(Debug, Clone)]
pub struct CompiledScenario {
    pub config: Scenario,
    pub filters: Vec<CompiledFilter>,
    pub rejected: Vec<RejectedFilter>,
    pub modifiers: Vec<CompiledModifier>,
    /// Inferred once: it depends on configuration only.
    pub direction: Option<(Direction, DirectionSource)>,
}

impl CompiledScenario {
    pub fn compile(config: Scenario) -> Self {
        let mut filters = Vec::new();
        let mut rejected = Vec::new();
        let mut seen = HashSet::new();

        for filter in config.normalized_filters() {
            if !seen.insert(filter.id.clone()) {
                warn!(scenario = %config.id, filter = %filter.id, "duplicate filter id");
                rejected.push(RejectedFilter {
                    error: FilterError::DuplicateId {
                        id: filter.id.clone(),
                    },
                    id: filter.id,
                });
                continue;
            }
            match filter.compile() {
                Ok(compiled) => filters.push(compiled),
                Err(error) => {
                    warn!(scenario = %config.id, filter = %filter.id, %error, "filter rejected");
                    rejected.push(RejectedFilter {
                        id: filter.id.clone(),
                        error,
                    });
                }
            }
        }

        let modifiers = config
            .probability
            .modifiers
            .iter()
            .map(|m| CompiledModifier {
                condition: ModifierCondition::parse(&m.condition),
                adjustment: m.adjustment,
            })
            .collect();

        let direction = direction::infer_direction(&config, &filters);

        Self {
            config,
            filters,
            rejected,
            modifiers,
            direction,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Filters with distinct ids, compiled or not.
    pub fn total_filters(&self) -> usize {
        self.filters.len() + self.rejected.iter().filter(|r| !r.is_duplicate()).count()
    }
}

/// Reject configuration mistakes that evaluation would otherwise absorb
/// silently.
pub fn validate_scenario(scenario: &Scenario) -> Result<(), ScenarioMapError> {
    let fail = |reason: String| ScenarioMapError::ScenarioInvalid {
        id: scenario.id.clone(),
        reason,
    };

    if scenario.id.trim().is_empty() {
        return Err(fail("id must not be empty".to_string()));
    }

    let filters = scenario.normalized_filters();
    let mut seen = HashSet::new();
    for filter in &filters {
        if !seen.insert(filter.id.as_str()) {
            return Err(fail(format!("duplicate filter id '{}'", filter.id)));
        }
        filter.compile().map_err(|e| fail(e.to_string()))?;
    }

    if let Some(base) = scenario.probability.base_probability {
        if !(0.0..=100.0).contains(&base) {
            return Err(fail("baseProbability must be between 0 and 100".to_string()));
        }
    }

    for modifier in &scenario.probability.modifiers {
        let condition = ModifierCondition::parse(&modifier.condition);
        if let Some(id) = condition.filter_id() {
            if !seen.contains(id) {
                return Err(fail(format!(
                    "modifier condition '{}' references unknown filter",
                    modifier.condition
                )));
            }
        }
    }

    for zone in &scenario.trade_zones {
        if zone.min_price > zone.max_price {
            return Err(fail(format!(
                "trade zone {} has minPrice above maxPrice",
                zone.label.as_deref().unwrap_or("(unlabelled)")
            )));
        }
    }

    Ok(())
}
