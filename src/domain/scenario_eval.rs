//! Scenario evaluation and the scenario engine.
//!
//! # Status decision
//!
//! - no filters, or none passed: `NO_BIAS`
//! - all passed, or pass rate at or above the partial-match threshold:
//!   inferred direction
//! - otherwise, a passing critical/required/high-priority filter still earns
//!   the inferred direction; without one the result is `NO_BIAS`
//!
//! Evaluation never fails. Missing scenarios, rejected filters and missing
//! data all end up in the returned record's `status` and `message`.

use crate::domain::evaluation::{RiskAssessment, ScenarioEvaluation, ScenarioStatus};
use crate::domain::filter_eval::evaluate_filter_with;
use crate::domain::market_data::ParsedMarketData;
use crate::domain::scenario::{CompiledScenario, ModifierCondition, RiskLevel, Scenario};
use crate::domain::settings::EngineSettings;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub fn evaluate_scenario(
    scenario: &CompiledScenario,
    data: &ParsedMarketData,
    settings: &EngineSettings,
) -> ScenarioEvaluation {
    let mut results = BTreeMap::new();
    let mut passed_count = 0;
    let mut flagged_passed = false;

    for filter in &scenario.filters {
        let passed = evaluate_filter_with(filter, data, settings.equality_tolerance);
        debug!(
            scenario = scenario.id(),
            filter = %filter.id,
            subject = %filter.subject,
            passed,
            "filter evaluated"
        );
        if passed {
            passed_count += 1;
            flagged_passed |= filter.flagged;
        }
        results.insert(filter.id.clone(), passed);
    }
    for rejected in scenario.rejected.iter().filter(|r| !r.is_duplicate()) {
        results.insert(rejected.id.clone(), false);
    }

    let total_count = scenario.total_filters();
    let mut notes: Vec<String> = scenario
        .rejected
        .iter()
        .map(|r| r.error.to_string())
        .collect();

    let confidence = if total_count == 0 {
        0.0
    } else {
        100.0 * passed_count as f64 / total_count as f64
    };

    let status = if total_count == 0 {
        notes.push("scenario has no filters".to_string());
        ScenarioStatus::NoBias
    } else if passed_count == 0 {
        ScenarioStatus::NoBias
    } else {
        let pass_rate = passed_count as f64 / total_count as f64;
        if passed_count == total_count
            || pass_rate >= settings.partial_match_threshold
            || flagged_passed
        {
            match scenario.direction {
                Some((direction, _)) => direction.into(),
                None => {
                    notes.push("no directional signal in scenario configuration".to_string());
                    ScenarioStatus::NoBias
                }
            }
        } else {
            ScenarioStatus::NoBias
        }
    };

    let probability = probability(scenario, &results, passed_count, total_count, settings);

    info!(
        scenario = scenario.id(),
        symbol = %data.symbol,
        %status,
        passed = passed_count,
        total = total_count,
        "scenario evaluated"
    );

    ScenarioEvaluation {
        scenario_id: scenario.config.id.clone(),
        status,
        confidence,
        probability,
        risk: risk(&scenario.config, settings),
        filters: results,
        passed_count,
        total_count,
        timestamp: data.timestamp,
        message: if notes.is_empty() {
            None
        } else {
            Some(notes.join("; "))
        },
    }
}

fn probability(
    scenario: &CompiledScenario,
    results: &BTreeMap<String, bool>,
    passed_count: usize,
    total_count: usize,
    settings: &EngineSettings,
) -> f64 {
    let base = scenario
        .config
        .probability
        .base_probability
        .unwrap_or(settings.default_base_probability);

    let adjustment: f64 = scenario
        .modifiers
        .iter()
        .filter(|m| match &m.condition {
            ModifierCondition::FilterPassed(id) => results.get(id) == Some(&true),
            ModifierCondition::FilterFailed(id) => results.get(id) == Some(&false),
            ModifierCondition::All => total_count > 0 && passed_count == total_count,
            ModifierCondition::Any => passed_count > 0,
            ModifierCondition::None => passed_count == 0,
        })
        .map(|m| m.adjustment)
        .sum();

    (base + adjustment).clamp(0.0, 100.0)
}

fn risk(config: &Scenario, settings: &EngineSettings) -> RiskAssessment {
    RiskAssessment {
        level: config.risk.level,
        score: settings.default_risk_score,
        factors: config.risk.factors.clone(),
        recommendations: config.risk.mitigation.clone(),
    }
}

/// Compiled scenario catalog plus the settings to evaluate it with.
///
/// Built once from configuration and shared; evaluation takes `&self`.
pub struct ScenarioEngine {
    scenarios: Vec<Arc<CompiledScenario>>,
    index: HashMap<String, usize>,
    settings: EngineSettings,
}

impl ScenarioEngine {
    pub fn new(scenarios: Vec<Scenario>, settings: EngineSettings) -> Self {
        let mut compiled = Vec::with_capacity(scenarios.len());
        let mut index = HashMap::new();

        for scenario in scenarios {
            if index.contains_key(&scenario.id) {
                warn!(scenario = %scenario.id, "duplicate scenario id, keeping the first");
                continue;
            }
            index.insert(scenario.id.clone(), compiled.len());
            compiled.push(Arc::new(CompiledScenario::compile(scenario)));
        }

        info!(scenarios = compiled.len(), "scenario engine ready");

        Self {
            scenarios: compiled,
            index,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn scenario(&self, id: &str) -> Option<Arc<CompiledScenario>> {
        self.index.get(id).map(|&i| Arc::clone(&self.scenarios[i]))
    }

    /// Catalog ids in load order.
    pub fn scenario_ids(&self) -> impl Iterator<Item = &str> {
        self.scenarios.iter().map(|s| s.id())
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Evaluate one scenario by id. An unknown id yields `NO_BIAS` with a message.
    pub fn evaluate(&self, id: &str, data: &ParsedMarketData) -> ScenarioEvaluation {
        match self.index.get(id) {
            Some(&i) => evaluate_scenario(&self.scenarios[i], data, &self.settings),
            None => {
                warn!(scenario = id, "scenario not found");
                ScenarioEvaluation::no_bias(
                    id,
                    data.timestamp,
                    RiskAssessment {
                        level: RiskLevel::default(),
                        score: self.settings.default_risk_score,
                        factors: Vec::new(),
                        recommendations: Vec::new(),
                    },
                    format!("scenario '{}' not found", id),
                )
            }
        }
    }

    /// Evaluate every scenario that applies to the snapshot's symbol, in catalog order.
    pub fn evaluate_all(&self, data: &ParsedMarketData) -> Vec<ScenarioEvaluation> {
        self.scenarios
            .iter()
            .filter(|s| s.config.applies_to(&data.symbol))
            .map(|s| evaluate_scenario(s, data, &self.settings))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::{FilterValue, Operator, Priority, ScenarioFilter};
    use crate::domain::market_data::{Indicators, PeriodBar, TimeframeSeries};
    use crate::domain::scenario::{ProbabilityModifier, TradeZone, ZoneType};
    use crate::domain::timeframe::Timeframe;
    use chrono::{TimeZone, Utc};

    fn data(close: f64) -> ParsedMarketData {
        let bar = PeriodBar {
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
            timestamp: None,
        };
        ParsedMarketData::new("SPY", Utc.with_ymd_and_hms(2024, 3, 1, 21, 0, 0).unwrap())
            .with_series(
                Timeframe::Daily,
                TimeframeSeries::new(vec![bar], Indicators::default()),
            )
    }

    fn gt(id: &str, threshold: f64) -> ScenarioFilter {
        ScenarioFilter::new(id, "1D_P0_close", Operator::Gt)
            .with_value(FilterValue::Number(threshold))
    }

    fn compile(s: Scenario) -> CompiledScenario {
        CompiledScenario::compile(s)
    }

    #[test]
    fn full_match_uses_direction() {
        let s = compile(Scenario::new("support-bounce", "Support Bounce").with_filter(gt("a", 50.0)));
        let e = evaluate_scenario(&s, &data(100.0), &EngineSettings::default());
        assert_eq!(e.status, ScenarioStatus::Bullish);
        assert_eq!(e.confidence, 100.0);
        assert_eq!(e.passed_count, 1);
        assert_eq!(e.message, None);
    }

    #[test]
    fn no_filters_is_no_bias() {
        let s = compile(Scenario::new("support-bounce", "Support Bounce"));
        let e = evaluate_scenario(&s, &data(100.0), &EngineSettings::default());
        assert_eq!(e.status, ScenarioStatus::NoBias);
        assert_eq!(e.confidence, 0.0);
        assert!(e.message.unwrap().contains("no filters"));
    }

    #[test]
    fn nothing_passed_is_no_bias() {
        let s = compile(Scenario::new("support-bounce", "").with_filter(gt("a", 500.0)));
        let e = evaluate_scenario(&s, &data(100.0), &EngineSettings::default());
        assert_eq!(e.status, ScenarioStatus::NoBias);
        assert_eq!(e.filters["a"], false);
    }

    #[test]
    fn partial_below_threshold_needs_flagged_filter() {
        let scenario = Scenario::new("support-bounce", "")
            .with_filter(gt("a", 50.0))
            .with_filter(gt("b", 500.0))
            .with_filter(gt("c", 500.0));
        let e = evaluate_scenario(&compile(scenario.clone()), &data(100.0), &EngineSettings::default());
        assert_eq!(e.status, ScenarioStatus::NoBias);
        assert!((e.confidence - 100.0 / 3.0).abs() < 1e-9);

        let mut flagged = scenario;
        flagged.filters[0].priority = Some(Priority::High);
        let e = evaluate_scenario(&compile(flagged), &data(100.0), &EngineSettings::default());
        assert_eq!(e.status, ScenarioStatus::Bullish);
    }

    #[test]
    fn flagged_filter_that_failed_does_not_count() {
        let mut scenario = Scenario::new("support-bounce", "")
            .with_filter(gt("a", 50.0))
            .with_filter(gt("b", 500.0))
            .with_filter(gt("c", 500.0));
        scenario.filters[1].is_required = true;
        let e = evaluate_scenario(&compile(scenario), &data(100.0), &EngineSettings::default());
        assert_eq!(e.status, ScenarioStatus::NoBias);
    }

    #[test]
    fn threshold_is_configurable() {
        let scenario = Scenario::new("support-bounce", "")
            .with_filter(gt("a", 50.0))
            .with_filter(gt("b", 500.0))
            .with_filter(gt("c", 500.0));
        let settings = EngineSettings {
            partial_match_threshold: 0.3,
            ..EngineSettings::default()
        };
        let e = evaluate_scenario(&compile(scenario), &data(100.0), &settings);
        assert_eq!(e.status, ScenarioStatus::Bullish);
    }

    #[test]
    fn no_direction_is_no_bias_with_message() {
        let s = compile(Scenario::new("sma-alignment", "SMA Alignment").with_filter(
            ScenarioFilter::new("a", "1D_P0_close", Operator::Gte).with_value(FilterValue::Number(1.0)),
        ));
        let e = evaluate_scenario(&s, &data(100.0), &EngineSettings::default());
        assert_eq!(e.status, ScenarioStatus::NoBias);
        assert_eq!(e.confidence, 100.0);
        assert!(e.message.unwrap().contains("no directional signal"));
    }

    #[test]
    fn trade_zones_give_direction() {
        let mut scenario = Scenario::new("sma-alignment", "").with_filter(gt("a", 50.0));
        scenario.trade_zones.push(TradeZone {
            zone_type: ZoneType::Sell,
            min_price: 100.0,
            max_price: 101.0,
            label: None,
        });
        let e = evaluate_scenario(&compile(scenario), &data(100.0), &EngineSettings::default());
        assert_eq!(e.status, ScenarioStatus::Bearish);
    }

    #[test]
    fn rejected_filter_counts_as_failed() {
        let scenario = Scenario::new("support-bounce", "")
            .with_filter(gt("a", 50.0))
            .with_filter(
                ScenarioFilter::new("broken", "1D_P0_close", Operator::Gt)
                    .with_value(FilterValue::Expression("1D_P0_sma_89 * abc".into())),
            );
        let e = evaluate_scenario(&compile(scenario), &data(100.0), &EngineSettings::default());
        assert_eq!(e.total_count, 2);
        assert_eq!(e.filters["broken"], false);
        assert_eq!(e.status, ScenarioStatus::Bullish);
        assert!(e.message.unwrap().contains("broken"));
    }

    #[test]
    fn duplicate_filter_id_keeps_record_consistent() {
        let mut scenario = Scenario::new("support-bounce", "")
            .with_filter(gt("a", 50.0))
            .with_filter(gt("a", 500.0));
        scenario.probability.modifiers.push(ProbabilityModifier {
            condition: "a".into(),
            adjustment: 10.0,
            description: None,
        });
        let e = evaluate_scenario(&compile(scenario), &data(100.0), &EngineSettings::default());

        assert_eq!(e.filters.len(), e.total_count);
        assert_eq!(e.passed_count, e.filters.values().filter(|&&p| p).count());
        assert_eq!(e.filters["a"], true);
        assert_eq!(e.total_count, 1);
        assert_eq!(e.confidence, 100.0);
        assert_eq!(e.status, ScenarioStatus::Bullish);
        assert_eq!(e.probability, 60.0);
        assert!(e.message.unwrap().contains("duplicate id"));
    }

    #[test]
    fn probability_modifiers() {
        let mut scenario = Scenario::new("support-bounce", "")
            .with_filter(gt("a", 50.0))
            .with_filter(gt("b", 500.0));
        scenario.probability.base_probability = Some(60.0);
        for (condition, adjustment) in [("a", 10.0), ("!b", 5.0), ("b", 100.0), ("all", 7.0), ("any", 2.0), ("none", -50.0)] {
            scenario.probability.modifiers.push(ProbabilityModifier {
                condition: condition.into(),
                adjustment,
                description: None,
            });
        }
        let e = evaluate_scenario(&compile(scenario), &data(100.0), &EngineSettings::default());
        assert_eq!(e.probability, 77.0);
    }

    #[test]
    fn probability_is_clamped_and_defaults() {
        let mut scenario = Scenario::new("support-bounce", "").with_filter(gt("a", 50.0));
        scenario.probability.modifiers.push(ProbabilityModifier {
            condition: "a".into(),
            adjustment: 80.0,
            description: None,
        });
        let e = evaluate_scenario(&compile(scenario.clone()), &data(100.0), &EngineSettings::default());
        assert_eq!(e.probability, 100.0);

        scenario.probability.modifiers[0].adjustment = -80.0;
        let e = evaluate_scenario(&compile(scenario), &data(100.0), &EngineSettings::default());
        assert_eq!(e.probability, 0.0);
    }

    #[test]
    fn risk_comes_from_config_and_settings() {
        let mut scenario = Scenario::new("support-bounce", "").with_filter(gt("a", 50.0));
        scenario.risk.level = RiskLevel::High;
        scenario.risk.mitigation = vec!["tight stop".into()];
        let settings = EngineSettings {
            default_risk_score: 35.0,
            ..EngineSettings::default()
        };
        let e = evaluate_scenario(&compile(scenario), &data(100.0), &settings);
        assert_eq!(e.risk.level, RiskLevel::High);
        assert_eq!(e.risk.score, 35.0);
        assert_eq!(e.risk.recommendations, vec!["tight stop".to_string()]);
    }

    #[test]
    fn engine_evaluates_by_id() {
        let engine = ScenarioEngine::new(
            vec![Scenario::new("support-bounce", "").with_filter(gt("a", 50.0))],
            EngineSettings::default(),
        );
        let e = engine.evaluate("support-bounce", &data(100.0));
        assert_eq!(e.status, ScenarioStatus::Bullish);

        let missing = engine.evaluate("nope", &data(100.0));
        assert_eq!(missing.status, ScenarioStatus::NoBias);
        assert_eq!(missing.message.as_deref(), Some("scenario 'nope' not found"));
    }

    #[test]
    fn engine_skips_duplicates_and_other_instruments() {
        let mut spx_only = Scenario::new("spx-breakout", "").with_filter(gt("a", 50.0));
        spx_only.instruments = vec!["SPX".into()];
        let engine = ScenarioEngine::new(
            vec![
                Scenario::new("support-bounce", "").with_filter(gt("a", 50.0)),
                Scenario::new("support-bounce", "second").with_filter(gt("a", 500.0)),
                spx_only,
            ],
            EngineSettings::default(),
        );
        assert_eq!(engine.len(), 2);
        assert_eq!(
            engine.scenario_ids().collect::<Vec<_>>(),
            vec!["support-bounce", "spx-breakout"]
        );
        assert_eq!(engine.scenario("support-bounce").unwrap().config.name, "");

        let all = engine.evaluate_all(&data(100.0));
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].scenario_id, "support-bounce");
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ScenarioEngine>();
    }
}
