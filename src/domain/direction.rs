//! Best-effort direction heuristic for a scenario.
//!
//! Directions are read off the configuration, in this order, stopping at the
//! first source that gives a clear answer:
//!
//! 1. keywords in the scenario id and name
//! 2. majority of BUY vs SELL trade zones
//! 3. majority of upward comparisons on close/open/high vs downward
//!    comparisons on close/open/low
//!
//! A tie at any step falls through to the next. This is a naming
//! convention, not an analysis of the filters: a scenario called
//! "sell the rip" is bearish regardless of what its filters test.

use crate::domain::field_ref::PriceField;
use crate::domain::filter::CompiledFilter;
use crate::domain::scenario::{Scenario, ZoneType};
use serde::Serialize;
use std::cmp::Ordering;

const BULLISH_TOKENS: [&str; 6] = ["above", "breakout", "bounce", "oversold", "support", "buy"];
const BEARISH_TOKENS: [&str; 5] = ["below", "breakdown", "overbought", "resistance", "sell"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Bullish,
    Bearish,
}

/// Which rule produced the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionSource {
    Naming,
    TradeZones,
    FilterOperators,
}

pub fn infer_direction(
    scenario: &Scenario,
    filters: &[CompiledFilter],
) -> Option<(Direction, DirectionSource)> {
    from_naming(scenario)
        .map(|d| (d, DirectionSource::Naming))
        .or_else(|| from_trade_zones(scenario).map(|d| (d, DirectionSource::TradeZones)))
        .or_else(|| from_filter_operators(filters).map(|d| (d, DirectionSource::FilterOperators)))
}

fn majority(bullish: usize, bearish: usize) -> Option<Direction> {
    match bullish.cmp(&bearish) {
        Ordering::Greater => Some(Direction::Bullish),
        Ordering::Less => Some(Direction::Bearish),
        Ordering::Equal => None,
    }
}

fn from_naming(scenario: &Scenario) -> Option<Direction> {
    let text = format!("{} {}", scenario.id, scenario.name).to_lowercase();
    let count = |tokens: &[&str]| tokens.iter().filter(|t| text.contains(*t)).count();
    majority(count(&BULLISH_TOKENS), count(&BEARISH_TOKENS))
}

fn from_trade_zones(scenario: &Scenario) -> Option<Direction> {
    let buys = scenario
        .trade_zones
        .iter()
        .filter(|z| z.zone_type == ZoneType::Buy)
        .count();
    let sells = scenario.trade_zones.len() - buys;
    majority(buys, sells)
}

fn from_filter_operators(filters: &[CompiledFilter]) -> Option<Direction> {
    let mut up = 0;
    let mut down = 0;
    for filter in filters {
        let Some(price) = filter.subject.price_field() else {
            continue;
        };
        if filter.operator.is_upward()
            && matches!(price, PriceField::Close | PriceField::Open | PriceField::High)
        {
            up += 1;
        } else if filter.operator.is_downward()
            && matches!(price, PriceField::Close | PriceField::Open | PriceField::Low)
        {
            down += 1;
        }
    }
    majority(up, down)
}
