//! Filter evaluation.
//!
//! # Evaluation Semantics
//!
//! - Any operand that does not resolve makes the filter `false`
//! - `gt`/`lt`/`gte`/`lte`: plain numeric comparison; `above`/`below` alias `gt`/`lt`
//! - `eq`/`ne`: absolute tolerance (default 0.01)
//! - `between`: inclusive on both ends; `min > max` is always `false`
//! - `crosses_above`/`crosses_below`: the subject one period earlier must sit on
//!   the other side of the same operand value

use crate::domain::filter::{CompiledFilter, Operator, Target};
use crate::domain::market_data::ParsedMarketData;
use crate::domain::resolver::resolve;

pub const DEFAULT_EQUALITY_TOLERANCE: f64 = 0.01;

pub fn evaluate_filter(filter: &CompiledFilter, data: &ParsedMarketData) -> bool {
    evaluate_filter_with(filter, data, DEFAULT_EQUALITY_TOLERANCE)
}

pub fn evaluate_filter_with(
    filter: &CompiledFilter,
    data: &ParsedMarketData,
    tolerance: f64,
) -> bool {
    let Some(current) = resolve(&filter.subject, data) else {
        return false;
    };

    match (&filter.target, filter.operator) {
        (Target::Range { min, max }, Operator::Between) => {
            let (Some(min), Some(max)) = (resolve(min, data), resolve(max, data)) else {
                return false;
            };
            min <= max && current >= min && current <= max
        }
        (Target::Value(operand), op) => {
            let Some(operand) = resolve(operand, data) else {
                return false;
            };
            match op {
                Operator::Gt | Operator::Above => current > operand,
                Operator::Lt | Operator::Below => current < operand,
                Operator::Gte => current >= operand,
                Operator::Lte => current <= operand,
                Operator::Eq => (current - operand).abs() < tolerance,
                Operator::Ne => (current - operand).abs() >= tolerance,
                Operator::CrossesAbove => {
                    previous(filter, data).is_some_and(|prev| current > operand && prev <= operand)
                }
                Operator::CrossesBelow => {
                    previous(filter, data).is_some_and(|prev| current < operand && prev >= operand)
                }
                Operator::Between => false,
            }
        }
        (Target::Range { .. }, _) => false,
    }
}

/// The subject resolved one period further into the past.
fn previous(filter: &CompiledFilter, data: &ParsedMarketData) -> Option<f64> {
    let shifted = filter.subject.shifted()?;
    resolve(&shifted, data)
}
