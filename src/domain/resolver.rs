//! Resolves typed expressions against a market data snapshot.
//!
//! Resolution never fails loudly: an absent timeframe, a period beyond the
//! available history, an indicator requested off `P0`, an unknown dynamic
//! value or a non-finite result all yield `None`.

use crate::domain::field_parser;
use crate::domain::field_ref::{Expression, Field, FieldRef, PriceField, ScaleOp};
use crate::domain::market_data::ParsedMarketData;

pub fn resolve(expr: &Expression, data: &ParsedMarketData) -> Option<f64> {
    let value = match expr {
        Expression::Literal(v) => *v,
        Expression::Field(field_ref) => resolve_ref(field_ref, data)?,
        Expression::Dynamic(name) => data.value(name)?,
        Expression::Scaled { base, op, factor } => {
            let base = resolve(base, data)?;
            match op {
                ScaleOp::Mul => base * factor,
                ScaleOp::Div if *factor == 0.0 => return None,
                ScaleOp::Div => base / factor,
            }
        }
    };
    Some(value).filter(|v| v.is_finite())
}

pub fn resolve_ref(field_ref: &FieldRef, data: &ParsedMarketData) -> Option<f64> {
    let series = data.series(field_ref.timeframe)?;
    let value = match field_ref.field {
        Field::Price(price) => {
            let bar = series.period(field_ref.period)?;
            match price {
                PriceField::Open => bar.open,
                PriceField::High => bar.high,
                PriceField::Low => bar.low,
                PriceField::Close => bar.close,
                PriceField::Volume => bar.volume,
            }
        }
        Field::Indicator(indicator) => {
            if !field_ref.period.is_current() {
                return None;
            }
            series.indicators().lookup(indicator)?
        }
    };
    Some(value).filter(|v| v.is_finite())
}

/// Parse and resolve a raw expression string. A malformed string is just
/// another way of having no value.
pub fn resolve_field(input: &str, data: &ParsedMarketData) -> Option<f64> {
    let expr = field_parser::parse(input).ok()?;
    resolve(&expr, data)
}
