//! Typed field references and derived expressions.
//!
//! Strings such as `1D_P0_open` or `2H_P0_sma_89 * 0.99` are parsed once by
//! [`crate::domain::field_parser`] into these types; everything downstream
//! works on the typed form.
//!
//! - `Field`: a plain OHLCV value or a P0 indicator value
//! - `FieldRef`: a field at a specific timeframe and period
//! - `Expression`: literal, field reference, dynamic value, or a scaled expression

use crate::domain::timeframe::{Period, Timeframe};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BandLine {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorField {
    Sma(usize),
    SmaLow(usize),
    Ema(usize),
    Rsi(usize),
    Bollinger(BandLine),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Price(PriceField),
    Indicator(IndicatorField),
}

impl Field {
    /// Parse a bare field name: `open`..`volume`, `sma_<n>`, `sma_low_<n>`,
    /// `ema_<n>`, `rsi_<n>`, `bb_upper`, `bb_middle`, `bb_lower`.
    pub fn from_name(name: &str) -> Option<Field> {
        let field = match name {
            "open" => Field::Price(PriceField::Open),
            "high" => Field::Price(PriceField::High),
            "low" => Field::Price(PriceField::Low),
            "close" => Field::Price(PriceField::Close),
            "volume" => Field::Price(PriceField::Volume),
            "bb_upper" => Field::Indicator(IndicatorField::Bollinger(BandLine::Upper)),
            "bb_middle" => Field::Indicator(IndicatorField::Bollinger(BandLine::Middle)),
            "bb_lower" => Field::Indicator(IndicatorField::Bollinger(BandLine::Lower)),
            _ => {
                let indicator = if let Some(n) = name.strip_prefix("sma_low_") {
                    IndicatorField::SmaLow(parse_length(n)?)
                } else if let Some(n) = name.strip_prefix("sma_") {
                    IndicatorField::Sma(parse_length(n)?)
                } else if let Some(n) = name.strip_prefix("ema_") {
                    IndicatorField::Ema(parse_length(n)?)
                } else if let Some(n) = name.strip_prefix("rsi_") {
                    IndicatorField::Rsi(parse_length(n)?)
                } else {
                    return None;
                };
                Field::Indicator(indicator)
            }
        };
        Some(field)
    }
}

fn parse_length(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|&n| n > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub timeframe: Timeframe,
    pub period: Period,
    pub field: Field,
}

impl FieldRef {
    /// The same field one period further into the past.
    pub fn shifted(&self) -> Option<FieldRef> {
        Some(FieldRef {
            period: self.period.previous()?,
            ..*self
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOp {
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(f64),
    Field(FieldRef),
    /// A raw dynamic-value name looked up in the snapshot's value table.
    Dynamic(String),
    Scaled {
        base: Box<Expression>,
        op: ScaleOp,
        factor: f64,
    },
}

impl Expression {
    /// The expression evaluated one period earlier. Literals are unchanged;
    /// dynamic values carry no history and yield `None`.
    pub fn shifted(&self) -> Option<Expression> {
        match self {
            Expression::Literal(v) => Some(Expression::Literal(*v)),
            Expression::Field(r) => r.shifted().map(Expression::Field),
            Expression::Dynamic(_) => None,
            Expression::Scaled { base, op, factor } => Some(Expression::Scaled {
                base: Box::new(base.shifted()?),
                op: *op,
                factor: *factor,
            }),
        }
    }

    /// The field reference at the root of the expression, if any.
    pub fn field_ref(&self) -> Option<&FieldRef> {
        match self {
            Expression::Field(r) => Some(r),
            Expression::Scaled { base, .. } => base.field_ref(),
            Expression::Literal(_) | Expression::Dynamic(_) => None,
        }
    }

    pub fn price_field(&self) -> Option<PriceField> {
        match self.field_ref()?.field {
            Field::Price(p) => Some(p),
            Field::Indicator(_) => None,
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Volume => "volume",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Price(p) => write!(f, "{}", p),
            Field::Indicator(IndicatorField::Sma(n)) => write!(f, "sma_{}", n),
            Field::Indicator(IndicatorField::SmaLow(n)) => write!(f, "sma_low_{}", n),
            Field::Indicator(IndicatorField::Ema(n)) => write!(f, "ema_{}", n),
            Field::Indicator(IndicatorField::Rsi(n)) => write!(f, "rsi_{}", n),
            Field::Indicator(IndicatorField::Bollinger(line)) => match line {
                BandLine::Upper => f.write_str("bb_upper"),
                BandLine::Middle => f.write_str("bb_middle"),
                BandLine::Lower => f.write_str("bb_lower"),
            },
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.timeframe, self.period, self.field)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Field(r) => write!(f, "{}", r),
            Expression::Dynamic(name) => f.write_str(name),
            Expression::Scaled { base, op, factor } => {
                let sym = match op {
                    ScaleOp::Mul => '*',
                    ScaleOp::Div => '/',
                };
                write!(f, "{} {} {}", base, sym, factor)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily(period: usize, field: Field) -> FieldRef {
        FieldRef {
            timeframe: Timeframe::Daily,
            period: Period::new(period).unwrap(),
            field,
        }
    }

    #[test]
    fn field_names() {
        assert_eq!(Field::from_name("close"), Some(Field::Price(PriceField::Close)));
        assert_eq!(
            Field::from_name("sma_89"),
            Some(Field::Indicator(IndicatorField::Sma(89)))
        );
        assert_eq!(
            Field::from_name("sma_low_89"),
            Some(Field::Indicator(IndicatorField::SmaLow(89)))
        );
        assert_eq!(
            Field::from_name("bb_lower"),
            Some(Field::Indicator(IndicatorField::Bollinger(BandLine::Lower)))
        );
    }

    #[test]
    fn invalid_field_names() {
        assert_eq!(Field::from_name("sma_"), None);
        assert_eq!(Field::from_name("sma_0"), None);
        assert_eq!(Field::from_name("ema_x"), None);
        assert_eq!(Field::from_name("bb_outer"), None);
        assert_eq!(Field::from_name("Close"), None);
    }

    #[test]
    fn display_round_trips_names() {
        for name in ["open", "volume", "sma_200", "sma_low_21", "ema_9", "rsi_14", "bb_middle"] {
            assert_eq!(Field::from_name(name).unwrap().to_string(), name);
        }
    }

    #[test]
    fn field_ref_display() {
        let r = FieldRef {
            timeframe: Timeframe::TwoHour,
            period: Period::new(1).unwrap(),
            field: Field::Indicator(IndicatorField::Sma(89)),
        };
        assert_eq!(r.to_string(), "2H_P1_sma_89");
    }

    #[test]
    fn shifted_moves_one_period_back() {
        let r = daily(0, Field::Price(PriceField::Close));
        assert_eq!(r.shifted(), Some(daily(1, Field::Price(PriceField::Close))));
        assert_eq!(daily(5, Field::Price(PriceField::Close)).shifted(), None);
    }

    #[test]
    fn shifted_expression_keeps_factor() {
        let expr = Expression::Scaled {
            base: Box::new(Expression::Field(daily(0, Field::Price(PriceField::Open)))),
            op: ScaleOp::Mul,
            factor: 1.01,
        };
        let shifted = expr.shifted().unwrap();
        assert_eq!(shifted.to_string(), "1D_P1_open * 1.01");
        assert_eq!(Expression::Dynamic("vix".into()).shifted(), None);
        assert_eq!(
            Expression::Literal(3.0).shifted(),
            Some(Expression::Literal(3.0))
        );
    }

    #[test]
    fn price_field_sees_through_scaling() {
        let expr = Expression::Scaled {
            base: Box::new(Expression::Field(daily(0, Field::Price(PriceField::High)))),
            op: ScaleOp::Div,
            factor: 2.0,
        };
        assert_eq!(expr.price_field(), Some(PriceField::High));
        let ind = Expression::Field(daily(0, Field::Indicator(IndicatorField::Ema(9))));
        assert_eq!(ind.price_field(), None);
    }
}
