//! Declarative scenario filters and their compiled form.
//!
//! A `ScenarioFilter` is the configuration shape: strings and numbers as
//! they appear in a scenario file. `compile` parses every string once into
//! an [`Expression`], producing a `CompiledFilter` the evaluator can run
//! against any number of snapshots.

use crate::domain::error::ParseError;
use crate::domain::field_parser;
use crate::domain::field_ref::{Expression, Field};
use crate::domain::timeframe::{Period, Timeframe};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Ne,
    Between,
    Above,
    Below,
    CrossesAbove,
    CrossesBelow,
}

impl Operator {
    /// `gt`-like operators: the subject is expected to sit above the operand.
    pub fn is_upward(&self) -> bool {
        matches!(self, Operator::Gt | Operator::Above)
    }

    pub fn is_downward(&self) -> bool {
        matches!(self, Operator::Lt | Operator::Below)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Between => "between",
            Operator::Above => "above",
            Operator::Below => "below",
            Operator::CrossesAbove => "crosses_above",
            Operator::CrossesBelow => "crosses_below",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Price,
    Volume,
    Indicator,
    Custom,
}

impl FilterType {
    /// Classify a field by the names it mentions. Used for legacy conditions,
    /// which carry no explicit type.
    pub fn infer(field: &str) -> Self {
        let field = field.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| field.contains(w));
        if mentions(&["open", "high", "low", "close"]) {
            FilterType::Price
        } else if mentions(&["volume"]) {
            FilterType::Volume
        } else if mentions(&["rsi", "sma", "bb", "atr", "vwap"]) {
            FilterType::Indicator
        } else {
            FilterType::Custom
        }
    }
}

/// A comparison operand: a plain number or an expression string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Expression(String),
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioFilter {
    pub id: String,
    pub field: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FilterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<FilterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<FilterValue>,
    /// Timeframe for a bare `field` name such as `close` or `sma_89`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub critical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<FilterType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ScenarioFilter {
    pub fn new(id: impl Into<String>, field: impl Into<String>, operator: Operator) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            operator,
            value: None,
            min_value: None,
            max_value: None,
            timeframe: None,
            period: None,
            weight: default_weight(),
            is_required: false,
            critical: false,
            priority: None,
            filter_type: None,
            description: None,
        }
    }

    pub fn with_value(mut self, value: FilterValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_range(mut self, min: FilterValue, max: FilterValue) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn at(mut self, timeframe: Timeframe, period: Period) -> Self {
        self.timeframe = Some(timeframe);
        self.period = Some(period);
        self
    }

    /// Whether passing this filter alone can justify a directional call.
    pub fn is_flagged(&self) -> bool {
        self.critical || self.is_required || self.priority == Some(Priority::High)
    }

    pub fn compile(&self) -> Result<CompiledFilter, FilterError> {
        let subject = self.compile_subject()?;
        let target = if self.operator == Operator::Between {
            let min = self.compile_operand(self.min_value.as_ref(), "minValue")?;
            let max = self.compile_operand(self.max_value.as_ref(), "maxValue")?;
            Target::Range { min, max }
        } else {
            Target::Value(self.compile_operand(self.value.as_ref(), "value")?)
        };

        Ok(CompiledFilter {
            id: self.id.clone(),
            operator: self.operator,
            subject,
            target,
            flagged: self.is_flagged(),
        })
    }

    fn compile_subject(&self) -> Result<Expression, FilterError> {
        let bare = self.field.trim();
        if let Some(timeframe) = self.timeframe {
            if Field::from_name(bare).is_some() {
                let period = self.period.unwrap_or(Period::CURRENT);
                return field_parser::parse_field_at(bare, timeframe, period)
                    .map(Expression::Field)
                    .map_err(|source| self.expression_error(&self.field, source));
            }
        }
        field_parser::parse(&self.field).map_err(|source| self.expression_error(&self.field, source))
    }

    fn compile_operand(
        &self,
        value: Option<&FilterValue>,
        operand: &'static str,
    ) -> Result<Expression, FilterError> {
        match value {
            Some(FilterValue::Number(n)) => Ok(Expression::Literal(*n)),
            Some(FilterValue::Expression(s)) => {
                field_parser::parse(s).map_err(|source| self.expression_error(s, source))
            }
            None => Err(FilterError::MissingOperand {
                id: self.id.clone(),
                operator: self.operator,
                operand,
            }),
        }
    }

    fn expression_error(&self, input: &str, source: ParseError) -> FilterError {
        FilterError::Expression {
            id: self.id.clone(),
            input: input.to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("filter '{id}': cannot parse '{input}': {source}")]
    Expression {
        id: String,
        input: String,
        #[source]
        source: ParseError,
    },

    #[error("filter '{id}': operator {operator} requires {operand}")]
    MissingOperand {
        id: String,
        operator: Operator,
        operand: &'static str,
    },

    #[error("filter '{id}': duplicate id, only the first filter with this id is evaluated")]
    DuplicateId { id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Value(Expression),
    Range { min: Expression, max: Expression },
}

/// A filter with every expression parsed, ready to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub id: String,
    pub operator: Operator,
    pub subject: Expression,
    pub target: Target,
    pub flagged: bool,
}
