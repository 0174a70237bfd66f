//! Field expression parser.
//!
//! Recursive descent over the expression grammar:
//!
//! ```text
//! expression := term (('*' | '/') number)*
//! term       := number | field_ref | identifier
//! field_ref  := timeframe '_' period '_' field      e.g. 1D_P0_open, 2H_P1_sma_89
//! ```
//!
//! Errors carry the character offset of the offending token.

use crate::domain::error::ParseError;
use crate::domain::field_ref::{Expression, Field, FieldRef, ScaleOp};
use crate::domain::timeframe::{Period, Timeframe};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn error(&self, message: impl Into<String>, position: usize) -> ParseError {
        ParseError {
            message: message.into(),
            position,
        }
    }

    /// Consume a token made of alphanumerics, `_`, `.` and a leading sign.
    /// A sign right after the exponent marker of a number (`1e-3`) stays in the token.
    fn take_token(&mut self) -> (&'a str, usize) {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.advance();
        }
        loop {
            match self.peek() {
                Some(ch) if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' => {
                    self.advance();
                }
                Some('-') | Some('+') if self.after_exponent_marker(start) => {
                    self.advance();
                }
                _ => break,
            }
        }
        (&self.input[start..self.pos], start)
    }

    /// True when the token so far is a number ending in `e`/`E` (`2.5E`, `-1e`).
    fn after_exponent_marker(&self, start: usize) -> bool {
        let token = &self.input[start..self.pos];
        let Some(mantissa) = token.strip_suffix(['e', 'E']) else {
            return false;
        };
        let digits = mantissa.trim_start_matches(['-', '+']);
        digits.ends_with(|c: char| c.is_ascii_digit() || c == '.')
            && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
    }

    fn describe_next(&self) -> String {
        self.peek()
            .map(|c| format!("'{}'", c))
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let (token, start) = self.take_token();
        if token.is_empty() {
            return Err(self.error(format!("expected number, found {}", self.describe_next()), start));
        }
        parse_literal(token).ok_or_else(|| self.error(format!("invalid number: {}", token), start))
    }

    fn parse_term(&mut self) -> Result<Expression, ParseError> {
        self.skip_whitespace();
        let (token, start) = self.take_token();
        if token.is_empty() {
            return Err(self.error(
                format!("expected field or number, found {}", self.describe_next()),
                start,
            ));
        }

        let tf_prefix = token.split_once('_').map(|(tf, _)| tf);
        if tf_prefix.and_then(Timeframe::from_code).is_some() {
            return parse_field_ref(token, start).map(Expression::Field);
        }

        let first = token.chars().next().unwrap_or_default();
        if first.is_ascii_digit() || matches!(first, '-' | '+' | '.') {
            return parse_literal(token)
                .map(Expression::Literal)
                .ok_or_else(|| self.error(format!("invalid number: {}", token), start));
        }

        if (first.is_ascii_alphabetic() || first == '_')
            && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Ok(Expression::Dynamic(token.to_string()));
        }

        Err(self.error(format!("invalid reference: {}", token), start))
    }

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_term()?;

        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('*') => ScaleOp::Mul,
                Some('/') => ScaleOp::Div,
                _ => break,
            };
            self.advance();
            let factor = self.parse_number()?;
            expr = Expression::Scaled {
                base: Box::new(expr),
                op,
                factor,
            };
        }

        Ok(expr)
    }

    fn parse(&mut self) -> Result<Expression, ParseError> {
        let expr = self.parse_expression()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(
                format!("unexpected input after expression: '{}'", self.remaining()),
                self.pos,
            ));
        }
        Ok(expr)
    }
}

fn parse_literal(token: &str) -> Option<f64> {
    let looks_numeric = token
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if !looks_numeric {
        return None;
    }
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse `<timeframe>_<period>_<field>`; `start` is the token's offset in the input.
fn parse_field_ref(token: &str, start: usize) -> Result<FieldRef, ParseError> {
    let mut parts = token.splitn(3, '_');
    let tf = parts.next().unwrap_or_default();
    let period = parts.next().unwrap_or_default();
    let field = parts.next();

    let timeframe = Timeframe::from_code(tf).ok_or_else(|| ParseError {
        message: format!("unknown timeframe '{}'", tf),
        position: start,
    })?;

    let period_pos = start + tf.len() + 1;
    let period: Period = period.parse().map_err(|reason: String| ParseError {
        message: reason,
        position: period_pos,
    })?;

    let field_pos = period_pos + period.to_string().len() + 1;
    let field = match field {
        Some(name) => Field::from_name(name).ok_or_else(|| ParseError {
            message: format!("unknown field '{}'", name),
            position: field_pos,
        })?,
        None => {
            return Err(ParseError {
                message: "expected field after period".to_string(),
                position: start + token.len(),
            });
        }
    };

    Ok(FieldRef {
        timeframe,
        period,
        field,
    })
}

pub fn parse(input: &str) -> Result<Expression, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}

/// Parse a bare field name (`close`, `sma_89`) and place it at the given cell.
pub fn parse_field_at(
    name: &str,
    timeframe: Timeframe,
    period: Period,
) -> Result<FieldRef, ParseError> {
    let trimmed = name.trim();
    let offset = name.len() - name.trim_start().len();
    let field = Field::from_name(trimmed).ok_or_else(|| ParseError {
        message: format!("unknown field '{}'", trimmed),
        position: offset,
    })?;
    Ok(FieldRef {
        timeframe,
        period,
        field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field_ref::{BandLine, IndicatorField, PriceField};

    fn field(tf: Timeframe, period: usize, field: Field) -> Expression {
        Expression::Field(FieldRef {
            timeframe: tf,
            period: Period::new(period).unwrap(),
            field,
        })
    }

    #[test]
    fn parse_plain_field_ref() {
        assert_eq!(
            parse("1D_P0_open").unwrap(),
            field(Timeframe::Daily, 0, Field::Price(PriceField::Open))
        );
    }

    #[test]
    fn parse_indicator_ref() {
        assert_eq!(
            parse("2H_P1_sma_89").unwrap(),
            field(
                Timeframe::TwoHour,
                1,
                Field::Indicator(IndicatorField::Sma(89))
            )
        );
        assert_eq!(
            parse("1W_P0_bb_upper").unwrap(),
            field(
                Timeframe::Weekly,
                0,
                Field::Indicator(IndicatorField::Bollinger(BandLine::Upper))
            )
        );
    }

    #[test]
    fn parse_multiplier() {
        let expr = parse("1D_P0_sma_89 * 0.99").unwrap();
        match expr {
            Expression::Scaled { base, op, factor } => {
                assert_eq!(op, ScaleOp::Mul);
                assert!((factor - 0.99).abs() < f64::EPSILON);
                assert_eq!(
                    *base,
                    field(Timeframe::Daily, 0, Field::Indicator(IndicatorField::Sma(89)))
                );
            }
            other => panic!("expected Scaled, got {:?}", other),
        }
    }

    #[test]
    fn parse_without_spaces() {
        assert!(matches!(
            parse("1M_P2_close*1.05").unwrap(),
            Expression::Scaled { .. }
        ));
    }

    #[test]
    fn parse_chained_scaling() {
        let expr = parse("1D_P0_close * 2 / 4").unwrap();
        assert_eq!(expr.to_string(), "1D_P0_close * 2 / 4");
    }

    #[test]
    fn parse_literals() {
        assert_eq!(parse("100").unwrap(), Expression::Literal(100.0));
        assert_eq!(parse(" -2.5 ").unwrap(), Expression::Literal(-2.5));
        assert_eq!(parse("1e3").unwrap(), Expression::Literal(1000.0));
    }

    #[test]
    fn parse_signed_exponents() {
        assert_eq!(parse("1e-3").unwrap(), Expression::Literal(0.001));
        assert_eq!(parse("2.5E+1").unwrap(), Expression::Literal(25.0));
        assert_eq!(parse("-5e-2").unwrap(), Expression::Literal(-0.05));
        assert_eq!(
            parse("vix_spot * 1e-2").unwrap(),
            Expression::Scaled {
                base: Box::new(Expression::Dynamic("vix_spot".into())),
                op: ScaleOp::Mul,
                factor: 0.01,
            }
        );
    }

    #[test]
    fn sign_after_field_ending_in_e_is_not_exponent() {
        let err = parse("1D_P0_close-1").unwrap_err();
        assert!(err.message.contains("unexpected input"));
        assert_eq!(err.position, 11);
    }

    #[test]
    fn parse_dynamic_name() {
        assert_eq!(
            parse("vix_spot").unwrap(),
            Expression::Dynamic("vix_spot".into())
        );
    }

    #[test]
    fn error_malformed_multiplier() {
        let err = parse("1D_P0_sma_89 * abc").unwrap_err();
        assert!(err.message.contains("invalid number"));
        assert_eq!(err.position, 15);
    }

    #[test]
    fn error_missing_multiplier() {
        let err = parse("1D_P0_close *").unwrap_err();
        assert!(err.message.contains("expected number"));
    }

    #[test]
    fn error_period_out_of_range() {
        let err = parse("1D_P6_close").unwrap_err();
        assert!(err.message.contains("P0..P5"));
        assert_eq!(err.position, 3);
    }

    #[test]
    fn error_unknown_field() {
        let err = parse("1D_P0_vwap").unwrap_err();
        assert!(err.message.contains("unknown field"));
        assert_eq!(err.position, 6);
    }

    #[test]
    fn error_missing_field() {
        let err = parse("2H_P0").unwrap_err();
        assert!(err.message.contains("expected field"));
    }

    #[test]
    fn unknown_timeframe_is_not_a_field_ref() {
        let err = parse("4H_P0_close").unwrap_err();
        assert!(err.message.contains("invalid number"));
    }

    #[test]
    fn error_trailing_input() {
        let err = parse("1D_P0_close 100").unwrap_err();
        assert!(err.message.contains("unexpected input"));
    }

    #[test]
    fn error_empty_input() {
        let err = parse("   ").unwrap_err();
        assert!(err.message.contains("expected field or number"));
    }

    #[test]
    fn non_finite_literals_rejected() {
        assert!(parse("1e400").is_err());
        assert_eq!(parse("inf").unwrap(), Expression::Dynamic("inf".into()));
    }

    #[test]
    fn field_at_cell() {
        let r = parse_field_at("close", Timeframe::Weekly, Period::new(2).unwrap()).unwrap();
        assert_eq!(r.to_string(), "1W_P2_close");
        assert!(parse_field_at("closing", Timeframe::Weekly, Period::CURRENT).is_err());
    }

    #[test]
    fn error_display_with_context() {
        let input = "1D_P0_close * x";
        let err = parse(input).unwrap_err();
        let ctx = err.display_with_context(input);
        assert!(ctx.contains('^'));
        assert!(ctx.contains("position"));
    }
}
