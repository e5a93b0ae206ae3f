//! Numeric keywords.

use std::cmp::Ordering;

use serde_json::{json, Map, Number, Value};

use super::checkers::{ExclusiveModifier, NumberValue, PositiveNumber};
use super::{construction_error, KeywordValidator};
use crate::context::ValidationContext;
use crate::digest::{FnDigester, SimpleDigester};
use crate::error::EngineError;
use crate::library::{Keyword, LibraryBuilder};
use crate::types::{integer_value, Dialect, TypeSet};

pub(crate) fn register(builder: &mut LibraryBuilder, dialect: Dialect) {
    builder.add_keyword(
        Keyword::new("multipleOf")
            .with_syntax(PositiveNumber)
            .with_digester(SimpleDigester::new("multipleOf", TypeSet::NUMERIC))
            .with_validator(MultipleOf::from_fragment),
    );

    match dialect {
        Dialect::Draft4 => {
            builder
                .add_keyword(
                    Keyword::new("minimum")
                        .with_syntax(NumberValue)
                        .with_digester(bound_digester("minimum", Some("exclusiveMinimum")))
                        .with_validator(Minimum::from_fragment),
                )
                .add_keyword(
                    Keyword::new("maximum")
                        .with_syntax(NumberValue)
                        .with_digester(bound_digester("maximum", Some("exclusiveMaximum")))
                        .with_validator(Maximum::from_fragment),
                )
                .add_keyword(
                    Keyword::new("exclusiveMinimum")
                        .with_syntax(ExclusiveModifier { sibling: "minimum" }),
                )
                .add_keyword(
                    Keyword::new("exclusiveMaximum")
                        .with_syntax(ExclusiveModifier { sibling: "maximum" }),
                );
        }
        Dialect::Draft7 => {
            builder
                .add_keyword(
                    Keyword::new("minimum")
                        .with_syntax(NumberValue)
                        .with_digester(bound_digester("minimum", None))
                        .with_validator(Minimum::from_fragment),
                )
                .add_keyword(
                    Keyword::new("maximum")
                        .with_syntax(NumberValue)
                        .with_digester(bound_digester("maximum", None))
                        .with_validator(Maximum::from_fragment),
                )
                .add_keyword(
                    Keyword::new("exclusiveMinimum")
                        .with_syntax(NumberValue)
                        .with_digester(exclusive_digester("exclusiveMinimum"))
                        .with_validator(Minimum::from_fragment),
                )
                .add_keyword(
                    Keyword::new("exclusiveMaximum")
                        .with_syntax(NumberValue)
                        .with_digester(exclusive_digester("exclusiveMaximum"))
                        .with_validator(Maximum::from_fragment),
                );
        }
    }
}

/// `{"limit": n, "exclusive": bool}` for `keyword`, reading the draft-04
/// boolean modifier when there is one.
fn bound_digester(keyword: &'static str, modifier: Option<&'static str>) -> FnDigester {
    FnDigester::new(TypeSet::NUMERIC, move |schema: &Map<String, Value>| {
        let exclusive = modifier
            .and_then(|m| schema.get(m))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        json!({"limit": schema.get(keyword), "exclusive": exclusive})
    })
}

fn exclusive_digester(keyword: &'static str) -> FnDigester {
    FnDigester::new(TypeSet::NUMERIC, move |schema: &Map<String, Value>| {
        json!({"limit": schema.get(keyword), "exclusive": true})
    })
}

/// Compare two JSON numbers, exactly when both are integral.
fn compare(a: &Number, b: &Number) -> Ordering {
    match (integer_value(a), integer_value(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
    }
}

fn bound(keyword: &str, fragment: &Value) -> Result<(Number, bool), EngineError> {
    let limit = match fragment.get("limit") {
        Some(Value::Number(n)) => n.clone(),
        _ => return Err(construction_error(keyword, "expected a numeric limit")),
    };
    let exclusive = fragment
        .get("exclusive")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok((limit, exclusive))
}

/// `minimum` (and draft-07 `exclusiveMinimum`).
#[derive(Debug, Clone)]
pub struct Minimum {
    limit: Number,
    exclusive: bool,
}

impl Minimum {
    fn from_fragment(fragment: &Value) -> Result<Self, EngineError> {
        let (limit, exclusive) = bound("minimum", fragment)?;
        Ok(Self { limit, exclusive })
    }
}

impl KeywordValidator for Minimum {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Value::Number(n) = instance else {
            return Ok(());
        };
        let message = match compare(n, &self.limit) {
            Ordering::Less => "numeric instance is lower than the required minimum",
            Ordering::Equal if self.exclusive => {
                "numeric instance is not strictly greater than the required minimum"
            }
            _ => return Ok(()),
        };
        let message = ctx
            .error(format!("{} (minimum: {}, found: {})", message, self.limit, n))
            .put("minimum", Value::Number(self.limit.clone()))
            .put("found", Value::Number(n.clone()));
        ctx.push(message);
        Ok(())
    }
}

/// `maximum` (and draft-07 `exclusiveMaximum`).
#[derive(Debug, Clone)]
pub struct Maximum {
    limit: Number,
    exclusive: bool,
}

impl Maximum {
    fn from_fragment(fragment: &Value) -> Result<Self, EngineError> {
        let (limit, exclusive) = bound("maximum", fragment)?;
        Ok(Self { limit, exclusive })
    }
}

impl KeywordValidator for Maximum {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Value::Number(n) = instance else {
            return Ok(());
        };
        let message = match compare(n, &self.limit) {
            Ordering::Greater => "numeric instance is greater than the required maximum",
            Ordering::Equal if self.exclusive => {
                "numeric instance is not strictly lower than the required maximum"
            }
            _ => return Ok(()),
        };
        let message = ctx
            .error(format!("{} (maximum: {}, found: {})", message, self.limit, n))
            .put("maximum", Value::Number(self.limit.clone()))
            .put("found", Value::Number(n.clone()));
        ctx.push(message);
        Ok(())
    }
}

/// `multipleOf`
#[derive(Debug, Clone)]
pub struct MultipleOf {
    divisor: Number,
}

impl MultipleOf {
    fn from_fragment(fragment: &Value) -> Result<Self, EngineError> {
        match fragment {
            Value::Number(n) if n.as_f64().is_some_and(|f| f > 0.0) => Ok(Self {
                divisor: n.clone(),
            }),
            _ => Err(construction_error("multipleOf", "expected a positive number")),
        }
    }

    fn divides(&self, n: &Number) -> bool {
        if let (Some(value), Some(divisor)) = (integer_value(n), integer_value(&self.divisor)) {
            return divisor != 0 && value % divisor == 0;
        }
        let (Some(value), Some(divisor)) = (n.as_f64(), self.divisor.as_f64()) else {
            return false;
        };
        let ratio = value / divisor;
        if !ratio.is_finite() {
            return false;
        }
        (ratio - ratio.round()).abs() <= f64::EPSILON * 8.0 * ratio.abs().max(1.0)
    }
}

impl KeywordValidator for MultipleOf {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Value::Number(n) = instance else {
            return Ok(());
        };
        if !self.divides(n) {
            let message = ctx
                .error(format!(
                    "numeric instance is not a multiple of {} (found: {})",
                    self.divisor, n
                ))
                .put("divisor", Value::Number(self.divisor.clone()))
                .put("found", Value::Number(n.clone()));
            ctx.push(message);
        }
        Ok(())
    }
}
