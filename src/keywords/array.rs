//! Array keywords.
//!
//! `items` and the schema form of `additionalItems` are applied to elements
//! by the container recursion in [`crate::context`]; the validators here only
//! look at the array itself, except `contains`.

use serde_json::{json, Map, Value};

use super::checkers::{BooleanOrSchema, BooleanValue, Items, NonNegativeInteger, SchemaValue};
use super::{construction_error, reports_field, u64_value, KeywordValidator, Phase};
use crate::context::ValidationContext;
use crate::digest::{FnDigester, SimpleDigester};
use crate::error::EngineError;
use crate::library::{Keyword, LibraryBuilder};
use crate::types::{json_equal, Dialect, TypeSet};

pub(crate) fn register(builder: &mut LibraryBuilder, dialect: Dialect) {
    builder
        .add_keyword(Keyword::new("items").with_syntax(Items))
        .add_keyword(
            Keyword::new("additionalItems")
                .with_syntax(BooleanOrSchema)
                .with_digester(FnDigester::new(TypeSet::ARRAY, additional_items_digest))
                .with_validator(AdditionalItems::from_fragment),
        )
        .add_keyword(
            Keyword::new("minItems")
                .with_syntax(NonNegativeInteger)
                .with_digester(SimpleDigester::new("minItems", TypeSet::ARRAY))
                .with_validator(|fragment| {
                    Ok(MinItems {
                        limit: u64_value("minItems", fragment)?,
                    })
                }),
        )
        .add_keyword(
            Keyword::new("maxItems")
                .with_syntax(NonNegativeInteger)
                .with_digester(SimpleDigester::new("maxItems", TypeSet::ARRAY))
                .with_validator(|fragment| {
                    Ok(MaxItems {
                        limit: u64_value("maxItems", fragment)?,
                    })
                }),
        )
        .add_keyword(
            Keyword::new("uniqueItems")
                .with_syntax(BooleanValue)
                .with_digester(SimpleDigester::new("uniqueItems", TypeSet::ARRAY))
                .with_validator(|fragment: &Value| {
                    Ok(UniqueItems {
                        enabled: fragment.as_bool().unwrap_or(false),
                    })
                }),
        );

    if dialect == Dialect::Draft7 {
        builder.add_keyword(
            Keyword::new("contains")
                .with_syntax(SchemaValue)
                .with_digester(SimpleDigester::new("contains", TypeSet::ARRAY))
                .with_validator(|_| Ok(Contains)),
        );
    }
}

/// Whether extra elements are allowed, and how many elements the tuple
/// form of `items` covers (`null` for the single-schema form).
fn additional_items_digest(schema: &Map<String, Value>) -> Value {
    let allowed = !matches!(schema.get("additionalItems"), Some(Value::Bool(false)));
    let tuple = match schema.get("items") {
        Some(Value::Array(items)) => json!(items.len()),
        _ => Value::Null,
    };
    json!({"allowed": allowed, "tuple": tuple})
}

/// `minItems`
#[derive(Debug, Clone)]
pub struct MinItems {
    limit: u64,
}

impl KeywordValidator for MinItems {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(items) = instance.as_array() else {
            return Ok(());
        };
        let found = items.len() as u64;
        if found < self.limit {
            let message = ctx
                .error(format!(
                    "array is too short (must have at least {} elements, found {})",
                    self.limit, found
                ))
                .put("found", found)
                .put("minItems", self.limit);
            ctx.push(message);
        }
        Ok(())
    }
}

/// `maxItems`
#[derive(Debug, Clone)]
pub struct MaxItems {
    limit: u64,
}

impl KeywordValidator for MaxItems {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(items) = instance.as_array() else {
            return Ok(());
        };
        let found = items.len() as u64;
        if found > self.limit {
            let message = ctx
                .error(format!(
                    "array is too long (must have at most {} elements, found {})",
                    self.limit, found
                ))
                .put("found", found)
                .put("maxItems", self.limit);
            ctx.push(message);
        }
        Ok(())
    }
}

/// `uniqueItems`
#[derive(Debug, Clone)]
pub struct UniqueItems {
    enabled: bool,
}

impl KeywordValidator for UniqueItems {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(items) = instance.as_array().filter(|_| self.enabled) else {
            return Ok(());
        };
        for (second, item) in items.iter().enumerate() {
            if let Some(first) = items[..second].iter().position(|other| json_equal(other, item)) {
                let message = ctx
                    .error("array must not contain duplicate elements")
                    .put("duplicates", vec![first, second]);
                ctx.push(message);
                break;
            }
        }
        Ok(())
    }
}

/// `additionalItems: false` with the tuple form of `items`.
#[derive(Debug, Clone)]
pub struct AdditionalItems {
    allowed: bool,
    tuple: Option<u64>,
}

impl AdditionalItems {
    fn from_fragment(fragment: &Value) -> Result<Self, EngineError> {
        let allowed = fragment
            .get("allowed")
            .and_then(Value::as_bool)
            .ok_or_else(|| construction_error("additionalItems", "malformed fragment"))?;
        Ok(Self {
            allowed,
            tuple: fragment.get("tuple").and_then(Value::as_u64),
        })
    }
}

impl KeywordValidator for AdditionalItems {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let (Some(items), Some(tuple)) = (instance.as_array(), self.tuple) else {
            return Ok(());
        };
        let found = items.len() as u64;
        if !self.allowed && found > tuple {
            let message = ctx
                .error(format!(
                    "array only allows {} elements by schema (found {})",
                    tuple, found
                ))
                .put("allowed", tuple)
                .put("found", found);
            ctx.push(message);
        }
        Ok(())
    }
}

/// `contains`: at least one element matches.
#[derive(Debug, Clone)]
pub struct Contains;

impl KeywordValidator for Contains {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(items) = instance.as_array() else {
            return Ok(());
        };
        let schema = ctx.subschema(["contains"]);
        let mut reports = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let report = ctx.probe_child(&schema, index.to_string(), item)?;
            if report.is_success() {
                return Ok(());
            }
            reports.push((ctx.pointer().append(index.to_string()).to_string(), report));
        }
        let message = ctx
            .error("array does not contain an element matching the \"contains\" schema")
            .put("reports", reports_field(&reports));
        ctx.push(message);
        Ok(())
    }

    fn phase(&self) -> Phase {
        Phase::Applicator
    }
}

#[cfg(test)]
mod tests {
    use crate::loader::NoLoader;
    use crate::report::ValidationReport;
    use crate::validator::SchemaValidator;
    use serde_json::{json, Value};

    fn report(schema: Value, instance: Value) -> ValidationReport {
        SchemaValidator::builder()
            .loader(NoLoader)
            .build(&schema)
            .unwrap()
            .validate(&instance)
            .unwrap()
    }

    fn pointers(report: &ValidationReport) -> Vec<String> {
        report.errors().map(|m| m.pointer.to_string()).collect()
    }

    #[test]
    fn item_counts() {
        assert!(report(json!({"minItems": 1, "maxItems": 2}), json!([1, 2])).is_success());
        assert!(!report(json!({"minItems": 1}), json!([])).is_success());
        assert!(!report(json!({"maxItems": 1}), json!([1, 2])).is_success());
    }

    #[test]
    fn unique_items_use_json_equality() {
        let failed = report(json!({"uniqueItems": true}), json!([1, {"a": 2}, 1.0]));
        assert_eq!(failed.messages()[0].fields["duplicates"], json!([0, 2]));
        assert!(report(json!({"uniqueItems": true}), json!([[1], [2]])).is_success());
        assert!(report(json!({"uniqueItems": false}), json!([1, 1])).is_success());
    }

    #[test]
    fn tuple_items_and_additional_items() {
        let schema = json!({
            "items": [{"type": "integer"}, {"type": "string"}],
            "additionalItems": false
        });
        assert!(report(schema.clone(), json!([1, "a"])).is_success());
        assert!(report(schema.clone(), json!([1])).is_success());
        let failed = report(schema.clone(), json!([1, "a", null]));
        assert_eq!(pointers(&failed), vec![""]);
        assert_eq!(failed.messages()[0].keyword.as_deref(), Some("additionalItems"));
        assert_eq!(pointers(&report(schema, json!(["a", "a"]))), vec!["/0"]);
    }

    #[test]
    fn additional_items_schema_applies_past_the_tuple() {
        let schema = json!({"items": [{}], "additionalItems": {"type": "string"}});
        let failed = report(schema, json!([1, "a", 2]));
        assert_eq!(pointers(&failed), vec!["/2"]);
    }

    #[test]
    fn additional_items_ignored_without_tuple() {
        assert!(report(json!({"items": {}, "additionalItems": false}), json!([1, 2])).is_success());
    }

    #[test]
    fn contains_needs_a_match() {
        let schema = json!({"contains": {"type": "string"}});
        assert!(report(schema.clone(), json!([1, "x"])).is_success());
        let failed = report(schema.clone(), json!([1, 2]));
        assert_eq!(failed.error_count(), 1);
        let reports = failed.messages()[0].fields["reports"].as_object().unwrap();
        assert_eq!(reports.keys().collect::<Vec<_>>(), vec!["/0", "/1"]);
        assert!(!report(schema, json!([])).is_success());
    }
}
