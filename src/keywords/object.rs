//! Object keywords.

use serde_json::{json, Map, Value};

use super::checkers::{
    BooleanOrSchema, DependencyMap, NonNegativeInteger, PatternSchemaMap, SchemaMap, SchemaValue,
    StringSet,
};
use super::{construction_error, reports_field, string_list, u64_value, KeywordValidator, Phase};
use crate::context::ValidationContext;
use crate::digest::{sorted_keys, FnDigester, SetDigester, SimpleDigester};
use crate::error::EngineError;
use crate::library::{Keyword, LibraryBuilder};
use crate::types::{Dialect, TypeSet};

pub(crate) fn register(builder: &mut LibraryBuilder, dialect: Dialect) {
    let allow_empty = dialect == Dialect::Draft7;

    builder
        .add_keyword(Keyword::new("properties").with_syntax(SchemaMap))
        .add_keyword(Keyword::new("patternProperties").with_syntax(PatternSchemaMap))
        .add_keyword(
            Keyword::new("additionalProperties")
                .with_syntax(BooleanOrSchema)
                .with_digester(FnDigester::new(TypeSet::OBJECT, additional_properties_digest))
                .with_validator(AdditionalProperties::from_fragment),
        )
        .add_keyword(
            Keyword::new("required")
                .with_syntax(StringSet { allow_empty })
                .with_digester(SetDigester::new("required", TypeSet::OBJECT))
                .with_validator(|fragment| {
                    Ok(Required {
                        names: string_list("required", fragment)?,
                    })
                }),
        )
        .add_keyword(
            Keyword::new("minProperties")
                .with_syntax(NonNegativeInteger)
                .with_digester(SimpleDigester::new("minProperties", TypeSet::OBJECT))
                .with_validator(|fragment| {
                    Ok(MinProperties {
                        limit: u64_value("minProperties", fragment)?,
                    })
                }),
        )
        .add_keyword(
            Keyword::new("maxProperties")
                .with_syntax(NonNegativeInteger)
                .with_digester(SimpleDigester::new("maxProperties", TypeSet::OBJECT))
                .with_validator(|fragment| {
                    Ok(MaxProperties {
                        limit: u64_value("maxProperties", fragment)?,
                    })
                }),
        )
        .add_keyword(
            Keyword::new("dependencies")
                .with_syntax(DependencyMap { allow_empty })
                .with_digester(SimpleDigester::new("dependencies", TypeSet::OBJECT))
                .with_validator(Dependencies::from_fragment),
        );

    if dialect == Dialect::Draft7 {
        builder.add_keyword(
            Keyword::new("propertyNames")
                .with_syntax(SchemaValue)
                .with_digester(SimpleDigester::new("propertyNames", TypeSet::OBJECT))
                .with_validator(|_| Ok(PropertyNames)),
        );
    }
}

fn additional_properties_digest(schema: &Map<String, Value>) -> Value {
    let allowed = !matches!(schema.get("additionalProperties"), Some(Value::Bool(false)));
    json!({
        "allowed": allowed,
        "properties": sorted_keys(schema, "properties"),
        "patterns": sorted_keys(schema, "patternProperties"),
    })
}

/// `additionalProperties: false`. The schema form is applied per member by
/// the container recursion.
#[derive(Debug, Clone)]
pub struct AdditionalProperties {
    allowed: bool,
    properties: Vec<String>,
    patterns: Vec<String>,
}

impl AdditionalProperties {
    fn from_fragment(fragment: &Value) -> Result<Self, EngineError> {
        let allowed = fragment
            .get("allowed")
            .and_then(Value::as_bool)
            .ok_or_else(|| construction_error("additionalProperties", "malformed fragment"))?;
        let list = |name: &str| match fragment.get(name) {
            Some(value) => string_list("additionalProperties", value),
            None => Ok(Vec::new()),
        };
        Ok(Self {
            allowed,
            properties: list("properties")?,
            patterns: list("patterns")?,
        })
    }
}

impl KeywordValidator for AdditionalProperties {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(members) = instance.as_object().filter(|_| !self.allowed) else {
            return Ok(());
        };
        let mut unwanted = Vec::new();
        for key in members.keys() {
            if self.properties.binary_search(key).is_ok() {
                continue;
            }
            let mut matched = false;
            for pattern in &self.patterns {
                if ctx.regex(pattern)?.is_match(key) {
                    matched = true;
                    break;
                }
            }
            if !matched {
                unwanted.push(key.clone());
            }
        }
        if unwanted.is_empty() {
            return Ok(());
        }
        unwanted.sort();
        let message = ctx
            .error(format!(
                "object instance has properties which are not allowed by the schema: {:?}",
                unwanted
            ))
            .put("unwanted", unwanted);
        ctx.push(message);
        Ok(())
    }
}

/// `required`
#[derive(Debug, Clone)]
pub struct Required {
    names: Vec<String>,
}

impl KeywordValidator for Required {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(members) = instance.as_object() else {
            return Ok(());
        };
        let missing: Vec<&str> = self
            .names
            .iter()
            .filter(|name| !members.contains_key(name.as_str()))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let message = ctx
            .error(format!("object has missing required properties ({:?})", missing))
            .put("required", self.names.clone())
            .put("missing", missing);
        ctx.push(message);
        Ok(())
    }
}

/// `minProperties`
#[derive(Debug, Clone)]
pub struct MinProperties {
    limit: u64,
}

impl KeywordValidator for MinProperties {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(members) = instance.as_object() else {
            return Ok(());
        };
        let found = members.len() as u64;
        if found < self.limit {
            let message = ctx
                .error(format!(
                    "object has too few properties (found {} but schema requires at least {})",
                    found, self.limit
                ))
                .put("found", found)
                .put("minProperties", self.limit);
            ctx.push(message);
        }
        Ok(())
    }
}

/// `maxProperties`
#[derive(Debug, Clone)]
pub struct MaxProperties {
    limit: u64,
}

impl KeywordValidator for MaxProperties {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(members) = instance.as_object() else {
            return Ok(());
        };
        let found = members.len() as u64;
        if found > self.limit {
            let message = ctx
                .error(format!(
                    "object has too many properties (found {} but schema allows at most {})",
                    found, self.limit
                ))
                .put("found", found)
                .put("maxProperties", self.limit);
            ctx.push(message);
        }
        Ok(())
    }
}

/// `dependencies`. Property dependencies are checked in sorted key order,
/// then schema dependencies are applied to the whole instance.
#[derive(Debug, Clone)]
pub struct Dependencies {
    properties: Vec<(String, Vec<String>)>,
    schemas: Vec<String>,
}

impl Dependencies {
    fn from_fragment(fragment: &Value) -> Result<Self, EngineError> {
        let members = fragment
            .as_object()
            .ok_or_else(|| construction_error("dependencies", "expected an object"))?;
        let mut properties = Vec::new();
        let mut schemas = Vec::new();
        for (name, dependency) in members {
            if dependency.is_array() {
                properties.push((name.clone(), string_list("dependencies", dependency)?));
            } else {
                schemas.push(name.clone());
            }
        }
        properties.sort();
        schemas.sort();
        Ok(Self {
            properties,
            schemas,
        })
    }
}

impl KeywordValidator for Dependencies {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(members) = instance.as_object() else {
            return Ok(());
        };
        for (name, required) in &self.properties {
            if !members.contains_key(name) {
                continue;
            }
            let missing: Vec<&str> = required
                .iter()
                .filter(|r| !members.contains_key(r.as_str()))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                let message = ctx
                    .error(format!(
                        "property \"{}\" found, but the following property dependencies are missing: {:?}",
                        name, missing
                    ))
                    .put("property", name.as_str())
                    .put("missing", missing);
                ctx.push(message);
            }
        }
        for name in &self.schemas {
            if members.contains_key(name) {
                let dependency = ctx.subschema(["dependencies", name.as_str()]);
                ctx.validate(&dependency, instance)?;
            }
        }
        Ok(())
    }

    fn phase(&self) -> Phase {
        if self.schemas.is_empty() {
            Phase::Structural
        } else {
            Phase::Applicator
        }
    }
}

/// `propertyNames`: every member name, as a string instance, matches the
/// schema.
#[derive(Debug, Clone)]
pub struct PropertyNames;

impl KeywordValidator for PropertyNames {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(members) = instance.as_object() else {
            return Ok(());
        };
        let schema = ctx.subschema(["propertyNames"]);
        let mut names: Vec<&String> = members.keys().collect();
        names.sort();
        for name in names {
            let report = ctx.probe_value(&schema, &Value::String(name.clone()))?;
            if !report.is_success() {
                let message = ctx
                    .error(format!(
                        "property name \"{}\" does not match the \"propertyNames\" schema",
                        name
                    ))
                    .put("property", name.as_str())
                    .put("reports", reports_field(&[(ctx.location_of(&schema), report)]));
                ctx.push(message);
            }
        }
        Ok(())
    }

    fn phase(&self) -> Phase {
        Phase::Applicator
    }
}
