//! Keywords applying to every instance type.

use serde_json::{json, Value};

use super::checkers::{
    ArrayValue, EnumValues, FormatName, RefValue, SchemaArray, SchemaMap, SchemaValue,
    StringValue, TypeNames, UriValue,
};
use super::{construction_error, reports_field, KeywordValidator, Phase};
use crate::context::ValidationContext;
use crate::digest::{FnDigester, SetDigester, SimpleDigester};
use crate::error::EngineError;
use crate::library::{Keyword, LibraryBuilder};
use crate::report::LogLevel;
use crate::types::{json_equal, Dialect, NodeType, TypeSet};

pub(crate) fn register(builder: &mut LibraryBuilder, dialect: Dialect) {
    let (empty_enum, duplicate_level) = match dialect {
        Dialect::Draft4 => (false, LogLevel::Error),
        Dialect::Draft7 => (true, LogLevel::Warning),
    };

    builder
        .add_keyword(
            Keyword::new("type")
                .with_syntax(TypeNames)
                .with_digester(SetDigester::new("type", TypeSet::ALL))
                .with_validator(TypeKeyword::from_fragment),
        )
        .add_keyword(
            Keyword::new("enum")
                .with_syntax(EnumValues {
                    allow_empty: empty_enum,
                    duplicate_level,
                })
                .with_digester(SetDigester::new("enum", TypeSet::ALL))
                .with_validator(Enum::from_fragment),
        )
        .add_keyword(
            Keyword::new("allOf")
                .with_syntax(SchemaArray)
                .with_digester(SimpleDigester::new("allOf", TypeSet::ALL))
                .with_validator(|fragment| AllOf::from_fragment("allOf", fragment)),
        )
        .add_keyword(
            Keyword::new("anyOf")
                .with_syntax(SchemaArray)
                .with_digester(SimpleDigester::new("anyOf", TypeSet::ALL))
                .with_validator(|fragment| {
                    AllOf::from_fragment("anyOf", fragment).map(|a| AnyOf { count: a.count })
                }),
        )
        .add_keyword(
            Keyword::new("oneOf")
                .with_syntax(SchemaArray)
                .with_digester(SimpleDigester::new("oneOf", TypeSet::ALL))
                .with_validator(|fragment| {
                    AllOf::from_fragment("oneOf", fragment).map(|a| OneOf { count: a.count })
                }),
        )
        .add_keyword(
            Keyword::new("not")
                .with_syntax(SchemaValue)
                .with_digester(SimpleDigester::new("not", TypeSet::ALL))
                .with_validator(|_| Ok(Not)),
        )
        .add_keyword(
            Keyword::new("format")
                .with_syntax(FormatName)
                .with_digester(SimpleDigester::new("format", TypeSet::ALL))
                .with_validator(Format::from_fragment),
        )
        .add_keyword(Keyword::new("$ref").with_syntax(RefValue))
        .add_keyword(Keyword::new("definitions").with_syntax(SchemaMap))
        .add_keyword(Keyword::new("$schema").with_syntax(UriValue))
        .add_keyword(Keyword::new(dialect.id_keyword()).with_syntax(UriValue))
        .add_keyword(Keyword::new("title").with_syntax(StringValue))
        .add_keyword(Keyword::new("description").with_syntax(StringValue))
        .add_keyword(Keyword::new("default"));

    if dialect == Dialect::Draft7 {
        builder
            .add_keyword(
                Keyword::new("const")
                    .with_digester(SimpleDigester::new("const", TypeSet::ALL))
                    .with_validator(|fragment: &Value| {
                        Ok(Const {
                            value: fragment.clone(),
                        })
                    }),
            )
            .add_keyword(
                Keyword::new("if")
                    .with_syntax(SchemaValue)
                    .with_digester(FnDigester::new(TypeSet::ALL, |schema| {
                        json!({
                            "if": schema.get("if"),
                            "then": schema.get("then"),
                            "else": schema.get("else"),
                        })
                    }))
                    .with_validator(IfThenElse::from_fragment),
            )
            .add_keyword(Keyword::new("then").with_syntax(SchemaValue))
            .add_keyword(Keyword::new("else").with_syntax(SchemaValue))
            .add_keyword(Keyword::new("examples").with_syntax(ArrayValue));
    }
}

/// `type`
#[derive(Debug, Clone)]
pub struct TypeKeyword {
    allowed: TypeSet,
}

impl TypeKeyword {
    fn from_fragment(fragment: &Value) -> Result<Self, EngineError> {
        let names = fragment
            .as_array()
            .ok_or_else(|| construction_error("type", "expected a set of type names"))?;
        let mut allowed = TypeSet::NONE;
        for name in names {
            let node_type = name
                .as_str()
                .and_then(NodeType::parse)
                .ok_or_else(|| construction_error("type", format!("unknown type {}", name)))?;
            allowed = allowed.with(node_type);
        }
        Ok(Self { allowed })
    }
}

impl KeywordValidator for TypeKeyword {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let found = NodeType::of(instance, ctx.dialect());
        if !self.allowed.matches(found) {
            let message = ctx
                .error(format!(
                    "instance type ({}) does not match any allowed primitive type (allowed: {:?})",
                    found,
                    self.allowed.names()
                ))
                .put("found", found.name())
                .put("expected", self.allowed.names());
            ctx.push(message);
        }
        Ok(())
    }
}

/// `enum`
#[derive(Debug, Clone)]
pub struct Enum {
    values: Vec<Value>,
}

impl Enum {
    fn from_fragment(fragment: &Value) -> Result<Self, EngineError> {
        let values = fragment
            .as_array()
            .ok_or_else(|| construction_error("enum", "expected an array"))?;
        Ok(Self {
            values: values.clone(),
        })
    }
}

impl KeywordValidator for Enum {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        if !self.values.iter().any(|v| json_equal(v, instance)) {
            let message = ctx
                .error(format!("instance value ({}) not found in enum", instance))
                .put("value", instance.clone())
                .put("enum", self.values.clone());
            ctx.push(message);
        }
        Ok(())
    }
}

/// `const`
#[derive(Debug, Clone)]
pub struct Const {
    value: Value,
}

impl KeywordValidator for Const {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        if !json_equal(&self.value, instance) {
            let message = ctx
                .error(format!("instance value ({}) is not the constant {}", instance, self.value))
                .put("value", instance.clone())
                .put("const", self.value.clone());
            ctx.push(message);
        }
        Ok(())
    }
}

/// `allOf`: every branch is applied to the instance, findings go straight
/// to the report.
#[derive(Debug, Clone)]
pub struct AllOf {
    count: usize,
}

impl AllOf {
    fn from_fragment(keyword: &str, fragment: &Value) -> Result<Self, EngineError> {
        let branches = fragment
            .as_array()
            .ok_or_else(|| construction_error(keyword, "expected an array of schemas"))?;
        Ok(Self {
            count: branches.len(),
        })
    }
}

impl KeywordValidator for AllOf {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        for index in 0..self.count {
            let branch = ctx.subschema(["allOf".to_string(), index.to_string()]);
            ctx.validate(&branch, instance)?;
        }
        Ok(())
    }

    fn phase(&self) -> Phase {
        Phase::Applicator
    }
}

/// `anyOf`
#[derive(Debug, Clone)]
pub struct AnyOf {
    count: usize,
}

impl KeywordValidator for AnyOf {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let mut reports = Vec::with_capacity(self.count);
        for index in 0..self.count {
            let branch = ctx.subschema(["anyOf".to_string(), index.to_string()]);
            let report = ctx.probe(&branch, instance)?;
            if report.is_success() {
                return Ok(());
            }
            reports.push((ctx.location_of(&branch), report));
        }
        let message = ctx
            .error("instance failed to match at least one required schema among the alternatives")
            .put("nrSchemas", self.count)
            .put("reports", reports_field(&reports));
        ctx.push(message);
        Ok(())
    }

    fn phase(&self) -> Phase {
        Phase::Applicator
    }
}

/// `oneOf`
#[derive(Debug, Clone)]
pub struct OneOf {
    count: usize,
}

impl KeywordValidator for OneOf {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let mut reports = Vec::with_capacity(self.count);
        let mut matched = Vec::new();
        for index in 0..self.count {
            let branch = ctx.subschema(["oneOf".to_string(), index.to_string()]);
            let report = ctx.probe(&branch, instance)?;
            if report.is_success() {
                matched.push(index);
            }
            reports.push((ctx.location_of(&branch), report));
        }
        if matched.len() == 1 {
            return Ok(());
        }
        let message = ctx
            .error(format!(
                "instance failed to match exactly one schema (matched {} out of {})",
                matched.len(),
                self.count
            ))
            .put("matched", matched)
            .put("nrSchemas", self.count)
            .put("reports", reports_field(&reports));
        ctx.push(message);
        Ok(())
    }

    fn phase(&self) -> Phase {
        Phase::Applicator
    }
}

/// `not`
#[derive(Debug, Clone)]
pub struct Not;

impl KeywordValidator for Not {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let negated = ctx.subschema(["not"]);
        let report = ctx.probe(&negated, instance)?;
        if report.is_success() {
            let message = ctx
                .error("instance matched a schema which it should not")
                .put("reports", reports_field(&[(ctx.location_of(&negated), report)]));
            ctx.push(message);
        }
        Ok(())
    }

    fn phase(&self) -> Phase {
        Phase::Applicator
    }
}

/// `if`, together with its `then` and `else` siblings.
#[derive(Debug, Clone)]
pub struct IfThenElse {
    has_then: bool,
    has_else: bool,
}

impl IfThenElse {
    fn from_fragment(fragment: &Value) -> Result<Self, EngineError> {
        let present = |name: &str| fragment.get(name).is_some_and(|v| !v.is_null());
        Ok(Self {
            has_then: present("then"),
            has_else: present("else"),
        })
    }
}

impl KeywordValidator for IfThenElse {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        if !self.has_then && !self.has_else {
            return Ok(());
        }
        let condition = ctx.subschema(["if"]);
        let branch = if ctx.probe(&condition, instance)?.is_success() {
            self.has_then.then(|| ctx.subschema(["then"]))
        } else {
            self.has_else.then(|| ctx.subschema(["else"]))
        };
        match branch {
            Some(branch) => ctx.validate(&branch, instance),
            None => Ok(()),
        }
    }

    fn phase(&self) -> Phase {
        Phase::Applicator
    }
}

/// `format`. The attribute is looked up in the library when validating;
/// unknown names and instances of other types pass.
#[derive(Debug, Clone)]
pub struct Format {
    name: String,
}

impl Format {
    fn from_fragment(fragment: &Value) -> Result<Self, EngineError> {
        let name = fragment
            .as_str()
            .ok_or_else(|| construction_error("format", "expected a string"))?;
        Ok(Self {
            name: name.to_string(),
        })
    }
}

impl KeywordValidator for Format {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(attribute) = ctx.library().format(&self.name) else {
            return Ok(());
        };
        if !attribute.types().matches(NodeType::of(instance, ctx.dialect())) {
            return Ok(());
        }
        if let Err(reason) = attribute.check(instance) {
            let message = ctx
                .error(format!("{} is not a valid \"{}\": {}", instance, self.name, reason))
                .put("attribute", self.name.as_str())
                .put("value", instance.clone());
            ctx.push(message);
        }
        Ok(())
    }
}
