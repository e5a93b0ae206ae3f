//! Reusable syntax checkers for keyword values.

use std::collections::HashSet;

use serde_json::{Map, Value};
use url::Url;

use crate::ecma::EcmaRegex;
use crate::report::LogLevel;
use crate::syntax::{SyntaxChecker, SyntaxContext};
use crate::types::{json_equal, json_type_name, NodeType};

fn expected(ctx: &mut SyntaxContext<'_>, what: &str) {
    let found = json_type_name(ctx.value());
    ctx.error(format!("value must be {} (found {})", what, found));
}

/// A non-negative integer (`minLength`, `maxItems`, ...).
#[derive(Debug, Clone, Copy)]
pub struct NonNegativeInteger;

impl SyntaxChecker for NonNegativeInteger {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        let valid = match ctx.value() {
            Value::Number(n) => {
                n.as_u64().is_some()
                    || n.as_f64().is_some_and(|f| f >= 0.0 && f.fract() == 0.0)
            }
            _ => false,
        };
        if !valid {
            expected(ctx, "a non-negative integer");
        }
    }
}

/// A number strictly greater than zero (`multipleOf`).
#[derive(Debug, Clone, Copy)]
pub struct PositiveNumber;

impl SyntaxChecker for PositiveNumber {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        if !ctx.value().as_f64().is_some_and(|f| f > 0.0) {
            expected(ctx, "a number greater than zero");
        }
    }
}

/// Any number (`minimum`, draft-07 `exclusiveMaximum`, ...).
#[derive(Debug, Clone, Copy)]
pub struct NumberValue;

impl SyntaxChecker for NumberValue {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        if !ctx.value().is_number() {
            expected(ctx, "a number");
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BooleanValue;

impl SyntaxChecker for BooleanValue {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        if !ctx.value().is_boolean() {
            expected(ctx, "a boolean");
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StringValue;

impl SyntaxChecker for StringValue {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        if !ctx.value().is_string() {
            expected(ctx, "a string");
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArrayValue;

impl SyntaxChecker for ArrayValue {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        if !ctx.value().is_array() {
            expected(ctx, "an array");
        }
    }
}

/// A URI reference (`$schema`, `id`, `$id`).
#[derive(Debug, Clone, Copy)]
pub struct UriValue;

impl SyntaxChecker for UriValue {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        let Some(uri) = ctx.value().as_str() else {
            expected(ctx, "a string");
            return;
        };
        if let Err(reason) = parse_uri_reference(uri) {
            ctx.error(format!("value \"{}\" is not a valid URI: {}", uri, reason));
        }
    }
}

/// `$ref`: a URI reference.
#[derive(Debug, Clone, Copy)]
pub struct RefValue;

impl SyntaxChecker for RefValue {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        let Some(reference) = ctx.value().as_str() else {
            expected(ctx, "a string");
            return;
        };
        if let Err(reason) = parse_uri_reference(reference) {
            ctx.error(format!(
                "reference \"{}\" is not a valid URI reference: {}",
                reference, reason
            ));
        }
    }
}

fn parse_uri_reference(reference: &str) -> Result<(), String> {
    let base = Url::parse("memory:///").map_err(|e| e.to_string())?;
    base.join(reference).map(|_| ()).map_err(|e| e.to_string())
}

/// A draft-04 boolean modifier that needs a sibling keyword
/// (`exclusiveMinimum` needs `minimum`).
#[derive(Debug, Clone, Copy)]
pub struct ExclusiveModifier {
    pub sibling: &'static str,
}

impl SyntaxChecker for ExclusiveModifier {
    fn check(&self, ctx: &mut SyntaxContext<'_>, schema: &Map<String, Value>) {
        if !ctx.value().is_boolean() {
            expected(ctx, "a boolean");
        } else if !schema.contains_key(self.sibling) {
            let keyword = ctx.keyword();
            ctx.error(format!(
                "keyword \"{}\" requires keyword \"{}\"",
                keyword, self.sibling
            ));
        }
    }
}

/// A single schema (`not`, `contains`, `if`, ...).
#[derive(Debug, Clone, Copy)]
pub struct SchemaValue;

impl SyntaxChecker for SchemaValue {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        if ctx.is_schema(ctx.value()) {
            ctx.subschema(std::iter::empty::<String>());
        } else {
            expected(ctx, "a schema");
        }
    }
}

/// A boolean or a schema (`additionalProperties`, `additionalItems`).
#[derive(Debug, Clone, Copy)]
pub struct BooleanOrSchema;

impl SyntaxChecker for BooleanOrSchema {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        match ctx.value() {
            Value::Bool(_) if !ctx.dialect().boolean_schemas() => {}
            value if ctx.is_schema(value) => ctx.subschema(std::iter::empty::<String>()),
            _ => expected(ctx, "a boolean or a schema"),
        }
    }
}

/// A non-empty array of schemas (`allOf`, `anyOf`, `oneOf`).
#[derive(Debug, Clone, Copy)]
pub struct SchemaArray;

impl SyntaxChecker for SchemaArray {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        let Some(items) = ctx.value().as_array() else {
            expected(ctx, "an array of schemas");
            return;
        };
        if items.is_empty() {
            ctx.error("array must have at least one element");
        }
        for (index, item) in items.iter().enumerate() {
            if ctx.is_schema(item) {
                ctx.subschema([index.to_string()]);
            } else {
                let message = ctx
                    .message(LogLevel::Error, "array element is not a schema")
                    .put("index", index);
                ctx.push(message);
            }
        }
    }
}

/// An object whose values are schemas (`properties`, `definitions`).
#[derive(Debug, Clone, Copy)]
pub struct SchemaMap;

impl SyntaxChecker for SchemaMap {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        let Some(members) = ctx.value().as_object() else {
            expected(ctx, "an object");
            return;
        };
        for (name, member) in members {
            if ctx.is_schema(member) {
                ctx.subschema([name.as_str()]);
            } else {
                let message = ctx
                    .message(LogLevel::Error, format!("member \"{}\" is not a schema", name))
                    .put("member", name.as_str());
                ctx.push(message);
            }
        }
    }
}

/// `patternProperties`: keys are regexes, values are schemas.
#[derive(Debug, Clone, Copy)]
pub struct PatternSchemaMap;

impl SyntaxChecker for PatternSchemaMap {
    fn check(&self, ctx: &mut SyntaxContext<'_>, schema: &Map<String, Value>) {
        SchemaMap.check(ctx, schema);
        let Some(members) = ctx.value().as_object() else {
            return;
        };
        for pattern in members.keys() {
            if let Err(e) = EcmaRegex::new(pattern) {
                let message = ctx
                    .message(LogLevel::Error, format!("invalid regex: {}", e))
                    .put("pattern", pattern.as_str());
                ctx.push(message);
            }
        }
    }
}

/// `items`: a schema or an array of schemas.
#[derive(Debug, Clone, Copy)]
pub struct Items;

impl SyntaxChecker for Items {
    fn check(&self, ctx: &mut SyntaxContext<'_>, schema: &Map<String, Value>) {
        match ctx.value() {
            Value::Array(items) if items.is_empty() => {
                // An empty tuple constrains nothing.
            }
            Value::Array(_) => SchemaArray.check(ctx, schema),
            value if ctx.is_schema(value) => ctx.subschema(std::iter::empty::<String>()),
            _ => expected(ctx, "a schema or an array of schemas"),
        }
    }
}

/// An array of unique strings (`required`).
#[derive(Debug, Clone, Copy)]
pub struct StringSet {
    pub allow_empty: bool,
}

impl StringSet {
    fn check_members(&self, ctx: &mut SyntaxContext<'_>, value: &Value) {
        let Some(items) = value.as_array() else {
            expected(ctx, "an array of strings");
            return;
        };
        if items.is_empty() && !self.allow_empty {
            ctx.error("array must have at least one element");
        }
        let mut seen = HashSet::new();
        for (index, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(name) if !seen.insert(name) => {
                    let message = ctx
                        .message(LogLevel::Error, format!("duplicate element \"{}\"", name))
                        .put("index", index);
                    ctx.push(message);
                }
                Some(_) => {}
                None => {
                    let message = ctx
                        .message(LogLevel::Error, "array element is not a string")
                        .put("index", index);
                    ctx.push(message);
                }
            }
        }
    }
}

impl SyntaxChecker for StringSet {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        let value = ctx.value();
        self.check_members(ctx, value);
    }
}

/// `enum`: an array. Duplicate members raise a message at
/// `duplicate_level`.
#[derive(Debug, Clone, Copy)]
pub struct EnumValues {
    pub allow_empty: bool,
    pub duplicate_level: LogLevel,
}

impl SyntaxChecker for EnumValues {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        let Some(items) = ctx.value().as_array() else {
            expected(ctx, "an array");
            return;
        };
        if items.is_empty() {
            let level = if self.allow_empty {
                LogLevel::Warning
            } else {
                LogLevel::Error
            };
            let message = ctx.message(level, "enum has no members; no instance is valid");
            ctx.push(message);
        }
        for (index, item) in items.iter().enumerate() {
            if items[..index].iter().any(|earlier| json_equal(earlier, item)) {
                let message = ctx
                    .message(self.duplicate_level, "enum has duplicate members")
                    .put("index", index);
                ctx.push(message);
            }
        }
    }
}

/// `type`: a type name or an array of unique type names.
#[derive(Debug, Clone, Copy)]
pub struct TypeNames;

impl TypeNames {
    fn check_name(ctx: &mut SyntaxContext<'_>, name: &Value) {
        match name.as_str() {
            Some(s) if NodeType::parse(s).is_some() => {}
            Some(s) => {
                let message = ctx
                    .message(LogLevel::Error, format!("unknown type \"{}\"", s))
                    .put("valid", NodeType::ALL.iter().map(|t| t.name()).collect::<Vec<_>>());
                ctx.push(message);
            }
            None => ctx.error(format!(
                "type name must be a string (found {})",
                json_type_name(name)
            )),
        }
    }
}

impl SyntaxChecker for TypeNames {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        match ctx.value() {
            Value::String(_) => {
                let value = ctx.value();
                Self::check_name(ctx, value);
            }
            Value::Array(names) => {
                if names.is_empty() {
                    ctx.error("array must have at least one element");
                }
                for (index, name) in names.iter().enumerate() {
                    Self::check_name(ctx, name);
                    if names[..index].contains(name) {
                        ctx.error(format!("duplicate type {}", name));
                    }
                }
            }
            _ => expected(ctx, "a string or an array of strings"),
        }
    }
}

/// `pattern`: an ECMA-262 regex.
#[derive(Debug, Clone, Copy)]
pub struct PatternValue;

impl SyntaxChecker for PatternValue {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        let Some(pattern) = ctx.value().as_str() else {
            expected(ctx, "a string");
            return;
        };
        if let Err(e) = EcmaRegex::new(pattern) {
            ctx.error(format!("invalid regex: {}", e));
        }
    }
}

/// `format`: a string. Names the library does not know raise a warning.
#[derive(Debug, Clone, Copy)]
pub struct FormatName;

impl SyntaxChecker for FormatName {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        let Some(name) = ctx.value().as_str() else {
            expected(ctx, "a string");
            return;
        };
        if ctx.library().format(name).is_none() {
            let message = ctx
                .message(
                    LogLevel::Warning,
                    format!("format attribute \"{}\" is not supported", name),
                )
                .put("attribute", name);
            ctx.push(message);
        }
    }
}

/// `dependencies`: each member is a schema or an array of property names.
#[derive(Debug, Clone, Copy)]
pub struct DependencyMap {
    pub allow_empty: bool,
}

impl SyntaxChecker for DependencyMap {
    fn check(&self, ctx: &mut SyntaxContext<'_>, _schema: &Map<String, Value>) {
        let Some(members) = ctx.value().as_object() else {
            expected(ctx, "an object");
            return;
        };
        let names = StringSet {
            allow_empty: self.allow_empty,
        };
        for (name, member) in members {
            if member.is_array() {
                names.check_members(ctx, member);
            } else if ctx.is_schema(member) {
                ctx.subschema([name.as_str()]);
            } else {
                let message = ctx
                    .message(
                        LogLevel::Error,
                        format!("dependency \"{}\" must be a schema or an array of strings", name),
                    )
                    .put("member", name.as_str());
                ctx.push(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::library::Library;
    use crate::loader::NoLoader;
    use crate::report::{LogLevel, ValidationReport};
    use crate::syntax::check_tree;
    use crate::tree::SchemaTree;
    use serde_json::{json, Value};

    fn check(schema: Value, library: &Library) -> ValidationReport {
        let mut tree = SchemaTree::new(schema, None, library.dialect()).unwrap();
        check_tree(&mut tree, library, &NoLoader, LogLevel::Debug)
            .unwrap()
            .report
    }

    fn errors(schema: Value) -> usize {
        check(schema, &Library::draft7()).error_count()
    }

    #[test]
    fn numeric_values() {
        assert_eq!(errors(json!({"minLength": 2})), 0);
        assert_eq!(errors(json!({"minLength": 2.0})), 0);
        assert_eq!(errors(json!({"minLength": 2.5})), 1);
        assert_eq!(errors(json!({"multipleOf": 0})), 1);
        assert_eq!(errors(json!({"multipleOf": 0.5})), 0);
        assert_eq!(errors(json!({"minimum": "0"})), 1);
    }

    #[test]
    fn exclusive_modifier_needs_sibling() {
        let draft4 = Library::draft4();
        assert_eq!(check(json!({"exclusiveMinimum": true}), &draft4).error_count(), 1);
        assert_eq!(
            check(json!({"minimum": 1, "exclusiveMinimum": true}), &draft4).error_count(),
            0
        );
        assert_eq!(errors(json!({"exclusiveMinimum": 3})), 0);
    }

    #[test]
    fn schema_arrays() {
        assert_eq!(errors(json!({"allOf": []})), 1);
        assert_eq!(errors(json!({"anyOf": [{}, 3]})), 1);
        assert_eq!(errors(json!({"oneOf": [{}, true]})), 0);
    }

    #[test]
    fn required_rules_by_dialect() {
        assert_eq!(errors(json!({"required": []})), 0);
        assert_eq!(
            check(json!({"required": []}), &Library::draft4()).error_count(),
            1
        );
        assert_eq!(errors(json!({"required": ["a", "a"]})), 1);
        assert_eq!(errors(json!({"required": [1]})), 1);
    }

    #[test]
    fn enum_duplicates_by_dialect() {
        let report = check(json!({"enum": [1, 1.0]}), &Library::draft7());
        assert!(report.is_success());
        assert_eq!(report.messages()[0].level, LogLevel::Warning);
        assert_eq!(
            check(json!({"enum": [1, 1.0]}), &Library::draft4()).error_count(),
            1
        );
    }

    #[test]
    fn type_names() {
        assert_eq!(errors(json!({"type": "integer"})), 0);
        assert_eq!(errors(json!({"type": ["string", "null"]})), 0);
        assert_eq!(errors(json!({"type": "any"})), 1);
        assert_eq!(errors(json!({"type": ["string", "string"]})), 1);
        assert_eq!(errors(json!({"type": []})), 1);
    }

    #[test]
    fn patterns() {
        assert_eq!(errors(json!({"pattern": "^a+$"})), 0);
        assert_eq!(errors(json!({"pattern": "(a)\\1"})), 1);
        assert_eq!(errors(json!({"patternProperties": {"[": {}}})), 1);
    }

    #[test]
    fn dependencies() {
        assert_eq!(errors(json!({"dependencies": {"a": ["b"], "c": {}}})), 0);
        assert_eq!(errors(json!({"dependencies": {"a": 1}})), 1);
        assert_eq!(
            check(json!({"dependencies": {"a": []}}), &Library::draft4()).error_count(),
            1
        );
    }

    #[test]
    fn references() {
        assert_eq!(errors(json!({"$ref": 5})), 1);
        assert_eq!(errors(json!({"$id": "http://[bad"})), 1);
    }

    #[test]
    fn items_forms() {
        assert_eq!(errors(json!({"items": [{}, {}]})), 0);
        assert_eq!(errors(json!({"items": {}})), 0);
        assert_eq!(errors(json!({"items": 1})), 1);
        assert_eq!(
            check(json!({"additionalItems": false}), &Library::draft4()).error_count(),
            0
        );
    }
}
