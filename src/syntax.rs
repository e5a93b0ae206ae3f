//! Schema syntax checking.
//!
//! Before a schema validates anything, every reachable schema fragment is
//! checked against the syntax rules of the keywords it carries. Keyword
//! checkers also declare which members of the keyword are themselves
//! schemas; the walker visits those next, following `$ref` (and loading
//! referenced documents) along the way. Unknown keywords are ignored.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::EngineError;
use crate::library::Library;
use crate::loader::SchemaLoader;
use crate::pointer::JsonPointer;
use crate::report::{Domain, LogLevel, ProcessingMessage, ValidationReport};
use crate::tree::{NodeRef, SchemaTree};
use crate::types::Dialect;

/// Syntax rule for one keyword.
///
/// Implemented for closures taking the same arguments.
pub trait SyntaxChecker: Send + Sync {
    /// Check `ctx.value()`, the keyword's value inside `schema`.
    fn check(&self, ctx: &mut SyntaxContext<'_>, schema: &Map<String, Value>);
}

impl<F> SyntaxChecker for F
where
    F: Fn(&mut SyntaxContext<'_>, &Map<String, Value>) + Send + Sync,
{
    fn check(&self, ctx: &mut SyntaxContext<'_>, schema: &Map<String, Value>) {
        self(ctx, schema)
    }
}

/// What a keyword checker sees and reports to.
pub struct SyntaxContext<'a> {
    library: &'a Library,
    keyword: &'a str,
    value: &'a Value,
    pointer: &'a JsonPointer,
    location: &'a str,
    report: &'a mut ValidationReport,
    subschemas: &'a mut Vec<JsonPointer>,
}

impl<'a> SyntaxContext<'a> {
    pub fn keyword(&self) -> &'a str {
        self.keyword
    }

    /// The keyword's value.
    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn library(&self) -> &'a Library {
        self.library
    }

    pub fn dialect(&self) -> Dialect {
        self.library.dialect()
    }

    /// A message about this keyword, located at the keyword in the schema.
    pub fn message(&self, level: LogLevel, text: impl Into<String>) -> ProcessingMessage {
        ProcessingMessage::new(level, Domain::Syntax, text)
            .at(self.pointer.append(self.keyword))
            .with_schema(format!("{}{}", self.location, self.pointer.to_fragment()))
            .with_keyword(self.keyword)
    }

    pub fn push(&mut self, message: ProcessingMessage) {
        self.report.push(message);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        let message = self.message(LogLevel::Error, text);
        self.push(message);
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        let message = self.message(LogLevel::Warning, text);
        self.push(message);
    }

    /// Declare a schema below the keyword, addressed by tokens after the
    /// keyword name. No tokens declares the keyword's value itself.
    pub fn subschema<I, T>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut pointer = JsonPointer::root().append(self.keyword);
        for token in tokens {
            pointer.push(token);
        }
        self.subschemas.push(pointer);
    }

    /// True if `value` can stand where a schema is expected.
    pub fn is_schema(&self, value: &Value) -> bool {
        value.is_object() || (value.is_boolean() && self.dialect().boolean_schemas())
    }
}

/// Result of checking a whole schema tree.
pub(crate) struct SyntaxWalk {
    pub report: ValidationReport,
    /// Every schema location visited, in visiting order.
    pub nodes: Vec<NodeRef>,
}

/// Check every schema reachable from the root of `tree`, resolving `$ref`
/// as it is met.
///
/// # Errors
///
/// Reference resolution failures abort the walk.
pub(crate) fn check_tree(
    tree: &mut SchemaTree,
    library: &Library,
    loader: &dyn SchemaLoader,
    threshold: LogLevel,
) -> Result<SyntaxWalk, EngineError> {
    let mut report = ValidationReport::new(threshold);
    let mut checked: HashSet<NodeRef> = HashSet::new();
    let mut nodes = Vec::new();
    let mut pending = vec![tree.root()];

    while let Some(node) = pending.pop() {
        if !checked.insert(node.clone()) {
            continue;
        }

        let (children, follows_ref) = check_node(tree, library, &node, &mut report);
        if follows_ref {
            let target = tree.resolve(&node, loader)?;
            pending.push(target);
        } else {
            nodes.push(node.clone());
            for child in children.into_iter().rev() {
                pending.push(NodeRef::new(node.document, node.pointer.join(&child)));
            }
        }
    }

    debug!(
        schemas = nodes.len(),
        documents = tree.document_count(),
        errors = report.error_count(),
        "schema syntax checked"
    );
    Ok(SyntaxWalk { report, nodes })
}

/// Check one schema location. Returns the declared subschemas (relative to
/// the location) and whether the location is a well-formed `$ref`.
fn check_node(
    tree: &SchemaTree,
    library: &Library,
    node: &NodeRef,
    report: &mut ValidationReport,
) -> (Vec<JsonPointer>, bool) {
    let Some(schema) = tree.node(node) else {
        return (Vec::new(), false);
    };
    let location = schema.document.to_string();

    let map = match schema.value {
        Value::Object(map) => map,
        Value::Bool(_) if library.dialect().boolean_schemas() => return (Vec::new(), false),
        other => {
            report.push(
                ProcessingMessage::new(
                    LogLevel::Error,
                    Domain::Syntax,
                    format!(
                        "value has type {} but a schema must be an object",
                        crate::types::json_type_name(other)
                    ),
                )
                .at(schema.pointer.clone())
                .with_schema(schema.location()),
            );
            return (Vec::new(), false);
        }
    };

    let mut subschemas = Vec::new();

    // `$ref` overrides its siblings: only the reference itself is checked.
    if let Some(reference) = map.get("$ref") {
        let failures = report.error_count();
        if let Some(checker) = library.syntax_checker_for("$ref") {
            let mut ctx = SyntaxContext {
                library,
                keyword: "$ref",
                value: reference,
                pointer: &schema.pointer,
                location: &location,
                report: &mut *report,
                subschemas: &mut subschemas,
            };
            checker.check(&mut ctx, map);
        }
        let well_formed = reference.is_string() && report.error_count() == failures;
        return (Vec::new(), well_formed);
    }

    for (name, keyword) in library.keywords() {
        let (Some(value), Some(checker)) = (map.get(name), keyword.syntax_checker()) else {
            continue;
        };
        let mut ctx = SyntaxContext {
            library,
            keyword: name,
            value,
            pointer: &schema.pointer,
            location: &location,
            report: &mut *report,
            subschemas: &mut subschemas,
        };
        checker.check(&mut ctx, map);
    }

    (subschemas, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::NoLoader;
    use serde_json::json;

    fn walk(schema: Value, library: &Library) -> SyntaxWalk {
        let mut tree = SchemaTree::new(schema, None, library.dialect()).unwrap();
        check_tree(&mut tree, library, &NoLoader, LogLevel::Debug).unwrap()
    }

    fn pointers(report: &ValidationReport) -> Vec<String> {
        report.iter().map(|m| m.pointer.to_string()).collect()
    }

    #[test]
    fn valid_schema_has_no_messages() {
        let walk = walk(
            json!({
                "type": "object",
                "required": ["name"],
                "properties": {"name": {"type": "string", "minLength": 1}}
            }),
            &Library::draft7(),
        );
        assert!(walk.report.is_empty());
        assert_eq!(walk.nodes.len(), 2);
    }

    #[test]
    fn reports_every_error_in_a_fragment() {
        let walk = walk(
            json!({"minLength": -1, "maxLength": "ten", "type": "strin"}),
            &Library::draft7(),
        );
        assert_eq!(walk.report.error_count(), 3);
        assert_eq!(pointers(&walk.report), vec!["/maxLength", "/minLength", "/type"]);
    }

    #[test]
    fn nested_errors_are_located() {
        let walk = walk(
            json!({"properties": {"a": {"items": {"minItems": "x"}}}}),
            &Library::draft7(),
        );
        assert_eq!(pointers(&walk.report), vec!["/properties/a/items/minItems"]);
    }

    #[test]
    fn unknown_keywords_are_ignored() {
        let walk = walk(json!({"x-vendor": {"anything": true}}), &Library::draft7());
        assert!(walk.report.is_empty());
    }

    #[test]
    fn unknown_format_is_a_warning() {
        let walk = walk(json!({"format": "color"}), &Library::draft7());
        assert!(walk.report.is_success());
        assert_eq!(walk.report.len(), 1);
        assert_eq!(walk.report.messages()[0].level, LogLevel::Warning);
    }

    #[test]
    fn boolean_schemas_depend_on_dialect() {
        assert!(walk(json!({"items": false}), &Library::draft7()).report.is_success());
        assert!(!walk(json!({"not": true}), &Library::draft4()).report.is_success());
    }

    #[test]
    fn ref_siblings_are_not_checked() {
        let walk = walk(
            json!({
                "definitions": {"s": {"type": "string"}},
                "properties": {"a": {"$ref": "#/definitions/s", "minLength": "bad"}}
            }),
            &Library::draft7(),
        );
        assert!(walk.report.is_empty());
    }

    #[test]
    fn referenced_schemas_are_checked_once() {
        let walk = walk(
            json!({
                "definitions": {"s": {"type": "string"}},
                "properties": {
                    "a": {"$ref": "#/definitions/s"},
                    "b": {"$ref": "#/definitions/s"}
                }
            }),
            &Library::draft7(),
        );
        let definitions = walk
            .nodes
            .iter()
            .filter(|n| n.pointer.to_string() == "/definitions/s")
            .count();
        assert_eq!(definitions, 1);
    }

    #[test]
    fn ref_cycle_aborts() {
        let mut tree = SchemaTree::new(
            json!({"$ref": "#/a", "a": {"$ref": "#/a"}}),
            None,
            Dialect::Draft7,
        )
        .unwrap();
        let result = check_tree(&mut tree, &Library::draft7(), &NoLoader, LogLevel::Info);
        assert!(matches!(result, Err(EngineError::RefResolution { .. })));
    }

    #[test]
    fn closure_checker() {
        let mut builder = Library::draft7().thaw();
        builder.add_keyword(crate::library::Keyword::new("x-even").with_syntax(
            |ctx: &mut SyntaxContext<'_>, _: &Map<String, Value>| {
                if ctx.value().as_u64().map_or(true, |n| n % 2 != 0) {
                    ctx.error("x-even must be an even integer");
                }
            },
        ));
        let library = builder.freeze();
        assert!(walk(json!({"x-even": 2}), &library).report.is_success());
        assert!(!walk(json!({"x-even": 3}), &library).report.is_success());
    }

    #[test]
    fn non_object_root_is_an_error() {
        let walk = walk(json!([1, 2]), &Library::draft7());
        assert_eq!(walk.report.error_count(), 1);
        assert_eq!(pointers(&walk.report), vec![""]);
    }
}
