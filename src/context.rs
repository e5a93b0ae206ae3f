//! Per-call validation state and the container recursion engine.
//!
//! One [`ValidationContext`] exists per `validate` call. It tracks the
//! schema being applied, the instance pointer and the report messages go
//! to. Applying a schema to an instance runs in three steps:
//!
//! 1. structural keywords of the schema,
//! 2. applicator keywords (`allOf`, `anyOf`, `if`, ...),
//! 3. recursion into array elements and object members.
//!
//! For a container instance, an error raised in step 1 skips steps 2 and 3,
//! and an error raised in step 2 skips step 3. Children are visited in index
//! order and sorted key order, and every child is visited.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::ecma::EcmaRegex;
use crate::error::EngineError;
use crate::library::Library;
use crate::pointer::JsonPointer;
use crate::report::{Domain, LogLevel, ProcessingMessage, ValidationReport};
use crate::tree::{NodeRef, Target};
use crate::types::{Dialect, NodeType};
use crate::validator::{BoundKeyword, SchemaValidator};

static NULL: Value = Value::Null;

/// Transient state of one validation call.
pub struct ValidationContext<'a> {
    validator: &'a SchemaValidator,
    schema: NodeRef,
    keyword: Option<String>,
    pointer: JsonPointer,
    report: ValidationReport,
    visiting: HashSet<(NodeRef, JsonPointer)>,
}

impl<'a> ValidationContext<'a> {
    pub(crate) fn new(validator: &'a SchemaValidator) -> Self {
        Self {
            validator,
            schema: validator.tree().root(),
            keyword: None,
            pointer: JsonPointer::root(),
            report: ValidationReport::new(validator.options().log_level),
            visiting: HashSet::new(),
        }
    }

    pub(crate) fn into_report(self) -> ValidationReport {
        self.report
    }

    pub fn library(&self) -> &'a Library {
        self.validator.library()
    }

    pub fn dialect(&self) -> Dialect {
        self.validator.library().dialect()
    }

    /// Pointer to the instance being validated.
    pub fn pointer(&self) -> &JsonPointer {
        &self.pointer
    }

    /// The schema currently being applied.
    pub fn schema(&self) -> &'a Value {
        let validator: &'a SchemaValidator = self.validator;
        validator.tree().value(&self.schema).unwrap_or(&NULL)
    }

    /// A member of the current schema.
    pub fn schema_member(&self, keyword: &str) -> Option<&'a Value> {
        self.schema().get(keyword)
    }

    /// Absolute location of the current schema.
    pub fn schema_location(&self) -> String {
        self.validator.tree().location(&self.schema)
    }

    /// Absolute location of any schema node.
    pub fn location_of(&self, node: &NodeRef) -> String {
        self.validator.tree().location(node)
    }

    /// Location of a subschema of the current schema.
    pub fn subschema<I, T>(&self, tokens: I) -> NodeRef
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.schema.child(tokens)
    }

    /// Number of failures raised so far in the active report.
    pub fn error_count(&self) -> usize {
        self.report.error_count()
    }

    /// A message at the current instance pointer, attributed to the running
    /// keyword.
    pub fn message(&self, level: LogLevel, text: impl Into<String>) -> ProcessingMessage {
        let message = ProcessingMessage::new(level, Domain::Validation, text)
            .at(self.pointer.clone())
            .with_schema(self.schema_location());
        match &self.keyword {
            Some(keyword) => message.with_keyword(keyword.clone()),
            None => message,
        }
    }

    pub fn error(&self, text: impl Into<String>) -> ProcessingMessage {
        self.message(LogLevel::Error, text)
    }

    pub fn push(&mut self, message: ProcessingMessage) {
        self.report.push(message);
    }

    /// A compiled pattern from the validator's regex cache.
    pub fn regex(&self, pattern: &str) -> Result<Arc<EcmaRegex>, EngineError> {
        self.validator.regexes().get(pattern)
    }

    /// Apply the schema at `node` to `instance`, at the current pointer.
    pub fn validate(&mut self, node: &NodeRef, instance: &Value) -> Result<(), EngineError> {
        self.validate_node(node, instance)
    }

    /// Apply the schema at `node` to a child of the current instance.
    pub fn validate_child(
        &mut self,
        node: &NodeRef,
        token: impl Into<String>,
        child: &Value,
    ) -> Result<(), EngineError> {
        self.pointer.push(token);
        let result = self.validate_node(node, child);
        self.pointer.pop();
        result
    }

    /// Apply the schema at `node` to `instance` into a detached report.
    pub fn probe(&mut self, node: &NodeRef, instance: &Value) -> Result<ValidationReport, EngineError> {
        let threshold = self.report.threshold();
        let outer = std::mem::replace(&mut self.report, ValidationReport::new(threshold));
        let result = self.validate_node(node, instance);
        let probe = std::mem::replace(&mut self.report, outer);
        result.map(|()| probe)
    }

    /// Like [`probe`](Self::probe), for a child of the current instance.
    pub fn probe_child(
        &mut self,
        node: &NodeRef,
        token: impl Into<String>,
        child: &Value,
    ) -> Result<ValidationReport, EngineError> {
        self.pointer.push(token);
        let result = self.probe(node, child);
        self.pointer.pop();
        result
    }

    /// Probe a value that is not part of the instance tree (a property
    /// name), with a fresh loop-detection scope.
    pub fn probe_value(
        &mut self,
        node: &NodeRef,
        value: &Value,
    ) -> Result<ValidationReport, EngineError> {
        let outer = std::mem::take(&mut self.visiting);
        let result = self.probe(node, value);
        self.visiting = outer;
        result
    }

    pub(crate) fn validate_root(&mut self, instance: &Value) -> Result<(), EngineError> {
        let root = self.validator.tree().root();
        self.validate_node(&root, instance)
    }

    fn validate_node(&mut self, node: &NodeRef, instance: &Value) -> Result<(), EngineError> {
        let validator = self.validator;
        let tree = validator.tree();
        let max_depth = validator.options().max_depth;

        if self.pointer.len() > max_depth {
            let message = ProcessingMessage::new(
                LogLevel::Fatal,
                Domain::Validation,
                format!("maximum instance depth of {} exceeded", max_depth),
            )
            .at(self.pointer.clone())
            .with_schema(tree.location(node))
            .put("maxDepth", max_depth);
            self.push(message);
            return Ok(());
        }

        let target = match tree.target(node) {
            Target::Node(target) => target,
            Target::Unresolved(reference) => {
                let message = ProcessingMessage::new(
                    LogLevel::Fatal,
                    Domain::Validation,
                    format!("unresolved reference \"{}\"", reference),
                )
                .at(self.pointer.clone())
                .with_schema(tree.location(node))
                .with_keyword("$ref")
                .put("$ref", reference);
                self.push(message);
                return Ok(());
            }
        };

        let key = (target.clone(), self.pointer.clone());
        if !self.visiting.insert(key.clone()) {
            return Err(EngineError::ValidationLoop {
                schema: tree.location(&target),
                pointer: self.pointer.to_string(),
            });
        }

        let outer_schema = std::mem::replace(&mut self.schema, target.clone());
        let outer_keyword = self.keyword.take();
        let result = self.apply(&target, instance);
        self.schema = outer_schema;
        self.keyword = outer_keyword;
        self.visiting.remove(&key);
        result
    }

    fn apply(&mut self, node: &NodeRef, instance: &Value) -> Result<(), EngineError> {
        let validator = self.validator;
        match validator.tree().value(node) {
            Some(Value::Object(_)) => {}
            Some(Value::Bool(false)) => {
                let message = self.error("schema `false` accepts no instance");
                self.push(message);
                return Ok(());
            }
            _ => return Ok(()),
        }

        let chain = validator.chain(node)?;
        let instance_type = NodeType::of(instance, self.dialect());
        let container = instance_type.is_container();
        let failures = self.report.error_count();

        self.run(&chain.structural, instance_type, instance)?;
        if container && self.report.error_count() > failures {
            return Ok(());
        }

        self.run(&chain.applicators, instance_type, instance)?;
        if container && self.report.error_count() > failures {
            return Ok(());
        }

        match instance {
            Value::Array(items) => self.validate_items(items),
            Value::Object(members) => self.validate_members(members),
            _ => Ok(()),
        }
    }

    fn run(
        &mut self,
        keywords: &[BoundKeyword],
        instance_type: NodeType,
        instance: &Value,
    ) -> Result<(), EngineError> {
        for bound in keywords {
            if !bound.types.matches(instance_type) {
                continue;
            }
            self.keyword = Some(bound.keyword.clone());
            bound.validator.validate(self, instance)?;
            self.keyword = None;
        }
        Ok(())
    }

    fn validate_items(&mut self, items: &[Value]) -> Result<(), EngineError> {
        let schema = self.schema();
        match schema.get("items") {
            Some(Value::Array(tuple)) => {
                let additional = schema
                    .get("additionalItems")
                    .filter(|v| v.is_object() || v.is_boolean())
                    .map(|_| self.subschema(["additionalItems"]));
                for (index, item) in items.iter().enumerate() {
                    let node = if index < tuple.len() {
                        self.subschema(["items".to_string(), index.to_string()])
                    } else {
                        match &additional {
                            Some(node) => node.clone(),
                            None => break,
                        }
                    };
                    self.validate_child(&node, index.to_string(), item)?;
                }
            }
            Some(single) if single.is_object() || single.is_boolean() => {
                let node = self.subschema(["items"]);
                for (index, item) in items.iter().enumerate() {
                    self.validate_child(&node, index.to_string(), item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn validate_members(&mut self, members: &Map<String, Value>) -> Result<(), EngineError> {
        let schema = self.schema();
        let properties = schema.get("properties").and_then(Value::as_object);
        let patterns = schema.get("patternProperties").and_then(Value::as_object);
        let additional = schema
            .get("additionalProperties")
            .filter(|v| v.is_object() || v.is_boolean())
            .map(|_| self.subschema(["additionalProperties"]));

        let mut keys: Vec<&String> = members.keys().collect();
        keys.sort();

        for key in keys {
            let Some(child) = members.get(key) else {
                continue;
            };
            let mut matched = false;

            if properties.is_some_and(|p| p.contains_key(key)) {
                matched = true;
                let node = self.subschema(["properties", key.as_str()]);
                self.validate_child(&node, key.clone(), child)?;
            }

            if let Some(patterns) = patterns {
                for pattern in patterns.keys() {
                    if self.regex(pattern)?.is_match(key) {
                        matched = true;
                        let node = self.subschema(["patternProperties", pattern.as_str()]);
                        self.validate_child(&node, key.clone(), child)?;
                    }
                }
            }

            if !matched {
                if let Some(node) = &additional {
                    self.validate_child(node, key.clone(), child)?;
                }
            }
        }
        Ok(())
    }
}
