//! Core types shared by the engine: instance types, dialects and options.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Number, Value};

use crate::report::LogLevel;

/// Default maximum instance nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Schema dialect (draft) a library implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Draft4,
    Draft7,
}

impl Dialect {
    /// Canonical `$schema` URI of the dialect.
    pub fn schema_uri(&self) -> &'static str {
        match self {
            Dialect::Draft4 => "http://json-schema.org/draft-04/schema#",
            Dialect::Draft7 => "http://json-schema.org/draft-07/schema#",
        }
    }

    /// Map a `$schema` value to a dialect.
    ///
    /// Draft-06 URIs map to draft-07, which is a superset for validation
    /// purposes. Returns `None` for unrecognized URIs.
    pub fn from_schema_uri(uri: &str) -> Option<Self> {
        let uri = uri.trim_end_matches('#');
        let uri = uri
            .strip_prefix("https://")
            .or_else(|| uri.strip_prefix("http://"))?;
        match uri {
            "json-schema.org/draft-04/schema" => Some(Dialect::Draft4),
            "json-schema.org/draft-06/schema" | "json-schema.org/draft-07/schema" => {
                Some(Dialect::Draft7)
            }
            _ => None,
        }
    }

    /// Keyword carrying a schema's base URI.
    pub fn id_keyword(&self) -> &'static str {
        match self {
            Dialect::Draft4 => "id",
            Dialect::Draft7 => "$id",
        }
    }

    /// Whether `true` and `false` are valid schemas.
    pub fn boolean_schemas(&self) -> bool {
        matches!(self, Dialect::Draft7)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Draft4 => f.write_str("draft-04"),
            Dialect::Draft7 => f.write_str("draft-07"),
        }
    }
}

/// Runtime type of a JSON instance, as JSON Schema sees it.
///
/// `Integer` is a refinement of `Number`: a keyword applying to numbers also
/// applies to integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
}

impl NodeType {
    pub const ALL: [NodeType; 7] = [
        NodeType::Array,
        NodeType::Boolean,
        NodeType::Integer,
        NodeType::Null,
        NodeType::Number,
        NodeType::Object,
        NodeType::String,
    ];

    /// The type of `value` under `dialect`'s integer semantics.
    pub fn of(value: &Value, dialect: Dialect) -> Self {
        match value {
            Value::Null => NodeType::Null,
            Value::Bool(_) => NodeType::Boolean,
            Value::Number(n) if is_integer(n, dialect) => NodeType::Integer,
            Value::Number(_) => NodeType::Number,
            Value::String(_) => NodeType::String,
            Value::Array(_) => NodeType::Array,
            Value::Object(_) => NodeType::Object,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Array => "array",
            NodeType::Boolean => "boolean",
            NodeType::Integer => "integer",
            NodeType::Null => "null",
            NodeType::Number => "number",
            NodeType::Object => "object",
            NodeType::String => "string",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        NodeType::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, NodeType::Array | NodeType::Object)
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_integer(n: &Number, dialect: Dialect) -> bool {
    if n.is_i64() || n.is_u64() {
        return true;
    }
    match dialect {
        Dialect::Draft4 => false,
        Dialect::Draft7 => n
            .as_f64()
            .map(|f| f.is_finite() && f.fract() == 0.0)
            .unwrap_or(false),
    }
}

/// A set of instance types a keyword applies to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeSet(u8);

impl TypeSet {
    pub const NONE: TypeSet = TypeSet(0);
    pub const ALL: TypeSet = TypeSet(0b111_1111);
    pub const ARRAY: TypeSet = TypeSet(1 << NodeType::Array as u8);
    pub const OBJECT: TypeSet = TypeSet(1 << NodeType::Object as u8);
    pub const STRING: TypeSet = TypeSet(1 << NodeType::String as u8);
    pub const NUMERIC: TypeSet =
        TypeSet(1 << NodeType::Integer as u8 | 1 << NodeType::Number as u8);

    pub fn of(types: &[NodeType]) -> Self {
        types.iter().fold(Self::NONE, |set, t| set.with(*t))
    }

    pub fn with(self, node_type: NodeType) -> Self {
        TypeSet(self.0 | node_type.bit())
    }

    pub fn contains(&self, node_type: NodeType) -> bool {
        self.0 & node_type.bit() != 0
    }

    /// True if a keyword declared for this set applies to an instance of
    /// `instance_type`. Integers match sets containing `number`.
    pub fn matches(&self, instance_type: NodeType) -> bool {
        self.contains(instance_type)
            || (instance_type == NodeType::Integer && self.contains(NodeType::Number))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeType> + '_ {
        NodeType::ALL.into_iter().filter(|t| self.contains(*t))
    }

    /// Sorted type names.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|t| t.name()).collect()
    }
}

impl fmt::Debug for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl Serialize for TypeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.names().serialize(serializer)
    }
}

/// JSON equality with mathematical number comparison (`1 == 1.0`).
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, x)| ym.get(k).map(|y| json_equal(x, y)).unwrap_or(false))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    match (integer_value(x), integer_value(y)) {
        (Some(a), Some(b)) => a == b,
        _ => x.as_f64() == y.as_f64(),
    }
}

/// Integral value of a number, if it has one that fits `i128`.
pub(crate) fn integer_value(n: &Number) -> Option<i128> {
    if let Some(i) = n.as_i64() {
        return Some(i as i128);
    }
    if let Some(u) = n.as_u64() {
        return Some(u as i128);
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e38 {
        Some(f as i128)
    } else {
        None
    }
}

/// Options for building and running a `SchemaValidator`.
#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    /// Minimum level a message needs to be recorded in a report.
    /// Success is always computed from every message raised.
    pub log_level: LogLevel,
    /// Maximum instance nesting depth before validation of a subtree is
    /// abandoned with a `fatal` message.
    pub max_depth: usize,
}

impl ValidatorOptions {
    /// Options with `info` reporting and the default depth limit.
    pub fn new() -> Self {
        Self {
            log_level: LogLevel::Info,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Set the minimum recorded level.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set the maximum instance nesting depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self::new()
    }
}
