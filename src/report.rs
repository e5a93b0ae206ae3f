//! Validation reports: ordered, leveled diagnostic messages.

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::pointer::JsonPointer;

/// Severity level of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }

    /// Parse a level name. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            "fatal" => Some(LogLevel::Fatal),
            _ => None,
        }
    }

    /// True for `error` and `fatal`.
    pub fn is_failure(&self) -> bool {
        *self >= LogLevel::Error
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which processing stage raised a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Schema syntax checking; the pointer addresses the schema.
    Syntax,
    /// Instance validation; the pointer addresses the instance.
    Validation,
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingMessage {
    pub level: LogLevel,
    pub domain: Domain,
    /// JSON Pointer (RFC 6901) to the node the message is about.
    pub pointer: JsonPointer,
    /// Absolute location (`uri#pointer`) of the schema that raised it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// Human-readable text.
    pub message: String,
    /// Structured key/value details.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl ProcessingMessage {
    pub fn new(level: LogLevel, domain: Domain, message: impl Into<String>) -> Self {
        Self {
            level,
            domain,
            pointer: JsonPointer::root(),
            schema: None,
            keyword: None,
            message: message.into(),
            fields: Map::new(),
        }
    }

    pub fn at(mut self, pointer: JsonPointer) -> Self {
        self.pointer = pointer;
        self
    }

    pub fn with_schema(mut self, location: impl Into<String>) -> Self {
        self.schema = Some(location.into());
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Attach a structured field.
    pub fn put(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Override the level.
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }
}

impl fmt::Display for ProcessingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pointer = if self.pointer.is_root() {
            "/".to_string()
        } else {
            self.pointer.to_string()
        };
        write!(f, "{}: [{}] {}", pointer, self.level, self.message)
    }
}

/// Ordered collection of messages raised by one build or validate call.
///
/// Messages keep the order they were raised in. Messages below the report's
/// threshold are not recorded, but they still count towards
/// [`is_success`](Self::is_success).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    threshold: LogLevel,
    messages: Vec<ProcessingMessage>,
    failures: usize,
}

impl ValidationReport {
    pub fn new(threshold: LogLevel) -> Self {
        Self {
            threshold,
            messages: Vec::new(),
            failures: 0,
        }
    }

    pub(crate) fn push(&mut self, message: ProcessingMessage) {
        if message.level.is_failure() {
            self.failures += 1;
        }
        if message.level >= self.threshold {
            self.messages.push(message);
        }
    }

    /// True when no message at `error` or above was raised.
    pub fn is_success(&self) -> bool {
        self.failures == 0
    }

    /// Number of `error`/`fatal` messages raised, recorded or not.
    pub fn error_count(&self) -> usize {
        self.failures
    }

    pub fn threshold(&self) -> LogLevel {
        self.threshold
    }

    pub fn messages(&self) -> &[ProcessingMessage] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProcessingMessage> {
        self.messages.iter()
    }

    /// Recorded messages at `error` or above.
    pub fn errors(&self) -> impl Iterator<Item = &ProcessingMessage> {
        self.messages.iter().filter(|m| m.level.is_failure())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<ProcessingMessage> {
        self.messages
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl<'r> IntoIterator for &'r ValidationReport {
    type Item = &'r ProcessingMessage;
    type IntoIter = std::slice::Iter<'r, ProcessingMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

impl Serialize for ValidationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationReport", 2)?;
        state.serialize_field("success", &self.is_success())?;
        state.serialize_field("messages", &self.messages)?;
        state.end()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for message in &self.messages {
            writeln!(f, "{}", message)?;
        }
        Ok(())
    }
}
