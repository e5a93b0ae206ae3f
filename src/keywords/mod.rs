//! Keyword validators and the draft-versioned keyword registrations.
//!
//! Every keyword validator implements [`KeywordValidator`]. Validators are
//! built from a keyword's canonical fragment (see [`crate::digest`]) and are
//! shared between every schema location with the same fragment, so a
//! validator never stores where it lives: subschemas are reached through
//! the [`ValidationContext`], which knows the schema being applied.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::ValidationContext;
use crate::error::EngineError;
use crate::library::LibraryBuilder;
use crate::report::ValidationReport;
use crate::types::Dialect;

pub mod checkers;

mod array;
mod common;
mod numeric;
mod object;
mod string;

pub use array::{AdditionalItems, Contains, MaxItems, MinItems, UniqueItems};
pub use common::{AllOf, AnyOf, Const, Enum, Format, IfThenElse, Not, OneOf, TypeKeyword};
pub use numeric::{Maximum, Minimum, MultipleOf};
pub use object::{
    AdditionalProperties, Dependencies, MaxProperties, MinProperties, PropertyNames, Required,
};
pub use string::{MaxLength, MinLength, Pattern};

/// When a keyword runs relative to the others on the same schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Checks the instance at the current level only.
    Structural,
    /// Applies subschemas to the instance or its children. Skipped for a
    /// container instance whose structural checks failed.
    Applicator,
}

/// Instance check for one keyword.
///
/// Findings go to the context's report. `Err` is reserved for engine
/// failures (a reference loop, a regex that cannot be compiled) and aborts
/// the validation call.
pub trait KeywordValidator: Send + Sync {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value)
        -> Result<(), EngineError>;

    fn phase(&self) -> Phase {
        Phase::Structural
    }
}

/// Builds a validator from a keyword's canonical fragment.
pub type KeywordConstructor =
    Arc<dyn Fn(&Value) -> Result<Arc<dyn KeywordValidator>, EngineError> + Send + Sync>;

/// Register every built-in keyword of `dialect`.
pub(crate) fn register_all(builder: &mut LibraryBuilder, dialect: Dialect) {
    common::register(builder, dialect);
    numeric::register(builder, dialect);
    string::register(builder, dialect);
    array::register(builder, dialect);
    object::register(builder, dialect);
}

/// Error for a fragment that should have been rejected by syntax checking.
pub(crate) fn construction_error(keyword: &str, message: impl Into<String>) -> EngineError {
    EngineError::ValidatorConstruction {
        keyword: keyword.to_string(),
        message: message.into(),
    }
}

pub(crate) fn u64_value(keyword: &str, value: &Value) -> Result<u64, EngineError> {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        })
        .ok_or_else(|| construction_error(keyword, "expected a non-negative integer"))
}

pub(crate) fn string_list(keyword: &str, value: &Value) -> Result<Vec<String>, EngineError> {
    value
        .as_array()
        .ok_or_else(|| construction_error(keyword, "expected an array of strings"))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| construction_error(keyword, "expected an array of strings"))
        })
        .collect()
}

/// Structured `reports` field: probe messages keyed by subschema location.
pub(crate) fn reports_field(reports: &[(String, ValidationReport)]) -> Value {
    let mut field = Map::new();
    for (location, report) in reports {
        let messages = serde_json::to_value(report.messages()).unwrap_or(Value::Null);
        field.insert(location.clone(), messages);
    }
    Value::Object(field)
}
