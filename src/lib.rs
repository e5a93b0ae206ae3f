//! JSON Schema validation engine (draft-04 and draft-07).
//!
//! A schema is syntax-checked once, its `$ref`s are resolved once, and
//! keyword validators are built once per distinct keyword fragment. The
//! resulting [`SchemaValidator`] can then validate any number of instances,
//! from any number of threads, producing a [`ValidationReport`] of leveled
//! messages located by JSON Pointer.
//!
//! # Example
//!
//! ```
//! use json_schema_engine::SchemaValidator;
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "required": ["name"],
//!     "properties": {
//!         "name": {"type": "string", "minLength": 1}
//!     }
//! });
//!
//! let validator = SchemaValidator::new(&schema).unwrap();
//! let report = validator.validate(&json!({"name": ""})).unwrap();
//!
//! assert!(!report.is_success());
//! let errors: Vec<_> = report.errors().collect();
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors[0].pointer.to_string(), "/name");
//! ```
//!
//! # Validation order
//!
//! | Step | Runs | Skipped when |
//! |------|------|--------------|
//! | structural keywords | always | |
//! | applicators (`allOf`, `anyOf`, ...) | after structural | container instance with structural errors |
//! | children (`items`, `properties`, ...) | after applicators | any error above |
//!
//! # Customizing keywords
//!
//! Libraries are frozen: [`Library::thaw`] gives a [`LibraryBuilder`] to add
//! or remove [`Keyword`]s and formats, and [`LibraryBuilder::freeze`] gives
//! back a shareable [`Library`].

mod cache;
mod context;
mod digest;
mod ecma;
mod error;
mod format;
pub mod keywords;
mod library;
mod loader;
mod pointer;
mod report;
mod syntax;
mod tree;
mod types;
mod validator;

pub use cache::ValidatorCache;
pub use context::ValidationContext;
pub use digest::{
    canonical_set, sorted_keys, Digester, FnDigester, KeywordDigest, SetDigester, SimpleDigester,
};
pub use ecma::{EcmaRegex, RegexCache};
pub use error::{BuildError, EngineError, LoadError};
pub use format::{builtin_formats, FnFormat, FormatAttribute};
pub use keywords::{KeywordConstructor, KeywordValidator, Phase};
pub use library::{Keyword, Library, LibraryBuilder};
pub use loader::{
    is_url, load_schema, load_schema_auto, load_schema_str, source_uri, DefaultLoader, FileLoader,
    MapLoader, NoLoader, SchemaLoader,
};
pub use pointer::JsonPointer;
pub use report::{Domain, LogLevel, ProcessingMessage, ValidationReport};
pub use syntax::{SyntaxChecker, SyntaxContext};
pub use tree::{DocumentId, NodeRef, SchemaNode, SchemaTree, Target, DEFAULT_BASE_URI};
pub use types::{
    json_equal, json_type_name, Dialect, NodeType, TypeSet, ValidatorOptions, DEFAULT_MAX_DEPTH,
};
pub use validator::{build_validator, validate, SchemaValidator, ValidatorBuilder};

#[cfg(feature = "remote")]
pub use loader::{load_schema_url, HttpLoader};
