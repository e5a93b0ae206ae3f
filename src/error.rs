//! Error types for schema loading, reference resolution and validation.
//!
//! Validation *findings* never appear here: they are `ProcessingMessage`s in a
//! `ValidationReport`. These types cover the cases where the engine itself
//! cannot complete a build or validate call.

use std::path::PathBuf;
use thiserror::Error;

use crate::report::ValidationReport;

/// Errors raised while obtaining a JSON document.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no loader available for {uri}")]
    Unavailable { uri: String },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. }
            | LoadError::ReadError { .. }
            | LoadError::Unavailable { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}

/// Configuration or programming errors that abort a build or validate call.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("reference cycle detected: {}", chain.join(" -> "))]
    RefResolution { chain: Vec<String> },

    #[error("dangling reference {reference}: {pointer:?} does not resolve in {document}")]
    DanglingRef {
        reference: String,
        document: String,
        pointer: String,
    },

    #[error("cannot load {uri}: {source}")]
    Load {
        uri: String,
        #[source]
        source: LoadError,
    },

    #[error("invalid reference \"{reference}\" at {location}: {message}")]
    InvalidRef {
        reference: String,
        location: String,
        message: String,
    },

    #[error("invalid JSON pointer \"{pointer}\": {reason}")]
    InvalidPointer { pointer: String, reason: String },

    #[error("keyword \"{keyword}\" has a digester but no validator constructor")]
    UnknownKeywordConstructor { keyword: String },

    #[error("cannot build validator for keyword \"{keyword}\": {message}")]
    ValidatorConstruction { keyword: String, message: String },

    #[error("invalid regex \"{pattern}\": {message}")]
    Regex { pattern: String, message: String },

    #[error("cannot digest keyword \"{keyword}\": {source}")]
    Digest {
        keyword: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("validation loop: schema {schema} re-entered for instance {pointer:?}")]
    ValidationLoop { schema: String, pointer: String },
}

impl EngineError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Load { source, .. } => source.exit_code(),
            _ => 2,
        }
    }
}

/// Errors from building a `SchemaValidator`.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("schema is invalid: {} syntax error(s)", report.error_count())]
    Syntax { report: ValidationReport },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl BuildError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::Syntax { .. } => 2,
            BuildError::Engine(e) => e.exit_code(),
        }
    }

    /// The syntax report, if the build failed on schema syntax.
    pub fn syntax_report(&self) -> Option<&ValidationReport> {
        match self {
            BuildError::Syntax { report } => Some(report),
            BuildError::Engine(_) => None,
        }
    }
}
