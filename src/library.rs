//! Keyword libraries.
//!
//! A [`Library`] binds keyword names to their syntax checker, digester and
//! validator constructor, and format names to [`FormatAttribute`]s. Libraries
//! are frozen: cloning one is cheap and every clone sees the same contents.
//! [`Library::thaw`] returns a [`LibraryBuilder`] holding a private copy of
//! the registrations; [`LibraryBuilder::freeze`] snapshots it back into a
//! `Library`.
//!
//! # Example
//!
//! ```
//! use json_schema_engine::Library;
//!
//! let mut builder = Library::draft7().thaw();
//! builder.remove_keyword("format");
//! let library = builder.freeze();
//!
//! assert!(library.keyword("format").is_none());
//! assert!(Library::draft7().keyword("format").is_some());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::digest::Digester;
use crate::error::EngineError;
use crate::format::{builtin_formats, FormatAttribute};
use crate::keywords::{self, KeywordConstructor, KeywordValidator};
use crate::syntax::SyntaxChecker;
use crate::types::Dialect;

static DRAFT4: Lazy<Library> = Lazy::new(|| LibraryBuilder::core(Dialect::Draft4).freeze());
static DRAFT7: Lazy<Library> = Lazy::new(|| LibraryBuilder::core(Dialect::Draft7).freeze());

/// Registration of one keyword.
///
/// A keyword with a syntax checker only (`properties`, `definitions`,
/// `title`) is checked but never validates by itself. A keyword with a
/// digester must also have a constructor.
#[derive(Clone)]
pub struct Keyword {
    name: String,
    syntax: Option<Arc<dyn SyntaxChecker>>,
    digester: Option<Arc<dyn Digester>>,
    constructor: Option<KeywordConstructor>,
}

impl Keyword {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            syntax: None,
            digester: None,
            constructor: None,
        }
    }

    pub fn with_syntax(mut self, checker: impl SyntaxChecker + 'static) -> Self {
        self.syntax = Some(Arc::new(checker));
        self
    }

    pub fn with_digester(mut self, digester: impl Digester + 'static) -> Self {
        self.digester = Some(Arc::new(digester));
        self
    }

    pub fn with_constructor(mut self, constructor: KeywordConstructor) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Set the constructor from a function returning a concrete validator.
    pub fn with_validator<V, F>(self, build: F) -> Self
    where
        V: KeywordValidator + 'static,
        F: Fn(&Value) -> Result<V, EngineError> + Send + Sync + 'static,
    {
        self.with_constructor(Arc::new(move |fragment: &Value| {
            build(fragment).map(|v| Arc::new(v) as Arc<dyn KeywordValidator>)
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn syntax_checker(&self) -> Option<&Arc<dyn SyntaxChecker>> {
        self.syntax.as_ref()
    }

    pub fn digester(&self) -> Option<&Arc<dyn Digester>> {
        self.digester.as_ref()
    }

    pub fn constructor(&self) -> Option<&KeywordConstructor> {
        self.constructor.as_ref()
    }
}

impl fmt::Debug for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyword")
            .field("name", &self.name)
            .field("syntax", &self.syntax.is_some())
            .field("digester", &self.digester.is_some())
            .field("constructor", &self.constructor.is_some())
            .finish()
    }
}

struct Registry {
    dialect: Dialect,
    keywords: BTreeMap<String, Keyword>,
    formats: BTreeMap<String, Arc<dyn FormatAttribute>>,
}

/// An immutable keyword library, safe to share between threads.
#[derive(Clone)]
pub struct Library {
    inner: Arc<Registry>,
}

impl Library {
    /// The draft-04 core library.
    pub fn draft4() -> Self {
        DRAFT4.clone()
    }

    /// The draft-07 core library.
    pub fn draft7() -> Self {
        DRAFT7.clone()
    }

    pub fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Draft4 => Self::draft4(),
            Dialect::Draft7 => Self::draft7(),
        }
    }

    /// The core library for a schema's `$schema`, defaulting to draft-07.
    pub fn for_schema(schema: &Value) -> Self {
        let dialect = schema
            .get("$schema")
            .and_then(Value::as_str)
            .and_then(Dialect::from_schema_uri)
            .unwrap_or(Dialect::Draft7);
        Self::for_dialect(dialect)
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    pub fn keyword(&self, name: &str) -> Option<&Keyword> {
        self.inner.keywords.get(name)
    }

    /// Registered keywords in name order.
    pub fn keywords(&self) -> impl Iterator<Item = (&String, &Keyword)> {
        self.inner.keywords.iter()
    }

    pub fn syntax_checker_for(&self, name: &str) -> Option<&Arc<dyn SyntaxChecker>> {
        self.keyword(name)?.syntax_checker()
    }

    pub fn digester_for(&self, name: &str) -> Option<&Arc<dyn Digester>> {
        self.keyword(name)?.digester()
    }

    pub fn constructor_for(&self, name: &str) -> Option<&KeywordConstructor> {
        self.keyword(name)?.constructor()
    }

    pub fn format(&self, name: &str) -> Option<&Arc<dyn FormatAttribute>> {
        self.inner.formats.get(name)
    }

    /// Registered format names in order.
    pub fn format_names(&self) -> impl Iterator<Item = &str> {
        self.inner.formats.keys().map(String::as_str)
    }

    /// A mutable copy of this library.
    pub fn thaw(&self) -> LibraryBuilder {
        LibraryBuilder {
            dialect: self.inner.dialect,
            keywords: self.inner.keywords.clone(),
            formats: self.inner.formats.clone(),
        }
    }

    /// True if both handles share one registry.
    pub fn ptr_eq(a: &Library, b: &Library) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("dialect", &self.inner.dialect)
            .field("keywords", &self.inner.keywords.len())
            .field("formats", &self.inner.formats.len())
            .finish()
    }
}

/// A mutable keyword library.
#[derive(Clone)]
pub struct LibraryBuilder {
    dialect: Dialect,
    keywords: BTreeMap<String, Keyword>,
    formats: BTreeMap<String, Arc<dyn FormatAttribute>>,
}

impl LibraryBuilder {
    /// An empty library for `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            keywords: BTreeMap::new(),
            formats: BTreeMap::new(),
        }
    }

    fn core(dialect: Dialect) -> Self {
        let mut builder = Self::new(dialect);
        keywords::register_all(&mut builder, dialect);
        for (name, format) in builtin_formats(dialect) {
            builder.formats.insert(name.to_string(), format);
        }
        builder
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Register a keyword, replacing any registration with the same name.
    pub fn add_keyword(&mut self, keyword: Keyword) -> &mut Self {
        self.keywords.insert(keyword.name.clone(), keyword);
        self
    }

    pub fn remove_keyword(&mut self, name: &str) -> &mut Self {
        self.keywords.remove(name);
        self
    }

    pub fn add_format(
        &mut self,
        name: impl Into<String>,
        format: impl FormatAttribute + 'static,
    ) -> &mut Self {
        self.formats.insert(name.into(), Arc::new(format));
        self
    }

    pub fn remove_format(&mut self, name: &str) -> &mut Self {
        self.formats.remove(name);
        self
    }

    pub fn keyword(&self, name: &str) -> Option<&Keyword> {
        self.keywords.get(name)
    }

    /// Snapshot the current registrations. Later changes to the builder do
    /// not affect the snapshot.
    pub fn freeze(&self) -> Library {
        Library {
            inner: Arc::new(Registry {
                dialect: self.dialect,
                keywords: self.keywords.clone(),
                formats: self.formats.clone(),
            }),
        }
    }
}

impl fmt::Debug for LibraryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryBuilder")
            .field("dialect", &self.dialect)
            .field("keywords", &self.keywords.keys().collect::<Vec<_>>())
            .finish()
    }
}
