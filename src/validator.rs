//! Building schema validators and validating instances.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::cache::ValidatorCache;
use crate::context::ValidationContext;
use crate::digest::KeywordDigest;
use crate::ecma::RegexCache;
use crate::error::{BuildError, EngineError};
use crate::keywords::{KeywordValidator, Phase};
use crate::library::Library;
use crate::loader::{DefaultLoader, SchemaLoader};
use crate::report::ValidationReport;
use crate::syntax;
use crate::tree::{NodeRef, SchemaTree};
use crate::types::ValidatorOptions;

/// A keyword validator bound to the keyword it runs for.
pub(crate) struct BoundKeyword {
    pub keyword: String,
    pub types: crate::types::TypeSet,
    pub validator: Arc<dyn KeywordValidator>,
}

/// Validators of one schema object, split by phase.
#[derive(Default)]
pub(crate) struct KeywordChain {
    pub structural: Vec<BoundKeyword>,
    pub applicators: Vec<BoundKeyword>,
}

/// A syntax-checked schema, ready to validate instances.
///
/// Every `$ref` reachable from the root is resolved when the validator is
/// built, so validation never loads documents. A `SchemaValidator` is
/// `Send + Sync` and can validate from many threads at once.
///
/// # Example
///
/// ```
/// use json_schema_engine::SchemaValidator;
/// use serde_json::json;
///
/// let validator = SchemaValidator::new(&json!({
///     "type": "array",
///     "items": {"type": "integer"}
/// }))
/// .unwrap();
///
/// let report = validator.validate(&json!([1, "x", 3, "y"])).unwrap();
/// assert!(!report.is_success());
///
/// let pointers: Vec<String> = report.errors().map(|m| m.pointer.to_string()).collect();
/// assert_eq!(pointers, vec!["/1", "/3"]);
/// ```
pub struct SchemaValidator {
    tree: SchemaTree,
    library: Library,
    options: ValidatorOptions,
    cache: ValidatorCache,
    chains: RwLock<HashMap<NodeRef, Arc<KeywordChain>>>,
    regexes: RegexCache,
    syntax_report: ValidationReport,
}

impl SchemaValidator {
    /// Build with the library selected by the schema's `$schema` and the
    /// default loader.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::Syntax` if the schema is invalid, or
    /// `BuildError::Engine` if references cannot be resolved.
    pub fn new(schema: &Value) -> Result<Self, BuildError> {
        ValidatorBuilder::new().build(schema)
    }

    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::new()
    }

    /// Validate an instance.
    ///
    /// Findings are messages in the returned report; `Err` means the engine
    /// could not complete the call.
    ///
    /// # Errors
    ///
    /// - `EngineError::ValidationLoop` if a schema re-enters itself for the
    ///   same instance location.
    /// - `EngineError::UnknownKeywordConstructor` or
    ///   `EngineError::ValidatorConstruction` for a misconfigured library.
    /// - `EngineError::Regex` for a pattern that cannot be compiled.
    pub fn validate(&self, instance: &Value) -> Result<ValidationReport, EngineError> {
        let mut ctx = ValidationContext::new(self);
        ctx.validate_root(instance)?;
        let report = ctx.into_report();
        debug!(
            success = report.is_success(),
            errors = report.error_count(),
            messages = report.len(),
            "instance validated"
        );
        Ok(report)
    }

    /// True if the instance is valid.
    pub fn is_valid(&self, instance: &Value) -> Result<bool, EngineError> {
        self.validate(instance).map(|report| report.is_success())
    }

    /// Non-failing messages (warnings) raised while checking the schema.
    pub fn syntax_report(&self) -> &ValidationReport {
        &self.syntax_report
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    pub fn tree(&self) -> &SchemaTree {
        &self.tree
    }

    /// The digest-keyed validator cache.
    pub fn cache(&self) -> &ValidatorCache {
        &self.cache
    }

    pub(crate) fn regexes(&self) -> &RegexCache {
        &self.regexes
    }

    /// Keyword validators of the schema object at `node`, built on first
    /// use.
    pub(crate) fn chain(&self, node: &NodeRef) -> Result<Arc<KeywordChain>, EngineError> {
        if let Some(chain) = self.chains.read().get(node) {
            return Ok(Arc::clone(chain));
        }
        let chain = Arc::new(self.build_chain(node)?);
        let mut chains = self.chains.write();
        Ok(Arc::clone(chains.entry(node.clone()).or_insert(chain)))
    }

    fn build_chain(&self, node: &NodeRef) -> Result<KeywordChain, EngineError> {
        let mut chain = KeywordChain::default();
        let Some(Value::Object(schema)) = self.tree.value(node) else {
            return Ok(chain);
        };

        for (name, keyword) in self.library.keywords() {
            if !schema.contains_key(name) {
                continue;
            }
            let Some(digester) = keyword.digester() else {
                continue;
            };
            let digest = KeywordDigest::compute(name, digester.as_ref(), schema)?;
            let constructor = keyword.constructor().ok_or_else(|| {
                EngineError::UnknownKeywordConstructor {
                    keyword: name.clone(),
                }
            })?;
            let validator = self
                .cache
                .get_or_build(&digest, |fragment| constructor(fragment))?;

            let bound = BoundKeyword {
                keyword: name.clone(),
                types: digest.types(),
                validator,
            };
            match bound.validator.phase() {
                Phase::Structural => chain.structural.push(bound),
                Phase::Applicator => chain.applicators.push(bound),
            }
        }
        Ok(chain)
    }
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("dialect", &self.library.dialect())
            .field("documents", &self.tree.document_count())
            .field("validators", &self.cache.len())
            .field("options", &self.options)
            .finish()
    }
}

/// Configures and builds a [`SchemaValidator`].
pub struct ValidatorBuilder {
    library: Option<Library>,
    loader: Option<Box<dyn SchemaLoader>>,
    base_uri: Option<Url>,
    options: ValidatorOptions,
}

impl ValidatorBuilder {
    pub fn new() -> Self {
        Self {
            library: None,
            loader: None,
            base_uri: None,
            options: ValidatorOptions::default(),
        }
    }

    /// Use `library` instead of the one selected by `$schema`.
    pub fn library(mut self, library: Library) -> Self {
        self.library = Some(library);
        self
    }

    /// Loader for documents outside the schema. Defaults to
    /// [`DefaultLoader`].
    pub fn loader(mut self, loader: impl SchemaLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Base URI of the root document when it declares no absolute id.
    pub fn base_uri(mut self, base_uri: Url) -> Self {
        self.base_uri = Some(base_uri);
        self
    }

    pub fn options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Check the schema, resolve its references and prepare its keyword
    /// validators.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::Syntax` with the full syntax report if any
    /// syntax error was found, or `BuildError::Engine` for resolution and
    /// library failures.
    pub fn build(self, schema: &Value) -> Result<SchemaValidator, BuildError> {
        let library = self
            .library
            .unwrap_or_else(|| Library::for_schema(schema));
        let loader: Box<dyn SchemaLoader> = match self.loader {
            Some(loader) => loader,
            None => Box::new(DefaultLoader::new()),
        };

        let mut tree = SchemaTree::new(schema.clone(), self.base_uri, library.dialect())?;
        let walk = syntax::check_tree(&mut tree, &library, loader.as_ref(), self.options.log_level)?;
        if !walk.report.is_success() {
            return Err(BuildError::Syntax { report: walk.report });
        }

        let validator = SchemaValidator {
            tree,
            library,
            options: self.options,
            cache: ValidatorCache::new(),
            chains: RwLock::new(HashMap::new()),
            regexes: RegexCache::new(),
            syntax_report: walk.report,
        };
        for node in &walk.nodes {
            validator.chain(node)?;
        }

        debug!(
            dialect = %validator.library.dialect(),
            schemas = walk.nodes.len(),
            validators = validator.cache.len(),
            "schema validator built"
        );
        Ok(validator)
    }
}

impl Default for ValidatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a validator for `schema` with `library` and the default loader.
///
/// # Errors
///
/// See [`ValidatorBuilder::build`].
pub fn build_validator(schema: &Value, library: &Library) -> Result<SchemaValidator, BuildError> {
    ValidatorBuilder::new().library(library.clone()).build(schema)
}

/// Validate `instance` against `schema` in one call.
///
/// Use [`SchemaValidator`] directly when validating several instances
/// against the same schema.
///
/// # Errors
///
/// Returns `BuildError` if the schema cannot be built or the engine fails
/// during validation.
pub fn validate(schema: &Value, instance: &Value) -> Result<ValidationReport, BuildError> {
    let validator = SchemaValidator::new(schema)?;
    Ok(validator.validate(instance)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::NoLoader;
    use serde_json::json;

    #[test]
    fn validate_valid_instance() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" }
            },
            "required": ["name"]
        });
        let report = validate(&schema, &json!({"name": "test"})).unwrap();
        assert!(report.is_success());
        assert!(report.is_empty());
    }

    #[test]
    fn validate_missing_required_field() {
        let schema = json!({"type": "object", "required": ["name"]});
        let report = validate(&schema, &json!({})).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn validate_wrong_type() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" }
            }
        });
        let report = validate(&schema, &json!({"name": 123})).unwrap();
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].pointer.to_string(), "/name");
        assert_eq!(errors[0].keyword.as_deref(), Some("type"));
    }

    #[test]
    fn additional_property_rejected() {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "name": { "type": "string" }
            }
        });
        let report = validate(&schema, &json!({"name": "test", "id": "123"})).unwrap();
        assert!(!report.is_success());
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "age": { "type": "number" }
            }
        });
        let report = validate(&schema, &json!({"name": 1, "age": "old"})).unwrap();
        assert_eq!(report.error_count(), 2);
        let pointers: Vec<_> = report.errors().map(|m| m.pointer.to_string()).collect();
        assert_eq!(pointers, vec!["/age", "/name"]);
    }

    #[test]
    fn syntax_errors_fail_the_build() {
        let err = SchemaValidator::new(&json!({"minLength": "one"})).unwrap_err();
        let report = err.syntax_report().unwrap();
        assert_eq!(report.error_count(), 1);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn warnings_are_kept_on_the_validator() {
        let validator = SchemaValidator::new(&json!({"format": "color"})).unwrap();
        assert_eq!(validator.syntax_report().len(), 1);
        assert!(validator.is_valid(&json!("red")).unwrap());
    }

    #[test]
    fn chains_are_prepared_at_build_time() {
        let validator = SchemaValidator::builder()
            .loader(NoLoader)
            .build(&json!({"minLength": 1, "properties": {"a": {"maxLength": 2}}}))
            .unwrap();
        assert_eq!(validator.cache().len(), 2);
        validator.validate(&json!({"a": "abc"})).unwrap();
        assert_eq!(validator.cache().len(), 2);
    }

    #[test]
    fn base_uri_from_builder() {
        let base = Url::parse("https://example.com/schemas/root.json").unwrap();
        let loader = crate::loader::MapLoader::new()
            .with("https://example.com/schemas/item.json", json!({"type": "integer"}));
        let validator = SchemaValidator::builder()
            .base_uri(base)
            .loader(loader)
            .build(&json!({"items": {"$ref": "item.json"}}))
            .unwrap();
        assert!(validator.is_valid(&json!([1, 2])).unwrap());
        assert!(!validator.is_valid(&json!([1, "2"])).unwrap());
    }

    #[test]
    fn validator_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SchemaValidator>();
    }
}
