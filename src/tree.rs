//! Schema documents and `$ref` resolution.
//!
//! A [`SchemaTree`] is an arena of JSON documents. Schema fragments are
//! addressed by [`NodeRef`] (document id + JSON pointer) rather than by
//! borrowed nodes, so the same fragment reached through different `$ref`
//! chains has a single identity.
//!
//! Resolution follows `$ref` hops until a non-reference node is reached.
//! Every location on a chain is recorded in an explicit set while the chain
//! is walked; meeting one of them again is a reference cycle. Resolved
//! targets are cached per location.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::EngineError;
use crate::loader::SchemaLoader;
use crate::pointer::JsonPointer;
use crate::types::Dialect;

/// Base URI of a root document that declares no absolute id.
pub const DEFAULT_BASE_URI: &str = "memory:///root.json";

/// Values under these keywords are data, not schemas; ids inside them are
/// not indexed.
const DATA_KEYWORDS: &[&str] = &["enum", "const", "default", "examples"];

/// Index of a document in a [`SchemaTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(usize);

/// Location of a schema fragment: document plus pointer inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    pub document: DocumentId,
    pub pointer: JsonPointer,
}

impl NodeRef {
    pub fn new(document: DocumentId, pointer: JsonPointer) -> Self {
        Self { document, pointer }
    }

    /// Location of a fragment below this one.
    pub fn child<I, T>(&self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new(self.document, self.pointer.extend(tokens))
    }
}

/// Read-only view of a schema fragment.
#[derive(Debug, Clone)]
pub struct SchemaNode<'t> {
    pub value: &'t Value,
    pub document: &'t Url,
    pub pointer: JsonPointer,
}

impl SchemaNode<'_> {
    /// Absolute location, `uri#pointer`.
    pub fn location(&self) -> String {
        format!("{}{}", self.document, self.pointer.to_fragment())
    }
}

/// What a schema location denotes once `$ref` is taken into account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(NodeRef),
    /// The location holds a `$ref` that was never resolved.
    Unresolved(String),
}

#[derive(Debug)]
struct Document {
    uri: Url,
    root: Value,
}

/// Arena of schema documents with a resolved-reference index.
#[derive(Debug)]
pub struct SchemaTree {
    dialect: Dialect,
    documents: Vec<Document>,
    by_uri: HashMap<Url, DocumentId>,
    ids: HashMap<Url, NodeRef>,
    resolved: HashMap<NodeRef, NodeRef>,
}

impl SchemaTree {
    /// Create a tree around a root document.
    ///
    /// The root's base URI is its id keyword when that resolves to an
    /// absolute URI against `base` (or [`DEFAULT_BASE_URI`]).
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidRef` if the default base URI cannot be
    /// parsed.
    pub fn new(root: Value, base: Option<Url>, dialect: Dialect) -> Result<Self, EngineError> {
        let base = match base {
            Some(base) => base,
            None => Url::parse(DEFAULT_BASE_URI).map_err(|e| EngineError::InvalidRef {
                reference: DEFAULT_BASE_URI.to_string(),
                location: String::new(),
                message: e.to_string(),
            })?,
        };

        let mut uri = root
            .get(dialect.id_keyword())
            .and_then(Value::as_str)
            .and_then(|id| base.join(id).ok())
            .unwrap_or(base);
        uri.set_fragment(None);

        let mut tree = Self {
            dialect,
            documents: Vec::new(),
            by_uri: HashMap::new(),
            ids: HashMap::new(),
            resolved: HashMap::new(),
        };
        tree.add_document(uri, root);
        Ok(tree)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Location of the root document's root.
    pub fn root(&self) -> NodeRef {
        NodeRef::new(DocumentId(0), JsonPointer::root())
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn document_uri(&self, id: DocumentId) -> Option<&Url> {
        self.documents.get(id.0).map(|d| &d.uri)
    }

    /// The value at a location, without following `$ref`.
    pub fn value(&self, node: &NodeRef) -> Option<&Value> {
        let document = self.documents.get(node.document.0)?;
        node.pointer.get(&document.root)
    }

    pub fn node(&self, node: &NodeRef) -> Option<SchemaNode<'_>> {
        let document = self.documents.get(node.document.0)?;
        Some(SchemaNode {
            value: node.pointer.get(&document.root)?,
            document: &document.uri,
            pointer: node.pointer.clone(),
        })
    }

    /// Absolute location string, `uri#pointer`.
    pub fn location(&self, node: &NodeRef) -> String {
        match self.document_uri(node.document) {
            Some(uri) => format!("{}{}", uri, node.pointer.to_fragment()),
            None => node.pointer.to_fragment(),
        }
    }

    /// Base URI in effect at a location, applying nested id keywords
    /// between the document root and the location.
    pub fn base_uri(&self, node: &NodeRef) -> Option<Url> {
        let document = self.documents.get(node.document.0)?;
        let id_keyword = self.dialect.id_keyword();
        let mut base = document.uri.clone();
        let mut current = &document.root;

        for token in node.pointer.tokens() {
            current = match current {
                Value::Object(map) => map.get(token)?,
                Value::Array(items) => items.get(token.parse::<usize>().ok()?)?,
                _ => return None,
            };
            if let Some(id) = current.get(id_keyword).and_then(Value::as_str) {
                if let Ok(joined) = base.join(id) {
                    base = joined;
                }
            }
        }
        Some(base)
    }

    /// What `node` denotes, using only references resolved so far.
    pub fn target(&self, node: &NodeRef) -> Target {
        match self.value(node).and_then(ref_value) {
            None => Target::Node(node.clone()),
            Some(reference) => match self.resolved.get(node) {
                Some(target) => Target::Node(target.clone()),
                None => Target::Unresolved(reference.to_string()),
            },
        }
    }

    /// Follow `$ref` from `start` until a non-reference node is reached.
    ///
    /// Documents outside the tree are obtained through `loader` and added to
    /// the tree. Results are cached, so resolving the same location again
    /// does no work.
    ///
    /// # Errors
    ///
    /// - `EngineError::RefResolution` if the chain returns to a location
    ///   already on it.
    /// - `EngineError::DanglingRef` if a pointer does not resolve.
    /// - `EngineError::Load` if a document cannot be obtained.
    /// - `EngineError::InvalidRef` if a reference is not a valid URI
    ///   reference.
    pub fn resolve(
        &mut self,
        start: &NodeRef,
        loader: &dyn SchemaLoader,
    ) -> Result<NodeRef, EngineError> {
        if let Some(target) = self.resolved.get(start) {
            return Ok(target.clone());
        }

        let mut chain: Vec<NodeRef> = Vec::new();
        let mut resolving: HashSet<NodeRef> = HashSet::new();
        let mut current = start.clone();

        loop {
            let value = self
                .value(&current)
                .ok_or_else(|| EngineError::DanglingRef {
                    reference: self.location(&current),
                    document: self.document_label(current.document),
                    pointer: current.pointer.to_string(),
                })?;
            let Some(reference) = ref_value(value).map(str::to_string) else {
                break;
            };

            if !resolving.insert(current.clone()) {
                let mut locations: Vec<String> = chain.iter().map(|n| self.location(n)).collect();
                locations.push(self.location(&current));
                return Err(EngineError::RefResolution { chain: locations });
            }
            chain.push(current.clone());

            if let Some(target) = self.resolved.get(&current) {
                current = target.clone();
                break;
            }

            let base = self
                .base_uri(&current)
                .ok_or_else(|| EngineError::InvalidRef {
                    reference: reference.clone(),
                    location: self.location(&current),
                    message: "no base URI".to_string(),
                })?;
            let target = base.join(&reference).map_err(|e| EngineError::InvalidRef {
                reference: reference.clone(),
                location: self.location(&current),
                message: e.to_string(),
            })?;

            trace!(from = %self.location(&current), to = %target, "following $ref");
            current = self.lookup(&target, &reference, loader)?;
        }

        for node in chain {
            self.resolved.insert(node, current.clone());
        }
        Ok(current)
    }

    /// Number of locations with a cached resolution.
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    fn lookup(
        &mut self,
        target: &Url,
        reference: &str,
        loader: &dyn SchemaLoader,
    ) -> Result<NodeRef, EngineError> {
        let fragment = target.fragment().unwrap_or("").to_string();
        let mut document_uri = target.clone();
        document_uri.set_fragment(None);

        // Plain-name fragment: an embedded `#name` id.
        if !fragment.is_empty() && !fragment.starts_with('/') {
            if let Some(node) = self.ids.get(target) {
                return Ok(node.clone());
            }
            if !self.contains(&document_uri) {
                self.load(&document_uri, loader)?;
            }
            return self
                .ids
                .get(target)
                .cloned()
                .ok_or_else(|| EngineError::DanglingRef {
                    reference: reference.to_string(),
                    document: document_uri.to_string(),
                    pointer: format!("#{}", fragment),
                });
        }

        let pointer = JsonPointer::from_fragment(&fragment)?;
        let base = match self.by_uri.get(&document_uri) {
            Some(id) => NodeRef::new(*id, JsonPointer::root()),
            None => match self.ids.get(&document_uri) {
                Some(node) => node.clone(),
                None => NodeRef::new(self.load(&document_uri, loader)?, JsonPointer::root()),
            },
        };

        let node = NodeRef::new(base.document, base.pointer.join(&pointer));
        if self.value(&node).is_none() {
            return Err(EngineError::DanglingRef {
                reference: reference.to_string(),
                document: document_uri.to_string(),
                pointer: pointer.to_string(),
            });
        }
        Ok(node)
    }

    fn contains(&self, uri: &Url) -> bool {
        self.by_uri.contains_key(uri) || self.ids.contains_key(uri)
    }

    fn load(&mut self, uri: &Url, loader: &dyn SchemaLoader) -> Result<DocumentId, EngineError> {
        debug!(uri = %uri, "loading schema document");
        let document = loader.load(uri).map_err(|source| EngineError::Load {
            uri: uri.to_string(),
            source,
        })?;
        Ok(self.add_document(uri.clone(), document))
    }

    fn add_document(&mut self, uri: Url, root: Value) -> DocumentId {
        let id = DocumentId(self.documents.len());
        let mut found = Vec::new();
        collect_ids(
            &root,
            &uri,
            self.dialect.id_keyword(),
            &mut JsonPointer::root(),
            &mut found,
        );
        for (id_uri, pointer) in found {
            if id_uri != uri {
                self.ids.entry(id_uri).or_insert(NodeRef::new(id, pointer));
            }
        }
        self.by_uri.insert(uri.clone(), id);
        self.documents.push(Document { uri, root });
        id
    }

    fn document_label(&self, id: DocumentId) -> String {
        self.document_uri(id)
            .map(Url::to_string)
            .unwrap_or_else(|| format!("document {}", id.0))
    }
}

/// The string value of `$ref`; non-string `$ref` members are not references.
fn ref_value(value: &Value) -> Option<&str> {
    value.get("$ref").and_then(Value::as_str)
}

/// Record every id keyword in `value` as (absolute URI, pointer).
///
/// Ids with a plain-name fragment are recorded with the fragment; other ids
/// are recorded without one and rebase their subtree.
fn collect_ids(
    value: &Value,
    base: &Url,
    id_keyword: &str,
    pointer: &mut JsonPointer,
    found: &mut Vec<(Url, JsonPointer)>,
) {
    match value {
        Value::Object(map) => {
            let mut base = base.clone();
            if let Some(joined) = map
                .get(id_keyword)
                .and_then(Value::as_str)
                .and_then(|id| base.join(id).ok())
            {
                match joined.fragment() {
                    Some(fragment) if !fragment.is_empty() && !fragment.starts_with('/') => {
                        found.push((joined, pointer.clone()));
                    }
                    _ => {
                        let mut rebased = joined;
                        rebased.set_fragment(None);
                        found.push((rebased.clone(), pointer.clone()));
                        base = rebased;
                    }
                }
            }

            for (key, child) in map {
                if DATA_KEYWORDS.contains(&key.as_str()) {
                    continue;
                }
                pointer.push(key.clone());
                collect_ids(child, &base, id_keyword, pointer, found);
                pointer.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                pointer.push(index.to_string());
                collect_ids(child, base, id_keyword, pointer, found);
                pointer.pop();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::loader::{MapLoader, NoLoader};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tree(schema: Value) -> SchemaTree {
        SchemaTree::new(schema, None, Dialect::Draft7).unwrap()
    }

    fn at(tree: &SchemaTree, pointer: &str) -> NodeRef {
        NodeRef::new(tree.root().document, JsonPointer::parse(pointer).unwrap())
    }

    #[test]
    fn resolve_intra_document_ref() {
        let mut tree = tree(json!({
            "definitions": {"str": {"type": "string"}},
            "properties": {"a": {"$ref": "#/definitions/str"}}
        }));
        let start = at(&tree, "/properties/a");
        let target = tree.resolve(&start, &NoLoader).unwrap();
        assert_eq!(target.pointer.to_string(), "/definitions/str");
        assert_eq!(tree.target(&start), Target::Node(target));
    }

    #[test]
    fn non_ref_resolves_to_itself() {
        let mut tree = tree(json!({"type": "object"}));
        let root = tree.root();
        assert_eq!(tree.resolve(&root, &NoLoader).unwrap(), root);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut tree = tree(json!({"a": {"$ref": "#/a"}, "$ref": "#/a"}));
        let root = tree.root();
        let err = tree.resolve(&root, &NoLoader).unwrap_err();
        match err {
            EngineError::RefResolution { chain } => {
                assert_eq!(
                    chain,
                    vec![
                        "memory:///root.json#".to_string(),
                        "memory:///root.json#/a".to_string(),
                        "memory:///root.json#/a".to_string(),
                    ]
                );
            }
            other => panic!("expected RefResolution, got {other}"),
        }
    }

    #[test]
    fn multi_hop_cycle_detected() {
        let mut tree = tree(json!({
            "a": {"$ref": "#/b"},
            "b": {"$ref": "#/c"},
            "c": {"$ref": "#/a"}
        }));
        let start = at(&tree, "/a");
        assert!(matches!(
            tree.resolve(&start, &NoLoader),
            Err(EngineError::RefResolution { .. })
        ));
    }

    #[test]
    fn recursive_schema_is_not_a_cycle() {
        let mut tree = tree(json!({
            "properties": {"child": {"$ref": "#"}}
        }));
        let start = at(&tree, "/properties/child");
        assert_eq!(tree.resolve(&start, &NoLoader).unwrap(), tree.root());
    }

    #[test]
    fn dangling_pointer() {
        let mut tree = tree(json!({"items": {"$ref": "#/definitions/missing"}}));
        let start = at(&tree, "/items");
        assert!(matches!(
            tree.resolve(&start, &NoLoader),
            Err(EngineError::DanglingRef { .. })
        ));
    }

    #[test]
    fn remote_document_loaded_once() {
        let calls = AtomicUsize::new(0);
        let loader = |uri: &Url| -> Result<Value, LoadError> {
            calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(uri.as_str(), "https://example.com/defs.json");
            Ok(json!({"definitions": {"n": {"type": "number"}, "s": {"type": "string"}}}))
        };
        let mut tree = SchemaTree::new(
            json!({
                "$id": "https://example.com/root.json",
                "properties": {
                    "a": {"$ref": "defs.json#/definitions/n"},
                    "b": {"$ref": "defs.json#/definitions/s"}
                }
            }),
            None,
            Dialect::Draft7,
        )
        .unwrap();

        let a = tree.resolve(&at(&tree, "/properties/a"), &loader).unwrap();
        let b = tree.resolve(&at(&tree, "/properties/b"), &loader).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.document, b.document);
        assert_eq!(tree.value(&a), Some(&json!({"type": "number"})));
        assert_eq!(tree.document_count(), 2);
    }

    #[test]
    fn resolution_is_cached() {
        let calls = AtomicUsize::new(0);
        let loader = |_: &Url| -> Result<Value, LoadError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"type": "null"}))
        };
        let mut tree = tree(json!({"$ref": "https://example.com/null.json"}));
        let root = tree.root();
        let first = tree.resolve(&root, &loader).unwrap();
        let second = tree.resolve(&root, &loader).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(tree.resolved_count(), 1);
    }

    #[test]
    fn load_failure_is_reported() {
        let mut tree = tree(json!({"$ref": "https://example.com/missing.json"}));
        let root = tree.root();
        match tree.resolve(&root, &MapLoader::new()) {
            Err(EngineError::Load { uri, .. }) => {
                assert_eq!(uri, "https://example.com/missing.json");
            }
            other => panic!("expected Load error, got {other:?}"),
        }
    }

    #[test]
    fn nested_id_rebases_refs() {
        let loader = MapLoader::new().with(
            "https://example.com/nested/item.json",
            json!({"type": "integer"}),
        );
        let mut tree = tree(json!({
            "$id": "https://example.com/root.json",
            "properties": {
                "x": {
                    "$id": "nested/",
                    "items": {"$ref": "item.json"}
                }
            }
        }));
        let start = at(&tree, "/properties/x/items");
        assert_eq!(
            tree.base_uri(&start).unwrap().as_str(),
            "https://example.com/nested/"
        );
        let target = tree.resolve(&start, &loader).unwrap();
        assert_eq!(tree.value(&target), Some(&json!({"type": "integer"})));
    }

    #[test]
    fn embedded_id_resolves_without_loading() {
        let mut tree = tree(json!({
            "$id": "https://example.com/root.json",
            "definitions": {
                "pos": {"$id": "https://example.com/positive.json", "minimum": 0}
            },
            "items": {"$ref": "positive.json"}
        }));
        let start = at(&tree, "/items");
        let target = tree.resolve(&start, &NoLoader).unwrap();
        assert_eq!(target.pointer.to_string(), "/definitions/pos");
    }

    #[test]
    fn plain_name_fragment() {
        let mut tree = tree(json!({
            "definitions": {"a": {"$id": "#thing", "type": "boolean"}},
            "items": {"$ref": "#thing"}
        }));
        let start = at(&tree, "/items");
        let target = tree.resolve(&start, &NoLoader).unwrap();
        assert_eq!(target.pointer.to_string(), "/definitions/a");
    }

    #[test]
    fn draft4_uses_id_keyword() {
        let tree = SchemaTree::new(
            json!({"id": "https://example.com/v4.json", "type": "object"}),
            None,
            Dialect::Draft4,
        )
        .unwrap();
        assert_eq!(
            tree.document_uri(tree.root().document).unwrap().as_str(),
            "https://example.com/v4.json"
        );
    }

    #[test]
    fn ids_inside_enum_are_data() {
        let mut tree = tree(json!({
            "enum": [{"$id": "#fake"}],
            "items": {"$ref": "#fake"}
        }));
        let start = at(&tree, "/items");
        assert!(matches!(
            tree.resolve(&start, &NoLoader),
            Err(EngineError::DanglingRef { .. })
        ));
    }

    #[test]
    fn unresolved_target_reported() {
        let tree = tree(json!({"items": {"$ref": "#/definitions/x"}}));
        let start = at(&tree, "/items");
        assert_eq!(
            tree.target(&start),
            Target::Unresolved("#/definitions/x".to_string())
        );
    }
}
