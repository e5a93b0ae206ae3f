//! Keyword digests: content-derived cache keys for keyword validators.
//!
//! A [`Digester`] reduces the part of a schema object relevant to one keyword
//! to a canonical JSON value and declares which instance types the keyword
//! can apply to. [`KeywordDigest`] hashes the keyword name, the type set and
//! the canonical value (serialized with RFC 8785 JCS) with SHA-256.
//!
//! A digest depends only on content, never on where the fragment lives:
//! the same fragment at two locations has one digest.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use sha2::{Digest as _, Sha256};

use crate::error::EngineError;
use crate::types::TypeSet;

/// Canonicalization of one keyword's schema fragment.
pub trait Digester: Send + Sync {
    /// Instance types the keyword can ever apply to.
    fn types(&self) -> TypeSet;

    /// Canonical value of the keyword within `schema`, the enclosing schema
    /// object. Digesters may read sibling keywords the keyword depends on.
    fn digest(&self, schema: &Map<String, Value>) -> Value;
}

/// The keyword's own value, as is.
#[derive(Debug, Clone)]
pub struct SimpleDigester {
    keyword: String,
    types: TypeSet,
}

impl SimpleDigester {
    pub fn new(keyword: impl Into<String>, types: TypeSet) -> Self {
        Self {
            keyword: keyword.into(),
            types,
        }
    }
}

impl Digester for SimpleDigester {
    fn types(&self) -> TypeSet {
        self.types
    }

    fn digest(&self, schema: &Map<String, Value>) -> Value {
        schema.get(&self.keyword).cloned().unwrap_or(Value::Null)
    }
}

/// The keyword's value read as an unordered set.
///
/// Arrays are sorted by canonical serialization and deduplicated; a lone
/// string is treated as a one-member set. Used for `required`, `type` and
/// `enum`, where member order carries no meaning.
#[derive(Debug, Clone)]
pub struct SetDigester {
    keyword: String,
    types: TypeSet,
}

impl SetDigester {
    pub fn new(keyword: impl Into<String>, types: TypeSet) -> Self {
        Self {
            keyword: keyword.into(),
            types,
        }
    }
}

impl Digester for SetDigester {
    fn types(&self) -> TypeSet {
        self.types
    }

    fn digest(&self, schema: &Map<String, Value>) -> Value {
        match schema.get(&self.keyword) {
            Some(Value::Array(items)) => Value::Array(canonical_set(items)),
            Some(Value::String(s)) => json!([s]),
            Some(other) => other.clone(),
            None => Value::Null,
        }
    }
}

/// A digester backed by a closure.
#[derive(Clone)]
pub struct FnDigester {
    types: TypeSet,
    digest: Arc<dyn Fn(&Map<String, Value>) -> Value + Send + Sync>,
}

impl FnDigester {
    pub fn new<F>(types: TypeSet, digest: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Value + Send + Sync + 'static,
    {
        Self {
            types,
            digest: Arc::new(digest),
        }
    }
}

impl fmt::Debug for FnDigester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnDigester")
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}

impl Digester for FnDigester {
    fn types(&self) -> TypeSet {
        self.types
    }

    fn digest(&self, schema: &Map<String, Value>) -> Value {
        (self.digest)(schema)
    }
}

/// Sorted, deduplicated copy of `items`, ordered by canonical serialization.
pub fn canonical_set(items: &[Value]) -> Vec<Value> {
    let mut keyed: Vec<(String, Value)> = items
        .iter()
        .map(|v| (serde_jcs::to_string(v).unwrap_or_default(), v.clone()))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|a, b| a.0 == b.0);
    keyed.into_iter().map(|(_, v)| v).collect()
}

/// Sorted keys of an object-valued member of `schema`.
pub fn sorted_keys(schema: &Map<String, Value>, keyword: &str) -> Vec<String> {
    let mut keys: Vec<String> = schema
        .get(keyword)
        .and_then(Value::as_object)
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default();
    keys.sort();
    keys
}

/// Fingerprint of a keyword's canonical fragment.
///
/// Equality and hashing use the keyword name and the SHA-256 fingerprint.
#[derive(Clone)]
pub struct KeywordDigest {
    keyword: String,
    types: TypeSet,
    value: Value,
    fingerprint: [u8; 32],
}

impl KeywordDigest {
    /// Digest an already-canonical value.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Digest` if the value cannot be serialized.
    pub fn new(
        keyword: impl Into<String>,
        types: TypeSet,
        value: Value,
    ) -> Result<Self, EngineError> {
        let keyword = keyword.into();
        let envelope = json!({
            "keyword": keyword,
            "types": types.names(),
            "value": value,
        });
        let bytes = serde_jcs::to_vec(&envelope).map_err(|source| EngineError::Digest {
            keyword: keyword.clone(),
            source,
        })?;
        let hash = Sha256::digest(&bytes);
        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&hash);
        Ok(Self {
            keyword,
            types,
            value,
            fingerprint,
        })
    }

    /// Run `digester` over `schema` and digest the result.
    pub fn compute(
        keyword: &str,
        digester: &dyn Digester,
        schema: &Map<String, Value>,
    ) -> Result<Self, EngineError> {
        Self::new(keyword, digester.types(), digester.digest(schema))
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn types(&self) -> TypeSet {
        self.types
    }

    /// The canonical fragment validators are constructed from.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    /// Lowercase hex rendering of the fingerprint.
    pub fn to_hex(&self) -> String {
        self.fingerprint.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl PartialEq for KeywordDigest {
    fn eq(&self, other: &Self) -> bool {
        self.keyword == other.keyword && self.fingerprint == other.fingerprint
    }
}

impl Eq for KeywordDigest {}

impl Hash for KeywordDigest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.keyword.hash(state);
        self.fingerprint.hash(state);
    }
}

impl fmt::Debug for KeywordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeywordDigest")
            .field("keyword", &self.keyword)
            .field("types", &self.types)
            .field("fingerprint", &self.to_hex())
            .finish()
    }
}

impl fmt::Display for KeywordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.keyword, &self.to_hex()[..12])
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn required_digest_is_permutation_invariant(
            mut names in proptest::collection::vec("[a-z]{1,6}", 0..8),
            seed in any::<u64>(),
        ) {
            let d = SetDigester::new("required", TypeSet::OBJECT);
            let mut schema = Map::new();
            schema.insert("required".into(), json!(names.clone()));
            let first = KeywordDigest::compute("required", &d, &schema).unwrap();

            let len = names.len().max(1);
            names.rotate_left((seed as usize) % len);
            names.reverse();
            schema.insert("required".into(), json!(names));
            let second = KeywordDigest::compute("required", &d, &schema).unwrap();

            prop_assert_eq!(first, second);
        }

        #[test]
        fn digest_is_deterministic(n in any::<i64>(), s in "[ -~]{0,16}") {
            let value = json!({"n": n, "s": s});
            let a = KeywordDigest::new("const", TypeSet::ALL, value.clone()).unwrap();
            let b = KeywordDigest::new("const", TypeSet::ALL, value).unwrap();
            prop_assert_eq!(a.fingerprint(), b.fingerprint());
        }

        #[test]
        fn distinct_integers_never_collide(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            let x = KeywordDigest::new("minimum", TypeSet::NUMERIC, json!(a)).unwrap();
            let y = KeywordDigest::new("minimum", TypeSet::NUMERIC, json!(b)).unwrap();
            prop_assert_ne!(x, y);
        }
    }
}
