//! Digest-keyed cache of keyword validators.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::digest::KeywordDigest;
use crate::error::EngineError;
use crate::keywords::KeywordValidator;

/// Append-only map from [`KeywordDigest`] to a built validator.
///
/// Lookups take a read lock. A miss takes the write lock and checks again
/// before building, so concurrent misses for one digest build one validator.
#[derive(Default)]
pub struct ValidatorCache {
    entries: RwLock<HashMap<KeywordDigest, Arc<dyn KeywordValidator>>>,
}

impl ValidatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, digest: &KeywordDigest) -> Option<Arc<dyn KeywordValidator>> {
        self.entries.read().get(digest).cloned()
    }

    /// Return the validator for `digest`, building it with `build` on a miss.
    ///
    /// `build` receives the digest's canonical fragment. It is not called on
    /// a hit, and a failed build leaves the cache unchanged.
    pub fn get_or_build<F>(
        &self,
        digest: &KeywordDigest,
        build: F,
    ) -> Result<Arc<dyn KeywordValidator>, EngineError>
    where
        F: FnOnce(&Value) -> Result<Arc<dyn KeywordValidator>, EngineError>,
    {
        if let Some(validator) = self.get(digest) {
            return Ok(validator);
        }

        let mut entries = self.entries.write();
        if let Some(validator) = entries.get(digest) {
            return Ok(Arc::clone(validator));
        }

        debug!(keyword = digest.keyword(), digest = %digest, "building keyword validator");
        let validator = build(digest.value())?;
        entries.insert(digest.clone(), Arc::clone(&validator));
        Ok(validator)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ValidationContext;
    use crate::types::TypeSet;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct Noop;

    impl KeywordValidator for Noop {
        fn validate(
            &self,
            _ctx: &mut ValidationContext<'_>,
            _instance: &Value,
        ) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn digest(value: Value) -> KeywordDigest {
        KeywordDigest::new("x-test", TypeSet::ALL, value).unwrap()
    }

    #[test]
    fn hit_returns_same_instance() {
        let cache = ValidatorCache::new();
        let calls = AtomicUsize::new(0);
        let build = |_: &Value| -> Result<Arc<dyn KeywordValidator>, EngineError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Noop))
        };

        let first = cache.get_or_build(&digest(json!(1)), build).unwrap();
        let second = cache.get_or_build(&digest(json!(1)), build).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_digests_build_separately() {
        let cache = ValidatorCache::new();
        let build = |_: &Value| -> Result<Arc<dyn KeywordValidator>, EngineError> {
            Ok(Arc::new(Noop))
        };
        cache.get_or_build(&digest(json!(1)), build).unwrap();
        cache.get_or_build(&digest(json!(2)), build).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_build_is_not_cached() {
        let cache = ValidatorCache::new();
        let result = cache.get_or_build(&digest(json!(1)), |_| {
            Err(EngineError::ValidatorConstruction {
                keyword: "x-test".into(),
                message: "boom".into(),
            })
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn builder_receives_canonical_fragment() {
        let cache = ValidatorCache::new();
        cache
            .get_or_build(&digest(json!({"n": 3})), |value| {
                assert_eq!(value, &json!({"n": 3}));
                Ok(Arc::new(Noop))
            })
            .unwrap();
    }

    #[test]
    fn concurrent_misses_build_once() {
        let cache = Arc::new(ValidatorCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache
                        .get_or_build(&digest(json!("shared")), |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(Arc::new(Noop) as Arc<dyn KeywordValidator>)
                        })
                        .unwrap()
                })
            })
            .collect();

        let built: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(built.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
