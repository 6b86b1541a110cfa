//! ---
//! ironstack_section: "01-core-functionality"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Named strategy registries and per-id instance caches."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use thiserror::Error;

/// Raised when a strategy id has no registered constructor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} strategy '{id}' (known: {known})")]
pub struct UnknownStrategy {
    pub kind: &'static str,
    pub id: String,
    pub known: String,
}

/// Maps stable string ids to constructors of one strategy kind.
///
/// Registries are open: callers may register their own ids next to the
/// built-in ones, or replace a built-in id.
#[derive(Clone)]
pub struct Registry<C> {
    kind: &'static str,
    entries: IndexMap<String, C>,
}

impl<C> std::fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("ids", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<C> Registry<C> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn register(&mut self, id: impl Into<String>, constructor: C) -> &mut Self {
        self.entries.insert(id.into(), constructor);
        self
    }

    pub fn with(mut self, id: impl Into<String>, constructor: C) -> Self {
        self.register(id, constructor);
        self
    }

    pub fn resolve(&self, id: &str) -> Result<&C, UnknownStrategy> {
        self.entries.get(id).ok_or_else(|| UnknownStrategy {
            kind: self.kind,
            id: id.to_owned(),
            known: self.entries.keys().cloned().collect::<Vec<_>>().join(", "),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// One shared instance per strategy id, built lazily.
pub struct StrategyCache<T: ?Sized> {
    instances: Mutex<IndexMap<String, Arc<T>>>,
}

impl<T: ?Sized> Default for StrategyCache<T> {
    fn default() -> Self {
        Self {
            instances: Mutex::new(IndexMap::new()),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for StrategyCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyCache")
            .field("ids", &self.instances.lock().keys().cloned().collect::<Vec<_>>())
            .finish()
    }
}

impl<T: ?Sized> StrategyCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached instance for `id`, building it with `build` on first use.
    ///
    /// `build` runs without the lock held; a failed build caches nothing.
    pub fn get_or_try_insert<E>(
        &self,
        id: &str,
        build: impl FnOnce() -> Result<Arc<T>, E>,
    ) -> Result<Arc<T>, E> {
        if let Some(existing) = self.instances.lock().get(id) {
            return Ok(Arc::clone(existing));
        }
        let built = build()?;
        let mut instances = self.instances.lock();
        let entry = instances.entry(id.to_owned()).or_insert(built);
        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Ctor = fn() -> Arc<dyn Fn() -> &'static str + Send + Sync>;

    fn alpha() -> Arc<dyn Fn() -> &'static str + Send + Sync> {
        Arc::new(|| "alpha")
    }

    #[test]
    fn resolve_reports_known_ids() {
        let registry: Registry<Ctor> = Registry::new("packager").with("alpha", alpha);
        assert_eq!((registry.resolve("alpha").unwrap())()(), "alpha");
        let err = registry.resolve("beta").unwrap_err();
        assert_eq!(err.kind, "packager");
        assert_eq!(err.known, "alpha");
        assert!(err.to_string().contains("beta"));
    }

    #[test]
    fn cache_builds_once_per_id() {
        let cache: StrategyCache<str> = StrategyCache::new();
        let builds = AtomicUsize::new(0);
        for _ in 0..3 {
            let value = cache
                .get_or_try_insert::<()>("a", || {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::from("first"))
                })
                .unwrap();
            assert_eq!(&*value, "first");
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_build_is_not_cached() {
        let cache: StrategyCache<str> = StrategyCache::new();
        assert!(cache.get_or_try_insert("a", || Err("boom")).is_err());
        assert!(cache.is_empty());
    }
}
