//! # Config Cache Module
//!
//! Read-optimized per-endpoint key-value store, populated at boot and
//! mutated only by explicit config-change events.
//!
//! ## Overview
//!
//! Every request reads endpoint configuration (secret material, url prefix,
//! static asset settings), so lookups must be cheap and must never block on
//! an unrelated writer. The cache keeps one entry per endpoint identity:
//!
//! - the runtime config partition as an [`ArcSwap`] snapshot: readers do a
//!   lock-free load, writers replace the whole snapshot (RCU), so a reader
//!   observes either the old or the fully-updated value for any key, never
//!   a torn mix
//! - a [`DashMap`] memo table for lazily derived values (base URL structs,
//!   static-asset digest lookups) computed at most once between
//!   invalidations
//!
//! ## Lifecycle
//!
//! Populated by [`ConfigCache::insert`] when an endpoint is compiled, read
//! by every request, updated on config-change events via
//! [`ConfigCache::update`] (which also invalidates all memos for the
//! endpoint), torn down with [`ConfigCache::remove`].
//!
//! ## Failure policy
//!
//! Lookups never fail: a missing key, or a missing endpoint, degrades to
//! the caller-supplied default.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::types::EndpointConfig;

struct EndpointEntry {
    /// Runtime config snapshot; whole-map RCU replacement on update
    snapshot: ArcSwap<HashMap<String, Value>>,
    /// Memoized derived values, invalidated wholesale by `update`
    derived: DashMap<String, Arc<Value>>,
}

/// Process-wide configuration store, one entry per endpoint identity.
///
/// An explicit injected value rather than an ambient global: tests and
/// multi-endpoint processes hold independent caches behind an `Arc`.
///
/// # Example
///
/// ```
/// use waypoint::config::ConfigCache;
/// use serde_json::json;
/// use std::collections::HashMap;
///
/// let cache = ConfigCache::new();
/// let config = waypoint::config::load("my_app", "MyEndpoint", HashMap::new()).unwrap();
/// cache.insert(&config);
///
/// assert_eq!(cache.get("MyEndpoint", "server", json!(true)), json!(false));
/// assert_eq!(cache.get("MyEndpoint", "no_such_key", json!(42)), json!(42));
/// ```
#[derive(Default)]
pub struct ConfigCache {
    endpoints: DashMap<String, EndpointEntry>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self {
            endpoints: DashMap::new(),
        }
    }

    /// Populate the cache with an endpoint's runtime config partition.
    ///
    /// Called once at compile/boot time. Re-inserting the same endpoint
    /// replaces its snapshot and drops its memos.
    pub fn insert(&self, config: &EndpointConfig) {
        let runtime = config.runtime_partition();
        info!(
            endpoint = %config.endpoint,
            keys = runtime.len(),
            "Config cache populated"
        );
        self.endpoints.insert(
            config.endpoint.clone(),
            EndpointEntry {
                snapshot: ArcSwap::from_pointee(runtime),
                derived: DashMap::new(),
            },
        );
    }

    /// Tear down an endpoint's entry.
    pub fn remove(&self, endpoint: &str) {
        self.endpoints.remove(endpoint);
    }

    /// O(1) lookup. Returns `default` when the key or the whole endpoint
    /// is absent. Never fails, never blocks on writers to other keys.
    pub fn get(&self, endpoint: &str, key: &str, default: Value) -> Value {
        match self.endpoints.get(endpoint) {
            Some(entry) => entry
                .snapshot
                .load()
                .get(key)
                .cloned()
                .unwrap_or(default),
            None => {
                debug!(endpoint = endpoint, key = key, "Config lookup on unknown endpoint");
                default
            }
        }
    }

    /// Atomically apply a config-change event: replace each changed key and
    /// delete each removed key.
    ///
    /// Readers observe either the old snapshot or the fully-updated one,
    /// never a torn mix for any individual key. Sequential writers to the same
    /// key are last-write-wins. All derived memos for the endpoint are
    /// invalidated since any of them may depend on the changed keys.
    pub fn update(&self, endpoint: &str, changed: HashMap<String, Value>, removed: &[&str]) {
        let Some(entry) = self.endpoints.get(endpoint) else {
            debug!(endpoint = endpoint, "Config update on unknown endpoint ignored");
            return;
        };

        entry.snapshot.rcu(|current| {
            let mut next: HashMap<String, Value> = (**current).clone();
            for (key, value) in &changed {
                next.insert(key.clone(), value.clone());
            }
            for key in removed {
                next.remove(*key);
            }
            next
        });
        let invalidated = entry.derived.len();
        entry.derived.clear();

        info!(
            endpoint = endpoint,
            changed = changed.len(),
            removed = removed.len(),
            memos_invalidated = invalidated,
            "Config cache updated"
        );
    }

    /// Memoize a derived value for the endpoint.
    ///
    /// `compute` runs at most once per key between invalidations, even under
    /// racing first-time callers; the map's entry lock serializes the
    /// insert. Subsequent reads return the cached `Arc` without recomputing.
    /// On an unknown endpoint the value is computed but not stored.
    pub fn derive<F>(&self, endpoint: &str, key: &str, compute: F) -> Arc<Value>
    where
        F: FnOnce() -> Value,
    {
        let Some(entry) = self.endpoints.get(endpoint) else {
            return Arc::new(compute());
        };

        if let Some(cached) = entry.derived.get(key) {
            debug!(endpoint = endpoint, key = key, "Derived config cache hit");
            return Arc::clone(&cached);
        }

        let value = Arc::clone(
            entry
                .derived
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(compute()))
                .value(),
        );
        debug!(endpoint = endpoint, key = key, "Derived config value computed");
        value
    }

    /// Number of memoized derived values for an endpoint. Test/monitoring aid.
    pub fn derived_len(&self, endpoint: &str) -> usize {
        self.endpoints
            .get(endpoint)
            .map(|e| e.derived.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded_cache(endpoint: &str) -> ConfigCache {
        let cache = ConfigCache::new();
        let config = crate::config::load("my_app", endpoint, HashMap::new()).unwrap();
        cache.insert(&config);
        cache
    }

    #[test]
    fn test_missing_key_returns_default() {
        let cache = seeded_cache("Ep");
        assert_eq!(cache.get("Ep", "nope", json!("fallback")), json!("fallback"));
        // unknown endpoint degrades the same way
        assert_eq!(cache.get("Other", "server", json!(7)), json!(7));
    }

    #[test]
    fn test_update_replaces_and_removes() {
        let cache = seeded_cache("Ep");
        cache.update(
            "Ep",
            HashMap::from([("secret_key_base".to_string(), json!("new-secret"))]),
            &[],
        );
        assert_eq!(
            cache.get("Ep", "secret_key_base", Value::Null),
            json!("new-secret")
        );

        cache.update("Ep", HashMap::new(), &["secret_key_base"]);
        assert_eq!(
            cache.get("Ep", "secret_key_base", json!("default")),
            json!("default")
        );
    }

    #[test]
    fn test_derive_memoizes_once() {
        let cache = seeded_cache("Ep");
        let mut calls = 0;
        let first = cache.derive("Ep", "base_url", || {
            calls += 1;
            json!("http://localhost")
        });
        assert_eq!(calls, 1);
        let second = cache.derive("Ep", "base_url", || {
            calls += 1;
            json!("never")
        });
        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_update_invalidates_memos() {
        let cache = seeded_cache("Ep");
        let _ = cache.derive("Ep", "base_url", || json!("http://old"));
        assert_eq!(cache.derived_len("Ep"), 1);

        cache.update("Ep", HashMap::from([("url".to_string(), json!({"host": "new"}))]), &[]);
        assert_eq!(cache.derived_len("Ep"), 0);

        let recomputed = cache.derive("Ep", "base_url", || json!("http://new"));
        assert_eq!(*recomputed, json!("http://new"));
    }

    #[test]
    fn test_concurrent_first_derivation_converges() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let cache = Arc::new(seeded_cache("Ep"));
        let computations = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let computations = Arc::clone(&computations);
                std::thread::spawn(move || {
                    cache.derive("Ep", "expensive", || {
                        computations.fetch_add(1, Ordering::SeqCst);
                        json!("derived")
                    })
                })
            })
            .collect();

        let results: Vec<Arc<Value>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(computations.load(Ordering::SeqCst), 1);
        for r in &results {
            assert!(Arc::ptr_eq(r, &results[0]));
        }
    }

    #[test]
    fn test_readers_never_see_torn_values() {
        let cache = Arc::new(seeded_cache("Ep"));
        cache.update(
            "Ep",
            HashMap::from([("marker".to_string(), json!([0, 0]))]),
            &[],
        );

        let writer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 1..200i64 {
                    cache.update(
                        "Ep",
                        HashMap::from([("marker".to_string(), json!([i, i]))]),
                        &[],
                    );
                }
            })
        };

        // Each read must see a pair written by a single update.
        for _ in 0..500 {
            let v = cache.get("Ep", "marker", Value::Null);
            let pair = v.as_array().unwrap();
            assert_eq!(pair[0], pair[1], "torn read: {v}");
        }
        writer.join().unwrap();
        assert_eq!(cache.get("Ep", "marker", Value::Null), json!([199, 199]));
    }
}
