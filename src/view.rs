//! Memoized projections of state.
//!
//! A view is identified by name. Each read evaluates the view's
//! dependency selector; if the result equals the dependencies recorded
//! for the cached value, the cached `Arc` is returned as-is. Otherwise
//! the whole entry is recomputed and replaced. There is no partial
//! invalidation.

use std::any::Any;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

struct CachedView {
    deps: Box<dyn Any + Send>,
    value: Arc<dyn Any + Send + Sync>,
}

/// Hit/miss counters for a [`ViewCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ViewStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Default)]
pub struct ViewCache {
    entries: Mutex<HashMap<String, CachedView>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read view `name` of `state`, recomputing only when `deps(state)`
    /// differs from the dependencies of the cached value.
    pub fn view<S, D, V, F, C>(&self, name: &str, state: &S, deps: F, compute: C) -> Arc<V>
    where
        S: ?Sized,
        F: FnOnce(&S) -> D,
        D: PartialEq + Send + 'static,
        V: Send + Sync + 'static,
        C: FnOnce(&D) -> V,
    {
        match self.try_view(name, state, deps, |d| Ok::<V, Infallible>(compute(d))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of [`ViewCache::view`].
    ///
    /// When `compute` fails the error is returned and the previous entry,
    /// if any, stays in place untouched.
    pub fn try_view<S, D, V, E, F, C>(
        &self,
        name: &str,
        state: &S,
        deps: F,
        compute: C,
    ) -> Result<Arc<V>, E>
    where
        S: ?Sized,
        F: FnOnce(&S) -> D,
        D: PartialEq + Send + 'static,
        V: Send + Sync + 'static,
        C: FnOnce(&D) -> Result<V, E>,
    {
        let deps = deps(state);
        if let Some(hit) = self.lookup::<D, V>(name, &deps) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // Computed without the lock held so views may read other views.
        let value = Arc::new(compute(&deps)?);
        tracing::trace!(view = name, "recomputed view");
        self.entries.lock().insert(
            name.to_string(),
            CachedView {
                deps: Box::new(deps),
                value: value.clone(),
            },
        );
        Ok(value)
    }

    fn lookup<D, V>(&self, name: &str, deps: &D) -> Option<Arc<V>>
    where
        D: PartialEq + 'static,
        V: Send + Sync + 'static,
    {
        let entries = self.entries.lock();
        let entry = entries.get(name)?;
        let Some(cached) = entry.deps.downcast_ref::<D>() else {
            tracing::debug!(view = name, "view reused with different dependency type; replacing");
            return None;
        };
        if cached != deps {
            return None;
        }
        Arc::clone(&entry.value).downcast::<V>().ok()
    }

    /// Drop one entry. Returns whether it existed.
    pub fn evict(&self, name: &str) -> bool {
        self.entries.lock().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> ViewStats {
        ViewStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, Clone, PartialEq)]
    struct Tasks {
        items: Vec<(u32, bool)>,
        filter: &'static str,
    }

    fn tasks() -> Tasks {
        Tasks {
            items: vec![(1, false), (2, true), (3, false)],
            filter: "active",
        }
    }

    fn visible(deps: &(Vec<(u32, bool)>, &'static str)) -> Vec<u32> {
        let (items, filter) = deps;
        items
            .iter()
            .filter(|(_, done)| match *filter {
                "active" => !done,
                "completed" => *done,
                _ => true,
            })
            .map(|(id, _)| *id)
            .collect()
    }

    #[test]
    fn second_read_is_a_cache_hit() {
        let cache = ViewCache::new();
        let state = tasks();
        let calls = Cell::new(0);

        let first = cache.view(
            "visible",
            &state,
            |s: &Tasks| (s.items.clone(), s.filter),
            |d| {
                calls.set(calls.get() + 1);
                visible(d)
            },
        );
        let second = cache.view(
            "visible",
            &state,
            |s: &Tasks| (s.items.clone(), s.filter),
            |d| {
                calls.set(calls.get() + 1);
                visible(d)
            },
        );

        assert_eq!(*first, vec![1, 3]);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.get(), 1);
        assert_eq!(
            cache.stats(),
            ViewStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn changed_dependency_recomputes() {
        let cache = ViewCache::new();
        let mut state = tasks();
        let first = cache.view("visible", &state, |s: &Tasks| (s.items.clone(), s.filter), visible);

        state.filter = "completed";
        let second = cache.view("visible", &state, |s: &Tasks| (s.items.clone(), s.filter), visible);

        assert_eq!(*second, vec![2]);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn equal_but_distinct_dependencies_hit() {
        let cache = ViewCache::new();
        let a = tasks();
        let b = tasks();
        let first = cache.view("visible", &a, |s: &Tasks| (s.items.clone(), s.filter), visible);
        let second = cache.view("visible", &b, |s: &Tasks| (s.items.clone(), s.filter), visible);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failed_compute_keeps_previous_value() {
        let cache = ViewCache::new();
        let mut state = tasks();
        let good: Result<Arc<usize>, String> =
            cache.try_view("count", &state, |s: &Tasks| s.items.len(), |n| Ok(*n));
        let good = good.unwrap();

        state.items.push((4, false));
        let failed: Result<Arc<usize>, String> = cache.try_view(
            "count",
            &state,
            |s: &Tasks| s.items.len(),
            |_| Err("boom".to_string()),
        );
        assert_eq!(failed.unwrap_err(), "boom");

        // Back to the old dependencies: the old entry is still served.
        state.items.pop();
        let again: Result<Arc<usize>, String> =
            cache.try_view("count", &state, |s: &Tasks| s.items.len(), |_| Err("unused".to_string()));
        assert!(Arc::ptr_eq(&good, &again.unwrap()));
    }

    #[test]
    fn type_change_replaces_entry() {
        let cache = ViewCache::new();
        let state = tasks();
        let count = cache.view("v", &state, |s: &Tasks| s.items.len(), |n| *n);
        assert_eq!(*count, 3);
        let label = cache.view("v", &state, |s: &Tasks| s.filter, |f| f.to_uppercase());
        assert_eq!(label.as_str(), "ACTIVE");
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn evict_forces_recompute() {
        let cache = ViewCache::new();
        let state = tasks();
        let first = cache.view("n", &state, |s: &Tasks| s.items.len(), |n| *n);
        assert!(cache.evict("n"));
        assert!(!cache.evict("n"));
        let second = cache.view("n", &state, |s: &Tasks| s.items.len(), |n| *n);
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
