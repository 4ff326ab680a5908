//! Reducers and the registry that routes actions to them.
//!
//! # Architecture
//!
//! ```text
//! Action ──→ Registry ──→ root reducer (by kind)
//!                   └──→ slice reducers (each over its own slice)
//! ```
//!
//! Reducers are pure: `(State, Action) -> State`. They receive the current
//! snapshot behind an `Arc` and return either that same `Arc` (no change)
//! or a freshly built one. The Store compares the two by identity.

mod slice;

use std::collections::HashMap;
use std::sync::Arc;

use crate::store::{Action, ReducerError, StoreError};

pub use slice::Slice;
use slice::SliceReducer;

/// A pure transition function over `S`.
///
/// Returning the input `Arc` untouched signals "no change". Implemented
/// for any `Fn(&Arc<S>, &Action) -> Result<Arc<S>, ReducerError>`.
pub trait Reducer<S>: Send + Sync + 'static {
    fn reduce(&self, state: &Arc<S>, action: &Action) -> Result<Arc<S>, ReducerError>;
}

impl<S, F> Reducer<S> for F
where
    F: Fn(&Arc<S>, &Action) -> Result<Arc<S>, ReducerError> + Send + Sync + 'static,
{
    fn reduce(&self, state: &Arc<S>, action: &Action) -> Result<Arc<S>, ReducerError> {
        self(state, action)
    }
}

/// Maps action kinds to reducers.
///
/// Built completely before the Store exists; registration errors are
/// returned here so a misconfigured Store can never be constructed.
pub struct ReducerRegistry<S> {
    root: HashMap<String, Box<dyn Reducer<S>>>,
    slices: Vec<Box<dyn SliceReducer<S>>>,
}

impl<S> Default for ReducerRegistry<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ReducerRegistry<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            root: HashMap::new(),
            slices: Vec::new(),
        }
    }

    /// Register a reducer over the whole state for one action kind.
    ///
    /// A kind is owned either by one root reducer or by slices, never both.
    /// Several slices may handle the same kind.
    ///
    /// # Errors
    /// `DuplicateKind` if `kind` already has a root reducer or is handled by
    /// a slice, `EmptyKind` for an empty kind.
    pub fn register<R: Reducer<S>>(
        &mut self,
        kind: impl Into<String>,
        reducer: R,
    ) -> Result<&mut Self, StoreError> {
        let kind = kind.into();
        if kind.is_empty() {
            return Err(StoreError::EmptyKind);
        }
        if self.root.contains_key(&kind) {
            return Err(StoreError::DuplicateKind {
                kind,
                owner: "root".to_string(),
            });
        }
        if let Some(slice) = self.slices.iter().find(|s| s.handles(&kind)) {
            return Err(StoreError::DuplicateKind {
                owner: format!("slice '{}'", slice.name()),
                kind,
            });
        }
        tracing::debug!(kind = %kind, "registered root reducer");
        self.root.insert(kind, Box::new(reducer));
        Ok(self)
    }

    /// Add a slice reducer.
    ///
    /// # Errors
    /// `SliceConflict` if any state key claimed by `slice` is already owned
    /// by a previously added slice. `DuplicateKind` if the slice handles a
    /// kind that has a root reducer.
    pub fn add_slice<T>(&mut self, slice: Slice<S, T>) -> Result<&mut Self, StoreError>
    where
        T: Send + Sync + 'static,
    {
        if let Some(kind) = slice.kinds().into_iter().find(|k| self.root.contains_key(k)) {
            return Err(StoreError::DuplicateKind {
                kind,
                owner: "root".to_string(),
            });
        }
        for existing in &self.slices {
            if let Some(key) = slice
                .keys()
                .iter()
                .find(|key| existing.keys().contains(*key))
            {
                return Err(StoreError::SliceConflict {
                    slice: slice.name().to_string(),
                    key: key.clone(),
                    owner: existing.name().to_string(),
                });
            }
        }
        tracing::debug!(slice = slice.name(), keys = ?slice.keys(), "registered slice");
        self.slices.push(Box::new(slice));
        Ok(self)
    }

    /// Whether any root or slice reducer handles `kind`.
    pub fn handles(&self, kind: &str) -> bool {
        self.root.contains_key(kind) || self.slices.iter().any(|s| s.handles(kind))
    }

    /// All handled kinds, sorted and deduplicated.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self
            .root
            .keys()
            .cloned()
            .chain(self.slices.iter().flat_map(|s| s.kinds()))
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// Apply every reducer that handles `action.kind()`.
    ///
    /// Either the root reducer for the kind runs, or each slice that
    /// handles it in registration order against the intermediate state.
    /// Unhandled kinds return `state` itself.
    pub fn reduce(&self, state: &Arc<S>, action: &Action) -> Result<Arc<S>, ReducerError> {
        let mut next = match self.root.get(action.kind()) {
            Some(reducer) => reducer.reduce(state, action)?,
            None => Arc::clone(state),
        };
        for slice in self.slices.iter().filter(|s| s.handles(action.kind())) {
            next = slice.apply(&next, action)?;
        }
        Ok(next)
    }
}
