//! Slice reducers: reducers scoped to one disjoint part of the state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::store::{Action, ReducerError, StoreError};

use super::Reducer;

/// A reducer set over the `T` part of `S`, reached through a lens.
///
/// The slice owns a set of state keys (its name by default). Two slices
/// in one registry may never own the same key.
pub struct Slice<S, T> {
    name: String,
    keys: Vec<String>,
    get: fn(&S) -> &Arc<T>,
    set: fn(&mut S, Arc<T>),
    handlers: HashMap<String, Box<dyn Reducer<T>>>,
}

impl<S, T> Slice<S, T>
where
    T: Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, get: fn(&S) -> &Arc<T>, set: fn(&mut S, Arc<T>)) -> Self {
        let name = name.into();
        Self {
            keys: vec![name.clone()],
            name,
            get,
            set,
            handlers: HashMap::new(),
        }
    }

    /// Replace the state keys this slice claims.
    pub fn owning<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Handle `kind` with `reducer`, which sees only this slice.
    ///
    /// # Errors
    /// `DuplicateKind` if the slice already handles `kind`.
    pub fn on<R: Reducer<T>>(mut self, kind: impl Into<String>, reducer: R) -> Result<Self, StoreError> {
        let kind = kind.into();
        if kind.is_empty() {
            return Err(StoreError::EmptyKind);
        }
        if self.handlers.contains_key(&kind) {
            return Err(StoreError::DuplicateKind {
                kind,
                owner: format!("slice '{}'", self.name),
            });
        }
        self.handlers.insert(kind, Box::new(reducer));
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

/// Object-safe view of a [`Slice`] with its slice type erased.
pub(super) trait SliceReducer<S>: Send + Sync {
    fn name(&self) -> &str;
    fn keys(&self) -> &[String];
    fn handles(&self, kind: &str) -> bool;
    fn kinds(&self) -> Vec<String>;
    fn apply(&self, state: &Arc<S>, action: &Action) -> Result<Arc<S>, ReducerError>;
}

impl<S, T> SliceReducer<S> for Slice<S, T>
where
    S: Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn keys(&self) -> &[String] {
        &self.keys
    }

    fn handles(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    fn kinds(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    fn apply(&self, state: &Arc<S>, action: &Action) -> Result<Arc<S>, ReducerError> {
        let Some(handler) = self.handlers.get(action.kind()) else {
            return Ok(Arc::clone(state));
        };
        let current = (self.get)(&**state);
        let next = handler.reduce(current, action)?;
        if Arc::ptr_eq(current, &next) {
            return Ok(Arc::clone(state));
        }
        let mut rebuilt = S::clone(&**state);
        (self.set)(&mut rebuilt, next);
        Ok(Arc::new(rebuilt))
    }
}
