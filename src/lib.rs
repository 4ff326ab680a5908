//! An observable reactive store.
//!
//! A [`Store`] owns the application state and changes it only through
//! registered reducers. Subscribers observe selected parts of the state,
//! [views](view) memoize derived values, and a
//! [`PersistenceMirror`](persistence::PersistenceMirror) writes selected
//! slices to a key-value store after a quiet period.

pub mod config;
pub mod domains;
pub mod logging;
pub mod persistence;
pub mod reducer;
pub mod store;
pub mod view;

pub use reducer::{Reducer, ReducerRegistry, Slice};
pub use store::{Action, Dispatched, Store, StoreBuilder, StoreError, Subscription};
