//! The Store: owner of state, dispatcher of actions, notifier of observers.
//!
//! # Flow
//!
//! ```text
//! dispatch ──→ queue ──→ registry.reduce ──→ adopt (version += 1)
//!                ↑                                  │
//!                └──── re-entrant dispatch ←── notify subscribers
//! ```
//!
//! Dispatch is synchronous. A dispatch issued while another one is being
//! drained (from a subscriber callback, or from another thread) is queued
//! and processed after the current notification round, in FIFO order.
//! Reducer failures leave the state untouched. Subscriber failures are
//! isolated and reported once the round is complete.

mod action;
mod error;
mod subscription;

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::persistence::{self, KeyValueStore};
use crate::reducer::ReducerRegistry;
use crate::view::{ViewCache, ViewStats};

pub use action::Action;
pub use error::{ReducerError, StoreError, SubscriberFailure};
pub use subscription::{Subscription, SubscriptionId};

use subscription::{Entry, Selected, Unsubscribe};

/// Outcome of a successful [`Store::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// The action and everything queued behind it were processed.
    /// `version` is the state version after the drain; `changed` tells
    /// whether any transition was adopted during it.
    Applied { version: u64, changed: bool },
    /// Another dispatch is draining; the action will be processed by it.
    Queued,
}

/// Counters describing what the Store has done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub dispatched: u64,
    pub applied: u64,
    pub queued: u64,
    /// Actions whose kind had no reducer, by kind.
    pub unhandled: BTreeMap<String, u64>,
    pub reducer_failures: u64,
    pub subscriber_failures: u64,
}

struct Snapshot<S> {
    state: Arc<S>,
    version: u64,
}

struct Shared<S> {
    registry: ReducerRegistry<S>,
    current: RwLock<Snapshot<S>>,
    subscriptions: Mutex<Vec<Arc<Entry<S>>>>,
    next_subscription: AtomicU64,
    queue: Mutex<VecDeque<Action>>,
    draining: AtomicBool,
    views: ViewCache,
    diagnostics: Mutex<Diagnostics>,
}

impl<S> Unsubscribe for Shared<S>
where
    S: Send + Sync + 'static,
{
    fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscriptions = self.subscriptions.lock();
        if let Some(pos) = subscriptions.iter().position(|e| e.id() == id) {
            let entry = subscriptions.remove(pos);
            entry.deactivate();
            tracing::trace!(subscription = %id, "unsubscribed");
        }
    }
}

/// Handle to a reactive store over state `S`.
///
/// Cloning the handle is cheap; all clones share the same state. There is
/// no global instance: create one and pass it to whoever needs it.
pub struct Store<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> Store<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(registry: ReducerRegistry<S>, initial: S) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                current: RwLock::new(Snapshot {
                    state: Arc::new(initial),
                    version: 0,
                }),
                subscriptions: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                views: ViewCache::new(),
                diagnostics: Mutex::new(Diagnostics::default()),
            }),
        }
    }

    /// Start building a Store whose initial state is seeded from storage.
    pub fn builder(registry: ReducerRegistry<S>, initial: S) -> StoreBuilder<S> {
        StoreBuilder { registry, initial }
    }

    /// Current state snapshot. Never blocks on a dispatch in progress
    /// beyond the instant the new snapshot is swapped in.
    pub fn state(&self) -> Arc<S> {
        Arc::clone(&self.shared.current.read().state)
    }

    /// Monotonic counter, bumped once per adopted transition.
    pub fn version(&self) -> u64 {
        self.shared.current.read().version
    }

    pub fn handles(&self, kind: &str) -> bool {
        self.shared.registry.handles(kind)
    }

    /// Apply `action`, then anything queued behind it.
    ///
    /// # Errors
    /// - `EmptyKind` if the action has no kind (nothing is queued).
    /// - `ReducerFailure` if a reducer rejected an action; that action's
    ///   transition is discarded.
    /// - `SubscriberFailure` if callbacks failed; the transition stands.
    /// - `Aggregate` when several of the above happened in one drain.
    pub fn dispatch(&self, action: Action) -> Result<Dispatched, StoreError> {
        if action.kind().is_empty() {
            return Err(StoreError::EmptyKind);
        }
        self.shared.diagnostics.lock().dispatched += 1;
        self.shared.queue.lock().push_back(action);

        if self.shared.draining.swap(true, Ordering::AcqRel) {
            self.shared.diagnostics.lock().queued += 1;
            tracing::trace!("dispatch queued behind active drain");
            return Ok(Dispatched::Queued);
        }

        let started_at = self.version();
        let mut errors = Vec::new();
        loop {
            {
                let _reset = scopeguard::guard(&self.shared.draining, |flag| {
                    flag.store(false, Ordering::Release)
                });
                self.drain(&mut errors);
            }
            // An action pushed between the last pop and the reset would
            // otherwise wait for the next dispatch.
            let pending = !self.shared.queue.lock().is_empty();
            if !pending || self.shared.draining.swap(true, Ordering::AcqRel) {
                break;
            }
        }

        match StoreError::collect(errors) {
            Some(err) => Err(err),
            None => {
                let version = self.version();
                Ok(Dispatched::Applied {
                    version,
                    changed: version != started_at,
                })
            }
        }
    }

    fn drain(&self, errors: &mut Vec<StoreError>) {
        loop {
            let next = self.shared.queue.lock().pop_front();
            let Some(action) = next else {
                break;
            };
            if let Err(err) = self.apply(&action) {
                errors.push(err);
            }
        }
    }

    fn apply(&self, action: &Action) -> Result<(), StoreError> {
        let kind = action.kind();
        if !self.shared.registry.handles(kind) {
            tracing::debug!(kind, "no reducer registered; state unchanged");
            *self
                .shared
                .diagnostics
                .lock()
                .unhandled
                .entry(kind.to_string())
                .or_default() += 1;
            return Ok(());
        }

        let current = self.state();
        let next = match self.shared.registry.reduce(&current, action) {
            Ok(next) => next,
            Err(source) => {
                tracing::warn!(kind, error = %source, "reducer failed; state unchanged");
                self.shared.diagnostics.lock().reducer_failures += 1;
                return Err(StoreError::ReducerFailure {
                    kind: kind.to_string(),
                    source,
                });
            }
        };
        if Arc::ptr_eq(&current, &next) {
            return Ok(());
        }

        let version = {
            let mut snapshot = self.shared.current.write();
            snapshot.state = Arc::clone(&next);
            snapshot.version += 1;
            snapshot.version
        };
        self.shared.diagnostics.lock().applied += 1;
        tracing::trace!(kind, version, "state adopted");

        self.notify(kind, &next)
    }

    fn notify(&self, kind: &str, state: &S) -> Result<(), StoreError> {
        // Snapshot so callbacks may subscribe or unsubscribe freely.
        let entries: Vec<Arc<Entry<S>>> = self.shared.subscriptions.lock().clone();
        let mut failures = Vec::new();
        for entry in entries {
            if !entry.is_active() {
                continue;
            }
            if let Err(error) = entry.observe(state) {
                tracing::warn!(subscription = %entry.id(), kind, error = %error, "subscriber failed");
                failures.push(SubscriberFailure {
                    subscription: entry.id(),
                    error,
                });
            }
        }
        if failures.is_empty() {
            return Ok(());
        }
        self.shared.diagnostics.lock().subscriber_failures += failures.len() as u64;
        Err(StoreError::SubscriberFailure {
            kind: kind.to_string(),
            failures,
        })
    }

    /// Observe `selector(state)`.
    ///
    /// `callback(new, previous)` runs after every adopted transition in
    /// which the selected value changed by `PartialEq`; never when it
    /// stayed equal. Subscribers are notified in registration order.
    pub fn subscribe<T, F, C>(&self, selector: F, callback: C) -> Subscription
    where
        T: PartialEq + Send + 'static,
        F: Fn(&S) -> T + Send + 'static,
        C: FnMut(&T, &T) -> anyhow::Result<()> + Send + 'static,
    {
        let initial = selector(&*self.state());
        let id = SubscriptionId(self.shared.next_subscription.fetch_add(1, Ordering::Relaxed));
        let entry = Entry::new(id, Box::new(Selected::new(selector, callback, initial)));
        self.shared.subscriptions.lock().push(Arc::new(entry));
        tracing::trace!(subscription = %id, "subscribed");

        let weak: Weak<Shared<S>> = Arc::downgrade(&self.shared);
        Subscription::new(id, weak)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscriptions.lock().len()
    }

    /// Memoized projection of the current state. See [`ViewCache::view`].
    pub fn view<D, V, F, C>(&self, name: &str, deps: F, compute: C) -> Arc<V>
    where
        F: FnOnce(&S) -> D,
        D: PartialEq + Send + 'static,
        V: Send + Sync + 'static,
        C: FnOnce(&D) -> V,
    {
        self.shared.views.view(name, &*self.state(), deps, compute)
    }

    /// Fallible memoized projection. See [`ViewCache::try_view`].
    pub fn try_view<D, V, E, F, C>(&self, name: &str, deps: F, compute: C) -> Result<Arc<V>, E>
    where
        F: FnOnce(&S) -> D,
        D: PartialEq + Send + 'static,
        V: Send + Sync + 'static,
        C: FnOnce(&D) -> Result<V, E>,
    {
        self.shared.views.try_view(name, &*self.state(), deps, compute)
    }

    pub fn view_stats(&self) -> ViewStats {
        self.shared.views.stats()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.shared.diagnostics.lock().clone()
    }
}

/// Seeds the initial state from persisted records before the Store exists.
pub struct StoreBuilder<S> {
    registry: ReducerRegistry<S>,
    initial: S,
}

impl<S> StoreBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Read `key` from `storage` and fold it into the initial state.
    ///
    /// Missing, unreadable or undecodable records fall back to `fallback`
    /// with a warning; hydration never fails the build.
    pub fn hydrate<T, A>(mut self, storage: &dyn KeyValueStore, key: &str, fallback: T, apply: A) -> Self
    where
        T: DeserializeOwned,
        A: FnOnce(&mut S, T),
    {
        let value = persistence::hydrate(storage, key, fallback);
        apply(&mut self.initial, value);
        self
    }

    pub fn build(self) -> Store<S> {
        Store::new(self.registry, self.initial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Counter {
        count: i64,
        label: String,
    }

    fn add(state: &Arc<Counter>, action: &Action) -> Result<Arc<Counter>, ReducerError> {
        let by: i64 = action.payload_as()?;
        if by == 0 {
            return Ok(Arc::clone(state));
        }
        Ok(Arc::new(Counter {
            count: state.count + by,
            ..Counter::clone(state)
        }))
    }

    fn rename(state: &Arc<Counter>, action: &Action) -> Result<Arc<Counter>, ReducerError> {
        let label: String = action.payload_as()?;
        Ok(Arc::new(Counter {
            label,
            ..Counter::clone(state)
        }))
    }

    fn counter_store() -> Store<Counter> {
        let mut registry = ReducerRegistry::new();
        registry.register("ADD", add).unwrap();
        registry.register("RENAME", rename).unwrap();
        Store::new(registry, Counter::default())
    }

    fn add_action(by: i64) -> Action {
        Action::with_payload("ADD", json!(by))
    }

    #[test]
    fn dispatch_bumps_version_on_change_only() {
        let store = counter_store();
        assert_eq!(store.version(), 0);

        let outcome = store.dispatch(add_action(2)).unwrap();
        assert_eq!(
            outcome,
            Dispatched::Applied {
                version: 1,
                changed: true
            }
        );
        assert_eq!(store.state().count, 2);

        // Identity-preserving transition: no version bump.
        let outcome = store.dispatch(add_action(0)).unwrap();
        assert_eq!(
            outcome,
            Dispatched::Applied {
                version: 1,
                changed: false
            }
        );
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn unknown_kind_is_recorded_not_failed() {
        let store = counter_store();
        let before = store.state();
        store.dispatch(Action::new("MYSTERY")).unwrap();
        assert!(Arc::ptr_eq(&before, &store.state()));
        assert_eq!(store.diagnostics().unhandled.get("MYSTERY"), Some(&1));
    }

    #[test]
    fn empty_kind_is_rejected() {
        let store = counter_store();
        assert!(matches!(store.dispatch(Action::new("")), Err(StoreError::EmptyKind)));
        assert_eq!(store.diagnostics().dispatched, 0);
    }

    #[test]
    fn reducer_failure_keeps_state() {
        let store = counter_store();
        store.dispatch(add_action(3)).unwrap();
        let before = store.state();

        let err = store
            .dispatch(Action::with_payload("ADD", json!("three")))
            .unwrap_err();
        assert!(matches!(err, StoreError::ReducerFailure { ref kind, .. } if kind == "ADD"));
        assert!(Arc::ptr_eq(&before, &store.state()));
        assert_eq!(store.version(), 1);
        assert_eq!(store.diagnostics().reducer_failures, 1);
    }

    #[test]
    fn subscriber_sees_new_and_previous() {
        let store = counter_store();
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(
            |s: &Counter| s.count,
            move |new, prev| {
                sink.lock().push((*new, *prev));
                Ok(())
            },
        );

        store.dispatch(add_action(1)).unwrap();
        store.dispatch(add_action(4)).unwrap();
        assert_eq!(*seen.lock(), vec![(1, 0), (5, 1)]);
    }

    #[test]
    fn unrelated_changes_do_not_notify() {
        let store = counter_store();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let _sub = store.subscribe(
            |s: &Counter| s.label.clone(),
            move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );

        store.dispatch(add_action(1)).unwrap();
        store.dispatch(add_action(1)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        store
            .dispatch(Action::with_payload("RENAME", json!("cart")))
            .unwrap();
        // Same label again: adopted (new Arc) but selector output is equal.
        store
            .dispatch(Action::with_payload("RENAME", json!("cart")))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_handle_unsubscribes() {
        let store = counter_store();
        let sub = store.subscribe(|s: &Counter| s.count, |_, _| Ok(()));
        assert_eq!(store.subscriber_count(), 1);
        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);

        {
            let _scoped = store.subscribe(|s: &Counter| s.count, |_, _| Ok(()));
            assert_eq!(store.subscriber_count(), 1);
        }
        assert_eq!(store.subscriber_count(), 0);

        store
            .subscribe(|s: &Counter| s.count, |_, _| Ok(()))
            .forget();
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn reentrant_dispatch_is_queued_until_round_ends() {
        let store = counter_store();
        let order = Arc::new(PlMutex::new(Vec::new()));

        let inner = store.clone();
        let log = Arc::clone(&order);
        let _first = store.subscribe(
            |s: &Counter| s.count,
            move |new, _| {
                log.lock().push(format!("first:{}", new));
                if *new == 1 {
                    let outcome = inner.dispatch(add_action(10)).unwrap();
                    assert_eq!(outcome, Dispatched::Queued);
                    // The queued action has not been applied yet.
                    assert_eq!(inner.state().count, 1);
                }
                Ok(())
            },
        );
        let log = Arc::clone(&order);
        let _second = store.subscribe(
            |s: &Counter| s.count,
            move |new, _| {
                log.lock().push(format!("second:{}", new));
                Ok(())
            },
        );

        let outcome = store.dispatch(add_action(1)).unwrap();
        assert_eq!(
            outcome,
            Dispatched::Applied {
                version: 2,
                changed: true
            }
        );
        assert_eq!(store.state().count, 11);
        assert_eq!(
            *order.lock(),
            vec!["first:1", "second:1", "first:11", "second:11"]
        );
    }

    #[test]
    fn subscriber_failures_are_isolated_and_aggregated() {
        let store = counter_store();
        let reached = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&reached);

        let _bad = store.subscribe(|s: &Counter| s.count, |_, _| anyhow::bail!("render failed"));
        let _good = store.subscribe(
            |s: &Counter| s.count,
            move |_, _| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            },
        );

        let err = store.dispatch(add_action(1)).unwrap_err();
        match err {
            StoreError::SubscriberFailure { kind, failures } => {
                assert_eq!(kind, "ADD");
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].error.to_string(), "render failed");
            }
            other => panic!("expected SubscriberFailure, got {:?}", other),
        }
        assert!(reached.load(Ordering::SeqCst));
        // The transition itself stands.
        assert_eq!(store.state().count, 1);
    }

    #[test]
    fn self_unsubscribe_during_round_stops_delivery() {
        let store = counter_store();
        let calls = Arc::new(AtomicU64::new(0));
        let handle: Arc<PlMutex<Option<Subscription>>> = Arc::new(PlMutex::new(None));

        let counter = Arc::clone(&calls);
        let own = Arc::clone(&handle);
        let sub = store.subscribe(
            |s: &Counter| s.count,
            move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = own.lock().as_ref() {
                    sub.unsubscribe();
                }
                Ok(())
            },
        );
        *handle.lock() = Some(sub);

        store.dispatch(add_action(1)).unwrap();
        store.dispatch(add_action(1)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn store_view_is_memoized_across_unrelated_dispatches() {
        let store = counter_store();
        let computed = AtomicU64::new(0);
        let read = |store: &Store<Counter>| {
            store.view(
                "label_len",
                |s: &Counter| s.label.clone(),
                |label| {
                    computed.fetch_add(1, Ordering::SeqCst);
                    label.len()
                },
            )
        };

        let first = read(&store);
        store.dispatch(add_action(5)).unwrap();
        let second = read(&store);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(computed.load(Ordering::SeqCst), 1);

        store
            .dispatch(Action::with_payload("RENAME", json!("tasks")))
            .unwrap();
        assert_eq!(*read(&store), 5);
        assert_eq!(computed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn replay_is_deterministic() {
        let actions = vec![
            add_action(3),
            Action::with_payload("RENAME", json!("a")),
            Action::new("UNKNOWN"),
            add_action(-1),
        ];
        let run = || {
            let store = counter_store();
            for action in actions.clone() {
                store.dispatch(action).unwrap();
            }
            (*store.state()).clone()
        };
        assert_eq!(run(), run());
        assert_eq!(
            run(),
            Counter {
                count: 2,
                label: "a".to_string()
            }
        );
    }
}
