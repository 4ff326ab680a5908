//! Subscriptions: selector-scoped change observers.
//!
//! The Store keeps one [`Entry`] per live subscription. The caller keeps
//! the [`Subscription`] handle; dropping it cancels the registration.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use parking_lot::Mutex;

/// Identifier of a subscription, unique within one Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Type-erased selector + callback pair.
pub(crate) trait Observer<S>: Send {
    /// Re-run the selector; call back if the selected value changed.
    fn observe(&mut self, state: &S) -> anyhow::Result<()>;
}

pub(crate) struct Selected<S, T, F, C> {
    selector: F,
    callback: C,
    last: T,
    _state: PhantomData<fn(&S)>,
}

impl<S, T, F, C> Selected<S, T, F, C> {
    pub(crate) fn new(selector: F, callback: C, initial: T) -> Self {
        Self {
            selector,
            callback,
            last: initial,
            _state: PhantomData,
        }
    }
}

impl<S, T, F, C> Observer<S> for Selected<S, T, F, C>
where
    T: PartialEq + Send,
    F: Fn(&S) -> T + Send,
    C: FnMut(&T, &T) -> anyhow::Result<()> + Send,
{
    fn observe(&mut self, state: &S) -> anyhow::Result<()> {
        let next = (self.selector)(state);
        if next == self.last {
            return Ok(());
        }
        // The new value is recorded even if the callback fails, so a
        // failing subscriber is not re-notified for the same change.
        let previous = std::mem::replace(&mut self.last, next);
        (self.callback)(&self.last, &previous)
    }
}

pub(crate) struct Entry<S> {
    id: SubscriptionId,
    active: AtomicBool,
    observer: Mutex<Box<dyn Observer<S>>>,
}

impl<S> Entry<S> {
    pub(crate) fn new(id: SubscriptionId, observer: Box<dyn Observer<S>>) -> Self {
        Self {
            id,
            active: AtomicBool::new(true),
            observer: Mutex::new(observer),
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub(crate) fn observe(&self, state: &S) -> anyhow::Result<()> {
        self.observer.lock().observe(state)
    }
}

/// Removes subscriptions from a Store without knowing its state type.
pub(crate) trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Handle for one registration.
///
/// Dropping the handle unsubscribes. [`Subscription::unsubscribe`] may be
/// called any number of times; only the first call has an effect. A
/// subscriber that unsubscribes itself while being notified receives no
/// further notifications, in the current round or later ones.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    store: Option<Weak<dyn Unsubscribe>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, store: Weak<dyn Unsubscribe>) -> Self {
        Self {
            id,
            store: Some(store),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(&self) {
        if let Some(store) = self.store.as_ref().and_then(Weak::upgrade) {
            store.unsubscribe(self.id);
        }
    }

    /// Keep the subscription registered for the rest of the Store's life.
    pub fn forget(mut self) {
        self.store = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.store.is_some())
            .finish()
    }
}
