//! Debounced mirroring of state slices into a [`KeyValueStore`].
//!
//! Each attached key gets a Store subscription and a writer task. The
//! subscription serializes the selected value whenever it changes and
//! hands it to the task; the task waits until no new value has arrived
//! for the debounce window and then writes the latest one (trailing
//! debounce). There is at most one pending write per key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::store::{Store, Subscription};

use super::{KeyValueStore, PersistenceError};

/// Default quiet period before a write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorOptions {
    pub debounce: Duration,
}

impl MirrorOptions {
    pub fn debounce_ms(ms: u64) -> Self {
        Self {
            debounce: Duration::from_millis(ms),
        }
    }
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Counters for one mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MirrorStats {
    pub writes: u64,
    pub write_failures: u64,
    /// Values that could not be serialized and were never queued.
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    writes: AtomicU64,
    write_failures: AtomicU64,
    dropped: AtomicU64,
}

enum Command {
    Write(String),
    Flush(oneshot::Sender<()>),
}

struct Attachment {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
    // Dropped with the attachment, which stops feeding the writer.
    _subscription: Subscription,
}

/// Mirrors selected parts of a Store's state into external storage.
pub struct PersistenceMirror<S> {
    store: Store<S>,
    storage: Arc<dyn KeyValueStore>,
    runtime: Handle,
    attachments: Mutex<HashMap<String, Attachment>>,
    counters: Arc<Counters>,
}

impl<S> PersistenceMirror<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// # Errors
    /// `NoRuntime` when called outside a Tokio runtime; writer tasks are
    /// spawned on the current one.
    pub fn new(store: Store<S>, storage: Arc<dyn KeyValueStore>) -> Result<Self, PersistenceError> {
        let runtime = Handle::try_current()?;
        Ok(Self {
            store,
            storage,
            runtime,
            attachments: Mutex::new(HashMap::new()),
            counters: Arc::new(Counters::default()),
        })
    }

    /// Write `selector(state)` to `key` after every change, debounced.
    ///
    /// Re-attaching an already attached key replaces the old attachment
    /// and discards its pending write.
    pub fn attach<T, F>(&self, key: &str, selector: F, options: MirrorOptions)
    where
        T: Serialize + PartialEq + Send + 'static,
        F: Fn(&S) -> T + Send + 'static,
    {
        self.detach(key);

        let (tx, rx) = mpsc::unbounded_channel();
        let task = self.runtime.spawn(write_loop(
            key.to_string(),
            rx,
            Arc::clone(&self.storage),
            options.debounce,
            Arc::clone(&self.counters),
        ));

        let sender = tx.clone();
        let counters = Arc::clone(&self.counters);
        let record_key = key.to_string();
        let subscription = self.store.subscribe(selector, move |value: &T, _previous: &T| {
            match serde_json::to_string(value) {
                Ok(json) => {
                    if sender.send(Command::Write(json)).is_err() {
                        tracing::debug!(key = %record_key, "writer stopped; change not mirrored");
                    }
                }
                Err(e) => {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(key = %record_key, error = %e, "failed to encode state; write dropped");
                }
            }
            // Persistence never fails a dispatch.
            Ok(())
        });

        tracing::debug!(key, debounce_ms = options.debounce.as_millis() as u64, "mirror attached");
        self.attachments.lock().insert(
            key.to_string(),
            Attachment {
                tx,
                task,
                _subscription: subscription,
            },
        );
    }

    /// Stop mirroring `key`, cancelling any pending write.
    ///
    /// Returns whether the key was attached.
    pub fn detach(&self, key: &str) -> bool {
        let removed = self.attachments.lock().remove(key);
        match removed {
            Some(attachment) => {
                attachment.task.abort();
                tracing::debug!(key, "mirror detached");
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self, key: &str) -> bool {
        self.attachments.lock().contains_key(key)
    }

    /// Write every pending value now instead of waiting out the debounce.
    pub async fn flush(&self) {
        let waiters: Vec<oneshot::Receiver<()>> = {
            let attachments = self.attachments.lock();
            attachments
                .values()
                .filter_map(|attachment| {
                    let (done_tx, done_rx) = oneshot::channel();
                    attachment.tx.send(Command::Flush(done_tx)).ok().map(|_| done_rx)
                })
                .collect()
        };
        for waiter in waiters {
            let _ = waiter.await;
        }
    }

    /// Delete the stored record for `key`.
    pub fn clear(&self, key: &str) -> Result<(), PersistenceError> {
        self.storage
            .remove(key)
            .map_err(|source| PersistenceError::Write {
                key: key.to_string(),
                source,
            })
    }

    pub fn stats(&self) -> MirrorStats {
        MirrorStats {
            writes: self.counters.writes.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Trailing-debounce writer for one key.
///
/// Every new value restarts the quiet period. When the channel closes the
/// pending value, if any, is written before the task exits.
async fn write_loop(
    key: String,
    mut rx: mpsc::UnboundedReceiver<Command>,
    storage: Arc<dyn KeyValueStore>,
    debounce: Duration,
    counters: Arc<Counters>,
) {
    let mut pending: Option<String> = None;

    loop {
        let command = if pending.is_some() {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(command) => command,
                Err(_) => {
                    if let Some(value) = pending.take() {
                        write(&key, &value, storage.as_ref(), &counters);
                    }
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match command {
            Some(Command::Write(value)) => pending = Some(value),
            Some(Command::Flush(done)) => {
                if let Some(value) = pending.take() {
                    write(&key, &value, storage.as_ref(), &counters);
                }
                let _ = done.send(());
            }
            None => {
                if let Some(value) = pending.take() {
                    write(&key, &value, storage.as_ref(), &counters);
                }
                tracing::trace!(key = %key, "mirror writer finished");
                break;
            }
        }
    }
}

fn write(key: &str, value: &str, storage: &dyn KeyValueStore, counters: &Counters) {
    match storage.set(key, value) {
        Ok(()) => {
            counters.writes.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(key, bytes = value.len(), "state mirrored");
        }
        Err(source) => {
            counters.write_failures.fetch_add(1, Ordering::Relaxed);
            let err = PersistenceError::Write {
                key: key.to_string(),
                source,
            };
            tracing::warn!(error = %err, "mirror write failed; in-memory state unaffected");
        }
    }
}
