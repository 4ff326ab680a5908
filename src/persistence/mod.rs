//! Persistence: key-value storage and the debounced state mirror.
//!
//! Persistence is best-effort. The Store's in-memory state is always the
//! source of truth; read failures fall back to defaults and write failures
//! are logged and dropped.

mod file;
mod memory;
mod mirror;

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use thiserror::Error;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use mirror::{MirrorOptions, MirrorStats, PersistenceMirror};

/// Errors from a [`KeyValueStore`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("storage I/O failed at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while mirroring state to storage.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence mirror needs a Tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("failed to read '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to decode '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: StorageError,
    },
}

/// External string key-value store, e.g. a browser-style local storage.
///
/// Values are JSON documents. Callers must not assume a completed `set`
/// is durable.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode `key`. `Ok(None)` when nothing is stored.
pub fn try_hydrate<T: DeserializeOwned>(
    storage: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, PersistenceError> {
    let Some(raw) = storage.get(key).map_err(|source| PersistenceError::Read {
        key: key.to_string(),
        source,
    })?
    else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| PersistenceError::Decode {
            key: key.to_string(),
            source,
        })
}

/// Read `key`, or return `fallback` if it is missing or unusable.
///
/// Never fails: read and decode errors are logged as warnings.
pub fn hydrate<T: DeserializeOwned>(storage: &dyn KeyValueStore, key: &str, fallback: T) -> T {
    match try_hydrate(storage, key) {
        Ok(Some(value)) => {
            tracing::debug!(key, "hydrated from storage");
            value
        }
        Ok(None) => fallback,
        Err(e) => {
            tracing::warn!(key, error = %e, "hydration failed; using fallback");
            fallback
        }
    }
}
