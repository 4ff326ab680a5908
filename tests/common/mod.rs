//! Shared test utilities and storage doubles.

#![allow(dead_code, unused_imports)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use teamhub::persistence::{KeyValueStore, StorageError};

/// In-memory storage that records every write in order.
#[derive(Default)]
pub struct RecordingStorage {
    entries: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
}

impl RecordingStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().clone()
    }

    pub fn writes_to(&self, key: &str) -> Vec<String> {
        self.writes
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl KeyValueStore for RecordingStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.writes.lock().push((key.to_string(), value.to_string()));
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Storage whose writes always fail, e.g. a full disk.
#[derive(Default)]
pub struct FullStorage;

impl KeyValueStore for FullStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}
