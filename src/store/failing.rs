//! Store double whose writes to chosen keys fail.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use super::{KeyChangeSignal, KeyValueStore, MemoryStore, WriteMode};
use crate::error::{PrefsError, PrefsResult};

/// [`MemoryStore`] that rejects puts and removals of broken keys.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    broken: Mutex<HashSet<String>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn break_key(&self, key: &str) {
        self.broken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
    }

    fn check(&self, key: &str) -> PrefsResult<()> {
        if self
            .broken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
        {
            return Err(PrefsError::Storage(format!("write to {} failed", key)));
        }
        Ok(())
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: Value, mode: WriteMode) -> PrefsResult<()> {
        self.check(key)?;
        self.inner.put(key, value, mode)
    }

    fn remove(&self, key: &str, mode: WriteMode) -> PrefsResult<()> {
        self.check(key)?;
        self.inner.remove(key, mode)
    }

    fn signal(&self) -> &KeyChangeSignal {
        self.inner.signal()
    }
}
