//! In-process key-value store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::{KeyChangeSignal, KeyValueStore, WriteMode};
use crate::error::PrefsResult;

/// Key-value store held entirely in memory.
///
/// Both write modes take effect immediately. Every effective write is
/// recorded in a journal so callers can check which durability was requested
/// for a key.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    journal: Mutex<Vec<(String, WriteMode)>>,
    signal: KeyChangeSignal,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes and removals performed so far, oldest first.
    pub fn journal(&self) -> Vec<(String, WriteMode)> {
        lock(&self.journal).clone()
    }

    /// Mode of the most recent write to `key`.
    pub fn last_write_mode(&self, key: &str) -> Option<WriteMode> {
        lock(&self.journal)
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, mode)| *mode)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.values).get(key).cloned()
    }

    fn put(&self, key: &str, value: Value, mode: WriteMode) -> PrefsResult<()> {
        {
            let mut values = lock(&self.values);
            if values.get(key) == Some(&value) {
                return Ok(());
            }
            values.insert(key.to_string(), value);
        }
        lock(&self.journal).push((key.to_string(), mode));
        self.signal.publish(&key.to_string());
        Ok(())
    }

    fn remove(&self, key: &str, mode: WriteMode) -> PrefsResult<()> {
        if lock(&self.values).remove(key).is_none() {
            return Ok(());
        }
        lock(&self.journal).push((key.to_string(), mode));
        self.signal.publish(&key.to_string());
        Ok(())
    }

    fn signal(&self) -> &KeyChangeSignal {
        &self.signal
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_signal_fires_on_change_only() {
        let store = MemoryStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        store
            .signal()
            .subscribe(move |key: &String| seen_clone.lock().unwrap().push(key.clone()));

        store.put_bool("a", true, WriteMode::Commit).unwrap();
        store.put_bool("a", true, WriteMode::Commit).unwrap();
        store.put_bool("a", false, WriteMode::Commit).unwrap();
        store.remove("a", WriteMode::Apply).unwrap();
        store.remove("a", WriteMode::Apply).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["a", "a", "a"]);
    }

    #[test]
    fn test_journal_records_modes() {
        let store = MemoryStore::new();
        store.put_string("x", "1", WriteMode::Commit).unwrap();
        store.put_string("y", "2", WriteMode::Apply).unwrap();

        assert_eq!(store.last_write_mode("x"), Some(WriteMode::Commit));
        assert_eq!(store.last_write_mode("y"), Some(WriteMode::Apply));
        assert_eq!(store.last_write_mode("z"), None);
        assert_eq!(store.journal().len(), 2);
    }
}
