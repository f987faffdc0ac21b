//! Persistent key-value storage.
//!
//! Preferences are stored as JSON values under process-stable keys (see
//! [`crate::keys`]). Every write names a [`WriteMode`]:
//!
//! - [`WriteMode::Commit`] is durable before the call returns.
//! - [`WriteMode::Apply`] updates the in-memory view immediately and reaches
//!   durable storage later.
//!
//! Whenever a stored value actually changes, the store publishes the key on
//! its [`KeyChangeSignal`]. Other in-process consumers listen to that signal to
//! re-hydrate their caches instead of trusting them blindly.

mod file;
mod memory;
#[cfg(test)]
mod failing;

#[cfg(test)]
pub(crate) use failing::FailingStore;
pub use file::FileStore;
pub use memory::MemoryStore;

use serde_json::Value;

use crate::bus::ChangeBus;
use crate::error::{PrefsError, PrefsResult};

/// Process-wide signal carrying the key of a changed preference.
pub type KeyChangeSignal = ChangeBus<String>;

/// Durability of a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Synchronous and durable before returning.
    Commit,
    /// Visible immediately, persisted eventually.
    Apply,
}

/// Atomic get/put of primitive and structured values.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored under `key`.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`.
    fn put(&self, key: &str, value: Value, mode: WriteMode) -> PrefsResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str, mode: WriteMode) -> PrefsResult<()>;

    /// Signal fired with the key after each effective change.
    fn signal(&self) -> &KeyChangeSignal;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Read a string. A value of another type is reported as a decode error.
    fn get_string(&self, key: &str) -> PrefsResult<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(type_mismatch(key, "string", &other)),
        }
    }

    fn put_string(&self, key: &str, value: &str, mode: WriteMode) -> PrefsResult<()> {
        self.put(key, Value::String(value.to_string()), mode)
    }

    /// Read a boolean. A value of another type is reported as a decode error.
    fn get_bool(&self, key: &str) -> PrefsResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(other) => Err(type_mismatch(key, "bool", &other)),
        }
    }

    fn put_bool(&self, key: &str, value: bool, mode: WriteMode) -> PrefsResult<()> {
        self.put(key, Value::Bool(value), mode)
    }

    /// Read a structured value, stored as one opaque blob.
    fn get_blob(&self, key: &str) -> Option<Value> {
        self.get(key)
    }

    fn put_blob(&self, key: &str, value: Value, mode: WriteMode) -> PrefsResult<()> {
        self.put(key, value, mode)
    }
}

fn type_mismatch(key: &str, expected: &str, found: &Value) -> PrefsError {
    PrefsError::Serialization {
        key: key.to_string(),
        message: format!("expected {}, found {}", expected, found),
    }
}
