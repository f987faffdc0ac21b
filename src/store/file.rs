//! File-backed key-value store.
//!
//! All preferences live in a single JSON object on disk. Values are cached in
//! memory; committed writes reach the file before returning, applied writes
//! are tracked as pending and are written on the next commit, an explicit
//! [`FileStore::flush`], or drop.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use super::{KeyChangeSignal, KeyValueStore, WriteMode};
use crate::error::{PrefsError, PrefsResult};

struct Cache {
    values: Map<String, Value>,
    /// Keys changed by applied writes and not yet on disk.
    pending: HashSet<String>,
}

/// Preferences file with an in-memory cache.
pub struct FileStore {
    path: PathBuf,
    cache: Mutex<Cache>,
    signal: KeyChangeSignal,
}

impl FileStore {
    /// Open the preferences file at `path`.
    ///
    /// A missing file opens an empty store. A file that is not a JSON object
    /// is an error; it is left untouched on disk.
    pub fn open(path: impl Into<PathBuf>) -> PrefsResult<Self> {
        let path = path.into();

        let values = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str::<Map<String, Value>>(&contents).map_err(|e| {
                PrefsError::Serialization {
                    key: path.display().to_string(),
                    message: e.to_string(),
                }
            })?
        } else {
            Map::new()
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "opened preferences file");

        Ok(Self {
            path,
            cache: Mutex::new(Cache {
                values,
                pending: HashSet::new(),
            }),
            signal: KeyChangeSignal::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write pending applied changes to disk.
    pub fn flush(&self) -> PrefsResult<()> {
        let mut cache = self.lock();
        if cache.pending.is_empty() {
            return Ok(());
        }
        write_atomically(&self.path, &cache.values)?;
        cache.pending.clear();
        Ok(())
    }

    /// Re-read the file, replacing the cache. Used after another process
    /// changed the file; every key whose value differs is signalled.
    ///
    /// Applied writes not yet flushed stay on top of the reloaded values and
    /// remain pending.
    pub fn reload(&self) -> PrefsResult<()> {
        let fresh = Self::open(&self.path)?;
        let mut fresh_values = fresh.into_values();

        let changed: Vec<String> = {
            let mut cache = self.lock();
            for key in &cache.pending {
                match cache.values.get(key) {
                    Some(value) => {
                        fresh_values.insert(key.clone(), value.clone());
                    }
                    None => {
                        fresh_values.remove(key);
                    }
                }
            }

            let mut changed: Vec<String> = fresh_values
                .iter()
                .filter(|(k, v)| cache.values.get(*k) != Some(*v))
                .map(|(k, _)| k.clone())
                .collect();
            changed.extend(
                cache
                    .values
                    .keys()
                    .filter(|k| !fresh_values.contains_key(*k))
                    .cloned(),
            );
            cache.values = fresh_values;
            changed
        };

        for key in changed {
            self.signal.publish(&key);
        }
        Ok(())
    }

    fn into_values(self) -> Map<String, Value> {
        let mut cache = self.lock();
        cache.pending.clear();
        std::mem::take(&mut cache.values)
    }

    fn lock(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to `key` in the cache according to `mode`. Returns
    /// whether the stored value changed. A failed commit leaves the cache
    /// untouched.
    fn write(
        &self,
        key: &str,
        mode: WriteMode,
        change: impl FnOnce(&mut Map<String, Value>) -> bool,
    ) -> PrefsResult<bool> {
        let mut cache = self.lock();
        match mode {
            WriteMode::Commit => {
                let mut next = cache.values.clone();
                if !change(&mut next) && cache.pending.is_empty() {
                    return Ok(false);
                }
                write_atomically(&self.path, &next)?;
                let changed = next != cache.values;
                cache.values = next;
                cache.pending.clear();
                Ok(changed)
            }
            WriteMode::Apply => {
                let changed = change(&mut cache.values);
                if changed {
                    cache.pending.insert(key.to_string());
                }
                Ok(changed)
            }
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.lock().values.get(key).cloned()
    }

    fn put(&self, key: &str, value: Value, mode: WriteMode) -> PrefsResult<()> {
        let changed = self.write(key, mode, |values| {
            if values.get(key) == Some(&value) {
                return false;
            }
            values.insert(key.to_string(), value);
            true
        })?;
        if changed {
            self.signal.publish(&key.to_string());
        }
        Ok(())
    }

    fn remove(&self, key: &str, mode: WriteMode) -> PrefsResult<()> {
        let changed = self.write(key, mode, |values| values.remove(key).is_some())?;
        if changed {
            self.signal.publish(&key.to_string());
        }
        Ok(())
    }

    fn signal(&self) -> &KeyChangeSignal {
        &self.signal
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        // Best-effort flush of applied writes
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to flush preferences");
        }
    }
}

/// Write `values` to a sibling temp file, then rename over `path`.
fn write_atomically(path: &Path, values: &Map<String, Value>) -> PrefsResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                PrefsError::Storage(format!(
                    "Failed to create preferences directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let contents = serde_json::to_string_pretty(values)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).map_err(|e| {
        PrefsError::Storage(format!(
            "Failed to write preferences '{}': {}",
            tmp.display(),
            e
        ))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        PrefsError::Storage(format!(
            "Failed to replace preferences '{}': {}",
            path.display(),
            e
        ))
    })?;
    Ok(())
}
