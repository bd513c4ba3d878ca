//! In-memory key/value store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use threadkeep_core::error::{Result, ThreadkeepError};
use threadkeep_core::storage::KeyValueStore;

/// A `HashMap`-backed store for tests and ephemeral sessions.
///
/// With a quota set, any write that would push the total size of keys plus
/// values past `quota_bytes` fails with `StorageExhausted` and changes nothing.
#[derive(Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    quota_bytes: Option<usize>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Arc::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Total bytes currently stored.
    pub fn used_bytes(&self) -> Result<usize> {
        Ok(Self::usage(&*self.lock()?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| ThreadkeepError::internal("memory store lock poisoned"))
    }

    fn usage(entries: &HashMap<String, String>) -> usize {
        entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    fn check_quota(&self, projected: &HashMap<String, String>, key: &str) -> Result<()> {
        if let Some(quota) = self.quota_bytes {
            let used = Self::usage(projected);
            if used > quota {
                return Err(ThreadkeepError::storage_exhausted(
                    key,
                    format!("quota of {quota} bytes exceeded ({used} bytes needed)"),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let guard = self.lock()?;
        Ok(keys.iter().map(|key| guard.get(*key).cloned()).collect())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.set_many(vec![(key.to_string(), value)]).await
    }

    async fn set_many(&self, entries: Vec<(String, String)>) -> Result<()> {
        let mut guard = self.lock()?;
        let mut projected = guard.clone();
        let last_key = entries.last().map(|(key, _)| key.clone()).unwrap_or_default();
        for (key, value) in entries {
            projected.insert(key, value);
        }
        self.check_quota(&projected, &last_key)?;
        *guard = projected;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .lock()?
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
