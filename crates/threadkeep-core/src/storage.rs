//! Key/value storage medium.

use async_trait::async_trait;

use crate::error::Result;

/// The raw storage medium behind the directory and the history store.
///
/// Keys are `/`-separated strings such as `threads/mainThreadId` or
/// `history/<thread id>`; values are serialized JSON text.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads one entry. An absent key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Reads several entries as one consistent view, in `keys` order.
    ///
    /// The default implementation reads them one after another; stores that
    /// can be written concurrently override it so a read never interleaves
    /// with a `set_many`.
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    /// Atomically overwrites one entry.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Writes several entries as one unit.
    ///
    /// The default implementation writes them one after another.
    async fn set_many(&self, entries: Vec<(String, String)>) -> Result<()> {
        for (key, value) in entries {
            self.set(&key, value).await?;
        }
        Ok(())
    }

    /// Removes one entry; removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`, sorted.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}
