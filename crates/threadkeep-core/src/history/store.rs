//! History store trait.

use async_trait::async_trait;

use super::tree::MessageTree;
use crate::error::Result;

/// Per-thread persisted message trees, keyed by thread id.
///
/// # Implementation Notes
///
/// - `load` returns `Ok(None)` both when nothing is stored and when the stored
///   blob cannot be decoded; only medium failures are errors.
/// - `replace` writes the whole tree in one atomic write and must report a
///   full medium as `ThreadkeepError::StorageExhausted`.
/// - `delete` succeeds when there is nothing to delete.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<MessageTree>>;

    async fn replace(&self, thread_id: &str, tree: &MessageTree) -> Result<()>;

    async fn delete(&self, thread_id: &str) -> Result<()>;
}
