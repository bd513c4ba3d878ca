//! History handle consumed by thread runtimes.

use async_trait::async_trait;

use super::message::Message;
use super::tree::MessageTree;
use crate::error::Result;

/// A message the runtime has just added, with the node it hangs under.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryChange {
    pub parent_id: Option<String>,
    pub message: Message,
}

/// History access bound to a single thread.
///
/// Runtimes keep the authoritative tree in memory and call
/// [`save_full_history`](Self::save_full_history) after every logical change.
/// `append` and `update` exist for runtimes that report incremental changes;
/// implementations may accept them without writing anything.
#[async_trait]
pub trait ThreadHistoryAdapter: Send + Sync {
    /// The thread this handle is scoped to.
    fn thread_id(&self) -> &str;

    async fn load(&self) -> Result<Option<MessageTree>>;

    async fn append(&self, change: HistoryChange) -> Result<()>;

    async fn update(&self, message: Message) -> Result<()>;

    async fn save_full_history(&self, tree: &MessageTree) -> Result<()>;
}
