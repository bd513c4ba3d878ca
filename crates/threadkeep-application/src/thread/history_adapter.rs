//! History handle given to each runtime.

use async_trait::async_trait;
use std::sync::Arc;
use threadkeep_core::error::Result;
use threadkeep_core::history::{
    HistoryChange, HistoryStore, Message, MessageTree, ThreadHistoryAdapter,
};
use tracing::debug;

/// A [`ThreadHistoryAdapter`] bound to one thread id.
///
/// Only `save_full_history` writes; incremental changes are logged and left
/// to the next full save.
pub struct ScopedHistoryAdapter {
    thread_id: String,
    store: Arc<dyn HistoryStore>,
}

impl ScopedHistoryAdapter {
    pub fn new(thread_id: impl Into<String>, store: Arc<dyn HistoryStore>) -> Self {
        Self {
            thread_id: thread_id.into(),
            store,
        }
    }
}

#[async_trait]
impl ThreadHistoryAdapter for ScopedHistoryAdapter {
    fn thread_id(&self) -> &str {
        &self.thread_id
    }

    async fn load(&self) -> Result<Option<MessageTree>> {
        self.store.load(&self.thread_id).await
    }

    async fn append(&self, change: HistoryChange) -> Result<()> {
        debug!(
            "Thread '{}': append of message '{}' (parent {:?}) deferred to full save",
            self.thread_id, change.message.id, change.parent_id
        );
        Ok(())
    }

    async fn update(&self, message: Message) -> Result<()> {
        debug!(
            "Thread '{}': update of message '{}' deferred to full save",
            self.thread_id, message.id
        );
        Ok(())
    }

    async fn save_full_history(&self, tree: &MessageTree) -> Result<()> {
        self.store.replace(&self.thread_id, tree).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadkeep_core::history::MessageRole;
    use threadkeep_infrastructure::{KvHistoryStore, MemoryKeyValueStore};

    #[tokio::test]
    async fn test_adapter_is_scoped_to_its_thread() {
        let store: Arc<dyn HistoryStore> =
            Arc::new(KvHistoryStore::new(Arc::new(MemoryKeyValueStore::new())));
        let a = ScopedHistoryAdapter::new("a", store.clone());
        let b = ScopedHistoryAdapter::new("b", store.clone());

        let mut tree = MessageTree::new();
        tree.append(Message::new("m1", MessageRole::User, "hello"))
            .unwrap();
        a.save_full_history(&tree).await.unwrap();

        assert_eq!(a.thread_id(), "a");
        assert_eq!(a.load().await.unwrap(), Some(tree));
        assert_eq!(b.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incremental_changes_do_not_write() {
        let store: Arc<dyn HistoryStore> =
            Arc::new(KvHistoryStore::new(Arc::new(MemoryKeyValueStore::new())));
        let adapter = ScopedHistoryAdapter::new("a", store);
        let message = Message::new("m1", MessageRole::User, "hello");

        adapter
            .append(HistoryChange {
                parent_id: None,
                message: message.clone(),
            })
            .await
            .unwrap();
        adapter.update(message).await.unwrap();
        assert_eq!(adapter.load().await.unwrap(), None);
    }
}
