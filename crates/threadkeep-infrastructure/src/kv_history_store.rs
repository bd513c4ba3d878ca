//! KeyValueStore-based HistoryStore implementation.

use async_trait::async_trait;
use std::sync::Arc;
use threadkeep_core::error::{Result, ThreadkeepError};
use threadkeep_core::history::{HistoryStore, MessageTree};
use threadkeep_core::storage::KeyValueStore;
use tracing::{debug, warn};

use crate::dto::{HISTORY_KEY_PREFIX, HistoryBlobDTO, history_key};

/// One JSON blob per thread under `history/<thread id>`.
pub struct KvHistoryStore {
    store: Arc<dyn KeyValueStore>,
}

impl KvHistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Ids of every thread that has a stored blob, sorted.
    pub async fn stored_thread_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .keys_with_prefix(HISTORY_KEY_PREFIX)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(HISTORY_KEY_PREFIX).map(str::to_string))
            .collect())
    }

    fn decode(thread_id: &str, raw: &str) -> Result<MessageTree> {
        let blob: HistoryBlobDTO = serde_json::from_str(raw)?;
        let mut tree = MessageTree::try_from(blob)?;

        let violations = tree.validate();
        if !violations.is_empty() {
            let report = tree.repair();
            warn!(
                "Repaired history of thread '{}': {} violation(s), dropped {:?}, head reset: {}",
                thread_id,
                violations.len(),
                report.dropped,
                report.head_reset
            );
        }
        Ok(tree)
    }
}

#[async_trait]
impl HistoryStore for KvHistoryStore {
    async fn load(&self, thread_id: &str) -> Result<Option<MessageTree>> {
        let Some(raw) = self.store.get(&history_key(thread_id)).await? else {
            return Ok(None);
        };

        match Self::decode(thread_id, &raw) {
            Ok(tree) => Ok(Some(tree)),
            Err(e) => {
                warn!("Discarding undecodable history of thread '{}': {}", thread_id, e);
                Ok(None)
            }
        }
    }

    async fn replace(&self, thread_id: &str, tree: &MessageTree) -> Result<()> {
        let violations = tree.validate();
        if let Some(first) = violations.first() {
            return Err(ThreadkeepError::invalid_operation(format!(
                "refusing to store invalid history for thread '{}': {}",
                thread_id, first
            )));
        }

        let json = serde_json::to_string(&HistoryBlobDTO::from(tree))?;
        self.store.set(&history_key(thread_id), json).await?;
        debug!("Stored {} message(s) for thread '{}'", tree.len(), thread_id);
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<()> {
        self.store.remove(&history_key(thread_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use threadkeep_core::history::{Message, MessageNode, MessageRole};

    fn setup() -> (KvHistoryStore, MemoryKeyValueStore) {
        let store = MemoryKeyValueStore::new();
        (KvHistoryStore::new(Arc::new(store.clone())), store)
    }

    fn sample_tree() -> MessageTree {
        let mut tree = MessageTree::new();
        tree.append(Message::new("m1", MessageRole::User, "hello")).unwrap();
        tree.append(Message::new("m2", MessageRole::Assistant, "hi there"))
            .unwrap();
        tree.push(Message::new("m2b", MessageRole::Assistant, "hey"), Some("m1"))
            .unwrap();
        tree
    }

    #[tokio::test]
    async fn test_load_absent_is_none() {
        let (store, _) = setup();
        assert!(store.load("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_and_load() {
        let (store, _) = setup();
        let tree = sample_tree();
        store.replace("t1", &tree).await.unwrap();

        let loaded = store.load("t1").await.unwrap().unwrap();
        assert_eq!(loaded, tree);
        assert_eq!(loaded.head_id.as_deref(), Some("m2b"));
        assert!(store.load("t2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_rejects_invalid_tree() {
        let (store, kv) = setup();
        let tree = MessageTree {
            nodes: vec![MessageNode::new(
                Message::new("m1", MessageRole::User, "x"),
                Some("ghost".to_string()),
            )],
            head_id: Some("m1".to_string()),
        };
        let err = store.replace("t1", &tree).await.unwrap_err();
        assert!(err.is_invalid_operation());
        assert!(kv.get("history/t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_undecodable_blob_loads_as_none() {
        let (store, kv) = setup();
        kv.set("history/t1", "{ broken".to_string()).await.unwrap();
        assert!(store.load("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_stored_tree_is_repaired_on_load() {
        let (store, kv) = setup();
        let raw = r#"{"version":"1.0.0","messages":[
            {"message":{"id":"a","role":"user","content":"x","createdAt":"2024-01-01T00:00:00Z"},"parentId":null},
            {"message":{"id":"b","role":"assistant","content":"y","createdAt":"2024-01-01T00:00:01Z"},"parentId":"zzz"}
        ],"headId":"b"}"#;
        kv.set("history/t1", raw.to_string()).await.unwrap();

        let tree = store.load("t1").await.unwrap().unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.head_id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_delete_and_stored_ids() {
        let (store, _) = setup();
        store.replace("b", &sample_tree()).await.unwrap();
        store.replace("a", &sample_tree()).await.unwrap();
        assert_eq!(store.stored_thread_ids().await.unwrap(), vec!["a", "b"]);

        store.delete("a").await.unwrap();
        store.delete("never-existed").await.unwrap();
        assert_eq!(store.stored_thread_ids().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_full_medium_surfaces_storage_exhausted() {
        let kv = MemoryKeyValueStore::with_quota(64);
        let store = KvHistoryStore::new(Arc::new(kv));
        let err = store.replace("t1", &sample_tree()).await.unwrap_err();
        assert!(err.is_storage_exhausted());
    }
}
