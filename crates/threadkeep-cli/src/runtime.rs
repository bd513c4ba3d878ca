//! A minimal thread runtime that records messages typed on the command line.

use std::sync::Arc;
use threadkeep_core::error::Result;
use threadkeep_core::history::{HistoryChange, Message, MessageRole, MessageTree, ThreadHistoryAdapter};
use threadkeep_core::runtime::{RuntimeConfig, ThreadRuntimeFactory};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Holds the authoritative tree of one thread and writes it back whole after
/// every change.
pub struct TranscriptRuntime {
    thread_id: String,
    history: Arc<dyn ThreadHistoryAdapter>,
    tree: Mutex<Option<MessageTree>>,
}

impl TranscriptRuntime {
    pub fn new(thread_id: impl Into<String>, history: Arc<dyn ThreadHistoryAdapter>) -> Self {
        Self {
            thread_id: thread_id.into(),
            history,
            tree: Mutex::new(None),
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Appends a message after the current head and saves the full tree.
    ///
    /// The in-memory tree only advances once the save succeeded.
    pub async fn say(&self, role: MessageRole, content: impl Into<String>) -> Result<Message> {
        let mut guard = self.tree.lock().await;
        if guard.is_none() {
            let loaded = self.history.load().await?.unwrap_or_default();
            debug!(
                "Loaded {} message(s) for thread '{}'",
                loaded.len(),
                self.thread_id
            );
            *guard = Some(loaded);
        }
        let tree = guard.get_or_insert_with(MessageTree::new);

        let message = Message::new(Uuid::new_v4().to_string(), role, content);
        let parent_id = tree.head_id.clone();
        let mut next = tree.clone();
        next.push(message.clone(), parent_id.as_deref())?;

        self.history
            .append(HistoryChange {
                parent_id,
                message: message.clone(),
            })
            .await?;
        self.history.save_full_history(&next).await?;
        *tree = next;
        Ok(message)
    }
}

pub struct TranscriptFactory;

impl ThreadRuntimeFactory for TranscriptFactory {
    type Runtime = TranscriptRuntime;

    fn create(&self, thread_id: &str, config: RuntimeConfig) -> TranscriptRuntime {
        TranscriptRuntime::new(thread_id, config.history)
    }
}
