//! Thread directory service.
//!
//! `ThreadDirectory` is the single writer of the directory. Every operation
//! takes the state mutex, so no two mutations interleave. A mutation works on
//! a repaired clone of the state, persists that clone and only then swaps it
//! in, so a failed write leaves both memory and storage as they were.
//! Observers are notified once the new state is committed.

use serde::Serialize;
use std::sync::Arc;
use threadkeep_core::error::{Result, ThreadkeepError};
use threadkeep_core::history::{HistoryStore, MessageTree};
use threadkeep_core::runtime::{RuntimeConfig, ThreadRuntimeFactory};
use threadkeep_core::storage::KeyValueStore;
use threadkeep_core::thread::{
    DEFAULT_THREAD_ID, DirectoryRepository, DirectorySnapshot, DirectoryState,
    InvariantViolation, RepairReport, ThreadRecord,
};
use threadkeep_infrastructure::config_service::DEFAULT_TITLE_MAX_CHARS;
use threadkeep_infrastructure::{KvDirectoryRepository, KvHistoryStore};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::thread::{
    ChangeCallback, ChangeNotifier, RuntimeRegistry, ScopedHistoryAdapter, SubscriptionId,
    derive_title,
};

const ENTITY: &str = "Thread";

/// Tunables for [`ThreadDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryOptions {
    /// Maximum length of a generated title, in characters.
    pub title_max_chars: usize,
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        Self {
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
        }
    }
}

/// Identifiers returned by [`ThreadDirectory::initialize`].
///
/// Threads are local-only, so `remote_id` is the thread id and there is never
/// an external id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub remote_id: String,
    pub external_id: Option<String>,
}

type StateGuard<'a> = MutexGuard<'a, DirectoryState>;

/// The authoritative index of threads, their lifecycle and their runtimes.
pub struct ThreadDirectory<F: ThreadRuntimeFactory> {
    state: Mutex<DirectoryState>,
    repository: Arc<dyn DirectoryRepository>,
    history_store: Arc<dyn HistoryStore>,
    registry: RuntimeRegistry<F::Runtime>,
    factory: F,
    notifier: ChangeNotifier,
    options: DirectoryOptions,
}

impl<F: ThreadRuntimeFactory> ThreadDirectory<F> {
    /// Reads the persisted directory once. Nothing stored means a fresh
    /// directory holding only the default thread.
    ///
    /// The loaded state is not repaired here; the first query or mutation
    /// that depends on it does that.
    pub async fn load(
        repository: Arc<dyn DirectoryRepository>,
        history_store: Arc<dyn HistoryStore>,
        factory: F,
        options: DirectoryOptions,
    ) -> Result<Self> {
        let state = match repository.load().await? {
            Some(state) => {
                debug!(
                    "Loaded directory with {} thread(s), main '{}'",
                    state.records().len(),
                    state.main_thread_id()
                );
                state
            }
            None => {
                info!("No persisted directory, starting with the default thread");
                DirectoryState::default()
            }
        };

        Ok(Self {
            state: Mutex::new(state),
            repository,
            history_store,
            registry: RuntimeRegistry::new(),
            factory,
            notifier: ChangeNotifier::new(),
            options,
        })
    }

    /// Builds a directory whose entries and histories share one store.
    pub async fn with_store(
        store: Arc<dyn KeyValueStore>,
        factory: F,
        options: DirectoryOptions,
    ) -> Result<Self> {
        Self::load(
            Arc::new(KvDirectoryRepository::new(store.clone())),
            Arc::new(KvHistoryStore::new(store)),
            factory,
            options,
        )
        .await
    }

    // ============================================================================
    // Commit helpers
    // ============================================================================

    /// A clone of `state` with every invariant restored.
    fn healed(state: &DirectoryState) -> (DirectoryState, RepairReport) {
        let mut next = state.clone();
        let report = next.repair();
        if !report.is_clean() {
            warn!("Repairing directory: {:?}", report);
        }
        (next, report)
    }

    /// Persists `next`, then swaps it in. Memory is untouched on failure.
    async fn commit(&self, guard: &mut StateGuard<'_>, next: DirectoryState) -> Result<()> {
        self.repository.save(&next).await?;
        **guard = next;
        Ok(())
    }

    /// Commits `next` if it differs from the current state and notifies.
    async fn commit_if_changed(
        &self,
        mut guard: StateGuard<'_>,
        next: DirectoryState,
    ) -> Result<bool> {
        if next == *guard {
            return Ok(false);
        }
        self.commit(&mut guard, next).await?;
        drop(guard);
        self.notifier.notify_all().await;
        Ok(true)
    }

    /// Runs `op` on a repaired clone, then commits and notifies if anything
    /// changed. A failing `op` commits nothing.
    async fn mutate<T>(&self, op: impl FnOnce(&mut DirectoryState) -> Result<T>) -> Result<T> {
        let guard = self.state.lock().await;
        let (mut next, _) = Self::healed(&guard);
        let output = op(&mut next)?;
        self.commit_if_changed(guard, next).await?;
        Ok(output)
    }

    /// Self-healing read: repairs (and persists) before looking at the state.
    async fn read_healed<T>(&self, read: impl FnOnce(&DirectoryState) -> T) -> Result<T> {
        let guard = self.state.lock().await;
        let (next, _) = Self::healed(&guard);
        let output = read(&next);
        self.commit_if_changed(guard, next).await?;
        Ok(output)
    }

    /// Returns the registered runtime for `thread_id`, building it if needed.
    ///
    /// The caller guarantees the thread has a record.
    async fn ensure_runtime(&self, thread_id: &str) -> Arc<F::Runtime> {
        if let Some(runtime) = self.registry.get(thread_id).await {
            return runtime;
        }
        let config = RuntimeConfig {
            history: Arc::new(ScopedHistoryAdapter::new(
                thread_id,
                self.history_store.clone(),
            )),
        };
        let runtime = Arc::new(self.factory.create(thread_id, config));
        debug!("Created runtime for thread '{}'", thread_id);
        self.registry.insert(thread_id.to_string(), runtime).await
    }

    // ============================================================================
    // Queries
    // ============================================================================

    /// The current main thread id.
    ///
    /// If the stored id no longer resolves, the directory falls back to the
    /// default thread and persists that before answering.
    pub async fn main_thread_id(&self) -> Result<String> {
        self.read_healed(|state| state.main_thread_id().to_string())
            .await
    }

    /// Visible ordering: main first, then the other regular threads.
    pub async fn thread_ids(&self) -> Result<Vec<String>> {
        self.read_healed(DirectoryState::thread_ids).await
    }

    pub async fn archived_thread_ids(&self) -> Result<Vec<String>> {
        self.read_healed(DirectoryState::archived_thread_ids).await
    }

    pub async fn get_item_by_id(&self, thread_id: &str) -> Option<ThreadRecord> {
        self.state.lock().await.get(thread_id).cloned()
    }

    /// Records of the visible threads, in display order.
    pub async fn list_threads(&self) -> Result<Vec<ThreadRecord>> {
        Ok(self.snapshot().await?.threads)
    }

    /// Records of the archived threads.
    pub async fn list_archived(&self) -> Result<Vec<ThreadRecord>> {
        Ok(self.snapshot().await?.archived_threads)
    }

    pub async fn snapshot(&self) -> Result<DirectorySnapshot> {
        self.read_healed(DirectoryState::snapshot).await
    }

    /// Broken invariants of the in-memory state, without repairing anything.
    pub async fn validate(&self) -> Vec<InvariantViolation> {
        self.state.lock().await.validate()
    }

    /// Restores every invariant; persists and notifies only if something
    /// had to change.
    pub async fn repair(&self) -> Result<RepairReport> {
        let guard = self.state.lock().await;
        let (next, report) = Self::healed(&guard);
        self.commit_if_changed(guard, next).await?;
        Ok(report)
    }

    /// The persisted history of `thread_id`.
    pub async fn history(&self, thread_id: &str) -> Result<Option<MessageTree>> {
        if !self.state.lock().await.contains(thread_id) {
            return Err(ThreadkeepError::not_found(ENTITY, thread_id));
        }
        self.history_store.load(thread_id).await
    }

    // ============================================================================
    // Lifecycle
    // ============================================================================

    /// Creates a regular thread titled with the placeholder. Idempotent.
    pub async fn initialize(&self, thread_id: &str) -> Result<InitializeResult> {
        if thread_id.trim().is_empty() {
            return Err(ThreadkeepError::invalid_operation(
                "thread id must not be empty",
            ));
        }

        let created = self.mutate(|state| Ok(state.initialize(thread_id))).await?;
        if created {
            info!("Created thread '{}'", thread_id);
        }
        Ok(InitializeResult {
            remote_id: thread_id.to_string(),
            external_id: None,
        })
    }

    /// Makes `thread_id` the main thread, unarchiving it first if needed.
    ///
    /// The unarchive is committed (and observed) on its own before the switch.
    pub async fn switch_to_thread(&self, thread_id: &str) -> Result<()> {
        let mut guard = self.state.lock().await;
        let (mut next, _) = Self::healed(&guard);

        if next.main_thread_id() == thread_id {
            self.commit_if_changed(guard, next).await?;
            return Ok(());
        }
        if !next.contains(thread_id) {
            return Err(ThreadkeepError::not_found(ENTITY, thread_id));
        }

        if next.is_archived(thread_id) {
            next.unarchive(thread_id)?;
            self.commit(&mut guard, next.clone()).await?;
            info!("Unarchived thread '{}' before switching to it", thread_id);
            self.notifier.notify_all().await;
        }

        next.set_main(thread_id)?;
        self.commit(&mut guard, next).await?;
        self.ensure_runtime(thread_id).await;
        drop(guard);

        info!("Switched to thread '{}'", thread_id);
        self.notifier.notify_all().await;
        Ok(())
    }

    /// Creates a thread with a fresh id and makes it main in one commit.
    pub async fn switch_to_new_thread(&self) -> Result<String> {
        let thread_id = Uuid::new_v4().to_string();

        let mut guard = self.state.lock().await;
        let (mut next, _) = Self::healed(&guard);
        next.initialize(&thread_id);
        next.set_main(&thread_id)?;
        self.commit(&mut guard, next).await?;
        self.ensure_runtime(&thread_id).await;
        drop(guard);

        info!("Created and switched to thread '{}'", thread_id);
        self.notifier.notify_all().await;
        Ok(thread_id)
    }

    pub async fn rename(&self, thread_id: &str, title: &str) -> Result<()> {
        self.mutate(|state| state.rename(thread_id, title)).await?;
        debug!("Renamed thread '{}' to '{}'", thread_id, title);
        Ok(())
    }

    /// Moves `thread_id` to the archive. Archiving the main thread fails.
    pub async fn archive(&self, thread_id: &str) -> Result<()> {
        if self.mutate(|state| state.archive(thread_id)).await? {
            info!("Archived thread '{}'", thread_id);
        }
        Ok(())
    }

    pub async fn unarchive(&self, thread_id: &str) -> Result<()> {
        if self.mutate(|state| state.unarchive(thread_id)).await? {
            info!("Unarchived thread '{}'", thread_id);
        }
        Ok(())
    }

    /// Removes `thread_id` and its runtime, then drops its history.
    ///
    /// Deleting an unknown id succeeds without changes. The history blob is
    /// removed best-effort once the directory is committed.
    pub async fn delete(&self, thread_id: &str) -> Result<()> {
        let mut guard = self.state.lock().await;
        let (mut next, _) = Self::healed(&guard);
        let removed = next.remove(thread_id)?;

        if removed.is_none() {
            self.commit_if_changed(guard, next).await?;
            debug!("Delete of unknown thread '{}' ignored", thread_id);
            return Ok(());
        }

        self.commit(&mut guard, next).await?;
        self.registry.remove(thread_id).await;
        if let Err(e) = self.history_store.delete(thread_id).await {
            warn!(
                "Failed to delete history of thread '{}' (directory entry removed): {}",
                thread_id, e
            );
        }
        drop(guard);

        info!("Deleted thread '{}'", thread_id);
        self.notifier.notify_all().await;
        Ok(())
    }

    /// Replaces a placeholder title with one derived from the thread's
    /// history, or from its id. Returns the resulting title.
    ///
    /// Threads that already carry a real title are left alone.
    pub async fn generate_title(&self, thread_id: &str) -> Result<String> {
        let guard = self.state.lock().await;
        let (mut next, _) = Self::healed(&guard);
        let record = next
            .get(thread_id)
            .ok_or_else(|| ThreadkeepError::not_found(ENTITY, thread_id))?;
        if !record.has_placeholder_title() {
            return Ok(record.title.clone());
        }

        let history = self.history_store.load(thread_id).await?;
        let title = derive_title(thread_id, history.as_ref(), self.options.title_max_chars);
        next.rename(thread_id, title.clone())?;
        self.commit_if_changed(guard, next).await?;

        debug!("Generated title '{}' for thread '{}'", title, thread_id);
        Ok(title)
    }

    // ============================================================================
    // Runtimes
    // ============================================================================

    /// The single live runtime for `thread_id`, built on first use.
    ///
    /// A missing default-thread record is synthesized. Any other id without a
    /// record is purged from the directory and reported as
    /// `FatalInconsistency`.
    pub async fn runtime(&self, thread_id: &str) -> Result<Arc<F::Runtime>> {
        if let Some(runtime) = self.registry.get(thread_id).await {
            return Ok(runtime);
        }

        let guard = self.state.lock().await;
        if guard.contains(thread_id) {
            return Ok(self.ensure_runtime(thread_id).await);
        }

        let mut next = guard.clone();
        if thread_id == DEFAULT_THREAD_ID {
            next.ensure_default_thread();
            warn!("Synthesized missing metadata for the default thread");
            self.commit_if_changed(guard, next).await?;
            return Ok(self.ensure_runtime(thread_id).await);
        }

        next.purge(thread_id);
        self.commit_if_changed(guard, next).await?;
        Err(ThreadkeepError::fatal_inconsistency(
            thread_id,
            "runtime requested for a thread the directory does not know",
        ))
    }

    /// The runtime of the current main thread.
    pub async fn main_runtime(&self) -> Result<Arc<F::Runtime>> {
        let main = self.main_thread_id().await?;
        self.runtime(&main).await
    }

    // ============================================================================
    // Observers
    // ============================================================================

    /// Registers `callback` to run after every committed mutation.
    ///
    /// Callbacks run synchronously on the mutating task and must not block.
    pub async fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        self.notifier.subscribe(callback).await
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id).await
    }
}

#[cfg(test)]
#[path = "thread_directory_service_test.rs"]
mod tests;
