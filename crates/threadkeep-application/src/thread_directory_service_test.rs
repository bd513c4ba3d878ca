use super::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use threadkeep_core::history::{Message, MessageRole, ThreadHistoryAdapter};
use threadkeep_core::thread::{PLACEHOLDER_TITLE, ThreadStatus};
use threadkeep_infrastructure::MemoryKeyValueStore;

// ============================================================================
// Test doubles
// ============================================================================

struct TestRuntime {
    thread_id: String,
    history: Arc<dyn ThreadHistoryAdapter>,
}

#[derive(Clone, Default)]
struct CountingFactory {
    created: Arc<AtomicUsize>,
}

impl CountingFactory {
    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ThreadRuntimeFactory for CountingFactory {
    type Runtime = TestRuntime;

    fn create(&self, thread_id: &str, config: RuntimeConfig) -> TestRuntime {
        self.created.fetch_add(1, Ordering::SeqCst);
        TestRuntime {
            thread_id: thread_id.to_string(),
            history: config.history,
        }
    }
}

/// Directory repository whose saves can be made to fail as if the disk
/// were full.
struct FlakyRepository {
    inner: KvDirectoryRepository,
    fail: AtomicBool,
    saves: AtomicUsize,
}

impl FlakyRepository {
    fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryRepository for FlakyRepository {
    async fn load(&self) -> Result<Option<DirectoryState>> {
        self.inner.load().await
    }

    async fn save(&self, state: &DirectoryState) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ThreadkeepError::storage_exhausted(
                "threads/metadata",
                "no space left on device",
            ));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(state).await
    }
}

/// History store whose writes and deletes always fail.
struct FailingHistoryStore;

#[async_trait]
impl HistoryStore for FailingHistoryStore {
    async fn load(&self, _thread_id: &str) -> Result<Option<MessageTree>> {
        Ok(None)
    }

    async fn replace(&self, thread_id: &str, _tree: &MessageTree) -> Result<()> {
        Err(ThreadkeepError::storage_exhausted(thread_id, "full"))
    }

    async fn delete(&self, _thread_id: &str) -> Result<()> {
        Err(ThreadkeepError::io("medium unavailable"))
    }
}

struct Fixture {
    directory: ThreadDirectory<CountingFactory>,
    factory: CountingFactory,
    repository: Arc<FlakyRepository>,
    kv: MemoryKeyValueStore,
    notifications: Arc<AtomicUsize>,
}

impl Fixture {
    fn notifications(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }
}

async fn build(
    kv: MemoryKeyValueStore,
    history_store: Option<Arc<dyn HistoryStore>>,
) -> Fixture {
    let repository = Arc::new(FlakyRepository {
        inner: KvDirectoryRepository::new(Arc::new(kv.clone())),
        fail: AtomicBool::new(false),
        saves: AtomicUsize::new(0),
    });
    let history_store: Arc<dyn HistoryStore> = match history_store {
        Some(store) => store,
        None => Arc::new(KvHistoryStore::new(Arc::new(kv.clone()))),
    };
    let factory = CountingFactory::default();

    let directory = ThreadDirectory::load(
        repository.clone(),
        history_store,
        factory.clone(),
        DirectoryOptions::default(),
    )
    .await
    .unwrap();

    let notifications = Arc::new(AtomicUsize::new(0));
    let counter = notifications.clone();
    directory
        .subscribe(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .await;

    Fixture {
        directory,
        factory,
        repository,
        kv,
        notifications,
    }
}

async fn setup() -> Fixture {
    build(MemoryKeyValueStore::new(), None).await
}

/// A directory loaded from `state` as if it had been persisted earlier.
async fn setup_with_state(state: DirectoryState) -> Fixture {
    let kv = MemoryKeyValueStore::new();
    KvDirectoryRepository::new(Arc::new(kv.clone()))
        .save(&state)
        .await
        .unwrap();
    build(kv, None).await
}

async fn persisted_state(fixture: &Fixture) -> DirectoryState {
    KvDirectoryRepository::new(Arc::new(fixture.kv.clone()))
        .load()
        .await
        .unwrap()
        .unwrap()
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_fresh_directory_has_only_the_default_thread() {
    let fixture = setup().await;
    let directory = &fixture.directory;

    assert_eq!(directory.main_thread_id().await.unwrap(), DEFAULT_THREAD_ID);
    assert_eq!(
        directory.thread_ids().await.unwrap(),
        vec![DEFAULT_THREAD_ID.to_string()]
    );
    assert!(directory.archived_thread_ids().await.unwrap().is_empty());
    assert_eq!(
        directory.get_item_by_id(DEFAULT_THREAD_ID).await.unwrap().title,
        PLACEHOLDER_TITLE
    );

    // Reads of a healthy directory never write or notify.
    assert_eq!(fixture.repository.saves(), 0);
    assert_eq!(fixture.notifications(), 0);
}

#[tokio::test]
async fn test_dangling_main_id_heals_on_read() {
    let state = DirectoryState::from_parts(
        "ghost".to_string(),
        vec!["a".to_string()],
        Vec::new(),
        [ThreadRecord::new("a")],
    );
    let fixture = setup_with_state(state).await;
    assert!(!fixture.directory.validate().await.is_empty());

    assert_eq!(
        fixture.directory.main_thread_id().await.unwrap(),
        DEFAULT_THREAD_ID
    );
    assert!(fixture.directory.validate().await.is_empty());
    assert_eq!(fixture.notifications(), 1);

    let persisted = persisted_state(&fixture).await;
    assert_eq!(persisted.main_thread_id(), DEFAULT_THREAD_ID);
    assert!(persisted.contains(DEFAULT_THREAD_ID));

    // Already healed: no further writes.
    fixture.directory.main_thread_id().await.unwrap();
    assert_eq!(fixture.repository.saves(), 1);
}

#[tokio::test]
async fn test_repair_reports_and_commits_once() {
    let state = DirectoryState::from_parts(
        DEFAULT_THREAD_ID.to_string(),
        vec![
            DEFAULT_THREAD_ID.to_string(),
            "a".to_string(),
            "a".to_string(),
        ],
        Vec::new(),
        [ThreadRecord::default_thread(), ThreadRecord::new("a")],
    );
    let fixture = setup_with_state(state).await;

    let report = fixture.directory.repair().await.unwrap();
    assert_eq!(report.deduplicated, 1);
    assert!(fixture.directory.repair().await.unwrap().is_clean());
    assert_eq!(fixture.repository.saves(), 1);
    assert_eq!(fixture.notifications(), 1);
}

#[tokio::test]
async fn test_snapshot_and_listings() {
    let fixture = setup().await;
    let directory = &fixture.directory;
    directory.initialize("a").await.unwrap();
    directory.initialize("b").await.unwrap();
    directory.archive("a").await.unwrap();

    let snapshot = directory.snapshot().await.unwrap();
    assert_eq!(snapshot.main_thread_id, DEFAULT_THREAD_ID);
    assert_eq!(snapshot.thread_ids, vec![DEFAULT_THREAD_ID, "b"]);
    assert_eq!(snapshot.archived_thread_ids, vec!["a"]);

    let archived = directory.list_archived().await.unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].status, ThreadStatus::Archived);
    assert_eq!(directory.list_threads().await.unwrap().len(), 2);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let fixture = setup().await;
    let directory = &fixture.directory;

    let first = directory.initialize("a").await.unwrap();
    let ids_after_first = directory.thread_ids().await.unwrap();
    let second = directory.initialize("a").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.remote_id, "a");
    assert_eq!(first.external_id, None);
    assert_eq!(directory.thread_ids().await.unwrap(), ids_after_first);
    assert_eq!(fixture.repository.saves(), 1);
    assert_eq!(fixture.notifications(), 1);
}

#[tokio::test]
async fn test_initialize_rejects_empty_id() {
    let fixture = setup().await;
    let err = fixture.directory.initialize("  ").await.unwrap_err();
    assert!(err.is_invalid_operation());
}

#[tokio::test]
async fn test_switch_to_new_thread() {
    let fixture = setup().await;
    let directory = &fixture.directory;

    let id = directory.switch_to_new_thread().await.unwrap();
    assert_ne!(id, DEFAULT_THREAD_ID);
    assert_eq!(directory.main_thread_id().await.unwrap(), id);
    assert_eq!(
        directory.thread_ids().await.unwrap(),
        vec![id.clone(), DEFAULT_THREAD_ID.to_string()]
    );
    assert_eq!(fixture.factory.created(), 1);
    assert_eq!(fixture.repository.saves(), 1);
    assert_eq!(fixture.notifications(), 1);

    let other = directory.switch_to_new_thread().await.unwrap();
    assert_ne!(other, id);
}

#[tokio::test]
async fn test_switch_to_archived_thread_unarchives_it() {
    let fixture = setup().await;
    let directory = &fixture.directory;
    directory.initialize("a").await.unwrap();
    directory.archive("a").await.unwrap();
    assert_eq!(fixture.notifications(), 2);

    directory.switch_to_thread("a").await.unwrap();
    // Unarchive and switch are committed separately.
    assert_eq!(fixture.notifications(), 4);

    directory.switch_to_thread("a").await.unwrap();
    assert_eq!(fixture.notifications(), 4);

    assert!(directory.archived_thread_ids().await.unwrap().is_empty());
    assert_eq!(directory.main_thread_id().await.unwrap(), "a");
    assert_eq!(
        directory.get_item_by_id("a").await.unwrap().status,
        ThreadStatus::Regular
    );
    assert_eq!(fixture.factory.created(), 1);
    assert!(directory.validate().await.is_empty());
}

#[tokio::test]
async fn test_switch_to_unknown_thread_fails() {
    let fixture = setup().await;
    let err = fixture.directory.switch_to_thread("nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(fixture.notifications(), 0);
}

#[tokio::test]
async fn test_archive_and_delete_main_leave_state_untouched() {
    let fixture = setup().await;
    let directory = &fixture.directory;
    directory.initialize("a").await.unwrap();
    directory.switch_to_thread("a").await.unwrap();

    let before = directory.snapshot().await.unwrap();
    let saves = fixture.repository.saves();
    let notifications = fixture.notifications();

    assert!(directory.archive("a").await.unwrap_err().is_invalid_operation());
    assert!(directory.delete("a").await.unwrap_err().is_invalid_operation());

    assert_eq!(directory.snapshot().await.unwrap(), before);
    assert_eq!(fixture.repository.saves(), saves);
    assert_eq!(fixture.notifications(), notifications);
}

#[tokio::test]
async fn test_archive_unarchive_round_trip() {
    let fixture = setup().await;
    let directory = &fixture.directory;
    for id in ["a", "b", "c"] {
        directory.initialize(id).await.unwrap();
    }
    directory.rename("a", "Trip planning").await.unwrap();

    directory.archive("a").await.unwrap();
    let notifications = fixture.notifications();
    directory.archive("a").await.unwrap();
    assert_eq!(fixture.notifications(), notifications);

    directory.unarchive("a").await.unwrap();
    directory.unarchive("a").await.unwrap();

    let record = directory.get_item_by_id("a").await.unwrap();
    assert_eq!(record.status, ThreadStatus::Regular);
    assert_eq!(record.title, "Trip planning");
    assert_eq!(
        directory.thread_ids().await.unwrap(),
        vec![DEFAULT_THREAD_ID, "b", "c", "a"]
    );
    assert_eq!(fixture.notifications(), notifications + 1);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let fixture = setup().await;
    let directory = &fixture.directory;
    assert!(directory.rename("x", "t").await.unwrap_err().is_not_found());
    assert!(directory.archive("x").await.unwrap_err().is_not_found());
    assert!(directory.unarchive("x").await.unwrap_err().is_not_found());
    assert!(directory.generate_title("x").await.unwrap_err().is_not_found());
    assert!(directory.history("x").await.unwrap_err().is_not_found());
    assert_eq!(fixture.notifications(), 0);
}

#[tokio::test]
async fn test_delete_unknown_is_a_no_op() {
    let fixture = setup().await;
    let before = fixture.directory.snapshot().await.unwrap();
    fixture.directory.delete("never-existed").await.unwrap();
    assert_eq!(fixture.directory.snapshot().await.unwrap(), before);
    assert_eq!(fixture.notifications(), 0);
}

#[tokio::test]
async fn test_delete_removes_record_history_and_runtime() {
    let fixture = setup().await;
    let directory = &fixture.directory;
    directory.initialize("a").await.unwrap();

    let runtime = directory.runtime("a").await.unwrap();
    let mut tree = MessageTree::new();
    tree.append(Message::new("m1", MessageRole::User, "hello"))
        .unwrap();
    runtime.history.save_full_history(&tree).await.unwrap();
    assert!(fixture.kv.get("history/a").await.unwrap().is_some());

    directory.delete("a").await.unwrap();
    assert!(directory.get_item_by_id("a").await.is_none());
    assert!(fixture.kv.get("history/a").await.unwrap().is_none());
    assert!(directory.validate().await.is_empty());

    // Re-creating the id yields a fresh runtime.
    directory.initialize("a").await.unwrap();
    let again = directory.runtime("a").await.unwrap();
    assert!(!Arc::ptr_eq(&runtime, &again));
    assert_eq!(fixture.factory.created(), 2);
}

#[tokio::test]
async fn test_delete_survives_history_failure() {
    let fixture = build(
        MemoryKeyValueStore::new(),
        Some(Arc::new(FailingHistoryStore)),
    )
    .await;
    fixture.directory.initialize("a").await.unwrap();

    fixture.directory.delete("a").await.unwrap();
    assert!(fixture.directory.get_item_by_id("a").await.is_none());
    assert!(!persisted_state(&fixture).await.contains("a"));
}

#[tokio::test]
async fn test_failed_persist_leaves_memory_untouched() {
    let fixture = setup().await;
    let directory = &fixture.directory;
    directory.initialize("a").await.unwrap();
    let before = directory.snapshot().await.unwrap();
    let notifications = fixture.notifications();

    fixture.repository.fail.store(true, Ordering::SeqCst);
    let err = directory.initialize("b").await.unwrap_err();
    assert!(err.is_storage_exhausted());
    assert!(directory.rename("a", "x").await.unwrap_err().is_storage_exhausted());
    assert!(directory
        .switch_to_new_thread()
        .await
        .unwrap_err()
        .is_storage_exhausted());

    assert!(directory.get_item_by_id("b").await.is_none());
    assert_eq!(directory.snapshot().await.unwrap(), before);
    assert_eq!(fixture.notifications(), notifications);
    assert_eq!(fixture.factory.created(), 0);

    fixture.repository.fail.store(false, Ordering::SeqCst);
    assert!(!persisted_state(&fixture).await.contains("b"));
}

#[tokio::test]
async fn test_generate_title() {
    let fixture = setup().await;
    let directory = &fixture.directory;
    directory.initialize("0123456789abcdef").await.unwrap();
    directory.initialize("chat").await.unwrap();
    directory.initialize("named").await.unwrap();
    directory.rename("named", "Keep me").await.unwrap();

    // No history: title comes from the id.
    assert_eq!(
        directory.generate_title("0123456789abcdef").await.unwrap(),
        "Thread 01234567"
    );

    let runtime = directory.runtime("chat").await.unwrap();
    let mut tree = MessageTree::new();
    tree.append(Message::new("m1", MessageRole::User, "What is a lifetime?"))
        .unwrap();
    runtime.history.save_full_history(&tree).await.unwrap();
    assert_eq!(
        directory.generate_title("chat").await.unwrap(),
        "What is a lifetime?"
    );
    assert_eq!(
        directory.get_item_by_id("chat").await.unwrap().title,
        "What is a lifetime?"
    );

    let notifications = fixture.notifications();
    assert_eq!(directory.generate_title("named").await.unwrap(), "Keep me");
    assert_eq!(directory.generate_title("chat").await.unwrap(), "What is a lifetime?");
    assert_eq!(fixture.notifications(), notifications);
}

// ============================================================================
// Runtimes
// ============================================================================

#[tokio::test]
async fn test_runtime_is_memoized() {
    let fixture = setup().await;
    let first = fixture.directory.runtime(DEFAULT_THREAD_ID).await.unwrap();
    let second = fixture.directory.main_runtime().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.thread_id, DEFAULT_THREAD_ID);
    assert_eq!(first.history.thread_id(), DEFAULT_THREAD_ID);
    assert_eq!(fixture.factory.created(), 1);
}

#[tokio::test]
async fn test_runtime_for_missing_default_record_synthesizes_it() {
    let state = DirectoryState::from_parts(
        "a".to_string(),
        vec!["a".to_string()],
        Vec::new(),
        [ThreadRecord::new("a")],
    );
    let fixture = setup_with_state(state).await;

    let runtime = fixture.directory.runtime(DEFAULT_THREAD_ID).await.unwrap();
    assert_eq!(runtime.thread_id, DEFAULT_THREAD_ID);
    assert!(fixture
        .directory
        .get_item_by_id(DEFAULT_THREAD_ID)
        .await
        .is_some());
    assert!(persisted_state(&fixture).await.contains(DEFAULT_THREAD_ID));
    assert_eq!(fixture.notifications(), 1);
}

#[tokio::test]
async fn test_runtime_for_unknown_thread_purges_and_fails() {
    let state = DirectoryState::from_parts(
        DEFAULT_THREAD_ID.to_string(),
        vec![DEFAULT_THREAD_ID.to_string(), "ghost".to_string()],
        Vec::new(),
        [ThreadRecord::default_thread()],
    );
    let fixture = setup_with_state(state).await;

    let err = fixture.directory.runtime("ghost").await.err().unwrap();
    assert!(err.is_fatal_inconsistency());
    assert!(fixture.directory.validate().await.is_empty());
    assert!(!persisted_state(&fixture)
        .await
        .regular_ids()
        .contains(&"ghost".to_string()));
    assert_eq!(fixture.factory.created(), 0);
}

// ============================================================================
// Observers
// ============================================================================

#[tokio::test]
async fn test_unsubscribed_observer_is_not_called() {
    let fixture = setup().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let id = fixture
        .directory
        .subscribe(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .await;

    fixture.directory.initialize("a").await.unwrap();
    assert!(fixture.directory.unsubscribe(id).await);
    fixture.directory.initialize("b").await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.notifications(), 2);
}
