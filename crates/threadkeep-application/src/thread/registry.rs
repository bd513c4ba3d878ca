use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory registry of live thread runtimes.
///
/// Holds at most one runtime per thread id. Runtimes carry a stateful history
/// handle, so handing out a second instance for the same id would let two
/// writers race on one history blob. Entries are only removed when their
/// thread is deleted.
pub struct RuntimeRegistry<R> {
    runtimes: Arc<RwLock<HashMap<String, Arc<R>>>>,
}

impl<R> RuntimeRegistry<R> {
    /// Creates a new empty RuntimeRegistry.
    pub fn new() -> Self {
        Self {
            runtimes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Gets the live runtime for `thread_id`, if one was built.
    pub async fn get(&self, thread_id: &str) -> Option<Arc<R>> {
        let runtimes = self.runtimes.read().await;
        runtimes.get(thread_id).cloned()
    }

    /// Registers a runtime, returning the one already registered for the id
    /// instead if there is one.
    pub async fn insert(&self, thread_id: String, runtime: Arc<R>) -> Arc<R> {
        let mut runtimes = self.runtimes.write().await;
        runtimes.entry(thread_id).or_insert(runtime).clone()
    }

    /// Drops the runtime for `thread_id`. Returns whether one was registered.
    pub async fn remove(&self, thread_id: &str) -> bool {
        let mut runtimes = self.runtimes.write().await;
        runtimes.remove(thread_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.runtimes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runtimes.read().await.is_empty()
    }
}

impl<R> Default for RuntimeRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_keeps_first_instance() {
        let registry = RuntimeRegistry::new();
        let first = registry.insert("t1".to_string(), Arc::new(1)).await;
        let second = registry.insert("t1".to_string(), Arc::new(2)).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_and_remove() {
        let registry = RuntimeRegistry::new();
        assert!(registry.get("t1").await.is_none());

        let runtime = registry.insert("t1".to_string(), Arc::new("rt")).await;
        assert!(Arc::ptr_eq(&registry.get("t1").await.unwrap(), &runtime));

        assert!(registry.remove("t1").await);
        assert!(!registry.remove("t1").await);
        assert!(registry.is_empty().await);
    }
}
