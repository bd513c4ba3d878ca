//! Change notification for directory observers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Callback invoked after every committed directory mutation.
///
/// No payload is passed; observers re-read what they need.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Default)]
pub struct ChangeNotifier {
    next_id: AtomicU64,
    callbacks: RwLock<BTreeMap<SubscriptionId, ChangeCallback>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.write().await.insert(id, callback);
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.callbacks.write().await.remove(&id).is_some()
    }

    /// Calls every observer in subscription order.
    pub async fn notify_all(&self) {
        // Snapshot first so a callback may (un)subscribe without deadlocking.
        let callbacks: Vec<ChangeCallback> =
            self.callbacks.read().await.values().cloned().collect();
        for callback in callbacks {
            callback();
        }
    }
}
