//! Thread record types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known id of the thread used when no prior state exists or the
/// persisted state no longer names a valid main thread.
pub const DEFAULT_THREAD_ID: &str = "default";

/// Title given to every thread at creation, before a real title is derived.
pub const PLACEHOLDER_TITLE: &str = "New Chat";

/// Lifecycle status of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    /// Listed in the regular thread ordering.
    #[default]
    Regular,
    /// Hidden from the regular ordering until unarchived.
    Archived,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Regular => "regular",
            ThreadStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata the directory keeps for one thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadRecord {
    /// Stable thread identifier
    pub thread_id: String,
    /// Lifecycle status
    pub status: ThreadStatus,
    /// Display title
    pub title: String,
}

impl ThreadRecord {
    /// Creates a regular record carrying the placeholder title.
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            status: ThreadStatus::Regular,
            title: PLACEHOLDER_TITLE.to_string(),
        }
    }

    /// Metadata for the default thread, constructible on demand.
    pub fn default_thread() -> Self {
        Self::new(DEFAULT_THREAD_ID)
    }

    pub fn is_archived(&self) -> bool {
        self.status == ThreadStatus::Archived
    }

    /// True while the title has never been set to anything meaningful.
    pub fn has_placeholder_title(&self) -> bool {
        self.title.trim().is_empty() || self.title == PLACEHOLDER_TITLE
    }
}
