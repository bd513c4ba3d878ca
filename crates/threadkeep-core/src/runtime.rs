//! Thread runtime construction contract.
//!
//! The runtime itself (text generation, streaming, tools) lives outside this
//! workspace. The directory only needs to build one per thread and hand it
//! the thread's history handle.

use std::sync::Arc;

use crate::history::ThreadHistoryAdapter;

/// Everything a runtime receives at construction.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// History handle scoped to the runtime's thread.
    pub history: Arc<dyn ThreadHistoryAdapter>,
}

/// Builds thread runtimes.
///
/// `create` must not touch the directory; it is called while the directory
/// is in the middle of an operation.
pub trait ThreadRuntimeFactory: Send + Sync {
    type Runtime: Send + Sync + 'static;

    fn create(&self, thread_id: &str, config: RuntimeConfig) -> Self::Runtime;
}
