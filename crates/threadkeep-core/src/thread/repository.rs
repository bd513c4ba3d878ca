//! Directory repository trait.

use async_trait::async_trait;

use super::directory::DirectoryState;
use crate::error::Result;

/// Persistence boundary for the thread directory.
///
/// The directory is always written as a whole; there is no incremental
/// update. Implementations treat missing entries as "use defaults".
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Loads the persisted directory, or `None` when nothing was ever saved.
    async fn load(&self) -> Result<Option<DirectoryState>>;

    /// Overwrites the persisted directory with `state`.
    async fn save(&self, state: &DirectoryState) -> Result<()>;
}
