use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use threadkeep_application::{DirectoryOptions, ThreadDirectory};
use threadkeep_core::storage::KeyValueStore;
use threadkeep_infrastructure::{DirKeyValueStore, KvHistoryStore, ThreadkeepConfig, ThreadkeepPaths};
use tracing::debug;

use crate::runtime::TranscriptFactory;

/// Everything a command needs, opened once per invocation.
pub struct App {
    pub directory: ThreadDirectory<TranscriptFactory>,
    pub history_store: KvHistoryStore,
    pub store_root: PathBuf,
}

impl App {
    /// Opens the store under `data_dir`, or the configured/default data
    /// directory when none is given.
    pub async fn open(data_dir: Option<PathBuf>, config: &ThreadkeepConfig) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => config
                .resolve_data_dir()
                .context("Failed to resolve data directory")?,
        };
        let store_root = ThreadkeepPaths::store_dir(&data_dir);
        debug!("Using store at {}", store_root.display());

        let store: Arc<dyn KeyValueStore> = Arc::new(
            DirKeyValueStore::new(&store_root)
                .with_context(|| format!("Failed to open store at {}", store_root.display()))?,
        );
        let options = DirectoryOptions {
            title_max_chars: config.title_max_chars,
        };
        let directory = ThreadDirectory::with_store(store.clone(), TranscriptFactory, options)
            .await
            .context("Failed to load thread directory")?;

        Ok(Self {
            directory,
            history_store: KvHistoryStore::new(store),
            store_root,
        })
    }
}
