//! KeyValueStore-based DirectoryRepository implementation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use threadkeep_core::error::Result;
use threadkeep_core::storage::KeyValueStore;
use threadkeep_core::thread::{DEFAULT_THREAD_ID, DirectoryRepository, DirectoryState, ThreadRecord};
use tracing::{debug, warn};

use crate::dto::{
    ARCHIVED_IDS_KEY, DIRECTORY_SCHEMA_VERSION, MAIN_THREAD_ID_KEY, METADATA_KEY, REGULAR_IDS_KEY,
    SCHEMA_VERSION_KEY, ThreadMetadataV1_0_0, encode_directory,
};

/// Persists the directory as five small JSON entries under `threads/`.
///
/// Loading is lenient: an entry that is absent or cannot be decoded falls
/// back to its default and is logged. The result is not validated here; the
/// caller repairs it.
pub struct KvDirectoryRepository {
    store: Arc<dyn KeyValueStore>,
}

impl KvDirectoryRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

/// Decodes one entry. `None` when absent or undecodable.
fn decode_entry<T: DeserializeOwned>(key: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring undecodable directory entry '{}': {}", key, e);
            None
        }
    }
}

#[async_trait]
impl DirectoryRepository for KvDirectoryRepository {
    async fn load(&self) -> Result<Option<DirectoryState>> {
        // One read, so a concurrent save is seen whole or not at all.
        let keys = [
            MAIN_THREAD_ID_KEY,
            REGULAR_IDS_KEY,
            ARCHIVED_IDS_KEY,
            METADATA_KEY,
            SCHEMA_VERSION_KEY,
        ];
        let mut raw = self.store.get_many(&keys).await?.into_iter();
        let mut next = || raw.next().flatten();

        let main: Option<String> = decode_entry(MAIN_THREAD_ID_KEY, next());
        let regular: Option<Vec<String>> = decode_entry(REGULAR_IDS_KEY, next());
        let archived: Option<BTreeSet<String>> = decode_entry(ARCHIVED_IDS_KEY, next());
        let metadata: Option<BTreeMap<String, ThreadMetadataV1_0_0>> =
            decode_entry(METADATA_KEY, next());
        let version: Option<String> = decode_entry(SCHEMA_VERSION_KEY, next());

        if main.is_none() && regular.is_none() && archived.is_none() && metadata.is_none() {
            debug!("No persisted directory found");
            return Ok(None);
        }

        if let Some(version) = version.as_deref()
            && version != DIRECTORY_SCHEMA_VERSION
        {
            warn!(
                "Directory schema version '{}' differs from '{}'; reading as-is",
                version, DIRECTORY_SCHEMA_VERSION
            );
        }

        // The map key is authoritative for the record's id.
        let records = metadata.unwrap_or_default().into_iter().map(|(id, dto)| {
            let mut record = ThreadRecord::from(dto);
            if record.thread_id != id {
                warn!(
                    "Thread record '{}' was stored under key '{}'; using the key",
                    record.thread_id, id
                );
                record.thread_id = id;
            }
            record
        });

        Ok(Some(DirectoryState::from_parts(
            main.unwrap_or_else(|| DEFAULT_THREAD_ID.to_string()),
            regular.unwrap_or_default(),
            archived.unwrap_or_default(),
            records,
        )))
    }

    async fn save(&self, state: &DirectoryState) -> Result<()> {
        self.store.set_many(encode_directory(state)?).await
    }
}
