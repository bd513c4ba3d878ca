//! Directory DTOs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use threadkeep_core::error::Result;
use threadkeep_core::thread::{DirectoryState, PLACEHOLDER_TITLE, ThreadRecord, ThreadStatus};

pub const MAIN_THREAD_ID_KEY: &str = "threads/mainThreadId";
pub const REGULAR_IDS_KEY: &str = "threads/regularIds";
pub const ARCHIVED_IDS_KEY: &str = "threads/archivedIds";
pub const METADATA_KEY: &str = "threads/metadata";
pub const SCHEMA_VERSION_KEY: &str = "threads/schemaVersion";

pub const DIRECTORY_SCHEMA_VERSION: &str = "1.0.0";

/// Thread status DTO matching domain model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatusDTO {
    #[default]
    Regular,
    Archived,
}

impl From<ThreadStatusDTO> for ThreadStatus {
    fn from(dto: ThreadStatusDTO) -> Self {
        match dto {
            ThreadStatusDTO::Regular => ThreadStatus::Regular,
            ThreadStatusDTO::Archived => ThreadStatus::Archived,
        }
    }
}

impl From<ThreadStatus> for ThreadStatusDTO {
    fn from(status: ThreadStatus) -> Self {
        match status {
            ThreadStatus::Regular => ThreadStatusDTO::Regular,
            ThreadStatus::Archived => ThreadStatusDTO::Archived,
        }
    }
}

fn default_title() -> String {
    PLACEHOLDER_TITLE.to_string()
}

/// One value of the `threads/metadata` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMetadataV1_0_0 {
    pub thread_id: String,
    #[serde(default)]
    pub status: ThreadStatusDTO,
    #[serde(default = "default_title")]
    pub title: String,
}

impl From<&ThreadRecord> for ThreadMetadataV1_0_0 {
    fn from(record: &ThreadRecord) -> Self {
        Self {
            thread_id: record.thread_id.clone(),
            status: record.status.into(),
            title: record.title.clone(),
        }
    }
}

impl From<ThreadMetadataV1_0_0> for ThreadRecord {
    fn from(dto: ThreadMetadataV1_0_0) -> Self {
        ThreadRecord {
            thread_id: dto.thread_id,
            status: dto.status.into(),
            title: dto.title,
        }
    }
}

/// Serializes every directory entry, ready for a single `set_many`.
pub fn encode_directory(state: &DirectoryState) -> Result<Vec<(String, String)>> {
    let metadata: BTreeMap<&str, ThreadMetadataV1_0_0> = state
        .records()
        .iter()
        .map(|(id, record)| (id.as_str(), ThreadMetadataV1_0_0::from(record)))
        .collect();

    Ok(vec![
        (
            MAIN_THREAD_ID_KEY.to_string(),
            serde_json::to_string(state.main_thread_id())?,
        ),
        (
            REGULAR_IDS_KEY.to_string(),
            serde_json::to_string(state.regular_ids())?,
        ),
        (
            ARCHIVED_IDS_KEY.to_string(),
            serde_json::to_string(state.archived_ids())?,
        ),
        (METADATA_KEY.to_string(), serde_json::to_string(&metadata)?),
        (
            SCHEMA_VERSION_KEY.to_string(),
            serde_json::to_string(DIRECTORY_SCHEMA_VERSION)?,
        ),
    ])
}
