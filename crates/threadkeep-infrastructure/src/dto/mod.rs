//! Data Transfer Objects (DTOs) for persistence.
//!
//! These DTOs are the on-disk schema. They stay private to the infrastructure
//! layer so the domain types in `threadkeep-core` can change without breaking
//! stored data.
//!
//! ## Schema Versioning (Semantic Versioning)
//!
//! - **MAJOR (X.0.0)**: Breaking changes (field removal, type changes)
//! - **MINOR (1.X.0)**: Backward-compatible additions (new optional fields)
//!
//! ### Directory Version History
//! - **1.0.0**: Initial schema (`threads/*` entries)
//!
//! ### History Blob Version History
//! - **1.0.0**: Initial schema; blobs without a `version` field are read as 1.0.0

mod directory;
mod history;

pub use directory::{
    ARCHIVED_IDS_KEY, DIRECTORY_SCHEMA_VERSION, MAIN_THREAD_ID_KEY, METADATA_KEY, REGULAR_IDS_KEY,
    SCHEMA_VERSION_KEY, ThreadMetadataV1_0_0, ThreadStatusDTO, encode_directory,
};
pub use history::{
    HISTORY_KEY_PREFIX, HISTORY_SCHEMA_VERSION, HistoryBlobDTO, HistoryBlobV1_0_0, MessageDTO,
    MessageNodeDTO, history_key,
};
