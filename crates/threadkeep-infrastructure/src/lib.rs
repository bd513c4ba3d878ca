pub mod config_service;
pub mod dto;
pub mod kv_directory_repository;
pub mod kv_history_store;
pub mod paths;
pub mod storage;

pub use crate::config_service::{ConfigService, ThreadkeepConfig};
pub use crate::kv_directory_repository::KvDirectoryRepository;
pub use crate::kv_history_store::KvHistoryStore;
pub use crate::paths::ThreadkeepPaths;
pub use crate::storage::{DirKeyValueStore, MemoryKeyValueStore};
