//! Storage media and the atomic file layer beneath them.

mod atomic_file;
mod dir_store;
mod memory_store;

pub use atomic_file::AtomicTomlFile;
pub use dir_store::DirKeyValueStore;
pub use memory_store::MemoryKeyValueStore;
