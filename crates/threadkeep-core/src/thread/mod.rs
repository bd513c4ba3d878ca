//! Thread domain module.
//!
//! # Module Structure
//!
//! - `model`: Thread records and lifecycle status (`ThreadRecord`, `ThreadStatus`)
//! - `directory`: The directory aggregate and its invariants (`DirectoryState`)
//! - `repository`: Repository trait for persisting the directory
//!
//! # Usage
//!
//! ```ignore
//! use threadkeep_core::thread::{DirectoryState, ThreadRecord, ThreadStatus};
//! use threadkeep_core::thread::DirectoryRepository;
//! ```

mod directory;
mod model;
mod repository;

// Re-export public API
pub use directory::{DirectorySnapshot, DirectoryState, InvariantViolation, RepairReport};
pub use model::{DEFAULT_THREAD_ID, PLACEHOLDER_TITLE, ThreadRecord, ThreadStatus};
pub use repository::DirectoryRepository;
