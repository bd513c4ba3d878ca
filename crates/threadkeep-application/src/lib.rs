//! Application layer for Threadkeep.
//!
//! Coordinates the directory aggregate, its persistence, the runtime registry
//! and change notification behind a single service object.

pub mod thread;
pub mod thread_directory_service;

pub use thread::{ChangeCallback, ScopedHistoryAdapter, SubscriptionId};
pub use thread_directory_service::{DirectoryOptions, InitializeResult, ThreadDirectory};
