//! Domain layer for Threadkeep.
//!
//! Holds the thread directory aggregate, the per-thread message tree and the
//! traits that the infrastructure and application layers implement. Nothing
//! in this crate performs I/O.

pub mod error;
pub mod history;
pub mod runtime;
pub mod storage;
pub mod thread;

pub use error::{Result, ThreadkeepError};
