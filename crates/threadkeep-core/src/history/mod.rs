//! Message history domain module.
//!
//! Each thread owns one message tree: an insertion-ordered list of nodes with
//! parent links plus a head pointer naming the tip of the selected branch.
//!
//! - `message`: Message types (`Message`, `MessageRole`)
//! - `tree`: The per-thread tree (`MessageTree`, `MessageNode`)
//! - `store`: Store trait keyed by thread id (`HistoryStore`)
//! - `adapter`: Thread-scoped handle given to runtimes (`ThreadHistoryAdapter`)

mod adapter;
mod message;
mod store;
mod tree;

pub use adapter::{HistoryChange, ThreadHistoryAdapter};
pub use message::{Message, MessageRole};
pub use store::HistoryStore;
pub use tree::{MessageNode, MessageTree, TreeRepair, TreeViolation};
