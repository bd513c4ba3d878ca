//! Thread application services.
//!
//! Support pieces for [`ThreadDirectory`](crate::ThreadDirectory): the runtime
//! registry, change notification, the per-thread history handle and title
//! derivation.

mod history_adapter;
mod notifier;
mod registry;
mod title;

pub use history_adapter::ScopedHistoryAdapter;
pub use notifier::{ChangeCallback, ChangeNotifier, SubscriptionId};
pub use registry::RuntimeRegistry;
pub use title::{derive_title, fallback_title};
