//! Entity stores built on the cache primitives.
//!
//! Each store owns the caches for one entity type and talks to the backend
//! through [`RpcClient`](crate::rpc::RpcClient). Stores never invalidate each
//! other; cross-entity eviction is planned in [`invalidation`] and applied by
//! the [`CacheManager`](crate::manager::CacheManager).

mod content;
mod events;
pub mod invalidation;
mod lists;
mod tags;
mod timeline;

use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::cache::lock;
use crate::error::Error;

pub use content::ContentStore;
pub use events::{EventPage, EventStore, PageInfo};
pub use invalidation::{InvalidationPlan, Mutation, TagScope};
pub use lists::ListStore;
pub use tags::TagStore;
pub use timeline::{AppliedUpdate, Bucket, TimelineStatus, TimelineStore};

/// Human-readable message for the most recent failure of a store.
///
/// Set whenever a read or mutation fails, cleared by the next success.
#[derive(Clone, Default)]
pub(crate) struct LastError {
  slot: Arc<Mutex<Option<String>>>,
}

impl LastError {
  pub(crate) fn record(&self, store: &'static str, operation: &str, err: &Error) {
    warn!(store, operation, error = %err, "Store operation failed");
    *lock(&self.slot, store) = Some(format!("{} failed: {}", operation, err));
  }

  pub(crate) fn clear(&self) {
    *lock(&self.slot, "error") = None;
  }

  pub(crate) fn get(&self) -> Option<String> {
    lock(&self.slot, "error").clone()
  }
}
