//! Client-side cache and sync layer for a list/event/tag task store that
//! lives behind an RPC backend.
//!
//! [`CacheManager`] owns one store per entity type. Stores serve reads from
//! ttl caches, coalesce concurrent fetches, and fall back to the last known
//! data when the backend fails. Mutations go to the backend first and then
//! drop whatever cached state they made stale.

pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod model;
pub mod rpc;
pub mod store;

pub use cache::{CacheResult, CacheSource};
pub use error::{Error, Result};
pub use manager::{CacheManager, CacheSettings};
pub use model::{Event, EventPatch, List, Priority, Tag, TagColor};
pub use rpc::{HttpTransport, RpcClient, Transport};
