//! Generic in-memory caching primitives.
//!
//! This module is entity-agnostic and provides:
//! - A ttl map where expired entries read as misses
//! - Keyed coalescing of concurrent fetches
//! - A cache layer combining both, with invalidation that also detaches
//!   fetches already in flight

mod inflight;
mod layer;
mod lock;
mod traits;
mod ttl;

pub use inflight::InFlight;
pub use layer::CacheLayer;
pub(crate) use lock::lock;
pub use traits::{position_of, CacheResult, CacheSource, Cacheable};
pub use ttl::{CacheEntry, Generation, TtlCache, DEFAULT_TTL};
