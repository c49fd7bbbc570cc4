//! Core traits and types for the caching system.

/// Trait for entities held in caches.
///
/// Implementors provide the key they are looked up by inside cached
/// collections.
pub trait Cacheable: Clone + Send + Sync + 'static {
  /// Unique identifier for this entity (list id, event id, tag name)
  fn cache_key(&self) -> &str;

  /// Entity type name used in errors and logs (e.g., "list", "event")
  fn entity_type() -> &'static str;
}

/// Index of the entity with `key` in a cached collection.
pub fn position_of<T: Cacheable>(items: &[T], key: &str) -> Option<usize> {
  items.iter().position(|item| item.cache_key() == key)
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// Create a new cache result from a valid cache entry.
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
    }
  }

  /// Create a new cache result for a failed fetch: the last cached value
  /// (possibly expired) or an empty fallback.
  pub fn offline(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
    }
  }

  pub fn into_data(self) -> T {
    self.data
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the backend
  Network,
  /// Data from cache, still within its ttl
  CacheFresh,
  /// Backend call failed - serving the last cached data or an empty fallback
  Offline,
}
