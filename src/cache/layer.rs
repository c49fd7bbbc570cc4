//! Cache layer that orchestrates caching logic with backend fetching.

use std::borrow::Borrow;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::time::Duration;
use tracing::debug;

use super::inflight::InFlight;
use super::lock::lock;
use super::traits::CacheResult;
use super::ttl::TtlCache;
use crate::error::Result;

/// Cache layer that manages caching logic and backend fetching.
///
/// Sits between a store and the RPC client: a ttl-gated map plus an
/// in-flight table so concurrent misses for one key share a single call.
pub struct CacheLayer<K, V> {
  name: &'static str,
  cache: Arc<Mutex<TtlCache<K, V>>>,
  inflight: Arc<InFlight<K, V>>,
}

impl<K, V> CacheLayer<K, V>
where
  K: Eq + Hash + Clone + Send + 'static,
  V: Clone + Send + Sync + 'static,
{
  /// Create a new cache layer; `name` labels its log lines.
  pub fn new(name: &'static str, ttl: Duration) -> Self {
    Self {
      name,
      cache: Arc::new(Mutex::new(TtlCache::new(ttl))),
      inflight: Arc::new(InFlight::new()),
    }
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. If stale/missing, join or start the fetch for this key
  /// 3. Store the result unless the key was invalidated meanwhile
  ///
  /// Failures are returned as-is; the caller decides on a fallback.
  pub async fn fetch<F, Fut>(&self, key: K, fetcher: F) -> Result<CacheResult<V>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V>> + Send + 'static,
  {
    let generation = {
      let cache = lock(&self.cache, self.name);
      if let Some(value) = cache.get(&key) {
        return Ok(CacheResult::from_cache(value));
      }
      cache.generation(&key)
    };

    let cache = Arc::clone(&self.cache);
    let name = self.name;
    let stored_key = key.clone();
    let value = self
      .inflight
      .run(key, move || {
        let fetch = fetcher();
        async move {
          let value = fetch.await?;
          let stored = lock(&cache, name).set_if_generation(generation, stored_key, value.clone());
          if !stored {
            debug!(cache = name, "Discarding response that raced an invalidation");
          }
          Ok(value)
        }
      })
      .await?;

    Ok(CacheResult::from_network(value))
  }

  /// Valid cached value, if any.
  pub fn get<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    lock(&self.cache, self.name).get(key)
  }

  /// Last cached value regardless of age, used as a fallback after failures.
  pub fn stale<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    lock(&self.cache, self.name)
      .peek(key)
      .map(|entry| entry.value.clone())
  }

  pub fn set(&self, key: K, value: V) {
    lock(&self.cache, self.name).set(key, value);
  }

  /// Mutate a cached value in place without refreshing its timestamp.
  pub fn update<Q>(&self, key: &Q, f: impl FnOnce(&mut V)) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    lock(&self.cache, self.name).update(key, f)
  }

  /// Run `f` with exclusive access to the underlying map.
  pub fn with<R>(&self, f: impl FnOnce(&mut TtlCache<K, V>) -> R) -> R {
    f(&mut lock(&self.cache, self.name))
  }

  /// Drop the entry and detach any fetch in flight for it.
  pub fn invalidate<Q>(&self, key: &Q)
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
  {
    if lock(&self.cache, self.name).invalidate(key) {
      debug!(cache = self.name, "Invalidated entry");
    }
    self.inflight.forget(key);
  }

  pub fn clear(&self) {
    lock(&self.cache, self.name).clear();
    self.inflight.forget_all();
  }

  pub fn is_fetching<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.inflight.is_pending(key)
  }
}

impl<K, V> Clone for CacheLayer<K, V> {
  fn clone(&self) -> Self {
    Self {
      name: self.name,
      cache: Arc::clone(&self.cache),
      inflight: Arc::clone(&self.inflight),
    }
  }
}
