//! Time-to-live map that every entity cache is built on.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use tokio::time::{Duration, Instant};

/// How long an entry stays valid unless configured otherwise
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// A cached value and the instant it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  pub value: V,
  pub cached_at: Instant,
}

impl<V> CacheEntry<V> {
  pub fn new(value: V) -> Self {
    Self {
      value,
      cached_at: Instant::now(),
    }
  }

  pub fn age(&self) -> Duration {
    Instant::now().saturating_duration_since(self.cached_at)
  }

  /// Valid iff younger than the ttl.
  pub fn is_fresh(&self, ttl: Duration) -> bool {
    self.age() < ttl
  }
}

/// Snapshot of one key's invalidation state, taken before a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
  epoch: u64,
  key: u64,
}

/// Key → entry map where entries older than the ttl read as misses.
///
/// Invalidating a key bumps that key's counter and `clear` bumps the epoch.
/// Fetches capture their key's [`Generation`] before going to the backend and
/// store their result through [`TtlCache::set_if_generation`], so a response
/// that raced an invalidation of the same key is dropped instead of
/// resurrecting the evicted state.
#[derive(Debug)]
pub struct TtlCache<K, V> {
  entries: HashMap<K, CacheEntry<V>>,
  ttl: Duration,
  epoch: u64,
  generations: HashMap<K, u64>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
  pub fn new(ttl: Duration) -> Self {
    Self {
      entries: HashMap::new(),
      ttl,
      epoch: 0,
      generations: HashMap::new(),
    }
  }

  pub fn generation<Q>(&self, key: &Q) -> Generation
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    Generation {
      epoch: self.epoch,
      key: self.generations.get(key).copied().unwrap_or(0),
    }
  }

  /// Copy of the value if present and not expired.
  pub fn get<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.fresh(key).map(|entry| entry.value.clone())
  }

  /// The entry if present and not expired.
  pub fn fresh<Q>(&self, key: &Q) -> Option<&CacheEntry<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self
      .entries
      .get(key)
      .filter(|entry| entry.is_fresh(self.ttl))
  }

  /// The entry regardless of age.
  pub fn peek<Q>(&self, key: &Q) -> Option<&CacheEntry<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.entries.get(key)
  }

  pub fn set(&mut self, key: K, value: V) {
    self.entries.insert(key, CacheEntry::new(value));
  }

  /// Store only if `key` was not invalidated since `generation` was read.
  pub fn set_if_generation(&mut self, generation: Generation, key: K, value: V) -> bool {
    if generation != self.generation(&key) {
      return false;
    }
    self.set(key, value);
    true
  }

  /// Mutate a present entry in place, keeping its timestamp.
  pub fn update<Q>(&mut self, key: &Q, f: impl FnOnce(&mut V)) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    match self.entries.get_mut(key) {
      Some(entry) => {
        f(&mut entry.value);
        true
      }
      None => false,
    }
  }

  /// Drop `key` and bump its generation, present or not.
  pub fn invalidate<Q>(&mut self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
  {
    match self.generations.get_mut(key) {
      Some(generation) => *generation += 1,
      None => {
        self.generations.insert(key.to_owned(), 1);
      }
    }
    self.entries.remove(key).is_some()
  }

  pub fn clear(&mut self) {
    self.epoch += 1;
    self.generations.clear();
    self.entries.clear();
  }

  pub fn values(&self) -> impl Iterator<Item = &V> {
    self.entries.values().map(|entry| &entry.value)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
