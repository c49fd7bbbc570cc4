//! Coalescing of concurrent fetches for the same key.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::trace;

use super::lock::lock;
use crate::error::Result;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T>>>;

struct Pending<K, T> {
  next_id: u64,
  fetches: HashMap<K, (u64, SharedFetch<T>)>,
}

/// Map of pending operations keyed by what they fetch.
///
/// The first caller for a key starts the operation; callers arriving while it
/// is pending await the same shared future and receive a clone of its result.
pub struct InFlight<K, T> {
  pending: Mutex<Pending<K, T>>,
}

impl<K, T> Default for InFlight<K, T> {
  fn default() -> Self {
    Self {
      pending: Mutex::new(Pending {
        next_id: 0,
        fetches: HashMap::new(),
      }),
    }
  }
}

impl<K, T> InFlight<K, T>
where
  K: Eq + Hash + Clone,
  T: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Run `start()` for `key`, or join the operation already running for it.
  pub async fn run<F, Fut>(&self, key: K, start: F) -> Result<T>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let (id, fetch) = {
      let mut pending = lock(&self.pending, "inflight");
      match pending.fetches.get(&key) {
        Some((id, fetch)) => {
          trace!("joining in-flight fetch");
          (*id, fetch.clone())
        }
        None => {
          let id = pending.next_id;
          pending.next_id += 1;
          let fetch = start().boxed().shared();
          pending.fetches.insert(key.clone(), (id, fetch.clone()));
          (id, fetch)
        }
      }
    };

    let result = fetch.await;

    let mut pending = lock(&self.pending, "inflight");
    if matches!(pending.fetches.get(&key), Some((current, _)) if *current == id) {
      pending.fetches.remove(&key);
    }
    result
  }

  /// Detach the pending operation for `key` so the next caller starts anew.
  ///
  /// Callers already waiting on it still receive its result.
  pub fn forget<Q>(&self, key: &Q)
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    lock(&self.pending, "inflight").fetches.remove(key);
  }

  pub fn forget_where(&self, mut predicate: impl FnMut(&K) -> bool) {
    lock(&self.pending, "inflight")
      .fetches
      .retain(|key, _| !predicate(key));
  }

  pub fn forget_all(&self) {
    lock(&self.pending, "inflight").fetches.clear();
  }

  pub fn is_pending<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    lock(&self.pending, "inflight").fetches.contains_key(key)
  }
}
