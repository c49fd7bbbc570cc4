//! List collection cache.

use tokio::time::Duration;
use tracing::{debug, info};

use super::LastError;
use crate::cache::{position_of, CacheLayer, CacheResult, Cacheable};
use crate::error::{Error, Result};
use crate::model::{List, DEFAULT_LIST_ICON};
use crate::rpc::RpcClient;

const STORE: &str = "lists";

/// Caches the full collection of lists as one entry.
///
/// Renames and deletes are applied locally first and restored if the
/// backend rejects them.
#[derive(Clone)]
pub struct ListStore {
  client: RpcClient,
  cache: CacheLayer<(), Vec<List>>,
  error: LastError,
}

impl ListStore {
  pub fn new(client: RpcClient, ttl: Duration) -> Self {
    Self {
      client,
      cache: CacheLayer::new(STORE, ttl),
      error: LastError::default(),
    }
  }

  /// All lists, from cache while valid.
  ///
  /// On failure the last cached collection (or nothing) is served as
  /// offline data and the error is recorded.
  pub async fn fetch_lists(&self) -> CacheResult<Vec<List>> {
    let client = self.client.clone();
    match self
      .cache
      .fetch((), move || async move { client.get_lists().await })
      .await
    {
      Ok(result) => {
        self.error.clear();
        result
      }
      Err(err) => {
        self.error.record(STORE, "get_lists", &err);
        CacheResult::offline(self.lists())
      }
    }
  }

  /// Drop the cached collection and fetch it again.
  pub async fn refresh(&self) -> CacheResult<Vec<List>> {
    self.cache.invalidate(&());
    self.fetch_lists().await
  }

  /// Current view of the collection, whatever its age.
  pub fn lists(&self) -> Vec<List> {
    self.cache.stale(&()).unwrap_or_default()
  }

  pub fn sorted_lists(&self) -> Vec<List> {
    let mut lists = self.lists();
    lists.sort_by(|a, b| a.title.cmp(&b.title));
    lists
  }

  pub fn list_by_id(&self, id: &str) -> Option<List> {
    self.lists().into_iter().find(|list| list.id == id)
  }

  /// Create a list and append it to the cached collection.
  ///
  /// Returns the updated view. When no collection is cached yet only the
  /// new list is returned and nothing is stored.
  pub async fn create_list(&self, title: &str, icon: Option<&str>) -> Result<Vec<List>> {
    let icon = icon.unwrap_or(DEFAULT_LIST_ICON);
    let created = self.client.new_list(title, icon).await.map_err(|err| {
      self.error.record(STORE, "new_list", &err);
      err
    })?;
    self.error.clear();
    info!(list_id = %created.id, title, "Created list");

    let mut view = None;
    self.cache.update(&(), |lists| {
      lists.push(created.clone());
      view = Some(lists.clone());
    });
    Ok(view.unwrap_or_else(|| vec![created]))
  }

  pub async fn rename_list(&self, id: &str, title: &str) -> Result<()> {
    let previous = self.known(id, "rename_list")?.title;
    self.set_title(id, title);

    if let Err(err) = self.client.rename_list(id, title).await {
      debug!(list_id = id, "Restoring title after failed rename");
      self.set_title(id, &previous);
      self.error.record(STORE, "rename_list", &err);
      return Err(err);
    }
    self.error.clear();
    Ok(())
  }

  pub async fn delete_list(&self, id: &str) -> Result<()> {
    let list = self.known(id, "delete_list")?;
    let mut removed_at = None;
    self.cache.update(&(), |lists| {
      if let Some(index) = position_of(lists, id) {
        lists.remove(index);
        removed_at = Some(index);
      }
    });

    if let Err(err) = self.client.delete_list(id).await {
      debug!(list_id = id, "Restoring list after failed delete");
      self.cache.update(&(), |lists| {
        let index = removed_at.unwrap_or(lists.len()).min(lists.len());
        lists.insert(index, list);
      });
      self.error.record(STORE, "delete_list", &err);
      return Err(err);
    }
    self.error.clear();
    info!(list_id = id, "Deleted list");
    Ok(())
  }

  pub fn error(&self) -> Option<String> {
    self.error.get()
  }

  pub fn clear(&self) {
    self.cache.clear();
  }

  fn known(&self, id: &str, operation: &str) -> Result<List> {
    self.list_by_id(id).ok_or_else(|| {
      let err = Error::not_found(List::entity_type(), id);
      self.error.record(STORE, operation, &err);
      err
    })
  }

  fn set_title(&self, id: &str, title: &str) {
    self.cache.update(&(), |lists| {
      if let Some(index) = position_of(lists, id) {
        lists[index].title = title.to_string();
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, DEFAULT_TTL};
  use crate::rpc::mock::{list, ScriptedTransport};
  use std::sync::Arc;

  fn store_with(lists: Vec<List>) -> (Arc<ScriptedTransport>, ListStore) {
    let transport = ScriptedTransport::new();
    transport.respond("get_lists", lists);
    let store = ListStore::new(transport.client(), DEFAULT_TTL);
    (transport, store)
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_lists_uses_cache_within_ttl() {
    let (transport, store) = store_with(vec![list("l1", "Home")]);

    assert_eq!(store.fetch_lists().await.source, CacheSource::Network);
    tokio::time::advance(DEFAULT_TTL - Duration::from_millis(1)).await;
    assert_eq!(store.fetch_lists().await.source, CacheSource::CacheFresh);
    assert_eq!(transport.calls("get_lists"), 1);

    tokio::time::advance(Duration::from_millis(2)).await;
    store.fetch_lists().await;
    assert_eq!(transport.calls("get_lists"), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_fetch_serves_stale_collection() {
    let (transport, store) = store_with(vec![list("l1", "Home")]);
    store.fetch_lists().await;

    tokio::time::advance(DEFAULT_TTL).await;
    transport.fail("get_lists", "backend down");
    let result = store.fetch_lists().await;

    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data, vec![list("l1", "Home")]);
    assert!(store.error().unwrap().contains("backend down"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_fetch_without_cache_is_empty() {
    let transport = ScriptedTransport::new();
    let store = ListStore::new(transport.client(), DEFAULT_TTL);

    let result = store.fetch_lists().await;
    assert_eq!(result, CacheResult::offline(Vec::new()));
    assert!(store.error().is_some());
  }

  #[tokio::test(start_paused = true)]
  async fn test_create_appends_without_refetch() {
    let (transport, store) = store_with(vec![list("l1", "Home")]);
    transport.respond("new_list", list("l2", "Work"));
    store.fetch_lists().await;

    let view = store.create_list("Work", None).await.unwrap();
    assert_eq!(view.len(), 2);
    assert_eq!(
      transport.last_args("new_list").unwrap()["icon"],
      DEFAULT_LIST_ICON
    );

    let lists = store.fetch_lists().await;
    assert_eq!(lists.source, CacheSource::CacheFresh);
    assert!(lists.data.iter().any(|l| l.title == "Work"));
    assert_eq!(transport.calls("get_lists"), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_create_without_cached_collection() {
    let transport = ScriptedTransport::new();
    transport.respond("new_list", list("l2", "Work"));
    let store = ListStore::new(transport.client(), DEFAULT_TTL);

    let view = store.create_list("Work", Some("mdi-briefcase")).await.unwrap();
    assert_eq!(view, vec![list("l2", "Work")]);
    assert!(store.lists().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_rename_updates_cache_in_place() {
    let (transport, store) = store_with(vec![list("l1", "Work")]);
    transport.respond("rename_list", ());
    store.fetch_lists().await;

    store.rename_list("l1", "Office").await.unwrap();

    let lists = store.fetch_lists().await;
    assert_eq!(lists.source, CacheSource::CacheFresh);
    assert_eq!(lists.data[0].title, "Office");
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_rename_restores_title() {
    let (transport, store) = store_with(vec![list("l1", "Work")]);
    transport.fail("rename_list", "locked");
    store.fetch_lists().await;

    assert!(store.rename_list("l1", "Office").await.is_err());
    assert_eq!(store.list_by_id("l1").unwrap().title, "Work");
    assert!(store.error().is_some());
  }

  #[tokio::test(start_paused = true)]
  async fn test_unknown_list_fails_without_rpc() {
    let (transport, store) = store_with(vec![list("l1", "Work")]);
    store.fetch_lists().await;

    let rename = store.rename_list("nope", "x").await;
    let delete = store.delete_list("nope").await;

    assert_eq!(rename, Err(Error::not_found("list", "nope")));
    assert_eq!(delete, Err(Error::not_found("list", "nope")));
    assert_eq!(transport.calls("rename_list"), 0);
    assert_eq!(transport.calls("delete_list"), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_delete_reinserts_at_original_position() {
    let (transport, store) = store_with(vec![list("l1", "A"), list("l2", "B"), list("l3", "C")]);
    transport.fail("delete_list", "nope");
    store.fetch_lists().await;

    assert!(store.delete_list("l2").await.is_err());
    let ids: Vec<_> = store.lists().into_iter().map(|l| l.id).collect();
    assert_eq!(ids, ["l1", "l2", "l3"]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_delete_removes_locally() {
    let (transport, store) = store_with(vec![list("l1", "A"), list("l2", "B")]);
    transport.respond("delete_list", ());
    store.fetch_lists().await;

    store.delete_list("l1").await.unwrap();
    assert_eq!(store.lists(), vec![list("l2", "B")]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_sorted_lists_by_title() {
    let (_transport, store) = store_with(vec![list("l1", "Work"), list("l2", "Errands")]);
    store.fetch_lists().await;

    let titles: Vec<_> = store.sorted_lists().into_iter().map(|l| l.title).collect();
    assert_eq!(titles, ["Errands", "Work"]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_fetches_share_one_call() {
    let (transport, store) = store_with(vec![list("l1", "Home")]);
    transport.set_delay(Duration::from_millis(20));

    let (a, b) = tokio::join!(store.fetch_lists(), store.fetch_lists());
    assert_eq!(a.data, b.data);
    assert_eq!(transport.calls("get_lists"), 1);
  }
}
