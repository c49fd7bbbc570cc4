//! Long-form event bodies, cached per event.

use tokio::time::Duration;
use tracing::info;

use super::LastError;
use crate::cache::{CacheLayer, CacheResult};
use crate::error::Result;
use crate::rpc::RpcClient;

const STORE: &str = "content";

#[derive(Clone)]
pub struct ContentStore {
  client: RpcClient,
  cache: CacheLayer<String, String>,
  error: LastError,
}

impl ContentStore {
  pub fn new(client: RpcClient, ttl: Duration) -> Self {
    Self {
      client,
      cache: CacheLayer::new(STORE, ttl),
      error: LastError::default(),
    }
  }

  /// Body of an event; on failure the last known body or an empty string.
  pub async fn get(&self, event_id: &str) -> CacheResult<String> {
    let client = self.client.clone();
    let uuid = event_id.to_string();
    match self
      .cache
      .fetch(event_id.to_string(), move || async move {
        client.event_content(&uuid).await
      })
      .await
    {
      Ok(result) => {
        self.error.clear();
        result
      }
      Err(err) => {
        self.error.record(STORE, "event_content", &err);
        CacheResult::offline(self.cache.stale(event_id).unwrap_or_default())
      }
    }
  }

  /// Write a body to the backend, then into the cache with a fresh
  /// timestamp. Nothing is cached when the write fails.
  pub async fn save(&self, event_id: &str, content: &str) -> Result<()> {
    if let Err(err) = self.client.write_content(event_id, content).await {
      self.error.record(STORE, "write_content", &err);
      return Err(err);
    }
    self.error.clear();
    self.cache.set(event_id.to_string(), content.to_string());
    info!(event_id, bytes = content.len(), "Saved content");
    Ok(())
  }

  pub fn invalidate(&self, event_id: &str) {
    self.cache.invalidate(event_id);
  }

  pub fn is_cached(&self, event_id: &str) -> bool {
    self.cache.get(event_id).is_some()
  }

  pub fn error(&self) -> Option<String> {
    self.error.get()
  }

  pub fn clear(&self) {
    self.cache.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, DEFAULT_TTL};
  use crate::rpc::mock::ScriptedTransport;
  use serde_json::json;

  #[tokio::test(start_paused = true)]
  async fn test_content_is_cached_per_event() {
    let transport = ScriptedTransport::new();
    transport.on("event_content", |args| Ok(json!(format!("body of {}", args["uuid"].as_str().unwrap_or("")))));
    let store = ContentStore::new(transport.client(), DEFAULT_TTL);

    assert_eq!(store.get("e1").await.data, "body of e1");
    assert_eq!(store.get("e1").await.source, CacheSource::CacheFresh);
    assert_eq!(store.get("e2").await.data, "body of e2");
    assert_eq!(transport.calls("event_content"), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_save_writes_through() {
    let transport = ScriptedTransport::new();
    transport.respond("write_content", ());
    let store = ContentStore::new(transport.client(), DEFAULT_TTL);

    store.save("e1", "# Notes").await.unwrap();
    let body = store.get("e1").await;

    assert_eq!(body, CacheResult::from_cache("# Notes".to_string()));
    assert_eq!(transport.calls("event_content"), 0);
    assert_eq!(
      transport.last_args("write_content"),
      Some(json!({ "uuid": "e1", "content": "# Notes" }))
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_save_is_an_error_and_caches_nothing() {
    let transport = ScriptedTransport::new();
    transport.fail("write_content", "disk full");
    let store = ContentStore::new(transport.client(), DEFAULT_TTL);

    assert!(store.save("e1", "draft").await.is_err());
    assert!(!store.is_cached("e1"));
    assert!(store.error().unwrap().contains("disk full"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_read_serves_last_body() {
    let transport = ScriptedTransport::new();
    transport.respond("event_content", "old body");
    let store = ContentStore::new(transport.client(), DEFAULT_TTL);
    store.get("e1").await;

    tokio::time::advance(DEFAULT_TTL).await;
    transport.fail("event_content", "offline");
    assert_eq!(store.get("e1").await, CacheResult::offline("old body".to_string()));
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidated_body_is_refetched() {
    let transport = ScriptedTransport::new();
    transport.respond("event_content", "old body");
    let store = ContentStore::new(transport.client(), DEFAULT_TTL);
    store.get("e1").await;

    store.invalidate("e1");
    transport.fail("event_content", "offline");
    assert_eq!(store.get("e1").await, CacheResult::offline(String::new()));

    transport.respond("event_content", "new body");
    assert_eq!(store.get("e1").await.data, "new body");
    assert_eq!(transport.calls("event_content"), 3);
  }
}
