//! Tag collection and per-tag event caches.

use tokio::time::Duration;
use tracing::info;

use super::LastError;
use crate::cache::{CacheLayer, CacheResult};
use crate::error::Result;
use crate::model::{Event, Tag, TagColor};
use crate::rpc::RpcClient;

const STORE: &str = "tags";

#[derive(Clone)]
pub struct TagStore {
  client: RpcClient,
  tags: CacheLayer<(), Vec<Tag>>,
  contents: CacheLayer<String, Vec<Event>>,
  error: LastError,
}

impl TagStore {
  pub fn new(client: RpcClient, ttl: Duration) -> Self {
    Self {
      client,
      tags: CacheLayer::new(STORE, ttl),
      contents: CacheLayer::new("tag_content", ttl),
      error: LastError::default(),
    }
  }

  pub async fn fetch_tags(&self) -> CacheResult<Vec<Tag>> {
    let client = self.client.clone();
    match self
      .tags
      .fetch((), move || async move { client.get_tags().await })
      .await
    {
      Ok(result) => {
        self.error.clear();
        result
      }
      Err(err) => {
        self.error.record(STORE, "get_tags", &err);
        CacheResult::offline(self.tags())
      }
    }
  }

  /// Events carrying `name`.
  pub async fn tag_content(&self, name: &str) -> CacheResult<Vec<Event>> {
    let client = self.client.clone();
    let tag = name.to_string();
    match self
      .contents
      .fetch(name.to_string(), move || async move { client.tag_content(&tag).await })
      .await
    {
      Ok(result) => {
        self.error.clear();
        result
      }
      Err(err) => {
        self.error.record(STORE, "tag_content", &err);
        CacheResult::offline(self.contents.stale(name).unwrap_or_default())
      }
    }
  }

  pub async fn add_tag(&self, name: &str, color: TagColor) -> Result<()> {
    if let Err(err) = self.client.add_tag(name, color).await {
      self.error.record(STORE, "add_tag", &err);
      return Err(err);
    }
    self.error.clear();
    info!(tag = name, ?color, "Added tag");
    Ok(())
  }

  pub async fn delete_tag(&self, name: &str) -> Result<()> {
    if let Err(err) = self.client.delete_tag(name).await {
      self.error.record(STORE, "delete_tag", &err);
      return Err(err);
    }
    self.error.clear();
    info!(tag = name, "Deleted tag");
    Ok(())
  }

  /// Current view of the tag collection, whatever its age.
  pub fn tags(&self) -> Vec<Tag> {
    self.tags.stale(&()).unwrap_or_default()
  }

  pub fn tag_by_name(&self, name: &str) -> Option<Tag> {
    self.tags().into_iter().find(|tag| tag.name == name)
  }

  pub fn invalidate_tags(&self) {
    self.tags.invalidate(&());
  }

  pub fn invalidate_content(&self, name: &str) {
    self.contents.invalidate(name);
  }

  pub fn invalidate_all_content(&self) {
    self.contents.clear();
  }

  pub fn is_content_cached(&self, name: &str) -> bool {
    self.contents.get(name).is_some()
  }

  pub fn error(&self) -> Option<String> {
    self.error.get()
  }

  pub fn clear(&self) {
    self.tags.clear();
    self.contents.clear();
  }
}
