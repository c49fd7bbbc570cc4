//! Entry point owning every store.
//!
//! Reads go straight to the stores. Mutations go through the manager, which
//! runs the store operation and then applies the invalidation plan for it.

use chrono::Utc;
use tokio::time::Duration;
use tracing::debug;

use crate::cache::{Cacheable, DEFAULT_TTL};
use crate::error::{Error, Result};
use crate::model::{Event, EventPatch, List, Priority, Tag, TagColor};
use crate::rpc::RpcClient;
use crate::store::{
  Bucket, ContentStore, EventStore, InvalidationPlan, ListStore, Mutation, TagScope, TagStore,
  TimelineStatus, TimelineStore,
};

/// Events per `list_content` page unless configured otherwise
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
  pub ttl: Duration,
  pub page_size: usize,
}

impl Default for CacheSettings {
  fn default() -> Self {
    Self {
      ttl: DEFAULT_TTL,
      page_size: DEFAULT_PAGE_SIZE,
    }
  }
}

#[derive(Clone)]
pub struct CacheManager {
  lists: ListStore,
  events: EventStore,
  content: ContentStore,
  tags: TagStore,
  timeline: TimelineStore,
}

impl CacheManager {
  pub fn new(client: RpcClient, settings: &CacheSettings) -> Self {
    let lists = ListStore::new(client.clone(), settings.ttl);
    Self {
      events: EventStore::new(client.clone(), lists.clone(), settings.ttl, settings.page_size),
      content: ContentStore::new(client.clone(), settings.ttl),
      tags: TagStore::new(client.clone(), settings.ttl),
      timeline: TimelineStore::new(client),
      lists,
    }
  }

  pub fn lists(&self) -> &ListStore {
    &self.lists
  }

  pub fn events(&self) -> &EventStore {
    &self.events
  }

  pub fn content(&self) -> &ContentStore {
    &self.content
  }

  pub fn tags(&self) -> &TagStore {
    &self.tags
  }

  pub fn timeline(&self) -> &TimelineStore {
    &self.timeline
  }

  // ===== Lists =====

  pub async fn create_list(&self, title: &str, icon: Option<&str>) -> Result<Vec<List>> {
    let view = self.lists.create_list(title, icon).await?;
    self.apply_for(Mutation::ListCreated).await;
    Ok(view)
  }

  pub async fn rename_list(&self, id: &str, title: &str) -> Result<()> {
    self.lists.rename_list(id, title).await?;
    self.apply_for(Mutation::ListRenamed).await;
    Ok(())
  }

  pub async fn delete_list(&self, id: &str) -> Result<()> {
    self.lists.delete_list(id).await?;
    self.apply_for(Mutation::ListDeleted { list_id: id }).await;
    Ok(())
  }

  // ===== Events =====

  /// Add an event and return the list's refreshed first page.
  ///
  /// Without a deadline the event is due now.
  pub async fn add_event(
    &self,
    list_id: &str,
    title: &str,
    priority: Priority,
    ddl: Option<&str>,
  ) -> Result<Vec<Event>> {
    let now = Utc::now().timestamp_millis().to_string();
    let ddl = ddl.unwrap_or(&now);
    self.events.add_event(list_id, title, priority, ddl).await?;
    self.apply_for(Mutation::EventAdded { list_id }).await;
    Ok(self.events.load(list_id, false).await.into_data())
  }

  pub async fn update_event(&self, event: &Event) -> Result<()> {
    let previous = self.events.event_by_id(&event.id);
    self.events.update_event(event).await?;
    self
      .apply_for(Mutation::EventUpdated {
        previous: previous.as_ref(),
        current: event,
      })
      .await;
    Ok(())
  }

  /// Merge `patch` into the cached event and send the result.
  pub async fn patch_event(&self, patch: &EventPatch) -> Result<Event> {
    let mut event = self
      .events
      .event_by_id(&patch.id)
      .ok_or_else(|| Error::not_found(Event::entity_type(), &patch.id))?;
    event.apply(patch);
    self.update_event(&event).await?;
    Ok(event)
  }

  pub async fn delete_event(&self, event_id: &str, list_id: &str) -> Result<()> {
    let known = self.events.event_by_id(event_id);
    self.events.delete_event(event_id).await?;
    self
      .apply_for(Mutation::EventDeleted {
        event_id,
        list_id,
        known: known.as_ref(),
      })
      .await;
    Ok(())
  }

  /// Update an event from the timeline. The timeline keeps its optimistic
  /// copy; every other cache holding the event is dropped.
  pub async fn update_timeline_event(&self, patch: &EventPatch, bucket: Bucket) -> Result<Event> {
    let update = self.timeline.update_event(patch, bucket).await?;
    let plan = InvalidationPlan::for_mutation(&Mutation::EventUpdated {
      previous: Some(&update.previous),
      current: &update.current,
    });
    self.apply(plan.without_timeline()).await;
    Ok(update.current)
  }

  pub async fn save_content(&self, event_id: &str, content: &str) -> Result<()> {
    self.content.save(event_id, content).await?;
    self.apply_for(Mutation::ContentSaved { event_id }).await;
    Ok(())
  }

  // ===== Tags =====

  /// Add a tag and return the refetched collection.
  pub async fn add_tag(&self, name: &str, color: TagColor) -> Result<Vec<Tag>> {
    self.tags.add_tag(name, color).await?;
    self.apply_for(Mutation::TagAdded).await;
    Ok(self.tags.fetch_tags().await.into_data())
  }

  /// Delete a tag and return the refetched collection.
  pub async fn delete_tag(&self, name: &str) -> Result<Vec<Tag>> {
    self.tags.delete_tag(name).await?;
    self.apply_for(Mutation::TagDeleted { name }).await;
    Ok(self.tags.fetch_tags().await.into_data())
  }

  // ===== Invalidation =====

  async fn apply_for(&self, mutation: Mutation<'_>) {
    self.apply(InvalidationPlan::for_mutation(&mutation)).await;
  }

  /// Drop everything `plan` names. A reset timeline that had been loaded is
  /// loaded again.
  pub async fn apply(&self, plan: InvalidationPlan) {
    if plan.is_empty() {
      return;
    }
    debug!(%plan, "Applying invalidation plan");

    for list_id in &plan.event_pages {
      self.events.invalidate(list_id);
    }
    for event_id in &plan.contents {
      self.content.invalidate(event_id);
    }
    if plan.tags {
      self.tags.invalidate_tags();
    }
    match &plan.tag_contents {
      TagScope::Nothing => {}
      TagScope::Named(names) => names.iter().for_each(|name| self.tags.invalidate_content(name)),
      TagScope::All => self.tags.invalidate_all_content(),
    }
    if plan.timeline {
      let loaded = self.timeline.status() != TimelineStatus::Uninitialized;
      self.timeline.clear();
      if loaded {
        self.timeline.fetch_events().await;
      }
    }
  }

  /// Drop every cache.
  pub fn clear(&self) {
    self.lists.clear();
    self.events.clear();
    self.content.clear();
    self.tags.clear();
    self.timeline.clear();
  }
}
