//! Per-list paginated event cache.

use std::sync::{Arc, Mutex};

use tokio::time::Duration;
use tracing::{debug, info};

use super::{LastError, ListStore};
use crate::cache::{lock, CacheLayer, CacheResult, CacheSource, Cacheable, Generation, InFlight, TtlCache};
use crate::error::{Error, Result};
use crate::model::{Event, List, Priority};
use crate::rpc::RpcClient;

const STORE: &str = "events";

/// Cached pages of one list.
///
/// `data` is the contiguous union of pages `1..=current_page`, every page
/// holding `page_size` events except possibly the last.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPage {
  pub data: Vec<Event>,
  pub has_more: bool,
  pub page_size: usize,
  pub current_page: usize,
}

impl EventPage {
  fn first(data: Vec<Event>, page_size: usize) -> Self {
    Self {
      has_more: data.len() == page_size,
      data,
      page_size,
      current_page: 1,
    }
  }

  /// Events of one page, 1-based.
  fn slice(&self, page: usize) -> Vec<Event> {
    self
      .data
      .iter()
      .skip((page - 1) * self.page_size)
      .take(self.page_size)
      .cloned()
      .collect()
  }

  /// Drop everything past the first page.
  fn rewind(&mut self) {
    if self.current_page > 1 {
      self.data.truncate(self.page_size);
      self.current_page = 1;
      self.has_more = true;
    }
  }

  /// Whether this entry holds every page before `page` in full.
  fn precedes(&self, page: usize) -> bool {
    self.current_page + 1 >= page && self.data.len() >= (page - 1) * self.page_size
  }
}

/// Paging position of a list as seen by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
  pub current_page: usize,
  pub has_more: bool,
}

impl Default for PageInfo {
  fn default() -> Self {
    Self {
      current_page: 0,
      has_more: true,
    }
  }
}

#[derive(Clone)]
pub struct EventStore {
  client: RpcClient,
  lists: ListStore,
  pages: CacheLayer<String, EventPage>,
  inflight: Arc<InFlight<(String, usize), Vec<Event>>>,
  page_size: usize,
  search_results: Arc<Mutex<Vec<Event>>>,
  error: LastError,
}

impl EventStore {
  pub fn new(client: RpcClient, lists: ListStore, ttl: Duration, page_size: usize) -> Self {
    Self {
      client,
      lists,
      pages: CacheLayer::new(STORE, ttl),
      inflight: Arc::new(InFlight::new()),
      page_size,
      search_results: Arc::new(Mutex::new(Vec::new())),
      error: LastError::default(),
    }
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  /// One page of a list's events.
  ///
  /// Without `load_more` this is a refresh from the first page. Pages the
  /// valid entry already holds are served from it; anything else goes to
  /// the backend and is merged per [`EventPage`]'s invariant. A page that
  /// would leave a gap is returned but not cached.
  pub async fn fetch_page(&self, list_id: &str, page: usize, load_more: bool) -> CacheResult<Vec<Event>> {
    let page = if load_more { page.max(1) } else { 1 };

    let generation = {
      let cached = self.pages.with(|cache| {
        let entry = cache.get(list_id);
        (entry, cache.generation(list_id))
      });
      match cached {
        (Some(entry), _) if page <= entry.current_page => {
          return CacheResult::from_cache(entry.slice(page));
        }
        (_, generation) => generation,
      }
    };

    let client = self.client.clone();
    let listid = list_id.to_string();
    let page_size = self.page_size;
    let fetched = self
      .inflight
      .run((list_id.to_string(), page), move || async move {
        client.list_content(&listid, page, page_size).await
      })
      .await;

    match fetched {
      Ok(events) => {
        self.error.clear();
        self
          .pages
          .with(|cache| self.merge(cache, generation, list_id, page, load_more, &events));
        CacheResult::from_network(events)
      }
      Err(err) => {
        self.error.record(STORE, "list_content", &err);
        let fallback = self
          .pages
          .stale(list_id)
          .filter(|entry| page <= entry.current_page)
          .map(|entry| entry.slice(page))
          .unwrap_or_default();
        CacheResult::offline(fallback)
      }
    }
  }

  fn merge(
    &self,
    cache: &mut TtlCache<String, EventPage>,
    generation: Generation,
    list_id: &str,
    page: usize,
    load_more: bool,
    events: &[Event],
  ) {
    if cache.generation(list_id) != generation {
      debug!(list_id, page, "Discarding page that raced an invalidation");
      return;
    }

    let entry = match cache.get(list_id) {
      Some(mut entry) if load_more && page > 1 && entry.precedes(page) => {
        entry.data.truncate((page - 1) * self.page_size);
        entry.data.extend_from_slice(events);
        entry.current_page = page;
        entry.has_more = events.len() == self.page_size;
        entry
      }
      _ if page == 1 => EventPage::first(events.to_vec(), self.page_size),
      _ => {
        debug!(list_id, page, "Page does not follow the cached ones, not caching");
        return;
      }
    };
    cache.set(list_id.to_string(), entry);
  }

  /// Load the next page and return every event cached for the list, or
  /// without `load_more` go back to the first page and return only it.
  ///
  /// Going back keeps the entry's age but forgets the later pages, so the
  /// next `load_more` asks the backend for page 2 again.
  pub async fn load(&self, list_id: &str, load_more: bool) -> CacheResult<Vec<Event>> {
    if !load_more {
      let result = self.fetch_page(list_id, 1, false).await;
      if result.source == CacheSource::CacheFresh {
        self.pages.update(list_id, EventPage::rewind);
      }
      return result;
    }

    let page = self.page_info(list_id).current_page + 1;
    let result = self.fetch_page(list_id, page, load_more).await;
    let merged = match result.source {
      CacheSource::Offline => self.pages.stale(list_id),
      _ => self.pages.get(list_id),
    };
    result.map(|fetched| merged.map(|entry| entry.data).unwrap_or(fetched))
  }

  pub fn page_info(&self, list_id: &str) -> PageInfo {
    self
      .pages
      .get(list_id)
      .map(|entry| PageInfo {
        current_page: entry.current_page,
        has_more: entry.has_more,
      })
      .unwrap_or_default()
  }

  /// Cached events of a list, whatever their age.
  pub fn events(&self, list_id: &str) -> Vec<Event> {
    self
      .pages
      .stale(list_id)
      .map(|entry| entry.data)
      .unwrap_or_default()
  }

  /// Find an event in any cached list.
  pub fn event_by_id(&self, id: &str) -> Option<Event> {
    self.pages.with(|cache| {
      cache
        .values()
        .flat_map(|entry| entry.data.iter())
        .find(|event| event.id == id)
        .cloned()
    })
  }

  /// Add an event to a list the client knows about.
  ///
  /// An unknown list triggers one refetch of the lists before giving up with
  /// [`Error::NotFound`].
  pub async fn add_event(&self, list_id: &str, title: &str, priority: Priority, ddl: &str) -> Result<()> {
    if self.lists.list_by_id(list_id).is_none() {
      debug!(list_id, "List unknown locally, refetching lists");
      self.lists.refresh().await;
      if self.lists.list_by_id(list_id).is_none() {
        let err = Error::not_found(List::entity_type(), list_id);
        self.error.record(STORE, "add_event", &err);
        return Err(err);
      }
    }

    self.record(
      "add_event",
      self.client.add_event(list_id, title, priority, ddl).await,
    )?;
    info!(list_id, title, "Added event");
    Ok(())
  }

  pub async fn update_event(&self, event: &Event) -> Result<()> {
    self.record("update_event", self.client.update_event(event).await)?;
    info!(event_id = %event.id, list_id = %event.listid, "Updated event");
    Ok(())
  }

  pub async fn delete_event(&self, event_id: &str) -> Result<()> {
    self.record("delete_event", self.client.delete_event(event_id).await)?;
    info!(event_id, "Deleted event");
    Ok(())
  }

  /// Free-text search. Results replace the current result set and are
  /// never cached; a blank query clears it without a backend call.
  pub async fn search(&self, query: &str) -> Vec<Event> {
    let query = query.trim();
    let results = if query.is_empty() {
      Vec::new()
    } else {
      match self.client.search_events(query).await {
        Ok(events) => {
          self.error.clear();
          events
        }
        Err(err) => {
          self.error.record(STORE, "search", &err);
          Vec::new()
        }
      }
    };
    *lock(&self.search_results, STORE) = results.clone();
    results
  }

  pub fn search_results(&self) -> Vec<Event> {
    lock(&self.search_results, STORE).clone()
  }

  /// Drop a list's pages and detach its page fetches.
  pub fn invalidate(&self, list_id: &str) {
    self.pages.invalidate(list_id);
    self.inflight.forget_where(|(id, _)| id == list_id);
  }

  pub fn is_cached(&self, list_id: &str) -> bool {
    self.pages.with(|cache| cache.peek(list_id).is_some())
  }

  pub fn error(&self) -> Option<String> {
    self.error.get()
  }

  pub fn clear(&self) {
    self.pages.clear();
    self.inflight.forget_all();
    lock(&self.search_results, STORE).clear();
  }

  fn record<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
    match &result {
      Ok(_) => self.error.clear(),
      Err(err) => self.error.record(STORE, operation, err),
    }
    result
  }
}
