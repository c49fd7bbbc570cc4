//! Date-bucketed view across all lists.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{debug, info};

use super::LastError;
use crate::cache::{lock, Cacheable, InFlight};
use crate::error::{Error, Result};
use crate::model::{Event, EventPatch};
use crate::rpc::RpcClient;

const STORE: &str = "timeline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
  Today,
  Tomorrow,
  ThisWeek,
  NextWeek,
  Overdue,
}

impl Bucket {
  /// Every bucket, in display order
  pub const ALL: [Bucket; 5] = [
    Bucket::Today,
    Bucket::Tomorrow,
    Bucket::ThisWeek,
    Bucket::NextWeek,
    Bucket::Overdue,
  ];

  /// Name the backend filters by
  pub fn filter(self) -> &'static str {
    match self {
      Bucket::Today => "today",
      Bucket::Tomorrow => "tomorrow",
      Bucket::ThisWeek => "this_week",
      Bucket::NextWeek => "next_week",
      Bucket::Overdue => "overdue",
    }
  }

  pub fn title(self) -> &'static str {
    match self {
      Bucket::Today => "Today",
      Bucket::Tomorrow => "Tomorrow",
      Bucket::ThisWeek => "This week",
      Bucket::NextWeek => "Next week",
      Bucket::Overdue => "Overdue",
    }
  }
}

impl fmt::Display for Bucket {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.filter())
  }
}

impl FromStr for Bucket {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    let name = s.trim().to_lowercase().replace('-', "_");
    Bucket::ALL
      .into_iter()
      .find(|bucket| bucket.filter() == name)
      .ok_or_else(|| format!("unknown bucket '{}'", s))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineStatus {
  Uninitialized,
  Loading,
  Ready,
}

/// An event before and after a timeline update.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
  pub previous: Event,
  pub current: Event,
}

struct State {
  status: TimelineStatus,
  buckets: HashMap<Bucket, Vec<Event>>,
  /// Bumped on every reset so a fetch started before it cannot land
  generation: u64,
}

/// Events grouped by deadline bucket, loaded once and kept until reset.
///
/// Buckets load in parallel and fail independently: a failed bucket is
/// empty and recorded in the error, and the timeline still becomes ready.
#[derive(Clone)]
pub struct TimelineStore {
  client: RpcClient,
  state: Arc<Mutex<State>>,
  inflight: Arc<InFlight<u64, ()>>,
  error: LastError,
}

impl TimelineStore {
  pub fn new(client: RpcClient) -> Self {
    Self {
      client,
      state: Arc::new(Mutex::new(State {
        status: TimelineStatus::Uninitialized,
        buckets: HashMap::new(),
        generation: 0,
      })),
      inflight: Arc::new(InFlight::new()),
      error: LastError::default(),
    }
  }

  pub fn status(&self) -> TimelineStatus {
    lock(&self.state, STORE).status
  }

  /// Load every bucket unless already loaded. Concurrent callers share one
  /// load.
  pub async fn fetch_events(&self) {
    let generation = {
      let mut state = lock(&self.state, STORE);
      if state.status == TimelineStatus::Ready {
        return;
      }
      state.status = TimelineStatus::Loading;
      state.generation
    };

    let client = self.client.clone();
    let state = Arc::clone(&self.state);
    let error = self.error.clone();
    let loaded = self
      .inflight
      .run(generation, move || async move {
        error.clear();
        let fetches = Bucket::ALL.into_iter().map(|bucket| {
          let client = client.clone();
          async move { (bucket, client.filter_events(bucket.filter()).await) }
        });

        let mut buckets = HashMap::new();
        for (bucket, result) in join_all(fetches).await {
          let events = result.unwrap_or_else(|err| {
            error.record(STORE, bucket.filter(), &err);
            Vec::new()
          });
          buckets.insert(bucket, events);
        }

        let mut state = lock(&state, STORE);
        if state.generation != generation {
          debug!("Discarding timeline load that raced a reset");
          return Ok(());
        }
        state.buckets = buckets;
        state.status = TimelineStatus::Ready;
        Ok(())
      })
      .await;

    if let Err(err) = loaded {
      self.error.record(STORE, "fetch_events", &err);
    }
  }

  /// Drop every bucket; the next [`fetch_events`](Self::fetch_events)
  /// reloads them.
  pub fn clear(&self) {
    let mut state = lock(&self.state, STORE);
    state.status = TimelineStatus::Uninitialized;
    state.buckets.clear();
    state.generation += 1;
    drop(state);
    self.inflight.forget_all();
  }

  pub fn group_items(&self, bucket: Bucket) -> Vec<Event> {
    lock(&self.state, STORE)
      .buckets
      .get(&bucket)
      .cloned()
      .unwrap_or_default()
  }

  /// Every bucket's events, in bucket order.
  pub fn all_events(&self) -> Vec<Event> {
    let state = lock(&self.state, STORE);
    Bucket::ALL
      .iter()
      .filter_map(|bucket| state.buckets.get(bucket))
      .flatten()
      .cloned()
      .collect()
  }

  /// Buckets holding at least one event, in bucket order.
  pub fn visible_buckets(&self) -> Vec<Bucket> {
    let state = lock(&self.state, STORE);
    Bucket::ALL
      .into_iter()
      .filter(|bucket| state.buckets.get(bucket).is_some_and(|events| !events.is_empty()))
      .collect()
  }

  /// Highest priority first; ties keep their order.
  pub fn sort_by_priority(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by_key(|event| std::cmp::Reverse(event.priority.weight()));
    events
  }

  /// Events due on `date`. Not cached.
  pub async fn events_on(&self, date: NaiveDate) -> Vec<Event> {
    let filter = date.format("%Y-%m-%d").to_string();
    match self.client.filter_events(&filter).await {
      Ok(events) => events,
      Err(err) => {
        self.error.record(STORE, "events_on", &err);
        Vec::new()
      }
    }
  }

  /// Apply `patch` to the event in `bucket` and send the result to the
  /// backend, restoring the previous event if the backend rejects it.
  pub async fn update_event(&self, patch: &EventPatch, bucket: Bucket) -> Result<AppliedUpdate> {
    let (update, generation) = {
      let mut state = lock(&self.state, STORE);
      let generation = state.generation;
      let entry = state
        .buckets
        .get_mut(&bucket)
        .and_then(|events| events.iter_mut().find(|event| event.id == patch.id));
      match entry {
        Some(entry) => {
          let previous = entry.clone();
          entry.apply(patch);
          let current = entry.clone();
          (AppliedUpdate { previous, current }, generation)
        }
        None => {
          let err = Error::not_found(Event::entity_type(), &patch.id);
          self.error.record(STORE, "update_event", &err);
          return Err(err);
        }
      }
    };

    if let Err(err) = self.client.update_event(&update.current).await {
      debug!(event_id = %patch.id, %bucket, "Rolling back timeline update");
      self.restore(bucket, generation, &update.previous);
      self.error.record(STORE, "update_event", &err);
      return Err(err);
    }
    self.error.clear();
    info!(event_id = %patch.id, %bucket, "Updated event from timeline");
    Ok(update)
  }

  fn restore(&self, bucket: Bucket, generation: u64, previous: &Event) {
    let mut state = lock(&self.state, STORE);
    if state.generation != generation {
      return;
    }
    if let Some(entry) = state
      .buckets
      .get_mut(&bucket)
      .and_then(|events| events.iter_mut().find(|event| event.id == previous.id))
    {
      *entry = previous.clone();
    }
  }

  pub fn error(&self) -> Option<String> {
    self.error.get()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Priority;
  use crate::rpc::mock::{event, ScriptedTransport};
  use serde_json::{json, Value};
  use std::sync::Arc;
  use tokio::time::Duration;

  /// Each bucket answers with one event whose id is the bucket's filter.
  fn script_buckets(transport: &Arc<ScriptedTransport>) {
    transport.on("filter_events", |args: &Value| {
      let filter = args["filter"].as_str().unwrap_or_default();
      Ok(serde_json::to_value(vec![event(filter, "l1")]).unwrap())
    });
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_loads_every_bucket_once() {
    let transport = ScriptedTransport::new();
    script_buckets(&transport);
    let timeline = TimelineStore::new(transport.client());
    assert_eq!(timeline.status(), TimelineStatus::Uninitialized);

    timeline.fetch_events().await;
    timeline.fetch_events().await;

    assert_eq!(timeline.status(), TimelineStatus::Ready);
    assert_eq!(transport.calls("filter_events"), 5);
    assert_eq!(timeline.group_items(Bucket::NextWeek)[0].id, "next_week");
    assert_eq!(timeline.visible_buckets(), Bucket::ALL.to_vec());
    assert_eq!(timeline.all_events().len(), 5);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_bucket_is_isolated() {
    let transport = ScriptedTransport::new();
    transport.on("filter_events", |args: &Value| {
      let filter = args["filter"].as_str().unwrap_or_default();
      if filter == "overdue" {
        return Err(Error::backend("filter_events", "overdue index broken"));
      }
      Ok(serde_json::to_value(vec![event(filter, "l1")]).unwrap())
    });
    let timeline = TimelineStore::new(transport.client());

    timeline.fetch_events().await;

    assert_eq!(timeline.status(), TimelineStatus::Ready);
    assert!(timeline.group_items(Bucket::Overdue).is_empty());
    assert_eq!(timeline.group_items(Bucket::Today).len(), 1);
    assert!(!timeline.visible_buckets().contains(&Bucket::Overdue));
    assert!(timeline.error().unwrap().contains("overdue"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_fetches_share_one_load() {
    let transport = ScriptedTransport::new();
    script_buckets(&transport);
    transport.set_delay(Duration::from_millis(10));
    let timeline = TimelineStore::new(transport.client());

    tokio::join!(timeline.fetch_events(), timeline.fetch_events());
    assert_eq!(transport.calls("filter_events"), 5);
  }

  #[tokio::test(start_paused = true)]
  async fn test_clear_forces_reload() {
    let transport = ScriptedTransport::new();
    script_buckets(&transport);
    let timeline = TimelineStore::new(transport.client());

    timeline.fetch_events().await;
    timeline.clear();
    assert_eq!(timeline.status(), TimelineStatus::Uninitialized);
    assert!(timeline.all_events().is_empty());

    timeline.fetch_events().await;
    assert_eq!(transport.calls("filter_events"), 10);
  }

  #[tokio::test(start_paused = true)]
  async fn test_update_applies_patch() {
    let transport = ScriptedTransport::new();
    script_buckets(&transport);
    transport.respond("update_event", ());
    let timeline = TimelineStore::new(transport.client());
    timeline.fetch_events().await;

    let patch = EventPatch {
      finished: Some(true),
      ..EventPatch::new("today")
    };
    let update = timeline.update_event(&patch, Bucket::Today).await.unwrap();

    assert!(!update.previous.finished);
    assert!(update.current.finished);
    assert!(timeline.group_items(Bucket::Today)[0].finished);
    assert_eq!(transport.last_args("update_event").unwrap()["fEvent"]["finished"], json!(true));
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_update_rolls_back() {
    let transport = ScriptedTransport::new();
    script_buckets(&transport);
    transport.fail("update_event", "rejected");
    let timeline = TimelineStore::new(transport.client());
    timeline.fetch_events().await;

    let patch = EventPatch {
      title: Some("Renamed".to_string()),
      ..EventPatch::new("today")
    };
    assert!(timeline.update_event(&patch, Bucket::Today).await.is_err());
    assert_eq!(timeline.group_items(Bucket::Today)[0].title, "Event today");
  }

  #[tokio::test(start_paused = true)]
  async fn test_update_of_missing_event_skips_backend() {
    let transport = ScriptedTransport::new();
    script_buckets(&transport);
    let timeline = TimelineStore::new(transport.client());
    timeline.fetch_events().await;

    let err = timeline
      .update_event(&EventPatch::new("today"), Bucket::Tomorrow)
      .await
      .unwrap_err();
    assert_eq!(err, Error::not_found("event", "today"));
    assert_eq!(transport.calls("update_event"), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_events_on_uses_date_filter() {
    let transport = ScriptedTransport::new();
    transport.respond("filter_events", vec![event("e1", "l1")]);
    let timeline = TimelineStore::new(transport.client());

    let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
    assert_eq!(timeline.events_on(date).await.len(), 1);
    assert_eq!(
      transport.last_args("filter_events"),
      Some(json!({ "filter": "2024-03-09" }))
    );
  }

  #[test]
  fn test_sort_by_priority_is_stable() {
    let mut low = event("a", "l1");
    low.priority = Priority::Low;
    let mut high = event("b", "l1");
    high.priority = Priority::High;
    let medium = event("c", "l1");
    let also_high = Event {
      id: "d".to_string(),
      ..high.clone()
    };

    let sorted = TimelineStore::sort_by_priority(vec![low, high, medium, also_high]);
    let ids: Vec<_> = sorted.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["b", "d", "c", "a"]);
  }

  #[test]
  fn test_bucket_from_str() {
    assert_eq!("next-week".parse::<Bucket>(), Ok(Bucket::NextWeek));
    assert_eq!("Overdue".parse::<Bucket>(), Ok(Bucket::Overdue));
    assert!("someday".parse::<Bucket>().is_err());
  }
}
