//! Entities exchanged with the backend.
//!
//! Field names follow the backend's wire format so these types deserialize
//! straight from RPC responses.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Cacheable;

/// Icon used for lists created without an explicit one
pub const DEFAULT_LIST_ICON: &str = "mdi-format-list-bulleted";

/// Deadline marker the backend uses for events without one
const UNDEFINED_DDL: &str = "Undefined";

/// A list of events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
  pub id: String,
  pub title: String,
  pub icon: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
  High,
  #[default]
  Medium,
  Low,
  Undefined,
}

impl Priority {
  /// Sort weight, higher first
  pub fn weight(self) -> u8 {
    match self {
      Priority::High => 3,
      Priority::Medium => 2,
      Priority::Low => 1,
      Priority::Undefined => 0,
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Priority::High => "High",
      Priority::Medium => "Medium",
      Priority::Low => "Low",
      Priority::Undefined => "Undefined",
    };
    f.write_str(name)
  }
}

impl FromStr for Priority {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "high" => Ok(Priority::High),
      "medium" => Ok(Priority::Medium),
      "low" => Ok(Priority::Low),
      "undefined" | "none" => Ok(Priority::Undefined),
      other => Err(format!("unknown priority '{}'", other)),
    }
  }
}

/// An event as listed by the backend. The long-form body is fetched
/// separately through the content cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
  pub id: String,
  pub listid: String,
  #[serde(default)]
  pub tag: Option<Vec<String>>,
  pub title: String,
  /// Creation time, millisecond timestamp
  pub create: String,
  /// Deadline, millisecond timestamp or "Undefined"
  pub ddl: String,
  pub finished: bool,
  pub priority: Priority,
  pub icon: String,
  pub color: String,
}

impl Event {
  pub fn tags(&self) -> &[String] {
    self.tag.as_deref().unwrap_or(&[])
  }

  pub fn has_deadline(&self) -> bool {
    self.deadline().is_some()
  }

  /// Parsed deadline, if the event has one
  pub fn deadline(&self) -> Option<DateTime<Utc>> {
    if self.ddl == UNDEFINED_DDL {
      return None;
    }
    let millis = self.ddl.parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
  }

  /// Merge a partial update into this event.
  ///
  /// `id` and `create` are owned by the backend and never change. Every
  /// other field is replaced only when the patch carries a value; an empty
  /// tag set is stored as no tags.
  pub fn apply(&mut self, patch: &EventPatch) {
    if let Some(listid) = &patch.listid {
      self.listid = listid.clone();
    }
    if let Some(title) = &patch.title {
      self.title = title.clone();
    }
    if let Some(ddl) = &patch.ddl {
      self.ddl = ddl.clone();
    }
    if let Some(finished) = patch.finished {
      self.finished = finished;
    }
    if let Some(priority) = patch.priority {
      self.priority = priority;
    }
    if let Some(icon) = &patch.icon {
      self.icon = icon.clone();
    }
    if let Some(color) = &patch.color {
      self.color = color.clone();
    }
    if let Some(tags) = &patch.tags {
      self.tag = if tags.is_empty() {
        None
      } else {
        Some(tags.clone())
      };
    }
  }
}

/// Partial update for an [`Event`], see [`Event::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
  pub id: String,
  pub listid: Option<String>,
  pub title: Option<String>,
  pub ddl: Option<String>,
  pub finished: Option<bool>,
  pub priority: Option<Priority>,
  pub icon: Option<String>,
  pub color: Option<String>,
  pub tags: Option<Vec<String>>,
}

impl EventPatch {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      ..Default::default()
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagColor {
  Primary,
  Secondary,
  // Older backends spell it "Sucess"
  #[serde(alias = "Sucess")]
  Success,
  Info,
  Warning,
  Error,
}

impl FromStr for TagColor {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "primary" => Ok(TagColor::Primary),
      "secondary" => Ok(TagColor::Secondary),
      "success" => Ok(TagColor::Success),
      "info" => Ok(TagColor::Info),
      "warning" => Ok(TagColor::Warning),
      "error" => Ok(TagColor::Error),
      other => Err(format!("unknown tag color '{}'", other)),
    }
  }
}

/// A free-form tag, keyed by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
  pub name: String,
  pub color: TagColor,
}

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for List {
  fn cache_key(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "list"
  }
}

impl Cacheable for Event {
  fn cache_key(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "event"
  }
}

impl Cacheable for Tag {
  fn cache_key(&self) -> &str {
    &self.name
  }

  fn entity_type() -> &'static str {
    "tag"
  }
}
