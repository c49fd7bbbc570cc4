//! Cross-entity invalidation rules.
//!
//! Every mutation maps to an [`InvalidationPlan`] naming the cache entries
//! that can no longer be trusted. Planning is pure; the manager applies
//! plans after the mutation's RPC has succeeded.

use std::collections::BTreeSet;
use std::fmt;

use crate::model::Event;

/// A successful change to backend state.
#[derive(Debug, Clone, Copy)]
pub enum Mutation<'a> {
  ListCreated,
  ListRenamed,
  ListDeleted {
    list_id: &'a str,
  },
  EventAdded {
    list_id: &'a str,
  },
  /// `previous` is the event as cached before the update, if it was.
  EventUpdated {
    previous: Option<&'a Event>,
    current: &'a Event,
  },
  /// `known` is the deleted event as cached, if it was.
  EventDeleted {
    event_id: &'a str,
    list_id: &'a str,
    known: Option<&'a Event>,
  },
  ContentSaved {
    event_id: &'a str,
  },
  TagAdded,
  TagDeleted {
    name: &'a str,
  },
}

/// Which per-tag event caches to drop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagScope {
  #[default]
  Nothing,
  Named(BTreeSet<String>),
  All,
}

impl TagScope {
  fn named<'a>(names: impl IntoIterator<Item = &'a String>) -> Self {
    let names: BTreeSet<String> = names.into_iter().cloned().collect();
    if names.is_empty() {
      TagScope::Nothing
    } else {
      TagScope::Named(names)
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
  /// Lists whose event pages are dropped
  pub event_pages: BTreeSet<String>,
  /// Events whose content is dropped
  pub contents: BTreeSet<String>,
  /// Drop the tag collection
  pub tags: bool,
  pub tag_contents: TagScope,
  /// Reset the timeline so its next read refetches every bucket
  pub timeline: bool,
}

impl InvalidationPlan {
  pub fn for_mutation(mutation: &Mutation<'_>) -> Self {
    let mut plan = Self::default();
    match *mutation {
      // The list store already reflects these locally
      Mutation::ListCreated | Mutation::ListRenamed => {}
      // Content is written through by the content store
      Mutation::ContentSaved { .. } => {}
      Mutation::ListDeleted { list_id } => {
        plan.event_pages.insert(list_id.to_string());
        plan.tag_contents = TagScope::All;
        plan.timeline = true;
      }
      Mutation::EventAdded { list_id } => {
        plan.event_pages.insert(list_id.to_string());
        plan.timeline = true;
      }
      Mutation::EventUpdated { previous, current } => {
        plan.event_pages.insert(current.listid.clone());
        plan.contents.insert(current.id.clone());
        plan.tag_contents = match previous {
          Some(previous) => {
            plan.event_pages.insert(previous.listid.clone());
            TagScope::named(previous.tags().iter().chain(current.tags()))
          }
          None => TagScope::All,
        };
        plan.timeline = true;
      }
      Mutation::EventDeleted {
        event_id,
        list_id,
        known,
      } => {
        plan.event_pages.insert(list_id.to_string());
        plan.contents.insert(event_id.to_string());
        plan.tag_contents = match known {
          Some(event) => TagScope::named(event.tags()),
          None => TagScope::All,
        };
        plan.timeline = true;
      }
      Mutation::TagAdded => plan.tags = true,
      Mutation::TagDeleted { name } => {
        plan.tags = true;
        plan.tag_contents = TagScope::named([&name.to_string()]);
      }
    }
    plan
  }

  /// The same plan minus the timeline reset, for updates the timeline
  /// already applied to itself.
  pub fn without_timeline(mut self) -> Self {
    self.timeline = false;
    self
  }

  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

impl fmt::Display for InvalidationPlan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_empty() {
      return f.write_str("nothing");
    }
    let mut parts = Vec::new();
    if !self.event_pages.is_empty() {
      parts.push(format!("pages[{}]", join(&self.event_pages)));
    }
    if !self.contents.is_empty() {
      parts.push(format!("content[{}]", join(&self.contents)));
    }
    if self.tags {
      parts.push("tags".to_string());
    }
    match &self.tag_contents {
      TagScope::Nothing => {}
      TagScope::Named(names) => parts.push(format!("tag_content[{}]", join(names))),
      TagScope::All => parts.push("tag_content[*]".to_string()),
    }
    if self.timeline {
      parts.push("timeline".to_string());
    }
    f.write_str(&parts.join(" "))
  }
}

fn join(keys: &BTreeSet<String>) -> String {
  keys.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}
