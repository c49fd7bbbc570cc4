//! Scripted in-memory transport for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Duration;

use super::client::RpcClient;
use super::transport::Transport;
use crate::error::{Error, Result};
use crate::model::{Event, List, Priority, Tag, TagColor};

type Handler = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

#[derive(Default)]
struct Script {
  handlers: HashMap<String, Handler>,
  calls: Vec<(String, Value)>,
  delay: Duration,
}

/// Transport answering each command from a scripted handler and recording
/// every invocation.
#[derive(Default)]
pub struct ScriptedTransport {
  script: Mutex<Script>,
}

impl ScriptedTransport {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn client(self: &Arc<Self>) -> RpcClient {
    RpcClient::from_arc(Arc::clone(self) as Arc<dyn Transport>)
  }

  pub fn on(&self, command: &str, handler: impl Fn(&Value) -> Result<Value> + Send + Sync + 'static) {
    self
      .script
      .lock()
      .unwrap()
      .handlers
      .insert(command.to_string(), Arc::new(handler));
  }

  pub fn respond(&self, command: &str, value: impl Serialize) {
    let value = serde_json::to_value(value).unwrap();
    self.on(command, move |_| Ok(value.clone()));
  }

  pub fn fail(&self, command: &str, message: &str) {
    let (command_name, message) = (command.to_string(), message.to_string());
    self.on(command, move |_| Err(Error::backend(&command_name, &message)));
  }

  /// Hold every response back by `delay` so concurrent callers overlap.
  pub fn set_delay(&self, delay: Duration) {
    self.script.lock().unwrap().delay = delay;
  }

  pub fn calls(&self, command: &str) -> usize {
    self
      .script
      .lock()
      .unwrap()
      .calls
      .iter()
      .filter(|(name, _)| name == command)
      .count()
  }

  pub fn last_args(&self, command: &str) -> Option<Value> {
    self
      .script
      .lock()
      .unwrap()
      .calls
      .iter()
      .rev()
      .find(|(name, _)| name == command)
      .map(|(_, args)| args.clone())
  }
}

#[async_trait]
impl Transport for ScriptedTransport {
  async fn invoke(&self, command: &str, args: Value) -> Result<Value> {
    let (handler, delay) = {
      let mut script = self.script.lock().unwrap();
      script.calls.push((command.to_string(), args.clone()));
      (script.handlers.get(command).cloned(), script.delay)
    };

    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }

    match handler {
      Some(handler) => handler(&args),
      None => Err(Error::backend(command, "unscripted command")),
    }
  }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn list(id: &str, title: &str) -> List {
  List {
    id: id.to_string(),
    title: title.to_string(),
    icon: crate::model::DEFAULT_LIST_ICON.to_string(),
  }
}

pub fn event(id: &str, listid: &str) -> Event {
  Event {
    id: id.to_string(),
    listid: listid.to_string(),
    tag: None,
    title: format!("Event {}", id),
    create: "1700000000000".to_string(),
    ddl: "Undefined".to_string(),
    finished: false,
    priority: Priority::Medium,
    icon: "default".to_string(),
    color: "default".to_string(),
  }
}

pub fn tagged(id: &str, listid: &str, tags: &[&str]) -> Event {
  Event {
    tag: Some(tags.iter().map(|t| t.to_string()).collect()),
    ..event(id, listid)
  }
}

/// `count` events for `listid` with ids `{prefix}-{n}`.
pub fn events(listid: &str, prefix: &str, count: usize) -> Vec<Event> {
  (0..count)
    .map(|n| event(&format!("{}-{}", prefix, n), listid))
    .collect()
}

pub fn tag(name: &str) -> Tag {
  Tag {
    name: name.to_string(),
    color: TagColor::Primary,
  }
}
