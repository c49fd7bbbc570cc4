use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use super::transport::Transport;
use crate::error::{Error, Result};
use crate::model::{Event, List, Priority, Tag, TagColor};

/// Typed client for the backend's command surface.
///
/// Responses are decoded in full; a result of the wrong shape is a
/// [`Error::Malformed`] failure and none of it is used.
#[derive(Clone)]
pub struct RpcClient {
  transport: Arc<dyn Transport>,
}

impl RpcClient {
  pub fn new(transport: impl Transport + 'static) -> Self {
    Self {
      transport: Arc::new(transport),
    }
  }

  pub fn from_arc(transport: Arc<dyn Transport>) -> Self {
    Self { transport }
  }

  async fn call<T: DeserializeOwned>(&self, command: &'static str, args: Value) -> Result<T> {
    debug!(command, "invoking backend");
    let value = self.transport.invoke(command, args).await?;
    serde_json::from_value(value).map_err(|e| Error::malformed(command, e))
  }

  /// Invoke a command whose result carries nothing the cache needs.
  async fn call_unit(&self, command: &'static str, args: Value) -> Result<()> {
    debug!(command, "invoking backend");
    self.transport.invoke(command, args).await?;
    Ok(())
  }

  // ===== Lists =====

  pub async fn get_lists(&self) -> Result<Vec<List>> {
    self.call("get_lists", json!({})).await
  }

  pub async fn new_list(&self, title: &str, icon: &str) -> Result<List> {
    self
      .call("new_list", json!({ "title": title, "icon": icon }))
      .await
  }

  pub async fn rename_list(&self, listid: &str, new_title: &str) -> Result<()> {
    self
      .call_unit("rename_list", json!({ "listid": listid, "new": new_title }))
      .await
  }

  pub async fn delete_list(&self, listid: &str) -> Result<()> {
    self.call_unit("delete_list", json!({ "listid": listid })).await
  }

  /// One page of a list's events.
  pub async fn list_content(&self, listid: &str, page: usize, page_size: usize) -> Result<Vec<Event>> {
    self
      .call(
        "list_content",
        json!({ "listid": listid, "page": page, "pageSize": page_size }),
      )
      .await
  }

  // ===== Events =====

  pub async fn add_event(&self, listid: &str, title: &str, priority: Priority, ddl: &str) -> Result<()> {
    self
      .call_unit(
        "add_event",
        json!({ "listid": listid, "title": title, "priority": priority, "ddl": ddl }),
      )
      .await
  }

  pub async fn update_event(&self, event: &Event) -> Result<()> {
    self.call_unit("update_event", json!({ "fEvent": event })).await
  }

  pub async fn delete_event(&self, uuid: &str) -> Result<()> {
    self.call_unit("delete_event", json!({ "uuid": uuid })).await
  }

  pub async fn event_content(&self, uuid: &str) -> Result<String> {
    self.call("event_content", json!({ "uuid": uuid })).await
  }

  pub async fn write_content(&self, uuid: &str, content: &str) -> Result<()> {
    self
      .call_unit("write_content", json!({ "uuid": uuid, "content": content }))
      .await
  }

  /// Events matching a named date bucket or a `YYYY-MM-DD` date.
  pub async fn filter_events(&self, filter: &str) -> Result<Vec<Event>> {
    self.call("filter_events", json!({ "filter": filter })).await
  }

  /// Events whose title or body contains `query`.
  pub async fn search_events(&self, query: &str) -> Result<Vec<Event>> {
    self
      .call("filter_events", json!({ "filter": query, "wordMatch": true }))
      .await
  }

  // ===== Tags =====

  pub async fn get_tags(&self) -> Result<Vec<Tag>> {
    self.call("get_tags", json!({})).await
  }

  pub async fn add_tag(&self, tag: &str, color: TagColor) -> Result<()> {
    self
      .call_unit("add_tag", json!({ "tag": tag, "color": color }))
      .await
  }

  pub async fn delete_tag(&self, tag: &str) -> Result<()> {
    self.call_unit("delete_tag", json!({ "tag": tag })).await
  }

  pub async fn tag_content(&self, tag: &str) -> Result<Vec<Event>> {
    self.call("tag_content", json!({ "tag": tag })).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rpc::mock::{list, ScriptedTransport};

  #[tokio::test]
  async fn test_list_content_sends_paging_arguments() {
    let transport = ScriptedTransport::new();
    transport.respond("list_content", json!([]));
    let client = transport.client();

    client.list_content("l1", 3, 20).await.unwrap();

    let args = transport.last_args("list_content").unwrap();
    assert_eq!(args, json!({ "listid": "l1", "page": 3, "pageSize": 20 }));
  }

  #[tokio::test]
  async fn test_wrong_shape_is_malformed() {
    let transport = ScriptedTransport::new();
    transport.respond("get_lists", json!({ "lists": [] }));

    let err = transport.client().get_lists().await.unwrap_err();
    assert!(matches!(err, Error::Malformed { ref command, .. } if command == "get_lists"));
  }

  #[tokio::test]
  async fn test_new_list_decodes_created_list() {
    let transport = ScriptedTransport::new();
    transport.respond("new_list", serde_json::to_value(list("l9", "Work")).unwrap());

    let created = transport.client().new_list("Work", "mdi-briefcase").await.unwrap();
    assert_eq!(created.id, "l9");
    assert_eq!(
      transport.last_args("new_list"),
      Some(json!({ "title": "Work", "icon": "mdi-briefcase" }))
    );
  }

  #[tokio::test]
  async fn test_search_sets_word_match() {
    let transport = ScriptedTransport::new();
    transport.respond("filter_events", json!([]));

    transport.client().search_events("report").await.unwrap();
    assert_eq!(
      transport.last_args("filter_events"),
      Some(json!({ "filter": "report", "wordMatch": true }))
    );
  }
}
