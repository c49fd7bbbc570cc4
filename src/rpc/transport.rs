use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Moves one command invocation to the backend and back.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Invoke `command` with named `args`, returning the raw JSON result.
  async fn invoke(&self, command: &str, args: Value) -> Result<Value>;
}

/// Transport for a backend exposing `POST {base}/invoke/{command}`.
///
/// The request body is the argument object; a 2xx response carries the JSON
/// result (an empty body reads as `null`), anything else is a backend error
/// whose body is the message.
#[derive(Clone)]
pub struct HttpTransport {
  http: reqwest::Client,
  base_url: Url,
}

impl HttpTransport {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    let mut base_url =
      Url::parse(base_url).map_err(|e| Error::Setup(format!("invalid backend url {}: {}", base_url, e)))?;

    // Url::join replaces the last segment unless the path ends with '/'
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| Error::Setup(format!("failed to build http client: {}", e)))?;

    Ok(Self { http, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn endpoint(&self, command: &str) -> Result<Url> {
    self
      .base_url
      .join(&format!("invoke/{}", command))
      .map_err(|e| Error::transport(command, e))
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn invoke(&self, command: &str, args: Value) -> Result<Value> {
    let url = self.endpoint(command)?;
    debug!(command, %url, "POST");

    let response = self
      .http
      .post(url)
      .json(&args)
      .send()
      .await
      .map_err(|e| Error::transport(command, e))?;

    let status = response.status();
    let body = response
      .bytes()
      .await
      .map_err(|e| Error::transport(command, e))?;

    if !status.is_success() {
      let text = String::from_utf8_lossy(&body);
      return Err(Error::backend(command, &format!("status {}: {}", status, text)));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
      return Ok(Value::Null);
    }
    serde_json::from_slice(&body).map_err(|e| Error::malformed(command, e))
  }
}
