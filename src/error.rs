use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the cache layer.
///
/// `Clone` so that every caller attached to a coalesced fetch receives the
/// same failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
  #[error("Transport error calling {command}: {message}")]
  Transport { command: String, message: String },

  #[error("Backend rejected {command}: {message}")]
  Backend { command: String, message: String },

  #[error("Malformed response from {command}: {message}")]
  Malformed { command: String, message: String },

  #[error("{kind} {id} does not exist")]
  NotFound { kind: &'static str, id: String },

  #[error("Transport setup failed: {0}")]
  Setup(String),
}

/// Maximum length for backend error bodies kept in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl Error {
  /// Truncate a response body to avoid logging excessive data
  fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
      return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
      end -= 1;
    }
    format!(
      "{}... (truncated, {} total bytes)",
      &body[..end],
      body.len()
    )
  }

  pub fn transport(command: &str, err: impl std::fmt::Display) -> Self {
    Error::Transport {
      command: command.to_string(),
      message: err.to_string(),
    }
  }

  pub fn backend(command: &str, body: &str) -> Self {
    Error::Backend {
      command: command.to_string(),
      message: Self::truncate_body(body),
    }
  }

  pub fn malformed(command: &str, err: impl std::fmt::Display) -> Self {
    Error::Malformed {
      command: command.to_string(),
      message: err.to_string(),
    }
  }

  pub fn not_found(kind: &'static str, id: &str) -> Self {
    Error::NotFound {
      kind,
      id: id.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_backend_body_is_truncated() {
    let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
    let err = Error::backend("get_lists", &body);
    let Error::Backend { message, .. } = err else {
      panic!("expected backend error");
    };
    assert!(message.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
    assert!(message.ends_with("(truncated, 520 total bytes)"));
  }

  #[test]
  fn test_truncation_respects_char_boundaries() {
    let body = "é".repeat(MAX_ERROR_BODY_LENGTH);
    let err = Error::backend("get_tags", &body);
    assert!(err.to_string().contains("truncated"));
  }

  #[test]
  fn test_not_found_message() {
    let err = Error::not_found("list", "abc");
    assert_eq!(err.to_string(), "list abc does not exist");
  }
}
