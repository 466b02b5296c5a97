//! Error types shared across the playground.

use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = PlaygroundError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PlaygroundError {
  /// Malformed or missing input. No work was performed.
  #[error("validation error: {0}")]
  Validation(String),

  /// The history blob could not be read or written.
  #[error("persistence error: {0}")]
  Persistence(String),

  #[error(transparent)]
  Provider(#[from] ProviderError),
}

impl PlaygroundError {
  pub fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }

  pub fn persistence(msg: impl Into<String>) -> Self {
    Self::Persistence(msg.into())
  }
}

impl From<serde_json::Error> for PlaygroundError {
  fn from(err: serde_json::Error) -> Self {
    Self::Persistence(err.to_string())
  }
}

impl From<std::io::Error> for PlaygroundError {
  fn from(err: std::io::Error) -> Self {
    Self::Persistence(err.to_string())
  }
}

/// Failure of a single completion call.
#[derive(Debug, Error)]
pub enum ProviderError {
  /// The provider answered with a well-formed error response.
  #[error("provider returned an error: {0}")]
  Api(String),

  #[error("request failed: {0}")]
  Transport(String),

  #[error("request timed out after {}s", .0.as_secs_f32())]
  Timeout(Duration),

  #[error("malformed response: {0}")]
  Malformed(String),
}

impl ProviderError {
  /// Structural failures mean no usable answer came back at all, as opposed
  /// to the provider rejecting the request.
  pub fn is_structural(&self) -> bool {
    !matches!(self, ProviderError::Api(_))
  }
}

impl From<async_openai::error::OpenAIError> for ProviderError {
  fn from(err: async_openai::error::OpenAIError) -> Self {
    use async_openai::error::OpenAIError;
    match err {
      OpenAIError::ApiError(api) => ProviderError::Api(api.message),
      OpenAIError::JSONDeserialize(err) => {
        ProviderError::Malformed(err.to_string())
      }
      OpenAIError::Reqwest(err) => ProviderError::Transport(err.to_string()),
      other => ProviderError::Transport(other.to_string()),
    }
  }
}
