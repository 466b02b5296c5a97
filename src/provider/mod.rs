//! Completion providers.
//!
//! The batch executor only sees the [`ProviderClient`] capability; concrete
//! clients live in the submodules.

pub mod openai;
pub mod tiered;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use self::{openai::OpenAiProvider, tiered::TieredProvider};
use crate::{error::ProviderError, params::ParameterTuple};

/// One completion call: a single parameter tuple applied to the prompt.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
  pub model:         String,
  pub system_prompt: Option<String>,
  pub user_prompt:   String,
  pub parameters:    ParameterTuple,
  /// Time the caller allows for the whole call, fallbacks included.
  pub timeout:       Option<Duration>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
  #[serde(alias = "prompt_tokens")]
  pub prompt_tokens:     u32,
  #[serde(alias = "completion_tokens")]
  pub completion_tokens: u32,
  #[serde(alias = "total_tokens")]
  pub total_tokens:      u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
  pub text:      String,
  pub usage:     Option<TokenUsage>,
  /// Name of the client that produced this completion.
  pub served_by: String,
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
  /// Name used in logs and recorded on each result entry.
  fn name(&self) -> &str;

  async fn complete(
    &self,
    request: &CompletionRequest,
  ) -> Result<Completion, ProviderError>;
}
