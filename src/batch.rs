//! Fans a prompt out over every parameter combination and collects the
//! results in combination order.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::{
  analysis::{analyze, TextAnalysis},
  error::{PlaygroundError, ProviderError, Result},
  params::{ParameterTuple, ParameterValueSets, DEFAULT_MODEL},
  policies::Policies,
  provider::{Completion, CompletionRequest, ProviderClient, TokenUsage},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
  /// The executor's default model applies when unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model:                Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub system_prompt:        Option<String>,
  pub user_prompt:          String,
  #[serde(alias = "parameterSets", alias = "parameters")]
  pub parameter_value_sets: ParameterValueSets,
  /// Per-call timeout; the executor's timeout policy applies when unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms:           Option<u64>,
}

impl BatchRequest {
  pub fn new(
    user_prompt: impl Into<String>,
    parameter_value_sets: ParameterValueSets,
  ) -> Self {
    Self {
      model: None,
      system_prompt: None,
      user_prompt: user_prompt.into(),
      parameter_value_sets,
      timeout_ms: None,
    }
  }

  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.model = Some(model.into());
    self
  }

  pub fn with_system_prompt(
    mut self,
    system_prompt: impl Into<String>,
  ) -> Self {
    self.system_prompt = Some(system_prompt.into());
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout_ms =
      Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
    self
  }

  /// The requested model, or `default` when none was given.
  pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
    self.model.as_deref().unwrap_or(default)
  }

  /// The system prompt, unless it is missing or blank.
  pub fn effective_system_prompt(&self) -> Option<&str> {
    self
      .system_prompt
      .as_deref()
      .filter(|prompt| !prompt.trim().is_empty())
  }

  /// Rejects a blank user prompt or an explicitly blank model.
  pub fn validate(&self) -> Result<()> {
    if self.user_prompt.trim().is_empty() {
      return Err(PlaygroundError::validation("user prompt must not be empty"));
    }
    if self.model.as_deref().is_some_and(|model| model.trim().is_empty()) {
      return Err(PlaygroundError::validation("model must not be empty"));
    }
    Ok(())
  }

  /// Validates the request and expands its parameter matrix.
  pub fn expand(&self) -> Result<Vec<ParameterTuple>> {
    self.validate()?;
    self.parameter_value_sets.expand()
  }

  fn completion_request(
    &self,
    model: &str,
    parameters: ParameterTuple,
    limit: Duration,
  ) -> CompletionRequest {
    CompletionRequest {
      model: model.to_string(),
      system_prompt: self.effective_system_prompt().map(String::from),
      user_prompt: self.user_prompt.clone(),
      parameters,
      timeout: Some(limit),
    }
  }
}

/// The outcome of one parameter combination.
///
/// On success `text` is set and `error_message` is not; on failure the
/// reverse. Both absent means the call produced no output at all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
  pub parameters:     ParameterTuple,
  #[serde(
    default,
    alias = "response",
    alias = "output",
    skip_serializing_if = "Option::is_none"
  )]
  pub text:           Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error_message:  Option<String>,
  #[serde(default, alias = "usage", skip_serializing_if = "Option::is_none")]
  pub token_usage:    Option<TokenUsage>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub analysis:       Option<TextAnalysis>,
  #[serde(
    default,
    alias = "elapsedTimeMs",
    skip_serializing_if = "Option::is_none"
  )]
  pub elapsed_millis: Option<u64>,
  /// Which provider tier produced the text.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub served_by:      Option<String>,
}

impl ResultEntry {
  pub fn empty(parameters: ParameterTuple) -> Self {
    Self {
      parameters,
      text: None,
      error_message: None,
      token_usage: None,
      analysis: None,
      elapsed_millis: None,
      served_by: None,
    }
  }

  pub fn completed(
    parameters: ParameterTuple,
    completion: Completion,
    elapsed_millis: u64,
  ) -> Self {
    Self {
      analysis: Some(analyze(&completion.text)),
      text: Some(completion.text),
      token_usage: completion.usage,
      elapsed_millis: Some(elapsed_millis),
      served_by: Some(completion.served_by),
      ..Self::empty(parameters)
    }
  }

  pub fn failed(
    parameters: ParameterTuple,
    error: &ProviderError,
    elapsed_millis: u64,
  ) -> Self {
    Self {
      error_message: Some(error.to_string()),
      elapsed_millis: Some(elapsed_millis),
      ..Self::empty(parameters)
    }
  }

  pub fn is_error(&self) -> bool {
    self.error_message.is_some()
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
  pub success:       bool,
  #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
  pub error_message: Option<String>,
  #[serde(alias = "results")]
  pub entries:       Vec<ResultEntry>,
}

impl BatchResult {
  /// A batch that was rejected before any call was made.
  pub fn failed(error_message: impl Into<String>) -> Self {
    Self {
      success:       false,
      error_message: Some(error_message.into()),
      entries:       vec![],
    }
  }

  pub fn failed_count(&self) -> usize {
    self.entries.iter().filter(|entry| entry.is_error()).count()
  }

  /// The batch ran but some of its calls failed.
  pub fn is_partial_failure(&self) -> bool {
    self.success && self.failed_count() > 0
  }
}

/// Issues one completion call per parameter combination.
///
/// Calls go out in waves of at most `max_concurrent_requests`; a wave starts
/// only after every call of the previous one has settled. A failing call
/// becomes an error entry and never affects its siblings.
#[derive(Clone)]
pub struct BatchExecutor {
  provider:      Arc<dyn ProviderClient>,
  policies:      Policies,
  default_model: String,
}

impl BatchExecutor {
  pub fn new(provider: Arc<dyn ProviderClient>, policies: Policies) -> Self {
    Self {
      provider,
      policies,
      default_model: DEFAULT_MODEL.to_string(),
    }
  }

  /// Sets the model used by requests that do not name one.
  pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
    self.default_model = model.into();
    self
  }

  pub fn policies(&self) -> &Policies {
    &self.policies
  }

  pub fn default_model(&self) -> &str {
    &self.default_model
  }

  /// A copy of `request` with the model filled in from the default.
  pub fn resolve(&self, request: &BatchRequest) -> BatchRequest {
    let mut resolved = request.clone();
    if resolved.model.is_none() {
      resolved.model = Some(self.default_model.clone());
    }
    resolved
  }

  /// Parses a JSON request body and runs it. A body that does not parse is
  /// reported like any other rejected batch.
  pub async fn run_json(&self, body: &str) -> BatchResult {
    match serde_json::from_str::<BatchRequest>(body) {
      Ok(request) => self.run(&request).await,
      Err(err) => {
        warn!("rejecting malformed batch request: {}", err);
        BatchResult::failed(
          PlaygroundError::validation(format!("malformed request: {}", err))
            .to_string(),
        )
      }
    }
  }

  pub async fn run(&self, request: &BatchRequest) -> BatchResult {
    let tuples = match request.expand() {
      Ok(tuples) => tuples,
      Err(err) => {
        warn!("rejecting batch: {}", err);
        return BatchResult::failed(err.to_string());
      }
    };

    let model = request.model_or(&self.default_model);
    let call_timeout = request
      .timeout_ms
      .map(Duration::from_millis)
      .unwrap_or(self.policies.timeout_policy.timeout);
    let wave_size =
      self.policies.concurrency_policy.max_concurrent_requests.max(1);
    info!(
      "running {} combinations of {} against {} in waves of {}",
      tuples.len(),
      model,
      self.provider.name(),
      wave_size
    );

    let mut slots: Vec<Option<ResultEntry>> = vec![None; tuples.len()];
    for (wave, chunk) in tuples.chunks(wave_size).enumerate() {
      let offset = wave * wave_size;
      debug!("starting wave {} ({} calls)", wave, chunk.len());
      let calls = chunk.iter().enumerate().map(|(i, parameters)| {
        let index = offset + i;
        let call =
          request.completion_request(model, *parameters, call_timeout);
        async move { (index, self.call(index, call, call_timeout).await) }
      });
      for (index, entry) in join_all(calls).await {
        slots[index] = Some(entry);
      }
    }

    let entries: Vec<ResultEntry> = slots.into_iter().flatten().collect();
    debug_assert_eq!(entries.len(), tuples.len());
    let result = BatchResult {
      success: true,
      error_message: None,
      entries,
    };
    info!(
      "batch finished: {} entries, {} failed",
      result.entries.len(),
      result.failed_count()
    );
    result
  }

  async fn call(
    &self,
    index: usize,
    request: CompletionRequest,
    limit: Duration,
  ) -> ResultEntry {
    debug!("starting call {} with {:?}", index, request.parameters);
    let timer = timing::start();
    let result = timeout(limit, self.provider.complete(&request))
      .await
      .unwrap_or(Err(ProviderError::Timeout(limit)));
    let elapsed_millis =
      u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
      Ok(completion) => {
        debug!(
          "call {} served by {} in {}ms",
          index, completion.served_by, elapsed_millis
        );
        ResultEntry::completed(request.parameters, completion, elapsed_millis)
      }
      Err(err) => {
        warn!("call {} failed after {}ms: {}", index, elapsed_millis, err);
        ResultEntry::failed(request.parameters, &err, elapsed_millis)
      }
    }
  }
}
