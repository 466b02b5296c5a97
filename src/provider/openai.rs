//! Chat completions through `async-openai`, against the public API or any
//! OpenAI-compatible base URL.

use async_openai::{
  config::OpenAIConfig,
  types::{
    ChatCompletionRequestMessage, CreateChatCompletionRequest,
    CreateChatCompletionResponse, Role,
  },
  Client as OpenAIClient,
};
use async_trait::async_trait;
use log::debug;

use super::{Completion, CompletionRequest, ProviderClient, TokenUsage};
use crate::{
  error::ProviderError, keys::Keys, policies::RetryPolicy,
  utils::get_openai_client,
};

pub struct OpenAiProvider {
  name:         String,
  client:       OpenAIClient<OpenAIConfig>,
  retry_policy: RetryPolicy,
}

impl OpenAiProvider {
  /// A client for the public OpenAI endpoint.
  pub fn direct(keys: &Keys) -> Self {
    Self::new("openai", get_openai_client(keys, None))
  }

  /// A client for an OpenAI-compatible proxy at `api_base`.
  pub fn proxy(keys: &Keys, api_base: &str) -> Self {
    Self::new("proxy", get_openai_client(keys, Some(api_base)))
  }

  pub fn new(
    name: impl Into<String>,
    client: OpenAIClient<OpenAIConfig>,
  ) -> Self {
    Self {
      name: name.into(),
      client,
      retry_policy: RetryPolicy::default(),
    }
  }

  pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
    self.retry_policy = retry_policy;
    self
  }
}

#[async_trait]
impl ProviderClient for OpenAiProvider {
  fn name(&self) -> &str {
    &self.name
  }

  async fn complete(
    &self,
    request: &CompletionRequest,
  ) -> Result<Completion, ProviderError> {
    let mut retry_policy = self.retry_policy.clone();

    // continue trying until we get a response or we reach max retry
    loop {
      let inner = build_inner_request(request);
      let timer = timing::start();
      match self.client.chat().create(inner).await {
        Ok(response) => {
          debug!(
            "{} answered in {}s",
            self.name,
            timer.elapsed().as_secs_f32()
          );
          return completion_from_response(response, &self.name);
        }
        Err(err) => {
          let err = ProviderError::from(err);
          debug!("{} attempt failed: {}", self.name, err);
          if !retry_policy.failed_request().await {
            return Err(err);
          }
        }
      }
    }
  }
}

fn build_inner_request(
  request: &CompletionRequest,
) -> CreateChatCompletionRequest {
  let mut messages = Vec::with_capacity(2);
  if let Some(system_prompt) = &request.system_prompt {
    messages.push(ChatCompletionRequestMessage {
      role:          Role::System,
      content:       Some(system_prompt.clone()),
      name:          None,
      function_call: None,
    });
  }
  messages.push(ChatCompletionRequestMessage {
    role:          Role::User,
    content:       Some(request.user_prompt.clone()),
    name:          None,
    function_call: None,
  });

  let params = &request.parameters;
  CreateChatCompletionRequest {
    model: request.model.clone(),
    messages,
    temperature: Some(params.temperature),
    max_tokens: Some(u16::try_from(params.max_tokens).unwrap_or(u16::MAX)),
    presence_penalty: Some(params.presence_penalty),
    frequency_penalty: Some(params.frequency_penalty),
    ..Default::default()
  }
}

fn completion_from_response(
  response: CreateChatCompletionResponse,
  served_by: &str,
) -> Result<Completion, ProviderError> {
  let choice = response
    .choices
    .into_iter()
    .next()
    .ok_or_else(|| {
      ProviderError::Malformed("response has no choices".into())
    })?;

  Ok(Completion {
    text:      choice.message.content.unwrap_or_default(),
    usage:     response.usage.map(|usage| TokenUsage {
      prompt_tokens:     usage.prompt_tokens,
      completion_tokens: usage.completion_tokens,
      total_tokens:      usage.total_tokens,
    }),
    served_by: served_by.to_string(),
  })
}
