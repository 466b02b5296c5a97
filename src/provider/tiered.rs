//! Two-tier fallback between a primary and a secondary client.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use log::warn;
use tokio::time::timeout;

use super::{Completion, CompletionRequest, ProviderClient};
use crate::error::ProviderError;

/// Tries `primary` first and falls back to `secondary` only on a structural
/// failure. An error response from the primary is returned as is.
///
/// The returned [`Completion::served_by`] names the tier that answered.
pub struct TieredProvider {
  name:            String,
  primary:         Arc<dyn ProviderClient>,
  secondary:       Arc<dyn ProviderClient>,
  primary_timeout: Option<Duration>,
}

impl TieredProvider {
  pub fn new(
    primary: Arc<dyn ProviderClient>,
    secondary: Arc<dyn ProviderClient>,
  ) -> Self {
    Self {
      name: format!("{}+{}", primary.name(), secondary.name()),
      primary,
      secondary,
      primary_timeout: None,
    }
  }

  /// Caps the primary attempt. A primary timeout counts as a structural
  /// failure.
  pub fn with_primary_timeout(mut self, primary_timeout: Duration) -> Self {
    self.primary_timeout = Some(primary_timeout);
    self
  }

  /// The primary gets half of the request's time so a hanging primary still
  /// leaves the other half for the secondary, and never more than the
  /// configured cap.
  fn primary_limit(&self, request: &CompletionRequest) -> Option<Duration> {
    let share = request.timeout.map(|limit| limit / 2);
    match (self.primary_timeout, share) {
      (Some(cap), Some(share)) => Some(cap.min(share)),
      (cap, share) => cap.or(share),
    }
  }

  async fn complete_primary(
    &self,
    request: &CompletionRequest,
  ) -> Result<Completion, ProviderError> {
    match self.primary_limit(request) {
      Some(limit) => timeout(limit, self.primary.complete(request))
        .await
        .unwrap_or(Err(ProviderError::Timeout(limit))),
      None => self.primary.complete(request).await,
    }
  }
}

#[async_trait]
impl ProviderClient for TieredProvider {
  fn name(&self) -> &str {
    &self.name
  }

  async fn complete(
    &self,
    request: &CompletionRequest,
  ) -> Result<Completion, ProviderError> {
    match self.complete_primary(request).await {
      Err(err) if err.is_structural() => {
        warn!(
          "{} failed ({}), falling back to {}",
          self.primary.name(),
          err,
          self.secondary.name()
        );
        self.secondary.complete(request).await
      }
      result => result,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;
  use crate::params::ParameterTuple;

  enum Script {
    Answer,
    Fail(fn() -> ProviderError),
    Hang,
  }

  struct Scripted {
    name:   &'static str,
    script: Script,
    calls:  AtomicUsize,
  }

  impl Scripted {
    fn new(name: &'static str, script: Script) -> Arc<Self> {
      Arc::new(Self {
        name,
        script,
        calls: AtomicUsize::new(0),
      })
    }
  }

  #[async_trait]
  impl ProviderClient for Scripted {
    fn name(&self) -> &str {
      self.name
    }

    async fn complete(
      &self,
      _request: &CompletionRequest,
    ) -> Result<Completion, ProviderError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      match &self.script {
        Script::Answer => Ok(Completion {
          text:      format!("from {}", self.name),
          usage:     None,
          served_by: self.name.to_string(),
        }),
        Script::Fail(make) => Err(make()),
        Script::Hang => {
          tokio::time::sleep(Duration::from_secs(3600)).await;
          unreachable!("hanging client was not cancelled")
        }
      }
    }
  }

  fn request() -> CompletionRequest {
    CompletionRequest {
      model:         "gpt-3.5-turbo".into(),
      system_prompt: None,
      user_prompt:   "hi".into(),
      parameters:    ParameterTuple::default(),
      timeout:       None,
    }
  }

  #[tokio::test]
  async fn primary_answer_skips_secondary() {
    let primary = Scripted::new("proxy", Script::Answer);
    let secondary = Scripted::new("openai", Script::Answer);
    let tiered = TieredProvider::new(primary.clone(), secondary.clone());

    let completion = tiered.complete(&request()).await.unwrap();
    assert_eq!(completion.served_by, "proxy");
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    assert_eq!(tiered.name(), "proxy+openai");
  }

  #[tokio::test]
  async fn structural_failure_falls_back() {
    let primary = Scripted::new(
      "proxy",
      Script::Fail(|| ProviderError::Transport("connection refused".into())),
    );
    let secondary = Scripted::new("openai", Script::Answer);
    let tiered = TieredProvider::new(primary, secondary.clone());

    let completion = tiered.complete(&request()).await.unwrap();
    assert_eq!(completion.served_by, "openai");
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn error_response_does_not_fall_back() {
    let primary = Scripted::new(
      "proxy",
      Script::Fail(|| ProviderError::Api("invalid model".into())),
    );
    let secondary = Scripted::new("openai", Script::Answer);
    let tiered = TieredProvider::new(primary, secondary.clone());

    let err = tiered.complete(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Api(_)));
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn hanging_primary_times_out_into_secondary() {
    let primary = Scripted::new("proxy", Script::Hang);
    let secondary = Scripted::new("openai", Script::Answer);
    let tiered = TieredProvider::new(primary, secondary)
      .with_primary_timeout(Duration::from_secs(5));

    let completion = tiered.complete(&request()).await.unwrap();
    assert_eq!(completion.served_by, "openai");
  }

  #[tokio::test(start_paused = true)]
  async fn short_request_timeout_still_leaves_room_for_secondary() {
    let primary = Scripted::new("proxy", Script::Hang);
    let secondary = Scripted::new("openai", Script::Answer);
    let tiered = TieredProvider::new(primary, secondary)
      .with_primary_timeout(Duration::from_secs(15));
    let request = CompletionRequest {
      timeout: Some(Duration::from_secs(10)),
      ..request()
    };

    let completion = tiered.complete(&request);
    let completion = timeout(Duration::from_secs(10), completion)
      .await
      .expect("fallback finished within the request timeout")
      .unwrap();
    assert_eq!(completion.served_by, "openai");
  }

  #[test]
  fn primary_limit_is_the_tighter_of_cap_and_half_request() {
    let primary = Scripted::new("proxy", Script::Answer);
    let secondary = Scripted::new("openai", Script::Answer);
    let tiered = TieredProvider::new(primary.clone(), secondary.clone());
    let with = |limit: Option<u64>| CompletionRequest {
      timeout: limit.map(Duration::from_secs),
      ..request()
    };

    assert_eq!(tiered.primary_limit(&with(None)), None);
    assert_eq!(
      tiered.primary_limit(&with(Some(10))),
      Some(Duration::from_secs(5))
    );

    let capped = TieredProvider::new(primary, secondary)
      .with_primary_timeout(Duration::from_secs(3));
    assert_eq!(
      capped.primary_limit(&with(Some(10))),
      Some(Duration::from_secs(3))
    );
    assert_eq!(
      capped.primary_limit(&with(None)),
      Some(Duration::from_secs(3))
    );
  }
}
