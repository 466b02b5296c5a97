//! Explore how generation parameters change a model's output.
//!
//! A prompt is submitted with candidate values for temperature, max tokens,
//! frequency penalty and presence penalty. Every combination becomes one
//! completion call; results come back in combination order, are kept in a
//! bounded local history, and any two runs of the same prompt can be
//! compared word by word.

pub mod analysis;
pub mod batch;
pub mod compare;
pub mod config;
pub mod error;
pub mod history;
pub mod keys;
pub mod params;
pub mod policies;
pub mod prelude;
pub mod provider;
pub mod utils;

use std::sync::Arc;

use log::warn;

use crate::{
  batch::{BatchExecutor, BatchRequest, BatchResult},
  compare::ComparisonResult,
  config::Config,
  error::Result,
  history::{FileStore, HistoryStore, KeyValueStore, StoredRun},
  keys::Keys,
  provider::{OpenAiProvider, ProviderClient, TieredProvider},
};

/// Builds the completion client described by `config`: the proxy backed by
/// the direct API when a proxy URL is set, otherwise the direct API alone.
///
/// The proxy gets half of each call's timeout before the direct API is tried.
pub fn build_provider(
  config: &Config,
  keys: &Keys,
) -> Arc<dyn ProviderClient> {
  let retry_policy = config.policies.retry_policy.clone();
  let direct: Arc<dyn ProviderClient> = Arc::new(
    OpenAiProvider::direct(keys).with_retry_policy(retry_policy.clone()),
  );
  match &config.proxy_url {
    Some(proxy_url) => {
      let proxy = Arc::new(
        OpenAiProvider::proxy(keys, proxy_url)
          .with_retry_policy(retry_policy),
      );
      Arc::new(TieredProvider::new(proxy, direct))
    }
    None => direct,
  }
}

/// Batch execution wired to a run history.
pub struct Playground<S> {
  executor: BatchExecutor,
  history:  HistoryStore<S>,
}

impl Playground<FileStore> {
  /// A playground using the configured provider and the file-backed history
  /// under `config.history_dir`.
  pub fn from_config(config: &Config, keys: &Keys) -> Self {
    let executor =
      BatchExecutor::new(build_provider(config, keys), config.policies.clone())
        .with_default_model(config.default_model.clone());
    Self::new(executor, FileStore::new(&config.history_dir))
  }
}

impl<S: KeyValueStore> Playground<S> {
  pub fn new(executor: BatchExecutor, store: S) -> Self {
    Self {
      executor,
      history: HistoryStore::new(store),
    }
  }

  pub fn executor(&self) -> &BatchExecutor {
    &self.executor
  }

  pub fn history(&self) -> &HistoryStore<S> {
    &self.history
  }

  pub fn history_mut(&mut self) -> &mut HistoryStore<S> {
    &mut self.history
  }

  /// Runs the batch and records it in the history. Rejected batches are not
  /// recorded. Returns the stored run alongside the result when one was
  /// recorded.
  pub async fn submit(
    &mut self,
    request: &BatchRequest,
  ) -> (BatchResult, Option<StoredRun>) {
    let request = self.executor.resolve(request);
    let result = self.executor.run(&request).await;
    if !result.success {
      return (result, None);
    }
    match StoredRun::from_batch(&request, &result) {
      Ok(run) => {
        let stored = self.history.add(run.clone()).then_some(run);
        (result, stored)
      }
      Err(err) => {
        warn!("not recording run: {}", err);
        (result, None)
      }
    }
  }

  /// Compares two stored runs by id.
  pub fn compare(&self, id_a: &str, id_b: &str) -> Result<ComparisonResult> {
    compare::compare_by_ids(&self.history, id_a, id_b)
  }
}
