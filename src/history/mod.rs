//! Completed runs kept in a single JSON blob, newest first.

pub mod storage;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use tinyrand::Rand;

pub use self::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::{
  batch::{BatchRequest, BatchResult, ResultEntry},
  error::Result,
  params::{ParameterTuple, ParameterValueSets, DEFAULT_MODEL},
};

/// Storage key of the history blob.
pub const HISTORY_KEY: &str = "prompt_history";
/// Number of runs kept; older runs are evicted.
pub const HISTORY_CAP: usize = 50;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRun {
  pub id:                        String,
  #[serde(alias = "timestamp")]
  pub created_at:                DateTime<Utc>,
  #[serde(default)]
  pub system_prompt:             Option<String>,
  pub user_prompt:               String,
  pub model:                     String,
  #[serde(alias = "parameters")]
  pub representative_parameters: ParameterTuple,
  /// The full sweep the run was submitted with. Absent in runs recorded
  /// before sweeps were stored.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parameter_value_sets:      Option<ParameterValueSets>,
  #[serde(default, alias = "results")]
  pub entries:                   Vec<ResultEntry>,
}

impl StoredRun {
  /// Builds a run from a finished batch. The first expanded combination
  /// stands in for the run's parameters.
  pub fn from_batch(
    request: &BatchRequest,
    result: &BatchResult,
  ) -> Result<Self> {
    let tuples = request.expand()?;
    let representative_parameters = result
      .entries
      .first()
      .map(|entry| entry.parameters)
      .or_else(|| tuples.first().copied())
      .unwrap_or_default();

    Ok(Self {
      id: new_run_id(),
      created_at: Utc::now(),
      system_prompt: request.effective_system_prompt().map(String::from),
      user_prompt: request.user_prompt.clone(),
      model: request.model_or(DEFAULT_MODEL).to_string(),
      representative_parameters,
      parameter_value_sets: Some(request.parameter_value_sets.clone()),
      entries: result.entries.clone(),
    })
  }

  /// The sweep this run was submitted with. Older runs only know their
  /// representative tuple.
  pub fn value_sets(&self) -> ParameterValueSets {
    self.parameter_value_sets.clone().unwrap_or_else(|| {
      ParameterValueSets::single(self.representative_parameters)
    })
  }

  /// Two runs are duplicates when they were submitted with the same prompts,
  /// model and every parameter value of the sweep.
  pub fn is_duplicate_of(&self, other: &StoredRun) -> bool {
    self.system_prompt == other.system_prompt
      && self.user_prompt == other.user_prompt
      && self.model == other.model
      && self.value_sets() == other.value_sets()
  }
}

/// A random 128-bit identifier in hex.
pub fn new_run_id() -> String {
  let mut rand = tinyrand_std::thread_rand();
  format!("{:016x}{:016x}", rand.next_u64(), rand.next_u64())
}

/// The persisted run history.
///
/// Storage failures never reach the caller: a missing or unreadable blob
/// reads as an empty history, and a failed write is logged and dropped.
pub struct HistoryStore<S> {
  store:      S,
  cap:        usize,
  last_added: Option<StoredRun>,
}

impl<S: KeyValueStore> HistoryStore<S> {
  pub fn new(store: S) -> Self {
    Self::with_cap(store, HISTORY_CAP)
  }

  fn with_cap(store: S, cap: usize) -> Self {
    Self {
      store,
      cap,
      last_added: None,
    }
  }

  pub fn backend(&self) -> &S {
    &self.store
  }

  /// All runs, most recently added first.
  pub fn list(&self) -> Vec<StoredRun> {
    let blob = match self.store.get(HISTORY_KEY) {
      Ok(Some(blob)) => blob,
      Ok(None) => return vec![],
      Err(err) => {
        error!("failed to read history: {}", err);
        return vec![];
      }
    };
    match serde_json::from_str::<Vec<StoredRun>>(&blob) {
      Ok(runs) => runs,
      Err(err) => {
        error!("history blob is corrupt, treating it as empty: {}", err);
        vec![]
      }
    }
  }

  pub fn get(&self, id: &str) -> Option<StoredRun> {
    self.list().into_iter().find(|run| run.id == id)
  }

  /// Prepends `run`, unless it duplicates the run added just before it.
  /// Returns whether the run was stored.
  pub fn add(&mut self, run: StoredRun) -> bool {
    if let Some(last) = &self.last_added {
      if last.is_duplicate_of(&run) {
        debug!("skipping duplicate run {}", run.id);
        return false;
      }
    }

    let mut runs = self.list();
    runs.insert(0, run.clone());
    if runs.len() > self.cap {
      debug!("evicting {} old runs", runs.len() - self.cap);
      runs.truncate(self.cap);
    }
    info!("recorded run {}", run.id);
    self.last_added = Some(run);
    self.save(&runs);
    true
  }

  /// Removes the run with `id`, if present.
  pub fn delete(&self, id: &str) {
    let mut runs = self.list();
    let before = runs.len();
    runs.retain(|run| run.id != id);
    if runs.len() != before {
      self.save(&runs);
    }
  }

  pub fn clear(&mut self) {
    self.last_added = None;
    if let Err(err) = self.store.remove(HISTORY_KEY) {
      error!("failed to clear history: {}", err);
    }
  }

  fn save(&self, runs: &[StoredRun]) {
    let result = serde_json::to_string(runs)
      .map_err(Into::into)
      .and_then(|blob| self.store.set(HISTORY_KEY, &blob));
    if let Err(err) = result {
      error!("failed to write history: {}", err);
    }
  }
}
