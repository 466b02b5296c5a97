//! Provides a useful collection of `prompt-playground` types

pub use crate::{
  analysis::{analyze, Sentiment, TextAnalysis},
  batch::{BatchExecutor, BatchRequest, BatchResult, ResultEntry},
  compare::{compare, ComparisonResult, DiffSegment},
  config::Config,
  error::{PlaygroundError, ProviderError},
  history::{FileStore, HistoryStore, KeyValueStore, MemoryStore, StoredRun},
  keys::Keys,
  params::{ParameterTuple, ParameterValueSets},
  policies::Policies,
  provider::{ProviderClient, TieredProvider},
  Playground,
};
