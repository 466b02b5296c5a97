//! Runtime configuration read from the environment.

use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use log::debug;

use crate::{
  params::DEFAULT_MODEL,
  policies::{ConcurrencyPolicy, Policies, TimeoutPolicy, DEFAULT_WAVE_SIZE},
};

pub const DEFAULT_HISTORY_DIR: &str = ".playground";

#[derive(Clone, Debug)]
pub struct Config {
  /// Base URL of an OpenAI-compatible proxy tried before the direct API.
  pub proxy_url:     Option<String>,
  pub default_model: String,
  pub history_dir:   PathBuf,
  pub policies:      Policies,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      proxy_url:     None,
      default_model: DEFAULT_MODEL.to_string(),
      history_dir:   PathBuf::from(DEFAULT_HISTORY_DIR),
      policies:      Policies::default(),
    }
  }
}

impl Config {
  /// Reads the `PLAYGROUND_*` variables, loading a `.env` file first if one
  /// is present. Unset variables keep their defaults; malformed numbers are
  /// an error.
  pub fn from_env() -> Result<Self> {
    dotenv::dotenv().ok();
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let lookup = |name: &str| lookup(name).filter(|value| !value.is_empty());
    let mut config = Self::default();

    config.proxy_url = lookup("PLAYGROUND_PROXY_URL");
    if let Some(model) = lookup("PLAYGROUND_MODEL") {
      config.default_model = model;
    }
    if let Some(dir) = lookup("PLAYGROUND_HISTORY_DIR") {
      config.history_dir = PathBuf::from(dir);
    }

    let timeout_secs: u64 = parse_or(&lookup, "PLAYGROUND_TIMEOUT_SECS", 30)?;
    config.policies.timeout_policy =
      TimeoutPolicy::new(Duration::from_secs(timeout_secs));

    let wave_size: usize =
      parse_or(&lookup, "PLAYGROUND_CONCURRENCY", DEFAULT_WAVE_SIZE)?;
    config.policies.concurrency_policy = ConcurrencyPolicy::new(wave_size);

    debug!("loaded config: {:?}", config);
    Ok(config)
  }
}

fn parse_or<T>(
  lookup: &impl Fn(&str) -> Option<String>,
  name: &str,
  default: T,
) -> Result<T>
where
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  match lookup(name) {
    Some(value) => value
      .trim()
      .parse()
      .with_context(|| format!("{} has an invalid value {:?}", name, value)),
    None => Ok(default),
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;

  fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
    let vars: HashMap<String, String> = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    Config::from_lookup(|name| vars.get(name).cloned())
  }

  #[test]
  fn unset_variables_keep_defaults() {
    let config = config_from(&[]).unwrap();
    assert_eq!(config.proxy_url, None);
    assert_eq!(config.default_model, DEFAULT_MODEL);
    assert_eq!(config.policies.concurrency_policy.max_concurrent_requests, 3);
    assert_eq!(
      config.policies.timeout_policy.timeout,
      Duration::from_secs(30)
    );
  }

  #[test]
  fn variables_override_defaults() {
    let config = config_from(&[
      ("PLAYGROUND_PROXY_URL", "http://localhost:4000/v1"),
      ("PLAYGROUND_MODEL", "gpt-4"),
      ("PLAYGROUND_TIMEOUT_SECS", "5"),
      ("PLAYGROUND_CONCURRENCY", "8"),
      ("PLAYGROUND_HISTORY_DIR", "/tmp/runs"),
    ])
    .unwrap();
    assert_eq!(config.proxy_url.as_deref(), Some("http://localhost:4000/v1"));
    assert_eq!(config.default_model, "gpt-4");
    assert_eq!(config.policies.timeout_policy.timeout, Duration::from_secs(5));
    assert_eq!(config.policies.concurrency_policy.max_concurrent_requests, 8);
    assert_eq!(config.history_dir, PathBuf::from("/tmp/runs"));
  }

  #[test]
  fn empty_proxy_url_is_ignored() {
    let config = config_from(&[("PLAYGROUND_PROXY_URL", "")]).unwrap();
    assert_eq!(config.proxy_url, None);
  }

  #[test]
  fn malformed_numbers_are_rejected() {
    assert!(config_from(&[("PLAYGROUND_CONCURRENCY", "many")]).is_err());
  }
}
