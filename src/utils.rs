use async_openai::{config::OpenAIConfig, Client as OpenAIClient};

use crate::keys::Keys;

/// Builds a client for `api_base`, or for the public OpenAI endpoint when
/// `api_base` is `None`.
pub fn get_openai_client(
  keys: &Keys,
  api_base: Option<&str>,
) -> OpenAIClient<OpenAIConfig> {
  let config = OpenAIConfig::new().with_api_key(&keys.openai_api_key);
  let config = match &keys.openai_org_id {
    Some(openai_org_id) => config.with_org_id(openai_org_id),
    None => config,
  };
  let config = match api_base {
    Some(api_base) => config.with_api_base(api_base.trim_end_matches('/')),
    None => config,
  };
  OpenAIClient::<OpenAIConfig>::with_config(config)
}
