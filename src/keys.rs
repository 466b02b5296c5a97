#[derive(Clone)]
pub struct Keys {
  pub openai_api_key: String,
  pub openai_org_id:  Option<String>,
}

impl Keys {
  pub fn new(openai_api_key: String, openai_org_id: Option<String>) -> Self {
    Self {
      openai_api_key,
      openai_org_id,
    }
  }

  /// Reads `OPENAI_API_KEY` and the optional `OPENAI_ORG_ID`, loading a
  /// `.env` file first if one is present.
  pub fn from_env() -> Option<Self> {
    dotenv::dotenv().ok();
    let openai_api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let openai_org_id = std::env::var("OPENAI_ORG_ID")
      .ok()
      .filter(|id| !id.is_empty());
    Some(Self::new(openai_api_key, openai_org_id))
  }
}

impl std::fmt::Debug for Keys {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Keys")
      .field("openai_api_key", &"<redacted>")
      .field("openai_org_id", &self.openai_org_id)
      .finish()
  }
}
