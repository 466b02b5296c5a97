use anyhow::{Context, Result};
use log::info;
use prompt_playground::{
  batch::BatchRequest, compare::compare, config::Config, keys::Keys,
  params::ParameterValueSets, Playground,
};

#[tokio::main]
async fn main() -> Result<()> {
  env_logger::init();

  let keys = Keys::from_env().context("OPENAI_API_KEY is not set")?;
  let config = Config::from_env()?;
  let mut playground = Playground::from_config(&config, &keys);

  let user_prompt = std::env::args()
    .skip(1)
    .collect::<Vec<_>>()
    .join(" ");
  let user_prompt = if user_prompt.trim().is_empty() {
    "Describe a rainy afternoon in two sentences.".to_string()
  } else {
    user_prompt
  };

  let request = BatchRequest::new(user_prompt, ParameterValueSets {
    temperatures: vec![0.2, 0.7, 1.2],
    ..Default::default()
  })
  .with_system_prompt("You are a helpful assistant.");

  let previous = playground
    .history()
    .list()
    .into_iter()
    .find(|run| run.user_prompt == request.user_prompt);

  let (result, stored) = playground.submit(&request).await;
  if !result.success {
    anyhow::bail!(
      "batch rejected: {}",
      result.error_message.unwrap_or_default()
    );
  }

  for entry in &result.entries {
    let params = &entry.parameters;
    println!(
      "--- temperature {} / max tokens {} ({}ms via {})",
      params.temperature,
      params.max_tokens,
      entry.elapsed_millis.unwrap_or_default(),
      entry.served_by.as_deref().unwrap_or("-"),
    );
    match (&entry.text, &entry.error_message) {
      (_, Some(error)) => println!("error: {}", error),
      (Some(text), None) => println!("{}", text),
      (None, None) => println!("(no output)"),
    }
    if let Some(analysis) = entry.analysis {
      println!("[{} words, {:?}]", analysis.word_count, analysis.sentiment);
    }
  }
  info!("{} of {} calls failed", result.failed_count(), result.entries.len());

  if let (Some(previous), Some(current)) = (previous, stored) {
    let comparison = compare(&previous, &current)?;
    println!("--- compared with run {}", previous.id);
    for segment in comparison.response_diff.segments {
      if segment.is_removal {
        print!("[-{}-]", segment.text);
      } else if segment.is_addition {
        print!("{{+{}+}}", segment.text);
      } else {
        print!("{}", segment.text);
      }
    }
    println!();
  }

  Ok(())
}
