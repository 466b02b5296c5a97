//! Generation parameters and their expansion into a request matrix.

use serde::{Deserialize, Serialize};

use crate::error::{PlaygroundError, Result};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_PENALTY: f32 = 0.0;

/// One concrete combination of generation parameters.
///
/// Refer to `async-openai`'s `CreateChatCompletionRequest` for the meaning
/// of each field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterTuple {
  pub temperature:       f32,
  #[serde(alias = "max_tokens")]
  pub max_tokens:        u32,
  #[serde(alias = "frequency_penalty")]
  pub frequency_penalty: f32,
  #[serde(alias = "presence_penalty")]
  pub presence_penalty:  f32,
}

impl Default for ParameterTuple {
  fn default() -> Self {
    Self {
      temperature:       DEFAULT_TEMPERATURE,
      max_tokens:        DEFAULT_MAX_TOKENS,
      frequency_penalty: DEFAULT_PENALTY,
      presence_penalty:  DEFAULT_PENALTY,
    }
  }
}

/// Candidate values for every parameter dimension.
///
/// Deserialization goes through [`RawParameterSets`], so any accepted input
/// shape lands in this strict one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawParameterSets")]
pub struct ParameterValueSets {
  pub temperatures:        Vec<f32>,
  pub max_tokens:          Vec<u32>,
  pub frequency_penalties: Vec<f32>,
  pub presence_penalties:  Vec<f32>,
}

impl ParameterValueSets {
  /// A value set that expands to exactly `tuple`.
  pub fn single(tuple: ParameterTuple) -> Self {
    Self {
      temperatures:        vec![tuple.temperature],
      max_tokens:          vec![tuple.max_tokens],
      frequency_penalties: vec![tuple.frequency_penalty],
      presence_penalties:  vec![tuple.presence_penalty],
    }
  }

  /// Number of tuples `expand` produces.
  pub fn combinations(&self) -> usize {
    self.temperatures.len()
      * self.max_tokens.len()
      * self.frequency_penalties.len()
      * self.presence_penalties.len()
  }

  /// Cartesian product of all dimensions.
  ///
  /// Temperature is the outermost loop and presence penalty the innermost;
  /// within a dimension values keep their declared order. Duplicates are
  /// kept.
  pub fn expand(&self) -> Result<Vec<ParameterTuple>> {
    let dimensions = [
      ("temperatures", self.temperatures.is_empty()),
      ("maxTokens", self.max_tokens.is_empty()),
      ("frequencyPenalties", self.frequency_penalties.is_empty()),
      ("presencePenalties", self.presence_penalties.is_empty()),
    ];
    if let Some((name, _)) = dimensions.iter().find(|(_, empty)| *empty) {
      return Err(PlaygroundError::validation(format!(
        "{} must contain at least one value",
        name
      )));
    }

    let mut tuples = Vec::with_capacity(self.combinations());
    for &temperature in &self.temperatures {
      for &max_tokens in &self.max_tokens {
        for &frequency_penalty in &self.frequency_penalties {
          for &presence_penalty in &self.presence_penalties {
            tuples.push(ParameterTuple {
              temperature,
              max_tokens,
              frequency_penalty,
              presence_penalty,
            });
          }
        }
      }
    }
    Ok(tuples)
  }
}

impl Default for ParameterValueSets {
  fn default() -> Self {
    Self::single(ParameterTuple::default())
  }
}

/// Either a single value or a list of values, as submitted by a form.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParameterInput<T> {
  One(T),
  Many(Vec<T>),
}

impl<T> ParameterInput<T> {
  pub fn into_vec(self) -> Vec<T> {
    match self {
      ParameterInput::One(value) => vec![value],
      ParameterInput::Many(values) => values,
    }
  }
}

/// Loosely shaped parameter input accepted at the boundary.
///
/// Accepts camelCase or snake_case names, singular or plural, and scalars or
/// arrays. A dimension that is missing entirely takes the playground default.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawParameterSets {
  #[serde(alias = "temperatures")]
  pub temperature:       Option<ParameterInput<f32>>,
  #[serde(alias = "maxTokens")]
  pub max_tokens:        Option<ParameterInput<u32>>,
  #[serde(
    alias = "frequencyPenalty",
    alias = "frequencyPenalties",
    alias = "frequency_penalties"
  )]
  pub frequency_penalty: Option<ParameterInput<f32>>,
  #[serde(
    alias = "presencePenalty",
    alias = "presencePenalties",
    alias = "presence_penalties"
  )]
  pub presence_penalty:  Option<ParameterInput<f32>>,
}

impl RawParameterSets {
  pub fn normalize(self) -> ParameterValueSets {
    fn or_default<T>(input: Option<ParameterInput<T>>, default: T) -> Vec<T> {
      input.map_or_else(|| vec![default], ParameterInput::into_vec)
    }

    ParameterValueSets {
      temperatures:        or_default(self.temperature, DEFAULT_TEMPERATURE),
      max_tokens:          or_default(self.max_tokens, DEFAULT_MAX_TOKENS),
      frequency_penalties: or_default(self.frequency_penalty, DEFAULT_PENALTY),
      presence_penalties:  or_default(self.presence_penalty, DEFAULT_PENALTY),
    }
  }
}

impl From<RawParameterSets> for ParameterValueSets {
  fn from(raw: RawParameterSets) -> Self {
    raw.normalize()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sets(
    temperatures: Vec<f32>,
    max_tokens: Vec<u32>,
    frequency_penalties: Vec<f32>,
    presence_penalties: Vec<f32>,
  ) -> ParameterValueSets {
    ParameterValueSets {
      temperatures,
      max_tokens,
      frequency_penalties,
      presence_penalties,
    }
  }

  #[test]
  fn expand_yields_product_of_dimension_sizes() {
    let presence = vec![0.0, 0.5, 1.0, 1.5];
    let sets = sets(vec![0.1, 0.5, 0.9], vec![50, 100], vec![0.0], presence);
    let tuples = sets.expand().unwrap();
    assert_eq!(tuples.len(), 3 * 2 * 4);
    assert_eq!(tuples.len(), sets.combinations());
  }

  #[test]
  fn expand_orders_temperature_outermost() {
    let sets = sets(vec![0.1, 0.9], vec![10, 20], vec![0.0], vec![0.0, 1.0]);
    let tuples = sets.expand().unwrap();
    let order: Vec<(f32, u32, f32)> = tuples
      .iter()
      .map(|t| (t.temperature, t.max_tokens, t.presence_penalty))
      .collect();
    assert_eq!(order, vec![
      (0.1, 10, 0.0),
      (0.1, 10, 1.0),
      (0.1, 20, 0.0),
      (0.1, 20, 1.0),
      (0.9, 10, 0.0),
      (0.9, 10, 1.0),
      (0.9, 20, 0.0),
      (0.9, 20, 1.0),
    ]);
  }

  #[test]
  fn expand_is_deterministic() {
    let sets = sets(vec![0.3, 0.1], vec![5, 1], vec![0.2, 0.1], vec![0.0]);
    let first = serde_json::to_string(&sets.expand().unwrap()).unwrap();
    let second = serde_json::to_string(&sets.expand().unwrap()).unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn expand_keeps_duplicates() {
    let sets = sets(vec![0.5, 0.5], vec![10], vec![0.0], vec![0.0]);
    let tuples = sets.expand().unwrap();
    assert_eq!(tuples.len(), 2);
    assert_eq!(tuples[0], tuples[1]);
  }

  #[test]
  fn expand_rejects_any_empty_dimension() {
    let cases = [
      sets(vec![], vec![1], vec![0.0], vec![0.0]),
      sets(vec![0.1], vec![], vec![0.0], vec![0.0]),
      sets(vec![0.1], vec![1], vec![], vec![0.0]),
      sets(vec![0.1], vec![1], vec![0.0], vec![]),
    ];
    for case in cases {
      assert!(matches!(
        case.expand(),
        Err(PlaygroundError::Validation(_))
      ));
    }
  }

  #[test]
  fn raw_sets_accept_scalars_and_snake_case() {
    let raw: RawParameterSets = serde_json::from_str(
      r#"{"temperature": [0.4, 1.0], "max_tokens": 64, "frequency_penalty": 0.5}"#,
    )
    .unwrap();
    let sets = raw.normalize();
    assert_eq!(sets.temperatures, vec![0.4, 1.0]);
    assert_eq!(sets.max_tokens, vec![64]);
    assert_eq!(sets.frequency_penalties, vec![0.5]);
    assert_eq!(sets.presence_penalties, vec![DEFAULT_PENALTY]);
  }

  #[test]
  fn raw_sets_accept_plural_camel_case() {
    let raw: RawParameterSets = serde_json::from_str(
      r#"{"temperatures": [0.1], "maxTokens": [50], "frequencyPenalties": [0], "presencePenalties": []}"#,
    )
    .unwrap();
    let sets = raw.normalize();
    assert_eq!(sets.max_tokens, vec![50]);
    assert!(sets.presence_penalties.is_empty());
    assert!(sets.expand().is_err());
  }
}
