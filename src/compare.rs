//! Side-by-side comparison of two stored runs of the same prompt.

use serde::{Deserialize, Serialize};

use crate::{
  error::{PlaygroundError, Result},
  history::{HistoryStore, KeyValueStore, StoredRun},
  params::ParameterTuple,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
  Int(u32),
  Float(f32),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDiff {
  pub field_name: String,
  pub value_a:    ParameterValue,
  pub value_b:    ParameterValue,
}

impl ParameterDiff {
  pub fn differs(&self) -> bool {
    self.value_a != self.value_b
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSegment {
  pub text:        String,
  pub is_addition: bool,
  pub is_removal:  bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDiff {
  pub index_a:  usize,
  pub index_b:  usize,
  pub text_a:   String,
  pub text_b:   String,
  pub segments: Vec<DiffSegment>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
  pub model_a:         String,
  pub model_b:         String,
  /// All four parameters, whether or not they differ.
  pub parameter_diffs: Vec<ParameterDiff>,
  pub response_diff:   ResponseDiff,
}

/// Compares the first entry of each run.
pub fn compare(
  run_a: &StoredRun,
  run_b: &StoredRun,
) -> Result<ComparisonResult> {
  ensure_same_prompt(run_a, run_b)?;
  Ok(ComparisonResult {
    model_a:         run_a.model.clone(),
    model_b:         run_b.model.clone(),
    parameter_diffs: parameter_diffs(
      &run_a.representative_parameters,
      &run_b.representative_parameters,
    ),
    response_diff:   response_diff(
      0,
      0,
      entry_text(run_a, 0).unwrap_or_default(),
      entry_text(run_b, 0).unwrap_or_default(),
    ),
  })
}

/// Compares entry `index_a` of `run_a` with entry `index_b` of `run_b`.
pub fn compare_at(
  run_a: &StoredRun,
  run_b: &StoredRun,
  index_a: usize,
  index_b: usize,
) -> Result<ComparisonResult> {
  ensure_same_prompt(run_a, run_b)?;
  let missing = |run: &StoredRun, index: usize| {
    let msg = format!("run {} has no entry {}", run.id, index);
    PlaygroundError::validation(msg)
  };
  let text_a =
    entry_text(run_a, index_a).ok_or_else(|| missing(run_a, index_a))?;
  let text_b =
    entry_text(run_b, index_b).ok_or_else(|| missing(run_b, index_b))?;

  Ok(ComparisonResult {
    model_a:         run_a.model.clone(),
    model_b:         run_b.model.clone(),
    parameter_diffs: parameter_diffs(
      &run_a.entries[index_a].parameters,
      &run_b.entries[index_b].parameters,
    ),
    response_diff:   response_diff(index_a, index_b, text_a, text_b),
  })
}

/// Response diffs for every index present in both runs.
pub fn compare_all(
  run_a: &StoredRun,
  run_b: &StoredRun,
) -> Result<Vec<ResponseDiff>> {
  ensure_same_prompt(run_a, run_b)?;
  let shared = run_a.entries.len().min(run_b.entries.len());
  Ok(
    (0..shared)
      .map(|i| {
        response_diff(
          i,
          i,
          entry_text(run_a, i).unwrap_or_default(),
          entry_text(run_b, i).unwrap_or_default(),
        )
      })
      .collect(),
  )
}

/// Looks both runs up in the history and compares them.
pub fn compare_by_ids<S: KeyValueStore>(
  history: &HistoryStore<S>,
  id_a: &str,
  id_b: &str,
) -> Result<ComparisonResult> {
  if id_a == id_b {
    return Err(PlaygroundError::validation(
      "exactly two different runs must be selected",
    ));
  }
  let runs = history.list();
  let find = |id: &str| runs.iter().find(|run| run.id == id);
  match (find(id_a), find(id_b)) {
    (Some(run_a), Some(run_b)) => compare(run_a, run_b),
    _ => Err(PlaygroundError::validation(
      "one or both of the selected runs could not be found",
    )),
  }
}

fn ensure_same_prompt(run_a: &StoredRun, run_b: &StoredRun) -> Result<()> {
  if run_a.user_prompt != run_b.user_prompt {
    return Err(PlaygroundError::validation(
      "cannot compare runs with different prompts",
    ));
  }
  Ok(())
}

/// Text of entry `index`; an entry without text reads as empty.
fn entry_text(run: &StoredRun, index: usize) -> Option<&str> {
  run
    .entries
    .get(index)
    .map(|entry| entry.text.as_deref().unwrap_or_default())
}

fn parameter_diffs(
  a: &ParameterTuple,
  b: &ParameterTuple,
) -> Vec<ParameterDiff> {
  let diff = |field_name: &str, value_a, value_b| ParameterDiff {
    field_name: field_name.to_string(),
    value_a,
    value_b,
  };
  vec![
    diff(
      "temperature",
      ParameterValue::Float(a.temperature),
      ParameterValue::Float(b.temperature),
    ),
    diff(
      "maxTokens",
      ParameterValue::Int(a.max_tokens),
      ParameterValue::Int(b.max_tokens),
    ),
    diff(
      "frequencyPenalty",
      ParameterValue::Float(a.frequency_penalty),
      ParameterValue::Float(b.frequency_penalty),
    ),
    diff(
      "presencePenalty",
      ParameterValue::Float(a.presence_penalty),
      ParameterValue::Float(b.presence_penalty),
    ),
  ]
}

fn response_diff(
  index_a: usize,
  index_b: usize,
  text_a: &str,
  text_b: &str,
) -> ResponseDiff {
  ResponseDiff {
    index_a,
    index_b,
    text_a: text_a.to_string(),
    text_b: text_b.to_string(),
    segments: diff_words(text_a, text_b),
  }
}

/// Splits text into alternating runs of whitespace and non-whitespace.
fn tokenize(text: &str) -> Vec<&str> {
  let mut tokens = Vec::new();
  let mut start = 0;
  let mut in_space = None;
  for (i, c) in text.char_indices() {
    let space = c.is_whitespace();
    if in_space.is_some_and(|prev| prev != space) {
      tokens.push(&text[start..i]);
      start = i;
    }
    in_space = Some(space);
  }
  if start < text.len() {
    tokens.push(&text[start..]);
  }
  tokens
}

#[derive(Clone, Copy, PartialEq)]
enum Op {
  Common,
  Removal,
  Addition,
}

fn push(segments: &mut Vec<(Op, String)>, op: Op, token: &str) {
  if let Some((last, text)) = segments.last_mut() {
    if *last == op {
      text.push_str(token);
      return;
    }
  }
  segments.push((op, token.to_string()));
}

/// Diffs the differing middle of two token runs. `lcs` is a flat row-major
/// table where cell `(i, j)` holds the LCS length of `a[i..]` and `b[j..]`.
fn diff_middle(segments: &mut Vec<(Op, String)>, a: &[&str], b: &[&str]) {
  let width = b.len() + 1;
  let mut lcs = vec![0u32; (a.len() + 1) * width];
  for i in (0..a.len()).rev() {
    for j in (0..b.len()).rev() {
      lcs[i * width + j] = if a[i] == b[j] {
        lcs[(i + 1) * width + j + 1] + 1
      } else {
        lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
      };
    }
  }

  let (mut i, mut j) = (0, 0);
  while i < a.len() && j < b.len() {
    if a[i] == b[j] {
      push(segments, Op::Common, a[i]);
      i += 1;
      j += 1;
    } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
      push(segments, Op::Removal, a[i]);
      i += 1;
    } else {
      push(segments, Op::Addition, b[j]);
      j += 1;
    }
  }
  for token in &a[i..] {
    push(segments, Op::Removal, token);
  }
  for token in &b[j..] {
    push(segments, Op::Addition, token);
  }
}

/// Word-level diff of `a` against `b` via longest common subsequence.
///
/// Adjacent tokens of the same kind are merged into one segment; where the
/// texts diverge, removals come before additions.
pub fn diff_words(a: &str, b: &str) -> Vec<DiffSegment> {
  let a = tokenize(a);
  let b = tokenize(b);

  let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
  let suffix = a[prefix..]
    .iter()
    .rev()
    .zip(b[prefix..].iter().rev())
    .take_while(|(x, y)| x == y)
    .count();
  let (head, a_mid, tail) = (
    &a[..prefix],
    &a[prefix..a.len() - suffix],
    &a[a.len() - suffix..],
  );
  let b_mid = &b[prefix..b.len() - suffix];

  let mut segments: Vec<(Op, String)> = Vec::new();
  for token in head {
    push(&mut segments, Op::Common, token);
  }
  diff_middle(&mut segments, a_mid, b_mid);
  for token in tail {
    push(&mut segments, Op::Common, token);
  }

  segments
    .into_iter()
    .map(|(op, text)| DiffSegment {
      text,
      is_addition: op == Op::Addition,
      is_removal: op == Op::Removal,
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::{batch::ResultEntry, history::MemoryStore};

  fn segment(text: &str, is_addition: bool, is_removal: bool) -> DiffSegment {
    DiffSegment {
      text: text.to_string(),
      is_addition,
      is_removal,
    }
  }

  fn common(text: &str) -> DiffSegment {
    segment(text, false, false)
  }

  fn added(text: &str) -> DiffSegment {
    segment(text, true, false)
  }

  fn removed(text: &str) -> DiffSegment {
    segment(text, false, true)
  }

  fn run(
    id: &str,
    user_prompt: &str,
    temperature: f32,
    texts: &[&str],
  ) -> StoredRun {
    let parameters = ParameterTuple {
      temperature,
      ..Default::default()
    };
    StoredRun {
      id: id.to_string(),
      created_at: Utc::now(),
      system_prompt: None,
      user_prompt: user_prompt.to_string(),
      model: "gpt-3.5-turbo".to_string(),
      representative_parameters: parameters,
      parameter_value_sets: None,
      entries: texts
        .iter()
        .map(|text| ResultEntry {
          text: Some(text.to_string()),
          ..ResultEntry::empty(parameters)
        })
        .collect(),
    }
  }

  #[test]
  fn single_word_change() {
    assert_eq!(diff_words("the cat sat", "the cat ran"), vec![
      common("the cat "),
      removed("sat"),
      added("ran"),
    ]);
  }

  #[test]
  fn identical_texts_are_one_common_segment() {
    assert_eq!(diff_words("same  words\nhere", "same  words\nhere"), vec![
      common("same  words\nhere")
    ]);
  }

  #[test]
  fn appended_and_dropped_words() {
    assert_eq!(diff_words("a b", "a b c"), vec![common("a b"), added(" c")]);
    assert_eq!(diff_words("x a b", "a b"), vec![removed("x "), common("a b")]);
  }

  #[test]
  fn change_between_shared_prefix_and_suffix() {
    assert_eq!(diff_words("a x y b", "a z b"), vec![
      common("a "),
      removed("x y"),
      added("z"),
      common(" b"),
    ]);
  }

  #[test]
  fn long_texts_with_one_changed_word() {
    let words: Vec<String> = (0..3000).map(|i| format!("w{}", i)).collect();
    let a = words.join(" ");
    let mut changed = words.clone();
    changed[1500] = "changed".into();
    let b = changed.join(" ");

    let segments = diff_words(&a, &b);
    assert_eq!(segments.len(), 4);
    assert_eq!(segments[1], removed("w1500"));
    assert_eq!(segments[2], added("changed"));
    assert!(segments[0].text.ends_with("w1499 "));
    assert!(segments[3].text.starts_with(" w1501"));
  }

  #[test]
  fn empty_sides() {
    assert_eq!(diff_words("", ""), vec![]);
    assert_eq!(diff_words("", "new text"), vec![added("new text")]);
    assert_eq!(diff_words("old", ""), vec![removed("old")]);
  }

  #[test]
  fn tokenize_separates_whitespace_runs() {
    assert_eq!(tokenize("  a bc\t\nd "), vec![
      "  ", "a", " ", "bc", "\t\n", "d", " "
    ]);
  }

  #[test]
  fn compare_reports_every_parameter() {
    let a = run("a", "hi", 0.1, &["the cat sat"]);
    let b = run("b", "hi", 0.9, &["the cat ran"]);
    let result = compare(&a, &b).unwrap();

    let names: Vec<&str> = result
      .parameter_diffs
      .iter()
      .map(|diff| diff.field_name.as_str())
      .collect();
    assert_eq!(names, vec![
      "temperature",
      "maxTokens",
      "frequencyPenalty",
      "presencePenalty"
    ]);
    assert!(result.parameter_diffs[0].differs());
    assert!(!result.parameter_diffs[1].differs());
    assert_eq!(result.response_diff.segments, vec![
      common("the cat "),
      removed("sat"),
      added("ran"),
    ]);
  }

  #[test]
  fn different_prompts_are_rejected() {
    let a = run("a", "hi", 0.1, &["x"]);
    let b = run("b", "hello", 0.1, &["x"]);
    assert!(matches!(compare(&a, &b), Err(PlaygroundError::Validation(_))));
    assert!(compare_all(&a, &b).is_err());
  }

  #[test]
  fn runs_without_entries_compare_as_empty_text() {
    let a = run("a", "hi", 0.1, &[]);
    let b = run("b", "hi", 0.1, &["something"]);
    let result = compare(&a, &b).unwrap();
    assert_eq!(result.response_diff.segments, vec![added("something")]);
  }

  #[test]
  fn compare_at_uses_requested_entries() {
    let a = run("a", "hi", 0.1, &["one", "two words"]);
    let b = run("b", "hi", 0.1, &["two words"]);
    let result = compare_at(&a, &b, 1, 0).unwrap();
    assert_eq!(result.response_diff.index_a, 1);
    assert_eq!(result.response_diff.segments, vec![common("two words")]);
    assert!(matches!(
      compare_at(&a, &b, 0, 3),
      Err(PlaygroundError::Validation(_))
    ));
  }

  #[test]
  fn compare_all_covers_shared_indices() {
    let a = run("a", "hi", 0.1, &["a", "b", "c"]);
    let b = run("b", "hi", 0.1, &["a", "x"]);
    let diffs = compare_all(&a, &b).unwrap();
    assert_eq!(diffs.len(), 2);
    assert_eq!(diffs[1].segments, vec![removed("b"), added("x")]);
  }

  #[test]
  fn compare_by_ids_requires_two_stored_runs() {
    let mut history = HistoryStore::new(MemoryStore::new());
    history.add(run("a", "hi", 0.1, &["the cat sat"]));
    history.add(run("b", "hi", 0.9, &["the cat ran"]));

    let result = compare_by_ids(&history, "a", "b").unwrap();
    assert_eq!(result.response_diff.text_b, "the cat ran");
    assert!(compare_by_ids(&history, "a", "a").is_err());
    assert!(compare_by_ids(&history, "a", "missing").is_err());
  }
}
