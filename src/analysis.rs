//! Cheap text statistics attached to every successful completion.

use serde::{Deserialize, Serialize};

const POSITIVE_WORDS: [&str; 8] = [
  "good",
  "great",
  "excellent",
  "amazing",
  "wonderful",
  "fantastic",
  "happy",
  "joy",
];

const NEGATIVE_WORDS: [&str; 8] = [
  "bad", "poor", "terrible", "awful", "horrible", "sad", "angry", "hate",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
  Positive,
  Negative,
  Neutral,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnalysis {
  pub word_count: usize,
  pub sentiment:  Sentiment,
}

/// Counts whitespace-separated words and scores sentiment against two small
/// lexicons.
///
/// Lexicon matches are case-insensitive and whole-word only: a word is a
/// maximal run of alphanumerics or `_`, so `goodness` does not count as
/// `good`.
pub fn analyze(text: &str) -> TextAnalysis {
  let word_count = text.split_whitespace().count();

  let mut positive = 0usize;
  let mut negative = 0usize;
  for word in text
    .split(|c: char| !(c.is_alphanumeric() || c == '_'))
    .filter(|word| !word.is_empty())
  {
    let word = word.to_lowercase();
    if POSITIVE_WORDS.contains(&word.as_str()) {
      positive += 1;
    } else if NEGATIVE_WORDS.contains(&word.as_str()) {
      negative += 1;
    }
  }

  let sentiment = if positive > negative {
    Sentiment::Positive
  } else if negative > positive {
    Sentiment::Negative
  } else {
    Sentiment::Neutral
  };

  TextAnalysis {
    word_count,
    sentiment,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn positive_words_win() {
    let analysis = analyze("I feel great and happy");
    assert_eq!(analysis.sentiment, Sentiment::Positive);
    assert_eq!(analysis.word_count, 5);
  }

  #[test]
  fn negative_words_win() {
    assert_eq!(
      analyze("This is terrible and awful").sentiment,
      Sentiment::Negative
    );
  }

  #[test]
  fn no_lexicon_words_is_neutral() {
    assert_eq!(analyze("The cat sat").sentiment, Sentiment::Neutral);
  }

  #[test]
  fn ties_are_neutral() {
    assert_eq!(analyze("good but bad").sentiment, Sentiment::Neutral);
  }

  #[test]
  fn matches_whole_words_only() {
    assert_eq!(analyze("goodness").sentiment, Sentiment::Neutral);
    assert_eq!(analyze("badge sadly").sentiment, Sentiment::Neutral);
  }

  #[test]
  fn matching_ignores_case_and_punctuation() {
    assert_eq!(analyze("GREAT!").sentiment, Sentiment::Positive);
    assert_eq!(analyze("(Hate), hate.").sentiment, Sentiment::Negative);
  }

  #[test]
  fn word_count_collapses_whitespace() {
    assert_eq!(analyze("").word_count, 0);
    assert_eq!(analyze("   \n\t ").word_count, 0);
    assert_eq!(analyze("  one\n\ntwo   three ").word_count, 3);
  }
}
