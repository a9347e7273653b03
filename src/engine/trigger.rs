//! Input normalization and trigger scanning.
//!
//! Every utterance (and every prior response or topic used as matching
//! context) goes through [`Utterance::scan`] once per match attempt. The scan
//! produces two things:
//!
//! - **Words**: the input split on whitespace, with punctuation trimmed from
//!   both ends of each word and inner apostrophes kept (`"what's"` stays one
//!   word). Both the original-case words and an uppercased copy are kept; the
//!   matcher compares against the uppercased copy and reads wildcard captures
//!   out of the original one.
//! - **Word set**: the distinct uppercased words, used to gate rules whose
//!   required literal words do not appear anywhere in the input (see
//!   `compiled_rules.rs`).
//!
//! Gating may let through rules that cannot match; a gated-in rule still has
//! to match its full pattern.

use std::collections::HashSet;

/// A normalized utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Words with edge punctuation removed, original case.
    pub words: Vec<String>,
    /// `words`, uppercased.
    pub upper: Vec<String>,
    pub word_set: HashSet<String>,
}

impl Utterance {
    pub fn scan(input: &str) -> Self {
        let words: Vec<String> = input.split_whitespace().filter_map(normalize_word).collect();
        let upper: Vec<String> = words.iter().map(|w| w.to_uppercase()).collect();
        let word_set = upper.iter().cloned().collect();
        Utterance { words, upper, word_set }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Canonical context string: uppercased words joined by single spaces.
    /// Two inputs with the same key match exactly the same patterns with the
    /// same capture positions.
    pub fn key(&self) -> String {
        self.upper.join(" ")
    }

    pub fn first_word(&self) -> Option<&str> {
        self.upper.first().map(String::as_str)
    }

    /// Original-case words `start..end`, joined by single spaces.
    pub fn span_text(&self, start: usize, end: usize) -> String {
        let end = end.min(self.words.len());
        if start >= end {
            return String::new();
        }
        self.words[start..end].join(" ")
    }
}

/// Trim punctuation from both ends of `word`. Returns `None` when nothing is
/// left (a bare `"?"` or `"--"`).
pub fn normalize_word(word: &str) -> Option<String> {
    let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.is_empty() { None } else { Some(trimmed.replace('\u{2019}', "'")) }
}

/// Uppercase and trim a single pattern word the same way input words are.
pub fn normalize_pattern_word(word: &str) -> Option<String> {
    normalize_word(word).map(|w| w.to_uppercase())
}
