//! Pattern compilation and matching.
//!
//! A pattern is a whitespace-separated token sequence, matched
//! case-insensitively against a normalized [`Utterance`]:
//!
//! ```text
//! token      matches                         weight per consumed word
//! WORD       that word                       5
//! (a|b c)    any one option, words in order  4
//! $          exactly one word                3
//! _          one or more words               2
//! *          one or more words               1
//! #          zero or more words              0
//! ```
//!
//! Every wildcard and every alternation captures the words it consumed. The
//! weight column is what the matcher ranks candidates by: a match produces one
//! weight per input word, and between two matches of the same input the one
//! whose weight vector is lexicographically greater is more specific.
//!
//! Wildcards are tried shortest-first, so the first successful alignment
//! leaves as much as possible to the tokens that follow.

use super::trigger::{Utterance, normalize_pattern_word};

pub const LITERAL_WEIGHT: u8 = 5;
pub const ALTERNATION_WEIGHT: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wildcard {
    /// `_`: one or more words, preferred over `*`.
    Underscore,
    /// `*`: one or more words.
    Star,
    /// `#`: zero or more words.
    Hash,
    /// `$`: exactly one word.
    Dollar,
}

impl Wildcard {
    pub fn from_symbol(token: &str) -> Option<Self> {
        match token {
            "_" => Some(Wildcard::Underscore),
            "*" => Some(Wildcard::Star),
            "#" => Some(Wildcard::Hash),
            "$" => Some(Wildcard::Dollar),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Wildcard::Underscore => '_',
            Wildcard::Star => '*',
            Wildcard::Hash => '#',
            Wildcard::Dollar => '$',
        }
    }

    pub fn weight(self) -> u8 {
        match self {
            Wildcard::Dollar => 3,
            Wildcard::Underscore => 2,
            Wildcard::Star => 1,
            Wildcard::Hash => 0,
        }
    }

    fn min_len(self) -> usize {
        match self {
            Wildcard::Hash => 0,
            _ => 1,
        }
    }

    fn max_len(self, remaining: usize) -> usize {
        match self {
            Wildcard::Dollar => remaining.min(1),
            _ => remaining,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternToken {
    Literal(String),
    Wildcard(Wildcard),
    /// Options, each a non-empty word sequence.
    Alternation(Vec<Vec<String>>),
}

impl PatternToken {
    fn min_len(&self) -> usize {
        match self {
            PatternToken::Literal(_) => 1,
            PatternToken::Wildcard(w) => w.min_len(),
            PatternToken::Alternation(options) => options.iter().map(Vec::len).min().unwrap_or(0),
        }
    }
}

/// A pattern ready for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPattern {
    source: String,
    tokens: Vec<PatternToken>,
    /// `min_suffix[i]`: fewest input words tokens `i..` can consume.
    min_suffix: Vec<usize>,
}

/// Where a pattern matched an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Word ranges captured by wildcards and alternations, in pattern order.
    pub captures: Vec<(usize, usize)>,
    /// One weight per input word.
    pub weights: Vec<u8>,
    pub wildcards: usize,
}

impl PatternMatch {
    /// Captured text, original case, one entry per capture.
    pub fn captured(&self, utterance: &Utterance) -> Vec<String> {
        self.captures.iter().map(|&(start, end)| utterance.span_text(start, end)).collect()
    }
}

impl CompiledPattern {
    /// Compile `source`. Never fails: stray parentheses and punctuation are
    /// treated the way input normalization would treat them.
    pub fn compile(source: &str) -> Self {
        let tokens = tokenize(source);
        let mut min_suffix = vec![0; tokens.len() + 1];
        for i in (0..tokens.len()).rev() {
            min_suffix[i] = min_suffix[i + 1] + tokens[i].min_len();
        }
        CompiledPattern { source: source.to_string(), tokens, min_suffix }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[PatternToken] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn wildcard_count(&self) -> usize {
        self.tokens.iter().filter(|t| matches!(t, PatternToken::Wildcard(_))).count()
    }

    /// Words the input must start with for this pattern to match, or `None`
    /// when the pattern starts with a wildcard (or is empty).
    pub fn first_words(&self) -> Option<Vec<String>> {
        match self.tokens.first()? {
            PatternToken::Literal(word) => Some(vec![word.clone()]),
            PatternToken::Alternation(options) => Some(options.iter().filter_map(|o| o.first().cloned()).collect()),
            PatternToken::Wildcard(_) => None,
        }
    }

    /// Literal words that must all appear somewhere in a matching input.
    pub fn required_words(&self) -> Vec<String> {
        let mut words: Vec<String> = self
            .tokens
            .iter()
            .filter_map(|t| match t {
                PatternToken::Literal(word) => Some(word.clone()),
                _ => None,
            })
            .collect();
        words.sort_unstable();
        words.dedup();
        words
    }

    /// For each alternation, every word of every option; a matching input
    /// contains at least one word of each group.
    pub fn alternative_words(&self) -> Vec<Vec<String>> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                PatternToken::Alternation(options) => {
                    let mut words: Vec<String> = options.iter().flatten().cloned().collect();
                    words.sort_unstable();
                    words.dedup();
                    Some(words)
                }
                _ => None,
            })
            .collect()
    }

    pub fn matches(&self, utterance: &Utterance) -> Option<PatternMatch> {
        let width = utterance.len() + 1;
        let mut walk = Walk {
            captures: Vec::new(),
            weights: Vec::with_capacity(utterance.len()),
            failed: vec![false; width * (self.tokens.len() + 1)],
            width,
        };
        if self.walk(0, 0, &utterance.upper, &mut walk) {
            Some(PatternMatch { captures: walk.captures, weights: walk.weights, wildcards: self.wildcard_count() })
        } else {
            None
        }
    }

    /// Depth-first alignment of tokens `ti..` against `input[pos..]`.
    ///
    /// ```text
    /// pattern: MY NAME IS *
    /// input:   MY NAME IS ADA LOVELACE
    ///          5  5    5  1   1          <- weights
    ///                     [-----------]  <- capture (3, 5)
    /// ```
    fn walk(&self, ti: usize, pos: usize, input: &[String], walk: &mut Walk) -> bool {
        let slot = ti * walk.width + pos;
        if walk.failed[slot] {
            return false;
        }
        let found = self.step(ti, pos, input, walk);
        if !found {
            walk.failed[slot] = true;
        }
        found
    }

    fn step(&self, ti: usize, pos: usize, input: &[String], walk: &mut Walk) -> bool {
        let remaining = input.len() - pos;
        if remaining < self.min_suffix[ti] {
            return false;
        }
        let Some(token) = self.tokens.get(ti) else {
            return remaining == 0;
        };

        match token {
            PatternToken::Literal(word) => {
                if input[pos] != *word {
                    return false;
                }
                walk.weights.push(LITERAL_WEIGHT);
                if self.walk(ti + 1, pos + 1, input, walk) {
                    return true;
                }
                walk.weights.pop();
                false
            }
            PatternToken::Alternation(options) => {
                for option in options {
                    let end = pos + option.len();
                    if end > input.len() || input[pos..end] != option[..] {
                        continue;
                    }
                    let mark = walk.mark();
                    walk.push(pos, end, ALTERNATION_WEIGHT);
                    if self.walk(ti + 1, end, input, walk) {
                        return true;
                    }
                    walk.reset(mark);
                }
                false
            }
            PatternToken::Wildcard(wildcard) => {
                for len in wildcard.min_len()..=wildcard.max_len(remaining) {
                    let mark = walk.mark();
                    walk.push(pos, pos + len, wildcard.weight());
                    if self.walk(ti + 1, pos + len, input, walk) {
                        return true;
                    }
                    walk.reset(mark);
                }
                false
            }
        }
    }
}

struct Walk {
    captures: Vec<(usize, usize)>,
    weights: Vec<u8>,
    /// `(token, position)` states already known not to lead to a match.
    failed: Vec<bool>,
    width: usize,
}

impl Walk {
    fn mark(&self) -> (usize, usize) {
        (self.captures.len(), self.weights.len())
    }

    fn push(&mut self, start: usize, end: usize, weight: u8) {
        self.captures.push((start, end));
        self.weights.extend(std::iter::repeat_n(weight, end - start));
    }

    fn reset(&mut self, (captures, weights): (usize, usize)) {
        self.captures.truncate(captures);
        self.weights.truncate(weights);
    }
}

fn tokenize(source: &str) -> Vec<PatternToken> {
    let mut tokens = Vec::new();
    let mut rest = source.trim_start();
    while !rest.is_empty() {
        let group = rest.strip_prefix('(').and_then(|body| body.find(')').map(|close| (body, close)));
        if let Some((body, close)) = group {
            let options: Vec<Vec<String>> = body[..close]
                .split('|')
                .map(|option| option.split_whitespace().filter_map(normalize_pattern_word).collect::<Vec<_>>())
                .filter(|option| !option.is_empty())
                .collect();
            if !options.is_empty() {
                tokens.push(PatternToken::Alternation(options));
            }
            rest = body[close + 1..].trim_start();
            continue;
        }

        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let word = &rest[..end];
        rest = rest[end..].trim_start();
        match Wildcard::from_symbol(word) {
            Some(wildcard) => tokens.push(PatternToken::Wildcard(wildcard)),
            None => tokens.extend(normalize_pattern_word(word).map(PatternToken::Literal)),
        }
    }
    tokens
}
