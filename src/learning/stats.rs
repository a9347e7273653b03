//! Learning statistics.
//!
//! Per-session [`LearningStats`] live on the session and are updated by the
//! learner; the knowledge base keeps the global [`LearningSummary`] counters.

use crate::error::LearnError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Coarse shape of a learned input pattern, used for the shape histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternShape {
    Literal,
    SingleWildcard,
    UnderscoreWildcard,
    HashWildcard,
    DollarWildcard,
    Alternation,
}

impl PatternShape {
    /// First applicable shape, checked in the order `*`, `_`, `#`, `$`,
    /// alternation; anything else is literal.
    pub fn classify(pattern: &str) -> Self {
        let has = |symbol: &str| pattern.split_whitespace().any(|t| t == symbol);
        if has("*") {
            PatternShape::SingleWildcard
        } else if has("_") {
            PatternShape::UnderscoreWildcard
        } else if has("#") {
            PatternShape::HashWildcard
        } else if has("$") {
            PatternShape::DollarWildcard
        } else if pattern.contains('(') && pattern.contains('|') {
            PatternShape::Alternation
        } else {
            PatternShape::Literal
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            PatternShape::Literal => "literal",
            PatternShape::SingleWildcard => "single_wildcard",
            PatternShape::UnderscoreWildcard => "underscore_wildcard",
            PatternShape::HashWildcard => "hash_wildcard",
            PatternShape::DollarWildcard => "dollar_wildcard",
            PatternShape::Alternation => "alternation",
        }
    }
}

/// Counters and histograms for one session's learning activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningStats {
    pub total_learned: u64,
    pub total_rejected: u64,
    pub total_unlearned: u64,
    /// Rejections keyed by [`LearnError::reason`].
    pub rejections: BTreeMap<&'static str, u64>,
    /// Accepted patterns keyed by [`PatternShape::key`].
    pub pattern_shapes: BTreeMap<&'static str, u64>,
    /// Most recent template lengths in characters, oldest first.
    pub template_lengths: VecDeque<usize>,
    pub started_at: DateTime<Utc>,
    pub last_learned_at: Option<DateTime<Utc>>,
}

impl Default for LearningStats {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl LearningStats {
    pub fn starting_at(started_at: DateTime<Utc>) -> Self {
        LearningStats {
            total_learned: 0,
            total_rejected: 0,
            total_unlearned: 0,
            rejections: BTreeMap::new(),
            pattern_shapes: BTreeMap::new(),
            template_lengths: VecDeque::new(),
            started_at,
            last_learned_at: None,
        }
    }

    pub(crate) fn record_learned(&mut self, pattern: &str, template: &str, max_samples: usize) {
        self.total_learned += 1;
        *self.pattern_shapes.entry(PatternShape::classify(pattern).key()).or_default() += 1;
        self.template_lengths.push_back(template.chars().count());
        while self.template_lengths.len() > max_samples {
            self.template_lengths.pop_front();
        }
        self.last_learned_at = Some(Utc::now());
    }

    pub(crate) fn record_rejected(&mut self, error: &LearnError) {
        self.total_rejected += 1;
        *self.rejections.entry(error.reason()).or_default() += 1;
    }

    pub(crate) fn record_unlearned(&mut self, count: usize) {
        self.total_unlearned += count as u64;
    }

    /// Accepted rules per minute between the session start and `now`. Spans
    /// shorter than a minute count as one minute.
    pub fn learning_rate(&self, now: DateTime<Utc>) -> f64 {
        let minutes = (now - self.started_at).num_milliseconds() as f64 / 60_000.0;
        self.total_learned as f64 / minutes.max(1.0)
    }

    pub fn average_template_length(&self) -> Option<f64> {
        if self.template_lengths.is_empty() {
            return None;
        }
        Some(self.template_lengths.iter().sum::<usize>() as f64 / self.template_lengths.len() as f64)
    }
}

/// Knowledge-base-wide learning counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LearningSummary {
    pub learned: u64,
    pub rejected: u64,
    pub unlearned: u64,
    /// Categories currently in the knowledge base.
    pub categories: usize,
}
