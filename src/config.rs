//! Interpreter configuration.
//!
//! Every knob lives on [`Options`], which is handed to
//! [`Interpreter::new`](crate::Interpreter::new). Nothing is read from the
//! environment; loaders that keep settings in a file can deserialize `Options`
//! directly (all fields default, so partial documents are fine).

use serde::Deserialize;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Capacity and expiry of one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Maximum number of entries. Zero is treated as one.
    pub capacity: usize,
    /// Time-to-live in milliseconds. `None` disables expiry.
    pub ttl_ms: Option<u64>,
}

impl CacheOptions {
    pub const fn new(capacity: usize, ttl_ms: Option<u64>) -> Self {
        Self { capacity, ttl_ms }
    }

    pub(crate) fn capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub(crate) fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self { capacity: 1024, ttl_ms: Some(5 * 60 * 1000) }
    }
}

/// Admission limits applied to learned categories.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LearningLimits {
    /// Maximum pattern length in characters (applies to that/topic too).
    pub max_pattern_length: usize,
    /// Minimum pattern length in characters.
    pub min_pattern_length: usize,
    /// Maximum number of whitespace-separated pattern tokens.
    pub max_pattern_tokens: usize,
    /// Maximum template length in characters.
    pub max_template_length: usize,
    pub max_wildcards: usize,
    /// Maximum tag nesting depth inside a template.
    pub max_nesting_depth: usize,
    /// Maximum `srai`/`sr` tags per template.
    pub max_self_references: usize,
    /// Maximum `star`/`thatstar`/`topicstar` tags per template.
    pub max_wildcard_references: usize,
    /// How many template-length samples a session keeps for its statistics.
    pub max_template_samples: usize,
}

impl Default for LearningLimits {
    fn default() -> Self {
        Self {
            max_pattern_length: 256,
            min_pattern_length: 1,
            max_pattern_tokens: 32,
            max_template_length: 4096,
            max_wildcards: 10,
            max_nesting_depth: 8,
            max_self_references: 5,
            max_wildcard_references: 16,
            max_template_samples: 100,
        }
    }
}

/// Options that affect matching, evaluation and learning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Maximum `srai` nesting. A branch that would go deeper yields empty text.
    pub max_recursion_depth: usize,
    /// Bound on request/response histories of sessions created through
    /// [`Interpreter::new_session`](crate::Interpreter::new_session).
    pub history_limit: usize,
    pub variable_cache: CacheOptions,
    /// Compiled patterns, keyed by pattern text.
    pub pattern_cache: CacheOptions,
    /// Memoized match verdicts, keyed by (pattern text, context string).
    pub verdict_cache: CacheOptions,
    /// Parsed templates, keyed by template text.
    pub template_cache: CacheOptions,
    pub learning: LearningLimits,
    /// Seed for the `random` tag. `None` seeds from the OS.
    pub random_seed: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_recursion_depth: 16,
            history_limit: 32,
            variable_cache: CacheOptions::new(4096, Some(60 * 1000)),
            pattern_cache: CacheOptions::default(),
            verdict_cache: CacheOptions::new(8192, Some(5 * 60 * 1000)),
            template_cache: CacheOptions::new(1024, None),
            learning: LearningLimits::default(),
            random_seed: None,
        }
    }
}
