//! Error types.
//!
//! Evaluation itself never fails: unknown variables, out-of-range indices and
//! unknown tags all degrade to empty or literal output. Only two things are
//! reported as errors:
//!
//! - [`ProcessError`]: a turn that produced no answer (no rule matched, or the
//!   utterance was blank). Callers apply their own fallback.
//! - [`LearnError`]: a candidate rule refused at admission time. The variant
//!   names the violated rule; [`LearnError::reason`] gives a stable key used by
//!   the rejection statistics.

use thiserror::Error;

/// Outcome of a turn that produced no response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// No category matched the utterance. This is distinct from matching a
    /// category whose template evaluates to empty text.
    #[error("no rule matched input '{input}'")]
    NoMatch { input: String },

    #[error("input is empty")]
    EmptyInput,
}

/// Reasons a candidate category is refused by the learner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LearnError {
    #[error("pattern cannot be empty")]
    EmptyPattern,

    #[error("template cannot be empty")]
    EmptyTemplate,

    #[error("{field} pattern too long (max: {max}, got: {got})")]
    PatternTooLong { field: &'static str, max: usize, got: usize },

    #[error("{field} pattern too short (min: {min}, got: {got})")]
    PatternTooShort { field: &'static str, min: usize, got: usize },

    #[error("{field} pattern too complex (max tokens: {max}, got: {got})")]
    PatternTooComplex { field: &'static str, max: usize, got: usize },

    #[error("template too long (max: {max}, got: {got})")]
    TemplateTooLong { max: usize, got: usize },

    #[error("{field} pattern has too many wildcards (max: {max}, got: {got})")]
    TooManyWildcards { field: &'static str, max: usize, got: usize },

    #[error("{field} pattern has consecutive wildcards at token {position}")]
    ConsecutiveWildcards { field: &'static str, position: usize },

    #[error("{field} pattern has unbalanced parentheses")]
    UnbalancedParentheses { field: &'static str },

    #[error("template has unbalanced tags: {detail}")]
    UnbalancedTags { detail: String },

    #[error("{field} pattern contains invalid characters: {chars}")]
    InvalidCharacters { field: &'static str, chars: String },

    #[error("{field} contains dangerous content: {snippet}")]
    DangerousContent { field: &'static str, snippet: String },

    #[error("template has too many self-references (max: {max}, got: {got})")]
    TooManySelfReferences { max: usize, got: usize },

    #[error("template has too many wildcard references (max: {max}, got: {got})")]
    TooManyWildcardReferences { max: usize, got: usize },

    #[error("{field} pattern has a bad alternation group: {group}")]
    BadAlternation { field: &'static str, group: String },

    #[error("template has excessive nesting (max depth: {max}, got: {got})")]
    ExcessiveNesting { max: usize, got: usize },

    #[error("template uses an unknown tag: <{name}>")]
    UnknownTag { name: String },
}

impl LearnError {
    /// Stable key for the violated rule, independent of the offending values.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyPattern => "empty_pattern",
            Self::EmptyTemplate => "empty_template",
            Self::PatternTooLong { .. } => "pattern_too_long",
            Self::PatternTooShort { .. } => "pattern_too_short",
            Self::PatternTooComplex { .. } => "pattern_too_complex",
            Self::TemplateTooLong { .. } => "template_too_long",
            Self::TooManyWildcards { .. } => "too_many_wildcards",
            Self::ConsecutiveWildcards { .. } => "consecutive_wildcards",
            Self::UnbalancedParentheses { .. } => "unbalanced_parentheses",
            Self::UnbalancedTags { .. } => "unbalanced_tags",
            Self::InvalidCharacters { .. } => "invalid_characters",
            Self::DangerousContent { .. } => "dangerous_content",
            Self::TooManySelfReferences { .. } => "too_many_self_references",
            Self::TooManyWildcardReferences { .. } => "too_many_wildcard_references",
            Self::BadAlternation { .. } => "bad_alternation",
            Self::ExcessiveNesting { .. } => "excessive_nesting",
            Self::UnknownTag { .. } => "unknown_tag",
        }
    }
}
