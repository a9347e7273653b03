//! Match run metrics.
//!
//! [`PatternMatcher::resolve`](super::PatternMatcher::resolve) collects these
//! counters on every run and logs them at debug level;
//! [`Interpreter::explain`](crate::Interpreter::explain) hands them to the
//! caller together with the ranked candidates.

use super::matcher::MatchResult;
use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchMetrics {
    /// Rules in the snapshot.
    pub rules_total: usize,
    /// Rules reached through the first-word index or always on.
    pub rules_reached: usize,
    /// Reached rules dropped because required words were missing.
    pub rules_gated: usize,
    /// Rules whose input pattern matched.
    pub pattern_matches: usize,
    /// Matching rules whose that/topic constraints also held.
    pub eligible: usize,
    pub elapsed: Duration,
}

/// One eligible candidate, as ranked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCandidate {
    pub pattern: String,
    pub that: Option<String>,
    pub topic: Option<String>,
    /// Per-word precedence weights of the input match.
    pub weights: Vec<u8>,
    pub wildcards: usize,
    pub serial: u64,
}

/// Everything known about one resolution.
#[derive(Debug, Clone)]
pub struct MatchDetails {
    /// Normalized input the patterns were matched against.
    pub input: String,
    pub selected: Option<MatchResult>,
    /// Eligible candidates, best first.
    pub ranked: Vec<RankedCandidate>,
    pub metrics: MatchMetrics,
}
