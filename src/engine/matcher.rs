//! Context-aware rule selection.
//!
//! This module is the operational core of matching:
//!
//! - Take a snapshot of the knowledge base and activate the rules that could
//!   match the input (first-word index + word gating; see
//!   `compiled_rules.rs` and `trigger.rs`).
//! - Match each active rule's input pattern, then its that/topic patterns.
//!   Compiled patterns and per-context verdicts come from two caches.
//! - Rank the eligible candidates and bind the winner's captures.
//!
//! ## Ranking
//!
//! Candidates are compared field by field, first difference wins:
//!
//! ```text
//! (1) constraint count        that + topic > one of them > none
//! (2) input weight vector     lexicographic, see pattern.rs
//! (3) that weight vector
//! (4) topic weight vector
//! (5) wildcard count          fewer wins
//! (6) serial                  most recently added wins
//! ```
//!
//! ## Context
//!
//! A that pattern is matched against the whole previous response first and,
//! failing that, against its last sentence, so `DO YOU LIKE CATS` still
//! applies after the bot said `I see. Do you like cats?`.

use super::cache::{CacheStats, TtlLruCache};
use super::compiled_rules::RuleMeta;
use super::knowledge::{Category, KnowledgeBase};
use super::metrics::{MatchDetails, MatchMetrics, RankedCandidate};
use super::pattern::{CompiledPattern, PatternMatch};
use super::trigger::Utterance;
use crate::config::Options;
use crate::transforms::strings::sentences;
use crate::variables::Bindings;
use std::cmp::{Ordering, Reverse};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// What to match: the input plus its conversational context.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchContext<'a> {
    pub input: &'a str,
    /// The previous response, `""` at the start of a conversation.
    pub that: &'a str,
    pub topic: &'a str,
}

/// The selected category with its wildcard captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub category: Arc<Category>,
    pub bindings: Bindings,
}

type VerdictKey = (String, String);

/// Pattern matcher with its two caches.
#[derive(Debug)]
pub struct PatternMatcher {
    patterns: TtlLruCache<String, Arc<CompiledPattern>>,
    verdicts: TtlLruCache<VerdictKey, Option<Arc<PatternMatch>>>,
}

/// A context the that/topic patterns are matched against. The that context
/// may have a second, narrower form (its last sentence).
struct ContextForms {
    full: Utterance,
    last_sentence: Option<Utterance>,
}

impl ContextForms {
    fn that(text: &str) -> Self {
        let full = Utterance::scan(text);
        let last_sentence =
            sentences(text).last().map(|s| Utterance::scan(s)).filter(|s| !s.is_empty() && s.upper != full.upper);
        ContextForms { full, last_sentence }
    }

    fn topic(text: &str) -> Self {
        ContextForms { full: Utterance::scan(text), last_sentence: None }
    }
}

struct Candidate<'s> {
    category: &'s Arc<Category>,
    meta: &'s RuleMeta,
    input: Arc<PatternMatch>,
    that: Option<(Arc<PatternMatch>, &'s Utterance)>,
    topic: Option<Arc<PatternMatch>>,
}

impl Candidate<'_> {
    fn wildcards(&self) -> usize {
        self.input.wildcards
            + self.that.as_ref().map_or(0, |(m, _)| m.wildcards)
            + self.topic.as_ref().map_or(0, |m| m.wildcards)
    }

    fn rank(&self, other: &Self) -> Ordering {
        let empty: &[u8] = &[];
        let that = |c: &Self| c.that.as_ref().map_or(empty, |(m, _)| m.weights.as_slice()).to_vec();
        let topic = |c: &Self| c.topic.as_ref().map_or(empty, |m| m.weights.as_slice()).to_vec();

        self.meta
            .constraints
            .count()
            .cmp(&other.meta.constraints.count())
            .then_with(|| self.input.weights.cmp(&other.input.weights))
            .then_with(|| that(self).cmp(&that(other)))
            .then_with(|| topic(self).cmp(&topic(other)))
            .then_with(|| Reverse(self.wildcards()).cmp(&Reverse(other.wildcards())))
            .then_with(|| self.meta.serial.cmp(&other.meta.serial))
    }

    fn summary(&self) -> RankedCandidate {
        RankedCandidate {
            pattern: self.category.pattern.clone(),
            that: self.category.that.clone(),
            topic: self.category.topic.clone(),
            weights: self.input.weights.clone(),
            wildcards: self.wildcards(),
            serial: self.meta.serial,
        }
    }
}

impl PatternMatcher {
    pub fn new(options: &Options) -> Self {
        PatternMatcher {
            patterns: TtlLruCache::from_options("patterns", &options.pattern_cache),
            verdicts: TtlLruCache::from_options("verdicts", &options.verdict_cache),
        }
    }

    /// Compiled form of `source`, cached by pattern text.
    pub fn compile(&self, source: &str, tag: &Arc<str>) -> Arc<CompiledPattern> {
        self.patterns
            .get_or_insert_with(source.to_string(), Some(tag), || Arc::new(CompiledPattern::compile(source)))
    }

    /// Match `pattern` against `context`, memoized per (pattern, context key).
    pub fn verdict(&self, pattern: &str, context: &Utterance, tag: &Arc<str>) -> Option<Arc<PatternMatch>> {
        let key = (pattern.to_string(), context.key());
        self.verdicts.get_or_insert_with(key, Some(tag), || self.compile(pattern, tag).matches(context).map(Arc::new))
    }

    /// Pick the best category for `ctx`, or `None` if nothing matches.
    pub fn resolve(&self, knowledge: &KnowledgeBase, ctx: &MatchContext<'_>) -> Option<MatchResult> {
        self.run(knowledge, ctx, false).selected
    }

    /// Like [`resolve`](Self::resolve), also reporting every eligible
    /// candidate in rank order and the run counters.
    pub fn resolve_with_details(&self, knowledge: &KnowledgeBase, ctx: &MatchContext<'_>) -> MatchDetails {
        self.run(knowledge, ctx, true)
    }

    fn run(&self, knowledge: &KnowledgeBase, ctx: &MatchContext<'_>, keep_ranking: bool) -> MatchDetails {
        let start = Instant::now();
        let tag = knowledge.tag();
        let snapshot = knowledge.snapshot();
        let input = Utterance::scan(ctx.input);
        let that = ContextForms::that(ctx.that);
        let topic = ContextForms::topic(ctx.topic);

        let activation = snapshot.activate(&input);
        let mut metrics = MatchMetrics {
            rules_total: snapshot.len(),
            rules_reached: activation.ids.len() + activation.gated,
            rules_gated: activation.gated,
            ..MatchMetrics::default()
        };

        let mut candidates: Vec<Candidate<'_>> = Vec::new();
        for &id in &activation.ids {
            let Some((category, meta)) = snapshot.get(id) else { continue };
            let Some(input_match) = self.verdict(&category.pattern, &input, tag) else { continue };
            metrics.pattern_matches += 1;

            let that_match = match &category.that {
                Some(pattern) => match self.match_context(pattern, &that, tag) {
                    Some(found) => Some(found),
                    None => continue,
                },
                None => None,
            };
            let topic_match = match &category.topic {
                Some(pattern) => match self.verdict(pattern, &topic.full, tag) {
                    Some(found) => Some(found),
                    None => continue,
                },
                None => None,
            };
            candidates.push(Candidate { category, meta, input: input_match, that: that_match, topic: topic_match });
        }
        metrics.eligible = candidates.len();

        let ranked: Vec<RankedCandidate> = if keep_ranking {
            let mut sorted: Vec<&Candidate<'_>> = candidates.iter().collect();
            sorted.sort_by(|a, b| b.rank(a));
            sorted.iter().map(|c| c.summary()).collect()
        } else {
            Vec::new()
        };

        let selected = candidates.iter().max_by(|a, b| a.rank(b)).map(|best| MatchResult {
            category: Arc::clone(best.category),
            bindings: Bindings {
                star: best.input.captured(&input),
                thatstar: best.that.as_ref().map(|(m, context)| m.captured(context)).unwrap_or_default(),
                topicstar: best.topic.as_ref().map(|m| m.captured(&topic.full)).unwrap_or_default(),
            },
        });
        metrics.elapsed = start.elapsed();

        match &selected {
            Some(result) => debug!(
                input = %input.key(),
                pattern = %result.category.pattern,
                eligible = metrics.eligible,
                reached = metrics.rules_reached,
                gated = metrics.rules_gated,
                "category selected"
            ),
            None => debug!(input = %input.key(), reached = metrics.rules_reached, "no category matched"),
        }
        trace!(?metrics, "match run");

        MatchDetails { input: input.key(), selected, ranked, metrics }
    }

    fn match_context<'c>(
        &self,
        pattern: &str,
        forms: &'c ContextForms,
        tag: &Arc<str>,
    ) -> Option<(Arc<PatternMatch>, &'c Utterance)> {
        if let Some(found) = self.verdict(pattern, &forms.full, tag) {
            return Some((found, &forms.full));
        }
        let last = forms.last_sentence.as_ref()?;
        self.verdict(pattern, last, tag).map(|found| (found, last))
    }

    /// Drop every cached pattern and verdict computed for `tag`.
    pub fn invalidate(&self, tag: &str) -> usize {
        self.patterns.invalidate_tag(tag) + self.verdicts.invalidate_tag(tag)
    }

    pub fn clear(&self) {
        self.patterns.clear();
        self.verdicts.clear();
    }

    pub fn pattern_stats(&self) -> CacheStats {
        self.patterns.stats()
    }

    pub fn verdict_stats(&self) -> CacheStats {
        self.verdicts.stats()
    }
}
