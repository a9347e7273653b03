//! Runtime rule learning.
//!
//! [`Learner::learn`] admits a candidate category after validation
//! (`validate.rs`) and records it in both the knowledge base and the
//! session's learned log; [`Learner::unlearn`] removes categories the same
//! session learned. Statistics live in `stats.rs`.
//!
//! Outcomes never reach chat output: the `learn` and `unlearn` tags evaluate
//! to empty text. Rejections are visible through [`LearningStats`], the
//! knowledge base's [`LearningSummary`] and a `warn` event.

#[path = "learning/stats.rs"]
mod stats;
#[path = "learning/validate.rs"]
mod validate;

pub use stats::{LearningStats, LearningSummary, PatternShape};
pub use validate::validate;

use crate::config::LearningLimits;
use crate::engine::{Category, KnowledgeBase};
use crate::error::LearnError;
use crate::session::ChatSession;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// A category in a session's learned log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnedCategory {
    pub category: Category,
    /// Serial the knowledge base assigned when the category was added.
    pub serial: u64,
    pub learned_at: DateTime<Utc>,
}

/// Admits and removes learned categories.
#[derive(Debug, Clone, Default)]
pub struct Learner {
    limits: LearningLimits,
}

impl Learner {
    pub fn new(limits: LearningLimits) -> Self {
        Learner { limits }
    }

    pub fn limits(&self) -> &LearningLimits {
        &self.limits
    }

    pub fn learn(
        &self,
        candidate: Category,
        session: &mut ChatSession,
        knowledge: &KnowledgeBase,
    ) -> Result<(), LearnError> {
        if let Err(error) = validate(&candidate, &self.limits) {
            warn!(session = session.id(), pattern = %candidate.pattern, reason = error.reason(), %error, "learn rejected");
            session.learning_stats_mut().record_rejected(&error);
            knowledge.record_rejected();
            return Err(error);
        }

        let serial = knowledge.add_category(candidate.clone());
        knowledge.record_learned();
        session.learning_stats_mut().record_learned(
            &candidate.pattern,
            &candidate.template,
            self.limits.max_template_samples,
        );
        info!(session = session.id(), pattern = %candidate.pattern, serial, "category learned");
        session.learned_mut().push(LearnedCategory { category: candidate, serial, learned_at: Utc::now() });
        Ok(())
    }

    /// Remove categories this session learned that match `candidate` on
    /// pattern and template (and on that/topic when the candidate has them).
    /// Only the exact rules the session added leave the knowledge base.
    /// Returns how many log entries were removed; zero is not an error.
    pub fn unlearn(&self, candidate: &Category, session: &mut ChatSession, knowledge: &KnowledgeBase) -> usize {
        let (removed, kept): (Vec<LearnedCategory>, Vec<LearnedCategory>) =
            std::mem::take(session.learned_mut()).into_iter().partition(|entry| matches(candidate, &entry.category));
        *session.learned_mut() = kept;

        if removed.is_empty() {
            debug!(session = session.id(), pattern = %candidate.pattern, "nothing to unlearn");
            return 0;
        }
        for entry in &removed {
            knowledge.remove(&entry.category, entry.serial);
        }
        session.learning_stats_mut().record_unlearned(removed.len());
        knowledge.record_unlearned(removed.len());
        info!(session = session.id(), pattern = %candidate.pattern, removed = removed.len(), "categories unlearned");
        removed.len()
    }
}

fn normalize(pattern: &str) -> String {
    pattern.split_whitespace().map(str::to_uppercase).collect::<Vec<_>>().join(" ")
}

fn matches(candidate: &Category, learned: &Category) -> bool {
    let optional = |want: &Option<String>, have: &Option<String>| match want {
        Some(want) => have.as_deref().map(normalize) == Some(normalize(want)),
        None => true,
    };
    normalize(&candidate.pattern) == normalize(&learned.pattern)
        && candidate.template.trim() == learned.template.trim()
        && optional(&candidate.that, &learned.that)
        && optional(&candidate.topic, &learned.topic)
}
