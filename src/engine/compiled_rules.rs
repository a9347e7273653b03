//! Rule snapshots and their activation index.
//!
//! A [`RuleSet`] is an immutable, indexed view of every category in a
//! knowledge base. Matching works on an `Arc<RuleSet>` cloned out of the
//! knowledge base, so a learn or unlearn that happens mid-match builds a new
//! set and never disturbs the one being read.
//!
//! Indexing happens once per rule when it enters a set:
//!
//! - **First word** (`RuleIndex::by_first_word`): a pattern that starts with a
//!   literal (or an alternation) can only match inputs starting with that word,
//!   so it is listed under it. Patterns starting with a wildcard are
//!   `always_on`.
//! - **Required words** (`RuleMeta::required_words`): every literal of the
//!   pattern. A candidate is dropped unless all of them occur in the input.
//! - **Alternative words** (`RuleMeta::alternatives`): per alternation group,
//!   at least one of its words must occur in the input.
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `RuleSet::categories` and `RuleSet::metas`;
//!   the two vectors stay aligned.
//! - `RuleMeta::serial` increases with insertion order across the lifetime of
//!   the knowledge base, including reloads.

use super::knowledge::Category;
use super::pattern::CompiledPattern;
use super::trigger::Utterance;
use std::collections::HashMap;
use std::sync::Arc;

/// Rule identifier (index into the snapshot's vectors).
pub(crate) type RuleId = usize;

bitflags::bitflags! {
    /// Context constraints a category carries besides its input pattern.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Constraints: u8 {
        const THAT  = 1 << 0;
        const TOPIC = 1 << 1;
    }
}

impl Constraints {
    pub fn of(category: &Category) -> Self {
        let mut constraints = Constraints::empty();
        if category.that.is_some() {
            constraints |= Constraints::THAT;
        }
        if category.topic.is_some() {
            constraints |= Constraints::TOPIC;
        }
        constraints
    }

    /// Number of constraints; more constraints means more specific.
    pub fn count(self) -> u32 {
        self.bits().count_ones()
    }
}

/// Per-rule data derived when the rule is indexed.
#[derive(Debug, Clone)]
pub struct RuleMeta {
    pub serial: u64,
    pub constraints: Constraints,
    pub required_words: Vec<String>,
    pub alternatives: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    pub always_on: Vec<RuleId>,
    pub by_first_word: HashMap<String, Vec<RuleId>>,
}

/// Rules selected for an input, before pattern matching.
#[derive(Debug, Clone, Default)]
pub struct Activation {
    pub ids: Vec<RuleId>,
    /// Rules reached through the index but dropped by word gating.
    pub gated: usize,
}

/// Immutable, indexed snapshot of a knowledge base's categories.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub(crate) categories: Vec<Arc<Category>>,
    pub(crate) metas: Vec<RuleMeta>,
    pub(crate) index: RuleIndex,
    by_signature: HashMap<String, Vec<RuleId>>,
}

impl RuleSet {
    pub fn new(entries: impl IntoIterator<Item = (Arc<Category>, u64)>) -> Self {
        let mut set = RuleSet::default();
        for (category, serial) in entries {
            set.push(category, serial);
        }
        set
    }

    /// Index one more rule.
    pub(crate) fn push(&mut self, category: Arc<Category>, serial: u64) -> RuleId {
        let id = self.categories.len();
        let compiled = CompiledPattern::compile(&category.pattern);

        match compiled.first_words() {
            Some(mut words) => {
                words.dedup();
                for word in words {
                    let ids = self.index.by_first_word.entry(word).or_default();
                    if ids.last() != Some(&id) {
                        ids.push(id);
                    }
                }
            }
            None => self.index.always_on.push(id),
        }
        self.by_signature.entry(category.signature()).or_default().push(id);
        self.metas.push(RuleMeta {
            serial,
            constraints: Constraints::of(&category),
            required_words: compiled.required_words(),
            alternatives: compiled.alternative_words(),
        });
        self.categories.push(category);
        id
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn categories(&self) -> &[Arc<Category>] {
        &self.categories
    }

    pub fn get(&self, id: RuleId) -> Option<(&Arc<Category>, &RuleMeta)> {
        Some((self.categories.get(id)?, self.metas.get(id)?))
    }

    /// Rule with the given signature (see [`Category::signature`]) and serial.
    pub(crate) fn find(&self, signature: &str, serial: u64) -> Option<RuleId> {
        self.by_signature.get(signature)?.iter().copied().find(|&id| self.metas[id].serial == serial)
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (Arc<Category>, u64)> + '_ {
        self.categories.iter().zip(&self.metas).map(|(category, meta)| (Arc::clone(category), meta.serial))
    }

    /// Rules that could match `input`: the always-on rules plus those indexed
    /// under the input's first word, minus those whose words are missing.
    pub(crate) fn activate(&self, input: &Utterance) -> Activation {
        let mut ids: Vec<RuleId> = self.index.always_on.clone();
        if let Some(first) = input.first_word() {
            ids.extend(self.index.by_first_word.get(first).into_iter().flatten().copied());
        }
        ids.sort_unstable();
        ids.dedup();

        let reached = ids.len();
        ids.retain(|&id| {
            let meta = &self.metas[id];
            meta.required_words.iter().all(|word| input.word_set.contains(word))
                && meta.alternatives.iter().all(|group| group.iter().any(|word| input.word_set.contains(word)))
        });
        let gated = reached - ids.len();
        Activation { ids, gated }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> RuleSet {
        RuleSet::new(patterns.iter().enumerate().map(|(i, p)| (Arc::new(Category::new(*p, "ok")), i as u64)))
    }

    fn active(set: &RuleSet, input: &str) -> Vec<String> {
        set.activate(&Utterance::scan(input)).ids.iter().map(|&id| set.categories[id].pattern.clone()).collect()
    }

    #[test]
    fn first_word_index_and_always_on() {
        let set = set(&["HELLO *", "* BYE", "(HI|HEY) THERE", "GOOD MORNING"]);
        assert_eq!(set.index.always_on, vec![1]);
        assert_eq!(active(&set, "hello you"), vec!["HELLO *"]);
        assert_eq!(active(&set, "hey there"), vec!["(HI|HEY) THERE"]);
        assert_eq!(active(&set, "ok bye"), vec!["* BYE"]);
    }

    #[test]
    fn required_words_gate_candidates() {
        let set = set(&["* LIKE CATS", "* LIKE (DOGS|BIRDS)"]);
        let activation = set.activate(&Utterance::scan("I like birds"));
        assert_eq!(activation.ids, vec![1]);
        assert_eq!(activation.gated, 1);
    }

    #[test]
    fn constraints_count_context_patterns() {
        let plain = Category::new("YES", "ok");
        let that = Category::new("YES", "ok").with_that("DO YOU LIKE CATS");
        let both = that.clone().with_topic("PETS");
        assert_eq!(Constraints::of(&plain).count(), 0);
        assert_eq!(Constraints::of(&that), Constraints::THAT);
        assert_eq!(Constraints::of(&both).count(), 2);
    }

    #[test]
    fn signature_lookup_needs_the_serial() {
        let set = RuleSet::new([
            (Arc::new(Category::new("YES", "a")), 4),
            (Arc::new(Category::new("yes", "b")), 9),
            (Arc::new(Category::new("YES", "c").with_that("REALLY")), 11),
        ]);
        let plain = Category::new("YES", "ignored").signature();
        assert_eq!(set.find(&plain, 9), Some(1));
        assert_eq!(set.find(&plain, 4), Some(0));
        assert_eq!(set.find(&plain, 11), None);
        assert_eq!(set.find(&Category::new("NO", "x").signature(), 4), None);
    }
}
