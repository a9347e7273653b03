//! Categories and the knowledge base that holds them.
//!
//! The knowledge base is the only rule store. Loading code adds categories
//! with [`KnowledgeBase::add_category`] / [`KnowledgeBase::extend`]; the
//! learner adds and removes them at runtime. Every mutation builds a new
//! [`RuleSet`] and swaps it in under a short write lock, so readers (the
//! matcher) only ever hold a complete snapshot.

use super::compiled_rules::RuleSet;
use crate::learning::LearningSummary;
use crate::variables::scope_fingerprint;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// A rule: input pattern, optional context patterns, response template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category {
    pub pattern: String,
    /// Pattern the previous response must match.
    pub that: Option<String>,
    /// Pattern the current topic must match.
    pub topic: Option<String>,
    /// Raw template text; parsed on first evaluation.
    pub template: String,
}

impl Category {
    pub fn new(pattern: impl Into<String>, template: impl Into<String>) -> Self {
        Category { pattern: pattern.into(), that: None, topic: None, template: template.into() }
    }

    /// Blank text means no constraint.
    pub fn with_that(mut self, that: impl Into<String>) -> Self {
        self.that = non_blank(that.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = non_blank(topic.into());
        self
    }

    /// Normalized `(pattern, that, topic)` key; two categories with the same
    /// signature compete for exactly the same inputs.
    pub fn signature(&self) -> String {
        let norm = |s: &str| s.split_whitespace().map(str::to_uppercase).collect::<Vec<_>>().join(" ");
        format!(
            "{} <that> {} <topic> {}",
            norm(&self.pattern),
            self.that.as_deref().map(norm).unwrap_or_default(),
            self.topic.as_deref().map(norm).unwrap_or_default()
        )
    }
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

#[derive(Debug, Default)]
struct SummaryCounters {
    learned: AtomicU64,
    rejected: AtomicU64,
    unlearned: AtomicU64,
}

/// Named rule store plus read-only variables and properties.
#[derive(Debug)]
pub struct KnowledgeBase {
    name: Arc<str>,
    rules: RwLock<Arc<RuleSet>>,
    next_serial: AtomicU64,
    variables: HashMap<String, String>,
    properties: HashMap<String, String>,
    fingerprint: OnceCell<u64>,
    summary: SummaryCounters,
}

impl KnowledgeBase {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        KnowledgeBase {
            name: name.into(),
            rules: RwLock::new(Arc::new(RuleSet::default())),
            next_serial: AtomicU64::new(0),
            variables: HashMap::new(),
            properties: HashMap::new(),
            fingerprint: OnceCell::new(),
            summary: SummaryCounters::default(),
        }
    }

    /// Global variable, visible to every session below its own variables.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self.fingerprint = OnceCell::new();
        self
    }

    /// Bot property, read by `bot` and as the last variable scope.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self.fingerprint = OnceCell::new();
        self
    }

    pub fn with_categories(self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.extend(categories);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cache tag for everything computed against this knowledge base.
    pub fn tag(&self) -> &Arc<str> {
        &self.name
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Fingerprint of the variable and property scopes. They never change
    /// after construction, so it is computed once.
    pub fn fingerprint(&self) -> u64 {
        *self.fingerprint.get_or_init(|| {
            let vars = scope_fingerprint(self.variables.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            let props = scope_fingerprint(self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            vars.rotate_left(1) ^ props
        })
    }

    /// Current rule snapshot.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        Arc::clone(&self.rules.read())
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn categories(&self) -> Vec<Arc<Category>> {
        self.snapshot().categories().to_vec()
    }

    fn serial(&self) -> u64 {
        self.next_serial.fetch_add(1, Ordering::Relaxed)
    }

    /// Add one category and return the serial that identifies it until it
    /// is removed or the knowledge base is reloaded.
    pub fn add_category(&self, category: Category) -> u64 {
        let mut guard = self.rules.write();
        let mut next = RuleSet::clone(&guard);
        let serial = self.serial();
        next.push(Arc::new(category), serial);
        debug!(kb = %self.name, serial, total = next.len(), "category added");
        *guard = Arc::new(next);
        serial
    }

    pub fn extend(&self, categories: impl IntoIterator<Item = Category>) {
        let mut guard = self.rules.write();
        let mut next = RuleSet::clone(&guard);
        let before = next.len();
        for category in categories {
            next.push(Arc::new(category), self.serial());
        }
        debug!(kb = %self.name, added = next.len() - before, total = next.len(), "categories added");
        *guard = Arc::new(next);
    }

    /// Remove the copy of `category` that was added under `serial`. Equal
    /// categories added separately keep their own serials and stay.
    pub fn remove(&self, category: &Category, serial: u64) -> bool {
        let mut guard = self.rules.write();
        let Some(id) = guard.find(&category.signature(), serial) else {
            return false;
        };
        let next = RuleSet::new(guard.entries().enumerate().filter(|&(i, _)| i != id).map(|(_, entry)| entry));
        debug!(kb = %self.name, serial, total = next.len(), "category removed");
        *guard = Arc::new(next);
        true
    }

    /// Replace all categories. Callers holding caches tagged with this
    /// knowledge base should invalidate them.
    pub fn reload(&self, categories: impl IntoIterator<Item = Category>) {
        let mut guard = self.rules.write();
        let next = RuleSet::new(categories.into_iter().map(|c| (Arc::new(c), self.serial())));
        debug!(kb = %self.name, total = next.len(), "categories reloaded");
        *guard = Arc::new(next);
    }

    pub fn learning_summary(&self) -> LearningSummary {
        LearningSummary {
            learned: self.summary.learned.load(Ordering::Relaxed),
            rejected: self.summary.rejected.load(Ordering::Relaxed),
            unlearned: self.summary.unlearned.load(Ordering::Relaxed),
            categories: self.len(),
        }
    }

    pub(crate) fn record_learned(&self) {
        self.summary.learned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.summary.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unlearned(&self, count: usize) {
        self.summary.unlearned.fetch_add(count as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_constraints_are_absent() {
        let c = Category::new("HI", "hello").with_that("  ").with_topic("");
        assert_eq!(c.that, None);
        assert_eq!(c.topic, None);
    }

    #[test]
    fn signature_normalizes_case_and_spacing() {
        let a = Category::new("hello   *", "a").with_that("how are you");
        let b = Category::new("HELLO *", "b").with_that("HOW ARE YOU");
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.signature(), Category::new("HELLO *", "a").signature());
    }

    #[test]
    fn snapshots_are_unaffected_by_later_mutation() {
        let kb = KnowledgeBase::new("kb");
        let a = kb.add_category(Category::new("A", "1"));
        let b = kb.add_category(Category::new("B", "2"));
        assert!(!kb.remove(&Category::new("A", "1"), b));
        let before = kb.snapshot();
        kb.add_category(Category::new("C", "3"));
        assert_eq!(before.len(), 2);
        assert_eq!(kb.len(), 3);

        assert!(kb.remove(&Category::new("a", "1"), a));
        assert!(!kb.remove(&Category::new("A", "1"), a));
        assert_eq!(before.len(), 2);
        let patterns: Vec<String> = kb.categories().iter().map(|c| c.pattern.clone()).collect();
        assert_eq!(patterns, vec!["B", "C"]);
    }

    #[test]
    fn removal_by_serial_spares_equal_categories() {
        let kb = KnowledgeBase::new("kb").with_categories([Category::new("HELLO", "hi")]);
        let first = kb.add_category(Category::new("HELLO", "hi"));
        let second = kb.add_category(Category::new("HELLO", "hi"));
        assert_ne!(first, second);

        assert!(kb.remove(&Category::new("HELLO", "hi"), first));
        assert_eq!(kb.len(), 2);
        let serials: Vec<u64> = kb.snapshot().entries().map(|(_, serial)| serial).collect();
        assert_eq!(serials, vec![0, second]);
    }

    #[test]
    fn readers_never_see_a_partial_rule_set() {
        let kb = KnowledgeBase::new("kb").with_categories([Category::new("BASE", "ok")]);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..200 {
                    let serial = kb.add_category(Category::new(format!("RULE {i}"), "x"));
                    if i % 2 == 0 {
                        kb.remove(&Category::new(format!("RULE {i}"), "x"), serial);
                    }
                }
            });
            scope.spawn(|| {
                for _ in 0..200 {
                    let snapshot = kb.snapshot();
                    assert_eq!(snapshot.categories().len(), snapshot.metas.len());
                    assert_eq!(snapshot.categories()[0].pattern, "BASE");
                    let indexed = snapshot.index.always_on.len()
                        + snapshot.index.by_first_word.values().map(Vec::len).sum::<usize>();
                    assert_eq!(indexed, snapshot.len());
                }
            });
        });
        assert_eq!(kb.len(), 101);
    }

    #[test]
    fn serials_keep_growing_across_reload() {
        let kb = KnowledgeBase::new("kb").with_categories([Category::new("A", "1")]);
        kb.reload([Category::new("B", "2")]);
        let snapshot = kb.snapshot();
        let (category, meta) = snapshot.get(0).expect("one rule");
        assert_eq!(category.pattern, "B");
        assert_eq!(meta.serial, 1);
    }

    #[test]
    fn fingerprint_tracks_builder_changes() {
        let a = KnowledgeBase::new("kb").with_property("name", "x");
        let first = a.fingerprint();
        let b = a.with_property("name", "y");
        assert_ne!(first, b.fingerprint());
    }
}
