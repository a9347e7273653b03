//! Layered variable lookup and its resolution cache.
//!
//! A name resolves through four scopes, first hit wins:
//!
//! ```text
//! locals (this evaluation) -> session -> knowledge-base variables -> properties -> ""
//! ```
//!
//! Writes always go to the session scope. Properties and knowledge-base
//! variables are fixed once the knowledge base is built.
//!
//! [`VariableCache`] memoizes the walk under `(name, fingerprint)`, where the
//! fingerprint is an order-independent hash of every scope visible at lookup
//! time. It is recomputed on every lookup, so a write anywhere simply changes
//! the key and the stale entry ages out; nothing has to be invalidated on
//! assignment.

use crate::config::CacheOptions;
use crate::engine::{CacheStats, KnowledgeBase, TtlLruCache};
use crate::session::ChatSession;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Wildcard captures visible to `star`, `thatstar` and `topicstar`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    pub star: Vec<String>,
    pub thatstar: Vec<String>,
    pub topicstar: Vec<String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings with only input captures, in order.
    pub fn from_stars<I, S>(stars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Bindings { star: stars.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    /// 1-based lookup; out of range yields `""`.
    pub fn star(&self, index: usize) -> &str {
        nth(&self.star, index)
    }

    pub fn thatstar(&self, index: usize) -> &str {
        nth(&self.thatstar, index)
    }

    pub fn topicstar(&self, index: usize) -> &str {
        nth(&self.topicstar, index)
    }
}

fn nth(values: &[String], index: usize) -> &str {
    index.checked_sub(1).and_then(|i| values.get(i)).map(String::as_str).unwrap_or("")
}

/// Everything a template evaluation can read or write.
pub struct VariableContext<'a> {
    /// Bindings private to this evaluation call (`var` attributes).
    pub locals: HashMap<String, String>,
    pub session: &'a mut ChatSession,
    pub knowledge: &'a KnowledgeBase,
    /// Number of `srai` frames above this one.
    pub depth: usize,
    pub bindings: Bindings,
}

impl<'a> VariableContext<'a> {
    pub fn new(session: &'a mut ChatSession, knowledge: &'a KnowledgeBase, bindings: Bindings) -> Self {
        VariableContext { locals: HashMap::new(), session, knowledge, depth: 0, bindings }
    }

    pub fn topic(&self) -> &str {
        self.session.topic()
    }

    /// Context for one level of recursive resolution: same session and
    /// knowledge base, fresh locals, new bindings.
    pub fn child(&mut self, bindings: Bindings) -> VariableContext<'_> {
        VariableContext {
            locals: HashMap::new(),
            session: &mut *self.session,
            knowledge: self.knowledge,
            depth: self.depth + 1,
            bindings,
        }
    }

    /// Order-independent hash of every scope visible from here.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        scope_fingerprint(self.locals.iter().map(|(k, v)| (k.as_str(), v.as_str()))).hash(&mut hasher);
        scope_fingerprint(self.session.variables().iter().map(|(k, v)| (k.as_str(), v.as_str()))).hash(&mut hasher);
        self.knowledge.fingerprint().hash(&mut hasher);
        hasher.finish()
    }
}

/// Walk the scopes for `name`. Unset names resolve to `""`.
pub fn resolve(name: &str, ctx: &VariableContext<'_>) -> String {
    ctx.locals
        .get(name)
        .map(String::as_str)
        .or_else(|| ctx.session.variable(name))
        .or_else(|| ctx.knowledge.variable(name))
        .or_else(|| ctx.knowledge.property(name))
        .unwrap_or("")
        .to_string()
}

/// Write `name` to the session scope.
pub fn assign(name: &str, value: &str, ctx: &mut VariableContext<'_>) {
    ctx.session.set_variable(name, value);
}

/// Hash of a set of bindings that does not depend on iteration order.
pub fn scope_fingerprint<'s>(scope: impl IntoIterator<Item = (&'s str, &'s str)>) -> u64 {
    let mut pairs: Vec<(&str, &str)> = scope.into_iter().collect();
    pairs.sort_unstable();
    let mut hasher = DefaultHasher::new();
    pairs.len().hash(&mut hasher);
    for (key, value) in pairs {
        key.hash(&mut hasher);
        value.hash(&mut hasher);
    }
    hasher.finish()
}

/// Memoized [`resolve`].
#[derive(Debug)]
pub struct VariableCache {
    inner: TtlLruCache<(String, u64), String>,
}

impl VariableCache {
    pub fn new(options: &CacheOptions) -> Self {
        VariableCache { inner: TtlLruCache::from_options("variables", options) }
    }

    pub fn resolve(&self, name: &str, ctx: &VariableContext<'_>) -> String {
        let key = (name.to_string(), ctx.fingerprint());
        self.inner.get_or_insert_with(key, Some(ctx.knowledge.tag()), || resolve(name, ctx))
    }

    pub fn invalidate(&self, tag: &str) -> usize {
        self.inner.invalidate_tag(tag)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}
