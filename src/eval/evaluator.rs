//! Depth-first, left-to-right template evaluation.
//!
//! Every element is dispatched on its [`TagKind`]. Attributes are read the
//! same way for every tag:
//!
//! ```text
//! <star index="2"/>                   XML attribute, used as written
//! <star index="<get name='n'/>"/>     attribute holding markup, evaluated first
//! <star><index>2</index></star>       child element, evaluated first
//! ```
//!
//! Attribute child elements are not part of a tag's content. Evaluation never
//! fails: missing variables, bad indices and unknown actions all produce empty
//! text, and elements without a known kind are echoed as markup around their
//! evaluated children.

use super::tags::TagKind;
use crate::engine::{Category, MatchContext, PatternMatcher, TtlLruCache};
use crate::learning::Learner;
use crate::markup::{self, Element, Node};
use crate::transforms::strings::{self, CountMode};
use crate::transforms::{Pronoun, case, substitute};
use crate::variables::{self, VariableCache, VariableContext};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Choice of `li` for the `random` tag.
pub trait RandomSource: Send {
    /// An index in `0..n`. `n` is never zero.
    fn pick(&mut self, n: usize) -> usize;
}

/// [`RandomSource`] backed by [`StdRng`].
#[derive(Debug, Clone)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Reproducible sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        StdRandom { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        StdRandom { rng: StdRng::from_entropy() }
    }
}

impl RandomSource for StdRandom {
    fn pick(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n.max(1))
    }
}

/// Evaluates parsed templates against a [`VariableContext`].
pub struct Evaluator<'i> {
    matcher: &'i PatternMatcher,
    variables: &'i VariableCache,
    templates: &'i TtlLruCache<String, Arc<[Node]>>,
    random: &'i Mutex<Box<dyn RandomSource>>,
    learner: &'i Learner,
    max_depth: usize,
}

impl<'i> Evaluator<'i> {
    pub(crate) fn new(
        matcher: &'i PatternMatcher,
        variables: &'i VariableCache,
        templates: &'i TtlLruCache<String, Arc<[Node]>>,
        random: &'i Mutex<Box<dyn RandomSource>>,
        learner: &'i Learner,
        max_depth: usize,
    ) -> Self {
        Evaluator { matcher, variables, templates, random, learner, max_depth }
    }

    /// Parse through the template cache, evaluate, and collapse whitespace.
    pub fn evaluate_template(&self, template: &str, ctx: &mut VariableContext<'_>) -> String {
        let nodes = self.parse(template);
        strings::normalize_whitespace(&self.evaluate(&nodes, ctx))
    }

    pub fn parse(&self, template: &str) -> Arc<[Node]> {
        self.templates.get_or_insert_with(template.to_string(), None, || markup::parse(template).into())
    }

    pub fn evaluate(&self, nodes: &[Node], ctx: &mut VariableContext<'_>) -> String {
        let mut out = String::new();
        for node in nodes {
            self.node(node, ctx, &mut out);
        }
        out
    }

    fn node(&self, node: &Node, ctx: &mut VariableContext<'_>, out: &mut String) {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Tag(element) => {
                let value = self.element(element, ctx);
                out.push_str(&value);
            }
        }
    }

    fn element(&self, e: &Element, ctx: &mut VariableContext<'_>) -> String {
        let Some(kind) = e.kind else {
            return self.passthrough(e, ctx);
        };

        match kind {
            TagKind::Get => self.get(e, ctx),
            TagKind::Set => {
                self.set(e, ctx);
                String::new()
            }
            TagKind::Bot => {
                let name = self.attr(e, "name", ctx).unwrap_or_default();
                ctx.knowledge.property(&name).unwrap_or("").to_string()
            }

            TagKind::Star => {
                let index = self.index(e, ctx);
                ctx.bindings.star(index).to_string()
            }
            TagKind::ThatStar => {
                let index = self.index(e, ctx);
                ctx.bindings.thatstar(index).to_string()
            }
            TagKind::TopicStar => {
                let index = self.index(e, ctx);
                ctx.bindings.topicstar(index).to_string()
            }
            TagKind::Input | TagKind::Request => {
                let index = self.index(e, ctx);
                ctx.session.request(index).unwrap_or("").to_string()
            }
            TagKind::Response => {
                let index = self.index(e, ctx);
                ctx.session.response(index).unwrap_or("").to_string()
            }
            TagKind::That => self.that(e, ctx),

            TagKind::Condition => self.condition(e, ctx),
            TagKind::Random => self.random(e, ctx),
            TagKind::Think => {
                self.content(e, ctx);
                String::new()
            }
            TagKind::Li | TagKind::Eval => self.content(e, ctx),

            TagKind::Srai => {
                let input = self.content(e, ctx);
                self.srai(&input, ctx)
            }
            TagKind::Sr => {
                let input = ctx.bindings.star(1).to_string();
                self.srai(&input, ctx)
            }
            TagKind::Learn => self.learn(e, ctx, false),
            TagKind::Unlearn => self.learn(e, ctx, true),

            TagKind::Uppercase => case::uppercase(&self.content(e, ctx)),
            TagKind::Lowercase => case::lowercase(&self.content(e, ctx)),
            TagKind::Formal => case::formal(&self.content(e, ctx)),
            TagKind::Sentence => case::sentence(&self.content(e, ctx)),
            TagKind::Word => case::word(&self.content(e, ctx)),
            TagKind::Person => self.pronoun(e, ctx, Pronoun::Person),
            TagKind::Person2 => self.pronoun(e, ctx, Pronoun::Person2),
            TagKind::Gender => self.pronoun(e, ctx, Pronoun::Gender),

            TagKind::Substring => {
                let start = self.attr(e, "start", ctx).and_then(|v| v.parse().ok());
                let end = self.attr(e, "end", ctx).and_then(|v| v.parse().ok());
                strings::substring(&self.content(e, ctx), start, end)
            }
            TagKind::Replace => {
                let search = self.attr(e, "search", ctx).unwrap_or_default();
                let replacement = self.attr(e, "replace", ctx).unwrap_or_default();
                strings::replace(&self.content(e, ctx), &search, &replacement)
            }
            TagKind::Length => {
                let mode = CountMode::parse(self.attr(e, "mode", ctx).as_deref(), CountMode::Char);
                strings::length(&self.content(e, ctx), mode).to_string()
            }
            TagKind::Count => {
                let mode = CountMode::parse(self.attr(e, "mode", ctx).as_deref(), CountMode::Word);
                let search = self.attr(e, "search", ctx).filter(|s| !s.is_empty());
                let text = self.content(e, ctx);
                let count = match search {
                    Some(search) => strings::count_occurrences(&text, &search),
                    None => strings::length(&text, mode),
                };
                count.to_string()
            }

            TagKind::List => self.list(e, ctx),
            TagKind::Map => self.map(e, ctx),

            TagKind::Subj | TagKind::Pred | TagKind::Obj => self.content(e, ctx).trim().to_string(),
            TagKind::Uniq => self.uniq(e, ctx),
        }
    }

    /// Value of attribute `name`, from the XML attribute or a child element
    /// of the same name. Values holding markup are evaluated.
    fn attr(&self, e: &Element, name: &str, ctx: &mut VariableContext<'_>) -> Option<String> {
        if let Some(value) = e.attribute(name) {
            if !value.contains('<') {
                return Some(value.trim().to_string());
            }
            let nodes = self.parse(value);
            return Some(self.evaluate(&nodes, ctx).trim().to_string());
        }
        e.child(name).map(|child| self.evaluate(&child.children, ctx).trim().to_string())
    }

    /// Evaluated children, skipping attribute child elements.
    fn content(&self, e: &Element, ctx: &mut VariableContext<'_>) -> String {
        let attributes: &[&str] = e.kind.map(TagKind::attribute_names).unwrap_or(&[]);
        let mut out = String::new();
        for node in &e.children {
            match node {
                Node::Tag(child) if attributes.contains(&child.name.as_str()) => {}
                _ => self.node(node, ctx, &mut out),
            }
        }
        out
    }

    /// 1-based `index` attribute, defaulting to 1.
    fn index(&self, e: &Element, ctx: &mut VariableContext<'_>) -> usize {
        self.attr(e, "index", ctx).and_then(|v| v.parse().ok()).unwrap_or(1)
    }

    fn passthrough(&self, e: &Element, ctx: &mut VariableContext<'_>) -> String {
        let mut out = String::new();
        e.render_open(&mut out);
        if !e.self_closing {
            out.push_str(&self.evaluate(&e.children, ctx));
        }
        e.render_close(&mut out);
        out
    }

    fn get(&self, e: &Element, ctx: &mut VariableContext<'_>) -> String {
        if let Some(var) = self.attr(e, "var", ctx) {
            return ctx.locals.get(&var).cloned().unwrap_or_default();
        }
        match self.attr(e, "name", ctx) {
            Some(name) => self.variables.resolve(&name, ctx),
            None => String::new(),
        }
    }

    fn set(&self, e: &Element, ctx: &mut VariableContext<'_>) {
        let var = self.attr(e, "var", ctx);
        let name = self.attr(e, "name", ctx);
        let value = strings::normalize_whitespace(&self.content(e, ctx));
        match (var, name) {
            (Some(var), _) => {
                ctx.locals.insert(var, value);
            }
            (None, Some(name)) => variables::assign(&name, &value, ctx),
            (None, None) => debug!("set without name or var"),
        }
    }

    /// `index="n"` is the n-th previous response, `index="n,m"` its m-th
    /// sentence.
    fn that(&self, e: &Element, ctx: &mut VariableContext<'_>) -> String {
        let index = self.attr(e, "index", ctx).unwrap_or_default();
        let mut parts = index.split(',').map(|p| p.trim().parse::<usize>().ok());
        let response = parts.next().flatten().unwrap_or(1);
        let sentence = parts.next().flatten();

        let Some(text) = ctx.session.that(response) else {
            return String::new();
        };
        match sentence {
            None => text.to_string(),
            Some(n) => n.checked_sub(1).and_then(|i| strings::sentences(text).get(i).copied()).unwrap_or("").to_string(),
        }
    }

    /// Current value of the variable an element tests, `None` when it names none.
    fn subject(&self, e: &Element, ctx: &mut VariableContext<'_>) -> Option<String> {
        if let Some(var) = self.attr(e, "var", ctx) {
            return Some(ctx.locals.get(&var).cloned().unwrap_or_default());
        }
        let name = self.attr(e, "name", ctx)?;
        Some(self.variables.resolve(&name, ctx))
    }

    fn condition(&self, e: &Element, ctx: &mut VariableContext<'_>) -> String {
        let subject = self.subject(e, ctx);
        if let Some(expected) = self.attr(e, "value", ctx) {
            return match subject {
                Some(actual) if value_matches(&actual, &expected) => self.content(e, ctx),
                _ => String::new(),
            };
        }

        let mut fallback = None;
        for li in e.child_elements().filter(|c| c.kind == Some(TagKind::Li)) {
            let own = self.subject(li, ctx);
            let Some(expected) = self.attr(li, "value", ctx) else {
                fallback = fallback.or(Some(li));
                continue;
            };
            let actual = own.or_else(|| subject.clone());
            if actual.is_some_and(|actual| value_matches(&actual, &expected)) {
                return self.content(li, ctx);
            }
        }
        fallback.map(|li| self.content(li, ctx)).unwrap_or_default()
    }

    fn random(&self, e: &Element, ctx: &mut VariableContext<'_>) -> String {
        let options: Vec<&Element> = e.child_elements().filter(|c| c.kind == Some(TagKind::Li)).collect();
        if options.is_empty() {
            return String::new();
        }
        let pick = self.random.lock().pick(options.len()).min(options.len() - 1);
        trace!(pick, of = options.len(), "random choice");
        self.content(options[pick], ctx)
    }

    fn srai(&self, input: &str, ctx: &mut VariableContext<'_>) -> String {
        let input = strings::normalize_whitespace(input);
        if input.is_empty() {
            return String::new();
        }
        if ctx.depth >= self.max_depth {
            warn!(depth = ctx.depth, input = %input, "recursion limit reached, branch yields empty text");
            return String::new();
        }

        let that = ctx.session.last_response().to_string();
        let topic = ctx.topic().to_string();
        let query = MatchContext { input: &input, that: &that, topic: &topic };
        let Some(result) = self.matcher.resolve(ctx.knowledge, &query) else {
            debug!(input = %input, depth = ctx.depth, "srai found no match");
            return String::new();
        };

        let mut child = ctx.child(result.bindings);
        self.evaluate_template(&result.category.template, &mut child)
    }

    fn pronoun(&self, e: &Element, ctx: &mut VariableContext<'_>, table: Pronoun) -> String {
        let text = if e.children.is_empty() { ctx.bindings.star(1).to_string() } else { self.content(e, ctx) };
        substitute(&text, table)
    }

    fn value(&self, e: &Element, ctx: &mut VariableContext<'_>) -> String {
        strings::normalize_whitespace(&self.content(e, ctx))
    }

    fn list(&self, e: &Element, ctx: &mut VariableContext<'_>) -> String {
        let name = self.attr(e, "name", ctx).unwrap_or_default();
        let action = self.attr(e, "action", ctx).map(|a| a.to_lowercase()).unwrap_or_else(|| "get".into());
        let index = self.attr(e, "index", ctx).and_then(|i| i.parse::<usize>().ok());

        match action.as_str() {
            "add" => {
                let value = self.value(e, ctx);
                if !value.is_empty() {
                    ctx.session.list_add(&name, value);
                }
            }
            "get" => {
                return match index {
                    Some(i) => ctx.session.list_get(&name, i).unwrap_or("").to_string(),
                    None => ctx.session.list(&name).join(" "),
                };
            }
            "remove" => match index {
                Some(i) => {
                    ctx.session.list_remove_at(&name, i);
                }
                None => {
                    let value = self.value(e, ctx);
                    ctx.session.list_remove_value(&name, &value);
                }
            },
            "set" => {
                let value = self.value(e, ctx);
                if let Some(i) = index {
                    ctx.session.list_set(&name, i, value);
                }
            }
            "size" => return ctx.session.list(&name).len().to_string(),
            "clear" => ctx.session.list_clear(&name),
            other => debug!(action = other, list = %name, "unknown list action"),
        }
        String::new()
    }

    fn map(&self, e: &Element, ctx: &mut VariableContext<'_>) -> String {
        let name = self.attr(e, "name", ctx).unwrap_or_default();
        let action = self.attr(e, "action", ctx).map(|a| a.to_lowercase()).unwrap_or_else(|| "get".into());
        let key = self.attr(e, "key", ctx).unwrap_or_default();

        match action.as_str() {
            "set" => {
                let value = self.value(e, ctx);
                ctx.session.map_set(&name, key, value);
            }
            "get" => return ctx.session.map_get(&name, &key).unwrap_or("").to_string(),
            "remove" => {
                ctx.session.map_remove(&name, &key);
            }
            "size" => return ctx.session.map(&name).map_or(0, |m| m.len()).to_string(),
            "clear" => ctx.session.map_clear(&name),
            other => debug!(action = other, map = %name, "unknown map action"),
        }
        String::new()
    }

    fn uniq(&self, e: &Element, ctx: &mut VariableContext<'_>) -> String {
        let mut parts = Vec::new();
        for node in &e.children {
            let mut part = String::new();
            self.node(node, ctx, &mut part);
            let part = part.trim();
            if !part.is_empty() {
                parts.push(part.to_string());
            }
        }
        parts.join(" ")
    }

    fn learn(&self, e: &Element, ctx: &mut VariableContext<'_>, remove: bool) -> String {
        for category in e.child_elements().filter(|c| c.name == "category") {
            let candidate = self.candidate(category, ctx);
            if remove {
                self.learner.unlearn(&candidate, ctx.session, ctx.knowledge);
            } else {
                // Rejections are counted and logged by the learner.
                let _ = self.learner.learn(candidate, ctx.session, ctx.knowledge);
            }
        }
        String::new()
    }

    fn candidate(&self, category: &Element, ctx: &mut VariableContext<'_>) -> Category {
        let pattern = self.category_field(category, "pattern", ctx).unwrap_or_default();
        let that = self.category_field(category, "that", ctx);
        let topic = self.category_field(category, "topic", ctx);
        let template = match category.child("template") {
            Some(template) => self.freeze(&template.children, ctx),
            None => String::new(),
        };

        let mut candidate = Category::new(pattern, template);
        if let Some(that) = that {
            candidate = candidate.with_that(that);
        }
        if let Some(topic) = topic {
            candidate = candidate.with_topic(topic);
        }
        candidate
    }

    fn category_field(&self, category: &Element, name: &str, ctx: &mut VariableContext<'_>) -> Option<String> {
        let field = category.child(name)?;
        Some(strings::normalize_whitespace(&self.evaluate(&field.children, ctx)))
    }

    /// Template text for a learned category. Markup is kept as written except
    /// `eval` elements, which are replaced by their evaluated text.
    fn freeze(&self, nodes: &[Node], ctx: &mut VariableContext<'_>) -> String {
        let mut out = String::new();
        for node in nodes {
            match node {
                Node::Text(_) => out.push_str(&markup::render(std::slice::from_ref(node))),
                Node::Tag(e) if e.kind == Some(TagKind::Eval) => {
                    let value = self.evaluate(&e.children, ctx);
                    out.push_str(&markup::render(&[Node::Text(value)]));
                }
                Node::Tag(e) => {
                    e.render_open(&mut out);
                    if !e.self_closing {
                        out.push_str(&self.freeze(&e.children, ctx));
                    }
                    e.render_close(&mut out);
                }
            }
        }
        out
    }
}

/// `*` accepts any non-empty value; anything else compares case-insensitively.
fn value_matches(actual: &str, expected: &str) -> bool {
    let actual = actual.trim();
    let expected = expected.trim();
    if expected == "*" {
        return !actual.is_empty();
    }
    actual.to_uppercase() == expected.to_uppercase()
}
