use crate::config::Options;
use crate::engine::{CacheStats, Category, KnowledgeBase, MatchContext, MatchDetails, PatternMatcher, TtlLruCache};
use crate::error::{LearnError, ProcessError};
use crate::eval::{Evaluator, RandomSource, StdRandom};
use crate::learning::{Learner, LearningSummary};
use crate::markup::Node;
use crate::session::ChatSession;
use crate::transforms::strings;
use crate::variables::{Bindings, VariableCache, VariableContext};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Statistics of every cache the interpreter owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheReport {
    pub variables: CacheStats,
    pub patterns: CacheStats,
    pub verdicts: CacheStats,
    pub templates: CacheStats,
}

/// Answers utterances from a knowledge base.
///
/// One interpreter is shared by any number of conversations; each
/// conversation keeps its own [`ChatSession`] and passes it in per turn.
///
/// # Example
/// ```
/// use parley::{Category, ChatSession, Interpreter, KnowledgeBase, Options};
///
/// let kb = KnowledgeBase::new("demo").with_categories([
///     Category::new("HELLO *", "Hi <star/>!"),
/// ]);
/// let bot = Interpreter::new(kb, Options::default());
/// let mut session = ChatSession::new("user-1");
///
/// assert_eq!(bot.process_input("hello Ada", &mut session).unwrap(), "Hi Ada!");
/// ```
pub struct Interpreter {
    knowledge: Arc<KnowledgeBase>,
    options: Options,
    matcher: PatternMatcher,
    variables: VariableCache,
    templates: TtlLruCache<String, Arc<[Node]>>,
    random: Mutex<Box<dyn RandomSource>>,
    learner: Learner,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("knowledge", &self.knowledge.name())
            .field("categories", &self.knowledge.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    pub fn new(knowledge: impl Into<Arc<KnowledgeBase>>, options: Options) -> Self {
        let random: Box<dyn RandomSource> = match options.random_seed {
            Some(seed) => Box::new(StdRandom::seeded(seed)),
            None => Box::new(StdRandom::from_entropy()),
        };
        Interpreter {
            knowledge: knowledge.into(),
            matcher: PatternMatcher::new(&options),
            variables: VariableCache::new(&options.variable_cache),
            templates: TtlLruCache::from_options("templates", &options.template_cache),
            random: Mutex::new(random),
            learner: Learner::new(options.learning.clone()),
            options,
        }
    }

    /// Replace the source of `random` choices.
    pub fn with_random_source(mut self, source: impl RandomSource + 'static) -> Self {
        self.random = Mutex::new(Box::new(source));
        self
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// A session whose histories are bounded by [`Options::history_limit`].
    pub fn new_session(&self, id: impl Into<String>) -> ChatSession {
        ChatSession::with_history_limit(id, self.options.history_limit)
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(
            &self.matcher,
            &self.variables,
            &self.templates,
            &self.random,
            &self.learner,
            self.options.max_recursion_depth,
        )
    }

    /// Answer one utterance.
    ///
    /// Input with several sentences is answered sentence by sentence and the
    /// non-empty answers are joined with a space. Every sentence is recorded
    /// as a request before its template runs, so `<input/>` sees it; only
    /// matched sentences record a response.
    pub fn process_input(&self, utterance: &str, session: &mut ChatSession) -> Result<String, ProcessError> {
        let sentences = strings::sentences(utterance);
        if sentences.is_empty() {
            return Err(ProcessError::EmptyInput);
        }

        let evaluator = self.evaluator();
        let mut answers = Vec::new();
        let mut matched = false;
        for sentence in sentences {
            session.push_request(sentence);
            let that = session.last_response().to_string();
            let topic = session.topic().to_string();
            let query = MatchContext { input: sentence, that: &that, topic: &topic };

            let Some(result) = self.matcher.resolve(&self.knowledge, &query) else {
                debug!(session = session.id(), input = sentence, "no rule matched");
                continue;
            };
            matched = true;

            let mut ctx = VariableContext::new(session, &self.knowledge, result.bindings);
            let answer = evaluator.evaluate_template(&result.category.template, &mut ctx);
            session.push_response(answer.clone());
            if !answer.is_empty() {
                answers.push(answer);
            }
        }

        if !matched {
            return Err(ProcessError::NoMatch { input: strings::normalize_whitespace(utterance) });
        }
        Ok(answers.join(" "))
    }

    /// Evaluate template text directly. Without a session the evaluation runs
    /// against a throwaway one.
    pub fn process_template(&self, template: &str, bindings: &Bindings, session: Option<&mut ChatSession>) -> String {
        let mut scratch = None;
        let session = match session {
            Some(session) => session,
            None => scratch.insert(self.new_session("template")),
        };
        let mut ctx = VariableContext::new(session, &self.knowledge, bindings.clone());
        self.evaluator().evaluate_template(template, &mut ctx)
    }

    /// How `utterance` would be matched in `session`'s current context.
    pub fn explain(&self, utterance: &str, session: &ChatSession) -> MatchDetails {
        let query = MatchContext { input: utterance, that: session.last_response(), topic: session.topic() };
        self.matcher.resolve_with_details(&self.knowledge, &query)
    }

    pub fn learn(&self, candidate: Category, session: &mut ChatSession) -> Result<(), LearnError> {
        self.learner.learn(candidate, session, &self.knowledge)
    }

    pub fn unlearn(&self, candidate: &Category, session: &mut ChatSession) -> usize {
        self.learner.unlearn(candidate, session, &self.knowledge)
    }

    pub fn learning_summary(&self) -> LearningSummary {
        self.knowledge.learning_summary()
    }

    /// Replace every category and drop cached state derived from the old set.
    pub fn reload(&self, categories: impl IntoIterator<Item = Category>) {
        self.knowledge.reload(categories);
        let tag = self.knowledge.name();
        let dropped = self.matcher.invalidate(tag) + self.variables.invalidate(tag);
        self.templates.clear();
        info!(knowledge = tag, categories = self.knowledge.len(), dropped, "knowledge base reloaded");
    }

    pub fn clear_caches(&self) {
        self.matcher.clear();
        self.variables.clear();
        self.templates.clear();
    }

    pub fn cache_stats(&self) -> CacheReport {
        CacheReport {
            variables: self.variables.stats(),
            patterns: self.matcher.pattern_stats(),
            verdicts: self.matcher.verdict_stats(),
            templates: self.templates.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn interpreter(categories: Vec<Category>) -> Interpreter {
        let kb = KnowledgeBase::new("test").with_property("name", "Parley").with_categories(categories);
        Interpreter::new(kb, Options { random_seed: Some(1), ..Options::default() })
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn interpreter_is_shareable() {
        assert_send_sync::<Interpreter>();
    }

    #[test]
    fn multi_sentence_input() {
        let bot = interpreter(vec![
            Category::new("HI", "Hello!"),
            Category::new("WHAT IS YOUR NAME", "I am <bot name=\"name\"/>."),
        ]);
        let mut session = bot.new_session("s");
        assert_eq!(bot.process_input("Hi. What is your name?", &mut session), Ok("Hello! I am Parley.".to_string()));
        assert_eq!(session.request(1), Some("What is your name?"));
        assert_eq!(session.response(2), Some("Hello!"));
    }

    #[test]
    fn no_match_and_empty_input() {
        let bot = interpreter(vec![Category::new("HI", "Hello!")]);
        let mut session = bot.new_session("s");
        assert_eq!(
            bot.process_input("  good   bye ", &mut session),
            Err(ProcessError::NoMatch { input: "good bye".into() })
        );
        assert_eq!(bot.process_input("   ", &mut session), Err(ProcessError::EmptyInput));
        assert_eq!(bot.process_input("?!", &mut session), Err(ProcessError::EmptyInput));
    }

    #[test]
    fn empty_template_is_not_a_miss() {
        let bot = interpreter(vec![Category::new("QUIET", "<think>shh</think>")]);
        let mut session = bot.new_session("s");
        assert_eq!(bot.process_input("quiet", &mut session), Ok(String::new()));
    }

    #[test]
    fn previous_response_selects_that_rules() {
        let bot = interpreter(vec![
            Category::new("ASK ME", "Do you like cats?"),
            Category::new("YES", "Good."),
            Category::new("YES", "Me too!").with_that("DO YOU LIKE CATS"),
        ]);
        let mut session = bot.new_session("s");
        assert_eq!(bot.process_input("yes", &mut session).as_deref(), Ok("Good."));
        assert_eq!(bot.process_input("ask me", &mut session).as_deref(), Ok("Do you like cats?"));
        assert_eq!(bot.process_input("yes", &mut session).as_deref(), Ok("Me too!"));
    }

    #[test]
    fn variables_persist_across_turns() {
        let bot = interpreter(vec![
            Category::new("MY NAME IS *", "<think><set name=\"user\"><star/></set></think>Nice to meet you, <get name=\"user\"/>."),
            Category::new("WHAT IS MY NAME", "Your name is <get name=\"user\"/>."),
        ]);
        let mut session = bot.new_session("s");
        assert_eq!(bot.process_input("my name is Ada", &mut session).as_deref(), Ok("Nice to meet you, Ada."));
        assert_eq!(bot.process_input("what is my name", &mut session).as_deref(), Ok("Your name is Ada."));
        assert_eq!(session.variable("user"), Some("Ada"));
    }

    #[test]
    fn input_tag_sees_the_current_request() {
        let bot = interpreter(vec![Category::new("ECHO *", "<input/>|<star/>")]);
        let mut session = bot.new_session("s");
        assert_eq!(bot.process_input("echo this", &mut session).as_deref(), Ok("echo this|this"));
    }

    #[test]
    fn learning_through_conversation() {
        let teach = concat!(
            "<learn><category>",
            "<pattern>WHAT IS <eval><star/></eval></pattern>",
            "<template><eval><star index=\"2\"/></eval></template>",
            "</category></learn>Okay."
        );
        let bot = interpreter(vec![Category::new("REMEMBER * IS *", teach)]);
        let mut session = bot.new_session("s");

        assert_eq!(bot.process_input("remember the sky is blue", &mut session).as_deref(), Ok("Okay."));
        assert_eq!(bot.process_input("what is the sky", &mut session).as_deref(), Ok("blue"));
        assert_eq!(session.learned().len(), 1);
        assert_eq!(session.learned()[0].category.template, "blue");
        assert_eq!(bot.learning_summary().learned, 1);
        assert_eq!(bot.learning_summary().categories, 2);
    }

    #[test]
    fn reload_replaces_rules_and_drops_derived_state() {
        let bot = interpreter(vec![Category::new("PING", "pong")]);
        let mut session = bot.new_session("s");
        assert_eq!(bot.process_input("ping", &mut session).as_deref(), Ok("pong"));
        assert!(bot.cache_stats().verdicts.size > 0);

        bot.reload([Category::new("PING", "PONG!")]);
        assert_eq!(bot.cache_stats().verdicts.size, 0);
        assert_eq!(bot.cache_stats().templates.size, 0);
        assert_eq!(bot.process_input("ping", &mut session).as_deref(), Ok("PONG!"));
    }

    #[test]
    fn explain_reports_the_ranking() {
        let bot = interpreter(vec![Category::new("*", "any"), Category::new("HELLO *", "hello")]);
        let session = bot.new_session("s");
        let details = bot.explain("hello there", &session);
        assert_eq!(details.ranked.len(), 2);
        assert_eq!(details.selected.map(|m| m.category.template.clone()), Some("hello".to_string()));
    }

    #[test]
    fn template_cache_reuses_parses() {
        let bot = interpreter(vec![Category::new("HI", "<uppercase>hi</uppercase>")]);
        let mut session = bot.new_session("s");
        bot.process_input("hi", &mut session).ok();
        bot.process_input("hi", &mut session).ok();
        let stats = bot.cache_stats().templates;
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn process_template_without_session() {
        let bot = interpreter(vec![]);
        let out = bot.process_template("Hello <star/>", &Bindings::from_stars(["World"]), None);
        assert_eq!(out, "Hello World");
    }
}
