//! parley: a rule-based conversational markup interpreter.
//!
//! A [`KnowledgeBase`] holds categories: an input pattern, optional
//! patterns for the previous response (`that`) and the current topic, and a
//! response template written in a small tag language. The [`Interpreter`]
//! picks the most specific category for each utterance, evaluates its
//! template against the caller's [`ChatSession`], and can grow the knowledge
//! base at runtime through the `learn` tag.
//!
//! ```text
//! utterance -> engine (match + rank) -> eval (template tags) -> response
//!                 ^                          |
//!                 +------- srai / sr --------+
//! ```
//!
//! The crate installs no `tracing` subscriber; events are emitted on the
//! `parley::*` targets for the host application to collect.

#[macro_use]
mod macros;

mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod learning;
pub mod markup;
pub mod session;
pub mod transforms;
pub mod variables;

pub use api::{CacheReport, Interpreter};
pub use config::{CacheOptions, LearningLimits, Options};
pub use engine::{Category, KnowledgeBase, MatchContext, MatchDetails, MatchResult};
pub use error::{LearnError, ProcessError};
pub use eval::{RandomSource, StdRandom, TagKind};
pub use learning::{LearnedCategory, Learner, LearningStats, LearningSummary};
pub use session::ChatSession;
pub use variables::Bindings;
