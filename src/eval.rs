//! Template evaluation.
//!
//! - `tags.rs`: the closed [`TagKind`] vocabulary, resolved per element when
//!   the markup is parsed.
//! - `evaluator.rs`: the depth-first evaluator and the [`RandomSource`] seam
//!   used by the `random` tag.
//!
//! An [`Evaluator`] is a short-lived view over the interpreter's caches,
//! matcher and learner; [`Interpreter`](crate::Interpreter) builds one per
//! turn.

#[path = "eval/evaluator.rs"]
mod evaluator;
#[path = "eval/tags.rs"]
mod tags;

pub use evaluator::{Evaluator, RandomSource, StdRandom};
pub(crate) use tags::is_known_element;
pub use tags::TagKind;

#[cfg(test)]
#[path = "eval/tests.rs"]
mod tests;
