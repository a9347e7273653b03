//! Text transforms used by the evaluator's transform tags.
//!
//! - `case.rs`: upper/lower/formal/sentence/word case.
//! - `pronoun.rs`: person, person2 and gender substitution tables.
//! - `strings.rs`: code-point string operations and counting modes.
//!
//! Everything here is a pure `&str -> String` function; the evaluator owns
//! attribute handling and decides what text each transform receives.

#[path = "transforms/case.rs"]
pub mod case;
#[path = "transforms/pronoun.rs"]
pub mod pronoun;
#[path = "transforms/strings.rs"]
pub mod strings;

pub use pronoun::{Pronoun, substitute};
pub use strings::CountMode;
