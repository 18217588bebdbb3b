//! No-Free-Facts: no factual assertion without a claim or calc reference.
//!
//! Detection is deterministic. A fixed library of numeric pattern rules and
//! a set of subject-predicate rules find factual assertions in text; the
//! validator then decides whether the surrounding artifact grounds them.

mod extract;
pub mod patterns;
pub mod semantic;
mod validator;

pub use extract::{contains_factual_assertion, extract_assertions, AssertionKind, FactualAssertion};
pub use validator::{NoFreeFactsValidator, ReferenceSet};
