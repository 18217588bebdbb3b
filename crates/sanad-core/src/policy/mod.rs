//! Trust policy loading and validation.
//!
//! A policy is versioned data: the grading table, the Tawatur thresholds
//! and the Muhasabah thresholds. It is validated against an embedded JSON
//! Schema and then checked semantically before any engine sees it.

mod parser;
mod schema;

pub use parser::{PolicyError, TrustPolicy};
pub use schema::{is_valid_policy, validate_policy_schema};
