//! Identifier shape checks.
//!
//! Every id crossing a gate must be a well-formed UUID. Shape is checked
//! separately from existence so callers can tell "wrong shape" from
//! "unknown reference".

use uuid::Uuid;

/// Parse an identifier, returning `None` when it is not a well-formed UUID.
pub fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// Whether `raw` is a well-formed identifier.
pub fn is_well_formed(raw: &str) -> bool {
    parse_id(raw).is_some()
}
