//! No-Free-Facts gate over arbitrary JSON artifacts.
//!
//! Artifacts come from many producers (agent reports, debate messages,
//! deliverable drafts) so the gate walks them as `serde_json::Value`:
//!
//! 1. Collect every claim/calc/enrichment reference anywhere in the tree.
//! 2. Scan every text-bearing field not marked subjective.
//! 3. With no references at all, each assertion is an error. With some
//!    references, each assertion is a warning, since sentence-level
//!    grounding cannot be proven.
//! 4. Sections of a metric-bearing type must carry references themselves.

use serde_json::Value;
use std::collections::BTreeSet;

use super::extract::{extract_assertions, AssertionKind, FactualAssertion};
use crate::registry::RegistrySnapshot;
use crate::validation::{IssueCode, ValidationIssue, ValidationResult};

/// Fields holding a single claim id.
const CLAIM_ID_KEYS: &[&str] = &["claim_id"];
/// Fields holding a list of claim ids.
const CLAIM_LIST_KEYS: &[&str] = &[
    "claim_ids",
    "claim_refs",
    "supported_claim_ids",
    "referenced_claim_ids",
];
const CALC_ID_KEYS: &[&str] = &["calc_id"];
const CALC_LIST_KEYS: &[&str] = &[
    "calc_ids",
    "calc_refs",
    "supported_calc_ids",
    "referenced_calc_ids",
];
const ENRICHMENT_KEYS: &[&str] = &["enrichment_ref", "enrichment_refs"];

/// Keys whose string values are identifiers or enumerations, never prose.
const NON_TEXT_KEYS: &[&str] = &["id", "type", "status", "version", "timestamp"];
const NON_TEXT_SUFFIXES: &[&str] = &["_id", "_ids", "_type", "_status", "_at", "_timestamp", "_hash"];

/// Subtrees whose text is never scanned. Their references still count.
const SKIP_TEXT_KEYS: &[&str] = &["muhasabah"];

/// Section types that must carry references regardless of narrative.
pub const REFERENCE_REQUIRED_SECTIONS: &[&str] = &["FINANCIAL", "MARKET", "TRACTION", "KEY_METRICS"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefKind {
    Claim,
    Calc,
    Enrichment,
}

/// References collected from an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    pub claim_ids: BTreeSet<String>,
    pub calc_ids: BTreeSet<String>,
    pub enrichment_refs: BTreeSet<String>,
}

impl ReferenceSet {
    pub fn is_empty(&self) -> bool {
        self.claim_ids.is_empty() && self.calc_ids.is_empty() && self.enrichment_refs.is_empty()
    }

    /// Collect every non-empty reference in `value`, recursively.
    pub fn collect(value: &Value) -> Self {
        let mut refs = ReferenceSet::default();
        let mut ignored = Vec::new();
        walk_references(value, "", &mut refs, &mut ignored);
        refs
    }

    fn insert(&mut self, kind: RefKind, id: &str) {
        let id = id.to_string();
        match kind {
            RefKind::Claim => self.claim_ids.insert(id),
            RefKind::Calc => self.calc_ids.insert(id),
            RefKind::Enrichment => self.enrichment_refs.insert(id),
        };
    }
}

/// A reference found at a path, kept for registry and emptiness checks.
struct LocatedRef {
    kind: RefKind,
    id: String,
    path: String,
}

fn ref_kind(key: &str) -> Option<(RefKind, bool)> {
    if CLAIM_ID_KEYS.contains(&key) {
        Some((RefKind::Claim, false))
    } else if CLAIM_LIST_KEYS.contains(&key) {
        Some((RefKind::Claim, true))
    } else if CALC_ID_KEYS.contains(&key) {
        Some((RefKind::Calc, false))
    } else if CALC_LIST_KEYS.contains(&key) {
        Some((RefKind::Calc, true))
    } else if ENRICHMENT_KEYS.contains(&key) {
        Some((RefKind::Enrichment, key.ends_with('s')))
    } else {
        None
    }
}

fn is_text_key(key: &str) -> bool {
    !NON_TEXT_KEYS.contains(&key)
        && !NON_TEXT_SUFFIXES.iter().any(|suffix| key.ends_with(suffix))
        && ref_kind(key).is_none()
        && !SKIP_TEXT_KEYS.contains(&key)
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn walk_references(value: &Value, path: &str, refs: &mut ReferenceSet, located: &mut Vec<LocatedRef>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let here = child_path(path, key);
                if let Some((kind, is_list)) = ref_kind(key) {
                    match (child, is_list) {
                        (Value::String(id), _) => {
                            record_ref(kind, id, here, refs, located);
                        }
                        (Value::Array(items), true) => {
                            for (i, item) in items.iter().enumerate() {
                                if let Value::String(id) = item {
                                    record_ref(kind, id, format!("{}[{}]", here, i), refs, located);
                                }
                            }
                        }
                        _ => {}
                    }
                    continue;
                }
                walk_references(child, &here, refs, located);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk_references(item, &format!("{}[{}]", path, i), refs, located);
            }
        }
        _ => {}
    }
}

fn record_ref(
    kind: RefKind,
    id: &str,
    path: String,
    refs: &mut ReferenceSet,
    located: &mut Vec<LocatedRef>,
) {
    if !id.trim().is_empty() {
        refs.insert(kind, id);
    }
    located.push(LocatedRef {
        kind,
        id: id.to_string(),
        path,
    });
}

/// Stateless No-Free-Facts gate.
#[derive(Debug, Clone, Default)]
pub struct NoFreeFactsValidator;

impl NoFreeFactsValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate an artifact without registry checks.
    pub fn validate(&self, artifact: &Value) -> ValidationResult {
        self.validate_with_registry(artifact, None)
    }

    /// Validate an artifact, also checking references against a registry.
    pub fn validate_with_registry(
        &self,
        artifact: &Value,
        registry: Option<&RegistrySnapshot>,
    ) -> ValidationResult {
        let mut result = ValidationResult::pass();

        let mut refs = ReferenceSet::default();
        let mut located = Vec::new();
        walk_references(artifact, "", &mut refs, &mut located);

        check_located_refs(&located, registry, &mut result);

        let has_refs = !refs.is_empty();
        self.scan_text(artifact, "", has_refs, &mut result);
        check_sections(artifact, "", &mut result);

        if !result.passed {
            tracing::warn!(
                errors = result.errors.len(),
                codes = ?result.error_codes(),
                "No-Free-Facts gate rejected artifact"
            );
        }

        result
    }

    /// Check one text field against a known grounding state.
    ///
    /// Issue paths are `path[start:end]` with byte offsets into `text`.
    pub fn check_text(&self, text: &str, path: &str, has_refs: bool) -> ValidationResult {
        let mut result = ValidationResult::pass();
        report_assertions(&extract_assertions(text), path, has_refs, &mut result);
        result
    }

    /// Scan every string leaf outside identifier keys, `muhasabah` and
    /// subjective subtrees.
    fn scan_text(&self, value: &Value, path: &str, has_refs: bool, result: &mut ValidationResult) {
        match value {
            Value::Object(map) => {
                if map.get("is_subjective").and_then(Value::as_bool) == Some(true) {
                    return;
                }
                for (key, child) in map {
                    if is_text_key(key) {
                        self.scan_text(child, &child_path(path, key), has_refs, result);
                    }
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.scan_text(item, &format!("{}[{}]", path, i), has_refs, result);
                }
            }
            Value::String(text) => {
                let here = if path.is_empty() { "$" } else { path };
                report_assertions(&extract_assertions(text), here, has_refs, result);
            }
            _ => {}
        }
    }
}

pub(crate) fn report_assertions(
    assertions: &[FactualAssertion],
    path: &str,
    has_refs: bool,
    result: &mut ValidationResult,
) {
    for a in assertions {
        let span_path = format!("{}[{}:{}]", path, a.start, a.end);
        let kind = match a.kind {
            AssertionKind::Pattern => "pattern",
            AssertionKind::Semantic => "semantic",
        };
        if has_refs {
            result.push_warning(ValidationIssue::new(
                IssueCode::UngroundedAssertion,
                format!(
                    "Assertion '{}' ({} rule {}) is not tied to a specific reference",
                    a.matched_text, kind, a.rule
                ),
                span_path,
            ));
        } else {
            result.push_error(ValidationIssue::new(
                IssueCode::UnreferencedFact,
                format!(
                    "Assertion '{}' ({} rule {}) has no claim or calc reference",
                    a.matched_text, kind, a.rule
                ),
                span_path,
            ));
        }
    }
}

fn check_located_refs(
    located: &[LocatedRef],
    registry: Option<&RegistrySnapshot>,
    result: &mut ValidationResult,
) {
    for r in located {
        if r.id.trim().is_empty() {
            result.push_error(ValidationIssue::new(
                IssueCode::EmptyReference,
                "Reference is empty",
                r.path.clone(),
            ));
            continue;
        }
        let Some(registry) = registry else {
            continue;
        };
        let unknown = match r.kind {
            RefKind::Claim if !registry.contains_claim(&r.id) => Some(IssueCode::UnknownClaimReference),
            RefKind::Calc if !registry.contains_calc(&r.id) => Some(IssueCode::UnknownCalcReference),
            RefKind::Enrichment if !registry.contains_enrichment(&r.id) => {
                Some(IssueCode::UnknownEnrichmentReference)
            }
            _ => None,
        };
        if let Some(code) = unknown {
            result.push_error(ValidationIssue::new(
                code,
                format!("Reference {} is not in the registry", r.id),
                r.path.clone(),
            ));
        }
    }
}

fn section_type(map: &serde_json::Map<String, Value>) -> Option<&str> {
    map.get("section_type")
        .or_else(|| map.get("type"))
        .and_then(Value::as_str)
}

fn check_sections(value: &Value, path: &str, result: &mut ValidationResult) {
    match value {
        Value::Object(map) => {
            if let Some(kind) = section_type(map) {
                let normalized = kind.to_ascii_uppercase();
                if REFERENCE_REQUIRED_SECTIONS.contains(&normalized.as_str())
                    && ReferenceSet::collect(value).is_empty()
                {
                    result.push_error(ValidationIssue::new(
                        IssueCode::SectionMissingReferences,
                        format!("{} section carries no claim or calc references", normalized),
                        if path.is_empty() { "$".to_string() } else { path.to_string() },
                    ));
                }
            }
            for (key, child) in map {
                check_sections(child, &child_path(path, key), result);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                check_sections(item, &format!("{}[{}]", path, i), result);
            }
        }
        _ => {}
    }
}
