//! Factual assertion extraction.

use serde::Serialize;
use std::collections::BTreeMap;

use super::patterns::NUMERIC_RULES;
use super::semantic::SEMANTIC_RULES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    Pattern,
    Semantic,
}

/// A factual shape found in text. `start..end` is a byte range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactualAssertion {
    pub rule: &'static str,
    pub kind: AssertionKind,
    pub matched_text: String,
    pub start: usize,
    pub end: usize,
}

/// Every factual assertion in `text`, ordered by position.
///
/// Each start offset is reported once, under the first rule in library
/// order (pattern rules before semantic rules).
pub fn extract_assertions(text: &str) -> Vec<FactualAssertion> {
    let mut by_start: BTreeMap<usize, FactualAssertion> = BTreeMap::new();

    let rules = NUMERIC_RULES
        .iter()
        .map(|(name, re)| (AssertionKind::Pattern, *name, re))
        .chain(
            SEMANTIC_RULES
                .iter()
                .map(|(name, re)| (AssertionKind::Semantic, *name, re)),
        );

    for (kind, rule, re) in rules {
        for m in re.find_iter(text) {
            by_start
                .entry(m.start())
                .or_insert_with(|| FactualAssertion {
                    rule,
                    kind,
                    matched_text: m.as_str().to_string(),
                    start: m.start(),
                    end: m.end(),
                });
        }
    }

    by_start.into_values().collect()
}

/// Whether any rule matches `text`.
pub fn contains_factual_assertion(text: &str) -> bool {
    NUMERIC_RULES
        .iter()
        .chain(SEMANTIC_RULES.iter())
        .any(|(_, re)| re.is_match(text))
}
