//! Deterministic claim deduplication and entity resolution.
//!
//! Claim identity is a namespace-scoped content hash: two chained UUIDv5
//! (SHA-1) name hashes, first over the deal id, then over the normalized
//! claim text. Identical normalized text inside one deal collides by
//! construction.
//!
//! Three passes run in order:
//! 1. **Exact match**: same identity, keep the most confident draft.
//! 2. **Value match**: same class, exact numeric value and time window.
//! 3. **Near-match flagging**: numeric values within tolerance are reported,
//!    never merged. Wider gaps belong to the conflict detector.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::types::{ClaimClass, ClaimValue};

/// Namespace used when the caller does not inject one.
pub const DEFAULT_DEDUP_NAMESPACE: Uuid = Uuid::from_u128(0x5a1d_3c0e_8f2b_5e4a_9c71_d2b6_0e84_f193);

/// Deduplicator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Root namespace for identity hashing
    pub namespace: Uuid,

    /// Maximum relative difference reported as a near-match
    pub near_match_tolerance: Decimal,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_DEDUP_NAMESPACE,
            near_match_tolerance: Decimal::new(5, 2),
        }
    }
}

/// A raw claim as extracted from a document, before resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDraft {
    pub claim_text: String,
    pub claim_class: ClaimClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ClaimValue>,
    pub extraction_confidence: f64,
    #[serde(default)]
    pub span_ids: Vec<String>,
}

/// A resolved claim identity with everything merged into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeduplicatedClaim {
    pub identity_hash: String,
    pub claim_text: String,
    pub claim_class: ClaimClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ClaimValue>,
    pub extraction_confidence: f64,
    pub span_ids: BTreeSet<String>,

    /// Number of drafts folded into this claim (1 when nothing merged)
    pub merged_count: usize,
}

impl DeduplicatedClaim {
    /// Turn the resolved claim back into a draft for re-submission.
    pub fn to_draft(&self) -> ClaimDraft {
        ClaimDraft {
            claim_text: self.claim_text.clone(),
            claim_class: self.claim_class,
            value: self.value.clone(),
            extraction_confidence: self.extraction_confidence,
            span_ids: self.span_ids.iter().cloned().collect(),
        }
    }

    fn absorb(&mut self, other: DeduplicatedClaim) {
        self.extraction_confidence = self.extraction_confidence.max(other.extraction_confidence);
        self.span_ids.extend(other.span_ids);
        self.merged_count += other.merged_count;
    }
}

/// Two surviving claims whose numeric values are within tolerance.
///
/// `first` always sorts before `second`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearMatch {
    pub first: String,
    pub second: String,
    pub claim_class: ClaimClass,
    pub relative_difference: Decimal,
}

/// Output of a deduplication run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeduplicationResult {
    /// Unique claims ordered by identity hash
    pub unique_claims: Vec<DeduplicatedClaim>,

    /// Drafts absorbed into another claim
    pub merged_count: usize,

    pub near_matches: Vec<NearMatch>,
}

impl DeduplicationResult {
    /// Whether `a` and `b` were flagged as a near-match, in either order.
    pub fn is_near_match(&self, a: &str, b: &str) -> bool {
        self.near_matches.iter().any(|m| {
            (m.first == a && m.second == b) || (m.first == b && m.second == a)
        })
    }
}

/// Lowercase, collapse whitespace, trim.
pub fn normalize_claim_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic identity for a claim text inside a deal.
pub fn claim_identity(namespace: &Uuid, deal_id: &str, claim_text: &str) -> Uuid {
    let deal_namespace = Uuid::new_v5(namespace, deal_id.as_bytes());
    Uuid::new_v5(&deal_namespace, normalize_claim_text(claim_text).as_bytes())
}

/// Resolves raw claim drafts into unique claim identities.
pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    /// Create a deduplicator with an explicit namespace and tolerance.
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// The namespace and tolerance in use.
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Identity of `claim_text` within `deal_id` under this deduplicator's namespace.
    pub fn identity(&self, deal_id: &str, claim_text: &str) -> String {
        claim_identity(&self.config.namespace, deal_id, claim_text).to_string()
    }

    /// Deduplicate all drafts for one deal.
    ///
    /// Drafts with empty text are skipped, not rejected.
    ///
    /// # Arguments
    ///
    /// * `deal_id` - Scope of the claim identities
    /// * `drafts` - Extracted claims, in any order
    ///
    /// # Returns
    ///
    /// A `DeduplicationResult` containing:
    /// - `unique_claims`: one claim per identity, ordered by identity hash
    /// - `merged_count`: drafts folded into an existing claim
    /// - `near_matches`: pairs flagged for review, never merged
    pub fn deduplicate(&self, deal_id: &str, drafts: &[ClaimDraft]) -> DeduplicationResult {
        let exact = self.merge_exact(deal_id, drafts);
        let claims = self.merge_by_value(exact);
        let near_matches = self.flag_near_matches(&claims);

        let unique_claims: Vec<DeduplicatedClaim> = claims.into_values().collect();
        let merged_count = unique_claims.iter().map(|c| c.merged_count - 1).sum();

        tracing::debug!(
            deal_id = %deal_id,
            drafts = drafts.len(),
            unique = unique_claims.len(),
            merged = merged_count,
            near_matches = near_matches.len(),
            "Claim deduplication complete"
        );

        DeduplicationResult {
            unique_claims,
            merged_count,
            near_matches,
        }
    }

    /// Pass 1: collapse drafts sharing an identity.
    fn merge_exact(&self, deal_id: &str, drafts: &[ClaimDraft]) -> BTreeMap<String, DeduplicatedClaim> {
        let mut claims: BTreeMap<String, DeduplicatedClaim> = BTreeMap::new();

        for (index, draft) in drafts.iter().enumerate() {
            if normalize_claim_text(&draft.claim_text).is_empty() {
                tracing::debug!(deal_id = %deal_id, index, "Skipping draft with empty claim_text");
                continue;
            }

            let identity = self.identity(deal_id, &draft.claim_text);
            let candidate = DeduplicatedClaim {
                identity_hash: identity.clone(),
                claim_text: draft.claim_text.clone(),
                claim_class: draft.claim_class,
                value: draft.value.clone(),
                extraction_confidence: draft.extraction_confidence,
                span_ids: draft.span_ids.iter().cloned().collect(),
                merged_count: 1,
            };

            match claims.get_mut(&identity) {
                Some(existing) => {
                    if candidate.extraction_confidence > existing.extraction_confidence {
                        existing.claim_text = candidate.claim_text.clone();
                        existing.claim_class = candidate.claim_class;
                        existing.value = candidate.value.clone();
                    }
                    existing.absorb(candidate);
                }
                None => {
                    claims.insert(identity, candidate);
                }
            }
        }

        claims
    }

    /// Pass 2: collapse distinct texts asserting the same number, unit and window.
    fn merge_by_value(
        &self,
        mut claims: BTreeMap<String, DeduplicatedClaim>,
    ) -> BTreeMap<String, DeduplicatedClaim> {
        let mut groups: BTreeMap<ValueKey, Vec<String>> = BTreeMap::new();

        for (identity, claim) in &claims {
            if let Some(key) = value_key(claim) {
                groups.entry(key).or_default().push(identity.clone());
            }
        }

        for members in groups.into_values().filter(|m| m.len() >= 2) {
            let primary_id = &members[0];
            for absorbed_id in &members[1..] {
                if let Some(absorbed) = claims.remove(absorbed_id) {
                    if let Some(primary) = claims.get_mut(primary_id) {
                        tracing::debug!(
                            primary = %primary_id,
                            absorbed = %absorbed_id,
                            "Merging claims with identical value and time window"
                        );
                        primary.absorb(absorbed);
                    }
                }
            }
        }

        claims
    }

    /// Pass 3: report pairs within tolerance, per claim class.
    fn flag_near_matches(&self, claims: &BTreeMap<String, DeduplicatedClaim>) -> Vec<NearMatch> {
        let numeric: Vec<(&DeduplicatedClaim, Decimal, String)> = claims
            .values()
            .filter_map(|c| {
                let value = c.value.as_ref()?;
                Some((c, value.numeric_value()?, value.unit_key()?))
            })
            .collect();

        let mut matches = Vec::new();
        for (i, (a, a_value, a_unit)) in numeric.iter().enumerate() {
            for (b, b_value, b_unit) in &numeric[i + 1..] {
                if a.claim_class != b.claim_class || a_unit != b_unit {
                    continue;
                }
                if let Some(diff) = relative_difference(*a_value, *b_value) {
                    if diff <= self.config.near_match_tolerance {
                        matches.push(NearMatch {
                            first: a.identity_hash.clone(),
                            second: b.identity_hash.clone(),
                            claim_class: a.claim_class,
                            relative_difference: diff,
                        });
                    }
                }
            }
        }

        matches
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

/// (class, unit, normalized number, window)
type ValueKey = (ClaimClass, String, String, String);

fn value_key(claim: &DeduplicatedClaim) -> Option<ValueKey> {
    let value = claim.value.as_ref()?;
    let number = value.numeric_value()?;
    let window = value.time_window()?;
    Some((
        claim.claim_class,
        value.unit_key()?,
        number.normalize().to_string(),
        window.to_string(),
    ))
}

/// `|a - b| / max(|a|, |b|)`, or `None` when both are zero.
fn relative_difference(a: Decimal, b: Decimal) -> Option<Decimal> {
    let denominator = a.abs().max(b.abs());
    if denominator.is_zero() {
        return None;
    }
    Some((a - b).abs() / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(text: &str, confidence: f64, spans: &[&str]) -> ClaimDraft {
        ClaimDraft {
            claim_text: text.to_string(),
            claim_class: ClaimClass::Financial,
            value: None,
            extraction_confidence: confidence,
            span_ids: spans.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn money(text: &str, amount: i64, window: Option<&str>) -> ClaimDraft {
        ClaimDraft {
            value: Some(ClaimValue::Monetary {
                amount: Decimal::new(amount, 0),
                currency: "USD".to_string(),
                time_window: window.map(str::to_string),
            }),
            ..draft(text, 0.8, &[])
        }
    }

    #[test]
    fn test_normalize_claim_text() {
        assert_eq!(normalize_claim_text("  ARR   is\t$4,500,000 \n"), "arr is $4,500,000");
    }

    #[test]
    fn test_case_variants_collapse() {
        let drafts = vec![
            draft("ARR is $4,500,000", 0.7, &["s1"]),
            draft("arr is $4,500,000", 0.9, &["s2"]),
        ];
        let result = Deduplicator::default().deduplicate("deal-1", &drafts);

        assert_eq!(result.unique_claims.len(), 1);
        assert_eq!(result.merged_count, 1);

        let claim = &result.unique_claims[0];
        assert_eq!(claim.extraction_confidence, 0.9);
        assert_eq!(claim.claim_text, "arr is $4,500,000");
        assert_eq!(claim.merged_count, 2);
        assert!(claim.span_ids.contains("s1") && claim.span_ids.contains("s2"));
    }

    #[test]
    fn test_identity_scoped_by_deal() {
        let dedup = Deduplicator::default();
        assert_ne!(dedup.identity("deal-1", "ARR is $1M"), dedup.identity("deal-2", "ARR is $1M"));
        assert_eq!(dedup.identity("deal-1", "ARR is $1M"), dedup.identity("deal-1", " arr  IS $1m"));
    }

    #[test]
    fn test_namespace_is_injected() {
        let other = Deduplicator::new(DedupConfig {
            namespace: Uuid::from_u128(42),
            ..DedupConfig::default()
        });
        assert_ne!(
            other.identity("deal-1", "ARR is $1M"),
            Deduplicator::default().identity("deal-1", "ARR is $1M")
        );
    }

    #[test]
    fn test_identity_is_uuid_v5() {
        let id = Deduplicator::default().identity("deal-1", "Team of 12");
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 5);
    }

    #[test]
    fn test_empty_text_skipped() {
        let drafts = vec![draft("   ", 0.9, &["s1"]), draft("Burn is $200k", 0.5, &["s2"])];
        let result = Deduplicator::default().deduplicate("deal-1", &drafts);
        assert_eq!(result.unique_claims.len(), 1);
        assert_eq!(result.merged_count, 0);
    }

    #[test]
    fn test_value_match_merges_same_window() {
        let drafts = vec![
            money("Revenue was $2M in FY2024", 2_000_000, Some("FY2024")),
            money("FY24 revenue reached two million dollars", 2_000_000, Some("FY2024")),
            money("Revenue was $2M in FY2023", 2_000_000, Some("FY2023")),
        ];
        let result = Deduplicator::default().deduplicate("deal-1", &drafts);

        assert_eq!(result.unique_claims.len(), 2);
        assert_eq!(result.merged_count, 1);
        assert!(result.unique_claims.iter().any(|c| c.merged_count == 2));
    }

    #[test]
    fn test_value_match_requires_time_window() {
        let drafts = vec![
            money("Revenue was $2M", 2_000_000, None),
            money("Sales hit $2M", 2_000_000, None),
        ];
        let result = Deduplicator::default().deduplicate("deal-1", &drafts);
        assert_eq!(result.unique_claims.len(), 2);
    }

    #[test]
    fn test_value_match_requires_same_unit() {
        let mut eur = money("Revenue was EUR 2M in FY2024", 2_000_000, Some("FY2024"));
        eur.value = Some(ClaimValue::Monetary {
            amount: Decimal::new(2_000_000, 0),
            currency: "EUR".to_string(),
            time_window: Some("FY2024".to_string()),
        });
        let usd = money("Revenue was $2M in FY2024", 2_000_000, Some("FY2024"));
        let result = Deduplicator::default().deduplicate("deal-1", &[eur, usd]);
        assert_eq!(result.unique_claims.len(), 2);
        assert!(result.near_matches.is_empty());

        let percent = ClaimDraft {
            value: Some(ClaimValue::Percentage {
                value: Decimal::new(50, 0),
                time_window: Some("FY2024".to_string()),
            }),
            ..draft("Churn was 50%", 0.8, &[])
        };
        let count = ClaimDraft {
            value: Some(ClaimValue::Count {
                value: Decimal::new(50, 0),
                time_window: Some("FY2024".to_string()),
            }),
            ..draft("50 customers churned", 0.8, &[])
        };
        let result = Deduplicator::default().deduplicate("deal-1", &[percent, count]);
        assert_eq!(result.unique_claims.len(), 2);
        assert_eq!(result.merged_count, 0);
    }

    #[test]
    fn test_currency_case_insensitive() {
        let mut lower = money("Revenue: 2,000,000 usd", 2_000_000, Some("FY2024"));
        lower.value = Some(ClaimValue::Monetary {
            amount: Decimal::new(2_000_000, 0),
            currency: "usd".to_string(),
            time_window: Some("FY2024".to_string()),
        });
        let upper = money("Revenue was $2M", 2_000_000, Some("FY2024"));
        let result = Deduplicator::default().deduplicate("deal-1", &[lower, upper]);
        assert_eq!(result.unique_claims.len(), 1);
    }

    #[test]
    fn test_value_match_normalizes_scale() {
        let mut a = money("Revenue was $2M", 0, Some("FY2024"));
        a.value = Some(ClaimValue::Monetary {
            amount: Decimal::new(200_000_000, 2),
            currency: "USD".to_string(),
            time_window: Some("FY2024".to_string()),
        });
        let b = money("Revenue: 2,000,000 USD", 2_000_000, Some("FY2024"));
        let result = Deduplicator::default().deduplicate("deal-1", &[a, b]);
        assert_eq!(result.unique_claims.len(), 1);
    }

    #[test]
    fn test_near_match_within_tolerance() {
        let drafts = vec![
            money("ARR is $1,000,000", 1_000_000, Some("2025")),
            money("ARR is about $1,040,000", 1_040_000, Some("2025-Q4")),
        ];
        let result = Deduplicator::default().deduplicate("deal-1", &drafts);

        assert_eq!(result.unique_claims.len(), 2);
        assert_eq!(result.near_matches.len(), 1);
        let m = &result.near_matches[0];
        assert!(m.first < m.second);
        assert!(result.is_near_match(&m.second, &m.first));
    }

    #[test]
    fn test_wide_gap_not_flagged() {
        let drafts = vec![
            money("ARR is $1,000,000", 1_000_000, None),
            money("ARR is $1,200,000", 1_200_000, None),
        ];
        let result = Deduplicator::default().deduplicate("deal-1", &drafts);
        assert!(result.near_matches.is_empty());
    }

    #[test]
    fn test_zero_values_skipped() {
        let drafts = vec![
            money("Debt is $0", 0, None),
            money("No outstanding debt: $0", 0, None),
        ];
        let result = Deduplicator::default().deduplicate("deal-1", &drafts);
        assert!(result.near_matches.is_empty());
    }

    #[test]
    fn test_near_match_respects_class() {
        let mut team = money("Team of 100", 100, None);
        team.claim_class = ClaimClass::Team;
        let drafts = vec![money("Revenue is $101", 101, None), team];
        let result = Deduplicator::default().deduplicate("deal-1", &drafts);
        assert!(result.near_matches.is_empty());
    }

    #[test]
    fn test_output_sorted_by_identity() {
        let drafts: Vec<ClaimDraft> = (0..10)
            .map(|i| draft(&format!("Claim number {}", i), 0.5, &[]))
            .collect();
        let result = Deduplicator::default().deduplicate("deal-1", &drafts);
        let ids: Vec<&String> = result.unique_claims.iter().map(|c| &c.identity_hash).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
