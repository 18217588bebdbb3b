//! Tawatur: multi-source independence and collusion-risk assessment.
//!
//! Sources sharing an independence key are dependent by construction. The
//! key joins, with `|`:
//!
//! | Part | Fallback |
//! |------|----------|
//! | `source_system` | `UNKNOWN_SYSTEM` |
//! | `upstream_origin_id`, else `evidence_id` | `UNKNOWN_ORIGIN` |
//! | `artifact_id` | `NO_ARTIFACT` |
//! | retrieval time floored to the bucket size | `UNKNOWN_TIME` / `INVALID_TIME` |
//!
//! Collusion risk is a weighted sum of system concentration, time clustering
//! and transmission-chain overlap. Enough independent sources with too much
//! collusion risk are reported as AHAD_2, never MUTAWATIR.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::sanad::EvidenceItem;
use crate::types::CorroborationStatus;

const UNKNOWN_SYSTEM: &str = "UNKNOWN_SYSTEM";
const UNKNOWN_ORIGIN: &str = "UNKNOWN_ORIGIN";
const NO_ARTIFACT: &str = "NO_ARTIFACT";
const UNKNOWN_TIME: &str = "UNKNOWN_TIME";
const INVALID_TIME: &str = "INVALID_TIME";

/// Weights of the collusion-risk terms. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollusionWeights {
    pub system_concentration: f64,
    pub time_clustering: f64,
    pub chain_overlap: f64,
}

impl CollusionWeights {
    pub fn total(&self) -> f64 {
        self.system_concentration + self.time_clustering + self.chain_overlap
    }
}

impl Default for CollusionWeights {
    fn default() -> Self {
        Self {
            system_concentration: 0.40,
            time_clustering: 0.30,
            chain_overlap: 0.30,
        }
    }
}

/// Tawatur thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TawaturConfig {
    /// Independent sources required for MUTAWATIR
    pub mutawatir_threshold: usize,

    /// Highest collusion risk still allowing MUTAWATIR
    pub collusion_threshold: f64,

    /// Width of the retrieval-time bucket in the independence key
    pub time_bucket_hours: u32,

    #[serde(default)]
    pub weights: CollusionWeights,
}

impl Default for TawaturConfig {
    fn default() -> Self {
        Self {
            mutawatir_threshold: 3,
            collusion_threshold: 0.30,
            time_bucket_hours: 1,
            weights: CollusionWeights::default(),
        }
    }
}

/// The three collusion-risk terms before weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CollusionBreakdown {
    pub system_concentration: f64,
    pub time_clustering: f64,
    pub chain_overlap: f64,
}

/// Outcome of a Tawatur assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TawaturResult {
    pub status: CorroborationStatus,
    pub independent_count: usize,

    /// Weighted risk in [0, 1], rounded to 4 decimal places
    pub collusion_risk: f64,

    pub breakdown: CollusionBreakdown,

    /// Distinct independence keys, sorted
    pub independence_keys: Vec<String>,

    /// Independence key -> evidence ids sharing it
    pub grouped_sources: BTreeMap<String, Vec<String>>,

    pub explanation: String,
}

/// Assesses how independently a set of evidence items attests a claim.
pub struct TawaturAssessor {
    config: TawaturConfig,
}

impl TawaturAssessor {
    pub fn new(config: TawaturConfig) -> Self {
        Self { config }
    }

    /// Thresholds, time bucket and collusion weights in use.
    pub fn config(&self) -> &TawaturConfig {
        &self.config
    }

    /// Assess a set of sources. Never fails; bad timestamps map to sentinels.
    ///
    /// # Returns
    ///
    /// A `TawaturResult` containing:
    /// - `status`: NONE, AHAD_1, AHAD_2 or MUTAWATIR
    /// - `independent_count`: distinct independence keys
    /// - `collusion_risk`: weighted risk in [0, 1], rounded to 4 places
    /// - `breakdown`: the three risk components before weighting
    pub fn assess(&self, sources: &[EvidenceItem]) -> TawaturResult {
        let mut grouped_sources: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for source in sources {
            grouped_sources
                .entry(self.independence_key(source))
                .or_default()
                .push(source.evidence_id.clone());
        }

        let independence_keys: Vec<String> = grouped_sources.keys().cloned().collect();
        let independent_count = independence_keys.len();

        let breakdown = CollusionBreakdown {
            system_concentration: system_concentration(sources),
            time_clustering: time_clustering(sources),
            chain_overlap: chain_overlap(sources),
        };
        let weights = &self.config.weights;
        let raw = weights.system_concentration * breakdown.system_concentration
            + weights.time_clustering * breakdown.time_clustering
            + weights.chain_overlap * breakdown.chain_overlap;
        let collusion_risk = round4(raw.clamp(0.0, 1.0));

        let (status, explanation) = self.classify(sources.len(), independent_count, collusion_risk);

        TawaturResult {
            status,
            independent_count,
            collusion_risk,
            breakdown,
            independence_keys,
            grouped_sources,
            explanation,
        }
    }

    fn classify(
        &self,
        total: usize,
        independent: usize,
        risk: f64,
    ) -> (CorroborationStatus, String) {
        let threshold = self.config.mutawatir_threshold;

        if total == 0 {
            return (CorroborationStatus::None, "No sources".to_string());
        }
        if independent >= threshold {
            if risk <= self.config.collusion_threshold {
                return (
                    CorroborationStatus::Mutawatir,
                    format!(
                        "{} independent sources (>= {}) with collusion risk {:.4} <= {:.2}",
                        independent, threshold, risk, self.config.collusion_threshold
                    ),
                );
            }
            tracing::warn!(
                independent,
                collusion_risk = risk,
                threshold = self.config.collusion_threshold,
                "Collusion risk too high for MUTAWATIR, downgrading to AHAD_2"
            );
            return (
                CorroborationStatus::Ahad2,
                format!(
                    "{} independent sources but collusion risk {:.4} > {:.2}; downgraded to AHAD_2",
                    independent, risk, self.config.collusion_threshold
                ),
            );
        }
        if independent <= 1 {
            return (
                CorroborationStatus::Ahad1,
                format!("{} source(s) sharing a single independence key", total),
            );
        }
        (
            CorroborationStatus::Ahad2,
            format!(
                "{} independent sources, below MUTAWATIR threshold {}",
                independent, threshold
            ),
        )
    }

    /// Key under which sources are considered the same attestation.
    pub fn independence_key(&self, source: &EvidenceItem) -> String {
        let system = non_empty(source.source_system.as_deref()).unwrap_or(UNKNOWN_SYSTEM);
        let origin = non_empty(source.upstream_origin_id.as_deref())
            .or_else(|| non_empty(Some(source.evidence_id.as_str())))
            .unwrap_or(UNKNOWN_ORIGIN);
        let artifact = non_empty(source.artifact_id.as_deref()).unwrap_or(NO_ARTIFACT);
        let bucket = self.time_bucket(source.retrieval_timestamp.as_deref());

        format!("{}|{}|{}|{}", system, origin, artifact, bucket)
    }

    fn time_bucket(&self, raw: Option<&str>) -> String {
        let Some(raw) = non_empty(raw) else {
            return UNKNOWN_TIME.to_string();
        };
        let Some(ts) = parse_timestamp(raw) else {
            return INVALID_TIME.to_string();
        };

        let width = i64::from(self.config.time_bucket_hours.max(1)) * 3600;
        let floored = ts.timestamp().div_euclid(width) * width;
        DateTime::<Utc>::from_timestamp(floored, 0)
            .map(|b| b.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| INVALID_TIME.to_string())
    }

    /// Pairwise independence check.
    ///
    /// A shared upstream origin makes two sources dependent even when the
    /// rest of their keys differ.
    pub fn check_source_independence(&self, a: &EvidenceItem, b: &EvidenceItem) -> (bool, String) {
        if let (Some(origin_a), Some(origin_b)) = (
            non_empty(a.upstream_origin_id.as_deref()),
            non_empty(b.upstream_origin_id.as_deref()),
        ) {
            if origin_a == origin_b {
                return (false, format!("Shared upstream origin: {}", origin_a));
            }
        }

        let key_a = self.independence_key(a);
        let key_b = self.independence_key(b);
        if key_a == key_b {
            return (false, format!("Identical independence key: {}", key_a));
        }

        (true, "Distinct independence keys".to_string())
    }
}

impl Default for TawaturAssessor {
    fn default() -> Self {
        Self::new(TawaturConfig::default())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// RFC 3339, or a naive ISO-8601 date-time read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Share of sources coming from the most common system.
fn system_concentration(sources: &[EvidenceItem]) -> f64 {
    if sources.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for source in sources {
        let system = non_empty(source.source_system.as_deref()).unwrap_or(UNKNOWN_SYSTEM);
        *counts.entry(system).or_default() += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    max as f64 / sources.len() as f64
}

/// Step function over the smallest gap between retrieval times, in
/// milliseconds. Only an exact tie scores 1.0.
fn time_clustering(sources: &[EvidenceItem]) -> f64 {
    let mut times: Vec<i64> = sources
        .iter()
        .filter_map(|s| non_empty(s.retrieval_timestamp.as_deref()))
        .filter_map(parse_timestamp)
        .map(|ts| ts.timestamp_millis())
        .collect();

    if times.len() < 2 {
        return 0.0;
    }
    times.sort_unstable();

    let min_gap = times
        .windows(2)
        .map(|w| w[1] - w[0])
        .min()
        .unwrap_or(i64::MAX);

    match min_gap {
        0 => 1.0,
        g if g < 60_000 => 0.9,
        g if g < 300_000 => 0.7,
        g if g < 3_600_000 => 0.4,
        g if g < 86_400_000 => 0.2,
        _ => 0.1,
    }
}

/// Fraction of source pairs whose transmission chains share a node.
fn chain_overlap(sources: &[EvidenceItem]) -> f64 {
    let n = sources.len();
    if n < 2 {
        return 0.0;
    }

    let chains: Vec<HashSet<&str>> = sources
        .iter()
        .map(|s| s.transmission_chain.iter().map(String::as_str).collect())
        .collect();

    let mut overlapping = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            if !chains[i].is_disjoint(&chains[j]) {
                overlapping += 1;
            }
        }
    }

    let pairs = n * (n - 1) / 2;
    overlapping as f64 / pairs as f64
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Grade;

    fn source(id: &str, system: &str, origin: &str, ts: &str) -> EvidenceItem {
        let mut e = EvidenceItem::new(id, "tenant-a", "deal-1", Grade::B);
        e.source_system = Some(system.to_string());
        e.upstream_origin_id = Some(origin.to_string());
        e.retrieval_timestamp = Some(ts.to_string());
        e
    }

    #[test]
    fn test_no_sources() {
        let r = TawaturAssessor::default().assess(&[]);
        assert_eq!(r.status, CorroborationStatus::None);
        assert_eq!(r.independent_count, 0);
        assert_eq!(r.collusion_risk, 0.0);
    }

    #[test]
    fn test_single_source_is_ahad_1() {
        let r = TawaturAssessor::default().assess(&[source("e1", "crm", "o1", "2026-01-01T00:00:00Z")]);
        assert_eq!(r.status, CorroborationStatus::Ahad1);
        assert_eq!(r.independent_count, 1);
    }

    #[test]
    fn test_two_sources_is_ahad_2() {
        let r = TawaturAssessor::default().assess(&[
            source("e1", "crm", "o1", "2026-01-01T00:00:00Z"),
            source("e2", "bank", "o2", "2026-01-03T00:00:00Z"),
        ]);
        assert_eq!(r.status, CorroborationStatus::Ahad2);
    }

    #[test]
    fn test_shared_key_counts_once() {
        let r = TawaturAssessor::default().assess(&[
            source("e1", "crm", "o1", "2026-01-01T10:05:00Z"),
            source("e2", "crm", "o1", "2026-01-01T10:45:00Z"),
            source("e3", "crm", "o1", "2026-01-01T10:59:59Z"),
        ]);
        assert_eq!(r.independent_count, 1);
        assert_eq!(r.status, CorroborationStatus::Ahad1);
        assert_eq!(r.grouped_sources.values().next().unwrap().len(), 3);
    }

    #[test]
    fn test_independent_low_risk_is_mutawatir() {
        let r = TawaturAssessor::default().assess(&[
            source("e1", "data_room", "o1", "2026-01-01T00:00:00Z"),
            source("e2", "crm", "o2", "2026-01-03T00:00:00Z"),
            source("e3", "bank", "o3", "2026-01-06T00:00:00Z"),
        ]);
        assert_eq!(r.independent_count, 3);
        // 0.4 * 1/3 + 0.3 * 0.1 + 0
        assert_eq!(r.collusion_risk, 0.1633);
        assert_eq!(r.status, CorroborationStatus::Mutawatir);
    }

    #[test]
    fn test_same_system_burst_downgraded() {
        let r = TawaturAssessor::default().assess(&[
            source("e1", "crm", "o1", "2026-01-01T10:00:00Z"),
            source("e2", "crm", "o2", "2026-01-01T10:00:10Z"),
            source("e3", "crm", "o3", "2026-01-01T10:00:25Z"),
        ]);
        assert_eq!(r.independent_count, 3);
        assert!(r.collusion_risk >= 0.4);
        assert_eq!(r.status, CorroborationStatus::Ahad2);
        assert!(r.explanation.contains("downgraded"));
    }

    #[test]
    fn test_time_clustering_steps() {
        let pair = |b: &str| {
            time_clustering(&[
                source("e1", "a", "o1", "2026-01-01T00:00:00Z"),
                source("e2", "b", "o2", b),
            ])
        };
        assert_eq!(pair("2026-01-01T00:00:00Z"), 1.0);
        assert_eq!(pair("2026-01-01T00:00:59Z"), 0.9);
        assert_eq!(pair("2026-01-01T00:04:59Z"), 0.7);
        assert_eq!(pair("2026-01-01T00:59:59Z"), 0.4);
        assert_eq!(pair("2026-01-01T23:59:59Z"), 0.2);
        assert_eq!(pair("2026-01-02T00:00:00Z"), 0.1);
    }

    #[test]
    fn test_time_clustering_sub_second_gap() {
        let t = time_clustering(&[
            source("e1", "a", "o1", "2026-01-01T10:00:00.100Z"),
            source("e2", "b", "o2", "2026-01-01T10:00:00.900Z"),
        ]);
        assert_eq!(t, 0.9);

        let tie = time_clustering(&[
            source("e1", "a", "o1", "2026-01-01T10:00:00.250Z"),
            source("e2", "b", "o2", "2026-01-01T10:00:00.250Z"),
        ]);
        assert_eq!(tie, 1.0);
    }

    #[test]
    fn test_time_clustering_ignores_unparseable() {
        let t = time_clustering(&[
            source("e1", "a", "o1", "2026-01-01T00:00:00Z"),
            source("e2", "b", "o2", "yesterday"),
        ]);
        assert_eq!(t, 0.0);
    }

    #[test]
    fn test_chain_overlap_fraction() {
        let mut a = source("e1", "a", "o1", "2026-01-01T00:00:00Z");
        let mut b = source("e2", "b", "o2", "2026-01-02T00:00:00Z");
        let mut c = source("e3", "c", "o3", "2026-01-03T00:00:00Z");
        a.transmission_chain = vec!["n1".into(), "n2".into()];
        b.transmission_chain = vec!["n2".into()];
        c.transmission_chain = vec!["n9".into()];
        // one overlapping pair (a, b) of three
        assert!((chain_overlap(&[a, b, c]) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_key_sentinels() {
        let assessor = TawaturAssessor::default();
        let mut e = EvidenceItem::new("e1", "t", "d", Grade::C);
        assert_eq!(assessor.independence_key(&e), "UNKNOWN_SYSTEM|e1|NO_ARTIFACT|UNKNOWN_TIME");

        e.retrieval_timestamp = Some("not a time".to_string());
        assert!(assessor.independence_key(&e).ends_with("|INVALID_TIME"));
    }

    #[test]
    fn test_key_time_bucket() {
        let assessor = TawaturAssessor::default();
        let mut e = source("e1", "crm", "o1", "2026-01-01T10:42:17Z");
        e.artifact_id = Some("doc-7".to_string());
        assert_eq!(
            assessor.independence_key(&e),
            "crm|o1|doc-7|2026-01-01T10:00:00Z"
        );

        let wide = TawaturAssessor::new(TawaturConfig {
            time_bucket_hours: 24,
            ..TawaturConfig::default()
        });
        assert!(wide.independence_key(&e).ends_with("|2026-01-01T00:00:00Z"));
    }

    #[test]
    fn test_naive_timestamp_accepted() {
        let assessor = TawaturAssessor::default();
        let e = source("e1", "crm", "o1", "2026-01-01 10:42:17");
        assert!(assessor.independence_key(&e).ends_with("|2026-01-01T10:00:00Z"));
    }

    #[test]
    fn test_pairwise_independence() {
        let assessor = TawaturAssessor::default();
        let a = source("e1", "crm", "o1", "2026-01-01T00:00:00Z");
        let b = source("e2", "bank", "o1", "2026-02-01T00:00:00Z");
        let c = source("e3", "bank", "o3", "2026-02-01T00:00:00Z");

        let (independent, reason) = assessor.check_source_independence(&a, &b);
        assert!(!independent);
        assert!(reason.contains("upstream origin"));

        let (independent, _) = assessor.check_source_independence(&a, &c);
        assert!(independent);
    }

    #[test]
    fn test_risk_is_clamped_and_rounded() {
        let mut items: Vec<EvidenceItem> = (0..4)
            .map(|i| source(&format!("e{}", i), "crm", &format!("o{}", i), "2026-01-01T00:00:00Z"))
            .collect();
        for item in &mut items {
            item.transmission_chain = vec!["shared".into()];
        }
        let r = TawaturAssessor::default().assess(&items);
        assert_eq!(r.collusion_risk, 1.0);
        assert_eq!(r.independent_count, 4);
        assert_eq!(r.status, CorroborationStatus::Ahad2);
    }
}
