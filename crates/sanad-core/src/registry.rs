//! Claim/calc registry snapshot used as the grounding set for gates.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Immutable view of the claims and calculations known for one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub claim_ids: BTreeSet<String>,

    #[serde(default)]
    pub calc_ids: BTreeSet<String>,

    /// Enrichment reference id -> provider that produced it
    #[serde(default)]
    pub enrichment_refs: BTreeMap<String, String>,
}

impl RegistrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_claims<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.claim_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_calcs<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.calc_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_enrichment(mut self, ref_id: impl Into<String>, provider: impl Into<String>) -> Self {
        self.enrichment_refs.insert(ref_id.into(), provider.into());
        self
    }

    pub fn contains_claim(&self, id: &str) -> bool {
        self.claim_ids.contains(id)
    }

    pub fn contains_calc(&self, id: &str) -> bool {
        self.calc_ids.contains(id)
    }

    pub fn contains_enrichment(&self, id: &str) -> bool {
        self.enrichment_refs.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_lookup() {
        let reg = RegistrySnapshot::new()
            .with_claims(["c1", "c2"])
            .with_calcs(["k1"])
            .with_enrichment("e1", "crunchbase");

        assert!(reg.contains_claim("c1"));
        assert!(!reg.contains_claim("k1"));
        assert!(reg.contains_calc("k1"));
        assert!(reg.contains_enrichment("e1"));
    }
}
