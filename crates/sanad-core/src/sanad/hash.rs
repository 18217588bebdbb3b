//! Content hashing for Sanad integrity checks.

use sha2::{Digest, Sha256};

use super::model::Sanad;
use super::SanadError;

/// SHA-256 (hex) over the canonical form of a Sanad.
///
/// Canonical form sorts corroborating evidence ids and grade explanation
/// entries (by their serialized form). Chain nodes and defects keep their
/// recorded order because that order is part of the content.
pub fn stable_hash(sanad: &Sanad) -> Result<String, SanadError> {
    let mut canonical = sanad.clone();
    canonical.corroborating_evidence_ids.sort();

    let mut keyed = Vec::with_capacity(canonical.grade_explanation.len());
    for entry in canonical.grade_explanation.drain(..) {
        let key = serde_json::to_string(&entry).map_err(|e| SanadError::Malformed(e.to_string()))?;
        keyed.push((key, entry));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    canonical.grade_explanation = keyed.into_iter().map(|(_, entry)| entry).collect();

    let bytes = serde_json::to_vec(&canonical).map_err(|e| SanadError::Malformed(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
