//! Fail-closed structural and consistency checks for Sanad records.

use std::collections::HashSet;

use super::model::Sanad;
use super::SanadError;
use crate::types::Grade;
use crate::validation::{ValidationIssue, ValidationResult};

/// Validate the shape and tenant/deal consistency of a Sanad.
///
/// Returns the first violation found. Use [`validation_result`] to see all of them.
pub fn validate(sanad: &Sanad) -> Result<(), SanadError> {
    match structural_violations(sanad).into_iter().next() {
        Some((_, err)) => Err(err),
        None => Ok(()),
    }
}

/// Reject an open FATAL defect coexisting with any grade other than D.
pub fn grade_consistency(sanad: &Sanad) -> Result<(), SanadError> {
    if sanad.sanad_grade == Grade::D {
        return Ok(());
    }
    match sanad
        .open_defects()
        .find(|d| d.severity == crate::types::Severity::Fatal)
    {
        Some(defect) => Err(SanadError::GradeDefectMismatch {
            defect_id: defect.defect_id.clone(),
            grade: sanad.sanad_grade,
        }),
        None => Ok(()),
    }
}

/// All violations as a gate result, with field paths.
pub fn validation_result(sanad: &Sanad) -> ValidationResult {
    let errors = all_violations(sanad)
        .into_iter()
        .map(|(path, err)| ValidationIssue::new(err.code(), err.to_string(), path))
        .collect();
    ValidationResult::from_issues(errors, Vec::new())
}

/// Deserialize a Sanad from JSON and run every check on it.
///
/// Unknown node types or grades fail deserialization and are reported as
/// malformed records.
pub fn parse_sanad(json: &str) -> Result<Sanad, SanadError> {
    let sanad: Sanad =
        serde_json::from_str(json).map_err(|e| SanadError::Malformed(e.to_string()))?;
    validate(&sanad)?;
    grade_consistency(&sanad)?;
    Ok(sanad)
}

fn all_violations(sanad: &Sanad) -> Vec<(String, SanadError)> {
    let mut found = structural_violations(sanad);
    if let Err(err) = grade_consistency(sanad) {
        found.push(("sanad_grade".to_string(), err));
    }
    found
}

fn structural_violations(sanad: &Sanad) -> Vec<(String, SanadError)> {
    let mut found = Vec::new();

    if sanad.primary_evidence_id.trim().is_empty() {
        found.push(("primary_evidence_id".to_string(), SanadError::MissingPrimaryEvidence));
    } else if sanad
        .corroborating_evidence_ids
        .contains(&sanad.primary_evidence_id)
    {
        found.push((
            "corroborating_evidence_ids".to_string(),
            SanadError::PrimaryListedAsCorroboration(sanad.primary_evidence_id.clone()),
        ));
    }

    check_chain(sanad, &mut found);

    for (i, defect) in sanad.defects.iter().enumerate() {
        if defect.tenant_id != sanad.tenant_id {
            found.push((
                format!("defects[{}].tenant_id", i),
                SanadError::TenantMismatch {
                    defect_id: defect.defect_id.clone(),
                    expected: sanad.tenant_id.clone(),
                    found: defect.tenant_id.clone(),
                },
            ));
        }
        if let Some(deal_id) = &defect.deal_id {
            if deal_id != &sanad.deal_id {
                found.push((
                    format!("defects[{}].deal_id", i),
                    SanadError::DealMismatch {
                        defect_id: defect.defect_id.clone(),
                        expected: sanad.deal_id.clone(),
                        found: deal_id.clone(),
                    },
                ));
            }
        }
    }

    found
}

fn check_chain(sanad: &Sanad, found: &mut Vec<(String, SanadError)>) {
    if sanad.transmission_chain.is_empty() {
        found.push(("transmission_chain".to_string(), SanadError::EmptyChain));
        return;
    }

    let mut seen = HashSet::new();
    let mut last_timestamp = None;

    for (i, node) in sanad.transmission_chain.iter().enumerate() {
        let path = format!("transmission_chain[{}]", i);

        if !seen.insert(node.node_id.as_str()) {
            found.push((path.clone(), SanadError::DuplicateNodeId(node.node_id.clone())));
        }

        // Order is meaningful and never repaired here
        if let Some(ts) = node.timestamp {
            if let Some(prev) = last_timestamp {
                if ts < prev {
                    found.push((
                        format!("{}.timestamp", path),
                        SanadError::ChainOutOfOrder {
                            node_id: node.node_id.clone(),
                            index: i,
                        },
                    ));
                }
            }
            last_timestamp = Some(ts);
        }

        for (field, value) in [("confidence", node.confidence), ("dhabt_score", node.dhabt_score)] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    found.push((
                        format!("{}.{}", path, field),
                        SanadError::ScoreOutOfRange {
                            node_id: node.node_id.clone(),
                            field,
                            value: v,
                        },
                    ));
                }
            }
        }
    }
}
