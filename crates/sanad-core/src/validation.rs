//! Structured gate results.
//!
//! Every validator returns a `ValidationResult`. Callers must treat
//! `passed == false` as a hard block on publishing the artifact.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable code naming what a gate rejected or warned about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    // Shape errors
    MissingAgentId,
    InvalidAgentIdFormat,
    MissingOutputId,
    InvalidOutputIdFormat,
    InvalidClaimIdFormat,
    InvalidCalcIdFormat,
    MissingTimestamp,
    InvalidConfidence,
    InvalidRecordShape,
    FalsifiabilityMissingDescription,
    FalsifiabilityMissingRequiredEvidence,
    FalsifiabilityMissingPassFailRule,
    UncertaintyMissingStatement,
    UncertaintyMissingImpact,
    UncertaintyMissingMitigation,

    // Consistency errors
    TenantMismatch,
    DealMismatch,
    GradeDefectMismatch,
    EmptyTransmissionChain,
    DuplicateNodeId,
    ChainNotChronological,
    ScoreOutOfRange,
    MissingPrimaryEvidence,
    PrimaryInCorroboration,
    EvidenceNotFound,
    DefectNotFound,
    InvalidSanadShape,
    IllegalStatusTransition,

    // Policy violations
    NoSupportingReferences,
    HighConfidenceNoUncertainties,
    RecommendationNoFalsifiability,
    UnreferencedFact,
    UnknownClaimReference,
    UnknownCalcReference,
    UnknownEnrichmentReference,
    EmptyReference,
    SectionMissingReferences,
    FactMissingReferences,
    DissentMissingReferences,
    EmptyDeliverable,

    // Warnings
    SubjectiveWithReferences,
    MissingEvidenceSummary,
    MissingCounterHypothesis,
    UngroundedAssertion,
    NonFactualContainsAssertion,
}

impl IssueCode {
    /// The SCREAMING_SNAKE_CASE wire name of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::MissingAgentId => "MISSING_AGENT_ID",
            IssueCode::InvalidAgentIdFormat => "INVALID_AGENT_ID_FORMAT",
            IssueCode::MissingOutputId => "MISSING_OUTPUT_ID",
            IssueCode::InvalidOutputIdFormat => "INVALID_OUTPUT_ID_FORMAT",
            IssueCode::InvalidClaimIdFormat => "INVALID_CLAIM_ID_FORMAT",
            IssueCode::InvalidCalcIdFormat => "INVALID_CALC_ID_FORMAT",
            IssueCode::MissingTimestamp => "MISSING_TIMESTAMP",
            IssueCode::InvalidConfidence => "INVALID_CONFIDENCE",
            IssueCode::InvalidRecordShape => "INVALID_RECORD_SHAPE",
            IssueCode::FalsifiabilityMissingDescription => "FALSIFIABILITY_MISSING_DESCRIPTION",
            IssueCode::FalsifiabilityMissingRequiredEvidence => {
                "FALSIFIABILITY_MISSING_REQUIRED_EVIDENCE"
            }
            IssueCode::FalsifiabilityMissingPassFailRule => "FALSIFIABILITY_MISSING_PASS_FAIL_RULE",
            IssueCode::UncertaintyMissingStatement => "UNCERTAINTY_MISSING_STATEMENT",
            IssueCode::UncertaintyMissingImpact => "UNCERTAINTY_MISSING_IMPACT",
            IssueCode::UncertaintyMissingMitigation => "UNCERTAINTY_MISSING_MITIGATION",
            IssueCode::TenantMismatch => "TENANT_MISMATCH",
            IssueCode::DealMismatch => "DEAL_MISMATCH",
            IssueCode::GradeDefectMismatch => "GRADE_DEFECT_MISMATCH",
            IssueCode::EmptyTransmissionChain => "EMPTY_TRANSMISSION_CHAIN",
            IssueCode::DuplicateNodeId => "DUPLICATE_NODE_ID",
            IssueCode::ChainNotChronological => "CHAIN_NOT_CHRONOLOGICAL",
            IssueCode::ScoreOutOfRange => "SCORE_OUT_OF_RANGE",
            IssueCode::MissingPrimaryEvidence => "MISSING_PRIMARY_EVIDENCE",
            IssueCode::PrimaryInCorroboration => "PRIMARY_IN_CORROBORATION",
            IssueCode::EvidenceNotFound => "EVIDENCE_NOT_FOUND",
            IssueCode::DefectNotFound => "DEFECT_NOT_FOUND",
            IssueCode::InvalidSanadShape => "INVALID_SANAD_SHAPE",
            IssueCode::IllegalStatusTransition => "ILLEGAL_STATUS_TRANSITION",
            IssueCode::NoSupportingReferences => "NO_SUPPORTING_REFERENCES",
            IssueCode::HighConfidenceNoUncertainties => "HIGH_CONFIDENCE_NO_UNCERTAINTIES",
            IssueCode::RecommendationNoFalsifiability => "RECOMMENDATION_NO_FALSIFIABILITY",
            IssueCode::UnreferencedFact => "UNREFERENCED_FACT",
            IssueCode::UnknownClaimReference => "UNKNOWN_CLAIM_REFERENCE",
            IssueCode::UnknownCalcReference => "UNKNOWN_CALC_REFERENCE",
            IssueCode::UnknownEnrichmentReference => "UNKNOWN_ENRICHMENT_REFERENCE",
            IssueCode::EmptyReference => "EMPTY_REFERENCE",
            IssueCode::SectionMissingReferences => "SECTION_MISSING_REFERENCES",
            IssueCode::FactMissingReferences => "FACT_MISSING_REFERENCES",
            IssueCode::DissentMissingReferences => "DISSENT_MISSING_REFERENCES",
            IssueCode::EmptyDeliverable => "EMPTY_DELIVERABLE",
            IssueCode::SubjectiveWithReferences => "SUBJECTIVE_WITH_REFERENCES",
            IssueCode::MissingEvidenceSummary => "MISSING_EVIDENCE_SUMMARY",
            IssueCode::MissingCounterHypothesis => "MISSING_COUNTER_HYPOTHESIS",
            IssueCode::UngroundedAssertion => "UNGROUNDED_ASSERTION",
            IssueCode::NonFactualContainsAssertion => "NON_FACTUAL_CONTAINS_ASSERTION",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One error or warning raised by a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,

    /// Field path inside the checked artifact (e.g. `sections[2].narrative[15:22]`)
    pub path: String,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} at {}", self.code, self.message, self.path)
    }
}

/// Outcome of a fail-closed gate.
///
/// `passed` is true exactly when `errors` is empty. Warnings never block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// A clean pass.
    pub fn pass() -> Self {
        Self {
            passed: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn from_issues(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            passed: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn push_error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
        self.passed = false;
    }

    pub fn push_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Fold another result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.passed = self.errors.is_empty();
    }

    pub fn has_error(&self, code: IssueCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn has_warning(&self, code: IssueCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }

    pub fn error_codes(&self) -> Vec<IssueCode> {
        self.errors.iter().map(|e| e.code).collect()
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_has_no_errors() {
        let r = ValidationResult::pass();
        assert!(r.passed);
        assert!(r.errors.is_empty());
    }

    #[test]
    fn test_push_error_fails() {
        let mut r = ValidationResult::pass();
        r.push_warning(ValidationIssue::new(
            IssueCode::SubjectiveWithReferences,
            "warn",
            "$",
        ));
        assert!(r.passed, "Warnings never block");

        r.push_error(ValidationIssue::new(IssueCode::UnreferencedFact, "err", "$.text"));
        assert!(!r.passed);
        assert!(r.has_error(IssueCode::UnreferencedFact));
    }

    #[test]
    fn test_merge_recomputes_passed() {
        let mut a = ValidationResult::pass();
        let b = ValidationResult::from_issues(
            vec![ValidationIssue::new(IssueCode::TenantMismatch, "x", "defects[0]")],
            vec![],
        );
        a.merge(b);
        assert!(!a.passed);
        assert_eq!(a.error_codes(), vec![IssueCode::TenantMismatch]);
    }

    #[test]
    fn test_code_wire_name_matches_serde() {
        let json = serde_json::to_string(&IssueCode::HighConfidenceNoUncertainties).unwrap();
        assert_eq!(json, format!("\"{}\"", IssueCode::HighConfidenceNoUncertainties));
    }
}
