//! Muhasabah: the self-accounting record attached to every agent output.
//!
//! The validator is a fail-closed gate. Each rule violation carries its own
//! [`IssueCode`] and field path; nothing is defaulted silently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids;
use crate::registry::RegistrySnapshot;
use crate::validation::{IssueCode, ValidationIssue, ValidationResult};

/// Disclosed impact of an uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "HIGH" => Some(Impact::High),
            "MEDIUM" => Some(Impact::Medium),
            "LOW" => Some(Impact::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FalsifiabilityTest {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub required_evidence: String,

    #[serde(default)]
    pub pass_fail_rule: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Uncertainty {
    #[serde(default)]
    pub statement: String,

    #[serde(default)]
    pub impact: Option<Impact>,

    #[serde(default)]
    pub mitigation: String,
}

/// Self-accounting record for one produced output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MuhasabahRecord {
    #[serde(default)]
    pub agent_id: String,

    #[serde(default)]
    pub output_id: String,

    #[serde(default)]
    pub supported_claim_ids: Vec<String>,

    #[serde(default)]
    pub supported_calc_ids: Vec<String>,

    #[serde(default)]
    pub evidence_summary: String,

    #[serde(default)]
    pub counter_hypothesis: String,

    #[serde(default)]
    pub falsifiability_tests: Vec<FalsifiabilityTest>,

    #[serde(default)]
    pub uncertainties: Vec<Uncertainty>,

    #[serde(default)]
    pub failure_modes: Vec<String>,

    /// Required; `None` is rejected rather than defaulted
    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub is_subjective: bool,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Explicit recommendation or decision carried by the output
    #[serde(default, alias = "decision", skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl MuhasabahRecord {
    pub fn has_references(&self) -> bool {
        !self.supported_claim_ids.is_empty() || !self.supported_calc_ids.is_empty()
    }

    fn has_recommendation(&self) -> bool {
        self.recommendation
            .as_deref()
            .map(|r| !r.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Confidence thresholds for the disclosure rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuhasabahThresholds {
    /// Above this, at least one uncertainty must be disclosed
    pub high_confidence: f64,

    /// Above this, a recommendation needs falsifiability tests
    pub materiality: f64,
}

impl Default for MuhasabahThresholds {
    fn default() -> Self {
        Self {
            high_confidence: 0.80,
            materiality: 0.50,
        }
    }
}

/// A record that passed the gate. Read-only from here on.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedRecord {
    record: MuhasabahRecord,
    warnings: Vec<ValidationIssue>,
}

impl AcceptedRecord {
    pub fn record(&self) -> &MuhasabahRecord {
        &self.record
    }

    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    pub fn into_inner(self) -> MuhasabahRecord {
        self.record
    }
}

pub struct MuhasabahValidator {
    thresholds: MuhasabahThresholds,
}

impl MuhasabahValidator {
    pub fn new(thresholds: MuhasabahThresholds) -> Self {
        Self { thresholds }
    }

    /// Confidence thresholds that trigger the disclosure rules.
    pub fn thresholds(&self) -> &MuhasabahThresholds {
        &self.thresholds
    }

    /// Validate a record without registry checks.
    pub fn validate(&self, record: &MuhasabahRecord) -> ValidationResult {
        self.validate_with_registry(record, None)
    }

    /// Validate a record, also checking references against a registry snapshot.
    pub fn validate_with_registry(
        &self,
        record: &MuhasabahRecord,
        registry: Option<&RegistrySnapshot>,
    ) -> ValidationResult {
        let mut result = ValidationResult::pass();

        check_identity(record, &mut result);
        check_references(record, registry, &mut result);
        self.check_disclosure(record, &mut result);
        check_falsifiability(&record.falsifiability_tests, &mut result);
        check_uncertainties(&record.uncertainties, &mut result);
        check_warnings(record, &mut result);

        if !result.passed {
            tracing::warn!(
                agent_id = %record.agent_id,
                output_id = %record.output_id,
                codes = ?result.error_codes(),
                "Muhasabah record rejected"
            );
        }

        result
    }

    /// Validate a raw JSON record.
    ///
    /// Invalid impact values are reported per uncertainty; any other shape
    /// problem rejects the whole record as `INVALID_RECORD_SHAPE`.
    pub fn validate_json(
        &self,
        raw: &serde_json::Value,
        registry: Option<&RegistrySnapshot>,
    ) -> ValidationResult {
        let mut value = raw.clone();
        let mut impact_errors = Vec::new();

        if let Some(items) = value
            .get_mut("uncertainties")
            .and_then(serde_json::Value::as_array_mut)
        {
            for (i, item) in items.iter_mut().enumerate() {
                let Some(impact) = item.get_mut("impact") else {
                    continue;
                };
                let valid = match &*impact {
                    serde_json::Value::Null => true,
                    serde_json::Value::String(s) => Impact::parse(s).is_some(),
                    _ => false,
                };
                if !valid {
                    impact_errors.push(ValidationIssue::new(
                        IssueCode::UncertaintyMissingImpact,
                        format!("Impact must be HIGH, MEDIUM or LOW, got {}", impact),
                        format!("uncertainties[{}].impact", i),
                    ));
                    *impact = serde_json::Value::Null;
                }
            }
        }

        let record: MuhasabahRecord = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "Muhasabah record has invalid shape");
                return ValidationResult::from_issues(
                    vec![ValidationIssue::new(
                        IssueCode::InvalidRecordShape,
                        e.to_string(),
                        "$",
                    )],
                    Vec::new(),
                );
            }
        };

        let mut result = self.validate_with_registry(&record, registry);
        // the nulled impact would otherwise be reported twice
        result.errors.retain(|e| {
            e.code != IssueCode::UncertaintyMissingImpact
                || !impact_errors.iter().any(|i| i.path == e.path)
        });
        for issue in impact_errors {
            result.push_error(issue);
        }
        result.passed = result.errors.is_empty();
        result
    }

    /// Validate and seal a record.
    pub fn accept(&self, record: MuhasabahRecord) -> Result<AcceptedRecord, ValidationResult> {
        let result = self.validate(&record);
        if result.passed {
            Ok(AcceptedRecord {
                record,
                warnings: result.warnings,
            })
        } else {
            Err(result)
        }
    }

    fn check_disclosure(&self, record: &MuhasabahRecord, result: &mut ValidationResult) {
        let Some(confidence) = record.confidence else {
            return;
        };
        if !(0.0..=1.0).contains(&confidence) {
            return;
        }

        if confidence > self.thresholds.high_confidence && record.uncertainties.is_empty() {
            result.push_error(ValidationIssue::new(
                IssueCode::HighConfidenceNoUncertainties,
                format!(
                    "Confidence {:.2} above {:.2} requires at least one disclosed uncertainty",
                    confidence, self.thresholds.high_confidence
                ),
                "uncertainties",
            ));
        }

        if confidence > self.thresholds.materiality
            && record.has_recommendation()
            && record.falsifiability_tests.is_empty()
        {
            result.push_error(ValidationIssue::new(
                IssueCode::RecommendationNoFalsifiability,
                format!(
                    "Recommendation at confidence {:.2} requires falsifiability tests",
                    confidence
                ),
                "falsifiability_tests",
            ));
        }
    }
}

impl Default for MuhasabahValidator {
    fn default() -> Self {
        Self::new(MuhasabahThresholds::default())
    }
}

fn check_identity(record: &MuhasabahRecord, result: &mut ValidationResult) {
    for (field, value, missing, invalid) in [
        (
            "agent_id",
            &record.agent_id,
            IssueCode::MissingAgentId,
            IssueCode::InvalidAgentIdFormat,
        ),
        (
            "output_id",
            &record.output_id,
            IssueCode::MissingOutputId,
            IssueCode::InvalidOutputIdFormat,
        ),
    ] {
        if value.trim().is_empty() {
            result.push_error(ValidationIssue::new(missing, format!("{} is required", field), field));
        } else if !ids::is_well_formed(value) {
            result.push_error(ValidationIssue::new(
                invalid,
                format!("{} '{}' is not a well-formed identifier", field, value),
                field,
            ));
        }
    }

    match record.confidence {
        None => result.push_error(ValidationIssue::new(
            IssueCode::InvalidConfidence,
            "confidence is required",
            "confidence",
        )),
        Some(c) if !(0.0..=1.0).contains(&c) => result.push_error(ValidationIssue::new(
            IssueCode::InvalidConfidence,
            format!("confidence {} is outside [0, 1]", c),
            "confidence",
        )),
        Some(_) => {}
    }

    if record.timestamp.is_none() {
        result.push_error(ValidationIssue::new(
            IssueCode::MissingTimestamp,
            "timestamp is required",
            "timestamp",
        ));
    }
}

fn check_references(
    record: &MuhasabahRecord,
    registry: Option<&RegistrySnapshot>,
    result: &mut ValidationResult,
) {
    if !record.is_subjective && !record.has_references() {
        result.push_error(ValidationIssue::new(
            IssueCode::NoSupportingReferences,
            "Non-subjective output must cite at least one claim or calc",
            "supported_claim_ids",
        ));
    }

    for (i, id) in record.supported_claim_ids.iter().enumerate() {
        let path = format!("supported_claim_ids[{}]", i);
        if !ids::is_well_formed(id) {
            result.push_error(ValidationIssue::new(
                IssueCode::InvalidClaimIdFormat,
                format!("Claim id '{}' is not a well-formed identifier", id),
                path,
            ));
        } else if registry.is_some_and(|r| !r.contains_claim(id)) {
            result.push_error(ValidationIssue::new(
                IssueCode::UnknownClaimReference,
                format!("Claim {} is not in the registry", id),
                path,
            ));
        }
    }

    for (i, id) in record.supported_calc_ids.iter().enumerate() {
        let path = format!("supported_calc_ids[{}]", i);
        if !ids::is_well_formed(id) {
            result.push_error(ValidationIssue::new(
                IssueCode::InvalidCalcIdFormat,
                format!("Calc id '{}' is not a well-formed identifier", id),
                path,
            ));
        } else if registry.is_some_and(|r| !r.contains_calc(id)) {
            result.push_error(ValidationIssue::new(
                IssueCode::UnknownCalcReference,
                format!("Calc {} is not in the registry", id),
                path,
            ));
        }
    }
}

fn check_falsifiability(tests: &[FalsifiabilityTest], result: &mut ValidationResult) {
    for (i, test) in tests.iter().enumerate() {
        for (field, value, code) in [
            ("description", &test.description, IssueCode::FalsifiabilityMissingDescription),
            (
                "required_evidence",
                &test.required_evidence,
                IssueCode::FalsifiabilityMissingRequiredEvidence,
            ),
            ("pass_fail_rule", &test.pass_fail_rule, IssueCode::FalsifiabilityMissingPassFailRule),
        ] {
            if value.trim().is_empty() {
                result.push_error(ValidationIssue::new(
                    code,
                    format!("Falsifiability test is missing {}", field),
                    format!("falsifiability_tests[{}].{}", i, field),
                ));
            }
        }
    }
}

fn check_uncertainties(uncertainties: &[Uncertainty], result: &mut ValidationResult) {
    for (i, u) in uncertainties.iter().enumerate() {
        if u.statement.trim().is_empty() {
            result.push_error(ValidationIssue::new(
                IssueCode::UncertaintyMissingStatement,
                "Uncertainty is missing statement",
                format!("uncertainties[{}].statement", i),
            ));
        }
        if u.impact.is_none() {
            result.push_error(ValidationIssue::new(
                IssueCode::UncertaintyMissingImpact,
                "Uncertainty is missing impact",
                format!("uncertainties[{}].impact", i),
            ));
        }
        if u.mitigation.trim().is_empty() {
            result.push_error(ValidationIssue::new(
                IssueCode::UncertaintyMissingMitigation,
                "Uncertainty is missing mitigation",
                format!("uncertainties[{}].mitigation", i),
            ));
        }
    }
}

fn check_warnings(record: &MuhasabahRecord, result: &mut ValidationResult) {
    if record.is_subjective && record.has_references() {
        result.push_warning(ValidationIssue::new(
            IssueCode::SubjectiveWithReferences,
            "Output is marked subjective but cites claims or calcs",
            "is_subjective",
        ));
    }

    if !record.is_subjective && record.evidence_summary.trim().is_empty() {
        result.push_warning(ValidationIssue::new(
            IssueCode::MissingEvidenceSummary,
            "Factual output has no evidence summary",
            "evidence_summary",
        ));
    }

    if record.has_recommendation() && record.counter_hypothesis.trim().is_empty() {
        result.push_warning(ValidationIssue::new(
            IssueCode::MissingCounterHypothesis,
            "Recommendation given without a counter-hypothesis",
            "counter_hypothesis",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const AGENT: &str = "0b6b8f4e-3d52-4c8e-9a57-2f1d6c9e0a11";
    const OUTPUT: &str = "7c1e2d3f-4a5b-4c6d-8e9f-0a1b2c3d4e5f";
    const CLAIM: &str = "3f2a9c1d-5e6b-4a7c-8d9e-1f2a3b4c5d6e";
    const CALC: &str = "9e8d7c6b-5a4f-4e3d-9c2b-1a0f9e8d7c6b";

    fn record() -> MuhasabahRecord {
        MuhasabahRecord {
            agent_id: AGENT.to_string(),
            output_id: OUTPUT.to_string(),
            supported_claim_ids: vec![CLAIM.to_string()],
            evidence_summary: "Bank statements reconcile with reported ARR".to_string(),
            confidence: Some(0.6),
            timestamp: Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
            ..MuhasabahRecord::default()
        }
    }

    fn uncertainty() -> Uncertainty {
        Uncertainty {
            statement: "Q4 churn not yet reported".to_string(),
            impact: Some(Impact::Medium),
            mitigation: "Request churn cohort export".to_string(),
        }
    }

    #[test]
    fn test_valid_record_passes() {
        let result = MuhasabahValidator::default().validate(&record());
        assert!(result.passed, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_non_subjective_without_references_rejected() {
        let mut r = record();
        r.supported_claim_ids.clear();
        let result = MuhasabahValidator::default().validate(&r);
        assert!(result.has_error(IssueCode::NoSupportingReferences));
    }

    #[test]
    fn test_subjective_without_references_passes() {
        let mut r = record();
        r.supported_claim_ids.clear();
        r.is_subjective = true;
        assert!(MuhasabahValidator::default().validate(&r).passed);
    }

    #[test]
    fn test_subjective_with_references_warns() {
        let mut r = record();
        r.is_subjective = true;
        let result = MuhasabahValidator::default().validate(&r);
        assert!(result.passed);
        assert!(result.has_warning(IssueCode::SubjectiveWithReferences));
    }

    #[test]
    fn test_high_confidence_requires_uncertainty() {
        let mut r = record();
        r.confidence = Some(0.95);
        let result = MuhasabahValidator::default().validate(&r);
        assert_eq!(result.error_codes(), vec![IssueCode::HighConfidenceNoUncertainties]);

        r.uncertainties.push(uncertainty());
        assert!(MuhasabahValidator::default().validate(&r).passed);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut r = record();
        r.confidence = Some(0.80);
        assert!(MuhasabahValidator::default().validate(&r).passed);
    }

    #[test]
    fn test_recommendation_requires_falsifiability() {
        let mut r = record();
        r.recommendation = Some("Proceed to IC".to_string());
        r.counter_hypothesis = "Growth is pulled forward by discounting".to_string();
        let result = MuhasabahValidator::default().validate(&r);
        assert!(result.has_error(IssueCode::RecommendationNoFalsifiability));

        r.falsifiability_tests.push(FalsifiabilityTest {
            description: "Cohort retention holds".to_string(),
            required_evidence: "Monthly cohort table".to_string(),
            pass_fail_rule: "Fails if M6 retention < 70%".to_string(),
        });
        assert!(MuhasabahValidator::default().validate(&r).passed);
    }

    #[test]
    fn test_recommendation_below_materiality_allowed() {
        let mut r = record();
        r.confidence = Some(0.4);
        r.recommendation = Some("Monitor".to_string());
        let result = MuhasabahValidator::default().validate(&r);
        assert!(result.passed);
        assert!(result.has_warning(IssueCode::MissingCounterHypothesis));
    }

    #[test]
    fn test_incomplete_falsifiability_test_rejected_per_field() {
        let mut r = record();
        r.falsifiability_tests.push(FalsifiabilityTest {
            description: "Retention".to_string(),
            ..FalsifiabilityTest::default()
        });
        let result = MuhasabahValidator::default().validate(&r);
        assert!(result.has_error(IssueCode::FalsifiabilityMissingRequiredEvidence));
        assert!(result.has_error(IssueCode::FalsifiabilityMissingPassFailRule));
        assert!(!result.has_error(IssueCode::FalsifiabilityMissingDescription));
        assert!(result
            .errors
            .iter()
            .any(|e| e.path == "falsifiability_tests[0].pass_fail_rule"));
    }

    #[test]
    fn test_incomplete_uncertainty_rejected() {
        let mut r = record();
        r.uncertainties.push(Uncertainty {
            statement: "Churn".to_string(),
            ..Uncertainty::default()
        });
        let result = MuhasabahValidator::default().validate(&r);
        assert!(result.has_error(IssueCode::UncertaintyMissingImpact));
        assert!(result.has_error(IssueCode::UncertaintyMissingMitigation));
    }

    #[test]
    fn test_identity_shape_codes() {
        let mut r = record();
        r.agent_id = String::new();
        r.output_id = "output-7".to_string();
        r.supported_claim_ids = vec!["claim-1".to_string()];
        r.supported_calc_ids = vec!["calc-1".to_string()];
        r.timestamp = None;
        r.confidence = Some(1.2);

        let codes = MuhasabahValidator::default().validate(&r).error_codes();
        for code in [
            IssueCode::MissingAgentId,
            IssueCode::InvalidOutputIdFormat,
            IssueCode::InvalidClaimIdFormat,
            IssueCode::InvalidCalcIdFormat,
            IssueCode::MissingTimestamp,
            IssueCode::InvalidConfidence,
        ] {
            assert!(codes.contains(&code), "missing {}", code);
        }
    }

    #[test]
    fn test_registry_references_checked() {
        let mut r = record();
        r.supported_calc_ids = vec![CALC.to_string()];
        let registry = RegistrySnapshot::new().with_claims([CLAIM]);
        let result = MuhasabahValidator::default().validate_with_registry(&r, Some(&registry));
        assert_eq!(result.error_codes(), vec![IssueCode::UnknownCalcReference]);
    }

    #[test]
    fn test_validate_json_reports_invalid_impact() {
        let mut value = serde_json::to_value(record()).unwrap();
        value["uncertainties"] = serde_json::json!([
            { "statement": "Churn", "impact": "SEVERE", "mitigation": "Ask" }
        ]);
        let result = MuhasabahValidator::default().validate_json(&value, None);
        let impact_errors: Vec<_> = result
            .errors
            .iter()
            .filter(|e| e.code == IssueCode::UncertaintyMissingImpact)
            .collect();
        assert_eq!(impact_errors.len(), 1);
        assert!(impact_errors[0].message.contains("SEVERE"));
        assert!(!result.passed);
    }

    #[test]
    fn test_validate_json_rejects_bad_shape() {
        let value = serde_json::json!({ "agent_id": AGENT, "confidence": "high" });
        let result = MuhasabahValidator::default().validate_json(&value, None);
        assert_eq!(result.error_codes(), vec![IssueCode::InvalidRecordShape]);
    }

    #[test]
    fn test_accept_seals_valid_record() {
        let accepted = MuhasabahValidator::default().accept(record()).unwrap();
        assert_eq!(accepted.record().agent_id, AGENT);

        let mut bad = record();
        bad.confidence = None;
        let rejected = MuhasabahValidator::default().accept(bad).unwrap_err();
        assert!(rejected.has_error(IssueCode::InvalidConfidence));
    }
}
