//! Deliverable documents and their reference gate.
//!
//! Deliverables (screening snapshots, IC memos) are typed, so the gate
//! works on structure rather than on raw JSON: facts carry their own
//! references, and a section's narrative is grounded by the references of
//! the facts it contains.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::nff::{contains_factual_assertion, NoFreeFactsValidator};
use crate::registry::RegistrySnapshot;
use crate::types::Grade;
use crate::validation::{IssueCode, ValidationIssue, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliverableType {
    ScreeningSnapshot,
    IcMemo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionType {
    Summary,
    Financial,
    Market,
    Traction,
    KeyMetrics,
    Team,
    Product,
    Competition,
    Risks,
    Recommendation,
    Other,
}

impl SectionType {
    /// Whether the section must carry references regardless of narrative.
    pub fn requires_references(&self) -> bool {
        matches!(
            self,
            SectionType::Financial | SectionType::Market | SectionType::Traction | SectionType::KeyMetrics
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverableFact {
    pub text: String,

    #[serde(default)]
    pub claim_refs: Vec<String>,

    #[serde(default)]
    pub calc_refs: Vec<String>,

    #[serde(default = "default_true")]
    pub is_factual: bool,

    /// Never waives the reference rule for factual facts
    #[serde(default)]
    pub is_subjective: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanad_grade: Option<Grade>,
}

fn default_true() -> bool {
    true
}

impl DeliverableFact {
    pub fn has_references(&self) -> bool {
        !self.claim_refs.is_empty() || !self.calc_refs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverableSection {
    pub section_id: String,
    pub section_type: SectionType,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub narrative: String,

    #[serde(default)]
    pub facts: Vec<DeliverableFact>,

    #[serde(default)]
    pub is_subjective: bool,
}

impl DeliverableSection {
    /// Union of the references of every fact in the section.
    pub fn aggregated_refs(&self) -> BTreeSet<&str> {
        self.facts
            .iter()
            .flat_map(|f| f.claim_refs.iter().chain(f.calc_refs.iter()))
            .map(String::as_str)
            .filter(|r| !r.trim().is_empty())
            .collect()
    }
}

/// Minority view recorded alongside the recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DissentSection {
    pub narrative: String,

    #[serde(default)]
    pub claim_refs: Vec<String>,

    #[serde(default)]
    pub calc_refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deliverable {
    pub deliverable_id: String,
    pub deliverable_type: DeliverableType,
    pub tenant_id: String,
    pub deal_id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub sections: Vec<DeliverableSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dissent: Option<DissentSection>,
}

#[derive(Debug, Clone, Default)]
pub struct DeliverableValidator {
    nff: NoFreeFactsValidator,
}

impl DeliverableValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a deliverable without registry checks.
    pub fn validate(&self, deliverable: &Deliverable) -> ValidationResult {
        self.validate_with_registry(deliverable, None)
    }

    pub fn validate_with_registry(
        &self,
        deliverable: &Deliverable,
        registry: Option<&RegistrySnapshot>,
    ) -> ValidationResult {
        let mut result = ValidationResult::pass();

        if deliverable.sections.is_empty() {
            result.push_error(ValidationIssue::new(
                IssueCode::EmptyDeliverable,
                format!("Deliverable {} has no sections", deliverable.deliverable_id),
                "sections",
            ));
        }

        for (i, section) in deliverable.sections.iter().enumerate() {
            self.check_section(section, &format!("sections[{}]", i), registry, &mut result);
        }

        if let Some(dissent) = &deliverable.dissent {
            self.check_dissent(dissent, registry, &mut result);
        }

        if !result.passed {
            tracing::warn!(
                deliverable_id = %deliverable.deliverable_id,
                deal_id = %deliverable.deal_id,
                codes = ?result.error_codes(),
                "Deliverable rejected"
            );
        }

        result
    }

    fn check_section(
        &self,
        section: &DeliverableSection,
        path: &str,
        registry: Option<&RegistrySnapshot>,
        result: &mut ValidationResult,
    ) {
        for (j, fact) in section.facts.iter().enumerate() {
            let fact_path = format!("{}.facts[{}]", path, j);

            if fact.is_factual && !fact.has_references() {
                result.push_error(ValidationIssue::new(
                    IssueCode::FactMissingReferences,
                    "Factual statement carries no claim or calc reference",
                    fact_path.clone(),
                ));
            } else if !fact.is_factual && contains_factual_assertion(&fact.text) {
                result.push_warning(ValidationIssue::new(
                    IssueCode::NonFactualContainsAssertion,
                    "Fact marked non-factual contains a factual assertion",
                    format!("{}.text", fact_path),
                ));
            }

            check_refs(&fact.claim_refs, &fact.calc_refs, &fact_path, registry, result);
        }

        let grounding = section.aggregated_refs();

        if section.section_type.requires_references() && grounding.is_empty() {
            result.push_error(ValidationIssue::new(
                IssueCode::SectionMissingReferences,
                format!("{:?} section carries no references", section.section_type),
                path.to_string(),
            ));
        }

        if !section.is_subjective {
            result.merge(self.nff.check_text(
                &section.narrative,
                &format!("{}.narrative", path),
                !grounding.is_empty(),
            ));
        }
    }

    fn check_dissent(
        &self,
        dissent: &DissentSection,
        registry: Option<&RegistrySnapshot>,
        result: &mut ValidationResult,
    ) {
        let has_refs = dissent
            .claim_refs
            .iter()
            .chain(dissent.calc_refs.iter())
            .any(|r| !r.trim().is_empty());

        if !has_refs {
            result.push_error(ValidationIssue::new(
                IssueCode::DissentMissingReferences,
                "Dissent section carries no claim or calc reference",
                "dissent",
            ));
        }

        check_refs(&dissent.claim_refs, &dissent.calc_refs, "dissent", registry, result);
        result.merge(self.nff.check_text(&dissent.narrative, "dissent.narrative", has_refs));
    }
}

fn check_refs(
    claim_refs: &[String],
    calc_refs: &[String],
    path: &str,
    registry: Option<&RegistrySnapshot>,
    result: &mut ValidationResult,
) {
    for (field, refs, unknown_code) in [
        ("claim_refs", claim_refs, IssueCode::UnknownClaimReference),
        ("calc_refs", calc_refs, IssueCode::UnknownCalcReference),
    ] {
        for (i, id) in refs.iter().enumerate() {
            let ref_path = format!("{}.{}[{}]", path, field, i);
            if id.trim().is_empty() {
                result.push_error(ValidationIssue::new(IssueCode::EmptyReference, "Reference is empty", ref_path));
                continue;
            }
            let known = match registry {
                None => true,
                Some(r) if field == "claim_refs" => r.contains_claim(id),
                Some(r) => r.contains_calc(id),
            };
            if !known {
                result.push_error(ValidationIssue::new(
                    unknown_code,
                    format!("Reference {} is not in the registry", id),
                    ref_path,
                ));
            }
        }
    }
}
