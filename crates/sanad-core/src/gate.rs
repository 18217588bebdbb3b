//! Output gate: the checks every agent or debate output passes before it
//! is surfaced.

use serde_json::Value;

use crate::deliverable::{Deliverable, DeliverableValidator};
use crate::muhasabah::{MuhasabahRecord, MuhasabahValidator};
use crate::nff::NoFreeFactsValidator;
use crate::policy::TrustPolicy;
use crate::registry::RegistrySnapshot;
use crate::validation::{IssueCode, ValidationIssue, ValidationResult};

/// Composes the Muhasabah, No-Free-Facts and deliverable gates.
pub struct TrustGate {
    muhasabah: MuhasabahValidator,
    nff: NoFreeFactsValidator,
    deliverables: DeliverableValidator,
}

impl TrustGate {
    /// Build every gate from one policy version.
    pub fn new(policy: &TrustPolicy) -> Self {
        Self {
            muhasabah: MuhasabahValidator::new(policy.muhasabah.clone()),
            nff: NoFreeFactsValidator::new(),
            deliverables: DeliverableValidator::new(),
        }
    }

    /// Check one output and its self-accounting record.
    ///
    /// Muhasabah issue paths are prefixed with `muhasabah.`.
    ///
    /// # Arguments
    ///
    /// * `artifact` - The output as produced, in any JSON shape
    /// * `record` - The Muhasabah record attached to the output
    /// * `registry` - Optional snapshot every reference must resolve against
    pub fn check_output(
        &self,
        artifact: &Value,
        record: &MuhasabahRecord,
        registry: Option<&RegistrySnapshot>,
    ) -> ValidationResult {
        let mut result = self.nff.validate_with_registry(artifact, registry);
        result.merge(prefixed(
            self.muhasabah.validate_with_registry(record, registry),
            "muhasabah",
        ));
        result
    }

    /// Check an output whose Muhasabah record is embedded under `muhasabah`.
    pub fn check_output_json(
        &self,
        artifact: &Value,
        registry: Option<&RegistrySnapshot>,
    ) -> ValidationResult {
        let mut result = self.nff.validate_with_registry(artifact, registry);

        match artifact.get("muhasabah") {
            Some(raw) => result.merge(prefixed(self.muhasabah.validate_json(raw, registry), "muhasabah")),
            None => result.push_error(ValidationIssue::new(
                IssueCode::InvalidRecordShape,
                "Output carries no Muhasabah record",
                "muhasabah",
            )),
        }

        result
    }

    /// Check a multi-section deliverable, including its dissent section.
    pub fn check_deliverable(
        &self,
        deliverable: &Deliverable,
        registry: Option<&RegistrySnapshot>,
    ) -> ValidationResult {
        self.deliverables.validate_with_registry(deliverable, registry)
    }
}

impl Default for TrustGate {
    fn default() -> Self {
        Self::new(&TrustPolicy::default())
    }
}

fn prefixed(mut result: ValidationResult, prefix: &str) -> ValidationResult {
    for issue in result.errors.iter_mut().chain(result.warnings.iter_mut()) {
        issue.path = if issue.path == "$" {
            prefix.to_string()
        } else {
            format!("{}.{}", prefix, issue.path)
        };
    }
    result
}
