//! # sanad-core
//!
//! Deterministic evidence trust and claim resolution engine.
//!
//! This crate decides whether anything downstream may state a fact:
//! - Which extracted claims are the same claim?
//! - How strong and how independent is the evidence behind each one?
//! - Does an output cite only claims and calculations that exist?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **Fail-closed**: Every gate returns a `ValidationResult`; `passed == false` blocks publishing
//! 3. **Policy as data**: Grading and thresholds come from a versioned [`TrustPolicy`]
//! 4. **Tenant-scoped**: Defects and evidence from another tenant are rejected
//!
//! ## Example
//!
//! ```rust,ignore
//! use sanad_core::{TrustEngine, TrustPolicy};
//!
//! let engine = TrustEngine::new(TrustPolicy::from_yaml_file("policy.yaml")?);
//! let claims = engine.deduplicator().deduplicate("deal-42", &drafts);
//! let (tawatur, graded) = engine.grade(&sanad, &evidence, "sanad-v2")?;
//!
//! let result = engine.gate().check_output(&report, &record, Some(&registry));
//! if !result.passed {
//!     for issue in &result.errors {
//!         eprintln!("{}", issue);
//!     }
//! }
//! ```

pub mod dedup;
pub mod deliverable;
pub mod gate;
pub mod ids;
pub mod muhasabah;
pub mod nff;
pub mod policy;
pub mod registry;
pub mod sanad;
pub mod tawatur;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use dedup::{
    ClaimDraft, DedupConfig, DeduplicatedClaim, DeduplicationResult, Deduplicator, NearMatch,
    DEFAULT_DEDUP_NAMESPACE,
};
pub use deliverable::{
    Deliverable, DeliverableFact, DeliverableSection, DeliverableType, DeliverableValidator,
    DissentSection, SectionType,
};
pub use gate::TrustGate;
pub use muhasabah::{
    AcceptedRecord, FalsifiabilityTest, Impact, MuhasabahRecord, MuhasabahThresholds,
    MuhasabahValidator, Uncertainty,
};
pub use nff::{FactualAssertion, NoFreeFactsValidator};
pub use policy::{PolicyError, TrustPolicy};
pub use registry::RegistrySnapshot;
pub use sanad::{
    Defect, DefectStatus, EvidenceItem, GradingTable, Sanad, SanadError, SanadGrader,
    TransitionError, TransmissionNode,
};
pub use tawatur::{TawaturAssessor, TawaturConfig, TawaturResult};
pub use types::{
    Claim, ClaimAction, ClaimClass, ClaimError, ClaimValue, ClaimVerdict, CorroborationStatus,
    Grade, Severity, VerificationStatus,
};
pub use validation::{IssueCode, ValidationIssue, ValidationResult};

use thiserror::Error;

/// Errors surfaced by the engine as a whole.
#[derive(Error, Debug)]
pub enum TrustError {
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Sanad error: {0}")]
    Sanad(#[from] SanadError),

    #[error("Claim error: {0}")]
    Claim(#[from] ClaimError),

    #[error("Defect error: {0}")]
    Defect(#[from] TransitionError),
}

/// One policy version wired into every component.
pub struct TrustEngine {
    policy: TrustPolicy,
    deduplicator: Deduplicator,
    tawatur: TawaturAssessor,
    grader: SanadGrader,
    gate: TrustGate,
}

impl TrustEngine {
    /// Wire `policy` into every component, with the default dedup namespace.
    pub fn new(policy: TrustPolicy) -> Self {
        Self::with_dedup_config(policy, DedupConfig::default())
    }

    /// Wire `policy` into every component, with an explicit dedup namespace.
    pub fn with_dedup_config(policy: TrustPolicy, dedup: DedupConfig) -> Self {
        Self {
            deduplicator: Deduplicator::new(dedup),
            tawatur: TawaturAssessor::new(policy.tawatur.clone()),
            grader: SanadGrader::new(policy.grading.clone()),
            gate: TrustGate::new(&policy),
            policy,
        }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    pub fn deduplicator(&self) -> &Deduplicator {
        &self.deduplicator
    }

    pub fn tawatur(&self) -> &TawaturAssessor {
        &self.tawatur
    }

    pub fn grader(&self) -> &SanadGrader {
        &self.grader
    }

    pub fn gate(&self) -> &TrustGate {
        &self.gate
    }

    /// Assess the Sanad's evidence and produce its superseding, regraded version.
    ///
    /// Only evidence the Sanad references is assessed.
    ///
    /// # Arguments
    ///
    /// * `sanad` - The current version of the Sanad
    /// * `evidence` - Candidate evidence items; unreferenced ones are ignored
    /// * `new_sanad_id` - Id of the superseding version
    ///
    /// # Returns
    ///
    /// The Tawatur assessment and the new Sanad version, or the first
    /// grading or validation failure.
    pub fn grade(
        &self,
        sanad: &Sanad,
        evidence: &[EvidenceItem],
        new_sanad_id: impl Into<String>,
    ) -> Result<(TawaturResult, Sanad), TrustError> {
        let referenced: Vec<EvidenceItem> = evidence
            .iter()
            .filter(|e| sanad.evidence_ids().any(|id| id == e.evidence_id))
            .cloned()
            .collect();

        let assessment = self.tawatur.assess(&referenced);
        let next = self
            .grader
            .regrade(sanad, &referenced, &assessment, new_sanad_id)?;

        tracing::debug!(
            sanad_id = %next.sanad_id,
            version = next.version,
            status = %assessment.status,
            grade = %next.sanad_grade,
            "Sanad regraded"
        );

        Ok((assessment, next))
    }
}

impl Default for TrustEngine {
    fn default() -> Self {
        Self::new(TrustPolicy::default())
    }
}
