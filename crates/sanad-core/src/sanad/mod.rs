//! Sanad: the graded evidence chain behind a claim.
//!
//! A Sanad records which evidence supports a claim, how that evidence
//! travelled (the transmission chain), how strongly it is corroborated and
//! which defects were found. Validation fails closed: any shape or
//! consistency violation rejects the record.

mod grading;
mod hash;
mod model;
mod validate;

pub use grading::{GradeDecision, GradingTable, SanadGrader};
pub use hash::stable_hash;
pub use model::{
    ActorType, CureProtocol, Defect, DefectStatus, DefectType, EvidenceItem, GradeExplanation,
    NodeType, Sanad, TransitionError, TransmissionNode,
};
pub use validate::{grade_consistency, parse_sanad, validate, validation_result};

use thiserror::Error;

use crate::types::Grade;
use crate::validation::IssueCode;

/// Errors raised while validating or grading a Sanad.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SanadError {
    #[error("Transmission chain is empty")]
    EmptyChain,

    #[error("Duplicate transmission node id: {0}")]
    DuplicateNodeId(String),

    #[error("Transmission node {node_id} at index {index} precedes the node before it")]
    ChainOutOfOrder { node_id: String, index: usize },

    #[error("Transmission node {node_id} has {field} {value} outside [0, 1]")]
    ScoreOutOfRange {
        node_id: String,
        field: &'static str,
        value: f64,
    },

    #[error("Sanad has no primary evidence id")]
    MissingPrimaryEvidence,

    #[error("Primary evidence {0} is also listed as corroboration")]
    PrimaryListedAsCorroboration(String),

    #[error("Defect {defect_id} belongs to tenant {found}, expected {expected}")]
    TenantMismatch {
        defect_id: String,
        expected: String,
        found: String,
    },

    #[error("Defect {defect_id} belongs to deal {found}, expected {expected}")]
    DealMismatch {
        defect_id: String,
        expected: String,
        found: String,
    },

    #[error("Evidence {evidence_id} belongs to tenant {found}, expected {expected}")]
    EvidenceTenantMismatch {
        evidence_id: String,
        expected: String,
        found: String,
    },

    #[error("Evidence {0} referenced by the Sanad was not supplied")]
    EvidenceNotFound(String),

    #[error("Open FATAL defect {defect_id} requires grade D, found {grade}")]
    GradeDefectMismatch { defect_id: String, grade: Grade },

    #[error("Defect {0} not found")]
    DefectNotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Malformed Sanad record: {0}")]
    Malformed(String),
}

impl SanadError {
    /// Stable code for surfacing this error in a `ValidationResult`.
    pub fn code(&self) -> IssueCode {
        match self {
            SanadError::EmptyChain => IssueCode::EmptyTransmissionChain,
            SanadError::DuplicateNodeId(_) => IssueCode::DuplicateNodeId,
            SanadError::ChainOutOfOrder { .. } => IssueCode::ChainNotChronological,
            SanadError::ScoreOutOfRange { .. } => IssueCode::ScoreOutOfRange,
            SanadError::MissingPrimaryEvidence => IssueCode::MissingPrimaryEvidence,
            SanadError::PrimaryListedAsCorroboration(_) => IssueCode::PrimaryInCorroboration,
            SanadError::TenantMismatch { .. } | SanadError::EvidenceTenantMismatch { .. } => {
                IssueCode::TenantMismatch
            }
            SanadError::DealMismatch { .. } => IssueCode::DealMismatch,
            SanadError::EvidenceNotFound(_) => IssueCode::EvidenceNotFound,
            SanadError::DefectNotFound(_) => IssueCode::DefectNotFound,
            SanadError::GradeDefectMismatch { .. } => IssueCode::GradeDefectMismatch,
            SanadError::Transition(_) => IssueCode::IllegalStatusTransition,
            SanadError::Malformed(_) => IssueCode::InvalidSanadShape,
        }
    }
}
