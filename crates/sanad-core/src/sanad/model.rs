//! Evidence-chain records: evidence items, transmission nodes, defects and the Sanad itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use super::SanadError;
use crate::types::{CorroborationStatus, Grade, Severity, VerificationStatus};

/// Kind of step in a provenance chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Ingest,
    Extract,
    Normalize,
    Reconcile,
    Calculate,
    Infer,
    HumanVerify,
    Export,
}

/// Who performed a transmission step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorType {
    Agent,
    Human,
    System,
}

/// One step in a provenance chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmissionNode {
    pub node_id: String,
    pub node_type: NodeType,
    pub actor_type: ActorType,
    pub actor_id: String,

    #[serde(default)]
    pub input_refs: Vec<String>,

    #[serde(default)]
    pub output_refs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Historical precision of the actor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhabt_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
}

impl TransmissionNode {
    pub fn new(
        node_id: impl Into<String>,
        node_type: NodeType,
        actor_type: ActorType,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            node_type,
            actor_type,
            actor_id: actor_id.into(),
            input_refs: Vec::new(),
            output_refs: Vec::new(),
            timestamp: None,
            confidence: None,
            dhabt_score: None,
            verification_method: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Refused status change on an append-only record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Illegal {entity} status transition for {id}: {from} -> {to}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub id: String,
    pub from: String,
    pub to: String,
}

/// A single piece of evidence backing a claim.
///
/// Only `verification_status` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub evidence_id: String,
    pub tenant_id: String,
    pub deal_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_origin_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,

    /// Raw timestamp as delivered by extraction; may be absent or unparseable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_timestamp: Option<String>,

    pub source_grade: Grade,

    #[serde(default)]
    pub verification_status: VerificationStatus,

    /// Node ids of the transmission chain this evidence travelled through
    #[serde(default)]
    pub transmission_chain: Vec<String>,
}

impl EvidenceItem {
    pub fn new(
        evidence_id: impl Into<String>,
        tenant_id: impl Into<String>,
        deal_id: impl Into<String>,
        source_grade: Grade,
    ) -> Self {
        Self {
            evidence_id: evidence_id.into(),
            tenant_id: tenant_id.into(),
            deal_id: deal_id.into(),
            source_system: None,
            upstream_origin_id: None,
            artifact_id: None,
            retrieval_timestamp: None,
            source_grade,
            verification_status: VerificationStatus::Unverified,
            transmission_chain: Vec::new(),
        }
    }

    /// Move to a new verification status.
    ///
    /// UNVERIFIED may become VERIFIED or CONTRADICTED; VERIFIED may become
    /// CONTRADICTED; CONTRADICTED is terminal.
    pub fn transition(&mut self, to: VerificationStatus) -> Result<(), TransitionError> {
        use VerificationStatus::*;
        let allowed = matches!(
            (self.verification_status, to),
            (Unverified, Verified) | (Unverified, Contradicted) | (Verified, Contradicted)
        );
        if !allowed {
            return Err(TransitionError {
                entity: "evidence",
                id: self.evidence_id.clone(),
                from: format!("{:?}", self.verification_status),
                to: format!("{:?}", to),
            });
        }
        self.verification_status = to;
        Ok(())
    }
}

/// Category of weakness found in an evidence chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefectType {
    BrokenChain,
    MissingLink,
    UnknownSource,
    Concealment,
    Inconsistency,
    AnomalyVsStrongerSources,
    ChronoImpossible,
    ChainGrafting,
    Circularity,
    Staleness,
    UnitMismatch,
    TimeWindowMismatch,
    ScopeDrift,
    Implausibility,
}

/// How a defect is expected to be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CureProtocol {
    RequestSource,
    RequireReaudit,
    HumanArbitration,
    ReconstructChain,
    DiscardClaim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefectStatus {
    #[default]
    Open,
    Cured,
    Waived,
}

impl fmt::Display for DefectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DefectStatus::Open => "OPEN",
            DefectStatus::Cured => "CURED",
            DefectStatus::Waived => "WAIVED",
        };
        f.write_str(s)
    }
}

/// A recorded weakness in an evidence chain. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defect {
    pub defect_id: String,
    pub tenant_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,

    pub defect_type: DefectType,
    pub severity: Severity,
    pub cure_protocol: CureProtocol,

    #[serde(default)]
    pub status: DefectStatus,

    #[serde(default)]
    pub description: String,
}

impl Defect {
    pub fn new(
        defect_id: impl Into<String>,
        tenant_id: impl Into<String>,
        defect_type: DefectType,
        severity: Severity,
        cure_protocol: CureProtocol,
    ) -> Self {
        Self {
            defect_id: defect_id.into(),
            tenant_id: tenant_id.into(),
            deal_id: None,
            defect_type,
            severity,
            cure_protocol,
            status: DefectStatus::Open,
            description: String::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == DefectStatus::Open
    }

    /// Close an open defect. Closed defects never reopen.
    pub fn transition(&mut self, to: DefectStatus) -> Result<(), TransitionError> {
        if self.status != DefectStatus::Open || to == DefectStatus::Open {
            return Err(TransitionError {
                entity: "defect",
                id: self.defect_id.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

/// One factor that contributed to a grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeExplanation {
    pub factor: String,
    pub detail: String,
}

impl GradeExplanation {
    pub fn new(factor: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            factor: factor.into(),
            detail: detail.into(),
        }
    }
}

/// The evidence chain supporting one claim.
///
/// Never deleted; changes are recorded by superseding with a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sanad {
    pub sanad_id: String,
    pub tenant_id: String,
    pub deal_id: String,
    pub claim_id: String,

    #[serde(default = "first_version")]
    pub version: u32,

    /// Id of the Sanad version this one replaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,

    pub primary_evidence_id: String,

    #[serde(default, serialize_with = "serialize_sorted")]
    pub corroborating_evidence_ids: Vec<String>,

    pub transmission_chain: Vec<TransmissionNode>,
    pub corroboration_status: CorroborationStatus,
    pub sanad_grade: Grade,

    #[serde(default)]
    pub grade_explanation: Vec<GradeExplanation>,

    #[serde(default)]
    pub defects: Vec<Defect>,
}

fn first_version() -> u32 {
    1
}

fn serialize_sorted<S>(ids: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut sorted: Vec<&String> = ids.iter().collect();
    sorted.sort();
    serializer.collect_seq(sorted)
}

impl Sanad {
    /// Start a chain for a claim from its primary evidence.
    ///
    /// The Sanad begins ungraded (D, single attestation) until a grader runs.
    pub fn new(
        sanad_id: impl Into<String>,
        tenant_id: impl Into<String>,
        deal_id: impl Into<String>,
        claim_id: impl Into<String>,
        primary_evidence_id: impl Into<String>,
        transmission_chain: Vec<TransmissionNode>,
    ) -> Self {
        Self {
            sanad_id: sanad_id.into(),
            tenant_id: tenant_id.into(),
            deal_id: deal_id.into(),
            claim_id: claim_id.into(),
            version: 1,
            supersedes: None,
            primary_evidence_id: primary_evidence_id.into(),
            corroborating_evidence_ids: Vec::new(),
            transmission_chain,
            corroboration_status: CorroborationStatus::Ahad1,
            sanad_grade: Grade::D,
            grade_explanation: Vec::new(),
            defects: Vec::new(),
        }
    }

    /// Primary evidence followed by corroborating evidence.
    pub fn evidence_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_evidence_id.as_str())
            .chain(self.corroborating_evidence_ids.iter().map(String::as_str))
    }

    pub fn open_defects(&self) -> impl Iterator<Item = &Defect> {
        self.defects.iter().filter(|d| d.is_open())
    }

    pub fn worst_open_severity(&self) -> Option<Severity> {
        self.open_defects().map(|d| d.severity).max()
    }

    pub fn has_open_fatal(&self) -> bool {
        self.worst_open_severity() == Some(Severity::Fatal)
    }

    /// Add corroborating evidence, ignoring ids already on the chain.
    pub fn add_corroboration(&mut self, evidence_id: impl Into<String>) {
        let id = evidence_id.into();
        if id != self.primary_evidence_id && !self.corroborating_evidence_ids.contains(&id) {
            self.corroborating_evidence_ids.push(id);
        }
    }

    /// Append a defect after checking it belongs to this Sanad's tenant and deal.
    ///
    /// An open FATAL defect drops the grade to D immediately.
    pub fn append_defect(&mut self, defect: Defect) -> Result<(), SanadError> {
        if defect.tenant_id != self.tenant_id {
            return Err(SanadError::TenantMismatch {
                defect_id: defect.defect_id,
                expected: self.tenant_id.clone(),
                found: defect.tenant_id,
            });
        }
        if let Some(deal_id) = &defect.deal_id {
            if deal_id != &self.deal_id {
                return Err(SanadError::DealMismatch {
                    defect_id: defect.defect_id.clone(),
                    expected: self.deal_id.clone(),
                    found: deal_id.clone(),
                });
            }
        }

        if defect.is_open() && defect.severity == Severity::Fatal {
            self.sanad_grade = Grade::D;
        }
        self.defects.push(defect);
        Ok(())
    }

    /// Change the status of an existing defect.
    pub fn transition_defect(&mut self, defect_id: &str, to: DefectStatus) -> Result<(), SanadError> {
        let defect = self
            .defects
            .iter_mut()
            .find(|d| d.defect_id == defect_id)
            .ok_or_else(|| SanadError::DefectNotFound(defect_id.to_string()))?;
        defect.transition(to)?;
        Ok(())
    }

    /// Next version of this Sanad, pointing back at the current one.
    pub fn supersede(&self, new_sanad_id: impl Into<String>) -> Sanad {
        Sanad {
            sanad_id: new_sanad_id.into(),
            version: self.version + 1,
            supersedes: Some(self.sanad_id.clone()),
            ..self.clone()
        }
    }
}
