//! Sanad grading as an explicit, versioned decision table.
//!
//! The grade is looked up in two steps:
//!
//! | Step | Key | Result |
//! |------|-----|--------|
//! | base | (minimum source grade, corroboration status) | base grade |
//! | cap | worst OPEN defect severity | maximum grade allowed |
//!
//! The final grade is the worse of the two. The table comes from
//! [`TrustPolicy`](crate::policy::TrustPolicy) and is checked for
//! completeness when the policy loads; a FATAL cap other than D is refused.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::model::{EvidenceItem, GradeExplanation, Sanad};
use super::validate::{grade_consistency, validate};
use super::SanadError;
use crate::policy::{PolicyError, TrustPolicy};
use crate::tawatur::TawaturResult;
use crate::types::{CorroborationStatus, Grade, Severity};

/// Grading decision table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingTable {
    /// Minimum source grade -> corroboration status -> base grade
    pub base: BTreeMap<Grade, BTreeMap<CorroborationStatus, Grade>>,

    /// Worst open defect severity -> best grade still allowed
    pub severity_caps: BTreeMap<Severity, Grade>,
}

impl GradingTable {
    /// Check that every cell is present and that FATAL caps to D.
    pub fn check(&self) -> Result<(), PolicyError> {
        for source in Grade::ALL {
            let row = self.base.get(&source).ok_or_else(|| {
                PolicyError::IncompleteTable(format!("grading.base is missing row {}", source))
            })?;
            for status in CorroborationStatus::ALL {
                if !row.contains_key(&status) {
                    return Err(PolicyError::IncompleteTable(format!(
                        "grading.base.{} is missing column {}",
                        source, status
                    )));
                }
            }
        }

        for severity in Severity::ALL {
            if !self.severity_caps.contains_key(&severity) {
                return Err(PolicyError::IncompleteTable(format!(
                    "grading.severity_caps is missing {}",
                    severity
                )));
            }
        }

        if self.severity_caps.get(&Severity::Fatal) != Some(&Grade::D) {
            return Err(PolicyError::InvalidPolicy(
                "grading.severity_caps.FATAL must be D".to_string(),
            ));
        }

        Ok(())
    }

    /// Base grade for a cell. Missing cells grade D.
    pub fn base_grade(&self, min_source: Grade, corroboration: CorroborationStatus) -> Grade {
        self.base
            .get(&min_source)
            .and_then(|row| row.get(&corroboration))
            .copied()
            .unwrap_or(Grade::D)
    }

    /// Best grade allowed under the worst open defect.
    pub fn cap(&self, worst_open: Option<Severity>) -> Grade {
        match worst_open {
            None => Grade::A,
            Some(Severity::Fatal) => Grade::D,
            Some(severity) => self.severity_caps.get(&severity).copied().unwrap_or(Grade::D),
        }
    }

    pub fn lookup(
        &self,
        corroboration: CorroborationStatus,
        worst_open: Option<Severity>,
        min_source: Grade,
    ) -> Grade {
        self.base_grade(min_source, corroboration)
            .min(self.cap(worst_open))
    }
}

impl Default for GradingTable {
    fn default() -> Self {
        TrustPolicy::default().grading
    }
}

/// A computed grade and the factors behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeDecision {
    pub grade: Grade,
    pub explanation: Vec<GradeExplanation>,
}

/// Grades Sanads against an injected decision table.
pub struct SanadGrader {
    table: GradingTable,
}

impl SanadGrader {
    /// Create a grader over a checked decision table.
    pub fn new(table: GradingTable) -> Self {
        Self { table }
    }

    /// The decision table grades are read from.
    pub fn table(&self) -> &GradingTable {
        &self.table
    }

    /// Grade a Sanad from its evidence and corroboration status.
    ///
    /// Every evidence id on the Sanad must be present in `evidence` and
    /// belong to the Sanad's tenant.
    pub fn grade(
        &self,
        sanad: &Sanad,
        evidence: &[EvidenceItem],
        corroboration: CorroborationStatus,
    ) -> Result<GradeDecision, SanadError> {
        let by_id: HashMap<&str, &EvidenceItem> =
            evidence.iter().map(|e| (e.evidence_id.as_str(), e)).collect();

        let mut min_source = Grade::A;
        for id in sanad.evidence_ids() {
            let item = by_id
                .get(id)
                .ok_or_else(|| SanadError::EvidenceNotFound(id.to_string()))?;
            if item.tenant_id != sanad.tenant_id {
                return Err(SanadError::EvidenceTenantMismatch {
                    evidence_id: item.evidence_id.clone(),
                    expected: sanad.tenant_id.clone(),
                    found: item.tenant_id.clone(),
                });
            }
            min_source = min_source.min(item.source_grade);
        }

        let worst_open = sanad.worst_open_severity();
        let base = self.table.base_grade(min_source, corroboration);
        let cap = self.table.cap(worst_open);
        let grade = base.min(cap);

        let explanation = vec![
            GradeExplanation::new("corroboration", corroboration.as_str()),
            GradeExplanation::new("min_source_grade", min_source.as_str()),
            GradeExplanation::new(
                "worst_open_defect",
                worst_open.map(|s| s.as_str()).unwrap_or("NONE"),
            ),
            GradeExplanation::new("base_grade", base.as_str()),
            GradeExplanation::new("severity_cap", cap.as_str()),
        ];

        tracing::debug!(
            sanad_id = %sanad.sanad_id,
            corroboration = %corroboration,
            min_source = %min_source,
            grade = %grade,
            "Sanad graded"
        );

        Ok(GradeDecision { grade, explanation })
    }

    /// Produce the superseding Sanad version after corroboration or defects changed.
    pub fn regrade(
        &self,
        sanad: &Sanad,
        evidence: &[EvidenceItem],
        tawatur: &TawaturResult,
        new_sanad_id: impl Into<String>,
    ) -> Result<Sanad, SanadError> {
        let decision = self.grade(sanad, evidence, tawatur.status)?;

        let mut next = sanad.supersede(new_sanad_id);
        next.corroboration_status = tawatur.status;
        next.sanad_grade = decision.grade;
        next.grade_explanation = decision.explanation;
        next.grade_explanation.push(GradeExplanation::new(
            "collusion_risk",
            format!("{:.4}", tawatur.collusion_risk),
        ));

        validate(&next)?;
        grade_consistency(&next)?;
        Ok(next)
    }
}

impl Default for SanadGrader {
    fn default() -> Self {
        Self::new(GradingTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanad::model::{ActorType, CureProtocol, Defect, DefectType, NodeType, TransmissionNode};
    use crate::tawatur::TawaturAssessor;

    use crate::types::CorroborationStatus::{Ahad1, Ahad2, Mutawatir, None as NoCorroboration};
    use crate::types::Grade::{A, B, C, D};

    /// Every base cell of the default table.
    #[test]
    fn test_default_base_table_every_cell() {
        let table = GradingTable::default();
        let expected = [
            (A, [(Mutawatir, A), (Ahad2, A), (Ahad1, B), (NoCorroboration, D)]),
            (B, [(Mutawatir, A), (Ahad2, B), (Ahad1, B), (NoCorroboration, D)]),
            (C, [(Mutawatir, B), (Ahad2, C), (Ahad1, C), (NoCorroboration, D)]),
            (D, [(Mutawatir, C), (Ahad2, D), (Ahad1, D), (NoCorroboration, D)]),
        ];

        for (source, row) in expected {
            for (status, grade) in row {
                assert_eq!(
                    table.base_grade(source, status),
                    grade,
                    "base[{}][{}]",
                    source,
                    status
                );
            }
        }
    }

    /// Every severity cap of the default table.
    #[test]
    fn test_default_severity_caps_every_cell() {
        let table = GradingTable::default();
        assert_eq!(table.cap(None), A);
        assert_eq!(table.cap(Some(Severity::Info)), A);
        assert_eq!(table.cap(Some(Severity::Minor)), B);
        assert_eq!(table.cap(Some(Severity::Major)), C);
        assert_eq!(table.cap(Some(Severity::Fatal)), D);
    }

    #[test]
    fn test_fatal_always_d() {
        let table = GradingTable::default();
        for source in Grade::ALL {
            for status in CorroborationStatus::ALL {
                assert_eq!(table.lookup(status, Some(Severity::Fatal), source), D);
            }
        }
    }

    #[test]
    fn test_cap_lowers_base() {
        let table = GradingTable::default();
        assert_eq!(table.lookup(Mutawatir, Some(Severity::Major), A), C);
        assert_eq!(table.lookup(Ahad1, Some(Severity::Minor), C), C);
    }

    #[test]
    fn test_check_rejects_missing_cell() {
        let mut table = GradingTable::default();
        table.base.get_mut(&B).unwrap().remove(&Ahad2);
        assert!(matches!(table.check(), Err(PolicyError::IncompleteTable(_))));
    }

    #[test]
    fn test_check_rejects_lenient_fatal_cap() {
        let mut table = GradingTable::default();
        table.severity_caps.insert(Severity::Fatal, C);
        assert!(matches!(table.check(), Err(PolicyError::InvalidPolicy(_))));
    }

    fn evidence(id: &str, tenant: &str, grade: Grade, system: &str, origin: &str, ts: &str) -> EvidenceItem {
        let mut e = EvidenceItem::new(id, tenant, "deal-1", grade);
        e.source_system = Some(system.to_string());
        e.upstream_origin_id = Some(origin.to_string());
        e.retrieval_timestamp = Some(ts.to_string());
        e
    }

    fn sanad_with(corroborating: &[&str]) -> Sanad {
        let mut s = Sanad::new(
            "s1",
            "tenant-a",
            "deal-1",
            "claim-1",
            "ev-1",
            vec![TransmissionNode::new("n1", NodeType::Extract, ActorType::Agent, "x")],
        );
        for id in corroborating {
            s.add_corroboration(*id);
        }
        s
    }

    #[test]
    fn test_grade_uses_minimum_source_grade() {
        let s = sanad_with(&["ev-2"]);
        let items = vec![
            evidence("ev-1", "tenant-a", A, "data_room", "o1", "2026-01-01T00:00:00Z"),
            evidence("ev-2", "tenant-a", C, "crm", "o2", "2026-01-05T00:00:00Z"),
        ];
        let decision = SanadGrader::default().grade(&s, &items, Ahad2).unwrap();
        assert_eq!(decision.grade, C);
        assert!(decision
            .explanation
            .contains(&GradeExplanation::new("min_source_grade", "C")));
    }

    #[test]
    fn test_grade_requires_all_evidence() {
        let s = sanad_with(&["ev-2"]);
        let items = vec![evidence("ev-1", "tenant-a", A, "data_room", "o1", "2026-01-01T00:00:00Z")];
        assert!(matches!(
            SanadGrader::default().grade(&s, &items, Ahad1),
            Err(SanadError::EvidenceNotFound(_))
        ));
    }

    #[test]
    fn test_grade_rejects_foreign_tenant_evidence() {
        let s = sanad_with(&[]);
        let items = vec![evidence("ev-1", "tenant-z", A, "data_room", "o1", "2026-01-01T00:00:00Z")];
        assert!(matches!(
            SanadGrader::default().grade(&s, &items, Ahad1),
            Err(SanadError::EvidenceTenantMismatch { .. })
        ));
    }

    #[test]
    fn test_regrade_supersedes_and_locks_fatal() {
        let mut s = sanad_with(&["ev-2", "ev-3"]);
        s.append_defect(Defect::new(
            "d1",
            "tenant-a",
            DefectType::Concealment,
            Severity::Fatal,
            CureProtocol::HumanArbitration,
        ))
        .unwrap();

        let items = vec![
            evidence("ev-1", "tenant-a", A, "data_room", "o1", "2026-01-01T00:00:00Z"),
            evidence("ev-2", "tenant-a", A, "crm", "o2", "2026-01-03T00:00:00Z"),
            evidence("ev-3", "tenant-a", A, "bank", "o3", "2026-01-07T00:00:00Z"),
        ];
        let tawatur = TawaturAssessor::default().assess(&items);
        let next = SanadGrader::default().regrade(&s, &items, &tawatur, "s2").unwrap();

        assert_eq!(next.version, 2);
        assert_eq!(next.supersedes.as_deref(), Some("s1"));
        assert_eq!(next.corroboration_status, tawatur.status);
        assert_eq!(next.sanad_grade, D);
    }

    #[test]
    fn test_regrade_independent_sources_reach_a() {
        let s = sanad_with(&["ev-2", "ev-3"]);
        let items = vec![
            evidence("ev-1", "tenant-a", B, "data_room", "o1", "2026-01-01T00:00:00Z"),
            evidence("ev-2", "tenant-a", A, "crm", "o2", "2026-01-03T00:00:00Z"),
            evidence("ev-3", "tenant-a", A, "bank", "o3", "2026-01-07T00:00:00Z"),
        ];
        let tawatur = TawaturAssessor::default().assess(&items);
        assert_eq!(tawatur.status, Mutawatir);

        let next = SanadGrader::default().regrade(&s, &items, &tawatur, "s2").unwrap();
        assert_eq!(next.sanad_grade, A);
    }
}
