//! Core types shared across the trust engine.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Evidence quality grade.
///
/// Variants are declared worst-first so the derived `Ord` reads the way
/// graders talk: `Grade::A > Grade::B > Grade::C > Grade::D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    D,
    C,
    B,
    A,
}

impl Grade {
    /// All grades, best first.
    pub const ALL: [Grade; 4] = [Grade::A, Grade::B, Grade::C, Grade::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topical class of an extracted claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimClass {
    Financial,
    Traction,
    Market,
    Competition,
    Team,
    Legal,
    Technical,
    Other,
}

/// Reconciliation verdict for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimVerdict {
    Verified,
    Inflated,
    Contradicted,
    Unverified,
    Subjective,
}

/// Follow-up required for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimAction {
    #[default]
    None,
    RequestData,
    Flag,
    RedFlag,
    HumanGate,
    PartnerOverrideRequired,
}

/// Verification state of a single evidence item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Verified,
    Contradicted,
}

/// Multi-source attestation strength produced by the Tawatur assessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CorroborationStatus {
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "AHAD_1")]
    Ahad1,
    #[serde(rename = "AHAD_2")]
    Ahad2,
    #[serde(rename = "MUTAWATIR")]
    Mutawatir,
}

impl CorroborationStatus {
    pub const ALL: [CorroborationStatus; 4] = [
        CorroborationStatus::None,
        CorroborationStatus::Ahad1,
        CorroborationStatus::Ahad2,
        CorroborationStatus::Mutawatir,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CorroborationStatus::None => "NONE",
            CorroborationStatus::Ahad1 => "AHAD_1",
            CorroborationStatus::Ahad2 => "AHAD_2",
            CorroborationStatus::Mutawatir => "MUTAWATIR",
        }
    }
}

impl fmt::Display for CorroborationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Defect severity, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Fatal,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Info,
        Severity::Minor,
        Severity::Major,
        Severity::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Minor => "MINOR",
            Severity::Major => "MAJOR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured value carried by a claim.
///
/// Numeric variants hold exact decimals and an optional reporting window
/// (e.g. `"FY2024"`, `"2025-Q3"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClaimValue {
    Monetary {
        amount: Decimal,
        currency: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_window: Option<String>,
    },
    Percentage {
        value: Decimal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_window: Option<String>,
    },
    Count {
        value: Decimal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_window: Option<String>,
    },
    Date {
        date: NaiveDate,
    },
    Range {
        low: Decimal,
        high: Decimal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_window: Option<String>,
    },
    Text {
        text: String,
    },
}

impl ClaimValue {
    /// The single exact number this value asserts, if any.
    ///
    /// Ranges assert an interval rather than a number and return `None`.
    pub fn numeric_value(&self) -> Option<Decimal> {
        match self {
            ClaimValue::Monetary { amount, .. } => Some(*amount),
            ClaimValue::Percentage { value, .. } | ClaimValue::Count { value, .. } => Some(*value),
            ClaimValue::Date { .. } | ClaimValue::Range { .. } | ClaimValue::Text { .. } => None,
        }
    }

    /// Kind and unit of the asserted number: `monetary:USD`, `percentage`
    /// or `count`. Numbers are only comparable under the same key.
    pub fn unit_key(&self) -> Option<String> {
        match self {
            ClaimValue::Monetary { currency, .. } => {
                Some(format!("monetary:{}", currency.trim().to_ascii_uppercase()))
            }
            ClaimValue::Percentage { .. } => Some("percentage".to_string()),
            ClaimValue::Count { .. } => Some("count".to_string()),
            ClaimValue::Date { .. } | ClaimValue::Range { .. } | ClaimValue::Text { .. } => None,
        }
    }

    pub fn time_window(&self) -> Option<&str> {
        match self {
            ClaimValue::Monetary { time_window, .. }
            | ClaimValue::Percentage { time_window, .. }
            | ClaimValue::Count { time_window, .. }
            | ClaimValue::Range { time_window, .. } => time_window.as_deref(),
            ClaimValue::Date { .. } | ClaimValue::Text { .. } => None,
        }
    }
}

/// Errors from claim record checks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClaimError {
    #[error("Claim {claim_id} has grade {grade} / verdict {verdict:?} but no action")]
    MissingRequiredAction {
        claim_id: String,
        grade: Grade,
        verdict: ClaimVerdict,
    },

    #[error("Claim {claim_id} extraction_confidence {value} is outside [0, 1]")]
    ConfidenceOutOfRange { claim_id: String, value: f64 },
}

/// A resolved claim about a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_id: String,
    pub tenant_id: String,
    pub deal_id: String,
    pub claim_text: String,
    pub claim_class: ClaimClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ClaimValue>,
    pub extraction_confidence: f64,
    pub claim_grade: Grade,
    pub claim_verdict: ClaimVerdict,
    #[serde(default)]
    pub claim_action: ClaimAction,
}

impl Claim {
    /// Check the record-level invariants of a claim.
    ///
    /// A claim graded D or contradicted by evidence must carry a follow-up action.
    pub fn validate(&self) -> Result<(), ClaimError> {
        if !(0.0..=1.0).contains(&self.extraction_confidence) {
            return Err(ClaimError::ConfidenceOutOfRange {
                claim_id: self.claim_id.clone(),
                value: self.extraction_confidence,
            });
        }

        let needs_action =
            self.claim_grade == Grade::D || self.claim_verdict == ClaimVerdict::Contradicted;
        if needs_action && self.claim_action == ClaimAction::None {
            return Err(ClaimError::MissingRequiredAction {
                claim_id: self.claim_id.clone(),
                grade: self.claim_grade,
                verdict: self.claim_verdict,
            });
        }

        Ok(())
    }
}
