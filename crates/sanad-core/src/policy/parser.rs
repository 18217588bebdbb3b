//! Trust policy parsing from YAML/JSON.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_policy_schema;
use crate::muhasabah::MuhasabahThresholds;
use crate::sanad::GradingTable;
use crate::tawatur::TawaturConfig;

const DEFAULT_POLICY_YAML: &str = include_str!("../../policy/default_policy.yaml");

lazy_static! {
    static ref DEFAULT_POLICY: TrustPolicy =
        TrustPolicy::from_yaml(DEFAULT_POLICY_YAML).expect("embedded default policy is valid");
}

/// Errors that can occur when loading a policy.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Failed to read policy file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Policy does not match schema: {}", .0.join("; "))]
    SchemaValidation(Vec<String>),

    #[error("Incomplete grading table: {0}")]
    IncompleteTable(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Versioned trust policy injected into the graders and validators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustPolicy {
    /// Policy version; bump on any cell or threshold change
    pub version: String,

    pub grading: GradingTable,

    pub tawatur: TawaturConfig,

    pub muhasabah: MuhasabahThresholds,
}

impl TrustPolicy {
    /// Parse a policy from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, PolicyError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a policy from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a policy from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a policy from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn from_value(value: serde_json::Value) -> Result<Self, PolicyError> {
        validate_policy_schema(&value).map_err(PolicyError::SchemaValidation)?;
        let policy: TrustPolicy = serde_json::from_value(value)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Semantic checks the schema cannot express.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.version.trim().is_empty() {
            return Err(PolicyError::MissingField("version".to_string()));
        }

        self.grading.check()?;

        let tawatur = &self.tawatur;
        if tawatur.mutawatir_threshold < 2 {
            return Err(PolicyError::InvalidPolicy(format!(
                "tawatur.mutawatir_threshold must be at least 2, got {}",
                tawatur.mutawatir_threshold
            )));
        }
        if tawatur.time_bucket_hours == 0 {
            return Err(PolicyError::InvalidPolicy(
                "tawatur.time_bucket_hours must be at least 1".to_string(),
            ));
        }
        check_unit("tawatur.collusion_threshold", tawatur.collusion_threshold)?;

        let weights = &tawatur.weights;
        check_unit("tawatur.weights.system_concentration", weights.system_concentration)?;
        check_unit("tawatur.weights.time_clustering", weights.time_clustering)?;
        check_unit("tawatur.weights.chain_overlap", weights.chain_overlap)?;
        if (weights.total() - 1.0).abs() > 1e-6 {
            return Err(PolicyError::InvalidPolicy(format!(
                "tawatur.weights must sum to 1.0, got {:.4}",
                weights.total()
            )));
        }

        check_unit("muhasabah.high_confidence", self.muhasabah.high_confidence)?;
        check_unit("muhasabah.materiality", self.muhasabah.materiality)?;

        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, PolicyError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl Default for TrustPolicy {
    fn default() -> Self {
        DEFAULT_POLICY.clone()
    }
}

fn check_unit(field: &str, value: f64) -> Result<(), PolicyError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PolicyError::InvalidPolicy(format!(
            "{} must be within [0, 1], got {}",
            field, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CorroborationStatus, Grade, Severity};

    #[test]
    fn test_default_policy_loads() {
        let policy = TrustPolicy::default();
        assert_eq!(policy.version, "2026.1");
        assert_eq!(policy.tawatur.mutawatir_threshold, 3);
        assert_eq!(policy.tawatur.collusion_threshold, 0.30);
        assert_eq!(policy.tawatur.time_bucket_hours, 1);
        assert_eq!(policy.muhasabah.high_confidence, 0.80);
        assert_eq!(policy.muhasabah.materiality, 0.50);
        assert_eq!(
            policy.grading.base_grade(Grade::C, CorroborationStatus::Mutawatir),
            Grade::B
        );
        assert_eq!(policy.grading.severity_caps[&Severity::Fatal], Grade::D);
    }

    #[test]
    fn test_default_matches_component_defaults() {
        let policy = TrustPolicy::default();
        assert_eq!(policy.tawatur, TawaturConfig::default());
        assert_eq!(policy.muhasabah, MuhasabahThresholds::default());
    }

    #[test]
    fn test_yaml_and_json_agree() {
        let policy = TrustPolicy::default();
        let json = serde_json::to_string(&policy).unwrap();
        assert_eq!(TrustPolicy::from_json(&json).unwrap(), policy);

        let yaml = policy.to_yaml().unwrap();
        assert_eq!(TrustPolicy::from_yaml(&yaml).unwrap(), policy);
    }

    #[test]
    fn test_schema_violation_reported() {
        let yaml = r#"
version: "1"
grading:
  base: {}
  severity_caps: {}
tawatur:
  mutawatir_threshold: 3
  collusion_threshold: 0.3
  time_bucket_hours: 1
muhasabah:
  high_confidence: 0.8
  materiality: 0.5
"#;
        let err = TrustPolicy::from_yaml(yaml).unwrap_err();
        match err {
            PolicyError::SchemaValidation(errors) => assert!(!errors.is_empty()),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut value = serde_json::to_value(TrustPolicy::default()).unwrap();
        value["tawatur"]["weights"]["chain_overlap"] = serde_json::json!(0.5);
        let err = TrustPolicy::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidPolicy(msg) if msg.contains("sum to 1.0")));
    }

    #[test]
    fn test_missing_weights_use_defaults() {
        let mut value = serde_json::to_value(TrustPolicy::default()).unwrap();
        value["tawatur"].as_object_mut().unwrap().remove("weights");
        let policy = TrustPolicy::from_json(&value.to_string()).unwrap();
        assert_eq!(policy.tawatur.weights.system_concentration, 0.40);
    }

    #[test]
    fn test_blank_version_rejected() {
        let mut policy = TrustPolicy::default();
        policy.version = "  ".to_string();
        assert!(matches!(policy.validate(), Err(PolicyError::MissingField(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = TrustPolicy::from_yaml_file("/nonexistent/policy.yaml");
        assert!(matches!(result, Err(PolicyError::IoError(_))));
    }
}
